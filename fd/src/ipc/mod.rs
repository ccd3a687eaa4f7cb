//! Inter-Process Communication for fleetd
//!
//! Unix Domain Socket transport between the `fd` CLI (or agents announcing
//! locally) and the running server. One request and one response per
//! connection, each a single line of JSON.

use std::path::PathBuf;

pub mod client;
pub mod listener;
pub mod messages;

pub use client::{DispatchOutcome, FleetClient};
pub use listener::{cleanup_socket, create_listener_at, read_request, send_response};
pub use messages::{FleetRequest, FleetResponse};

/// Maximum size of one message line (1 MiB)
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Default socket path for the server
pub fn get_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("fleetd")
        .join("fleetd.sock")
}
