//! IPC listener for the server side
//!
//! Provides helpers for creating and managing the Unix Domain Socket listener.

use std::path::{Path, PathBuf};

use eyre::{Context, Result};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tracing::{debug, warn};

use super::MAX_MESSAGE_SIZE;
use super::messages::{FleetRequest, FleetResponse};

/// Create a listener at `socket_path`
///
/// Creates the parent directory and removes a stale socket left by a previous run.
pub fn create_listener_at(socket_path: &Path) -> Result<(UnixListener, PathBuf)> {
    debug!(?socket_path, "create_listener_at: creating IPC socket");

    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create socket directory")?;
    }

    if socket_path.exists() {
        debug!(?socket_path, "create_listener_at: removing stale socket");
        std::fs::remove_file(socket_path).context("Failed to remove stale socket")?;
    }

    let listener = UnixListener::bind(socket_path).context("Failed to bind IPC socket")?;
    debug!(?socket_path, "create_listener_at: socket bound successfully");

    Ok((listener, socket_path.to_path_buf()))
}

/// Remove the socket file on shutdown
pub fn cleanup_socket(socket_path: &Path) {
    if socket_path.exists() {
        debug!(?socket_path, "cleanup_socket: removing socket file");
        if let Err(e) = std::fs::remove_file(socket_path) {
            warn!(?socket_path, error = %e, "Failed to remove socket file");
        }
    }
}

/// Read one request line from the stream
pub async fn read_request(stream: &mut UnixStream) -> Result<FleetRequest> {
    let reader = BufReader::new(stream);
    let mut line = String::new();

    let bytes_read = reader
        .take(MAX_MESSAGE_SIZE as u64 + 1)
        .read_line(&mut line)
        .await
        .context("Failed to read IPC message")?;

    if bytes_read > MAX_MESSAGE_SIZE {
        return Err(eyre::eyre!("Message too large: more than {} bytes", MAX_MESSAGE_SIZE));
    }

    if line.trim().is_empty() {
        return Err(eyre::eyre!("Empty message received"));
    }

    let request: FleetRequest = serde_json::from_str(line.trim()).context("Failed to parse IPC message")?;
    debug!(?request, "read_request: parsed message");

    Ok(request)
}

/// Send a response on the stream
pub async fn send_response(stream: &mut UnixStream, response: &FleetResponse) -> Result<()> {
    let response_json = serde_json::to_string(response).context("Failed to serialize response")?;
    stream
        .write_all(response_json.as_bytes())
        .await
        .context("Failed to write response")?;
    stream.write_all(b"\n").await.context("Failed to write newline")?;
    stream.flush().await.context("Failed to flush response")?;
    debug!(bytes = response_json.len(), "send_response: sent response");
    Ok(())
}
