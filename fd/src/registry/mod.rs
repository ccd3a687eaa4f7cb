//! Fleet registry
//!
//! The coordinator's volatile view of the fleet, rebuilt entirely from agent
//! announces. Each announce replaces the agent's whole status; nothing is
//! persisted.

mod store;

use thiserror::Error;

use crate::domain::AgentId;

pub use store::FleetRegistry;

/// Errors from registry operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Invalid agent status: {0}")]
    InvalidStatus(String),

    #[error("Agent not found: {0}")]
    AgentNotFound(AgentId),
}
