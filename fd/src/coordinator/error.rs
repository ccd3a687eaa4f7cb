//! Coordinator error taxonomy

use thiserror::Error;

use crate::domain::{AgentId, BinaryCoordinate, ConfigCoordinate};
use crate::filter::FilterError;
use crate::gateway::GatewayError;
use crate::registry::RegistryError;
use crate::resolver::ResolveError;

/// Errors surfaced by coordinator operations
///
/// Everything except `RemoteDispatchFailure` fails the whole call.
/// `RemoteDispatchFailure` only ever appears inside a `DispatchReport`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinatorError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid filter syntax: {0}")]
    InvalidFilterSyntax(#[from] FilterError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unresolved binary: {0}")]
    UnresolvedBinary(BinaryCoordinate),

    #[error("Unresolved config: {0}")]
    UnresolvedConfig(ConfigCoordinate),

    #[error("Dispatch to agent {agent_id} failed: {source}")]
    RemoteDispatchFailure { agent_id: AgentId, source: GatewayError },
}

impl CoordinatorError {
    /// Stable name of the error kind, used on the wire
    pub fn kind(&self) -> &'static str {
        match self {
            CoordinatorError::InvalidArgument(_) => "InvalidArgument",
            CoordinatorError::InvalidFilterSyntax(_) => "InvalidFilterSyntax",
            CoordinatorError::NotFound(_) => "NotFound",
            CoordinatorError::UnresolvedBinary(_) => "UnresolvedBinary",
            CoordinatorError::UnresolvedConfig(_) => "UnresolvedConfig",
            CoordinatorError::RemoteDispatchFailure { .. } => "RemoteDispatchFailure",
        }
    }
}

impl From<RegistryError> for CoordinatorError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::InvalidStatus(reason) => CoordinatorError::InvalidArgument(reason),
            RegistryError::AgentNotFound(agent_id) => CoordinatorError::NotFound(format!("agent {}", agent_id)),
        }
    }
}

impl From<ResolveError> for CoordinatorError {
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::UnresolvedBinary(binary) => CoordinatorError::UnresolvedBinary(binary),
            ResolveError::UnresolvedConfig(config) => CoordinatorError::UnresolvedConfig(config),
        }
    }
}
