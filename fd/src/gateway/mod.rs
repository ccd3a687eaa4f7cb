//! Agent gateway
//!
//! Carries install and terminate requests to a single remote agent. The
//! coordinator treats every failure as a per-target outcome, but the error
//! still says whether the agent could not be reached or refused the request.

mod http;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{AgentStatus, Installation, SlotId, SlotStatus};

pub use http::HttpAgentGateway;

/// Errors from a single agent call
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    #[error("Agent unreachable: {0}")]
    Unreachable(String),

    #[error("Agent rejected request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Agent call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Invalid agent response: {0}")]
    InvalidResponse(String),
}

impl GatewayError {
    /// True when the agent answered but said no
    pub fn is_rejection(&self) -> bool {
        matches!(self, GatewayError::Rejected { .. })
    }
}

/// Remote operations on one agent
///
/// Implementations must be safe to call concurrently for different agents.
#[async_trait]
pub trait AgentGateway: Send + Sync {
    /// Install onto `agent`, preferring `slot_hint` when given
    ///
    /// Returns the agent-confirmed status of the slot that received the install.
    async fn install(
        &self,
        agent: &AgentStatus,
        slot_hint: Option<&SlotId>,
        installation: &Installation,
    ) -> Result<SlotStatus, GatewayError>;

    /// Terminate one slot on `agent`, returning its final status
    async fn terminate(&self, agent: &AgentStatus, slot_id: &SlotId) -> Result<SlotStatus, GatewayError>;
}
