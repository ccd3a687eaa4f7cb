//! IPC message types for fleetd
//!
//! Simple JSON-over-newline protocol. Each message is a single line of JSON followed by `\n`.

use serde::{Deserialize, Serialize};

use crate::coordinator::{CoordinatorError, FailureSummary};
use crate::domain::{AgentId, AgentStatus, Assignment, SlotStatus};
use crate::filter::Criteria;

fn default_limit() -> usize {
    1
}

/// Requests from the CLI (or any client) to the server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum FleetRequest {
    /// List slots matching the criteria
    ListSlots {
        #[serde(default)]
        criteria: Criteria,
    },

    /// Resolve an assignment and install it on up to `limit` matching agents
    Install {
        #[serde(default)]
        criteria: Criteria,
        #[serde(default = "default_limit")]
        limit: usize,
        assignment: Assignment,
    },

    /// Terminate slots matching the criteria (at least one criterion required)
    Terminate {
        #[serde(default)]
        criteria: Criteria,
    },

    /// Agent announce carrying its full status
    Announce { status: AgentStatus },

    /// Mark an agent offline
    AgentOffline { agent_id: AgentId },

    /// Fetch a single agent's status
    GetAgent { agent_id: AgentId },

    /// List agents matching the criteria
    ListAgents {
        #[serde(default)]
        criteria: Criteria,
    },

    /// Ping to check if the server is alive
    Ping,

    /// Request the server to stop gracefully
    Shutdown,
}

/// Responses from the server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum FleetResponse {
    Slots { slots: Vec<SlotStatus> },

    /// Result of install or terminate: successes plus per-target failures
    Dispatched {
        slots: Vec<SlotStatus>,
        #[serde(default)]
        failures: Vec<FailureSummary>,
    },

    Agent { status: AgentStatus },

    Agents { agents: Vec<AgentStatus> },

    /// Acknowledgment
    Ok,

    /// Pong response to ping
    Pong { version: String },

    /// Error response; `kind` names the error category
    Error { kind: String, message: String },
}

impl From<CoordinatorError> for FleetResponse {
    fn from(err: CoordinatorError) -> Self {
        FleetResponse::Error {
            kind: err.kind().to_string(),
            message: err.to_string(),
        }
    }
}
