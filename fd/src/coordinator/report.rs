//! Outcome of a fan-out operation

use serde::{Deserialize, Serialize};

use super::CoordinatorError;
use crate::domain::{AgentId, SlotId, SlotStatus};

/// One target that did not succeed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchFailure {
    pub agent_id: AgentId,
    /// Set for terminate, where the target is a specific slot
    pub slot_id: Option<SlotId>,
    pub error: CoordinatorError,
}

impl DispatchFailure {
    pub fn summary(&self) -> FailureSummary {
        FailureSummary {
            agent_id: self.agent_id.clone(),
            slot_id: self.slot_id.clone(),
            message: self.error.to_string(),
        }
    }
}

/// Wire form of a `DispatchFailure`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureSummary {
    #[serde(rename = "agent-id")]
    pub agent_id: AgentId,
    #[serde(rename = "slot-id", default, skip_serializing_if = "Option::is_none")]
    pub slot_id: Option<SlotId>,
    pub message: String,
}

/// Successes in selection order plus every failed target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub succeeded: Vec<SlotStatus>,
    pub failed: Vec<DispatchFailure>,
}

impl DispatchReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn failure_summaries(&self) -> Vec<FailureSummary> {
        self.failed.iter().map(DispatchFailure::summary).collect()
    }
}
