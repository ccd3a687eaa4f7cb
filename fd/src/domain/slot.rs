//! Slot status, assignments and resolved installations

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use super::coordinate::{BinaryCoordinate, ConfigCoordinate};
use super::id::{AgentId, SlotId};

/// Resolved config files: relative path -> content location
pub type ConfigMap = BTreeMap<String, Url>;

/// Lifecycle of a slot as reported by its agent
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SlotLifecycleState {
    /// Slot exists but nothing is installed
    #[default]
    Unassigned,
    /// Installed, not running
    Stopped,
    Running,
    /// Terminal; excluded from targeting by default
    Terminated,
    /// Agent could not determine the state
    Unknown,
}

impl SlotLifecycleState {
    pub fn is_terminated(&self) -> bool {
        matches!(self, Self::Terminated)
    }
}

impl std::fmt::Display for SlotLifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unassigned => write!(f, "unassigned"),
            Self::Stopped => write!(f, "stopped"),
            Self::Running => write!(f, "running"),
            Self::Terminated => write!(f, "terminated"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

impl FromStr for SlotLifecycleState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "unassigned" => Ok(Self::Unassigned),
            "stopped" => Ok(Self::Stopped),
            "running" => Ok(Self::Running),
            "terminated" => Ok(Self::Terminated),
            "unknown" => Ok(Self::Unknown),
            _ => Err(format!(
                "Unknown slot state: {}. Use: unassigned, stopped, running, terminated, unknown",
                s
            )),
        }
    }
}

/// Binary and config requested for a slot
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Assignment {
    pub binary: BinaryCoordinate,
    pub config: ConfigCoordinate,
}

impl Assignment {
    pub fn new(binary: BinaryCoordinate, config: ConfigCoordinate) -> Self {
        Self { binary, config }
    }
}

/// An assignment with every location resolved, ready to send to an agent
///
/// Both locations are required fields, so a half-resolved installation
/// cannot be constructed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installation {
    pub assignment: Assignment,
    #[serde(rename = "binary-location")]
    pub binary_location: Url,
    #[serde(rename = "config-files")]
    pub config_files: ConfigMap,
}

impl Installation {
    pub fn new(assignment: Assignment, binary_location: Url, config_files: ConfigMap) -> Self {
        Self {
            assignment,
            binary_location,
            config_files,
        }
    }
}

/// Status of one slot as of its agent's last announce
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotStatus {
    pub id: SlotId,
    pub name: String,
    /// Management endpoint of the slot
    pub location: Url,
    pub state: SlotLifecycleState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment: Option<Assignment>,
}

impl SlotStatus {
    /// Create an empty slot with nothing installed
    pub fn unassigned(id: SlotId, name: impl Into<String>, location: Url) -> Self {
        Self {
            id,
            name: name.into(),
            location,
            state: SlotLifecycleState::Unassigned,
            assignment: None,
        }
    }

    /// Copy of this slot with a different state
    pub fn with_state(&self, state: SlotLifecycleState) -> Self {
        Self {
            state,
            ..self.clone()
        }
    }

    /// Copy of this slot with an assignment
    pub fn with_assignment(&self, assignment: Assignment) -> Self {
        Self {
            assignment: Some(assignment),
            ..self.clone()
        }
    }

    /// Host part of the slot location, if it has one
    pub fn host(&self) -> Option<&str> {
        self.location.host_str()
    }
}

/// A slot together with its owning agent, as flattened out of the registry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentSlot {
    pub agent_id: AgentId,
    pub agent_location: Url,
    pub slot: SlotStatus,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn location() -> Url {
        Url::parse("http://host-a:7777/v1/slot/s1").unwrap()
    }

    #[test]
    fn test_state_parse_is_case_insensitive() {
        assert_eq!("RUNNING".parse::<SlotLifecycleState>().unwrap(), SlotLifecycleState::Running);
        assert_eq!(
            " Terminated ".parse::<SlotLifecycleState>().unwrap(),
            SlotLifecycleState::Terminated
        );
        assert!("installing".parse::<SlotLifecycleState>().is_err());
    }

    #[test]
    fn test_state_display_matches_parse() {
        for state in [
            SlotLifecycleState::Unassigned,
            SlotLifecycleState::Stopped,
            SlotLifecycleState::Running,
            SlotLifecycleState::Terminated,
            SlotLifecycleState::Unknown,
        ] {
            assert_eq!(state.to_string().parse::<SlotLifecycleState>().unwrap(), state);
        }
    }

    #[test]
    fn test_unassigned_slot() {
        let slot = SlotStatus::unassigned(SlotId::from("s1"), "s1", location());
        assert_eq!(slot.state, SlotLifecycleState::Unassigned);
        assert!(slot.assignment.is_none());
        assert_eq!(slot.host(), Some("host-a"));
    }

    #[test]
    fn test_with_state_keeps_identity() {
        let slot = SlotStatus::unassigned(SlotId::from("s1"), "s1", location());
        let running = slot.with_state(SlotLifecycleState::Running);
        assert_eq!(running.id, slot.id);
        assert_eq!(running.state, SlotLifecycleState::Running);
        assert_eq!(slot.state, SlotLifecycleState::Unassigned);
    }

    #[test]
    fn test_slot_status_json_shape() {
        let assignment = Assignment::new(
            "food.fruit:apple:1.0".parse().unwrap(),
            "@prod:apple:1.0".parse().unwrap(),
        );
        let slot = SlotStatus::unassigned(SlotId::from("s1"), "apple", location())
            .with_state(SlotLifecycleState::Stopped)
            .with_assignment(assignment);

        let value = serde_json::to_value(&slot).unwrap();
        assert_eq!(value["state"], "stopped");
        assert_eq!(value["assignment"]["binary"], "food.fruit:apple:1.0");
        assert_eq!(value["assignment"]["config"], "@prod:apple:1.0");
    }
}
