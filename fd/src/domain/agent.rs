//! Agent status as announced by the agent itself

use std::collections::HashSet;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use url::Url;

use super::id::{AgentId, SlotId};
use super::slot::{AgentSlot, SlotLifecycleState, SlotStatus};

/// Whether an agent is reachable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentLifecycleState {
    Online,
    Offline,
}

impl std::fmt::Display for AgentLifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

impl FromStr for AgentLifecycleState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "online" => Ok(Self::Online),
            "offline" => Ok(Self::Offline),
            _ => Err(format!("Unknown agent state: {}. Use: online, offline", s)),
        }
    }
}

/// Complete status of one agent, replaced wholesale on every announce
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentStatus {
    #[serde(rename = "agent-id")]
    pub agent_id: AgentId,
    pub state: AgentLifecycleState,
    /// Service location of the agent itself
    pub location: Url,
    #[serde(default)]
    pub slots: Vec<SlotStatus>,
}

impl AgentStatus {
    pub fn new(agent_id: AgentId, state: AgentLifecycleState, location: Url, slots: Vec<SlotStatus>) -> Self {
        Self {
            agent_id,
            state,
            location,
            slots,
        }
    }

    /// Check the structural rules an announce must satisfy
    ///
    /// Returns a human-readable reason on failure.
    pub fn validate(&self) -> Result<(), String> {
        if self.agent_id.is_empty() {
            return Err("agent id must not be empty".to_string());
        }

        let mut seen = HashSet::new();
        for slot in &self.slots {
            if slot.id.is_empty() {
                return Err(format!("agent {} reported a slot with an empty id", self.agent_id));
            }
            if !seen.insert(&slot.id) {
                return Err(format!("agent {} reported slot {} twice", self.agent_id, slot.id));
            }
        }
        Ok(())
    }

    pub fn is_online(&self) -> bool {
        self.state == AgentLifecycleState::Online
    }

    /// Host part of the agent location, if it has one
    pub fn host(&self) -> Option<&str> {
        self.location.host_str()
    }

    pub fn slot(&self, slot_id: &SlotId) -> Option<&SlotStatus> {
        self.slots.iter().find(|s| &s.id == slot_id)
    }

    /// First slot with nothing installed, used as the install hint
    pub fn first_unassigned_slot(&self) -> Option<&SlotStatus> {
        self.slots
            .iter()
            .find(|s| s.state == SlotLifecycleState::Unassigned)
    }

    /// Copy of this status with a different lifecycle state, slots untouched
    pub fn with_state(&self, state: AgentLifecycleState) -> Self {
        Self {
            state,
            ..self.clone()
        }
    }

    /// Copy of this status with one slot replaced, or appended if unknown
    pub fn with_slot(&self, slot: SlotStatus) -> Self {
        let mut slots = self.slots.clone();
        match slots.iter_mut().find(|s| s.id == slot.id) {
            Some(existing) => *existing = slot,
            None => slots.push(slot),
        }
        Self {
            slots,
            ..self.clone()
        }
    }

    /// Flatten the slots, each annotated with this agent's id and location
    pub fn agent_slots(&self) -> impl Iterator<Item = AgentSlot> + '_ {
        self.slots.iter().map(|slot| AgentSlot {
            agent_id: self.agent_id.clone(),
            agent_location: self.location.clone(),
            slot: slot.clone(),
        })
    }
}
