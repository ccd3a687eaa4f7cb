//! Agent and slot identifiers
//!
//! Both ids are opaque strings chosen by the agent. The coordinator never
//! re-keys them; `generate()` exists for agents and tests that need a fresh one.

use serde::{Deserialize, Serialize};

/// Generate a fresh opaque id (uuid v7, time ordered)
fn generate_id() -> String {
    uuid::Uuid::now_v7().to_string()
}

/// Identifier of a fleet node, assigned by the agent at first contact
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(String);

impl AgentId {
    /// Create a new random agent id
    pub fn generate() -> Self {
        Self(generate_id())
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// An empty id is never valid in an announce
    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for AgentId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for AgentId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for AgentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier of a deployable slot, assigned by its owning agent
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SlotId(String);

impl SlotId {
    /// Create a new random slot id
    pub fn generate() -> Self {
        Self(generate_id())
    }

    /// Get the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Display for SlotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SlotId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SlotId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for SlotId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_ids_are_unique() {
        let a = AgentId::generate();
        let b = AgentId::generate();
        assert_ne!(a, b);
        assert!(!a.is_empty());
    }

    #[test]
    fn test_generated_ids_sort_by_creation() {
        let first = SlotId::generate();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = SlotId::generate();
        assert!(first < second);
    }

    #[test]
    fn test_empty_id() {
        assert!(AgentId::from("").is_empty());
        assert!(SlotId::from("   ").is_empty());
        assert!(!SlotId::from("s1").is_empty());
    }

    #[test]
    fn test_serde_is_transparent() {
        let id = AgentId::from("agent-1");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, r#""agent-1""#);

        let parsed: SlotId = serde_json::from_str(r#""slot-9""#).unwrap();
        assert_eq!(parsed.as_str(), "slot-9");
    }
}
