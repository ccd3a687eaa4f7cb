//! In-memory agent status store

use std::collections::HashMap;
use std::collections::hash_map::Entry as MapEntry;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};

use crate::domain::{AgentId, AgentLifecycleState, AgentSlot, AgentStatus, SlotStatus};

use super::RegistryError;

/// One registry entry
///
/// The status sits behind an `Arc` and is swapped, never edited, so a reader
/// holding an older `Arc` keeps a consistent value.
#[derive(Debug, Clone)]
struct Entry {
    status: Arc<AgentStatus>,
    last_announce: DateTime<Utc>,
}

/// Concurrent store of the latest `AgentStatus` per agent
///
/// The map lock is held exclusively only to add or remove an agent. Every
/// other write holds it shared and serializes on the agent's own mutex, so
/// writes to one agent are ordered while different agents proceed in
/// parallel.
#[derive(Debug, Default)]
pub struct FleetRegistry {
    agents: RwLock<HashMap<AgentId, Mutex<Entry>>>,
}

impl FleetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or fully replace the status of `status.agent_id`
    pub async fn update_agent_status(&self, status: AgentStatus) -> Result<(), RegistryError> {
        self.update_agent_status_at(status, Utc::now()).await
    }

    /// Same as `update_agent_status` with an explicit announce time
    pub async fn update_agent_status_at(&self, status: AgentStatus, at: DateTime<Utc>) -> Result<(), RegistryError> {
        debug!(agent_id = %status.agent_id, slots = status.slots.len(), "update_agent_status: called");
        status.validate().map_err(RegistryError::InvalidStatus)?;

        let agent_id = status.agent_id.clone();
        let entry = Entry {
            status: Arc::new(status),
            last_announce: at,
        };

        {
            let agents = self.agents.read().await;
            if let Some(cell) = agents.get(&agent_id) {
                *cell.lock().await = entry;
                return Ok(());
            }
        }

        // First announce; another writer may have added the agent meanwhile
        match self.agents.write().await.entry(agent_id.clone()) {
            MapEntry::Occupied(occupied) => *occupied.get().lock().await = entry,
            MapEntry::Vacant(vacant) => {
                vacant.insert(Mutex::new(entry));
                info!(%agent_id, "Agent registered");
            }
        }
        Ok(())
    }

    /// Mark a known agent OFFLINE, keeping its last reported slots
    pub async fn mark_offline(&self, agent_id: &AgentId) -> Result<(), RegistryError> {
        debug!(%agent_id, "mark_offline: called");
        let agents = self.agents.read().await;
        let mut entry = agents
            .get(agent_id)
            .ok_or_else(|| RegistryError::AgentNotFound(agent_id.clone()))?
            .lock()
            .await;

        if entry.status.state != AgentLifecycleState::Offline {
            entry.status = Arc::new(entry.status.with_state(AgentLifecycleState::Offline));
            info!(%agent_id, "Agent marked offline");
        }
        Ok(())
    }

    pub async fn get_agent_status(&self, agent_id: &AgentId) -> Result<AgentStatus, RegistryError> {
        debug!(%agent_id, "get_agent_status: called");
        let status = {
            let agents = self.agents.read().await;
            let entry = agents
                .get(agent_id)
                .ok_or_else(|| RegistryError::AgentNotFound(agent_id.clone()))?
                .lock()
                .await;
            Arc::clone(&entry.status)
        };
        Ok(status.as_ref().clone())
    }

    /// Point-in-time copy of every agent, ordered by agent id
    pub async fn all_agent_statuses(&self) -> Vec<AgentStatus> {
        let snapshot = self.snapshot().await;
        snapshot.iter().map(|s| s.as_ref().clone()).collect()
    }

    /// Point-in-time copy of every slot, annotated with its owning agent
    ///
    /// Ordered by agent id, then by the agent's own slot order.
    pub async fn all_slot_statuses(&self) -> Vec<AgentSlot> {
        let snapshot = self.snapshot().await;
        snapshot.iter().flat_map(|s| s.agent_slots()).collect()
    }

    /// Replace one slot inside an agent's status after an agent-confirmed change
    ///
    /// The slot is appended when the agent did not list it yet. The announce
    /// time is left alone since this is not an announce.
    pub async fn merge_slot(&self, agent_id: &AgentId, slot: SlotStatus) -> Result<AgentStatus, RegistryError> {
        debug!(%agent_id, slot_id = %slot.id, state = %slot.state, "merge_slot: called");
        let agents = self.agents.read().await;
        let mut entry = agents
            .get(agent_id)
            .ok_or_else(|| RegistryError::AgentNotFound(agent_id.clone()))?
            .lock()
            .await;

        let merged = entry.status.with_slot(slot);
        entry.status = Arc::new(merged.clone());
        Ok(merged)
    }

    /// Mark OFFLINE every online agent whose last announce is older than `max_age`
    ///
    /// Returns the ids that changed state.
    pub async fn expire_stale(&self, now: DateTime<Utc>, max_age: chrono::Duration) -> Vec<AgentId> {
        debug!(%now, ?max_age, "expire_stale: called");
        let mut expired = Vec::new();
        let agents = self.agents.read().await;

        for (agent_id, cell) in agents.iter() {
            let mut entry = cell.lock().await;
            if entry.status.is_online() && now - entry.last_announce > max_age {
                entry.status = Arc::new(entry.status.with_state(AgentLifecycleState::Offline));
                expired.push(agent_id.clone());
            }
        }

        expired.sort();
        if !expired.is_empty() {
            info!(count = expired.len(), "Expired stale agents");
        }
        expired
    }

    /// Drop an agent entirely
    pub async fn remove_agent(&self, agent_id: &AgentId) -> Result<AgentStatus, RegistryError> {
        debug!(%agent_id, "remove_agent: called");
        let cell = self
            .agents
            .write()
            .await
            .remove(agent_id)
            .ok_or_else(|| RegistryError::AgentNotFound(agent_id.clone()))?;
        info!(%agent_id, "Agent removed");
        Ok(cell.into_inner().status.as_ref().clone())
    }

    pub async fn len(&self) -> usize {
        self.agents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.agents.read().await.is_empty()
    }

    /// Grab the current `Arc` of every agent, sorted by agent id
    async fn snapshot(&self) -> Vec<Arc<AgentStatus>> {
        let agents = self.agents.read().await;
        let mut snapshot = Vec::with_capacity(agents.len());
        for cell in agents.values() {
            snapshot.push(Arc::clone(&cell.lock().await.status));
        }
        snapshot.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{SlotId, SlotLifecycleState};
    use proptest::prelude::*;
    use std::time::Duration;
    use url::Url;

    fn slot(id: &str, state: SlotLifecycleState) -> SlotStatus {
        SlotStatus::unassigned(
            SlotId::from(id),
            id,
            Url::parse(&format!("http://host-a/v1/slot/{}", id)).unwrap(),
        )
        .with_state(state)
    }

    fn agent(id: &str, slots: Vec<SlotStatus>) -> AgentStatus {
        AgentStatus::new(
            AgentId::from(id),
            AgentLifecycleState::Online,
            Url::parse("http://host-a:7777/").unwrap(),
            slots,
        )
    }

    #[tokio::test]
    async fn test_announce_then_get() {
        let registry = FleetRegistry::new();
        let status = agent("a1", vec![slot("s1", SlotLifecycleState::Stopped)]);
        registry.update_agent_status(status.clone()).await.unwrap();

        assert_eq!(registry.get_agent_status(&AgentId::from("a1")).await.unwrap(), status);
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_announce_replaces_whole_status() {
        let registry = FleetRegistry::new();
        registry
            .update_agent_status(agent("a1", vec![slot("s1", SlotLifecycleState::Stopped), slot("s2", SlotLifecycleState::Running)]))
            .await
            .unwrap();
        let second = agent("a1", vec![slot("s3", SlotLifecycleState::Unassigned)]);
        registry.update_agent_status(second.clone()).await.unwrap();

        let status = registry.get_agent_status(&AgentId::from("a1")).await.unwrap();
        assert_eq!(status, second);
        assert_eq!(registry.all_slot_statuses().await.len(), 1);
    }

    #[tokio::test]
    async fn test_announce_rejects_malformed_status() {
        let registry = FleetRegistry::new();
        let bad = agent("a1", vec![slot("s1", SlotLifecycleState::Stopped), slot("s1", SlotLifecycleState::Stopped)]);
        assert!(matches!(
            registry.update_agent_status(bad).await,
            Err(RegistryError::InvalidStatus(_))
        ));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_get_unknown_agent() {
        let registry = FleetRegistry::new();
        assert_eq!(
            registry.get_agent_status(&AgentId::from("nope")).await.unwrap_err(),
            RegistryError::AgentNotFound(AgentId::from("nope"))
        );
    }

    #[tokio::test]
    async fn test_mark_offline_keeps_slots() {
        let registry = FleetRegistry::new();
        registry
            .update_agent_status(agent("a1", vec![slot("s1", SlotLifecycleState::Running)]))
            .await
            .unwrap();
        registry.mark_offline(&AgentId::from("a1")).await.unwrap();

        let status = registry.get_agent_status(&AgentId::from("a1")).await.unwrap();
        assert_eq!(status.state, AgentLifecycleState::Offline);
        assert_eq!(status.slots.len(), 1);
    }

    #[tokio::test]
    async fn test_mark_offline_unknown_agent() {
        let registry = FleetRegistry::new();
        assert!(matches!(
            registry.mark_offline(&AgentId::from("ghost")).await,
            Err(RegistryError::AgentNotFound(_))
        ));
        assert!(registry.is_empty().await);
    }

    #[tokio::test]
    async fn test_snapshot_is_unaffected_by_later_announce() {
        let registry = FleetRegistry::new();
        registry
            .update_agent_status(agent("a1", vec![slot("s1", SlotLifecycleState::Running)]))
            .await
            .unwrap();

        let snapshot = registry.all_agent_statuses().await;
        registry.update_agent_status(agent("a1", vec![])).await.unwrap();

        assert_eq!(snapshot[0].slots.len(), 1);
        assert!(registry.all_slot_statuses().await.is_empty());
    }

    #[tokio::test]
    async fn test_snapshots_are_ordered_by_agent_id() {
        let registry = FleetRegistry::new();
        for id in ["c", "a", "b"] {
            registry
                .update_agent_status(agent(id, vec![slot(&format!("{}-s", id), SlotLifecycleState::Stopped)]))
                .await
                .unwrap();
        }

        let ids: Vec<String> = registry
            .all_agent_statuses()
            .await
            .into_iter()
            .map(|s| s.agent_id.to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        let slot_owners: Vec<String> = registry
            .all_slot_statuses()
            .await
            .into_iter()
            .map(|s| s.agent_id.to_string())
            .collect();
        assert_eq!(slot_owners, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_merge_slot_replaces_single_slot() {
        let registry = FleetRegistry::new();
        registry
            .update_agent_status(agent(
                "a1",
                vec![slot("s1", SlotLifecycleState::Unassigned), slot("s2", SlotLifecycleState::Running)],
            ))
            .await
            .unwrap();

        let merged = registry
            .merge_slot(&AgentId::from("a1"), slot("s1", SlotLifecycleState::Stopped))
            .await
            .unwrap();

        assert_eq!(merged.slots[0].state, SlotLifecycleState::Stopped);
        assert_eq!(merged.slots[1].state, SlotLifecycleState::Running);
        assert_eq!(registry.get_agent_status(&AgentId::from("a1")).await.unwrap(), merged);
    }

    #[tokio::test]
    async fn test_merge_slot_unknown_agent() {
        let registry = FleetRegistry::new();
        assert!(
            registry
                .merge_slot(&AgentId::from("a1"), slot("s1", SlotLifecycleState::Stopped))
                .await
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_expire_stale() {
        let registry = FleetRegistry::new();
        let now = Utc::now();
        registry
            .update_agent_status_at(agent("old", vec![]), now - chrono::Duration::seconds(120))
            .await
            .unwrap();
        registry.update_agent_status_at(agent("fresh", vec![]), now).await.unwrap();

        let expired = registry.expire_stale(now, chrono::Duration::seconds(30)).await;
        assert_eq!(expired, vec![AgentId::from("old")]);

        let old = registry.get_agent_status(&AgentId::from("old")).await.unwrap();
        assert_eq!(old.state, AgentLifecycleState::Offline);
        let fresh = registry.get_agent_status(&AgentId::from("fresh")).await.unwrap();
        assert_eq!(fresh.state, AgentLifecycleState::Online);

        // Already offline agents are not reported again
        assert!(registry.expire_stale(now, chrono::Duration::seconds(30)).await.is_empty());
    }

    #[tokio::test]
    async fn test_remove_agent() {
        let registry = FleetRegistry::new();
        registry.update_agent_status(agent("a1", vec![])).await.unwrap();
        registry.remove_agent(&AgentId::from("a1")).await.unwrap();
        assert!(registry.is_empty().await);
        assert!(registry.remove_agent(&AgentId::from("a1")).await.is_err());
    }

    #[tokio::test]
    async fn test_concurrent_announces_never_tear() {
        let registry = Arc::new(FleetRegistry::new());
        let mut handles = Vec::new();

        for round in 0..50 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                let count = round % 5 + 1;
                let slots = (0..count)
                    .map(|i| slot(&format!("r{}-s{}", round, i), SlotLifecycleState::Stopped))
                    .collect();
                registry.update_agent_status(agent("a1", slots)).await.unwrap();
            }));
        }

        for _ in 0..50 {
            let statuses = registry.all_agent_statuses().await;
            for status in statuses {
                // Every slot of one snapshot must come from the same announce
                let prefixes: std::collections::HashSet<&str> = status
                    .slots
                    .iter()
                    .map(|s| s.id.as_str().split('-').next().unwrap_or(""))
                    .collect();
                assert!(prefixes.len() <= 1);
            }
            tokio::task::yield_now().await;
        }

        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(registry.len().await, 1);
    }

    #[tokio::test]
    async fn test_busy_agent_does_not_block_other_agents() {
        let registry = Arc::new(FleetRegistry::new());
        registry.update_agent_status(agent("a1", vec![])).await.unwrap();
        registry.update_agent_status(agent("a2", vec![])).await.unwrap();

        // Hold a1's entry as an in-flight writer would
        let agents = registry.agents.read().await;
        let held = agents.get(&AgentId::from("a1")).unwrap().lock().await;

        let other = tokio::time::timeout(
            Duration::from_millis(500),
            registry.update_agent_status(agent("a2", vec![slot("s1", SlotLifecycleState::Stopped)])),
        )
        .await;
        assert!(matches!(other, Ok(Ok(()))));
        let merged = tokio::time::timeout(
            Duration::from_millis(500),
            registry.merge_slot(&AgentId::from("a2"), slot("s2", SlotLifecycleState::Running)),
        )
        .await;
        assert!(matches!(merged, Ok(Ok(_))));

        // A second write to a1 waits for the holder and then lands
        let pending = {
            let registry = Arc::clone(&registry);
            tokio::spawn(async move {
                registry
                    .update_agent_status(agent("a1", vec![slot("s9", SlotLifecycleState::Stopped)]))
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!pending.is_finished());

        drop(held);
        drop(agents);
        pending.await.unwrap().unwrap();
        let a1 = registry.get_agent_status(&AgentId::from("a1")).await.unwrap();
        assert_eq!(a1.slots.len(), 1);
        let a2 = registry.get_agent_status(&AgentId::from("a2")).await.unwrap();
        assert_eq!(a2.slots.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_first_announces_register_every_agent() {
        let registry = Arc::new(FleetRegistry::new());
        let mut handles = Vec::new();
        for i in 0..20 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                for round in 0..3 {
                    let slots = vec![slot(&format!("r{}", round), SlotLifecycleState::Stopped)];
                    registry.update_agent_status(agent(&format!("a{:02}", i), slots)).await.unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let statuses = registry.all_agent_statuses().await;
        assert_eq!(statuses.len(), 20);
        for status in statuses {
            assert_eq!(status.slots[0].id, SlotId::from("r2"));
        }
    }

    proptest! {
        #[test]
        fn prop_last_announce_wins(slot_counts in proptest::collection::vec(0usize..6, 1..10)) {
            let runtime = tokio::runtime::Runtime::new().unwrap();
            runtime.block_on(async {
                let registry = FleetRegistry::new();
                let mut last = None;
                for (round, count) in slot_counts.iter().enumerate() {
                    let slots = (0..*count)
                        .map(|i| slot(&format!("r{}-s{}", round, i), SlotLifecycleState::Stopped))
                        .collect();
                    let status = agent("a1", slots);
                    registry.update_agent_status(status.clone()).await.unwrap();
                    last = Some(status);
                }
                let visible = registry.get_agent_status(&AgentId::from("a1")).await.unwrap();
                assert_eq!(Some(visible), last);
            });
        }
    }
}
