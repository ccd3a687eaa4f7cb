//! Agent filter

use tracing::debug;

use crate::domain::{AgentId, AgentLifecycleState, AgentStatus};

use super::{FilterError, FilterMode, host_matches, invalid_value};

/// Conjunctive predicate over agents
#[derive(Debug, Clone, Default)]
pub struct AgentFilter {
    ids: Vec<AgentId>,
    hosts: Vec<String>,
    states: Vec<AgentLifecycleState>,
}

impl AgentFilter {
    /// Filter matching every agent, online or not
    pub fn all() -> Self {
        Self::default()
    }

    /// Filter matching online agents only
    pub fn online() -> Self {
        Self::default().with_state(AgentLifecycleState::Online)
    }

    /// Build a filter from key/value criteria
    ///
    /// Recognized keys: `id`, `host`, `state`.
    pub fn build<K, V>(criteria: &[(K, V)], mode: FilterMode) -> Result<Self, FilterError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        debug!(criteria_count = criteria.len(), ?mode, "AgentFilter::build: called");
        let mut filter = Self::default();

        for (key, value) in criteria {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "id" => filter.ids.push(AgentId::from(value)),
                "host" => filter.hosts.push(value.to_lowercase()),
                "state" => {
                    let state = value
                        .parse::<AgentLifecycleState>()
                        .map_err(|reason| invalid_value(key, value, reason))?;
                    filter.states.push(state);
                }
                other => {
                    debug!(key = %other, "AgentFilter::build: unknown criterion");
                    return Err(FilterError::UnknownCriterion { key: other.to_string() });
                }
            }
        }

        if mode == FilterMode::Required && !filter.has_criteria() {
            return Err(FilterError::MissingCriteria);
        }

        Ok(filter)
    }

    pub fn with_id(mut self, id: impl Into<AgentId>) -> Self {
        self.ids.push(id.into());
        self
    }

    pub fn with_host(mut self, host: impl AsRef<str>) -> Self {
        self.hosts.push(host.as_ref().to_lowercase());
        self
    }

    pub fn with_state(mut self, state: AgentLifecycleState) -> Self {
        self.states.push(state);
        self
    }

    pub fn has_criteria(&self) -> bool {
        !(self.ids.is_empty() && self.hosts.is_empty() && self.states.is_empty())
    }

    /// Evaluate the filter against one agent
    pub fn matches(&self, agent: &AgentStatus) -> bool {
        if !self.ids.is_empty() && !self.ids.contains(&agent.agent_id) {
            return false;
        }
        if !self.hosts.is_empty() && !host_matches(&self.hosts, agent.host()) {
            return false;
        }
        if !self.states.is_empty() && !self.states.contains(&agent.state) {
            return false;
        }
        true
    }
}
