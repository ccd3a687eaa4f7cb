//! Slot filter

use glob::Pattern;
use tracing::debug;

use crate::domain::{AgentSlot, SlotId, SlotLifecycleState};

use super::{FilterError, FilterMode, host_matches, invalid_value};

/// Conjunctive predicate over slots
///
/// Terminated slots never match unless `include_terminated` is set or the
/// `state` criterion names `terminated` explicitly.
#[derive(Debug, Clone, Default)]
pub struct SlotFilter {
    ids: Vec<SlotId>,
    hosts: Vec<String>,
    states: Vec<SlotLifecycleState>,
    binaries: Vec<Pattern>,
    configs: Vec<Pattern>,
    include_terminated: bool,
}

impl SlotFilter {
    /// Filter matching every live slot
    pub fn all() -> Self {
        Self::default()
    }

    /// Build a filter from key/value criteria
    ///
    /// Recognized keys: `id`, `host`, `state`, `binary`, `config`,
    /// `include-terminated`.
    pub fn build<K, V>(criteria: &[(K, V)], mode: FilterMode) -> Result<Self, FilterError>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        debug!(criteria_count = criteria.len(), ?mode, "SlotFilter::build: called");
        let mut filter = Self::default();

        for (key, value) in criteria {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                "id" => filter.ids.push(SlotId::from(value)),
                "host" => filter.hosts.push(value.to_lowercase()),
                "state" => {
                    let state = value
                        .parse::<SlotLifecycleState>()
                        .map_err(|reason| invalid_value(key, value, reason))?;
                    filter.states.push(state);
                }
                "binary" => filter.binaries.push(compile(key, value)?),
                "config" => filter.configs.push(compile(key, value)?),
                "include-terminated" => {
                    filter.include_terminated = value
                        .parse::<bool>()
                        .map_err(|_| invalid_value(key, value, "expected true or false"))?;
                }
                other => {
                    debug!(key = %other, "SlotFilter::build: unknown criterion");
                    return Err(FilterError::UnknownCriterion { key: other.to_string() });
                }
            }
        }

        if mode == FilterMode::Required && !filter.has_criteria() {
            debug!("SlotFilter::build: criteria required but none given");
            return Err(FilterError::MissingCriteria);
        }

        Ok(filter)
    }

    pub fn with_id(mut self, id: impl Into<SlotId>) -> Self {
        self.ids.push(id.into());
        self
    }

    pub fn with_host(mut self, host: impl AsRef<str>) -> Self {
        self.hosts.push(host.as_ref().to_lowercase());
        self
    }

    pub fn with_state(mut self, state: SlotLifecycleState) -> Self {
        self.states.push(state);
        self
    }

    pub fn with_binary(mut self, pattern: &str) -> Result<Self, FilterError> {
        self.binaries.push(compile("binary", pattern)?);
        Ok(self)
    }

    pub fn with_config(mut self, pattern: &str) -> Result<Self, FilterError> {
        self.configs.push(compile("config", pattern)?);
        Ok(self)
    }

    pub fn include_terminated(mut self, include: bool) -> Self {
        self.include_terminated = include;
        self
    }

    /// True when at least one selecting criterion is present
    ///
    /// `include-terminated` alone widens rather than narrows, so it does not count.
    pub fn has_criteria(&self) -> bool {
        !(self.ids.is_empty()
            && self.hosts.is_empty()
            && self.states.is_empty()
            && self.binaries.is_empty()
            && self.configs.is_empty())
    }

    /// Evaluate the filter against one slot
    pub fn matches(&self, candidate: &AgentSlot) -> bool {
        let slot = &candidate.slot;

        if slot.state.is_terminated()
            && !self.include_terminated
            && !self.states.contains(&SlotLifecycleState::Terminated)
        {
            return false;
        }

        if !self.ids.is_empty() && !self.ids.contains(&slot.id) {
            return false;
        }

        if !self.hosts.is_empty() {
            let host = slot.host().or_else(|| candidate.agent_location.host_str());
            if !host_matches(&self.hosts, host) {
                return false;
            }
        }

        if !self.states.is_empty() && !self.states.contains(&slot.state) {
            return false;
        }

        if !self.binaries.is_empty() {
            let Some(assignment) = &slot.assignment else {
                return false;
            };
            let binary = assignment.binary.to_string();
            if !self.binaries.iter().any(|p| p.matches(&binary)) {
                return false;
            }
        }

        if !self.configs.is_empty() {
            let Some(assignment) = &slot.assignment else {
                return false;
            };
            let config = assignment.config.to_string();
            if !self.configs.iter().any(|p| p.matches(&config)) {
                return false;
            }
        }

        true
    }
}

fn compile(key: &str, pattern: &str) -> Result<Pattern, FilterError> {
    Pattern::new(pattern).map_err(|e| invalid_value(key, pattern, e.msg))
}
