//! Filter engine for targeting agents and slots
//!
//! Filters are flat structs of optional criteria built from key/value pairs
//! (query-string style). Distinct keys are AND-ed, repeated keys are OR-ed,
//! and an absent key imposes no constraint. Every syntax problem is reported
//! when the filter is built, before any fleet state is read.

mod agent;
mod slot;

use thiserror::Error;

pub use agent::AgentFilter;
pub use slot::SlotFilter;

/// Raw filter criteria as key/value pairs
pub type Criteria = Vec<(String, String)>;

/// Errors from building a filter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("Unknown filter criterion '{key}'")]
    UnknownCriterion { key: String },

    #[error("Invalid value '{value}' for filter criterion '{key}': {reason}")]
    InvalidValue { key: String, value: String, reason: String },

    #[error("At least one filter criterion is required")]
    MissingCriteria,
}

/// Whether a filter with no criteria is acceptable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    /// No criteria matches everything
    #[default]
    Optional,
    /// No criteria is an error (destructive operations)
    Required,
}

/// Parse a `key=value` string as given on the command line
pub fn parse_criterion(s: &str) -> Result<(String, String), FilterError> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => Ok((key.trim().to_string(), value.trim().to_string())),
        _ => Err(FilterError::InvalidValue {
            key: s.to_string(),
            value: String::new(),
            reason: "expected key=value".to_string(),
        }),
    }
}

/// Case-insensitive substring match used by the `host` criterion
fn host_matches(patterns: &[String], host: Option<&str>) -> bool {
    let Some(host) = host else {
        return false;
    };
    let host = host.to_lowercase();
    patterns.iter().any(|p| host.contains(p.as_str()))
}

fn invalid_value(key: &str, value: &str, reason: impl Into<String>) -> FilterError {
    FilterError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.into(),
    }
}
