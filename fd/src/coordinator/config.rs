//! Coordinator configuration

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Coordinator configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinatorConfig {
    /// Agents silent for longer than this are marked offline
    #[serde(default = "default_status_expiration_secs", rename = "status-expiration-secs")]
    pub status_expiration_secs: u64,

    /// How often the server runs the expiration sweep
    #[serde(default = "default_sweep_interval_secs", rename = "sweep-interval-secs")]
    pub sweep_interval_secs: u64,

    /// Max gateway calls in flight for one install or terminate
    #[serde(default = "default_max_concurrent_dispatch", rename = "max-concurrent-dispatch")]
    pub max_concurrent_dispatch: usize,
}

fn default_status_expiration_secs() -> u64 {
    debug!("default_status_expiration_secs: called");
    30
}

fn default_sweep_interval_secs() -> u64 {
    debug!("default_sweep_interval_secs: called");
    5
}

fn default_max_concurrent_dispatch() -> usize {
    debug!("default_max_concurrent_dispatch: called");
    32
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        debug!("CoordinatorConfig::default: called");
        Self {
            status_expiration_secs: default_status_expiration_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            max_concurrent_dispatch: default_max_concurrent_dispatch(),
        }
    }
}

impl CoordinatorConfig {
    pub fn status_expiration(&self) -> Duration {
        Duration::from_secs(self.status_expiration_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        // A zero interval would make tokio::time::interval panic
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }

    /// Dispatch permits, never less than one
    pub fn dispatch_permits(&self) -> usize {
        self.max_concurrent_dispatch.max(1)
    }
}
