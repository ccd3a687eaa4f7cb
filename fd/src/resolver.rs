//! Installation resolver
//!
//! Turns an `Assignment` into an `Installation` by asking the binary
//! repository for the artifact location and walking the config chain in
//! priority order. The first tier that knows the config supplies the whole
//! file map; maps from different tiers are never combined.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::domain::{Assignment, BinaryCoordinate, ConfigCoordinate, Installation};
use crate::repository::{BinaryRepository, ConfigRepository};

/// Errors from resolving an assignment
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("Unresolved binary: {0}")]
    UnresolvedBinary(BinaryCoordinate),

    #[error("Unresolved config: {0}")]
    UnresolvedConfig(ConfigCoordinate),
}

#[derive(Clone)]
pub struct InstallationResolver {
    binary: Arc<dyn BinaryRepository>,
    chain: Vec<Arc<dyn ConfigRepository>>,
}

impl InstallationResolver {
    /// Create a resolver; `chain` is ordered from highest to lowest priority
    pub fn new(binary: Arc<dyn BinaryRepository>, chain: Vec<Arc<dyn ConfigRepository>>) -> Self {
        debug!(tiers = chain.len(), "InstallationResolver::new: called");
        Self { binary, chain }
    }

    /// Names of the config tiers in lookup order
    pub fn tier_names(&self) -> Vec<String> {
        self.chain.iter().map(|t| t.name().to_string()).collect()
    }

    pub async fn resolve(&self, assignment: &Assignment) -> Result<Installation, ResolveError> {
        debug!(binary = %assignment.binary, config = %assignment.config, "InstallationResolver::resolve: called");

        let binary_location = match self.binary.binary_uri(&assignment.binary).await {
            Ok(Some(location)) => location,
            Ok(None) => {
                debug!("InstallationResolver::resolve: binary not found");
                return Err(ResolveError::UnresolvedBinary(assignment.binary.clone()));
            }
            Err(e) => {
                warn!(binary = %assignment.binary, error = %e, "Binary repository failed");
                return Err(ResolveError::UnresolvedBinary(assignment.binary.clone()));
            }
        };

        for tier in &self.chain {
            match tier.config_map(&assignment.config).await {
                Ok(Some(config_files)) => {
                    info!(config = %assignment.config, tier = tier.name(), files = config_files.len(), "Resolved config");
                    return Ok(Installation::new(assignment.clone(), binary_location, config_files));
                }
                Ok(None) => {
                    debug!(tier = tier.name(), "InstallationResolver::resolve: config not in tier");
                }
                Err(e) => {
                    warn!(tier = tier.name(), config = %assignment.config, error = %e, "Config tier failed, skipping");
                }
            }
        }

        debug!("InstallationResolver::resolve: config chain exhausted");
        Err(ResolveError::UnresolvedConfig(assignment.config.clone()))
    }
}
