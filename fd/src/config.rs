//! fleetd configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

use crate::coordinator::CoordinatorConfig;

/// Main fleetd configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level when `--log-level` is not given
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// Dispatch and status expiration settings
    pub coordinator: CoordinatorConfig,

    /// Remote agent calls
    pub gateway: GatewayConfig,

    /// Binary and config sources
    pub repositories: RepositoriesConfig,

    /// Local control socket
    pub ipc: IpcConfig,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if self.repositories.binary_base_uris.is_empty() {
            return Err(eyre::eyre!(
                "No binary repository configured. Set repositories.binary-base-uris in your config."
            ));
        }
        self.repositories.binary_bases()?;
        self.repositories.remote_config_bases()?;
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .fleetd.yml
        let local_config = PathBuf::from(".fleetd.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/fleetd/fleetd.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("fleetd").join("fleetd.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Agent gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Timeout for one call to one agent
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self { timeout_ms: 30_000 }
    }
}

impl GatewayConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Repository configuration
///
/// Config tiers are consulted local first, then git, then remote.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoriesConfig {
    /// Maven-layout base URIs for binaries; the first one is used
    #[serde(rename = "binary-base-uris")]
    pub binary_base_uris: Vec<String>,

    /// Local override directory
    #[serde(rename = "local-config-dir")]
    pub local_config_dir: Option<PathBuf>,

    /// Git checkout holding shared config
    #[serde(rename = "git-config-dir")]
    pub git_config_dir: Option<PathBuf>,

    /// Remote config servers, tried in order
    #[serde(rename = "remote-config-uris")]
    pub remote_config_uris: Vec<String>,
}

impl RepositoriesConfig {
    pub fn binary_bases(&self) -> Result<Vec<Url>> {
        parse_uris("binary-base-uris", &self.binary_base_uris)
    }

    pub fn remote_config_bases(&self) -> Result<Vec<Url>> {
        parse_uris("remote-config-uris", &self.remote_config_uris)
    }
}

fn parse_uris(key: &str, uris: &[String]) -> Result<Vec<Url>> {
    uris.iter()
        .map(|uri| Url::parse(uri).with_context(|| format!("Invalid URI in repositories.{}: {}", key, uri)))
        .collect()
}

/// IPC configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct IpcConfig {
    /// Socket path; defaults to the runtime dir
    #[serde(rename = "socket-path")]
    pub socket_path: Option<PathBuf>,
}

impl IpcConfig {
    pub fn socket_path(&self) -> PathBuf {
        self.socket_path.clone().unwrap_or_else(crate::ipc::get_socket_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.coordinator.status_expiration_secs, 30);
        assert_eq!(config.gateway.timeout_ms, 30_000);
        assert!(config.repositories.binary_base_uris.is_empty());
        assert!(config.ipc.socket_path().ends_with("fleetd.sock"));
    }

    #[test]
    fn test_default_config_fails_validation() {
        let err = Config::default().validate().unwrap_err();
        assert!(err.to_string().contains("binary-base-uris"));
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
log-level: debug

coordinator:
  status-expiration-secs: 60
  max-concurrent-dispatch: 8

gateway:
  timeout-ms: 5000

repositories:
  binary-base-uris:
    - http://repo.example/maven/
  local-config-dir: /etc/fleetd/local
  git-config-dir: /var/lib/fleetd/config
  remote-config-uris:
    - http://config-a.example/
    - http://config-b.example/

ipc:
  socket-path: /tmp/fleetd-test.sock
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.coordinator.status_expiration_secs, 60);
        assert_eq!(config.coordinator.max_concurrent_dispatch, 8);
        assert_eq!(config.coordinator.sweep_interval_secs, 5);
        assert_eq!(config.gateway.timeout(), Duration::from_secs(5));
        assert_eq!(config.repositories.remote_config_bases().unwrap().len(), 2);
        assert_eq!(
            config.repositories.local_config_dir,
            Some(PathBuf::from("/etc/fleetd/local"))
        );
        assert_eq!(config.ipc.socket_path(), PathBuf::from("/tmp/fleetd-test.sock"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_invalid_uri_fails_validation() {
        let yaml = r#"
repositories:
  binary-base-uris:
    - "not a uri"
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(format!("{:#}", err).contains("not a uri"));
    }

    #[test]
    fn test_load_explicit_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("fleetd.yml");
        std::fs::write(&path, "gateway:\n  timeout-ms: 1234\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.gateway.timeout_ms, 1234);
    }

    #[test]
    fn test_load_missing_explicit_path_fails() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("missing.yml");
        assert!(Config::load(Some(&path)).is_err());
    }
}
