//! In-memory repositories with fixed entries

use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;
use url::Url;

use super::{BinaryRepository, ConfigRepository, RepositoryError};
use crate::domain::{BinaryCoordinate, ConfigCoordinate, ConfigMap};

#[derive(Debug, Clone, Default)]
pub struct StaticBinaryRepository {
    entries: HashMap<BinaryCoordinate, Url>,
}

impl StaticBinaryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, binary: BinaryCoordinate, location: Url) -> Self {
        self.entries.insert(binary, location);
        self
    }
}

#[async_trait]
impl BinaryRepository for StaticBinaryRepository {
    async fn binary_uri(&self, binary: &BinaryCoordinate) -> Result<Option<Url>, RepositoryError> {
        debug!(%binary, "StaticBinaryRepository::binary_uri: called");
        Ok(self.entries.get(binary).cloned())
    }
}

#[derive(Debug, Clone)]
pub struct StaticConfigRepository {
    name: String,
    entries: HashMap<ConfigCoordinate, ConfigMap>,
}

impl StaticConfigRepository {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: HashMap::new(),
        }
    }

    pub fn with(mut self, config: ConfigCoordinate, files: ConfigMap) -> Self {
        self.entries.insert(config, files);
        self
    }
}

#[async_trait]
impl ConfigRepository for StaticConfigRepository {
    fn name(&self) -> &str {
        &self.name
    }

    async fn config_map(&self, config: &ConfigCoordinate) -> Result<Option<ConfigMap>, RepositoryError> {
        debug!(%config, name = %self.name, "StaticConfigRepository::config_map: called");
        Ok(self.entries.get(config).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_lookups() {
        let binary: BinaryCoordinate = "food.fruit:apple:1.0".parse().unwrap();
        let config: ConfigCoordinate = "@prod:apple:1.0".parse().unwrap();
        let location = Url::parse("http://repo/apple.tar.gz").unwrap();

        let binaries = StaticBinaryRepository::new().with(binary.clone(), location.clone());
        assert_eq!(binaries.binary_uri(&binary).await.unwrap(), Some(location));

        let other: BinaryCoordinate = "food.fruit:banana:1.0".parse().unwrap();
        assert_eq!(binaries.binary_uri(&other).await.unwrap(), None);

        let configs = StaticConfigRepository::new("fixed").with(config.clone(), ConfigMap::new());
        assert_eq!(configs.config_map(&config).await.unwrap(), Some(ConfigMap::new()));
        assert_eq!(configs.name(), "fixed");
    }
}
