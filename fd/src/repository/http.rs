//! Remote config repository over HTTP
//!
//! Each config directory publishes a `manifest.json` listing its files as a
//! JSON array of relative paths. The file URLs handed to agents point next
//! to the manifest.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};
use url::Url;

use super::{ConfigRepository, RepositoryError};
use crate::domain::{ConfigCoordinate, ConfigMap};

const MANIFEST_NAME: &str = "manifest.json";

/// Shared config tier served from one or more base URIs, tried in order
#[derive(Debug, Clone)]
pub struct HttpConfigRepository {
    bases: Vec<Url>,
    http: Client,
}

impl HttpConfigRepository {
    pub fn new(bases: Vec<Url>, timeout: Duration) -> Result<Self, RepositoryError> {
        debug!(base_count = bases.len(), ?timeout, "HttpConfigRepository::new: called");
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(bases, http))
    }

    /// Use a preconfigured HTTP client
    pub fn with_client(bases: Vec<Url>, http: Client) -> Self {
        Self { bases, http }
    }

    /// URL of the config directory below `base`, ending in `/`
    fn config_dir(base: &Url, config: &ConfigCoordinate) -> Result<Url, RepositoryError> {
        let mut dir = base.clone();
        dir.path_segments_mut()
            .map_err(|_| RepositoryError::InvalidLocation(base.to_string()))?
            .pop_if_empty()
            .extend(config.path_segments())
            .push("");
        Ok(dir)
    }

    async fn fetch(&self, base: &Url, config: &ConfigCoordinate) -> Result<Option<ConfigMap>, RepositoryError> {
        let dir = Self::config_dir(base, config)?;
        let manifest_url = dir
            .join(MANIFEST_NAME)
            .map_err(|e| RepositoryError::InvalidLocation(e.to_string()))?;
        debug!(url = %manifest_url, "HttpConfigRepository::fetch: called");

        let response = self.http.get(manifest_url.clone()).send().await?;
        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            debug!(url = %manifest_url, "HttpConfigRepository::fetch: manifest not found");
            return Ok(None);
        }
        if !status.is_success() {
            return Err(RepositoryError::Http {
                status: status.as_u16(),
                url: manifest_url,
            });
        }

        let paths: Vec<String> = response.json().await.map_err(|e| RepositoryError::InvalidManifest {
            url: manifest_url.clone(),
            reason: e.to_string(),
        })?;

        let mut files = ConfigMap::new();
        for path in paths {
            if path.is_empty() || path.starts_with('/') || path.split('/').any(|s| s == "..") {
                return Err(RepositoryError::InvalidManifest {
                    url: manifest_url,
                    reason: format!("path '{}' is not relative", path),
                });
            }
            let location = dir.join(&path).map_err(|e| RepositoryError::InvalidManifest {
                url: manifest_url.clone(),
                reason: e.to_string(),
            })?;
            files.insert(path, location);
        }
        Ok(Some(files))
    }
}

#[async_trait]
impl ConfigRepository for HttpConfigRepository {
    fn name(&self) -> &str {
        "remote"
    }

    async fn config_map(&self, config: &ConfigCoordinate) -> Result<Option<ConfigMap>, RepositoryError> {
        debug!(%config, "HttpConfigRepository::config_map: called");
        let mut last_error = None;
        let mut missed = false;

        for base in &self.bases {
            match self.fetch(base, config).await {
                Ok(Some(files)) => return Ok(Some(files)),
                Ok(None) => missed = true,
                Err(e) => {
                    warn!(%base, error = %e, "Remote config base failed, trying next");
                    last_error = Some(e);
                }
            }
        }

        // A clean miss on any base outranks failures on the others
        match last_error {
            Some(e) if !missed => Err(e),
            _ => Ok(None),
        }
    }
}
