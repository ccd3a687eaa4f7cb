//! Maven-layout binary repository

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::{debug, warn};
use url::Url;

use super::{BinaryRepository, RepositoryError};
use crate::domain::BinaryCoordinate;

/// Finds binary coordinates in one or more Maven-layout base URIs
///
/// `food.fruit:apple:1.0` under `http://repo/` becomes
/// `http://repo/food/fruit/apple/1.0/apple-1.0.tar.gz`. Bases are tried in
/// order and the first one holding the artifact wins. `http(s)` bases are
/// checked with `HEAD`, `file` bases on disk.
#[derive(Debug, Clone)]
pub struct MavenBinaryRepository {
    bases: Vec<Url>,
    http: Client,
}

impl MavenBinaryRepository {
    pub fn new(bases: Vec<Url>, timeout: Duration) -> Result<Self, RepositoryError> {
        debug!(base_count = bases.len(), ?timeout, "MavenBinaryRepository::new: called");
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(bases, http))
    }

    /// Use a preconfigured HTTP client
    pub fn with_client(bases: Vec<Url>, http: Client) -> Self {
        Self {
            bases: bases.into_iter().map(with_trailing_slash).collect(),
            http,
        }
    }

    pub fn bases(&self) -> &[Url] {
        &self.bases
    }

    /// Where `binary` lives below `base`, whether or not it exists
    pub fn location(base: &Url, binary: &BinaryCoordinate) -> Result<Url, RepositoryError> {
        base.join(&binary.repository_path())
            .map_err(|e| RepositoryError::InvalidLocation(format!("{}: {}", binary, e)))
    }

    async fn exists(&self, location: &Url) -> Result<bool, RepositoryError> {
        debug!(%location, "MavenBinaryRepository::exists: called");
        match location.scheme() {
            "file" => {
                let path = location
                    .to_file_path()
                    .map_err(|_| RepositoryError::InvalidLocation(location.to_string()))?;
                tokio::fs::try_exists(&path)
                    .await
                    .map_err(|source| RepositoryError::Io { path, source })
            }
            "http" | "https" => {
                let response = self.http.head(location.clone()).send().await?;
                let status = response.status();
                if status.is_success() {
                    return Ok(true);
                }
                if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
                    return Ok(false);
                }
                Err(RepositoryError::Http {
                    status: status.as_u16(),
                    url: location.clone(),
                })
            }
            other => Err(RepositoryError::InvalidLocation(format!(
                "unsupported scheme '{}' in {}",
                other, location
            ))),
        }
    }
}

#[async_trait]
impl BinaryRepository for MavenBinaryRepository {
    async fn binary_uri(&self, binary: &BinaryCoordinate) -> Result<Option<Url>, RepositoryError> {
        debug!(%binary, "MavenBinaryRepository::binary_uri: called");
        let mut last_error = None;
        let mut missed = false;

        for base in &self.bases {
            let location = Self::location(base, binary)?;
            match self.exists(&location).await {
                Ok(true) => return Ok(Some(location)),
                Ok(false) => missed = true,
                Err(e) => {
                    warn!(%base, error = %e, "Binary repository base failed, trying next");
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if !missed => Err(e),
            _ => Ok(None),
        }
    }
}

/// `Url::join` replaces the last segment unless the base ends with `/`
pub(crate) fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
