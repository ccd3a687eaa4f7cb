//! Binary and config repositories
//!
//! A repository answers one lookup with either a complete result or an
//! explicit `Ok(None)`. `Err` is reserved for I/O failures of the repository
//! itself.

mod dir;
mod fixed;
mod http;
mod maven;

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use crate::domain::{BinaryCoordinate, ConfigCoordinate, ConfigMap};

pub use dir::DirConfigRepository;
pub use fixed::{StaticBinaryRepository, StaticConfigRepository};
pub use http::HttpConfigRepository;
pub use maven::MavenBinaryRepository;

/// Errors from a single repository
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: Url },

    #[error("Invalid manifest at {url}: {reason}")]
    InvalidManifest { url: Url, reason: String },

    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    #[error("Git command failed: {0}")]
    Git(String),
}

/// Single authoritative source of binary locations
#[async_trait]
pub trait BinaryRepository: Send + Sync {
    /// Location of the binary, or `None` when the repository does not know it
    async fn binary_uri(&self, binary: &BinaryCoordinate) -> Result<Option<Url>, RepositoryError>;
}

/// One tier of the config resolution chain
#[async_trait]
pub trait ConfigRepository: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    /// Complete file map for the config, or `None` when this tier lacks it
    ///
    /// Implementations never return a partial map.
    async fn config_map(&self, config: &ConfigCoordinate) -> Result<Option<ConfigMap>, RepositoryError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing::debug;

    /// Config tier with a fixed answer that counts lookups
    pub struct MockConfigRepository {
        name: String,
        answer: Option<ConfigMap>,
        fail: bool,
        call_count: AtomicUsize,
    }

    impl MockConfigRepository {
        pub fn found(name: &str, answer: ConfigMap) -> Self {
            Self {
                name: name.to_string(),
                answer: Some(answer),
                fail: false,
                call_count: AtomicUsize::new(0),
            }
        }

        pub fn missing(name: &str) -> Self {
            Self {
                name: name.to_string(),
                answer: None,
                fail: false,
                call_count: AtomicUsize::new(0),
            }
        }

        pub fn failing(name: &str) -> Self {
            Self {
                name: name.to_string(),
                answer: None,
                fail: true,
                call_count: AtomicUsize::new(0),
            }
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ConfigRepository for MockConfigRepository {
        fn name(&self) -> &str {
            &self.name
        }

        async fn config_map(&self, config: &ConfigCoordinate) -> Result<Option<ConfigMap>, RepositoryError> {
            debug!(%config, name = %self.name, "MockConfigRepository::config_map: called");
            self.call_count.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(RepositoryError::InvalidLocation("mock failure".to_string()));
            }
            Ok(self.answer.clone())
        }
    }

    /// Binary repository with a fixed answer that counts lookups
    pub struct MockBinaryRepository {
        answer: Option<Url>,
        call_count: AtomicUsize,
    }

    impl MockBinaryRepository {
        pub fn new(answer: Option<Url>) -> Self {
            Self {
                answer,
                call_count: AtomicUsize::new(0),
            }
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl BinaryRepository for MockBinaryRepository {
        async fn binary_uri(&self, binary: &BinaryCoordinate) -> Result<Option<Url>, RepositoryError> {
            debug!(%binary, "MockBinaryRepository::binary_uri: called");
            self.call_count.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer.clone())
        }
    }
}
