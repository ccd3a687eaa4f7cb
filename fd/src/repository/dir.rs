//! Directory-backed config repository
//!
//! Config for `@env:component[:pool]:version` lives in
//! `<root>/env/component/[pool/]version/`. Every regular file below that
//! directory becomes one entry, keyed by its `/`-separated relative path.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info};
use url::Url;
use walkdir::WalkDir;

use super::{ConfigRepository, RepositoryError};
use crate::domain::{ConfigCoordinate, ConfigMap};

/// Config tier rooted at a local directory
#[derive(Debug, Clone)]
pub struct DirConfigRepository {
    name: String,
    root: PathBuf,
    git: bool,
}

impl DirConfigRepository {
    /// Plain directory, used for local overrides
    pub fn local(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        debug!(root = %root.display(), "DirConfigRepository::local: called");
        Self {
            name: "local".to_string(),
            root,
            git: false,
        }
    }

    /// Directory that is a git checkout, refreshed with `git pull`
    pub fn git(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        debug!(root = %root.display(), "DirConfigRepository::git: called");
        Self {
            name: "git".to_string(),
            root,
            git: true,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Fast-forward the checkout to its upstream
    ///
    /// No-op for plain directories.
    pub async fn refresh(&self) -> Result<(), RepositoryError> {
        debug!(root = %self.root.display(), git = self.git, "DirConfigRepository::refresh: called");
        if !self.git {
            return Ok(());
        }

        let output = Command::new("git")
            .args(["pull", "--ff-only", "--quiet"])
            .current_dir(&self.root)
            .output()
            .await
            .map_err(|e| RepositoryError::Git(e.to_string()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(RepositoryError::Git(stderr.trim().to_string()));
        }

        info!(root = %self.root.display(), "Refreshed git config repository");
        Ok(())
    }

    fn config_dir(&self, config: &ConfigCoordinate) -> PathBuf {
        config
            .path_segments()
            .into_iter()
            .fold(self.root.clone(), |dir, segment| dir.join(segment))
    }
}

#[async_trait]
impl ConfigRepository for DirConfigRepository {
    fn name(&self) -> &str {
        &self.name
    }

    async fn config_map(&self, config: &ConfigCoordinate) -> Result<Option<ConfigMap>, RepositoryError> {
        let dir = self.config_dir(config);
        debug!(%config, dir = %dir.display(), "DirConfigRepository::config_map: called");

        if !dir.is_dir() {
            debug!("DirConfigRepository::config_map: no such directory");
            return Ok(None);
        }

        let dir = dir.canonicalize().map_err(|source| RepositoryError::Io {
            path: dir.clone(),
            source,
        })?;

        read_tree(&dir).map(Some)
    }
}

/// Map every regular file below `dir` to a `file://` URL
fn read_tree(dir: &Path) -> Result<ConfigMap, RepositoryError> {
    let mut files = ConfigMap::new();

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !e.file_name().to_string_lossy().starts_with('.'));

    for entry in walker {
        let entry = entry.map_err(|e| RepositoryError::Io {
            path: e.path().map(Path::to_path_buf).unwrap_or_else(|| dir.to_path_buf()),
            source: e.into(),
        })?;
        if !entry.file_type().is_file() {
            continue;
        }

        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| RepositoryError::InvalidLocation(e.to_string()))?;
        let key = relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let location = Url::from_file_path(entry.path())
            .map_err(|_| RepositoryError::InvalidLocation(entry.path().display().to_string()))?;

        files.insert(key, location);
    }

    debug!(count = files.len(), "read_tree: collected files");
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(root: &Path, relative: &str, body: &str) {
        let path = root.join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    #[tokio::test]
    async fn test_reads_all_files_below_version_dir() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "prod/apple/1.0/config.properties", "a=1");
        write(temp.path(), "prod/apple/1.0/etc/jvm.config", "-Xmx1g");
        write(temp.path(), "prod/apple/2.0/config.properties", "a=2");

        let repo = DirConfigRepository::local(temp.path());
        let config: ConfigCoordinate = "@prod:apple:1.0".parse().unwrap();
        let files = repo.config_map(&config).await.unwrap().unwrap();

        let keys: Vec<&str> = files.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["config.properties", "etc/jvm.config"]);
        for location in files.values() {
            assert_eq!(location.scheme(), "file");
        }
        assert!(files["etc/jvm.config"].path().ends_with("/prod/apple/1.0/etc/jvm.config"));
    }

    #[tokio::test]
    async fn test_pool_is_a_path_segment() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "prod/apple/east/1.0/config.properties", "a=1");

        let repo = DirConfigRepository::local(temp.path());
        let pooled: ConfigCoordinate = "@prod:apple:east:1.0".parse().unwrap();
        let unpooled: ConfigCoordinate = "@prod:apple:1.0".parse().unwrap();

        assert_eq!(repo.config_map(&pooled).await.unwrap().unwrap().len(), 1);
        assert!(repo.config_map(&unpooled).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_missing_dir_is_not_found() {
        let temp = TempDir::new().unwrap();
        let repo = DirConfigRepository::local(temp.path().join("nowhere"));
        let config: ConfigCoordinate = "@prod:apple:1.0".parse().unwrap();
        assert!(repo.config_map(&config).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty_dir_is_an_empty_config() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("prod/apple/1.0")).unwrap();

        let repo = DirConfigRepository::local(temp.path());
        let config: ConfigCoordinate = "@prod:apple:1.0".parse().unwrap();
        assert_eq!(repo.config_map(&config).await.unwrap(), Some(ConfigMap::new()));
    }

    #[tokio::test]
    async fn test_hidden_entries_are_skipped() {
        let temp = TempDir::new().unwrap();
        write(temp.path(), "prod/apple/1.0/config.properties", "a=1");
        write(temp.path(), "prod/apple/1.0/.swp", "junk");

        let repo = DirConfigRepository::local(temp.path());
        let config: ConfigCoordinate = "@prod:apple:1.0".parse().unwrap();
        assert_eq!(repo.config_map(&config).await.unwrap().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_refresh_is_noop_for_local() {
        let temp = TempDir::new().unwrap();
        let repo = DirConfigRepository::local(temp.path());
        assert!(repo.refresh().await.is_ok());
        assert_eq!(repo.name(), "local");
        assert_eq!(DirConfigRepository::git(temp.path()).name(), "git");
    }
}
