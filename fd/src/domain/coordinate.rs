//! Binary and config coordinates
//!
//! A binary coordinate names an artifact in Maven style:
//! `groupId:artifactId[:packaging[:classifier]]:version`.
//! A config coordinate names a config set: `@environment:component[:pool]:version`.
//! Both parse from and render back to their string form, which is also
//! their wire form.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Packaging assumed when a binary coordinate does not name one
pub const DEFAULT_PACKAGING: &str = "tar.gz";

/// Errors from parsing coordinates
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoordinateError {
    #[error("Malformed binary coordinate '{value}': {reason}")]
    Binary { value: String, reason: String },

    #[error("Malformed config coordinate '{value}': {reason}")]
    Config { value: String, reason: String },
}

/// Maven-style artifact coordinate
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BinaryCoordinate {
    pub group_id: String,
    pub artifact_id: String,
    pub packaging: String,
    pub classifier: Option<String>,
    pub version: String,
}

impl BinaryCoordinate {
    /// Artifact file name in Maven layout, e.g. `apple-1.0.tar.gz`
    pub fn file_name(&self) -> String {
        match &self.classifier {
            Some(classifier) => format!(
                "{}-{}-{}.{}",
                self.artifact_id, self.version, classifier, self.packaging
            ),
            None => format!("{}-{}.{}", self.artifact_id, self.version, self.packaging),
        }
    }

    /// Relative path of the artifact in Maven layout
    pub fn repository_path(&self) -> String {
        format!(
            "{}/{}/{}/{}",
            self.group_id.replace('.', "/"),
            self.artifact_id,
            self.version,
            self.file_name()
        )
    }
}

impl FromStr for BinaryCoordinate {
    type Err = CoordinateError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let malformed = |reason: &str| CoordinateError::Binary {
            value: value.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = value.trim().split(':').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(malformed("empty component"));
        }
        // Components are joined into a repository URL path
        if parts
            .iter()
            .any(|p| *p == "." || *p == ".." || p.contains(['/', '\\', '?', '#', '%']))
        {
            return Err(malformed("components must not contain path or URL delimiters"));
        }
        if parts[0].split('.').any(str::is_empty) {
            return Err(malformed("group id has an empty segment"));
        }

        let (group_id, artifact_id, packaging, classifier, version) = match parts.as_slice() {
            [g, a, v] => (*g, *a, DEFAULT_PACKAGING, None, *v),
            [g, a, p, v] => (*g, *a, *p, None, *v),
            [g, a, p, c, v] => (*g, *a, *p, Some(*c), *v),
            _ => return Err(malformed("expected 3 to 5 ':'-separated components")),
        };

        Ok(Self {
            group_id: group_id.to_string(),
            artifact_id: artifact_id.to_string(),
            packaging: packaging.to_string(),
            classifier: classifier.map(str::to_string),
            version: version.to_string(),
        })
    }
}

impl std::fmt::Display for BinaryCoordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.classifier {
            Some(classifier) => write!(
                f,
                "{}:{}:{}:{}:{}",
                self.group_id, self.artifact_id, self.packaging, classifier, self.version
            ),
            None if self.packaging == DEFAULT_PACKAGING => {
                write!(f, "{}:{}:{}", self.group_id, self.artifact_id, self.version)
            }
            None => write!(
                f,
                "{}:{}:{}:{}",
                self.group_id, self.artifact_id, self.packaging, self.version
            ),
        }
    }
}

impl TryFrom<String> for BinaryCoordinate {
    type Error = CoordinateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<BinaryCoordinate> for String {
    fn from(coordinate: BinaryCoordinate) -> Self {
        coordinate.to_string()
    }
}

/// Config set coordinate
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ConfigCoordinate {
    pub environment: String,
    pub component: String,
    pub pool: Option<String>,
    pub version: String,
}

impl ConfigCoordinate {
    /// Path segments below a repository root: env/component[/pool]/version
    pub fn path_segments(&self) -> Vec<&str> {
        let mut segments = vec![self.environment.as_str(), self.component.as_str()];
        if let Some(pool) = &self.pool {
            segments.push(pool.as_str());
        }
        segments.push(self.version.as_str());
        segments
    }
}

impl FromStr for ConfigCoordinate {
    type Err = CoordinateError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let malformed = |reason: &str| CoordinateError::Config {
            value: value.to_string(),
            reason: reason.to_string(),
        };

        let body = value
            .trim()
            .strip_prefix('@')
            .ok_or_else(|| malformed("must start with '@'"))?;

        let parts: Vec<&str> = body.split(':').collect();
        if parts.iter().any(|p| p.is_empty()) {
            return Err(malformed("empty component"));
        }
        // Segments become directory names in file-backed repositories
        if parts.iter().any(|p| *p == "." || *p == ".." || p.contains('/')) {
            return Err(malformed("components must not contain path separators"));
        }

        let (environment, component, pool, version) = match parts.as_slice() {
            [e, c, v] => (*e, *c, None, *v),
            [e, c, p, v] => (*e, *c, Some(*p), *v),
            _ => return Err(malformed("expected 3 or 4 ':'-separated components")),
        };

        Ok(Self {
            environment: environment.to_string(),
            component: component.to_string(),
            pool: pool.map(str::to_string),
            version: version.to_string(),
        })
    }
}

impl std::fmt::Display for ConfigCoordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.pool {
            Some(pool) => write!(
                f,
                "@{}:{}:{}:{}",
                self.environment, self.component, pool, self.version
            ),
            None => write!(f, "@{}:{}:{}", self.environment, self.component, self.version),
        }
    }
}

impl TryFrom<String> for ConfigCoordinate {
    type Error = CoordinateError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ConfigCoordinate> for String {
    fn from(coordinate: ConfigCoordinate) -> Self {
        coordinate.to_string()
    }
}
