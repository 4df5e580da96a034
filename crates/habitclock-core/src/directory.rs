//! Display labels for targets.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::error::ConfigError;
use crate::model::TargetId;
use crate::storage::Config;

/// Resolves a target to a human-readable label. Display only.
pub trait TargetDirectory: Send + Sync {
    fn label(&self, target: &TargetId) -> Option<String>;
}

/// Fixed label table.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    labels: BTreeMap<String, String>,
}

impl StaticDirectory {
    pub fn new(labels: BTreeMap<String, String>) -> Self {
        Self { labels }
    }

    /// Labels from the `[labels]` table of the config file.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.labels.clone())
    }

    pub fn insert(&mut self, target: &TargetId, label: impl Into<String>) {
        self.labels.insert(target.to_string(), label.into());
    }
}

impl TargetDirectory for StaticDirectory {
    fn label(&self, target: &TargetId) -> Option<String> {
        self.labels.get(target.as_str()).cloned()
    }
}

/// Labels from the `[labels]` table of a config file that other processes
/// may rewrite. [`reload`](Self::reload) picks up their edits.
#[derive(Debug)]
pub struct ConfigDirectory {
    path: PathBuf,
    labels: RwLock<BTreeMap<String, String>>,
}

impl ConfigDirectory {
    /// Directory over the default config file.
    pub fn open() -> Result<Self, ConfigError> {
        Self::at(Config::path()?)
    }

    pub fn at(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let dir = Self {
            path: path.into(),
            labels: RwLock::default(),
        };
        dir.reload()?;
        Ok(dir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Re-read the labels. On error the previous labels stay in place.
    pub fn reload(&self) -> Result<(), ConfigError> {
        let config = Config::load_from(&self.path)?;
        let mut labels = self.labels.write().unwrap_or_else(|e| e.into_inner());
        if *labels != config.labels {
            tracing::debug!(count = config.labels.len(), "target labels reloaded");
            *labels = config.labels;
        }
        Ok(())
    }
}

impl TargetDirectory for ConfigDirectory {
    fn label(&self, target: &TargetId) -> Option<String> {
        self.labels
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(target.as_str())
            .cloned()
    }
}
