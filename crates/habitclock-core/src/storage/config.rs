//! TOML-based application configuration.
//!
//! Stores engine tunables that are not part of the persisted state:
//! - Minimum-delay floors used when arming timers
//! - Timer facility behavior (precise grant, inexact window)
//! - Notification presentation
//! - Daemon polling intervals
//! - Log level
//! - Display labels for targets
//!
//! Configuration is stored at `~/.config/habitclock/config.toml`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::data_dir;
use crate::engine::EngineOptions;
use crate::error::ConfigError;
use crate::model::TargetId;

/// Engine tunables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Floor applied when re-arming after a wake-up.
    #[serde(default = "default_min_delay_secs")]
    pub rearm_min_delay_secs: u64,
    /// Floor applied after user transitions and reconciles.
    #[serde(default = "default_min_delay_secs")]
    pub min_delay_secs: u64,
}

/// Timer facility configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimerConfig {
    /// Whether precise timers are permitted.
    #[serde(default = "default_true")]
    pub precise: bool,
    /// Coalescing window of the inexact fallback.
    #[serde(default = "default_inexact_window_secs")]
    pub inexact_window_secs: u64,
}

/// Notification configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// Show desktop notifications; when false reminders only go to the log.
    #[serde(default = "default_true")]
    pub desktop: bool,
    #[serde(default = "default_title")]
    pub title: String,
}

/// Daemon loop configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// How often to check the store for commits from other processes.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Unconditional full reconcile period.
    #[serde(default = "default_resync_interval_secs")]
    pub resync_interval_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// Application configuration.
///
/// Serialized to/from TOML at `~/.config/habitclock/config.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub timer: TimerConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub log: LogConfig,
    /// Display labels keyed by target id.
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
}

// Default functions
fn default_min_delay_secs() -> u64 {
    10
}
fn default_true() -> bool {
    true
}
fn default_inexact_window_secs() -> u64 {
    600
}
fn default_title() -> String {
    "Habit Reminder".into()
}
fn default_poll_interval_secs() -> u64 {
    5
}
fn default_resync_interval_secs() -> u64 {
    900
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rearm_min_delay_secs: default_min_delay_secs(),
            min_delay_secs: default_min_delay_secs(),
        }
    }
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            precise: true,
            inexact_window_secs: default_inexact_window_secs(),
        }
    }
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            desktop: true,
            title: default_title(),
        }
    }
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            resync_interval_secs: default_resync_interval_secs(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            timer: TimerConfig::default(),
            notifications: NotificationsConfig::default(),
            daemon: DaemonConfig::default(),
            log: LogConfig::default(),
            labels: BTreeMap::new(),
        }
    }
}

impl Config {
    fn get_json_value_by_path<'a>(
        root: &'a serde_json::Value,
        key: &str,
    ) -> Option<&'a serde_json::Value> {
        if key.is_empty() {
            return None;
        }

        let mut current = root;
        for part in key.split('.') {
            current = current.get(part)?;
        }
        Some(current)
    }

    fn set_json_value_by_path(
        root: &mut serde_json::Value,
        key: &str,
        value: &str,
    ) -> Result<(), ConfigError> {
        let invalid = |message: String| ConfigError::InvalidValue {
            key: key.to_string(),
            message,
        };

        let mut parts = key.split('.').peekable();
        if key.is_empty() {
            return Err(ConfigError::UnknownKey(key.to_string()));
        }

        let mut current = root;
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                let obj = current
                    .as_object_mut()
                    .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;

                // Labels are an open map; any other leaf must already exist.
                let new_value = match obj.get(part) {
                    Some(serde_json::Value::Bool(_)) => serde_json::Value::Bool(
                        value.parse::<bool>().map_err(|e| invalid(e.to_string()))?,
                    ),
                    Some(serde_json::Value::Number(_)) => value
                        .parse::<u64>()
                        .map(|n| serde_json::Value::Number(n.into()))
                        .map_err(|_| invalid(format!("cannot parse '{value}' as number")))?,
                    Some(serde_json::Value::Object(_)) | Some(serde_json::Value::Array(_)) => {
                        serde_json::from_str(value).map_err(|e| invalid(e.to_string()))?
                    }
                    Some(_) => serde_json::Value::String(value.into()),
                    None if key.starts_with("labels.") => serde_json::Value::String(value.into()),
                    None => return Err(ConfigError::UnknownKey(key.to_string())),
                };

                obj.insert(part.to_string(), new_value);
                return Ok(());
            }

            current = current
                .get_mut(part)
                .ok_or_else(|| ConfigError::UnknownKey(key.to_string()))?;
        }

        Err(ConfigError::UnknownKey(key.to_string()))
    }

    /// Path of the config file inside the data directory.
    pub fn path() -> Result<PathBuf, ConfigError> {
        Ok(data_dir()?.join("config.toml"))
    }

    /// Load from disk, writing the defaults if the file is missing.
    ///
    /// # Errors
    ///
    /// Returns an error if the config file exists but cannot be parsed,
    /// or if the default config cannot be written to disk.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::path()?)
    }

    /// Load from an explicit path, writing the defaults if it is missing.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(content) => toml::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let cfg = Self::default();
                cfg.save_to(path)?;
                Ok(cfg)
            }
            Err(e) => Err(ConfigError::LoadFailed {
                path: path.to_path_buf(),
                message: e.to_string(),
            }),
        }
    }

    /// Load from disk, returning default on error.
    pub fn load_or_default() -> Self {
        Self::load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "falling back to default configuration");
            Self::default()
        })
    }

    /// Persist to disk.
    ///
    /// # Errors
    ///
    /// Returns an error if the config cannot be serialized or written to disk.
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |message: String| ConfigError::SaveFailed {
            path: path.to_path_buf(),
            message,
        };
        let content = toml::to_string_pretty(self).map_err(|e| save_failed(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| save_failed(e.to_string()))
    }

    /// Get a config value as string by dot-separated key.
    pub fn get(&self, key: &str) -> Option<String> {
        let json = serde_json::to_value(self).ok()?;
        let val = Self::get_json_value_by_path(&json, key)?;
        match val {
            serde_json::Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    /// Set a config value by key without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if the key is unknown or the value cannot be parsed.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let mut json = serde_json::to_value(&*self).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Self::set_json_value_by_path(&mut json, key, value)?;
        *self = serde_json::from_value(json).map_err(|e| ConfigError::InvalidValue {
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(())
    }

    /// Set or clear the display label of a target.
    pub fn set_label(&mut self, target: &TargetId, label: Option<&str>) {
        match label.map(str::trim).filter(|l| !l.is_empty()) {
            Some(label) => {
                self.labels.insert(target.to_string(), label.to_string());
            }
            None => {
                self.labels.remove(target.as_str());
            }
        }
    }

    /// Engine options derived from the `[engine]` and `[notifications]` sections.
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            rearm_min_delay: chrono::Duration::seconds(self.engine.rearm_min_delay_secs as i64),
            min_delay: chrono::Duration::seconds(self.engine.min_delay_secs as i64),
            reminder_title: self.notifications.title.clone(),
        }
    }

    pub fn inexact_window(&self) -> Duration {
        Duration::from_secs(self.timer.inexact_window_secs.max(1))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.daemon.poll_interval_secs.max(1))
    }

    pub fn resync_interval(&self) -> Duration {
        Duration::from_secs(self.daemon.resync_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_roundtrip() {
        let cfg = Config::default();
        let toml_str = toml::to_string_pretty(&cfg).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn partial_file_fills_defaults() {
        let parsed: Config = toml::from_str("[timer]\nprecise = false\n").unwrap();
        assert!(!parsed.timer.precise);
        assert_eq!(parsed.timer.inexact_window_secs, 600);
        assert_eq!(parsed.engine.rearm_min_delay_secs, 10);
        assert_eq!(parsed.notifications.title, "Habit Reminder");
    }

    #[test]
    fn get_supports_dot_path_keys() {
        let cfg = Config::default();
        assert_eq!(cfg.get("timer.precise").as_deref(), Some("true"));
        assert_eq!(cfg.get("daemon.poll_interval_secs").as_deref(), Some("5"));
        assert_eq!(cfg.get("notifications.title").as_deref(), Some("Habit Reminder"));
        assert!(cfg.get("timer.missing_key").is_none());
        assert!(cfg.get("").is_none());
    }

    #[test]
    fn set_updates_typed_values() {
        let mut cfg = Config::default();
        cfg.set("timer.precise", "false").unwrap();
        cfg.set("engine.min_delay_secs", "30").unwrap();
        cfg.set("log.level", "debug").unwrap();
        assert!(!cfg.timer.precise);
        assert_eq!(cfg.engine.min_delay_secs, 30);
        assert_eq!(cfg.log.level, "debug");
    }

    #[test]
    fn set_rejects_unknown_key() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("timer.nonexistent", "1"),
            Err(ConfigError::UnknownKey(_))
        ));
    }

    #[test]
    fn set_rejects_invalid_type() {
        let mut cfg = Config::default();
        assert!(matches!(
            cfg.set("timer.precise", "sometimes"),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(cfg.set("daemon.poll_interval_secs", "-3").is_err());
    }

    #[test]
    fn labels_accept_new_keys() {
        let mut cfg = Config::default();
        cfg.set("labels.reader", "Reader").unwrap();
        assert_eq!(cfg.labels.get("reader").map(String::as_str), Some("Reader"));

        // Dotted ids go through set_label.
        assert!(cfg.set("labels.com.example", "Example").is_err());
        let dotted = TargetId::new("com.example").unwrap();
        cfg.set_label(&dotted, Some(" Example "));
        assert_eq!(cfg.labels.get("com.example").map(String::as_str), Some("Example"));

        cfg.set_label(&dotted, None);
        cfg.set_label(&TargetId::new("reader").unwrap(), Some("  "));
        assert!(cfg.labels.is_empty());
    }

    #[test]
    fn load_from_missing_file_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let cfg = Config::load_from(&path).unwrap();
        assert_eq!(cfg, Config::default());
        assert!(path.exists());

        let mut changed = cfg.clone();
        changed.set("notifications.desktop", "false").unwrap();
        changed.save_to(&path).unwrap();
        assert!(!Config::load_from(&path).unwrap().notifications.desktop);
    }

    #[test]
    fn load_from_reports_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "timer = 3").unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::LoadFailed { .. })
        ));
    }

    #[test]
    fn engine_options_follow_config() {
        let mut cfg = Config::default();
        cfg.set("engine.rearm_min_delay_secs", "15").unwrap();
        let opts = cfg.engine_options();
        assert_eq!(opts.rearm_min_delay, chrono::Duration::seconds(15));
        assert_eq!(opts.min_delay, chrono::Duration::seconds(10));
        assert_eq!(opts.reminder_title, "Habit Reminder");
    }
}
