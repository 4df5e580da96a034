//! Persistence: the state store seam, its SQLite and in-memory
//! implementations, and the TOML configuration file.

mod config;
pub mod database;
pub mod memory;
pub mod migrations;

pub use config::{
    Config, DaemonConfig, EngineConfig, LogConfig, NotificationsConfig, TimerConfig,
};
pub use database::SqliteStore;
pub use memory::MemoryStore;

use std::collections::BTreeMap;
use std::path::PathBuf;

use tokio::sync::broadcast;

use crate::error::{ConfigError, StoreError};
use crate::model::{Settings, TargetId, TargetRecord};

/// Capacity of every store's change channel.
pub(crate) const CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Namespace of a persisted change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreChange {
    /// Alerts flag or lead minutes were written.
    Settings,
    /// The tracked target set was written.
    Tracked,
    /// One target's record was written or removed.
    Target(TargetId),
    /// Another process committed to the same store.
    External,
}

/// Persisted key-value state consumed by the engine.
///
/// Every method is a single atomic operation. `update_target` is the only
/// read-modify-write primitive and implementations must run it as one
/// transaction so concurrent writers never lose updates.
pub trait StateStore: Send + Sync {
    fn load_settings(&self) -> Result<Settings, StoreError>;

    fn save_settings(&self, settings: &Settings) -> Result<(), StoreError>;

    /// Record for `id`, or the default record if none was ever written.
    fn load_target(&self, id: &TargetId) -> Result<TargetRecord, StoreError>;

    fn save_target(&self, id: &TargetId, record: &TargetRecord) -> Result<(), StoreError>;

    /// Atomically apply `apply` to the record of `id` and return the result.
    fn update_target(
        &self,
        id: &TargetId,
        apply: &mut dyn FnMut(&mut TargetRecord),
    ) -> Result<TargetRecord, StoreError>;

    fn remove_target(&self, id: &TargetId) -> Result<(), StoreError>;

    /// Every record ever written, keyed by target.
    fn load_all_targets(&self) -> Result<BTreeMap<TargetId, TargetRecord>, StoreError>;

    /// Change stream keyed by namespace.
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}

/// Returns the data directory.
///
/// `HABITCLOCK_DATA_DIR` wins when set. Otherwise `~/.config/habitclock[-dev]/`
/// based on `HABITCLOCK_ENV` (set it to `dev` for the development directory).
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf, ConfigError> {
    let dir = match std::env::var_os("HABITCLOCK_DATA_DIR") {
        Some(explicit) => PathBuf::from(explicit),
        None => {
            let base_dir = dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".config");

            let env = std::env::var("HABITCLOCK_ENV").unwrap_or_else(|_| "production".to_string());

            if env == "dev" {
                base_dir.join("habitclock-dev")
            } else {
                base_dir.join("habitclock")
            }
        }
    };

    std::fs::create_dir_all(&dir).map_err(|e| ConfigError::DataDir(format!("{}: {e}", dir.display())))?;
    Ok(dir)
}
