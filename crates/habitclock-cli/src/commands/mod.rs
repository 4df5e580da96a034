pub mod config;
pub mod daemon;
pub mod settings;
pub mod status;
pub mod target;

use habitclock_core::{SqliteStore, StateStore, StoreError, TargetId, ValidationError};

pub type CmdResult = Result<(), Box<dyn std::error::Error>>;

/// clap value parser for target ids.
pub fn parse_target(s: &str) -> Result<TargetId, ValidationError> {
    TargetId::new(s)
}

pub fn open_store() -> Result<SqliteStore, StoreError> {
    SqliteStore::open()
}

/// Fails unless `target` is in the tracked set.
pub fn require_tracked(store: &dyn StateStore, target: &TargetId) -> CmdResult {
    if store.load_settings()?.is_tracked(target) {
        Ok(())
    } else {
        Err(ValidationError::UnknownTarget(target.to_string()).into())
    }
}

pub fn print_json<T: serde::Serialize>(value: &T) -> CmdResult {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
