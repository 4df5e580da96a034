//! Core error types for habitclock-core.
//!
//! This module defines the error hierarchy using thiserror. Only two
//! families ever reach a caller of the engine: store failures and timer
//! failures that survived the fallback ladder. Stale wake-ups are not
//! errors at all (see [`crate::handler::WakeOutcome`]).

use std::path::PathBuf;
use thiserror::Error;

/// Core error type for habitclock-core.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Persistence failures
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Timer facility failures that no fallback could absorb
    #[error("Timer error: {0}")]
    Timer(#[from] TimerError),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Validation errors
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A blocking worker panicked or was cancelled
    #[error("Background task failed: {0}")]
    Task(String),
}

/// State store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open the backing database
    #[error("Failed to open store at {path}: {source}")]
    OpenFailed {
        path: PathBuf,
        #[source]
        source: rusqlite::Error,
    },

    /// Persistence I/O failure; callers treat this as a failed operation
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Database is locked by another writer
    #[error("Store is locked")]
    Locked,

    /// A persisted value could not be decoded
    #[error("Corrupt value for '{key}': {message}")]
    Corrupt { key: String, message: String },

    /// Schema migration failed
    #[error("Store migration failed: {0}")]
    MigrationFailed(String),
}

/// Timer facility errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TimerError {
    /// Precise timers are not permitted right now
    #[error("precise timer permission denied")]
    PermissionDenied,

    /// The facility cannot accept new timers (runtime gone, channel closed)
    #[error("timer facility unavailable: {0}")]
    Unavailable(String),
}

/// The notification surface refused or failed to show a reminder.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("notification failed: {0}")]
pub struct PresentError(pub String);

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to load configuration
    #[error("Failed to load configuration from {path}: {message}")]
    LoadFailed { path: PathBuf, message: String },

    /// Failed to save configuration
    #[error("Failed to save configuration to {path}: {message}")]
    SaveFailed { path: PathBuf, message: String },

    /// Unknown dotted key
    #[error("unknown config key: {0}")]
    UnknownKey(String),

    /// Invalid configuration value
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidValue { key: String, message: String },

    /// Data directory could not be resolved or created
    #[error("Failed to access data directory: {0}")]
    DataDir(String),
}

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    /// Reset time text is not `HH:MM`
    #[error("Invalid reset time '{0}': expected HH:MM")]
    InvalidResetTime(String),

    /// Target identifier is empty or whitespace
    #[error("Target id must not be empty")]
    EmptyTargetId,

    /// Target is not in the tracked set
    #[error("Target '{0}' is not tracked")]
    UnknownTarget(String),

    /// Invalid value
    #[error("Invalid value for '{field}': {message}")]
    InvalidValue { field: String, message: String },
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::SqliteFailure(e, _msg) => {
                if e.code == rusqlite::ErrorCode::DatabaseLocked
                    || e.code == rusqlite::ErrorCode::DatabaseBusy
                {
                    StoreError::Locked
                } else {
                    StoreError::Unavailable(err.to_string())
                }
            }
            _ => StoreError::Unavailable(err.to_string()),
        }
    }
}

impl From<rusqlite::Error> for CoreError {
    fn from(err: rusqlite::Error) -> Self {
        CoreError::Store(err.into())
    }
}

/// Result type alias for CoreError
pub type Result<T, E = CoreError> = std::result::Result<T, E>;
