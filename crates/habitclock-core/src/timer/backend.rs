use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TimerError;
use crate::model::TargetId;

/// Opaque handle of one armed timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimerHandle(Uuid);

impl TimerHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TimerHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TimerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Message delivered when a timer fires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WakeUp {
    pub target: TargetId,
    pub handle: TimerHandle,
    /// Instant the timer was armed for.
    pub fire_at: DateTime<Utc>,
}

/// One-shot timer mechanism.
///
/// Delivery happens at or after `at`. A backend may drop a timer silently
/// (process exit); callers never rely on guaranteed delivery.
pub trait TimerBackend: Send + Sync {
    fn arm(&self, at: DateTime<Utc>, target: TargetId) -> Result<TimerHandle, TimerError>;

    /// No-op for unknown or already fired handles.
    fn disarm(&self, handle: TimerHandle);
}
