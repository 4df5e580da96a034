//! Timer policies and the precise-to-inexact fallback ladder.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::backend::{TimerBackend, TimerHandle};
use crate::error::TimerError;
use crate::model::TargetId;

/// How precisely an armed timer honours its instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Precise,
    Inexact,
}

/// Result of a successful `schedule_once`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmedTimer {
    pub handle: TimerHandle,
    /// Instant actually programmed, after any rounding.
    pub fire_at: DateTime<Utc>,
    pub precision: Precision,
}

/// One-shot wake-up capability.
pub trait WakeTimer: Send + Sync {
    fn schedule_once(&self, at: DateTime<Utc>, target: &TargetId) -> Result<ArmedTimer, TimerError>;

    fn cancel(&self, handle: TimerHandle);
}

/// Capability probe consulted on every schedule call.
pub trait TimerPermissions: Send + Sync {
    fn precise_allowed(&self) -> bool;
}

/// Shared, revocable grant for precise timers.
#[derive(Debug, Clone)]
pub struct PreciseGrant(Arc<AtomicBool>);

impl PreciseGrant {
    pub fn new(granted: bool) -> Self {
        Self(Arc::new(AtomicBool::new(granted)))
    }

    pub fn set(&self, granted: bool) {
        self.0.store(granted, Ordering::SeqCst);
    }

    pub fn revoke(&self) {
        self.set(false);
    }

    pub fn is_granted(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl TimerPermissions for PreciseGrant {
    fn precise_allowed(&self) -> bool {
        self.is_granted()
    }
}

/// Fires exactly at the requested instant, while permitted.
pub struct PreciseTimer {
    backend: Arc<dyn TimerBackend>,
    permissions: Arc<dyn TimerPermissions>,
}

impl PreciseTimer {
    pub fn new(backend: Arc<dyn TimerBackend>, permissions: Arc<dyn TimerPermissions>) -> Self {
        Self {
            backend,
            permissions,
        }
    }
}

impl WakeTimer for PreciseTimer {
    fn schedule_once(&self, at: DateTime<Utc>, target: &TargetId) -> Result<ArmedTimer, TimerError> {
        // The grant can disappear between the probe and this call.
        if !self.permissions.precise_allowed() {
            return Err(TimerError::PermissionDenied);
        }
        let handle = self.backend.arm(at, target.clone())?;
        Ok(ArmedTimer {
            handle,
            fire_at: at,
            precision: Precision::Precise,
        })
    }

    fn cancel(&self, handle: TimerHandle) {
        self.backend.disarm(handle);
    }
}

/// Fires at the end of the coalescing window containing the instant.
pub struct InexactTimer {
    backend: Arc<dyn TimerBackend>,
    window: Duration,
}

impl InexactTimer {
    pub fn new(backend: Arc<dyn TimerBackend>, window: Duration) -> Self {
        Self { backend, window }
    }

    /// Round `at` up to the next multiple of the window. Never earlier than `at`.
    pub fn round_up(&self, at: DateTime<Utc>) -> DateTime<Utc> {
        let window = self.window.num_seconds().max(1);
        let secs = at.timestamp();
        let mut slot = secs.div_euclid(window);
        if secs.rem_euclid(window) != 0 || at.timestamp_subsec_nanos() > 0 {
            slot += 1;
        }
        DateTime::from_timestamp(slot * window, 0).unwrap_or(at)
    }
}

impl WakeTimer for InexactTimer {
    fn schedule_once(&self, at: DateTime<Utc>, target: &TargetId) -> Result<ArmedTimer, TimerError> {
        let fire_at = self.round_up(at);
        let handle = self.backend.arm(fire_at, target.clone())?;
        Ok(ArmedTimer {
            handle,
            fire_at,
            precision: Precision::Inexact,
        })
    }

    fn cancel(&self, handle: TimerHandle) {
        self.backend.disarm(handle);
    }
}

/// Precise when permitted, inexact otherwise.
///
/// Falls back on `PermissionDenied` only; any other failure of the precise
/// rung is returned as is.
pub struct TimerLadder {
    precise: PreciseTimer,
    inexact: InexactTimer,
    permissions: Arc<dyn TimerPermissions>,
}

impl TimerLadder {
    pub fn new(
        backend: Arc<dyn TimerBackend>,
        permissions: Arc<dyn TimerPermissions>,
        inexact_window: Duration,
    ) -> Self {
        Self {
            precise: PreciseTimer::new(Arc::clone(&backend), Arc::clone(&permissions)),
            inexact: InexactTimer::new(backend, inexact_window),
            permissions,
        }
    }
}

impl WakeTimer for TimerLadder {
    fn schedule_once(&self, at: DateTime<Utc>, target: &TargetId) -> Result<ArmedTimer, TimerError> {
        if self.permissions.precise_allowed() {
            match self.precise.schedule_once(at, target) {
                Err(TimerError::PermissionDenied) => {
                    tracing::debug!(target_id = %target, "precise timer denied, using inexact");
                }
                other => return other,
            }
        }
        self.inexact.schedule_once(at, target)
    }

    fn cancel(&self, handle: TimerHandle) {
        // Both rungs share one backend.
        self.precise.cancel(handle);
    }
}
