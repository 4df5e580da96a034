use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};

use super::backend::{TimerBackend, TimerHandle, WakeUp};
use crate::error::TimerError;
use crate::model::TargetId;

/// Backend that only records armed timers.
///
/// Nothing fires on its own: callers pull due wake-ups with
/// [`ManualBackend::take_due`] and hand them to the engine, which makes
/// time fully controllable in tests and simulations.
#[derive(Debug, Default)]
pub struct ManualBackend {
    armed: Mutex<Vec<WakeUp>>,
    unavailable: AtomicBool,
}

impl ManualBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<WakeUp>> {
        self.armed.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// All armed timers, earliest first.
    pub fn armed(&self) -> Vec<WakeUp> {
        let mut armed = self.lock().clone();
        armed.sort_by_key(|w| w.fire_at);
        armed
    }

    pub fn armed_for(&self, target: &TargetId) -> Vec<WakeUp> {
        self.armed()
            .into_iter()
            .filter(|w| &w.target == target)
            .collect()
    }

    /// Remove and return every timer due at `now`, earliest first.
    pub fn take_due(&self, now: DateTime<Utc>) -> Vec<WakeUp> {
        let mut armed = self.lock();
        let (mut due, rest): (Vec<_>, Vec<_>) = armed.drain(..).partition(|w| w.fire_at <= now);
        *armed = rest;
        due.sort_by_key(|w| w.fire_at);
        due
    }

    /// Make every subsequent `arm` fail.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

impl TimerBackend for ManualBackend {
    fn arm(&self, at: DateTime<Utc>, target: TargetId) -> Result<TimerHandle, TimerError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(TimerError::Unavailable("manual backend disabled".into()));
        }
        let handle = TimerHandle::new();
        self.lock().push(WakeUp {
            target,
            handle,
            fire_at: at,
        });
        Ok(handle)
    }

    fn disarm(&self, handle: TimerHandle) {
        self.lock().retain(|w| w.handle != handle);
    }
}
