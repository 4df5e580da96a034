//! The scheduling engine.
//!
//! `Engine` wires the state store, the deadline scheduler, the presenter
//! and the label directory together. It owns no thread: every entry point
//! runs on the caller's thread and serializes per target through
//! [`TargetLocks`].
//!
//! The wake-up handler lives in [`crate::handler`], the reconciler and user
//! transitions in [`crate::reconciler`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::broadcast;

use crate::board::{self, BoardEntry};
use crate::cycle::{Clock, SystemClock};
use crate::directory::TargetDirectory;
use crate::error::{Result, TimerError};
use crate::events::Event;
use crate::model::{Settings, TargetId, TargetRecord};
use crate::notify::NotificationPresenter;
use crate::scheduler::{plan_wake_up, DeadlineScheduler, PendingTimer, ScheduleFrom};
use crate::storage::StateStore;
use crate::timer::WakeTimer;

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Engine tunables, usually built from [`crate::Config::engine_options`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    /// Floor for the re-arm after a wake-up.
    pub rearm_min_delay: Duration,
    /// Floor for user transitions and reconciles.
    pub min_delay: Duration,
    pub reminder_title: String,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            rearm_min_delay: Duration::seconds(10),
            min_delay: Duration::seconds(10),
            reminder_title: "Habit Reminder".into(),
        }
    }
}

/// One mutex per target.
#[derive(Debug, Default)]
pub(crate) struct TargetLocks {
    locks: Mutex<HashMap<TargetId, Arc<Mutex<()>>>>,
}

impl TargetLocks {
    fn get(&self, target: &TargetId) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(locks.entry(target.clone()).or_default())
    }
}

pub struct Engine<C: Clock = SystemClock> {
    pub(crate) store: Arc<dyn StateStore>,
    pub(crate) scheduler: DeadlineScheduler,
    pub(crate) presenter: Arc<dyn NotificationPresenter>,
    pub(crate) directory: Arc<dyn TargetDirectory>,
    pub(crate) clock: C,
    pub(crate) options: EngineOptions,
    locks: TargetLocks,
    events: broadcast::Sender<Event>,
}

impl<C: Clock> Engine<C> {
    pub fn new(
        store: Arc<dyn StateStore>,
        timer: Arc<dyn WakeTimer>,
        presenter: Arc<dyn NotificationPresenter>,
        directory: Arc<dyn TargetDirectory>,
        clock: C,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            store,
            scheduler: DeadlineScheduler::new(timer),
            presenter,
            directory,
            clock,
            options: EngineOptions::default(),
            locks: TargetLocks::default(),
            events,
        }
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn store(&self) -> &Arc<dyn StateStore> {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Engine events; lagging receivers lose the oldest ones.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Arm the target's next wake-up with cycle-aware selection.
    ///
    /// `min_delay` floors the fire time at `now + min_delay`; `None` uses
    /// [`EngineOptions::min_delay`].
    ///
    /// # Errors
    /// Fails when the target's record cannot be read or no timer rung
    /// accepted the wake-up.
    pub fn schedule_next(
        &self,
        target: &TargetId,
        settings: &Settings,
        min_delay: Option<Duration>,
    ) -> Result<PendingTimer> {
        self.schedule_with(target, settings, min_delay, ScheduleFrom::Auto)
    }

    /// Arm the wake-up of the cycle after the current one.
    pub fn schedule_from_next_cycle(
        &self,
        target: &TargetId,
        settings: &Settings,
        min_delay: Option<Duration>,
    ) -> Result<PendingTimer> {
        self.schedule_with(target, settings, min_delay, ScheduleFrom::NextCycle)
    }

    fn schedule_with(
        &self,
        target: &TargetId,
        settings: &Settings,
        min_delay: Option<Duration>,
        from: ScheduleFrom,
    ) -> Result<PendingTimer> {
        let min_delay = min_delay.unwrap_or(self.options.min_delay);
        self.serialized(target, || -> Result<PendingTimer> {
            let record = self.store.load_target(target)?;
            Ok(self.schedule_locked(target, &record, settings, min_delay, from)?)
        })
    }

    /// Cancel the target's pending timer. Returns whether one existed.
    pub fn cancel(&self, target: &TargetId) -> bool {
        self.serialized(target, || self.cancel_locked(target))
    }

    pub fn pending(&self, target: &TargetId) -> Option<PendingTimer> {
        self.scheduler.pending(target)
    }

    /// Status board for the current instant.
    pub fn board(&self) -> Result<Vec<BoardEntry>> {
        let settings = self.store.load_settings()?;
        let records = self.store.load_all_targets()?;
        Ok(board::build(
            &self.clock.now(),
            &settings,
            &records,
            self.directory.as_ref(),
        ))
    }

    // === Internals shared with the handler and reconciler ===

    /// Run `f` holding the target's lock.
    pub(crate) fn serialized<R>(&self, target: &TargetId, f: impl FnOnce() -> R) -> R {
        let lock = self.locks.get(target);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());
        f()
    }

    pub(crate) fn now_utc(&self) -> DateTime<Utc> {
        self.clock.now().with_timezone(&Utc)
    }

    pub(crate) fn schedule_locked(
        &self,
        target: &TargetId,
        record: &TargetRecord,
        settings: &Settings,
        min_delay: Duration,
        from: ScheduleFrom,
    ) -> std::result::Result<PendingTimer, TimerError> {
        let plan = plan_wake_up(&self.clock.now(), record, settings.lead(), min_delay, from);
        let pending = self.scheduler.arm(target, plan)?;
        tracing::debug!(
            target_id = %target,
            cycle = %pending.plan.cycle,
            fire_at = %pending.timer.fire_at,
            floored = pending.plan.floored,
            "timer armed"
        );
        self.emit(Event::TimerArmed {
            target: target.clone(),
            cycle: pending.plan.cycle,
            deadline: pending.plan.deadline,
            fire_at: pending.timer.fire_at,
            precision: pending.timer.precision,
            floored: pending.plan.floored,
            at: self.now_utc(),
        });
        Ok(pending)
    }

    pub(crate) fn cancel_locked(&self, target: &TargetId) -> bool {
        match self.scheduler.cancel(target) {
            Some(_) => {
                tracing::debug!(target_id = %target, "timer cancelled");
                self.emit(Event::TimerCancelled {
                    target: target.clone(),
                    at: self.now_utc(),
                });
                true
            }
            None => false,
        }
    }

    pub(crate) fn emit(&self, event: Event) {
        tracing::trace!(?event, "engine event");
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}
