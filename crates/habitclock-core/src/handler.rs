//! Wake-up handler.
//!
//! Re-derives the target's state from the store, decides between notify and
//! skip, persists the notified mark and re-arms. Duplicate or late wake-ups
//! are harmless: a cycle that is already completed or notified never
//! produces a second reminder.

use serde::Serialize;

use crate::cycle::{cycle_id, Clock, CycleId};
use crate::error::Result;
use crate::events::{Event, SkipReason};
use crate::model::{Settings, TargetId, TargetRecord};
use crate::notify::Reminder;
use crate::scheduler::ScheduleFrom;
use crate::timer::WakeUp;
use crate::Engine;

/// What a wake-up did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WakeOutcome {
    /// Alerts are off; nothing changed and nothing was re-armed.
    AlertsDisabled,
    /// The target is no longer tracked; its timer was cancelled.
    Untracked,
    /// Stale wake-up; nothing changed, the next cycle was armed.
    Skipped { reason: SkipReason },
    /// A reminder was presented (or attempted) and the next cycle armed.
    Notified { cycle: CycleId, delivered: bool },
}

impl<C: Clock> Engine<C> {
    /// Handle a wake-up for `target`.
    ///
    /// # Errors
    /// Store failures while loading state abort before any side effect.
    /// A failure to persist the notified mark is returned after the re-arm.
    pub fn handle_wake_up(&self, target: &TargetId) -> Result<WakeOutcome> {
        self.serialized(target, || self.handle_wake_up_locked(target))
    }

    /// Handle a delivered timer message, retiring its registry entry first.
    pub fn deliver(&self, wake: &WakeUp) -> Result<WakeOutcome> {
        self.serialized(&wake.target, || {
            self.scheduler.fired(wake);
            self.handle_wake_up_locked(&wake.target)
        })
    }

    fn handle_wake_up_locked(&self, target: &TargetId) -> Result<WakeOutcome> {
        let settings = self.store.load_settings()?;
        if !settings.alerts_enabled {
            tracing::debug!(target_id = %target, "wake-up ignored, alerts disabled");
            return Ok(WakeOutcome::AlertsDisabled);
        }
        if !settings.is_tracked(target) {
            tracing::debug!(target_id = %target, "wake-up for untracked target");
            self.cancel_locked(target);
            return Ok(WakeOutcome::Untracked);
        }

        let record = self.store.load_target(target)?;
        let cycle = cycle_id(&self.clock.now(), record.reset_time);

        if record.is_completed_in(cycle) {
            return self.skip(target, &record, &settings, cycle, SkipReason::Completed);
        }
        if record.is_notified_in(cycle) {
            return self.skip(target, &record, &settings, cycle, SkipReason::AlreadyNotified);
        }

        let label = self.directory.label(target);
        let reminder = Reminder::new(
            target,
            label.as_deref(),
            settings.lead_minutes,
            &self.options.reminder_title,
        );
        let delivered = match self.presenter.present(&reminder) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(target_id = %target, error = %e, "failed to present reminder");
                false
            }
        };
        tracing::info!(target_id = %target, %cycle, delivered, "reminder presented");
        self.emit(Event::ReminderPresented {
            target: target.clone(),
            cycle,
            delivered,
            at: self.now_utc(),
        });

        // Marked even when presentation failed: no inline retry.
        let persisted = self
            .store
            .update_target(target, &mut |r| r.last_notified_cycle = Some(cycle));
        let notified = match &persisted {
            Ok(saved) => saved.clone(),
            Err(e) => {
                tracing::warn!(target_id = %target, error = %e, "failed to persist notified cycle");
                TargetRecord {
                    last_notified_cycle: Some(cycle),
                    ..record
                }
            }
        };

        let rearmed = self.schedule_locked(
            target,
            &notified,
            &settings,
            self.options.rearm_min_delay,
            ScheduleFrom::Auto,
        );
        persisted?;
        rearmed?;
        Ok(WakeOutcome::Notified { cycle, delivered })
    }

    fn skip(
        &self,
        target: &TargetId,
        record: &TargetRecord,
        settings: &Settings,
        cycle: CycleId,
        reason: SkipReason,
    ) -> Result<WakeOutcome> {
        tracing::debug!(target_id = %target, %cycle, ?reason, "stale wake-up skipped");
        self.emit(Event::WakeUpSkipped {
            target: target.clone(),
            cycle,
            reason,
            at: self.now_utc(),
        });
        self.schedule_locked(
            target,
            record,
            settings,
            self.options.rearm_min_delay,
            ScheduleFrom::Auto,
        )?;
        Ok(WakeOutcome::Skipped { reason })
    }
}
