//! Global reconciler and user transitions with scheduling.
//!
//! Every bulk change (start-up, alerts toggled, lead time, tracked set) goes
//! through a full cancel-then-recompute pass over the tracked targets.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::cycle::{Clock, CycleId, ResetTime};
use crate::error::{Result, ValidationError};
use crate::events::Event;
use crate::model::{Settings, TargetId};
use crate::scheduler::ScheduleFrom;
use crate::transitions;
use crate::Engine;

/// Summary of one reconcile pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub armed: Vec<TargetId>,
    pub cancelled: Vec<TargetId>,
    /// Targets whose timer could not be armed, with the reason.
    pub failed: Vec<(TargetId, String)>,
}

impl ReconcileReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

impl<C: Clock> Engine<C> {
    /// Cancel every timer, then arm each tracked target when alerts are on.
    ///
    /// Timers of targets no longer tracked are cancelled too. Per-target
    /// failures are collected in the report instead of aborting the pass.
    pub fn reschedule_all(&self, settings: &Settings) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        let mut known: BTreeSet<TargetId> = settings.tracked.clone();
        known.extend(self.scheduler.pending_targets());
        for target in &known {
            if self.serialized(target, || self.cancel_locked(target)) {
                report.cancelled.push(target.clone());
            }
        }

        if settings.alerts_enabled {
            for target in &settings.tracked {
                let armed = self.serialized(target, || -> Result<()> {
                    let record = self.store.load_target(target)?;
                    self.schedule_locked(
                        target,
                        &record,
                        settings,
                        self.options.min_delay,
                        ScheduleFrom::Auto,
                    )?;
                    Ok(())
                });
                match armed {
                    Ok(()) => report.armed.push(target.clone()),
                    Err(e) => {
                        tracing::warn!(target_id = %target, error = %e, "failed to arm timer");
                        report.failed.push((target.clone(), e.to_string()));
                    }
                }
            }
        }

        tracing::info!(
            alerts_enabled = settings.alerts_enabled,
            armed = report.armed.len(),
            cancelled = report.cancelled.len(),
            failed = report.failed.len(),
            "reconciled"
        );
        self.emit(Event::Reconciled {
            armed: report.armed.len(),
            cancelled: report.cancelled.len(),
            failed: report.failed.len(),
            at: self.now_utc(),
        });
        report
    }

    /// Start-up reconcile from the persisted settings.
    pub fn start(&self) -> Result<ReconcileReport> {
        let settings = self.store.load_settings()?;
        Ok(self.reschedule_all(&settings))
    }

    /// Persist new settings and reconcile.
    pub fn update_settings(&self, settings: &Settings) -> Result<ReconcileReport> {
        let saved = transitions::apply_settings(self.store.as_ref(), settings)?;
        self.settings_changed(&saved);
        Ok(self.reschedule_all(&saved))
    }

    pub fn set_tracked(&self, tracked: BTreeSet<TargetId>) -> Result<ReconcileReport> {
        let settings = self.store.load_settings()?.with_tracked(tracked);
        self.update_settings(&settings)
    }

    /// Track one target, optionally setting its reset time.
    pub fn track(&self, target: &TargetId, reset: Option<ResetTime>) -> Result<ReconcileReport> {
        let saved = transitions::track(self.store.as_ref(), target, reset)?;
        self.settings_changed(&saved);
        Ok(self.reschedule_all(&saved))
    }

    pub fn untrack(&self, target: &TargetId) -> Result<ReconcileReport> {
        let saved = transitions::untrack(self.store.as_ref(), target)?;
        self.settings_changed(&saved);
        Ok(self.reschedule_all(&saved))
    }

    /// Mark `target` completed for its current cycle.
    ///
    /// With a changed reset time the notified mark is cleared and the cycle
    /// after the completed one is armed; otherwise this cycle's timer is
    /// cancelled and the next reminder armed.
    pub fn mark_completed(&self, target: &TargetId, new_reset: Option<ResetTime>) -> Result<CycleId> {
        let settings = self.tracked_settings(target)?;
        self.serialized(target, || -> Result<CycleId> {
            let change =
                transitions::complete(self.store.as_ref(), target, new_reset, &self.clock.now())?;
            tracing::info!(
                target_id = %target,
                cycle = %change.cycle,
                reset_changed = change.reset_changed,
                "target completed"
            );
            self.emit(Event::TargetCompleted {
                target: target.clone(),
                cycle: change.cycle,
                reset_changed: change.reset_changed,
                at: self.now_utc(),
            });

            if !settings.alerts_enabled {
                self.cancel_locked(target);
            } else if change.reset_changed {
                self.schedule_locked(
                    target,
                    &change.record,
                    &settings,
                    self.options.min_delay,
                    ScheduleFrom::NextCycle,
                )?;
            } else {
                self.cancel_locked(target);
                self.schedule_locked(
                    target,
                    &change.record,
                    &settings,
                    self.options.min_delay,
                    ScheduleFrom::Auto,
                )?;
            }
            Ok(change.cycle)
        })
    }

    /// Undo a completion and re-arm right away.
    pub fn mark_not_completed(
        &self,
        target: &TargetId,
        new_reset: Option<ResetTime>,
    ) -> Result<CycleId> {
        let settings = self.tracked_settings(target)?;
        self.serialized(target, || -> Result<CycleId> {
            let change =
                transitions::reopen(self.store.as_ref(), target, new_reset, &self.clock.now())?;
            tracing::info!(target_id = %target, cycle = %change.cycle, "target reopened");
            self.emit(Event::TargetReopened {
                target: target.clone(),
                cycle: change.cycle,
                at: self.now_utc(),
            });

            if settings.alerts_enabled {
                self.schedule_locked(
                    target,
                    &change.record,
                    &settings,
                    self.options.min_delay,
                    ScheduleFrom::Auto,
                )?;
            }
            Ok(change.cycle)
        })
    }

    fn tracked_settings(&self, target: &TargetId) -> Result<Settings> {
        let settings = self.store.load_settings()?;
        if !settings.is_tracked(target) {
            return Err(ValidationError::UnknownTarget(target.to_string()).into());
        }
        Ok(settings)
    }

    fn settings_changed(&self, saved: &Settings) {
        tracing::info!(
            alerts_enabled = saved.alerts_enabled,
            lead_minutes = saved.lead_minutes,
            tracked = saved.tracked.len(),
            "settings changed"
        );
        self.emit(Event::SettingsChanged {
            alerts_enabled: saved.alerts_enabled,
            lead_minutes: saved.lead_minutes,
            tracked: saved.tracked.len(),
            at: self.now_utc(),
        });
    }
}
