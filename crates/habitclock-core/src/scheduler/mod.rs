//! Deadline scheduler.
//!
//! This module decides when a target should next be checked and keeps at
//! most one armed timer per target:
//! - [`plan_wake_up`] turns a record and the lead time into a [`WakePlan`]
//! - [`DeadlineScheduler`] arms plans through a [`WakeTimer`] and owns the
//!   registry that defines "the pending timer of a target"

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::cycle::{cycle_id, next_deadline, CycleId};
use crate::error::TimerError;
use crate::model::{TargetId, TargetRecord};
use crate::timer::{ArmedTimer, WakeTimer, WakeUp};

/// Which cycle a plan is computed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScheduleFrom {
    /// The current cycle, unless it is already settled.
    #[default]
    Auto,
    /// Always the cycle after the current one.
    NextCycle,
}

/// A computed wake-up for one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WakePlan {
    /// Cycle whose reminder this wake-up checks.
    pub cycle: CycleId,
    /// End of that cycle.
    pub deadline: DateTime<Utc>,
    pub fire_at: DateTime<Utc>,
    /// The lead-time candidate was raised to the minimum-delay floor.
    pub floored: bool,
}

/// Compute the next wake-up of a target.
///
/// The candidate is `deadline - lead`, raised to `now + min_delay` when
/// it would fall earlier.
pub fn plan_wake_up<Tz: TimeZone>(
    now: &DateTime<Tz>,
    record: &TargetRecord,
    lead: Duration,
    min_delay: Duration,
    from: ScheduleFrom,
) -> WakePlan {
    let reset = record.reset_time;
    let current = cycle_id(now, reset);
    let deadline = next_deadline(reset, now);

    let skip_current = match from {
        ScheduleFrom::NextCycle => true,
        ScheduleFrom::Auto => record.is_settled_in(current),
    };
    let (cycle, deadline) = if skip_current {
        (CycleId(current.value() + 1), next_deadline(reset, &deadline))
    } else {
        (current, deadline)
    };

    let deadline = deadline.with_timezone(&Utc);
    let candidate = deadline - lead;
    let floor = now.with_timezone(&Utc) + min_delay;
    let (fire_at, floored) = if candidate < floor {
        (floor, true)
    } else {
        (candidate, false)
    };

    WakePlan {
        cycle,
        deadline,
        fire_at,
        floored,
    }
}

/// Registry entry for an armed target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingTimer {
    pub timer: ArmedTimer,
    pub plan: WakePlan,
}

/// Arms and cancels per-target timers.
pub struct DeadlineScheduler {
    timer: Arc<dyn WakeTimer>,
    pending: Mutex<HashMap<TargetId, PendingTimer>>,
}

impl DeadlineScheduler {
    pub fn new(timer: Arc<dyn WakeTimer>) -> Self {
        Self {
            timer,
            pending: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TargetId, PendingTimer>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace the target's pending timer with one armed for `plan`.
    ///
    /// The previous timer is cancelled even when arming fails, so a target
    /// never ends up with two.
    pub fn arm(&self, target: &TargetId, plan: WakePlan) -> Result<PendingTimer, TimerError> {
        let mut pending = self.lock();
        if let Some(old) = pending.remove(target) {
            self.timer.cancel(old.timer.handle);
        }
        let timer = self.timer.schedule_once(plan.fire_at, target)?;
        let entry = PendingTimer { timer, plan };
        pending.insert(target.clone(), entry.clone());
        Ok(entry)
    }

    /// Cancel the target's pending timer, returning it if there was one.
    pub fn cancel(&self, target: &TargetId) -> Option<PendingTimer> {
        let old = self.lock().remove(target)?;
        self.timer.cancel(old.timer.handle);
        Some(old)
    }

    pub fn pending(&self, target: &TargetId) -> Option<PendingTimer> {
        self.lock().get(target).cloned()
    }

    pub fn pending_targets(&self) -> Vec<TargetId> {
        let mut targets: Vec<_> = self.lock().keys().cloned().collect();
        targets.sort();
        targets
    }

    /// Forget the entry a delivered wake-up came from.
    ///
    /// Entries armed after the wake-up was sent are left alone.
    pub fn fired(&self, wake: &WakeUp) {
        let mut pending = self.lock();
        if pending
            .get(&wake.target)
            .is_some_and(|p| p.timer.handle == wake.handle)
        {
            pending.remove(&wake.target);
        }
    }
}
