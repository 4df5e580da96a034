use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cycle::CycleId;
use crate::model::TargetId;
use crate::timer::Precision;

/// Why a wake-up ended without a reminder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// The target is already done this cycle.
    Completed,
    /// The user was already reminded this cycle.
    AlreadyNotified,
}

/// Every action of the engine produces an Event.
/// The daemon prints them; tests subscribe to them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Event {
    TimerArmed {
        target: TargetId,
        cycle: CycleId,
        deadline: DateTime<Utc>,
        fire_at: DateTime<Utc>,
        precision: Precision,
        /// Raised to the minimum-delay floor.
        floored: bool,
        at: DateTime<Utc>,
    },
    TimerCancelled {
        target: TargetId,
        at: DateTime<Utc>,
    },
    ReminderPresented {
        target: TargetId,
        cycle: CycleId,
        /// False when the presenter reported a failure.
        delivered: bool,
        at: DateTime<Utc>,
    },
    WakeUpSkipped {
        target: TargetId,
        cycle: CycleId,
        reason: SkipReason,
        at: DateTime<Utc>,
    },
    TargetCompleted {
        target: TargetId,
        cycle: CycleId,
        reset_changed: bool,
        at: DateTime<Utc>,
    },
    TargetReopened {
        target: TargetId,
        cycle: CycleId,
        at: DateTime<Utc>,
    },
    SettingsChanged {
        alerts_enabled: bool,
        lead_minutes: u32,
        tracked: usize,
        at: DateTime<Utc>,
    },
    /// A full cancel-and-recompute pass finished.
    Reconciled {
        armed: usize,
        cancelled: usize,
        failed: usize,
        at: DateTime<Utc>,
    },
}

impl Event {
    /// Target the event is about, if any.
    pub fn target(&self) -> Option<&TargetId> {
        match self {
            Event::TimerArmed { target, .. }
            | Event::TimerCancelled { target, .. }
            | Event::ReminderPresented { target, .. }
            | Event::WakeUpSkipped { target, .. }
            | Event::TargetCompleted { target, .. }
            | Event::TargetReopened { target, .. } => Some(target),
            Event::SettingsChanged { .. } | Event::Reconciled { .. } => None,
        }
    }
}
