//! Cycle clock.
//!
//! Pure arithmetic mapping an instant and a per-target reset time to a
//! cycle identifier and to the next deadline. A reset time acts as the
//! local midnight of its target's cycle: a cycle starts at the local
//! occurrence of the reset time and is named after that local date.
//!
//! Every caller (status board, scheduler, wake-up handler) goes through
//! these functions so that they agree on cycle boundaries.

use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use chrono::{
    DateTime, Duration, FixedOffset, Local, NaiveDate, NaiveTime, TimeZone, Timelike,
};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// Daily boundary that starts a new cycle, at minute resolution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ResetTime(NaiveTime);

impl ResetTime {
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    /// Midnight, the default for targets that never had a reset time set.
    pub fn midnight() -> Self {
        Self::default()
    }

    /// Truncates seconds and below.
    pub fn from_time(time: NaiveTime) -> Self {
        Self::new(time.hour(), time.minute()).unwrap_or_default()
    }

    pub fn hour(&self) -> u32 {
        self.0.hour()
    }

    pub fn minute(&self) -> u32 {
        self.0.minute()
    }

    pub fn as_time(&self) -> NaiveTime {
        self.0
    }

    /// Offset of the reset time from midnight.
    pub fn offset(&self) -> Duration {
        Duration::hours(i64::from(self.hour())) + Duration::minutes(i64::from(self.minute()))
    }
}

impl fmt::Display for ResetTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl FromStr for ResetTime {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveTime::parse_from_str(s.trim(), "%H:%M")
            .map(Self::from_time)
            .map_err(|_| ValidationError::InvalidResetTime(s.to_string()))
    }
}

impl TryFrom<String> for ResetTime {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ResetTime> for String {
    fn from(value: ResetTime) -> Self {
        value.to_string()
    }
}

/// Identifier of one cycle of one target: the epoch-day number of the
/// reset-shifted local date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CycleId(pub i64);

impl CycleId {
    pub fn value(self) -> i64 {
        self.0
    }
}

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Cycle containing `now` for a target with the given reset time.
///
/// A cycle is named after the local date its reset occurrence falls on and
/// runs until the next occurrence, so it always ends at
/// [`next_deadline`]`(reset, now)`, DST shifts included.
pub fn cycle_id<Tz: TimeZone>(now: &DateTime<Tz>, reset: ResetTime) -> CycleId {
    let today = now.date_naive();
    let started_today = match occurrence_on(&now.timezone(), today, reset) {
        Some(start) => start <= *now,
        None => now.time() >= reset.as_time(),
    };
    let start = if started_today {
        today
    } else {
        today.pred_opt().unwrap_or(today)
    };
    // NaiveDate::default() is 1970-01-01
    CycleId(start.signed_duration_since(NaiveDate::default()).num_days())
}

/// Next occurrence of `reset` strictly after `now`.
///
/// Today's occurrence is used when it is still ahead, tomorrow's otherwise,
/// so the result lies in `(now, now + 24h]` on days without a DST shift.
pub fn next_deadline<Tz: TimeZone>(reset: ResetTime, now: &DateTime<Tz>) -> DateTime<Tz> {
    let tz = now.timezone();
    let today = now.date_naive();

    if let Some(candidate) = occurrence_on(&tz, today, reset) {
        if candidate > *now {
            return candidate;
        }
    }

    today
        .succ_opt()
        .and_then(|tomorrow| occurrence_on(&tz, tomorrow, reset))
        .unwrap_or_else(|| now.clone() + Duration::days(1))
}

/// Time left until the next deadline, never negative.
pub fn remaining<Tz: TimeZone>(reset: ResetTime, now: &DateTime<Tz>) -> Duration {
    let deadline = next_deadline(reset, now);
    deadline
        .signed_duration_since(now.clone())
        .max(Duration::zero())
}

/// Local occurrence of `reset` on `date`.
///
/// Ambiguous local times resolve to the earliest instant; a time inside a
/// DST gap moves one hour forward.
fn occurrence_on<Tz: TimeZone>(tz: &Tz, date: NaiveDate, reset: ResetTime) -> Option<DateTime<Tz>> {
    let naive = date.and_time(reset.as_time());
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + Duration::hours(1))).earliest())
}

/// Short countdown text: `H:MM:SS` with hours, `M:SS` without.
pub fn format_remaining(d: Duration) -> String {
    let total = d.num_seconds().max(0);
    let h = total / 3600;
    let m = (total % 3600) / 60;
    let s = total % 60;
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m}:{s:02}")
    }
}

/// Human-readable lead time used in reminder bodies.
pub fn lead_time_phrase(minutes: u32) -> String {
    if minutes % 60 == 0 {
        let h = minutes / 60;
        if h == 1 {
            "1 hour".to_string()
        } else {
            format!("{h} hours")
        }
    } else {
        format!("{minutes} minutes")
    }
}

// ── Clocks ───────────────────────────────────────────────────────────

/// Source of "now" for the engine.
pub trait Clock: Send + Sync {
    type Tz: TimeZone + Send + Sync;

    fn now(&self) -> DateTime<Self::Tz>;
}

/// Wall clock in the local time zone.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    type Tz = Local;

    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Settable clock for tests and simulations.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<FixedOffset>>,
}

impl ManualClock {
    pub fn new(now: DateTime<FixedOffset>) -> Self {
        Self { now: Mutex::new(now) }
    }

    pub fn set(&self, now: DateTime<FixedOffset>) {
        *self.now.lock().unwrap_or_else(|e| e.into_inner()) = now;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    type Tz = FixedOffset;

    fn now(&self) -> DateTime<FixedOffset> {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}
