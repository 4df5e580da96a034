//! Targets, per-target records and the global settings snapshot.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::cycle::{CycleId, ResetTime};
use crate::error::ValidationError;

/// Default lead time before a deadline, in minutes.
pub const DEFAULT_LEAD_MINUTES: u32 = 60;

/// Longest lead time accepted: one full cycle.
pub const MAX_LEAD_MINUTES: u32 = 24 * 60;

/// Stable identifier of a tracked habit target (an app/package id in practice).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TargetId(String);

impl TargetId {
    pub fn new(id: impl Into<String>) -> Result<Self, ValidationError> {
        let id = id.into();
        let trimmed = id.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyTargetId);
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TargetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TargetId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl TryFrom<String> for TargetId {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<TargetId> for String {
    fn from(value: TargetId) -> Self {
        value.0
    }
}

/// Persisted per-target state.
///
/// Completion and notification are independent marks on a cycle id and are
/// only ever compared for equality against the current cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRecord {
    #[serde(default)]
    pub reset_time: ResetTime,
    #[serde(default)]
    pub last_completed_cycle: Option<CycleId>,
    #[serde(default)]
    pub last_notified_cycle: Option<CycleId>,
}

impl TargetRecord {
    pub fn with_reset_time(reset_time: ResetTime) -> Self {
        Self {
            reset_time,
            ..Self::default()
        }
    }

    pub fn is_completed_in(&self, cycle: CycleId) -> bool {
        self.last_completed_cycle == Some(cycle)
    }

    pub fn is_notified_in(&self, cycle: CycleId) -> bool {
        self.last_notified_cycle == Some(cycle)
    }

    /// Nothing is left to remind about in `cycle`.
    pub fn is_settled_in(&self, cycle: CycleId) -> bool {
        self.is_completed_in(cycle) || self.is_notified_in(cycle)
    }
}

/// Immutable snapshot of the global settings, passed explicitly to every
/// scheduling decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub alerts_enabled: bool,
    #[serde(default = "default_lead_minutes")]
    pub lead_minutes: u32,
    #[serde(default)]
    pub tracked: BTreeSet<TargetId>,
}

fn default_lead_minutes() -> u32 {
    DEFAULT_LEAD_MINUTES
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            alerts_enabled: false,
            lead_minutes: DEFAULT_LEAD_MINUTES,
            tracked: BTreeSet::new(),
        }
    }
}

impl Settings {
    /// Clamp a lead time into `1..=MAX_LEAD_MINUTES`.
    pub fn clamp_lead_minutes(minutes: u32) -> u32 {
        minutes.clamp(1, MAX_LEAD_MINUTES)
    }

    pub fn with_lead_minutes(mut self, minutes: u32) -> Self {
        self.lead_minutes = Self::clamp_lead_minutes(minutes);
        self
    }

    pub fn with_alerts(mut self, enabled: bool) -> Self {
        self.alerts_enabled = enabled;
        self
    }

    pub fn with_tracked<I: IntoIterator<Item = TargetId>>(mut self, targets: I) -> Self {
        self.tracked = targets.into_iter().collect();
        self
    }

    pub fn lead(&self) -> Duration {
        Duration::minutes(i64::from(Self::clamp_lead_minutes(self.lead_minutes)))
    }

    pub fn is_tracked(&self, target: &TargetId) -> bool {
        self.tracked.contains(target)
    }
}
