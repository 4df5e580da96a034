//! Status board: the ordered per-target view a UI shows.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use crate::cycle::{cycle_id, format_remaining, next_deadline, CycleId, ResetTime};
use crate::directory::TargetDirectory;
use crate::model::{Settings, TargetId, TargetRecord};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BoardEntry {
    pub id: TargetId,
    pub label: String,
    pub reset_time: ResetTime,
    pub cycle: CycleId,
    pub done: bool,
    pub remaining_secs: i64,
    /// Countdown, or `Done`.
    pub remaining_text: String,
    /// Pending and inside the lead window.
    pub urgent: bool,
    pub next_deadline: DateTime<Utc>,
}

/// One entry per tracked target: pending ones first by time left, then
/// done ones by reset time. Ties break on id.
pub fn build<Tz: TimeZone>(
    now: &DateTime<Tz>,
    settings: &Settings,
    records: &BTreeMap<TargetId, TargetRecord>,
    directory: &dyn TargetDirectory,
) -> Vec<BoardEntry> {
    let lead_secs = settings.lead().num_seconds();

    let mut entries: Vec<BoardEntry> = settings
        .tracked
        .iter()
        .map(|id| {
            let record = records.get(id).cloned().unwrap_or_default();
            let cycle = cycle_id(now, record.reset_time);
            let deadline = next_deadline(record.reset_time, now);
            let remaining = deadline
                .clone()
                .signed_duration_since(now.clone())
                .max(chrono::Duration::zero());
            let done = record.is_completed_in(cycle);
            BoardEntry {
                id: id.clone(),
                label: directory.label(id).unwrap_or_else(|| id.to_string()),
                reset_time: record.reset_time,
                cycle,
                done,
                remaining_secs: remaining.num_seconds(),
                remaining_text: if done {
                    "Done".to_string()
                } else {
                    format_remaining(remaining)
                },
                urgent: !done && remaining.num_seconds() <= lead_secs,
                next_deadline: deadline.with_timezone(&Utc),
            }
        })
        .collect();

    entries.sort_by(compare);
    entries
}

fn compare(a: &BoardEntry, b: &BoardEntry) -> Ordering {
    a.done
        .cmp(&b.done)
        .then_with(|| match a.done {
            false => a.remaining_secs.cmp(&b.remaining_secs),
            true => a.reset_time.cmp(&b.reset_time),
        })
        .then_with(|| a.id.cmp(&b.id))
}
