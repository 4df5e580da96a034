//! User-driven state transitions against the store alone.
//!
//! These touch no timer. The engine wraps them with scheduling; the CLI's
//! one-shot commands call them directly and leave the re-arm to a running
//! daemon, which notices the commit through the store's change detection.

use chrono::{DateTime, TimeZone};

use crate::cycle::{cycle_id, CycleId, ResetTime};
use crate::error::StoreError;
use crate::model::{Settings, TargetId, TargetRecord};
use crate::storage::StateStore;

/// Outcome of a completion or undo.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    /// Cycle the transition applied to, under the (possibly new) reset time.
    pub cycle: CycleId,
    pub record: TargetRecord,
    pub reset_changed: bool,
}

/// Mark `target` completed for its current cycle.
///
/// A new reset time is applied first and the cycle computed with it. When
/// the reset time actually changes the notified mark is cleared.
pub fn complete<Tz: TimeZone>(
    store: &dyn StateStore,
    target: &TargetId,
    new_reset: Option<ResetTime>,
    now: &DateTime<Tz>,
) -> Result<Transition, StoreError> {
    let mut reset_changed = false;
    let record = store.update_target(target, &mut |r| {
        reset_changed = apply_reset(r, new_reset);
        if reset_changed {
            r.last_notified_cycle = None;
        }
        r.last_completed_cycle = Some(cycle_id(now, r.reset_time));
    })?;
    Ok(Transition {
        cycle: cycle_id(now, record.reset_time),
        record,
        reset_changed,
    })
}

/// Undo a completion: clears both the completed and notified marks.
pub fn reopen<Tz: TimeZone>(
    store: &dyn StateStore,
    target: &TargetId,
    new_reset: Option<ResetTime>,
    now: &DateTime<Tz>,
) -> Result<Transition, StoreError> {
    let mut reset_changed = false;
    let record = store.update_target(target, &mut |r| {
        reset_changed = apply_reset(r, new_reset);
        r.last_completed_cycle = None;
        r.last_notified_cycle = None;
    })?;
    Ok(Transition {
        cycle: cycle_id(now, record.reset_time),
        record,
        reset_changed,
    })
}

fn apply_reset(record: &mut TargetRecord, new_reset: Option<ResetTime>) -> bool {
    match new_reset {
        Some(reset) if reset != record.reset_time => {
            record.reset_time = reset;
            true
        }
        _ => false,
    }
}

/// Persist a new settings snapshot.
///
/// Drops the records of targets that left the tracked set, and clears the
/// notified mark of every tracked target when the lead time changed so the
/// new lead can still fire in the current cycle. Returns what was saved.
pub fn apply_settings(store: &dyn StateStore, new: &Settings) -> Result<Settings, StoreError> {
    let previous = store.load_settings()?;
    let saved = new.clone().with_lead_minutes(new.lead_minutes);
    store.save_settings(&saved)?;

    for removed in previous.tracked.difference(&saved.tracked) {
        store.remove_target(removed)?;
    }
    if previous.lead_minutes != saved.lead_minutes {
        for target in &saved.tracked {
            store.update_target(target, &mut |r| r.last_notified_cycle = None)?;
        }
    }
    Ok(saved)
}

/// Add `target` to the tracked set, optionally setting its reset time.
///
/// Changing the reset time of a tracked target clears its notified mark.
pub fn track(
    store: &dyn StateStore,
    target: &TargetId,
    reset: Option<ResetTime>,
) -> Result<Settings, StoreError> {
    store.update_target(target, &mut |r| {
        if apply_reset(r, reset) {
            r.last_notified_cycle = None;
        }
    })?;
    let mut settings = store.load_settings()?;
    settings.tracked.insert(target.clone());
    apply_settings(store, &settings)
}

/// Remove `target` from the tracked set and drop its state.
pub fn untrack(store: &dyn StateStore, target: &TargetId) -> Result<Settings, StoreError> {
    let mut settings = store.load_settings()?;
    settings.tracked.remove(target);
    let saved = apply_settings(store, &settings)?;
    // Records of targets that were never tracked are dropped too.
    store.remove_target(target)?;
    Ok(saved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use chrono::{FixedOffset, Utc};

    fn id(s: &str) -> TargetId {
        TargetId::new(s).unwrap()
    }

    fn at(h: u32, mi: u32) -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .unwrap()
            .with_ymd_and_hms(2026, 5, 1, h, mi, 0)
            .unwrap()
    }

    #[test]
    fn complete_marks_current_cycle() {
        let store = MemoryStore::new();
        let t = complete(&store, &id("a"), None, &at(12, 0)).unwrap();
        assert_eq!(t.record.last_completed_cycle, Some(t.cycle));
        assert!(!t.reset_changed);
    }

    #[test]
    fn complete_with_new_reset_uses_new_cycle_and_clears_notified() {
        let store = MemoryStore::new();
        let now = at(5, 0);
        // Under midnight reset 05:00 is in today's cycle; under 06:00 it is
        // still yesterday's.
        let old_cycle = cycle_id(&now, ResetTime::midnight());
        store
            .update_target(&id("a"), &mut |r| r.last_notified_cycle = Some(old_cycle))
            .unwrap();

        let reset = ResetTime::new(6, 0).unwrap();
        let t = complete(&store, &id("a"), Some(reset), &now).unwrap();
        assert!(t.reset_changed);
        assert_eq!(t.cycle.value(), old_cycle.value() - 1);
        assert_eq!(t.record.reset_time, reset);
        assert_eq!(t.record.last_notified_cycle, None);
        assert_eq!(t.record.last_completed_cycle, Some(t.cycle));
    }

    #[test]
    fn same_reset_is_not_a_change() {
        let store = MemoryStore::new();
        let t = complete(&store, &id("a"), Some(ResetTime::midnight()), &Utc::now()).unwrap();
        assert!(!t.reset_changed);
    }

    #[test]
    fn reopen_clears_both_marks() {
        let store = MemoryStore::new();
        store
            .update_target(&id("a"), &mut |r| {
                r.last_completed_cycle = Some(CycleId(3));
                r.last_notified_cycle = Some(CycleId(3));
            })
            .unwrap();
        let t = reopen(&store, &id("a"), None, &at(12, 0)).unwrap();
        assert_eq!(t.record.last_completed_cycle, None);
        assert_eq!(t.record.last_notified_cycle, None);
    }

    #[test]
    fn lead_change_clears_notified_marks() {
        let store = MemoryStore::new();
        track(&store, &id("a"), None).unwrap();
        store
            .update_target(&id("a"), &mut |r| r.last_notified_cycle = Some(CycleId(9)))
            .unwrap();

        let settings = store.load_settings().unwrap();
        apply_settings(&store, &settings.clone().with_alerts(true)).unwrap();
        assert_eq!(store.load_target(&id("a")).unwrap().last_notified_cycle, Some(CycleId(9)));

        apply_settings(&store, &settings.with_lead_minutes(30)).unwrap();
        assert_eq!(store.load_target(&id("a")).unwrap().last_notified_cycle, None);
    }

    #[test]
    fn untracking_drops_state() {
        let store = MemoryStore::new();
        track(&store, &id("a"), Some(ResetTime::new(7, 0).unwrap())).unwrap();
        track(&store, &id("b"), None).unwrap();
        assert_eq!(store.load_settings().unwrap().tracked.len(), 2);

        let saved = untrack(&store, &id("a")).unwrap();
        assert!(!saved.is_tracked(&id("a")));
        assert!(!store.load_all_targets().unwrap().contains_key(&id("a")));
        assert!(store.load_all_targets().unwrap().contains_key(&id("b")));
    }
}
