//! Shared harness: an engine over in-memory collaborators and a settable clock.
#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use habitclock_core::{
    CoreError, Engine, ManualBackend, ManualClock, MemoryStore, PreciseGrant, RecordingPresenter,
    Settings, StaticDirectory, TargetDirectory, TargetId, TimerLadder, WakeOutcome, WakeUp,
};

pub fn tz() -> FixedOffset {
    FixedOffset::east_opt(0).unwrap()
}

/// Local instant on 2026-05-`day`.
pub fn at(day: u32, h: u32, mi: u32) -> DateTime<FixedOffset> {
    tz().with_ymd_and_hms(2026, 5, day, h, mi, 0).unwrap()
}

pub fn id(s: &str) -> TargetId {
    TargetId::new(s).unwrap()
}

pub struct Harness {
    pub engine: Engine<ManualClock>,
    pub store: Arc<MemoryStore>,
    pub backend: Arc<ManualBackend>,
    pub presenter: Arc<RecordingPresenter>,
    pub grant: PreciseGrant,
}

impl Harness {
    pub fn new(now: DateTime<FixedOffset>, settings: Settings) -> Self {
        Self::with_directory(now, settings, Arc::new(StaticDirectory::default()))
    }

    pub fn with_directory(
        now: DateTime<FixedOffset>,
        settings: Settings,
        directory: Arc<dyn TargetDirectory>,
    ) -> Self {
        let store = Arc::new(MemoryStore::with_settings(settings));
        let backend = Arc::new(ManualBackend::new());
        let presenter = Arc::new(RecordingPresenter::new());
        let grant = PreciseGrant::new(true);
        let ladder = TimerLadder::new(
            backend.clone(),
            Arc::new(grant.clone()),
            Duration::minutes(10),
        );
        let engine = Engine::new(
            store.clone(),
            Arc::new(ladder),
            presenter.clone(),
            directory,
            ManualClock::new(now),
        );
        Self {
            engine,
            store,
            backend,
            presenter,
            grant,
        }
    }

    /// Alerts on, lead 60, the given targets tracked.
    pub fn tracking(now: DateTime<FixedOffset>, targets: &[&str]) -> Self {
        let settings = Settings::default()
            .with_alerts(true)
            .with_tracked(targets.iter().map(|t| id(t)));
        Self::new(now, settings)
    }

    pub fn now(&self) -> DateTime<Utc> {
        use habitclock_core::Clock;
        self.engine.clock().now().with_timezone(&Utc)
    }

    pub fn set_now(&self, now: DateTime<FixedOffset>) {
        self.engine.clock().set(now);
    }

    /// Jump to the earliest armed timer and deliver everything due then.
    pub fn fire_next(&self) -> Option<Vec<(WakeUp, Result<WakeOutcome, CoreError>)>> {
        let next = self.backend.armed().into_iter().next()?;
        self.set_now(next.fire_at.with_timezone(&tz()));
        let due = self.backend.take_due(next.fire_at);
        Some(
            due.into_iter()
                .map(|wake| {
                    let outcome = self.engine.deliver(&wake);
                    (wake, outcome)
                })
                .collect(),
        )
    }

    /// Fire timers in order until the next one lies after `until`, then
    /// leave the clock at `until`.
    pub fn run_until(&self, until: DateTime<FixedOffset>) -> Vec<(WakeUp, WakeOutcome)> {
        let mut handled = Vec::new();
        while let Some(next) = self.backend.armed().into_iter().next() {
            if next.fire_at > until {
                break;
            }
            for (wake, outcome) in self.fire_next().unwrap_or_default() {
                handled.push((wake, outcome.expect("wake-up failed")));
            }
        }
        self.set_now(until);
        handled
    }
}
