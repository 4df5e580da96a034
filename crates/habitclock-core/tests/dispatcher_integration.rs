//! Real tokio timers feeding the engine through the dispatcher.

mod common;

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use common::{id, tz};
use habitclock_core::{
    Engine, EngineOptions, Event, ManualClock, MemoryStore, PreciseGrant, RecordingPresenter,
    ResetTime, Settings, StateStore, StaticDirectory, TimerLadder, TokioBackend, WakeDispatcher,
    WakeOutcome,
};

struct Rig {
    engine: Arc<Engine<ManualClock>>,
    backend: Arc<TokioBackend>,
    presenter: Arc<RecordingPresenter>,
    dispatcher: WakeDispatcher<ManualClock>,
}

/// Target "a" resets about half an hour from now, so with a one hour lead
/// its wake-up is due immediately.
fn rig() -> Rig {
    let now = Utc::now().with_timezone(&tz());
    let store = Arc::new(MemoryStore::with_settings(
        Settings::default().with_alerts(true).with_tracked([id("a")]),
    ));
    store
        .update_target(&id("a"), &mut |r| {
            r.reset_time = ResetTime::from_time((now + Duration::minutes(30)).time())
        })
        .unwrap();

    let (backend, rx) = TokioBackend::current().unwrap();
    let backend = Arc::new(backend);
    let presenter = Arc::new(RecordingPresenter::new());
    let ladder = TimerLadder::new(
        backend.clone(),
        Arc::new(PreciseGrant::new(true)),
        Duration::minutes(10),
    );
    let engine = Arc::new(
        Engine::new(
            store,
            Arc::new(ladder),
            presenter.clone(),
            Arc::new(StaticDirectory::default()),
            ManualClock::new(now),
        )
        .with_options(EngineOptions {
            rearm_min_delay: Duration::zero(),
            min_delay: Duration::zero(),
            ..EngineOptions::default()
        }),
    );
    let dispatcher = WakeDispatcher::new(Arc::clone(&engine), rx);
    Rig {
        engine,
        backend,
        presenter,
        dispatcher,
    }
}

#[tokio::test]
async fn fired_timer_reaches_handler() {
    let mut rig = rig();
    rig.engine.start().unwrap();

    let (wake, result) = tokio::time::timeout(StdDuration::from_secs(5), rig.dispatcher.next())
        .await
        .expect("wake-up not delivered")
        .expect("channel closed");

    assert_eq!(wake.target, id("a"));
    assert!(matches!(result.unwrap(), WakeOutcome::Notified { .. }));
    assert_eq!(rig.presenter.count_for(&id("a")), 1);

    // re-armed for the next cycle, hours away
    assert_eq!(rig.backend.armed_count(), 1);
    let pending = rig.engine.pending(&id("a")).unwrap();
    assert!(pending.timer.fire_at > Utc::now() + Duration::hours(1));
}

#[tokio::test]
async fn cancelled_timer_never_arrives() {
    let mut rig = rig();
    rig.engine.start().unwrap();
    assert!(rig.engine.cancel(&id("a")));
    assert_eq!(rig.backend.armed_count(), 0);

    let waited =
        tokio::time::timeout(StdDuration::from_millis(200), rig.dispatcher.next()).await;
    assert!(waited.is_err());
    assert!(rig.presenter.shown().is_empty());
}

#[tokio::test]
async fn spawned_dispatcher_handles_in_background() {
    let rig = rig();
    let mut events = rig.engine.subscribe();
    let task = tokio::spawn(rig.dispatcher.run());
    rig.engine.start().unwrap();

    let presented = tokio::time::timeout(StdDuration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(Event::ReminderPresented { target, .. }) => break target,
                Ok(_) => continue,
                Err(e) => panic!("event stream ended: {e}"),
            }
        }
    })
    .await
    .expect("no reminder presented");

    assert_eq!(presented, id("a"));
    task.abort();
}
