//! Foreground reminder daemon.
//!
//! Owns the timers: reconciles on startup, feeds fired timers to the engine,
//! polls the database for commits from one-shot commands and re-syncs on a
//! fixed interval in case a timer was dropped. Target labels are re-read from
//! the config file on every poll.

use std::sync::Arc;

use habitclock_core::{
    Config, ConfigDirectory, Engine, LogPresenter, NotificationPresenter, PreciseGrant,
    SqliteStore, SystemClock, TimerLadder, TokioBackend, WakeDispatcher,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::time::MissedTickBehavior;

use super::CmdResult;
use crate::presenter::DesktopPresenter;

pub fn run(json: bool) -> CmdResult {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(serve(json))
}

async fn serve(json: bool) -> CmdResult {
    let config = Config::load()?;
    let store = Arc::new(SqliteStore::open()?);
    let directory = Arc::new(ConfigDirectory::open()?);

    let (backend, wake_ups) = TokioBackend::current()?;
    let grant = PreciseGrant::new(config.timer.precise);
    let ladder = TimerLadder::new(
        Arc::new(backend),
        Arc::new(grant),
        chrono::Duration::from_std(config.inexact_window())?,
    );
    let presenter: Arc<dyn NotificationPresenter> = if config.notifications.desktop {
        Arc::new(DesktopPresenter)
    } else {
        Arc::new(LogPresenter)
    };

    let engine = Arc::new(
        Engine::new(
            store.clone(),
            Arc::new(ladder),
            presenter,
            directory.clone(),
            SystemClock,
        )
        .with_options(config.engine_options()),
    );

    if json {
        let mut events = engine.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => match serde_json::to_string(&event) {
                        Ok(line) => println!("{line}"),
                        Err(e) => tracing::warn!(error = %e, "event not serializable"),
                    },
                    Err(RecvError::Lagged(n)) => tracing::warn!(skipped = n, "event stream lagged"),
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    let report = reconcile(&engine).await?;
    tracing::info!(
        armed = report.armed.len(),
        failed = report.failed.len(),
        "daemon started"
    );

    let dispatcher = tokio::spawn(WakeDispatcher::new(Arc::clone(&engine), wake_ups).run());

    let mut poll = tokio::time::interval(config.poll_interval());
    poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut resync = tokio::time::interval(config.resync_interval());
    resync.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // both fire immediately; startup already reconciled
    poll.tick().await;
    resync.tick().await;

    loop {
        tokio::select! {
            _ = poll.tick() => {
                let poll_store = Arc::clone(&store);
                let labels = Arc::clone(&directory);
                let changed = tokio::task::spawn_blocking(move || {
                    if let Err(e) = labels.reload() {
                        tracing::warn!(error = %e, "keeping previous target labels");
                    }
                    poll_store.poll_external_changes()
                })
                .await?;
                match changed {
                    Ok(true) => {
                        tracing::debug!("external change, reconciling");
                        reconcile_logged(&engine).await;
                    }
                    Ok(false) => {}
                    Err(e) => tracing::warn!(error = %e, "polling the store failed"),
                }
            }
            _ = resync.tick() => {
                tracing::debug!("periodic resync");
                reconcile_logged(&engine).await;
            }
            signal = tokio::signal::ctrl_c() => {
                signal?;
                tracing::info!("shutting down");
                break;
            }
        }
    }

    dispatcher.abort();
    Ok(())
}

async fn reconcile(
    engine: &Arc<Engine>,
) -> Result<habitclock_core::ReconcileReport, Box<dyn std::error::Error>> {
    let engine = Arc::clone(engine);
    Ok(tokio::task::spawn_blocking(move || engine.start()).await??)
}

async fn reconcile_logged(engine: &Arc<Engine>) {
    match reconcile(engine).await {
        Ok(report) if !report.is_clean() => {
            for (target, error) in &report.failed {
                tracing::warn!(target_id = %target, %error, "could not arm timer");
            }
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(error = %e, "reconcile failed"),
    }
}
