//! # Habitclock Core Library
//!
//! This library provides the cycle and deadline scheduling engine behind
//! habitclock. Each tracked target has a daily reset time; the engine knows
//! whether a target is done for the current cycle and fires exactly one
//! reminder per cycle, a configurable lead time before the reset.
//!
//! ## Architecture
//!
//! - **Cycle Clock**: pure arithmetic from (instant, reset time) to a cycle
//!   id and the next deadline
//! - **Storage**: SQLite-backed state store and TOML-based configuration
//! - **Scheduler**: plans wake-ups and keeps one armed timer per target over
//!   a precise/inexact timer ladder
//! - **Handler**: the idempotent notify-or-skip decision on every wake-up
//! - **Reconciler**: full cancel-and-recompute on settings changes
//!
//! ## Key Components
//!
//! - [`Engine`]: entry points for timers, the UI and the reconciler
//! - [`SqliteStore`]: persistent [`StateStore`]
//! - [`TokioBackend`] and [`WakeDispatcher`]: the async timer facility
//! - [`Config`]: application configuration management

pub mod board;
pub mod cycle;
pub mod directory;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod events;
pub mod handler;
pub mod model;
pub mod notify;
pub mod reconciler;
pub mod scheduler;
pub mod storage;
pub mod timer;
pub mod transitions;

#[cfg(test)]
mod test_tz;

pub use board::BoardEntry;
pub use cycle::{
    cycle_id, format_remaining, lead_time_phrase, next_deadline, remaining, Clock, CycleId,
    ManualClock, ResetTime, SystemClock,
};
pub use directory::{ConfigDirectory, StaticDirectory, TargetDirectory};
pub use dispatch::WakeDispatcher;
pub use engine::{Engine, EngineOptions};
pub use error::{
    ConfigError, CoreError, PresentError, StoreError, TimerError, ValidationError,
};
pub use events::{Event, SkipReason};
pub use handler::WakeOutcome;
pub use model::{Settings, TargetId, TargetRecord, DEFAULT_LEAD_MINUTES, MAX_LEAD_MINUTES};
pub use notify::{LogPresenter, NotificationPresenter, RecordingPresenter, Reminder};
pub use reconciler::ReconcileReport;
pub use scheduler::{plan_wake_up, DeadlineScheduler, PendingTimer, ScheduleFrom, WakePlan};
pub use storage::{Config, MemoryStore, SqliteStore, StateStore, StoreChange};
pub use timer::{
    ArmedTimer, ManualBackend, PreciseGrant, Precision, TimerBackend, TimerLadder, TokioBackend,
    WakeTimer, WakeUp,
};
