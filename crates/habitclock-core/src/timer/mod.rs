//! Timer facility.
//!
//! A [`TimerBackend`] is the mechanism: it arms one-shot timers and
//! delivers a [`WakeUp`] when one fires. The policies on top of it
//! ([`PreciseTimer`], [`InexactTimer`]) decide *when* a timer actually
//! fires, and [`TimerLadder`] picks one per call through the
//! [`TimerPermissions`] probe.

mod backend;
mod ladder;
mod manual;
mod tokio_backend;

pub use backend::{TimerBackend, TimerHandle, WakeUp};
pub use ladder::{
    ArmedTimer, InexactTimer, PreciseGrant, PreciseTimer, Precision, TimerLadder,
    TimerPermissions, WakeTimer,
};
pub use manual::ManualBackend;
pub use tokio_backend::TokioBackend;
