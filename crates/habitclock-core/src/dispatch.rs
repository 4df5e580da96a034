//! Async consumer of the wake-up channel.

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::cycle::Clock;
use crate::error::{CoreError, Result};
use crate::handler::WakeOutcome;
use crate::timer::WakeUp;
use crate::Engine;

/// Feeds fired timers to [`Engine::deliver`], one at a time.
///
/// Each wake-up runs on a blocking worker so store I/O never stalls the
/// async runtime.
pub struct WakeDispatcher<C: Clock + 'static> {
    engine: Arc<Engine<C>>,
    rx: mpsc::UnboundedReceiver<WakeUp>,
}

impl<C: Clock + 'static> WakeDispatcher<C> {
    pub fn new(engine: Arc<Engine<C>>, rx: mpsc::UnboundedReceiver<WakeUp>) -> Self {
        Self { engine, rx }
    }

    /// Handle the next wake-up. `None` once every sender is gone.
    pub async fn next(&mut self) -> Option<(WakeUp, Result<WakeOutcome>)> {
        let wake = self.rx.recv().await?;
        let engine = Arc::clone(&self.engine);
        let delivered = wake.clone();
        let result = tokio::task::spawn_blocking(move || engine.deliver(&delivered))
            .await
            .unwrap_or_else(|e| Err(CoreError::Task(e.to_string())));
        Some((wake, result))
    }

    /// Run until the channel closes.
    pub async fn run(mut self) {
        while let Some((wake, result)) = self.next().await {
            match result {
                Ok(outcome) => {
                    tracing::debug!(target_id = %wake.target, ?outcome, "wake-up handled");
                }
                Err(e) => {
                    tracing::warn!(target_id = %wake.target, error = %e, "wake-up failed");
                }
            }
        }
        tracing::debug!("wake-up channel closed");
    }
}
