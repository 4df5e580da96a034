use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use super::backend::{TimerBackend, TimerHandle, WakeUp};
use crate::error::TimerError;
use crate::model::TargetId;

type Tasks = Arc<Mutex<HashMap<TimerHandle, AbortHandle>>>;

fn lock(tasks: &Tasks) -> MutexGuard<'_, HashMap<TimerHandle, AbortHandle>> {
    tasks.lock().unwrap_or_else(|e| e.into_inner())
}

/// Backend that sleeps one tokio task per timer.
///
/// Fired timers are delivered on the channel returned by
/// [`TokioBackend::new`]. `arm` is callable from any thread, including
/// blocking workers, because tasks are spawned through a runtime handle.
pub struct TokioBackend {
    runtime: Handle,
    tx: mpsc::UnboundedSender<WakeUp>,
    tasks: Tasks,
}

impl TokioBackend {
    pub fn new(runtime: Handle) -> (Self, mpsc::UnboundedReceiver<WakeUp>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let backend = Self {
            runtime,
            tx,
            tasks: Arc::new(Mutex::new(HashMap::new())),
        };
        (backend, rx)
    }

    /// Backend on the runtime of the calling context.
    pub fn current() -> Result<(Self, mpsc::UnboundedReceiver<WakeUp>), TimerError> {
        let runtime = Handle::try_current().map_err(|e| TimerError::Unavailable(e.to_string()))?;
        Ok(Self::new(runtime))
    }

    /// Number of timers that have not fired yet.
    pub fn armed_count(&self) -> usize {
        lock(&self.tasks).len()
    }
}

impl TimerBackend for TokioBackend {
    fn arm(&self, at: DateTime<Utc>, target: TargetId) -> Result<TimerHandle, TimerError> {
        if self.tx.is_closed() {
            return Err(TimerError::Unavailable("wake-up channel closed".into()));
        }

        let handle = TimerHandle::new();
        let delay = (at - Utc::now()).to_std().unwrap_or_default();
        let tx = self.tx.clone();
        let registry = Arc::clone(&self.tasks);

        // Held across spawn so a zero-delay task cannot remove its entry
        // before it is inserted.
        let mut tasks = lock(&self.tasks);
        let task = self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            lock(&registry).remove(&handle);
            if tx
                .send(WakeUp {
                    target,
                    handle,
                    fire_at: at,
                })
                .is_err()
            {
                tracing::debug!(%handle, "wake-up dropped, receiver gone");
            }
        });
        tasks.insert(handle, task.abort_handle());
        Ok(handle)
    }

    fn disarm(&self, handle: TimerHandle) {
        if let Some(task) = lock(&self.tasks).remove(&handle) {
            task.abort();
        }
    }
}

impl Drop for TokioBackend {
    fn drop(&mut self) {
        for (_, task) in lock(&self.tasks).drain() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn fires_on_channel() {
        let (backend, mut rx) = TokioBackend::current().unwrap();
        let target = TargetId::new("com.a").unwrap();
        let at = Utc::now() + Duration::milliseconds(20);
        let handle = backend.arm(at, target.clone()).unwrap();

        let wake = rx.recv().await.unwrap();
        assert_eq!(wake.target, target);
        assert_eq!(wake.handle, handle);
        assert_eq!(wake.fire_at, at);
        assert_eq!(backend.armed_count(), 0);
    }

    #[tokio::test]
    async fn past_instant_fires_immediately() {
        let (backend, mut rx) = TokioBackend::current().unwrap();
        let at = Utc::now() - Duration::minutes(5);
        backend.arm(at, TargetId::new("com.a").unwrap()).unwrap();
        assert!(rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn disarmed_timer_never_fires() {
        let (backend, mut rx) = TokioBackend::current().unwrap();
        let handle = backend
            .arm(Utc::now() + Duration::milliseconds(30), TargetId::new("com.a").unwrap())
            .unwrap();
        backend.disarm(handle);
        assert_eq!(backend.armed_count(), 0);

        let waited = tokio::time::timeout(std::time::Duration::from_millis(120), rx.recv()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn closed_channel_is_unavailable() {
        let (backend, rx) = TokioBackend::current().unwrap();
        drop(rx);
        assert!(matches!(
            backend.arm(Utc::now(), TargetId::new("com.a").unwrap()),
            Err(TimerError::Unavailable(_))
        ));
    }
}
