//! Reminder content and the notification presenter seam.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::cycle::lead_time_phrase;
use crate::error::PresentError;
use crate::model::TargetId;

/// A user-visible reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reminder {
    /// Stable per target, so a newer reminder replaces an older one.
    pub id: u32,
    pub target: TargetId,
    pub title: String,
    pub body: String,
}

impl Reminder {
    pub fn new(target: &TargetId, label: Option<&str>, lead_minutes: u32, title: &str) -> Self {
        let label = label.unwrap_or(target.as_str());
        Self {
            id: notification_id(target),
            target: target.clone(),
            title: title.to_string(),
            body: format!("{label}: {} left until reset.", lead_time_phrase(lead_minutes)),
        }
    }
}

/// 31-bit notification id derived from the target id.
pub fn notification_id(target: &TargetId) -> u32 {
    let digest = Sha256::digest(target.as_str().as_bytes());
    u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]) & 0x7fff_ffff
}

/// Surface that shows reminders to the user.
///
/// Implementations may drop a reminder silently when the user has not
/// granted permission; an `Err` is only for failures worth logging.
pub trait NotificationPresenter: Send + Sync {
    fn present(&self, reminder: &Reminder) -> Result<(), PresentError>;
}

/// Presenter that writes reminders to the log.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogPresenter;

impl NotificationPresenter for LogPresenter {
    fn present(&self, reminder: &Reminder) -> Result<(), PresentError> {
        tracing::info!(
            target_id = %reminder.target,
            id = reminder.id,
            title = %reminder.title,
            "{}",
            reminder.body
        );
        Ok(())
    }
}

/// Presenter that keeps every reminder in memory.
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    shown: Mutex<Vec<Reminder>>,
    failing: AtomicBool,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reminders presented so far, including failed attempts.
    pub fn shown(&self) -> Vec<Reminder> {
        self.shown.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn count_for(&self, target: &TargetId) -> usize {
        self.shown().iter().filter(|r| &r.target == target).count()
    }

    /// Make every subsequent `present` report a failure.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

impl NotificationPresenter for RecordingPresenter {
    fn present(&self, reminder: &Reminder) -> Result<(), PresentError> {
        self.shown
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(reminder.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(PresentError("presenter marked failing".into()));
        }
        Ok(())
    }
}
