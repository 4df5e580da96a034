use habitclock_core::{NotificationPresenter, PresentError, Reminder};
use notify_rust::Notification;

/// Shows reminders as desktop notifications.
#[derive(Debug, Clone, Copy, Default)]
pub struct DesktopPresenter;

impl NotificationPresenter for DesktopPresenter {
    fn present(&self, reminder: &Reminder) -> Result<(), PresentError> {
        Notification::new()
            .summary(&reminder.title)
            .body(&reminder.body)
            .appname("habitclock")
            .icon("alarm-clock")
            .show()
            .map_err(|e| PresentError(e.to_string()))?;
        tracing::info!(target_id = %reminder.target, "{}", reminder.body);
        Ok(())
    }
}
