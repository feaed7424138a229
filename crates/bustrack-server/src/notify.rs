//! Notification sink backing `GET /api/tracking/notification`.

use bustrack_core::{DisplayPayload, NotificationSink};
use tokio::sync::watch;
use tracing::trace;

/// Holds whatever the tracking indicator currently shows.
#[derive(Debug)]
pub struct LatestNotification {
    current: watch::Sender<Option<DisplayPayload>>,
}

impl Default for LatestNotification {
    fn default() -> Self {
        Self {
            current: watch::channel(None).0,
        }
    }
}

impl LatestNotification {
    /// What the indicator shows right now, if anything.
    #[must_use]
    pub fn current(&self) -> Option<DisplayPayload> {
        self.current.borrow().clone()
    }

    /// Watch indicator changes.
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<Option<DisplayPayload>> {
        self.current.subscribe()
    }
}

impl NotificationSink for LatestNotification {
    fn show(&self, payload: &DisplayPayload) {
        trace!(session_id = %payload.session_id, eta = %payload.eta_text, "Notification updated");
        self.current.send_replace(Some(payload.clone()));
    }

    fn clear(&self) {
        self.current.send_replace(None);
    }
}
