//! Application state shared across handlers.

use std::sync::Arc;

use bustrack_core::{AppConfig, JsonSessionStore, PositionHub, TrackingController};
use tracing::info;

use crate::notify::LatestNotification;

/// State handed to every handler.
pub type SharedState = Arc<AppState>;

/// Everything the HTTP layer needs to drive tracking.
pub struct AppState {
    /// Configuration the server was started with.
    pub config: AppConfig,
    /// Push-fed observer and bus positions.
    pub hub: PositionHub,
    /// The tracking session controller.
    pub controller: TrackingController,
    /// Current notification content.
    pub notification: Arc<LatestNotification>,
    /// Session history, when persistence is enabled.
    pub sessions: Option<JsonSessionStore>,
}

impl AppState {
    /// Wire the controller to a fresh hub according to `config`.
    #[must_use]
    pub fn new(config: AppConfig) -> Self {
        let hub = PositionHub::new();
        let notification = Arc::new(LatestNotification::default());

        let mut controller = TrackingController::new(
            config.tracking.clone(),
            Arc::new(hub.clone()),
            Arc::new(hub.clone()),
        )
        .with_notification_sink(notification.clone());

        let sessions = if config.storage.enabled {
            let store = JsonSessionStore::new(config.storage.resolved_data_dir());
            info!(data_dir = %store.data_dir().display(), "Session persistence enabled");
            controller = controller.with_store(Arc::new(store.clone()));
            Some(store)
        } else {
            None
        };

        Self {
            config,
            hub,
            controller,
            notification,
            sessions,
        }
    }

    /// Convenience for `Arc::new(AppState::new(config))`.
    #[must_use]
    pub fn shared(config: AppConfig) -> SharedState {
        Arc::new(Self::new(config))
    }
}
