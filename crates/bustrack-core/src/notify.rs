//! Notification sink contract.
//!
//! The sink owns whatever persistent indicator the platform shows while a
//! bus is being tracked. Calls are synchronous and are made while the
//! controller holds its session lock, so no `show` follows the final `clear`.

use crate::types::DisplayPayload;

/// Receives display payloads for the persistent tracking indicator.
pub trait NotificationSink: Send + Sync {
    /// Shows or updates the indicator.
    fn show(&self, payload: &DisplayPayload);

    /// Removes the indicator.
    fn clear(&self);
}

/// Sink that discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotificationSink;

impl NotificationSink for NoopNotificationSink {
    fn show(&self, _payload: &DisplayPayload) {}

    fn clear(&self) {}
}
