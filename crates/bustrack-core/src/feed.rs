//! Position feed contracts.
//!
//! The controller never talks to location hardware or a realtime backend
//! directly. It pulls the observer's position on demand through
//! [`ObserverPositionFeed`] and consumes pushed bus positions through
//! [`TargetPositionFeed`]. Both traits use boxed futures so they can be held
//! as `Arc<dyn ...>` trait objects.

use std::future::Future;
use std::pin::Pin;

use futures::Stream;
use thiserror::Error;

use crate::geo::GeoPoint;
use crate::types::TrackedEntityState;

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Stream of pushed bus samples.
///
/// `Ok(None)` means the feed is connected but has no data for the target.
pub type TargetStream = Pin<Box<dyn Stream<Item = Result<Option<TrackedEntityState>, FeedError>> + Send>>;

/// Errors produced by position feeds.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FeedError {
    /// Location access was refused or no fix is available.
    #[error("Location permission denied or no position fix available")]
    PermissionDenied,

    /// The feed knows nothing about the target.
    #[error("Target '{target_id}' could not be resolved")]
    Unresolved {
        /// Target that could not be resolved.
        target_id: String,
    },

    /// The feed did not answer in time.
    #[error("Position request timed out after {timeout_ms} ms")]
    Timeout {
        /// Timeout that elapsed.
        timeout_ms: u64,
    },

    /// Any other transient failure.
    #[error("Position feed unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },
}

/// On-demand source of the observer's current position.
pub trait ObserverPositionFeed: Send + Sync {
    /// Fetches the observer's current position.
    ///
    /// # Errors
    ///
    /// Returns [`FeedError::PermissionDenied`] when location access is not
    /// available, or another [`FeedError`] for transient failures.
    fn current_position(&self) -> BoxFuture<'_, Result<GeoPoint, FeedError>>;
}

/// Push-based source of bus positions.
pub trait TargetPositionFeed: Send + Sync {
    /// Opens a stream of samples for `target_id`.
    ///
    /// The stream runs until dropped or until the feed closes it.
    ///
    /// # Errors
    ///
    /// Returns a [`FeedError`] if the subscription cannot be opened.
    fn subscribe(&self, target_id: &str) -> BoxFuture<'_, Result<TargetStream, FeedError>>;

    /// Human-readable route for `target_id`, if the feed knows one.
    fn route_label(&self, _target_id: &str) -> Option<String> {
        None
    }
}
