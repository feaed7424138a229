//! Shared tracking types and OpenAPI schemas.
//!
//! Everything here is a plain value: sessions are owned and mutated by the
//! [`TrackingController`](crate::controller::TrackingController), and callers
//! only ever see clones published through its channels.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::geo::GeoPoint;

static IDENTIFIER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._:-]{0,63}$").expect("identifier regex is valid")
});

/// Returns `true` if `id` is usable as an observer or target identifier.
///
/// Identifiers are 1-64 characters of ASCII letters, digits, `.`, `_`, `:`
/// or `-`, starting with a letter or digit.
#[must_use]
pub fn is_valid_identifier(id: &str) -> bool {
    IDENTIFIER_RE.is_match(id)
}

/// One position sample of a tracked entity (observer or bus).
///
/// Samples are superseded by newer ones, never edited in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TrackedEntityState {
    /// Entity identifier.
    #[schema(example = "bus-42")]
    pub id: String,

    /// Sampled position.
    pub position: GeoPoint,

    /// Ground speed in km/h, never negative.
    #[schema(example = 30.0, minimum = 0)]
    pub speed_kmh: f64,

    /// When the sample was taken.
    pub captured_at: DateTime<Utc>,
}

impl TrackedEntityState {
    /// Creates a sample captured now. Negative or NaN speeds become 0.
    #[must_use]
    pub fn now(id: impl Into<String>, position: GeoPoint, speed_kmh: f64) -> Self {
        Self {
            id: id.into(),
            position,
            speed_kmh: if speed_kmh.is_nan() { 0.0 } else { speed_kmh.max(0.0) },
            captured_at: Utc::now(),
        }
    }
}

/// Lifecycle status of a tracking session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    /// Sampling and publishing.
    Active,
    /// Stopped by the user.
    Completed,
    /// Abandoned by the user.
    Cancelled,
}

impl SessionStatus {
    /// Completed and cancelled sessions never change again.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

/// A bounded period during which an observer's distance to a bus is tracked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TrackingSession {
    /// Session identifier.
    pub id: Uuid,

    /// Who is watching.
    #[schema(example = "rider-7")]
    pub observer_id: String,

    /// Which bus is being watched.
    #[schema(example = "bus-42")]
    pub target_id: String,

    /// Route shown alongside the bus, if the feed knows it.
    #[schema(example = "Route 12 - Central Station")]
    pub route_label: Option<String>,

    /// When tracking started.
    pub started_at: DateTime<Utc>,

    /// When tracking ended; `None` while active.
    pub ended_at: Option<DateTime<Utc>>,

    /// Current status.
    pub status: SessionStatus,

    /// Most recent observer position.
    pub observer_position: Option<GeoPoint>,

    /// Most recent bus position.
    pub target_position: Option<GeoPoint>,

    /// Most recent distance between the two, in meters.
    pub distance_m: Option<f64>,
}

impl TrackingSession {
    /// Creates an active session starting now.
    #[must_use]
    pub fn begin(
        observer_id: impl Into<String>,
        target_id: impl Into<String>,
        route_label: Option<String>,
        observer_position: GeoPoint,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            observer_id: observer_id.into(),
            target_id: target_id.into(),
            route_label,
            started_at: Utc::now(),
            ended_at: None,
            status: SessionStatus::Active,
            observer_position: Some(observer_position),
            target_position: None,
            distance_m: None,
        }
    }

    /// Returns `true` while the session is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }
}

/// Immutable snapshot published to subscribers after each recomputation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "session_id": "6f1c2f2e-3f8a-4b55-9a57-0c5d0b0f6a11",
    "target_id": "bus-42",
    "route_label": "Route 12",
    "status": "active",
    "observer_position": { "latitude": 22.3072, "longitude": 73.1812 },
    "target_position": { "latitude": 22.3090, "longitude": 73.1850 },
    "target_speed_kmh": 30.0,
    "distance_m": 439.18,
    "eta_minutes": 0,
    "distance_text": "439m",
    "eta_text": "Arriving now",
    "published_at": "2025-01-15T08:30:00Z"
}))]
pub struct TrackingUpdate {
    /// Session this snapshot belongs to.
    pub session_id: Uuid,

    /// Tracked bus.
    pub target_id: String,

    /// Route label, if known.
    pub route_label: Option<String>,

    /// Session status at publish time.
    pub status: SessionStatus,

    /// Latest observer position.
    pub observer_position: Option<GeoPoint>,

    /// Latest bus position.
    pub target_position: Option<GeoPoint>,

    /// Latest bus speed in km/h. Zero speed also yields a zero ETA.
    pub target_speed_kmh: Option<f64>,

    /// Great-circle distance in meters.
    pub distance_m: Option<f64>,

    /// Whole minutes until arrival.
    pub eta_minutes: Option<u32>,

    /// Display form of `distance_m`.
    pub distance_text: Option<String>,

    /// Display form of `eta_minutes`.
    pub eta_text: Option<String>,

    /// When this snapshot was built.
    pub published_at: DateTime<Utc>,
}

/// Kinds of error reported on the controller's error channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TrackingErrorKind {
    /// Observer position could not be obtained at start.
    PermissionDenied,
    /// The bus id produced no data for several consecutive ticks.
    TargetUnresolvable,
    /// A one-off sample failure. Retried silently, kept for completeness.
    TransientSampleFailure,
}

/// A user-visible tracking error. Stays set until explicitly cleared.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct TrackingErrorReport {
    /// What went wrong.
    pub kind: TrackingErrorKind,

    /// Human-readable message.
    #[schema(example = "No position data for target 'bus-42'.")]
    pub message: String,

    /// Session affected, if one existed.
    pub session_id: Option<Uuid>,

    /// When the error was reported.
    pub reported_at: DateTime<Utc>,
}

impl TrackingErrorReport {
    /// Creates a report stamped now.
    #[must_use]
    pub fn new(kind: TrackingErrorKind, message: impl Into<String>, session_id: Option<Uuid>) -> Self {
        Self {
            kind,
            message: message.into(),
            session_id,
            reported_at: Utc::now(),
        }
    }
}

/// What the notification sink displays for an active session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DisplayPayload {
    /// Session being displayed.
    pub session_id: Uuid,

    /// Tracked bus.
    #[schema(example = "bus-42")]
    pub target_id: String,

    /// Route label, or the bus id when unknown.
    #[schema(example = "Route 12")]
    pub route_label: String,

    /// Formatted distance.
    #[schema(example = "1.2km")]
    pub distance_text: String,

    /// Formatted ETA.
    #[schema(example = "3 mins")]
    pub eta_text: String,
}

/// User actions surfaced by the notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationAction {
    /// End the current session.
    StopTracking,
    /// Bring up the tracking view for the current session.
    OpenTrackingView,
}

/// Events broadcast by the controller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum TrackingEvent {
    /// A new session began.
    Started(TrackingUpdate),
    /// Distance and ETA were recomputed.
    Updated(TrackingUpdate),
    /// The session reached a terminal status.
    Ended(TrackingUpdate),
    /// An error was surfaced.
    Error(TrackingErrorReport),
}
