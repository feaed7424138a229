//! Tracking session API endpoints.
//!
//! A rider starts tracking one bus at a time. While the session is active
//! the server recomputes distance and ETA every interval; these endpoints
//! read the latest snapshot, surface errors, and end the session.

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use bustrack_core::{DisplayPayload, NotificationAction, TrackingErrorReport, TrackingUpdate};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::api::error::{ApiResult, ErrorResponse};
use crate::state::SharedState;

/// Creates the tracking router with all endpoints.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(get_tracking))
        .route("/start", post(start_tracking))
        .route("/stop", post(stop_tracking))
        .route("/cancel", post(cancel_tracking))
        .route("/error", get(get_error).delete(clear_error))
        .route("/actions", post(handle_action))
        .route("/notification", get(get_notification))
}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Start tracking a bus.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "target_id": "bus-42",
    "observer_id": "rider-7"
}))]
pub struct StartTrackingRequest {
    /// Bus to track.
    #[schema(example = "bus-42")]
    pub target_id: String,

    /// Rider doing the tracking.
    #[schema(example = "rider-7")]
    pub observer_id: String,
}

/// Current tracking state.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TrackingStatusResponse {
    /// Whether a session is active.
    #[schema(example = true)]
    pub active: bool,

    /// Latest snapshot, including the final one of an ended session.
    #[schema(nullable)]
    pub snapshot: Option<TrackingUpdate>,
}

/// Error currently shown to the user.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TrackingErrorResponse {
    /// The error, or null when there is none.
    #[schema(nullable)]
    pub error: Option<TrackingErrorReport>,
}

/// Result of dismissing the error.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ClearErrorResponse {
    /// Whether an error was set before.
    #[schema(example = true)]
    pub cleared: bool,
}

/// Action chosen from the tracking notification.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "action": "stop_tracking" }))]
pub struct ActionRequest {
    /// Which action was chosen.
    pub action: NotificationAction,
}

/// Outcome of a notification action.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ActionResponse {
    /// The action that was applied.
    pub action: NotificationAction,

    /// Snapshot after applying it.
    #[schema(nullable)]
    pub snapshot: Option<TrackingUpdate>,
}

/// What the tracking indicator currently shows.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct NotificationResponse {
    /// Whether the indicator is visible.
    #[schema(example = true)]
    pub visible: bool,

    /// Indicator content.
    #[schema(nullable)]
    pub payload: Option<DisplayPayload>,
}

// ============================================================================
// Handlers
// ============================================================================

/// Get the latest tracking snapshot.
#[utoipa::path(
    get,
    path = "/api/tracking",
    tag = "tracking",
    operation_id = "getTracking",
    summary = "Get current tracking state",
    description = "Returns whether a session is active and the most recently published \
        snapshot with distance, ETA and display text. After a session ends the final \
        snapshot stays available until a new session starts.",
    responses(
        (status = 200, description = "Tracking state", body = TrackingStatusResponse)
    )
)]
pub async fn get_tracking(State(state): State<SharedState>) -> Json<TrackingStatusResponse> {
    Json(TrackingStatusResponse {
        active: state.controller.is_active().await,
        snapshot: state.controller.snapshot(),
    })
}

/// Start tracking a bus.
#[utoipa::path(
    post,
    path = "/api/tracking/start",
    tag = "tracking",
    operation_id = "startTracking",
    summary = "Start tracking a bus",
    description = "Starts a tracking session. If one is already active it is left \
        untouched and its snapshot is returned. Fails if the rider's position is \
        unavailable.",
    request_body = StartTrackingRequest,
    responses(
        (status = 200, description = "Session started or already active", body = TrackingUpdate),
        (status = 400, description = "Malformed bus or rider id", body = ErrorResponse),
        (status = 403, description = "Rider position unavailable", body = ErrorResponse)
    )
)]
pub async fn start_tracking(
    State(state): State<SharedState>,
    Json(request): Json<StartTrackingRequest>,
) -> ApiResult<Json<TrackingUpdate>> {
    let update = state
        .controller
        .start(&request.target_id, &request.observer_id)
        .await?;
    Ok(Json(update))
}

/// Stop tracking.
#[utoipa::path(
    post,
    path = "/api/tracking/stop",
    tag = "tracking",
    operation_id = "stopTracking",
    summary = "Stop tracking",
    description = "Ends the active session as completed and hides the notification. \
        No further updates are published once this returns.",
    responses(
        (status = 200, description = "Session completed", body = TrackingUpdate),
        (status = 409, description = "No active session", body = ErrorResponse)
    )
)]
pub async fn stop_tracking(State(state): State<SharedState>) -> ApiResult<Json<TrackingUpdate>> {
    Ok(Json(state.controller.stop().await?))
}

/// Cancel tracking.
#[utoipa::path(
    post,
    path = "/api/tracking/cancel",
    tag = "tracking",
    operation_id = "cancelTracking",
    summary = "Cancel tracking",
    description = "Ends the active session as cancelled.",
    responses(
        (status = 200, description = "Session cancelled", body = TrackingUpdate),
        (status = 409, description = "No active session", body = ErrorResponse)
    )
)]
pub async fn cancel_tracking(
    State(state): State<SharedState>,
) -> ApiResult<Json<TrackingUpdate>> {
    Ok(Json(state.controller.cancel().await?))
}

/// Read the current error.
#[utoipa::path(
    get,
    path = "/api/tracking/error",
    tag = "tracking",
    operation_id = "getTrackingError",
    summary = "Get the current tracking error",
    description = "Returns the last surfaced error, such as a missing rider position \
        or a bus with no feed data. It stays set until dismissed.",
    responses(
        (status = 200, description = "Current error, if any", body = TrackingErrorResponse)
    )
)]
pub async fn get_error(State(state): State<SharedState>) -> Json<TrackingErrorResponse> {
    Json(TrackingErrorResponse {
        error: state.controller.last_error(),
    })
}

/// Dismiss the current error.
#[utoipa::path(
    delete,
    path = "/api/tracking/error",
    tag = "tracking",
    operation_id = "clearTrackingError",
    summary = "Dismiss the current tracking error",
    responses(
        (status = 200, description = "Error dismissed", body = ClearErrorResponse)
    )
)]
pub async fn clear_error(State(state): State<SharedState>) -> Json<ClearErrorResponse> {
    Json(ClearErrorResponse {
        cleared: state.controller.clear_error(),
    })
}

/// Apply a notification action.
#[utoipa::path(
    post,
    path = "/api/tracking/actions",
    tag = "tracking",
    operation_id = "handleNotificationAction",
    summary = "Apply a notification action",
    description = "`stop_tracking` ends the session; `open_tracking_view` returns the \
        current snapshot.",
    request_body = ActionRequest,
    responses(
        (status = 200, description = "Action applied", body = ActionResponse),
        (status = 409, description = "No active session to stop", body = ErrorResponse)
    )
)]
pub async fn handle_action(
    State(state): State<SharedState>,
    Json(request): Json<ActionRequest>,
) -> ApiResult<Json<ActionResponse>> {
    let snapshot = state.controller.handle_action(request.action).await?;
    Ok(Json(ActionResponse {
        action: request.action,
        snapshot,
    }))
}

/// Read the notification content.
#[utoipa::path(
    get,
    path = "/api/tracking/notification",
    tag = "tracking",
    operation_id = "getNotification",
    summary = "Get the tracking notification",
    description = "Returns the route, distance and ETA text the persistent tracking \
        indicator shows. Hidden when no session is active.",
    responses(
        (status = 200, description = "Notification content", body = NotificationResponse)
    )
)]
pub async fn get_notification(State(state): State<SharedState>) -> Json<NotificationResponse> {
    let payload = state.notification.current();
    Json(NotificationResponse {
        visible: payload.is_some(),
        payload,
    })
}
