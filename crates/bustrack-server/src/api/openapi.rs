//! OpenAPI specification for the bustrack API.

use axum::Json;
use bustrack_core::{
    DisplayPayload, GeoPoint, NotificationAction, SessionStatus, TrackedEntityState,
    TrackingErrorKind, TrackingErrorReport, TrackingSession, TrackingUpdate,
};
use utoipa::OpenApi;

use super::error::ErrorResponse;
use super::health::HealthResponse;
use super::positions::{ObserverFixRequest, TargetFixRequest, TargetListResponse};
use super::sessions::SessionListResponse;
use super::tracking::{
    ActionRequest, ActionResponse, ClearErrorResponse, NotificationResponse,
    StartTrackingRequest, TrackingErrorResponse, TrackingStatusResponse,
};

/// Serve the OpenAPI specification as JSON at `/api/openapi.json`.
pub async fn get_openapi_spec() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// The OpenAPI specification as pretty JSON.
///
/// # Errors
///
/// Returns an error if the document cannot be serialized.
pub fn get_openapi_json() -> Result<String, serde_json::Error> {
    ApiDoc::openapi().to_pretty_json()
}

/// Main OpenAPI document structure for bustrack.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "bustrack API",
        version = "0.1.0",
        description = r#"
# bustrack API

Live distance and arrival estimates for the bus you are waiting for.

## Overview

1. **Positions**: riders push their own fix, bus trackers push bus fixes
2. **Tracking**: start a session for one bus; the server recomputes distance
   and ETA every interval and keeps a notification payload up to date
3. **Sessions**: past sessions are kept as history

ETA is whole minutes at the bus's current speed. `0` means the bus is
arriving or its speed is unknown; check `target_speed_kmh` to tell them apart.
"#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Local bustrack server")
    ),
    tags(
        (name = "system", description = "Health checks"),
        (name = "tracking", description = "Tracking session lifecycle, snapshots and errors"),
        (name = "positions", description = "Rider and bus position feeds"),
        (name = "sessions", description = "Stored session history")
    ),
    paths(
        super::health::health_check,
        super::tracking::get_tracking,
        super::tracking::start_tracking,
        super::tracking::stop_tracking,
        super::tracking::cancel_tracking,
        super::tracking::get_error,
        super::tracking::clear_error,
        super::tracking::handle_action,
        super::tracking::get_notification,
        super::positions::push_observer,
        super::positions::clear_observer,
        super::positions::list_targets,
        super::positions::push_target,
        super::positions::clear_target,
        super::sessions::list_sessions,
        super::sessions::get_session,
    ),
    components(
        schemas(
            ErrorResponse,
            HealthResponse,
            // Tracking
            StartTrackingRequest,
            TrackingStatusResponse,
            TrackingErrorResponse,
            ClearErrorResponse,
            ActionRequest,
            ActionResponse,
            NotificationResponse,
            // Positions
            ObserverFixRequest,
            TargetFixRequest,
            TargetListResponse,
            // Sessions
            SessionListResponse,
            // Domain
            GeoPoint,
            TrackedEntityState,
            TrackingSession,
            SessionStatus,
            TrackingUpdate,
            TrackingErrorKind,
            TrackingErrorReport,
            DisplayPayload,
            NotificationAction,
        )
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_generation() {
        let spec = ApiDoc::openapi();
        assert_eq!(spec.info.title, "bustrack API");
        assert!(spec.paths.paths.contains_key("/api/tracking/start"));
        assert!(spec.paths.paths.contains_key("/api/positions/targets/{target_id}"));
    }

    #[test]
    fn test_openapi_json_serialization() {
        let json = get_openapi_json().unwrap();
        assert!(json.contains("\"openapi\":"));
        assert!(json.contains("\"bustrack API\""));
        assert!(json.contains("TrackingUpdate"));
    }
}
