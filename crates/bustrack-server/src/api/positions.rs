//! Position feed endpoints.
//!
//! Riders push their own fix; bus trackers (or the demo simulator) push bus
//! fixes. Both land in the shared position hub the controller samples.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use bustrack_core::{is_valid_identifier, GeoPoint, TrackedEntityState, TrackerError};
use serde::{Deserialize, Serialize};
use tracing::debug;
use utoipa::ToSchema;

use crate::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::state::SharedState;

/// Creates the positions router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/observer", post(push_observer).delete(clear_observer))
        .route("/targets", get(list_targets))
        .route("/targets/{target_id}", post(push_target).delete(clear_target))
}

/// A rider's position fix.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "latitude": 22.3072, "longitude": 73.1812 }))]
pub struct ObserverFixRequest {
    /// Latitude in decimal degrees.
    #[schema(example = 22.3072)]
    pub latitude: f64,

    /// Longitude in decimal degrees.
    #[schema(example = 73.1812)]
    pub longitude: f64,
}

/// A bus position fix.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({
    "latitude": 22.3090,
    "longitude": 73.1850,
    "speed_kmh": 28.5,
    "route_label": "Route 12 - Central Station"
}))]
pub struct TargetFixRequest {
    /// Latitude in decimal degrees.
    #[schema(example = 22.309)]
    pub latitude: f64,

    /// Longitude in decimal degrees.
    #[schema(example = 73.185)]
    pub longitude: f64,

    /// Ground speed in km/h. Missing means stationary.
    #[serde(default)]
    #[schema(example = 28.5)]
    pub speed_kmh: f64,

    /// Route label to show with this bus.
    #[serde(default)]
    #[schema(nullable, example = "Route 12 - Central Station")]
    pub route_label: Option<String>,
}

/// Latest sample of every known bus.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TargetListResponse {
    /// Buses with data, sorted by id.
    pub targets: Vec<TrackedEntityState>,
}

/// Push the rider's position.
#[utoipa::path(
    post,
    path = "/api/positions/observer",
    tag = "positions",
    operation_id = "pushObserverPosition",
    summary = "Push the rider's position",
    request_body = ObserverFixRequest,
    responses(
        (status = 200, description = "Position accepted", body = GeoPoint),
        (status = 400, description = "Coordinate out of range", body = ErrorResponse)
    )
)]
pub async fn push_observer(
    State(state): State<SharedState>,
    Json(request): Json<ObserverFixRequest>,
) -> ApiResult<Json<GeoPoint>> {
    let position = GeoPoint::new(request.latitude, request.longitude)?;
    state.hub.push_observer(position);
    debug!(lat = position.latitude(), lon = position.longitude(), "Observer position pushed");
    Ok(Json(position))
}

/// Forget the rider's position.
#[utoipa::path(
    delete,
    path = "/api/positions/observer",
    tag = "positions",
    operation_id = "clearObserverPosition",
    summary = "Forget the rider's position",
    description = "Behaves as if location access was revoked. New sessions cannot \
        start until a fix is pushed again.",
    responses(
        (status = 204, description = "Position cleared")
    )
)]
pub async fn clear_observer(State(state): State<SharedState>) -> StatusCode {
    state.hub.clear_observer();
    StatusCode::NO_CONTENT
}

/// List every bus with data.
#[utoipa::path(
    get,
    path = "/api/positions/targets",
    tag = "positions",
    operation_id = "listTargets",
    summary = "List known buses",
    responses(
        (status = 200, description = "Latest sample per bus", body = TargetListResponse)
    )
)]
pub async fn list_targets(State(state): State<SharedState>) -> Json<TargetListResponse> {
    let mut targets = Vec::new();
    for id in state.hub.target_ids().await {
        if let Some(sample) = state.hub.target(&id).await {
            targets.push(sample);
        }
    }
    Json(TargetListResponse { targets })
}

/// Push a bus position.
#[utoipa::path(
    post,
    path = "/api/positions/targets/{target_id}",
    tag = "positions",
    operation_id = "pushTargetPosition",
    summary = "Push a bus position",
    params(
        ("target_id" = String, Path, description = "Bus identifier", example = "bus-42")
    ),
    request_body = TargetFixRequest,
    responses(
        (status = 200, description = "Sample accepted", body = TrackedEntityState),
        (status = 400, description = "Bad id, coordinate or speed", body = ErrorResponse)
    )
)]
pub async fn push_target(
    State(state): State<SharedState>,
    Path(target_id): Path<String>,
    Json(request): Json<TargetFixRequest>,
) -> ApiResult<Json<TrackedEntityState>> {
    if !is_valid_identifier(&target_id) {
        return Err(TrackerError::InvalidIdentifier(target_id).into());
    }
    if !request.speed_kmh.is_finite() || request.speed_kmh < 0.0 {
        return Err(ApiError::bad_request(
            "INVALID_SPEED",
            "speed_kmh must be a non-negative number",
        ));
    }

    let position = GeoPoint::new(request.latitude, request.longitude)?;
    let sample = TrackedEntityState::now(target_id, position, request.speed_kmh);
    state
        .hub
        .push_target(sample.clone(), request.route_label)
        .await;
    Ok(Json(sample))
}

/// Mark a bus as having no data.
#[utoipa::path(
    delete,
    path = "/api/positions/targets/{target_id}",
    tag = "positions",
    operation_id = "clearTargetPosition",
    summary = "Mark a bus as off the feed",
    params(
        ("target_id" = String, Path, description = "Bus identifier", example = "bus-42")
    ),
    responses(
        (status = 204, description = "Bus cleared")
    )
)]
pub async fn clear_target(
    State(state): State<SharedState>,
    Path(target_id): Path<String>,
) -> StatusCode {
    state.hub.clear_target(&target_id).await;
    StatusCode::NO_CONTENT
}
