//! Stored session history.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};
use bustrack_core::{JsonSessionStore, TrackingSession};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::error::{ApiError, ApiResult, ErrorResponse};
use crate::state::SharedState;

/// Creates the sessions router.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/", get(list_sessions))
        .route("/{id}", get(get_session))
}

/// Stored sessions, newest first.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionListResponse {
    /// Sessions, newest first.
    pub sessions: Vec<TrackingSession>,

    /// Number of sessions returned.
    #[schema(example = 3)]
    pub total: usize,
}

fn store(state: &SharedState) -> ApiResult<&JsonSessionStore> {
    state.sessions.as_ref().ok_or_else(|| {
        ApiError::not_found("PERSISTENCE_DISABLED", "Session persistence is disabled")
    })
}

/// List stored sessions.
#[utoipa::path(
    get,
    path = "/api/sessions",
    tag = "sessions",
    operation_id = "listSessions",
    summary = "List past and current sessions",
    responses(
        (status = 200, description = "Stored sessions", body = SessionListResponse),
        (status = 404, description = "Persistence disabled", body = ErrorResponse)
    )
)]
pub async fn list_sessions(State(state): State<SharedState>) -> ApiResult<Json<SessionListResponse>> {
    let sessions = store(&state)?.list().await?;
    Ok(Json(SessionListResponse {
        total: sessions.len(),
        sessions,
    }))
}

/// Get one stored session.
#[utoipa::path(
    get,
    path = "/api/sessions/{id}",
    tag = "sessions",
    operation_id = "getSession",
    summary = "Get a stored session",
    params(
        ("id" = Uuid, Path, description = "Session identifier")
    ),
    responses(
        (status = 200, description = "The session", body = TrackingSession),
        (status = 404, description = "Unknown session or persistence disabled", body = ErrorResponse)
    )
)]
pub async fn get_session(
    State(state): State<SharedState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<TrackingSession>> {
    store(&state)?
        .load(id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("SESSION_NOT_FOUND", format!("No session with id {id}")))
}
