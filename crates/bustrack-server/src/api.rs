//! HTTP API routes and handlers.
//!
//! - `health` - Service health checks
//! - `tracking` - Tracking session lifecycle, snapshots, errors and notification
//! - `positions` - Rider and bus position feeds
//! - `sessions` - Stored session history
//! - `error` - API error types
//! - `openapi` - OpenAPI specification generation

use axum::routing::get;
use axum::Router;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::SharedState;

pub mod error;
pub mod health;
pub mod openapi;
pub mod positions;
pub mod sessions;
pub mod tracking;

pub use error::{ApiError, ApiResult, ErrorResponse};
pub use openapi::get_openapi_json;

/// Creates the combined API router with all endpoints.
///
/// # Route Structure
///
/// ```text
/// /health                - Health check
/// /api
/// ├── /tracking          - Session lifecycle, snapshot, error, notification
/// ├── /positions         - Rider and bus position pushes
/// ├── /sessions          - Stored session history
/// └── /openapi.json      - OpenAPI specification
/// ```
pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .nest("/health", health::router())
        .nest(
            "/api",
            Router::new()
                .route("/openapi.json", get(openapi::get_openapi_spec))
                .nest("/tracking", tracking::router())
                .nest("/positions", positions::router())
                .nest("/sessions", sessions::router()),
        )
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
