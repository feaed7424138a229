//! # bustrack-core
//!
//! Core logic for the bustrack live bus tracker.
//!
//! This crate provides:
//! - Great-circle distance, ETA estimation and display formatting
//! - A tracking session controller that samples positions, recomputes
//!   distance and ETA on an interval, and publishes updates
//! - An in-memory position hub and a demo route simulator
//! - Configuration loading and persistent session storage
//!
//! ## Architecture
//!
//! - [`geo`] - Coordinates and Haversine distance
//! - [`eta`] - Whole-minute arrival estimates
//! - [`format`] - Human-readable distance and ETA text
//! - [`controller`] - Session lifecycle and the three tracking tasks
//! - [`feed`] - Position feed traits the controller consumes
//! - [`hub`] - Push-fed implementation of both feeds
//! - [`demo`] - Simulated bus driving a looping route
//! - [`notify`] - Persistent tracking indicator
//! - [`storage`] - Session persistence as JSON files
//! - [`config`] - Application configuration loading, saving, and validation
//! - [`error`] - Unified error types for the crate
//! - [`types`] - Shared domain types and OpenAPI schemas

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![warn(missing_docs)]

pub mod config;
pub mod controller;
pub mod demo;
pub mod error;
pub mod eta;
pub mod feed;
pub mod format;
pub mod geo;
pub mod hub;
pub mod notify;
pub mod storage;
pub mod types;

// Re-export primary types for convenience
pub use config::{
    default_config_path, AppConfig, ConfigError, ConfigResult, DemoConfig, ServerConfig,
    StorageConfig, TrackingConfig,
};
pub use controller::TrackingController;
pub use demo::DemoSimulator;
pub use error::{Result, TrackerError};
pub use eta::eta_minutes;
pub use feed::{BoxFuture, FeedError, ObserverPositionFeed, TargetPositionFeed, TargetStream};
pub use format::{format_distance, format_eta};
pub use geo::{distance_meters, GeoPoint, EARTH_RADIUS_METERS};
pub use hub::PositionHub;
pub use notify::{NoopNotificationSink, NotificationSink};
pub use storage::{default_data_dir, JsonSessionStore, NoopSessionStore, SessionStore, StoreError};
pub use types::{
    is_valid_identifier, DisplayPayload, NotificationAction, SessionStatus, TrackedEntityState,
    TrackingErrorKind, TrackingErrorReport, TrackingEvent, TrackingSession, TrackingUpdate,
};
