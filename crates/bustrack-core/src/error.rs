//! Unified error types for the bustrack core library.
//!
//! This module provides a unified error type [`TrackerError`] that covers all failure
//! modes across the tracking system. Each module also has its own specific error types
//! (`FeedError`, `ConfigError`, `StoreError`) for internal use.
//!
//! # Design Principles
//!
//! - **Specific variants**: Each error variant captures exactly one failure mode
//! - **Actionable messages**: Error messages guide users toward resolution
//! - **HTTP-ready**: Error types include HTTP status codes and error codes
//!
//! # Example
//!
//! ```rust
//! use bustrack_core::error::{Result, TrackerError};
//!
//! fn require_session(active: bool) -> Result<()> {
//!     if !active {
//!         return Err(TrackerError::NoActiveSession);
//!     }
//!     Ok(())
//! }
//! ```

use std::path::PathBuf;
use thiserror::Error;

/// The unified error type for all bustrack operations.
#[derive(Debug, Error)]
pub enum TrackerError {
    // =========================================================================
    // TRACKING ERRORS
    // =========================================================================
    /// The observer's position could not be obtained.
    #[error("Observer position unavailable. Grant location access and try again.")]
    PermissionDenied,

    /// The target id has no feed data.
    #[error("No position data for target '{0}'. Check the bus id or try again later.")]
    TargetUnresolvable(String),

    /// A single position sample could not be fetched.
    #[error("Position sample failed: {0}")]
    TransientSampleFailure(String),

    /// A coordinate lies outside the WGS84 range.
    #[error("Invalid coordinate ({latitude}, {longitude}). Latitude must be within [-90, 90] and longitude within [-180, 180].")]
    InvalidCoordinate {
        /// Latitude in degrees.
        latitude: f64,
        /// Longitude in degrees.
        longitude: f64,
    },

    /// An observer or target identifier is malformed.
    #[error("Invalid identifier: '{0}'. Use 1-64 letters, digits, '.', '_', ':' or '-'.")]
    InvalidIdentifier(String),

    /// An operation required an active tracking session.
    #[error("No active tracking session")]
    NoActiveSession,

    // =========================================================================
    // CONFIGURATION ERRORS
    // =========================================================================
    /// The configuration file was not found at the expected path.
    #[error("Configuration file not found at: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// The configuration file exists but could not be parsed.
    #[error("Failed to parse configuration: {0}")]
    ConfigParseError(String),

    /// The configuration was parsed but contains invalid values.
    #[error("Configuration validation failed: {0}")]
    ConfigValidationError(String),

    // =========================================================================
    // PERSISTENCE & I/O ERRORS
    // =========================================================================
    /// An error occurred while persisting or reading session data.
    #[error("Persistence error: {0}")]
    PersistenceError(String),

    /// A low-level I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// A specialized [`Result`] type for bustrack operations.
pub type Result<T> = std::result::Result<T, TrackerError>;

impl TrackerError {
    /// Returns `true` if this error comes from tracking or position sampling.
    #[inline]
    #[must_use]
    pub const fn is_tracking_error(&self) -> bool {
        matches!(
            self,
            Self::PermissionDenied
                | Self::TargetUnresolvable(_)
                | Self::TransientSampleFailure(_)
                | Self::NoActiveSession
        )
    }

    /// Returns `true` if this error is caused by malformed caller input.
    #[inline]
    #[must_use]
    pub const fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCoordinate { .. } | Self::InvalidIdentifier(_)
        )
    }

    /// Returns `true` if this error is related to configuration.
    #[inline]
    #[must_use]
    pub const fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::ConfigNotFound(_) | Self::ConfigParseError(_) | Self::ConfigValidationError(_)
        )
    }

    /// Returns `true` if this error is related to I/O or persistence.
    #[inline]
    #[must_use]
    pub const fn is_io_error(&self) -> bool {
        matches!(self, Self::PersistenceError(_) | Self::IoError(_))
    }

    /// Returns `true` if this error is likely to clear on a later tick.
    #[inline]
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::TransientSampleFailure(_) | Self::TargetUnresolvable(_)
        )
    }

    /// Returns an HTTP-appropriate status code for this error.
    #[inline]
    #[must_use]
    pub const fn http_status_code(&self) -> u16 {
        match self {
            Self::InvalidCoordinate { .. } | Self::InvalidIdentifier(_) => 400,

            Self::PermissionDenied => 403,

            Self::ConfigNotFound(_) | Self::TargetUnresolvable(_) => 404,

            Self::NoActiveSession => 409,

            Self::ConfigParseError(_) | Self::ConfigValidationError(_) => 422,

            Self::PersistenceError(_) | Self::IoError(_) => 500,

            Self::TransientSampleFailure(_) => 503,
        }
    }

    /// Returns a machine-readable error code for API responses.
    #[inline]
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "PERMISSION_DENIED",
            Self::TargetUnresolvable(_) => "TARGET_UNRESOLVABLE",
            Self::TransientSampleFailure(_) => "TRANSIENT_SAMPLE_FAILURE",
            Self::InvalidCoordinate { .. } => "INVALID_COORDINATE",
            Self::InvalidIdentifier(_) => "INVALID_IDENTIFIER",
            Self::NoActiveSession => "NO_ACTIVE_SESSION",
            Self::ConfigNotFound(_) => "CONFIG_NOT_FOUND",
            Self::ConfigParseError(_) => "CONFIG_PARSE_ERROR",
            Self::ConfigValidationError(_) => "CONFIG_VALIDATION_ERROR",
            Self::PersistenceError(_) => "PERSISTENCE_ERROR",
            Self::IoError(_) => "IO_ERROR",
        }
    }
}

// =============================================================================
// CONVERSIONS FROM MODULE-SPECIFIC ERRORS
// =============================================================================

impl From<crate::config::ConfigError> for TrackerError {
    fn from(err: crate::config::ConfigError) -> Self {
        use crate::config::ConfigError;
        match err {
            ConfigError::NotFound(path) => Self::ConfigNotFound(path),
            ConfigError::Load(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::SerializeError(e) => Self::ConfigParseError(e.to_string()),
            ConfigError::WriteError { path, source } => {
                Self::PersistenceError(format!("Failed to write {}: {}", path.display(), source))
            }
            ConfigError::ValidationError { field, message } => {
                Self::ConfigValidationError(format!("{field}: {message}"))
            }
            ConfigError::MultipleValidationErrors(errors) => {
                let messages: Vec<String> = errors.into_iter().map(|e| e.to_string()).collect();
                Self::ConfigValidationError(messages.join("; "))
            }
        }
    }
}

impl From<crate::feed::FeedError> for TrackerError {
    fn from(err: crate::feed::FeedError) -> Self {
        use crate::feed::FeedError;
        match err {
            FeedError::PermissionDenied => Self::PermissionDenied,
            FeedError::Unresolved { target_id } => Self::TargetUnresolvable(target_id),
            FeedError::Timeout { timeout_ms } => {
                Self::TransientSampleFailure(format!("timed out after {timeout_ms} ms"))
            }
            FeedError::Unavailable { message } => Self::TransientSampleFailure(message),
        }
    }
}

impl From<crate::storage::StoreError> for TrackerError {
    fn from(err: crate::storage::StoreError) -> Self {
        use crate::storage::StoreError;
        match err {
            StoreError::Io { path, source } => {
                Self::PersistenceError(format!("{}: {}", path.display(), source))
            }
            StoreError::Serialize(e) => Self::PersistenceError(e.to_string()),
            StoreError::Parse { path, source } => Self::PersistenceError(format!(
                "Failed to parse {}: {}",
                path.display(),
                source
            )),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
