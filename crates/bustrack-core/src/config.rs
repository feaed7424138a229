//! Application configuration management.
//!
//! Handles loading, saving, and validating bustrack configuration:
//! - Tracking cadence, sample timeout and error thresholds
//! - HTTP server binding and logging mode
//! - Session storage location
//! - Demo data simulation
//!
//! Configuration is layered: an optional TOML file, then environment
//! variables prefixed with `BUSTRACK__` (nested keys separated by `__`,
//! e.g. `BUSTRACK__TRACKING__INTERVAL_MS=2000`).

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::geo::GeoPoint;
use crate::storage::default_data_dir;
use crate::types::is_valid_identifier;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "BUSTRACK";

/// Errors raised while loading, saving or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The requested configuration file does not exist.
    #[error("Configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The configuration sources could not be read or deserialized.
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    /// The configuration could not be serialized to TOML.
    #[error("Failed to serialize configuration: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// The configuration file could not be written.
    #[error("Failed to write {}: {source}", .path.display())]
    WriteError {
        /// Destination path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A single field failed validation.
    #[error("{field}: {message}")]
    ValidationError {
        /// Dotted field path.
        field: String,
        /// What is wrong with it.
        message: String,
    },

    /// Several fields failed validation.
    #[error("{} validation errors", .0.len())]
    MultipleValidationErrors(Vec<ConfigError>),
}

/// Result type for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Main application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Tracking session behaviour.
    pub tracking: TrackingConfig,

    /// HTTP server settings.
    pub server: ServerConfig,

    /// Session persistence.
    pub storage: StorageConfig,

    /// Simulated bus and observer.
    pub demo: DemoConfig,
}

/// Tracking session behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Sampling and publishing interval in milliseconds.
    pub interval_ms: u64,

    /// Upper bound on a single position fetch in milliseconds.
    pub sample_timeout_ms: u64,

    /// Consecutive ticks without bus data before an error is surfaced.
    pub unresolved_tick_threshold: u32,

    /// Capacity of the event broadcast channel.
    pub event_buffer: usize,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            interval_ms: 5_000,
            sample_timeout_ms: 10_000,
            unresolved_tick_threshold: 3,
            event_buffer: 64,
        }
    }
}

impl TrackingConfig {
    /// Sampling interval.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Single-fetch timeout.
    #[must_use]
    pub const fn sample_timeout(&self) -> Duration {
        Duration::from_millis(self.sample_timeout_ms)
    }

    fn validate_into(&self, errors: &mut Vec<ConfigError>) {
        if self.interval_ms == 0 {
            errors.push(invalid("tracking.interval_ms", "must be greater than 0"));
        }
        if self.sample_timeout_ms == 0 {
            errors.push(invalid("tracking.sample_timeout_ms", "must be greater than 0"));
        }
        if self.unresolved_tick_threshold == 0 {
            errors.push(invalid(
                "tracking.unresolved_tick_threshold",
                "must be at least 1",
            ));
        }
        if self.event_buffer == 0 {
            errors.push(invalid("tracking.event_buffer", "must be at least 1"));
        }
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Socket address to listen on.
    pub bind_address: String,

    /// Production logging (JSON files + compact stdout).
    pub production: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
            production: false,
        }
    }
}

impl ServerConfig {
    /// Parsed bind address.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the address does not parse.
    pub fn socket_addr(&self) -> ConfigResult<SocketAddr> {
        self.bind_address
            .parse()
            .map_err(|e| invalid("server.bind_address", &format!("{e}")))
    }
}

/// Session persistence settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Whether sessions are written to disk.
    pub enabled: bool,

    /// Data directory; the platform default when unset.
    pub data_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            data_dir: None,
        }
    }
}

impl StorageConfig {
    /// Data directory to use.
    #[must_use]
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }
}

/// Simulated bus and observer used instead of live position pushes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Run the simulator.
    pub enabled: bool,

    /// Id of the simulated bus.
    pub target_id: String,

    /// Route label of the simulated bus.
    pub route_label: String,

    /// Speed of the simulated bus in km/h.
    pub speed_kmh: f64,

    /// Fixed observer position.
    pub observer: GeoPoint,

    /// Waypoints the bus drives along, looping back to the start.
    pub route: Vec<GeoPoint>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            target_id: "demo-bus-1".to_string(),
            route_label: "Route 1 - Demo Loop".to_string(),
            speed_kmh: 25.0,
            observer: GeoPoint::new_unchecked(22.3072, 73.1812),
            route: vec![
                GeoPoint::new_unchecked(22.3200, 73.1650),
                GeoPoint::new_unchecked(22.3150, 73.1720),
                GeoPoint::new_unchecked(22.3090, 73.1850),
                GeoPoint::new_unchecked(22.3010, 73.1900),
            ],
        }
    }
}

impl DemoConfig {
    fn validate_into(&self, errors: &mut Vec<ConfigError>) {
        if !self.enabled {
            return;
        }
        if !is_valid_identifier(&self.target_id) {
            errors.push(invalid("demo.target_id", "is not a valid identifier"));
        }
        if !self.speed_kmh.is_finite() || self.speed_kmh < 0.0 {
            errors.push(invalid("demo.speed_kmh", "must be a non-negative number"));
        }
        if !self.observer.is_valid() {
            errors.push(invalid("demo.observer", "coordinate out of range"));
        }
        if self.route.len() < 2 {
            errors.push(invalid("demo.route", "needs at least two waypoints"));
        }
        if self.route.iter().any(|p| !p.is_valid()) {
            errors.push(invalid("demo.route", "contains a coordinate out of range"));
        }
    }
}

impl AppConfig {
    /// Load configuration from `path` (if given) layered under environment
    /// overrides, then validate it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::NotFound`] if `path` does not exist, a load
    /// error if a source cannot be parsed, or validation errors.
    pub fn load(path: Option<&Path>) -> ConfigResult<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            if !path.exists() {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            builder = builder.add_source(
                config::File::from(path).format(config::FileFormat::Toml),
            );
        }

        let settings = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise start from defaults.
    /// Environment overrides apply either way.
    ///
    /// # Errors
    ///
    /// Returns an error if an existing file or the environment is invalid.
    pub fn load_or_default(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            Self::load(Some(path))
        } else {
            Self::load(None)
        }
    }

    /// Write configuration to `path` as TOML, creating parent directories.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or the write fails.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::WriteError {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, content).map_err(|source| ConfigError::WriteError {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Validate every section, collecting all problems.
    ///
    /// # Errors
    ///
    /// Returns a single [`ConfigError::ValidationError`] or
    /// [`ConfigError::MultipleValidationErrors`].
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();
        self.tracking.validate_into(&mut errors);
        if let Err(e) = self.server.socket_addr() {
            errors.push(e);
        }
        self.demo.validate_into(&mut errors);

        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ConfigError::MultipleValidationErrors(errors)),
        }
    }
}

/// Default configuration file path.
///
/// On Linux: `/etc/bustrack/config.toml`
/// Elsewhere: the platform config directory.
#[must_use]
pub fn default_config_path() -> PathBuf {
    #[cfg(target_os = "linux")]
    {
        PathBuf::from("/etc/bustrack/config.toml")
    }
    #[cfg(not(target_os = "linux"))]
    {
        directories::ProjectDirs::from("", "", "bustrack").map_or_else(
            || PathBuf::from("./config.toml"),
            |dirs| dirs.config_dir().join("config.toml"),
        )
    }
}

fn invalid(field: &str, message: &str) -> ConfigError {
    ConfigError::ValidationError {
        field: field.to_string(),
        message: message.to_string(),
    }
}
