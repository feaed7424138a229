//! Geographic coordinates and great-circle distance.
//!
//! Distances use the Haversine formula on a spherical Earth of radius
//! [`EARTH_RADIUS_METERS`]. This is accurate to well under 0.5% for the
//! city-scale distances a bus tracker deals with.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{Result, TrackerError};

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// A WGS84 latitude/longitude pair in degrees.
///
/// Latitude lies in `[-90, 90]` and longitude in `[-180, 180]`. Values built
/// with [`GeoPoint::new`] are checked; [`GeoPoint::new_unchecked`] leaves the
/// check to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
#[schema(example = json!({ "latitude": 22.3072, "longitude": 73.1812 }))]
pub struct GeoPoint {
    /// Latitude in degrees.
    #[schema(example = 22.3072)]
    latitude: f64,

    /// Longitude in degrees.
    #[schema(example = 73.1812)]
    longitude: f64,
}

impl GeoPoint {
    /// Creates a point, rejecting coordinates outside the WGS84 range.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::InvalidCoordinate`] when either component is
    /// out of range or not a finite number.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if is_valid_latitude(latitude) && is_valid_longitude(longitude) {
            Ok(Self {
                latitude,
                longitude,
            })
        } else {
            Err(TrackerError::InvalidCoordinate {
                latitude,
                longitude,
            })
        }
    }

    /// Creates a point without range checks.
    #[must_use]
    pub const fn new_unchecked(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Latitude in degrees.
    #[must_use]
    pub const fn latitude(&self) -> f64 {
        self.latitude
    }

    /// Longitude in degrees.
    #[must_use]
    pub const fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Returns `true` if both components are within range.
    ///
    /// Deserialized points bypass [`GeoPoint::new`], so callers accepting
    /// external input should check this.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        is_valid_latitude(self.latitude) && is_valid_longitude(self.longitude)
    }

    /// Great-circle distance to `other` in meters.
    #[must_use]
    pub fn distance_to(&self, other: &Self) -> f64 {
        distance_meters(*self, *other)
    }
}

/// Haversine great-circle distance between two points, in meters.
///
/// Symmetric in its arguments and zero for identical points.
#[must_use]
pub fn distance_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let sin_lat = (d_lat / 2.0).sin();
    let sin_lon = (d_lon / 2.0).sin();

    // Rounding can push h a hair past 1 for antipodal points.
    let h = sin_lat
        .mul_add(
            sin_lat,
            a.latitude.to_radians().cos() * b.latitude.to_radians().cos() * sin_lon * sin_lon,
        )
        .clamp(0.0, 1.0);

    2.0 * EARTH_RADIUS_METERS * h.sqrt().atan2((1.0 - h).sqrt())
}

fn is_valid_latitude(latitude: f64) -> bool {
    (-90.0..=90.0).contains(&latitude)
}

fn is_valid_longitude(longitude: f64) -> bool {
    (-180.0..=180.0).contains(&longitude)
}
