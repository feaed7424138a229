//! Arrival time estimation.

/// Estimated minutes to cover `distance_m` meters at `speed_kmh`.
///
/// A speed of zero or less (or NaN) yields `0`: the target is treated as
/// stationary or of unknown speed rather than as an error. The result is
/// truncated toward zero.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn eta_minutes(distance_m: f64, speed_kmh: f64) -> u32 {
    if speed_kmh.is_nan() || speed_kmh <= 0.0 {
        return 0;
    }

    let meters_per_minute = speed_kmh * 1000.0 / 60.0;
    // `as` saturates, so huge or negative distances clamp into range.
    (distance_m / meters_per_minute) as u32
}
