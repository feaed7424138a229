//! Human-readable distance and ETA strings.
//!
//! Output is plain ASCII with no locale handling.

/// Formats a distance in meters.
///
/// Below one kilometer the value is shown as whole meters (`"999m"`),
/// otherwise as kilometers with one decimal (`"2.5km"`).
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{}m", meters.max(0.0).trunc() as i64)
    } else {
        format!("{:.1}km", meters / 1000.0)
    }
}

/// Formats an ETA in whole minutes.
#[must_use]
pub fn format_eta(minutes: u32) -> String {
    match minutes {
        0 => "Arriving now".to_string(),
        1 => "1 min".to_string(),
        m if m < 60 => format!("{m} mins"),
        m => {
            let (hours, rest) = (m / 60, m % 60);
            if rest == 0 {
                format!("{hours}h")
            } else {
                format!("{hours}h {rest}m")
            }
        }
    }
}
