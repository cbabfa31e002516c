//! Time resolver: turn hand angles into a digital time.
//!
//! Minutes are floored to whole 6° steps. The hour is floored to 30° steps,
//! except that an hour hand within the tolerance band just before the next
//! hour mark counts as already past it. The band only rounds forward: an
//! hour hand just past a mark never rounds back.

use crate::types::{AngleReading, Circle, DigitalTime, HourSource, ReadingWarning, TimeReading};

/// Degrees per hour on the dial.
const DEGREES_PER_HOUR: f64 = 30.0;

/// Degrees per minute on the dial.
const DEGREES_PER_MINUTE: f64 = 6.0;

/// Map angles in `[0, 360)` to a 12-hour time.
///
/// `hour_tolerance` is the forward rounding band in degrees (3.0 by
/// default).
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn resolve(hour_angle: f64, minute_angle: f64, hour_tolerance: f64) -> DigitalTime {
    let minute = (minute_angle / DEGREES_PER_MINUTE).floor().rem_euclid(60.0) as u8;

    let mut hour_angle = hour_angle;
    let current = (hour_angle / DEGREES_PER_HOUR).floor();
    let nudged = ((hour_angle + hour_tolerance) / DEGREES_PER_HOUR).floor();
    if current < nudged {
        hour_angle += hour_tolerance;
    }
    let hour = (hour_angle / DEGREES_PER_HOUR).floor().rem_euclid(12.0) as u8;

    DigitalTime::new(hour, minute)
}

/// Build the final reading, flagging an hour taken from the minute hand.
#[must_use]
pub fn resolve_reading(
    circle: Circle,
    angles: AngleReading,
    source: HourSource,
    hour_tolerance: f64,
) -> TimeReading {
    let time = resolve(angles.hour_angle, angles.minute_angle, hour_tolerance);
    let warning = match source {
        HourSource::Detected => None,
        HourSource::MinuteFallback => Some(ReadingWarning::LowConfidenceHour),
    };
    tracing::debug!(%time, low_confidence = warning.is_some(), "resolved time");
    TimeReading {
        time,
        circle,
        angles,
        warning,
    }
}
