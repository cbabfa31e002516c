//! Angle calculator: compass angle of a hand around the face center.
//!
//! Angles are measured from 12 o'clock, clockwise, in degrees in
//! `[0, 360)`. Image y grows downward, so "up" is the vector (0, -1).

use crate::types::{AngleReading, ClassifiedHands, HourSource, PipelineError, Point, Segment};

/// Angle of the hand whose far tip is `segment.p2`.
///
/// # Errors
///
/// Returns [`PipelineError::DegenerateSegment`] when `p2` coincides with
/// `center`.
pub fn angle(center: Point, segment: &Segment) -> Result<f64, PipelineError> {
    let vx = segment.p2.x - center.x;
    let vy = segment.p2.y - center.y;
    let norm = vx.hypot(vy);
    if norm < f64::EPSILON {
        return Err(PipelineError::DegenerateSegment);
    }
    // Dot product with (0, -1) over |v|.
    let cos = (-vy / norm).clamp(-1.0, 1.0);
    let degrees = cos.acos().to_degrees();
    let compass = if vx < 0.0 { 360.0 - degrees } else { degrees };
    // A tiny negative vx with acos == 0 would give 360.
    Ok(if compass >= 360.0 { 0.0 } else { compass })
}

/// Angles of both hands.
///
/// A missing hour hand is read from the minute hand instead, reported as
/// [`HourSource::MinuteFallback`].
///
/// # Errors
///
/// Returns [`PipelineError::NoHandsDetected`] when there is no minute hand
/// and [`PipelineError::DegenerateSegment`] from [`angle`].
pub fn measure(
    center: Point,
    hands: &ClassifiedHands,
) -> Result<(AngleReading, HourSource), PipelineError> {
    let minute = hands.minute.ok_or(PipelineError::NoHandsDetected)?;
    let (hour, source) = hands
        .hour
        .map_or((minute, HourSource::MinuteFallback), |h| {
            (h, HourSource::Detected)
        });
    let reading = AngleReading {
        hour_angle: angle(center, &hour)?,
        minute_angle: angle(center, &minute)?,
    };
    tracing::debug!(
        hour_angle = reading.hour_angle,
        minute_angle = reading.minute_angle,
        ?source,
        "measured hand angles"
    );
    Ok((reading, source))
}
