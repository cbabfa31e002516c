//! Shared types for the clockread image-to-time pipeline.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Re-export `GrayImage` so downstream crates can hand images to the
/// pipeline without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbImage` for overlay consumers.
pub use image::RgbImage;

/// A 2D point in image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    ///
    /// Avoids the square root for comparison purposes.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }
}

/// The detected clock face.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    /// Face center, the angular origin for every later stage.
    pub center: Point,
    /// Face radius in pixels (never negative).
    pub radius: f64,
}

/// An undirected straight line candidate.
///
/// After hand classification the second endpoint `p2` is the far tip of
/// the hand; before that the endpoint order carries no meaning.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    /// First endpoint.
    pub p1: Point,
    /// Second endpoint.
    pub p2: Point,
}

impl Segment {
    /// Create a new segment.
    #[must_use]
    pub const fn new(p1: Point, p2: Point) -> Self {
        Self { p1, p2 }
    }

    /// Euclidean length.
    #[must_use]
    pub fn length(&self) -> f64 {
        self.p1.distance(self.p2)
    }

    /// The same segment with its endpoints swapped.
    #[must_use]
    pub const fn reversed(self) -> Self {
        Self {
            p1: self.p2,
            p2: self.p1,
        }
    }
}

/// Hour and minute hand segments picked out of the line candidates.
///
/// When both are present the minute hand is at least as long as the hour
/// hand. Both absent means no hand was anchored at the center.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedHands {
    /// Hour hand, absent when only one hand length was found.
    pub hour: Option<Segment>,
    /// Minute hand (the longest anchored segment).
    pub minute: Option<Segment>,
}

/// Where the hour reading came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HourSource {
    /// A distinct hour hand was detected.
    Detected,
    /// No hour hand was found; the minute hand was read for hours too.
    MinuteFallback,
}

/// Hand angles in compass degrees: 0 at 12 o'clock, clockwise, in `[0, 360)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AngleReading {
    /// Angle of the hour hand.
    pub hour_angle: f64,
    /// Angle of the minute hand.
    pub minute_angle: f64,
}

/// A 12-hour digital time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DigitalTime {
    /// Hour in `0..=11`.
    pub hour: u8,
    /// Minute in `0..=59`.
    pub minute: u8,
}

impl DigitalTime {
    /// Create a time, reducing `hour` mod 12 and `minute` mod 60.
    #[must_use]
    pub const fn new(hour: u8, minute: u8) -> Self {
        Self {
            hour: hour % 12,
            minute: minute % 60,
        }
    }
}

impl fmt::Display for DigitalTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{:02}", self.hour, self.minute)
    }
}

/// Non-fatal issues attached to a successful reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReadingWarning {
    /// The hour was read from the minute hand because no separate hour
    /// hand was found, so it is likely wrong.
    LowConfidenceHour,
}

impl fmt::Display for ReadingWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LowConfidenceHour => {
                f.write_str("hour hand not found; hour read from the minute hand")
            }
        }
    }
}

/// Successful result of reading a clock image.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeReading {
    /// The resolved time.
    pub time: DigitalTime,
    /// The clock face the angles were measured around.
    pub circle: Circle,
    /// Raw hand angles before rounding to hours and minutes.
    pub angles: AngleReading,
    /// Set when part of the reading came from a fallback heuristic.
    pub warning: Option<ReadingWarning>,
}

/// Tuning parameters for every pipeline stage.
///
/// Defaults reproduce the reference tool's detector settings. Call
/// [`validate`](Self::validate) before running a config that came from
/// user input; the pipeline entry points do so themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Kernel size of the first median blur pass before circle detection.
    /// Must be odd.
    pub first_median_kernel: u32,

    /// Kernel size of the second median blur pass. Must be odd.
    pub second_median_kernel: u32,

    /// Canny high threshold for circle detection edges. The low threshold
    /// is half of it.
    pub circle_canny_high: f32,

    /// Minimum accumulator votes for a circle center (and minimum edge
    /// support for its radius).
    pub circle_vote_threshold: u32,

    /// Minimum distance in pixels between two accepted circle centers.
    pub circle_min_distance: f64,

    /// Smallest radius considered, in pixels.
    pub min_radius: u32,

    /// Largest radius considered, in pixels. Zero means the larger image
    /// dimension.
    pub max_radius: u32,

    /// Canny low threshold for line detection edges.
    pub line_canny_low: f32,

    /// Canny high threshold for line detection edges.
    pub line_canny_high: f32,

    /// Minimum Hough votes before a line is walked.
    pub line_vote_threshold: u32,

    /// Minimum Euclidean length of an emitted segment, in pixels.
    pub min_line_length: f64,

    /// Maximum run of missing edge pixels bridged while walking a line.
    pub max_line_gap: u32,

    /// Pixels of sideways slack allowed while walking a line, so a
    /// rasterized edge that drifts off the quantized Hough line is not
    /// cut short. Keep it below half the thinnest hand width.
    pub lateral_tolerance: u32,

    /// Seed for the order in which edge pixels are visited.
    pub line_seed: u64,

    /// Fraction of the center's coordinates used as the anchor window.
    pub anchor_tolerance: f64,

    /// Once an hour hand is chosen, a later segment replaces it only when
    /// shorter than this fraction of the longest one.
    pub runner_up_ratio: f64,

    /// Widest hand stroke expected, in pixels. Parallel edges closer than
    /// this are treated as the two sides of one hand, and a segment passing
    /// within half of it from the center is cut at the center.
    pub max_hand_width: f64,

    /// Degrees before an hour boundary within which the hour rounds up.
    pub hour_tolerance_degrees: f64,
}

impl PipelineConfig {
    pub const DEFAULT_FIRST_MEDIAN_KERNEL: u32 = 5;
    pub const DEFAULT_SECOND_MEDIAN_KERNEL: u32 = 3;
    pub const DEFAULT_CIRCLE_CANNY_HIGH: f32 = 70.0;
    pub const DEFAULT_CIRCLE_VOTE_THRESHOLD: u32 = 20;
    pub const DEFAULT_CIRCLE_MIN_DISTANCE: f64 = 200.0;
    pub const DEFAULT_LINE_CANNY_LOW: f32 = 50.0;
    pub const DEFAULT_LINE_CANNY_HIGH: f32 = 150.0;
    pub const DEFAULT_LINE_VOTE_THRESHOLD: u32 = 30;
    pub const DEFAULT_MIN_LINE_LENGTH: f64 = 40.0;
    pub const DEFAULT_MAX_LINE_GAP: u32 = 5;
    pub const DEFAULT_LATERAL_TOLERANCE: u32 = 2;
    pub const DEFAULT_LINE_SEED: u64 = 0x5EED;
    pub const DEFAULT_ANCHOR_TOLERANCE: f64 = 0.1;
    pub const DEFAULT_RUNNER_UP_RATIO: f64 = 0.9;
    pub const DEFAULT_MAX_HAND_WIDTH: f64 = 12.0;
    pub const DEFAULT_HOUR_TOLERANCE_DEGREES: f64 = 3.0;

    /// Check the invariants the stages rely on.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] describing the first
    /// violated constraint.
    pub fn validate(&self) -> Result<(), PipelineError> {
        for (name, kernel) in [
            ("first_median_kernel", self.first_median_kernel),
            ("second_median_kernel", self.second_median_kernel),
        ] {
            if kernel % 2 == 0 {
                return Err(PipelineError::InvalidConfig(format!(
                    "{name} must be odd, got {kernel}"
                )));
            }
        }
        if self.circle_canny_high <= 0.0 {
            return Err(PipelineError::InvalidConfig(format!(
                "circle_canny_high must be positive, got {}",
                self.circle_canny_high
            )));
        }
        if self.line_canny_low <= 0.0 || self.line_canny_high < self.line_canny_low {
            return Err(PipelineError::InvalidConfig(format!(
                "line Canny thresholds must satisfy 0 < low <= high, got {} / {}",
                self.line_canny_low, self.line_canny_high
            )));
        }
        if self.circle_vote_threshold == 0 || self.line_vote_threshold == 0 {
            return Err(PipelineError::InvalidConfig(
                "vote thresholds must be at least 1".to_string(),
            ));
        }
        if self.max_radius != 0 && self.max_radius < self.min_radius {
            return Err(PipelineError::InvalidConfig(format!(
                "max_radius {} is below min_radius {}",
                self.max_radius, self.min_radius
            )));
        }
        if !(0.0..1.0).contains(&self.anchor_tolerance) {
            return Err(PipelineError::InvalidConfig(format!(
                "anchor_tolerance must be in [0, 1), got {}",
                self.anchor_tolerance
            )));
        }
        if !(self.runner_up_ratio > 0.0 && self.runner_up_ratio <= 1.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "runner_up_ratio must be in (0, 1], got {}",
                self.runner_up_ratio
            )));
        }
        if !(self.max_hand_width.is_finite() && self.max_hand_width > 0.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "max_hand_width must be positive, got {}",
                self.max_hand_width
            )));
        }
        if !(0.0..30.0).contains(&self.hour_tolerance_degrees) {
            return Err(PipelineError::InvalidConfig(format!(
                "hour_tolerance_degrees must be in [0, 30), got {}",
                self.hour_tolerance_degrees
            )));
        }
        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            first_median_kernel: Self::DEFAULT_FIRST_MEDIAN_KERNEL,
            second_median_kernel: Self::DEFAULT_SECOND_MEDIAN_KERNEL,
            circle_canny_high: Self::DEFAULT_CIRCLE_CANNY_HIGH,
            circle_vote_threshold: Self::DEFAULT_CIRCLE_VOTE_THRESHOLD,
            circle_min_distance: Self::DEFAULT_CIRCLE_MIN_DISTANCE,
            min_radius: 0,
            max_radius: 0,
            line_canny_low: Self::DEFAULT_LINE_CANNY_LOW,
            line_canny_high: Self::DEFAULT_LINE_CANNY_HIGH,
            line_vote_threshold: Self::DEFAULT_LINE_VOTE_THRESHOLD,
            min_line_length: Self::DEFAULT_MIN_LINE_LENGTH,
            max_line_gap: Self::DEFAULT_MAX_LINE_GAP,
            lateral_tolerance: Self::DEFAULT_LATERAL_TOLERANCE,
            line_seed: Self::DEFAULT_LINE_SEED,
            anchor_tolerance: Self::DEFAULT_ANCHOR_TOLERANCE,
            runner_up_ratio: Self::DEFAULT_RUNNER_UP_RATIO,
            max_hand_width: Self::DEFAULT_MAX_HAND_WIDTH,
            hour_tolerance_degrees: Self::DEFAULT_HOUR_TOLERANCE_DEGREES,
        }
    }
}

/// Errors that can occur while reading a clock image.
///
/// Each variant names the stage that gave up, so callers can tell a
/// face-detection problem from a hand-detection one.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode the input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// No circular clock face was found.
    #[error("no clock face found in the image")]
    NoFaceDetected,

    /// No line segment was anchored at the face center.
    #[error("no clock hands found near the face center")]
    NoHandsDetected,

    /// A hand's far endpoint coincides with the face center.
    #[error("hand segment ends at the face center; its angle is undefined")]
    DegenerateSegment,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance_squared(b) - 25.0).abs() < f64::EPSILON);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn segment_length_and_reverse() {
        let s = Segment::new(Point::new(1.0, 1.0), Point::new(4.0, 5.0));
        assert!((s.length() - 5.0).abs() < f64::EPSILON);
        let r = s.reversed();
        assert_eq!(r.p1, s.p2);
        assert_eq!(r.p2, s.p1);
        assert!((r.length() - s.length()).abs() < f64::EPSILON);
    }

    #[test]
    fn digital_time_reduces_and_displays() {
        let t = DigitalTime::new(14, 5);
        assert_eq!(t, DigitalTime { hour: 2, minute: 5 });
        assert_eq!(t.to_string(), "2:05");
        assert_eq!(DigitalTime::new(0, 60).to_string(), "0:00");
    }

    #[test]
    fn default_config_is_valid() {
        let config = PipelineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.first_median_kernel, 5);
        assert_eq!(config.second_median_kernel, 3);
        assert!((config.hour_tolerance_degrees - 3.0).abs() < f64::EPSILON);
        assert!((config.runner_up_ratio - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn even_median_kernel_is_rejected() {
        let config = PipelineConfig {
            second_median_kernel: 4,
            ..PipelineConfig::default()
        };
        let err = config.validate().unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfig(ref s) if s.contains("second_median_kernel")));
    }

    #[test]
    fn inverted_radius_bounds_are_rejected() {
        let config = PipelineConfig {
            min_radius: 100,
            max_radius: 50,
            ..PipelineConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn out_of_range_ratios_are_rejected() {
        for config in [
            PipelineConfig {
                anchor_tolerance: 1.0,
                ..PipelineConfig::default()
            },
            PipelineConfig {
                runner_up_ratio: 0.0,
                ..PipelineConfig::default()
            },
            PipelineConfig {
                hour_tolerance_degrees: -1.0,
                ..PipelineConfig::default()
            },
            PipelineConfig {
                max_hand_width: 0.0,
                ..PipelineConfig::default()
            },
            PipelineConfig {
                max_hand_width: f64::NAN,
                ..PipelineConfig::default()
            },
        ] {
            assert!(config.validate().is_err(), "accepted {config:?}");
        }
    }

    #[test]
    fn error_display_names_the_stage() {
        assert_eq!(
            PipelineError::NoFaceDetected.to_string(),
            "no clock face found in the image"
        );
        assert_eq!(
            PipelineError::NoHandsDetected.to_string(),
            "no clock hands found near the face center"
        );
    }

    #[test]
    fn partial_config_json_fills_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"line_vote_threshold": 45}"#).unwrap();
        assert_eq!(config.line_vote_threshold, 45);
        assert_eq!(config.max_line_gap, PipelineConfig::DEFAULT_MAX_LINE_GAP);
    }

    #[test]
    fn time_reading_serializes_warning() {
        let reading = TimeReading {
            time: DigitalTime::new(2, 35),
            circle: Circle {
                center: Point::new(500.0, 300.0),
                radius: 200.0,
            },
            angles: AngleReading {
                hour_angle: 77.5,
                minute_angle: 210.0,
            },
            warning: Some(ReadingWarning::LowConfidenceHour),
        };
        let json = serde_json::to_string(&reading).unwrap();
        assert!(json.contains("LowConfidenceHour"));
        let back: TimeReading = serde_json::from_str(&json).unwrap();
        assert_eq!(back, reading);
    }
}
