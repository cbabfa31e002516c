//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are permanent instrumentation intended for
//! detector tuning. [`read_time_with_diagnostics`] runs the same stages as
//! [`read_time_from_image`](crate::read_time_from_image) and collects
//! metrics alongside the reading.
//!
//! Time is read through the [`Clock`] trait so the library never touches
//! a platform timer itself; the CLI supplies one backed by
//! [`std::time::Instant`].
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::observe::StageObserver;
use crate::pipeline::Pipeline;
use crate::types::{GrayImage, HourSource, PipelineConfig, PipelineError, TimeReading};

/// Source of timestamps for stage timing.
pub trait Clock {
    /// Opaque point in time.
    type Instant;

    /// The current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single successful read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadDiagnostics {
    /// Stage 1: median denoise and circle transform.
    pub circle: StageDiagnostics,
    /// Stage 2: Canny edges and probabilistic Hough lines.
    pub lines: StageDiagnostics,
    /// Stage 3: anchor filter and hand selection.
    pub classify: StageDiagnostics,
    /// Stage 4: hand angles.
    pub angles: StageDiagnostics,
    /// Stage 5: rounding to a digital time.
    pub resolve: StageDiagnostics,
    /// Total wall-clock duration of the entire read (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary across all stages.
    pub summary: ReadSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics (counts, sizes, etc.).
    pub metrics: StageMetrics,
}

/// Stage-specific metrics that vary by pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Circle location metrics.
    CircleLocation {
        /// Number of circles accepted by the transform.
        candidate_count: usize,
        /// Center votes of the chosen circle.
        votes: u32,
        /// Chosen center x.
        center_x: f64,
        /// Chosen center y.
        center_y: f64,
        /// Chosen radius.
        radius: f64,
    },
    /// Line extraction metrics.
    LineExtraction {
        /// Canny low threshold.
        low_threshold: f32,
        /// Canny high threshold.
        high_threshold: f32,
        /// Number of segments found.
        segment_count: usize,
        /// Length of the longest segment (0 when none).
        longest_segment: f64,
    },
    /// Hand classification metrics.
    HandClassification {
        /// Segments that reached the classifier.
        candidate_count: usize,
        /// Length of the minute hand segment.
        minute_length: f64,
        /// Length of the hour hand segment, if one was found.
        hour_length: Option<f64>,
    },
    /// Angle measurement metrics.
    AngleMeasurement {
        /// Hour hand angle in degrees.
        hour_angle: f64,
        /// Minute hand angle in degrees.
        minute_angle: f64,
        /// Where the hour angle came from.
        hour_source: HourSource,
    },
    /// Time resolution metrics.
    TimeResolution {
        /// Resolved hour.
        hour: u8,
        /// Resolved minute.
        minute: u8,
        /// Whether the hour was flagged low-confidence.
        low_confidence: bool,
    },
}

/// High-level summary for the entire read.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadSummary {
    /// Source image width in pixels.
    pub image_width: u32,
    /// Source image height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Number of line candidates.
    pub segment_count: usize,
}

/// Run every stage, timing each one with `clock`.
///
/// # Errors
///
/// Propagates the first stage error unchanged, exactly like
/// [`read_time_with_observer`](crate::read_time_with_observer).
pub fn read_time_with_diagnostics<C: Clock>(
    image: &GrayImage,
    config: &PipelineConfig,
    clock: &C,
    observer: &mut dyn StageObserver,
) -> Result<(TimeReading, ReadDiagnostics), PipelineError> {
    config.validate()?;
    let total_start = clock.now();

    let start = clock.now();
    let located = Pipeline::new(image, config.clone()).locate_face(observer)?;
    let best = located.candidates().first().copied();
    let circle = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::CircleLocation {
            candidate_count: located.candidates().len(),
            votes: best.map_or(0, |c| c.votes),
            center_x: located.circle().center.x,
            center_y: located.circle().center.y,
            radius: located.circle().radius,
        },
    };

    let start = clock.now();
    let extracted = located.extract_lines(observer);
    let segment_count = extracted.segments().len();
    let lines = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::LineExtraction {
            low_threshold: config.line_canny_low,
            high_threshold: config.line_canny_high,
            segment_count,
            longest_segment: extracted
                .segments()
                .iter()
                .map(crate::types::Segment::length)
                .fold(0.0, f64::max),
        },
    };

    let start = clock.now();
    let classified = extracted.classify_hands(observer)?;
    let hands = *classified.hands();
    let classify = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::HandClassification {
            candidate_count: classified.segment_count(),
            minute_length: hands.minute.map_or(0.0, |s| s.length()),
            hour_length: hands.hour.map(|s| s.length()),
        },
    };

    let start = clock.now();
    let measured = classified.measure_angles()?;
    let angles = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::AngleMeasurement {
            hour_angle: measured.angles().hour_angle,
            minute_angle: measured.angles().minute_angle,
            hour_source: measured.hour_source(),
        },
    };

    let start = clock.now();
    let reading = measured.resolve();
    let resolve = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::TimeResolution {
            hour: reading.time.hour,
            minute: reading.time.minute,
            low_confidence: reading.warning.is_some(),
        },
    };

    let diagnostics = ReadDiagnostics {
        circle,
        lines,
        classify,
        angles,
        resolve,
        total_duration: clock.elapsed(&total_start),
        summary: ReadSummary {
            image_width: image.width(),
            image_height: image.height(),
            pixel_count: u64::from(image.width()) * u64::from(image.height()),
            segment_count,
        },
    };
    Ok((reading, diagnostics))
}

impl ReadDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Read Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        let stages = [
            ("Circle Location", &self.circle),
            ("Line Extraction", &self.lines),
            ("Hand Classification", &self.classify),
            ("Angle Measurement", &self.angles),
            ("Time Resolution", &self.resolve),
        ];
        for (name, diag) in stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!("Line candidates: {}", self.summary.segment_count));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::CircleLocation {
            candidate_count,
            votes,
            center_x,
            center_y,
            radius,
        } => format!(
            "center=({center_x:.1}, {center_y:.1}) r={radius:.1} votes={votes} of {candidate_count} circles",
        ),
        StageMetrics::LineExtraction {
            low_threshold,
            high_threshold,
            segment_count,
            longest_segment,
        } => format!(
            "low={low_threshold:.1} high={high_threshold:.1} {segment_count} segments (longest {longest_segment:.1}px)",
        ),
        StageMetrics::HandClassification {
            candidate_count,
            minute_length,
            hour_length,
        } => {
            let hour = hour_length.map_or_else(|| "none".to_string(), |l| format!("{l:.1}px"));
            format!("{candidate_count} candidates, minute={minute_length:.1}px hour={hour}")
        }
        StageMetrics::AngleMeasurement {
            hour_angle,
            minute_angle,
            hour_source,
        } => format!("hour={hour_angle:.2}deg minute={minute_angle:.2}deg ({hour_source:?})"),
        StageMetrics::TimeResolution {
            hour,
            minute,
            low_confidence,
        } => {
            let flag = if *low_confidence { " (low confidence)" } else { "" };
            format!("{hour}:{minute:02}{flag}")
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use super::*;

    /// Clock that advances one millisecond per reading.
    struct StepClock {
        ticks: Cell<u64>,
    }

    impl Clock for StepClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.ticks.get();
            self.ticks.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.now() - since)
        }
    }

    fn stage(ms: u64, metrics: StageMetrics) -> StageDiagnostics {
        StageDiagnostics {
            duration: Duration::from_millis(ms),
            metrics,
        }
    }

    fn sample() -> ReadDiagnostics {
        ReadDiagnostics {
            circle: stage(
                40,
                StageMetrics::CircleLocation {
                    candidate_count: 1,
                    votes: 812,
                    center_x: 500.2,
                    center_y: 299.8,
                    radius: 199.0,
                },
            ),
            lines: stage(
                30,
                StageMetrics::LineExtraction {
                    low_threshold: 50.0,
                    high_threshold: 150.0,
                    segment_count: 6,
                    longest_segment: 118.0,
                },
            ),
            classify: stage(
                1,
                StageMetrics::HandClassification {
                    candidate_count: 6,
                    minute_length: 118.0,
                    hour_length: None,
                },
            ),
            angles: stage(
                1,
                StageMetrics::AngleMeasurement {
                    hour_angle: 210.0,
                    minute_angle: 210.0,
                    hour_source: HourSource::MinuteFallback,
                },
            ),
            resolve: stage(
                1,
                StageMetrics::TimeResolution {
                    hour: 7,
                    minute: 35,
                    low_confidence: true,
                },
            ),
            total_duration: Duration::from_millis(73),
            summary: ReadSummary {
                image_width: 1000,
                image_height: 600,
                pixel_count: 600_000,
                segment_count: 6,
            },
        }
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let ms = duration_ms(Duration::from_millis(1234));
        assert!((ms - 1234.0).abs() < 0.01);
    }

    #[test]
    fn report_lists_every_stage() {
        let report = sample().report();
        assert!(report.contains("Read Diagnostics Report"));
        for name in [
            "Circle Location",
            "Line Extraction",
            "Hand Classification",
            "Angle Measurement",
            "Time Resolution",
        ] {
            assert!(report.contains(name), "missing {name}");
        }
        assert!(report.contains("7:35 (low confidence)"));
        assert!(report.contains("hour=none"));
    }

    #[test]
    fn durations_serialize_as_seconds() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!((json["total_duration"].as_f64().unwrap() - 0.073).abs() < 1e-9);
        let back: ReadDiagnostics = serde_json::from_value(json).unwrap();
        assert_eq!(back.total_duration, Duration::from_millis(73));
    }

    #[test]
    fn negative_duration_is_rejected() {
        let mut json = serde_json::to_value(sample()).unwrap();
        json["total_duration"] = serde_json::json!(-1.0);
        assert!(serde_json::from_value::<ReadDiagnostics>(json).is_err());
    }

    #[test]
    fn invalid_config_fails_before_any_stage() {
        let img = GrayImage::new(10, 10);
        let config = PipelineConfig {
            first_median_kernel: 4,
            ..PipelineConfig::default()
        };
        let clock = StepClock {
            ticks: Cell::new(0),
        };
        let result =
            read_time_with_diagnostics(&img, &config, &clock, &mut crate::observe::NoopObserver);
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
        assert_eq!(clock.ticks.get(), 0);
    }

    #[test]
    fn stage_errors_propagate() {
        let img = GrayImage::from_pixel(50, 50, image::Luma([255]));
        let clock = StepClock {
            ticks: Cell::new(0),
        };
        let result = read_time_with_diagnostics(
            &img,
            &PipelineConfig::default(),
            &clock,
            &mut crate::observe::NoopObserver,
        );
        assert!(matches!(result, Err(PipelineError::NoFaceDetected)));
    }
}
