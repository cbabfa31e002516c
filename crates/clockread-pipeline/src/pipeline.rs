//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::read_time_from_image`] which runs every stage in one
//! call, [`Pipeline`] lets the caller drive execution one step at a time:
//!
//! ```rust
//! # use clockread_pipeline::{GrayImage, NoopObserver, Pipeline, PipelineConfig, PipelineError};
//! # fn run(image: &GrayImage) -> Result<(), PipelineError> {
//! let mut observer = NoopObserver;
//! let reading = Pipeline::new(image, PipelineConfig::default())
//!     .locate_face(&mut observer)?
//!     .extract_lines(&mut observer)
//!     .classify_hands(&mut observer)?
//!     .measure_angles()?
//!     .resolve();
//! println!("the time is {}", reading.time);
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state
//! (or `Result` for fallible stages), carrying the outputs the later
//! stages need. The caller can inspect the current stage's output via
//! accessor methods at any point.

use crate::circle::CircleCandidate;
use crate::observe::StageObserver;
use crate::types::{
    AngleReading, Circle, ClassifiedHands, GrayImage, HourSource, PipelineConfig, PipelineError,
    Segment, TimeReading,
};

/// Entry point for stage-by-stage execution.
pub struct Pipeline;

impl Pipeline {
    /// Start a pipeline over a borrowed grayscale image.
    ///
    /// The config is not validated here; call
    /// [`PipelineConfig::validate`] first if it came from user input.
    pub const fn new(image: &GrayImage, config: PipelineConfig) -> Pending<'_> {
        Pending { image, config }
    }
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// Call [`locate_face`](Self::locate_face) to advance to the next stage.
#[must_use = "pipeline stages are consumed by advancing, call .locate_face() to continue"]
pub struct Pending<'a> {
    image: &'a GrayImage,
    config: PipelineConfig,
}

impl<'a> Pending<'a> {
    /// The input image.
    #[must_use]
    pub const fn image(&self) -> &'a GrayImage {
        self.image
    }

    /// Locate the clock face and advance to the [`FaceLocated`] stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NoFaceDetected`] if no circle is found.
    pub fn locate_face(
        self,
        observer: &mut dyn StageObserver,
    ) -> Result<FaceLocated<'a>, PipelineError> {
        let candidates = crate::circle::locate_candidates(self.image, &self.config, observer)?;
        let circle = candidates
            .first()
            .map(|c| c.circle)
            .ok_or(PipelineError::NoFaceDetected)?;
        Ok(FaceLocated {
            image: self.image,
            config: self.config,
            circle,
            candidates,
        })
    }
}

// ───────────────────────── Stage 1: FaceLocated ──────────────────────

/// Pipeline state after the clock face was found.
///
/// Call [`extract_lines`](Self::extract_lines) to advance to the next
/// stage.
#[must_use = "pipeline stages are consumed by advancing, call .extract_lines() to continue"]
pub struct FaceLocated<'a> {
    image: &'a GrayImage,
    config: PipelineConfig,
    circle: Circle,
    candidates: Vec<CircleCandidate>,
}

impl<'a> FaceLocated<'a> {
    /// The chosen face.
    #[must_use]
    pub const fn circle(&self) -> Circle {
        self.circle
    }

    /// Every accepted circle, strongest first. The first is the face.
    #[must_use]
    pub fn candidates(&self) -> &[CircleCandidate] {
        &self.candidates
    }

    /// Extract line candidates and advance to the [`LinesExtracted`]
    /// stage.
    pub fn extract_lines(self, observer: &mut dyn StageObserver) -> LinesExtracted<'a> {
        let segments = crate::lines::extract(self.image, &self.config, observer);
        LinesExtracted {
            image: self.image,
            config: self.config,
            circle: self.circle,
            segments,
        }
    }
}

// ───────────────────────── Stage 2: LinesExtracted ───────────────────

/// Pipeline state after line extraction.
///
/// Call [`classify_hands`](Self::classify_hands) to advance to the next
/// stage. This is a fallible step: it returns `Err` if no segment is
/// anchored at the face center.
#[must_use = "pipeline stages are consumed by advancing, call .classify_hands() to continue"]
pub struct LinesExtracted<'a> {
    image: &'a GrayImage,
    config: PipelineConfig,
    circle: Circle,
    segments: Vec<Segment>,
}

impl LinesExtracted<'_> {
    /// The chosen face.
    #[must_use]
    pub const fn circle(&self) -> Circle {
        self.circle
    }

    /// Every extracted line candidate.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Classify the candidates into hands and advance to the
    /// [`HandsClassified`] stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::NoHandsDetected`] if every candidate was
    /// discarded by the anchor filter.
    pub fn classify_hands(
        self,
        observer: &mut dyn StageObserver,
    ) -> Result<HandsClassified, PipelineError> {
        let hands = crate::classify::classify(&self.segments, self.circle.center, &self.config);
        observer.hands_classified(self.image, &self.circle, &hands);
        if hands.minute.is_none() {
            return Err(PipelineError::NoHandsDetected);
        }
        Ok(HandsClassified {
            config: self.config,
            circle: self.circle,
            segment_count: self.segments.len(),
            hands,
        })
    }
}

// ───────────────────────── Stage 3: HandsClassified ──────────────────

/// Pipeline state after hand classification.
///
/// The minute slot is always filled at this point. Call
/// [`measure_angles`](Self::measure_angles) to advance to the next
/// stage.
#[must_use = "pipeline stages are consumed by advancing, call .measure_angles() to continue"]
pub struct HandsClassified {
    config: PipelineConfig,
    circle: Circle,
    segment_count: usize,
    hands: ClassifiedHands,
}

impl HandsClassified {
    /// The classified hands.
    #[must_use]
    pub const fn hands(&self) -> &ClassifiedHands {
        &self.hands
    }

    /// Number of line candidates the hands were picked from.
    #[must_use]
    pub const fn segment_count(&self) -> usize {
        self.segment_count
    }

    /// Measure both hand angles and advance to the [`AnglesMeasured`]
    /// stage.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DegenerateSegment`] if a hand's far tip
    /// sits on the face center.
    pub fn measure_angles(self) -> Result<AnglesMeasured, PipelineError> {
        let (angles, source) = crate::angle::measure(self.circle.center, &self.hands)?;
        Ok(AnglesMeasured {
            config: self.config,
            circle: self.circle,
            angles,
            source,
        })
    }
}

// ───────────────────────── Stage 4: AnglesMeasured ───────────────────

/// Pipeline state after angle measurement, the last stage before the
/// result.
///
/// Call [`resolve`](Self::resolve) to get the [`TimeReading`].
#[must_use = "call .resolve() to get the TimeReading"]
pub struct AnglesMeasured {
    config: PipelineConfig,
    circle: Circle,
    angles: AngleReading,
    source: HourSource,
}

impl AnglesMeasured {
    /// The measured angles.
    #[must_use]
    pub const fn angles(&self) -> AngleReading {
        self.angles
    }

    /// Whether the hour angle came from a real hour hand.
    #[must_use]
    pub const fn hour_source(&self) -> HourSource {
        self.source
    }

    /// Round the angles to a digital time.
    pub fn resolve(self) -> TimeReading {
        crate::resolve::resolve_reading(
            self.circle,
            self.angles,
            self.source,
            self.config.hour_tolerance_degrees,
        )
    }
}
