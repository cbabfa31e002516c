//! clockread-pipeline: read the time off an analog clock image (sans-IO).
//!
//! Five stages, each feeding the next:
//! circle location -> line extraction -> hand classification ->
//! angle measurement -> time resolution.
//!
//! This crate has **no I/O dependencies**. It operates on in-memory
//! images or byte slices and returns structured data. File handling and
//! overlay saving live in the `clockread` CLI.

pub mod angle;
pub mod blur;
pub mod circle;
pub mod classify;
pub mod diagnostics;
pub mod edge;
pub mod grayscale;
pub mod lines;
pub mod observe;
pub mod overlay;
pub mod pipeline;
pub mod resolve;
pub mod types;

pub use observe::{NoopObserver, StageObserver};
pub use pipeline::Pipeline;
pub use types::{
    AngleReading, Circle, ClassifiedHands, DigitalTime, GrayImage, HourSource, PipelineConfig,
    PipelineError, Point, ReadingWarning, RgbImage, Segment, TimeReading,
};

/// Read the time shown on a grayscale clock image.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` fails
/// validation, otherwise the first stage failure:
/// [`PipelineError::NoFaceDetected`], [`PipelineError::NoHandsDetected`],
/// or [`PipelineError::DegenerateSegment`].
pub fn read_time_from_image(
    image: &GrayImage,
    config: &PipelineConfig,
) -> Result<TimeReading, PipelineError> {
    read_time_with_observer(image, config, &mut NoopObserver)
}

/// Like [`read_time_from_image`], reporting each stage's result to
/// `observer` as it completes.
///
/// The observer cannot change the outcome.
///
/// # Errors
///
/// Same as [`read_time_from_image`].
pub fn read_time_with_observer(
    image: &GrayImage,
    config: &PipelineConfig,
    observer: &mut dyn StageObserver,
) -> Result<TimeReading, PipelineError> {
    config.validate()?;
    let reading = Pipeline::new(image, config.clone())
        .locate_face(observer)?
        .extract_lines(observer)
        .classify_hands(observer)?
        .measure_angles()?
        .resolve();
    Ok(reading)
}

/// Decode image bytes (PNG, JPEG, BMP, WebP) and read the time.
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `image_bytes` is empty,
/// [`PipelineError::ImageDecode`] if the format is unrecognized, and
/// otherwise the same errors as [`read_time_from_image`].
pub fn read_time_from_bytes(
    image_bytes: &[u8],
    config: &PipelineConfig,
) -> Result<TimeReading, PipelineError> {
    let gray = grayscale::decode_and_grayscale(image_bytes)?;
    read_time_from_image(&gray, config)
}
