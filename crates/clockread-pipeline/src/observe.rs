//! Debug side-channel for inspecting intermediate stage results.
//!
//! Each stage hands its result to a [`StageObserver`] after the result is
//! final. Observers only get shared references, so they cannot change
//! what the pipeline returns. [`NoopObserver`] is the default and does
//! nothing.

use image::GrayImage;

use crate::types::{Circle, ClassifiedHands, Segment};

/// Callbacks invoked once per stage, in pipeline order.
///
/// All methods have empty default bodies; implement only the ones you
/// need.
pub trait StageObserver {
    /// The face was located on `denoised`, the median-blurred input.
    fn circle_located(&mut self, _denoised: &GrayImage, _circle: &Circle) {}

    /// Line candidates were extracted from the `edges` map.
    fn segments_extracted(&mut self, _edges: &GrayImage, _segments: &[Segment]) {}

    /// Hands were picked out of the candidates. `image` is the original
    /// input.
    fn hands_classified(&mut self, _image: &GrayImage, _circle: &Circle, _hands: &ClassifiedHands) {
    }
}

/// Observer that ignores every callback.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl StageObserver for NoopObserver {}
