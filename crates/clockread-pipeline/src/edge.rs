//! Canny edge detection.
//!
//! Wraps [`imageproc::edges::canny`]. Returns a binary image where white
//! pixels (255) are edges and black pixels (0) are background. Both the
//! circle locator and the line extractor start from an edge map, with
//! different thresholds.

use image::GrayImage;

/// Minimum allowed Canny threshold.
///
/// A threshold of zero makes every pixel with any gradient an edge
/// candidate, which floods both Hough accumulators.
pub const MIN_THRESHOLD: f32 = 1.0;
const _: () = assert!(MIN_THRESHOLD > 0.0);

/// Detect edges using the Canny algorithm.
///
/// Returns a binary image: 255 for edge pixels, 0 for non-edge.
///
/// Both thresholds are clamped to a minimum of [`MIN_THRESHOLD`] and
/// `low_threshold` is clamped to be at most `high_threshold`.
#[must_use = "returns the binary edge map"]
pub fn canny(image: &GrayImage, low_threshold: f32, high_threshold: f32) -> GrayImage {
    let high = high_threshold.max(MIN_THRESHOLD);
    let low = low_threshold.max(MIN_THRESHOLD).min(high);
    imageproc::edges::canny(image, low, high)
}

/// Coordinates of every edge pixel, in raster order.
#[must_use]
pub fn edge_pixels(edges: &GrayImage) -> Vec<(u32, u32)> {
    edges
        .enumerate_pixels()
        .filter(|(_, _, p)| p.0[0] > 0)
        .map(|(x, y, _)| (x, y))
        .collect()
}

/// Count edge pixels (value > 0).
pub(crate) fn count_edge_pixels(edges: &GrayImage) -> u64 {
    edges.pixels().map(|p| u64::from(p.0[0] > 0)).sum()
}
