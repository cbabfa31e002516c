//! Circle locator: find the clock face with a gradient Hough transform.
//!
//! The face ring is the one large circular contour in the image. Every
//! edge pixel votes along its gradient line (both directions, all radii in
//! range) into a center accumulator the size of the image. Rays from a
//! circle's edge all cross at its center, so the face center ends up as the
//! strongest peak; hands and tick sides vote along parallel rays that never
//! concentrate.
//!
//! Peaks are taken in descending vote order, each one is given a radius
//! from the histogram of edge distances around it, and peaks too close to
//! an already accepted circle are skipped. [`locate`] keeps the first
//! (highest-voted) circle.

use image::GrayImage;
use imageproc::gradients::{horizontal_sobel, vertical_sobel};

use crate::observe::StageObserver;
use crate::types::{Circle, PipelineConfig, PipelineError, Point};

/// Gaussian sigma used by `imageproc`'s Canny before its own gradient
/// step. Gradients for voting are taken on the same smoothing so they are
/// non-zero exactly where Canny puts its edges.
const GRADIENT_SIGMA: f32 = 1.4;

/// Half-width of the accumulator window used for sub-pixel refinement.
const REFINE_RADIUS: i64 = 2;

/// A detected circle and the number of center votes it received.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CircleCandidate {
    /// The circle.
    pub circle: Circle,
    /// Accumulator votes at the center peak.
    pub votes: u32,
}

/// Locate the clock face.
///
/// Denoises the image with two median passes, runs the circle transform,
/// and returns the highest-voted circle.
///
/// # Errors
///
/// Returns [`PipelineError::NoFaceDetected`] when no circle is found.
pub fn locate(
    image: &GrayImage,
    config: &PipelineConfig,
    observer: &mut dyn StageObserver,
) -> Result<Circle, PipelineError> {
    let candidates = locate_candidates(image, config, observer)?;
    candidates
        .first()
        .map(|c| c.circle)
        .ok_or(PipelineError::NoFaceDetected)
}

/// Like [`locate`], but returns every accepted circle, strongest first.
///
/// The list is never empty; the observer is told about the first entry.
///
/// # Errors
///
/// Returns [`PipelineError::NoFaceDetected`] when no circle is found.
pub fn locate_candidates(
    image: &GrayImage,
    config: &PipelineConfig,
    observer: &mut dyn StageObserver,
) -> Result<Vec<CircleCandidate>, PipelineError> {
    let denoised = crate::blur::denoise(
        image,
        config.first_median_kernel,
        config.second_median_kernel,
    );
    let candidates = detect_circles(&denoised, config);
    let Some(best) = candidates.first() else {
        tracing::debug!("circle transform found no candidates");
        return Err(PipelineError::NoFaceDetected);
    };
    tracing::debug!(
        candidates = candidates.len(),
        x = best.circle.center.x,
        y = best.circle.center.y,
        radius = best.circle.radius,
        votes = best.votes,
        "located clock face"
    );
    observer.circle_located(&denoised, &best.circle);
    Ok(candidates)
}

/// Run the circle transform on an already denoised image.
///
/// Returns every accepted circle, strongest first. The list is empty when
/// the image has no edges or no center reaches the vote threshold.
#[must_use]
pub fn detect_circles(denoised: &GrayImage, config: &PipelineConfig) -> Vec<CircleCandidate> {
    let (width, height) = denoised.dimensions();
    if width < 3 || height < 3 {
        return Vec::new();
    }

    let high = config.circle_canny_high;
    let edges = crate::edge::canny(denoised, high / 2.0, high);
    let points = crate::edge::edge_pixels(&edges);
    if points.is_empty() {
        return Vec::new();
    }

    let (min_r, max_r) = radius_bounds(config, width, height);
    let accumulator = CenterAccumulator::vote(denoised, &points, min_r, max_r);

    let mut accepted: Vec<CircleCandidate> = Vec::new();
    for (index, votes) in accumulator.peaks(config.circle_vote_threshold) {
        let center = accumulator.refine(index);
        if accepted
            .iter()
            .any(|c| c.circle.center.distance(center) < config.circle_min_distance)
        {
            continue;
        }
        if let Some(radius) =
            estimate_radius(center, &points, min_r, max_r, config.circle_vote_threshold)
        {
            accepted.push(CircleCandidate {
                circle: Circle { center, radius },
                votes,
            });
        }
    }
    accepted
}

/// Inclusive radius search range in pixels.
fn radius_bounds(config: &PipelineConfig, width: u32, height: u32) -> (u32, u32) {
    let min_r = config.min_radius.max(1);
    let max_r = if config.max_radius == 0 {
        width.max(height)
    } else {
        config.max_radius
    };
    (min_r, max_r.max(min_r))
}

/// Vote counts for every candidate center pixel.
struct CenterAccumulator {
    width: usize,
    height: usize,
    votes: Vec<u32>,
}

impl CenterAccumulator {
    /// Cast votes from every edge pixel along its gradient line.
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn vote(denoised: &GrayImage, points: &[(u32, u32)], min_r: u32, max_r: u32) -> Self {
        let (w, h) = denoised.dimensions();
        let (width, height) = (w as usize, h as usize);
        let smooth = imageproc::filter::gaussian_blur_f32(denoised, GRADIENT_SIGMA);
        let gx = horizontal_sobel(&smooth);
        let gy = vertical_sobel(&smooth);

        let mut votes = vec![0u32; width * height];
        for &(x, y) in points {
            let dx = f64::from(gx.get_pixel(x, y).0[0]);
            let dy = f64::from(gy.get_pixel(x, y).0[0]);
            let magnitude = dx.hypot(dy);
            if magnitude < f64::EPSILON {
                continue;
            }
            let (ux, uy) = (dx / magnitude, dy / magnitude);

            for sign in [1.0, -1.0] {
                let mut last = None;
                for r in min_r..=max_r {
                    let step = sign * f64::from(r);
                    let cx = ux.mul_add(step, f64::from(x)).round();
                    let cy = uy.mul_add(step, f64::from(y)).round();
                    if cx < 0.0 || cy < 0.0 || cx >= f64::from(w) || cy >= f64::from(h) {
                        break;
                    }
                    let index = cy as usize * width + cx as usize;
                    // Consecutive radii can round into the same cell.
                    if last == Some(index) {
                        continue;
                    }
                    last = Some(index);
                    votes[index] += 1;
                }
            }
        }

        Self {
            width,
            height,
            votes,
        }
    }

    /// Local maxima above `threshold`, strongest first.
    ///
    /// A cell is a peak when it beats its left and upper neighbours and is
    /// not beaten by its right and lower ones, so a plateau yields one peak.
    fn peaks(&self, threshold: u32) -> Vec<(usize, u32)> {
        let (w, h) = (self.width, self.height);
        let mut peaks = Vec::new();
        for y in 1..h.saturating_sub(1) {
            for x in 1..w.saturating_sub(1) {
                let i = y * w + x;
                let v = self.votes[i];
                if v > threshold
                    && v > self.votes[i - 1]
                    && v >= self.votes[i + 1]
                    && v > self.votes[i - w]
                    && v >= self.votes[i + w]
                {
                    peaks.push((i, v));
                }
            }
        }
        peaks.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
        peaks
    }

    /// Vote-weighted centroid of the window around a peak.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn refine(&self, index: usize) -> Point {
        let (px, py) = ((index % self.width) as i64, (index / self.width) as i64);
        let (mut sum, mut sx, mut sy) = (0.0, 0.0, 0.0);
        for y in (py - REFINE_RADIUS)..=(py + REFINE_RADIUS) {
            for x in (px - REFINE_RADIUS)..=(px + REFINE_RADIUS) {
                if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
                    continue;
                }
                let weight = f64::from(self.votes[y as usize * self.width + x as usize]);
                sum += weight;
                sx += weight * x as f64;
                sy += weight * y as f64;
            }
        }
        if sum > 0.0 {
            Point::new(sx / sum, sy / sum)
        } else {
            Point::new(px as f64, py as f64)
        }
    }
}

/// Pick the radius best supported by edge pixels around `center`.
///
/// Distances are binned to whole pixels and scored over a 3-bin window, so
/// the inner and outer edges of a thin ring pool their support. Returns
/// `None` when no window reaches `threshold` edge pixels.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn estimate_radius(
    center: Point,
    points: &[(u32, u32)],
    min_r: u32,
    max_r: u32,
    threshold: u32,
) -> Option<f64> {
    let mut histogram = vec![0u32; max_r as usize + 2];
    for &(x, y) in points {
        let d = center.distance(Point::new(f64::from(x), f64::from(y))).round();
        if d < f64::from(min_r) || d > f64::from(max_r) {
            continue;
        }
        histogram[d as usize] += 1;
    }

    let mut best: Option<(usize, u32)> = None;
    for r in min_r as usize..=max_r as usize {
        let score = histogram[r - 1] + histogram[r] + histogram[r + 1];
        if best.is_none_or(|(_, s)| score > s) {
            best = Some((r, score));
        }
    }
    best.filter(|&(_, score)| score >= threshold)
        .map(|(r, _)| r as f64)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use imageproc::drawing::draw_filled_circle_mut;

    use super::*;
    use crate::observe::NoopObserver;

    /// Draw a 3-pixel-wide black ring on `img`.
    fn draw_ring(img: &mut GrayImage, center: (i32, i32), radius: i32) {
        draw_filled_circle_mut(img, center, radius, image::Luma([0]));
        draw_filled_circle_mut(img, center, radius - 3, image::Luma([255]));
    }

    fn white(width: u32, height: u32) -> GrayImage {
        GrayImage::from_pixel(width, height, image::Luma([255]))
    }

    #[derive(Default)]
    struct Recorder {
        circles: Vec<Circle>,
    }

    impl StageObserver for Recorder {
        fn circle_located(&mut self, _denoised: &GrayImage, circle: &Circle) {
            self.circles.push(*circle);
        }
    }

    #[test]
    fn single_ring_is_located() {
        let mut img = white(120, 100);
        draw_ring(&mut img, (60, 50), 30);
        let circle = locate(&img, &PipelineConfig::default(), &mut NoopObserver).unwrap();
        assert!(
            circle.center.distance(Point::new(60.0, 50.0)) <= 1.5,
            "center off: {:?}",
            circle.center
        );
        assert!(
            (circle.radius - 28.5).abs() <= 3.0,
            "radius off: {}",
            circle.radius
        );
    }

    #[test]
    fn blank_image_has_no_face() {
        let img = white(80, 80);
        let result = locate(&img, &PipelineConfig::default(), &mut NoopObserver);
        assert!(matches!(result, Err(PipelineError::NoFaceDetected)));
    }

    #[test]
    fn tiny_image_has_no_candidates() {
        let img = white(2, 2);
        assert!(detect_circles(&img, &PipelineConfig::default()).is_empty());
    }

    #[test]
    fn strongest_circle_comes_first() {
        let mut img = white(300, 140);
        draw_ring(&mut img, (70, 70), 50);
        draw_ring(&mut img, (230, 70), 20);
        let config = PipelineConfig {
            circle_min_distance: 50.0,
            ..PipelineConfig::default()
        };
        let denoised = crate::blur::denoise(&img, 5, 3);
        let circles = detect_circles(&denoised, &config);
        assert!(circles.len() >= 2, "expected both rings, got {circles:?}");
        let first = circles[0];
        assert!(first.circle.center.distance(Point::new(70.0, 70.0)) <= 1.5);
        assert!(circles.windows(2).all(|w| w[0].votes >= w[1].votes));
        assert!(
            circles
                .iter()
                .any(|c| c.circle.center.distance(Point::new(230.0, 70.0)) <= 1.5)
        );
    }

    #[test]
    fn min_distance_suppresses_nearby_centers() {
        let mut img = white(300, 140);
        draw_ring(&mut img, (70, 70), 50);
        draw_ring(&mut img, (230, 70), 20);
        // Default minimum distance (200 px) exceeds the 160 px spacing.
        let denoised = crate::blur::denoise(&img, 5, 3);
        let circles = detect_circles(&denoised, &PipelineConfig::default());
        assert_eq!(circles.len(), 1, "got {circles:?}");
    }

    #[test]
    fn observer_sees_the_returned_circle() {
        let mut img = white(120, 100);
        draw_ring(&mut img, (60, 50), 30);
        let mut recorder = Recorder::default();
        let circle = locate(&img, &PipelineConfig::default(), &mut recorder).unwrap();
        assert_eq!(recorder.circles, vec![circle]);
    }

    #[test]
    fn radius_bounds_default_to_image_extent() {
        let config = PipelineConfig::default();
        assert_eq!(radius_bounds(&config, 640, 480), (1, 640));
        let bounded = PipelineConfig {
            min_radius: 10,
            max_radius: 40,
            ..PipelineConfig::default()
        };
        assert_eq!(radius_bounds(&bounded, 640, 480), (10, 40));
    }
}
