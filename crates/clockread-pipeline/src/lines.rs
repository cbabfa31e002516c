//! Line extractor: progressive probabilistic Hough transform.
//!
//! Edge pixels are visited in a seeded pseudo-random order. Each visited
//! pixel votes for every line through it; once some line's bin reaches the
//! vote threshold, that line is walked in both directions over the edge
//! map to find the actual segment extent. Walked pixels are removed from
//! the edge map so the same stroke is not reported twice, and the votes of
//! a kept segment's pixels are taken back so they cannot prop up another
//! line.
//!
//! A kept segment is refitted to the pixels its walk removed: the endpoints
//! are the walk ends projected onto the total least squares line through
//! those pixels. This recovers the sub-degree direction the 1° θ bins lose.

use std::f64::consts::PI;

use image::GrayImage;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::observe::StageObserver;
use crate::types::{PipelineConfig, Point, Segment};

/// Number of θ bins (1° resolution over a half turn).
const NUM_ANGLES: usize = 180;

/// Detect edges on the raw image and extract line segments from them.
///
/// The result may be empty. Overlapping and near-parallel duplicates are
/// expected (a thick hand has two long edges); the classifier sorts them
/// out.
pub fn extract(
    image: &GrayImage,
    config: &PipelineConfig,
    observer: &mut dyn StageObserver,
) -> Vec<Segment> {
    let edges = crate::edge::canny(image, config.line_canny_low, config.line_canny_high);
    let segments = hough_segments(&edges, config);
    tracing::debug!(
        edge_pixels = crate::edge::count_edge_pixels(&edges),
        segments = segments.len(),
        "extracted line segments"
    );
    observer.segments_extracted(&edges, &segments);
    segments
}

/// Run the probabilistic Hough transform on a binary edge map.
///
/// Each segment is reported as (forward end, backward end) relative to the
/// walk direction; the order carries no further meaning.
#[must_use]
pub fn hough_segments(edges: &GrayImage, config: &PipelineConfig) -> Vec<Segment> {
    let mut points = crate::edge::edge_pixels(edges);
    if points.is_empty() {
        return Vec::new();
    }
    let mut rng = StdRng::seed_from_u64(config.line_seed);
    points.shuffle(&mut rng);

    let mut state = HoughState::new(edges, &points);
    let mut segments = Vec::new();

    for &(x, y) in &points {
        let (px, py) = (x as usize, y as usize);
        if !state.is_edge(px, py) {
            continue;
        }
        let (theta, votes) = state.vote(px, py);
        if votes < config.line_vote_threshold {
            continue;
        }

        let walks = [
            Walk::new(px, py, theta, 1.0, &state.trig),
            Walk::new(px, py, theta, -1.0, &state.trig),
        ];
        let ends = [
            state.walk_end(&walks[0], config),
            state.walk_end(&walks[1], config),
        ];
        let (forward, backward) = (walks[0].pixel(ends[0]), walks[1].pixel(ends[1]));
        let length = forward.distance(backward);
        let good = length >= config.min_line_length;

        let mut taken = Vec::new();
        for (walk, end) in walks.iter().zip(ends) {
            state.consume(walk, end, config.lateral_tolerance, good, &mut taken);
        }
        if good {
            let segment = Segment::new(forward, backward);
            segments.push(refit(segment, &taken).unwrap_or(segment));
        }
    }
    segments
}

/// Project the segment's endpoints onto the total least squares line
/// through `pixels`.
///
/// `None` when the pixels do not define a direction.
#[allow(clippy::cast_precision_loss)]
fn refit(segment: Segment, pixels: &[(usize, usize)]) -> Option<Segment> {
    if pixels.len() < 2 {
        return None;
    }
    let n = pixels.len() as f64;
    let (sx, sy) = pixels
        .iter()
        .fold((0.0, 0.0), |(sx, sy), &(x, y)| (sx + x as f64, sy + y as f64));
    let centroid = Point::new(sx / n, sy / n);
    let (sxx, syy, sxy) = pixels.iter().fold((0.0, 0.0, 0.0), |(sxx, syy, sxy), &(x, y)| {
        let (dx, dy) = (x as f64 - centroid.x, y as f64 - centroid.y);
        (dx.mul_add(dx, sxx), dy.mul_add(dy, syy), dx.mul_add(dy, sxy))
    });
    if sxx + syy < f64::EPSILON {
        return None;
    }
    let theta = 0.5 * (2.0 * sxy).atan2(sxx - syy);
    let (ux, uy) = (theta.cos(), theta.sin());
    let project = |p: Point| {
        let t = (p.x - centroid.x).mul_add(ux, (p.y - centroid.y) * uy);
        Point::new(t.mul_add(ux, centroid.x), t.mul_add(uy, centroid.y))
    };
    Some(Segment::new(project(segment.p1), project(segment.p2)))
}

/// Precomputed cosine and sine of every θ bin.
struct Trig {
    cos: [f64; NUM_ANGLES],
    sin: [f64; NUM_ANGLES],
}

impl Trig {
    #[allow(clippy::cast_precision_loss)]
    fn new() -> Self {
        let mut cos = [0.0; NUM_ANGLES];
        let mut sin = [0.0; NUM_ANGLES];
        for (i, (c, s)) in cos.iter_mut().zip(sin.iter_mut()).enumerate() {
            let theta = i as f64 * PI / NUM_ANGLES as f64;
            *c = theta.cos();
            *s = theta.sin();
        }
        Self { cos, sin }
    }
}

/// Edge mask, vote bookkeeping and the (θ, ρ) accumulator.
struct HoughState {
    width: usize,
    height: usize,
    num_rho: usize,
    rho_offset: f64,
    trig: Trig,
    /// Edge pixels not yet consumed by a walk.
    mask: Vec<bool>,
    /// Pixels whose votes are currently in the accumulator.
    voted: Vec<bool>,
    accumulator: Vec<u32>,
}

impl HoughState {
    #[allow(clippy::cast_precision_loss)]
    fn new(edges: &GrayImage, points: &[(u32, u32)]) -> Self {
        let (w, h) = edges.dimensions();
        let (width, height) = (w as usize, h as usize);
        let num_rho = 2 * (width + height) + 1;
        let mut mask = vec![false; width * height];
        for &(x, y) in points {
            mask[y as usize * width + x as usize] = true;
        }
        Self {
            width,
            height,
            num_rho,
            rho_offset: (width + height) as f64,
            trig: Trig::new(),
            mask,
            voted: vec![false; width * height],
            accumulator: vec![0; NUM_ANGLES * num_rho],
        }
    }

    fn is_edge(&self, x: usize, y: usize) -> bool {
        self.mask[y * self.width + x]
    }

    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn rho_index(&self, x: usize, y: usize, theta: usize) -> usize {
        let rho = (x as f64).mul_add(self.trig.cos[theta], y as f64 * self.trig.sin[theta]);
        (rho.round() + self.rho_offset) as usize
    }

    /// Add the pixel's votes and return the strongest bin it touched.
    fn vote(&mut self, x: usize, y: usize) -> (usize, u32) {
        let mut best = (0, 0);
        for theta in 0..NUM_ANGLES {
            let bin = theta * self.num_rho + self.rho_index(x, y, theta);
            self.accumulator[bin] += 1;
            if self.accumulator[bin] > best.1 {
                best = (theta, self.accumulator[bin]);
            }
        }
        self.voted[y * self.width + x] = true;
        best
    }

    fn unvote(&mut self, x: usize, y: usize) {
        for theta in 0..NUM_ANGLES {
            let bin = theta * self.num_rho + self.rho_index(x, y, theta);
            self.accumulator[bin] = self.accumulator[bin].saturating_sub(1);
        }
        self.voted[y * self.width + x] = false;
    }

    /// Pixels at `(x, y)` and its minor-axis neighbours within `tolerance`.
    fn lateral(
        &self,
        walk: &Walk,
        x: usize,
        y: usize,
        tolerance: u32,
    ) -> impl Iterator<Item = (usize, usize)> + use<> {
        let tolerance = i64::from(tolerance);
        let (w, h) = (self.width, self.height);
        let (lx, ly) = walk.lateral;
        (-tolerance..=tolerance).filter_map(move |k| {
            let nx = x.checked_add_signed(isize::try_from(k * lx).ok()?)?;
            let ny = y.checked_add_signed(isize::try_from(k * ly).ok()?)?;
            (nx < w && ny < h).then_some((nx, ny))
        })
    }

    /// Step count of the last hit before the gap limit or the border.
    fn walk_end(&self, walk: &Walk, config: &PipelineConfig) -> usize {
        let mut gap = 0;
        let mut last = 0;
        for step in 0.. {
            let Some((x, y)) = walk.at(step, self.width, self.height) else {
                break;
            };
            let hit = self
                .lateral(walk, x, y, config.lateral_tolerance)
                .any(|(nx, ny)| self.is_edge(nx, ny));
            if hit {
                gap = 0;
                last = step;
            } else {
                gap += 1;
                if gap > config.max_line_gap {
                    break;
                }
            }
        }
        last
    }

    /// Remove the walked pixels from the mask, taking back their votes when
    /// the segment was kept. Removed pixels are appended to `taken`.
    fn consume(
        &mut self,
        walk: &Walk,
        end: usize,
        tolerance: u32,
        unvote: bool,
        taken: &mut Vec<(usize, usize)>,
    ) {
        for step in 0..=end {
            let Some((x, y)) = walk.at(step, self.width, self.height) else {
                break;
            };
            let neighbours: Vec<_> = self.lateral(walk, x, y, tolerance).collect();
            for (nx, ny) in neighbours {
                let i = ny * self.width + nx;
                if !self.mask[i] {
                    continue;
                }
                self.mask[i] = false;
                taken.push((nx, ny));
                if unvote && self.voted[i] {
                    self.unvote(nx, ny);
                }
            }
        }
    }
}

/// One direction of travel along a Hough line from a seed pixel.
///
/// Moves one pixel per step on the dominant axis and a fraction of a pixel
/// on the other.
struct Walk {
    origin: (f64, f64),
    step: (f64, f64),
    lateral: (i64, i64),
}

impl Walk {
    #[allow(clippy::cast_precision_loss)]
    fn new(x: usize, y: usize, theta: usize, sign: f64, trig: &Trig) -> Self {
        // The normal is (cos θ, sin θ); the line runs along (-sin θ, cos θ).
        let (dx, dy) = (-trig.sin[theta] * sign, trig.cos[theta] * sign);
        let (step, lateral) = if dx.abs() >= dy.abs() {
            ((dx.signum(), dy / dx.abs()), (0, 1))
        } else {
            ((dx / dy.abs(), dy.signum()), (1, 0))
        };
        Self {
            origin: (x as f64, y as f64),
            step,
            lateral,
        }
    }

    #[allow(clippy::cast_precision_loss)]
    fn point(&self, step: usize) -> (f64, f64) {
        let k = step as f64;
        (
            self.step.0.mul_add(k, self.origin.0).round(),
            self.step.1.mul_add(k, self.origin.1).round(),
        )
    }

    /// Pixel reached after `step` steps, if still inside the image.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    fn at(&self, step: usize, width: usize, height: usize) -> Option<(usize, usize)> {
        let (x, y) = self.point(step);
        (x >= 0.0 && y >= 0.0 && x < width as f64 && y < height as f64)
            .then_some((x as usize, y as usize))
    }

    fn pixel(&self, step: usize) -> Point {
        let (x, y) = self.point(step);
        Point::new(x, y)
    }
}
