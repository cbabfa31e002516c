//! Debug overlays: stage results drawn over an RGB copy of an image.
//!
//! These are what a [`StageObserver`](crate::StageObserver) typically
//! saves or shows. Nothing in the pipeline reads them back.

use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use imageproc::drawing::{
    draw_cross_mut, draw_filled_circle_mut, draw_hollow_circle_mut, draw_line_segment_mut,
};

use crate::types::{Circle, ClassifiedHands, Point, Segment};

const CIRCLE_COLOR: Rgb<u8> = Rgb([0, 200, 0]);
const CENTER_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const HOUR_COLOR: Rgb<u8> = Rgb([230, 40, 40]);
const MINUTE_COLOR: Rgb<u8> = Rgb([40, 90, 230]);

/// Colors cycled through for line candidates.
const SEGMENT_PALETTE: [Rgb<u8>; 6] = [
    Rgb([230, 25, 75]),
    Rgb([60, 180, 75]),
    Rgb([0, 130, 200]),
    Rgb([245, 130, 48]),
    Rgb([145, 30, 180]),
    Rgb([70, 240, 240]),
];

/// Grayscale to RGB so colored marks stand out.
#[must_use]
pub fn to_rgb(image: &GrayImage) -> RgbImage {
    DynamicImage::ImageLuma8(image.clone()).to_rgb8()
}

/// The detected face: ring outline plus a cross at the center.
#[must_use]
pub fn draw_circle(image: &GrayImage, circle: &Circle) -> RgbImage {
    let mut canvas = to_rgb(image);
    let (cx, cy) = pixel(circle.center);
    #[allow(clippy::cast_possible_truncation)]
    let radius = circle.radius.round() as i32;
    draw_hollow_circle_mut(&mut canvas, (cx, cy), radius, CIRCLE_COLOR);
    draw_cross_mut(&mut canvas, CENTER_COLOR, cx, cy);
    canvas
}

/// Every line candidate, each in its own color.
#[must_use]
pub fn draw_segments(image: &GrayImage, segments: &[Segment]) -> RgbImage {
    let mut canvas = to_rgb(image);
    for (segment, color) in segments.iter().zip(SEGMENT_PALETTE.iter().cycle()) {
        draw_segment(&mut canvas, segment, *color);
    }
    canvas
}

/// The classified hands with a dot on each far tip, over the face center.
#[must_use]
pub fn draw_hands(image: &GrayImage, circle: &Circle, hands: &ClassifiedHands) -> RgbImage {
    let mut canvas = to_rgb(image);
    let (cx, cy) = pixel(circle.center);
    draw_cross_mut(&mut canvas, CENTER_COLOR, cx, cy);
    for (hand, color) in [(hands.hour, HOUR_COLOR), (hands.minute, MINUTE_COLOR)] {
        if let Some(segment) = hand {
            draw_segment(&mut canvas, &segment, color);
            draw_filled_circle_mut(&mut canvas, pixel(segment.p2), 3, color);
        }
    }
    canvas
}

#[allow(clippy::cast_possible_truncation)]
fn draw_segment(canvas: &mut RgbImage, segment: &Segment, color: Rgb<u8>) {
    draw_line_segment_mut(
        canvas,
        (segment.p1.x as f32, segment.p1.y as f32),
        (segment.p2.x as f32, segment.p2.y as f32),
        color,
    );
}

#[allow(clippy::cast_possible_truncation)]
fn pixel(point: Point) -> (i32, i32) {
    (point.x.round() as i32, point.y.round() as i32)
}
