//! clockread-render: synthetic analog clock faces.
//!
//! Draws a white canvas with a black face ring, twelve red tick marks and
//! two black hands, anti-aliased with `tiny-skia`. Used for test fixtures
//! and by the `clockread render` command.
//!
//! Hand angles here are screen angles: 0° points at 3 o'clock and angles
//! grow clockwise (image y grows downward).

use std::fmt;
use std::str::FromStr;

use image::RgbaImage;
use rand::Rng;
use tiny_skia::{Color, LineCap, Paint, PathBuilder, Pixmap, Stroke, Transform};

/// Length and stroke width of one hand, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hand {
    /// Distance from the center to the tip.
    pub length: f32,
    /// Stroke width.
    pub width: f32,
}

/// Geometry of a rendered clock face.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClockFace {
    /// Canvas width.
    pub width: u32,
    /// Canvas height.
    pub height: u32,
    /// Face center `(x, y)`.
    pub center: (f32, f32),
    /// Outer radius of the face ring.
    pub radius: f32,
    /// Ring stroke width, drawn inward from `radius`.
    pub face_stroke: f32,
    /// Tick mark length, measured inward from `radius`.
    pub tick_length: f32,
    /// Tick mark stroke width.
    pub tick_width: f32,
    /// Hour hand.
    pub hour_hand: Hand,
    /// Minute hand.
    pub minute_hand: Hand,
}

impl ClockFace {
    pub const DEFAULT_WIDTH: u32 = 1000;
    pub const DEFAULT_HEIGHT: u32 = 600;
    pub const DEFAULT_RADIUS: f32 = 200.0;

    /// Largest center offset applied by [`randomized`](Self::randomized).
    pub const CENTER_JITTER: i32 = 50;

    /// Radius range used by [`randomized`](Self::randomized).
    pub const RADIUS_RANGE: std::ops::RangeInclusive<u32> = 160..=250;

    /// Default face with the center moved by up to
    /// [`CENTER_JITTER`](Self::CENTER_JITTER) pixels on each axis and a
    /// radius drawn from [`RADIUS_RANGE`](Self::RADIUS_RANGE).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn randomized<R: Rng + ?Sized>(rng: &mut R) -> Self {
        let base = Self::default();
        let dx = rng.random_range(-Self::CENTER_JITTER..=Self::CENTER_JITTER);
        let dy = rng.random_range(-Self::CENTER_JITTER..=Self::CENTER_JITTER);
        let radius = rng.random_range(Self::RADIUS_RANGE);
        Self {
            center: (base.center.0 + dx as f32, base.center.1 + dy as f32),
            radius: radius as f32,
            ..base
        }
    }
}

impl Default for ClockFace {
    #[allow(clippy::cast_precision_loss)]
    fn default() -> Self {
        Self {
            width: Self::DEFAULT_WIDTH,
            height: Self::DEFAULT_HEIGHT,
            center: (
                Self::DEFAULT_WIDTH as f32 / 2.0,
                Self::DEFAULT_HEIGHT as f32 / 2.0,
            ),
            radius: Self::DEFAULT_RADIUS,
            face_stroke: 3.0,
            tick_length: 5.0,
            tick_width: 3.0,
            hour_hand: Hand {
                length: 80.0,
                width: 8.0,
            },
            minute_hand: Hand {
                length: 120.0,
                width: 6.0,
            },
        }
    }
}

/// A time to draw, reduced to a 12-hour dial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClockTime {
    hour: u8,
    minute: u8,
}

/// Errors from parsing an `HH:MM` time.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeParseError {
    /// Not two parts separated by a colon.
    #[error("expected HH:MM, got {0:?}")]
    WrongShape(String),

    /// A part is not a non-negative integer.
    #[error("{0:?} is not a number")]
    NotANumber(String),

    /// Hours must be in `0..=24`.
    #[error("hour {0} is out of range 0..=24")]
    HourOutOfRange(u32),

    /// Minutes must be in `0..=59`.
    #[error("minute {0} is out of range 0..=59")]
    MinuteOutOfRange(u32),
}

impl ClockTime {
    /// Build a time from a 24-hour clock hour (`0..=24`) and a minute.
    ///
    /// # Errors
    ///
    /// Returns [`TimeParseError::HourOutOfRange`] or
    /// [`TimeParseError::MinuteOutOfRange`].
    #[allow(clippy::cast_possible_truncation)]
    pub fn new(hour: u32, minute: u32) -> Result<Self, TimeParseError> {
        if hour > 24 {
            return Err(TimeParseError::HourOutOfRange(hour));
        }
        if minute > 59 {
            return Err(TimeParseError::MinuteOutOfRange(minute));
        }
        Ok(Self {
            hour: (hour % 12) as u8,
            minute: minute as u8,
        })
    }

    /// Parse `HH:MM`. Surrounding whitespace is ignored.
    ///
    /// # Errors
    ///
    /// Returns a [`TimeParseError`] describing the first problem.
    pub fn parse(input: &str) -> Result<Self, TimeParseError> {
        let trimmed = input.trim();
        let Some((hour, minute)) = trimmed.split_once(':') else {
            return Err(TimeParseError::WrongShape(trimmed.to_string()));
        };
        if minute.contains(':') {
            return Err(TimeParseError::WrongShape(trimmed.to_string()));
        }
        let number = |part: &str| {
            part.trim()
                .parse::<u32>()
                .map_err(|_| TimeParseError::NotANumber(part.to_string()))
        };
        Self::new(number(hour)?, number(minute)?)
    }

    /// A uniformly random time.
    #[must_use]
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self {
            hour: rng.random_range(0..12),
            minute: rng.random_range(0..60),
        }
    }

    /// Hour on the 12-hour dial, `0..=11`.
    #[must_use]
    pub const fn hour(self) -> u8 {
        self.hour
    }

    /// Minute, `0..=59`.
    #[must_use]
    pub const fn minute(self) -> u8 {
        self.minute
    }
}

impl FromStr for ClockTime {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ClockTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Screen angles `(hour, minute)` in degrees for `time`.
///
/// The hour hand advances continuously with the minutes.
#[must_use]
pub fn hand_angles(time: ClockTime) -> (f64, f64) {
    let hour = f64::from(time.hour);
    let minute = f64::from(time.minute);
    let hour_angle = (hour + minute / 60.0).mul_add(30.0, -90.0);
    let minute_angle = minute.mul_add(6.0, -90.0);
    (hour_angle, minute_angle)
}

/// Errors from rendering.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// The canvas size cannot be allocated.
    #[error("invalid canvas size {width}x{height}")]
    InvalidCanvas {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },
}

/// Draw `face` showing `time`.
///
/// The result is fully opaque.
///
/// # Errors
///
/// Returns [`RenderError::InvalidCanvas`] for a zero-sized canvas.
#[allow(clippy::cast_possible_truncation)]
pub fn render(face: &ClockFace, time: ClockTime) -> Result<RgbaImage, RenderError> {
    let invalid = || RenderError::InvalidCanvas {
        width: face.width,
        height: face.height,
    };
    let mut pixmap = Pixmap::new(face.width, face.height).ok_or_else(invalid)?;
    pixmap.fill(Color::WHITE);

    let (cx, cy) = face.center;

    // Ring, inset so its outer edge sits at `radius`.
    let ring_radius = face.radius - face.face_stroke / 2.0;
    if let Some(ring) = PathBuilder::from_circle(cx, cy, ring_radius) {
        pixmap.stroke_path(
            &ring,
            &paint(0, 0, 0),
            &stroke(face.face_stroke),
            Transform::identity(),
            None,
        );
    }

    for tick in 0..12u8 {
        let angle = f32::from(tick) * 30.0;
        let inner = polar(face.center, face.radius - face.tick_length, angle);
        let outer = polar(face.center, face.radius, angle);
        draw_line(&mut pixmap, inner, outer, face.tick_width, &paint(255, 0, 0));
    }

    let (hour_angle, minute_angle) = hand_angles(time);
    for (hand, angle) in [
        (face.hour_hand, hour_angle),
        (face.minute_hand, minute_angle),
    ] {
        let tip = polar(face.center, hand.length, angle as f32);
        draw_line(&mut pixmap, face.center, tip, hand.width, &paint(0, 0, 0));
    }

    // The canvas is opaque, so premultiplied and straight RGBA agree.
    RgbaImage::from_raw(face.width, face.height, pixmap.take()).ok_or_else(invalid)
}

fn paint(r: u8, g: u8, b: u8) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(r, g, b, 255);
    paint.anti_alias = true;
    paint
}

fn stroke(width: f32) -> Stroke {
    Stroke {
        width,
        line_cap: LineCap::Butt,
        ..Stroke::default()
    }
}

/// Point at `distance` from `origin` along screen angle `degrees`.
fn polar(origin: (f32, f32), distance: f32, degrees: f32) -> (f32, f32) {
    let (sin, cos) = degrees.to_radians().sin_cos();
    (
        distance.mul_add(cos, origin.0),
        distance.mul_add(sin, origin.1),
    )
}

fn draw_line(pixmap: &mut Pixmap, from: (f32, f32), to: (f32, f32), width: f32, paint: &Paint) {
    let mut pb = PathBuilder::new();
    pb.move_to(from.0, from.1);
    pb.line_to(to.0, to.1);
    if let Some(path) = pb.finish() {
        pixmap.stroke_path(&path, paint, &stroke(width), Transform::identity(), None);
    }
}
