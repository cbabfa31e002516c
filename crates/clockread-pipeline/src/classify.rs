//! Hand classifier: pick the hour and minute hands out of line candidates.
//!
//! Only segments with an endpoint near the face center can be hands. Their
//! endpoints are ordered so the second one is the far tip, and a single
//! pass over them keeps the longest as the minute hand and the last
//! runner-up as the hour hand.
//!
//! Two clean-ups run around that core. A segment lying on a line through
//! the center is cut there, so two nearly opposite hands detected as one
//! tip-to-tip line become two hands, and an edge that stops short of the
//! center is extended back to it. Afterwards, the two parallel edges of one
//! thick hand are merged into their centerline.

use crate::types::{ClassifiedHands, PipelineConfig, Point, Segment};

/// Edges closer than this are the same line seen twice, not the two sides
/// of a stroke.
const MIN_EDGE_SEPARATION: f64 = 1.5;

/// Largest angle between the two edges of one stroke.
const MAX_EDGE_ANGLE_DEGREES: f64 = 3.0;

/// Select hour and minute hands from `segments`.
///
/// Segments without an endpoint inside the anchor window around `center`
/// are discarded. If nothing survives, both slots are empty. A single
/// surviving hand fills only the minute slot.
#[must_use]
pub fn classify(segments: &[Segment], center: Point, config: &PipelineConfig) -> ClassifiedHands {
    let tolerance = config.anchor_tolerance;
    let anchored: Vec<Segment> = segments
        .iter()
        .flat_map(|s| center_pieces(*s, center, config))
        .flatten()
        .filter(|s| is_anchored(s, center, tolerance))
        .map(|s| normalize(s, center, tolerance))
        .collect();
    let strokes = merge_stroke_edges(&anchored, config.max_hand_width);
    let hands = strokes
        .iter()
        .fold(ClassifiedHands::default(), |hands, segment| {
            select(hands, *segment, config.runner_up_ratio)
        });
    tracing::debug!(
        candidates = segments.len(),
        anchored = anchored.len(),
        strokes = strokes.len(),
        hour = hands.hour.is_some(),
        minute = hands.minute.is_some(),
        "classified hands"
    );
    hands
}

/// Whether either endpoint lies in the anchor window around `center`.
///
/// The window extends `tolerance` times the center's own coordinate in
/// each axis, so it grows with the face's position in the image.
#[must_use]
pub fn is_anchored(segment: &Segment, center: Point, tolerance: f64) -> bool {
    in_anchor_window(segment.p1, center, tolerance)
        || in_anchor_window(segment.p2, center, tolerance)
}

fn in_anchor_window(p: Point, center: Point, tolerance: f64) -> bool {
    (p.x - center.x).abs() <= center.x.abs() * tolerance
        && (p.y - center.y).abs() <= center.y.abs() * tolerance
}

/// Order the endpoints so `p2` is the hand's far tip.
///
/// If `p1` sits outside the vertical band around the center it must be the
/// tip, so the endpoints are swapped. When both endpoints are inside the
/// band (a hand near 3 or 9 o'clock) the vertical test cannot tell them
/// apart and the one farther from the center becomes `p2`.
#[must_use]
pub fn normalize(segment: Segment, center: Point, tolerance: f64) -> Segment {
    let band = center.y.abs() * tolerance;
    if (segment.p1.y - center.y).abs() > band {
        return segment.reversed();
    }
    let p2_in_band = (segment.p2.y - center.y).abs() <= band;
    if p2_in_band && segment.p1.distance(center) > segment.p2.distance(center) {
        segment.reversed()
    } else {
        segment
    }
}

/// Cut or extend a segment whose line passes through the center.
///
/// "Through" means within half of `max_hand_width`, the offset of a hand's
/// edge from its axis. Such a segment spanning the center becomes two
/// pieces running out from the foot of the perpendicular; the shorter piece
/// is dropped below `min_line_length`. One that stops short of the center
/// with its near end in the anchor window is extended back to the foot.
/// Anything else is returned unchanged.
#[must_use]
pub fn center_pieces(
    segment: Segment,
    center: Point,
    config: &PipelineConfig,
) -> [Option<Segment>; 2] {
    let Some((t, foot)) = foot_of_perpendicular(&segment, center) else {
        return [Some(segment), None];
    };
    if foot.distance(center) > config.max_hand_width / 2.0 {
        return [Some(segment), None];
    }
    if t > 0.0 && t < 1.0 {
        let toward_p1 = Segment::new(foot, segment.p1);
        let toward_p2 = Segment::new(foot, segment.p2);
        let keep = |piece: Segment, other: Segment| {
            piece.length() >= other.length() || piece.length() >= config.min_line_length
        };
        return [
            keep(toward_p1, toward_p2).then_some(toward_p1),
            keep(toward_p2, toward_p1).then_some(toward_p2),
        ];
    }
    let (near, far) = if segment.p1.distance(foot) <= segment.p2.distance(foot) {
        (segment.p1, segment.p2)
    } else {
        (segment.p2, segment.p1)
    };
    if in_anchor_window(near, center, config.anchor_tolerance) {
        [Some(Segment::new(foot, far)), None]
    } else {
        [Some(segment), None]
    }
}

/// Parameter along `p1 -> p2` and position of the point on the segment's
/// line closest to `point`. `None` for a zero-length segment.
fn foot_of_perpendicular(segment: &Segment, point: Point) -> Option<(f64, Point)> {
    let (ux, uy) = (segment.p2.x - segment.p1.x, segment.p2.y - segment.p1.y);
    let length_squared = ux.mul_add(ux, uy * uy);
    if length_squared < f64::EPSILON {
        return None;
    }
    let t = (point.x - segment.p1.x).mul_add(ux, (point.y - segment.p1.y) * uy)
        / length_squared;
    Some((
        t,
        Point::new(t.mul_add(ux, segment.p1.x), t.mul_add(uy, segment.p1.y)),
    ))
}

/// Replace each pair of stroke edges by their centerline.
///
/// Segments are visited in order. One that runs parallel to an earlier,
/// still unpaired segment at a distance between [`MIN_EDGE_SEPARATION`]
/// and `max_width` merges with it: the longer of the two is moved halfway
/// towards the shorter and takes the earlier one's place. Collinear
/// repeats are left alone.
fn merge_stroke_edges(segments: &[Segment], max_width: f64) -> Vec<Segment> {
    let mut strokes: Vec<(Segment, bool)> = Vec::with_capacity(segments.len());
    'next: for &segment in segments {
        for (stroke, paired) in &mut strokes {
            if *paired {
                continue;
            }
            if let Some(merged) = centerline(*stroke, segment, max_width) {
                *stroke = merged;
                *paired = true;
                continue 'next;
            }
        }
        strokes.push((segment, false));
    }
    strokes.into_iter().map(|(s, _)| s).collect()
}

/// Centerline of two edges of one stroke, if they are.
fn centerline(a: Segment, b: Segment, max_width: f64) -> Option<Segment> {
    let (long, short) = if a.length() >= b.length() {
        (a, b)
    } else {
        (b, a)
    };
    let (ux, uy) = direction(&long)?;
    let (vx, vy) = direction(&short)?;
    if ux.mul_add(vx, uy * vy) < MAX_EDGE_ANGLE_DEGREES.to_radians().cos() {
        return None;
    }
    let (nx, ny) = (-uy, ux);
    let offset = |p: Point| (p.x - long.p1.x).mul_add(nx, (p.y - long.p1.y) * ny);
    let separation = (offset(short.p1) + offset(short.p2)) / 2.0;
    if !(MIN_EDGE_SEPARATION..=max_width).contains(&separation.abs()) {
        return None;
    }
    let half = separation / 2.0;
    let shift = |p: Point| Point::new(half.mul_add(nx, p.x), half.mul_add(ny, p.y));
    Some(Segment::new(shift(long.p1), shift(long.p2)))
}

fn direction(segment: &Segment) -> Option<(f64, f64)> {
    let length = segment.length();
    (length >= f64::EPSILON).then(|| {
        (
            (segment.p2.x - segment.p1.x) / length,
            (segment.p2.y - segment.p1.y) / length,
        )
    })
}

/// One fold step.
///
/// A segment longer than the current longest takes the minute slot and the
/// old longest moves to the hour slot. Otherwise it becomes the hour if
/// that slot is empty or it is below `ratio` of the longest.
fn select(hands: ClassifiedHands, segment: Segment, ratio: f64) -> ClassifiedHands {
    let length = segment.length();
    match hands.minute {
        None => ClassifiedHands {
            minute: Some(segment),
            ..hands
        },
        Some(longest) if length > longest.length() => ClassifiedHands {
            hour: Some(longest),
            minute: Some(segment),
        },
        Some(longest) if hands.hour.is_none() || length < ratio * longest.length() => {
            ClassifiedHands {
                hour: Some(segment),
                ..hands
            }
        }
        Some(_) => hands,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const CENTER: Point = Point::new(500.0, 300.0);

    fn unit(degrees: f64) -> (f64, f64) {
        let (s, c) = degrees.to_radians().sin_cos();
        (c, s)
    }

    /// Segment from the center out to `length` pixels at `degrees`
    /// (screen angle, 0 = 3 o'clock, clockwise).
    fn hand(degrees: f64, length: f64) -> Segment {
        edge(degrees, length, 0.0)
    }

    /// Like [`hand`], shifted sideways by `offset` pixels.
    fn edge(degrees: f64, length: f64, offset: f64) -> Segment {
        let (c, s) = unit(degrees);
        let base = Point::new(CENTER.x - offset * s, CENTER.y + offset * c);
        Segment::new(base, Point::new(base.x + length * c, base.y + length * s))
    }

    fn config() -> PipelineConfig {
        PipelineConfig::default()
    }

    fn close(a: Point, b: Point) -> bool {
        a.distance(b) < 1e-6
    }

    #[test]
    fn no_segments_means_no_hands() {
        let hands = classify(&[], CENTER, &config());
        assert_eq!(hands, ClassifiedHands::default());
    }

    #[test]
    fn unanchored_segments_are_dropped() {
        let far = Segment::new(Point::new(100.0, 100.0), Point::new(200.0, 150.0));
        let hands = classify(&[far], CENTER, &config());
        assert_eq!(hands, ClassifiedHands::default());
        assert!(!is_anchored(&far, CENTER, 0.1));
    }

    #[test]
    fn anchor_window_scales_with_center() {
        // 10% of (500, 300) is 50 px horizontally, 30 px vertically.
        let inside = Segment::new(Point::new(549.0, 329.0), Point::new(700.0, 400.0));
        let outside = Segment::new(Point::new(551.0, 300.0), Point::new(700.0, 400.0));
        assert!(is_anchored(&inside, CENTER, 0.1));
        assert!(!is_anchored(&outside, CENTER, 0.1));
        assert!(is_anchored(&inside.reversed(), CENTER, 0.1));
    }

    #[test]
    fn single_segment_fills_minute_only() {
        let minute = hand(-90.0, 120.0);
        let hands = classify(&[minute], CENTER, &config());
        assert_eq!(hands.minute, Some(minute));
        assert!(hands.hour.is_none());
    }

    #[test]
    fn longer_segment_is_minute_in_either_order() {
        let minute = hand(120.0, 120.0);
        let hour = hand(-30.0, 80.0);
        for order in [[minute, hour], [hour, minute]] {
            let hands = classify(&order, CENTER, &config());
            assert_eq!(hands.minute, Some(minute));
            assert_eq!(hands.hour, Some(hour));
        }
    }

    #[test]
    fn longer_segment_always_demotes_the_previous_longest() {
        let short = hand(30.0, 100.0);
        let long = hand(-60.0, 105.0);
        for order in [[short, long], [long, short]] {
            let hands = classify(&order, CENTER, &config());
            assert_eq!(hands.minute, Some(long));
            assert_eq!(hands.hour, Some(short));
        }
    }

    #[test]
    fn collinear_repeats_are_kept_apart() {
        let short = hand(45.0, 100.0);
        let long = hand(45.0, 105.0);
        for order in [[short, long], [long, short]] {
            let hands = classify(&order, CENTER, &config());
            assert_eq!(hands.minute, Some(long));
            assert_eq!(hands.hour, Some(short));
        }
    }

    #[test]
    fn near_length_segment_fills_an_empty_hour_slot_only() {
        let longest = hand(0.0, 120.0);
        let first = hand(100.0, 115.0);
        let second = hand(200.0, 112.0);
        let hands = classify(&[longest, first, second], CENTER, &config());
        assert_eq!(hands.minute, Some(longest));
        assert_eq!(hands.hour, Some(first));
    }

    #[test]
    fn clearly_shorter_segment_replaces_the_hour() {
        let longest = hand(0.0, 120.0);
        let first = hand(100.0, 115.0);
        let second = hand(200.0, 80.0);
        let hands = classify(&[longest, first, second], CENTER, &config());
        assert_eq!(hands.minute, Some(longest));
        assert_eq!(hands.hour, Some(second));
    }

    #[test]
    fn stroke_edges_merge_into_their_centerline() {
        let minute = [edge(200.0, 120.0, 3.0), edge(200.0, 117.0, -3.0)];
        let hour = [edge(10.0, 80.0, 4.0), edge(10.0, 76.0, -4.0)];
        let segments = [hour[0], minute[1], hour[1], minute[0]];
        let hands = classify(&segments, CENTER, &config());

        let minute = hands.minute.unwrap();
        let hour = hands.hour.unwrap();
        assert!(close(minute.p2, hand(200.0, 120.0).p2), "{minute:?}");
        assert!(close(hour.p2, hand(10.0, 80.0).p2), "{hour:?}");
        assert!(minute.p1.distance(CENTER) < 1e-6);
        assert!(hour.p1.distance(CENTER) < 1e-6);
    }

    #[test]
    fn edges_wider_than_a_hand_stay_separate() {
        let a = edge(90.0, 120.0, 10.0);
        let b = edge(90.0, 118.0, -10.0);
        assert!(centerline(a, b, config().max_hand_width).is_none());
        assert!(centerline(a, edge(95.0, 118.0, 4.0), config().max_hand_width).is_none());
        assert!(centerline(a, edge(90.0, 118.0, 4.0), config().max_hand_width).is_some());
    }

    #[test]
    fn tip_to_tip_segment_is_cut_at_the_center() {
        // 6:00 with the minute hand up and the hour hand down.
        let up = Point::new(CENTER.x, CENTER.y - 120.0);
        let down = Point::new(CENTER.x, CENTER.y + 80.0);
        for segment in [Segment::new(up, down), Segment::new(down, up)] {
            let hands = classify(&[segment], CENTER, &config());
            let minute = hands.minute.unwrap();
            let hour = hands.hour.unwrap();
            assert!(close(minute.p1, CENTER) && close(minute.p2, up), "{minute:?}");
            assert!(close(hour.p1, CENTER) && close(hour.p2, down), "{hour:?}");
        }
    }

    #[test]
    fn stub_past_the_center_is_dropped() {
        let segment = Segment::new(
            Point::new(CENTER.x + 3.0, CENTER.y + 10.0),
            Point::new(CENTER.x + 3.0, CENTER.y - 100.0),
        );
        let pieces = center_pieces(segment, CENTER, &config());
        let kept: Vec<_> = pieces.into_iter().flatten().collect();
        assert_eq!(kept.len(), 1, "{kept:?}");
        assert!(close(kept[0].p1, Point::new(CENTER.x + 3.0, CENTER.y)));
        assert!(close(kept[0].p2, segment.p2));
    }

    #[test]
    fn edge_stopping_short_is_extended_to_the_center() {
        let segment = Segment::new(
            Point::new(CENTER.x + 20.0, CENTER.y - 2.0),
            Point::new(CENTER.x + 120.0, CENTER.y - 2.0),
        );
        let [piece, none] = center_pieces(segment, CENTER, &config());
        assert!(none.is_none());
        let piece = piece.unwrap();
        assert!(close(piece.p1, Point::new(CENTER.x, CENTER.y - 2.0)));
        assert!(close(piece.p2, segment.p2));
    }

    #[test]
    fn segment_missing_the_center_is_untouched() {
        let config = config();
        let beside = Segment::new(
            Point::new(CENTER.x - 60.0, CENTER.y + 20.0),
            Point::new(CENTER.x + 60.0, CENTER.y + 20.0),
        );
        assert_eq!(center_pieces(beside, CENTER, &config), [Some(beside), None]);
        let distant = Segment::new(
            Point::new(CENTER.x + 80.0, CENTER.y),
            Point::new(CENTER.x + 200.0, CENTER.y),
        );
        assert_eq!(center_pieces(distant, CENTER, &config), [Some(distant), None]);
    }

    #[test]
    fn tip_first_segments_are_reversed() {
        let down = hand(90.0, 120.0);
        let normalized = normalize(down.reversed(), CENTER, 0.1);
        assert_eq!(normalized, down);
        assert_eq!(normalize(down, CENTER, 0.1), down);
    }

    #[test]
    fn horizontal_hand_puts_far_end_second() {
        let right = hand(0.0, 120.0);
        assert_eq!(normalize(right.reversed(), CENTER, 0.1), right);
        assert_eq!(normalize(right, CENTER, 0.1), right);
        let left = hand(180.0, 100.0);
        assert_eq!(normalize(left.reversed(), CENTER, 0.1), left);
    }

    #[test]
    fn classified_hands_point_outward() {
        let minute = hand(45.0, 120.0).reversed();
        let hour = hand(250.0, 80.0).reversed();
        let hands = classify(&[minute, hour], CENTER, &config());
        for s in [hands.minute.unwrap(), hands.hour.unwrap()] {
            assert!(s.p2.distance(CENTER) > s.p1.distance(CENTER));
        }
    }
}
