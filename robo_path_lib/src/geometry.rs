//! Pure 2-D geometry: points, segments, distances, angle math, snapping.
//!
//! All functions here are stateless and free of units ambiguity: callers
//! decide whether a given `f64` is meters or centimeters, radians or
//! degrees; the function names and doc comments say which.

use serde::{Deserialize, Serialize};

pub const DEGENERATE_SEGMENT_LEN: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn sub(&self, other: &Point) -> Point {
        Point::new(self.x - other.x, self.y - other.y)
    }

    pub fn add(&self, other: &Point) -> Point {
        Point::new(self.x + other.x, self.y + other.y)
    }

    pub fn scale(&self, k: f64) -> Point {
        Point::new(self.x * k, self.y * k)
    }

    pub fn dot(&self, other: &Point) -> f64 {
        self.x * other.x + self.y * other.y
    }

    pub fn norm_sq(&self) -> f64 {
        self.dot(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
}

impl Segment {
    pub fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    pub fn length(&self) -> f64 {
        distance(&self.start, &self.end)
    }

    /// CCW angle of the segment direction, radians, 0 along +X.
    pub fn angle(&self) -> f64 {
        let d = self.end.sub(&self.start);
        d.y.atan2(d.x)
    }

    pub fn is_degenerate(&self) -> bool {
        self.length() < DEGENERATE_SEGMENT_LEN
    }
}

pub fn distance(a: &Point, b: &Point) -> f64 {
    let d = a.sub(b);
    d.norm_sq().sqrt()
}

/// Point on `seg` closest to `p`, via clamped projection.
pub fn closest_point_on_segment(seg: &Segment, p: &Point) -> Point {
    if seg.is_degenerate() {
        return seg.start;
    }
    let d = seg.end.sub(&seg.start);
    let t = p.sub(&seg.start).dot(&d) / d.norm_sq();
    let t = t.clamp(0.0, 1.0);
    seg.start.add(&d.scale(t))
}

pub fn distance_point_to_segment(seg: &Segment, p: &Point) -> f64 {
    distance(p, &closest_point_on_segment(seg, p))
}

/// Normalize a degree angle into (-180, 180].
pub fn normalize_angle_deg(mut a: f64) -> f64 {
    while a <= -180.0 {
        a += 360.0;
    }
    while a > 180.0 {
        a -= 360.0;
    }
    a
}

/// Normalize a radian angle into (-pi, pi].
pub fn normalize_angle_rad(mut a: f64) -> f64 {
    use std::f64::consts::PI;
    while a <= -PI {
        a += 2.0 * PI;
    }
    while a > PI {
        a -= 2.0 * PI;
    }
    a
}

const CARDINALS_DEG: [f64; 4] = [0.0, 90.0, 180.0, 270.0];

/// Nearest cardinal angle (0/90/180/270) under the (-180, 180] norm.
pub fn snap_angle_to_cardinal(a: f64) -> f64 {
    let normalized = normalize_angle_deg(a);
    CARDINALS_DEG
        .iter()
        .map(|c| normalize_angle_deg(*c))
        .min_by(|x, y| {
            let dx = normalize_angle_deg(normalized - x).abs();
            let dy = normalize_angle_deg(normalized - y).abs();
            dx.partial_cmp(&dy).unwrap()
        })
        .unwrap()
}

/// Endpoint obtained by snapping `candidate`'s distance and angle relative to
/// `start` onto a grid of `stepLen` / `stepDeg` multiples.
pub fn snap_length_angle(start: &Point, candidate: &Point, step_len: f64, step_deg: f64) -> Point {
    let step_len = step_len.max(f64::MIN_POSITIVE).max(1e-9);
    let seg = Segment::new(*start, *candidate);
    let len = seg.length();
    let snapped_len = (len / step_len).round().max(1.0) * step_len;

    let angle_deg = seg.angle().to_degrees();
    let snapped_angle_deg = (angle_deg / step_deg).round() * step_deg;
    let snapped_angle_rad = snapped_angle_deg.to_radians();

    Point::new(
        start.x + snapped_len * snapped_angle_rad.cos(),
        start.y + snapped_len * snapped_angle_rad.sin(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_euclidean() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((distance(&a, &b) - 5.0).abs() < 1e-12);
    }

    #[test]
    fn closest_point_clamps_to_endpoints() {
        let seg = Segment::new(Point::new(0.0, 0.0), Point::new(10.0, 0.0));
        let before = closest_point_on_segment(&seg, &Point::new(-5.0, 3.0));
        assert_eq!(before, seg.start);
        let after = closest_point_on_segment(&seg, &Point::new(15.0, 3.0));
        assert_eq!(after, seg.end);
        let mid = closest_point_on_segment(&seg, &Point::new(5.0, 3.0));
        assert!((mid.x - 5.0).abs() < 1e-9 && mid.y.abs() < 1e-9);
    }

    #[test]
    fn degenerate_segment_distance_is_to_start() {
        let seg = Segment::new(Point::new(1.0, 1.0), Point::new(1.0 + 1e-9, 1.0));
        let p = Point::new(4.0, 5.0);
        assert!((distance_point_to_segment(&seg, &p) - distance(&p, &seg.start)).abs() < 1e-9);
    }

    #[test]
    fn normalize_angle_deg_wraps_into_range() {
        assert!((normalize_angle_deg(180.0) - 180.0).abs() < 1e-9);
        assert!((normalize_angle_deg(-180.0) - 180.0).abs() < 1e-9);
        assert!((normalize_angle_deg(370.0) - 10.0).abs() < 1e-9);
        assert!((normalize_angle_deg(-370.0) - (-10.0)).abs() < 1e-9);
    }

    #[test]
    fn snap_angle_to_cardinal_picks_nearest() {
        assert!((snap_angle_to_cardinal(10.0) - 0.0).abs() < 1e-9);
        assert!((snap_angle_to_cardinal(100.0) - 90.0).abs() < 1e-9);
        assert!((snap_angle_to_cardinal(185.0) - 180.0).abs() < 1e-9);
        assert!((snap_angle_to_cardinal(-10.0) - 0.0).abs() < 1e-9);
    }

    #[test]
    fn snap_length_angle_rounds_to_grid() {
        let start = Point::new(0.0, 0.0);
        let candidate = Point::new(9.0, 0.3);
        let snapped = snap_length_angle(&start, &candidate, 5.0, 90.0);
        assert!((snapped.x - 10.0).abs() < 1e-6);
        assert!(snapped.y.abs() < 1e-6);
    }

    proptest::proptest! {
        #[test]
        fn normalize_angle_deg_always_in_range(a in -1.0e6_f64..1.0e6_f64) {
            let n = normalize_angle_deg(a);
            proptest::prop_assert!(n > -180.0 && n <= 180.0);
        }

        #[test]
        fn normalize_angle_rad_always_in_range(a in -1.0e6_f64..1.0e6_f64) {
            use std::f64::consts::PI;
            let n = normalize_angle_rad(a);
            proptest::prop_assert!(n > -PI && n <= PI);
        }

        #[test]
        fn distance_is_symmetric_and_nonnegative(
            ax in -1000.0_f64..1000.0, ay in -1000.0_f64..1000.0,
            bx in -1000.0_f64..1000.0, by in -1000.0_f64..1000.0,
        ) {
            let a = Point::new(ax, ay);
            let b = Point::new(bx, by);
            proptest::prop_assert!(distance(&a, &b) >= 0.0);
            proptest::prop_assert!((distance(&a, &b) - distance(&b, &a)).abs() < 1e-9);
        }
    }
}
