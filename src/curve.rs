//! Cubic Bezier curve parameterization (C2), grounded in
//! `original_source/cts-core/include/cts-core/network/bezierparameterization.h`.
//!
//! Positions and tangents are evaluated directly from the Bernstein basis (no
//! recursive de Casteljau on the hot path). Arc-length queries go through a
//! fixed-size lookup table built once and refined lazily by bisecting the
//! table entry's bracket with a single de Casteljau subdivision, matching the
//! original's `arcPositionToTime`/`timeToArcPosition`.

use crate::geom::Vec2;

/// Number of uniformly-t-spaced samples in the arc-length table, carried over
/// verbatim from `BezierParameterization::LengthApproximationTableSize`.
pub const LENGTH_APPROXIMATION_TABLE_SIZE: usize = 32;

#[derive(Debug, Clone)]
pub struct BezierCurve {
    p0: Vec2,
    p1: Vec2,
    p2: Vec2,
    p3: Vec2,
    /// Cumulative arc length at `i / (TABLE_SIZE - 1)` for i in 0..TABLE_SIZE.
    arc_length_table: [f64; LENGTH_APPROXIMATION_TABLE_SIZE],
}

impl BezierCurve {
    pub fn new(p0: Vec2, p1: Vec2, p2: Vec2, p3: Vec2) -> Self {
        let mut curve = BezierCurve {
            p0,
            p1,
            p2,
            p3,
            arc_length_table: [0.0; LENGTH_APPROXIMATION_TABLE_SIZE],
        };
        curve.rebuild_arc_length_table();
        curve
    }

    /// Build a curve from two node positions and their outgoing/incoming
    /// tangent handles, the way `Connection`'s constructor derives control
    /// points from `Node::direction()` before calling this.
    pub fn from_endpoints(start: Vec2, start_slope: Vec2, end: Vec2, end_slope: Vec2) -> Self {
        let dist = start.distance(end);
        let handle_len = dist / 3.0;
        let p1 = start + start_slope.normalized() * handle_len;
        let p2 = end - end_slope.normalized() * handle_len;
        BezierCurve::new(start, p1, p2, end)
    }

    fn rebuild_arc_length_table(&mut self) {
        let n = LENGTH_APPROXIMATION_TABLE_SIZE;
        let mut acc = 0.0;
        let mut prev = self.position_at_time(0.0);
        self.arc_length_table[0] = 0.0;
        for i in 1..n {
            let t = i as f64 / (n - 1) as f64;
            let cur = self.position_at_time(t);
            acc += prev.distance(cur);
            self.arc_length_table[i] = acc;
            prev = cur;
        }
    }

    pub fn length(&self) -> f64 {
        self.arc_length_table[LENGTH_APPROXIMATION_TABLE_SIZE - 1]
    }

    pub fn start(&self) -> Vec2 {
        self.p0
    }

    pub fn end(&self) -> Vec2 {
        self.p3
    }

    /// Direct Bernstein-basis evaluation, no recursion.
    pub fn position_at_time(&self, t: f64) -> Vec2 {
        let u = 1.0 - t;
        let uu = u * u;
        let uuu = uu * u;
        let tt = t * t;
        let ttt = tt * t;
        self.p0 * uuu + self.p1 * (3.0 * uu * t) + self.p2 * (3.0 * u * tt) + self.p3 * ttt
    }

    /// Tangent (derivative with respect to t, unnormalized).
    pub fn tangent_at_time(&self, t: f64) -> Vec2 {
        let u = 1.0 - t;
        (self.p1 - self.p0) * (3.0 * u * u)
            + (self.p2 - self.p1) * (6.0 * u * t)
            + (self.p3 - self.p2) * (3.0 * t * t)
    }

    /// Convert a parametric `t` in `[0, 1]` to an arc-length position, by
    /// linearly interpolating within the table bracket (`timeToArcPosition`).
    pub fn time_to_arc_position(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        let n = LENGTH_APPROXIMATION_TABLE_SIZE;
        let scaled = t * (n - 1) as f64;
        let index = scaled.floor() as usize;
        if index >= n - 1 {
            return self.arc_length_table[n - 1];
        }
        let frac = scaled - index as f64;
        let a = self.arc_length_table[index];
        let b = self.arc_length_table[index + 1];
        a + (b - a) * frac
    }

    /// Convert an arc-length position back to parametric `t` (`arcPositionToTime`).
    /// Performs a bracket search in the table followed by a single lazy
    /// de Casteljau bisection to refine the estimate within the bracket.
    pub fn arc_position_to_time(&self, position: f64) -> f64 {
        let n = LENGTH_APPROXIMATION_TABLE_SIZE;
        let position = position.clamp(0.0, self.length());

        let mut lo = 0usize;
        let mut hi = n - 1;
        while lo + 1 < hi {
            let mid = (lo + hi) / 2;
            if self.arc_length_table[mid] <= position {
                lo = mid;
            } else {
                hi = mid;
            }
        }

        let seg_start = self.arc_length_table[lo];
        let seg_end = self.arc_length_table[hi];
        let t_lo = lo as f64 / (n - 1) as f64;
        let t_hi = hi as f64 / (n - 1) as f64;
        if seg_end <= seg_start {
            return t_lo;
        }
        let frac = (position - seg_start) / (seg_end - seg_start);
        let t_linear = t_lo + (t_hi - t_lo) * frac;

        self.refine_time_by_bisection(position, t_lo, t_hi, t_linear)
    }

    /// Convert an arc-length position directly to a coordinate
    /// (`arcPositionToCoordinate`), composing the arc-position-to-time
    /// inverse with the Bernstein-basis evaluation.
    pub fn arc_position_to_coordinate(&self, position: f64) -> Vec2 {
        self.position_at_time(self.arc_position_to_time(position))
    }

    /// Lazily subdivide the curve at the bracket midpoint (de Casteljau,
    /// t=0.5) and use the resulting half to get one extra bit of precision
    /// on where `position` falls, rather than rebuilding the whole table.
    fn refine_time_by_bisection(&self, position: f64, t_lo: f64, t_hi: f64, fallback: f64) -> f64 {
        let mid_pos = self.time_to_arc_position((t_lo + t_hi) * 0.5);
        let t_mid = (t_lo + t_hi) * 0.5;
        if position < mid_pos {
            let (left, _right) = self.subdivide_at(t_mid);
            let local_len = left.length();
            if local_len <= 0.0 {
                return fallback;
            }
            t_lo + (t_mid - t_lo) * (position / local_len).clamp(0.0, 1.0)
        } else {
            fallback
        }
    }

    /// de Casteljau subdivision of the curve at parameter `t`, producing the
    /// two cubic Bezier curves covering `[0, t]` and `[t, 1]`.
    pub fn subdivide_at(&self, t: f64) -> (BezierCurve, BezierCurve) {
        let p01 = self.p0.lerp(self.p1, t);
        let p12 = self.p1.lerp(self.p2, t);
        let p23 = self.p2.lerp(self.p3, t);
        let p012 = p01.lerp(p12, t);
        let p123 = p12.lerp(p23, t);
        let p0123 = p012.lerp(p123, t);

        (
            BezierCurve::new(self.p0, p01, p012, p0123),
            BezierCurve::new(p0123, p123, p23, self.p3),
        )
    }

    pub fn bounds(&self) -> crate::geom::Bounds2 {
        crate::geom::Bounds2::from_points(&[self.p0, self.p1, self.p2, self.p3])
    }
}

/// Recursive bounding-box bisection test for curve-curve intersection,
/// matching the original's approach of subdividing both curves until their
/// boxes are small enough or disjoint.
pub fn curves_intersect(a: &BezierCurve, b: &BezierCurve, depth: u32) -> bool {
    const MAX_DEPTH: u32 = 16;
    const MIN_SIZE: f64 = 0.5;

    let ba = a.bounds();
    let bb = b.bounds();
    if !ba.intersects(&bb) {
        return false;
    }
    if depth >= MAX_DEPTH {
        return true;
    }

    let a_small = (ba.max.x - ba.min.x) < MIN_SIZE && (ba.max.y - ba.min.y) < MIN_SIZE;
    let b_small = (bb.max.x - bb.min.x) < MIN_SIZE && (bb.max.y - bb.min.y) < MIN_SIZE;
    if a_small && b_small {
        return true;
    }

    let (a1, a2) = a.subdivide_at(0.5);
    let (b1, b2) = b.subdivide_at(0.5);
    curves_intersect(&a1, &b1, depth + 1)
        || curves_intersect(&a1, &b2, depth + 1)
        || curves_intersect(&a2, &b1, depth + 1)
        || curves_intersect(&a2, &b2, depth + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn straight_curve() -> BezierCurve {
        BezierCurve::new(
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(20.0, 0.0),
            Vec2::new(30.0, 0.0),
        )
    }

    #[test]
    fn straight_curve_length_matches_euclidean_distance() {
        let c = straight_curve();
        assert!((c.length() - 30.0).abs() < 1e-6);
    }

    #[test]
    fn time_to_arc_position_roundtrips_through_arc_position_to_time() {
        let c = straight_curve();
        for t in [0.0, 0.25, 0.5, 0.75, 1.0] {
            let pos = c.time_to_arc_position(t);
            let back = c.arc_position_to_time(pos);
            assert!((back - t).abs() < 0.05, "t={t} back={back}");
        }
    }

    #[test]
    fn arc_position_to_coordinate_matches_position_at_time_of_the_converted_time() {
        let c = straight_curve();
        for s in [0.0, 7.5, 15.0, 22.5, 30.0] {
            let direct = c.arc_position_to_coordinate(s);
            let via_time = c.position_at_time(c.arc_position_to_time(s));
            assert_eq!(direct, via_time);
        }
        // On a straight line the y coordinate never moves, matching the
        // spec's `arcPositionToCoordinate(i).y == 0` testable property.
        for i in 0..=10 {
            assert_eq!(c.arc_position_to_coordinate(i as f64 * 3.0).y, 0.0);
        }
    }

    #[test]
    fn position_at_endpoints_matches_control_points() {
        let c = straight_curve();
        assert_eq!(c.position_at_time(0.0), c.start());
        assert_eq!(c.position_at_time(1.0), c.end());
    }

    #[test]
    fn crossing_curves_are_detected() {
        let a = BezierCurve::new(
            Vec2::new(0.0, 0.0),
            Vec2::new(10.0, 0.0),
            Vec2::new(20.0, 0.0),
            Vec2::new(30.0, 0.0),
        );
        let b = BezierCurve::new(
            Vec2::new(15.0, -15.0),
            Vec2::new(15.0, -5.0),
            Vec2::new(15.0, 5.0),
            Vec2::new(15.0, 15.0),
        );
        assert!(curves_intersect(&a, &b, 0));
    }

    #[test]
    fn parallel_curves_do_not_intersect() {
        let a = straight_curve();
        let b = BezierCurve::new(
            Vec2::new(0.0, 50.0),
            Vec2::new(10.0, 50.0),
            Vec2::new(20.0, 50.0),
            Vec2::new(30.0, 50.0),
        );
        assert!(!curves_intersect(&a, &b, 0));
    }
}
