//! Math and geometry primitives (C1): 2D vectors, axis-aligned bounds, convex hull.

use std::f64::consts::PI;

/// A 2D vector / point, matching `cts-core/base/vector2.h`'s field layout.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Vec2 { x, y }
    }

    pub fn length(&self) -> f64 {
        self.length_squared().sqrt()
    }

    pub fn length_squared(&self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    pub fn normalized(&self) -> Vec2 {
        let len = self.length();
        if len == 0.0 {
            return Vec2::ZERO;
        }
        Vec2::new(self.x / len, self.y / len)
    }

    pub fn dot(&self, other: Vec2) -> f64 {
        self.x * other.x + self.y * other.y
    }

    /// z-component of the 2D cross product; sign indicates turn direction.
    pub fn cross(&self, other: Vec2) -> f64 {
        self.x * other.y - self.y * other.x
    }

    pub fn distance(&self, other: Vec2) -> f64 {
        (*self - other).length()
    }

    /// Rotate counter-clockwise by `angle` radians around the origin.
    pub fn rotated(&self, angle: f64) -> Vec2 {
        let (s, c) = angle.sin_cos();
        Vec2::new(self.x * c - self.y * s, self.x * s + self.y * c)
    }

    pub fn angle(&self) -> f64 {
        self.y.atan2(self.x)
    }

    pub fn lerp(&self, other: Vec2, t: f64) -> Vec2 {
        Vec2::new(self.x + (other.x - self.x) * t, self.y + (other.y - self.y) * t)
    }
}

impl std::ops::Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Mul<f64> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f64) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl std::ops::Neg for Vec2 {
    type Output = Vec2;
    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}

/// Clamp `value` into `[lo, hi]`. Does not special-case NaN beyond `f64::clamp`'s
/// own behavior (panics on NaN bounds), matching a programmer-precondition.
pub fn clamp(value: f64, lo: f64, hi: f64) -> f64 {
    if value < lo {
        lo
    } else if value > hi {
        hi
    } else {
        value
    }
}

pub fn deg_to_rad(deg: f64) -> f64 {
    deg * PI / 180.0
}

/// Axis-aligned bounding box. `contains`/`intersects` are written with negated
/// compound tests rather than naive `min <= x && x <= max` chains so that a NaN
/// coordinate on either side makes the test fail closed (return `false`)
/// instead of silently succeeding through short-circuit evaluation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds2 {
    pub min: Vec2,
    pub max: Vec2,
}

impl Bounds2 {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Bounds2 { min, max }
    }

    /// The default-constructed box: both corners NaN, so it contains no
    /// point and intersects nothing, including itself.
    pub fn empty() -> Self {
        Bounds2 {
            min: Vec2::new(f64::NAN, f64::NAN),
            max: Vec2::new(f64::NAN, f64::NAN),
        }
    }

    pub fn from_point(p: Vec2) -> Self {
        let mut b = Bounds2::empty();
        b.extend(p);
        b
    }

    pub fn from_points(points: &[Vec2]) -> Bounds2 {
        let mut b = Bounds2::empty();
        for &p in points {
            b.extend(p);
        }
        b
    }

    /// Grows the box to cover `p`. `f64::min`/`f64::max` return the non-NaN
    /// operand when the other is NaN, so extending an `empty()` box collapses
    /// it onto the first point added rather than staying NaN forever.
    pub fn extend(&mut self, p: Vec2) {
        self.min = Vec2::new(self.min.x.min(p.x), self.min.y.min(p.y));
        self.max = Vec2::new(self.max.x.max(p.x), self.max.y.max(p.y));
    }

    pub fn union(&self, other: &Bounds2) -> Bounds2 {
        let mut b = *self;
        b.extend(other.min);
        b.extend(other.max);
        b
    }

    /// Componentwise product of the diagonal. Negative/NaN for an empty box
    /// is undefined behavior for callers to guard against, not this method's
    /// job to special-case.
    pub fn volume(&self) -> f64 {
        (self.max.x - self.min.x) * (self.max.y - self.min.y)
    }

    /// `true` iff `p` lies within the box (inclusive). Written as a negated
    /// compound test, with every coordinate's NaN-ness checked explicitly, so
    /// a NaN on either side of the comparison -- the point, or an empty box's
    /// corners -- falsifies the check rather than silently passing through
    /// `x < NaN` and `x > NaN` both evaluating to `false`.
    pub fn contains(&self, p: Vec2) -> bool {
        !(p.x.is_nan()
            || p.y.is_nan()
            || self.min.x.is_nan()
            || self.min.y.is_nan()
            || self.max.x.is_nan()
            || self.max.y.is_nan()
            || p.x < self.min.x
            || p.x > self.max.x
            || p.y < self.min.y
            || p.y > self.max.y)
    }

    /// `true` iff the two boxes overlap (touching edges count as overlap).
    /// Same NaN-explicit treatment as `contains` -- an empty box never
    /// intersects anything, including another empty box.
    pub fn intersects(&self, other: &Bounds2) -> bool {
        !(self.min.x.is_nan()
            || self.min.y.is_nan()
            || self.max.x.is_nan()
            || self.max.y.is_nan()
            || other.min.x.is_nan()
            || other.min.y.is_nan()
            || other.max.x.is_nan()
            || other.max.y.is_nan()
            || other.max.x < self.min.x
            || other.min.x > self.max.x
            || other.max.y < self.min.y
            || other.min.y > self.max.y)
    }

    pub fn center(&self) -> Vec2 {
        Vec2::new((self.min.x + self.max.x) * 0.5, (self.min.y + self.max.y) * 0.5)
    }

    /// Split into two halves along the box's longer axis; used by the
    /// recursive bounding-box bisection intersection test in `curve.rs`.
    pub fn split(&self) -> (Bounds2, Bounds2) {
        let width = self.max.x - self.min.x;
        let height = self.max.y - self.min.y;
        if width >= height {
            let mid = self.min.x + width * 0.5;
            (
                Bounds2::new(self.min, Vec2::new(mid, self.max.y)),
                Bounds2::new(Vec2::new(mid, self.min.y), self.max),
            )
        } else {
            let mid = self.min.y + height * 0.5;
            (
                Bounds2::new(self.min, Vec2::new(self.max.x, mid)),
                Bounds2::new(Vec2::new(self.min.x, mid), self.max),
            )
        }
    }
}

impl Default for Bounds2 {
    /// Constructed empty, matching `Bounds<T,N>`'s default constructor.
    fn default() -> Self {
        Bounds2::empty()
    }
}

/// Monotone-chain convex hull. Returns points in counter-clockwise order.
pub fn convex_hull(points: &[Vec2]) -> Vec<Vec2> {
    let mut pts: Vec<Vec2> = points.to_vec();
    pts.sort_by(|a, b| a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal).then(
        a.y.partial_cmp(&b.y).unwrap_or(std::cmp::Ordering::Equal),
    ));
    pts.dedup_by(|a, b| a.x == b.x && a.y == b.y);
    if pts.len() < 3 {
        return pts;
    }

    fn cross(o: Vec2, a: Vec2, b: Vec2) -> f64 {
        (a - o).cross(b - o)
    }

    let mut lower: Vec<Vec2> = Vec::new();
    for &p in &pts {
        while lower.len() >= 2 && cross(lower[lower.len() - 2], lower[lower.len() - 1], p) <= 0.0 {
            lower.pop();
        }
        lower.push(p);
    }

    let mut upper: Vec<Vec2> = Vec::new();
    for &p in pts.iter().rev() {
        while upper.len() >= 2 && cross(upper[upper.len() - 2], upper[upper.len() - 1], p) <= 0.0 {
            upper.pop();
        }
        upper.push(p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}
