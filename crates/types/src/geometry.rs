use serde::{Deserialize, Serialize};

/// Fixed-point device coordinate with 8 fractional bits.
pub type Fixed = i32;

pub const FIXED_SHIFT: u32 = 8;
pub const FIXED_ONE: Fixed = 1 << FIXED_SHIFT;

pub fn int2fixed(value: i32) -> Fixed {
    value << FIXED_SHIFT
}

/// Truncates towards negative infinity.
pub fn fixed2int(value: Fixed) -> i32 {
    value >> FIXED_SHIFT
}

/// Rounds up to the next whole pixel.
pub fn fixed2int_ceiling(value: Fixed) -> i32 {
    (value + FIXED_ONE - 1) >> FIXED_SHIFT
}

pub fn float2fixed(value: f64) -> Fixed {
    (value * f64::from(FIXED_ONE)) as Fixed
}

pub fn fixed2float(value: Fixed) -> f64 {
    f64::from(value) / f64::from(FIXED_ONE)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntPoint {
    pub x: i32,
    pub y: i32,
}

impl IntPoint {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A device-space rectangle in whole pixels, `p` inclusive and `q` exclusive.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IntRect {
    pub p: IntPoint,
    pub q: IntPoint,
}

impl IntRect {
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self {
            p: IntPoint::new(x0, y0),
            q: IntPoint::new(x1, y1),
        }
    }

    pub fn from_size(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self::new(x, y, x + width, y + height)
    }

    pub fn width(&self) -> i32 {
        self.q.x - self.p.x
    }

    pub fn height(&self) -> i32 {
        self.q.y - self.p.y
    }

    pub fn is_empty(&self) -> bool {
        self.width() <= 0 || self.height() <= 0
    }

    pub fn intersect(&self, other: &IntRect) -> IntRect {
        IntRect::new(
            self.p.x.max(other.p.x),
            self.p.y.max(other.p.y),
            self.q.x.min(other.q.x),
            self.q.y.min(other.q.y),
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FixedPoint {
    pub x: Fixed,
    pub y: Fixed,
}

impl FixedPoint {
    pub fn new(x: Fixed, y: Fixed) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FixedRect {
    pub p: FixedPoint,
    pub q: FixedPoint,
}

impl FixedRect {
    pub fn new(x0: Fixed, y0: Fixed, x1: Fixed, y1: Fixed) -> Self {
        Self {
            p: FixedPoint::new(x0, y0),
            q: FixedPoint::new(x1, y1),
        }
    }

    /// The smallest pixel rectangle covering this one.
    pub fn to_int_rect(&self) -> IntRect {
        IntRect::new(
            fixed2int(self.p.x),
            fixed2int(self.p.y),
            fixed2int_ceiling(self.q.x),
            fixed2int_ceiling(self.q.y),
        )
    }

    pub fn bounding(points: &[FixedPoint]) -> Option<FixedRect> {
        let first = points.first()?;
        let mut rect = FixedRect { p: *first, q: *first };
        for pt in &points[1..] {
            rect.p.x = rect.p.x.min(pt.x);
            rect.p.y = rect.p.y.min(pt.y);
            rect.q.x = rect.q.x.max(pt.x);
            rect.q.y = rect.q.y.max(pt.y);
        }
        Some(rect)
    }
}

/// One side of a trapezoid: the line from `start` to `end`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedEdge {
    pub start: FixedPoint,
    pub end: FixedPoint,
}

impl FixedEdge {
    /// X coordinate of the edge at scanline `y`, clamped to the edge's extent.
    pub fn x_at(&self, y: Fixed) -> Fixed {
        let dy = self.end.y - self.start.y;
        if dy <= 0 {
            return self.start.x;
        }
        let t = (i64::from(y) - i64::from(self.start.y)).clamp(0, i64::from(dy));
        let dx = i64::from(self.end.x - self.start.x);
        self.start.x + (dx * t / i64::from(dy)) as Fixed
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self { x0, y0, x1, y1 }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// An affine transform `[xx xy yx yy tx ty]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    pub xx: f64,
    pub xy: f64,
    pub yx: f64,
    pub yy: f64,
    pub tx: f64,
    pub ty: f64,
}

impl Default for Matrix {
    fn default() -> Self {
        Self::identity()
    }
}

impl Matrix {
    pub const fn new(xx: f64, xy: f64, yx: f64, yy: f64, tx: f64, ty: f64) -> Self {
        Self { xx, xy, yx, yy, tx, ty }
    }

    pub const fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, 0.0, 0.0)
    }

    pub fn transform_point(&self, pt: Point) -> Point {
        Point::new(
            pt.x * self.xx + pt.y * self.yx + self.tx,
            pt.x * self.xy + pt.y * self.yy + self.ty,
        )
    }

    /// `self` applied first, then `other`.
    pub fn concat(&self, other: &Matrix) -> Matrix {
        Matrix::new(
            self.xx * other.xx + self.xy * other.yx,
            self.xx * other.xy + self.xy * other.yy,
            self.yx * other.xx + self.yy * other.yx,
            self.yx * other.xy + self.yy * other.yy,
            self.tx * other.xx + self.ty * other.yx + other.tx,
            self.tx * other.xy + self.ty * other.yy + other.ty,
        )
    }

    pub fn to_array(&self) -> [f64; 6] {
        [self.xx, self.xy, self.yx, self.yy, self.tx, self.ty]
    }

    /// `None` when the matrix is singular.
    pub fn invert(&self) -> Option<Matrix> {
        let det = self.xx * self.yy - self.xy * self.yx;
        if det == 0.0 || !det.is_finite() {
            return None;
        }
        let (xx, xy, yx, yy) = (self.yy / det, -self.xy / det, -self.yx / det, self.xx / det);
        Some(Matrix::new(
            xx,
            xy,
            yx,
            yy,
            -(self.tx * xx + self.ty * yx),
            -(self.tx * xy + self.ty * yy),
        ))
    }
}
