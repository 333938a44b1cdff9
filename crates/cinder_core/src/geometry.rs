//! Geometry types: points, sizes, rectangles and transforms

use bytemuck::{Pod, Zeroable};

/// A 2D point
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: Point) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    pub fn lerp(&self, other: Point, t: f32) -> Point {
        Point::new(
            self.x + (other.x - self.x) * t,
            self.y + (other.y - self.y) * t,
        )
    }
}

impl std::ops::Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl std::ops::Mul<f32> for Point {
    type Output = Point;

    fn mul(self, rhs: f32) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

/// A 2D size
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

impl From<IntSize> for Size {
    fn from(size: IntSize) -> Self {
        Size::new(size.width as f32, size.height as f32)
    }
}

/// A rectangle defined by its origin and size
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_size(size: Size) -> Self {
        Self::new(0.0, 0.0, size.width, size.height)
    }

    /// Rectangle spanning `left..right` and `top..bottom`
    pub fn from_ltrb(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self::new(left, top, right - left, bottom - top)
    }

    pub fn from_points(p1: Point, p2: Point) -> Self {
        Self::from_ltrb(p1.x.min(p2.x), p1.y.min(p2.y), p1.x.max(p2.x), p1.y.max(p2.y))
    }

    pub fn left(&self) -> f32 {
        self.x
    }

    pub fn top(&self) -> f32 {
        self.y
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// A negative width or height
    pub fn is_inverted(&self) -> bool {
        self.width < 0.0 || self.height < 0.0
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x
            && point.x < self.right()
            && point.y >= self.y
            && point.y < self.bottom()
    }

    /// Overlapping area, clamped to an empty rectangle when disjoint
    pub fn intersection(&self, other: &Rect) -> Rect {
        let left = self.left().max(other.left());
        let top = self.top().max(other.top());
        let right = self.right().min(other.right()).max(left);
        let bottom = self.bottom().min(other.bottom()).max(top);
        Rect::from_ltrb(left, top, right, bottom)
    }

    pub fn translate(&self, dx: f32, dy: f32) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }
}

/// An integer 2D point
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct IntPoint {
    pub x: i32,
    pub y: i32,
}

impl IntPoint {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// An integer size in pixels
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct IntSize {
    pub width: i32,
    pub height: i32,
}

impl IntSize {
    pub const fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    pub fn is_positive(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn area(&self) -> usize {
        (self.width.max(0) as usize) * (self.height.max(0) as usize)
    }
}

/// An integer rectangle defined by its origin and size
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IntRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl IntRect {
    pub const fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn from_size(size: IntSize) -> Self {
        Self::new(0, 0, size.width, size.height)
    }

    pub fn from_ltrb(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self::new(left, top, right - left, bottom - top)
    }

    /// Smallest integer rectangle covering `rect`
    pub fn enclosing(rect: &Rect) -> Self {
        Self::from_ltrb(
            rect.left().floor() as i32,
            rect.top().floor() as i32,
            rect.right().ceil() as i32,
            rect.bottom().ceil() as i32,
        )
    }

    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn size(&self) -> IntSize {
        IntSize::new(self.width, self.height)
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    pub fn intersection(&self, other: &IntRect) -> IntRect {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = self.right().min(other.right()).max(left);
        let bottom = self.bottom().min(other.bottom()).max(top);
        IntRect::from_ltrb(left, top, right, bottom)
    }

    /// Mirror the rectangle vertically inside a surface of `height` rows
    pub fn flip_vertical(&self, height: i32) -> IntRect {
        IntRect::new(self.x, height - self.bottom(), self.width, self.height)
    }
}

impl From<IntRect> for Rect {
    fn from(rect: IntRect) -> Self {
        Rect::new(
            rect.x as f32,
            rect.y as f32,
            rect.width as f32,
            rect.height as f32,
        )
    }
}

/// Depth range of clip space produced by a backend
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ClipZRange {
    /// OpenGL style, z in [-w, w]
    #[default]
    NegativePositiveW,
    /// Direct3D style, z in [0, w]
    ZeroPositiveW,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Handedness {
    Left,
    #[default]
    Right,
}

/// 4x4 transformation matrix (column-major)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mat4 {
    pub cols: [[f32; 4]; 4],
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mat4 {
    pub const IDENTITY: Mat4 = Mat4 {
        cols: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    pub fn translation(x: f32, y: f32, z: f32) -> Self {
        Self {
            cols: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [x, y, z, 1.0],
            ],
        }
    }

    pub fn scale(x: f32, y: f32, z: f32) -> Self {
        Self {
            cols: [
                [x, 0.0, 0.0, 0.0],
                [0.0, y, 0.0, 0.0],
                [0.0, 0.0, z, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Rotation around the z axis, angle in radians
    pub fn rotation_z(angle: f32) -> Self {
        let c = angle.cos();
        let s = angle.sin();
        Self {
            cols: [
                [c, s, 0.0, 0.0],
                [-s, c, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Orthographic projection for 2D rendering (near -1, far 1)
    pub fn ortho_2d(
        left: f32,
        right: f32,
        bottom: f32,
        top: f32,
        handedness: Handedness,
        clip_z: ClipZRange,
    ) -> Self {
        let z_sign = match handedness {
            Handedness::Right => -1.0,
            Handedness::Left => 1.0,
        };
        let (z_scale, z_offset) = match clip_z {
            ClipZRange::NegativePositiveW => (z_sign, 0.0),
            ClipZRange::ZeroPositiveW => (z_sign * 0.5, 0.5),
        };
        Self {
            cols: [
                [2.0 / (right - left), 0.0, 0.0, 0.0],
                [0.0, 2.0 / (top - bottom), 0.0, 0.0],
                [0.0, 0.0, z_scale, 0.0],
                [
                    -(right + left) / (right - left),
                    -(top + bottom) / (top - bottom),
                    z_offset,
                    1.0,
                ],
            ],
        }
    }

    /// Multiply two matrices (`self * other`, `other` is applied first)
    pub fn mul(&self, other: &Mat4) -> Mat4 {
        let mut result = [[0.0f32; 4]; 4];
        for (i, column) in result.iter_mut().enumerate() {
            for (j, value) in column.iter_mut().enumerate() {
                for k in 0..4 {
                    *value += self.cols[k][j] * other.cols[i][k];
                }
            }
        }
        Mat4 { cols: result }
    }

    pub fn transform_vec4(&self, v: [f32; 4]) -> [f32; 4] {
        let mut out = [0.0f32; 4];
        for (j, value) in out.iter_mut().enumerate() {
            *value = self.cols[0][j] * v[0]
                + self.cols[1][j] * v[1]
                + self.cols[2][j] * v[2]
                + self.cols[3][j] * v[3];
        }
        out
    }

    /// Transform a point in the z = 0 plane, ignoring perspective
    pub fn transform_point(&self, point: Point) -> Point {
        let [x, y, _, _] = self.transform_vec4([point.x, point.y, 0.0, 1.0]);
        Point::new(x, y)
    }

    /// Axis-aligned bounds of a transformed rectangle
    pub fn transform_rect_bounds(&self, rect: &Rect) -> Rect {
        let corners = [
            self.transform_point(Point::new(rect.left(), rect.top())),
            self.transform_point(Point::new(rect.right(), rect.top())),
            self.transform_point(Point::new(rect.left(), rect.bottom())),
            self.transform_point(Point::new(rect.right(), rect.bottom())),
        ];
        let mut left = f32::MAX;
        let mut top = f32::MAX;
        let mut right = f32::MIN;
        let mut bottom = f32::MIN;
        for c in &corners {
            left = left.min(c.x);
            top = top.min(c.y);
            right = right.max(c.x);
            bottom = bottom.max(c.y);
        }
        Rect::from_ltrb(left, top, right, bottom)
    }

    /// The 2D affine part as `[a, b, c, d, tx, ty]`
    ///
    /// ```text
    /// | a  c  tx |
    /// | b  d  ty |
    /// ```
    pub fn affine_2d(&self) -> [f32; 6] {
        [
            self.cols[0][0],
            self.cols[0][1],
            self.cols[1][0],
            self.cols[1][1],
            self.cols[3][0],
            self.cols[3][1],
        ]
    }

    pub fn from_affine_2d(elements: [f32; 6]) -> Self {
        let [a, b, c, d, tx, ty] = elements;
        Self {
            cols: [
                [a, b, 0.0, 0.0],
                [c, d, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [tx, ty, 0.0, 1.0],
            ],
        }
    }

    /// Inverse of the 2D affine part, `None` when it is singular
    pub fn inverse_affine_2d(&self) -> Option<Mat4> {
        let [a, b, c, d, tx, ty] = self.affine_2d();
        let det = a * d - b * c;
        if det.abs() <= f32::EPSILON * f32::EPSILON {
            return None;
        }
        let inv = 1.0 / det;
        let ia = d * inv;
        let ib = -b * inv;
        let ic = -c * inv;
        let id = a * inv;
        Some(Mat4::from_affine_2d([
            ia,
            ib,
            ic,
            id,
            -(ia * tx + ic * ty),
            -(ib * tx + id * ty),
        ]))
    }
}
