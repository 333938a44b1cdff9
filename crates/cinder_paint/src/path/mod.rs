//! Path building and representation
//!
//! A path is a list of subpaths. Each subpath starts at a point and carries
//! a run of segments whose points are stored flat, next to a parallel list
//! of segment kinds.

pub mod brush;
pub mod flatten;
pub mod rasterizer;

use cinder_core::{Point, Rect};
use smallvec::SmallVec;

pub use brush::{Brush, GradientStop, Paint};
pub use flatten::Flattener;
pub use rasterizer::{BlockCoverage, MaskBlock, PathRasterizer};

/// Circle approximation constant for cubic arcs
const KAPPA: f32 = 0.552_284_8;

/// How overlapping areas are filled
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum FillRule {
    /// Covered where the winding number is not zero
    #[default]
    NonZero,
    /// Covered where the crossing count is odd
    EvenOdd,
}

impl FillRule {
    pub fn is_inside(&self, winding: i32) -> bool {
        match self {
            FillRule::NonZero => winding != 0,
            FillRule::EvenOdd => winding % 2 != 0,
        }
    }
}

/// Segment kind tag; the number of points it consumes is its degree
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SegmentKind {
    Line,
    Quadratic,
    Cubic,
}

impl SegmentKind {
    pub fn point_count(&self) -> usize {
        match self {
            SegmentKind::Line => 1,
            SegmentKind::Quadratic => 2,
            SegmentKind::Cubic => 3,
        }
    }
}

/// One segment with its absolute points
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Segment {
    Line(Point, Point),
    Quadratic(Point, Point, Point),
    Cubic(Point, Point, Point, Point),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Subpath {
    /// `points[0]` is the start point
    points: Vec<Point>,
    segments: SmallVec<[SegmentKind; 8]>,
    closed: bool,
}

impl Subpath {
    fn new(start: Point) -> Self {
        Self {
            points: vec![start],
            segments: SmallVec::new(),
            closed: false,
        }
    }

    pub fn start(&self) -> Point {
        self.points[0]
    }

    /// The current position: the last point of the last segment
    pub fn end(&self) -> Point {
        self.points[self.points.len() - 1]
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    pub fn segment_kinds(&self) -> &[SegmentKind] {
        &self.segments
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// No segments; never rendered
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    pub fn segments(&self) -> impl Iterator<Item = Segment> + '_ {
        let mut cursor = 0;
        self.segments.iter().map(move |kind| {
            let p = &self.points[cursor..];
            cursor += kind.point_count();
            match kind {
                SegmentKind::Line => Segment::Line(p[0], p[1]),
                SegmentKind::Quadratic => Segment::Quadratic(p[0], p[1], p[2]),
                SegmentKind::Cubic => Segment::Cubic(p[0], p[1], p[2], p[3]),
            }
        })
    }

    fn push(&mut self, kind: SegmentKind, points: &[Point]) {
        debug_assert_eq!(points.len(), kind.point_count());
        self.points.extend_from_slice(points);
        self.segments.push(kind);
    }
}

/// A 2D vector shape
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Path {
    subpaths: Vec<Subpath>,
    fill_rule: FillRule,
}

impl Path {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_fill_rule(mut self, fill_rule: FillRule) -> Self {
        self.fill_rule = fill_rule;
        self
    }

    pub fn fill_rule(&self) -> FillRule {
        self.fill_rule
    }

    pub fn set_fill_rule(&mut self, fill_rule: FillRule) {
        self.fill_rule = fill_rule;
    }

    pub fn subpaths(&self) -> &[Subpath] {
        &self.subpaths
    }

    /// True when no subpath has a segment
    pub fn is_empty(&self) -> bool {
        self.subpaths.iter().all(Subpath::is_empty)
    }

    /// Start a new subpath at `point`
    pub fn move_to(&mut self, point: Point) -> &mut Self {
        match self.subpaths.last_mut() {
            Some(last) if last.is_empty() => *last = Subpath::new(point),
            _ => self.subpaths.push(Subpath::new(point)),
        }
        self
    }

    pub fn line_to(&mut self, point: Point) -> &mut Self {
        self.current().push(SegmentKind::Line, &[point]);
        self
    }

    /// Quadratic bezier through `control` to `end`
    pub fn bezier_to(&mut self, control: Point, end: Point) -> &mut Self {
        self.current().push(SegmentKind::Quadratic, &[control, end]);
        self
    }

    pub fn cubic_to(&mut self, control1: Point, control2: Point, end: Point) -> &mut Self {
        self.current()
            .push(SegmentKind::Cubic, &[control1, control2, end]);
        self
    }

    /// Close the current subpath; drawing continues from its start point
    pub fn close(&mut self) -> &mut Self {
        if let Some(last) = self.subpaths.last_mut() {
            if !last.is_empty() {
                last.closed = true;
            }
        }
        self
    }

    /// Subpath receiving new segments, opened from the current position if
    /// the last one is closed
    fn current(&mut self) -> &mut Subpath {
        let start = match self.subpaths.last() {
            None => Some(Point::ZERO),
            Some(last) if last.closed => Some(last.start()),
            Some(_) => None,
        };
        if let Some(start) = start {
            self.subpaths.push(Subpath::new(start));
        }
        let last = self.subpaths.len() - 1;
        &mut self.subpaths[last]
    }

    /// Bounds of every point including control points, `None` when empty
    pub fn bounding_rect(&self) -> Option<Rect> {
        let mut points = self
            .subpaths
            .iter()
            .filter(|s| !s.is_empty())
            .flat_map(|s| s.points.iter());
        let first = points.next()?;
        let (mut left, mut top, mut right, mut bottom) = (first.x, first.y, first.x, first.y);
        for p in points {
            left = left.min(p.x);
            top = top.min(p.y);
            right = right.max(p.x);
            bottom = bottom.max(p.y);
        }
        Some(Rect::from_ltrb(left, top, right, bottom))
    }

    // ─── Shapes ─────────────────────────────────────────────────────────

    pub fn line(start: Point, end: Point) -> Self {
        let mut path = Path::new();
        path.move_to(start).line_to(end);
        path
    }

    pub fn polygon(points: &[Point]) -> Self {
        let mut path = Path::new();
        if let Some((first, rest)) = points.split_first() {
            path.move_to(*first);
            for p in rest {
                path.line_to(*p);
            }
            path.close();
        }
        path
    }

    pub fn rect(rect: Rect) -> Self {
        Self::polygon(&[
            Point::new(rect.left(), rect.top()),
            Point::new(rect.right(), rect.top()),
            Point::new(rect.right(), rect.bottom()),
            Point::new(rect.left(), rect.bottom()),
        ])
    }

    /// Rectangle with circular corners, `radius` is clamped to half the
    /// shorter side
    pub fn rounded_rect(rect: Rect, radius: f32) -> Self {
        let r = radius.max(0.0).min(rect.width.abs() * 0.5).min(rect.height.abs() * 0.5);
        if r <= 0.0 {
            return Self::rect(rect);
        }
        let k = r * KAPPA;
        let (l, t, rt, b) = (rect.left(), rect.top(), rect.right(), rect.bottom());
        let mut path = Path::new();
        path.move_to(Point::new(l + r, t))
            .line_to(Point::new(rt - r, t))
            .cubic_to(Point::new(rt - r + k, t), Point::new(rt, t + r - k), Point::new(rt, t + r))
            .line_to(Point::new(rt, b - r))
            .cubic_to(Point::new(rt, b - r + k), Point::new(rt - r + k, b), Point::new(rt - r, b))
            .line_to(Point::new(l + r, b))
            .cubic_to(Point::new(l + r - k, b), Point::new(l, b - r + k), Point::new(l, b - r))
            .line_to(Point::new(l, t + r))
            .cubic_to(Point::new(l, t + r - k), Point::new(l + r - k, t), Point::new(l + r, t))
            .close();
        path
    }

    pub fn circle(center: Point, radius: f32) -> Self {
        Self::ellipse(center, radius, radius)
    }

    pub fn ellipse(center: Point, radius_x: f32, radius_y: f32) -> Self {
        let (cx, cy) = (center.x, center.y);
        let (kx, ky) = (radius_x * KAPPA, radius_y * KAPPA);
        let mut path = Path::new();
        path.move_to(Point::new(cx + radius_x, cy))
            .cubic_to(
                Point::new(cx + radius_x, cy + ky),
                Point::new(cx + kx, cy + radius_y),
                Point::new(cx, cy + radius_y),
            )
            .cubic_to(
                Point::new(cx - kx, cy + radius_y),
                Point::new(cx - radius_x, cy + ky),
                Point::new(cx - radius_x, cy),
            )
            .cubic_to(
                Point::new(cx - radius_x, cy - ky),
                Point::new(cx - kx, cy - radius_y),
                Point::new(cx, cy - radius_y),
            )
            .cubic_to(
                Point::new(cx + kx, cy - radius_y),
                Point::new(cx + radius_x, cy - ky),
                Point::new(cx + radius_x, cy),
            )
            .close();
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_carry_absolute_points() {
        let mut path = Path::new();
        path.move_to(Point::new(0.0, 0.0))
            .line_to(Point::new(10.0, 0.0))
            .bezier_to(Point::new(15.0, 5.0), Point::new(10.0, 10.0))
            .close();

        let subpath = &path.subpaths()[0];
        let segments: Vec<Segment> = subpath.segments().collect();
        assert_eq!(
            segments,
            vec![
                Segment::Line(Point::new(0.0, 0.0), Point::new(10.0, 0.0)),
                Segment::Quadratic(
                    Point::new(10.0, 0.0),
                    Point::new(15.0, 5.0),
                    Point::new(10.0, 10.0)
                ),
            ]
        );
        assert!(subpath.is_closed());
    }

    #[test]
    fn test_move_to_replaces_empty_subpath() {
        let mut path = Path::new();
        path.move_to(Point::new(1.0, 1.0)).move_to(Point::new(2.0, 2.0));
        assert_eq!(path.subpaths().len(), 1);
        assert_eq!(path.subpaths()[0].start(), Point::new(2.0, 2.0));
        assert!(path.is_empty());
    }

    #[test]
    fn test_drawing_after_close_starts_at_close_point() {
        let mut path = Path::new();
        path.move_to(Point::new(5.0, 5.0))
            .line_to(Point::new(6.0, 5.0))
            .close()
            .line_to(Point::new(5.0, 9.0));
        assert_eq!(path.subpaths().len(), 2);
        assert_eq!(path.subpaths()[1].start(), Point::new(5.0, 5.0));
    }

    #[test]
    fn test_bounding_rect() {
        assert_eq!(Path::new().bounding_rect(), None);
        let circle = Path::circle(Point::new(10.0, 10.0), 5.0);
        assert_eq!(circle.bounding_rect(), Some(Rect::new(5.0, 5.0, 10.0, 10.0)));
    }

    #[test]
    fn test_fill_rules() {
        assert!(FillRule::NonZero.is_inside(2));
        assert!(!FillRule::EvenOdd.is_inside(2));
        assert!(FillRule::EvenOdd.is_inside(-1));
        assert!(!FillRule::NonZero.is_inside(0));
    }
}
