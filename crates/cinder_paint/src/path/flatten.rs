//! Curve flattening
//!
//! Turns path segments into polylines in a target space. Curves are
//! transformed first and flattened afterwards, so the tolerance is measured
//! in target (device) units whatever the transform scale.

use cinder_core::{FlattenStrategy, Mat4, Point, RenderConfig};

use super::{Path, Segment, Subpath};

/// Subdivision depth limit of the adaptive strategy
const MAX_DEPTH: u32 = 16;
/// Step limit of the fixed step strategy
const MAX_STEPS: usize = 256;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Flattener {
    strategy: FlattenStrategy,
    tolerance: f32,
}

impl Default for Flattener {
    fn default() -> Self {
        Self::new(FlattenStrategy::Adaptive, 0.25)
    }
}

impl Flattener {
    pub fn new(strategy: FlattenStrategy, tolerance: f32) -> Self {
        Self {
            strategy,
            tolerance: tolerance.max(1e-3),
        }
    }

    pub fn from_config(config: &RenderConfig) -> Self {
        Self::new(config.flatten_strategy, config.flatten_tolerance)
    }

    pub fn strategy(&self) -> FlattenStrategy {
        self.strategy
    }

    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    /// One closed polygon per non-empty subpath
    ///
    /// Open subpaths are closed implicitly, which is what filling needs.
    pub fn flatten(&self, path: &Path, transform: &Mat4) -> Vec<Vec<Point>> {
        path.subpaths()
            .iter()
            .filter(|subpath| !subpath.is_empty())
            .map(|subpath| {
                let mut polygon = self.flatten_subpath(subpath, transform);
                if polygon.len() > 1 && polygon.first() == polygon.last() {
                    polygon.pop();
                }
                polygon
            })
            .collect()
    }

    /// Polyline through the subpath, starting with its start point
    pub fn flatten_subpath(&self, subpath: &Subpath, transform: &Mat4) -> Vec<Point> {
        let t = |p: Point| transform.transform_point(p);
        let mut out = vec![t(subpath.start())];
        for segment in subpath.segments() {
            match segment {
                Segment::Line(_, p1) => out.push(t(p1)),
                Segment::Quadratic(p0, c, p1) => {
                    let (c1, c2) = elevate(t(p0), t(c), t(p1));
                    self.flatten_cubic(t(p0), c1, c2, t(p1), &mut out);
                }
                Segment::Cubic(p0, c1, c2, p1) => {
                    self.flatten_cubic(t(p0), t(c1), t(c2), t(p1), &mut out);
                }
            }
        }
        out
    }

    /// Append the points after `p0`
    fn flatten_cubic(&self, p0: Point, c1: Point, c2: Point, p3: Point, out: &mut Vec<Point>) {
        match self.strategy {
            FlattenStrategy::Adaptive => self.subdivide(p0, c1, c2, p3, 0, out),
            FlattenStrategy::FixedStep => {
                let polygon = p0.distance(c1) + c1.distance(c2) + c2.distance(p3);
                let length = (polygon + p0.distance(p3)) * 0.5;
                let steps = ((length / self.tolerance).sqrt().ceil() as usize).clamp(1, MAX_STEPS);
                for i in 1..=steps {
                    out.push(cubic_point(p0, c1, c2, p3, i as f32 / steps as f32));
                }
            }
        }
    }

    fn subdivide(&self, p0: Point, c1: Point, c2: Point, p3: Point, depth: u32, out: &mut Vec<Point>) {
        if depth >= MAX_DEPTH || is_flat(p0, c1, c2, p3, self.tolerance) {
            out.push(p3);
            return;
        }
        let ab = p0.lerp(c1, 0.5);
        let bc = c1.lerp(c2, 0.5);
        let cd = c2.lerp(p3, 0.5);
        let abc = ab.lerp(bc, 0.5);
        let bcd = bc.lerp(cd, 0.5);
        let mid = abc.lerp(bcd, 0.5);
        self.subdivide(p0, ab, abc, mid, depth + 1, out);
        self.subdivide(mid, bcd, cd, p3, depth + 1, out);
    }
}

/// Cubic control points of a quadratic
fn elevate(p0: Point, c: Point, p1: Point) -> (Point, Point) {
    let two_thirds = 2.0 / 3.0;
    (p0.lerp(c, two_thirds), p1.lerp(c, two_thirds))
}

fn cubic_point(p0: Point, c1: Point, c2: Point, p3: Point, t: f32) -> Point {
    let mt = 1.0 - t;
    let a = mt * mt * mt;
    let b = 3.0 * mt * mt * t;
    let c = 3.0 * mt * t * t;
    let d = t * t * t;
    Point::new(
        a * p0.x + b * c1.x + c * c2.x + d * p3.x,
        a * p0.y + b * c1.y + c * c2.y + d * p3.y,
    )
}

/// Roger Willcocks' bound: the curve stays within `tolerance` of its chord
fn is_flat(p0: Point, c1: Point, c2: Point, p3: Point, tolerance: f32) -> bool {
    let ux = 3.0 * c1.x - 2.0 * p0.x - p3.x;
    let uy = 3.0 * c1.y - 2.0 * p0.y - p3.y;
    let vx = 3.0 * c2.x - p0.x - 2.0 * p3.x;
    let vy = 3.0 * c2.y - p0.y - 2.0 * p3.y;
    let x = (ux * ux).max(vx * vx);
    let y = (uy * uy).max(vy * vy);
    x + y <= 16.0 * tolerance * tolerance
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_core::Rect;

    fn max_radius_error(points: &[Point], center: Point, radius: f32) -> f32 {
        points
            .iter()
            .map(|p| (p.distance(center) - radius).abs())
            .fold(0.0, f32::max)
    }

    #[test]
    fn test_lines_pass_through() {
        let path = Path::rect(Rect::new(1.0, 2.0, 3.0, 4.0));
        let polygons = Flattener::default().flatten(&path, &Mat4::IDENTITY);
        assert_eq!(
            polygons,
            vec![vec![
                Point::new(1.0, 2.0),
                Point::new(4.0, 2.0),
                Point::new(4.0, 6.0),
                Point::new(1.0, 6.0),
            ]]
        );
    }

    #[test]
    fn test_adaptive_circle_stays_within_tolerance() {
        let center = Point::new(50.0, 50.0);
        let path = Path::circle(center, 40.0);
        let flattener = Flattener::new(FlattenStrategy::Adaptive, 0.25);
        let polygons = flattener.flatten(&path, &Mat4::IDENTITY);
        assert_eq!(polygons.len(), 1);
        assert!(polygons[0].len() > 16);
        // cubic arcs deviate from a true circle by ~0.03% of the radius
        assert!(max_radius_error(&polygons[0], center, 40.0) < 0.25);
    }

    #[test]
    fn test_tolerance_applies_after_transform() {
        let path = Path::circle(Point::ZERO, 1.0);
        let flattener = Flattener::new(FlattenStrategy::Adaptive, 0.25);
        let small = flattener.flatten(&path, &Mat4::IDENTITY)[0].len();
        let large = flattener.flatten(&path, &Mat4::scale(100.0, 100.0, 1.0))[0].len();
        assert!(large > small);
    }

    #[test]
    fn test_fixed_step_count() {
        let mut path = Path::new();
        path.move_to(Point::ZERO)
            .cubic_to(Point::new(0.0, 10.0), Point::new(10.0, 10.0), Point::new(10.0, 0.0));
        let flattener = Flattener::new(FlattenStrategy::FixedStep, 0.25);
        let polyline = flattener.flatten_subpath(&path.subpaths()[0], &Mat4::IDENTITY);
        // length estimate (30 + 10) / 2 = 20, sqrt(20 / 0.25) ~ 8.9
        assert_eq!(polyline.len(), 1 + 9);
        assert_eq!(polyline.last(), Some(&Point::new(10.0, 0.0)));
    }

    #[test]
    fn test_quadratic_is_elevated() {
        let mut path = Path::new();
        path.move_to(Point::ZERO)
            .bezier_to(Point::new(5.0, 10.0), Point::new(10.0, 0.0));
        let polyline = Flattener::new(FlattenStrategy::FixedStep, 0.01)
            .flatten_subpath(&path.subpaths()[0], &Mat4::IDENTITY);
        // the apex of this quadratic is (5, 5)
        let apex = polyline.iter().map(|p| p.y).fold(0.0, f32::max);
        assert!((apex - 5.0).abs() < 0.05);
    }

    #[test]
    fn test_empty_subpaths_are_skipped() {
        let mut path = Path::new();
        path.move_to(Point::new(3.0, 3.0));
        assert!(Flattener::default().flatten(&path, &Mat4::IDENTITY).is_empty());
    }
}
