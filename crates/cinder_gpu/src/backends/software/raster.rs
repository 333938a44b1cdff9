//! Scan conversion
//!
//! Coordinates are device pixels `(x, row)` with pixel centers at `+0.5`.
//! Triangle vertices snap to a 1/256 pixel grid so edge functions evaluate
//! exactly and shared edges are owned by exactly one triangle.

use cinder_core::IntRect;

use crate::description::PrimitivesType;

const SUBPIXEL: f64 = 256.0;

fn snap(v: f64) -> f64 {
    (v * SUBPIXEL).round() / SUBPIXEL
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub(super) struct DevicePoint {
    pub x: f64,
    pub y: f64,
}

fn edge(a: DevicePoint, b: DevicePoint, px: f64, py: f64) -> f64 {
    (b.x - a.x) * (py - a.y) - (b.y - a.y) * (px - a.x)
}

/// Tie rule for pixels exactly on edge `a -> b`; opposite directions of the
/// same edge never agree
fn owns_edge(a: DevicePoint, b: DevicePoint) -> bool {
    a.y < b.y || (a.y == b.y && a.x > b.x)
}

/// Emit every pixel inside the triangle with its barycentric weights
pub(super) fn rasterize_triangle(
    vertices: [DevicePoint; 3],
    clip: IntRect,
    mut emit: impl FnMut(i32, i32, [f32; 3]),
) {
    let v = vertices.map(|p| DevicePoint {
        x: snap(p.x),
        y: snap(p.y),
    });
    let mut order = [0usize, 1, 2];
    let mut area = edge(v[0], v[1], v[2].x, v[2].y);
    if area == 0.0 || !area.is_finite() {
        return;
    }
    if area < 0.0 {
        order = [0, 2, 1];
        area = -area;
    }
    let (a, b, c) = (v[order[0]], v[order[1]], v[order[2]]);

    let min_x = a.x.min(b.x).min(c.x).floor() as i64;
    let max_x = a.x.max(b.x).max(c.x).ceil() as i64;
    let min_y = a.y.min(b.y).min(c.y).floor() as i64;
    let max_y = a.y.max(b.y).max(c.y).ceil() as i64;
    let x0 = min_x.max(clip.x as i64);
    let x1 = max_x.min(clip.right() as i64);
    let y0 = min_y.max(clip.y as i64);
    let y1 = max_y.min(clip.bottom() as i64);

    let owners = [owns_edge(b, c), owns_edge(c, a), owns_edge(a, b)];
    let inside = |w: f64, owner: bool| w > 0.0 || (w == 0.0 && owner);

    for row in y0..y1 {
        let py = row as f64 + 0.5;
        for col in x0..x1 {
            let px = col as f64 + 0.5;
            let wa = edge(b, c, px, py);
            let wb = edge(c, a, px, py);
            let wc = edge(a, b, px, py);
            if inside(wa, owners[0]) && inside(wb, owners[1]) && inside(wc, owners[2]) {
                let mut weights = [0.0f32; 3];
                weights[order[0]] = (wa / area) as f32;
                weights[order[1]] = (wb / area) as f32;
                weights[order[2]] = (wc / area) as f32;
                emit(col as i32, row as i32, weights);
            }
        }
    }
}

/// Step from `a` towards `b`, covering the start pixel and leaving out the end
pub(super) fn rasterize_line(
    a: DevicePoint,
    b: DevicePoint,
    clip: IntRect,
    mut emit: impl FnMut(i32, i32, f32),
) {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let steps = dx.abs().max(dy.abs()).round() as i64;
    if steps <= 0 {
        return;
    }
    for i in 0..steps {
        let t = i as f64 / steps as f64;
        let x = (a.x + dx * t).floor() as i32;
        let y = (a.y + dy * t).floor() as i32;
        if clip.contains(x, y) {
            emit(x, y, t as f32);
        }
    }
}

pub(super) fn rasterize_point(p: DevicePoint, clip: IntRect, mut emit: impl FnMut(i32, i32)) {
    let x = p.x.floor() as i32;
    let y = p.y.floor() as i32;
    if clip.contains(x, y) {
        emit(x, y);
    }
}

/// Assembled primitive, as indices into the fetched vertex list
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Primitive {
    Point(usize),
    Line(usize, usize),
    Triangle(usize, usize, usize),
}

/// Split `count` vertices into primitives of the given topology
pub(super) fn assemble(primitives: PrimitivesType, count: usize) -> Vec<Primitive> {
    let mut out = Vec::new();
    match primitives {
        PrimitivesType::Points => out.extend((0..count).map(Primitive::Point)),
        PrimitivesType::Lines => {
            out.extend((0..count / 2).map(|i| Primitive::Line(i * 2, i * 2 + 1)));
        }
        PrimitivesType::LineStrip | PrimitivesType::LineLoop => {
            if count >= 2 {
                out.extend((0..count - 1).map(|i| Primitive::Line(i, i + 1)));
                if primitives == PrimitivesType::LineLoop && count > 2 {
                    out.push(Primitive::Line(count - 1, 0));
                }
            }
        }
        PrimitivesType::Triangles => {
            out.extend((0..count / 3).map(|i| Primitive::Triangle(i * 3, i * 3 + 1, i * 3 + 2)));
        }
        PrimitivesType::TriangleStrip => {
            for i in 0..count.saturating_sub(2) {
                // Odd triangles swap to keep a consistent winding
                if i % 2 == 0 {
                    out.push(Primitive::Triangle(i, i + 1, i + 2));
                } else {
                    out.push(Primitive::Triangle(i + 1, i, i + 2));
                }
            }
        }
        PrimitivesType::TriangleFan => {
            for i in 1..count.saturating_sub(1) {
                out.push(Primitive::Triangle(0, i, i + 1));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64) -> DevicePoint {
        DevicePoint { x, y }
    }

    #[test]
    fn test_shared_diagonal_is_covered_once() {
        let clip = IntRect::new(0, 0, 8, 8);
        let mut hits = [[0u8; 8]; 8];
        let quad = [p(0.0, 0.0), p(8.0, 0.0), p(8.0, 8.0), p(0.0, 8.0)];
        for tri in [[quad[0], quad[1], quad[2]], [quad[0], quad[2], quad[3]]] {
            rasterize_triangle(tri, clip, |x, y, _| hits[y as usize][x as usize] += 1);
        }
        assert!(hits.iter().flatten().all(|&h| h == 1));
    }

    #[test]
    fn test_weights_interpolate() {
        let clip = IntRect::new(0, 0, 4, 4);
        let mut sum = None;
        rasterize_triangle([p(0.0, 0.0), p(4.0, 0.0), p(0.0, 4.0)], clip, |x, y, w| {
            if x == 0 && y == 0 {
                sum = Some(w.iter().sum::<f32>());
            }
        });
        assert!((sum.unwrap() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_line_is_half_open() {
        let clip = IntRect::new(0, 0, 16, 16);
        let mut pixels = Vec::new();
        rasterize_line(p(2.5, 3.5), p(6.5, 3.5), clip, |x, y, _| pixels.push((x, y)));
        assert_eq!(pixels, vec![(2, 3), (3, 3), (4, 3), (5, 3)]);
    }

    #[test]
    fn test_assemble_strip_and_loop() {
        assert_eq!(
            assemble(PrimitivesType::TriangleStrip, 4),
            vec![Primitive::Triangle(0, 1, 2), Primitive::Triangle(2, 1, 3)]
        );
        assert_eq!(assemble(PrimitivesType::LineLoop, 3).len(), 3);
        assert!(assemble(PrimitivesType::Lines, 1).is_empty());
    }
}
