//! Scanline coverage rasterizer
//!
//! Polygons are sampled on `antialias_level` rows per pixel. Each sample row
//! yields the spans inside the path under the fill rule; horizontal coverage
//! inside a span is exact. Output is cut into square blocks aligned to
//! multiples of the block size, so fully covered blocks can share one mask
//! cell and untouched blocks are never emitted.

use cinder_core::{GraphicsError, IntPoint, IntRect, Point, RenderConfig, Result};

use super::FillRule;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockCoverage {
    /// Every pixel of the block is fully covered
    Full,
    /// Row-major 8-bit coverage, `block_size * block_size` values
    Partial(Box<[u8]>),
}

/// Coverage of one block of device pixels
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MaskBlock {
    /// Device pixel of the block's first row and column
    pub origin: IntPoint,
    pub coverage: BlockCoverage,
}

impl MaskBlock {
    pub fn is_full(&self) -> bool {
        matches!(self.coverage, BlockCoverage::Full)
    }

    /// Coverage of the pixel at `(x, y)` relative to the origin
    pub fn coverage_at(&self, x: i32, y: i32, block_size: i32) -> u8 {
        match &self.coverage {
            BlockCoverage::Full => 255,
            BlockCoverage::Partial(values) => values[(y * block_size + x) as usize],
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Edge {
    top: f32,
    bottom: f32,
    /// x at `top`
    x: f32,
    slope: f32,
    winding: i32,
}

impl Edge {
    fn new(p0: Point, p1: Point) -> Option<Edge> {
        if p0.y == p1.y {
            return None;
        }
        let (upper, lower, winding) = if p0.y < p1.y { (p0, p1, 1) } else { (p1, p0, -1) };
        Some(Edge {
            top: upper.y,
            bottom: lower.y,
            x: upper.x,
            slope: (lower.x - upper.x) / (lower.y - upper.y),
            winding,
        })
    }

    fn crosses(&self, y: f32) -> bool {
        self.top <= y && y < self.bottom
    }

    fn x_at(&self, y: f32) -> f32 {
        self.x + (y - self.top) * self.slope
    }
}

type Span = (f32, f32);

pub struct PathRasterizer {
    block_size: i32,
    antialias_level: u32,
    edges: Vec<Edge>,
    crossings: Vec<(f32, i32)>,
    /// Spans of every sample row in the current band of blocks
    rows: Vec<Vec<Span>>,
}

impl PathRasterizer {
    pub fn new(block_size: i32, antialias_level: u32) -> Result<Self> {
        if block_size <= 0 {
            return Err(GraphicsError::invalid_argument(format!(
                "mask block size {} must be positive",
                block_size
            )));
        }
        if antialias_level == 0 {
            return Err(GraphicsError::invalid_argument(
                "antialias level must be at least 1",
            ));
        }
        let sample_rows = block_size as usize * antialias_level as usize;
        Ok(Self {
            block_size,
            antialias_level,
            edges: Vec::new(),
            crossings: Vec::new(),
            rows: vec![Vec::new(); sample_rows],
        })
    }

    pub fn from_config(config: &RenderConfig) -> Result<Self> {
        Self::new(config.mask_block_size, config.antialias_level)
    }

    pub fn block_size(&self) -> i32 {
        self.block_size
    }

    pub fn antialias_level(&self) -> u32 {
        self.antialias_level
    }

    /// Rasterize closed polygons in device space, limited to `clip`
    ///
    /// Blocks come out in rows from top to bottom, left to right inside a
    /// row. Blocks without any coverage are omitted.
    pub fn rasterize(
        &mut self,
        polygons: &[Vec<Point>],
        fill_rule: FillRule,
        clip: IntRect,
    ) -> Vec<MaskBlock> {
        let Some(bounds) = self.collect_edges(polygons) else {
            return Vec::new();
        };
        let region = bounds.intersection(&clip);
        if region.is_empty() {
            return Vec::new();
        }

        let bs = self.block_size;
        let first_row = region.y.div_euclid(bs) * bs;
        let first_col = region.x.div_euclid(bs) * bs;
        let mut blocks = Vec::new();
        let mut band = first_row;
        while band < region.bottom() {
            self.scan_band(band, region, fill_rule);
            let mut col = first_col;
            while col < region.right() {
                if let Some(coverage) = self.block_coverage(col) {
                    blocks.push(MaskBlock {
                        origin: IntPoint::new(col, band),
                        coverage,
                    });
                }
                col += bs;
            }
            band += bs;
        }
        tracing::trace!(
            edges = self.edges.len(),
            blocks = blocks.len(),
            "rasterized path"
        );
        blocks
    }

    /// Build the edge list, returning the pixel bounds of all points
    fn collect_edges(&mut self, polygons: &[Vec<Point>]) -> Option<IntRect> {
        self.edges.clear();
        let (mut left, mut top) = (f32::MAX, f32::MAX);
        let (mut right, mut bottom) = (f32::MIN, f32::MIN);
        for polygon in polygons {
            if polygon.len() < 3 || polygon.iter().any(|p| !p.x.is_finite() || !p.y.is_finite()) {
                continue;
            }
            for (i, &p0) in polygon.iter().enumerate() {
                let p1 = polygon[(i + 1) % polygon.len()];
                left = left.min(p0.x);
                top = top.min(p0.y);
                right = right.max(p0.x);
                bottom = bottom.max(p0.y);
                if let Some(edge) = Edge::new(p0, p1) {
                    self.edges.push(edge);
                }
            }
        }
        if self.edges.is_empty() {
            return None;
        }
        Some(IntRect::from_ltrb(
            left.floor() as i32,
            top.floor() as i32,
            right.ceil() as i32,
            bottom.ceil() as i32,
        ))
    }

    /// Compute the spans of every sample row of the band starting at `band`
    fn scan_band(&mut self, band: i32, region: IntRect, fill_rule: FillRule) {
        let aa = self.antialias_level as usize;
        let (min_x, max_x) = (region.x as f32, region.right() as f32);
        for (index, spans) in self.rows.iter_mut().enumerate() {
            spans.clear();
            let y = band + (index / aa) as i32;
            if y < region.y || y >= region.bottom() {
                continue;
            }
            let sample_y = y as f32 + ((index % aa) as f32 + 0.5) / aa as f32;

            self.crossings.clear();
            self.crossings.extend(
                self.edges
                    .iter()
                    .filter(|edge| edge.crosses(sample_y))
                    .map(|edge| (edge.x_at(sample_y), edge.winding)),
            );
            self.crossings.sort_by(|a, b| a.0.total_cmp(&b.0));

            let mut winding = 0;
            let mut start = None;
            for &(x, w) in &self.crossings {
                let was_inside = fill_rule.is_inside(winding);
                winding += w;
                let inside = fill_rule.is_inside(winding);
                if inside && !was_inside {
                    start = Some(x);
                } else if !inside && was_inside {
                    if let Some(a) = start.take() {
                        push_span(spans, a.max(min_x), x.min(max_x));
                    }
                }
            }
        }
    }

    fn block_coverage(&self, col: i32) -> Option<BlockCoverage> {
        let bs = self.block_size;
        let (left, right) = (col as f32, (col + bs) as f32);
        let touched = self
            .rows
            .iter()
            .any(|spans| spans.iter().any(|&(a, b)| a < right && b > left));
        if !touched {
            return None;
        }
        let full = self
            .rows
            .iter()
            .all(|spans| spans.iter().any(|&(a, b)| a <= left && b >= right));
        if full {
            return Some(BlockCoverage::Full);
        }

        let aa = self.antialias_level as usize;
        let mut accum = vec![0.0f32; (bs * bs) as usize];
        for (index, spans) in self.rows.iter().enumerate() {
            let row = &mut accum[(index / aa) * bs as usize..][..bs as usize];
            for &(a, b) in spans {
                if a >= right || b <= left {
                    continue;
                }
                let first = (a.floor() as i32).max(col);
                let last = (b.ceil() as i32).min(col + bs);
                for px in first..last {
                    let overlap = b.min((px + 1) as f32) - a.max(px as f32);
                    if overlap > 0.0 {
                        row[(px - col) as usize] += overlap;
                    }
                }
            }
        }
        let values = accum
            .iter()
            .map(|sum| ((sum / aa as f32).min(1.0) * 255.0).round() as u8)
            .collect();
        Some(BlockCoverage::Partial(values))
    }
}

/// Append a span, joining it with the previous one when they touch
fn push_span(spans: &mut Vec<Span>, a: f32, b: f32) {
    if b <= a {
        return;
    }
    match spans.last_mut() {
        Some(last) if a <= last.1 => last.1 = last.1.max(b),
        _ => spans.push((a, b)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_core::Rect;

    use crate::path::{Flattener, Path};
    use cinder_core::Mat4;

    const CLIP: IntRect = IntRect::new(0, 0, 256, 256);

    fn rasterize(path: &Path, aa: u32) -> Vec<MaskBlock> {
        let polygons = Flattener::default().flatten(path, &Mat4::IDENTITY);
        PathRasterizer::new(16, aa)
            .unwrap()
            .rasterize(&polygons, path.fill_rule(), CLIP)
    }

    fn coverage(blocks: &[MaskBlock], x: i32, y: i32) -> u8 {
        blocks
            .iter()
            .find(|b| IntRect::new(b.origin.x, b.origin.y, 16, 16).contains(x, y))
            .map(|b| b.coverage_at(x - b.origin.x, y - b.origin.y, 16))
            .unwrap_or(0)
    }

    fn pentagram(fill_rule: FillRule) -> Path {
        let points: Vec<Point> = (0..5)
            .map(|k| {
                let angle = (-90.0 + k as f32 * 144.0).to_radians();
                Point::new(60.0 + 50.0 * angle.cos(), 60.0 + 50.0 * angle.sin())
            })
            .collect();
        Path::polygon(&points).with_fill_rule(fill_rule)
    }

    #[test]
    fn test_aligned_square_is_one_full_block() {
        let blocks = rasterize(&Path::rect(Rect::new(16.0, 32.0, 16.0, 16.0)), 2);
        assert_eq!(
            blocks,
            vec![MaskBlock {
                origin: IntPoint::new(16, 32),
                coverage: BlockCoverage::Full,
            }]
        );
    }

    #[test]
    fn test_small_rect_is_partial() {
        let blocks = rasterize(&Path::rect(Rect::new(0.0, 0.0, 10.0, 10.0)), 2);
        assert_eq!(blocks.len(), 1);
        assert!(!blocks[0].is_full());
        assert_eq!(coverage(&blocks, 0, 0), 255);
        assert_eq!(coverage(&blocks, 9, 9), 255);
        assert_eq!(coverage(&blocks, 10, 5), 0);
        assert_eq!(coverage(&blocks, 5, 10), 0);
    }

    #[test]
    fn test_half_pixel_edges_are_antialiased() {
        let blocks = rasterize(&Path::rect(Rect::new(0.0, 0.0, 10.5, 10.5)), 2);
        assert_eq!(coverage(&blocks, 10, 5), 128);
        assert_eq!(coverage(&blocks, 5, 10), 128);
        assert_eq!(coverage(&blocks, 4, 4), 255);
    }

    #[test]
    fn test_pentagram_fill_rules() {
        let non_zero = rasterize(&pentagram(FillRule::NonZero), 4);
        assert_eq!(coverage(&non_zero, 60, 60), 255);
        assert_eq!(coverage(&non_zero, 60, 25), 255);

        let even_odd = rasterize(&pentagram(FillRule::EvenOdd), 4);
        assert_eq!(coverage(&even_odd, 60, 60), 0);
        assert_eq!(coverage(&even_odd, 60, 25), 255);
    }

    #[test]
    fn test_overlap_winding() {
        let mut path = Path::new();
        for origin in [0.0, 16.0] {
            path.move_to(Point::new(origin, origin))
                .line_to(Point::new(origin + 32.0, origin))
                .line_to(Point::new(origin + 32.0, origin + 32.0))
                .line_to(Point::new(origin, origin + 32.0))
                .close();
        }
        let non_zero = rasterize(&path, 2);
        assert_eq!(coverage(&non_zero, 20, 20), 255);
        assert_eq!(coverage(&non_zero, 5, 5), 255);

        let even_odd = rasterize(&path.with_fill_rule(FillRule::EvenOdd), 2);
        assert_eq!(coverage(&even_odd, 20, 20), 0);
        assert_eq!(coverage(&even_odd, 5, 5), 255);
        assert_eq!(coverage(&even_odd, 40, 40), 255);
    }

    #[test]
    fn test_clip_limits_blocks() {
        let path = Path::rect(Rect::new(0.0, 0.0, 64.0, 64.0));
        let polygons = Flattener::default().flatten(&path, &Mat4::IDENTITY);
        let mut rasterizer = PathRasterizer::new(16, 1).unwrap();
        let blocks = rasterizer.rasterize(&polygons, FillRule::NonZero, IntRect::new(8, 8, 16, 16));
        let origins: Vec<IntPoint> = blocks.iter().map(|b| b.origin).collect();
        assert_eq!(
            origins,
            vec![
                IntPoint::new(0, 0),
                IntPoint::new(16, 0),
                IntPoint::new(0, 16),
                IntPoint::new(16, 16),
            ]
        );
        assert!(blocks.iter().all(|b| !b.is_full()));
        assert_eq!(coverage(&blocks, 7, 7), 0);
        assert_eq!(coverage(&blocks, 8, 8), 255);
        assert_eq!(coverage(&blocks, 23, 23), 255);
        assert_eq!(coverage(&blocks, 24, 23), 0);
    }

    #[test]
    fn test_shared_edges_still_fill_completely() {
        let mut path = Path::new();
        path.move_to(Point::new(0.0, 0.0))
            .line_to(Point::new(16.0, 0.0))
            .line_to(Point::new(16.0, 16.0))
            .close()
            .move_to(Point::new(0.0, 0.0))
            .line_to(Point::new(16.0, 16.0))
            .line_to(Point::new(0.0, 16.0))
            .close();
        let blocks = rasterize(&path, 2);
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].is_full());
    }

    #[test]
    fn test_invalid_parameters() {
        assert!(PathRasterizer::new(0, 2).is_err());
        assert!(PathRasterizer::new(16, 0).is_err());
    }
}
