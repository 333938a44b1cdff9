//! Hairlines
//!
//! Strips and loops are expanded to independent segments so every call can
//! share one `Lines` draw.

use cinder_core::{Color, Mat4, Point, RenderConfig, Result};
use cinder_gpu::{GraphicContext, PrimitivesType, StandardProgram};

use super::{to_clip, BatchMatrices, ColorVertex, RenderBatchBuffer, RenderBatcher, VertexBatch};

pub struct RenderBatchLine {
    batch: VertexBatch<ColorVertex>,
    mvp: Mat4,
}

impl RenderBatchLine {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            batch: VertexBatch::new(config.vertex_buffer_size),
            mvp: Mat4::IDENTITY,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.batch.len()
    }

    fn append(
        &mut self,
        gc: &GraphicContext,
        pool: &mut RenderBatchBuffer,
        segments: impl ExactSizeIterator<Item = (Point, Point)>,
        color: Color,
    ) -> Result<()> {
        let count = segments.len() * 2;
        if count == 0 {
            return Ok(());
        }
        self.batch.check_capacity(count)?;
        if self.batch.needs_flush(count) {
            self.flush(gc, pool)?;
        }
        let color = color.to_array();
        for (a, b) in segments {
            for p in [a, b] {
                self.batch.push(ColorVertex {
                    position: to_clip(&self.mvp, p),
                    color,
                });
            }
        }
        Ok(())
    }

    /// Independent segments, one per pair of points
    pub fn draw_lines(
        &mut self,
        gc: &GraphicContext,
        pool: &mut RenderBatchBuffer,
        points: &[Point],
        color: Color,
    ) -> Result<()> {
        let segments = points.chunks_exact(2).map(|pair| (pair[0], pair[1]));
        self.append(gc, pool, segments, color)
    }

    pub fn draw_line_strip(
        &mut self,
        gc: &GraphicContext,
        pool: &mut RenderBatchBuffer,
        points: &[Point],
        color: Color,
    ) -> Result<()> {
        let segments = points.windows(2).map(|pair| (pair[0], pair[1]));
        self.append(gc, pool, segments, color)
    }

    /// A strip closed back to its first point
    pub fn draw_line_loop(
        &mut self,
        gc: &GraphicContext,
        pool: &mut RenderBatchBuffer,
        points: &[Point],
        color: Color,
    ) -> Result<()> {
        if points.len() < 2 {
            return Ok(());
        }
        let n = points.len();
        let segments = (0..n).map(|i| (points[i], points[(i + 1) % n]));
        self.append(gc, pool, segments, color)
    }
}

impl RenderBatcher for RenderBatchLine {
    fn name(&self) -> &str {
        "line"
    }

    fn flush(&mut self, gc: &GraphicContext, pool: &mut RenderBatchBuffer) -> Result<()> {
        if self.batch.is_empty() {
            return Ok(());
        }
        gc.set_program_object(StandardProgram::ColorOnly)?;
        let vertices = self.batch.submit(gc, pool, PrimitivesType::Lines)?;
        gc.reset_program_object()?;
        tracing::trace!(batcher = "line", vertices, "flushed batch");
        Ok(())
    }

    fn matrix_changed(&mut self, matrices: &BatchMatrices) {
        self.mvp = matrices.modelview_projection();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_core::IntSize;
    use cinder_gpu::SoftwareProvider;

    fn setup() -> (GraphicContext, RenderBatchBuffer, RenderBatchLine) {
        let size = IntSize::new(16, 16);
        let gc = GraphicContext::new(Box::new(SoftwareProvider::new(size).unwrap()), size).unwrap();
        let config = RenderConfig::default();
        (gc, RenderBatchBuffer::new(config.clone()), RenderBatchLine::new(&config))
    }

    fn points(n: usize) -> Vec<Point> {
        (0..n).map(|i| Point::new(i as f32, 0.0)).collect()
    }

    #[test]
    fn test_expansion_counts() {
        let (gc, mut pool, mut batch) = setup();
        batch.draw_lines(&gc, &mut pool, &points(5), Color::RED).unwrap();
        assert_eq!(batch.vertex_count(), 4);
        batch.draw_line_strip(&gc, &mut pool, &points(4), Color::RED).unwrap();
        assert_eq!(batch.vertex_count(), 4 + 6);
        batch.draw_line_loop(&gc, &mut pool, &points(4), Color::RED).unwrap();
        assert_eq!(batch.vertex_count(), 4 + 6 + 8);
    }

    #[test]
    fn test_degenerate_calls_are_ignored() {
        let (gc, mut pool, mut batch) = setup();
        batch.draw_lines(&gc, &mut pool, &points(1), Color::RED).unwrap();
        batch.draw_line_strip(&gc, &mut pool, &points(1), Color::RED).unwrap();
        batch.draw_line_loop(&gc, &mut pool, &points(1), Color::RED).unwrap();
        batch.draw_lines(&gc, &mut pool, &[], Color::RED).unwrap();
        assert_eq!(batch.vertex_count(), 0);
    }

    #[test]
    fn test_flush_draws_once() {
        let (gc, mut pool, mut batch) = setup();
        batch.draw_lines(&gc, &mut pool, &points(4), Color::RED).unwrap();
        batch.flush(&gc, &mut pool).unwrap();
        batch.flush(&gc, &mut pool).unwrap();
        let stats = gc.with_provider::<SoftwareProvider, _>(|p| p.stats()).unwrap();
        assert_eq!(stats.draw_calls, 1);
        assert_eq!(stats.vertices, 4);
        assert_eq!(gc.program(), cinder_gpu::ActiveProgram::None);
    }
}
