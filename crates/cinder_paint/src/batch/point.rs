//! Single pixel points

use cinder_core::{Color, Mat4, Point, RenderConfig, Result};
use cinder_gpu::{GraphicContext, PrimitivesType, StandardProgram};

use super::{to_clip, BatchMatrices, ColorVertex, RenderBatchBuffer, RenderBatcher, VertexBatch};

pub struct RenderBatchPoint {
    batch: VertexBatch<ColorVertex>,
    mvp: Mat4,
}

impl RenderBatchPoint {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            batch: VertexBatch::new(config.vertex_buffer_size),
            mvp: Mat4::IDENTITY,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.batch.len()
    }

    pub fn draw_points(
        &mut self,
        gc: &GraphicContext,
        pool: &mut RenderBatchBuffer,
        points: &[Point],
        color: Color,
    ) -> Result<()> {
        if points.is_empty() {
            return Ok(());
        }
        self.batch.check_capacity(points.len())?;
        if self.batch.needs_flush(points.len()) {
            self.flush(gc, pool)?;
        }
        let color = color.to_array();
        for &point in points {
            self.batch.push(ColorVertex {
                position: to_clip(&self.mvp, point),
                color,
            });
        }
        Ok(())
    }
}

impl RenderBatcher for RenderBatchPoint {
    fn name(&self) -> &str {
        "point"
    }

    fn flush(&mut self, gc: &GraphicContext, pool: &mut RenderBatchBuffer) -> Result<()> {
        if self.batch.is_empty() {
            return Ok(());
        }
        gc.set_program_object(StandardProgram::ColorOnly)?;
        let vertices = self.batch.submit(gc, pool, PrimitivesType::Points)?;
        gc.reset_program_object()?;
        tracing::trace!(batcher = "point", vertices, "flushed batch");
        Ok(())
    }

    fn matrix_changed(&mut self, matrices: &BatchMatrices) {
        self.mvp = matrices.modelview_projection();
    }
}
