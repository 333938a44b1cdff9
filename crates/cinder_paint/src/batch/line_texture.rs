//! Textured hairlines
//!
//! The `Single` program binds one texture, so a batch holds segments of one
//! texture only.

use bytemuck::{Pod, Zeroable};
use cinder_core::{Color, GraphicsError, Mat4, Point, RenderConfig, Result};
use cinder_gpu::program::single;
use cinder_gpu::{GraphicContext, PrimitivesType, StandardProgram, Texture2D, VertexAttribute};
use smallvec::SmallVec;

use super::{to_clip, BatchMatrices, BatchVertex, RenderBatchBuffer, RenderBatcher, VertexBatch};

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub(crate) struct TexturedVertex {
    position: [f32; 4],
    color: [f32; 4],
    texcoord: [f32; 2],
}

impl BatchVertex for TexturedVertex {
    fn attributes() -> SmallVec<[(usize, VertexAttribute); 4]> {
        let stride = std::mem::size_of::<TexturedVertex>();
        smallvec::smallvec![
            (single::ATTR_POSITION, VertexAttribute::float(4, stride, 0)),
            (single::ATTR_COLOR, VertexAttribute::float(4, stride, 16)),
            (single::ATTR_TEXCOORD, VertexAttribute::float(2, stride, 32)),
        ]
    }
}

pub struct RenderBatchLineTexture {
    batch: VertexBatch<TexturedVertex>,
    texture: Option<Texture2D>,
    mvp: Mat4,
}

impl RenderBatchLineTexture {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            batch: VertexBatch::new(config.vertex_buffer_size),
            texture: None,
            mvp: Mat4::IDENTITY,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.batch.len()
    }

    pub fn texture(&self) -> Option<Texture2D> {
        self.texture
    }

    /// Independent segments with normalized texture coordinates per point
    pub fn draw_lines(
        &mut self,
        gc: &GraphicContext,
        pool: &mut RenderBatchBuffer,
        points: &[Point],
        texcoords: &[Point],
        texture: &Texture2D,
        color: Color,
    ) -> Result<()> {
        if points.len() != texcoords.len() {
            return Err(GraphicsError::invalid_argument(format!(
                "{} line points but {} texture coordinates",
                points.len(),
                texcoords.len()
            )));
        }
        let count = points.len() / 2 * 2;
        if count == 0 {
            return Ok(());
        }
        self.batch.check_capacity(count)?;
        if self.texture.as_ref().is_some_and(|current| current != texture)
            || self.batch.needs_flush(count)
        {
            self.flush(gc, pool)?;
        }
        self.texture = Some(*texture);

        let color = color.to_array();
        for (point, uv) in points.iter().zip(texcoords).take(count) {
            self.batch.push(TexturedVertex {
                position: to_clip(&self.mvp, *point),
                color,
                texcoord: [uv.x, uv.y],
            });
        }
        Ok(())
    }
}

impl RenderBatcher for RenderBatchLineTexture {
    fn name(&self) -> &str {
        "line texture"
    }

    fn flush(&mut self, gc: &GraphicContext, pool: &mut RenderBatchBuffer) -> Result<()> {
        let Some(texture) = self.texture.take() else {
            return Ok(());
        };
        if self.batch.is_empty() {
            return Ok(());
        }
        gc.set_program_object(StandardProgram::Single)?;
        gc.set_texture(single::TEXTURE_UNIT, &texture)?;
        let vertices = self.batch.submit(gc, pool, PrimitivesType::Lines)?;
        gc.reset_texture(single::TEXTURE_UNIT)?;
        gc.reset_program_object()?;
        tracing::trace!(batcher = "line texture", vertices, "flushed batch");
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
    use cinder_gpu::{SoftwareProvider, TextureFilter, TextureFormat};

    #[test]
    fn test_mismatched_texcoords_are_rejected() {
        let size = IntSize::new(8, 8);
        let gc = GraphicContext::new(Box::new(SoftwareProvider::new(size).unwrap()), size).unwrap();
        let config = RenderConfig::default();
        let mut pool = RenderBatchBuffer::new(config.clone());
        let mut batch = RenderBatchLineTexture::new(&config);
        let texture = gc
            .create_texture(IntSize::new(1, 1), TextureFormat::Rgba8, TextureFilter::Nearest)
            .unwrap();

        let err = batch
            .draw_lines(&gc, &mut pool, &[Point::ZERO; 2], &[Point::ZERO], &texture, Color::WHITE)
            .unwrap_err();
        assert!(matches!(err, GraphicsError::InvalidArgument(_)));
        assert_eq!(batch.texture(), None);
    }
}
