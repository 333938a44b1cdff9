//! Filled triangles, rectangles and textured images

use bytemuck::{Pod, Zeroable};
use cinder_core::{Color, Mat4, Point, Rect, RenderConfig, Result};
use cinder_gpu::program::sprite;
use cinder_gpu::{GraphicContext, PrimitivesType, StandardProgram, Texture2D, VertexAttribute};
use smallvec::SmallVec;

use super::{
    to_clip, BatchMatrices, BatchVertex, RenderBatchBuffer, RenderBatcher, VertexBatch,
};

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub(crate) struct SpriteVertex {
    position: [f32; 4],
    color: [f32; 4],
    texcoord: [f32; 2],
    /// Texture unit, negative for untextured vertices
    texindex: f32,
}

impl BatchVertex for SpriteVertex {
    fn attributes() -> SmallVec<[(usize, VertexAttribute); 4]> {
        let stride = std::mem::size_of::<SpriteVertex>();
        smallvec::smallvec![
            (sprite::ATTR_POSITION, VertexAttribute::float(4, stride, 0)),
            (sprite::ATTR_COLOR, VertexAttribute::float(4, stride, 16)),
            (sprite::ATTR_TEXCOORD, VertexAttribute::float(2, stride, 32)),
            (sprite::ATTR_TEXINDEX, VertexAttribute::float(1, stride, 40)),
        ]
    }
}

/// Corner colors of a gradient filled rectangle
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RectGradient {
    pub top_left: Color,
    pub top_right: Color,
    pub bottom_left: Color,
    pub bottom_right: Color,
}

impl RectGradient {
    pub fn horizontal(left: Color, right: Color) -> Self {
        Self {
            top_left: left,
            top_right: right,
            bottom_left: left,
            bottom_right: right,
        }
    }

    pub fn vertical(top: Color, bottom: Color) -> Self {
        Self {
            top_left: top,
            top_right: top,
            bottom_left: bottom,
            bottom_right: bottom,
        }
    }
}

pub struct RenderBatchTriangle {
    batch: VertexBatch<SpriteVertex>,
    textures: SmallVec<[Texture2D; sprite::MAX_TEXTURE_UNITS]>,
    max_textures: usize,
    mvp: Mat4,
}

impl RenderBatchTriangle {
    pub fn new(config: &RenderConfig) -> Self {
        Self {
            batch: VertexBatch::new(config.vertex_buffer_size),
            textures: SmallVec::new(),
            max_textures: config.max_batch_textures.clamp(1, sprite::MAX_TEXTURE_UNITS),
            mvp: Mat4::IDENTITY,
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.batch.len()
    }

    /// Textures referenced by the pending batch, in texture unit order
    pub fn textures(&self) -> &[Texture2D] {
        &self.textures
    }

    /// Make room for `count` vertices
    fn reserve(&mut self, gc: &GraphicContext, pool: &mut RenderBatchBuffer, count: usize) -> Result<()> {
        self.batch.check_capacity(count)?;
        if self.batch.needs_flush(count) {
            self.flush(gc, pool)?;
        }
        Ok(())
    }

    /// Texture unit for `texture`, flushing when every unit is taken
    fn texture_index(
        &mut self,
        gc: &GraphicContext,
        pool: &mut RenderBatchBuffer,
        texture: &Texture2D,
    ) -> Result<f32> {
        if let Some(index) = self.textures.iter().position(|t| t == texture) {
            return Ok(index as f32);
        }
        if self.textures.len() == self.max_textures {
            self.flush(gc, pool)?;
        }
        self.textures.push(*texture);
        Ok((self.textures.len() - 1) as f32)
    }

    fn vertex(&self, point: Point, color: Color, texcoord: [f32; 2], texindex: f32) -> SpriteVertex {
        SpriteVertex {
            position: to_clip(&self.mvp, point),
            color: color.to_array(),
            texcoord,
            texindex,
        }
    }

    /// Fill every complete triple of `points`
    pub fn fill_triangles(
        &mut self,
        gc: &GraphicContext,
        pool: &mut RenderBatchBuffer,
        points: &[Point],
        color: Color,
    ) -> Result<()> {
        let count = points.len() / 3 * 3;
        if count == 0 {
            return Ok(());
        }
        self.reserve(gc, pool, count)?;
        for &point in &points[..count] {
            let vertex = self.vertex(point, color, [0.0; 2], -1.0);
            self.batch.push(vertex);
        }
        Ok(())
    }

    pub fn fill_rect(
        &mut self,
        gc: &GraphicContext,
        pool: &mut RenderBatchBuffer,
        rect: Rect,
        color: Color,
    ) -> Result<()> {
        self.fill_rect_gradient(gc, pool, rect, &RectGradient::vertical(color, color))
    }

    pub fn fill_rect_gradient(
        &mut self,
        gc: &GraphicContext,
        pool: &mut RenderBatchBuffer,
        rect: Rect,
        gradient: &RectGradient,
    ) -> Result<()> {
        if rect.width == 0.0 || rect.height == 0.0 {
            return Ok(());
        }
        self.reserve(gc, pool, 6)?;
        let corners = quad_corners(&rect);
        let colors = [
            gradient.top_left,
            gradient.top_right,
            gradient.bottom_right,
            gradient.bottom_left,
        ];
        for i in QUAD_TRIANGLES {
            let vertex = self.vertex(corners[i], colors[i], [0.0; 2], -1.0);
            self.batch.push(vertex);
        }
        Ok(())
    }

    /// Draw `src` (in texels) of `texture` into `dest`, modulated by `color`
    pub fn draw_image(
        &mut self,
        gc: &GraphicContext,
        pool: &mut RenderBatchBuffer,
        texture: &Texture2D,
        src: Rect,
        dest: Rect,
        color: Color,
    ) -> Result<()> {
        if dest.width == 0.0 || dest.height == 0.0 {
            return Ok(());
        }
        self.reserve(gc, pool, 6)?;
        let texindex = self.texture_index(gc, pool, texture)?;
        let (w, h) = (texture.size.width as f32, texture.size.height as f32);
        let (u0, v0) = (src.left() / w, src.top() / h);
        let (u1, v1) = (src.right() / w, src.bottom() / h);
        let texcoords = [[u0, v0], [u1, v0], [u1, v1], [u0, v1]];
        let corners = quad_corners(&dest);
        for i in QUAD_TRIANGLES {
            let vertex = self.vertex(corners[i], color, texcoords[i], texindex);
            self.batch.push(vertex);
        }
        Ok(())
    }
}

/// Corner order top left, top right, bottom right, bottom left
const QUAD_TRIANGLES: [usize; 6] = [0, 1, 2, 0, 2, 3];

fn quad_corners(rect: &Rect) -> [Point; 4] {
    [
        Point::new(rect.left(), rect.top()),
        Point::new(rect.right(), rect.top()),
        Point::new(rect.right(), rect.bottom()),
        Point::new(rect.left(), rect.bottom()),
    ]
}

impl RenderBatcher for RenderBatchTriangle {
    fn name(&self) -> &str {
        "triangle"
    }

    fn flush(&mut self, gc: &GraphicContext, pool: &mut RenderBatchBuffer) -> Result<()> {
        if self.batch.is_empty() {
            self.textures.clear();
            return Ok(());
        }
        gc.set_program_object(StandardProgram::Sprite)?;
        for (unit, texture) in self.textures.iter().enumerate() {
            gc.set_texture(unit, texture)?;
        }
        let vertices = self.batch.submit(gc, pool, PrimitivesType::Triangles)?;
        for unit in 0..self.textures.len() {
            gc.reset_texture(unit)?;
        }
        gc.reset_program_object()?;
        tracing::trace!(
            batcher = "triangle",
            vertices,
            textures = self.textures.len(),
            "flushed batch"
        );
        self.textures.clear();
        Ok(())
    }

    fn matrix_changed(&mut self, matrices: &BatchMatrices) {
        self.mvp = matrices.modelview_projection();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_core::{GraphicsError, IntSize};
    use cinder_gpu::{SoftwareProvider, TextureFilter, TextureFormat};

    fn setup(config: &RenderConfig) -> (GraphicContext, RenderBatchBuffer, RenderBatchTriangle) {
        let size = IntSize::new(16, 16);
        let gc = GraphicContext::new(Box::new(SoftwareProvider::new(size).unwrap()), size).unwrap();
        (gc, RenderBatchBuffer::new(config.clone()), RenderBatchTriangle::new(config))
    }

    fn texture(gc: &GraphicContext) -> Texture2D {
        gc.create_texture(IntSize::new(2, 2), TextureFormat::Rgba8, TextureFilter::Nearest)
            .unwrap()
    }

    #[test]
    fn test_vertex_layout() {
        assert_eq!(std::mem::size_of::<SpriteVertex>(), 44);
    }

    #[test]
    fn test_partial_triples_are_dropped() {
        let config = RenderConfig::default();
        let (gc, mut pool, mut batch) = setup(&config);
        batch
            .fill_triangles(&gc, &mut pool, &[Point::ZERO, Point::new(1.0, 0.0)], Color::RED)
            .unwrap();
        assert_eq!(batch.vertex_count(), 0);

        let points = [Point::ZERO, Point::new(1.0, 0.0), Point::new(0.0, 1.0), Point::ZERO];
        batch.fill_triangles(&gc, &mut pool, &points, Color::RED).unwrap();
        assert_eq!(batch.vertex_count(), 3);
    }

    #[test]
    fn test_single_call_over_capacity_fails() {
        let config = RenderConfig {
            vertex_buffer_size: 44 * 6,
            ..RenderConfig::default()
        };
        let (gc, mut pool, mut batch) = setup(&config);
        let points = vec![Point::ZERO; 9];
        let err = batch
            .fill_triangles(&gc, &mut pool, &points, Color::RED)
            .unwrap_err();
        assert_eq!(
            err,
            GraphicsError::CapacityExceeded {
                requested: 9,
                capacity: 6
            }
        );
    }

    #[test]
    fn test_textures_share_a_batch_until_units_run_out() {
        let config = RenderConfig {
            max_batch_textures: 2,
            ..RenderConfig::default()
        };
        let (gc, mut pool, mut batch) = setup(&config);
        let (a, b, c) = (texture(&gc), texture(&gc), texture(&gc));
        let src = Rect::new(0.0, 0.0, 2.0, 2.0);
        let dest = Rect::new(0.0, 0.0, 4.0, 4.0);

        for t in [&a, &b, &a] {
            batch.draw_image(&gc, &mut pool, t, src, dest, Color::WHITE).unwrap();
        }
        assert_eq!(batch.textures(), &[a, b]);
        assert_eq!(batch.vertex_count(), 18);

        batch.draw_image(&gc, &mut pool, &c, src, dest, Color::WHITE).unwrap();
        assert_eq!(batch.textures(), &[c]);
        assert_eq!(batch.vertex_count(), 6);
    }
}
