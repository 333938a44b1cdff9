//! Antialiased path fills
//!
//! A fill is mapped through modelview, projection and viewport into device
//! pixels, then flattened and rasterized there into coverage blocks.
//! Partial blocks are copied into cells of an R8 mask atlas; cell 0 is kept
//! fully covered and shared by every full block. The brush is written once
//! into a float RGBA instance atlas, laid out as in
//! [`cinder_gpu::program::path_instance`]. Each block becomes one quad that
//! names its mask cell and its instance.
//!
//! Both atlases are staged in pooled transfer buffers and uploaded when the
//! batch is flushed. A batch is flushed early when it runs out of vertices,
//! mask cells or instance texels, or when an image brush changes texture.

use bytemuck::{Pod, Zeroable};
use cinder_core::{GraphicsError, IntPoint, IntRect, Mat4, Point, Rect, RenderConfig, Result};
use cinder_gpu::program::{path as path_program, path_instance};
use cinder_gpu::{
    GraphicContext, PixelBuffer, PrimitivesType, StandardProgram, Texture2D, TextureImageYAxis,
    VertexAttribute,
};
use smallvec::SmallVec;

use super::{BatchMatrices, BatchVertex, RenderBatchBuffer, RenderBatcher, VertexBatch};
use crate::path::{BlockCoverage, Brush, Flattener, MaskBlock, Paint, Path, PathRasterizer};

#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub(crate) struct PathVertex {
    position: [f32; 4],
    /// Mask atlas texel coordinates
    mask: [f32; 2],
    /// Device pixel coordinates, input of the inverse brush transform
    device: [f32; 2],
    /// Linear texel offset of the brush instance
    instance: f32,
}

impl BatchVertex for PathVertex {
    fn attributes() -> SmallVec<[(usize, VertexAttribute); 4]> {
        let stride = std::mem::size_of::<PathVertex>();
        smallvec::smallvec![
            (path_program::ATTR_POSITION, VertexAttribute::float(4, stride, 0)),
            (path_program::ATTR_MASK_POSITION, VertexAttribute::float(2, stride, 16)),
            (path_program::ATTR_DEVICE_POSITION, VertexAttribute::float(2, stride, 24)),
            (path_program::ATTR_INSTANCE_OFFSET, VertexAttribute::float(1, stride, 32)),
        ]
    }
}

/// Instance written for the last fill, reused while brush and transform match
struct CachedInstance {
    brush: Brush,
    to_device: Mat4,
    offset: usize,
}

/// Clip space to device pixels of `viewport`, rows in the backend's order
fn viewport_transform(viewport: &Rect, y_axis: TextureImageYAxis) -> Mat4 {
    let (half_w, half_h) = (viewport.width * 0.5, viewport.height * 0.5);
    let scale_y = match y_axis {
        TextureImageYAxis::TopDown => -half_h,
        TextureImageYAxis::BottomUp => half_h,
    };
    Mat4::translation(viewport.x + half_w, viewport.y + half_h, 0.0)
        .mul(&Mat4::scale(half_w, scale_y, 1.0))
}

pub struct RenderBatchPath {
    batch: VertexBatch<PathVertex>,
    flattener: Flattener,
    rasterizer: PathRasterizer,
    block_size: i32,
    cells_per_row: i32,
    cell_count: usize,
    /// Next free mask cell; cell 0 is the full coverage cell
    next_cell: usize,
    mask_slot: Option<usize>,
    instance_size: (usize, usize),
    instance_slot: Option<usize>,
    /// Next free texel in the instance atlas
    instance_offset: usize,
    last_instance: Option<CachedInstance>,
    image: Option<Texture2D>,
    modelview: Mat4,
    projection: Mat4,
}

impl RenderBatchPath {
    pub fn new(config: &RenderConfig) -> Result<Self> {
        let rasterizer = PathRasterizer::from_config(config)?;
        let block_size = config.mask_block_size;
        let cells_per_row = config.mask_texture_size / block_size;
        Ok(Self {
            batch: VertexBatch::new(config.vertex_buffer_size),
            flattener: Flattener::from_config(config),
            rasterizer,
            block_size,
            cells_per_row,
            cell_count: (cells_per_row * cells_per_row) as usize,
            next_cell: 1,
            mask_slot: None,
            instance_size: (
                config.rgba32f_texture_width as usize,
                config.rgba32f_texture_height as usize,
            ),
            instance_slot: None,
            instance_offset: 0,
            last_instance: None,
            image: None,
            modelview: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        })
    }

    pub fn vertex_count(&self) -> usize {
        self.batch.len()
    }

    /// Mask cells taken by partial blocks of the pending batch
    pub fn partial_cells(&self) -> usize {
        self.next_cell - 1
    }

    /// Instance texels written for the pending batch
    pub fn instance_texels(&self) -> usize {
        self.instance_offset
    }

    /// Fill `path` with `brush`, limited to `clip` in device pixels
    ///
    /// Device pixels are those of the first viewport of `gc`, with rows in
    /// the backend's order. Empty paths, empty viewports and brushes whose
    /// transform cannot be inverted draw nothing.
    pub fn fill(
        &mut self,
        gc: &GraphicContext,
        pool: &mut RenderBatchBuffer,
        path: &Path,
        brush: &Brush,
        clip: IntRect,
    ) -> Result<()> {
        if path.is_empty() {
            return Ok(());
        }
        self.batch.check_capacity(6)?;
        let viewport = gc.viewports().first().copied().unwrap_or_default();
        let viewport_map = viewport_transform(&viewport, gc.texture_image_y_axis());
        let Some(to_clip) = viewport_map.inverse_affine_2d() else {
            tracing::debug!(?viewport, "viewport is empty, fill skipped");
            return Ok(());
        };
        let to_device = viewport_map.mul(&self.projection).mul(&self.modelview);
        let Some(inverse) = to_device.mul(&brush.transform).inverse_affine_2d() else {
            tracing::debug!("brush transform is singular, fill skipped");
            return Ok(());
        };

        let polygons = self.flattener.flatten(path, &to_device);
        let blocks = self.rasterizer.rasterize(&polygons, path.fill_rule(), clip);
        if blocks.is_empty() {
            return Ok(());
        }

        let mut instance = self.instance(gc, pool, brush, &to_device, &inverse)?;
        for block in &blocks {
            let cell_full = !block.is_full() && self.next_cell >= self.cell_count;
            if self.batch.needs_flush(6) || cell_full {
                self.flush(gc, pool)?;
                instance = self.instance(gc, pool, brush, &to_device, &inverse)?;
            }
            let cell = self.place(pool, block)?;
            self.push_quad(&to_clip, block.origin, cell, instance);
        }
        Ok(())
    }

    /// Offset of the brush instance, writing it when not already cached
    fn instance(
        &mut self,
        gc: &GraphicContext,
        pool: &mut RenderBatchBuffer,
        brush: &Brush,
        to_device: &Mat4,
        inverse: &Mat4,
    ) -> Result<usize> {
        if let Some(cached) = &self.last_instance {
            if cached.brush == *brush && cached.to_device == *to_device {
                return Ok(cached.offset);
            }
        }

        let image = brush.image_texture();
        if image.is_some() && self.image.is_some() && image != self.image {
            self.flush(gc, pool)?;
        }

        let texels = instance_texels(brush);
        let (width, height) = self.instance_size;
        let capacity = width * height;
        if texels > capacity {
            return Err(GraphicsError::CapacityExceeded {
                requested: texels,
                capacity,
            });
        }
        if self.instance_offset + texels > capacity {
            tracing::debug!(texels = capacity, "path instance atlas full, flushing");
            self.flush(gc, pool)?;
        }

        let offset = self.instance_offset;
        let transfer = match self.instance_slot {
            Some(slot) => pool
                .transfer_rgba32f(slot)
                .ok_or(GraphicsError::NullObject("path instance transfer buffer"))?,
            None => {
                let (slot, transfer) = pool.get_transfer_rgba32f()?;
                self.instance_slot = Some(slot);
                transfer
            }
        };
        write_instance(transfer, offset, brush, inverse);

        if image.is_some() {
            self.image = image;
        }
        self.instance_offset += texels;
        self.last_instance = Some(CachedInstance {
            brush: brush.clone(),
            to_device: *to_device,
            offset,
        });
        Ok(offset)
    }

    /// Mask cell for `block`, copying partial coverage into the atlas
    fn place(&mut self, pool: &mut RenderBatchBuffer, block: &MaskBlock) -> Result<usize> {
        let bs = self.block_size;
        let mask = match self.mask_slot {
            Some(slot) => pool
                .transfer_r8(slot)
                .ok_or(GraphicsError::NullObject("path mask transfer buffer"))?,
            None => {
                let (slot, mask) = pool.get_transfer_r8()?;
                self.mask_slot = Some(slot);
                let pitch = mask.pitch();
                for row in mask.data_mut().chunks_exact_mut(pitch).take(bs as usize) {
                    row[..bs as usize].fill(255);
                }
                mask
            }
        };
        let BlockCoverage::Partial(values) = &block.coverage else {
            return Ok(0);
        };
        let cell = self.next_cell;
        self.next_cell += 1;
        let origin = self.cell_origin(cell);
        let pitch = mask.pitch();
        let data = mask.data_mut();
        for (row, src) in values.chunks_exact(bs as usize).enumerate() {
            let start = (origin.y as usize + row) * pitch + origin.x as usize;
            data[start..start + bs as usize].copy_from_slice(src);
        }
        Ok(cell)
    }

    fn cell_origin(&self, cell: usize) -> IntPoint {
        let cell = cell as i32;
        IntPoint::new(
            (cell % self.cells_per_row) * self.block_size,
            (cell / self.cells_per_row) * self.block_size,
        )
    }

    fn push_quad(&mut self, to_clip: &Mat4, origin: IntPoint, cell: usize, instance: usize) {
        let bs = self.block_size as f32;
        let cell = self.cell_origin(cell);
        let (x, y) = (origin.x as f32, origin.y as f32);
        let (mx, my) = (cell.x as f32, cell.y as f32);
        let corners = [(0.0, 0.0), (bs, 0.0), (bs, bs), (0.0, 0.0), (bs, bs), (0.0, bs)];
        for (dx, dy) in corners {
            let device = Point::new(x + dx, y + dy);
            self.batch.push(PathVertex {
                position: to_clip.transform_vec4([device.x, device.y, 0.0, 1.0]),
                mask: [mx + dx, my + dy],
                device: [device.x, device.y],
                instance: instance as f32,
            });
        }
    }

    /// Rows of `cells_per_row` cells used by the pending batch
    fn mask_rows_used(&self) -> i32 {
        let last = (self.next_cell - 1) as i32;
        (last / self.cells_per_row + 1) * self.block_size
    }

    fn reset(&mut self) {
        self.next_cell = 1;
        self.mask_slot = None;
        self.instance_slot = None;
        self.instance_offset = 0;
        self.last_instance = None;
        self.image = None;
    }

    fn upload(
        gc: &GraphicContext,
        texture: &Texture2D,
        pixels: Option<&mut PixelBuffer>,
        rows: i32,
    ) -> Result<()> {
        let Some(pixels) = pixels else {
            return Ok(());
        };
        if rows <= 0 {
            return Ok(());
        }
        let rect = IntRect::new(0, 0, pixels.width(), rows.min(pixels.height()));
        gc.upload_texture(texture, IntPoint::new(0, 0), pixels, rect)
    }
}

/// Texels the instance of `brush` occupies
fn instance_texels(brush: &Brush) -> usize {
    path_instance::texels(brush.stops().len().min(path_instance::MAX_STOPS))
}

fn write_instance(transfer: &mut PixelBuffer, offset: usize, brush: &Brush, inverse: &Mat4) {
    let width = transfer.width() as usize;
    let mut put = |index: usize, value: [f32; 4]| {
        let texel = offset + index;
        transfer.set_pixel((texel % width) as i32, (texel / width) as i32, value);
    };

    let stops = brush.stops();
    if stops.len() > path_instance::MAX_STOPS {
        tracing::warn!(
            stops = stops.len(),
            max = path_instance::MAX_STOPS,
            "gradient stops truncated"
        );
    }
    let stops = &stops[..stops.len().min(path_instance::MAX_STOPS)];

    let (kind, params) = match &brush.paint {
        Paint::Solid(color) => (path_instance::TYPE_SOLID, color.to_array()),
        Paint::LinearGradient { start, end, .. } => {
            (path_instance::TYPE_LINEAR, [start.x, start.y, end.x, end.y])
        }
        Paint::RadialGradient {
            center,
            radius_x,
            radius_y,
            ..
        } => (
            path_instance::TYPE_RADIAL,
            [center.x, center.y, *radius_x, *radius_y],
        ),
        Paint::Image(texture) => (
            path_instance::TYPE_IMAGE,
            [
                1.0 / texture.size.width.max(1) as f32,
                1.0 / texture.size.height.max(1) as f32,
                0.0,
                0.0,
            ],
        ),
    };
    let [a, b, c, d, tx, ty] = inverse.affine_2d();
    put(0, [kind, stops.len() as f32, 0.0, 0.0]);
    put(1, [a, b, c, d]);
    put(2, [tx, ty, 0.0, 0.0]);
    put(3, params);
    for (i, stop) in stops.iter().enumerate() {
        let texel = path_instance::HEADER_TEXELS + i * path_instance::TEXELS_PER_STOP;
        put(texel, stop.color.to_array());
        put(texel + 1, [stop.position, 0.0, 0.0, 0.0]);
    }
}

impl RenderBatcher for RenderBatchPath {
    fn name(&self) -> &str {
        "path"
    }

    fn flush(&mut self, gc: &GraphicContext, pool: &mut RenderBatchBuffer) -> Result<()> {
        if self.batch.is_empty() {
            self.reset();
            return Ok(());
        }
        let mask_texture = pool.get_texture_r8(gc)?;
        let instance_texture = pool.get_texture_rgba32f(gc)?;
        let mask_rows = self.mask_rows_used();
        let instance_rows = self.instance_offset.div_ceil(self.instance_size.0) as i32;
        if let Some(slot) = self.mask_slot {
            Self::upload(gc, &mask_texture, pool.transfer_r8(slot), mask_rows)?;
        }
        if let Some(slot) = self.instance_slot {
            Self::upload(gc, &instance_texture, pool.transfer_rgba32f(slot), instance_rows)?;
        }

        gc.set_program_object(StandardProgram::Path)?;
        gc.set_texture(path_program::MASK_UNIT, &mask_texture)?;
        gc.set_texture(path_program::INSTANCE_UNIT, &instance_texture)?;
        if let Some(image) = &self.image {
            gc.set_texture(path_program::IMAGE_UNIT, image)?;
        }
        let vertices = self.batch.submit(gc, pool, PrimitivesType::Triangles)?;
        gc.reset_texture(path_program::MASK_UNIT)?;
        gc.reset_texture(path_program::INSTANCE_UNIT)?;
        if self.image.is_some() {
            gc.reset_texture(path_program::IMAGE_UNIT)?;
        }
        gc.reset_program_object()?;
        tracing::trace!(
            batcher = "path",
            vertices,
            mask_cells = self.next_cell,
            instance_texels = self.instance_offset,
            "flushed batch"
        );
        self.reset();
        Ok(())
    }

    fn matrix_changed(&mut self, matrices: &BatchMatrices) {
        self.modelview = matrices.modelview;
        self.projection = matrices.projection;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_core::{ClipZRange, Color, Handedness, IntSize};
    use cinder_gpu::SoftwareProvider;

    use crate::path::GradientStop;

    const CLIP: IntRect = IntRect::new(0, 0, 64, 64);

    /// Top-down pixel projection over a `width` by `height` canvas
    fn pixels(width: f32, height: f32) -> BatchMatrices {
        BatchMatrices {
            modelview: Mat4::IDENTITY,
            projection: Mat4::ortho_2d(
                0.0,
                width,
                height,
                0.0,
                Handedness::Right,
                ClipZRange::NegativePositiveW,
            ),
        }
    }

    fn setup(config: &RenderConfig) -> (GraphicContext, RenderBatchBuffer, RenderBatchPath) {
        let size = IntSize::new(64, 64);
        let gc = GraphicContext::new(Box::new(SoftwareProvider::new(size).unwrap()), size).unwrap();
        gc.set_viewport(None, Rect::new(0.0, 0.0, 64.0, 64.0)).unwrap();
        let mut batch = RenderBatchPath::new(config).unwrap();
        batch.matrix_changed(&pixels(64.0, 64.0));
        (gc, RenderBatchBuffer::new(config.clone()), batch)
    }

    fn small_atlas() -> RenderConfig {
        RenderConfig {
            mask_texture_size: 32,
            mask_block_size: 16,
            ..RenderConfig::default()
        }
    }

    fn draw_calls(gc: &GraphicContext) -> usize {
        gc.with_provider::<SoftwareProvider, _>(|p| p.stats().draw_calls)
            .unwrap()
    }

    #[test]
    fn test_vertex_layout() {
        assert_eq!(std::mem::size_of::<PathVertex>(), 36);
    }

    #[test]
    fn test_full_blocks_share_cell_zero() {
        let config = RenderConfig::default();
        let (gc, mut pool, mut batch) = setup(&config);
        let path = Path::rect(Rect::new(0.0, 0.0, 32.0, 32.0));
        batch.fill(&gc, &mut pool, &path, &Color::RED.into(), CLIP).unwrap();
        assert_eq!(batch.vertex_count(), 4 * 6);
        assert_eq!(batch.partial_cells(), 0);
        assert_eq!(batch.instance_texels(), 4);
    }

    #[test]
    fn test_same_brush_reuses_instance() {
        let config = RenderConfig::default();
        let (gc, mut pool, mut batch) = setup(&config);
        let brush = Brush::solid(Color::BLUE);
        let a = Path::rect(Rect::new(0.0, 0.0, 8.0, 8.0));
        let b = Path::rect(Rect::new(20.0, 20.0, 8.0, 8.0));
        batch.fill(&gc, &mut pool, &a, &brush, CLIP).unwrap();
        batch.fill(&gc, &mut pool, &b, &brush, CLIP).unwrap();
        assert_eq!(batch.instance_texels(), 4);
        assert_eq!(batch.partial_cells(), 2);

        let gradient = Brush::linear_gradient(
            Point::ZERO,
            Point::new(10.0, 0.0),
            vec![
                GradientStop::new(0.0, Color::RED),
                GradientStop::new(1.0, Color::BLUE),
            ],
        );
        batch.fill(&gc, &mut pool, &a, &gradient, CLIP).unwrap();
        assert_eq!(batch.instance_texels(), 4 + 8);
    }

    #[test]
    fn test_mask_atlas_overflow_flushes() {
        // a 32x32 atlas holds cell 0 and three partial cells
        let (gc, mut pool, mut batch) = setup(&small_atlas());
        let brush = Brush::solid(Color::GREEN);
        for i in 0..4 {
            let path = Path::rect(Rect::new(i as f32 * 16.0, 0.0, 8.0, 8.0));
            batch.fill(&gc, &mut pool, &path, &brush, CLIP).unwrap();
        }
        assert_eq!(draw_calls(&gc), 1);
        assert_eq!(batch.partial_cells(), 1);
        assert_eq!(batch.vertex_count(), 6);
        assert_eq!(batch.instance_texels(), 4);
    }

    #[test]
    fn test_empty_and_clipped_fills_draw_nothing() {
        let config = RenderConfig::default();
        let (gc, mut pool, mut batch) = setup(&config);
        let brush = Brush::solid(Color::WHITE);
        batch.fill(&gc, &mut pool, &Path::new(), &brush, CLIP).unwrap();
        let outside = Path::rect(Rect::new(100.0, 100.0, 10.0, 10.0));
        batch.fill(&gc, &mut pool, &outside, &brush, CLIP).unwrap();
        assert_eq!(batch.vertex_count(), 0);
        assert_eq!(batch.instance_texels(), 0);

        batch.flush(&gc, &mut pool).unwrap();
        assert_eq!(draw_calls(&gc), 0);
    }

    #[test]
    fn test_singular_brush_transform_is_skipped() {
        let config = RenderConfig::default();
        let (gc, mut pool, mut batch) = setup(&config);
        let brush = Brush::solid(Color::WHITE).with_transform(Mat4::scale(0.0, 1.0, 1.0));
        let path = Path::rect(Rect::new(0.0, 0.0, 16.0, 16.0));
        batch.fill(&gc, &mut pool, &path, &brush, CLIP).unwrap();
        assert_eq!(batch.vertex_count(), 0);
    }

    #[test]
    fn test_blocks_are_sized_in_device_pixels() {
        let config = RenderConfig::default();
        let (gc, mut pool, mut batch) = setup(&config);
        // 32 canvas units over 64 device pixels
        batch.matrix_changed(&pixels(32.0, 32.0));
        let path = Path::rect(Rect::new(0.0, 0.0, 16.0, 16.0));
        batch.fill(&gc, &mut pool, &path, &Color::RED.into(), CLIP).unwrap();
        assert_eq!(batch.vertex_count(), 4 * 6);
        assert_eq!(batch.partial_cells(), 0);
    }

    #[test]
    fn test_empty_viewport_skips_fill() {
        let config = RenderConfig::default();
        let (gc, mut pool, mut batch) = setup(&config);
        gc.set_viewport(None, Rect::default()).unwrap();
        let path = Path::rect(Rect::new(0.0, 0.0, 16.0, 16.0));
        batch.fill(&gc, &mut pool, &path, &Color::RED.into(), CLIP).unwrap();
        assert_eq!(batch.vertex_count(), 0);
    }
}
