//! 2D drawing surface over a graphic context
//!
//! A canvas adds a transform stack, a clip rectangle stack and a mapping
//! from canvas pixels to clip space on top of a [`GraphicContext`]. Drawing
//! calls go to the batchers of a [`CanvasBatcher`] that sibling canvases
//! share.

use std::cell::RefCell;
use std::rc::Rc;

use cinder_core::{
    Color, GraphicsError, Handedness, IntRect, IntSize, Mat4, Point, Rect, RenderConfig, Result,
};
use cinder_gpu::{FrameBuffer, GraphicContext, PixelBuffer, Texture2D, TextureFormat, TextureImageYAxis};

use crate::batch::{BatchMatrices, CanvasBatcher, RectGradient, RenderBatcher};
use crate::path::{Brush, Flattener, Path};

/// How canvas pixels map to the surface
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum MapMode {
    /// Origin at the top left, y grows downwards
    #[default]
    UpperLeft,
    /// Origin at the bottom left, y grows upwards
    LowerLeft,
    /// The projection passed to [`Canvas::set_projection`]
    UserProjection,
}

pub struct Canvas {
    gc: GraphicContext,
    batcher: Rc<RefCell<CanvasBatcher>>,
    flattener: Flattener,
    transform: Mat4,
    transform_stack: Vec<Mat4>,
    map_mode: MapMode,
    user_projection: Mat4,
    projection: Mat4,
    cliprect: Option<Rect>,
    clip_stack: Vec<Option<Rect>>,
    /// Size the viewport and projection were last computed for
    tracked_size: IntSize,
}

impl Canvas {
    pub fn new(gc: GraphicContext, config: RenderConfig) -> Result<Self> {
        let flattener = Flattener::from_config(&config);
        let batcher = Rc::new(RefCell::new(CanvasBatcher::new(config)?));
        Self::with_batcher(gc, batcher, flattener)
    }

    fn with_batcher(
        gc: GraphicContext,
        batcher: Rc<RefCell<CanvasBatcher>>,
        flattener: Flattener,
    ) -> Result<Self> {
        let mut canvas = Self {
            gc,
            batcher,
            flattener,
            transform: Mat4::IDENTITY,
            transform_stack: Vec::new(),
            map_mode: MapMode::UpperLeft,
            user_projection: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
            cliprect: None,
            clip_stack: Vec::new(),
            tracked_size: IntSize::default(),
        };
        canvas.sync_size()?;
        Ok(canvas)
    }

    /// A sibling canvas on a fresh context of the same screen, sharing the
    /// batchers of this one
    pub fn create(&self) -> Result<Canvas> {
        Self::with_batcher(self.gc.create(), self.batcher.clone(), self.flattener)
    }

    /// A sibling canvas rendering into `frame_buffer`
    pub fn with_frame_buffer(&self, frame_buffer: &FrameBuffer) -> Result<Canvas> {
        let gc = self.gc.create();
        gc.set_frame_buffer(frame_buffer)?;
        Self::with_batcher(gc, self.batcher.clone(), self.flattener)
    }

    pub fn gc(&self) -> &GraphicContext {
        &self.gc
    }

    pub fn size(&self) -> IntSize {
        self.gc.size()
    }

    pub fn width(&self) -> i32 {
        self.size().width
    }

    pub fn height(&self) -> i32 {
        self.size().height
    }

    pub fn batcher(&self) -> &Rc<RefCell<CanvasBatcher>> {
        &self.batcher
    }

    /// Submit the pending batch
    pub fn flush(&self) -> Result<()> {
        self.batcher.borrow_mut().flush()
    }

    pub fn clear(&mut self, color: Color) -> Result<()> {
        self.flush()?;
        self.sync_size()?;
        self.gc.clear(color)
    }

    /// Read back pixels after flushing
    pub fn get_pixeldata(&self, rect: IntRect, format: TextureFormat) -> Result<PixelBuffer> {
        self.flush()?;
        self.gc.get_pixeldata(rect, format)
    }

    // ─── Coordinate spaces ──────────────────────────────────────────────

    /// Rendering into a frame buffer on a bottom-up backend stores rows
    /// mirrored, so the projection flips y to keep texel row 0 on top
    fn is_flipped(&self) -> bool {
        self.gc.has_frame_buffer() && self.gc.texture_image_y_axis() == TextureImageYAxis::BottomUp
    }

    /// Follow size changes of the context with the viewport and projection
    fn sync_size(&mut self) -> Result<()> {
        let size = self.gc.size();
        if size == self.tracked_size {
            return Ok(());
        }
        tracing::debug!(width = size.width, height = size.height, "canvas size changed");
        self.gc
            .set_viewport(None, Rect::new(0.0, 0.0, size.width as f32, size.height as f32))?;
        self.tracked_size = size;
        self.update_projection();
        Ok(())
    }

    fn update_projection(&mut self) {
        let (w, h) = (self.tracked_size.width as f32, self.tracked_size.height as f32);
        let clip_z = self.gc.clip_z_range();
        let base = match self.map_mode {
            MapMode::UpperLeft => Mat4::ortho_2d(0.0, w, h, 0.0, Handedness::Right, clip_z),
            MapMode::LowerLeft => Mat4::ortho_2d(0.0, w, 0.0, h, Handedness::Right, clip_z),
            MapMode::UserProjection => self.user_projection,
        };
        self.projection = if self.is_flipped() {
            Mat4::scale(1.0, -1.0, 1.0).mul(&base)
        } else {
            base
        };
    }

    /// Row convention of canvas pixel coordinates on this surface
    fn scissor_y_axis(&self) -> TextureImageYAxis {
        let axis = match self.map_mode {
            MapMode::LowerLeft => TextureImageYAxis::BottomUp,
            MapMode::UpperLeft | MapMode::UserProjection => TextureImageYAxis::TopDown,
        };
        if self.is_flipped() {
            axis.flipped()
        } else {
            axis
        }
    }

    fn matrices(&self) -> BatchMatrices {
        BatchMatrices {
            modelview: self.transform,
            projection: self.projection,
        }
    }

    pub fn map_mode(&self) -> MapMode {
        self.map_mode
    }

    pub fn set_map_mode(&mut self, mode: MapMode) {
        self.map_mode = mode;
        self.update_projection();
    }

    /// Use `projection` from canvas pixels to clip space
    pub fn set_projection(&mut self, projection: Mat4) {
        self.user_projection = projection;
        self.map_mode = MapMode::UserProjection;
        self.update_projection();
    }

    pub fn projection(&self) -> Mat4 {
        self.projection
    }

    // ─── Transform ──────────────────────────────────────────────────────

    pub fn set_transform(&mut self, transform: Mat4) {
        self.transform = transform;
    }

    /// Apply `transform` before the current transform
    pub fn mult_transform(&mut self, transform: &Mat4) {
        self.transform = self.transform.mul(transform);
    }

    pub fn get_transform(&self) -> Mat4 {
        self.transform
    }

    pub fn push_transform(&mut self) {
        self.transform_stack.push(self.transform);
    }

    pub fn pop_transform(&mut self) -> Result<()> {
        self.transform = self
            .transform_stack
            .pop()
            .ok_or_else(|| GraphicsError::invalid_argument("transform stack is empty"))?;
        Ok(())
    }

    // ─── Clipping ───────────────────────────────────────────────────────

    pub fn cliprect(&self) -> Option<Rect> {
        self.cliprect
    }

    pub fn set_cliprect(&mut self, rect: Rect) -> Result<()> {
        check_cliprect(&rect)?;
        self.apply_cliprect(Some(rect))
    }

    /// Save the current clip and intersect it with `rect`
    pub fn push_cliprect(&mut self, rect: Rect) -> Result<()> {
        check_cliprect(&rect)?;
        let clipped = match self.cliprect {
            Some(current) => current.intersection(&rect),
            None => rect,
        };
        self.clip_stack.push(self.cliprect);
        self.apply_cliprect(Some(clipped))
    }

    /// Save the current clip unchanged
    pub fn push_current_cliprect(&mut self) {
        self.clip_stack.push(self.cliprect);
    }

    pub fn pop_cliprect(&mut self) -> Result<()> {
        let previous = self
            .clip_stack
            .pop()
            .ok_or_else(|| GraphicsError::invalid_argument("clip rectangle stack is empty"))?;
        self.apply_cliprect(previous)
    }

    /// Drop the clip; the stack is left as is
    pub fn reset_cliprect(&mut self) -> Result<()> {
        self.apply_cliprect(None)
    }

    fn apply_cliprect(&mut self, rect: Option<Rect>) -> Result<()> {
        self.flush()?;
        self.cliprect = rect;
        match rect {
            Some(rect) => self
                .gc
                .set_scissor(IntRect::enclosing(&rect), self.scissor_y_axis()),
            None => self.gc.reset_scissor(),
        }
    }

    /// Device pixels a fill may touch, rows in the backend's order
    fn fill_clip(&self) -> IntRect {
        let bounds = IntRect::from_size(self.size());
        match self.gc.scissor() {
            Some(scissor) => bounds.intersection(&scissor),
            None => bounds,
        }
    }

    // ─── Drawing ────────────────────────────────────────────────────────

    pub fn draw_point(&mut self, point: Point, color: Color) -> Result<()> {
        self.draw_points(&[point], color)
    }

    pub fn draw_points(&mut self, points: &[Point], color: Color) -> Result<()> {
        self.sync_size()?;
        let matrices = self.matrices();
        let mut batcher = self.batcher.borrow_mut();
        let (point, pool) = batcher.point(&self.gc, &matrices)?;
        point.draw_points(&self.gc, pool, points, color)
    }

    pub fn draw_line(&mut self, start: Point, end: Point, color: Color) -> Result<()> {
        self.draw_lines(&[start, end], color)
    }

    /// Independent segments, one per pair of points
    pub fn draw_lines(&mut self, points: &[Point], color: Color) -> Result<()> {
        self.sync_size()?;
        let matrices = self.matrices();
        let mut batcher = self.batcher.borrow_mut();
        let (line, pool) = batcher.line(&self.gc, &matrices)?;
        line.draw_lines(&self.gc, pool, points, color)
    }

    pub fn draw_line_strip(&mut self, points: &[Point], color: Color) -> Result<()> {
        self.sync_size()?;
        let matrices = self.matrices();
        let mut batcher = self.batcher.borrow_mut();
        let (line, pool) = batcher.line(&self.gc, &matrices)?;
        line.draw_line_strip(&self.gc, pool, points, color)
    }

    /// Outline of a rectangle
    pub fn draw_box(&mut self, rect: Rect, color: Color) -> Result<()> {
        self.sync_size()?;
        let matrices = self.matrices();
        let corners = [
            Point::new(rect.left(), rect.top()),
            Point::new(rect.right(), rect.top()),
            Point::new(rect.right(), rect.bottom()),
            Point::new(rect.left(), rect.bottom()),
        ];
        let mut batcher = self.batcher.borrow_mut();
        let (line, pool) = batcher.line(&self.gc, &matrices)?;
        line.draw_line_loop(&self.gc, pool, &corners, color)
    }

    pub fn fill_rect(&mut self, rect: Rect, color: Color) -> Result<()> {
        self.sync_size()?;
        let matrices = self.matrices();
        let mut batcher = self.batcher.borrow_mut();
        let (triangle, pool) = batcher.triangle(&self.gc, &matrices)?;
        triangle.fill_rect(&self.gc, pool, rect, color)
    }

    pub fn fill_rect_gradient(&mut self, rect: Rect, gradient: &RectGradient) -> Result<()> {
        self.sync_size()?;
        let matrices = self.matrices();
        let mut batcher = self.batcher.borrow_mut();
        let (triangle, pool) = batcher.triangle(&self.gc, &matrices)?;
        triangle.fill_rect_gradient(&self.gc, pool, rect, gradient)
    }

    /// Fill every complete triple of `points`
    pub fn fill_triangles(&mut self, points: &[Point], color: Color) -> Result<()> {
        self.sync_size()?;
        let matrices = self.matrices();
        let mut batcher = self.batcher.borrow_mut();
        let (triangle, pool) = batcher.triangle(&self.gc, &matrices)?;
        triangle.fill_triangles(&self.gc, pool, points, color)
    }

    /// Draw `src`, in texels of `texture`, into `dest`
    pub fn draw_image(&mut self, texture: &Texture2D, src: Rect, dest: Rect, color: Color) -> Result<()> {
        self.sync_size()?;
        let matrices = self.matrices();
        let mut batcher = self.batcher.borrow_mut();
        let (triangle, pool) = batcher.triangle(&self.gc, &matrices)?;
        triangle.draw_image(&self.gc, pool, texture, src, dest, color)
    }

    /// Textured segments with one normalized texture coordinate per point
    pub fn draw_lines_textured(
        &mut self,
        points: &[Point],
        texcoords: &[Point],
        texture: &Texture2D,
        color: Color,
    ) -> Result<()> {
        self.sync_size()?;
        let matrices = self.matrices();
        let mut batcher = self.batcher.borrow_mut();
        let (line, pool) = batcher.line_texture(&self.gc, &matrices)?;
        line.draw_lines(&self.gc, pool, points, texcoords, texture, color)
    }

    pub fn fill_path(&mut self, path: &Path, brush: &Brush) -> Result<()> {
        self.sync_size()?;
        let matrices = self.matrices();
        let clip = self.fill_clip();
        let mut batcher = self.batcher.borrow_mut();
        let (fill, pool) = batcher.path(&self.gc, &matrices)?;
        fill.fill(&self.gc, pool, path, brush, clip)
    }

    pub fn fill_circle(&mut self, center: Point, radius: f32, brush: &Brush) -> Result<()> {
        self.fill_path(&Path::circle(center, radius), brush)
    }

    pub fn fill_ellipse(&mut self, center: Point, radius_x: f32, radius_y: f32, brush: &Brush) -> Result<()> {
        self.fill_path(&Path::ellipse(center, radius_x, radius_y), brush)
    }

    /// Hairline outline of `path`, curves flattened in user space
    pub fn draw_path(&mut self, path: &Path, color: Color) -> Result<()> {
        self.sync_size()?;
        let matrices = self.matrices();
        let mut batcher = self.batcher.borrow_mut();
        let (line, pool) = batcher.line(&self.gc, &matrices)?;
        for subpath in path.subpaths().iter().filter(|s| !s.is_empty()) {
            let mut points = self.flattener.flatten_subpath(subpath, &Mat4::IDENTITY);
            if subpath.is_closed() {
                if points.len() > 1 && points.first() == points.last() {
                    points.pop();
                }
                line.draw_line_loop(&self.gc, pool, &points, color)?;
            } else {
                line.draw_line_strip(&self.gc, pool, &points, color)?;
            }
        }
        Ok(())
    }

    /// Make a custom batcher active for this canvas
    pub fn set_batcher(&mut self, batcher: Rc<RefCell<dyn RenderBatcher>>) -> Result<()> {
        self.sync_size()?;
        let matrices = self.matrices();
        self.batcher
            .borrow_mut()
            .set_batcher(&self.gc, &matrices, batcher)
    }
}

fn check_cliprect(rect: &Rect) -> Result<()> {
    if rect.is_inverted() {
        return Err(GraphicsError::invalid_argument(format!(
            "inverted clip rectangle {:?}",
            rect
        )));
    }
    Ok(())
}

impl Drop for Canvas {
    fn drop(&mut self) {
        let Ok(mut batcher) = self.batcher.try_borrow_mut() else {
            return;
        };
        if let Err(err) = batcher.flush() {
            tracing::warn!(%err, "failed to flush canvas batch on drop");
        }
    }
}

impl std::fmt::Debug for Canvas {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Canvas")
            .field("size", &self.tracked_size)
            .field("map_mode", &self.map_mode)
            .field("cliprect", &self.cliprect)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_gpu::SoftwareProvider;

    fn canvas() -> Canvas {
        let size = IntSize::new(32, 32);
        let gc = GraphicContext::new(Box::new(SoftwareProvider::new(size).unwrap()), size).unwrap();
        Canvas::new(gc, RenderConfig::default()).unwrap()
    }

    #[test]
    fn test_viewport_follows_size() {
        let canvas = canvas();
        assert_eq!(canvas.gc().viewports(), vec![Rect::new(0.0, 0.0, 32.0, 32.0)]);
        let top_left = canvas.projection().transform_point(Point::ZERO);
        assert_eq!(top_left, Point::new(-1.0, 1.0));
    }

    #[test]
    fn test_lower_left_projection() {
        let mut canvas = canvas();
        canvas.set_map_mode(MapMode::LowerLeft);
        let origin = canvas.projection().transform_point(Point::ZERO);
        assert_eq!(origin, Point::new(-1.0, -1.0));
    }

    #[test]
    fn test_transform_stack() {
        let mut canvas = canvas();
        canvas.push_transform();
        canvas.mult_transform(&Mat4::translation(5.0, 0.0, 0.0));
        canvas.mult_transform(&Mat4::scale(2.0, 2.0, 1.0));
        let p = canvas.get_transform().transform_point(Point::new(1.0, 1.0));
        assert_eq!(p, Point::new(7.0, 2.0));

        canvas.pop_transform().unwrap();
        assert_eq!(canvas.get_transform(), Mat4::IDENTITY);
        assert!(matches!(
            canvas.pop_transform(),
            Err(GraphicsError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_cliprect_sets_scissor() {
        let mut canvas = canvas();
        canvas.push_cliprect(Rect::new(2.0, 2.0, 20.0, 20.0)).unwrap();
        canvas.push_cliprect(Rect::new(10.0, 10.0, 20.0, 20.0)).unwrap();
        assert_eq!(canvas.cliprect(), Some(Rect::new(10.0, 10.0, 12.0, 12.0)));
        assert_eq!(canvas.gc().scissor(), Some(IntRect::new(10, 10, 12, 12)));

        canvas.pop_cliprect().unwrap();
        assert_eq!(canvas.gc().scissor(), Some(IntRect::new(2, 2, 20, 20)));
        canvas.pop_cliprect().unwrap();
        assert_eq!(canvas.gc().scissor(), None);
    }

    #[test]
    fn test_inverted_cliprect_is_rejected() {
        let mut canvas = canvas();
        let err = canvas
            .set_cliprect(Rect::new(10.0, 10.0, -5.0, 4.0))
            .unwrap_err();
        assert!(matches!(err, GraphicsError::InvalidArgument(_)));
        assert_eq!(canvas.cliprect(), None);
    }
}
