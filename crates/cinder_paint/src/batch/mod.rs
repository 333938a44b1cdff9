//! Render batchers
//!
//! A batcher collects one kind of primitive in a CPU vertex array and turns
//! it into a single draw call when flushed. Vertices are transformed to clip
//! space when they are accepted, so a batch survives transform changes.
//!
//! [`CanvasBatcher`] owns the buffer pool and the built-in batchers and keeps
//! track of which batcher is active on which context. Activating another
//! batcher, or the same one from another context, flushes the previous one.

pub mod buffer;
pub mod line;
pub mod line_texture;
pub mod path;
pub mod point;
pub mod triangle;

use std::cell::RefCell;
use std::rc::Rc;

use bytemuck::{Pod, Zeroable};
use cinder_core::{GraphicsError, Mat4, Point, RenderConfig, Result};
use cinder_gpu::{
    BufferId, GraphicContext, PrimitivesArray, PrimitivesType, VertexAttribute,
};
use smallvec::SmallVec;

pub use buffer::RenderBatchBuffer;
pub use line::RenderBatchLine;
pub use line_texture::RenderBatchLineTexture;
pub use path::RenderBatchPath;
pub use point::RenderBatchPoint;
pub use triangle::{RectGradient, RenderBatchTriangle};

/// A primitive accumulator that can be made active on a canvas
pub trait RenderBatcher {
    fn name(&self) -> &str;

    /// Submit everything collected so far; nothing happens when empty
    fn flush(&mut self, gc: &GraphicContext, pool: &mut RenderBatchBuffer) -> Result<()>;

    /// The modelview or projection of the canvas changed
    fn matrix_changed(&mut self, matrices: &BatchMatrices);
}

/// Matrices of the canvas a batcher draws for
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BatchMatrices {
    /// User space to canvas pixels
    pub modelview: Mat4,
    /// Canvas pixels to clip space
    pub projection: Mat4,
}

impl Default for BatchMatrices {
    fn default() -> Self {
        Self {
            modelview: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        }
    }
}

impl BatchMatrices {
    pub fn modelview_projection(&self) -> Mat4 {
        self.projection.mul(&self.modelview)
    }
}

/// Vertex struct with a fixed attribute layout
pub(crate) trait BatchVertex: Pod {
    /// `(attribute location, layout)` for every field
    fn attributes() -> SmallVec<[(usize, VertexAttribute); 4]>;
}

/// Position and color, for the `ColorOnly` program
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub(crate) struct ColorVertex {
    pub position: [f32; 4],
    pub color: [f32; 4],
}

impl BatchVertex for ColorVertex {
    fn attributes() -> SmallVec<[(usize, VertexAttribute); 4]> {
        use cinder_gpu::program::color_only;
        let stride = std::mem::size_of::<ColorVertex>();
        smallvec::smallvec![
            (color_only::ATTR_POSITION, VertexAttribute::float(4, stride, 0)),
            (color_only::ATTR_COLOR, VertexAttribute::float(4, stride, 16)),
        ]
    }
}

/// Clip space position of a user space point
pub(crate) fn to_clip(mvp: &Mat4, point: Point) -> [f32; 4] {
    mvp.transform_vec4([point.x, point.y, 0.0, 1.0])
}

/// CPU side vertices plus the per pool slot attribute bindings
pub(crate) struct VertexBatch<V> {
    vertices: Vec<V>,
    capacity: usize,
    arrays: Vec<Option<(BufferId, PrimitivesArray)>>,
}

impl<V: BatchVertex> VertexBatch<V> {
    pub fn new(vertex_buffer_size: usize) -> Self {
        let capacity = vertex_buffer_size / std::mem::size_of::<V>();
        Self {
            vertices: Vec::with_capacity(capacity),
            capacity,
            arrays: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Fails when `count` vertices can never fit in one batch
    pub fn check_capacity(&self, count: usize) -> Result<()> {
        if count > self.capacity {
            return Err(GraphicsError::CapacityExceeded {
                requested: count,
                capacity: self.capacity,
            });
        }
        Ok(())
    }

    /// True when `count` more vertices need a flush first
    pub fn needs_flush(&self, count: usize) -> bool {
        self.vertices.len() + count > self.capacity
    }

    pub fn push(&mut self, vertex: V) {
        debug_assert!(self.vertices.len() < self.capacity);
        self.vertices.push(vertex);
    }

    /// Upload the vertices to the next pooled buffer and draw them
    ///
    /// Returns the number of vertices drawn. The program and textures must
    /// already be bound.
    pub fn submit(
        &mut self,
        gc: &GraphicContext,
        pool: &mut RenderBatchBuffer,
        primitives: PrimitivesType,
    ) -> Result<usize> {
        if self.vertices.is_empty() {
            return Ok(0);
        }
        let (buffer, slot) = pool.get_vertex_buffer(gc)?;
        if self.arrays.len() <= slot {
            self.arrays.resize(slot + 1, None);
        }
        let array = match self.arrays[slot] {
            Some((id, array)) if id == buffer.id => array,
            _ => {
                let array = gc.create_primitives_array()?;
                for (index, attribute) in V::attributes() {
                    gc.set_attribute(&array, index, &buffer, attribute)?;
                }
                self.arrays[slot] = Some((buffer.id, array));
                array
            }
        };
        gc.upload_vertex_buffer(&buffer, 0, bytemuck::cast_slice(&self.vertices))?;
        let count = self.vertices.len();
        gc.draw_primitives(primitives, count, &array)?;
        self.vertices.clear();
        Ok(count)
    }
}

/// One of the batchers owned by [`CanvasBatcher`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BatcherKind {
    Triangle,
    Line,
    LineTexture,
    Point,
    Path,
}

enum ActiveBatcher {
    BuiltIn(BatcherKind),
    Custom(Rc<RefCell<dyn RenderBatcher>>),
}

impl ActiveBatcher {
    fn same(&self, other: &ActiveBatcher) -> bool {
        match (self, other) {
            (ActiveBatcher::BuiltIn(a), ActiveBatcher::BuiltIn(b)) => a == b,
            (ActiveBatcher::Custom(a), ActiveBatcher::Custom(b)) => {
                std::ptr::eq(Rc::as_ptr(a) as *const u8, Rc::as_ptr(b) as *const u8)
            }
            _ => false,
        }
    }
}

/// Batchers and buffer pool shared by the canvases of one surface
pub struct CanvasBatcher {
    pool: RenderBatchBuffer,
    triangle: RenderBatchTriangle,
    line: RenderBatchLine,
    line_texture: RenderBatchLineTexture,
    point: RenderBatchPoint,
    path: RenderBatchPath,
    active: Option<(ActiveBatcher, GraphicContext)>,
    matrices: Option<BatchMatrices>,
}

impl CanvasBatcher {
    pub fn new(config: RenderConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            triangle: RenderBatchTriangle::new(&config),
            line: RenderBatchLine::new(&config),
            line_texture: RenderBatchLineTexture::new(&config),
            point: RenderBatchPoint::new(&config),
            path: RenderBatchPath::new(&config)?,
            pool: RenderBatchBuffer::new(config),
            active: None,
            matrices: None,
        })
    }

    pub fn pool(&self) -> &RenderBatchBuffer {
        &self.pool
    }

    pub fn active_kind(&self) -> Option<BatcherKind> {
        match &self.active {
            Some((ActiveBatcher::BuiltIn(kind), _)) => Some(*kind),
            _ => None,
        }
    }

    pub fn has_active_custom(&self) -> bool {
        matches!(self.active, Some((ActiveBatcher::Custom(_), _)))
    }

    fn activate(
        &mut self,
        batcher: ActiveBatcher,
        gc: &GraphicContext,
        matrices: &BatchMatrices,
    ) -> Result<()> {
        let unchanged = matches!(
            &self.active,
            Some((active, active_gc)) if active.same(&batcher) && active_gc.ptr_eq(gc)
        );
        if !unchanged {
            self.flush()?;
        }

        let matrices_changed = self.matrices.as_ref() != Some(matrices);
        if matrices_changed {
            self.triangle.matrix_changed(matrices);
            self.line.matrix_changed(matrices);
            self.line_texture.matrix_changed(matrices);
            self.point.matrix_changed(matrices);
            self.path.matrix_changed(matrices);
            self.matrices = Some(*matrices);
        }
        if let ActiveBatcher::Custom(custom) = &batcher {
            if matrices_changed || !unchanged {
                custom.borrow_mut().matrix_changed(matrices);
            }
        }

        if !unchanged {
            self.active = Some((batcher, gc.clone()));
        }
        Ok(())
    }

    pub fn triangle(
        &mut self,
        gc: &GraphicContext,
        matrices: &BatchMatrices,
    ) -> Result<(&mut RenderBatchTriangle, &mut RenderBatchBuffer)> {
        self.activate(ActiveBatcher::BuiltIn(BatcherKind::Triangle), gc, matrices)?;
        Ok((&mut self.triangle, &mut self.pool))
    }

    pub fn line(
        &mut self,
        gc: &GraphicContext,
        matrices: &BatchMatrices,
    ) -> Result<(&mut RenderBatchLine, &mut RenderBatchBuffer)> {
        self.activate(ActiveBatcher::BuiltIn(BatcherKind::Line), gc, matrices)?;
        Ok((&mut self.line, &mut self.pool))
    }

    pub fn line_texture(
        &mut self,
        gc: &GraphicContext,
        matrices: &BatchMatrices,
    ) -> Result<(&mut RenderBatchLineTexture, &mut RenderBatchBuffer)> {
        self.activate(ActiveBatcher::BuiltIn(BatcherKind::LineTexture), gc, matrices)?;
        Ok((&mut self.line_texture, &mut self.pool))
    }

    pub fn point(
        &mut self,
        gc: &GraphicContext,
        matrices: &BatchMatrices,
    ) -> Result<(&mut RenderBatchPoint, &mut RenderBatchBuffer)> {
        self.activate(ActiveBatcher::BuiltIn(BatcherKind::Point), gc, matrices)?;
        Ok((&mut self.point, &mut self.pool))
    }

    pub fn path(
        &mut self,
        gc: &GraphicContext,
        matrices: &BatchMatrices,
    ) -> Result<(&mut RenderBatchPath, &mut RenderBatchBuffer)> {
        self.activate(ActiveBatcher::BuiltIn(BatcherKind::Path), gc, matrices)?;
        Ok((&mut self.path, &mut self.pool))
    }

    /// Make a custom batcher active
    ///
    /// The batcher gets the current matrices; it is flushed with the pool
    /// whenever another batcher takes over.
    pub fn set_batcher(
        &mut self,
        gc: &GraphicContext,
        matrices: &BatchMatrices,
        batcher: Rc<RefCell<dyn RenderBatcher>>,
    ) -> Result<()> {
        self.activate(ActiveBatcher::Custom(batcher), gc, matrices)
    }

    /// Flush the active batcher and leave none active
    pub fn flush(&mut self) -> Result<()> {
        let Some((active, gc)) = self.active.take() else {
            return Ok(());
        };
        let pool = &mut self.pool;
        let result = match active {
            ActiveBatcher::BuiltIn(kind) => match kind {
                BatcherKind::Triangle => self.triangle.flush(&gc, pool),
                BatcherKind::Line => self.line.flush(&gc, pool),
                BatcherKind::LineTexture => self.line_texture.flush(&gc, pool),
                BatcherKind::Point => self.point.flush(&gc, pool),
                BatcherKind::Path => self.path.flush(&gc, pool),
            },
            ActiveBatcher::Custom(custom) => custom.borrow_mut().flush(&gc, pool),
        };
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cinder_core::{Color, IntSize};
    use cinder_gpu::SoftwareProvider;

    fn context() -> GraphicContext {
        let size = IntSize::new(16, 16);
        GraphicContext::new(Box::new(SoftwareProvider::new(size).unwrap()), size).unwrap()
    }

    fn draw_calls(gc: &GraphicContext) -> usize {
        gc.with_provider::<SoftwareProvider, _>(|p| p.stats().draw_calls)
            .unwrap()
    }

    #[derive(Default)]
    struct Recorder {
        flushes: usize,
        matrices: Vec<BatchMatrices>,
    }

    impl RenderBatcher for Recorder {
        fn name(&self) -> &str {
            "recorder"
        }

        fn flush(&mut self, _gc: &GraphicContext, _pool: &mut RenderBatchBuffer) -> Result<()> {
            self.flushes += 1;
            Ok(())
        }

        fn matrix_changed(&mut self, matrices: &BatchMatrices) {
            self.matrices.push(*matrices);
        }
    }

    #[test]
    fn test_modelview_projection_order() {
        let matrices = BatchMatrices {
            modelview: Mat4::translation(10.0, 0.0, 0.0),
            projection: Mat4::scale(0.5, 1.0, 1.0),
        };
        let p = matrices.modelview_projection().transform_point(Point::new(2.0, 0.0));
        assert_eq!(p, Point::new(6.0, 0.0));
    }

    #[test]
    fn test_capacity_from_buffer_size() {
        let batch = VertexBatch::<ColorVertex>::new(256);
        assert_eq!(batch.capacity(), 8);
        assert!(batch.check_capacity(8).is_ok());
        assert_eq!(
            batch.check_capacity(9),
            Err(GraphicsError::CapacityExceeded {
                requested: 9,
                capacity: 8
            })
        );
    }

    #[test]
    fn test_switching_batcher_flushes_previous() {
        let gc = context();
        let mut batcher = CanvasBatcher::new(RenderConfig::default()).unwrap();
        let matrices = BatchMatrices::default();

        let (line, pool) = batcher.line(&gc, &matrices).unwrap();
        line.draw_lines(&gc, pool, &[Point::new(-1.0, 0.0), Point::new(1.0, 0.0)], Color::RED)
            .unwrap();
        assert_eq!(draw_calls(&gc), 0);

        batcher.triangle(&gc, &matrices).unwrap();
        assert_eq!(draw_calls(&gc), 1);
        assert_eq!(batcher.active_kind(), Some(BatcherKind::Triangle));
    }

    #[test]
    fn test_switching_context_flushes() {
        let gc = context();
        let sibling = gc.create();
        let mut batcher = CanvasBatcher::new(RenderConfig::default()).unwrap();
        let matrices = BatchMatrices::default();

        let (point, pool) = batcher.point(&gc, &matrices).unwrap();
        point.draw_points(&gc, pool, &[Point::ZERO], Color::WHITE).unwrap();
        batcher.point(&gc, &matrices).unwrap();
        assert_eq!(draw_calls(&gc), 0);

        batcher.point(&sibling, &matrices).unwrap();
        assert_eq!(draw_calls(&gc), 1);
    }

    #[test]
    fn test_custom_batcher_lifecycle() {
        let gc = context();
        let mut batcher = CanvasBatcher::new(RenderConfig::default()).unwrap();
        let recorder = Rc::new(RefCell::new(Recorder::default()));
        let matrices = BatchMatrices::default();

        batcher.set_batcher(&gc, &matrices, recorder.clone()).unwrap();
        assert!(batcher.has_active_custom());
        assert_eq!(recorder.borrow().matrices, vec![matrices]);

        // same batcher and matrices: nothing to do
        batcher.set_batcher(&gc, &matrices, recorder.clone()).unwrap();
        assert_eq!(recorder.borrow().matrices.len(), 1);
        assert_eq!(recorder.borrow().flushes, 0);

        let moved = BatchMatrices {
            modelview: Mat4::translation(1.0, 2.0, 0.0),
            ..matrices
        };
        batcher.set_batcher(&gc, &moved, recorder.clone()).unwrap();
        assert_eq!(recorder.borrow().matrices.last(), Some(&moved));

        batcher.line(&gc, &moved).unwrap();
        assert_eq!(recorder.borrow().flushes, 1);
        assert!(!batcher.has_active_custom());
    }
}
