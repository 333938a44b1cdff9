//! Cinder Paint
//!
//! 2D drawing on top of a [`cinder_gpu::GraphicContext`]. A [`Canvas`]
//! turns drawing calls into batched draws: hairlines, points, sprites and
//! antialiased path fills with solid, gradient and image brushes.
//!
//! # Example
//!
//! ```ignore
//! use cinder_paint::{Brush, Canvas, Path};
//!
//! let mut canvas = Canvas::new(gc, RenderConfig::default())?;
//! canvas.clear(Color::BLACK)?;
//! canvas.fill_rect(Rect::new(10.0, 10.0, 100.0, 50.0), Color::RED)?;
//! canvas.fill_path(&Path::circle(Point::new(200.0, 200.0), 40.0), &Brush::solid(Color::BLUE))?;
//! canvas.flush()?;
//! ```

pub mod batch;
pub mod canvas;
pub mod path;

pub use batch::{
    BatchMatrices, BatcherKind, CanvasBatcher, RectGradient, RenderBatchBuffer, RenderBatchLine,
    RenderBatchLineTexture, RenderBatchPath, RenderBatchPoint, RenderBatchTriangle, RenderBatcher,
};
pub use canvas::{Canvas, MapMode};
pub use path::{
    BlockCoverage, Brush, FillRule, Flattener, GradientStop, MaskBlock, Paint, Path,
    PathRasterizer, Subpath,
};
