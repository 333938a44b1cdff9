//! Cinder Core
//!
//! Foundation types shared by every Cinder crate:
//!
//! - **Geometry**: points, sizes, rectangles and 4x4 matrices
//! - **Color**: linear RGBA colors
//! - **Errors**: the graphics error taxonomy used across the workspace
//! - **Config**: tunables for render batching and path filling

pub mod color;
pub mod config;
pub mod error;
pub mod geometry;

pub use color::Color;
pub use config::{ConfigError, FlattenStrategy, RenderConfig};
pub use error::{GraphicsError, Result};
pub use geometry::{
    ClipZRange, Handedness, IntPoint, IntRect, IntSize, Mat4, Point, Rect, Size,
};
