//! Backend resource handles
//!
//! Handles are small `Copy` values naming an object owned by the active
//! provider. A handle whose object was deleted is reported as
//! [`GraphicsError::NullObject`](cinder_core::GraphicsError) the first time a
//! provider touches it.

use cinder_core::IntSize;
use slotmap::new_key_type;

use crate::description::{
    BlendStateDescription, DepthStencilStateDescription, RasterizerStateDescription,
};

new_key_type! {
    pub struct TextureId;
    pub struct FrameBufferId;
    pub struct BufferId;
    pub struct PrimitivesArrayId;
    pub struct ProgramId;
    pub struct RasterizerStateId;
    pub struct BlendStateId;
    pub struct DepthStencilStateId;
}

/// Pixel storage format of textures and pixel buffers
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    #[default]
    Rgba8,
    Rgba32f,
    R8,
}

impl TextureFormat {
    pub fn bytes_per_pixel(&self) -> usize {
        match self {
            TextureFormat::Rgba8 => 4,
            TextureFormat::Rgba32f => 16,
            TextureFormat::R8 => 1,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TextureFilter {
    #[default]
    Nearest,
    Linear,
}

/// A 2D texture
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Texture2D {
    pub id: TextureId,
    pub size: IntSize,
    pub format: TextureFormat,
}

/// An offscreen render target with one color attachment
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FrameBuffer {
    pub id: FrameBufferId,
    pub color: TextureId,
    pub size: IntSize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BufferKind {
    Vertex,
    Element,
    Uniform,
    Storage,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BufferUsage {
    StaticDraw,
    #[default]
    DynamicDraw,
    StreamDraw,
}

/// Vertex attribute data in GPU memory
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VertexArrayBuffer {
    pub id: BufferId,
    pub size: usize,
}

/// Index data in GPU memory
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ElementArrayBuffer {
    pub id: BufferId,
    pub size: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UniformBuffer {
    pub id: BufferId,
    pub size: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct StorageBuffer {
    pub id: BufferId,
    pub size: usize,
}

/// A set of vertex attribute bindings (a vertex array object)
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PrimitivesArray {
    pub id: PrimitivesArrayId,
}

/// A compiled and linked shader program
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ProgramObject {
    pub id: ProgramId,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RasterizerState {
    pub id: RasterizerStateId,
    pub description: RasterizerStateDescription,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlendState {
    pub id: BlendStateId,
    pub description: BlendStateDescription,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DepthStencilState {
    pub id: DepthStencilStateId,
    pub description: DepthStencilStateDescription,
}
