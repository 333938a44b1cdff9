//! Cinder GPU
//!
//! Backend-agnostic graphic context. Callers hold [`GraphicContext`] handles
//! that each own a full pipeline state record; the shared [`GraphicScreen`]
//! keeps exactly one record resident on the [`GraphicContextProvider`] and
//! pushes only what changed.
//!
//! # Example
//!
//! ```ignore
//! use cinder_gpu::{GraphicContext, SoftwareProvider};
//!
//! let provider = SoftwareProvider::new(IntSize::new(800, 600))?;
//! let gc = GraphicContext::new(Box::new(provider), IntSize::new(800, 600))?;
//! gc.clear(Color::BLACK)?;
//! ```

pub mod backends;
pub mod context;
pub mod description;
pub mod pixel_buffer;
pub mod program;
pub mod provider;
pub mod resources;
pub mod screen;
pub mod state;

pub use backends::software::{BoundState, ProviderCall, ProviderStats, SoftwareProvider};
pub use context::GraphicContext;
pub use description::{
    BlendEquation, BlendFunc, BlendStateDescription, ColorWriteMask, CompareFunction, CullMode,
    DepthRange, DepthStencilStateDescription, DrawBuffer, FillMode, FrontFace, IndicesType,
    PrimitivesType, RasterizerStateDescription, ShaderLanguage, StencilFace, StencilOp,
    TextureImageYAxis, VertexAttribute, VertexAttributeDataType,
};
pub use pixel_buffer::PixelBuffer;
pub use program::{ActiveProgram, ProgramSource, StandardProgram};
pub use provider::GraphicContextProvider;
pub use resources::{
    BlendState, BufferId, BufferKind, BufferUsage, DepthStencilState, ElementArrayBuffer,
    FrameBuffer, PrimitivesArray, ProgramObject, RasterizerState, StorageBuffer, Texture2D,
    TextureFilter, TextureFormat, TextureId, UniformBuffer, VertexArrayBuffer,
};
pub use screen::GraphicScreen;
pub use state::{DefaultStates, GraphicContextState, StateId, MAX_BINDING_INDEX};
