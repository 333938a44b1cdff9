//! Backend provider capability set
//!
//! One implementation per backend. The screen is the only caller of the
//! state setters; contexts reach resource creation and draws through the
//! screen after it has made their state resident.

use std::any::Any;

use cinder_core::{ClipZRange, Color, IntPoint, IntRect, IntSize, Rect, Result};

use crate::description::{
    BlendStateDescription, DepthRange, DepthStencilStateDescription, DrawBuffer, IndicesType,
    PrimitivesType, RasterizerStateDescription, ShaderLanguage, TextureImageYAxis,
    VertexAttribute,
};
use crate::pixel_buffer::PixelBuffer;
use crate::program::{ActiveProgram, ProgramSource};
use crate::resources::{
    BlendState, BufferId, BufferKind, BufferUsage, DepthStencilState, ElementArrayBuffer,
    FrameBuffer, PrimitivesArray, ProgramObject, RasterizerState, StorageBuffer, Texture2D,
    TextureFilter, TextureFormat, UniformBuffer, VertexArrayBuffer,
};

pub trait GraphicContextProvider {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;

    // ─── Queries ────────────────────────────────────────────────────────

    fn name(&self) -> &str;

    /// Number of vertex attribute slots of a primitives array
    fn max_attributes(&self) -> usize;

    fn texture_image_y_axis(&self) -> TextureImageYAxis;

    fn shader_language(&self) -> ShaderLanguage;

    fn clip_z_range(&self) -> ClipZRange;

    // ─── Resources ──────────────────────────────────────────────────────

    fn create_texture(
        &mut self,
        size: IntSize,
        format: TextureFormat,
        filter: TextureFilter,
    ) -> Result<Texture2D>;

    /// Copy `src_rect` of `pixels` into the texture at `dest`
    fn upload_texture(
        &mut self,
        texture: &Texture2D,
        dest: IntPoint,
        pixels: &PixelBuffer,
        src_rect: IntRect,
    ) -> Result<()>;

    fn delete_texture(&mut self, texture: &Texture2D) -> Result<()>;

    fn create_frame_buffer(&mut self, color: &Texture2D) -> Result<FrameBuffer>;

    fn delete_frame_buffer(&mut self, frame_buffer: &FrameBuffer) -> Result<()>;

    fn create_buffer(&mut self, kind: BufferKind, size: usize, usage: BufferUsage)
        -> Result<BufferId>;

    fn upload_buffer(&mut self, buffer: BufferId, offset: usize, data: &[u8]) -> Result<()>;

    fn delete_buffer(&mut self, buffer: BufferId) -> Result<()>;

    fn create_primitives_array(&mut self) -> Result<PrimitivesArray>;

    fn set_attribute(
        &mut self,
        array: &PrimitivesArray,
        index: usize,
        buffer: &VertexArrayBuffer,
        attribute: VertexAttribute,
    ) -> Result<()>;

    fn delete_primitives_array(&mut self, array: &PrimitivesArray) -> Result<()>;

    fn create_program_object(&mut self, source: &ProgramSource) -> Result<ProgramObject>;

    fn create_rasterizer_state(
        &mut self,
        description: &RasterizerStateDescription,
    ) -> Result<RasterizerState>;

    fn create_blend_state(&mut self, description: &BlendStateDescription) -> Result<BlendState>;

    fn create_depth_stencil_state(
        &mut self,
        description: &DepthStencilStateDescription,
    ) -> Result<DepthStencilState>;

    // ─── State ──────────────────────────────────────────────────────────

    /// Bind render targets, `None` renders to the window surface
    fn set_frame_buffers(
        &mut self,
        write: Option<&FrameBuffer>,
        read: Option<&FrameBuffer>,
    ) -> Result<()>;

    fn set_draw_buffer(&mut self, buffer: DrawBuffer) -> Result<()>;

    fn set_rasterizer_state(&mut self, state: &RasterizerState) -> Result<()>;

    fn set_blend_state(&mut self, state: &BlendState, color: Color, sample_mask: u32)
        -> Result<()>;

    fn set_depth_stencil_state(&mut self, state: &DepthStencilState, stencil_ref: i32)
        -> Result<()>;

    fn set_texture(&mut self, unit: usize, texture: Option<&Texture2D>) -> Result<()>;

    fn set_image_texture(&mut self, unit: usize, texture: Option<&Texture2D>) -> Result<()>;

    fn set_uniform_buffer(&mut self, index: usize, buffer: Option<&UniformBuffer>) -> Result<()>;

    fn set_storage_buffer(&mut self, index: usize, buffer: Option<&StorageBuffer>) -> Result<()>;

    /// Scissor in native coordinates, `None` disables it
    fn set_scissor(&mut self, rect: Option<IntRect>) -> Result<()>;

    fn set_viewports(&mut self, viewports: &[Rect]) -> Result<()>;

    fn set_depth_ranges(&mut self, ranges: &[DepthRange]) -> Result<()>;

    fn set_program(&mut self, program: ActiveProgram) -> Result<()>;

    // ─── Drawing ────────────────────────────────────────────────────────

    fn set_primitives_array(&mut self, array: Option<&PrimitivesArray>) -> Result<()>;

    fn draw_primitives_array(
        &mut self,
        primitives: PrimitivesType,
        offset: usize,
        count: usize,
    ) -> Result<()>;

    fn draw_primitives_array_instanced(
        &mut self,
        primitives: PrimitivesType,
        offset: usize,
        count: usize,
        instances: usize,
    ) -> Result<()>;

    fn set_primitives_elements(&mut self, elements: Option<&ElementArrayBuffer>) -> Result<()>;

    /// Draw `count` indices starting `offset` bytes into the bound element buffer
    fn draw_primitives_elements(
        &mut self,
        primitives: PrimitivesType,
        count: usize,
        indices: IndicesType,
        offset: usize,
    ) -> Result<()>;

    fn draw_primitives_elements_instanced(
        &mut self,
        primitives: PrimitivesType,
        count: usize,
        indices: IndicesType,
        offset: usize,
        instances: usize,
    ) -> Result<()>;

    fn clear(&mut self, color: Color) -> Result<()>;

    fn clear_depth(&mut self, value: f32) -> Result<()>;

    fn clear_stencil(&mut self, value: i32) -> Result<()>;

    fn dispatch(&mut self, x: u32, y: u32, z: u32) -> Result<()>;

    /// Read `rect` of the bound read target in native row order
    fn get_pixeldata(&mut self, rect: IntRect, format: TextureFormat) -> Result<PixelBuffer>;

    // ─── Surface ────────────────────────────────────────────────────────

    fn flush(&mut self) -> Result<()>;

    fn make_current(&mut self) -> Result<()>;

    fn on_window_resized(&mut self, size: IntSize) -> Result<()>;
}
