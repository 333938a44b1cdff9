//! Software rasterizer backend
//!
//! Implements the provider capability set on the CPU. It interprets the
//! standard programs, renders into an RGBA8 window surface or into frame
//! buffer textures, and counts every call it receives so tests can assert on
//! both pixels and driver traffic.
//!
//! Depth and stencil states are stored but not evaluated; there is no depth
//! attachment.

mod raster;
mod shading;

use std::any::Any;

use cinder_core::{
    ClipZRange, Color, GraphicsError, IntPoint, IntRect, IntSize, Rect, Result, Size,
};
use slotmap::SlotMap;
use smallvec::SmallVec;

use crate::description::{
    BlendStateDescription, CullMode, DepthRange, DepthStencilStateDescription, DrawBuffer,
    FillMode, FrontFace, IndicesType, PrimitivesType, RasterizerStateDescription, ShaderLanguage,
    TextureImageYAxis, VertexAttribute, VertexAttributeDataType,
};
use crate::pixel_buffer::PixelBuffer;
use crate::program::{ActiveProgram, ProgramSource, StandardProgram};
use crate::provider::GraphicContextProvider;
use crate::resources::{
    BlendState, BlendStateId, BufferId, BufferKind, BufferUsage, DepthStencilState,
    DepthStencilStateId, ElementArrayBuffer, FrameBuffer, FrameBufferId, PrimitivesArray,
    PrimitivesArrayId, ProgramObject, RasterizerState, RasterizerStateId, StorageBuffer,
    Texture2D, TextureFilter, TextureFormat, TextureId, UniformBuffer, VertexArrayBuffer,
};
use crate::state::set_binding;

use raster::{DevicePoint, Primitive};
use shading::Varyings;

const MAX_ATTRIBUTES: usize = 16;

/// Per-call counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProviderStats {
    pub frame_buffer_sets: usize,
    pub draw_buffer_sets: usize,
    pub rasterizer_sets: usize,
    pub blend_sets: usize,
    pub depth_stencil_sets: usize,
    pub texture_sets: usize,
    pub image_texture_sets: usize,
    pub uniform_buffer_sets: usize,
    pub storage_buffer_sets: usize,
    pub scissor_sets: usize,
    pub viewport_sets: usize,
    pub depth_range_sets: usize,
    pub program_sets: usize,
    pub draw_calls: usize,
    pub vertices: usize,
    pub clears: usize,
    pub texture_uploads: usize,
    pub buffer_uploads: usize,
    pub flushes: usize,
}

impl ProviderStats {
    /// Total state setter calls
    pub fn state_sets(&self) -> usize {
        self.frame_buffer_sets
            + self.draw_buffer_sets
            + self.rasterizer_sets
            + self.blend_sets
            + self.depth_stencil_sets
            + self.texture_sets
            + self.image_texture_sets
            + self.uniform_buffer_sets
            + self.storage_buffer_sets
            + self.scissor_sets
            + self.viewport_sets
            + self.depth_range_sets
            + self.program_sets
    }
}

/// One recorded provider call
#[derive(Clone, Debug, PartialEq)]
pub enum ProviderCall {
    SetFrameBuffers {
        write: Option<FrameBufferId>,
        read: Option<FrameBufferId>,
    },
    SetDrawBuffer(DrawBuffer),
    SetRasterizerState(RasterizerStateId),
    SetBlendState(BlendStateId),
    SetDepthStencilState(DepthStencilStateId),
    SetTexture {
        unit: usize,
        texture: Option<TextureId>,
    },
    SetImageTexture {
        unit: usize,
        texture: Option<TextureId>,
    },
    SetUniformBuffer {
        index: usize,
        buffer: Option<BufferId>,
    },
    SetStorageBuffer {
        index: usize,
        buffer: Option<BufferId>,
    },
    SetScissor(Option<IntRect>),
    SetViewports(Vec<Rect>),
    SetDepthRanges(Vec<DepthRange>),
    SetProgram(ActiveProgram),
    Draw {
        primitives: PrimitivesType,
        vertices: usize,
        instances: usize,
    },
    Clear(Color),
    Flush,
}

/// What the backend currently has bound
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BoundState {
    pub write_frame_buffer: Option<FrameBufferId>,
    pub read_frame_buffer: Option<FrameBufferId>,
    pub draw_buffer: DrawBuffer,
    pub rasterizer: RasterizerStateDescription,
    pub blend: BlendStateDescription,
    pub blend_color: Color,
    pub sample_mask: u32,
    pub depth_stencil: DepthStencilStateDescription,
    pub stencil_ref: i32,
    pub textures: Vec<Option<TextureId>>,
    pub image_textures: Vec<Option<TextureId>>,
    pub uniform_buffers: Vec<Option<BufferId>>,
    pub storage_buffers: Vec<Option<BufferId>>,
    pub scissor: Option<IntRect>,
    pub viewports: Vec<Rect>,
    pub depth_ranges: Vec<DepthRange>,
    pub program: ActiveProgram,
    pub primitives_array: Option<PrimitivesArrayId>,
    pub elements: Option<BufferId>,
}

struct TextureSlot {
    pixels: PixelBuffer,
    filter: TextureFilter,
}

struct FrameBufferSlot {
    color: TextureId,
}

struct BufferSlot {
    kind: BufferKind,
    data: Vec<u8>,
}

#[derive(Default)]
struct ArraySlot {
    attributes: SmallVec<[Option<(BufferId, VertexAttribute)>; 8]>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RenderTarget {
    Window,
    Texture(TextureId),
}

pub struct SoftwareProvider {
    y_axis: TextureImageYAxis,
    window: PixelBuffer,
    textures: SlotMap<TextureId, TextureSlot>,
    frame_buffers: SlotMap<FrameBufferId, FrameBufferSlot>,
    buffers: SlotMap<BufferId, BufferSlot>,
    arrays: SlotMap<PrimitivesArrayId, ArraySlot>,
    rasterizer_states: SlotMap<RasterizerStateId, RasterizerStateDescription>,
    blend_states: SlotMap<BlendStateId, BlendStateDescription>,
    depth_stencil_states: SlotMap<DepthStencilStateId, DepthStencilStateDescription>,
    bound: BoundState,
    stats: ProviderStats,
    calls: Option<Vec<ProviderCall>>,
}

impl SoftwareProvider {
    /// A top-down backend with a window surface of `size`
    pub fn new(size: IntSize) -> Result<Self> {
        Self::with_y_axis(size, TextureImageYAxis::TopDown)
    }

    pub fn with_y_axis(size: IntSize, y_axis: TextureImageYAxis) -> Result<Self> {
        Ok(Self {
            y_axis,
            window: PixelBuffer::new(size, TextureFormat::Rgba8)?,
            textures: SlotMap::with_key(),
            frame_buffers: SlotMap::with_key(),
            buffers: SlotMap::with_key(),
            arrays: SlotMap::with_key(),
            rasterizer_states: SlotMap::with_key(),
            blend_states: SlotMap::with_key(),
            depth_stencil_states: SlotMap::with_key(),
            bound: BoundState::default(),
            stats: ProviderStats::default(),
            calls: None,
        })
    }

    /// Start recording calls
    pub fn enable_call_log(&mut self) {
        self.calls.get_or_insert_with(Vec::new);
    }

    pub fn calls(&self) -> &[ProviderCall] {
        self.calls.as_deref().unwrap_or(&[])
    }

    pub fn take_calls(&mut self) -> Vec<ProviderCall> {
        self.calls.as_mut().map(std::mem::take).unwrap_or_default()
    }

    pub fn stats(&self) -> ProviderStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = ProviderStats::default();
    }

    pub fn bound(&self) -> &BoundState {
        &self.bound
    }

    /// The window surface in native row order
    pub fn window(&self) -> &PixelBuffer {
        &self.window
    }

    pub fn texture_pixels(&self, texture: &Texture2D) -> Option<&PixelBuffer> {
        self.textures.get(texture.id).map(|slot| &slot.pixels)
    }

    pub fn texture_filter(&self, texture: &Texture2D) -> Option<TextureFilter> {
        self.textures.get(texture.id).map(|slot| slot.filter)
    }

    pub fn live_textures(&self) -> usize {
        self.textures.len()
    }

    pub fn live_buffers(&self, kind: BufferKind) -> usize {
        self.buffers.values().filter(|slot| slot.kind == kind).count()
    }

    fn log(&mut self, call: impl FnOnce() -> ProviderCall) {
        if let Some(calls) = &mut self.calls {
            calls.push(call());
        }
    }

    fn check_texture(&self, texture: Option<&Texture2D>) -> Result<Option<TextureId>> {
        match texture {
            Some(texture) if !self.textures.contains_key(texture.id) => {
                Err(GraphicsError::NullObject("texture"))
            }
            Some(texture) => Ok(Some(texture.id)),
            None => Ok(None),
        }
    }

    fn check_buffer(&self, buffer: Option<BufferId>) -> Result<Option<BufferId>> {
        match buffer {
            Some(id) if !self.buffers.contains_key(id) => Err(GraphicsError::NullObject("buffer")),
            other => Ok(other),
        }
    }

    // ─── Render targets ─────────────────────────────────────────────────

    fn frame_buffer_texture(&self, id: FrameBufferId) -> Result<TextureId> {
        let slot = self
            .frame_buffers
            .get(id)
            .ok_or(GraphicsError::NullObject("frame buffer"))?;
        if !self.textures.contains_key(slot.color) {
            return Err(GraphicsError::NullObject("frame buffer color texture"));
        }
        Ok(slot.color)
    }

    /// `None` when rendering is discarded
    fn write_target(&self) -> Result<Option<RenderTarget>> {
        match self.bound.write_frame_buffer {
            Some(id) => Ok(Some(RenderTarget::Texture(self.frame_buffer_texture(id)?))),
            None if self.bound.draw_buffer == DrawBuffer::None => Ok(None),
            None => Ok(Some(RenderTarget::Window)),
        }
    }

    fn target_pixels_mut(&mut self, target: RenderTarget) -> Option<&mut PixelBuffer> {
        match target {
            RenderTarget::Window => Some(&mut self.window),
            RenderTarget::Texture(id) => self.textures.get_mut(id).map(|slot| &mut slot.pixels),
        }
    }

    fn detach_target(&mut self, target: RenderTarget) -> PixelBuffer {
        self.target_pixels_mut(target)
            .map(|pixels| std::mem::replace(pixels, PixelBuffer::detached()))
            .unwrap_or_else(PixelBuffer::detached)
    }

    fn attach_target(&mut self, target: RenderTarget, pixels: PixelBuffer) {
        if let Some(slot) = self.target_pixels_mut(target) {
            *slot = pixels;
        }
    }

    fn clip_rect(&self, size: IntSize) -> IntRect {
        let bounds = IntRect::from_size(size);
        match self.bound.scissor {
            Some(scissor) => bounds.intersection(&scissor),
            None => bounds,
        }
    }

    // ─── Vertex processing ──────────────────────────────────────────────

    fn fetch_vertex(&self, array: &ArraySlot, index: usize) -> Result<Varyings> {
        let mut out = [[0.0, 0.0, 0.0, 1.0]; 4];
        for (location, slot) in out.iter_mut().enumerate() {
            let Some(Some((buffer_id, attribute))) = array.attributes.get(location) else {
                continue;
            };
            let buffer = self
                .buffers
                .get(*buffer_id)
                .ok_or(GraphicsError::NullObject("vertex buffer"))?;
            let size = attribute.data_type.size();
            let components = (attribute.components as usize).min(4);
            let stride = if attribute.stride == 0 {
                size * components
            } else {
                attribute.stride
            };
            let start = attribute.offset + index * stride;
            let bytes = buffer
                .data
                .get(start..start + size * components)
                .ok_or_else(|| {
                    GraphicsError::invalid_argument(format!(
                        "vertex {} reads past the end of its buffer",
                        index
                    ))
                })?;
            for (value, chunk) in slot.iter_mut().zip(bytes.chunks_exact(size)) {
                *value = decode_component(attribute, chunk);
            }
        }
        Ok(out)
    }

    fn to_device(&self, position: [f32; 4], viewport: &Rect) -> Option<DevicePoint> {
        let w = position[3];
        if w <= 0.0 || !w.is_finite() {
            return None;
        }
        let nx = (position[0] / w) as f64;
        let ny = (position[1] / w) as f64;
        let x = viewport.x as f64 + (nx + 1.0) * 0.5 * viewport.width as f64;
        let y = match self.y_axis {
            TextureImageYAxis::TopDown => viewport.y as f64 + (1.0 - ny) * 0.5 * viewport.height as f64,
            TextureImageYAxis::BottomUp => viewport.y as f64 + (ny + 1.0) * 0.5 * viewport.height as f64,
        };
        Some(DevicePoint { x, y })
    }

    fn is_culled(&self, a: DevicePoint, b: DevicePoint, c: DevicePoint) -> bool {
        let description = &self.bound.rasterizer;
        if !description.culled {
            return false;
        }
        let area = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
        // Counter-clockwise is judged with y pointing up
        let counter_clockwise = match self.y_axis {
            TextureImageYAxis::TopDown => area < 0.0,
            TextureImageYAxis::BottomUp => area > 0.0,
        };
        let front = counter_clockwise == (description.front_face == FrontFace::CounterClockwise);
        match description.cull_mode {
            CullMode::Front => front,
            CullMode::Back => !front,
            CullMode::FrontAndBack => true,
        }
    }

    // ─── Drawing ────────────────────────────────────────────────────────

    fn draw(&mut self, primitives: PrimitivesType, indices: &[usize], instances: usize) -> Result<()> {
        self.stats.draw_calls += 1;
        self.stats.vertices += indices.len() * instances;
        self.log(|| ProviderCall::Draw {
            primitives,
            vertices: indices.len(),
            instances,
        });

        let program = match self.bound.program {
            ActiveProgram::Standard(program) => program,
            ActiveProgram::None => {
                return Err(GraphicsError::invalid_argument("draw without a bound program"))
            }
            ActiveProgram::Explicit(_) => {
                return Err(GraphicsError::UnsupportedOperation("explicit program objects"))
            }
        };
        let array_id = self
            .bound
            .primitives_array
            .ok_or(GraphicsError::NullObject("primitives array"))?;
        let array = self
            .arrays
            .get(array_id)
            .ok_or(GraphicsError::NullObject("primitives array"))?;
        let vertices = indices
            .iter()
            .map(|&index| self.fetch_vertex(array, index))
            .collect::<Result<Vec<_>>>()?;

        let Some(target) = self.write_target()? else {
            return Ok(());
        };
        let mut pixels = self.detach_target(target);
        for _ in 0..instances {
            self.render(program, primitives, &vertices, &mut pixels);
        }
        self.attach_target(target, pixels);
        Ok(())
    }

    fn render(
        &self,
        program: StandardProgram,
        primitives: PrimitivesType,
        vertices: &[Varyings],
        target: &mut PixelBuffer,
    ) {
        let size = target.size();
        let clip = self.clip_rect(size);
        if clip.is_empty() {
            return;
        }
        let viewport = self
            .bound
            .viewports
            .first()
            .copied()
            .unwrap_or_else(|| Rect::from_size(Size::from(size)));
        let device: Vec<Option<DevicePoint>> = vertices
            .iter()
            .map(|vertex| self.to_device(vertex[0], &viewport))
            .collect();
        let texture_unit = |unit: usize| {
            self.bound
                .textures
                .get(unit)
                .copied()
                .flatten()
                .and_then(|id| self.textures.get(id))
                .map(|slot| &slot.pixels)
        };
        let mut fragment = |x: i32, y: i32, varyings: &Varyings| {
            if let Some(color) = shading::shade(program, varyings, texture_unit) {
                let dst = target.pixel(x, y);
                let out = shading::blend(&self.bound.blend, self.bound.blend_color, color, dst);
                target.set_pixel(x, y, out);
            }
        };

        for primitive in raster::assemble(primitives, vertices.len()) {
            match primitive {
                Primitive::Point(i) => {
                    if let Some(p) = device[i] {
                        raster::rasterize_point(p, clip, |x, y| fragment(x, y, &vertices[i]));
                    }
                }
                Primitive::Line(i, j) => {
                    if let (Some(a), Some(b)) = (device[i], device[j]) {
                        raster::rasterize_line(a, b, clip, |x, y, t| {
                            let varyings =
                                shading::interpolate(&[&vertices[i], &vertices[j]], &[1.0 - t, t]);
                            fragment(x, y, &varyings);
                        });
                    }
                }
                Primitive::Triangle(i, j, k) => {
                    let (Some(a), Some(b), Some(c)) = (device[i], device[j], device[k]) else {
                        continue;
                    };
                    if self.is_culled(a, b, c) {
                        continue;
                    }
                    match self.bound.rasterizer.fill_mode {
                        FillMode::Fill => {
                            raster::rasterize_triangle([a, b, c], clip, |x, y, weights| {
                                let varyings = shading::interpolate(
                                    &[&vertices[i], &vertices[j], &vertices[k]],
                                    &weights,
                                );
                                fragment(x, y, &varyings);
                            });
                        }
                        FillMode::Line => {
                            for (from, to, p, q) in [(i, j, a, b), (j, k, b, c), (k, i, c, a)] {
                                raster::rasterize_line(p, q, clip, |x, y, t| {
                                    let varyings = shading::interpolate(
                                        &[&vertices[from], &vertices[to]],
                                        &[1.0 - t, t],
                                    );
                                    fragment(x, y, &varyings);
                                });
                            }
                        }
                        FillMode::Point => {
                            for (index, p) in [(i, a), (j, b), (k, c)] {
                                raster::rasterize_point(p, clip, |x, y| {
                                    fragment(x, y, &vertices[index])
                                });
                            }
                        }
                    }
                }
            }
        }
    }

    fn element_indices(
        &self,
        count: usize,
        indices: IndicesType,
        offset: usize,
    ) -> Result<Vec<usize>> {
        let elements = self
            .bound
            .elements
            .ok_or(GraphicsError::NullObject("element buffer"))?;
        let buffer = self
            .buffers
            .get(elements)
            .ok_or(GraphicsError::NullObject("element buffer"))?;
        let size = indices.size();
        let bytes = buffer
            .data
            .get(offset..offset + count * size)
            .ok_or_else(|| {
                GraphicsError::invalid_argument(format!(
                    "{} indices at {} overrun the element buffer",
                    count, offset
                ))
            })?;
        Ok(bytes
            .chunks_exact(size)
            .map(|chunk| match indices {
                IndicesType::UnsignedByte => chunk[0] as usize,
                IndicesType::UnsignedShort => u16::from_ne_bytes([chunk[0], chunk[1]]) as usize,
                IndicesType::UnsignedInt => {
                    u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]) as usize
                }
            })
            .collect())
    }
}

fn decode_component(attribute: &VertexAttribute, bytes: &[u8]) -> f32 {
    match attribute.data_type {
        VertexAttributeDataType::Float => f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
        VertexAttributeDataType::Int => {
            i32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as f32
        }
        VertexAttributeDataType::UnsignedShort => {
            let value = u16::from_ne_bytes([bytes[0], bytes[1]]) as f32;
            if attribute.normalize {
                value / u16::MAX as f32
            } else {
                value
            }
        }
        VertexAttributeDataType::UnsignedByte => {
            let value = bytes[0] as f32;
            if attribute.normalize {
                value / u8::MAX as f32
            } else {
                value
            }
        }
    }
}

impl GraphicContextProvider for SoftwareProvider {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn name(&self) -> &str {
        "software"
    }

    fn max_attributes(&self) -> usize {
        MAX_ATTRIBUTES
    }

    fn texture_image_y_axis(&self) -> TextureImageYAxis {
        self.y_axis
    }

    fn shader_language(&self) -> ShaderLanguage {
        ShaderLanguage::FixedFunction
    }

    fn clip_z_range(&self) -> ClipZRange {
        ClipZRange::NegativePositiveW
    }

    fn create_texture(
        &mut self,
        size: IntSize,
        format: TextureFormat,
        filter: TextureFilter,
    ) -> Result<Texture2D> {
        let pixels = PixelBuffer::new(size, format)?;
        let id = self.textures.insert(TextureSlot { pixels, filter });
        Ok(Texture2D { id, size, format })
    }

    fn upload_texture(
        &mut self,
        texture: &Texture2D,
        dest: IntPoint,
        pixels: &PixelBuffer,
        src_rect: IntRect,
    ) -> Result<()> {
        let slot = self
            .textures
            .get_mut(texture.id)
            .ok_or(GraphicsError::NullObject("texture"))?;
        slot.pixels.copy_from(pixels, src_rect, dest)?;
        self.stats.texture_uploads += 1;
        Ok(())
    }

    fn delete_texture(&mut self, texture: &Texture2D) -> Result<()> {
        self.textures
            .remove(texture.id)
            .map(|_| ())
            .ok_or(GraphicsError::NullObject("texture"))
    }

    fn create_frame_buffer(&mut self, color: &Texture2D) -> Result<FrameBuffer> {
        if !self.textures.contains_key(color.id) {
            return Err(GraphicsError::NullObject("texture"));
        }
        let id = self.frame_buffers.insert(FrameBufferSlot { color: color.id });
        Ok(FrameBuffer {
            id,
            color: color.id,
            size: color.size,
        })
    }

    fn delete_frame_buffer(&mut self, frame_buffer: &FrameBuffer) -> Result<()> {
        self.frame_buffers
            .remove(frame_buffer.id)
            .map(|_| ())
            .ok_or(GraphicsError::NullObject("frame buffer"))
    }

    fn create_buffer(
        &mut self,
        kind: BufferKind,
        size: usize,
        _usage: BufferUsage,
    ) -> Result<BufferId> {
        Ok(self.buffers.insert(BufferSlot {
            kind,
            data: vec![0; size],
        }))
    }

    fn upload_buffer(&mut self, buffer: BufferId, offset: usize, data: &[u8]) -> Result<()> {
        let slot = self
            .buffers
            .get_mut(buffer)
            .ok_or(GraphicsError::NullObject("buffer"))?;
        let target = slot.data.get_mut(offset..offset + data.len()).ok_or_else(|| {
            GraphicsError::invalid_argument(format!(
                "upload of {} bytes at {} overruns the buffer",
                data.len(),
                offset
            ))
        })?;
        target.copy_from_slice(data);
        self.stats.buffer_uploads += 1;
        Ok(())
    }

    fn delete_buffer(&mut self, buffer: BufferId) -> Result<()> {
        self.buffers
            .remove(buffer)
            .map(|_| ())
            .ok_or(GraphicsError::NullObject("buffer"))
    }

    fn create_primitives_array(&mut self) -> Result<PrimitivesArray> {
        Ok(PrimitivesArray {
            id: self.arrays.insert(ArraySlot::default()),
        })
    }

    fn set_attribute(
        &mut self,
        array: &PrimitivesArray,
        index: usize,
        buffer: &VertexArrayBuffer,
        attribute: VertexAttribute,
    ) -> Result<()> {
        if index >= MAX_ATTRIBUTES {
            return Err(GraphicsError::invalid_argument(format!(
                "attribute index {} is outside 0..{}",
                index, MAX_ATTRIBUTES
            )));
        }
        if !self.buffers.contains_key(buffer.id) {
            return Err(GraphicsError::NullObject("vertex buffer"));
        }
        let slot = self
            .arrays
            .get_mut(array.id)
            .ok_or(GraphicsError::NullObject("primitives array"))?;
        if slot.attributes.len() <= index {
            slot.attributes.resize(index + 1, None);
        }
        slot.attributes[index] = Some((buffer.id, attribute));
        Ok(())
    }

    fn delete_primitives_array(&mut self, array: &PrimitivesArray) -> Result<()> {
        self.arrays
            .remove(array.id)
            .map(|_| ())
            .ok_or(GraphicsError::NullObject("primitives array"))
    }

    fn create_program_object(&mut self, _source: &ProgramSource) -> Result<ProgramObject> {
        Err(GraphicsError::UnsupportedOperation("program compilation"))
    }

    fn create_rasterizer_state(
        &mut self,
        description: &RasterizerStateDescription,
    ) -> Result<RasterizerState> {
        Ok(RasterizerState {
            id: self.rasterizer_states.insert(*description),
            description: *description,
        })
    }

    fn create_blend_state(&mut self, description: &BlendStateDescription) -> Result<BlendState> {
        Ok(BlendState {
            id: self.blend_states.insert(*description),
            description: *description,
        })
    }

    fn create_depth_stencil_state(
        &mut self,
        description: &DepthStencilStateDescription,
    ) -> Result<DepthStencilState> {
        Ok(DepthStencilState {
            id: self.depth_stencil_states.insert(*description),
            description: *description,
        })
    }

    fn set_frame_buffers(
        &mut self,
        write: Option<&FrameBuffer>,
        read: Option<&FrameBuffer>,
    ) -> Result<()> {
        for frame_buffer in write.iter().chain(read.iter()) {
            self.frame_buffer_texture(frame_buffer.id)?;
        }
        self.stats.frame_buffer_sets += 1;
        self.bound.write_frame_buffer = write.map(|fb| fb.id);
        self.bound.read_frame_buffer = read.map(|fb| fb.id);
        let (write, read) = (self.bound.write_frame_buffer, self.bound.read_frame_buffer);
        self.log(|| ProviderCall::SetFrameBuffers { write, read });
        Ok(())
    }

    fn set_draw_buffer(&mut self, buffer: DrawBuffer) -> Result<()> {
        self.stats.draw_buffer_sets += 1;
        self.bound.draw_buffer = buffer;
        self.log(|| ProviderCall::SetDrawBuffer(buffer));
        Ok(())
    }

    fn set_rasterizer_state(&mut self, state: &RasterizerState) -> Result<()> {
        let description = self
            .rasterizer_states
            .get(state.id)
            .copied()
            .ok_or(GraphicsError::NullObject("rasterizer state"))?;
        self.stats.rasterizer_sets += 1;
        self.bound.rasterizer = description;
        self.log(|| ProviderCall::SetRasterizerState(state.id));
        Ok(())
    }

    fn set_blend_state(&mut self, state: &BlendState, color: Color, sample_mask: u32) -> Result<()> {
        let description = self
            .blend_states
            .get(state.id)
            .copied()
            .ok_or(GraphicsError::NullObject("blend state"))?;
        self.stats.blend_sets += 1;
        self.bound.blend = description;
        self.bound.blend_color = color;
        self.bound.sample_mask = sample_mask;
        self.log(|| ProviderCall::SetBlendState(state.id));
        Ok(())
    }

    fn set_depth_stencil_state(&mut self, state: &DepthStencilState, stencil_ref: i32) -> Result<()> {
        let description = self
            .depth_stencil_states
            .get(state.id)
            .copied()
            .ok_or(GraphicsError::NullObject("depth stencil state"))?;
        self.stats.depth_stencil_sets += 1;
        self.bound.depth_stencil = description;
        self.bound.stencil_ref = stencil_ref;
        self.log(|| ProviderCall::SetDepthStencilState(state.id));
        Ok(())
    }

    fn set_texture(&mut self, unit: usize, texture: Option<&Texture2D>) -> Result<()> {
        let texture = self.check_texture(texture)?;
        self.stats.texture_sets += 1;
        set_binding(&mut self.bound.textures, unit, texture);
        self.log(|| ProviderCall::SetTexture { unit, texture });
        Ok(())
    }

    fn set_image_texture(&mut self, unit: usize, texture: Option<&Texture2D>) -> Result<()> {
        let texture = self.check_texture(texture)?;
        self.stats.image_texture_sets += 1;
        set_binding(&mut self.bound.image_textures, unit, texture);
        self.log(|| ProviderCall::SetImageTexture { unit, texture });
        Ok(())
    }

    fn set_uniform_buffer(&mut self, index: usize, buffer: Option<&UniformBuffer>) -> Result<()> {
        let buffer = self.check_buffer(buffer.map(|b| b.id))?;
        self.stats.uniform_buffer_sets += 1;
        set_binding(&mut self.bound.uniform_buffers, index, buffer);
        self.log(|| ProviderCall::SetUniformBuffer { index, buffer });
        Ok(())
    }

    fn set_storage_buffer(&mut self, index: usize, buffer: Option<&StorageBuffer>) -> Result<()> {
        let buffer = self.check_buffer(buffer.map(|b| b.id))?;
        self.stats.storage_buffer_sets += 1;
        set_binding(&mut self.bound.storage_buffers, index, buffer);
        self.log(|| ProviderCall::SetStorageBuffer { index, buffer });
        Ok(())
    }

    fn set_scissor(&mut self, rect: Option<IntRect>) -> Result<()> {
        self.stats.scissor_sets += 1;
        self.bound.scissor = rect;
        self.log(|| ProviderCall::SetScissor(rect));
        Ok(())
    }

    fn set_viewports(&mut self, viewports: &[Rect]) -> Result<()> {
        self.stats.viewport_sets += 1;
        self.bound.viewports = viewports.to_vec();
        self.log(|| ProviderCall::SetViewports(viewports.to_vec()));
        Ok(())
    }

    fn set_depth_ranges(&mut self, ranges: &[DepthRange]) -> Result<()> {
        self.stats.depth_range_sets += 1;
        self.bound.depth_ranges = ranges.to_vec();
        self.log(|| ProviderCall::SetDepthRanges(ranges.to_vec()));
        Ok(())
    }

    fn set_program(&mut self, program: ActiveProgram) -> Result<()> {
        if let ActiveProgram::Explicit(_) = program {
            return Err(GraphicsError::UnsupportedOperation("explicit program objects"));
        }
        self.stats.program_sets += 1;
        self.bound.program = program;
        self.log(|| ProviderCall::SetProgram(program));
        Ok(())
    }

    fn set_primitives_array(&mut self, array: Option<&PrimitivesArray>) -> Result<()> {
        if let Some(array) = array {
            if !self.arrays.contains_key(array.id) {
                return Err(GraphicsError::NullObject("primitives array"));
            }
        }
        self.bound.primitives_array = array.map(|a| a.id);
        Ok(())
    }

    fn draw_primitives_array(
        &mut self,
        primitives: PrimitivesType,
        offset: usize,
        count: usize,
    ) -> Result<()> {
        self.draw_primitives_array_instanced(primitives, offset, count, 1)
    }

    fn draw_primitives_array_instanced(
        &mut self,
        primitives: PrimitivesType,
        offset: usize,
        count: usize,
        instances: usize,
    ) -> Result<()> {
        let indices: Vec<usize> = (offset..offset + count).collect();
        self.draw(primitives, &indices, instances)
    }

    fn set_primitives_elements(&mut self, elements: Option<&ElementArrayBuffer>) -> Result<()> {
        self.bound.elements = self.check_buffer(elements.map(|e| e.id))?;
        Ok(())
    }

    fn draw_primitives_elements(
        &mut self,
        primitives: PrimitivesType,
        count: usize,
        indices: IndicesType,
        offset: usize,
    ) -> Result<()> {
        self.draw_primitives_elements_instanced(primitives, count, indices, offset, 1)
    }

    fn draw_primitives_elements_instanced(
        &mut self,
        primitives: PrimitivesType,
        count: usize,
        indices: IndicesType,
        offset: usize,
        instances: usize,
    ) -> Result<()> {
        let indices = self.element_indices(count, indices, offset)?;
        self.draw(primitives, &indices, instances)
    }

    fn clear(&mut self, color: Color) -> Result<()> {
        self.stats.clears += 1;
        self.log(|| ProviderCall::Clear(color));
        let Some(target) = self.write_target()? else {
            return Ok(());
        };
        let value = color.to_array();
        let mut pixels = self.detach_target(target);
        let clip = self.clip_rect(pixels.size());
        for y in clip.y..clip.bottom() {
            for x in clip.x..clip.right() {
                pixels.set_pixel(x, y, value);
            }
        }
        self.attach_target(target, pixels);
        Ok(())
    }

    fn clear_depth(&mut self, _value: f32) -> Result<()> {
        self.stats.clears += 1;
        Ok(())
    }

    fn clear_stencil(&mut self, _value: i32) -> Result<()> {
        self.stats.clears += 1;
        Ok(())
    }

    fn dispatch(&mut self, _x: u32, _y: u32, _z: u32) -> Result<()> {
        Err(GraphicsError::UnsupportedOperation("compute dispatch"))
    }

    fn get_pixeldata(&mut self, rect: IntRect, format: TextureFormat) -> Result<PixelBuffer> {
        let source = match self.bound.read_frame_buffer {
            Some(id) => {
                let texture = self.frame_buffer_texture(id)?;
                &self
                    .textures
                    .get(texture)
                    .ok_or(GraphicsError::NullObject("frame buffer color texture"))?
                    .pixels
            }
            None => &self.window,
        };
        let mut out = PixelBuffer::new(rect.size(), format)?;
        out.copy_from(source, rect, IntPoint::new(0, 0))?;
        Ok(out)
    }

    fn flush(&mut self) -> Result<()> {
        self.stats.flushes += 1;
        self.log(|| ProviderCall::Flush);
        Ok(())
    }

    fn make_current(&mut self) -> Result<()> {
        Ok(())
    }

    fn on_window_resized(&mut self, size: IntSize) -> Result<()> {
        tracing::debug!(width = size.width, height = size.height, "software surface resized");
        self.window = PixelBuffer::new(size, TextureFormat::Rgba8)?;
        Ok(())
    }
}
