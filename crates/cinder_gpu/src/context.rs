//! Graphic context: one logical rendering view onto a shared screen
//!
//! Every setter mutates the context's own state record and then notifies the
//! screen, which decides between a delta push and a full resync. Draws make
//! the record resident first.

use std::cell::{Ref, RefCell, RefMut};
use std::rc::Rc;

use cinder_core::{ClipZRange, Color, GraphicsError, IntPoint, IntRect, IntSize, Rect, Result};

use crate::description::{
    BlendStateDescription, DepthRange, DepthStencilStateDescription, DrawBuffer, IndicesType,
    PrimitivesType, RasterizerStateDescription, ShaderLanguage, TextureImageYAxis,
    VertexAttribute,
};
use crate::pixel_buffer::PixelBuffer;
use crate::program::{ActiveProgram, ProgramSource};
use crate::provider::GraphicContextProvider;
use crate::resources::{
    BlendState, BufferId, BufferKind, BufferUsage, DepthStencilState, ElementArrayBuffer, FrameBuffer,
    PrimitivesArray, ProgramObject, RasterizerState, StorageBuffer, Texture2D, TextureFilter,
    TextureFormat, UniformBuffer, VertexArrayBuffer,
};
use crate::screen::GraphicScreen;
use crate::state::{
    check_binding_index, set_binding, DefaultStates, GraphicContextState, StateId,
    MAX_BINDING_INDEX,
};

struct ContextInner {
    id: StateId,
    state: GraphicContextState,
    screen: Rc<RefCell<GraphicScreen>>,
    /// Contexts of this screen dropped while it was borrowed
    orphans: Rc<RefCell<Vec<StateId>>>,
    /// Reset targets captured at construction
    defaults: DefaultStates,
}

/// Borrow the screen, first retiring contexts dropped while it was busy
fn lock_screen<'a>(
    screen: &'a RefCell<GraphicScreen>,
    orphans: &RefCell<Vec<StateId>>,
) -> RefMut<'a, GraphicScreen> {
    let mut screen = screen.borrow_mut();
    let retired = std::mem::take(&mut *orphans.borrow_mut());
    for id in retired {
        if let Err(err) = screen.state_destroyed(id) {
            tracing::warn!("failed to reset state of destroyed context: {}", err);
        }
    }
    screen
}

impl ContextInner {
    fn notify(
        &self,
        f: impl FnOnce(&mut GraphicScreen, StateId, &GraphicContextState) -> Result<()>,
    ) -> Result<()> {
        let mut screen = lock_screen(&self.screen, &self.orphans);
        f(&mut screen, self.id, &self.state)
    }
}

impl Drop for ContextInner {
    fn drop(&mut self) {
        match self.screen.try_borrow_mut() {
            Ok(mut screen) => {
                if let Err(err) = screen.state_destroyed(self.id) {
                    tracing::warn!("failed to reset state of destroyed context: {}", err);
                }
            }
            Err(_) => {
                tracing::debug!(id = ?self.id, "screen busy, deferring reset of destroyed context");
                self.orphans.borrow_mut().push(self.id);
            }
        }
    }
}

/// Handle onto one context
///
/// Clones share the same context. Use [`create`](Self::create) or
/// [`duplicate`](Self::duplicate) for a separate view on the same screen.
#[derive(Clone)]
pub struct GraphicContext {
    inner: Rc<RefCell<ContextInner>>,
}

impl GraphicContext {
    /// Create a screen over `provider` and its first context
    pub fn new(provider: Box<dyn GraphicContextProvider>, window_size: IntSize) -> Result<Self> {
        if !window_size.is_positive() {
            return Err(GraphicsError::invalid_argument(format!(
                "window size {}x{} must be positive",
                window_size.width, window_size.height
            )));
        }
        let screen = GraphicScreen::new(provider, window_size)?;
        let orphans = Rc::new(RefCell::new(Vec::new()));
        Ok(Self::from_screen(Rc::new(RefCell::new(screen)), orphans, None))
    }

    fn from_screen(
        screen: Rc<RefCell<GraphicScreen>>,
        orphans: Rc<RefCell<Vec<StateId>>>,
        state: Option<GraphicContextState>,
    ) -> Self {
        let (id, defaults) = {
            let mut screen = lock_screen(&screen, &orphans);
            (screen.allocate_state_id(), *screen.defaults())
        };
        let state = state.unwrap_or_else(|| GraphicContextState::new(&defaults));
        Self {
            inner: Rc::new(RefCell::new(ContextInner {
                id,
                state,
                screen,
                orphans,
                defaults,
            })),
        }
    }

    /// A new context on the same screen, starting from default state
    pub fn create(&self) -> Self {
        let inner = self.inner.borrow();
        Self::from_screen(inner.screen.clone(), inner.orphans.clone(), None)
    }

    /// A new context on the same screen with a copy of this state
    pub fn duplicate(&self) -> Self {
        let inner = self.inner.borrow();
        Self::from_screen(
            inner.screen.clone(),
            inner.orphans.clone(),
            Some(inner.state.clone()),
        )
    }

    pub fn ptr_eq(&self, other: &GraphicContext) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    pub fn id(&self) -> StateId {
        self.inner.borrow().id
    }

    pub fn state(&self) -> Ref<'_, GraphicContextState> {
        Ref::map(self.inner.borrow(), |inner| &inner.state)
    }

    /// This context's state is the one resident on the driver
    pub fn is_active(&self) -> bool {
        let inner = self.inner.borrow();
        let active = inner.screen.borrow().is_active(inner.id);
        active
    }

    /// Whether `other` renders through the same screen
    pub fn shares_screen(&self, other: &GraphicContext) -> bool {
        Rc::ptr_eq(&self.inner.borrow().screen, &other.inner.borrow().screen)
    }

    // ─── Provider access ────────────────────────────────────────────────

    fn with_screen<R>(&self, f: impl FnOnce(&mut GraphicScreen) -> Result<R>) -> Result<R> {
        let inner = self.inner.borrow();
        let mut screen = lock_screen(&inner.screen, &inner.orphans);
        f(&mut screen)
    }

    fn with_raw_provider<R>(
        &self,
        f: impl FnOnce(&mut dyn GraphicContextProvider) -> Result<R>,
    ) -> Result<R> {
        self.with_screen(|screen| f(screen.provider_mut()))
    }

    /// Make this state resident, then run `f` on the provider
    fn with_active_provider<R>(
        &self,
        f: impl FnOnce(&mut dyn GraphicContextProvider) -> Result<R>,
    ) -> Result<R> {
        let inner = self.inner.borrow();
        let mut screen = lock_screen(&inner.screen, &inner.orphans);
        screen.set_active(inner.id, &inner.state)?;
        f(screen.provider_mut())
    }

    /// Run `f` on the backend if it is a `T`
    pub fn with_provider<T: 'static, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let inner = self.inner.borrow();
        let screen = inner.screen.borrow();
        let result = screen.provider().as_any().downcast_ref::<T>().map(f);
        result
    }

    pub fn with_provider_mut<T: 'static, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let inner = self.inner.borrow();
        let mut screen = lock_screen(&inner.screen, &inner.orphans);
        let result = screen
            .provider_mut()
            .as_any_mut()
            .downcast_mut::<T>()
            .map(f);
        result
    }

    // ─── Queries ────────────────────────────────────────────────────────

    /// Frame buffer size when one is attached, otherwise the window size
    pub fn size(&self) -> IntSize {
        let inner = self.inner.borrow();
        let size = match inner.state.write_frame_buffer {
            Some(frame_buffer) => frame_buffer.size,
            None => inner.screen.borrow().window_size(),
        };
        size
    }

    pub fn width(&self) -> i32 {
        self.size().width
    }

    pub fn height(&self) -> i32 {
        self.size().height
    }

    pub fn window_size(&self) -> IntSize {
        self.inner.borrow().screen.borrow().window_size()
    }

    pub fn frame_buffer(&self) -> Option<FrameBuffer> {
        self.inner.borrow().state.write_frame_buffer
    }

    pub fn has_frame_buffer(&self) -> bool {
        self.frame_buffer().is_some()
    }

    pub fn max_attributes(&self) -> usize {
        self.inner.borrow().screen.borrow().max_attributes()
    }

    pub fn texture_image_y_axis(&self) -> TextureImageYAxis {
        self.inner
            .borrow()
            .screen
            .borrow()
            .provider()
            .texture_image_y_axis()
    }

    pub fn shader_language(&self) -> ShaderLanguage {
        self.inner.borrow().screen.borrow().provider().shader_language()
    }

    pub fn clip_z_range(&self) -> ClipZRange {
        self.inner.borrow().screen.borrow().provider().clip_z_range()
    }

    pub fn viewports(&self) -> Vec<Rect> {
        self.inner.borrow().state.viewports.clone()
    }

    pub fn scissor(&self) -> Option<IntRect> {
        self.inner.borrow().state.scissor
    }

    pub fn program(&self) -> ActiveProgram {
        self.inner.borrow().state.program
    }

    pub fn texture(&self, index: usize) -> Option<Texture2D> {
        self.inner.borrow().state.texture(index)
    }

    pub fn default_states(&self) -> DefaultStates {
        self.inner.borrow().defaults
    }

    // ─── Resources ──────────────────────────────────────────────────────

    pub fn create_texture(
        &self,
        size: IntSize,
        format: TextureFormat,
        filter: TextureFilter,
    ) -> Result<Texture2D> {
        check_size("texture", size)?;
        self.with_raw_provider(|provider| provider.create_texture(size, format, filter))
    }

    /// Create a texture holding a copy of `pixels`
    pub fn create_texture_from_pixels(
        &self,
        pixels: &PixelBuffer,
        filter: TextureFilter,
    ) -> Result<Texture2D> {
        let texture = self.create_texture(pixels.size(), pixels.format(), filter)?;
        self.upload_texture(&texture, IntPoint::new(0, 0), pixels, pixels.bounds())?;
        Ok(texture)
    }

    pub fn upload_texture(
        &self,
        texture: &Texture2D,
        dest: IntPoint,
        pixels: &PixelBuffer,
        src_rect: IntRect,
    ) -> Result<()> {
        self.with_raw_provider(|provider| provider.upload_texture(texture, dest, pixels, src_rect))
    }

    pub fn delete_texture(&self, texture: &Texture2D) -> Result<()> {
        self.with_raw_provider(|provider| provider.delete_texture(texture))
    }

    pub fn create_frame_buffer(&self, color: &Texture2D) -> Result<FrameBuffer> {
        check_size("frame buffer", color.size)?;
        self.with_raw_provider(|provider| provider.create_frame_buffer(color))
    }

    pub fn delete_frame_buffer(&self, frame_buffer: &FrameBuffer) -> Result<()> {
        self.with_raw_provider(|provider| provider.delete_frame_buffer(frame_buffer))
    }

    pub fn create_vertex_buffer(&self, size: usize, usage: BufferUsage) -> Result<VertexArrayBuffer> {
        let id = self.create_buffer(BufferKind::Vertex, size, usage)?;
        Ok(VertexArrayBuffer { id, size })
    }

    pub fn upload_vertex_buffer(
        &self,
        buffer: &VertexArrayBuffer,
        offset: usize,
        data: &[u8],
    ) -> Result<()> {
        self.upload_buffer(buffer.id, buffer.size, offset, data)
    }

    pub fn create_element_buffer(
        &self,
        size: usize,
        usage: BufferUsage,
    ) -> Result<ElementArrayBuffer> {
        let id = self.create_buffer(BufferKind::Element, size, usage)?;
        Ok(ElementArrayBuffer { id, size })
    }

    pub fn upload_element_buffer(
        &self,
        buffer: &ElementArrayBuffer,
        offset: usize,
        data: &[u8],
    ) -> Result<()> {
        self.upload_buffer(buffer.id, buffer.size, offset, data)
    }

    pub fn create_uniform_buffer(&self, size: usize, usage: BufferUsage) -> Result<UniformBuffer> {
        let id = self.create_buffer(BufferKind::Uniform, size, usage)?;
        Ok(UniformBuffer { id, size })
    }

    pub fn upload_uniform_buffer(
        &self,
        buffer: &UniformBuffer,
        offset: usize,
        data: &[u8],
    ) -> Result<()> {
        self.upload_buffer(buffer.id, buffer.size, offset, data)
    }

    pub fn create_storage_buffer(&self, size: usize, usage: BufferUsage) -> Result<StorageBuffer> {
        let id = self.create_buffer(BufferKind::Storage, size, usage)?;
        Ok(StorageBuffer { id, size })
    }

    pub fn upload_storage_buffer(
        &self,
        buffer: &StorageBuffer,
        offset: usize,
        data: &[u8],
    ) -> Result<()> {
        self.upload_buffer(buffer.id, buffer.size, offset, data)
    }

    fn create_buffer(
        &self,
        kind: BufferKind,
        size: usize,
        usage: BufferUsage,
    ) -> Result<BufferId> {
        if size == 0 {
            return Err(GraphicsError::invalid_argument(format!(
                "{:?} buffer size must be positive",
                kind
            )));
        }
        self.with_raw_provider(|provider| provider.create_buffer(kind, size, usage))
    }

    fn upload_buffer(
        &self,
        id: BufferId,
        capacity: usize,
        offset: usize,
        data: &[u8],
    ) -> Result<()> {
        if offset.checked_add(data.len()).map_or(true, |end| end > capacity) {
            return Err(GraphicsError::invalid_argument(format!(
                "upload of {} bytes at {} overruns buffer of {} bytes",
                data.len(),
                offset,
                capacity
            )));
        }
        self.with_raw_provider(|provider| provider.upload_buffer(id, offset, data))
    }

    pub fn delete_buffer(&self, id: BufferId) -> Result<()> {
        self.with_raw_provider(|provider| provider.delete_buffer(id))
    }

    pub fn create_primitives_array(&self) -> Result<PrimitivesArray> {
        self.with_raw_provider(|provider| provider.create_primitives_array())
    }

    pub fn set_attribute(
        &self,
        array: &PrimitivesArray,
        index: usize,
        buffer: &VertexArrayBuffer,
        attribute: VertexAttribute,
    ) -> Result<()> {
        let max = self.max_attributes();
        if index >= max {
            return Err(GraphicsError::invalid_argument(format!(
                "attribute index {} is outside 0..{}",
                index, max
            )));
        }
        if attribute.components == 0 || attribute.components > 4 {
            return Err(GraphicsError::invalid_argument(format!(
                "attribute has {} components, expected 1 to 4",
                attribute.components
            )));
        }
        self.with_raw_provider(|provider| provider.set_attribute(array, index, buffer, attribute))
    }

    pub fn delete_primitives_array(&self, array: &PrimitivesArray) -> Result<()> {
        self.with_raw_provider(|provider| provider.delete_primitives_array(array))
    }

    pub fn create_program_object(&self, source: &ProgramSource) -> Result<ProgramObject> {
        self.with_raw_provider(|provider| provider.create_program_object(source))
    }

    /// Equal descriptions return the same state object
    pub fn create_rasterizer_state(
        &self,
        description: &RasterizerStateDescription,
    ) -> Result<RasterizerState> {
        self.with_screen(|screen| screen.rasterizer_state(description))
    }

    pub fn create_blend_state(&self, description: &BlendStateDescription) -> Result<BlendState> {
        self.with_screen(|screen| screen.blend_state(description))
    }

    pub fn create_depth_stencil_state(
        &self,
        description: &DepthStencilStateDescription,
    ) -> Result<DepthStencilState> {
        self.with_screen(|screen| screen.depth_stencil_state(description))
    }

    // ─── Frame buffers ──────────────────────────────────────────────────

    pub fn set_frame_buffer(&self, frame_buffer: &FrameBuffer) -> Result<()> {
        self.set_frame_buffers(Some(frame_buffer), Some(frame_buffer))
    }

    pub fn set_frame_buffers(
        &self,
        write: Option<&FrameBuffer>,
        read: Option<&FrameBuffer>,
    ) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        inner.state.write_frame_buffer = write.copied();
        inner.state.read_frame_buffer = read.copied();
        inner.notify(|screen, id, state| screen.on_frame_buffer_changed(id, state))
    }

    pub fn reset_frame_buffer(&self) -> Result<()> {
        self.set_frame_buffers(None, None)
    }

    pub fn set_draw_buffer(&self, buffer: DrawBuffer) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        inner.state.draw_buffer = buffer;
        inner.notify(|screen, id, state| screen.on_draw_buffer_changed(id, state))
    }

    // ─── Bindings ───────────────────────────────────────────────────────

    pub fn set_texture(&self, index: usize, texture: &Texture2D) -> Result<()> {
        self.bind_texture(index, Some(*texture))
    }

    pub fn reset_texture(&self, index: usize) -> Result<()> {
        self.bind_texture(index, None)
    }

    fn bind_texture(&self, index: usize, texture: Option<Texture2D>) -> Result<()> {
        check_binding_index("texture", index)?;
        let mut inner = self.inner.borrow_mut();
        set_binding(&mut inner.state.textures, index, texture);
        inner.notify(|screen, id, state| screen.on_texture_changed(id, state, index))
    }

    /// Bind `textures` to units `0..textures.len()`
    pub fn set_textures(&self, textures: &[Texture2D]) -> Result<()> {
        if textures.len() > MAX_BINDING_INDEX + 1 {
            return Err(GraphicsError::invalid_argument(format!(
                "{} textures exceed the binding limit",
                textures.len()
            )));
        }
        let mut inner = self.inner.borrow_mut();
        for (index, texture) in textures.iter().enumerate() {
            set_binding(&mut inner.state.textures, index, Some(*texture));
        }
        inner.notify(|screen, id, state| screen.on_textures_changed(id, state))
    }

    /// Unbind units `0..count`
    pub fn reset_textures(&self, count: usize) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        let count = count.min(inner.state.textures.len());
        for index in 0..count {
            set_binding(&mut inner.state.textures, index, None);
        }
        inner.notify(|screen, id, state| screen.on_textures_changed(id, state))
    }

    pub fn set_image_texture(&self, index: usize, texture: &Texture2D) -> Result<()> {
        self.bind_image_texture(index, Some(*texture))
    }

    pub fn reset_image_texture(&self, index: usize) -> Result<()> {
        self.bind_image_texture(index, None)
    }

    fn bind_image_texture(&self, index: usize, texture: Option<Texture2D>) -> Result<()> {
        check_binding_index("image texture", index)?;
        let mut inner = self.inner.borrow_mut();
        set_binding(&mut inner.state.image_textures, index, texture);
        inner.notify(|screen, id, state| screen.on_image_texture_changed(id, state, index))
    }

    pub fn set_uniform_buffer(&self, index: usize, buffer: &UniformBuffer) -> Result<()> {
        self.bind_uniform_buffer(index, Some(*buffer))
    }

    pub fn reset_uniform_buffer(&self, index: usize) -> Result<()> {
        self.bind_uniform_buffer(index, None)
    }

    fn bind_uniform_buffer(&self, index: usize, buffer: Option<UniformBuffer>) -> Result<()> {
        check_binding_index("uniform buffer", index)?;
        let mut inner = self.inner.borrow_mut();
        set_binding(&mut inner.state.uniform_buffers, index, buffer);
        inner.notify(|screen, id, state| screen.on_uniform_buffer_changed(id, state, index))
    }

    pub fn set_storage_buffer(&self, index: usize, buffer: &StorageBuffer) -> Result<()> {
        self.bind_storage_buffer(index, Some(*buffer))
    }

    pub fn reset_storage_buffer(&self, index: usize) -> Result<()> {
        self.bind_storage_buffer(index, None)
    }

    fn bind_storage_buffer(&self, index: usize, buffer: Option<StorageBuffer>) -> Result<()> {
        check_binding_index("storage buffer", index)?;
        let mut inner = self.inner.borrow_mut();
        set_binding(&mut inner.state.storage_buffers, index, buffer);
        inner.notify(|screen, id, state| screen.on_storage_buffer_changed(id, state, index))
    }

    // ─── Geometry ───────────────────────────────────────────────────────

    /// Enable the scissor
    ///
    /// `y_axis` names the convention `rect` is expressed in; it is converted
    /// when the backend uses the other one.
    pub fn set_scissor(&self, rect: IntRect, y_axis: TextureImageYAxis) -> Result<()> {
        if rect.width < 0 || rect.height < 0 {
            return Err(GraphicsError::invalid_argument(format!(
                "inverted scissor rectangle {:?}",
                rect
            )));
        }
        let native = if y_axis == self.texture_image_y_axis() {
            rect
        } else {
            rect.flip_vertical(self.height())
        };
        let mut inner = self.inner.borrow_mut();
        inner.state.scissor = Some(native);
        inner.notify(|screen, id, state| screen.on_scissor_changed(id, state))
    }

    pub fn reset_scissor(&self) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        inner.state.scissor = None;
        inner.notify(|screen, id, state| screen.on_scissor_changed(id, state))
    }

    /// Set one viewport, or with `None` replace all of them with `rect`
    pub fn set_viewport(&self, index: Option<usize>, rect: Rect) -> Result<()> {
        if let Some(index) = index {
            check_binding_index("viewport", index)?;
        }
        let mut inner = self.inner.borrow_mut();
        inner.state.set_viewport(index, rect);
        inner.notify(|screen, id, state| screen.on_viewport_changed(id, state))
    }

    pub fn set_depth_range(&self, index: Option<usize>, min: f32, max: f32) -> Result<()> {
        if let Some(index) = index {
            check_binding_index("depth range", index)?;
        }
        let mut inner = self.inner.borrow_mut();
        inner.state.set_depth_range(index, DepthRange { min, max });
        inner.notify(|screen, id, state| screen.on_depth_range_changed(id, state))
    }

    // ─── State objects ──────────────────────────────────────────────────

    pub fn set_rasterizer_state(&self, state: &RasterizerState) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        inner.state.rasterizer_state = *state;
        inner.notify(|screen, id, state| screen.on_rasterizer_state_changed(id, state))
    }

    pub fn reset_rasterizer_state(&self) -> Result<()> {
        let rasterizer = self.inner.borrow().defaults.rasterizer;
        self.set_rasterizer_state(&rasterizer)
    }

    pub fn set_blend_state(&self, state: &BlendState, color: Color, sample_mask: u32) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        inner.state.blend_state = *state;
        inner.state.blend_color = color;
        inner.state.sample_mask = sample_mask;
        inner.notify(|screen, id, state| screen.on_blend_state_changed(id, state))
    }

    pub fn reset_blend_state(&self) -> Result<()> {
        let blend = self.inner.borrow().defaults.blend;
        self.set_blend_state(&blend, Color::WHITE, u32::MAX)
    }

    pub fn set_depth_stencil_state(&self, state: &DepthStencilState, stencil_ref: i32) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        inner.state.depth_stencil_state = *state;
        inner.state.stencil_ref = stencil_ref;
        inner.notify(|screen, id, state| screen.on_depth_stencil_state_changed(id, state))
    }

    pub fn reset_depth_stencil_state(&self) -> Result<()> {
        let depth_stencil = self.inner.borrow().defaults.depth_stencil;
        self.set_depth_stencil_state(&depth_stencil, 0)
    }

    // ─── Programs ───────────────────────────────────────────────────────

    pub fn set_program_object(&self, program: impl Into<ActiveProgram>) -> Result<()> {
        let mut inner = self.inner.borrow_mut();
        inner.state.program = program.into();
        inner.notify(|screen, id, state| screen.on_program_changed(id, state))
    }

    pub fn reset_program_object(&self) -> Result<()> {
        self.set_program_object(ActiveProgram::None)
    }

    // ─── Drawing ────────────────────────────────────────────────────────

    /// Draw `count` vertices of `array` from the start
    pub fn draw_primitives(
        &self,
        primitives: PrimitivesType,
        count: usize,
        array: &PrimitivesArray,
    ) -> Result<()> {
        self.with_active_provider(|provider| {
            provider.set_primitives_array(Some(array))?;
            provider.draw_primitives_array(primitives, 0, count)?;
            provider.set_primitives_array(None)
        })
    }

    pub fn set_primitives_array(&self, array: &PrimitivesArray) -> Result<()> {
        self.with_active_provider(|provider| provider.set_primitives_array(Some(array)))
    }

    pub fn reset_primitives_array(&self) -> Result<()> {
        self.with_active_provider(|provider| provider.set_primitives_array(None))
    }

    pub fn draw_primitives_array(
        &self,
        primitives: PrimitivesType,
        offset: usize,
        count: usize,
    ) -> Result<()> {
        self.with_active_provider(|provider| {
            provider.draw_primitives_array(primitives, offset, count)
        })
    }

    pub fn draw_primitives_array_instanced(
        &self,
        primitives: PrimitivesType,
        offset: usize,
        count: usize,
        instances: usize,
    ) -> Result<()> {
        self.with_active_provider(|provider| {
            provider.draw_primitives_array_instanced(primitives, offset, count, instances)
        })
    }

    pub fn set_primitives_elements(&self, elements: &ElementArrayBuffer) -> Result<()> {
        self.with_active_provider(|provider| provider.set_primitives_elements(Some(elements)))
    }

    pub fn reset_primitives_elements(&self) -> Result<()> {
        self.with_active_provider(|provider| provider.set_primitives_elements(None))
    }

    pub fn draw_primitives_elements(
        &self,
        primitives: PrimitivesType,
        count: usize,
        indices: IndicesType,
        offset: usize,
    ) -> Result<()> {
        self.with_active_provider(|provider| {
            provider.draw_primitives_elements(primitives, count, indices, offset)
        })
    }

    pub fn draw_primitives_elements_instanced(
        &self,
        primitives: PrimitivesType,
        count: usize,
        indices: IndicesType,
        offset: usize,
        instances: usize,
    ) -> Result<()> {
        self.with_active_provider(|provider| {
            provider.draw_primitives_elements_instanced(primitives, count, indices, offset, instances)
        })
    }

    pub fn clear(&self, color: Color) -> Result<()> {
        self.with_active_provider(|provider| provider.clear(color))
    }

    pub fn clear_depth(&self, value: f32) -> Result<()> {
        self.with_active_provider(|provider| provider.clear_depth(value))
    }

    pub fn clear_stencil(&self, value: i32) -> Result<()> {
        self.with_active_provider(|provider| provider.clear_stencil(value))
    }

    pub fn dispatch(&self, x: u32, y: u32, z: u32) -> Result<()> {
        self.with_active_provider(|provider| provider.dispatch(x, y, z))
    }

    /// Read back pixels
    ///
    /// Window reads return rows top-down with `rect` measured from the top
    /// on every backend. Frame buffer reads return rows in texel order.
    pub fn get_pixeldata(&self, rect: IntRect, format: TextureFormat) -> Result<PixelBuffer> {
        if rect.is_empty() {
            return Err(GraphicsError::invalid_argument(format!(
                "read back rectangle {:?} is empty",
                rect
            )));
        }
        let reads_window = self.inner.borrow().state.read_frame_buffer.is_none();
        let bottom_up = self.texture_image_y_axis() == TextureImageYAxis::BottomUp;
        if reads_window && bottom_up {
            let native = rect.flip_vertical(self.window_size().height);
            let mut pixels =
                self.with_active_provider(|provider| provider.get_pixeldata(native, format))?;
            pixels.flip_vertical();
            Ok(pixels)
        } else {
            self.with_active_provider(|provider| provider.get_pixeldata(rect, format))
        }
    }

    // ─── Surface ────────────────────────────────────────────────────────

    /// Submit pending backend commands; batchers are flushed by their canvas
    pub fn flush(&self) -> Result<()> {
        self.with_raw_provider(|provider| provider.flush())
    }

    pub fn make_current(&self) -> Result<()> {
        self.with_raw_provider(|provider| provider.make_current())
    }

    pub fn on_window_resized(&self, size: IntSize) -> Result<()> {
        self.with_screen(|screen| screen.on_window_resized(size))
    }
}

impl std::fmt::Debug for GraphicContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("GraphicContext")
            .field("id", &inner.id)
            .field("frame_buffer", &inner.state.write_frame_buffer)
            .finish_non_exhaustive()
    }
}

fn check_size(kind: &str, size: IntSize) -> Result<()> {
    if !size.is_positive() {
        return Err(GraphicsError::invalid_argument(format!(
            "{} size {}x{} must be positive",
            kind, size.width, size.height
        )));
    }
    Ok(())
}
