//! Graphic screen: the single owner of a backend provider
//!
//! Several contexts share one screen. The screen remembers which state
//! record was last pushed (the active one) and keeps a mirror of what the
//! driver holds. A change notification from the active context is applied
//! as a delta; one from any other context makes that context active with a
//! full resync.

use cinder_core::{GraphicsError, IntSize, Result};
use rustc_hash::FxHashMap;

use crate::description::{
    BlendStateDescription, DepthStencilStateDescription, RasterizerStateDescription,
};
use crate::provider::GraphicContextProvider;
use crate::resources::{BlendState, DepthStencilState, RasterizerState};
use crate::state::{set_binding, DefaultStates, GraphicContextState, StateId};

pub struct GraphicScreen {
    provider: Box<dyn GraphicContextProvider>,
    /// Non-owning: contexts report their own destruction
    active: Option<StateId>,
    mirror: GraphicContextState,
    defaults: DefaultStates,
    max_attributes: usize,
    window_size: IntSize,
    next_state_id: u64,
    rasterizer_states: FxHashMap<RasterizerStateDescription, RasterizerState>,
    blend_states: FxHashMap<BlendStateDescription, BlendState>,
    depth_stencil_states: FxHashMap<DepthStencilStateDescription, DepthStencilState>,
}

impl GraphicScreen {
    pub fn new(mut provider: Box<dyn GraphicContextProvider>, window_size: IntSize) -> Result<Self> {
        let rasterizer = provider.create_rasterizer_state(&RasterizerStateDescription::default())?;
        let blend = provider.create_blend_state(&BlendStateDescription::default())?;
        let depth_stencil =
            provider.create_depth_stencil_state(&DepthStencilStateDescription::default())?;
        let defaults = DefaultStates {
            rasterizer,
            blend,
            depth_stencil,
        };
        let max_attributes = provider.max_attributes();

        let mut rasterizer_states = FxHashMap::default();
        rasterizer_states.insert(rasterizer.description, rasterizer);
        let mut blend_states = FxHashMap::default();
        blend_states.insert(blend.description, blend);
        let mut depth_stencil_states = FxHashMap::default();
        depth_stencil_states.insert(depth_stencil.description, depth_stencil);

        tracing::debug!(
            backend = provider.name(),
            width = window_size.width,
            height = window_size.height,
            "creating graphic screen"
        );

        let mut screen = Self {
            provider,
            active: None,
            mirror: GraphicContextState::new(&defaults),
            defaults,
            max_attributes,
            window_size,
            next_state_id: 1,
            rasterizer_states,
            blend_states,
            depth_stencil_states,
        };
        screen.set_default_state()?;
        Ok(screen)
    }

    /// Frame buffer, textures, buffers and program start unbound on every
    /// backend, so only the remaining fields are pushed
    fn set_default_state(&mut self) -> Result<()> {
        self.provider.set_draw_buffer(self.mirror.draw_buffer)?;
        self.provider.set_scissor(None)?;
        self.provider.set_viewports(&self.mirror.viewports)?;
        self.provider.set_depth_ranges(&self.mirror.depth_ranges)?;
        Ok(())
    }

    pub(crate) fn allocate_state_id(&mut self) -> StateId {
        let id = StateId(self.next_state_id);
        self.next_state_id += 1;
        id
    }

    pub fn provider(&self) -> &dyn GraphicContextProvider {
        self.provider.as_ref()
    }

    pub fn provider_mut(&mut self) -> &mut dyn GraphicContextProvider {
        self.provider.as_mut()
    }

    pub fn active(&self) -> Option<StateId> {
        self.active
    }

    pub fn is_active(&self, id: StateId) -> bool {
        self.active == Some(id)
    }

    /// The state believed resident on the driver
    pub fn mirror(&self) -> &GraphicContextState {
        &self.mirror
    }

    pub fn defaults(&self) -> &DefaultStates {
        &self.defaults
    }

    pub fn max_attributes(&self) -> usize {
        self.max_attributes
    }

    pub fn window_size(&self) -> IntSize {
        self.window_size
    }

    pub fn on_window_resized(&mut self, size: IntSize) -> Result<()> {
        if !size.is_positive() {
            return Err(GraphicsError::invalid_argument(format!(
                "window size {}x{} must be positive",
                size.width, size.height
            )));
        }
        self.window_size = size;
        self.provider.on_window_resized(size)
    }

    // ─── State objects ──────────────────────────────────────────────────

    pub fn rasterizer_state(
        &mut self,
        description: &RasterizerStateDescription,
    ) -> Result<RasterizerState> {
        if let Some(state) = self.rasterizer_states.get(description) {
            return Ok(*state);
        }
        let state = self.provider.create_rasterizer_state(description)?;
        self.rasterizer_states.insert(*description, state);
        Ok(state)
    }

    pub fn blend_state(&mut self, description: &BlendStateDescription) -> Result<BlendState> {
        if let Some(state) = self.blend_states.get(description) {
            return Ok(*state);
        }
        let state = self.provider.create_blend_state(description)?;
        self.blend_states.insert(*description, state);
        Ok(state)
    }

    pub fn depth_stencil_state(
        &mut self,
        description: &DepthStencilStateDescription,
    ) -> Result<DepthStencilState> {
        if let Some(state) = self.depth_stencil_states.get(description) {
            return Ok(*state);
        }
        let state = self.provider.create_depth_stencil_state(description)?;
        self.depth_stencil_states.insert(*description, state);
        Ok(state)
    }

    // ─── Activation ─────────────────────────────────────────────────────

    /// Make `state` the one resident on the driver
    pub fn set_active(&mut self, id: StateId, state: &GraphicContextState) -> Result<()> {
        if self.active == Some(id) {
            return Ok(());
        }
        tracing::trace!(?id, previous = ?self.active, "switching active context");
        // Nothing is active until the push completes
        self.active = None;
        self.push_state(state)?;
        self.active = Some(id);
        Ok(())
    }

    /// Push every field of `state`, unbinding whatever the mirror holds
    /// beyond it, then mirror it
    fn push_state(&mut self, state: &GraphicContextState) -> Result<()> {
        let provider = self.provider.as_mut();
        let mirror = &self.mirror;

        // Frame buffer switches go first for single-surface backends
        provider.set_frame_buffers(
            state.write_frame_buffer.as_ref(),
            state.read_frame_buffer.as_ref(),
        )?;
        provider.set_rasterizer_state(&state.rasterizer_state)?;
        provider.set_blend_state(&state.blend_state, state.blend_color, state.sample_mask)?;
        provider.set_depth_stencil_state(&state.depth_stencil_state, state.stencil_ref)?;
        provider.set_draw_buffer(state.draw_buffer)?;
        provider.set_depth_ranges(&state.depth_ranges)?;

        for index in 0..state.textures.len().max(mirror.textures.len()) {
            provider.set_texture(index, state.texture(index).as_ref())?;
        }
        for index in 0..state.image_textures.len().max(mirror.image_textures.len()) {
            provider.set_image_texture(index, state.image_texture(index).as_ref())?;
        }
        for index in 0..state.uniform_buffers.len().max(mirror.uniform_buffers.len()) {
            provider.set_uniform_buffer(index, state.uniform_buffer(index).as_ref())?;
        }
        for index in 0..state.storage_buffers.len().max(mirror.storage_buffers.len()) {
            provider.set_storage_buffer(index, state.storage_buffer(index).as_ref())?;
        }

        provider.set_scissor(state.scissor)?;
        provider.set_viewports(&state.viewports)?;
        provider.set_program(state.program)?;

        self.mirror = state.clone();
        Ok(())
    }

    fn set_active_program(&mut self, state: &GraphicContextState) -> Result<()> {
        self.provider.set_program(state.program)?;
        self.mirror.program = state.program;
        Ok(())
    }

    /// A context is going away: reset the driver to defaults if it was active
    pub fn state_destroyed(&mut self, id: StateId) -> Result<()> {
        if self.active != Some(id) {
            return Ok(());
        }
        tracing::debug!(?id, "active context destroyed, restoring default state");
        self.active = None;
        let defaults = GraphicContextState::new(&self.defaults);
        self.push_state(&defaults)
    }

    // ─── Change notifications ───────────────────────────────────────────

    pub fn on_frame_buffer_changed(&mut self, id: StateId, state: &GraphicContextState) -> Result<()> {
        if self.active != Some(id) {
            return self.set_active(id, state);
        }
        if self.mirror.write_frame_buffer != state.write_frame_buffer
            || self.mirror.read_frame_buffer != state.read_frame_buffer
        {
            self.provider.set_frame_buffers(
                state.write_frame_buffer.as_ref(),
                state.read_frame_buffer.as_ref(),
            )?;
            self.mirror.write_frame_buffer = state.write_frame_buffer;
            self.mirror.read_frame_buffer = state.read_frame_buffer;
        }
        // Program is re-selected after a render target change
        self.set_active_program(state)
    }

    pub fn on_texture_changed(
        &mut self,
        id: StateId,
        state: &GraphicContextState,
        index: usize,
    ) -> Result<()> {
        if self.active != Some(id) {
            return self.set_active(id, state);
        }
        let texture = state.texture(index);
        if self.mirror.texture(index) != texture {
            self.provider.set_texture(index, texture.as_ref())?;
            set_binding(&mut self.mirror.textures, index, texture);
        }
        Ok(())
    }

    /// Bulk form of [`on_texture_changed`](Self::on_texture_changed)
    pub fn on_textures_changed(&mut self, id: StateId, state: &GraphicContextState) -> Result<()> {
        if self.active != Some(id) {
            return self.set_active(id, state);
        }
        for index in 0..state.textures.len().max(self.mirror.textures.len()) {
            let texture = state.texture(index);
            if self.mirror.texture(index) != texture {
                self.provider.set_texture(index, texture.as_ref())?;
                set_binding(&mut self.mirror.textures, index, texture);
            }
        }
        Ok(())
    }

    pub fn on_image_texture_changed(
        &mut self,
        id: StateId,
        state: &GraphicContextState,
        index: usize,
    ) -> Result<()> {
        if self.active != Some(id) {
            return self.set_active(id, state);
        }
        let texture = state.image_texture(index);
        if self.mirror.image_texture(index) != texture {
            self.provider.set_image_texture(index, texture.as_ref())?;
            set_binding(&mut self.mirror.image_textures, index, texture);
        }
        Ok(())
    }

    pub fn on_uniform_buffer_changed(
        &mut self,
        id: StateId,
        state: &GraphicContextState,
        index: usize,
    ) -> Result<()> {
        if self.active != Some(id) {
            return self.set_active(id, state);
        }
        let buffer = state.uniform_buffer(index);
        if self.mirror.uniform_buffer(index) != buffer {
            self.provider.set_uniform_buffer(index, buffer.as_ref())?;
            set_binding(&mut self.mirror.uniform_buffers, index, buffer);
        }
        Ok(())
    }

    pub fn on_storage_buffer_changed(
        &mut self,
        id: StateId,
        state: &GraphicContextState,
        index: usize,
    ) -> Result<()> {
        if self.active != Some(id) {
            return self.set_active(id, state);
        }
        let buffer = state.storage_buffer(index);
        if self.mirror.storage_buffer(index) != buffer {
            self.provider.set_storage_buffer(index, buffer.as_ref())?;
            set_binding(&mut self.mirror.storage_buffers, index, buffer);
        }
        Ok(())
    }

    pub fn on_scissor_changed(&mut self, id: StateId, state: &GraphicContextState) -> Result<()> {
        if self.active != Some(id) {
            return self.set_active(id, state);
        }
        if self.mirror.scissor != state.scissor {
            self.provider.set_scissor(state.scissor)?;
            self.mirror.scissor = state.scissor;
        }
        Ok(())
    }

    pub fn on_viewport_changed(&mut self, id: StateId, state: &GraphicContextState) -> Result<()> {
        if self.active != Some(id) {
            return self.set_active(id, state);
        }
        if self.mirror.viewports != state.viewports {
            self.provider.set_viewports(&state.viewports)?;
            self.mirror.viewports = state.viewports.clone();
        }
        // TODO: check which backends really need the program re-selected
        // after viewport and frame buffer changes
        self.set_active_program(state)
    }

    pub fn on_depth_range_changed(&mut self, id: StateId, state: &GraphicContextState) -> Result<()> {
        if self.active != Some(id) {
            return self.set_active(id, state);
        }
        if self.mirror.depth_ranges != state.depth_ranges {
            self.provider.set_depth_ranges(&state.depth_ranges)?;
            self.mirror.depth_ranges = state.depth_ranges.clone();
        }
        Ok(())
    }

    pub fn on_rasterizer_state_changed(
        &mut self,
        id: StateId,
        state: &GraphicContextState,
    ) -> Result<()> {
        if self.active != Some(id) {
            return self.set_active(id, state);
        }
        if self.mirror.rasterizer_state != state.rasterizer_state {
            self.provider.set_rasterizer_state(&state.rasterizer_state)?;
            self.mirror.rasterizer_state = state.rasterizer_state;
        }
        Ok(())
    }

    pub fn on_blend_state_changed(&mut self, id: StateId, state: &GraphicContextState) -> Result<()> {
        if self.active != Some(id) {
            return self.set_active(id, state);
        }
        if self.mirror.blend_state != state.blend_state
            || self.mirror.blend_color != state.blend_color
            || self.mirror.sample_mask != state.sample_mask
        {
            self.provider
                .set_blend_state(&state.blend_state, state.blend_color, state.sample_mask)?;
            self.mirror.blend_state = state.blend_state;
            self.mirror.blend_color = state.blend_color;
            self.mirror.sample_mask = state.sample_mask;
        }
        Ok(())
    }

    pub fn on_depth_stencil_state_changed(
        &mut self,
        id: StateId,
        state: &GraphicContextState,
    ) -> Result<()> {
        if self.active != Some(id) {
            return self.set_active(id, state);
        }
        if self.mirror.depth_stencil_state != state.depth_stencil_state
            || self.mirror.stencil_ref != state.stencil_ref
        {
            self.provider
                .set_depth_stencil_state(&state.depth_stencil_state, state.stencil_ref)?;
            self.mirror.depth_stencil_state = state.depth_stencil_state;
            self.mirror.stencil_ref = state.stencil_ref;
        }
        Ok(())
    }

    pub fn on_program_changed(&mut self, id: StateId, state: &GraphicContextState) -> Result<()> {
        if self.active != Some(id) {
            return self.set_active(id, state);
        }
        if self.mirror.program != state.program {
            self.set_active_program(state)?;
        }
        Ok(())
    }

    pub fn on_draw_buffer_changed(&mut self, id: StateId, state: &GraphicContextState) -> Result<()> {
        if self.active != Some(id) {
            return self.set_active(id, state);
        }
        if self.mirror.draw_buffer != state.draw_buffer {
            self.provider.set_draw_buffer(state.draw_buffer)?;
            self.mirror.draw_buffer = state.draw_buffer;
        }
        Ok(())
    }
}

impl std::fmt::Debug for GraphicScreen {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphicScreen")
            .field("backend", &self.provider.name())
            .field("active", &self.active)
            .field("window_size", &self.window_size)
            .finish_non_exhaustive()
    }
}
