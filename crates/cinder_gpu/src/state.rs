//! The state record: every piece of settable GPU state of one context
//!
//! Plain data. The context mutates it through its setters and the screen
//! diffs it against whatever is resident on the backend.

use cinder_core::{Color, GraphicsError, IntRect, Rect, Result};

use crate::description::{DepthRange, DrawBuffer};
use crate::program::ActiveProgram;
use crate::resources::{
    BlendState, DepthStencilState, FrameBuffer, RasterizerState, StorageBuffer, Texture2D,
    UniformBuffer,
};

/// Highest texture, image texture, uniform or storage buffer index
pub const MAX_BINDING_INDEX: usize = 255;

pub(crate) fn check_binding_index(kind: &str, index: usize) -> Result<()> {
    if index > MAX_BINDING_INDEX {
        return Err(GraphicsError::invalid_argument(format!(
            "{} index {} is outside 0..={}",
            kind, index, MAX_BINDING_INDEX
        )));
    }
    Ok(())
}

/// Identity of one state record on its screen
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateId(pub(crate) u64);

/// State objects a record falls back to on reset
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DefaultStates {
    pub rasterizer: RasterizerState,
    pub blend: BlendState,
    pub depth_stencil: DepthStencilState,
}

#[derive(Clone, Debug, PartialEq)]
pub struct GraphicContextState {
    pub write_frame_buffer: Option<FrameBuffer>,
    pub read_frame_buffer: Option<FrameBuffer>,
    pub textures: Vec<Option<Texture2D>>,
    pub image_textures: Vec<Option<Texture2D>>,
    pub uniform_buffers: Vec<Option<UniformBuffer>>,
    pub storage_buffers: Vec<Option<StorageBuffer>>,
    /// Scissor in backend native coordinates, `None` when disabled
    pub scissor: Option<IntRect>,
    pub viewports: Vec<Rect>,
    pub depth_ranges: Vec<DepthRange>,
    pub program: ActiveProgram,
    pub rasterizer_state: RasterizerState,
    pub blend_state: BlendState,
    pub blend_color: Color,
    pub sample_mask: u32,
    pub depth_stencil_state: DepthStencilState,
    pub stencil_ref: i32,
    pub draw_buffer: DrawBuffer,
}

impl GraphicContextState {
    pub fn new(defaults: &DefaultStates) -> Self {
        Self {
            write_frame_buffer: None,
            read_frame_buffer: None,
            textures: Vec::new(),
            image_textures: Vec::new(),
            uniform_buffers: Vec::new(),
            storage_buffers: Vec::new(),
            scissor: None,
            viewports: vec![Rect::default()],
            depth_ranges: vec![DepthRange::default()],
            program: ActiveProgram::None,
            rasterizer_state: defaults.rasterizer,
            blend_state: defaults.blend,
            blend_color: Color::WHITE,
            sample_mask: u32::MAX,
            depth_stencil_state: defaults.depth_stencil,
            stencil_ref: 0,
            draw_buffer: DrawBuffer::Back,
        }
    }

    pub fn texture(&self, index: usize) -> Option<Texture2D> {
        binding(&self.textures, index)
    }

    pub fn image_texture(&self, index: usize) -> Option<Texture2D> {
        binding(&self.image_textures, index)
    }

    pub fn uniform_buffer(&self, index: usize) -> Option<UniformBuffer> {
        binding(&self.uniform_buffers, index)
    }

    pub fn storage_buffer(&self, index: usize) -> Option<StorageBuffer> {
        binding(&self.storage_buffers, index)
    }

    /// Set viewport `index`, or collapse the array to one global entry
    /// when `index` is `None`
    pub fn set_viewport(&mut self, index: Option<usize>, rect: Rect) {
        set_entry(&mut self.viewports, index, rect, Rect::default());
    }

    /// Same collapse rule as [`set_viewport`](Self::set_viewport)
    pub fn set_depth_range(&mut self, index: Option<usize>, range: DepthRange) {
        set_entry(&mut self.depth_ranges, index, range, DepthRange::default());
    }
}

fn binding<T: Copy>(list: &[Option<T>], index: usize) -> Option<T> {
    list.get(index).copied().flatten()
}

/// Store `value` at `index`, growing the list on demand
///
/// Clearing an index past the end leaves the list untouched.
pub(crate) fn set_binding<T>(list: &mut Vec<Option<T>>, index: usize, value: Option<T>) {
    if index >= list.len() {
        if value.is_none() {
            return;
        }
        list.resize_with(index + 1, || None);
    }
    list[index] = value;
}

fn set_entry<T: Clone>(list: &mut Vec<T>, index: Option<usize>, value: T, fill: T) {
    match index {
        None => {
            list.clear();
            list.push(value);
        }
        Some(index) => {
            if index >= list.len() {
                list.resize(index + 1, fill);
            }
            list[index] = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_binding_index_ceiling() {
        assert!(check_binding_index("texture", 255).is_ok());
        let err = check_binding_index("texture", 256).unwrap_err();
        assert!(matches!(err, GraphicsError::InvalidArgument(_)));
    }

    #[test]
    fn test_set_binding_grows_on_demand() {
        let mut list: Vec<Option<u8>> = Vec::new();
        set_binding(&mut list, 3, Some(7));
        assert_eq!(list, vec![None, None, None, Some(7)]);

        set_binding(&mut list, 10, None);
        assert_eq!(list.len(), 4);

        set_binding(&mut list, 3, None);
        assert_eq!(list[3], None);
    }

    #[test]
    fn test_viewport_array_collapses() {
        let mut viewports = vec![Rect::default()];
        let wide = Rect::new(0.0, 0.0, 640.0, 480.0);
        set_entry(&mut viewports, Some(2), wide, Rect::default());
        assert_eq!(viewports.len(), 3);
        assert_eq!(viewports[1], Rect::default());

        let global = Rect::new(10.0, 10.0, 20.0, 20.0);
        set_entry(&mut viewports, None, global, Rect::default());
        assert_eq!(viewports, vec![global]);
    }
}
