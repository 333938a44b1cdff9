//! Program selection and the standard program contracts
//!
//! A standard program is a backend built-in selected by enum. Every backend
//! implements the same attribute locations and texture units listed here,
//! which is what lets batchers fill vertex buffers without knowing which
//! backend is active.

use crate::description::ShaderLanguage;
use crate::resources::ProgramObject;

/// Built-in programs every backend provides
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StandardProgram {
    /// Vertex color only
    ColorOnly,
    /// Vertex color modulated by texture unit 0
    Single,
    /// Vertex color modulated by one of several texture units chosen per vertex
    Sprite,
    /// Coverage mask times brush paint
    Path,
}

/// The program bound in a state record
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ActiveProgram {
    #[default]
    None,
    Standard(StandardProgram),
    Explicit(ProgramObject),
}

impl From<StandardProgram> for ActiveProgram {
    fn from(program: StandardProgram) -> Self {
        ActiveProgram::Standard(program)
    }
}

impl From<ProgramObject> for ActiveProgram {
    fn from(program: ProgramObject) -> Self {
        ActiveProgram::Explicit(program)
    }
}

/// Source text for an explicit program
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProgramSource {
    pub language: ShaderLanguage,
    pub vertex: String,
    pub fragment: String,
}

/// `ColorOnly`: `vec4 position`, `vec4 color`
pub mod color_only {
    pub const ATTR_POSITION: usize = 0;
    pub const ATTR_COLOR: usize = 1;
}

/// `Single`: `vec4 position`, `vec4 color`, `vec2 texcoord`; texture unit 0
pub mod single {
    pub const ATTR_POSITION: usize = 0;
    pub const ATTR_COLOR: usize = 1;
    pub const ATTR_TEXCOORD: usize = 2;
    pub const TEXTURE_UNIT: usize = 0;
}

/// `Sprite`: `vec4 position`, `vec4 color`, `vec2 texcoord`, `float texindex`
///
/// `texindex` selects the texture unit, a negative value draws the vertex
/// color alone.
pub mod sprite {
    pub const ATTR_POSITION: usize = 0;
    pub const ATTR_COLOR: usize = 1;
    pub const ATTR_TEXCOORD: usize = 2;
    pub const ATTR_TEXINDEX: usize = 3;
    pub const MAX_TEXTURE_UNITS: usize = 4;
}

/// `Path`: `vec4 position`, `vec2 mask texel`, `vec2 device position`,
/// `float instance texel offset`
pub mod path {
    pub const ATTR_POSITION: usize = 0;
    pub const ATTR_MASK_POSITION: usize = 1;
    pub const ATTR_DEVICE_POSITION: usize = 2;
    pub const ATTR_INSTANCE_OFFSET: usize = 3;

    /// R8 coverage mask atlas
    pub const MASK_UNIT: usize = 0;
    /// RGBA32F brush instance atlas
    pub const INSTANCE_UNIT: usize = 1;
    /// Image brush source
    pub const IMAGE_UNIT: usize = 2;
}

/// Layout of one brush instance inside the RGBA32F instance atlas
///
/// Texels are addressed linearly, `offset = y * width + x`. Starting at the
/// instance offset `o`:
///
/// ```text
/// o + 0  [type, stop count, 0, 0]
/// o + 1  [a, b, c, d]        inverse brush transform, device -> brush space
/// o + 2  [tx, ty, 0, 0]
/// o + 3  solid:  [r, g, b, a]
///        linear: [start x, start y, end x, end y]
///        radial: [center x, center y, radius x, radius y]
///        image:  [u scale, v scale, 0, 0]
/// o + 4  per stop: [r, g, b, a], [position, 0, 0, 0]
/// ```
pub mod path_instance {
    pub const HEADER_TEXELS: usize = 4;
    pub const TEXELS_PER_STOP: usize = 2;
    pub const MAX_STOPS: usize = 32;

    pub const TYPE_SOLID: f32 = 0.0;
    pub const TYPE_LINEAR: f32 = 1.0;
    pub const TYPE_RADIAL: f32 = 2.0;
    pub const TYPE_IMAGE: f32 = 3.0;

    /// Texels used by an instance with `stops` gradient stops
    pub fn texels(stops: usize) -> usize {
        HEADER_TEXELS + stops * TEXELS_PER_STOP
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_texels() {
        assert_eq!(path_instance::texels(0), 4);
        assert_eq!(path_instance::texels(3), 10);
    }

    #[test]
    fn test_active_program_from() {
        let active: ActiveProgram = StandardProgram::Path.into();
        assert_eq!(active, ActiveProgram::Standard(StandardProgram::Path));
        assert_eq!(ActiveProgram::default(), ActiveProgram::None);
    }
}
