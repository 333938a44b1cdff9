//! State object descriptions and draw-call enums
//!
//! Descriptions compare, order and hash by value so equal descriptions can
//! share one backend state object.

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CullMode {
    Front,
    #[default]
    Back,
    FrontAndBack,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FrontFace {
    #[default]
    CounterClockwise,
    Clockwise,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FillMode {
    #[default]
    Fill,
    Line,
    Point,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RasterizerStateDescription {
    pub culled: bool,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub fill_mode: FillMode,
    pub line_antialiasing: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlendEquation {
    #[default]
    Add,
    Subtract,
    ReverseSubtract,
    Min,
    Max,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BlendFunc {
    Zero,
    One,
    SrcColor,
    OneMinusSrcColor,
    DestColor,
    OneMinusDestColor,
    SrcAlpha,
    OneMinusSrcAlpha,
    DestAlpha,
    OneMinusDestAlpha,
    ConstantColor,
    OneMinusConstantColor,
    ConstantAlpha,
    OneMinusConstantAlpha,
    SrcAlphaSaturate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColorWriteMask {
    pub red: bool,
    pub green: bool,
    pub blue: bool,
    pub alpha: bool,
}

impl Default for ColorWriteMask {
    fn default() -> Self {
        Self {
            red: true,
            green: true,
            blue: true,
            alpha: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlendStateDescription {
    pub enabled: bool,
    pub color_equation: BlendEquation,
    pub alpha_equation: BlendEquation,
    pub src: BlendFunc,
    pub dest: BlendFunc,
    pub src_alpha: BlendFunc,
    pub dest_alpha: BlendFunc,
    pub color_write: ColorWriteMask,
}

/// Straight-alpha "over" compositing
impl Default for BlendStateDescription {
    fn default() -> Self {
        Self {
            enabled: true,
            color_equation: BlendEquation::Add,
            alpha_equation: BlendEquation::Add,
            src: BlendFunc::SrcAlpha,
            dest: BlendFunc::OneMinusSrcAlpha,
            src_alpha: BlendFunc::One,
            dest_alpha: BlendFunc::OneMinusSrcAlpha,
            color_write: ColorWriteMask::default(),
        }
    }
}

impl BlendStateDescription {
    /// Blending disabled, source replaces destination
    pub fn opaque() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    pub fn premultiplied_alpha() -> Self {
        Self {
            src: BlendFunc::One,
            ..Self::default()
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CompareFunction {
    Never,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
    Equal,
    NotEqual,
    #[default]
    Always,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StencilOp {
    #[default]
    Keep,
    Zero,
    Replace,
    Increment,
    Decrement,
    Invert,
    IncrementWrap,
    DecrementWrap,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StencilFace {
    pub func: CompareFunction,
    pub fail: StencilOp,
    pub pass_depth_fail: StencilOp,
    pub pass_depth_pass: StencilOp,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DepthStencilStateDescription {
    pub depth_test: bool,
    pub depth_write: bool,
    pub depth_func: CompareFunction,
    pub stencil_test: bool,
    pub stencil_front: StencilFace,
    pub stencil_back: StencilFace,
    pub stencil_read_mask: u8,
    pub stencil_write_mask: u8,
}

impl Default for DepthStencilStateDescription {
    fn default() -> Self {
        Self {
            depth_test: false,
            depth_write: false,
            depth_func: CompareFunction::Less,
            stencil_test: false,
            stencil_front: StencilFace::default(),
            stencil_back: StencilFace::default(),
            stencil_read_mask: 0xff,
            stencil_write_mask: 0xff,
        }
    }
}

/// Primitive topology of a draw call
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PrimitivesType {
    Points,
    LineStrip,
    LineLoop,
    Lines,
    TriangleStrip,
    TriangleFan,
    Triangles,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VertexAttributeDataType {
    Float,
    UnsignedByte,
    UnsignedShort,
    Int,
}

impl VertexAttributeDataType {
    pub fn size(&self) -> usize {
        match self {
            VertexAttributeDataType::Float | VertexAttributeDataType::Int => 4,
            VertexAttributeDataType::UnsignedShort => 2,
            VertexAttributeDataType::UnsignedByte => 1,
        }
    }
}

/// Layout of one vertex attribute inside a vertex buffer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct VertexAttribute {
    pub data_type: VertexAttributeDataType,
    /// Component count, 1 to 4
    pub components: u8,
    pub normalize: bool,
    /// Bytes between consecutive vertices
    pub stride: usize,
    /// Byte offset of the first component
    pub offset: usize,
}

impl VertexAttribute {
    pub fn float(components: u8, stride: usize, offset: usize) -> Self {
        Self {
            data_type: VertexAttributeDataType::Float,
            components,
            normalize: false,
            stride,
            offset,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndicesType {
    UnsignedByte,
    UnsignedShort,
    UnsignedInt,
}

impl IndicesType {
    pub fn size(&self) -> usize {
        match self {
            IndicesType::UnsignedByte => 1,
            IndicesType::UnsignedShort => 2,
            IndicesType::UnsignedInt => 4,
        }
    }
}

/// Which surface buffer receives rendering when no frame buffer is bound
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum DrawBuffer {
    None,
    #[default]
    Back,
    Front,
}

/// Row order of texture images and of the window surface
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextureImageYAxis {
    /// Row 0 is the top row (Direct3D style)
    TopDown,
    /// Row 0 is the bottom row (OpenGL style)
    BottomUp,
}

impl TextureImageYAxis {
    pub fn flipped(&self) -> Self {
        match self {
            TextureImageYAxis::TopDown => TextureImageYAxis::BottomUp,
            TextureImageYAxis::BottomUp => TextureImageYAxis::TopDown,
        }
    }
}

/// Shader source dialect understood by a backend
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderLanguage {
    Glsl,
    Hlsl,
    FixedFunction,
}

/// Depth range mapping for one viewport
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DepthRange {
    pub min: f32,
    pub max: f32,
}

impl Default for DepthRange {
    fn default() -> Self {
        Self { min: 0.0, max: 1.0 }
    }
}
