//! Pipeline state objects and the fixed-function state they bundle.

use crate::handle::ShaderHandle;
use crate::vertex::{IndexFormat, VertexInputState};

/// Comparison function for depth and stencil tests.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum CompareOp {
    Never = 0,
    Less = 1,
    Equal = 2,
    LessOrEqual = 3,
    Greater = 4,
    NotEqual = 5,
    GreaterOrEqual = 6,
    Always = 7,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum StencilOp {
    Keep = 0,
    Zero = 1,
    Replace = 2,
    IncrementAndClamp = 3,
    DecrementAndClamp = 4,
    Invert = 5,
    IncrementAndWrap = 6,
    DecrementAndWrap = 7,
}

/// Per-face stencil behavior. Masks and reference are 8-bit because the
/// stencil buffer is.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct StencilOpState {
    pub fail_op: StencilOp,
    pub pass_op: StencilOp,
    pub depth_fail_op: StencilOp,
    pub compare_op: CompareOp,
    pub compare_mask: u8,
    pub write_mask: u8,
    pub reference: u8,
}

impl Default for StencilOpState {
    fn default() -> StencilOpState {
        StencilOpState {
            fail_op: StencilOp::Keep,
            pass_op: StencilOp::Keep,
            depth_fail_op: StencilOp::Keep,
            compare_op: CompareOp::Always,
            compare_mask: 0xFF,
            write_mask: 0xFF,
            reference: 0,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum StencilTest {
    Disabled,
    Enabled {
        front: StencilOpState,
        back: StencilOpState,
    },
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct DepthStencilState {
    pub depth_test_enable: bool,
    pub depth_write_enable: bool,
    pub depth_compare_op: CompareOp,
    pub stencil_test: StencilTest,
}

impl Default for DepthStencilState {
    fn default() -> DepthStencilState {
        DepthStencilState {
            depth_test_enable: true,
            depth_write_enable: true,
            depth_compare_op: CompareOp::Less,
            stencil_test: StencilTest::Disabled,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum CullMode {
    None,
    Front,
    Back,
}

/// Winding that counts as front-facing. Positive signed area in screen
/// space corresponds to counter-clockwise winding.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum FrontFace {
    Clockwise,
    CounterClockwise,
}

/// How the interior of a clipped triangle is rasterized.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum PolygonMode {
    Fill,
    Line,
    Point,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BlendFactor {
    Zero = 0,
    One = 1,
    SrcColor = 2,
    OneMinusSrcColor = 3,
    SrcAlpha = 4,
    OneMinusSrcAlpha = 5,
    DstColor = 6,
    OneMinusDstColor = 7,
    DstAlpha = 8,
    OneMinusDstAlpha = 9,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BlendOp {
    Add = 0,
    Subtract = 1,
    ReverseSubtract = 2,
    Min = 3,
    Max = 4,
}

/// Color blend state with separate RGB and alpha pipes.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ColorBlendState {
    Disabled,
    Enabled {
        src_color_blend_factor: BlendFactor,
        dst_color_blend_factor: BlendFactor,
        color_blend_op: BlendOp,
        src_alpha_blend_factor: BlendFactor,
        dst_alpha_blend_factor: BlendFactor,
        alpha_blend_op: BlendOp,
    },
}

impl ColorBlendState {
    pub const ALPHA_BLENDING: ColorBlendState = ColorBlendState::Enabled {
        src_color_blend_factor: BlendFactor::SrcAlpha,
        dst_color_blend_factor: BlendFactor::OneMinusSrcAlpha,
        color_blend_op: BlendOp::Add,
        src_alpha_blend_factor: BlendFactor::SrcAlpha,
        dst_alpha_blend_factor: BlendFactor::OneMinusSrcAlpha,
        alpha_blend_op: BlendOp::Add,
    };
}

impl Default for ColorBlendState {
    fn default() -> ColorBlendState {
        ColorBlendState::Disabled
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum PrimitiveTopology {
    Points,
    Lines,
    LineStrip,
    LineLoop,
    Triangles,
    TriangleStrip,
    TriangleFan,
}

/// Viewport rectangle in pixels. Screen y grows downward.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Viewport {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl From<(u32, u32)> for Viewport {
    fn from((w, h): (u32, u32)) -> Viewport {
        Viewport {
            x: 0.0,
            y: 0.0,
            width: w as f32,
            height: h as f32,
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct ScissorRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Scissor {
    Disabled,
    Enabled(ScissorRect),
}

/// Complete description of a pipeline state object. One pipeline exists per
/// user shader type; the shader handle selects the registered factory that
/// monomorphizes the pipeline over it.
#[derive(Clone, Debug)]
pub struct PipelineDesc {
    pub shader: ShaderHandle,
    pub input_layout: VertexInputState,
    /// Element format used by indexed draws through this pipeline.
    pub index_format: IndexFormat,
    pub topology: PrimitiveTopology,
    pub cull_mode: CullMode,
    pub front_face: FrontFace,
    pub polygon_mode: PolygonMode,
    pub depth_stencil: DepthStencilState,
    pub blend: ColorBlendState,
    pub label: Option<String>,
}

impl PipelineDesc {
    pub fn new(shader: ShaderHandle, input_layout: VertexInputState) -> PipelineDesc {
        PipelineDesc {
            shader,
            input_layout,
            index_format: IndexFormat::U32,
            topology: PrimitiveTopology::Triangles,
            cull_mode: CullMode::Back,
            front_face: FrontFace::CounterClockwise,
            polygon_mode: PolygonMode::Fill,
            depth_stencil: DepthStencilState::default(),
            blend: ColorBlendState::Disabled,
            label: None,
        }
    }
}
