//! CPU rasterizer backend for the glint render interface.
//!
//! The device emulates a programmable pipeline on the CPU: vertex shading,
//! homogeneous clipping, perspective division and viewport mapping,
//! barycentric triangle rasterization with perspective-correct attribute
//! interpolation, per-pixel depth/stencil/blend, and mip-mapped texture
//! sampling. A tile-based deferred mode bins transformed triangles into a
//! screen grid and shades tiles in parallel on a fixed worker pool; the
//! direct mode rasterizes draws inline on the submission thread.
//!
//! Shaders are plain Rust structs implementing [shader::Shader]; one
//! pipeline is instantiated per shader type and driven through a trait
//! object, so the per-pixel loops are fully monomorphized.
//!
//! Conventions, fixed at this boundary: screen y grows downward, window
//! depth lies in [0,1] with the depth buffer cleared to +inf, framebuffer
//! pixels are packed little-endian `0xAABBGGRR`.

pub mod arena;
pub mod assembler;
pub mod buffer;
pub mod clip;
pub mod color;
pub mod device;
pub mod framebuffer;
pub mod jobs;
pub mod math;
pub mod pipeline;
pub mod pool;
pub mod raster;
pub mod shader;
pub mod simd;
pub mod texture;
pub mod tiler;
pub mod vao;

pub use self::arena::FrameArena;
pub use self::device::{DeviceOptions, SoftDevice};
pub use self::framebuffer::Framebuffer;
pub use self::jobs::JobSystem;
pub use self::math::{Mat4, Vec4};
pub use self::pipeline::{SoftPipeline, TriangleData};
pub use self::pool::ResourcePool;
pub use self::raster::{RasterState, Rect, RenderTarget};
pub use self::shader::{
    Fragment, Shader, ShaderContext, TextureUnits, VertexInput, VertexOut, MAX_VARYINGS,
};
pub use self::simd::Simd4;
pub use self::texture::Texture;
pub use self::tiler::TileGrid;
