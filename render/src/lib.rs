//! Render hardware interface for the glint software rasterizer.
//!
//! The interface is deliberately small and concrete: resources are named by
//! generation-checked integer handles, draw state is bundled into pipeline
//! state objects, and all per-frame work is recorded by a
//! [CommandEncoder] into a packet stream that a [Device] consumes strictly
//! in order. The packet layout is documented in [command]; every packet is
//! self-describing so decoders can skip types they do not know.
//!
//! Screen space is y-down: pixel (0, 0) is the top-left corner of the
//! framebuffer, matching raster memory layout. Window depth is in [0, 1].

pub mod asset;
pub mod buffer;
pub mod command;
pub mod device;
pub mod encoder;
pub mod error;
pub mod handle;
pub mod image;
pub mod pass;
pub mod pipeline;
pub mod vertex;

pub use self::asset::{AssetCounters, AssetId, SharedAsset};
pub use self::buffer::{BufferDesc, BufferType, BufferUsage};
pub use self::command::{
    Command, CommandBuffer, CommandType, Packets, RawPacket, UNIFORM_SLOT_COUNT,
    UNIFORM_SLOT_SIZE, UNIFORM_STAGING_SIZE,
};
pub use self::device::Device;
pub use self::encoder::{uniform_bytes, CommandEncoder};
pub use self::error::{Error, Result};
pub use self::handle::{BufferHandle, PipelineHandle, RawHandle, ShaderHandle, TextureHandle};
pub use self::image::{
    mip_level_count, Filter, MinFilter, PixelFormat, PixelType, SamplerDescription, TextureDesc,
    WrapMode, MAX_TEXTURE_SLOTS,
};
pub use self::pass::{ClearFlags, LoadOp, RenderPassDesc, RenderRect, StoreOp};
pub use self::pipeline::{
    BlendFactor, BlendOp, ColorBlendState, CompareOp, CullMode, DepthStencilState, FrontFace,
    PipelineDesc, PolygonMode, PrimitiveTopology, Scissor, ScissorRect, StencilOp, StencilOpState,
    StencilTest, Viewport,
};
pub use self::vertex::{
    IndexFormat, VertexAttributeDescription, VertexFormat, VertexInputState,
    MAX_VERTEX_ATTRIBUTES, MAX_VERTEX_STREAMS,
};
