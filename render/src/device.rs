//! Device trait.
//!
//! A device owns the resource pools and consumes command buffers. Resource
//! creation is fallible and returns [Result](crate::error::Result);
//! failures inside a submitted stream are logged and dropped instead, so
//! `submit` never reports an error.

use crate::buffer::BufferDesc;
use crate::command::CommandBuffer;
use crate::error::Result;
use crate::handle::{BufferHandle, PipelineHandle, TextureHandle};
use crate::image::{PixelFormat, PixelType, SamplerDescription, TextureDesc};
use crate::pipeline::PipelineDesc;

pub trait Device {
    // -- buffers ----------------------------------------------------------

    fn create_buffer(&mut self, desc: &BufferDesc) -> Result<BufferHandle>;

    /// Overwrites a byte range of the buffer. The range must lie inside the
    /// buffer's extent.
    fn update_buffer(&mut self, buffer: BufferHandle, offset: usize, data: &[u8]) -> Result<()>;

    /// Copies a byte range between two buffers.
    fn copy_buffer(
        &mut self,
        src: BufferHandle,
        src_offset: usize,
        dst: BufferHandle,
        dst_offset: usize,
        size: usize,
    ) -> Result<()>;

    fn destroy_buffer(&mut self, buffer: BufferHandle);

    // -- textures ---------------------------------------------------------

    fn create_texture(&mut self, desc: &TextureDesc) -> Result<TextureHandle>;

    /// Converts source pixels to the internal packed RGBA8888 layout and
    /// stores them at the given mip level. On unsupported format/type
    /// combinations the texture is left empty and sampling returns the
    /// error color.
    fn upload_texture(
        &mut self,
        texture: TextureHandle,
        level: u32,
        data: &[u8],
        format: PixelFormat,
        ty: PixelType,
    ) -> Result<()>;

    /// Rebuilds the mip chain from level 0 by repeated 2x2 box filtering.
    fn generate_mipmaps(&mut self, texture: TextureHandle);

    fn set_sampler(&mut self, texture: TextureHandle, sampler: &SamplerDescription);

    fn destroy_texture(&mut self, texture: TextureHandle);

    // -- pipelines --------------------------------------------------------

    fn create_pipeline(&mut self, desc: &PipelineDesc) -> Result<PipelineHandle>;

    fn destroy_pipeline(&mut self, pipeline: PipelineHandle);

    // -- execution --------------------------------------------------------

    /// Decodes and executes the packet stream strictly in order.
    fn submit(&mut self, commands: &CommandBuffer);
}
