//! Command encoder.
//!
//! The encoder serializes state changes and draws into the packet stream
//! consumed by a device. It is a thin, allocation-light writer; validation
//! is limited to what can be checked at encode time (pass pairing, uniform
//! slot ranges). Violations are logged and the offending packet is dropped,
//! never silently encoded.

use crate::command::{CommandBuffer, CommandType, UNIFORM_SLOT_COUNT, UNIFORM_SLOT_SIZE};
use crate::handle::{BufferHandle, PipelineHandle, TextureHandle};
use crate::pass::{RenderPassDesc, RenderRect};
use crate::pipeline::Viewport;
use log::error;
use std::mem;
use std::slice;

pub struct CommandEncoder {
    buffer: CommandBuffer,
    inside_pass: bool,
}

impl CommandEncoder {
    pub fn new() -> CommandEncoder {
        CommandEncoder {
            buffer: CommandBuffer::new(),
            inside_pass: false,
        }
    }

    /// Clears the recorded stream for reuse.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.inside_pass = false;
    }

    pub fn buffer(&self) -> &CommandBuffer {
        &self.buffer
    }

    pub fn into_buffer(self) -> CommandBuffer {
        self.buffer
    }

    // -- state ------------------------------------------------------------

    pub fn set_pipeline(&mut self, pipeline: PipelineHandle) {
        let p = self.buffer.begin_packet(CommandType::SetPipeline);
        self.buffer.push_u32(pipeline.raw().to_bits());
        self.buffer.end_packet(p);
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        let p = self.buffer.begin_packet(CommandType::SetViewport);
        self.buffer.push_f32(viewport.x);
        self.buffer.push_f32(viewport.y);
        self.buffer.push_f32(viewport.width);
        self.buffer.push_f32(viewport.height);
        self.buffer.end_packet(p);
    }

    /// A negative width disables the scissor test.
    pub fn set_scissor(&mut self, x: i32, y: i32, w: i32, h: i32) {
        let p = self.buffer.begin_packet(CommandType::SetScissor);
        self.buffer.push_i32(x);
        self.buffer.push_i32(y);
        self.buffer.push_i32(w);
        self.buffer.push_i32(h);
        self.buffer.end_packet(p);
    }

    pub fn disable_scissor(&mut self) {
        self.set_scissor(0, 0, -1, -1);
    }

    /// Convenience: bind stream 0 with the pipeline's default stride.
    pub fn set_vertex_buffer(&mut self, buffer: BufferHandle, offset: u32) {
        self.set_vertex_stream(0, buffer, offset, 0);
    }

    /// Binds a buffer range to a vertex stream slot. A zero stride falls
    /// back to the pipeline input layout's default stride.
    pub fn set_vertex_stream(
        &mut self,
        binding: u16,
        buffer: BufferHandle,
        offset: u32,
        stride: u32,
    ) {
        let p = self.buffer.begin_packet(CommandType::SetVertexStream);
        self.buffer.push_u16(binding);
        self.buffer.push_u32(buffer.raw().to_bits());
        self.buffer.push_u32(offset);
        self.buffer.push_u32(stride);
        self.buffer.end_packet(p);
    }

    pub fn set_index_buffer(&mut self, buffer: BufferHandle, offset: u32) {
        let p = self.buffer.begin_packet(CommandType::SetIndexBuffer);
        self.buffer.push_u32(buffer.raw().to_bits());
        self.buffer.push_u32(offset);
        self.buffer.end_packet(p);
    }

    pub fn set_texture(&mut self, slot: u8, texture: TextureHandle) {
        let p = self.buffer.begin_packet(CommandType::SetTexture);
        self.buffer.push_u8(slot);
        self.buffer.push_u32(texture.raw().to_bits());
        self.buffer.end_packet(p);
    }

    // -- data --------------------------------------------------------------

    /// Stages uniform bytes into a slot. Only the most recent bytes written
    /// to a slot before a draw take effect.
    pub fn update_uniform(&mut self, slot: u8, data: &[u8]) {
        if slot as usize >= UNIFORM_SLOT_COUNT {
            error!("update_uniform: slot {} out of range, packet dropped", slot);
            return;
        }
        if data.len() > UNIFORM_SLOT_SIZE {
            error!(
                "update_uniform: {} bytes exceed the {}-byte slot, packet dropped",
                data.len(),
                UNIFORM_SLOT_SIZE
            );
            return;
        }
        let p = self.buffer.begin_packet(CommandType::UpdateUniform);
        self.buffer.push_u8(slot);
        self.buffer.push_bytes(data);
        self.buffer.end_packet(p);
    }

    /// Stages a plain-data value into a uniform slot.
    pub fn update_uniform_value<T: Copy>(&mut self, slot: u8, value: &T) {
        self.update_uniform(slot, uniform_bytes(value));
    }

    // -- clears and passes -------------------------------------------------

    pub fn clear(&mut self, color: [f32; 4], depth: f32, stencil: u8, flags: crate::ClearFlags) {
        let p = self.buffer.begin_packet(CommandType::Clear);
        for &c in color.iter() {
            self.buffer.push_f32(c);
        }
        self.buffer.push_f32(depth);
        self.buffer.push_u8(stencil);
        self.buffer.push_u8(flags.bits());
        self.buffer.end_packet(p);
    }

    pub fn begin_render_pass(&mut self, desc: &RenderPassDesc) {
        if self.inside_pass {
            error!("begin_render_pass inside an open pass, packet dropped");
            return;
        }
        self.inside_pass = true;
        let p = self.buffer.begin_packet(CommandType::BeginPass);
        self.buffer.push_u8(desc.color_load_op as u8);
        self.buffer.push_u8(desc.depth_load_op as u8);
        self.buffer.push_u8(desc.color_store_op as u8);
        self.buffer.push_u8(desc.depth_store_op as u8);
        for &c in desc.clear_color.iter() {
            self.buffer.push_f32(c);
        }
        self.buffer.push_f32(desc.clear_depth);
        self.buffer.push_u8(desc.clear_stencil);
        self.push_rect(desc.initial_scissor);
        self.push_rect(desc.initial_viewport);
        self.push_rect(desc.render_area);
        self.buffer.end_packet(p);
    }

    pub fn end_render_pass(&mut self) {
        if !self.inside_pass {
            error!("end_render_pass without an open pass, packet dropped");
            return;
        }
        self.inside_pass = false;
        let p = self.buffer.begin_packet(CommandType::EndPass);
        self.buffer.end_packet(p);
    }

    // -- draws -------------------------------------------------------------

    pub fn draw(&mut self, vertex_count: u32, first_vertex: u32, instance_count: u32) {
        let p = self.buffer.begin_packet(CommandType::Draw);
        self.buffer.push_u32(vertex_count);
        self.buffer.push_u32(first_vertex);
        self.buffer.push_u32(instance_count);
        self.buffer.end_packet(p);
    }

    pub fn draw_indexed(
        &mut self,
        index_count: u32,
        first_index: u32,
        base_vertex: i32,
        instance_count: u32,
    ) {
        let p = self.buffer.begin_packet(CommandType::DrawIndexed);
        self.buffer.push_u32(index_count);
        self.buffer.push_u32(first_index);
        self.buffer.push_i32(base_vertex);
        self.buffer.push_u32(instance_count);
        self.buffer.end_packet(p);
    }

    fn push_rect(&mut self, rect: RenderRect) {
        self.buffer.push_i32(rect.x);
        self.buffer.push_i32(rect.y);
        self.buffer.push_i32(rect.w);
        self.buffer.push_i32(rect.h);
    }
}

impl Default for CommandEncoder {
    fn default() -> CommandEncoder {
        CommandEncoder::new()
    }
}

/// Views a plain-data value as the byte slice staged into a uniform slot.
pub fn uniform_bytes<T: Copy>(value: &T) -> &[u8] {
    unsafe { slice::from_raw_parts(value as *const T as *const u8, mem::size_of::<T>()) }
}
