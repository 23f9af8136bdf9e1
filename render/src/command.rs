//! Command packet stream.
//!
//! Commands are serialized into a densely packed byte vector. Every packet
//! starts with a `{ type: u8, size: u16 }` header where `size` is the total
//! packet length including the header, so a decoder can step over packets
//! it does not recognize. The stream is produced and consumed in the same
//! process and is not portable across endiannesses.

use crate::handle::{BufferHandle, PipelineHandle, RawHandle, TextureHandle};
use crate::pass::{ClearFlags, LoadOp, RenderPassDesc, RenderRect, StoreOp};
use crate::pipeline::Viewport;
use log::warn;

/// Number of uniform staging slots on the device.
pub const UNIFORM_SLOT_COUNT: usize = 16;
/// Byte stride of one staging slot: slot `s` lives at byte `s * 256`.
pub const UNIFORM_SLOT_SIZE: usize = 256;
/// Total staging size snapshotted per draw.
pub const UNIFORM_STAGING_SIZE: usize = UNIFORM_SLOT_COUNT * UNIFORM_SLOT_SIZE;

const PACKET_HEADER_SIZE: usize = 3;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[repr(u8)]
pub enum CommandType {
    SetPipeline = 1,
    SetViewport = 2,
    SetScissor = 3,
    SetVertexStream = 4,
    SetIndexBuffer = 5,
    SetTexture = 6,
    UpdateUniform = 7,
    Clear = 8,
    BeginPass = 9,
    EndPass = 10,
    Draw = 11,
    DrawIndexed = 12,
}

impl CommandType {
    pub fn from_u8(v: u8) -> Option<CommandType> {
        Some(match v {
            1 => CommandType::SetPipeline,
            2 => CommandType::SetViewport,
            3 => CommandType::SetScissor,
            4 => CommandType::SetVertexStream,
            5 => CommandType::SetIndexBuffer,
            6 => CommandType::SetTexture,
            7 => CommandType::UpdateUniform,
            8 => CommandType::Clear,
            9 => CommandType::BeginPass,
            10 => CommandType::EndPass,
            11 => CommandType::Draw,
            12 => CommandType::DrawIndexed,
            _ => return None,
        })
    }
}

/// A recorded stream of command packets.
#[derive(Clone, Default)]
pub struct CommandBuffer {
    data: Vec<u8>,
}

impl CommandBuffer {
    pub fn new() -> CommandBuffer {
        CommandBuffer::with_capacity(4096)
    }

    pub fn with_capacity(capacity: usize) -> CommandBuffer {
        CommandBuffer {
            data: Vec::with_capacity(capacity),
        }
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Iterates over the packets of the stream.
    pub fn packets(&self) -> Packets {
        Packets { rest: &self.data }
    }

    // -- packet writer, used by the encoder ------------------------------

    pub(crate) fn begin_packet(&mut self, ty: CommandType) -> usize {
        let start = self.data.len();
        self.data.push(ty as u8);
        self.data.extend_from_slice(&[0, 0]);
        start
    }

    pub(crate) fn end_packet(&mut self, start: usize) {
        let size = self.data.len() - start;
        debug_assert!(size <= u16::max_value() as usize);
        let bytes = (size as u16).to_le_bytes();
        self.data[start + 1] = bytes[0];
        self.data[start + 2] = bytes[1];
    }

    pub(crate) fn push_u8(&mut self, v: u8) {
        self.data.push(v);
    }

    pub(crate) fn push_u16(&mut self, v: u16) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    pub(crate) fn push_u32(&mut self, v: u32) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    pub(crate) fn push_i32(&mut self, v: i32) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    pub(crate) fn push_f32(&mut self, v: f32) {
        self.data.extend_from_slice(&v.to_le_bytes());
    }

    pub(crate) fn push_bytes(&mut self, v: &[u8]) {
        self.data.extend_from_slice(v);
    }
}

/// Undecoded packet: the raw type byte and the payload after the header.
#[derive(Copy, Clone)]
pub struct RawPacket<'a> {
    pub ty: u8,
    pub payload: &'a [u8],
}

pub struct Packets<'a> {
    rest: &'a [u8],
}

impl<'a> Iterator for Packets<'a> {
    type Item = RawPacket<'a>;

    fn next(&mut self) -> Option<RawPacket<'a>> {
        if self.rest.is_empty() {
            return None;
        }
        if self.rest.len() < PACKET_HEADER_SIZE {
            warn!("truncated packet header at end of command stream");
            self.rest = &[];
            return None;
        }
        let ty = self.rest[0];
        let size = u16::from_le_bytes([self.rest[1], self.rest[2]]) as usize;
        if size < PACKET_HEADER_SIZE || size > self.rest.len() {
            warn!("malformed packet size {} in command stream", size);
            self.rest = &[];
            return None;
        }
        let payload = &self.rest[PACKET_HEADER_SIZE..size];
        self.rest = &self.rest[size..];
        Some(RawPacket { ty, payload })
    }
}

/// A decoded command. Borrowed payloads point into the command buffer.
#[derive(Debug)]
pub enum Command<'a> {
    SetPipeline {
        pipeline: PipelineHandle,
    },
    SetViewport {
        viewport: Viewport,
    },
    /// A negative width disables the scissor test.
    SetScissor {
        x: i32,
        y: i32,
        w: i32,
        h: i32,
    },
    SetVertexStream {
        binding: u16,
        buffer: BufferHandle,
        offset: u32,
        stride: u32,
    },
    SetIndexBuffer {
        buffer: BufferHandle,
        offset: u32,
    },
    SetTexture {
        slot: u8,
        texture: TextureHandle,
    },
    UpdateUniform {
        slot: u8,
        data: &'a [u8],
    },
    Clear {
        color: [f32; 4],
        depth: f32,
        stencil: u8,
        flags: ClearFlags,
    },
    BeginPass {
        desc: RenderPassDesc,
    },
    EndPass,
    Draw {
        vertex_count: u32,
        first_vertex: u32,
        instance_count: u32,
    },
    DrawIndexed {
        index_count: u32,
        first_index: u32,
        base_vertex: i32,
        instance_count: u32,
    },
}

impl<'a> RawPacket<'a> {
    /// Decodes the packet. `None` means the payload was shorter than the
    /// fields of the recognized type; unknown types also return `None` and
    /// are skipped by the caller.
    pub fn decode(&self) -> Option<Command<'a>> {
        let ty = CommandType::from_u8(self.ty)?;
        let mut r = Reader {
            buf: self.payload,
            pos: 0,
        };
        Some(match ty {
            CommandType::SetPipeline => Command::SetPipeline {
                pipeline: PipelineHandle(RawHandle::from_bits(r.u32()?)),
            },
            CommandType::SetViewport => Command::SetViewport {
                viewport: Viewport {
                    x: r.f32()?,
                    y: r.f32()?,
                    width: r.f32()?,
                    height: r.f32()?,
                },
            },
            CommandType::SetScissor => Command::SetScissor {
                x: r.i32()?,
                y: r.i32()?,
                w: r.i32()?,
                h: r.i32()?,
            },
            CommandType::SetVertexStream => Command::SetVertexStream {
                binding: r.u16()?,
                buffer: BufferHandle(RawHandle::from_bits(r.u32()?)),
                offset: r.u32()?,
                stride: r.u32()?,
            },
            CommandType::SetIndexBuffer => Command::SetIndexBuffer {
                buffer: BufferHandle(RawHandle::from_bits(r.u32()?)),
                offset: r.u32()?,
            },
            CommandType::SetTexture => Command::SetTexture {
                slot: r.u8()?,
                texture: TextureHandle(RawHandle::from_bits(r.u32()?)),
            },
            CommandType::UpdateUniform => {
                let slot = r.u8()?;
                Command::UpdateUniform {
                    slot,
                    data: r.rest(),
                }
            }
            CommandType::Clear => Command::Clear {
                color: [r.f32()?, r.f32()?, r.f32()?, r.f32()?],
                depth: r.f32()?,
                stencil: r.u8()?,
                flags: ClearFlags::from_bits_truncate(r.u8()?),
            },
            CommandType::BeginPass => Command::BeginPass {
                desc: RenderPassDesc {
                    color_load_op: load_op_from_u8(r.u8()?),
                    depth_load_op: load_op_from_u8(r.u8()?),
                    color_store_op: store_op_from_u8(r.u8()?),
                    depth_store_op: store_op_from_u8(r.u8()?),
                    clear_color: [r.f32()?, r.f32()?, r.f32()?, r.f32()?],
                    clear_depth: r.f32()?,
                    clear_stencil: r.u8()?,
                    initial_scissor: r.rect()?,
                    initial_viewport: r.rect()?,
                    render_area: r.rect()?,
                },
            },
            CommandType::EndPass => Command::EndPass,
            CommandType::Draw => Command::Draw {
                vertex_count: r.u32()?,
                first_vertex: r.u32()?,
                instance_count: r.u32()?,
            },
            CommandType::DrawIndexed => Command::DrawIndexed {
                index_count: r.u32()?,
                first_index: r.u32()?,
                base_vertex: r.i32()?,
                instance_count: r.u32()?,
            },
        })
    }
}

fn load_op_from_u8(v: u8) -> LoadOp {
    match v {
        0 => LoadOp::Load,
        1 => LoadOp::Clear,
        _ => LoadOp::DontCare,
    }
}

fn store_op_from_u8(v: u8) -> StoreOp {
    match v {
        0 => StoreOp::Store,
        _ => StoreOp::DontCare,
    }
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.pos + n > self.buf.len() {
            return None;
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Some(slice)
    }

    fn u8(&mut self) -> Option<u8> {
        self.take(1).map(|b| b[0])
    }

    fn u16(&mut self) -> Option<u16> {
        self.take(2).map(|b| u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Option<u32> {
        self.take(4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn i32(&mut self) -> Option<i32> {
        self.take(4)
            .map(|b| i32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn f32(&mut self) -> Option<f32> {
        self.u32().map(f32::from_bits)
    }

    fn rect(&mut self) -> Option<RenderRect> {
        Some(RenderRect {
            x: self.i32()?,
            y: self.i32()?,
            w: self.i32()?,
            h: self.i32()?,
        })
    }

    fn rest(&mut self) -> &'a [u8] {
        let slice = &self.buf[self.pos..];
        self.pos = self.buf.len();
        slice
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoder::CommandEncoder;
    use crate::handle::RawHandle;

    #[test]
    fn packet_round_trip() {
        let mut enc = CommandEncoder::new();
        let pipeline = PipelineHandle(RawHandle::new(3, 1));
        let vbo = BufferHandle(RawHandle::new(5, 2));
        enc.set_pipeline(pipeline);
        enc.set_viewport(Viewport {
            x: 0.0,
            y: 0.0,
            width: 64.0,
            height: 32.0,
        });
        enc.set_vertex_stream(2, vbo, 16, 24);
        enc.update_uniform(1, &[1, 2, 3, 4]);
        enc.draw(3, 0, 1);

        let decoded: Vec<_> = enc
            .buffer()
            .packets()
            .map(|p| p.decode().expect("decode"))
            .collect();
        assert_eq!(decoded.len(), 5);
        match &decoded[0] {
            Command::SetPipeline { pipeline: p } => assert_eq!(*p, pipeline),
            other => panic!("unexpected {:?}", other),
        }
        match &decoded[2] {
            Command::SetVertexStream {
                binding,
                buffer,
                offset,
                stride,
            } => {
                assert_eq!((*binding, *buffer, *offset, *stride), (2, vbo, 16, 24));
            }
            other => panic!("unexpected {:?}", other),
        }
        match &decoded[3] {
            Command::UpdateUniform { slot, data } => {
                assert_eq!(*slot, 1);
                assert_eq!(*data, &[1, 2, 3, 4][..]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn unknown_packets_are_skipped_by_size() {
        let mut enc = CommandEncoder::new();
        enc.draw(3, 0, 1);
        let mut bytes = enc.buffer().data().to_vec();
        // splice an unknown packet in front
        let mut stream = vec![0xEE, 6, 0, 0xAA, 0xBB, 0xCC];
        stream.append(&mut bytes);
        let buf = {
            let mut b = CommandBuffer::new();
            b.push_bytes(&stream);
            b
        };
        let packets: Vec<_> = buf.packets().collect();
        assert_eq!(packets.len(), 2);
        assert!(packets[0].decode().is_none());
        assert!(match packets[1].decode() {
            Some(Command::Draw { vertex_count, .. }) => vertex_count == 3,
            _ => false,
        });
    }
}
