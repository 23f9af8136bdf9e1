//! Baked vertex-array layout and typed attribute fetch.
//!
//! At pipeline creation the input layout is baked into a fixed attribute
//! table; at draw time each attribute is fetched from its bound vertex
//! stream with a strict bounds check. Rejected reads return the default
//! `(0,0,0,1)` and read nothing.

use crate::buffer::BufferObject;
use crate::math::Vec4;
use crate::pool::ResourcePool;
use glint_render::vertex::{
    VertexFormat, VertexInputState, MAX_VERTEX_ATTRIBUTES, MAX_VERTEX_STREAMS,
};
use glint_render::BufferHandle;
use log::warn;

/// A vertex stream binding established by `SetVertexStream`.
#[derive(Copy, Clone, Debug, Default)]
pub struct StreamBinding {
    pub buffer: BufferHandle,
    pub offset: u32,
    /// 0 falls back to the layout's default stride.
    pub stride: u32,
}

#[derive(Copy, Clone, Debug)]
pub struct BakedAttribute {
    pub binding: u32,
    pub format: VertexFormat,
    pub offset: u32,
    pub divisor: u32,
}

/// Attribute table baked from a pipeline's input layout.
#[derive(Clone, Debug, Default)]
pub struct VertexArrayLayout {
    pub attributes: [Option<BakedAttribute>; MAX_VERTEX_ATTRIBUTES],
    pub default_stride: u32,
}

impl VertexArrayLayout {
    pub fn from_input_state(input: &VertexInputState) -> VertexArrayLayout {
        let mut layout = VertexArrayLayout {
            attributes: Default::default(),
            default_stride: input.stride,
        };
        for attr in input.attributes.iter() {
            if attr.location as usize >= MAX_VERTEX_ATTRIBUTES {
                warn!(
                    "attribute location {} exceeds the {} slots, ignored",
                    attr.location, MAX_VERTEX_ATTRIBUTES
                );
                continue;
            }
            if attr.binding as usize >= MAX_VERTEX_STREAMS {
                warn!(
                    "attribute binding {} exceeds the {} streams, ignored",
                    attr.binding, MAX_VERTEX_STREAMS
                );
                continue;
            }
            layout.attributes[attr.location as usize] = Some(BakedAttribute {
                binding: attr.binding,
                format: attr.format,
                offset: attr.offset,
                divisor: attr.divisor,
            });
        }
        layout
    }
}

/// Fetches one attribute for a (vertex, instance) pair.
pub fn fetch_attribute(
    buffers: &ResourcePool<BufferObject>,
    streams: &[StreamBinding; MAX_VERTEX_STREAMS],
    layout: &VertexArrayLayout,
    attr: &BakedAttribute,
    vertex: u32,
    instance: u32,
) -> Vec4 {
    let stream = &streams[attr.binding as usize];
    let buffer = match buffers.get(stream.buffer.raw()) {
        Some(b) => b,
        None => return Vec4::UNIT_W,
    };

    let effective_index = if attr.divisor == 0 {
        vertex
    } else {
        instance / attr.divisor
    };
    let stride = if stream.stride != 0 {
        stream.stride
    } else if layout.default_stride != 0 {
        layout.default_stride
    } else {
        attr.format.byte_size() as u32
    };
    let offset =
        stream.offset as usize + attr.offset as usize + effective_index as usize * stride as usize;

    let bytes = match buffer.read(offset, attr.format.byte_size()) {
        Some(b) => b,
        None => return Vec4::UNIT_W,
    };

    let mut out = [0.0f32, 0.0, 0.0, 1.0];
    match attr.format {
        VertexFormat::F32 | VertexFormat::F32x2 | VertexFormat::F32x3 | VertexFormat::F32x4 => {
            for (i, chunk) in bytes.chunks_exact(4).enumerate() {
                out[i] = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            }
        }
        VertexFormat::U8x4 => {
            for (i, &b) in bytes.iter().enumerate() {
                out[i] = b as f32;
            }
        }
        VertexFormat::U8x4Norm => {
            for (i, &b) in bytes.iter().enumerate() {
                out[i] = b as f32 / 255.0;
            }
        }
    }
    Vec4::from_array(out)
}
