//! Vertex input layout and index formats.

/// Number of vertex attribute slots in a layout.
pub const MAX_VERTEX_ATTRIBUTES: usize = 8;
/// Number of vertex buffer binding slots.
pub const MAX_VERTEX_STREAMS: usize = 8;

/// In-memory format of a single vertex attribute.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum VertexFormat {
    F32,
    F32x2,
    F32x3,
    F32x4,
    U8x4,
    /// Four unsigned bytes, divided by 255 on fetch.
    U8x4Norm,
}

impl VertexFormat {
    /// Number of components read into the shader vector.
    pub fn component_count(self) -> usize {
        match self {
            VertexFormat::F32 => 1,
            VertexFormat::F32x2 => 2,
            VertexFormat::F32x3 => 3,
            VertexFormat::F32x4 => 4,
            VertexFormat::U8x4 | VertexFormat::U8x4Norm => 4,
        }
    }

    /// Size of the attribute in the vertex buffer, in bytes.
    pub fn byte_size(self) -> usize {
        match self {
            VertexFormat::F32 => 4,
            VertexFormat::F32x2 => 8,
            VertexFormat::F32x3 => 12,
            VertexFormat::F32x4 => 16,
            VertexFormat::U8x4 | VertexFormat::U8x4Norm => 4,
        }
    }
}

/// Format of indices in an index buffer.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum IndexFormat {
    U8,
    U16,
    U32,
}

impl IndexFormat {
    pub fn byte_size(self) -> usize {
        match self {
            IndexFormat::U8 => 1,
            IndexFormat::U16 => 2,
            IndexFormat::U32 => 4,
        }
    }
}

/// Description of one vertex attribute within the input layout.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct VertexAttributeDescription {
    /// Attribute index seen by the vertex shader.
    pub location: u32,
    /// Vertex stream binding slot the attribute reads from.
    pub binding: u32,
    pub format: VertexFormat,
    /// Byte offset of the attribute within one stride.
    pub offset: u32,
    /// 0 advances per vertex; N advances once every N instances.
    pub divisor: u32,
}

impl VertexAttributeDescription {
    pub fn new(location: u32, format: VertexFormat, offset: u32) -> VertexAttributeDescription {
        VertexAttributeDescription {
            location,
            binding: 0,
            format,
            offset,
            divisor: 0,
        }
    }

    pub fn with_binding(mut self, binding: u32) -> VertexAttributeDescription {
        self.binding = binding;
        self
    }

    pub fn per_instance(mut self, divisor: u32) -> VertexAttributeDescription {
        self.divisor = divisor;
        self
    }
}

/// Complete vertex input layout of a pipeline.
#[derive(Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct VertexInputState {
    /// Default byte stride used for streams bound with stride 0.
    pub stride: u32,
    pub attributes: Vec<VertexAttributeDescription>,
}

impl VertexInputState {
    pub fn new(stride: u32, attributes: Vec<VertexAttributeDescription>) -> VertexInputState {
        VertexInputState { stride, attributes }
    }
}
