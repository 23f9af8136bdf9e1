//! Buffer descriptors.

/// What the buffer is bound as at draw time.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BufferType {
    Vertex,
    Index,
    Uniform,
}

/// Update-frequency hint. The software device keeps all buffers in host
/// memory, so this only informs validation and logging.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum BufferUsage {
    /// Data uploaded once, never changed.
    Immutable,
    /// Data updated frequently (per frame).
    Dynamic,
    /// Data rewritten every frame and discarded.
    Stream,
}

/// Creation parameters for a device buffer.
#[derive(Copy, Clone, Debug)]
pub struct BufferDesc<'a> {
    pub ty: BufferType,
    pub usage: BufferUsage,
    pub size: usize,
    pub initial_data: Option<&'a [u8]>,
    pub label: Option<&'a str>,
}

impl<'a> BufferDesc<'a> {
    pub fn new(ty: BufferType, size: usize) -> BufferDesc<'a> {
        BufferDesc {
            ty,
            usage: BufferUsage::Immutable,
            size,
            initial_data: None,
            label: None,
        }
    }

    pub fn with_data(ty: BufferType, data: &'a [u8]) -> BufferDesc<'a> {
        BufferDesc {
            ty,
            usage: BufferUsage::Immutable,
            size: data.len(),
            initial_data: Some(data),
            label: None,
        }
    }
}
