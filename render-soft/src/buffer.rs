//! Host-memory buffer objects.

use glint_render::{BufferType, BufferUsage};
use log::error;

/// A device buffer: an opaque byte blob with a type tag and usage hint.
pub struct BufferObject {
    pub data: Vec<u8>,
    pub ty: BufferType,
    pub usage: BufferUsage,
    pub label: Option<String>,
}

impl BufferObject {
    pub fn new(ty: BufferType, usage: BufferUsage, size: usize) -> BufferObject {
        BufferObject {
            data: vec![0; size],
            ty,
            usage,
            label: None,
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Bounds-checked range read. Returns `None` (and logs once per call
    /// site semantics are the caller's) when the range runs past the end.
    #[inline]
    pub fn read(&self, offset: usize, len: usize) -> Option<&[u8]> {
        if offset > self.data.len() || self.data.len() - offset < len {
            return None;
        }
        Some(&self.data[offset..offset + len])
    }

    /// Bounds-checked write; rejects partial writes entirely.
    pub fn write(&mut self, offset: usize, bytes: &[u8]) -> bool {
        if offset > self.data.len() || self.data.len() - offset < bytes.len() {
            error!(
                "buffer write overflow: offset {} + {} bytes > size {}",
                offset,
                bytes.len(),
                self.data.len()
            );
            return false;
        }
        self.data[offset..offset + bytes.len()].copy_from_slice(bytes);
        true
    }

    #[inline]
    pub fn read_u8(&self, offset: usize) -> Option<u32> {
        self.read(offset, 1).map(|b| b[0] as u32)
    }

    #[inline]
    pub fn read_u16(&self, offset: usize) -> Option<u32> {
        self.read(offset, 2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]) as u32)
    }

    #[inline]
    pub fn read_u32(&self, offset: usize) -> Option<u32> {
        self.read(offset, 4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    #[inline]
    pub fn read_f32(&self, offset: usize) -> Option<f32> {
        self.read_u32(offset).map(f32::from_bits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_reads() {
        let mut buf = BufferObject::new(BufferType::Vertex, BufferUsage::Immutable, 8);
        assert!(buf.write(0, &[1, 0, 0, 0, 2, 0, 0, 0]));
        assert_eq!(buf.read_u32(4), Some(2));
        assert_eq!(buf.read_u32(5), None);
        assert_eq!(buf.read(8, 1), None);
        assert_eq!(buf.read(8, 0), Some(&[][..]));
    }

    #[test]
    fn rejects_partial_writes() {
        let mut buf = BufferObject::new(BufferType::Vertex, BufferUsage::Dynamic, 4);
        assert!(!buf.write(2, &[0; 4]));
        assert_eq!(buf.data, &[0; 4]);
    }
}
