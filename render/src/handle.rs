//! Generation-tagged resource handles.
//!
//! Every device resource is referenced through a small copyable handle that
//! packs a pool slot index and a generation counter into a single `u32`.
//! The low 20 bits are the slot index, the high 12 bits the generation of
//! the slot when the handle was issued. Index 0 is reserved, so a zeroed
//! handle is always invalid and `Default` yields the null handle.

pub const HANDLE_INDEX_BITS: u32 = 20;
pub const HANDLE_GENERATION_BITS: u32 = 12;
pub const HANDLE_INDEX_MASK: u32 = (1 << HANDLE_INDEX_BITS) - 1;
pub const HANDLE_GENERATION_MASK: u32 = (1 << HANDLE_GENERATION_BITS) - 1;

/// Untyped index+generation pair shared by all handle types.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub struct RawHandle(u32);

impl RawHandle {
    pub const NULL: RawHandle = RawHandle(0);

    pub fn new(index: u32, generation: u32) -> RawHandle {
        debug_assert!(index <= HANDLE_INDEX_MASK);
        RawHandle(((generation & HANDLE_GENERATION_MASK) << HANDLE_INDEX_BITS) | index)
    }

    #[inline]
    pub fn index(self) -> u32 {
        self.0 & HANDLE_INDEX_MASK
    }

    #[inline]
    pub fn generation(self) -> u32 {
        self.0 >> HANDLE_INDEX_BITS
    }

    #[inline]
    pub fn is_null(self) -> bool {
        self.index() == 0
    }

    /// Raw bit pattern, as written into the command stream.
    #[inline]
    pub fn to_bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn from_bits(bits: u32) -> RawHandle {
        RawHandle(bits)
    }
}

macro_rules! define_handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
        pub struct $name(pub RawHandle);

        impl $name {
            pub const NULL: $name = $name(RawHandle::NULL);

            #[inline]
            pub fn raw(self) -> RawHandle {
                self.0
            }

            #[inline]
            pub fn is_null(self) -> bool {
                self.0.is_null()
            }
        }

        impl From<RawHandle> for $name {
            fn from(raw: RawHandle) -> $name {
                $name(raw)
            }
        }
    };
}

define_handle! {
    /// Handle to a device buffer (vertex, index or uniform).
    BufferHandle
}
define_handle! {
    /// Handle to a device texture with its mip chain and sampler state.
    TextureHandle
}
define_handle! {
    /// Handle to a registered shader factory.
    ShaderHandle
}
define_handle! {
    /// Handle to a compiled pipeline state object.
    PipelineHandle
}
