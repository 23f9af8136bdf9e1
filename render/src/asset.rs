//! Typed asset identifiers and the shared-asset wrapper.
//!
//! Assets (meshes, materials, textures as seen by higher layers) are named
//! by 32-bit ids partitioned like resource handles: a low 20-bit index and
//! a 12-bit generation, with zero meaning invalid. The registry that
//! resolves ids to data lives outside the core; this module only fixes the
//! id layout and the clone/drop ref-counting contract. The asset graph is
//! acyclic, so plain counting is sufficient.

use crate::handle::{HANDLE_GENERATION_MASK, HANDLE_INDEX_BITS, HANDLE_INDEX_MASK};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Typed 32-bit asset id.
pub struct AssetId<T> {
    bits: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> AssetId<T> {
    pub const INVALID: AssetId<T> = AssetId {
        bits: 0,
        _marker: PhantomData,
    };

    pub fn new(index: u32, generation: u32) -> AssetId<T> {
        debug_assert!(index <= HANDLE_INDEX_MASK);
        AssetId {
            bits: ((generation & HANDLE_GENERATION_MASK) << HANDLE_INDEX_BITS) | index,
            _marker: PhantomData,
        }
    }

    pub fn from_bits(bits: u32) -> AssetId<T> {
        AssetId {
            bits,
            _marker: PhantomData,
        }
    }

    #[inline]
    pub fn to_bits(self) -> u32 {
        self.bits
    }

    #[inline]
    pub fn index(self) -> u32 {
        self.bits & HANDLE_INDEX_MASK
    }

    #[inline]
    pub fn generation(self) -> u32 {
        self.bits >> HANDLE_INDEX_BITS
    }

    #[inline]
    pub fn is_valid(self) -> bool {
        self.index() != 0
    }
}

impl<T> Copy for AssetId<T> {}

impl<T> Clone for AssetId<T> {
    fn clone(&self) -> AssetId<T> {
        *self
    }
}

impl<T> PartialEq for AssetId<T> {
    fn eq(&self, other: &AssetId<T>) -> bool {
        self.bits == other.bits
    }
}

impl<T> Eq for AssetId<T> {}

impl<T> fmt::Debug for AssetId<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "AssetId({}:{})", self.index(), self.generation())
    }
}

impl<T> Default for AssetId<T> {
    fn default() -> AssetId<T> {
        AssetId::INVALID
    }
}

/// External reference counter driven by [SharedAsset] clones and drops.
pub trait AssetCounters: Send + Sync {
    fn retain(&self, id: u32);
    fn release(&self, id: u32);
}

/// Ref-counting wrapper around an asset id.
///
/// Construction takes ownership of one reference already held on the id;
/// cloning retains another, dropping releases one. Invalid ids are inert.
pub struct SharedAsset<T> {
    id: AssetId<T>,
    counters: Arc<dyn AssetCounters>,
}

impl<T> SharedAsset<T> {
    pub fn new(id: AssetId<T>, counters: Arc<dyn AssetCounters>) -> SharedAsset<T> {
        SharedAsset { id, counters }
    }

    #[inline]
    pub fn id(&self) -> AssetId<T> {
        self.id
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.id.is_valid()
    }
}

impl<T> Clone for SharedAsset<T> {
    fn clone(&self) -> SharedAsset<T> {
        if self.id.is_valid() {
            self.counters.retain(self.id.to_bits());
        }
        SharedAsset {
            id: self.id,
            counters: self.counters.clone(),
        }
    }
}

impl<T> Drop for SharedAsset<T> {
    fn drop(&mut self) {
        if self.id.is_valid() {
            self.counters.release(self.id.to_bits());
        }
    }
}

impl<T> fmt::Debug for SharedAsset<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "SharedAsset({:?})", self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};

    struct Counter(AtomicI32);

    impl AssetCounters for Counter {
        fn retain(&self, _id: u32) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
        fn release(&self, _id: u32) {
            self.0.fetch_sub(1, Ordering::SeqCst);
        }
    }

    struct Mesh;

    #[test]
    fn clone_and_drop_balance() {
        let counters = Arc::new(Counter(AtomicI32::new(1)));
        let id = AssetId::<Mesh>::new(4, 1);
        let a = SharedAsset::new(id, counters.clone());
        {
            let b = a.clone();
            let _c = b.clone();
            assert_eq!(counters.0.load(Ordering::SeqCst), 3);
        }
        assert_eq!(counters.0.load(Ordering::SeqCst), 1);
        drop(a);
        assert_eq!(counters.0.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn invalid_asset_never_counts() {
        let counters = Arc::new(Counter(AtomicI32::new(0)));
        let a = SharedAsset::new(AssetId::<Mesh>::INVALID, counters.clone());
        let _b = a.clone();
        drop(a);
        assert_eq!(counters.0.load(Ordering::SeqCst), 0);
    }
}
