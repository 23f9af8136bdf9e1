//! Generation-checked resource pools.
//!
//! A pool is a slot vector plus a free list. Slot 0 is permanently
//! reserved so the null handle never resolves. Releasing a slot bumps its
//! generation, which invalidates every handle issued for the previous
//! occupant: use-after-release lookups return `None` and the caller treats
//! the operation as a no-op.

use glint_render::handle::{RawHandle, HANDLE_GENERATION_MASK, HANDLE_INDEX_MASK};
use log::error;

struct Slot<T> {
    payload: Option<T>,
    generation: u32,
}

pub struct ResourcePool<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
}

impl<T> ResourcePool<T> {
    pub fn new() -> ResourcePool<T> {
        ResourcePool {
            // slot 0 reserved as the null slot
            slots: vec![Slot {
                payload: None,
                generation: 0,
            }],
            free: Vec::new(),
        }
    }

    /// Stores a payload and returns its handle. Freed indices are reused;
    /// reuse keeps the bumped generation so stale handles stay dead.
    pub fn allocate(&mut self, payload: T) -> RawHandle {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.payload = Some(payload);
            return RawHandle::new(index, slot.generation);
        }
        let index = self.slots.len() as u32;
        if index > HANDLE_INDEX_MASK {
            // exhausting 2^20 live slots means the caller is leaking
            error!("resource pool exhausted ({} slots)", index);
            return RawHandle::NULL;
        }
        self.slots.push(Slot {
            payload: Some(payload),
            generation: 0,
        });
        RawHandle::new(index, 0)
    }

    /// Frees the slot and returns the payload so the caller can run any
    /// deleter it needs. Stale or null handles are a logged no-op.
    pub fn release(&mut self, handle: RawHandle) -> Option<T> {
        let index = handle.index() as usize;
        if !self.check(handle) {
            return None;
        }
        let slot = &mut self.slots[index];
        let payload = slot.payload.take();
        slot.generation = slot.generation.wrapping_add(1) & HANDLE_GENERATION_MASK;
        self.free.push(index as u32);
        payload
    }

    pub fn get(&self, handle: RawHandle) -> Option<&T> {
        let index = handle.index() as usize;
        if !self.check(handle) {
            return None;
        }
        self.slots[index].payload.as_ref()
    }

    pub fn get_mut(&mut self, handle: RawHandle) -> Option<&mut T> {
        let index = handle.index() as usize;
        if !self.check(handle) {
            return None;
        }
        self.slots[index].payload.as_mut()
    }

    /// Number of live payloads.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.payload.is_some()).count()
    }

    fn check(&self, handle: RawHandle) -> bool {
        let index = handle.index() as usize;
        !handle.is_null()
            && index < self.slots.len()
            && self.slots[index].payload.is_some()
            && self.slots[index].generation == handle.generation()
    }
}

impl<T> Default for ResourcePool<T> {
    fn default() -> ResourcePool<T> {
        ResourcePool::new()
    }
}
