//! Parallel slot arrays for keys, values and cached hashes.
//!
//! During a resize both generations index the very same arrays, so the
//! capacity of the arrays is the larger of the two generation sizes. The
//! arrays carry no per slot initialization state, the occupancy bits of the
//! table decide which slots hold data.

use crate::util::{allocate, deallocate, reallocate, AllocationKind};
use allocator_api2::alloc::Allocator;
use std::mem::MaybeUninit;
use std::ptr::NonNull;

/// A raw buffer of `cap` possibly uninitialized elements of type T.
struct SlotBuf<T> {
    ptr: NonNull<T>,
    cap: usize,
}

impl<T> SlotBuf<T> {
    const fn empty() -> Self {
        SlotBuf {
            ptr: NonNull::dangling(),
            cap: 0,
        }
    }

    fn release_in<A: Allocator>(&mut self, allocator: &A) {
        deallocate::<T, A>(allocator, self.ptr, self.cap);
        *self = Self::empty();
    }
}

impl<T: Copy> SlotBuf<T> {
    fn resize_in<A: Allocator>(&mut self, allocator: &A, cap: usize) {
        if self.cap == 0 {
            self.ptr = allocate::<T, A>(allocator, cap, AllocationKind::Uninitialized);
        } else {
            self.ptr = reallocate::<T, A>(allocator, self.ptr, self.cap, cap);
        }
        self.cap = cap;
    }

    #[inline]
    fn slot(&self, pos: usize) -> *mut T {
        debug_assert!(pos < self.cap || std::mem::size_of::<T>() == 0);
        // SAFETY: callers keep `pos` within the `cap` elements of the buffer.
        unsafe { self.ptr.as_ptr().add(pos) }
    }

    /// # Safety
    ///
    /// The element at `pos` must have been written.
    #[inline]
    unsafe fn get(&self, pos: usize) -> &T {
        &*self.slot(pos)
    }

    /// # Safety
    ///
    /// The element at `pos` must have been written.
    #[inline]
    unsafe fn get_mut(&mut self, pos: usize) -> &mut T {
        &mut *self.slot(pos)
    }

    #[inline]
    fn write(&mut self, pos: usize, value: T) {
        // SAFETY: in bounds, and T is Copy so nothing is leaked.
        unsafe { self.slot(pos).write(value) }
    }

    #[inline]
    fn read_raw(&self, pos: usize) -> MaybeUninit<T> {
        // SAFETY: in bounds; reading as MaybeUninit never asserts validity.
        unsafe { self.slot(pos).cast::<MaybeUninit<T>>().read() }
    }

    #[inline]
    fn write_raw(&mut self, pos: usize, value: MaybeUninit<T>) {
        // SAFETY: in bounds.
        unsafe { self.slot(pos).cast::<MaybeUninit<T>>().write(value) }
    }

    #[inline]
    fn copy(&mut self, from: usize, to: usize) {
        // SAFETY: both positions are in bounds, `ptr::copy` handles overlap.
        unsafe { std::ptr::copy(self.slot(from), self.slot(to), 1) }
    }
}

/// The contents of one slot, lifted out of the arrays while a migration
/// cycle is rotated.
pub(crate) struct SavedSlot<K, V> {
    key: MaybeUninit<K>,
    value: MaybeUninit<V>,
    hash: Option<u32>,
}

/// Keys, values and optionally cached hashes for every slot of a table.
pub(crate) struct Slots<K, V> {
    keys: SlotBuf<K>,
    values: SlotBuf<V>,
    hashes: Option<SlotBuf<u32>>,
    capacity: u32,
}

impl<K, V> Slots<K, V> {
    /// Returns every array to `allocator`.
    pub fn release_in<A: Allocator>(&mut self, allocator: &A) {
        self.keys.release_in(allocator);
        self.values.release_in(allocator);
        if let Some(hashes) = self.hashes.as_mut() {
            hashes.release_in(allocator);
        }
        self.capacity = 0;
    }
}

impl<K: Copy, V: Copy> Slots<K, V> {
    /// Creates empty storage. With `cache_hashes`, every slot also stores the
    /// hash of its key.
    pub const fn new(cache_hashes: bool) -> Self {
        Slots {
            keys: SlotBuf::empty(),
            values: SlotBuf::empty(),
            hashes: if cache_hashes {
                Some(SlotBuf::empty())
            } else {
                None
            },
            capacity: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    #[inline]
    pub fn caches_hashes(&self) -> bool {
        self.hashes.is_some()
    }

    /// Resizes every array to `capacity` slots. Slots below the smaller of the
    /// two capacities are preserved, new slots are uninitialized.
    pub fn resize_in<A: Allocator>(&mut self, allocator: &A, capacity: u32) {
        let cap = capacity as usize;
        self.keys.resize_in(allocator, cap);
        self.values.resize_in(allocator, cap);
        if let Some(hashes) = self.hashes.as_mut() {
            hashes.resize_in(allocator, cap);
        }
        self.capacity = capacity;
    }

    /// Bytes used by `slots` slots.
    pub fn footprint(&self, slots: usize) -> usize {
        let hash = if self.caches_hashes() {
            std::mem::size_of::<u32>()
        } else {
            0
        };
        slots * (std::mem::size_of::<K>() + std::mem::size_of::<V>() + hash)
    }

    /// # Safety
    ///
    /// A key must have been written at `pos`.
    #[inline]
    pub unsafe fn key(&self, pos: u32) -> &K {
        self.keys.get(pos as usize)
    }

    /// # Safety
    ///
    /// A value must have been written at `pos`.
    #[inline]
    pub unsafe fn value(&self, pos: u32) -> &V {
        self.values.get(pos as usize)
    }

    /// # Safety
    ///
    /// A value must have been written at `pos`.
    #[inline]
    pub unsafe fn value_mut(&mut self, pos: u32) -> &mut V {
        self.values.get_mut(pos as usize)
    }

    #[inline]
    pub fn write_key(&mut self, pos: u32, key: K) {
        self.keys.write(pos as usize, key);
    }

    #[inline]
    pub fn write_value(&mut self, pos: u32, value: V) {
        self.values.write(pos as usize, value);
    }

    /// Returns the cached hash at `pos`, if hashes are cached.
    ///
    /// The cache is only meaningful for slots that hold an entry.
    #[inline]
    pub fn cached_hash(&self, pos: u32) -> Option<u32> {
        self.hashes.as_ref().map(|hashes| {
            // SAFETY: u32 has no invalid bit patterns, and callers only ask
            // for slots they wrote.
            unsafe { hashes.read_raw(pos as usize).assume_init() }
        })
    }

    /// Stores `hash` for the slot at `pos` when hashes are cached.
    #[inline]
    pub fn set_hash(&mut self, pos: u32, hash: u32) {
        if let Some(hashes) = self.hashes.as_mut() {
            hashes.write(pos as usize, hash);
        }
    }

    /// Copies key, value and cached hash from slot `from` to slot `to`.
    pub fn copy_slot(&mut self, from: u32, to: u32) {
        let (from, to) = (from as usize, to as usize);
        self.keys.copy(from, to);
        self.values.copy(from, to);
        if let Some(hashes) = self.hashes.as_mut() {
            hashes.copy(from, to);
        }
    }

    /// Copies the contents of slot `pos` out of the arrays.
    pub fn save(&self, pos: u32) -> SavedSlot<K, V> {
        let pos = pos as usize;
        SavedSlot {
            key: self.keys.read_raw(pos),
            value: self.values.read_raw(pos),
            hash: self.hashes.as_ref().map(|hashes| {
                // SAFETY: see `cached_hash`.
                unsafe { hashes.read_raw(pos).assume_init() }
            }),
        }
    }

    /// Writes previously saved contents into slot `pos`.
    pub fn restore(&mut self, pos: u32, saved: SavedSlot<K, V>) {
        let pos = pos as usize;
        self.keys.write_raw(pos, saved.key);
        self.values.write_raw(pos, saved.value);
        if let (Some(hashes), Some(hash)) = (self.hashes.as_mut(), saved.hash) {
            hashes.write(pos, hash);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use allocator_api2::alloc::Global;

    #[test]
    fn slots_survive_resize() {
        let mut slots = Slots::<u64, [u8; 3]>::new(true);
        slots.resize_in(&Global, 11);
        for pos in 0..11u32 {
            slots.write_key(pos, pos as u64 * 7);
            slots.write_value(pos, [pos as u8; 3]);
            slots.set_hash(pos, pos + 100);
        }

        slots.resize_in(&Global, 53);
        assert_eq!(slots.capacity(), 53);
        for pos in 0..11u32 {
            assert_eq!(unsafe { *slots.key(pos) }, pos as u64 * 7);
            assert_eq!(unsafe { *slots.value(pos) }, [pos as u8; 3]);
            assert_eq!(slots.cached_hash(pos), Some(pos + 100));
        }

        slots.resize_in(&Global, 5);
        assert_eq!(unsafe { *slots.key(4) }, 28);
        slots.release_in(&Global);
        assert_eq!(slots.capacity(), 0);
    }

    #[test]
    fn copy_and_rotate() {
        let mut slots = Slots::<u32, u32>::new(false);
        slots.resize_in(&Global, 4);
        for pos in 0..3u32 {
            slots.write_key(pos, pos);
            slots.write_value(pos, pos * 10);
        }
        assert_eq!(slots.cached_hash(0), None);

        // Rotate 0 -> 1 -> 2 -> 0.
        let saved = slots.save(2);
        slots.copy_slot(1, 2);
        slots.copy_slot(0, 1);
        slots.restore(0, saved);

        let keys: Vec<u32> = (0..3).map(|pos| unsafe { *slots.key(pos) }).collect();
        let values: Vec<u32> = (0..3).map(|pos| unsafe { *slots.value(pos) }).collect();
        assert_eq!(keys, vec![2, 0, 1]);
        assert_eq!(values, vec![20, 0, 10]);
        slots.release_in(&Global);
    }

    #[test]
    fn footprint_counts_cached_hashes() {
        let plain = Slots::<u32, u64>::new(false);
        let cached = Slots::<u32, u64>::new(true);
        assert_eq!(plain.footprint(10), 120);
        assert_eq!(cached.footprint(10), 160);
        assert_eq!(Slots::<u32, ()>::new(false).footprint(10), 40);
    }
}
