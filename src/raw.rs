//! The untyped-position table engine.
//!
//! [`RawTable`] stores keys and values in slots and hands out slot positions.
//! Every operation takes the [`KeyOps`] of the table and the hash of the key,
//! so that callers holding a precomputed hash never hash twice. The typed
//! [`QMap`](crate::QMap) and [`QSet`](crate::QSet) front-ends own their ops and
//! compute the hashes for you.
//!
//! # Resizing
//!
//! A resize never rehashes the whole table at once. Starting one allocates the
//! occupancy bits of a new generation, and the previous bits become the old
//! generation. Both generations index the same key, value and hash arrays.
//! Entries are then moved over a few at a time: every [`RawTable::get`] and
//! [`RawTable::put`] first migrates the probe chain of its own hash, then a
//! bounded batch of slots from the top of the old generation.
//!
//! # Threading
//!
//! The table is not synchronized in any way. Sharing one between threads
//! requires an external lock around every operation, including
//! [`RawTable::get`], which migrates entries.

use crate::bitset::{self, OccupancyBits, EMPTY, OCCUPIED};
use crate::generation::{size_for, Header, OldGeneration, Probe, Tombstones};
use crate::keys::KeyOps;
use crate::storage::Slots;
use allocator_api2::alloc::{Allocator, Global};

/// Outcome of [`RawTable::put`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Put {
    /// The key was not present and now lives at this slot.
    Inserted(u32),
    /// The key was already present at this slot.
    Found(u32),
}

impl Put {
    /// Returns the slot of the key.
    #[inline]
    pub fn pos(self) -> u32 {
        match self {
            Put::Inserted(pos) | Put::Found(pos) => pos,
        }
    }

    /// Returns true if the key was already present.
    #[inline]
    pub fn is_collision(self) -> bool {
        matches!(self, Put::Found(_))
    }
}

/// What [`RawTable::put`] does with the key and value of an existing entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PutMode {
    /// Leave the existing entry untouched.
    Keep,
    /// Replace the stored key and value with the given ones.
    Overwrite,
}

/// How a slot is claimed in the current generation.
#[derive(Clone, Copy, PartialEq, Eq)]
pub(crate) enum Claim {
    /// A user insertion: look for the key along the chain, and migrate old
    /// entries standing in the way.
    Insert,
    /// A migrated entry, known to be absent from the current generation.
    Migrate,
}

/// An open addressing hash table with incremental resizing.
///
/// Keys of type `K` are stored inline and compared through a [`KeyOps`]
/// implementation passed to each operation; the same ops must be used for
/// the whole life of the table. Values of type `V` are stored in a parallel
/// array, use `()` for a set.
pub struct RawTable<K, V, A: Allocator = Global> {
    pub(crate) hdr: Header,
    pub(crate) old: Option<OldGeneration>,
    pub(crate) slots: Slots<K, V>,
    pub(crate) ghosts: Tombstones,
    pub(crate) min_size: u32,
    /// Scratch stack of the old positions of a migration chain.
    pub(crate) moves: Vec<u32>,
    pub(crate) allocator: A,
}

impl<K: Copy, V: Copy> RawTable<K, V, Global> {
    /// Creates an empty table using the global allocator. Nothing is
    /// allocated until the first insertion.
    ///
    /// With `cache_hashes`, the hash of every key is stored next to it. This
    /// costs four bytes per slot and saves calling the hash function when the
    /// table is resized, and most key comparisons on lookups.
    pub fn new(cache_hashes: bool) -> Self {
        Self::new_in(cache_hashes, Global)
    }
}

impl<K: Copy, V: Copy, A: Allocator> RawTable<K, V, A> {
    /// Number of bitset words of the old generation migrated by one eager
    /// resize step, on top of the word holding the watermark.
    pub const RESIZE_STEP_WORDS: usize = 16;

    /// Creates an empty table allocating from `allocator`.
    pub fn new_in(cache_hashes: bool, allocator: A) -> Self {
        RawTable {
            hdr: Header::empty(),
            old: None,
            slots: Slots::new(cache_hashes),
            ghosts: Tombstones::Active(0),
            min_size: 0,
            moves: Vec::new(),
            allocator,
        }
    }

    /// Number of entries in the table.
    #[inline]
    pub fn len(&self) -> usize {
        self.hdr.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.hdr.len == 0
    }

    /// Number of slots of the current generation.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.hdr.size as usize
    }

    /// The size below which the table does not shrink.
    #[inline]
    pub fn min_size(&self) -> u32 {
        self.min_size
    }

    /// Removed entries still holding slots, or the sealed marker.
    #[inline]
    pub fn ghosts(&self) -> Tombstones {
        self.ghosts
    }

    #[inline]
    pub fn is_sealed(&self) -> bool {
        self.ghosts.is_sealed()
    }

    /// Returns true while a resize is in progress.
    #[inline]
    pub fn is_resizing(&self) -> bool {
        self.old.is_some()
    }

    #[inline]
    pub fn caches_hashes(&self) -> bool {
        self.slots.caches_hashes()
    }

    #[inline]
    pub fn allocator(&self) -> &A {
        &self.allocator
    }

    #[track_caller]
    fn assert_unsealed(&self, operation: &str) {
        assert!(
            !self.ghosts.is_sealed(),
            "qhash: {operation} performed on a sealed hash table"
        );
    }

    /// Makes sure the table keeps room for at least `min_size` entries without
    /// resizing, growing it right away if needed. Zero removes the floor.
    ///
    /// # Panics
    ///
    /// Panics if the table is sealed, or if `min_size` is too large.
    #[track_caller]
    pub fn set_min_size(&mut self, min_size: u32) {
        self.assert_unsealed("min size change");
        if min_size == 0 {
            self.min_size = 0;
            return;
        }

        self.min_size = size_for(2 * min_size as u64);
        if self.old.is_none() && self.hdr.size < self.min_size {
            self.resize_start();
        }
    }

    /// Removes every entry, keeping the current capacity.
    ///
    /// # Panics
    ///
    /// Panics if the table is sealed.
    #[track_caller]
    pub fn clear(&mut self) {
        self.assert_unsealed("clear");
        if let Some(old) = self.old.take() {
            old.release_in(&self.allocator);
            if self.slots.capacity() > self.hdr.size {
                self.slots.resize_in(&self.allocator, self.hdr.size);
            }
        }
        self.hdr.bits.reset(self.hdr.size);
        self.hdr.len = 0;
        self.ghosts = Tombstones::Active(0);
    }

    /// Releases all the memory of the table. The table is left empty,
    /// unsealed and without a minimum size, and can be used again.
    pub fn wipe(&mut self) {
        self.release();
        self.hdr = Header::empty();
        self.ghosts = Tombstones::Active(0);
        self.min_size = 0;
        self.moves = Vec::new();
    }

    /// Returns true if the table should start a resize: it is at least two
    /// thirds full counting ghosts, or used at less than a sixteenth while
    /// larger than its minimum size.
    pub(crate) fn should_resize(&self) -> bool {
        if self.old.is_some() {
            return false;
        }

        let hdr = &self.hdr;
        let used = hdr.len as u64 + self.ghosts.count() as u64;
        if used * 3 >= hdr.size as u64 * 2 {
            return true;
        }
        hdr.size > self.min_size && hdr.len < hdr.size / 16
    }

    /// Finishes any pending resize, compacts the table if it holds ghosts or is
    /// badly sized, and marks it sealed.
    ///
    /// A sealed table can only be read through [`RawTable::safe_get`] and the
    /// slot accessors, until [`RawTable::unseal`] is called. This is the state
    /// to put a table in before exposing it as read only data.
    ///
    /// # Panics
    ///
    /// Panics if the table is already sealed.
    #[track_caller]
    pub fn seal<O: KeyOps<K>>(&mut self, ops: &O) {
        assert!(!self.ghosts.is_sealed(), "qhash: hash table already sealed");

        while self.old.is_some() {
            self.resize_step(ops);
        }

        if self.ghosts.count() > 0 || self.should_resize() {
            self.resize_start();
            while self.old.is_some() {
                self.resize_step(ops);
            }
        }

        log::trace!(
            "sealed hash table with {} entries in {} slots",
            self.hdr.len,
            self.hdr.size
        );
        self.ghosts = Tombstones::Sealed;
    }

    /// Makes a sealed table mutable again.
    pub fn unseal(&mut self) {
        debug_assert!(self.ghosts.is_sealed(), "qhash: hash table is not sealed");
        if self.ghosts.is_sealed() {
            debug_assert!(self.old.is_none());
            self.ghosts = Tombstones::Active(0);
        }
    }

    /// Returns true if the entry at `pos` matches `hash` and `key`.
    #[inline]
    pub(crate) fn matches<O: KeyOps<K>>(&self, ops: &O, pos: u32, hash: u32, key: &K) -> bool {
        if self.slots.cached_hash(pos).is_some_and(|cached| cached != hash) {
            return false;
        }
        // SAFETY: callers only pass occupied slots, which hold a key.
        ops.equals(unsafe { self.slots.key(pos) }, key)
    }

    /// Looks `key` up in one generation.
    fn lookup<O: KeyOps<K>>(
        &self,
        ops: &O,
        bits: &OccupancyBits,
        size: u32,
        hash: u32,
        key: &K,
    ) -> Option<u32> {
        let mut probe = Probe::new(hash, size);
        loop {
            let flags = bits.flags(probe.pos);
            if flags == EMPTY {
                return None;
            }
            if flags & OCCUPIED != 0 && self.matches(ops, probe.pos, hash, key) {
                return Some(probe.pos);
            }
            probe.advance();
        }
    }

    /// Finds the slot of `key`, making progress on any pending resize first.
    ///
    /// The whole probe chain of `hash` is migrated before the lookup, so the
    /// returned slot belongs to the current generation. Because entries may
    /// move, this must not be called while enumerating the table.
    ///
    /// # Panics
    ///
    /// Panics if the table is sealed; use [`RawTable::safe_get`] instead.
    #[track_caller]
    pub fn get<O: KeyOps<K>>(&mut self, ops: &O, hash: u32, key: &K) -> Option<u32> {
        self.assert_unsealed("unsafe find operation");

        if self.old.is_some() {
            self.migrate_walk(ops, hash);
            self.resize_step(ops);
        }
        if self.hdr.len == 0 {
            return None;
        }
        self.lookup(ops, &self.hdr.bits, self.hdr.size, hash, key)
    }

    /// Finds the slot of `key` without modifying the table.
    ///
    /// During a resize the key is looked up in both generations.
    pub fn safe_get<O: KeyOps<K>>(&self, ops: &O, hash: u32, key: &K) -> Option<u32> {
        if self.hdr.len == 0 {
            return None;
        }
        self.lookup(ops, &self.hdr.bits, self.hdr.size, hash, key)
            .or_else(|| {
                let old = self.old.as_ref()?;
                self.lookup(ops, &old.bits, old.size, hash, key)
            })
    }

    /// Inserts `key` with `value` unless it is already present.
    ///
    /// Returns [`Put::Inserted`] with the new slot, or [`Put::Found`] with the
    /// slot of the existing entry, which is then left untouched with
    /// [`PutMode::Keep`] and replaced with [`PutMode::Overwrite`].
    ///
    /// # Panics
    ///
    /// Panics if the table is sealed, or if it would need more slots than a 32
    /// bit index can address.
    #[track_caller]
    pub fn put<O: KeyOps<K>>(&mut self, ops: &O, hash: u32, key: K, value: V, mode: PutMode) -> Put {
        self.assert_unsealed("insert operation");

        if self.should_resize() {
            self.resize_start();
        }
        if self.old.is_some() {
            self.migrate_walk(ops, hash);
            self.resize_step(ops);
        }

        let put = self.claim(ops, hash, &key, Claim::Insert);
        let pos = put.pos();
        self.slots.set_hash(pos, hash);
        if !put.is_collision() || mode == PutMode::Overwrite {
            self.slots.write_key(pos, key);
            self.slots.write_value(pos, value);
        }
        put
    }

    /// Removes the entry at `pos`, returning false if the slot held none.
    ///
    /// Only the occupancy of the slot changes, its storage is reclaimed by the
    /// next resize.
    ///
    /// # Panics
    ///
    /// Panics if the table is sealed.
    #[track_caller]
    pub fn del_at(&mut self, pos: u32) -> bool {
        self.assert_unsealed("delete operation");

        if pos < self.hdr.size && self.hdr.bits.is_occupied(pos) {
            self.hdr.bits.invert(pos);
            self.hdr.len -= 1;
            self.ghosts.add();
            return true;
        }
        match self.old.as_mut() {
            Some(old) if old.holds(pos) => {
                old.bits.invert(pos);
                self.hdr.len -= 1;
                true
            }
            _ => false,
        }
    }

    /// Returns true if the slot at `pos` holds an entry, in either generation.
    pub fn is_live(&self, pos: u32) -> bool {
        (pos < self.hdr.size && self.hdr.bits.is_occupied(pos))
            || self.old.as_ref().is_some_and(|old| old.holds(pos))
    }

    #[track_caller]
    fn assert_live(&self, pos: u32) {
        assert!(self.is_live(pos), "qhash: slot {pos} holds no entry");
    }

    /// Returns the key stored at `pos`.
    ///
    /// # Panics
    ///
    /// Panics if the slot holds no entry.
    #[track_caller]
    pub fn key(&self, pos: u32) -> &K {
        self.assert_live(pos);
        // SAFETY: live slots hold a key.
        unsafe { self.slots.key(pos) }
    }

    /// Returns the value stored at `pos`.
    ///
    /// # Panics
    ///
    /// Panics if the slot holds no entry.
    #[track_caller]
    pub fn value(&self, pos: u32) -> &V {
        self.assert_live(pos);
        // SAFETY: live slots hold a value.
        unsafe { self.slots.value(pos) }
    }

    /// Returns the value stored at `pos` for modification.
    ///
    /// # Panics
    ///
    /// Panics if the slot holds no entry.
    #[track_caller]
    pub fn value_mut(&mut self, pos: u32) -> &mut V {
        self.assert_live(pos);
        // SAFETY: live slots hold a value.
        unsafe { self.slots.value_mut(pos) }
    }

    /// Returns the first live slot at or after `pos`.
    ///
    /// During a resize, slots of both generations are reported.
    pub fn scan(&self, pos: u32) -> Option<u32> {
        let current = self.hdr.bits.view(self.hdr.size);
        let old = self.old.as_ref().map(|old| old.bits.view(old.watermark));
        bitset::scan(current, old, pos)
    }

    /// Iterates over the positions of the live slots.
    pub fn positions(&self) -> Positions<'_, K, V, A> {
        Positions {
            table: self,
            next: 0,
        }
    }

    /// Approximate number of bytes allocated by the table.
    pub fn memory_footprint(&self) -> usize {
        let mut bytes = self.hdr.bits.footprint();
        let mut slots = self.hdr.size;
        if let Some(old) = self.old.as_ref() {
            slots = slots.max(old.size);
            bytes += std::mem::size_of::<OldGeneration>() + old.bits.footprint();
        }
        bytes + self.slots.footprint(slots as usize)
    }
}

impl<K, V, A: Allocator> RawTable<K, V, A> {
    fn release(&mut self) {
        if let Some(old) = self.old.take() {
            old.release_in(&self.allocator);
        }
        self.hdr.bits.release_in(&self.allocator);
        self.slots.release_in(&self.allocator);
    }
}

impl<K, V, A: Allocator> Drop for RawTable<K, V, A> {
    fn drop(&mut self) {
        self.release();
    }
}

// SAFETY: the table owns all of its buffers, and only hands out references
// tied to its own borrows.
unsafe impl<K: Send, V: Send, A: Allocator + Send> Send for RawTable<K, V, A> {}
unsafe impl<K: Sync, V: Sync, A: Allocator + Sync> Sync for RawTable<K, V, A> {}

/// Iterator over the live slot positions of a [`RawTable`].
pub struct Positions<'a, K, V, A: Allocator = Global> {
    table: &'a RawTable<K, V, A>,
    next: u32,
}

impl<'a, K: Copy, V: Copy, A: Allocator> Iterator for Positions<'a, K, V, A> {
    type Item = u32;

    fn next(&mut self) -> Option<u32> {
        if self.table.is_empty() {
            return None;
        }
        let pos = self.table.scan(self.next)?;
        self.next = pos + 1;
        Some(pos)
    }
}
