//! Incremental migration of entries from the old generation.

use crate::bitset::{
    occupied_upto, OccupancyBits, EMPTY, GHOST, OCCUPIED, OCCUPIED_BITS, WORD_BITS,
};
use crate::generation::{size_for, OldGeneration, Probe, Tombstones};
use crate::keys::KeyOps;
use crate::raw::{Claim, Put, RawTable};
use allocator_api2::alloc::Allocator;

impl<K: Copy, V: Copy, A: Allocator> RawTable<K, V, A> {
    /// Starts a resize to a size fit for the current number of entries.
    ///
    /// The current occupancy bits become the old generation, unless the table
    /// is empty in which case they are simply dropped. Ghosts do not survive a
    /// resize.
    pub(crate) fn resize_start(&mut self) {
        debug_assert!(self.old.is_none());

        let len = self.hdr.len as u64;
        let target = (self.min_size as u64)
            .max(2 * (len + 1))
            .max(self.hdr.size as u64 / 4);
        let size = size_for(target);

        if size > self.slots.capacity() {
            self.slots.resize_in(&self.allocator, size);
        }

        let mut bits = std::mem::replace(
            &mut self.hdr.bits,
            OccupancyBits::new_in(&self.allocator, size),
        );
        if self.hdr.len > 0 {
            self.old = Some(OldGeneration {
                bits,
                size: self.hdr.size,
                watermark: self.hdr.size,
            });
        } else {
            bits.release_in(&self.allocator);
            if self.slots.capacity() > size {
                self.slots.resize_in(&self.allocator, size);
            }
        }

        log::debug!(
            "resizing hash table from {} to {} slots ({} entries, {} ghosts)",
            self.hdr.size,
            size,
            self.hdr.len,
            self.ghosts.count()
        );
        self.ghosts = Tombstones::Active(0);
        self.hdr.size = size;
    }

    /// Drops the fully migrated old generation and shrinks the slot arrays to
    /// the current size.
    pub(crate) fn resize_done(&mut self) {
        let Some(old) = self.old.take() else {
            return;
        };
        old.release_in(&self.allocator);

        if self.slots.capacity() > self.hdr.size {
            self.slots.resize_in(&self.allocator, self.hdr.size);
        }
        log::trace!("hash table resize to {} slots done", self.hdr.size);
    }

    /// Claims a slot for `key` in the current generation.
    ///
    /// The first ghost met along the probe chain is reused. Otherwise the
    /// chain ends on an empty slot, which for insertions may still be held by
    /// the old generation: that entry is migrated out of the way and the
    /// search resumes from the same slot.
    pub(crate) fn claim<O: KeyOps<K>>(&mut self, ops: &O, hash: u32, key: &K, mode: Claim) -> Put {
        let mut probe = self.hdr.probe(hash);
        let mut ghost = None;

        let pos = loop {
            loop {
                let flags = self.hdr.bits.flags(probe.pos);
                if flags == EMPTY {
                    break;
                }
                if flags & OCCUPIED != 0 {
                    if mode == Claim::Insert && self.matches(ops, probe.pos, hash, key) {
                        return Put::Found(probe.pos);
                    }
                } else if flags == GHOST && ghost.is_none() {
                    ghost = Some(probe.pos);
                }
                probe.advance();
            }

            if let Some(pos) = ghost {
                self.hdr.bits.invert(pos);
                self.ghosts.remove();
                break pos;
            }

            let pos = probe.pos;
            let held =
                mode == Claim::Insert && self.old.as_ref().is_some_and(|old| old.holds(pos));
            if !held {
                self.hdr.bits.set_occupied(pos);
                break pos;
            }
            self.migrate_one(ops, pos);
        };

        self.hdr.len += 1;
        Put::Inserted(pos)
    }

    /// Moves the old entry at `pos` into the current generation.
    ///
    /// Its new slot may itself be held by another old entry, which is moved in
    /// turn, and so on until a free slot ends the chain. The chain may also
    /// come back to `pos`, in which case the entries are rotated along the
    /// cycle. Claiming slots never touches the slot arrays, so the data is
    /// copied once the whole chain is known, from its end backwards.
    pub(crate) fn migrate_one<O: KeyOps<K>>(&mut self, ops: &O, pos: u32) {
        let mut moves = std::mem::take(&mut self.moves);
        moves.clear();

        let mut pos = pos;
        let mut cycle = false;
        loop {
            // SAFETY: the old generation holds an entry at `pos`.
            let key = unsafe { *self.slots.key(pos) };
            let hash = match self.slots.cached_hash(pos) {
                Some(hash) => hash,
                None => ops.hash(&key),
            };

            moves.push(pos);
            if let Some(old) = self.old.as_mut() {
                old.bits.invert(pos);
            }

            pos = self.claim(ops, hash, &key, Claim::Migrate).pos();
            if pos == moves[0] {
                if moves.len() == 1 {
                    // Same slot in both generations, the data stays put.
                    self.hdr.len -= 1;
                    self.moves = moves;
                    return;
                }
                cycle = true;
                break;
            }
            if !self.old.as_ref().is_some_and(|old| old.holds(pos)) {
                break;
            }
        }

        let saved = cycle.then(|| self.slots.save(pos));
        let first = usize::from(cycle);
        for &from in moves[first..].iter().rev() {
            self.slots.copy_slot(from, pos);
            pos = from;
        }
        if let Some(saved) = saved {
            self.slots.restore(pos, saved);
        }

        // Every moved entry was counted again when its slot was claimed.
        self.hdr.len -= moves.len() as u32;
        self.moves = moves;
    }

    /// Migrates every old entry along the old probe chain of `hash`, so that a
    /// lookup of that hash only needs the current generation.
    pub(crate) fn migrate_walk<O: KeyOps<K>>(&mut self, ops: &O, hash: u32) {
        let Some(size) = self.old.as_ref().map(|old| old.size) else {
            return;
        };

        let mut probe = Probe::new(hash, size);
        loop {
            let flags = match self.old.as_ref() {
                Some(old) => old.bits.flags(probe.pos),
                None => return,
            };
            if flags == EMPTY {
                return;
            }
            if flags & OCCUPIED != 0 {
                self.migrate_one(ops, probe.pos);
            }
            probe.advance();
        }
    }

    /// Migrates the old entries of the topmost bitset words below the
    /// watermark, then lowers it. Finishes the resize when it reaches zero.
    pub(crate) fn resize_step<O: KeyOps<K>>(&mut self, ops: &O) {
        let Some(watermark) = self.old.as_ref().map(|old| old.watermark) else {
            return;
        };
        debug_assert!(watermark > 0);

        let top = 2 * watermark as usize - 1;
        let mut index = top / WORD_BITS;
        let end = index.saturating_sub(Self::RESIZE_STEP_WORDS);
        let mut base = index * WORD_BITS;
        let mut mask = occupied_upto(top);

        loop {
            loop {
                let word = self.old_word(index) & mask;
                if word == 0 {
                    break;
                }
                let pos = (base + word.trailing_zeros() as usize) / 2;
                self.migrate_one(ops, pos as u32);
            }
            if index == end {
                break;
            }
            index -= 1;
            base -= WORD_BITS;
            mask = OCCUPIED_BITS;
        }

        let watermark = (end * WORD_BITS / 2) as u32;
        if let Some(old) = self.old.as_mut() {
            old.watermark = watermark;
        }
        if watermark == 0 {
            self.resize_done();
        }
    }

    #[inline]
    fn old_word(&self, index: usize) -> usize {
        self.old.as_ref().map_or(0, |old| old.bits.word(index))
    }
}
