//! Table generations and their sizing.

use crate::bitset::OccupancyBits;
use allocator_api2::alloc::Allocator;

/// Valid table sizes. Every entry `i` is a prime larger than `2^i`, so that the
/// probe increment `1 + h % (size - 1)` is always coprime with the size and
/// consecutive sizes roughly double.
pub(crate) static PRIMES: [u32; 32] = [
    11, 11, 11, 11, 23, 53, 97, 193, 389, 769, 1543, 3079, 6151, 12289, 24593, 49157, 98317,
    196613, 393241, 786433, 1572869, 3145739, 6291469, 12582917, 25165843, 50331653, 100663319,
    201326611, 402653189, 805306457, 1610612741, 3221225473,
];

/// Returns the smallest valid table size which is at least `target`.
///
/// # Panics
///
/// Panics if `target` does not fit the signed 32 bit slot index space.
pub(crate) fn size_for(target: u64) -> u32 {
    if target >= i32::MAX as u64 {
        panic!("qhash: requested table size {target} overflows the slot index space");
    }

    let mut index = (target.max(1) as u32).ilog2() as usize;
    while (PRIMES[index] as u64) < target {
        index += 1;
    }
    PRIMES[index]
}

/// The generation of the table receiving insertions.
pub(crate) struct Header {
    /// Occupancy of the `size` slots.
    pub bits: OccupancyBits,
    /// Number of live entries in the table, including those still held by the
    /// old generation during a resize.
    pub len: u32,
    /// Number of slots, zero until the first insertion.
    pub size: u32,
}

impl Header {
    pub const fn empty() -> Self {
        Header {
            bits: OccupancyBits::empty(),
            len: 0,
            size: 0,
        }
    }

    /// Returns the probe start and increment for `hash`.
    #[inline]
    pub fn probe(&self, hash: u32) -> Probe {
        Probe::new(hash, self.size)
    }
}

/// The generation being vacated by a resize.
pub(crate) struct OldGeneration {
    /// Occupancy of the old slots. Migrated slots are turned into ghosts.
    pub bits: OccupancyBits,
    /// Number of slots of the old generation.
    pub size: u32,
    /// Every slot at or above this position has been migrated.
    pub watermark: u32,
}

impl OldGeneration {
    /// Returns true if the old generation still holds an entry at `pos`.
    #[inline]
    pub fn holds(&self, pos: u32) -> bool {
        pos < self.watermark && pos < self.size && self.bits.is_occupied(pos)
    }

    pub fn release_in<A: Allocator>(mut self, allocator: &A) {
        self.bits.release_in(allocator);
    }
}

/// The double hashing probe sequence of a hash in a table of `size` slots.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Probe {
    pub pos: u32,
    inc: u32,
    size: u32,
}

impl Probe {
    #[inline]
    pub fn new(hash: u32, size: u32) -> Self {
        debug_assert!(size > 1);
        Probe {
            pos: hash % size,
            inc: 1 + hash % (size - 1),
            size,
        }
    }

    /// Moves to the next slot of the sequence.
    #[inline]
    pub fn advance(&mut self) {
        // Both terms are below `size`, which is below 2^31.
        self.pos += self.inc;
        if self.pos >= self.size {
            self.pos -= self.size;
        }
    }
}

/// Removed entries still occupying slots of the current generation, or the
/// sealed marker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tombstones {
    /// The table is mutable and has this many ghost slots.
    Active(u32),
    /// The table was sealed: it has no ghosts, no resize in progress, and
    /// refuses mutation until unsealed.
    Sealed,
}

impl Tombstones {
    /// Number of ghost slots, zero when sealed.
    #[inline]
    pub fn count(self) -> u32 {
        match self {
            Tombstones::Active(count) => count,
            Tombstones::Sealed => 0,
        }
    }

    #[inline]
    pub fn is_sealed(self) -> bool {
        self == Tombstones::Sealed
    }

    #[inline]
    pub(crate) fn add(&mut self) {
        if let Tombstones::Active(count) = self {
            *count += 1;
        }
    }

    #[inline]
    pub(crate) fn remove(&mut self) {
        if let Tombstones::Active(count) = self {
            debug_assert!(*count > 0);
            *count -= 1;
        }
    }
}
