//! Open addressing hash tables with incremental resizing.
//!
//! The tables of this crate store keys, values and optionally the hashes of
//! the keys in flat arrays indexed by slot position, with two bits of
//! occupancy per slot. Collisions are resolved with double hashing over a
//! prime number of slots.
//!
//! The interesting property of the tables is that a resize never stalls a
//! single operation for long: growing or shrinking allocates new occupancy
//! bits, and entries are then moved to their new slot a few at a time by the
//! following lookups and insertions. Both generations share the same slot
//! arrays, so an entry either stays where it is or moves to a slot which is
//! free in the old generation. When that slot is held by another old entry,
//! that entry moves first, and so on along a chain which may loop back on
//! itself.
//!
//! Removal only marks a slot as a ghost. Ghosts are skipped by lookups,
//! reused by insertions, and dropped by the next resize.
//!
//! # Sealing
//!
//! Because lookups through [`RawTable::get`] or [`QMap::find`] migrate
//! entries, a table in the middle of a resize is not safe to read through a
//! shared reference with those. [`QMap::seal`] completes any resize,
//! compacts the table, and freezes it: a sealed table can be read with the
//! side effect free lookups until it is unsealed.
//!
//! # Tables
//!
//! [`RawTable`] is the position based engine. It is parameterized by key and
//! value types, and takes the [`KeyOps`] and the key hash for each
//! operation. [`QMap`] and [`QSet`] wrap it with their own ops and hash for
//! you:
//!
//! ```
//! use qhash::QMapU32;
//!
//! let mut map = QMapU32::<u64>::new();
//! for key in 0..100u32 {
//!     map.insert(key, key as u64 * 2);
//! }
//! assert_eq!(map.get(&21), Some(&42));
//! assert_eq!(map.remove(&21), Some(42));
//! assert_eq!(map.len(), 99);
//!
//! map.seal();
//! assert!(map.contains_key(&20));
//! ```
//!
//! # Threading
//!
//! None of the tables are synchronized. They can be sent between threads, and
//! a sealed table can be shared for reading, but concurrent mutation requires
//! an external lock.

mod bitset;
mod generation;
mod iter;
mod keys;
mod map;
mod migrate;
mod raw;
mod set;
mod storage;
mod util;

#[cfg(feature = "serde")]
mod map_serde;

use crate::util::load_u64_le;
use std::borrow::Borrow;
use std::hash::{BuildHasher, Hash, Hasher};

pub use generation::Tombstones;
pub use iter::{Iter, Keys, SetIter, Values};
pub use keys::{HashedKeys, InlineKeys, KeyOps, PtrKeys, U32Keys, U64Keys};
pub use map::QMap;
pub use raw::{Positions, Put, PutMode, RawTable};
pub use set::QSet;

/// A map with `u32` keys.
pub type QMapU32<V> = QMap<u32, V, U32Keys>;
/// A map with `u64` keys.
pub type QMapU64<V> = QMap<u64, V, U64Keys>;
/// A set of `u32`.
pub type QSetU32 = QSet<u32, U32Keys>;
/// A set of `u64`.
pub type QSetU64 = QSet<u64, U64Keys>;

/// Hash of a 32 bit integer: the integer itself.
#[inline]
pub const fn hash_u32(value: u32) -> u32 {
    value
}

/// Hash of a 64 bit integer: the exclusive or of its two halves.
#[inline]
pub const fn hash_u64(value: u64) -> u32 {
    (value as u32) ^ ((value >> 32) as u32)
}

/// Hash of the address of `ptr`, ignoring any metadata.
#[inline]
pub fn hash_ptr<T: ?Sized>(ptr: *const T) -> u32 {
    hash_u64(ptr.cast::<()>() as usize as u64)
}

/// Creates a hash value from the `hash_builder` and `value`.
///
/// # Arguments
///
/// * `hash_builder` - The builder to builde the hasher with.
/// * `value`        - The value to hash.
pub(crate) fn make_hash<K, Q, S>(hash_builder: &S, value: &Q) -> u64
where
    K: Borrow<Q>,
    Q: Hash + ?Sized,
    S: BuildHasher,
{
    let mut hasher = hash_builder.build_hasher();
    value.hash(&mut hasher);
    hasher.finish()
}

/// Implementation of a hasher which hashes using the murmur finalizer, eight
/// bytes at a time.
#[derive(Clone, Copy, Debug, Default)]
pub struct MurmurHasher(u64);

impl Hasher for MurmurHasher {
    #[inline]
    fn finish(&self) -> u64 {
        self.0
    }

    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        let MurmurHasher(mut v) = *self;

        for chunk in bytes.chunks(8) {
            v ^= load_u64_le(chunk, chunk.len());
            v ^= v >> 33;
            v = v.wrapping_mul(0xff51afd7ed558ccd);
            v ^= v >> 33;
            v = v.wrapping_mul(0xc4ceb9fe1a85ec53);
            v ^= v >> 33;
        }

        *self = MurmurHasher(v);
    }
}

/// Implementaion of hasher which hashes using FNV (Fowler-Noll-Vo).
#[derive(Clone, Copy, Debug)]
pub struct FnvHasher(u64);

impl Default for FnvHasher {
    #[inline]
    fn default() -> FnvHasher {
        FnvHasher(0xcbf29ce484222325)
    }
}

impl Hasher for FnvHasher {
    #[inline]
    fn finish(&self) -> u64 {
        self.0
    }

    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        let FnvHasher(mut hash) = *self;

        for byte in bytes.iter() {
            hash ^= *byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }

        *self = FnvHasher(hash);
    }
}
