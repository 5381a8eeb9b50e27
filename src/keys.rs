//! Key representations.
//!
//! The table core is written once against [`KeyOps`], which tells it how to
//! hash and compare the keys stored in its slots. Keys themselves are always
//! stored inline in the key array, so a reference key stores the pointer and
//! an array key stores its bytes.

use crate::{hash_u32, hash_u64, make_hash, FnvHasher};
use std::hash::{BuildHasher, BuildHasherDefault, Hash};

/// Hashing and equality for the keys of a table.
///
/// `hash` must be consistent with `equals`: keys which compare equal must
/// hash to the same value. Only the 32 bit hash is used to place keys, so it
/// should be well mixed in every bit.
pub trait KeyOps<K> {
    /// Returns the hash of `key`.
    fn hash(&self, key: &K) -> u32;

    /// Returns true if `a` and `b` are the same key.
    fn equals(&self, a: &K, b: &K) -> bool;
}

macro_rules! scalar_keys {
    ($name:ident, $type:ty, $hash:expr, $doc:literal) => {
        #[doc = $doc]
        #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
        pub struct $name;

        impl KeyOps<$type> for $name {
            #[inline]
            fn hash(&self, key: &$type) -> u32 {
                $hash(*key)
            }

            #[inline]
            fn equals(&self, a: &$type, b: &$type) -> bool {
                a == b
            }
        }
    };
}

scalar_keys!(
    U32Keys,
    u32,
    hash_u32,
    "Keys which are 32 bit integers, used as their own hash."
);
scalar_keys!(
    U64Keys,
    u64,
    hash_u64,
    "Keys which are 64 bit integers, hashed by folding the two halves."
);

/// Keys which are references to values owned elsewhere.
///
/// The table stores the reference, while hashing and equality look through it
/// with the provided functions. Recomputing such hashes is usually expensive,
/// so these tables are good candidates for hash caching.
pub struct PtrKeys<T: ?Sized> {
    hash: fn(&T) -> u32,
    equals: fn(&T, &T) -> bool,
}

impl<T: ?Sized> PtrKeys<T> {
    /// Creates the ops from a hash and an equality function.
    pub const fn new(hash: fn(&T) -> u32, equals: fn(&T, &T) -> bool) -> Self {
        PtrKeys { hash, equals }
    }
}

impl<T: ?Sized> Clone for PtrKeys<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: ?Sized> Copy for PtrKeys<T> {}

impl<'a, T: ?Sized> KeyOps<&'a T> for PtrKeys<T> {
    #[inline]
    fn hash(&self, key: &&'a T) -> u32 {
        (self.hash)(key)
    }

    #[inline]
    fn equals(&self, a: &&'a T, b: &&'a T) -> bool {
        (self.equals)(a, b)
    }
}

/// Keys which are fixed size values copied into the table, such as byte
/// arrays, with user provided hashing and equality.
pub struct InlineKeys<K> {
    hash: fn(&K) -> u32,
    equals: fn(&K, &K) -> bool,
}

impl<K> InlineKeys<K> {
    /// Creates the ops from a hash and an equality function.
    pub const fn new(hash: fn(&K) -> u32, equals: fn(&K, &K) -> bool) -> Self {
        InlineKeys { hash, equals }
    }
}

impl<K> Clone for InlineKeys<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for InlineKeys<K> {}

impl<K> KeyOps<K> for InlineKeys<K> {
    #[inline]
    fn hash(&self, key: &K) -> u32 {
        (self.hash)(key)
    }

    #[inline]
    fn equals(&self, a: &K, b: &K) -> bool {
        (self.equals)(a, b)
    }
}

/// Keys implementing [`Hash`] and [`Eq`], hashed with a [`BuildHasher`].
///
/// The 64 bit hash is folded to 32 bits.
#[derive(Clone, Debug, Default)]
pub struct HashedKeys<S = BuildHasherDefault<FnvHasher>> {
    hash_builder: S,
}

impl<S> HashedKeys<S> {
    /// Creates the ops with the given hash builder.
    pub const fn with_hasher(hash_builder: S) -> Self {
        HashedKeys { hash_builder }
    }

    /// Returns the hash builder.
    pub fn hasher(&self) -> &S {
        &self.hash_builder
    }
}

impl<K, S> KeyOps<K> for HashedKeys<S>
where
    K: Hash + Eq,
    S: BuildHasher,
{
    #[inline]
    fn hash(&self, key: &K) -> u32 {
        hash_u64(make_hash::<K, K, S>(&self.hash_builder, key))
    }

    #[inline]
    fn equals(&self, a: &K, b: &K) -> bool {
        a == b
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MurmurHasher;

    #[derive(Debug)]
    struct Account {
        id: u32,
        name: &'static str,
    }

    #[test]
    fn scalar_keys() {
        assert_eq!(U32Keys.hash(&17), 17);
        assert!(U32Keys.equals(&17, &17));
        assert!(!U32Keys.equals(&17, &18));

        let key = 0x0000_0001_0000_0003u64;
        assert_eq!(U64Keys.hash(&key), 2);
        assert!(U64Keys.equals(&key, &key));
    }

    #[test]
    fn ptr_keys_hash_through_reference() {
        let ops = PtrKeys::<Account>::new(|a| a.id, |a, b| a.id == b.id);
        let first = Account { id: 7, name: "first" };
        let copy = Account { id: 7, name: "copy" };
        let other = Account { id: 8, name: "other" };

        assert_eq!(ops.hash(&&first), 7);
        assert!(ops.equals(&&first, &&copy));
        assert!(!ops.equals(&&first, &&other));
        assert_ne!(first.name, copy.name);
    }

    #[test]
    fn inline_keys() {
        let ops = InlineKeys::<[u8; 4]>::new(|k| u32::from_le_bytes(*k), |a, b| a == b);
        assert_eq!(ops.hash(&[1, 0, 0, 0]), 1);
        assert!(ops.equals(&[1, 2, 3, 4], &[1, 2, 3, 4]));
        assert!(!ops.equals(&[1, 2, 3, 4], &[4, 3, 2, 1]));
    }

    #[test]
    fn hashed_keys_are_stable() {
        let fnv = HashedKeys::<BuildHasherDefault<FnvHasher>>::default();
        assert_eq!(fnv.hash(&"some key"), fnv.hash(&"some key"));
        assert_ne!(fnv.hash(&"some key"), fnv.hash(&"other key"));

        let murmur = HashedKeys::<BuildHasherDefault<MurmurHasher>>::default();
        assert_eq!(murmur.hash(&42u64), murmur.hash(&42u64));
        assert!(KeyOps::<u64>::equals(&murmur, &42, &42));
    }
}
