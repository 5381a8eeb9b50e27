//! Module for a typed hash map on top of [`RawTable`].

use crate::iter::{Iter, Keys, Values};
use crate::keys::{HashedKeys, KeyOps};
use crate::raw::{Positions, Put, PutMode, RawTable};
use allocator_api2::alloc::{Allocator, Global};
use std::fmt;

/// A hash map storing keys of type `K` and values of type `V` inline.
///
/// Keys are hashed and compared through `O`, by default with their [`Hash`]
/// and [`Eq`] implementations. Entries are addressed by slot positions,
/// which remain valid until the next insertion, migrating lookup, or seal.
///
/// Lookups come in two flavors. [`QMap::find`] (and [`QMap::get_mut`] on a
/// mutable table) migrate pending entries along the way and therefore need
/// `&mut self`. [`QMap::get`], [`QMap::find_safe`] and [`QMap::contains_key`]
/// work through a shared reference and look into both generations during a
/// resize.
///
/// [`Hash`]: std::hash::Hash
pub struct QMap<K, V, O = HashedKeys, A: Allocator = Global> {
    table: RawTable<K, V, A>,
    ops: O,
}

impl<K, V, O> QMap<K, V, O, Global>
where
    K: Copy,
    V: Copy,
    O: KeyOps<K> + Default,
{
    /// Creates an empty map. Nothing is allocated until the first insertion.
    pub fn new() -> Self {
        Self::with_min_size_and_ops_in(0, O::default(), false, Global)
    }

    /// Creates an empty map which caches the hash of every key.
    pub fn new_cached() -> Self {
        Self::with_min_size_and_ops_in(0, O::default(), true, Global)
    }

    /// Creates a map with room for `min_size` entries, which it never shrinks
    /// below.
    pub fn with_min_size(min_size: u32) -> Self {
        Self::with_min_size_and_ops_in(min_size, O::default(), false, Global)
    }
}

impl<K, V, O> QMap<K, V, O, Global>
where
    K: Copy,
    V: Copy,
    O: KeyOps<K>,
{
    /// Creates an empty map using `ops` to hash and compare keys.
    pub fn with_ops(ops: O) -> Self {
        Self::with_min_size_and_ops_in(0, ops, false, Global)
    }

    pub fn with_min_size_and_ops(min_size: u32, ops: O) -> Self {
        Self::with_min_size_and_ops_in(min_size, ops, false, Global)
    }
}

impl<K, V, O, A> QMap<K, V, O, A>
where
    K: Copy,
    V: Copy,
    O: KeyOps<K>,
    A: Allocator,
{
    /// Creates a map with every option.
    ///
    /// # Arguments
    ///
    /// * `min_size`     - The number of entries to keep room for, or zero.
    /// * `ops`          - The hashing and comparison of keys.
    /// * `cache_hashes` - If the hash of every key is stored next to it.
    /// * `allocator`    - The allocator for all the buffers of the map.
    pub fn with_min_size_and_ops_in(min_size: u32, ops: O, cache_hashes: bool, allocator: A) -> Self {
        let mut table = RawTable::new_in(cache_hashes, allocator);
        if min_size > 0 {
            table.set_min_size(min_size);
        }
        QMap { table, ops }
    }

    /// Returns the hash of `key`, as used by the `_h` methods.
    #[inline]
    pub fn hash(&self, key: &K) -> u32 {
        self.ops.hash(key)
    }

    pub fn ops(&self) -> &O {
        &self.ops
    }

    /// Returns the underlying table.
    pub fn raw(&self) -> &RawTable<K, V, A> {
        &self.table
    }

    /// Finds the slot of `key`, progressing any pending resize.
    ///
    /// # Panics
    ///
    /// Panics if the map is sealed.
    pub fn find(&mut self, key: &K) -> Option<u32> {
        let hash = self.ops.hash(key);
        self.find_h(hash, key)
    }

    /// Same as [`QMap::find`], with the hash of `key` already computed.
    pub fn find_h(&mut self, hash: u32, key: &K) -> Option<u32> {
        self.table.get(&self.ops, hash, key)
    }

    /// Finds the slot of `key` without modifying the map.
    pub fn find_safe(&self, key: &K) -> Option<u32> {
        self.find_safe_h(self.ops.hash(key), key)
    }

    pub fn find_safe_h(&self, hash: u32, key: &K) -> Option<u32> {
        self.table.safe_get(&self.ops, hash, key)
    }

    /// Returns a reference to the value for `key`.
    pub fn get(&self, key: &K) -> Option<&V> {
        self.find_safe(key).map(|pos| self.table.value(pos))
    }

    /// Returns a mutable reference to the value for `key`.
    ///
    /// On a mutable map this migrates pending entries like [`QMap::find`].
    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        let hash = self.ops.hash(key);
        let pos = if self.table.is_sealed() {
            self.table.safe_get(&self.ops, hash, key)
        } else {
            self.table.get(&self.ops, hash, key)
        }?;
        Some(self.table.value_mut(pos))
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.find_safe(key).is_some()
    }

    /// Inserts `key` with `value`, see [`RawTable::put`].
    ///
    /// # Panics
    ///
    /// Panics if the map is sealed.
    pub fn put(&mut self, key: K, value: V, mode: PutMode) -> Put {
        let hash = self.ops.hash(&key);
        self.put_h(hash, key, value, mode)
    }

    pub fn put_h(&mut self, hash: u32, key: K, value: V, mode: PutMode) -> Put {
        self.table.put(&self.ops, hash, key, value, mode)
    }

    /// Inserts a key-value pair into the map.
    ///
    /// If the map did not have this key present, None is returned.
    ///
    /// If the map did have this key present, the value is updated and the old
    /// value is returned.
    ///
    /// # Panics
    ///
    /// Panics if the map is sealed.
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        match self.put(key, value, PutMode::Keep) {
            Put::Inserted(_) => None,
            Put::Found(pos) => Some(std::mem::replace(self.table.value_mut(pos), value)),
        }
    }

    /// Inserts the pair only if `key` is absent, returning whether it was.
    pub fn add(&mut self, key: K, value: V) -> bool {
        !self.put(key, value, PutMode::Keep).is_collision()
    }

    /// Removes `key` from the map, returning its value.
    ///
    /// # Panics
    ///
    /// Panics if the map is sealed.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let hash = self.ops.hash(key);
        self.remove_h(hash, key)
    }

    pub fn remove_h(&mut self, hash: u32, key: &K) -> Option<V> {
        let pos = self.table.get(&self.ops, hash, key)?;
        let value = *self.table.value(pos);
        self.table.del_at(pos);
        Some(value)
    }

    /// Removes the entry at slot `pos`, returning false if there was none.
    pub fn remove_at(&mut self, pos: u32) -> bool {
        self.table.del_at(pos)
    }

    /// Returns the key at slot `pos`.
    ///
    /// # Panics
    ///
    /// Panics if the slot holds no entry.
    pub fn key_at(&self, pos: u32) -> &K {
        self.table.key(pos)
    }

    /// Returns the value at slot `pos`.
    ///
    /// # Panics
    ///
    /// Panics if the slot holds no entry.
    pub fn value_at(&self, pos: u32) -> &V {
        self.table.value(pos)
    }

    pub fn value_at_mut(&mut self, pos: u32) -> &mut V {
        self.table.value_mut(pos)
    }

    /// Iterates over the key-value pairs in slot order.
    pub fn iter(&self) -> Iter<'_, K, V, A> {
        Iter::new(&self.table)
    }

    pub fn keys(&self) -> Keys<'_, K, V, A> {
        Keys::new(self.iter())
    }

    pub fn values(&self) -> Values<'_, K, V, A> {
        Values::new(self.iter())
    }

    /// Iterates over the slot positions of the entries.
    pub fn positions(&self) -> Positions<'_, K, V, A> {
        self.table.positions()
    }

    /// Returns the number of entries in the map.
    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Returns the number of slots of the map.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    /// Completes any resize and freezes the map, see [`RawTable::seal`].
    pub fn seal(&mut self) {
        self.table.seal(&self.ops);
    }

    pub fn unseal(&mut self) {
        self.table.unseal();
    }

    pub fn is_sealed(&self) -> bool {
        self.table.is_sealed()
    }

    /// Removes every entry, keeping the memory.
    pub fn clear(&mut self) {
        self.table.clear();
    }

    /// Removes every entry and releases the memory.
    pub fn wipe(&mut self) {
        self.table.wipe();
    }

    pub fn set_min_size(&mut self, min_size: u32) {
        self.table.set_min_size(min_size);
    }

    /// Approximate number of bytes allocated by the map.
    pub fn memory_footprint(&self) -> usize {
        self.table.memory_footprint()
    }
}

impl<K, V, O> Default for QMap<K, V, O, Global>
where
    K: Copy,
    V: Copy,
    O: KeyOps<K> + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, O, A> fmt::Debug for QMap<K, V, O, A>
where
    K: Copy + fmt::Debug,
    V: Copy + fmt::Debug,
    O: KeyOps<K>,
    A: Allocator,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<K, V, O, A> Extend<(K, V)> for QMap<K, V, O, A>
where
    K: Copy,
    V: Copy,
    O: KeyOps<K>,
    A: Allocator,
{
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}

impl<K, V, O> FromIterator<(K, V)> for QMap<K, V, O, Global>
where
    K: Copy,
    V: Copy,
    O: KeyOps<K> + Default,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<'a, K, V, O, A> IntoIterator for &'a QMap<K, V, O, A>
where
    K: Copy,
    V: Copy,
    O: KeyOps<K>,
    A: Allocator,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V, A>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
