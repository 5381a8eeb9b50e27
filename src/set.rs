//! Module for a typed hash set on top of [`RawTable`].

use crate::iter::SetIter;
use crate::keys::{HashedKeys, KeyOps};
use crate::raw::{Positions, Put, PutMode, RawTable};
use allocator_api2::alloc::{Allocator, Global};
use std::fmt;

/// A hash set storing keys of type `K` inline.
///
/// This is a [`QMap`](crate::QMap) without values: the value array of the
/// underlying table has a zero sized element type and never allocates.
pub struct QSet<K, O = HashedKeys, A: Allocator = Global> {
    table: RawTable<K, (), A>,
    ops: O,
}

impl<K, O> QSet<K, O, Global>
where
    K: Copy,
    O: KeyOps<K> + Default,
{
    /// Creates an empty set. Nothing is allocated until the first insertion.
    pub fn new() -> Self {
        Self::with_min_size_and_ops_in(0, O::default(), false, Global)
    }

    /// Creates an empty set which caches the hash of every key.
    pub fn new_cached() -> Self {
        Self::with_min_size_and_ops_in(0, O::default(), true, Global)
    }

    pub fn with_min_size(min_size: u32) -> Self {
        Self::with_min_size_and_ops_in(min_size, O::default(), false, Global)
    }
}

impl<K: Copy, O: KeyOps<K>> QSet<K, O, Global> {
    pub fn with_ops(ops: O) -> Self {
        Self::with_min_size_and_ops_in(0, ops, false, Global)
    }

    pub fn with_min_size_and_ops(min_size: u32, ops: O) -> Self {
        Self::with_min_size_and_ops_in(min_size, ops, false, Global)
    }
}

impl<K, O, A> QSet<K, O, A>
where
    K: Copy,
    O: KeyOps<K>,
    A: Allocator,
{
    /// Creates a set with every option, see
    /// [`QMap::with_min_size_and_ops_in`](crate::QMap::with_min_size_and_ops_in).
    pub fn with_min_size_and_ops_in(min_size: u32, ops: O, cache_hashes: bool, allocator: A) -> Self {
        let mut table = RawTable::new_in(cache_hashes, allocator);
        if min_size > 0 {
            table.set_min_size(min_size);
        }
        QSet { table, ops }
    }

    #[inline]
    pub fn hash(&self, key: &K) -> u32 {
        self.ops.hash(key)
    }

    pub fn ops(&self) -> &O {
        &self.ops
    }

    pub fn raw(&self) -> &RawTable<K, (), A> {
        &self.table
    }

    /// Finds the slot of `key`, progressing any pending resize.
    ///
    /// # Panics
    ///
    /// Panics if the set is sealed.
    pub fn find(&mut self, key: &K) -> Option<u32> {
        let hash = self.ops.hash(key);
        self.find_h(hash, key)
    }

    pub fn find_h(&mut self, hash: u32, key: &K) -> Option<u32> {
        self.table.get(&self.ops, hash, key)
    }

    /// Finds the slot of `key` without modifying the set.
    pub fn find_safe(&self, key: &K) -> Option<u32> {
        self.find_safe_h(self.ops.hash(key), key)
    }

    pub fn find_safe_h(&self, hash: u32, key: &K) -> Option<u32> {
        self.table.safe_get(&self.ops, hash, key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.find_safe(key).is_some()
    }

    /// Returns the stored key equal to `key`.
    pub fn get(&self, key: &K) -> Option<&K> {
        self.find_safe(key).map(|pos| self.table.key(pos))
    }

    pub fn put(&mut self, key: K, mode: PutMode) -> Put {
        let hash = self.ops.hash(&key);
        self.put_h(hash, key, mode)
    }

    pub fn put_h(&mut self, hash: u32, key: K, mode: PutMode) -> Put {
        self.table.put(&self.ops, hash, key, (), mode)
    }

    /// Adds `key` to the set, returning true if it was not present.
    ///
    /// # Panics
    ///
    /// Panics if the set is sealed.
    pub fn insert(&mut self, key: K) -> bool {
        !self.put(key, PutMode::Keep).is_collision()
    }

    /// Adds `key` to the set, replacing an equal stored key, which is
    /// returned.
    pub fn replace(&mut self, key: K) -> Option<K> {
        let hash = self.ops.hash(&key);
        let previous = self.find_h(hash, &key).map(|pos| *self.table.key(pos));
        self.put_h(hash, key, PutMode::Overwrite);
        previous
    }

    /// Removes `key`, returning true if it was present.
    pub fn remove(&mut self, key: &K) -> bool {
        let hash = self.ops.hash(key);
        self.remove_h(hash, key)
    }

    pub fn remove_h(&mut self, hash: u32, key: &K) -> bool {
        match self.table.get(&self.ops, hash, key) {
            Some(pos) => self.table.del_at(pos),
            None => false,
        }
    }

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

    pub fn iter(&self) -> SetIter<'_, K, A> {
        SetIter::new(&self.table)
    }

    pub fn positions(&self) -> Positions<'_, K, (), A> {
        self.table.positions()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    pub fn seal(&mut self) {
        self.table.seal(&self.ops);
    }

    pub fn unseal(&mut self) {
        self.table.unseal();
    }

    pub fn is_sealed(&self) -> bool {
        self.table.is_sealed()
    }

    pub fn clear(&mut self) {
        self.table.clear();
    }

    pub fn wipe(&mut self) {
        self.table.wipe();
    }

    pub fn set_min_size(&mut self, min_size: u32) {
        self.table.set_min_size(min_size);
    }

    pub fn memory_footprint(&self) -> usize {
        self.table.memory_footprint()
    }
}

impl<K, O> Default for QSet<K, O, Global>
where
    K: Copy,
    O: KeyOps<K> + Default,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, O, A> fmt::Debug for QSet<K, O, A>
where
    K: Copy + fmt::Debug,
    O: KeyOps<K>,
    A: Allocator,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl<K, O, A> Extend<K> for QSet<K, O, A>
where
    K: Copy,
    O: KeyOps<K>,
    A: Allocator,
{
    fn extend<T: IntoIterator<Item = K>>(&mut self, iter: T) {
        for key in iter {
            self.insert(key);
        }
    }
}

impl<K, O> FromIterator<K> for QSet<K, O, Global>
where
    K: Copy,
    O: KeyOps<K> + Default,
{
    fn from_iter<T: IntoIterator<Item = K>>(iter: T) -> Self {
        let mut set = Self::new();
        set.extend(iter);
        set
    }
}

impl<'a, K, O, A> IntoIterator for &'a QSet<K, O, A>
where
    K: Copy,
    O: KeyOps<K>,
    A: Allocator,
{
    type Item = &'a K;
    type IntoIter = SetIter<'a, K, A>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
