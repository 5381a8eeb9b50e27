//! Iterators over the entries of maps and sets.
//!
//! Entries are visited in slot order. During a resize the slots of both
//! generations are merged, so every entry is seen exactly once.

use crate::raw::{Positions, RawTable};
use allocator_api2::alloc::{Allocator, Global};
use std::iter::FusedIterator;

/// Iterator over a [`QMap`](crate::QMap) which yields key-value pairs.
pub struct Iter<'a, K, V, A: Allocator = Global> {
    table: &'a RawTable<K, V, A>,
    positions: Positions<'a, K, V, A>,
    remaining: usize,
}

impl<'a, K, V, A> Iter<'a, K, V, A>
where
    K: Copy,
    V: Copy,
    A: Allocator,
{
    pub(crate) fn new(table: &'a RawTable<K, V, A>) -> Self {
        Self {
            table,
            positions: table.positions(),
            remaining: table.len(),
        }
    }
}

impl<'a, K, V, A> Iterator for Iter<'a, K, V, A>
where
    K: Copy,
    V: Copy,
    A: Allocator,
{
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let pos = self.positions.next()?;
        self.remaining -= 1;
        Some((self.table.key(pos), self.table.value(pos)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K: Copy, V: Copy, A: Allocator> ExactSizeIterator for Iter<'_, K, V, A> {}
impl<K: Copy, V: Copy, A: Allocator> FusedIterator for Iter<'_, K, V, A> {}

/// Iterator over the keys of a [`QMap`](crate::QMap).
pub struct Keys<'a, K, V, A: Allocator = Global> {
    inner: Iter<'a, K, V, A>,
}

impl<'a, K: Copy, V: Copy, A: Allocator> Keys<'a, K, V, A> {
    pub(crate) fn new(inner: Iter<'a, K, V, A>) -> Self {
        Self { inner }
    }
}

impl<'a, K: Copy, V: Copy, A: Allocator> Iterator for Keys<'a, K, V, A> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(key, _)| key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K: Copy, V: Copy, A: Allocator> ExactSizeIterator for Keys<'_, K, V, A> {}

/// Iterator over the values of a [`QMap`](crate::QMap).
pub struct Values<'a, K, V, A: Allocator = Global> {
    inner: Iter<'a, K, V, A>,
}

impl<'a, K: Copy, V: Copy, A: Allocator> Values<'a, K, V, A> {
    pub(crate) fn new(inner: Iter<'a, K, V, A>) -> Self {
        Self { inner }
    }
}

impl<'a, K: Copy, V: Copy, A: Allocator> Iterator for Values<'a, K, V, A> {
    type Item = &'a V;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(_, value)| value)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K: Copy, V: Copy, A: Allocator> ExactSizeIterator for Values<'_, K, V, A> {}

/// Iterator over the keys of a [`QSet`](crate::QSet).
pub struct SetIter<'a, K, A: Allocator = Global> {
    inner: Iter<'a, K, (), A>,
}

impl<'a, K: Copy, A: Allocator> SetIter<'a, K, A> {
    pub(crate) fn new(table: &'a RawTable<K, (), A>) -> Self {
        Self {
            inner: Iter::new(table),
        }
    }
}

impl<'a, K: Copy, A: Allocator> Iterator for SetIter<'a, K, A> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(key, _)| key)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K: Copy, A: Allocator> ExactSizeIterator for SetIter<'_, K, A> {}
