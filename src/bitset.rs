//! Packed slot occupancy flags.
//!
//! Every slot owns two consecutive bits of a word array. The low bit of the
//! pair is the occupied flag, the high bit marks a slot that held an entry
//! which has since been removed (a ghost). Occupied and ghost slots therefore
//! differ in both bits, and [`OccupancyBits::invert`] switches between them.
//!
//! One extra bit, the low bit of the pair just past the last slot, is always
//! set. Scans for occupied slots stop on it instead of running off the end of
//! the array.

use crate::util::{allocate, deallocate, AllocationKind};
use allocator_api2::alloc::Allocator;
use std::ptr::NonNull;

/// Number of bits in a bitset word.
pub(crate) const WORD_BITS: usize = usize::BITS as usize;

/// Selects the occupied bit of every slot in a word (0x5555...).
const OCCUPIED_MASK: usize = usize::MAX / 3;

/// Flags of a slot which never held an entry.
pub(crate) const EMPTY: usize = 0b00;
/// Flags of a slot holding an entry.
pub(crate) const OCCUPIED: usize = 0b01;
/// Flags of a slot whose entry was removed.
pub(crate) const GHOST: usize = 0b10;

/// Occupancy flags for the slots of one table generation.
///
/// The memory is owned by the table, which releases it through
/// [`OccupancyBits::release_in`] with the allocator it was created with.
pub(crate) struct OccupancyBits {
    words: NonNull<usize>,
    len: usize,
}

impl OccupancyBits {
    /// Bits for a table which has no slots yet. Nothing is allocated.
    pub const fn empty() -> Self {
        OccupancyBits {
            words: NonNull::dangling(),
            len: 0,
        }
    }

    /// Number of words needed for `size` slots plus the guard bit.
    #[inline]
    pub const fn word_count(size: u32) -> usize {
        2 * size as usize / WORD_BITS + 1
    }

    /// Allocates cleared flags for `size` slots, with the guard bit set.
    pub fn new_in<A: Allocator>(allocator: &A, size: u32) -> Self {
        let len = Self::word_count(size);
        let words = allocate::<usize, A>(allocator, len, AllocationKind::Zeroed);
        let mut bits = OccupancyBits { words, len };
        bits.set_guard(size);
        bits
    }

    /// Returns the memory to `allocator`, leaving empty bits behind.
    pub fn release_in<A: Allocator>(&mut self, allocator: &A) {
        deallocate::<usize, A>(allocator, self.words, self.len);
        *self = Self::empty();
    }

    /// Clears every slot of a table with `size` slots, keeping the guard.
    pub fn reset(&mut self, size: u32) {
        self.words_mut().fill(0);
        if self.len > 0 {
            self.set_guard(size);
        }
    }

    /// Memory used by the words, in bytes.
    pub fn footprint(&self) -> usize {
        self.len * std::mem::size_of::<usize>()
    }

    #[inline]
    pub fn words(&self) -> &[usize] {
        // SAFETY: `words` points to `len` initialized words owned by `self`,
        // or is dangling with `len == 0`.
        unsafe { std::slice::from_raw_parts(self.words.as_ptr(), self.len) }
    }

    #[inline]
    fn words_mut(&mut self) -> &mut [usize] {
        // SAFETY: as for `words`, and `&mut self` guarantees exclusivity.
        unsafe { std::slice::from_raw_parts_mut(self.words.as_ptr(), self.len) }
    }

    /// Returns the word at `index`.
    #[inline]
    pub fn word(&self, index: usize) -> usize {
        self.words()[index]
    }

    /// A read-only view of the first `slots` slots, for scanning.
    #[inline]
    pub fn view(&self, slots: u32) -> BitView<'_> {
        BitView {
            words: self.words(),
            slots,
        }
    }

    /// Returns the two flag bits of the slot at `pos`.
    #[inline]
    pub fn flags(&self, pos: u32) -> usize {
        let bit = 2 * pos as usize;
        (self.word(bit / WORD_BITS) >> (bit % WORD_BITS)) & 0b11
    }

    /// Returns true if the slot at `pos` holds an entry.
    #[inline]
    pub fn is_occupied(&self, pos: u32) -> bool {
        self.flags(pos) & OCCUPIED != 0
    }

    /// Marks the never used slot at `pos` as occupied.
    #[inline]
    pub fn set_occupied(&mut self, pos: u32) {
        debug_assert_eq!(self.flags(pos), EMPTY);
        let bit = 2 * pos as usize;
        self.words_mut()[bit / WORD_BITS] |= 1 << (bit % WORD_BITS);
    }

    /// Turns an occupied slot into a ghost, or a ghost back into an occupied
    /// slot.
    #[inline]
    pub fn invert(&mut self, pos: u32) {
        debug_assert_ne!(self.flags(pos), EMPTY);
        let bit = 2 * pos as usize;
        self.words_mut()[bit / WORD_BITS] ^= 0b11 << (bit % WORD_BITS);
    }

    #[inline]
    fn set_guard(&mut self, size: u32) {
        let bit = 2 * size as usize;
        self.words_mut()[bit / WORD_BITS] |= 1 << (bit % WORD_BITS);
    }
}

/// Borrowed flags of a generation, limited to its first `slots` slots.
#[derive(Clone, Copy)]
pub(crate) struct BitView<'a> {
    words: &'a [usize],
    slots: u32,
}

/// Mask selecting the occupied bits at or above bit `pos` of its word.
#[inline]
const fn occupied_from(pos: usize) -> usize {
    OCCUPIED_MASK << (pos % WORD_BITS)
}

/// Mask selecting the occupied bits at or below bit `pos` of its word.
#[inline]
pub(crate) const fn occupied_upto(pos: usize) -> usize {
    OCCUPIED_MASK & (usize::MAX >> (WORD_BITS - 1 - pos % WORD_BITS))
}

/// Mask selecting every occupied bit of a word.
pub(crate) const OCCUPIED_BITS: usize = OCCUPIED_MASK;

/// Finds the first slot at or after `start` which is occupied in `current`, or
/// in `old` when a resize is in progress.
///
/// The two views are merged over the range they share, after which only the
/// longer view is scanned. Returns `None` once the end of the table is
/// reached.
pub(crate) fn scan(current: BitView<'_>, old: Option<BitView<'_>>, start: u32) -> Option<u32> {
    let mut long = current;
    let mut pos = 2 * start as usize;

    if let Some(mut short) = old {
        if current.slots < short.slots {
            std::mem::swap(&mut short, &mut long);
        }

        let short_end = 2 * short.slots as usize;
        if pos < short_end {
            while pos < short_end {
                let index = pos / WORD_BITS;
                let word = (short.words[index] | long.words[index]) & occupied_from(pos);
                pos &= !(WORD_BITS - 1);
                if word != 0 {
                    pos += word.trailing_zeros() as usize;
                    if pos < short_end {
                        return Some((pos / 2) as u32);
                    }
                    break;
                }
                pos += WORD_BITS;
            }
            pos = short_end;
        }
    }

    let long_end = 2 * long.slots as usize;
    if pos >= long_end {
        return None;
    }
    loop {
        let word = long.words[pos / WORD_BITS] & occupied_from(pos);
        pos &= !(WORD_BITS - 1);
        if word != 0 {
            pos += word.trailing_zeros() as usize;
            return (pos < long_end).then_some((pos / 2) as u32);
        }
        pos += WORD_BITS;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use allocator_api2::alloc::Global;

    fn bits_with(size: u32, occupied: &[u32]) -> OccupancyBits {
        let mut bits = OccupancyBits::new_in(&Global, size);
        for &pos in occupied {
            bits.set_occupied(pos);
        }
        bits
    }

    #[test]
    fn new_bits_are_empty_with_guard() {
        let mut bits = OccupancyBits::new_in(&Global, 97);
        assert_eq!(bits.words().len(), OccupancyBits::word_count(97));
        assert!((0..97).all(|pos| bits.flags(pos) == EMPTY));
        assert_eq!(bits.flags(97), OCCUPIED);
        bits.release_in(&Global);
        assert!(bits.words().is_empty());
    }

    #[test]
    fn guard_on_word_boundary() {
        // 2 * 32 lands exactly on the first bit of the second word on 64 bit.
        let mut bits = OccupancyBits::new_in(&Global, 32);
        assert_eq!(bits.flags(32), OCCUPIED);
        assert!((0..32).all(|pos| bits.flags(pos) == EMPTY));
        bits.release_in(&Global);
    }

    #[test]
    fn flag_transitions() {
        let mut bits = OccupancyBits::new_in(&Global, 11);
        bits.set_occupied(4);
        assert_eq!(bits.flags(4), OCCUPIED);
        assert!(bits.is_occupied(4));

        bits.invert(4);
        assert_eq!(bits.flags(4), GHOST);
        assert!(!bits.is_occupied(4));

        bits.invert(4);
        assert_eq!(bits.flags(4), OCCUPIED);

        // Neighbours are untouched.
        assert_eq!(bits.flags(3), EMPTY);
        assert_eq!(bits.flags(5), EMPTY);
        bits.release_in(&Global);
    }

    #[test]
    fn reset_keeps_guard() {
        let mut bits = bits_with(23, &[0, 7, 22]);
        bits.invert(7);
        bits.reset(23);
        assert!((0..23).all(|pos| bits.flags(pos) == EMPTY));
        assert_eq!(bits.flags(23), OCCUPIED);
        bits.release_in(&Global);
    }

    #[test]
    fn scan_single_view() {
        let mut bits = bits_with(100, &[3, 40, 99]);
        bits.set_occupied(50);
        bits.invert(50);

        let view = bits.view(100);
        assert_eq!(scan(view, None, 0), Some(3));
        assert_eq!(scan(view, None, 3), Some(3));
        assert_eq!(scan(view, None, 4), Some(40));
        assert_eq!(scan(view, None, 41), Some(99));
        assert_eq!(scan(view, None, 100), None);
        bits.release_in(&Global);
    }

    #[test]
    fn scan_stops_on_guard() {
        let mut bits = OccupancyBits::new_in(&Global, 193);
        assert_eq!(scan(bits.view(193), None, 0), None);
        bits.release_in(&Global);

        let empty = OccupancyBits::empty();
        assert_eq!(scan(empty.view(0), None, 0), None);
    }

    #[test]
    fn scan_merges_old_generation() {
        let mut current = bits_with(23, &[2, 15]);
        let mut old = bits_with(11, &[5]);

        let cur = current.view(23);
        let old_view = old.view(11);
        assert_eq!(scan(cur, Some(old_view), 0), Some(2));
        assert_eq!(scan(cur, Some(old_view), 3), Some(5));
        assert_eq!(scan(cur, Some(old_view), 6), Some(15));
        assert_eq!(scan(cur, Some(old_view), 16), None);

        current.release_in(&Global);
        old.release_in(&Global);
    }

    #[test]
    fn scan_old_generation_longer_than_current() {
        // Shrinking: the old generation extends past the current one.
        let mut current = bits_with(11, &[9]);
        let mut old = bits_with(97, &[1, 20, 96]);

        let cur = current.view(11);
        let old_view = old.view(97);
        assert_eq!(scan(cur, Some(old_view), 0), Some(1));
        assert_eq!(scan(cur, Some(old_view), 2), Some(9));
        assert_eq!(scan(cur, Some(old_view), 10), Some(20));
        assert_eq!(scan(cur, Some(old_view), 21), Some(96));
        assert_eq!(scan(cur, Some(old_view), 97), None);

        // A lowered watermark hides migrated old slots.
        assert_eq!(scan(cur, Some(old.view(32)), 10), Some(20));
        assert_eq!(scan(cur, Some(old.view(16)), 10), None);

        current.release_in(&Global);
        old.release_in(&Global);
    }

    #[test]
    fn upto_mask() {
        assert_eq!(occupied_upto(0), 1);
        assert_eq!(occupied_upto(1), 1);
        assert_eq!(occupied_upto(2), 0b101);
        assert_eq!(occupied_upto(WORD_BITS - 1), OCCUPIED_BITS);
    }
}
