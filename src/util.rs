use allocator_api2::alloc::{Allocator, Layout};
use std::alloc::handle_alloc_error;
use std::ptr::NonNull;

/// Loads up to eight bytes of `buf` as a little endian u64.
#[inline]
pub fn load_u64_le(buf: &[u8], len: usize) -> u64 {
    debug_assert!(len <= buf.len() && len <= 8);
    let mut data = [0u8; 8];
    data[..len].copy_from_slice(&buf[..len]);
    u64::from_le_bytes(data)
}

/// Kinds of allocation initialization.
pub enum AllocationKind {
    /// Allocation should be zeroed.
    Zeroed,
    /// Allocation can be uninitialized.
    Uninitialized,
}

/// Returns the layout for `count` elements of type T.
fn array_layout<T>(count: usize) -> Layout {
    // Slot counts are bounded by the prime table, so this only fails on a
    // corrupted count, in which case we want to panic.
    Layout::array::<T>(count)
        .unwrap_or_else(|_| panic!("qhash: invalid layout for {count} elements"))
}

/// Returns true if an array of `count` elements of type T needs no memory.
#[inline]
fn is_empty_array<T>(count: usize) -> bool {
    std::mem::size_of::<T>() == 0 || count == 0
}

/// Allocates `count` number of elements of type T, using the `allocator`.
///
/// Zero sized requests return a dangling pointer without calling into the
/// allocator.
pub(crate) fn allocate<T, A: Allocator>(
    allocator: &A,
    count: usize,
    kind: AllocationKind,
) -> NonNull<T> {
    if is_empty_array::<T>(count) {
        return NonNull::dangling();
    }

    let layout = array_layout::<T>(count);
    let result = match kind {
        AllocationKind::Zeroed => allocator.allocate_zeroed(layout),
        AllocationKind::Uninitialized => allocator.allocate(layout),
    };
    match result {
        Ok(ptr) => ptr.cast::<T>(),
        Err(_) => handle_alloc_error(layout),
    }
}

/// Resizes the allocation at `ptr` from `old_count` to `new_count` elements of
/// type T. New elements are left uninitialized, the first
/// `min(old_count, new_count)` elements are preserved.
pub(crate) fn reallocate<T, A: Allocator>(
    allocator: &A,
    ptr: NonNull<T>,
    old_count: usize,
    new_count: usize,
) -> NonNull<T> {
    if std::mem::size_of::<T>() == 0 || old_count == new_count {
        return ptr;
    }
    if old_count == 0 {
        return allocate(allocator, new_count, AllocationKind::Uninitialized);
    }
    if new_count == 0 {
        deallocate(allocator, ptr, old_count);
        return NonNull::dangling();
    }

    let old_layout = array_layout::<T>(old_count);
    let new_layout = array_layout::<T>(new_count);

    // SAFETY: `ptr` was allocated by `allocator` with `old_layout`, both
    // layouts share the alignment of T, and the size ordering matches the call.
    let result = unsafe {
        if new_count > old_count {
            allocator.grow(ptr.cast::<u8>(), old_layout, new_layout)
        } else {
            allocator.shrink(ptr.cast::<u8>(), old_layout, new_layout)
        }
    };
    match result {
        Ok(ptr) => ptr.cast::<T>(),
        Err(_) => handle_alloc_error(new_layout),
    }
}

/// Deallocates `count` number of elements of type T, using the `allocator`.
pub(crate) fn deallocate<T, A: Allocator>(allocator: &A, ptr: NonNull<T>, count: usize) {
    if is_empty_array::<T>(count) {
        return;
    }

    let layout = array_layout::<T>(count);
    // SAFETY: `ptr` was allocated by `allocator` for `count` elements of T.
    unsafe {
        allocator.deallocate(ptr.cast::<u8>(), layout);
    }
}
