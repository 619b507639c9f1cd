use core::mem;

use static_assertions::const_assert;

use crate::align::DEFAULT_ALIGNMENT;

/// Bookkeeping record preceding every block handed out by a
/// [`LinearAllocator`](crate::LinearAllocator) or
/// [`FreelistAllocator`](crate::FreelistAllocator).
///
/// A frame looks like this in memory:
///
/// ```text
///   [padding][header][padding][back-pointer][payload]
///   ^frame start (marker)                   ^pointer returned to the caller
///   --------------- frame_size ---------------------
/// ```
///
/// The header is aligned to [`DEFAULT_ALIGNMENT`]; the payload to the
/// requested alignment. The back-pointer is the header address stored in the
/// word immediately before the payload, so `free` can recover the header from
/// a payload pointer in O(1).
///
/// `prev`/`next` link either the allocation chain (live blocks, in
/// allocation order) or the free chain (freelist allocator, ascending
/// address order) depending on the block's state.
#[repr(C)]
pub(crate) struct AllocHeader {
  pub prev: *mut AllocHeader,
  pub next: *mut AllocHeader,
  /// Frame start: the allocator cursor at allocation time (linear), or the
  /// block's frame start address (freelist).
  pub marker: *mut u8,
  /// Total frame footprint: header, padding, back-pointer and payload.
  pub frame_size: usize,
  /// Requested payload size.
  pub data_size: usize,
  /// Payload alignment actually honored.
  pub alignment: usize,
}

/// Bytes consumed by the header plus the back-pointer word.
pub(crate) const META_SIZE: usize = mem::size_of::<AllocHeader>() + mem::size_of::<usize>();

const_assert!(mem::size_of::<AllocHeader>() % DEFAULT_ALIGNMENT == 0);
const_assert!(mem::align_of::<AllocHeader>() <= DEFAULT_ALIGNMENT);
const_assert!(mem::size_of::<usize>() <= DEFAULT_ALIGNMENT);

/// Stores `header` in the word immediately before `data`.
///
/// # Safety
///
/// `data` must point at least `size_of::<usize>()` bytes past the start of a
/// writable frame and be aligned to [`DEFAULT_ALIGNMENT`].
pub(crate) unsafe fn store_back_pointer(
  data: *mut u8,
  header: *mut AllocHeader,
) {
  unsafe {
    (data.sub(mem::size_of::<usize>()) as *mut *mut AllocHeader).write(header);
  }
}

/// Recovers the header address stored by [`store_back_pointer`].
///
/// # Safety
///
/// `data` must be a payload pointer previously produced by one of the
/// allocators in this crate, with its back-pointer intact.
pub(crate) unsafe fn load_back_pointer(data: *mut u8) -> *mut AllocHeader {
  unsafe { (data.sub(mem::size_of::<usize>()) as *const *mut AllocHeader).read() }
}
