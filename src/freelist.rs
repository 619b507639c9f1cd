use core::mem;
use core::ptr::{self, NonNull};

use log::{debug, warn};

use crate::align::{DEFAULT_ALIGNMENT, MALLOC_ALIGNMENT, align_up, is_aligned, is_power_of_two};
use crate::error::{AllocError, Result};
use crate::fill;
use crate::header::{AllocHeader, META_SIZE, load_back_pointer, store_back_pointer};
use crate::linear::{Carve, LinearAllocator};
use crate::os::{self, Backing};
use crate::stats::AllocatorStats;

/// Smallest backing capacity that can host one header plus an aligned
/// payload byte.
const MIN_CAPACITY: usize = align_up(META_SIZE + DEFAULT_ALIGNMENT, MALLOC_ALIGNMENT);

/// General-purpose first-fit allocator over a fixed-capacity buffer.
///
/// Blocks may be freed in any order; address-adjacent free blocks are
/// coalesced eagerly on every free, so no two free blocks are ever mutually
/// adjacent at rest. The allocator never grows and never compacts beyond
/// coalescing. Used where allocation and free do not follow a stack
/// discipline (an embedded interpreter, for instance); frame-scoped state
/// belongs in a [`LinearAllocator`](crate::LinearAllocator) or
/// [`Arena`](crate::Arena) instead.
///
/// Instances are not internally synchronized; each one assumes a single
/// writer.
#[derive(Debug)]
pub struct FreelistAllocator {
  base: NonNull<u8>,
  first_free: *mut AllocHeader,
  last_alloc: *mut AllocHeader,
  stats: AllocatorStats,
  backing: Backing,
}

impl FreelistAllocator {
  /// Creates a root allocator backed by `bytes` of OS virtual memory.
  pub fn new(
    name: &'static str,
    bytes: usize,
  ) -> Result<Self> {
    os::validate_capacity(name, bytes, MIN_CAPACITY)?;
    let base = os::reserve(name, bytes)?;
    debug!("'{name}': created freelist allocator, {bytes} bytes reserved");
    Ok(Self::with_backing(name, base, bytes, Backing::Os))
  }

  /// Creates an allocator over a caller-owned buffer. The buffer is never
  /// released by this crate.
  ///
  /// # Safety
  ///
  /// `[base, base + bytes)` must be writable and unused by anything else for
  /// the allocator's whole lifetime.
  pub unsafe fn from_raw_parts(
    name: &'static str,
    base: NonNull<u8>,
    bytes: usize,
  ) -> Result<Self> {
    os::validate_capacity(name, bytes, MIN_CAPACITY)?;
    if !is_aligned(base.as_ptr() as usize, DEFAULT_ALIGNMENT) {
      return Err(AllocError::BadAlignment(base.as_ptr() as usize));
    }
    Ok(Self::with_backing(name, base, bytes, Backing::Placement))
  }

  /// Carves a freelist allocator out of a parent linear allocator. Returned
  /// to the parent with [`LinearAllocator::destroy_child`].
  pub fn child_of(
    parent: &mut LinearAllocator,
    name: &'static str,
    bytes: usize,
  ) -> Result<Self> {
    os::validate_capacity(name, bytes, MIN_CAPACITY)?;
    let base = parent.alloc(bytes)?;
    debug!("'{name}': carved from '{}', {bytes} bytes", parent.name());
    Ok(Self::with_backing(name, base, bytes, Backing::Carved))
  }

  fn with_backing(
    name: &'static str,
    base: NonNull<u8>,
    capacity: usize,
    backing: Backing,
  ) -> Self {
    let mut allocator = Self {
      base,
      first_free: ptr::null_mut(),
      last_alloc: ptr::null_mut(),
      stats: AllocatorStats::new(name, capacity),
      backing,
    };
    allocator.reset();
    allocator
  }

  /// Reinitializes the whole capacity as one free block and zeroes the
  /// counters. Everything previously allocated is discarded.
  pub fn reset(&mut self) {
    let base = self.base.as_ptr();
    let capacity = self.stats.capacity();

    // constructors guarantee an 8-aligned base, so the header sits at it
    debug_assert!(is_aligned(base as usize, DEFAULT_ALIGNMENT));
    debug_assert!(META_SIZE + DEFAULT_ALIGNMENT <= capacity);

    let header = base as *mut AllocHeader;
    unsafe {
      header.write(AllocHeader {
        prev: ptr::null_mut(),
        next: ptr::null_mut(),
        marker: base,
        frame_size: capacity,
        data_size: 0,
        alignment: 0,
      });
      fill::freed_frame(header);
    }

    self.stats.reset();
    self.first_free = header;
    self.last_alloc = ptr::null_mut();
  }

  /// Allocates `bytes` with [`DEFAULT_ALIGNMENT`].
  pub fn alloc(
    &mut self,
    bytes: usize,
  ) -> Result<NonNull<u8>> {
    self.alloc_aligned(bytes, DEFAULT_ALIGNMENT)
  }

  /// Allocates `bytes` from the first free block whose frame fits the
  /// request (first-fit, not best-fit).
  ///
  /// The winning block is split when the remainder can host a minimal free
  /// block of its own; otherwise it is consumed whole and its full frame is
  /// accounted against the request.
  pub fn alloc_aligned(
    &mut self,
    bytes: usize,
    alignment: usize,
  ) -> Result<NonNull<u8>> {
    if bytes == 0 {
      return Err(AllocError::ZeroSize);
    }
    if !is_power_of_two(alignment) {
      return Err(AllocError::BadAlignment(alignment));
    }

    let alignment = alignment.max(DEFAULT_ALIGNMENT);

    unsafe {
      let mut block = self.first_free;
      while !block.is_null() && !can_fit(block, bytes, alignment) {
        block = (*block).next;
      }

      if block.is_null() {
        warn!(
          "'{}': out of free memory, {bytes} bytes requested with {} free",
          self.name(),
          self.stats.remaining()
        );
        return Err(AllocError::OutOfMemory {
          name: self.name(),
          requested: bytes,
          available: self.stats.remaining(),
        });
      }

      let data_addr = align_up(block as usize + META_SIZE, alignment);
      let marker = (*block).marker;
      let frame_size = data_addr - marker as usize + bytes;

      if can_split(block, frame_size) {
        // shrink the block to the satisfied frame and hand the remainder to
        // a new free block that takes its place in the chain
        let old_frame = (*block).frame_size;
        (*block).frame_size = frame_size;

        let frame_end = marker as usize + old_frame;
        let new_marker = marker.add(frame_size);
        let new_header = align_up(new_marker as usize, DEFAULT_ALIGNMENT) as *mut AllocHeader;
        new_header.write(AllocHeader {
          prev: (*block).prev,
          next: (*block).next,
          marker: new_marker,
          frame_size: frame_end - new_marker as usize,
          data_size: 0,
          alignment: 0,
        });

        if !(*new_header).prev.is_null() {
          (*(*new_header).prev).next = new_header;
        }
        if !(*new_header).next.is_null() {
          (*(*new_header).next).prev = new_header;
        }
        if block == self.first_free {
          self.first_free = new_header;
        }
      } else {
        // consume the block whole
        if !(*block).prev.is_null() {
          (*(*block).prev).next = (*block).next;
        }
        if !(*block).next.is_null() {
          (*(*block).next).prev = (*block).prev;
        }
        if block == self.first_free {
          self.first_free = (*block).next;
        }
      }

      (*block).data_size = bytes;
      (*block).alignment = alignment;
      (*block).prev = self.last_alloc;
      (*block).next = ptr::null_mut();

      let data = data_addr as *mut u8;
      store_back_pointer(data, block);
      fill::fresh_payload(data, bytes);

      if !self.last_alloc.is_null() {
        (*self.last_alloc).next = block;
      }
      self.last_alloc = block;
      self.stats.record_alloc((*block).frame_size, bytes);

      Ok(NonNull::new_unchecked(data))
    }
  }

  /// Allocates room for one `T`. The memory is uninitialized.
  pub fn alloc_uninit<T>(&mut self) -> Result<NonNull<T>> {
    Ok(self.alloc_aligned(mem::size_of::<T>(), mem::align_of::<T>())?.cast())
  }

  /// Allocates room for `count` contiguous `T`s. The memory is
  /// uninitialized.
  pub fn alloc_array<T>(
    &mut self,
    count: usize,
  ) -> Result<NonNull<T>> {
    let bytes = mem::size_of::<T>()
      .checked_mul(count)
      .ok_or(AllocError::OutOfMemory {
        name: self.name(),
        requested: usize::MAX,
        available: self.stats.remaining(),
      })?;
    Ok(self.alloc_aligned(bytes, mem::align_of::<T>())?.cast())
  }

  /// Allocates a new block, copies `min(new_bytes, old size)` bytes and
  /// frees the old block. An `alignment` of zero inherits the old block's
  /// alignment.
  pub fn realloc(
    &mut self,
    data: NonNull<u8>,
    new_bytes: usize,
  ) -> Result<NonNull<u8>> {
    self.realloc_aligned(data, new_bytes, 0)
  }

  /// [`realloc`](Self::realloc) with an explicit payload alignment.
  pub fn realloc_aligned(
    &mut self,
    data: NonNull<u8>,
    new_bytes: usize,
    alignment: usize,
  ) -> Result<NonNull<u8>> {
    if !self.owns(data.as_ptr()) {
      return Err(AllocError::ForeignPointer { name: self.name() });
    }

    unsafe {
      let header = load_back_pointer(data.as_ptr());
      let alignment = if alignment == 0 { (*header).alignment } else { alignment };
      let old_size = (*header).data_size;

      let new_data = self.alloc_aligned(new_bytes, alignment)?;
      ptr::copy_nonoverlapping(data.as_ptr(), new_data.as_ptr(), old_size.min(new_bytes));
      self.free(data)?;
      Ok(new_data)
    }
  }

  /// Frees a block, in any order. The released frame is inserted into the
  /// address-ordered free chain and coalesced with both neighbors when they
  /// are address-adjacent.
  pub fn free(
    &mut self,
    data: NonNull<u8>,
  ) -> Result<()> {
    if !self.owns(data.as_ptr()) {
      return Err(AllocError::ForeignPointer { name: self.name() });
    }

    unsafe {
      let block = load_back_pointer(data.as_ptr());
      if block.is_null() || !self.owns(block as *const u8) {
        return Err(AllocError::ForeignPointer { name: self.name() });
      }

      let frame_size = (*block).frame_size;
      let data_size = (*block).data_size;

      // unlink from the allocation chain
      if !(*block).next.is_null() {
        (*(*block).next).prev = (*block).prev;
      }
      if !(*block).prev.is_null() {
        (*(*block).prev).next = (*block).next;
      }
      if block == self.last_alloc {
        self.last_alloc = (*block).prev;
      }

      // locate the free-chain position: prev_free < block < next_free
      let mut next_free = self.first_free;
      let mut prev_free: *mut AllocHeader = ptr::null_mut();
      while !next_free.is_null() && (next_free as usize) <= (block as usize) {
        prev_free = next_free;
        next_free = (*next_free).next;
      }

      release_block(block, prev_free, next_free);

      if self.first_free.is_null() || (block as usize) < (self.first_free as usize) {
        self.first_free = block;
      }

      // eager coalescing; a predecessor merge can newly expose the
      // successor as adjacent, so re-check it
      if join_blocks(prev_free, block) {
        join_blocks(prev_free, next_free);
      } else {
        join_blocks(block, next_free);
      }

      self.stats.record_free(frame_size, data_size);
    }
    Ok(())
  }

  pub fn name(&self) -> &'static str {
    self.stats.name()
  }

  pub fn capacity(&self) -> usize {
    self.stats.capacity()
  }

  /// Live accounting counters.
  pub fn stats(&self) -> &AllocatorStats {
    &self.stats
  }

  fn owns(
    &self,
    addr: *const u8,
  ) -> bool {
    let base = self.base.as_ptr() as usize;
    let addr = addr as usize;
    addr >= base && addr < base + self.stats.capacity()
  }
}

impl Carve for FreelistAllocator {
  fn carve_base(&self) -> NonNull<u8> {
    self.base
  }
}

impl Drop for FreelistAllocator {
  fn drop(&mut self) {
    if let Backing::Os = self.backing {
      debug!("'{}': releasing {} bytes of backing memory", self.name(), self.capacity());
      os::release(self.base, self.stats.capacity());
    }
  }
}

/// Whether `header`'s frame can satisfy `bytes` at `alignment`.
unsafe fn can_fit(
  header: *const AllocHeader,
  bytes: usize,
  alignment: usize,
) -> bool {
  unsafe {
    let data_addr = align_up(header as usize + META_SIZE, alignment);
    let overhead = data_addr - (*header).marker as usize;
    // checked add: `bytes` is caller-controlled and may be near usize::MAX
    match overhead.checked_add(bytes) {
      Some(needed) => needed <= (*header).frame_size,
      None => false,
    }
  }
}

/// Whether the residual space past a satisfied frame of `frame_size` bytes
/// can host a minimal free block of its own.
unsafe fn can_split(
  header: *const AllocHeader,
  frame_size: usize,
) -> bool {
  unsafe {
    let marker = (*header).marker as usize;
    let frame_end = marker + (*header).frame_size;
    let next_header = align_up(marker + frame_size, DEFAULT_ALIGNMENT);
    let next_data = align_up(next_header + META_SIZE, DEFAULT_ALIGNMENT);
    next_data <= frame_end
  }
}

/// Turns `block` back into a free block linked between `prev_free` and
/// `next_free`.
unsafe fn release_block(
  block: *mut AllocHeader,
  prev_free: *mut AllocHeader,
  next_free: *mut AllocHeader,
) {
  unsafe {
    (*block).prev = prev_free;
    (*block).next = next_free;
    (*block).data_size = 0;
    (*block).alignment = 0;
    fill::freed_frame(block);

    if !prev_free.is_null() {
      (*prev_free).next = block;
    }
    if !next_free.is_null() {
      (*next_free).prev = block;
    }
  }
}

/// Whether `left`'s frame ends exactly where `right`'s begins.
unsafe fn can_join(
  left: *const AllocHeader,
  right: *const AllocHeader,
) -> bool {
  unsafe { (*left).marker as usize + (*left).frame_size == (*right).marker as usize }
}

/// Merges two free blocks when they are address-adjacent. Returns whether a
/// merge happened.
unsafe fn join_blocks(
  left: *mut AllocHeader,
  right: *mut AllocHeader,
) -> bool {
  if left.is_null() || right.is_null() {
    return false;
  }

  unsafe {
    if !can_join(left, right) {
      return false;
    }

    (*left).next = (*right).next;
    (*left).frame_size += (*right).frame_size;
    if !(*right).next.is_null() {
      (*(*right).next).prev = left;
    }
    fill::freed_frame(left);
    true
  }
}
