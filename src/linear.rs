use core::mem;
use core::ptr::{self, NonNull};

use log::{debug, warn};

use crate::align::{DEFAULT_ALIGNMENT, MALLOC_ALIGNMENT, align_up, is_aligned, is_power_of_two};
use crate::error::{AllocError, Result};
use crate::fill;
use crate::header::{AllocHeader, META_SIZE, load_back_pointer, store_back_pointer};
use crate::os::{self, Backing};
use crate::stats::AllocatorStats;

/// A region carved out of a parent [`LinearAllocator`].
///
/// From the parent's point of view a carve is one ordinary allocation; it is
/// released through [`LinearAllocator::destroy_child`], which obeys the
/// parent's LIFO free rule. The parent must not be destroyed (nor the carve
/// freed) while the child is still in use.
pub trait Carve {
  /// Base address of the carved region inside the parent.
  fn carve_base(&self) -> NonNull<u8>;
}

/// Monotonic bump allocator over a fixed-capacity buffer.
///
/// Allocation advances a cursor; deallocation is legal only in strict
/// reverse allocation order (most recent live block first) and is checked on
/// every call, in every build configuration. [`reset`](Self::reset) recycles
/// the whole buffer in O(1).
///
/// Instances are not internally synchronized; each one assumes a single
/// writer.
#[derive(Debug)]
pub struct LinearAllocator {
  base: NonNull<u8>,
  cursor: *mut u8,
  last_alloc: *mut AllocHeader,
  stats: AllocatorStats,
  backing: Backing,
}

impl LinearAllocator {
  /// Creates a root allocator backed by `bytes` of OS virtual memory.
  ///
  /// `bytes` must be a non-zero multiple of
  /// [`MALLOC_ALIGNMENT`](crate::align::MALLOC_ALIGNMENT).
  pub fn new(
    name: &'static str,
    bytes: usize,
  ) -> Result<Self> {
    os::validate_capacity(name, bytes, MALLOC_ALIGNMENT)?;
    let base = os::reserve(name, bytes)?;
    debug!("'{name}': created linear allocator, {bytes} bytes reserved");
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
    os::validate_capacity(name, bytes, MALLOC_ALIGNMENT)?;
    if !is_aligned(base.as_ptr() as usize, DEFAULT_ALIGNMENT) {
      return Err(AllocError::BadAlignment(base.as_ptr() as usize));
    }
    Ok(Self::with_backing(name, base, bytes, Backing::Placement))
  }

  /// Carves a child allocator out of `parent`. The carve counts as one
  /// allocation of the parent and is returned to it with
  /// [`destroy_child`](Self::destroy_child).
  pub fn child_of(
    parent: &mut LinearAllocator,
    name: &'static str,
    bytes: usize,
  ) -> Result<Self> {
    os::validate_capacity(name, bytes, MALLOC_ALIGNMENT)?;
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
    Self {
      base,
      cursor: base.as_ptr(),
      last_alloc: ptr::null_mut(),
      stats: AllocatorStats::new(name, capacity),
      backing,
    }
  }

  /// Allocates `bytes` with [`DEFAULT_ALIGNMENT`].
  pub fn alloc(
    &mut self,
    bytes: usize,
  ) -> Result<NonNull<u8>> {
    self.alloc_aligned(bytes, DEFAULT_ALIGNMENT)
  }

  /// Allocates `bytes` with the given payload alignment (rounded up to
  /// [`DEFAULT_ALIGNMENT`]).
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
    let marker = self.cursor;
    let header_addr = align_up(marker as usize, DEFAULT_ALIGNMENT);
    let data_addr = align_up(header_addr + META_SIZE, alignment);
    let overhead = data_addr - marker as usize;

    // checked add: `bytes` is caller-controlled and may be near usize::MAX
    let frame_size = match overhead.checked_add(bytes) {
      Some(frame) if frame <= self.stats.remaining() => frame,
      _ => {
        warn!(
          "'{}': out of memory, {bytes} bytes requested with {} free",
          self.name(),
          self.stats.remaining()
        );
        return Err(AllocError::OutOfMemory {
          name: self.name(),
          requested: bytes,
          available: self.stats.remaining(),
        });
      }
    };

    unsafe {
      let header = header_addr as *mut AllocHeader;
      header.write(AllocHeader {
        prev: self.last_alloc,
        next: ptr::null_mut(),
        marker,
        frame_size,
        data_size: bytes,
        alignment,
      });

      let data = data_addr as *mut u8;
      store_back_pointer(data, header);

      if !self.last_alloc.is_null() {
        (*self.last_alloc).next = header;
      }

      self.last_alloc = header;
      self.cursor = marker.add(frame_size);
      self.stats.record_alloc(frame_size, bytes);

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

  /// Allocates a new block of `new_bytes` and copies
  /// `min(new_bytes, old size)` bytes over.
  ///
  /// The old block is *not* freed: under the LIFO rule it can only be freed
  /// once everything allocated after it (including the new block) is gone.
  pub fn realloc(
    &mut self,
    data: NonNull<u8>,
    new_bytes: usize,
  ) -> Result<NonNull<u8>> {
    self.realloc_aligned(data, new_bytes, DEFAULT_ALIGNMENT)
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

    let old_size = unsafe { (*load_back_pointer(data.as_ptr())).data_size };
    let new_data = self.alloc_aligned(new_bytes, alignment)?;
    unsafe {
      ptr::copy_nonoverlapping(data.as_ptr(), new_data.as_ptr(), old_size.min(new_bytes));
    }
    Ok(new_data)
  }

  /// Frees the most recent live allocation.
  ///
  /// Freeing any other block returns [`AllocError::OutOfOrderFree`] and
  /// leaves the allocator untouched.
  pub fn free(
    &mut self,
    data: NonNull<u8>,
  ) -> Result<()> {
    if !self.owns(data.as_ptr()) {
      return Err(AllocError::ForeignPointer { name: self.name() });
    }

    let header = unsafe { load_back_pointer(data.as_ptr()) };
    if header.is_null() || header != self.last_alloc {
      return Err(AllocError::OutOfOrderFree { name: self.name() });
    }

    unsafe {
      let frame_size = (*header).frame_size;
      let data_size = (*header).data_size;
      let marker = (*header).marker;
      let prev = (*header).prev;
      debug_assert_eq!(marker.add(frame_size), self.cursor);

      if !prev.is_null() {
        (*prev).next = ptr::null_mut();
      }

      fill::freed_frame(header);

      self.cursor = marker;
      self.last_alloc = prev;
      self.stats.record_free(frame_size, data_size);
    }
    Ok(())
  }

  /// Returns the cursor to the base and zeroes the counters. O(1).
  pub fn reset(&mut self) {
    debug!("'{}': reset", self.name());
    self.cursor = self.base.as_ptr();
    self.last_alloc = ptr::null_mut();
    self.stats.reset();
  }

  /// Releases a child region (a carved allocator or arena) back to this
  /// allocator. Subject to the LIFO free rule like any other allocation.
  pub fn destroy_child<C: Carve>(
    &mut self,
    child: C,
  ) -> Result<()> {
    let base = child.carve_base();
    drop(child);
    self.free(base)
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

  /// Current cursor displacement from the base address.
  pub fn cursor(&self) -> usize {
    self.cursor as usize - self.base.as_ptr() as usize
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

impl Carve for LinearAllocator {
  fn carve_base(&self) -> NonNull<u8> {
    self.base
  }
}

impl Drop for LinearAllocator {
  fn drop(&mut self) {
    if let Backing::Os = self.backing {
      debug!("'{}': releasing {} bytes of backing memory", self.name(), self.capacity());
      os::release(self.base, self.stats.capacity());
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::align::kb;

  #[test]
  fn test_alloc_bumps_forward() {
    let mut allocator = LinearAllocator::new("test", 4096).unwrap();

    let first = allocator.alloc(100).unwrap();
    let second = allocator.alloc(200).unwrap();

    assert!(second.as_ptr() > first.as_ptr());
    assert!(second.as_ptr() as usize - first.as_ptr() as usize >= 100 + META_SIZE);

    unsafe {
      ptr::write_bytes(first.as_ptr(), 0x11, 100);
      ptr::write_bytes(second.as_ptr(), 0x22, 200);
      assert_eq!(first.as_ptr().add(99).read(), 0x11);
      assert_eq!(second.as_ptr().read(), 0x22);
    }

    assert_eq!(allocator.stats().alloc_count(), 2);
    assert_eq!(allocator.stats().effective_bytes(), 300);
    assert_eq!(allocator.stats().used_bytes(), allocator.cursor());
  }

  #[test]
  fn test_alloc_honors_alignment() {
    let mut allocator = LinearAllocator::new("test", kb(16)).unwrap();

    for alignment in [8usize, 16, 32, 64, 128, 256] {
      let data = allocator.alloc_aligned(24, alignment).unwrap();
      assert_eq!(data.as_ptr() as usize % alignment, 0);
    }

    // alignments below the default are rounded up to it
    let data = allocator.alloc_aligned(3, 1).unwrap();
    assert_eq!(data.as_ptr() as usize % DEFAULT_ALIGNMENT, 0);
  }

  #[test]
  fn test_invalid_requests() {
    let mut allocator = LinearAllocator::new("test", 1024).unwrap();

    assert_eq!(allocator.alloc(0), Err(AllocError::ZeroSize));
    assert_eq!(allocator.alloc_aligned(8, 3), Err(AllocError::BadAlignment(3)));
    assert_eq!(allocator.alloc_aligned(8, 0), Err(AllocError::BadAlignment(0)));
  }

  #[test]
  fn test_out_of_memory_leaves_state_intact() {
    let mut allocator = LinearAllocator::new("test", 1024).unwrap();

    match allocator.alloc(2000) {
      Err(AllocError::OutOfMemory { requested, .. }) => assert_eq!(requested, 2000),
      other => panic!("expected OutOfMemory, got {other:?}"),
    }

    assert_eq!(allocator.stats().alloc_count(), 0);
    assert!(allocator.alloc(100).is_ok());
  }

  #[test]
  fn test_huge_request_is_out_of_memory_not_wraparound() {
    let mut allocator = LinearAllocator::new("test", 4096).unwrap();

    // with a live allocation, `overhead + bytes` would wrap for a
    // near-MAX request and slip past the capacity check
    let first = allocator.alloc(100).unwrap();
    match allocator.alloc(usize::MAX - 8) {
      Err(AllocError::OutOfMemory { requested, .. }) => assert_eq!(requested, usize::MAX - 8),
      other => panic!("expected OutOfMemory, got {other:?}"),
    }

    assert_eq!(allocator.stats().alloc_count(), 1);
    allocator.free(first).unwrap();
    assert_eq!(allocator.cursor(), 0);
  }

  #[test]
  fn test_lifo_free_returns_to_base() {
    let mut allocator = LinearAllocator::new("test", 4096).unwrap();

    let first = allocator.alloc(100).unwrap();
    let second = allocator.alloc(64).unwrap();
    let third = allocator.alloc(32).unwrap();

    allocator.free(third).unwrap();
    allocator.free(second).unwrap();
    allocator.free(first).unwrap();

    assert_eq!(allocator.cursor(), 0);
    assert_eq!(allocator.stats().used_bytes(), 0);
    assert_eq!(allocator.stats().effective_bytes(), 0);
    assert_eq!(allocator.stats().free_count(), 3);

    // the next allocation lands exactly where the first one did
    let again = allocator.alloc(100).unwrap();
    assert_eq!(again, first);
  }

  #[test]
  fn test_out_of_order_free_is_rejected() {
    let mut allocator = LinearAllocator::new("test", 4096).unwrap();

    let first = allocator.alloc(100).unwrap();
    let second = allocator.alloc(100).unwrap();

    assert_eq!(
      allocator.free(first),
      Err(AllocError::OutOfOrderFree { name: "test" })
    );
    assert_eq!(allocator.stats().free_count(), 0);

    allocator.free(second).unwrap();
    allocator.free(first).unwrap();
    assert_eq!(allocator.stats().used_bytes(), 0);
  }

  #[test]
  fn test_free_foreign_pointer() {
    let mut allocator = LinearAllocator::new("test", 1024).unwrap();
    let mut outside = 0u8;

    assert_eq!(
      allocator.free(NonNull::from(&mut outside)),
      Err(AllocError::ForeignPointer { name: "test" })
    );
  }

  #[test]
  fn test_realloc_copies_without_freeing() {
    let mut allocator = LinearAllocator::new("test", 4096).unwrap();

    let old = allocator.alloc(64).unwrap();
    unsafe { ptr::write_bytes(old.as_ptr(), 0x5a, 64) };

    let new = allocator.realloc(old, 128).unwrap();
    assert_ne!(new, old);

    unsafe {
      for i in 0..64 {
        assert_eq!(new.as_ptr().add(i).read(), 0x5a);
      }
    }

    // the old block stays live; only an explicit LIFO free releases it
    assert_eq!(allocator.stats().alloc_count(), 2);
    assert_eq!(allocator.stats().free_count(), 0);
  }

  #[test]
  fn test_realloc_shrink_copies_prefix() {
    let mut allocator = LinearAllocator::new("test", 4096).unwrap();

    let old = allocator.alloc(64).unwrap();
    unsafe { ptr::write_bytes(old.as_ptr(), 0x7c, 64) };

    let new = allocator.realloc(old, 16).unwrap();
    unsafe {
      for i in 0..16 {
        assert_eq!(new.as_ptr().add(i).read(), 0x7c);
      }
    }
  }

  #[test]
  fn test_reset_recycles_everything() {
    let mut allocator = LinearAllocator::new("test", 4096).unwrap();

    let first = allocator.alloc(512).unwrap();
    allocator.alloc(512).unwrap();
    allocator.reset();

    assert_eq!(allocator.cursor(), 0);
    assert_eq!(allocator.stats().alloc_count(), 0);
    assert_eq!(allocator.alloc(512).unwrap(), first);
  }

  #[test]
  fn test_typed_allocations() {
    let mut allocator = LinearAllocator::new("test", 4096).unwrap();

    let value = allocator.alloc_uninit::<u64>().unwrap();
    unsafe {
      value.as_ptr().write(42);
      assert_eq!(value.as_ptr().read(), 42);
    }

    let array = allocator.alloc_array::<u32>(8).unwrap();
    assert_eq!(array.as_ptr() as usize % mem::align_of::<u32>(), 0);
    unsafe {
      for i in 0..8 {
        array.as_ptr().add(i).write(i as u32);
      }
      for i in 0..8 {
        assert_eq!(array.as_ptr().add(i).read(), i as u32);
      }
    }
  }

  #[test]
  fn test_child_carve_lifecycle() {
    let mut parent = LinearAllocator::new("parent", 4096).unwrap();

    let mut child = LinearAllocator::child_of(&mut parent, "child", 1024).unwrap();
    assert_eq!(parent.stats().alloc_count(), 1);

    let data = child.alloc(100).unwrap();
    unsafe { ptr::write_bytes(data.as_ptr(), 0x33, 100) };
    child.free(data).unwrap();

    parent.destroy_child(child).unwrap();
    assert_eq!(parent.stats().used_bytes(), 0);
  }

  #[test]
  fn test_children_destroy_in_lifo_order() {
    let mut parent = LinearAllocator::new("parent", 4096).unwrap();

    let first = LinearAllocator::child_of(&mut parent, "first", 1024).unwrap();
    let second = LinearAllocator::child_of(&mut parent, "second", 1024).unwrap();

    assert_eq!(
      parent.destroy_child(first),
      Err(AllocError::OutOfOrderFree { name: "parent" })
    );

    parent.destroy_child(second).unwrap();
    // `first` was consumed by the failed call; its carve stays live in the
    // parent, which is exactly the leak the error reports.
    assert_eq!(parent.stats().used_bytes(), parent.cursor());
  }

  #[test]
  fn test_placement_backing() {
    let mut buffer = [0u64; 128];
    let base = NonNull::new(buffer.as_mut_ptr() as *mut u8).unwrap();

    let mut allocator =
      unsafe { LinearAllocator::from_raw_parts("placed", base, 1024) }.unwrap();

    let data = allocator.alloc(100).unwrap();
    assert!(data.as_ptr() as usize >= base.as_ptr() as usize);
    unsafe { ptr::write_bytes(data.as_ptr(), 0x44, 100) };
  }

  #[test]
  fn test_bad_capacity() {
    assert_eq!(
      LinearAllocator::new("test", 1000).unwrap_err(),
      AllocError::BadCapacity { name: "test", bytes: 1000 }
    );
    assert_eq!(
      LinearAllocator::new("test", 0).unwrap_err(),
      AllocError::BadCapacity { name: "test", bytes: 0 }
    );
  }
}
