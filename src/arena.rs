use core::mem;
use core::ptr::{self, NonNull};

use crate::align::{DEFAULT_ALIGNMENT, align_up, is_aligned, is_power_of_two};
use crate::error::{AllocError, Result};
use crate::fill;
use crate::linear::{Carve, LinearAllocator};

/// Opaque position token returned by [`Arena::tellp`] and consumed by
/// [`Arena::pop_to`].
///
/// A marker remembers which arena it was captured from; handing it to a
/// different arena is rejected, not silently applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaMarker {
  base: *const u8,
  offset: usize,
}

impl ArenaMarker {
  /// Displacement from the arena base, in bytes.
  pub fn offset(&self) -> usize {
    self.offset
  }
}

/// Forward-only allocation cursor over a fixed byte range.
///
/// Pushes carry no header and no back-pointer; the only way to reclaim
/// memory is to pop the cursor back to an earlier position (or reset it),
/// which discards everything pushed after that position in one step. This
/// is the workhorse for transient, phase-scoped state: per-frame buffers,
/// per-call workspaces, per-thread staging memory.
///
/// An arena carved from a [`LinearAllocator`] is returned to it with
/// [`LinearAllocator::destroy_child`]; an arena over a raw buffer borrows
/// nothing and owns nothing.
pub struct Arena {
  base: NonNull<u8>,
  marker: usize,
  capacity: usize,
}

impl Arena {
  /// Carves an arena of `bytes` out of a parent linear allocator.
  pub fn with_capacity(
    parent: &mut LinearAllocator,
    bytes: usize,
  ) -> Result<Self> {
    let base = parent.alloc(bytes)?;
    Ok(Self { base, marker: 0, capacity: bytes })
  }

  /// Creates an arena over a caller-owned buffer.
  ///
  /// # Safety
  ///
  /// `[base, base + bytes)` must be writable, aligned to
  /// [`DEFAULT_ALIGNMENT`] and unused by anything else for the arena's
  /// whole lifetime.
  pub unsafe fn from_raw_parts(
    base: NonNull<u8>,
    bytes: usize,
  ) -> Self {
    debug_assert!(is_aligned(base.as_ptr() as usize, DEFAULT_ALIGNMENT));
    Self { base, marker: 0, capacity: bytes }
  }

  /// Pushes `bytes` with [`DEFAULT_ALIGNMENT`].
  pub fn push(
    &mut self,
    bytes: usize,
  ) -> Result<NonNull<u8>> {
    self.push_aligned(bytes, DEFAULT_ALIGNMENT)
  }

  /// Aligns the cursor forward and advances it past `bytes`.
  ///
  /// `alignment` must be a power of two no smaller than
  /// [`DEFAULT_ALIGNMENT`]. The returned bytes are uninitialized and wholly
  /// owned by the caller until the cursor is popped back past them.
  pub fn push_aligned(
    &mut self,
    bytes: usize,
    alignment: usize,
  ) -> Result<NonNull<u8>> {
    if bytes == 0 {
      return Err(AllocError::ZeroSize);
    }
    if !is_power_of_two(alignment) || alignment < DEFAULT_ALIGNMENT {
      return Err(AllocError::BadAlignment(alignment));
    }

    let base = self.base.as_ptr() as usize;
    let addr = align_up(base + self.marker, alignment);

    // checked add: `bytes` is caller-controlled and may be near usize::MAX
    let new_marker = match (addr - base).checked_add(bytes) {
      Some(marker) if marker <= self.capacity => marker,
      _ => {
        return Err(AllocError::ArenaOverflow {
          requested: bytes,
          available: self.capacity - self.marker,
        });
      }
    };

    self.marker = new_marker;
    Ok(unsafe { NonNull::new_unchecked(addr as *mut u8) })
  }

  /// Pushes room for one `T` and moves `value` into it.
  pub fn push_value<T>(
    &mut self,
    value: T,
  ) -> Result<NonNull<T>> {
    let slot = self.push_uninit::<T>()?;
    unsafe { slot.as_ptr().write(value) };
    Ok(slot)
  }

  /// Pushes room for one `T`. The memory is uninitialized.
  pub fn push_uninit<T>(&mut self) -> Result<NonNull<T>> {
    let alignment = mem::align_of::<T>().max(DEFAULT_ALIGNMENT);
    Ok(self.push_aligned(mem::size_of::<T>(), alignment)?.cast())
  }

  /// Pushes room for `count` contiguous `T`s. The memory is uninitialized.
  pub fn push_slice_uninit<T>(
    &mut self,
    count: usize,
  ) -> Result<NonNull<T>> {
    let bytes = mem::size_of::<T>()
      .checked_mul(count)
      .ok_or(AllocError::ArenaOverflow {
        requested: usize::MAX,
        available: self.capacity - self.marker,
      })?;
    let alignment = mem::align_of::<T>().max(DEFAULT_ALIGNMENT);
    Ok(self.push_aligned(bytes, alignment)?.cast())
  }

  /// Pushes a copy of `src` and returns the arena-resident copy.
  pub fn push_slice_copy<T: Copy>(
    &mut self,
    src: &[T],
  ) -> Result<NonNull<T>> {
    let dst = self.push_slice_uninit::<T>(src.len())?;
    unsafe { ptr::copy_nonoverlapping(src.as_ptr(), dst.as_ptr(), src.len()) };
    Ok(dst)
  }

  /// Current cursor position.
  pub fn tellp(&self) -> ArenaMarker {
    ArenaMarker {
      base: self.base.as_ptr(),
      offset: self.marker,
    }
  }

  /// Pops the cursor back to a previously captured position, discarding
  /// everything pushed since. The position must come from this arena and
  /// cannot be ahead of the cursor.
  pub fn pop_to(
    &mut self,
    position: ArenaMarker,
  ) -> Result<()> {
    if position.base != self.base.as_ptr().cast_const() || position.offset > self.marker {
      return Err(AllocError::InvalidMarker {
        position: position.offset,
        cursor: self.marker,
      });
    }

    unsafe {
      fill::freed_span(self.base.as_ptr().add(position.offset), self.marker - position.offset);
    }
    self.marker = position.offset;
    Ok(())
  }

  /// Pops the most recent `bytes` off the cursor.
  pub fn pop(
    &mut self,
    bytes: usize,
  ) -> Result<()> {
    if bytes > self.marker {
      return Err(AllocError::InvalidMarker {
        position: self.marker.wrapping_sub(bytes),
        cursor: self.marker,
      });
    }
    self.pop_to(ArenaMarker {
      base: self.base.as_ptr(),
      offset: self.marker - bytes,
    })
  }

  /// Pops everything. O(1).
  pub fn reset(&mut self) {
    unsafe {
      fill::freed_span(self.base.as_ptr(), self.marker);
    }
    self.marker = 0;
  }

  /// Whether `addr` falls inside the *live* region `[base, base + cursor)`,
  /// not merely the backing capacity.
  pub fn contains(
    &self,
    addr: *const u8,
  ) -> bool {
    let base = self.base.as_ptr() as usize;
    let addr = addr as usize;
    addr >= base && addr < base + self.marker
  }

  pub fn base(&self) -> NonNull<u8> {
    self.base
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  /// Bytes currently in use (the cursor displacement).
  pub fn used(&self) -> usize {
    self.marker
  }

  pub fn remaining(&self) -> usize {
    self.capacity - self.marker
  }
}

impl Carve for Arena {
  fn carve_base(&self) -> NonNull<u8> {
    self.base
  }
}
