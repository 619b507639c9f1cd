use core::ffi::c_void;
use core::ptr::{self, NonNull};

use crate::align::{MALLOC_ALIGNMENT, is_aligned};
use crate::error::{AllocError, Result};

/// How an allocator's backing range is owned.
#[derive(Debug)]
pub(crate) enum Backing {
  /// Reserved from the OS; released when the allocator is dropped.
  Os,
  /// A caller-supplied buffer; never released by this crate.
  Placement,
  /// Carved out of a parent linear allocator; released through the parent.
  Carved,
}

/// Reserves and commits `bytes` of zeroed virtual memory.
pub(crate) fn reserve(
  name: &'static str,
  bytes: usize,
) -> Result<NonNull<u8>> {
  let addr = unsafe {
    libc::mmap(
      ptr::null_mut(),
      bytes,
      libc::PROT_READ | libc::PROT_WRITE,
      libc::MAP_PRIVATE | libc::MAP_ANONYMOUS,
      -1,
      0,
    )
  };

  if addr == libc::MAP_FAILED {
    return Err(AllocError::ReserveFailed { name, bytes });
  }

  NonNull::new(addr as *mut u8).ok_or(AllocError::ReserveFailed { name, bytes })
}

/// Releases a range previously obtained from [`reserve`].
pub(crate) fn release(
  base: NonNull<u8>,
  bytes: usize,
) {
  let rc = unsafe { libc::munmap(base.as_ptr() as *mut c_void, bytes) };
  debug_assert_eq!(rc, 0, "munmap of {bytes} bytes failed");
}

/// Validates a backing capacity: at least `minimum` bytes and a multiple of
/// [`MALLOC_ALIGNMENT`].
pub(crate) fn validate_capacity(
  name: &'static str,
  bytes: usize,
  minimum: usize,
) -> Result<()> {
  if bytes < minimum || !is_aligned(bytes, MALLOC_ALIGNMENT) {
    return Err(AllocError::BadCapacity { name, bytes });
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_reserve_release() {
    let base = reserve("test", 4096).unwrap();

    unsafe {
      base.as_ptr().write(0xab);
      assert_eq!(base.as_ptr().read(), 0xab);
    }

    release(base, 4096);
  }

  #[test]
  fn test_validate_capacity() {
    assert!(validate_capacity("t", 1024, 64).is_ok());
    assert_eq!(
      validate_capacity("t", 0, 64),
      Err(AllocError::BadCapacity { name: "t", bytes: 0 })
    );
    assert_eq!(
      validate_capacity("t", 1000, 64),
      Err(AllocError::BadCapacity { name: "t", bytes: 1000 })
    );
    assert_eq!(
      validate_capacity("t", 32, 64),
      Err(AllocError::BadCapacity { name: "t", bytes: 32 })
    );
  }
}
