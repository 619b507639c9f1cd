//! Optional sentinel fills behind the `fill` cargo feature.
//!
//! With the feature enabled, freed and popped memory is stamped with `0xfe`
//! and fresh freelist payloads are zeroed, so stale reads show up as an
//! obvious pattern in a debugger. Without the feature every function here
//! compiles to nothing.

#[cfg(feature = "fill")]
use core::mem;
#[cfg(feature = "fill")]
use core::ptr;

use crate::header::AllocHeader;

/// Pattern written over released memory.
#[cfg(feature = "fill")]
pub(crate) const FREED: u8 = 0xfe;

/// Stamps the padding and payload of a released frame, leaving the header
/// itself intact.
///
/// # Safety
///
/// `header` must point at a valid header whose whole frame is writable.
#[cfg(feature = "fill")]
pub(crate) unsafe fn freed_frame(header: *mut AllocHeader) {
  unsafe {
    let marker = (*header).marker;
    let lead = header as usize - marker as usize;
    ptr::write_bytes(marker, FREED, lead);

    let tail = (header as *mut u8).add(mem::size_of::<AllocHeader>());
    let tail_len = (*header).frame_size - lead - mem::size_of::<AllocHeader>();
    ptr::write_bytes(tail, FREED, tail_len);
  }
}

#[cfg(not(feature = "fill"))]
#[inline(always)]
pub(crate) unsafe fn freed_frame(_header: *mut AllocHeader) {}

/// Stamps an arbitrary released span (arena pops).
///
/// # Safety
///
/// `[addr, addr + len)` must be writable.
#[cfg(feature = "fill")]
pub(crate) unsafe fn freed_span(
  addr: *mut u8,
  len: usize,
) {
  unsafe { ptr::write_bytes(addr, FREED, len) }
}

#[cfg(not(feature = "fill"))]
#[inline(always)]
pub(crate) unsafe fn freed_span(
  _addr: *mut u8,
  _len: usize,
) {
}

/// Zeroes a freshly handed-out payload.
///
/// # Safety
///
/// `[addr, addr + len)` must be writable.
#[cfg(feature = "fill")]
pub(crate) unsafe fn fresh_payload(
  addr: *mut u8,
  len: usize,
) {
  unsafe { ptr::write_bytes(addr, 0, len) }
}

#[cfg(not(feature = "fill"))]
#[inline(always)]
pub(crate) unsafe fn fresh_payload(
  _addr: *mut u8,
  _len: usize,
) {
}
