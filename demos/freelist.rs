use std::ptr;

use memkit::{FreelistAllocator, align::kb};

fn print_stats(
  label: &str,
  allocator: &FreelistAllocator,
) {
  let stats = allocator.stats();
  println!(
    "[{}] '{}': {} allocs / {} frees, used = {} bytes ({} effective), remaining = {}",
    label,
    stats.name(),
    stats.alloc_count(),
    stats.free_count(),
    stats.used_bytes(),
    stats.effective_bytes(),
    stats.remaining()
  );
}

/// Exercises the freelist allocator: arbitrary-order free, first-fit
/// reuse of freed blocks, and coalescing of neighbours back into a block
/// big enough for a large request.
fn main() -> memkit::Result<()> {
  // --------------------------------------------------------------------
  // 1) An OS-backed freelist for long-lived, unordered allocations.
  // --------------------------------------------------------------------
  let mut resources = FreelistAllocator::new("resources", kb(8))?;
  print_stats("1", &resources);

  // --------------------------------------------------------------------
  // 2) Allocate three blocks and write into each.
  // --------------------------------------------------------------------
  let a = resources.alloc(300)?;
  let b = resources.alloc(300)?;
  let c = resources.alloc(300)?;
  unsafe {
    ptr::write_bytes(a.as_ptr(), 0xaa, 300);
    ptr::write_bytes(b.as_ptr(), 0xbb, 300);
    ptr::write_bytes(c.as_ptr(), 0xcc, 300);
  }
  println!("\n[2] a = {:?}, b = {:?}, c = {:?}", a, b, c);
  print_stats("2", &resources);

  // --------------------------------------------------------------------
  // 3) Free the middle block; a smaller allocation reuses its frame
  //    (first fit).
  // --------------------------------------------------------------------
  resources.free(b)?;
  let reused = resources.alloc(250)?;
  println!(
    "\n[3] freed b, alloc(250) landed at {:?} -> {}",
    reused,
    if reused == b {
      "reused b's frame"
    } else {
      "allocated elsewhere"
    }
  );

  // --------------------------------------------------------------------
  // 4) Free everything in arbitrary order. Neighbouring free blocks
  //    coalesce, so one allocation spanning nearly the whole capacity
  //    succeeds afterwards.
  // --------------------------------------------------------------------
  resources.free(c)?;
  resources.free(a)?;
  resources.free(reused)?;
  print_stats("4", &resources);

  let big = resources.alloc(kb(7))?;
  println!("\n[4] after coalescing, alloc({}) = {:?}", kb(7), big);
  resources.free(big)?;

  // --------------------------------------------------------------------
  // 5) Realloc grows a block in place of the alloc-copy-free dance.
  // --------------------------------------------------------------------
  let mut block = resources.alloc(64)?;
  unsafe { ptr::write_bytes(block.as_ptr(), 0x42, 64) };
  block = resources.realloc(block, 256)?;
  println!(
    "\n[5] realloc(64 -> 256) at {:?}, first byte preserved = 0x{:x}",
    block,
    unsafe { block.as_ptr().read() }
  );
  resources.free(block)?;
  print_stats("5", &resources);

  Ok(())
}
