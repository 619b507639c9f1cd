use std::ptr;

use memkit::{Arena, LinearAllocator, ScratchRegion, align::kb};

/// Walks through the typical per-frame setup: one OS-backed linear
/// allocator as the root budget, an arena carved out of it, and scratch
/// regions for transient work inside a simulated frame loop.
fn main() -> memkit::Result<()> {
  // --------------------------------------------------------------------
  // 1) Reserve the whole budget up-front from the OS.
  // --------------------------------------------------------------------
  let mut root = LinearAllocator::new("engine", kb(256))?;
  println!(
    "[1] root '{}' reserved, capacity = {} bytes",
    root.name(),
    root.capacity()
  );

  // --------------------------------------------------------------------
  // 2) Carve a per-frame arena out of the root.
  // --------------------------------------------------------------------
  let mut frame = Arena::with_capacity(&mut root, kb(64))?;
  println!(
    "[2] frame arena carved at {:?}, capacity = {} bytes",
    frame.base(),
    frame.capacity()
  );

  // --------------------------------------------------------------------
  // 3) Run a few frames. Each frame pushes freely and resets in O(1);
  //    the same addresses come back every time.
  // --------------------------------------------------------------------
  let mut first_frame_base = ptr::null_mut();
  for n in 0..3 {
    let positions = frame.push_slice_uninit::<[f32; 3]>(512)?;
    let indices = frame.push_slice_uninit::<u32>(1024)?;

    if n == 0 {
      first_frame_base = positions.as_ptr() as *mut u8;
    }
    println!(
      "[3] frame {}: positions at {:?}, indices at {:?}, used = {} bytes{}",
      n,
      positions,
      indices,
      frame.used(),
      if positions.as_ptr() as *mut u8 == first_frame_base {
        " (same addresses as frame 0)"
      } else {
        ""
      }
    );

    frame.reset();
  }

  // --------------------------------------------------------------------
  // 4) Scratch regions: everything pushed inside the scope vanishes when
  //    the region drops, while earlier pushes survive.
  // --------------------------------------------------------------------
  let persistent = frame.push_slice_copy(&[1u32, 2, 3, 4])?;
  {
    let mut scratch = ScratchRegion::begin(&mut frame);
    let workspace = scratch.push(kb(8))?;
    println!(
      "[4] scratch workspace at {:?}, arena used = {} bytes",
      workspace,
      scratch.used()
    );

    // nested region inside the outer one
    {
      let mut inner = ScratchRegion::begin(&mut scratch);
      inner.push(kb(4))?;
      println!("[4] nested region used = {} bytes", inner.used());
    }
  }
  println!(
    "[4] after scratch drop: used = {} bytes, persistent[0] = {}",
    frame.used(),
    unsafe { persistent.as_ptr().read() }
  );

  // --------------------------------------------------------------------
  // 5) Hand the arena's range back to the root.
  // --------------------------------------------------------------------
  root.destroy_child(frame)?;
  println!(
    "[5] arena destroyed, root used = {} bytes",
    root.stats().used_bytes()
  );

  Ok(())
}
