use core::ops::{Deref, DerefMut};

use crate::arena::{Arena, ArenaMarker};

/// Scoped arena window that rewinds itself on drop.
///
/// `begin` captures the arena's cursor; when the region goes out of scope
/// the cursor is popped back to that position, discarding every push made
/// through the region. Regions nest through deref coercion:
///
/// ```ignore
/// let mut outer = ScratchRegion::begin(&mut arena);
/// let lut = outer.push(512)?;
/// {
///   let mut inner = ScratchRegion::begin(&mut outer);
///   inner.push(4096)?; // gone at the end of this block
/// }
/// // lut still live here
/// ```
pub struct ScratchRegion<'a> {
  arena: &'a mut Arena,
  origin: ArenaMarker,
}

impl<'a> ScratchRegion<'a> {
  /// Opens a region at the arena's current cursor.
  pub fn begin(arena: &'a mut Arena) -> Self {
    let origin = arena.tellp();
    Self { arena, origin }
  }

  /// The position the arena will be rewound to.
  pub fn origin(&self) -> ArenaMarker {
    self.origin
  }
}

impl Deref for ScratchRegion<'_> {
  type Target = Arena;

  fn deref(&self) -> &Arena {
    self.arena
  }
}

impl DerefMut for ScratchRegion<'_> {
  fn deref_mut(&mut self) -> &mut Arena {
    self.arena
  }
}

impl Drop for ScratchRegion<'_> {
  fn drop(&mut self) {
    // origin was captured from this arena, so it can never be past the
    // cursor
    let _ = self.arena.pop_to(self.origin);
  }
}
