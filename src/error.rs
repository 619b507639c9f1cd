use thiserror::Error;

/// Errors reported by the allocators and arenas in this crate.
///
/// Capacity exhaustion is the only condition that can plausibly occur in a
/// correct program; the remaining variants flag caller mistakes that would
/// otherwise corrupt allocator state. All of them are checked in every build
/// configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
  /// The request does not fit in the remaining backing capacity.
  #[error("'{name}': out of memory ({requested} bytes requested, {available} available)")]
  OutOfMemory {
    name: &'static str,
    requested: usize,
    available: usize,
  },

  /// The OS refused to reserve backing memory.
  #[error("'{name}': OS reservation of {bytes} bytes failed")]
  ReserveFailed { name: &'static str, bytes: usize },

  /// Backing capacity is zero, too small, or not a multiple of
  /// [`MALLOC_ALIGNMENT`](crate::align::MALLOC_ALIGNMENT).
  #[error("'{name}': invalid backing capacity of {bytes} bytes")]
  BadCapacity { name: &'static str, bytes: usize },

  /// An allocation of zero bytes was requested.
  #[error("zero-size request")]
  ZeroSize,

  /// The requested alignment is not a supported power of two.
  #[error("unsupported alignment of {0} bytes")]
  BadAlignment(usize),

  /// The pointer does not fall inside the allocator's backing range.
  #[error("'{name}': pointer does not belong to this allocator")]
  ForeignPointer { name: &'static str },

  /// A linear allocator was asked to free a block that is not the most
  /// recent live allocation.
  #[error("'{name}': free does not target the most recent live allocation")]
  OutOfOrderFree { name: &'static str },

  /// An arena push would move the cursor past the arena capacity.
  #[error("arena overflow ({requested} bytes requested, {available} available)")]
  ArenaOverflow { requested: usize, available: usize },

  /// A pop was given a position that is past the current arena cursor, or
  /// that was captured from a different arena.
  #[error("position {position} is not a valid rollback target (cursor at {cursor})")]
  InvalidMarker { position: usize, cursor: usize },
}

pub type Result<T> = core::result::Result<T, AllocError>;
