use core::mem;

/// Minimum alignment of every payload and allocation header handed out by the
/// allocators in this crate. Requests with a smaller alignment are rounded up
/// to this value.
pub const DEFAULT_ALIGNMENT: usize = 8;

/// Granularity of backing-buffer capacities. Allocator backing sizes must be
/// a non-zero multiple of this value.
pub const MALLOC_ALIGNMENT: usize = 16;

/// `n` kibibytes, in bytes.
pub const fn kb(n: usize) -> usize {
  n * 1024
}

/// `n` mebibytes, in bytes.
pub const fn mb(n: usize) -> usize {
  kb(n) * 1024
}

/// `n` gibibytes, in bytes.
pub const fn gb(n: usize) -> usize {
  mb(n) * 1024
}

/// Returns whether `value` is a power of two. Zero is not.
pub const fn is_power_of_two(value: usize) -> bool {
  value != 0 && (value & (value - 1)) == 0
}

/// Rounds `value` up to the next multiple of `alignment`.
///
/// `alignment` must be a power of two.
///
/// # Examples
///
/// ```rust
/// use memkit::align::align_up;
///
/// assert_eq!(align_up(13, 8), 16);
/// assert_eq!(align_up(16, 8), 16);
/// assert_eq!(align_up(1, 64), 64);
/// ```
pub const fn align_up(
  value: usize,
  alignment: usize,
) -> usize {
  (value + alignment - 1) & !(alignment - 1)
}

/// Returns whether `value` (an address or a size) is aligned to `alignment`.
pub const fn is_aligned(
  value: usize,
  alignment: usize,
) -> bool {
  value & (alignment - 1) == 0
}

/// Rounds `value` up to the machine word size.
pub const fn align_word(value: usize) -> usize {
  align_up(value, mem::size_of::<usize>())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_align_up() {
    for alignment in [1usize, 2, 4, 8, 16, 64, 4096] {
      for value in 0..130 {
        let aligned = align_up(value, alignment);

        assert!(aligned >= value);
        assert!(aligned - value < alignment);
        assert_eq!(aligned % alignment, 0);
      }
    }
  }

  #[test]
  fn test_align_word() {
    let word = mem::size_of::<usize>();

    for i in 1..=word {
      assert_eq!(align_word(i), word);
    }

    assert_eq!(align_word(word + 1), word * 2);
  }

  #[test]
  fn test_is_power_of_two() {
    assert!(!is_power_of_two(0));
    assert!(is_power_of_two(1));
    assert!(is_power_of_two(DEFAULT_ALIGNMENT));
    assert!(is_power_of_two(MALLOC_ALIGNMENT));
    assert!(!is_power_of_two(24));
  }

  #[test]
  fn test_units() {
    assert_eq!(kb(1), 1024);
    assert_eq!(mb(2), 2 * 1024 * 1024);
    assert_eq!(gb(1), 1024 * 1024 * 1024);
  }
}
