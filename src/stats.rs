/// Accounting shared by both allocator kinds: name, capacity and live
/// counters. Pure bookkeeping, no allocation logic.
///
/// `used_bytes` tracks the sum of live frame footprints (headers, padding
/// and payloads); `effective_bytes` only the live payload bytes. A debug UI
/// can read these to display live utilization per allocator.
#[derive(Debug, Clone, Copy)]
pub struct AllocatorStats {
  name: &'static str,
  capacity: usize,
  alloc_count: u32,
  free_count: u32,
  used_bytes: usize,
  effective_bytes: usize,
}

impl AllocatorStats {
  pub(crate) fn new(
    name: &'static str,
    capacity: usize,
  ) -> Self {
    Self {
      name,
      capacity,
      alloc_count: 0,
      free_count: 0,
      used_bytes: 0,
      effective_bytes: 0,
    }
  }

  pub(crate) fn reset(&mut self) {
    self.alloc_count = 0;
    self.free_count = 0;
    self.used_bytes = 0;
    self.effective_bytes = 0;
  }

  pub(crate) fn record_alloc(
    &mut self,
    frame_size: usize,
    data_size: usize,
  ) {
    self.alloc_count += 1;
    self.used_bytes += frame_size;
    self.effective_bytes += data_size;
  }

  pub(crate) fn record_free(
    &mut self,
    frame_size: usize,
    data_size: usize,
  ) {
    debug_assert!(self.used_bytes >= frame_size);
    debug_assert!(self.effective_bytes >= data_size);
    self.free_count += 1;
    self.used_bytes -= frame_size;
    self.effective_bytes -= data_size;
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  pub fn capacity(&self) -> usize {
    self.capacity
  }

  pub fn alloc_count(&self) -> u32 {
    self.alloc_count
  }

  pub fn free_count(&self) -> u32 {
    self.free_count
  }

  pub fn used_bytes(&self) -> usize {
    self.used_bytes
  }

  pub fn effective_bytes(&self) -> usize {
    self.effective_bytes
  }

  pub fn remaining(&self) -> usize {
    self.capacity - self.used_bytes
  }
}
