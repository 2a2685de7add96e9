//! # Id generators
//!
//! A store hands out record ids through an [`IdGenerator`]. The store only relies on ids being
//! fresh: an id is never returned twice unless it was [`IdGenerator::free`]d in between.

use crate::error::{Result, StoreError};
use std::collections;
use tracing::debug;

/// # Id generator interface
pub trait IdGenerator: Send {
  /// Prepares the generator for a store whose highest in-use id is `highest_in_use`.
  fn open(&mut self, highest_in_use: Option<u64>) -> Result<()>;

  /// Returns a fresh id.
  fn next_id(&mut self) -> Result<u64>;

  /// Makes `id` available for reuse. Generators without reuse ignore this.
  fn free(&mut self, id: u64);

  /// Records that `id` is in use, so that it is never handed out.
  fn mark_used(&mut self, id: u64);

  /// Highest id handed out or marked used so far.
  fn highest_id(&self) -> Option<u64>;

  /// Releases the generator. It must be reopened before it hands out ids again.
  fn close(&mut self) -> Result<()>;
}

/// Shared bookkeeping for the generators in this module.
#[derive(Debug)]
struct HighMark {
  opened: bool,
  highest: Option<u64>,
  ceiling: u64,
}

impl HighMark {
  fn new(ceiling: u64) -> Self {
    HighMark { opened: false, highest: None, ceiling }
  }

  fn ensure_open(&self) -> Result<()> {
    if self.opened {
      Ok(())
    } else {
      Err(StoreError::ProtocolMisuse("id generator used before open".to_string()))
    }
  }

  fn bump(&mut self) -> Result<u64> {
    let next = self
      .highest
      .map_or(Some(0), |id| id.checked_add(1))
      .filter(|&next| next <= self.ceiling)
      .ok_or_else(|| StoreError::ResourceExhausted(format!("no ids left above {}", self.ceiling)))?;
    self.highest = Some(next);
    Ok(next)
  }

  fn mark(&mut self, id: u64) {
    if self.highest.map_or(true, |highest| id > highest) {
      self.highest = Some(id);
    }
  }
}

/// # Monotonic id generator
///
/// Hands out `highest + 1` every time and never reuses ids.
#[derive(Debug)]
pub struct MonotonicIdGenerator {
  mark: HighMark,
}

impl MonotonicIdGenerator {
  /// Creates a generator that fails once ids would exceed `ceiling`.
  pub fn with_ceiling(ceiling: u64) -> Self {
    MonotonicIdGenerator { mark: HighMark::new(ceiling) }
  }
}

impl Default for MonotonicIdGenerator {
  fn default() -> Self {
    Self::with_ceiling(u64::MAX - 1)
  }
}

impl IdGenerator for MonotonicIdGenerator {
  fn open(&mut self, highest_in_use: Option<u64>) -> Result<()> {
    self.mark.highest = highest_in_use;
    self.mark.opened = true;
    debug!(highest = ?highest_in_use, "opened monotonic id generator");
    Ok(())
  }

  fn next_id(&mut self) -> Result<u64> {
    self.mark.ensure_open()?;
    self.mark.bump()
  }

  fn free(&mut self, _id: u64) {}

  fn mark_used(&mut self, id: u64) {
    self.mark.mark(id);
  }

  fn highest_id(&self) -> Option<u64> {
    self.mark.highest
  }

  fn close(&mut self) -> Result<()> {
    self.mark.opened = false;
    Ok(())
  }
}

/// # Free-list id generator
///
/// Reuses freed ids in the order they were freed before growing the id range. The free list
/// lives in memory only and is dropped on close.
#[derive(Debug)]
pub struct FreeListIdGenerator {
  mark: HighMark,
  free: collections::VecDeque<u64>,
  freed: collections::HashSet<u64>,
}

impl FreeListIdGenerator {
  /// Creates a generator that fails once fresh ids would exceed `ceiling`.
  pub fn with_ceiling(ceiling: u64) -> Self {
    FreeListIdGenerator {
      mark: HighMark::new(ceiling),
      free: collections::VecDeque::new(),
      freed: collections::HashSet::new(),
    }
  }

  /// Number of ids waiting for reuse.
  pub fn free_count(&self) -> usize {
    self.free.len()
  }
}

impl Default for FreeListIdGenerator {
  fn default() -> Self {
    Self::with_ceiling(u64::MAX - 1)
  }
}

impl IdGenerator for FreeListIdGenerator {
  fn open(&mut self, highest_in_use: Option<u64>) -> Result<()> {
    self.mark.highest = highest_in_use;
    self.mark.opened = true;
    self.free.clear();
    self.freed.clear();
    debug!(highest = ?highest_in_use, "opened free-list id generator");
    Ok(())
  }

  fn next_id(&mut self) -> Result<u64> {
    self.mark.ensure_open()?;
    if let Some(id) = self.free.pop_front() {
      self.freed.remove(&id);
      return Ok(id);
    }
    self.mark.bump()
  }

  fn free(&mut self, id: u64) {
    // Ids that were never handed out cannot come back.
    if self.mark.highest.map_or(false, |highest| id <= highest) && self.freed.insert(id) {
      self.free.push_back(id);
    }
  }

  fn mark_used(&mut self, id: u64) {
    if self.freed.remove(&id) {
      self.free.retain(|&free| free != id);
    }
    self.mark.mark(id);
  }

  fn highest_id(&self) -> Option<u64> {
    self.mark.highest
  }

  fn close(&mut self) -> Result<()> {
    self.mark.opened = false;
    self.free.clear();
    self.freed.clear();
    Ok(())
  }
}
