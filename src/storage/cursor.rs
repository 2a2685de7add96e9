//! # Record cursors
//!
//! A cursor reads records without taking any lock. Reads are optimistic: the caller positions the
//! cursor, reads whatever fields it needs, and then asks [`RecordCursor::should_retry`] whether the
//! pages under the record changed in the meantime. If they did, every value read in that pass is
//! discarded and the reads are repeated:
//!
//! ```ignore
//! cursor.position(id)?;
//! let first_relationship = loop {
//!   let value = cursor.first_relationship()?;
//!   if !cursor.should_retry() {
//!     break value;
//!   }
//! };
//! ```
//!
//! [`CursorCore`] implements positioning, page pinning and stamp validation for any record size.
//! Formats wrap it into their own cursor type and add field accessors on top of
//! [`CursorCore::read`].

use super::paging::{Page, PagedFile};
use crate::error::{Result, StoreError};
use std::ops;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// # Cursor options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CursorFlags(u32);

impl CursorFlags {
  /// Default mode: scans run from the lowest id upwards.
  pub const NONE: CursorFlags = CursorFlags(0);
  /// Scans run from the highest id downwards.
  pub const REVERSE: CursorFlags = CursorFlags(1);

  /// Whether every flag in `other` is set.
  pub fn contains(self, other: CursorFlags) -> bool {
    self.0 & other.0 == other.0
  }
}

impl ops::BitOr for CursorFlags {
  type Output = CursorFlags;

  fn bitor(self, rhs: CursorFlags) -> CursorFlags {
    CursorFlags(self.0 | rhs.0)
  }
}

/// # Record cursor interface
pub trait RecordCursor {
  /// The record type this cursor reads.
  type Record;

  /// Moves the cursor to `id`, pinning the pages that hold it. Ids past the end of the store are
  /// fine and read as empty slots.
  fn position(&mut self, id: u64) -> Result<()>;

  /// Returns `true` if the values read since the last call (or since [`RecordCursor::position`])
  /// may be torn and must be read again. Returns `false` for an unpositioned cursor.
  fn should_retry(&mut self) -> bool;

  /// Whether the slot under the cursor holds a live record. Subject to [`RecordCursor::should_retry`].
  fn in_use(&self) -> Result<bool>;

  /// Reads the whole record under the cursor, retrying internally until the read is consistent.
  fn record(&mut self) -> Result<Self::Record>;

  /// Advances a scan to the next record in use and positions the cursor on it. Returns `false`
  /// once the scan has passed the highest known id.
  fn next(&mut self) -> Result<bool>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scan {
  Fresh,
  Next(u64),
  Done,
}

/// # Positioned page reader
///
/// The format-independent half of a cursor. It owns the pins and captured stamps of the pages the
/// current record spans; a record straddling a page boundary pins two pages. The pin and stamp
/// buffers are reused across positions.
pub struct CursorCore<'s> {
  paged: &'s PagedFile,
  header_size: u64,
  record_size: usize,
  high_water: &'s AtomicU64,
  flags: CursorFlags,
  id: Option<u64>,
  offset: u64,
  first_page: u64,
  pinned: Vec<Arc<Page>>,
  stamps: Vec<u64>,
  scan: Scan,
}

impl<'s> CursorCore<'s> {
  /// `high_water` is the number of slots the store knows about; scans stop there.
  pub(crate) fn new(
    paged: &'s PagedFile,
    header_size: usize,
    record_size: usize,
    high_water: &'s AtomicU64,
    flags: CursorFlags,
  ) -> Self {
    CursorCore {
      paged,
      header_size: header_size as u64,
      record_size,
      high_water,
      flags,
      id: None,
      offset: 0,
      first_page: 0,
      pinned: Vec::with_capacity(2),
      stamps: Vec::with_capacity(2),
      scan: Scan::Fresh,
    }
  }

  /// The id the cursor is positioned at.
  pub fn id(&self) -> Option<u64> {
    self.id
  }

  pub fn flags(&self) -> CursorFlags {
    self.flags
  }

  pub fn record_size(&self) -> usize {
    self.record_size
  }

  pub fn position(&mut self, id: u64) -> Result<()> {
    let offset = id
      .checked_mul(self.record_size as u64)
      .and_then(|offset| offset.checked_add(self.header_size))
      .ok_or_else(|| StoreError::ProtocolMisuse(format!("record id {id} is not addressable")))?;
    let page_size = self.paged.page_size() as u64;
    let first = offset / page_size;
    let last = (offset + self.record_size as u64 - 1) / page_size;

    self.id = None;
    self.pinned.clear();
    self.stamps.clear();
    for number in first..=last {
      let page = self.paged.pin(number)?;
      self.stamps.push(page.stamp());
      self.pinned.push(page);
    }
    self.id = Some(id);
    self.offset = offset;
    self.first_page = first;
    Ok(())
  }

  /// Validates the captured stamps. On failure the stamps are captured again for the next pass.
  pub fn should_retry(&mut self) -> bool {
    let stable = self.pinned.iter().zip(&self.stamps).all(|(page, &stamp)| page.validate(stamp));
    if stable {
      return false;
    }
    for (page, stamp) in self.pinned.iter().zip(self.stamps.iter_mut()) {
      *stamp = page.stamp();
    }
    true
  }

  /// Copies `buf.len()` bytes starting `at` bytes into the record. The bytes are only consistent
  /// if a following [`CursorCore::should_retry`] returns `false`.
  pub fn read(&self, at: usize, buf: &mut [u8]) -> Result<()> {
    let id = self.id.ok_or_else(|| StoreError::ProtocolMisuse("cursor read before position".to_string()))?;
    if at + buf.len() > self.record_size {
      return Err(StoreError::ProtocolMisuse(format!(
        "read of {} bytes at {at} overruns the {}-byte record {id}",
        buf.len(),
        self.record_size
      )));
    }
    let page_size = self.paged.page_size() as u64;
    for (i, byte) in buf.iter_mut().enumerate() {
      let absolute = self.offset + (at + i) as u64;
      let page = &self.pinned[(absolute / page_size - self.first_page) as usize];
      *byte = page.load((absolute % page_size) as usize);
    }
    Ok(())
  }

  pub fn read_u8(&self, at: usize) -> Result<u8> {
    let mut buf = [0u8; 1];
    self.read(at, &mut buf)?;
    Ok(buf[0])
  }

  /// Reads a big-endian `u32`.
  pub fn read_u32(&self, at: usize) -> Result<u32> {
    let mut buf = [0u8; 4];
    self.read(at, &mut buf)?;
    Ok(u32::from_be_bytes(buf))
  }

  /// Reads the whole record into `buf`, repeating until the read is consistent.
  pub fn snapshot(&mut self, buf: &mut [u8]) -> Result<()> {
    loop {
      self.read(0, buf)?;
      if !self.should_retry() {
        return Ok(());
      }
    }
  }

  /// Next id a scan should visit, honouring [`CursorFlags::REVERSE`].
  fn advance(&mut self) -> Option<u64> {
    let high = self.high_water.load(Ordering::Acquire);
    let reverse = self.flags.contains(CursorFlags::REVERSE);
    let candidate = match (self.scan, reverse) {
      (Scan::Done, _) => None,
      (Scan::Fresh, false) => Some(0),
      (Scan::Fresh, true) => high.checked_sub(1),
      (Scan::Next(id), _) => Some(id),
    };
    let candidate = candidate.filter(|&id| id < high);
    self.scan = match candidate {
      None => Scan::Done,
      Some(id) if reverse => id.checked_sub(1).map_or(Scan::Done, Scan::Next),
      Some(id) => Scan::Next(id + 1),
    };
    candidate
  }

  /// Moves the scan to the next slot for which `in_use` reports a live record.
  pub fn scan_next(&mut self, in_use: impl Fn(&Self) -> Result<bool>) -> Result<bool> {
    while let Some(id) = self.advance() {
      self.position(id)?;
      let live = loop {
        let live = in_use(self)?;
        if !self.should_retry() {
          break live;
        }
      };
      if live {
        return Ok(true);
      }
    }
    Ok(false)
  }
}
