//! # Store formats
//!
//! A [`StoreFormat`] pins down the on-disk layout of one record type: the file header, the size of
//! a record slot, and how records are packed into and out of a slot. Two formats that report the
//! same [`StoreHeader`] must produce identical bytes for identical records.
//!
//! ## File layout
//!
//! ```text
//! +-----------------+ 0
//! | header          | 16 bytes, see StoreHeader
//! +-----------------+ 16
//! | slot 0          | record_size bytes
//! | slot 1          |
//! | ...             |
//! +-----------------+
//! ```

use super::cursor::{CursorCore, RecordCursor};
use crate::error::{Result, StoreError};
use crate::record::Record;
use std::fmt;

/// Size of the store header in bytes.
pub const HEADER_SIZE: usize = 16;

/// Leading bytes of every store file.
pub const MAGIC: [u8; 4] = *b"RSTO";

/// # Store file header
///
/// All integers are big-endian.
///
/// ```text
/// offset  size  field
///      0     4  magic "RSTO"
///      4     4  type tag
///      8     4  format version
///     12     2  record size
///     14     2  reserved, zero
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreHeader {
  /// Four ASCII bytes naming the record type, e.g. `b"NODE"`.
  pub type_tag: [u8; 4],
  /// Layout version of the record type.
  pub version: u32,
  /// Size of one record slot in bytes.
  pub record_size: u16,
}

impl StoreHeader {
  /// Packs the header into its on-disk bytes.
  pub fn encode(&self) -> [u8; HEADER_SIZE] {
    let mut buf = [0u8; HEADER_SIZE];
    buf[0..4].copy_from_slice(&MAGIC);
    buf[4..8].copy_from_slice(&self.type_tag);
    buf[8..12].copy_from_slice(&self.version.to_be_bytes());
    buf[12..14].copy_from_slice(&self.record_size.to_be_bytes());
    buf
  }

  /// Unpacks a header, rejecting short buffers and foreign magic.
  pub fn decode(buf: &[u8]) -> Result<Self> {
    if buf.len() < HEADER_SIZE {
      return Err(StoreError::FormatMismatch(format!("header is {} bytes, expected {HEADER_SIZE}", buf.len())));
    }
    if buf[0..4] != MAGIC {
      return Err(StoreError::FormatMismatch(format!("bad magic {:?}", &buf[0..4])));
    }
    let mut type_tag = [0u8; 4];
    type_tag.copy_from_slice(&buf[4..8]);
    Ok(StoreHeader {
      type_tag,
      version: u32::from_be_bytes([buf[8], buf[9], buf[10], buf[11]]),
      record_size: u16::from_be_bytes([buf[12], buf[13]]),
    })
  }

  /// Fails with [`StoreError::FormatMismatch`] unless `found` describes the same layout.
  pub fn check(&self, found: &StoreHeader) -> Result<()> {
    if self.type_tag != found.type_tag {
      return Err(StoreError::FormatMismatch(format!(
        "store holds {} records, format expects {}",
        String::from_utf8_lossy(&found.type_tag),
        String::from_utf8_lossy(&self.type_tag)
      )));
    }
    if self.version != found.version {
      return Err(StoreError::FormatMismatch(format!(
        "store version {:#010x}, format version {:#010x}",
        found.version, self.version
      )));
    }
    if self.record_size != found.record_size {
      return Err(StoreError::FormatMismatch(format!(
        "store record size {}, format record size {}",
        found.record_size, self.record_size
      )));
    }
    Ok(())
  }
}

/// # Store format interface
///
/// One implementation per record type and on-disk version.
pub trait StoreFormat: Send + Sync {
  /// The record type this format persists.
  type Record: Record + Clone + fmt::Debug + PartialEq;

  /// The cursor type this format reads through.
  type Cursor<'s>: RecordCursor<Record = Self::Record>
  where
    Self: 's;

  /// The header written to, and expected in, store files of this format.
  fn header(&self) -> StoreHeader;

  /// Highest record id this format can address.
  fn max_id(&self) -> u64;

  /// Packs `record` into `buf`, which is exactly [`StoreFormat::record_size`] bytes long.
  fn encode(&self, record: &Self::Record, buf: &mut [u8]) -> Result<()>;

  /// Unpacks the record at `id` from `buf`.
  fn decode(&self, id: u64, buf: &[u8]) -> Self::Record;

  /// Wraps a positioned-reader core into this format's cursor.
  fn new_cursor<'s>(&'s self, core: CursorCore<'s>) -> Self::Cursor<'s>;

  /// Size of one record slot in bytes.
  fn record_size(&self) -> usize {
    self.header().record_size as usize
  }

  /// Size of the file header that precedes slot 0.
  fn header_size(&self) -> usize {
    HEADER_SIZE
  }

  /// Byte offset of the slot for `id`.
  fn offset(&self, id: u64) -> u64 {
    self.header_size() as u64 + id * self.record_size() as u64
  }
}
