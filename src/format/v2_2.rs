//! # Version 2.2 record formats
//!
//! ## Node records
//!
//! 15 bytes, integers big-endian:
//!
//! ```text
//! offset  size  content
//!      0     1  bit 0: in use
//!               bits 1-3: first relationship, bits 32-34
//!               bits 4-7: first property, bits 32-35
//!      1     4  first relationship, bits 0-31
//!      5     4  first property, bits 0-31
//!      9     4  label field, bits 0-31
//!     13     1  label field, bits 32-39
//!     14     1  bit 0: dense
//! ```
//!
//! A reference of `-1` is stored as the low word `0xFFFF_FFFF` with no high bits, so that value is
//! not available as a real reference. The label field is 40 bits wide: `0` means no labels, bit 39
//! marks the low 36 bits as a reference to overflow label records, otherwise bits 36-38 hold an
//! inlined label count and bits 0-35 the packed label ids.

use crate::error::{Result, StoreError};
use crate::record::{NodeRecord, NO_NEXT_PROPERTY, NO_NEXT_RELATIONSHIP};
use crate::storage::cursor::{CursorCore, RecordCursor};
use crate::storage::format::{StoreFormat, StoreHeader};

/// Size of a node record slot.
pub const NODE_RECORD_SIZE: usize = 15;

/// Header of a version 2.2 node store.
pub const NODE_STORE_HEADER: StoreHeader =
  StoreHeader { type_tag: *b"NODE", version: 0x0002_0002, record_size: NODE_RECORD_SIZE as u16 };

/// Highest node id; node ids are 35 bits wide.
pub const MAX_NODE_ID: u64 = (1 << 35) - 1;

/// Highest label field value; the field is 40 bits wide.
pub const MAX_LABEL_FIELD: u64 = (1 << 40) - 1;

const HEAD: usize = 0;
const FIRST_RELATIONSHIP: usize = 1;
const FIRST_PROPERTY: usize = 5;
const LABELS_LOW: usize = 9;
const LABELS_HIGH: usize = 13;
const EXTRA: usize = 14;

const IN_USE_BIT: u8 = 0x01;
const RELATIONSHIP_HIGH_MASK: u8 = 0x0E;
const RELATIONSHIP_HIGH_SHIFT: u32 = 1;
const PROPERTY_HIGH_MASK: u8 = 0xF0;
const PROPERTY_HIGH_SHIFT: u32 = 4;
const DENSE_BIT: u8 = 0x01;

/// Splits a reference into its low word and `high_bits` extra high bits.
fn split_reference(field: &'static str, value: i64, high_bits: u32) -> Result<(u32, u8)> {
  if value == -1 {
    return Ok((u32::MAX, 0));
  }
  if value < 0 || value >= 1 << (32 + high_bits) || value == i64::from(u32::MAX) {
    return Err(StoreError::RecordOutOfRange { field, value: i128::from(value) });
  }
  Ok((value as u32, (value >> 32) as u8))
}

fn join_reference(low: u32, high: u8) -> i64 {
  if high == 0 && low == u32::MAX {
    -1
  } else {
    i64::from(high) << 32 | i64::from(low)
  }
}

fn relationship_high(head: u8) -> u8 {
  (head & RELATIONSHIP_HIGH_MASK) >> RELATIONSHIP_HIGH_SHIFT
}

fn property_high(head: u8) -> u8 {
  (head & PROPERTY_HIGH_MASK) >> PROPERTY_HIGH_SHIFT
}

fn be_u32(buf: &[u8], at: usize) -> u32 {
  u32::from_be_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

fn decode_node(id: u64, buf: &[u8]) -> NodeRecord {
  let head = buf[HEAD];
  if head & IN_USE_BIT == 0 {
    return NodeRecord::not_in_use(id);
  }
  NodeRecord::new(
    id,
    true,
    buf[EXTRA] & DENSE_BIT != 0,
    join_reference(be_u32(buf, FIRST_RELATIONSHIP), relationship_high(head)),
    join_reference(be_u32(buf, FIRST_PROPERTY), property_high(head)),
    u64::from(buf[LABELS_HIGH]) << 32 | u64::from(be_u32(buf, LABELS_LOW)),
  )
}

/// # Version 2.2 node format
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeStoreFormat;

impl StoreFormat for NodeStoreFormat {
  type Record = NodeRecord;
  type Cursor<'s> = NodeRecordCursor<'s>;

  fn header(&self) -> StoreHeader {
    NODE_STORE_HEADER
  }

  fn max_id(&self) -> u64 {
    MAX_NODE_ID
  }

  fn encode(&self, record: &NodeRecord, buf: &mut [u8]) -> Result<()> {
    let (relationship_low, relationship_high) = split_reference("first_relationship", record.first_relationship, 3)?;
    let (property_low, property_high) = split_reference("first_property", record.first_property, 4)?;
    if record.label_field > MAX_LABEL_FIELD {
      return Err(StoreError::RecordOutOfRange { field: "label_field", value: i128::from(record.label_field) });
    }

    let in_use = if record.in_use { IN_USE_BIT } else { 0 };
    buf[HEAD] = in_use | relationship_high << RELATIONSHIP_HIGH_SHIFT | property_high << PROPERTY_HIGH_SHIFT;
    buf[FIRST_RELATIONSHIP..FIRST_PROPERTY].copy_from_slice(&relationship_low.to_be_bytes());
    buf[FIRST_PROPERTY..LABELS_LOW].copy_from_slice(&property_low.to_be_bytes());
    buf[LABELS_LOW..LABELS_HIGH].copy_from_slice(&(record.label_field as u32).to_be_bytes());
    buf[LABELS_HIGH] = (record.label_field >> 32) as u8;
    buf[EXTRA] = if record.dense { DENSE_BIT } else { 0 };
    Ok(())
  }

  fn decode(&self, id: u64, buf: &[u8]) -> NodeRecord {
    decode_node(id, buf)
  }

  fn new_cursor<'s>(&'s self, core: CursorCore<'s>) -> NodeRecordCursor<'s> {
    NodeRecordCursor { core }
  }
}

/// # Node record cursor
///
/// Field accessors decode straight from the pinned pages. A slot that is not in use reads as
/// [`NodeRecord::not_in_use`], field by field.
pub struct NodeRecordCursor<'s> {
  core: CursorCore<'s>,
}

impl<'s> NodeRecordCursor<'s> {
  /// The id the cursor is positioned at.
  pub fn id(&self) -> Option<u64> {
    self.core.id()
  }

  fn head(&self) -> Result<Option<u8>> {
    let head = self.core.read_u8(HEAD)?;
    Ok((head & IN_USE_BIT != 0).then_some(head))
  }

  pub fn dense(&self) -> Result<bool> {
    match self.head()? {
      Some(_) => Ok(self.core.read_u8(EXTRA)? & DENSE_BIT != 0),
      None => Ok(false),
    }
  }

  pub fn first_relationship(&self) -> Result<i64> {
    match self.head()? {
      Some(head) => Ok(join_reference(self.core.read_u32(FIRST_RELATIONSHIP)?, relationship_high(head))),
      None => Ok(NO_NEXT_RELATIONSHIP),
    }
  }

  pub fn first_property(&self) -> Result<i64> {
    match self.head()? {
      Some(head) => Ok(join_reference(self.core.read_u32(FIRST_PROPERTY)?, property_high(head))),
      None => Ok(NO_NEXT_PROPERTY),
    }
  }

  pub fn label_field(&self) -> Result<u64> {
    match self.head()? {
      Some(_) => {
        let low = self.core.read_u32(LABELS_LOW)?;
        let high = self.core.read_u8(LABELS_HIGH)?;
        Ok(u64::from(high) << 32 | u64::from(low))
      }
      None => Ok(0),
    }
  }
}

impl<'s> RecordCursor for NodeRecordCursor<'s> {
  type Record = NodeRecord;

  fn position(&mut self, id: u64) -> Result<()> {
    self.core.position(id)
  }

  fn should_retry(&mut self) -> bool {
    self.core.should_retry()
  }

  fn in_use(&self) -> Result<bool> {
    Ok(self.head()?.is_some())
  }

  fn record(&mut self) -> Result<NodeRecord> {
    let mut buf = [0u8; NODE_RECORD_SIZE];
    self.core.snapshot(&mut buf)?;
    let id = self.core.id().ok_or_else(|| StoreError::ProtocolMisuse("cursor read before position".to_string()))?;
    Ok(decode_node(id, &buf))
  }

  fn next(&mut self) -> Result<bool> {
    self.core.scan_next(|core| Ok(core.read_u8(HEAD)? & IN_USE_BIT != 0))
  }
}
