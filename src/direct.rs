//! # Direct node store
//!
//! A node store that reads and writes version 2.2 node records with plain positional file I/O: no
//! page cache, no cursors, no lifecycle beyond open and close. It shares no encoding code with
//! [`crate::format::v2_2`]; both sides were written against the same layout description, so a file
//! produced by either must be readable by the other byte for byte.

use crate::error::{Result, StoreError};
use crate::record::{NodeRecord, Record};
use crate::storage::vfs;
use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use std::io;
use std::path;
use tracing::debug;

const MAGIC: &[u8; 4] = b"RSTO";
const TYPE_TAG: &[u8; 4] = b"NODE";
const VERSION: u32 = 0x0002_0002;
const HEADER_SIZE: u64 = 16;

/// Size of one node record on disk.
pub const RECORD_SIZE: usize = 15;

/// Highest addressable node id; ids are 35 bits wide.
pub const MAX_ID: u64 = (1 << 35) - 1;

const NULL_WORD: u64 = 0xFFFF_FFFF;

/// # Direct node store
pub struct DirectNodeStore {
  file: Box<dyn vfs::File>,
  next_id: u64,
}

impl DirectNodeStore {
  /// Opens the node store at `path`, creating it if needed. The file stays locked until
  /// [`DirectNodeStore::close`].
  pub fn open(fs: &dyn vfs::FileSystem, path: &path::Path) -> Result<Self> {
    let mut file = fs.open(path)?;
    file.try_lock()?;
    let size = file.size()?;
    if size == 0 {
      let mut header = Vec::with_capacity(HEADER_SIZE as usize);
      header.extend_from_slice(MAGIC);
      header.extend_from_slice(TYPE_TAG);
      header.write_u32::<BigEndian>(VERSION)?;
      header.write_u16::<BigEndian>(RECORD_SIZE as u16)?;
      header.write_u16::<BigEndian>(0)?;
      file.write(0, &header)?;
    } else {
      check_header(file.as_mut(), size)?;
    }
    let next_id = last_in_use(file.as_mut(), size)?.map_or(0, |id| id + 1);
    debug!(path = %path.display(), next_id, "opened direct node store");
    Ok(DirectNodeStore { file, next_id })
  }

  /// Returns the next id past the last node in use.
  pub fn next_id(&mut self) -> u64 {
    let id = self.next_id;
    self.next_id += 1;
    id
  }

  /// Reads the node at `id`. Slots past the end of the file read as not in use.
  pub fn get_record(&mut self, id: u64) -> Result<NodeRecord> {
    let offset = slot_offset(id)?;
    if offset + RECORD_SIZE as u64 > self.file.size()? {
      return Ok(NodeRecord::not_in_use(id));
    }
    let mut buf = [0u8; RECORD_SIZE];
    self.file.read(offset, &mut buf)?;
    Ok(decode(id, &buf)?)
  }

  /// Writes `record` into its slot, growing the file with zeroes as needed.
  pub fn update_record(&mut self, record: &NodeRecord) -> Result<()> {
    let offset = slot_offset(record.id())?;
    let buf = encode(record)?;
    self.file.write(offset, &buf)?;
    self.next_id = self.next_id.max(record.id() + 1);
    Ok(())
  }

  /// Syncs and unlocks the file.
  pub fn close(mut self) -> Result<()> {
    self.file.sync()?;
    self.file.unlock()?;
    Ok(())
  }
}

fn slot_offset(id: u64) -> Result<u64> {
  if id > MAX_ID {
    return Err(StoreError::RecordOutOfRange { field: "id", value: i128::from(id) });
  }
  id.checked_mul(RECORD_SIZE as u64)
    .and_then(|offset| offset.checked_add(HEADER_SIZE))
    .ok_or(StoreError::RecordOutOfRange { field: "id", value: i128::from(id) })
}

/// Scans slots backwards from the end of the file for the last node in use.
fn last_in_use(file: &mut dyn vfs::File, size: u64) -> Result<Option<u64>> {
  let slots = size.saturating_sub(HEADER_SIZE) / RECORD_SIZE as u64;
  let mut buf = [0u8; RECORD_SIZE];
  for id in (0..slots).rev() {
    file.read(HEADER_SIZE + id * RECORD_SIZE as u64, &mut buf)?;
    if buf[0] & 0x1 != 0 {
      return Ok(Some(id));
    }
  }
  Ok(None)
}

fn check_header(file: &mut dyn vfs::File, size: u64) -> Result<()> {
  if size < HEADER_SIZE {
    return Err(StoreError::FormatMismatch(format!("node store is only {size} bytes long")));
  }
  let mut header = [0u8; HEADER_SIZE as usize];
  file.read(0, &mut header)?;
  let mut reader = io::Cursor::new(&header[..]);
  let mut magic = [0u8; 4];
  let mut tag = [0u8; 4];
  io::Read::read_exact(&mut reader, &mut magic)?;
  io::Read::read_exact(&mut reader, &mut tag)?;
  let version = reader.read_u32::<BigEndian>()?;
  let record_size = reader.read_u16::<BigEndian>()?;
  if &magic != MAGIC || &tag != TYPE_TAG || version != VERSION || record_size as usize != RECORD_SIZE {
    return Err(StoreError::FormatMismatch(format!(
      "not a version 2.2 node store (tag {:?}, version {version:#x}, record size {record_size})",
      String::from_utf8_lossy(&tag)
    )));
  }
  Ok(())
}

/// Splits a reference into the 32-bit word and the modifier bits kept in the head byte.
fn reference_parts(field: &'static str, reference: i64, limit: u64, mask: u64, shift: u32) -> Result<(u32, u8)> {
  if reference == -1 {
    return Ok((NULL_WORD as u32, 0));
  }
  let value = reference as u64;
  if reference < 0 || value >= limit || value == NULL_WORD {
    return Err(StoreError::RecordOutOfRange { field, value: i128::from(reference) });
  }
  Ok(((value & NULL_WORD) as u32, ((value & mask) >> shift) as u8))
}

fn reference_from(word: u32, modifier: u64) -> i64 {
  if modifier == 0 && u64::from(word) == NULL_WORD {
    -1
  } else {
    (u64::from(word) | modifier) as i64
  }
}

/// Encodes `record` the way it appears on disk.
pub fn encode(record: &NodeRecord) -> Result<[u8; RECORD_SIZE]> {
  let (relationship, relationship_modifier) =
    reference_parts("first_relationship", record.first_relationship, 1 << 35, 0x7_0000_0000, 31)?;
  let (property, property_modifier) = reference_parts("first_property", record.first_property, 1 << 36, 0xF_0000_0000, 28)?;
  if record.label_field >= 1 << 40 {
    return Err(StoreError::RecordOutOfRange { field: "label_field", value: i128::from(record.label_field) });
  }

  let mut out = Vec::with_capacity(RECORD_SIZE);
  out.write_u8(u8::from(record.in_use) | relationship_modifier | property_modifier)?;
  out.write_u32::<BigEndian>(relationship)?;
  out.write_u32::<BigEndian>(property)?;
  out.write_u32::<BigEndian>((record.label_field & 0xFFFF_FFFF) as u32)?;
  out.write_u8(((record.label_field & 0xFF_0000_0000) >> 32) as u8)?;
  out.write_u8(u8::from(record.dense))?;

  let mut buf = [0u8; RECORD_SIZE];
  buf.copy_from_slice(&out);
  Ok(buf)
}

/// Decodes an on-disk node record.
pub fn decode(id: u64, buf: &[u8]) -> io::Result<NodeRecord> {
  let mut reader = io::Cursor::new(buf);
  let head = u64::from(reader.read_u8()?);
  if head & 0x1 == 0 {
    return Ok(NodeRecord::not_in_use(id));
  }
  let relationship = reader.read_u32::<BigEndian>()?;
  let property = reader.read_u32::<BigEndian>()?;
  let labels_low = u64::from(reader.read_u32::<BigEndian>()?);
  let labels_high = u64::from(reader.read_u8()?);
  let extra = reader.read_u8()?;
  Ok(NodeRecord::new(
    id,
    true,
    extra & 0x1 != 0,
    reference_from(relationship, (head & 0xE) << 31),
    reference_from(property, (head & 0xF0) << 28),
    labels_low | labels_high << 32,
  ))
}
