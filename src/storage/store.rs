//! # Standard record store
//!
//! [`StandardStore`] binds one [`StoreFormat`] to one file. It walks through an explicit lifecycle:
//!
//! ```text
//! Created --init--> Initialized --start--> Started --stop--> Stopped --shutdown--> ShutDown
//!                                             ^                 |
//!                                             +------start------+
//! ```
//!
//! Lifecycle methods take `&mut self`; data operations take `&self` and are only legal while the
//! store is started. A started store can be shared between threads: readers go through lock-free
//! cursors, writers are serialised per page by the page cache.

use super::cursor::{CursorCore, CursorFlags, RecordCursor};
use super::format::{StoreFormat, StoreHeader};
use super::ids::{IdGenerator, MonotonicIdGenerator};
use super::paging::{PageCache, PagedFile};
use super::vfs;
use crate::error::{Result, StoreError};
use crate::record::Record;
use parking_lot::Mutex;
use std::fmt;
use std::path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// # Store lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
  Created,
  Initialized,
  Started,
  Stopped,
  ShutDown,
}

impl Lifecycle {
  pub fn name(self) -> &'static str {
    match self {
      Lifecycle::Created => "created",
      Lifecycle::Initialized => "initialized",
      Lifecycle::Started => "started",
      Lifecycle::Stopped => "stopped",
      Lifecycle::ShutDown => "shut down",
    }
  }
}

impl fmt::Display for Lifecycle {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.name())
  }
}

/// # Standard store engine
///
/// Generic over the record format and the id generator. The store owns its file handle: between
/// `init` and `start` and after `stop` it holds the file directly, while started the file is owned
/// by the page cache mapping.
pub struct StandardStore<F: StoreFormat, I: IdGenerator = MonotonicIdGenerator> {
  format: F,
  path: path::PathBuf,
  fs: Arc<dyn vfs::FileSystem>,
  page_cache: PageCache,
  ids: Mutex<I>,
  state: Lifecycle,
  file: Option<Box<dyn vfs::File>>,
  paged: Option<PagedFile>,
  // Number of slots the store knows about: one past the highest id allocated, written or found.
  high_water: AtomicU64,
}

impl<F: StoreFormat, I: IdGenerator> StandardStore<F, I> {
  pub fn new(
    format: F,
    path: impl Into<path::PathBuf>,
    ids: I,
    page_cache: PageCache,
    fs: Arc<dyn vfs::FileSystem>,
  ) -> Self {
    StandardStore {
      format,
      path: path.into(),
      fs,
      page_cache,
      ids: Mutex::new(ids),
      state: Lifecycle::Created,
      file: None,
      paged: None,
      high_water: AtomicU64::new(0),
    }
  }

  pub fn state(&self) -> Lifecycle {
    self.state
  }

  pub fn format(&self) -> &F {
    &self.format
  }

  pub fn path(&self) -> &path::Path {
    &self.path
  }

  pub fn record_size(&self) -> usize {
    self.format.record_size()
  }

  /// Highest id handed out, written, or found in the file at `init`.
  pub fn highest_id(&self) -> Option<u64> {
    self.ids.lock().highest_id()
  }

  fn out_of_order(&self, operation: &str) -> StoreError {
    StoreError::ProtocolMisuse(format!("cannot {operation} a store that is {}", self.state))
  }

  /// Opens or creates the backing file, validates its header, and opens the id generator.
  pub fn init(&mut self) -> Result<()> {
    if self.state != Lifecycle::Created {
      return Err(self.out_of_order("init"));
    }
    let mut file = self.fs.open(&self.path)?;
    file.try_lock()?;

    let expected = self.format.header();
    let header_size = self.format.header_size();
    let size = file.size()?;
    if size == 0 {
      let mut header = vec![0u8; header_size];
      header[..expected.encode().len()].copy_from_slice(&expected.encode());
      file.write(0, &header)?;
      file.sync()?;
      debug!(path = %self.path.display(), "created store file");
    } else {
      if size < header_size as u64 {
        warn!(path = %self.path.display(), size, "store file shorter than its header");
        return Err(StoreError::FormatMismatch(format!("file is {size} bytes, shorter than the {header_size}-byte header")));
      }
      let mut header = vec![0u8; header_size];
      file.read(0, &mut header)?;
      if let Err(err) = StoreHeader::decode(&header).and_then(|found| expected.check(&found)) {
        warn!(path = %self.path.display(), %err, "store file rejected");
        return Err(err);
      }
    }

    let highest = self.highest_in_use(file.as_mut(), size.max(header_size as u64))?;
    self.ids.get_mut().open(highest)?;
    self.high_water.store(highest.map_or(0, |id| id + 1), Ordering::Release);
    self.file = Some(file);
    self.state = Lifecycle::Initialized;
    debug!(path = %self.path.display(), highest = ?highest, "store initialized");
    Ok(())
  }

  /// Scans slots backwards from the end of the file for the last record in use.
  fn highest_in_use(&self, file: &mut dyn vfs::File, size: u64) -> Result<Option<u64>> {
    let record_size = self.format.record_size();
    let slots = (size - self.format.header_size() as u64) / record_size as u64;
    let mut buf = vec![0u8; record_size];
    for id in (0..slots).rev() {
      file.read(self.format.offset(id), &mut buf)?;
      if self.format.decode(id, &buf).in_use() {
        return Ok(Some(id));
      }
    }
    Ok(None)
  }

  /// Maps the file into the page cache. Legal after `init` and after `stop`.
  pub fn start(&mut self) -> Result<()> {
    if !matches!(self.state, Lifecycle::Initialized | Lifecycle::Stopped) {
      return Err(self.out_of_order("start"));
    }
    let file = self.file.take().ok_or_else(|| self.out_of_order("start"))?;
    self.paged = Some(self.page_cache.map(file));
    self.state = Lifecycle::Started;
    debug!(path = %self.path.display(), "store started");
    Ok(())
  }

  /// Flushes dirty pages and releases the page cache mapping. Stopping a stopped store does nothing.
  ///
  /// If the flush fails the store stays started with every page still cached, so `stop` can be
  /// retried once the cause is fixed.
  pub fn stop(&mut self) -> Result<()> {
    match self.state {
      Lifecycle::Stopped => return Ok(()),
      Lifecycle::Started => {}
      _ => return Err(self.out_of_order("stop")),
    }
    let paged = self.paged.as_ref().ok_or_else(|| self.out_of_order("stop"))?;
    if let Err(err) = paged.flush() {
      warn!(path = %self.path.display(), %err, "flush failed, store stays started");
      return Err(err);
    }
    let paged = self.paged.take().ok_or_else(|| self.out_of_order("stop"))?;
    self.file = Some(paged.into_file());
    self.state = Lifecycle::Stopped;
    debug!(path = %self.path.display(), "store stopped");
    Ok(())
  }

  /// Releases the id generator and the file. A started store is stopped first.
  pub fn shutdown(&mut self) -> Result<()> {
    if self.state == Lifecycle::ShutDown {
      return Err(self.out_of_order("shut down"));
    }
    if self.state == Lifecycle::Started {
      self.stop()?;
    }
    if self.state != Lifecycle::Created {
      self.ids.get_mut().close()?;
    }
    let file = self.file.take();
    self.state = Lifecycle::ShutDown;
    if let Some(mut file) = file {
      file.unlock()?;
    }
    debug!(path = %self.path.display(), "store shut down");
    Ok(())
  }

  fn started(&self, operation: &'static str) -> Result<&PagedFile> {
    match (&self.paged, self.state) {
      (Some(paged), Lifecycle::Started) => Ok(paged),
      _ => Err(StoreError::InvalidState { operation, state: self.state.name() }),
    }
  }

  /// Hands out a fresh record id.
  pub fn allocate(&self) -> Result<u64> {
    self.started("allocate")?;
    let id = self.ids.lock().next_id()?;
    if id > self.format.max_id() {
      return Err(StoreError::ResourceExhausted(format!("id {id} is beyond the format limit {}", self.format.max_id())));
    }
    self.high_water.fetch_max(id + 1, Ordering::AcqRel);
    Ok(id)
  }

  /// Returns `id` to the id generator.
  pub fn free(&self, id: u64) -> Result<()> {
    self.started("free")?;
    self.ids.lock().free(id);
    Ok(())
  }

  /// Persists `record` in the slot of its id.
  pub fn write(&self, record: &F::Record) -> Result<()> {
    let paged = self.started("write")?;
    let id = record.id();
    if id > self.format.max_id() {
      return Err(StoreError::RecordOutOfRange { field: "id", value: i128::from(id) });
    }
    let mut buf = vec![0u8; self.format.record_size()];
    self.format.encode(record, &mut buf)?;
    paged.write(self.format.offset(id), &buf)?;
    self.ids.lock().mark_used(id);
    self.high_water.fetch_max(id + 1, Ordering::AcqRel);
    Ok(())
  }

  /// Reads the record at `id`. Slots never written read as not in use.
  pub fn read(&self, id: u64) -> Result<F::Record> {
    let mut cursor = self.cursor(CursorFlags::NONE)?;
    cursor.position(id)?;
    cursor.record()
  }

  /// Creates a cursor over this store. The cursor borrows the store.
  pub fn cursor(&self, flags: CursorFlags) -> Result<F::Cursor<'_>> {
    let paged = self.started("open a cursor on")?;
    let core =
      CursorCore::new(paged, self.format.header_size(), self.format.record_size(), &self.high_water, flags);
    Ok(self.format.new_cursor(core))
  }

  /// Every record in use, in id order.
  ///
  /// A record deleted between the scan finding it and the snapshot reading it is left out.
  pub fn records(&self) -> Result<Vec<F::Record>> {
    let mut cursor = self.cursor(CursorFlags::NONE)?;
    let mut records = Vec::new();
    while cursor.next()? {
      let record = cursor.record()?;
      if record.in_use() {
        records.push(record);
      }
    }
    Ok(records)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::config::StoreConfig;
  use crate::format::v2_2::{NodeRecordCursor, NodeStoreFormat, MAX_NODE_ID};
  use crate::record::NodeRecord;
  use crate::storage::ids::FreeListIdGenerator;
  use crate::storage::vfs::{FileSystem, MemoryFileSystem};
  use std::io;
  use std::sync::atomic::AtomicBool;

  fn node_store_with<I: IdGenerator>(
    fs: &Arc<MemoryFileSystem>,
    page_size: usize,
    ids: I,
  ) -> StandardStore<NodeStoreFormat, I> {
    let page_cache = PageCache::new(&StoreConfig { page_size, max_cached_pages: 4 }).unwrap();
    StandardStore::new(NodeStoreFormat, "neostore.nodestore.db", ids, page_cache, fs.clone())
  }

  fn node_store(fs: &Arc<MemoryFileSystem>) -> StandardStore<NodeStoreFormat> {
    node_store_with(fs, 128, MonotonicIdGenerator::default())
  }

  fn started(fs: &Arc<MemoryFileSystem>) -> StandardStore<NodeStoreFormat> {
    let mut store = node_store(fs);
    store.init().unwrap();
    store.start().unwrap();
    store
  }

  fn first_relationship(cursor: &mut NodeRecordCursor<'_>) -> i64 {
    loop {
      let value = cursor.first_relationship().unwrap();
      if !cursor.should_retry() {
        break value;
      }
    }
  }

  #[test]
  fn test_round_trip() {
    let fs = Arc::new(MemoryFileSystem::default());
    let store = started(&fs);
    let record = NodeRecord::new(store.allocate().unwrap(), true, false, 1, 2, 42);
    store.write(&record).unwrap();
    assert_eq!(store.read(record.id()).unwrap(), record);
  }

  #[test]
  fn test_cursor_reads_first_relationship() {
    let fs = Arc::new(MemoryFileSystem::default());
    let store = started(&fs);
    let record = NodeRecord::new(store.allocate().unwrap(), true, false, 1337, 2, 42);
    store.write(&record).unwrap();

    let mut cursor = store.cursor(CursorFlags::NONE).unwrap();
    cursor.position(record.id()).unwrap();
    assert_eq!(first_relationship(&mut cursor), 1337);
  }

  #[test]
  fn test_cursor_accessor_before_position() {
    let fs = Arc::new(MemoryFileSystem::default());
    let store = started(&fs);
    let mut cursor = store.cursor(CursorFlags::NONE).unwrap();
    assert!(matches!(cursor.first_relationship(), Err(StoreError::ProtocolMisuse(_))));
    assert!(matches!(cursor.record(), Err(StoreError::ProtocolMisuse(_))));
  }

  #[test]
  fn test_cursor_reuse_across_ids() {
    let fs = Arc::new(MemoryFileSystem::default());
    let store = started(&fs);
    for i in 0..20 {
      let id = store.allocate().unwrap();
      store.write(&NodeRecord::new(id, true, i % 2 == 0, i * 10, i, 0)).unwrap();
    }
    let mut cursor = store.cursor(CursorFlags::NONE).unwrap();
    for id in (0..20u64).rev() {
      cursor.position(id).unwrap();
      assert_eq!(first_relationship(&mut cursor), id as i64 * 10);
      assert_eq!(cursor.id(), Some(id));
    }
  }

  #[test]
  fn test_unwritten_ids_are_not_in_use() {
    let fs = Arc::new(MemoryFileSystem::default());
    let store = started(&fs);
    store.write(&NodeRecord::new(3, true, false, 1, 2, 3)).unwrap();

    // Below the highest written id, skipped slots are zero-filled.
    assert_eq!(store.read(1).unwrap(), NodeRecord::not_in_use(1));
    // Far beyond anything written, the read neither fails nor invents values.
    assert_eq!(store.read(100_000).unwrap(), NodeRecord::not_in_use(100_000));

    let mut cursor = store.cursor(CursorFlags::NONE).unwrap();
    cursor.position(100_000).unwrap();
    assert!(!cursor.in_use().unwrap());
    assert_eq!(cursor.first_property().unwrap(), -1);
  }

  #[test]
  fn test_records_skips_unused_slots() {
    let fs = Arc::new(MemoryFileSystem::default());
    let store = started(&fs);
    let kept = NodeRecord::new(store.allocate().unwrap(), true, false, 1, 2, 42);
    let deleted = NodeRecord::new(store.allocate().unwrap(), true, true, 3, 4, 5);
    let last = NodeRecord::new(store.allocate().unwrap(), true, false, -1, -1, 0);
    store.write(&kept).unwrap();
    store.write(&deleted).unwrap();
    store.write(&last).unwrap();
    store.write(&NodeRecord::new(deleted.id(), false, true, 3, 4, 5)).unwrap();

    assert_eq!(store.records().unwrap(), vec![kept.clone(), last.clone()]);

    let mut reverse = store.cursor(CursorFlags::REVERSE).unwrap();
    let mut ids = Vec::new();
    while reverse.next().unwrap() {
      ids.push(reverse.id().unwrap());
    }
    assert_eq!(ids, vec![last.id(), kept.id()]);
  }

  #[test]
  fn test_lifecycle_ordering() {
    let fs = Arc::new(MemoryFileSystem::default());
    let mut store = node_store(&fs);
    let record = NodeRecord::new(0, true, false, 1, 2, 3);

    // Data operations before start.
    assert!(matches!(store.allocate(), Err(StoreError::InvalidState { .. })));
    store.init().unwrap();
    assert!(matches!(store.write(&record), Err(StoreError::InvalidState { .. })));
    assert!(matches!(store.read(0), Err(StoreError::InvalidState { .. })));
    assert!(store.cursor(CursorFlags::NONE).is_err());

    store.start().unwrap();
    store.write(&record).unwrap();
    store.stop().unwrap();
    // Stop is idempotent.
    store.stop().unwrap();
    assert_eq!(store.state(), Lifecycle::Stopped);

    // Data operations after stop.
    assert!(matches!(store.write(&record), Err(StoreError::InvalidState { state: "stopped", .. })));
    assert!(matches!(store.free(0), Err(StoreError::InvalidState { .. })));

    store.shutdown().unwrap();
    assert_eq!(store.state(), Lifecycle::ShutDown);
    assert!(matches!(store.read(0), Err(StoreError::InvalidState { .. })));
  }

  #[test]
  fn test_lifecycle_out_of_order() {
    let fs = Arc::new(MemoryFileSystem::default());
    let mut store = node_store(&fs);
    assert!(matches!(store.start(), Err(StoreError::ProtocolMisuse(_))));
    assert!(matches!(store.stop(), Err(StoreError::ProtocolMisuse(_))));
    store.init().unwrap();
    assert!(matches!(store.init(), Err(StoreError::ProtocolMisuse(_))));
    store.start().unwrap();
    assert!(matches!(store.start(), Err(StoreError::ProtocolMisuse(_))));
    // Shutting down a started store stops it first.
    store.shutdown().unwrap();
    assert!(matches!(store.shutdown(), Err(StoreError::ProtocolMisuse(_))));
    assert!(matches!(store.start(), Err(StoreError::ProtocolMisuse(_))));
  }

  #[test]
  fn test_restart_keeps_records() {
    let fs = Arc::new(MemoryFileSystem::default());
    let mut store = started(&fs);
    let record = NodeRecord::new(store.allocate().unwrap(), true, true, 7, 8, 9);
    store.write(&record).unwrap();
    store.stop().unwrap();
    store.start().unwrap();
    assert_eq!(store.read(record.id()).unwrap(), record);
    store.shutdown().unwrap();
  }

  #[test]
  fn test_reopen_recovers_highest_id() {
    let fs = Arc::new(MemoryFileSystem::default());
    let mut store = started(&fs);
    for _ in 0..5 {
      let id = store.allocate().unwrap();
      store.write(&NodeRecord::new(id, true, false, 1, 2, 3)).unwrap();
    }
    // The trailing slot is deleted, so it does not count as in use after reopening.
    store.write(&NodeRecord::not_in_use(4)).unwrap();
    store.shutdown().unwrap();

    let mut store = started(&fs);
    assert_eq!(store.highest_id(), Some(3));
    assert_eq!(store.allocate().unwrap(), 4);
    assert_eq!(store.records().unwrap().len(), 4);
    store.shutdown().unwrap();
  }

  #[test]
  fn test_store_file_is_locked_while_open() {
    let fs = Arc::new(MemoryFileSystem::default());
    let mut first = node_store(&fs);
    first.init().unwrap();

    let mut second = node_store(&fs);
    assert!(matches!(second.init(), Err(StoreError::Io(_))));
    assert_eq!(second.state(), Lifecycle::Created);

    first.shutdown().unwrap();
    second.init().unwrap();
    second.shutdown().unwrap();
  }

  #[test]
  fn test_init_rejects_mismatched_header() {
    let fs = Arc::new(MemoryFileSystem::default());
    let mut file = fs.open(path::Path::new("neostore.nodestore.db")).unwrap();
    let header = StoreHeader { record_size: 9, ..NodeStoreFormat.header() };
    file.write(0, &header.encode()).unwrap();
    drop(file);

    let mut store = node_store(&fs);
    assert!(matches!(store.init(), Err(StoreError::FormatMismatch(_))));
    assert_eq!(store.state(), Lifecycle::Created);
  }

  #[test]
  fn test_init_rejects_truncated_header() {
    let fs = Arc::new(MemoryFileSystem::default());
    fs.open(path::Path::new("neostore.nodestore.db")).unwrap().write(0, b"RST").unwrap();

    let mut store = node_store(&fs);
    assert!(matches!(store.init(), Err(StoreError::FormatMismatch(_))));
  }

  #[test]
  fn test_allocation_is_monotonic() {
    let fs = Arc::new(MemoryFileSystem::default());
    let store = started(&fs);
    let ids: Vec<u64> = (0..100).map(|_| store.allocate().unwrap()).collect();
    assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
  }

  #[test]
  fn test_write_beyond_allocation_is_never_reallocated() {
    let fs = Arc::new(MemoryFileSystem::default());
    let store = started(&fs);
    store.write(&NodeRecord::new(10, true, false, 1, 2, 3)).unwrap();
    assert_eq!(store.allocate().unwrap(), 11);
  }

  #[test]
  fn test_free_list_reuse() {
    let fs = Arc::new(MemoryFileSystem::default());
    let mut store = node_store_with(&fs, 128, FreeListIdGenerator::default());
    store.init().unwrap();
    store.start().unwrap();
    let first = store.allocate().unwrap();
    let second = store.allocate().unwrap();
    store.write(&NodeRecord::not_in_use(first)).unwrap();
    store.free(first).unwrap();
    assert_eq!(store.allocate().unwrap(), first);
    assert_eq!(store.allocate().unwrap(), second + 1);
  }

  #[test]
  fn test_allocate_exhausts_at_format_limit() {
    let fs = Arc::new(MemoryFileSystem::default());
    let mut store = node_store(&fs);
    store.init().unwrap();
    store.ids.get_mut().mark_used(MAX_NODE_ID);
    store.start().unwrap();
    assert!(matches!(store.allocate(), Err(StoreError::ResourceExhausted(_))));
  }

  #[test]
  fn test_write_rejects_unencodable_record() {
    let fs = Arc::new(MemoryFileSystem::default());
    let store = started(&fs);
    let too_far = NodeRecord::new(0, true, false, 1 << 35, 2, 3);
    assert!(matches!(store.write(&too_far), Err(StoreError::RecordOutOfRange { .. })));
    let bad_id = NodeRecord::new(MAX_NODE_ID + 1, true, false, 1, 2, 3);
    assert!(matches!(store.write(&bad_id), Err(StoreError::RecordOutOfRange { field: "id", .. })));
    assert_eq!(store.read(0).unwrap(), NodeRecord::not_in_use(0));
  }

  #[test]
  fn test_small_pages_with_eviction() {
    let fs = Arc::new(MemoryFileSystem::default());
    let mut store = node_store_with(&fs, 16, MonotonicIdGenerator::default());
    store.init().unwrap();
    store.start().unwrap();
    let records: Vec<NodeRecord> = (0..64)
      .map(|i| NodeRecord::new(store.allocate().unwrap(), true, i % 3 == 0, i, i + 1, i as u64 * 7))
      .collect();
    for record in &records {
      store.write(record).unwrap();
    }
    assert_eq!(store.records().unwrap(), records);

    store.shutdown().unwrap();
    let mut store = node_store_with(&fs, 16, MonotonicIdGenerator::default());
    store.init().unwrap();
    store.start().unwrap();
    assert_eq!(store.records().unwrap(), records);
  }

  /// Wraps a memory file system; writes fail while `full` is set.
  #[derive(Debug, Default)]
  struct FullDisk {
    inner: MemoryFileSystem,
    full: Arc<AtomicBool>,
  }

  #[derive(Debug)]
  struct FullDiskFile {
    inner: Box<dyn vfs::File>,
    full: Arc<AtomicBool>,
  }

  impl FileSystem for FullDisk {
    fn open(&self, path: &path::Path) -> io::Result<Box<dyn vfs::File>> {
      Ok(Box::new(FullDiskFile { inner: self.inner.open(path)?, full: self.full.clone() }))
    }

    fn exists(&self, path: &path::Path) -> bool {
      self.inner.exists(path)
    }

    fn delete(&self, path: &path::Path) -> io::Result<()> {
      self.inner.delete(path)
    }
  }

  impl vfs::File for FullDiskFile {
    fn size(&mut self) -> io::Result<u64> {
      self.inner.size()
    }

    fn truncate(&mut self, size: u64) -> io::Result<()> {
      self.inner.truncate(size)
    }

    fn read(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
      self.inner.read(offset, buf)
    }

    fn write(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
      if self.full.load(Ordering::Acquire) {
        return Err(io::Error::new(io::ErrorKind::Other, "disk full"));
      }
      self.inner.write(offset, buf)
    }

    fn sync(&mut self) -> io::Result<()> {
      self.inner.sync()
    }

    fn try_lock(&mut self) -> io::Result<()> {
      self.inner.try_lock()
    }

    fn unlock(&mut self) -> io::Result<()> {
      self.inner.unlock()
    }
  }

  #[test]
  fn test_failed_stop_can_be_retried() {
    let fs = Arc::new(FullDisk::default());
    let page_cache = PageCache::new(&StoreConfig::default()).unwrap();
    let mut store: StandardStore<NodeStoreFormat> = StandardStore::new(
      NodeStoreFormat,
      "neostore.nodestore.db",
      MonotonicIdGenerator::default(),
      page_cache,
      fs.clone(),
    );
    store.init().unwrap();
    store.start().unwrap();
    let record = NodeRecord::new(store.allocate().unwrap(), true, false, 1, 2, 42);
    store.write(&record).unwrap();

    fs.full.store(true, Ordering::Release);
    assert!(matches!(store.stop(), Err(StoreError::Io(_))));
    assert_eq!(store.state(), Lifecycle::Started);
    assert_eq!(store.read(record.id()).unwrap(), record);

    fs.full.store(false, Ordering::Release);
    store.stop().unwrap();
    assert_eq!(store.state(), Lifecycle::Stopped);
    store.shutdown().unwrap();

    let page_cache = PageCache::new(&StoreConfig::default()).unwrap();
    let mut store: StandardStore<NodeStoreFormat> = StandardStore::new(
      NodeStoreFormat,
      "neostore.nodestore.db",
      MonotonicIdGenerator::default(),
      page_cache,
      fs,
    );
    store.init().unwrap();
    store.start().unwrap();
    assert_eq!(store.records().unwrap(), vec![record]);
    store.shutdown().unwrap();
  }
}
