//! # Page cache
//!
//! A [`PageCache`] maps open files into fixed-size pages held in memory. Pages are handed out as
//! pinned [`Arc<Page>`]s; a page is only evicted once nobody holds a pin on it.
//!
//! Reads never take a lock. Every page carries a *stamp* that works like a seqlock: a writer makes
//! the stamp odd, publishes its bytes, and makes the stamp even again. A reader captures the stamp
//! with [`Page::stamp`], reads bytes with [`Page::load`], and then checks [`Page::validate`]. If
//! the stamp was odd or has moved, the bytes may be torn and the read has to be repeated.
//!
//! Writers to the same page are serialised by a per-page mutex. A write spanning several pages
//! locks them in ascending page order.

use super::vfs;
use crate::config::StoreConfig;
use crate::error::Result;
use parking_lot::{Mutex, RwLock};
use std::collections;
use std::sync::atomic::{self, AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// # A cached page
pub struct Page {
  number: u64,
  stamp: AtomicU64,
  bytes: Box<[AtomicU8]>,
  dirty: AtomicBool,
  writer: Mutex<()>,
}

impl Page {
  fn new(number: u64, contents: &[u8]) -> Self {
    Page {
      number,
      stamp: AtomicU64::new(0),
      bytes: contents.iter().map(|&b| AtomicU8::new(b)).collect(),
      dirty: AtomicBool::new(false),
      writer: Mutex::new(()),
    }
  }

  /// Page number within the mapped file.
  pub fn number(&self) -> u64 {
    self.number
  }

  /// Captures the current stamp. An odd stamp means a write is in progress.
  pub fn stamp(&self) -> u64 {
    self.stamp.load(Ordering::Acquire)
  }

  /// Returns whether every [`Page::load`] since `stamp` was captured saw a stable page.
  pub fn validate(&self, stamp: u64) -> bool {
    atomic::fence(Ordering::Acquire);
    stamp & 1 == 0 && self.stamp.load(Ordering::Relaxed) == stamp
  }

  /// Loads one byte. The value is only meaningful if a later [`Page::validate`] succeeds.
  pub fn load(&self, at: usize) -> u8 {
    self.bytes[at].load(Ordering::Relaxed)
  }

  fn snapshot(&self, buf: &mut [u8]) {
    for (dst, src) in buf.iter_mut().zip(self.bytes.iter()) {
      *dst = src.load(Ordering::Relaxed);
    }
  }
}

/// # Page cache
///
/// Holds the page geometry shared by every file it maps.
#[derive(Debug, Clone)]
pub struct PageCache {
  page_size: usize,
  max_cached_pages: usize,
}

impl PageCache {
  /// Creates a page cache after validating `config`.
  pub fn new(config: &StoreConfig) -> Result<Self> {
    config.validate()?;
    Ok(PageCache { page_size: config.page_size, max_cached_pages: config.max_cached_pages })
  }

  /// Size of one page in bytes.
  pub fn page_size(&self) -> usize {
    self.page_size
  }

  /// Maps `file` into the cache. The mapping owns the file until [`PagedFile::unmap`].
  pub fn map(&self, file: Box<dyn vfs::File>) -> PagedFile {
    PagedFile {
      page_size: self.page_size,
      max_cached_pages: self.max_cached_pages,
      file: Mutex::new(file),
      pages: RwLock::new(collections::HashMap::new()),
    }
  }
}

/// # A file mapped into the page cache
pub struct PagedFile {
  page_size: usize,
  max_cached_pages: usize,
  file: Mutex<Box<dyn vfs::File>>,
  pages: RwLock<collections::HashMap<u64, Arc<Page>>>,
}

impl PagedFile {
  /// Size of one page in bytes.
  pub fn page_size(&self) -> usize {
    self.page_size
  }

  /// Number of pages currently held in memory.
  pub fn cached_pages(&self) -> usize {
    self.pages.read().len()
  }

  /// Pins page `number`, faulting it in from the file when it is not cached. Bytes beyond the end
  /// of the file read as zero.
  pub fn pin(&self, number: u64) -> Result<Arc<Page>> {
    if let Some(page) = self.pages.read().get(&number) {
      return Ok(page.clone());
    }
    let mut pages = self.pages.write();
    if let Some(page) = pages.get(&number) {
      return Ok(page.clone());
    }
    if pages.len() >= self.max_cached_pages {
      self.evict(&mut pages)?;
    }
    let page = Arc::new(self.fault(number)?);
    pages.insert(number, page.clone());
    Ok(page)
  }

  fn fault(&self, number: u64) -> Result<Page> {
    let mut contents = vec![0u8; self.page_size];
    let start = number * self.page_size as u64;
    let mut file = self.file.lock();
    let size = file.size()?;
    if start < size {
      let available = (size - start).min(self.page_size as u64) as usize;
      file.read(start, &mut contents[..available])?;
    }
    debug!(page = number, "page fault");
    Ok(Page::new(number, &contents))
  }

  /// Drops unpinned pages until the cache is below its budget, writing dirty ones back first.
  fn evict(&self, pages: &mut collections::HashMap<u64, Arc<Page>>) -> Result<()> {
    let victims: Vec<u64> =
      pages.iter().filter(|(_, page)| Arc::strong_count(page) == 1).map(|(&number, _)| number).collect();
    for number in victims {
      if pages.len() < self.max_cached_pages {
        break;
      }
      if let Some(page) = pages.get(&number) {
        self.write_back(page)?;
      }
      pages.remove(&number);
      trace!(page = number, "page evicted");
    }
    Ok(())
  }

  fn write_back(&self, page: &Page) -> Result<()> {
    let _guard = page.writer.lock();
    if !page.dirty.swap(false, Ordering::AcqRel) {
      return Ok(());
    }
    let mut contents = vec![0u8; self.page_size];
    page.snapshot(&mut contents);
    let result = self.file.lock().write(page.number * self.page_size as u64, &contents);
    if result.is_err() {
      page.dirty.store(true, Ordering::Release);
    }
    Ok(result?)
  }

  /// Writes `data` at the absolute file `offset`, pinning and exclusively locking every page the
  /// range touches for the duration of the write.
  pub fn write(&self, offset: u64, data: &[u8]) -> Result<()> {
    if data.is_empty() {
      return Ok(());
    }
    let page_size = self.page_size as u64;
    let first = offset / page_size;
    let last = (offset + data.len() as u64 - 1) / page_size;
    let pinned = (first..=last).map(|number| self.pin(number)).collect::<Result<Vec<_>>>()?;
    let _guards: Vec<_> = pinned.iter().map(|page| page.writer.lock()).collect();

    for page in &pinned {
      page.stamp.fetch_add(1, Ordering::Relaxed);
    }
    atomic::fence(Ordering::Release);
    for (i, byte) in data.iter().enumerate() {
      let at = offset + i as u64;
      let page = &pinned[(at / page_size - first) as usize];
      page.bytes[(at % page_size) as usize].store(*byte, Ordering::Relaxed);
    }
    for page in &pinned {
      page.dirty.store(true, Ordering::Release);
      page.stamp.fetch_add(1, Ordering::Release);
    }
    Ok(())
  }

  /// Writes every dirty page back to the file and syncs it.
  pub fn flush(&self) -> Result<()> {
    let pages: Vec<Arc<Page>> = self.pages.read().values().cloned().collect();
    let mut flushed = 0usize;
    for page in pages {
      if page.dirty.load(Ordering::Acquire) {
        self.write_back(&page)?;
        flushed += 1;
      }
    }
    self.file.lock().sync()?;
    debug!(pages = flushed, "flushed page cache");
    Ok(())
  }

  /// Flushes the mapping and hands the file back. On failure the mapping is lost with its dirty
  /// pages; call [`PagedFile::flush`] first to keep it around for a retry.
  pub fn unmap(self) -> Result<Box<dyn vfs::File>> {
    self.flush()?;
    Ok(self.into_file())
  }

  /// Hands the file back without flushing. Dirty pages are discarded.
  pub fn into_file(self) -> Box<dyn vfs::File> {
    self.file.into_inner()
  }
}
