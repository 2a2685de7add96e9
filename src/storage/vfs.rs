use parking_lot::Mutex;
use std::collections;
use std::fmt;
use std::fs;
use std::io;
use std::path;
use std::sync;

/// # File system interface
///
/// The OS interface that stores use to open their backing files. Implementations are shared
/// between stores, so all methods take `&self`.
///
/// See: <https://www.sqlite.org/c3ref/vfs.html>
pub trait FileSystem: fmt::Debug + Send + Sync {
  /// Opens the file at `path`, creating an empty one if it does not exist.
  fn open(&self, path: &path::Path) -> io::Result<Box<dyn File>>;

  /// Returns whether a file exists at `path`.
  fn exists(&self, path: &path::Path) -> bool;

  /// Deletes the file at `path`.
  fn delete(&self, path: &path::Path) -> io::Result<()>;
}

/// # File interface
///
/// Positional I/O on one open file. Growing a file, either through [`File::truncate`] or by
/// writing past its end, fills the gap with zero bytes.
///
/// See: <https://www.sqlite.org/c3ref/io_methods.html>
pub trait File: fmt::Debug + Send + Sync {
  /// Returns the size of the file in bytes.
  fn size(&mut self) -> io::Result<u64>;

  /// Sets the size of the file in bytes.
  fn truncate(&mut self, size: u64) -> io::Result<()>;

  /// Fills `buf` with the bytes at `offset`. Fails if the range reaches past the end of the file.
  fn read(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()>;

  /// Writes `buf` at `offset`, growing the file when needed.
  fn write(&mut self, offset: u64, buf: &[u8]) -> io::Result<()>;

  /// Flushes any buffered data to the file.
  fn sync(&mut self) -> io::Result<()>;

  /// Tries locking the file exclusively.
  fn try_lock(&mut self) -> io::Result<()>;

  /// Unlocks the file.
  fn unlock(&mut self) -> io::Result<()>;
}

/// # The primary implementation for [`FileSystem`]
///
/// This is simply a wrapper around [`std::fs`].
#[derive(Debug, Default)]
pub struct StandardFileSystem;

impl FileSystem for StandardFileSystem {
  fn open(&self, path: &path::Path) -> io::Result<Box<dyn File>> {
    let file = fs::OpenOptions::new().read(true).write(true).create(true).truncate(false).open(path)?;
    Ok(Box::new(StandardFile::from(file)))
  }

  fn exists(&self, path: &path::Path) -> bool {
    path.is_file()
  }

  fn delete(&self, path: &path::Path) -> io::Result<()> {
    fs::remove_file(path)
  }
}

/// # The primary implementation for [`File`]
///
/// This is simply a wrapper around [`std::fs::File`], with [`fs2`] advisory locks.
#[derive(Debug)]
pub struct StandardFile(fs::File);

impl From<fs::File> for StandardFile {
  fn from(file: fs::File) -> Self {
    Self(file)
  }
}

impl File for StandardFile {
  fn size(&mut self) -> io::Result<u64> {
    let StandardFile(inner) = self;
    Ok(inner.metadata()?.len())
  }

  fn truncate(&mut self, size: u64) -> io::Result<()> {
    let StandardFile(inner) = self;
    fs::File::set_len(inner, size)
  }

  fn read(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
    let StandardFile(inner) = self;
    io::Seek::seek(inner, io::SeekFrom::Start(offset))?;
    io::Read::read_exact(inner, buf)
  }

  fn write(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
    let StandardFile(inner) = self;
    io::Seek::seek(inner, io::SeekFrom::Start(offset))?;
    io::Write::write_all(inner, buf)
  }

  fn sync(&mut self) -> io::Result<()> {
    let StandardFile(inner) = self;
    fs::File::sync_all(inner)
  }

  fn try_lock(&mut self) -> io::Result<()> {
    let StandardFile(inner) = self;
    fs2::FileExt::try_lock_exclusive(inner)
  }

  fn unlock(&mut self) -> io::Result<()> {
    let StandardFile(inner) = self;
    fs2::FileExt::unlock(inner)
  }
}

#[derive(Debug, Default)]
struct MemoryFileData {
  data: Vec<u8>,
  locked: bool,
}

type SharedData = sync::Arc<Mutex<MemoryFileData>>;

/// In-memory implementation for [`FileSystem`]
///
/// Each file is a shared byte vector plus a lock flag. Handles opened on the same path see each
/// other's writes, which makes this file system suitable for reopening a store within a test.
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
  files: Mutex<collections::HashMap<path::PathBuf, SharedData>>,
}

impl FileSystem for MemoryFileSystem {
  fn open(&self, path: &path::Path) -> io::Result<Box<dyn File>> {
    let file = self.files.lock().entry(path.to_path_buf()).or_default().clone();
    Ok(Box::new(MemoryFile { file, holds_lock: false }))
  }

  fn exists(&self, path: &path::Path) -> bool {
    self.files.lock().contains_key(path)
  }

  fn delete(&self, path: &path::Path) -> io::Result<()> {
    match self.files.lock().remove(path) {
      Some(_) => Ok(()),
      None => Err(io::Error::new(io::ErrorKind::NotFound, format!("no such file: {}", path.display()))),
    }
  }
}

/// In-memory implementation for [`File`]
///
/// The lock taken through a handle is released when that handle is dropped, like an OS lock is
/// released when its descriptor is closed.
#[derive(Debug)]
pub struct MemoryFile {
  file: SharedData,
  holds_lock: bool,
}

fn locked_error() -> io::Error {
  io::Error::new(io::ErrorKind::WouldBlock, "file is locked by another handle")
}

impl File for MemoryFile {
  fn size(&mut self) -> io::Result<u64> {
    Ok(self.file.lock().data.len() as u64)
  }

  fn truncate(&mut self, size: u64) -> io::Result<()> {
    let size = usize::try_from(size).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    self.file.lock().data.resize(size, 0);
    Ok(())
  }

  fn read(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
    let offset = usize::try_from(offset).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let file = self.file.lock();
    if offset + buf.len() > file.data.len() {
      return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "read past end of file"));
    }
    buf.copy_from_slice(&file.data[offset..offset + buf.len()]);
    Ok(())
  }

  fn write(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
    let offset = usize::try_from(offset).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
    let mut file = self.file.lock();
    if offset + buf.len() > file.data.len() {
      file.data.resize(offset + buf.len(), 0);
    }
    file.data[offset..offset + buf.len()].copy_from_slice(buf);
    Ok(())
  }

  fn sync(&mut self) -> io::Result<()> {
    Ok(())
  }

  fn try_lock(&mut self) -> io::Result<()> {
    let mut file = self.file.lock();
    if file.locked {
      return Err(locked_error());
    }
    file.locked = true;
    self.holds_lock = true;
    Ok(())
  }

  fn unlock(&mut self) -> io::Result<()> {
    if !self.holds_lock {
      return Err(io::Error::new(io::ErrorKind::InvalidInput, "handle does not hold the lock"));
    }
    self.file.lock().locked = false;
    self.holds_lock = false;
    Ok(())
  }
}

impl Drop for MemoryFile {
  fn drop(&mut self) {
    if self.holds_lock {
      self.file.lock().locked = false;
    }
  }
}
