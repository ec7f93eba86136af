//! File-based storage backend.

use crate::backend::StorageBackend;
use crate::error::{StorageError, StorageResult};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// A storage backend over a single append-only file.
///
/// - `flush()` pushes data to the OS with `File::flush`
/// - `sync()` makes it durable with `File::sync_all`
///
/// ```no_run
/// use strata_storage::{FileBackend, StorageBackend};
/// use std::path::Path;
///
/// let mut backend = FileBackend::open(Path::new("journal.log")).unwrap();
/// backend.append(b"frame").unwrap();
/// backend.sync().unwrap();
/// ```
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    file: Mutex<File>,
    size: u64,
}

impl FileBackend {
    /// Opens or creates the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or created.
    pub fn open(path: &Path) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)?;
        let size = file.metadata()?.len();

        Ok(Self {
            path: path.to_path_buf(),
            file: Mutex::new(file),
            size,
        })
    }

    /// Opens or creates the file, creating parent directories first.
    ///
    /// # Errors
    ///
    /// Returns an error if directories cannot be created or the file cannot
    /// be opened.
    pub fn open_with_create_dirs(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::open(path)
    }

    /// Returns the path of the underlying file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn staging_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".compact");
        PathBuf::from(name)
    }
}

impl StorageBackend for FileBackend {
    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        let offset = self.size;
        if data.is_empty() {
            return Ok(offset);
        }

        let mut file = self.file.lock();
        file.seek(SeekFrom::End(0))?;
        file.write_all(data)?;
        self.size += data.len() as u64;
        Ok(offset)
    }

    fn read_all(&self) -> StorageResult<Vec<u8>> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(0))?;
        let mut buffer = Vec::with_capacity(self.size as usize);
        file.read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    fn flush(&mut self) -> StorageResult<()> {
        self.file.lock().flush()?;
        Ok(())
    }

    fn sync(&mut self) -> StorageResult<()> {
        let mut file = self.file.lock();
        file.flush()?;
        file.sync_all()?;
        Ok(())
    }

    fn size(&self) -> StorageResult<u64> {
        Ok(self.size)
    }

    fn truncate(&mut self, len: u64) -> StorageResult<()> {
        if len > self.size {
            return Err(StorageError::TruncateBeyondEnd {
                requested: len,
                size: self.size,
            });
        }

        let file = self.file.lock();
        file.set_len(len)?;
        file.sync_all()?;
        self.size = len;
        Ok(())
    }

    /// Writes `data` to a sibling staging file and renames it over the
    /// journal, so a crash leaves either the old or the new file.
    fn replace(&mut self, data: &[u8]) -> StorageResult<()> {
        let staging = self.staging_path();
        {
            let mut file = File::create(&staging)?;
            file.write_all(data)?;
            file.sync_all()?;
        }
        std::fs::rename(&staging, &self.path)?;

        let file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        *self.file.get_mut() = file;
        self.size = data.len() as u64;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn append_and_read_back() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::open(&dir.path().join("journal")).unwrap();

        assert_eq!(backend.append(b"abc").unwrap(), 0);
        assert_eq!(backend.append(b"def").unwrap(), 3);
        assert_eq!(backend.read_all().unwrap(), b"abcdef");
    }

    #[test]
    fn reopen_keeps_data() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("journal");

        {
            let mut backend = FileBackend::open(&path).unwrap();
            backend.append(b"durable").unwrap();
            backend.sync().unwrap();
        }

        let backend = FileBackend::open(&path).unwrap();
        assert_eq!(backend.size().unwrap(), 7);
        assert_eq!(backend.read_all().unwrap(), b"durable");
    }

    #[test]
    fn truncate_and_append() {
        let dir = tempdir().unwrap();
        let mut backend = FileBackend::open(&dir.path().join("journal")).unwrap();
        backend.append(b"hello world").unwrap();

        backend.truncate(5).unwrap();
        assert_eq!(backend.append(b"!").unwrap(), 5);
        assert_eq!(backend.read_all().unwrap(), b"hello!");
    }

    #[test]
    fn replace_swaps_contents() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("journal");
        let mut backend = FileBackend::open(&path).unwrap();
        backend.append(b"old frames").unwrap();

        backend.replace(b"snap").unwrap();
        assert_eq!(backend.size().unwrap(), 4);
        assert_eq!(backend.append(b"+1").unwrap(), 4);
        backend.sync().unwrap();
        drop(backend);

        let reopened = FileBackend::open(&path).unwrap();
        assert_eq!(reopened.read_all().unwrap(), b"snap+1");
        assert!(!dir.path().join("journal.compact").exists());
    }

    #[test]
    fn create_dirs() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("deeper").join("journal");
        let backend = FileBackend::open_with_create_dirs(&path).unwrap();
        assert_eq!(backend.path(), path.as_path());
        assert!(path.exists());
    }
}
