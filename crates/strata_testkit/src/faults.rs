//! A storage backend that fails on command.
//!
//! [`FaultyBackend`] wraps an [`InMemoryBackend`]. Clones share both the bytes
//! and the armed faults, so a test can keep one clone to arm faults while the
//! database owns another, and reopen from [`FaultyBackend::memory`] to see
//! exactly what reached storage.

use parking_lot::Mutex;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use strata_storage::{InMemoryBackend, StorageBackend, StorageError, StorageResult};

/// Storage operation a fault can be armed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultPoint {
    /// `append` fails without writing anything.
    Append,
    /// `append` writes the first half of the data, then fails.
    TornAppend,
    /// `flush` fails.
    Flush,
    /// `sync` fails.
    Sync,
    /// `truncate` fails without cutting anything.
    Truncate,
}

#[derive(Debug, Default)]
struct Faults {
    once: Vec<FaultPoint>,
    always: Vec<FaultPoint>,
}

/// An in-memory backend with injectable failures.
#[derive(Debug, Clone, Default)]
pub struct FaultyBackend {
    inner: InMemoryBackend,
    faults: Arc<Mutex<Faults>>,
    tripped: Arc<AtomicUsize>,
}

impl FaultyBackend {
    /// Creates an empty backend with no faults armed.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fails the next call at `point`.
    pub fn fail_next(&self, point: FaultPoint) {
        self.faults.lock().once.push(point);
    }

    /// Fails every call at `point` until [`heal`](Self::heal).
    pub fn fail_always(&self, point: FaultPoint) {
        self.faults.lock().always.push(point);
    }

    /// Disarms every fault.
    pub fn heal(&self) {
        let mut faults = self.faults.lock();
        faults.once.clear();
        faults.always.clear();
    }

    /// Number of injected failures so far.
    #[must_use]
    pub fn tripped(&self) -> usize {
        self.tripped.load(Ordering::SeqCst)
    }

    /// The stored bytes as a plain backend, for reopening without faults.
    #[must_use]
    pub fn memory(&self) -> InMemoryBackend {
        self.inner.clone()
    }

    fn trip(&self, point: FaultPoint) -> bool {
        let mut faults = self.faults.lock();
        let hit = if let Some(at) = faults.once.iter().position(|p| *p == point) {
            faults.once.remove(at);
            true
        } else {
            faults.always.contains(&point)
        };
        if hit {
            self.tripped.fetch_add(1, Ordering::SeqCst);
        }
        hit
    }
}

fn injected(point: FaultPoint) -> StorageError {
    StorageError::Io(io::Error::other(format!("injected {point:?} failure")))
}

impl StorageBackend for FaultyBackend {
    fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
        if self.trip(FaultPoint::TornAppend) {
            self.inner.append(&data[..data.len() / 2])?;
            return Err(injected(FaultPoint::TornAppend));
        }
        if self.trip(FaultPoint::Append) {
            return Err(injected(FaultPoint::Append));
        }
        self.inner.append(data)
    }

    fn read_all(&self) -> StorageResult<Vec<u8>> {
        self.inner.read_all()
    }

    fn flush(&mut self) -> StorageResult<()> {
        if self.trip(FaultPoint::Flush) {
            return Err(injected(FaultPoint::Flush));
        }
        self.inner.flush()
    }

    fn sync(&mut self) -> StorageResult<()> {
        if self.trip(FaultPoint::Sync) {
            return Err(injected(FaultPoint::Sync));
        }
        self.inner.sync()
    }

    fn size(&self) -> StorageResult<u64> {
        self.inner.size()
    }

    fn truncate(&mut self, len: u64) -> StorageResult<()> {
        if self.trip(FaultPoint::Truncate) {
            return Err(injected(FaultPoint::Truncate));
        }
        self.inner.truncate(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_shot_fault_fires_once() {
        let mut backend = FaultyBackend::new();
        backend.fail_next(FaultPoint::Append);

        assert!(backend.append(b"lost").is_err());
        assert_eq!(backend.append(b"kept").unwrap(), 0);
        assert_eq!(backend.tripped(), 1);
        assert_eq!(backend.memory().snapshot(), b"kept");
    }

    #[test]
    fn torn_append_leaves_half() {
        let mut backend = FaultyBackend::new();
        backend.fail_next(FaultPoint::TornAppend);

        assert!(backend.append(b"abcd").is_err());
        assert_eq!(backend.read_all().unwrap(), b"ab");
    }

    #[test]
    fn persistent_fault_until_healed() {
        let mut backend = FaultyBackend::new();
        let handle = backend.clone();
        handle.fail_always(FaultPoint::Sync);

        assert!(backend.sync().is_err());
        assert!(backend.sync().is_err());
        handle.heal();
        backend.sync().unwrap();
        assert_eq!(handle.tripped(), 2);
    }
}
