//! Storage backend trait definition.

use crate::error::StorageResult;

/// An append-only byte store.
///
/// The journal writes one frame per committed transaction with
/// [`append`](StorageBackend::append) and reads everything back with
/// [`read_all`](StorageBackend::read_all) when a store is opened.
///
/// # Invariants
///
/// - `append` returns the offset the data was written at
/// - `read_all` returns every byte appended since the last `truncate` or
///   `replace`
/// - after `sync` returns, appended bytes survive process termination
pub trait StorageBackend: Send + Sync {
    /// Appends `data` and returns the offset it was written at.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying write fails.
    fn append(&mut self, data: &[u8]) -> StorageResult<u64>;

    /// Reads the full contents of the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying read fails.
    fn read_all(&self) -> StorageResult<Vec<u8>>;

    /// Pushes buffered writes to the operating system.
    ///
    /// # Errors
    ///
    /// Returns an error if the flush fails.
    fn flush(&mut self) -> StorageResult<()>;

    /// Makes all appended data and metadata durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the sync fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Returns the current size in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the size cannot be determined.
    fn size(&self) -> StorageResult<u64>;

    /// Cuts the store down to `len` bytes.
    ///
    /// Used to drop a torn trailing frame after recovery and to reset the
    /// journal on checkpoint.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::TruncateBeyondEnd`](crate::StorageError::TruncateBeyondEnd)
    /// if `len` exceeds the current size.
    fn truncate(&mut self, len: u64) -> StorageResult<()>;

    /// Replaces the whole contents with `data` and makes it durable.
    ///
    /// Used to compact the journal on checkpoint. The default truncates and
    /// appends; backends that can swap contents atomically should override
    /// it so a crash leaves either the old or the new contents.
    ///
    /// # Errors
    ///
    /// Returns an error if any step fails. The contents are then unspecified
    /// for the default implementation.
    fn replace(&mut self, data: &[u8]) -> StorageResult<()> {
        self.truncate(0)?;
        self.append(data)?;
        self.flush()?;
        self.sync()
    }
}
