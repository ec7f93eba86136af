//! Store engine: committed rows per collection plus the commit journal.
//!
//! Every collection maps an internal id to a `(uuid, payload)` row and keeps
//! a uuid index beside it. Entity types use their type name as collection;
//! version records and edges live in the reserved `_versions` and `_edges`
//! collections.
//!
//! ## Invariants
//!
//! - A commit reaches the journal before it becomes visible to readers
//! - Readers see whole commits or nothing
//! - Internal ids are never reused, even after deletion or restart

mod journal;
mod table;

pub use table::StoredRow;

pub(crate) use journal::{JournalWrite, WriteOp};

use crate::error::StoreResult;
use crate::types::SequenceNumber;
use journal::{Journal, JournalRecord, TableImage};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use strata_storage::StorageBackend;
use table::Table;
use tracing::{debug, info};
use uuid::Uuid;

/// Read access to rows, either committed or through an open transaction.
///
/// [`Store`] answers with committed state only. A
/// [`TransactionContext`](crate::TransactionContext) layers its own pending
/// writes on top. Adapters, the version store and the edge store read through
/// this trait so one lookup routine serves both views.
pub trait RowSource {
    /// Returns the row with internal id `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection may not be read from this source.
    fn row(&self, collection: &str, id: u64) -> StoreResult<Option<StoredRow>>;

    /// Returns the row with universal identifier `uuid`.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection may not be read from this source.
    fn row_by_uuid(&self, collection: &str, uuid: Uuid) -> StoreResult<Option<StoredRow>>;

    /// Returns every row in ascending id order.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection may not be read from this source.
    fn rows(&self, collection: &str) -> StoreResult<Vec<StoredRow>>;

    /// Returns the number of rows.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection may not be read from this source.
    fn row_count(&self, collection: &str) -> StoreResult<usize>;
}

/// Writes of one transaction, ready to be committed.
#[derive(Debug, Default)]
pub(crate) struct CommitBatch {
    pub(crate) writes: Vec<JournalWrite>,
    pub(crate) next_ids: Vec<(String, u64)>,
}

impl CommitBatch {
    pub(crate) fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }
}

/// The committed state of a database and the journal that makes it durable.
pub struct Store {
    tables: RwLock<HashMap<String, Table>>,
    journal: Mutex<Journal>,
    sequence: AtomicU64,
}

impl Store {
    /// Opens a store over `backend`, replaying its journal.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ChecksumMismatch`](crate::StoreError::ChecksumMismatch)
    /// or [`StoreError::JournalCorruption`](crate::StoreError::JournalCorruption)
    /// if the journal is damaged, or a storage error if it cannot be read.
    pub fn open(backend: Box<dyn StorageBackend>, sync_on_commit: bool) -> StoreResult<Self> {
        let mut journal = Journal::new(backend, sync_on_commit);
        let records = journal.recover()?;

        let mut tables = HashMap::new();
        let mut sequence = SequenceNumber::new(0);
        for record in records {
            sequence = apply_record(&mut tables, record);
        }

        info!(
            collections = tables.len(),
            sequence = sequence.as_u64(),
            "store opened"
        );

        Ok(Self {
            tables: RwLock::new(tables),
            journal: Mutex::new(journal),
            sequence: AtomicU64::new(sequence.as_u64()),
        })
    }

    /// Returns the sequence number of the latest commit.
    #[must_use]
    pub fn sequence(&self) -> SequenceNumber {
        SequenceNumber::new(self.sequence.load(Ordering::Acquire))
    }

    /// Returns the names of all collections that have ever held a row.
    #[must_use]
    pub fn collections(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tables.read().keys().cloned().collect();
        names.sort();
        names
    }

    /// Returns the current journal size in bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot report its size.
    pub fn journal_size(&self) -> StoreResult<u64> {
        self.journal.lock().size()
    }

    /// Rewrites the journal as a single snapshot of the committed state.
    ///
    /// Must not run concurrently with a commit; callers go through
    /// [`TransactionManager::checkpoint`](crate::TransactionManager::checkpoint).
    pub(crate) fn checkpoint(&self) -> StoreResult<()> {
        let mut journal = self.journal.lock();
        let tables = self.tables.read();
        let sequence = self.sequence();

        let mut images: Vec<TableImage> = tables
            .iter()
            .map(|(name, table)| TableImage {
                name: name.clone(),
                next_id: table.next_id(),
                rows: table
                    .iter()
                    .map(|(id, row)| (id, row.uuid, row.payload.clone()))
                    .collect(),
            })
            .collect();
        images.sort_by(|a, b| a.name.cmp(&b.name));

        journal.rewrite(&JournalRecord::Snapshot {
            sequence,
            tables: images,
        })?;
        info!(sequence = sequence.as_u64(), "checkpoint written");
        Ok(())
    }

    /// Journals `batch` and then makes it visible.
    ///
    /// Callers must hold the writer lock. If the journal append fails the
    /// committed state is left untouched.
    pub(crate) fn commit(&self, batch: CommitBatch) -> StoreResult<SequenceNumber> {
        let mut journal = self.journal.lock();
        let sequence = self.sequence().next();
        let record = JournalRecord::Commit {
            sequence,
            writes: batch.writes,
            next_ids: batch.next_ids,
        };
        journal.append(&record)?;

        let mut tables = self.tables.write();
        apply_record(&mut tables, record);
        self.sequence.store(sequence.as_u64(), Ordering::Release);
        debug!(%sequence, "commit applied");
        Ok(sequence)
    }

    /// Next internal id the collection would hand out.
    pub(crate) fn next_id(&self, collection: &str) -> u64 {
        self.tables
            .read()
            .get(collection)
            .map_or(1, Table::next_id)
    }
}

impl RowSource for Store {
    fn row(&self, collection: &str, id: u64) -> StoreResult<Option<StoredRow>> {
        Ok(self
            .tables
            .read()
            .get(collection)
            .and_then(|table| table.stored(id)))
    }

    fn row_by_uuid(&self, collection: &str, uuid: Uuid) -> StoreResult<Option<StoredRow>> {
        let tables = self.tables.read();
        Ok(tables
            .get(collection)
            .and_then(|table| table.id_of(&uuid).and_then(|id| table.stored(id))))
    }

    fn rows(&self, collection: &str) -> StoreResult<Vec<StoredRow>> {
        Ok(self
            .tables
            .read()
            .get(collection)
            .map(|table| {
                table
                    .iter()
                    .map(|(id, row)| StoredRow {
                        id,
                        uuid: row.uuid,
                        payload: row.payload.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    fn row_count(&self, collection: &str) -> StoreResult<usize> {
        Ok(self.tables.read().get(collection).map_or(0, Table::len))
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("sequence", &self.sequence())
            .field("collections", &self.collections())
            .finish_non_exhaustive()
    }
}

fn apply_record(tables: &mut HashMap<String, Table>, record: JournalRecord) -> SequenceNumber {
    match record {
        JournalRecord::Commit {
            sequence,
            writes,
            next_ids,
        } => {
            for write in writes {
                let table = tables.entry(write.collection).or_default();
                match write.op {
                    WriteOp::Put { uuid, payload } => table.apply_put(write.id, uuid, payload),
                    WriteOp::Delete => table.apply_delete(write.id),
                }
            }
            for (collection, next_id) in next_ids {
                tables.entry(collection).or_default().bump_next_id(next_id);
            }
            sequence
        }
        JournalRecord::Snapshot {
            sequence,
            tables: images,
        } => {
            tables.clear();
            for image in images {
                let mut table = Table::default();
                for (id, uuid, payload) in image.rows {
                    table.apply_put(id, uuid, payload);
                }
                table.bump_next_id(image.next_id);
                tables.insert(image.name, table);
            }
            sequence
        }
    }
}
