//! Transaction manager.

use crate::error::{StoreError, StoreResult};
use crate::store::Store;
use crate::transaction::context::TransactionContext;
use crate::types::{SequenceNumber, TransactionId};
use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tracing::{debug, warn};

/// Runs units of work as atomic transactions.
///
/// ## Single-Writer Guarantee
///
/// Only one write transaction is active at a time. [`run`](Self::run) takes
/// an exclusive lock for the whole body and its commit; other writers block
/// until it is released. Readers going through [`Store`] never see the
/// body's writes before commit.
///
/// ## Nesting
///
/// A body that calls `run` again on the same manager is rejected with
/// [`StoreError::NestedTransaction`] instead of deadlocking. Do the inner
/// work through the context you already hold.
pub struct TransactionManager {
    store: Arc<Store>,
    next_txid: AtomicU64,
    write_lock: Mutex<()>,
    writer: Mutex<Option<ThreadId>>,
}

impl TransactionManager {
    /// Creates a transaction manager over `store`.
    pub fn new(store: Arc<Store>) -> Self {
        Self {
            store,
            next_txid: AtomicU64::new(1),
            write_lock: Mutex::new(()),
            writer: Mutex::new(None),
        }
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Returns the sequence number of the latest commit.
    #[must_use]
    pub fn committed_seq(&self) -> SequenceNumber {
        self.store.sequence()
    }

    /// Returns true if the calling thread is inside a transaction body.
    #[must_use]
    pub fn in_transaction(&self) -> bool {
        *self.writer.lock() == Some(thread::current().id())
    }

    /// Runs `body` inside one transaction spanning `scope`.
    ///
    /// If `body` returns `Ok`, every write it made commits together. If it
    /// returns `Err`, nothing it wrote is kept and the error is returned
    /// unchanged.
    ///
    /// The body must not block on other transactions or hand the context
    /// to another thread.
    ///
    /// # Errors
    ///
    /// Returns the body's error, [`StoreError::NestedTransaction`] when
    /// called from inside a body, or a storage error if the commit cannot
    /// be journaled (in which case nothing is committed).
    ///
    /// # Example
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use strata_core::{Store, TransactionManager};
    /// use strata_storage::InMemoryBackend;
    /// use uuid::Uuid;
    ///
    /// let store = Arc::new(Store::open(Box::new(InMemoryBackend::new()), false).unwrap());
    /// let tm = TransactionManager::new(store);
    ///
    /// let id = tm
    ///     .run(&["task", "_versions"], |ctx| {
    ///         ctx.insert("_versions", Uuid::new_v4(), b"v1".to_vec())?;
    ///         ctx.insert("task", Uuid::new_v4(), b"task".to_vec())
    ///     })
    ///     .unwrap();
    /// assert_eq!(id, 1);
    /// ```
    pub fn run<S, F, R>(&self, scope: &[S], body: F) -> StoreResult<R>
    where
        S: AsRef<str>,
        F: FnOnce(&mut TransactionContext<'_>) -> StoreResult<R>,
    {
        let me = thread::current().id();
        if *self.writer.lock() == Some(me) {
            return Err(StoreError::NestedTransaction);
        }

        let _guard = self.write_lock.lock();
        *self.writer.lock() = Some(me);
        let _owner = WriterReset(&self.writer);

        let txid = TransactionId::new(self.next_txid.fetch_add(1, Ordering::SeqCst));
        let scope: BTreeSet<String> = scope.iter().map(|s| s.as_ref().to_string()).collect();
        debug!(%txid, ?scope, "transaction begin");

        let mut ctx = TransactionContext::new(txid, scope, &self.store);
        match body(&mut ctx) {
            Ok(value) => {
                let batch = ctx.into_writes().into_batch();
                if batch.is_empty() {
                    debug!(%txid, "transaction committed without writes");
                    return Ok(value);
                }
                let writes = batch.writes.len();
                match self.store.commit(batch) {
                    Ok(sequence) => {
                        debug!(%txid, %sequence, writes, "transaction committed");
                        Ok(value)
                    }
                    Err(err) => {
                        warn!(%txid, error = %err, "commit failed, transaction rolled back");
                        Err(err)
                    }
                }
            }
            Err(err) => {
                debug!(%txid, error = %err, writes = ctx.write_count(), "transaction rolled back");
                Err(err)
            }
        }
    }

    /// Rewrites the journal as one snapshot frame.
    ///
    /// Waits for the active writer, if any, to finish first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NestedTransaction`] when called from inside a
    /// body, or a storage error if the journal cannot be rewritten.
    pub fn checkpoint(&self) -> StoreResult<()> {
        if self.in_transaction() {
            return Err(StoreError::NestedTransaction);
        }
        let _guard = self.write_lock.lock();
        self.store.checkpoint()
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("next_txid", &self.next_txid.load(Ordering::Relaxed))
            .field("committed_seq", &self.committed_seq())
            .finish_non_exhaustive()
    }
}

/// Clears the writer slot when a body finishes, including by panic.
struct WriterReset<'a>(&'a Mutex<Option<ThreadId>>);

impl Drop for WriterReset<'_> {
    fn drop(&mut self) {
        *self.0.lock() = None;
    }
}
