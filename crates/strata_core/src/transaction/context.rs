//! The handle a transaction body works through.

use crate::error::{StoreError, StoreResult};
use crate::store::{RowSource, Store, StoredRow};
use crate::transaction::state::{PendingWrite, WriteSet};
use crate::types::TransactionId;
use std::collections::BTreeSet;
use std::marker::PhantomData;
use uuid::Uuid;

/// An open write transaction.
///
/// Obtained only inside [`TransactionManager::run`](crate::TransactionManager::run).
/// Reads see this transaction's own writes over committed state; writes stay
/// private until the body returns `Ok`.
///
/// Every call names a collection, and only the collections in the
/// transaction's scope may be touched. The context is neither `Send` nor
/// `Sync`: it lives and dies on the thread that runs the body.
pub struct TransactionContext<'a> {
    id: TransactionId,
    scope: BTreeSet<String>,
    store: &'a Store,
    writes: WriteSet,
    _not_send: PhantomData<*const ()>,
}

impl<'a> TransactionContext<'a> {
    pub(crate) fn new(id: TransactionId, scope: BTreeSet<String>, store: &'a Store) -> Self {
        Self {
            id,
            scope,
            store,
            writes: WriteSet::default(),
            _not_send: PhantomData,
        }
    }

    /// Returns the transaction ID.
    #[must_use]
    pub fn id(&self) -> TransactionId {
        self.id
    }

    /// Returns the collections this transaction may touch.
    pub fn scope(&self) -> impl Iterator<Item = &str> {
        self.scope.iter().map(String::as_str)
    }

    /// Returns true if `collection` is in scope.
    #[must_use]
    pub fn covers(&self, collection: &str) -> bool {
        self.scope.contains(collection)
    }

    /// Returns the number of pending writes.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.len()
    }

    /// Inserts a new row and returns its internal id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if a row with `uuid` already exists,
    /// or [`StoreError::InvalidOperation`] if `collection` is out of scope.
    pub fn insert(&mut self, collection: &str, uuid: Uuid, payload: Vec<u8>) -> StoreResult<u64> {
        self.ensure_scope(collection)?;
        if let Some(id) = self.lookup_uuid(collection, uuid)? {
            return Err(StoreError::conflict(
                collection,
                format!("uuid {uuid} already stored at id {id}"),
            ));
        }
        let id = self
            .writes
            .allocate_id(collection, self.store.next_id(collection));
        self.writes.put(collection, id, uuid, payload);
        Ok(id)
    }

    /// Replaces the payload of an existing row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if there is no row at `id`,
    /// [`StoreError::Conflict`] if that row carries a different uuid, or
    /// [`StoreError::InvalidOperation`] if `collection` is out of scope.
    pub fn update(
        &mut self,
        collection: &str,
        id: u64,
        uuid: Uuid,
        payload: Vec<u8>,
    ) -> StoreResult<()> {
        let current = self
            .row(collection, id)?
            .ok_or_else(|| StoreError::not_found(collection, id))?;
        if current.uuid != uuid {
            return Err(StoreError::conflict(
                collection,
                format!("id {id} belongs to {}, not {uuid}", current.uuid),
            ));
        }
        self.writes.put(collection, id, uuid, payload);
        Ok(())
    }

    /// Deletes the row at `id`. Returns false if there was none.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidOperation`] if `collection` is out of scope.
    pub fn delete(&mut self, collection: &str, id: u64) -> StoreResult<bool> {
        match self.row(collection, id)? {
            Some(current) => {
                self.writes.delete(collection, id, current.uuid);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn ensure_scope(&self, collection: &str) -> StoreResult<()> {
        if self.scope.contains(collection) {
            Ok(())
        } else {
            Err(StoreError::invalid_operation(format!(
                "collection '{collection}' is outside the scope of {}",
                self.id
            )))
        }
    }

    fn lookup_uuid(&self, collection: &str, uuid: Uuid) -> StoreResult<Option<u64>> {
        match self.writes.uuid_lookup(collection, uuid) {
            Some(overlay) => Ok(overlay),
            None => Ok(self.store.row_by_uuid(collection, uuid)?.map(|row| row.id)),
        }
    }

    pub(crate) fn into_writes(self) -> WriteSet {
        self.writes
    }
}

impl RowSource for TransactionContext<'_> {
    fn row(&self, collection: &str, id: u64) -> StoreResult<Option<StoredRow>> {
        self.ensure_scope(collection)?;
        match self.writes.get(collection, id) {
            Some(PendingWrite::Put { uuid, payload }) => Ok(Some(StoredRow {
                id,
                uuid: *uuid,
                payload: payload.clone(),
            })),
            Some(PendingWrite::Delete { .. }) => Ok(None),
            None => self.store.row(collection, id),
        }
    }

    fn row_by_uuid(&self, collection: &str, uuid: Uuid) -> StoreResult<Option<StoredRow>> {
        self.ensure_scope(collection)?;
        match self.lookup_uuid(collection, uuid)? {
            Some(id) => self.row(collection, id),
            None => Ok(None),
        }
    }

    fn rows(&self, collection: &str) -> StoreResult<Vec<StoredRow>> {
        self.ensure_scope(collection)?;
        let committed = self.store.rows(collection)?;
        Ok(self.writes.overlay(collection, committed))
    }

    fn row_count(&self, collection: &str) -> StoreResult<usize> {
        Ok(self.rows(collection)?.len())
    }
}

impl std::fmt::Debug for TransactionContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionContext")
            .field("id", &self.id)
            .field("scope", &self.scope)
            .field("writes", &self.writes.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_storage::InMemoryBackend;

    fn store() -> Store {
        Store::open(Box::new(InMemoryBackend::new()), false).unwrap()
    }

    fn scope(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|n| (*n).to_string()).collect()
    }

    #[test]
    fn reads_see_own_writes() {
        let store = store();
        let mut ctx = TransactionContext::new(TransactionId::new(1), scope(&["task"]), &store);
        let uuid = Uuid::new_v4();

        let id = ctx.insert("task", uuid, b"a".to_vec()).unwrap();
        assert_eq!(id, 1);
        assert_eq!(ctx.row_by_uuid("task", uuid).unwrap().unwrap().payload, b"a");
        assert_eq!(ctx.row_count("task").unwrap(), 1);
        assert_eq!(store.row_count("task").unwrap(), 0);
    }

    #[test]
    fn out_of_scope_is_rejected() {
        let store = store();
        let mut ctx = TransactionContext::new(TransactionId::new(1), scope(&["task"]), &store);

        let err = ctx.insert("note", Uuid::new_v4(), vec![]).unwrap_err();
        assert!(matches!(err, StoreError::InvalidOperation { .. }));
        assert!(ctx.rows("note").is_err());
    }

    #[test]
    fn duplicate_uuid_conflicts() {
        let store = store();
        let mut ctx = TransactionContext::new(TransactionId::new(1), scope(&["task"]), &store);
        let uuid = Uuid::new_v4();

        ctx.insert("task", uuid, vec![]).unwrap();
        assert!(ctx.insert("task", uuid, vec![]).unwrap_err().is_conflict());
    }

    #[test]
    fn update_checks_row_identity() {
        let store = store();
        let mut ctx = TransactionContext::new(TransactionId::new(1), scope(&["task"]), &store);
        let uuid = Uuid::new_v4();
        let id = ctx.insert("task", uuid, vec![1]).unwrap();

        assert!(ctx
            .update("task", id, Uuid::new_v4(), vec![2])
            .unwrap_err()
            .is_conflict());
        assert!(ctx.update("task", 99, uuid, vec![2]).unwrap_err().is_not_found());
        ctx.update("task", id, uuid, vec![3]).unwrap();
        assert_eq!(ctx.row("task", id).unwrap().unwrap().payload, vec![3]);
    }

    #[test]
    fn delete_then_reinsert_same_uuid() {
        let store = store();
        let mut ctx = TransactionContext::new(TransactionId::new(1), scope(&["task"]), &store);
        let uuid = Uuid::new_v4();
        let first = ctx.insert("task", uuid, vec![]).unwrap();

        assert!(ctx.delete("task", first).unwrap());
        assert!(!ctx.delete("task", first).unwrap());
        let second = ctx.insert("task", uuid, vec![]).unwrap();
        assert_ne!(first, second);
        assert_eq!(ctx.row_by_uuid("task", uuid).unwrap().unwrap().id, second);
    }
}
