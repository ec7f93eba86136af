//! The adapter backed by the built-in store engine.

use crate::adapter::PersistenceAdapter;
use crate::entity::{Entity, EntityMeta};
use crate::error::{StoreError, StoreResult};
use crate::store::{RowSource, Store, StoredRow};
use crate::transaction::{TransactionContext, TransactionManager};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;
use strata_codec::FieldMap;
use uuid::Uuid;

/// Row payload layout: base attributes, domain fields, embedding.
#[derive(Serialize)]
struct StoredEntityRef<'a> {
    meta: &'a EntityMeta,
    fields: FieldMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    embedding: Option<&'a [f32]>,
}

#[derive(Deserialize)]
struct StoredEntity {
    meta: EntityMeta,
    fields: FieldMap,
    #[serde(default)]
    embedding: Option<Vec<f32>>,
}

pub(crate) fn encode_entity<T: Entity>(entity: &T) -> StoreResult<Vec<u8>> {
    let stored = StoredEntityRef {
        meta: entity.meta(),
        fields: entity.to_fields(),
        embedding: entity.embedding(),
    };
    Ok(strata_codec::to_cbor(&stored)?)
}

pub(crate) fn decode_entity<T: Entity>(row: StoredRow) -> StoreResult<T> {
    let stored: StoredEntity = strata_codec::from_cbor(&row.payload)?;
    let mut meta = stored.meta;
    meta.assign_id(row.id);
    let mut entity = T::from_fields(meta, &stored.fields)?;
    if let Some(embedding) = stored.embedding {
        entity.set_embedding(embedding);
    }
    Ok(entity)
}

/// [`PersistenceAdapter`] over the database's own store.
///
/// Entities of type `T` live in the collection named `T::ENTITY_TYPE`.
pub struct StoreAdapter<T: Entity> {
    collection: String,
    transactions: Arc<TransactionManager>,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> StoreAdapter<T> {
    /// Creates an adapter for `T`.
    pub fn new(transactions: Arc<TransactionManager>) -> Self {
        Self {
            collection: T::ENTITY_TYPE.to_string(),
            transactions,
            _marker: PhantomData,
        }
    }

    fn committed(&self) -> &Store {
        self.transactions.store()
    }

    fn find_by_id_from(&self, source: &dyn RowSource, id: u64) -> StoreResult<Option<T>> {
        source
            .row(&self.collection, id)?
            .map(decode_entity)
            .transpose()
    }

    fn find_by_uuid_from(&self, source: &dyn RowSource, uuid: Uuid) -> StoreResult<Option<T>> {
        source
            .row_by_uuid(&self.collection, uuid)?
            .map(decode_entity)
            .transpose()
    }

    fn find_all_from(&self, source: &dyn RowSource) -> StoreResult<Vec<T>> {
        source
            .rows(&self.collection)?
            .into_iter()
            .map(decode_entity)
            .collect()
    }

    /// Internal id the entity should be written at, if it already exists.
    fn existing_id(&self, ctx: &TransactionContext<'_>, entity: &T) -> StoreResult<Option<u64>> {
        let uuid = entity.uuid();
        if let Some(id) = entity.meta().id() {
            if let Some(row) = ctx.row(&self.collection, id)? {
                if row.uuid != uuid {
                    return Err(StoreError::conflict(
                        T::ENTITY_TYPE,
                        format!("internal id {id} belongs to {}, not {uuid}", row.uuid),
                    ));
                }
                return Ok(Some(id));
            }
        }
        Ok(ctx.row_by_uuid(&self.collection, uuid)?.map(|row| row.id))
    }
}

impl<T: Entity> PersistenceAdapter<T> for StoreAdapter<T> {
    fn collection(&self) -> &str {
        &self.collection
    }

    fn transactions(&self) -> &TransactionManager {
        &self.transactions
    }

    fn find_by_id(&self, id: u64) -> StoreResult<Option<T>> {
        self.find_by_id_from(self.committed(), id)
    }

    fn find_by_uuid(&self, uuid: Uuid) -> StoreResult<Option<T>> {
        self.find_by_uuid_from(self.committed(), uuid)
    }

    fn find_all(&self) -> StoreResult<Vec<T>> {
        self.find_all_from(self.committed())
    }

    fn count(&self) -> StoreResult<usize> {
        self.committed().row_count(&self.collection)
    }

    fn find_by_id_in(&self, ctx: &TransactionContext<'_>, id: u64) -> StoreResult<Option<T>> {
        self.find_by_id_from(ctx, id)
    }

    fn find_by_uuid_in(
        &self,
        ctx: &TransactionContext<'_>,
        uuid: Uuid,
    ) -> StoreResult<Option<T>> {
        self.find_by_uuid_from(ctx, uuid)
    }

    fn find_all_in(&self, ctx: &TransactionContext<'_>) -> StoreResult<Vec<T>> {
        self.find_all_from(ctx)
    }

    fn count_in(&self, ctx: &TransactionContext<'_>) -> StoreResult<usize> {
        ctx.row_count(&self.collection)
    }

    fn save_in(
        &self,
        ctx: &mut TransactionContext<'_>,
        mut entity: T,
        touch: bool,
    ) -> StoreResult<T> {
        let existing = self.existing_id(ctx, &entity)?;
        if touch {
            entity.meta_mut().touch();
        }
        let uuid = entity.uuid();
        let payload = encode_entity(&entity)?;

        let id = match existing {
            Some(id) => {
                ctx.update(&self.collection, id, uuid, payload)?;
                id
            }
            None => ctx.insert(&self.collection, uuid, payload)?,
        };
        entity.meta_mut().assign_id(id);
        Ok(entity)
    }

    fn delete_in(&self, ctx: &mut TransactionContext<'_>, id: u64) -> StoreResult<bool> {
        ctx.delete(&self.collection, id)
    }
}

impl<T: Entity> fmt::Debug for StoreAdapter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreAdapter")
            .field("collection", &self.collection)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::SyncStatus;
    use crate::test_support::{transactions, Doc, Plain};
    use crate::types::Timestamp;

    fn adapter() -> StoreAdapter<Doc> {
        StoreAdapter::new(transactions())
    }

    #[test]
    fn save_assigns_id_and_round_trips() {
        let adapter = adapter();
        let doc = Doc::with_embedding("hello", vec![0.5, 0.5]).owned_by("ana");

        let saved = adapter.save(doc.clone(), true).unwrap();
        assert_eq!(saved.meta().id(), Some(1));

        let found = adapter.find_by_uuid(doc.uuid()).unwrap().unwrap();
        assert_eq!(found.title, "hello");
        assert_eq!(found.embedding.as_deref(), Some(&[0.5, 0.5][..]));
        assert_eq!(found.owner.as_deref(), Some("ana"));
        assert_eq!(found.meta().id(), Some(1));
        assert!(found.meta().updated_at() >= found.meta().created_at());
    }

    #[test]
    fn save_without_id_adopts_existing_row() {
        let adapter = adapter();
        let doc = Doc::new("v1");
        adapter.save(doc.clone(), true).unwrap();

        let mut copy = doc.clone();
        copy.title = "v2".into();
        let saved = adapter.save(copy, true).unwrap();

        assert_eq!(saved.meta().id(), Some(1));
        assert_eq!(adapter.count().unwrap(), 1);
        assert_eq!(adapter.get_by_id(1).unwrap().title, "v2");
    }

    #[test]
    fn id_pointing_at_other_uuid_conflicts() {
        let adapter = adapter();
        adapter.save(Doc::new("first"), true).unwrap();

        let mut impostor = Doc::new("second");
        impostor.meta.assign_id(1);
        assert!(adapter.save(impostor, true).unwrap_err().is_conflict());
        assert_eq!(adapter.count().unwrap(), 1);
    }

    #[test]
    fn touch_flag_controls_updated_at() {
        let adapter = adapter();
        let past = Timestamp::from_millis(1_000);
        let mut doc = Doc::new("old");
        doc.meta = doc.meta.clone().with_timestamps(past, past);

        let untouched = adapter.save(doc.clone(), false).unwrap();
        assert_eq!(untouched.meta().updated_at(), past);

        let touched = adapter.save(untouched, true).unwrap();
        assert!(touched.meta().updated_at() > past);
        assert_eq!(touched.meta().created_at(), past);
    }

    #[test]
    fn get_signals_not_found() {
        let adapter = adapter();
        assert!(adapter.find_by_id(7).unwrap().is_none());
        assert!(adapter.get_by_id(7).unwrap_err().is_not_found());
        assert!(adapter.get_by_uuid(Uuid::new_v4()).unwrap_err().is_not_found());
    }

    #[test]
    fn deletes() {
        let adapter = adapter();
        let a = adapter.save(Doc::new("a"), true).unwrap();
        let b = adapter.save(Doc::new("b"), true).unwrap();
        adapter.save(Doc::new("c"), true).unwrap();

        assert!(adapter.delete(a.meta().id().unwrap()).unwrap());
        assert!(!adapter.delete(a.meta().id().unwrap()).unwrap());
        assert!(adapter.delete_by_uuid(b.uuid()).unwrap());
        assert_eq!(adapter.delete_all().unwrap(), 1);
        assert_eq!(adapter.count().unwrap(), 0);
    }

    #[test]
    fn save_all_is_all_or_nothing() {
        let adapter = adapter();
        adapter.save(Doc::new("existing"), true).unwrap();

        let mut impostor = Doc::new("bad");
        impostor.meta.assign_id(1);
        let result = adapter.save_all(vec![Doc::new("ok"), impostor], true);

        assert!(result.is_err());
        assert_eq!(adapter.count().unwrap(), 1);
    }

    #[test]
    fn unsynced_and_owner_filters() {
        let adapter = adapter();
        let mut synced = Doc::new("synced").owned_by("ana");
        synced.meta.sync_status = SyncStatus::Synced;
        adapter.save(synced, true).unwrap();
        adapter.save(Doc::new("local").owned_by("bo"), true).unwrap();

        let unsynced = adapter.find_unsynced().unwrap();
        assert_eq!(unsynced.len(), 1);
        assert_eq!(unsynced[0].title, "local");

        let owned = adapter.find_by_owner("ana").unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].title, "synced");
    }

    #[test]
    fn plain_types_reject_capability_operations() {
        let adapter: StoreAdapter<Plain> = StoreAdapter::new(transactions());
        assert!(adapter
            .semantic_search(&[1.0], 5, 0.0)
            .unwrap_err()
            .is_unsupported());
        assert!(adapter.find_by_owner("ana").unwrap_err().is_unsupported());
    }

    #[test]
    fn in_transaction_reads_see_pending_save() {
        let adapter = adapter();
        let doc = Doc::new("pending");

        adapter
            .transactions()
            .run(&["doc"], |ctx| {
                adapter.save_in(ctx, doc.clone(), true)?;
                assert!(adapter.find_by_uuid_in(ctx, doc.uuid())?.is_some());
                assert_eq!(adapter.count_in(ctx)?, 1);
                assert!(adapter.find_by_uuid(doc.uuid())?.is_none());
                Ok(())
            })
            .unwrap();
    }
}
