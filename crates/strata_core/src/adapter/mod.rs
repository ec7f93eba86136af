//! Per-entity-type storage drivers.
//!
//! [`PersistenceAdapter`] is the contract a backend implements for one
//! entity type. Every write has two forms:
//!
//! - `save(..)`, `delete(..)`, ... open and commit their own single-collection
//!   transaction
//! - `save_in(ctx, ..)`, `delete_in(ctx, ..)`, ... run on a caller's
//!   [`TransactionContext`] and never open one
//!
//! Standalone reads see committed state; `_in` reads also see the
//! context's pending writes.

mod factory;
mod store_adapter;

pub use factory::AdapterFactory;
pub use store_adapter::StoreAdapter;

use crate::entity::{Capabilities, Entity, SyncStatus};
use crate::error::{StoreError, StoreResult};
use crate::search::{cosine_similarity, rank_by_similarity, rank_with, SearchHit};
use crate::transaction::{TransactionContext, TransactionManager};
use uuid::Uuid;

/// Storage operations for one entity type.
pub trait PersistenceAdapter<T: Entity>: Send + Sync {
    /// Collection the entities live in.
    fn collection(&self) -> &str;

    /// Transaction manager standalone writes run through.
    fn transactions(&self) -> &TransactionManager;

    /// Finds an entity by internal id in committed state.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored row cannot be decoded.
    fn find_by_id(&self, id: u64) -> StoreResult<Option<T>>;

    /// Finds an entity by uuid in committed state.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored row cannot be decoded.
    fn find_by_uuid(&self, uuid: Uuid) -> StoreResult<Option<T>>;

    /// Returns all committed entities in internal id order.
    ///
    /// # Errors
    ///
    /// Returns an error if a stored row cannot be decoded.
    fn find_all(&self) -> StoreResult<Vec<T>>;

    /// Number of committed entities.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot count.
    fn count(&self) -> StoreResult<usize>;

    /// Finds an entity by internal id, including pending writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be decoded or the collection is
    /// not in the context's scope.
    fn find_by_id_in(&self, ctx: &TransactionContext<'_>, id: u64) -> StoreResult<Option<T>>;

    /// Finds an entity by uuid, including pending writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the row cannot be decoded or the collection is
    /// not in the context's scope.
    fn find_by_uuid_in(&self, ctx: &TransactionContext<'_>, uuid: Uuid)
        -> StoreResult<Option<T>>;

    /// Returns all entities, including pending writes.
    ///
    /// # Errors
    ///
    /// Returns an error if a row cannot be decoded or the collection is not
    /// in the context's scope.
    fn find_all_in(&self, ctx: &TransactionContext<'_>) -> StoreResult<Vec<T>>;

    /// Number of entities, including pending writes.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection is not in the context's scope.
    fn count_in(&self, ctx: &TransactionContext<'_>) -> StoreResult<usize>;

    /// Inserts or updates `entity` and returns it with its internal id set.
    ///
    /// With `touch`, `updated_at` is set to now (never before
    /// `created_at`). An entity without internal id whose uuid is already
    /// stored updates that row.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if the entity's internal id holds a
    /// different uuid.
    fn save_in(&self, ctx: &mut TransactionContext<'_>, entity: T, touch: bool) -> StoreResult<T>;

    /// Deletes by internal id. Returns false if nothing was there.
    ///
    /// # Errors
    ///
    /// Returns an error if the collection is not in the context's scope.
    fn delete_in(&self, ctx: &mut TransactionContext<'_>, id: u64) -> StoreResult<bool>;

    /// Like [`find_by_id`](Self::find_by_id) but absent is an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if there is no such entity.
    fn get_by_id(&self, id: u64) -> StoreResult<T> {
        self.find_by_id(id)?
            .ok_or_else(|| StoreError::not_found(T::ENTITY_TYPE, id))
    }

    /// Like [`find_by_uuid`](Self::find_by_uuid) but absent is an error.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if there is no such entity.
    fn get_by_uuid(&self, uuid: Uuid) -> StoreResult<T> {
        self.find_by_uuid(uuid)?
            .ok_or_else(|| StoreError::not_found(T::ENTITY_TYPE, uuid))
    }

    /// Committed entities not yet marked [`SyncStatus::Synced`].
    ///
    /// # Errors
    ///
    /// Returns an error if a stored row cannot be decoded.
    fn find_unsynced(&self) -> StoreResult<Vec<T>> {
        Ok(unsynced(self.find_all()?))
    }

    /// Entities not yet marked [`SyncStatus::Synced`], including pending
    /// writes.
    ///
    /// # Errors
    ///
    /// Returns an error if a row cannot be decoded or the collection is not
    /// in the context's scope.
    fn find_unsynced_in(&self, ctx: &TransactionContext<'_>) -> StoreResult<Vec<T>> {
        Ok(unsynced(self.find_all_in(ctx)?))
    }

    /// Committed entities owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnsupportedOperation`] if `T` is not ownable.
    fn find_by_owner(&self, owner: &str) -> StoreResult<Vec<T>> {
        require::<T>(Capabilities::OWNABLE, "find_by_owner")?;
        Ok(owned_by(self.find_all()?, owner))
    }

    /// Entities owned by `owner`, including pending writes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnsupportedOperation`] if `T` is not ownable.
    fn find_by_owner_in(&self, ctx: &TransactionContext<'_>, owner: &str) -> StoreResult<Vec<T>> {
        require::<T>(Capabilities::OWNABLE, "find_by_owner")?;
        Ok(owned_by(self.find_all_in(ctx)?, owner))
    }

    /// Saves one entity in its own transaction.
    ///
    /// # Errors
    ///
    /// See [`save_in`](Self::save_in).
    fn save(&self, entity: T, touch: bool) -> StoreResult<T> {
        self.transactions()
            .run(&[self.collection()], |ctx| self.save_in(ctx, entity, touch))
    }

    /// Saves several entities in one transaction: all or none.
    ///
    /// # Errors
    ///
    /// Returns the first failure; nothing is saved in that case.
    fn save_all(&self, entities: Vec<T>, touch: bool) -> StoreResult<Vec<T>> {
        self.transactions()
            .run(&[self.collection()], |ctx| self.save_all_in(ctx, entities, touch))
    }

    /// Saves several entities on an open context.
    ///
    /// # Errors
    ///
    /// Returns the first failure; the caller's transaction then rolls back.
    fn save_all_in(
        &self,
        ctx: &mut TransactionContext<'_>,
        entities: Vec<T>,
        touch: bool,
    ) -> StoreResult<Vec<T>> {
        entities
            .into_iter()
            .map(|entity| self.save_in(ctx, entity, touch))
            .collect()
    }

    /// Deletes by internal id in its own transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails to commit.
    fn delete(&self, id: u64) -> StoreResult<bool> {
        self.transactions()
            .run(&[self.collection()], |ctx| self.delete_in(ctx, id))
    }

    /// Deletes by uuid in its own transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails to commit.
    fn delete_by_uuid(&self, uuid: Uuid) -> StoreResult<bool> {
        self.transactions()
            .run(&[self.collection()], |ctx| self.delete_by_uuid_in(ctx, uuid))
    }

    /// Deletes by uuid on an open context.
    ///
    /// # Errors
    ///
    /// Returns an error if a row cannot be decoded or the collection is not
    /// in the context's scope.
    fn delete_by_uuid_in(&self, ctx: &mut TransactionContext<'_>, uuid: Uuid) -> StoreResult<bool> {
        match self.find_by_uuid_in(ctx, uuid)?.and_then(|e| e.meta().id()) {
            Some(id) => self.delete_in(ctx, id),
            None => Ok(false),
        }
    }

    /// Deletes every entity in its own transaction. Returns how many.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails to commit.
    fn delete_all(&self) -> StoreResult<usize> {
        self.transactions()
            .run(&[self.collection()], |ctx| self.delete_all_in(ctx))
    }

    /// Deletes every entity on an open context. Returns how many.
    ///
    /// # Errors
    ///
    /// Returns an error if a row cannot be decoded or the collection is not
    /// in the context's scope.
    fn delete_all_in(&self, ctx: &mut TransactionContext<'_>) -> StoreResult<usize> {
        let ids: Vec<u64> = self
            .find_all_in(ctx)?
            .iter()
            .filter_map(|e| e.meta().id())
            .collect();
        let mut removed = 0;
        for id in ids {
            if self.delete_in(ctx, id)? {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Committed entities most similar to `query`, best first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnsupportedOperation`] if `T` is not
    /// embeddable.
    fn semantic_search(
        &self,
        query: &[f32],
        limit: usize,
        min_similarity: f32,
    ) -> StoreResult<Vec<SearchHit<T>>> {
        self.semantic_search_scored(query, limit, min_similarity, &cosine_similarity)
    }

    /// Like [`semantic_search`](Self::semantic_search), scoring with
    /// `similarity` instead of plain cosine similarity.
    ///
    /// Repositories with an [`EmbeddingService`](crate::EmbeddingService)
    /// search through here with the service's own similarity. An adapter
    /// answering from an index overrides this method.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnsupportedOperation`] if `T` is not
    /// embeddable.
    fn semantic_search_scored(
        &self,
        query: &[f32],
        limit: usize,
        min_similarity: f32,
        similarity: &dyn Fn(&[f32], &[f32]) -> f32,
    ) -> StoreResult<Vec<SearchHit<T>>> {
        require::<T>(Capabilities::EMBEDDABLE, "semantic_search")?;
        Ok(rank_with(query, self.find_all()?, limit, min_similarity, similarity))
    }

    /// Entities most similar to `query`, including pending writes.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnsupportedOperation`] if `T` is not
    /// embeddable.
    fn semantic_search_in(
        &self,
        ctx: &TransactionContext<'_>,
        query: &[f32],
        limit: usize,
        min_similarity: f32,
    ) -> StoreResult<Vec<SearchHit<T>>> {
        require::<T>(Capabilities::EMBEDDABLE, "semantic_search")?;
        Ok(rank_by_similarity(
            query,
            self.find_all_in(ctx)?,
            limit,
            min_similarity,
        ))
    }
}

/// Fails with [`StoreError::UnsupportedOperation`] unless `T` declares `cap`.
pub(crate) fn require<T: Entity>(cap: Capabilities, operation: &str) -> StoreResult<()> {
    if T::capabilities().contains(cap) {
        Ok(())
    } else {
        Err(StoreError::unsupported(format!(
            "{operation} needs {cap}, but {} is {}",
            T::ENTITY_TYPE,
            T::capabilities()
        )))
    }
}

fn unsynced<T: Entity>(entities: Vec<T>) -> Vec<T> {
    entities
        .into_iter()
        .filter(|e| e.meta().sync_status != SyncStatus::Synced)
        .collect()
}

fn owned_by<T: Entity>(entities: Vec<T>, owner: &str) -> Vec<T> {
    entities
        .into_iter()
        .filter(|e| e.owner_id() == Some(owner))
        .collect()
}
