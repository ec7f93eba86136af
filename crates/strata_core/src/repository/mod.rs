//! The repository façade: adapter, handler chain and search in one place.
//!
//! A save runs as:
//!
//! 1. embedding generation (embeddable types with a service), outside any
//!    transaction
//! 2. open a transaction over the repository's scope
//! 3. load the last persisted state
//! 4. `before_save` hooks, fail-fast
//! 5. adapter write
//! 6. commit
//! 7. `after_save` hooks, best-effort
//!
//! Deletes follow the same shape with the delete hooks.

mod builder;

pub use builder::RepositoryBuilder;

use crate::adapter::{require, PersistenceAdapter};
use crate::entity::{Capabilities, Entity};
use crate::error::{StoreError, StoreResult};
use crate::handler::{HandlerChain, Outcome, SaveEvent, SaveOptions};
use crate::search::{EmbeddingService, SearchHit};
use crate::transaction::TransactionContext;
use crate::version::{VersionRecord, VersionStore};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};
use uuid::Uuid;

/// An entity that failed inside [`EntityRepository::save_all`].
#[derive(Debug)]
pub struct BatchFailure {
    /// Position in the input.
    pub index: usize,
    /// The entity's uuid.
    pub uuid: Uuid,
    /// Why it was not saved.
    pub error: StoreError,
}

/// Result of [`EntityRepository::save_all`].
#[derive(Debug)]
pub struct BatchReport<T> {
    /// Entities that committed, in input order.
    pub saved: Vec<Outcome<T>>,
    /// Entities that did not, in input order.
    pub failed: Vec<BatchFailure>,
}

impl<T> BatchReport<T> {
    /// Returns true if every entity committed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Indices of the entities that failed.
    #[must_use]
    pub fn failed_indices(&self) -> Vec<usize> {
        self.failed.iter().map(|f| f.index).collect()
    }
}

/// Entry point for reading and writing entities of type `T`.
///
/// Built with [`RepositoryBuilder`], usually through
/// [`Database::repository`](crate::Database::repository).
pub struct EntityRepository<T: Entity> {
    adapter: Arc<dyn PersistenceAdapter<T>>,
    handlers: HandlerChain<T>,
    embedder: Option<Arc<dyn EmbeddingService>>,
    versions: Option<Arc<VersionStore>>,
    scope: Vec<String>,
    search_limit: usize,
    min_similarity: f32,
}

impl<T: Entity> EntityRepository<T> {
    /// Starts a builder over `adapter`.
    pub fn builder(adapter: Arc<dyn PersistenceAdapter<T>>) -> RepositoryBuilder<T> {
        RepositoryBuilder::new(adapter)
    }

    /// The adapter entities are stored through.
    #[must_use]
    pub fn adapter(&self) -> &Arc<dyn PersistenceAdapter<T>> {
        &self.adapter
    }

    /// Collections every transaction of this repository spans.
    #[must_use]
    pub fn scope(&self) -> &[String] {
        &self.scope
    }

    /// Names of the installed handlers, in run order.
    #[must_use]
    pub fn handler_names(&self) -> Vec<&str> {
        self.handlers.names()
    }

    /// Whether saves record version history.
    #[must_use]
    pub fn is_versioned(&self) -> bool {
        self.versions.is_some()
    }

    /// Whether saves generate embeddings.
    #[must_use]
    pub fn has_embedder(&self) -> bool {
        self.embedder.is_some()
    }

    /// Saves `entity` with default options.
    ///
    /// # Errors
    ///
    /// Returns the first `before_save` failure unchanged, or the adapter's
    /// error. Nothing is written in either case.
    pub fn save(&self, entity: T) -> StoreResult<Outcome<T>> {
        self.save_with(entity, &SaveOptions::default())
    }

    /// Saves `entity`.
    ///
    /// The returned [`Outcome`] carries the committed entity and any
    /// `after_save` failures.
    ///
    /// # Errors
    ///
    /// Returns an embedding failure before anything is opened, the first
    /// `before_save` failure unchanged, or the adapter's error.
    pub fn save_with(&self, entity: T, options: &SaveOptions) -> StoreResult<Outcome<T>> {
        let entity = self.prepare(entity)?;
        let saved = self.run(|ctx| self.save_in(ctx, entity, options))?;
        debug!(
            entity_type = T::ENTITY_TYPE,
            uuid = %saved.uuid(),
            id = ?saved.meta().id(),
            "entity saved"
        );
        let failures = self.handlers.after_save(&saved);
        Ok(Outcome::new(saved, failures))
    }

    /// Saves each entity in its own transaction.
    ///
    /// A failure only affects its own entity; the rest are still saved.
    pub fn save_all(&self, entities: Vec<T>) -> BatchReport<T> {
        self.save_all_with(entities, &SaveOptions::default())
    }

    /// Like [`save_all`](Self::save_all) with explicit options.
    pub fn save_all_with(&self, entities: Vec<T>, options: &SaveOptions) -> BatchReport<T> {
        let mut report = BatchReport {
            saved: Vec::with_capacity(entities.len()),
            failed: Vec::new(),
        };
        for (index, entity) in entities.into_iter().enumerate() {
            let uuid = entity.uuid();
            match self.save_with(entity, options) {
                Ok(outcome) => report.saved.push(outcome),
                Err(error) => {
                    warn!(entity_type = T::ENTITY_TYPE, index, %uuid, %error, "batch entry failed");
                    report.failed.push(BatchFailure { index, uuid, error });
                }
            }
        }
        report
    }

    /// Saves every entity in one transaction: all or none.
    ///
    /// Embeddings are generated for the whole batch first. `after_save`
    /// hooks run once the single commit succeeded.
    ///
    /// # Errors
    ///
    /// Returns the first failure; nothing in the batch is written.
    pub fn save_all_atomic(&self, entities: Vec<T>) -> StoreResult<Vec<Outcome<T>>> {
        let options = SaveOptions::default();
        let prepared = entities
            .into_iter()
            .map(|entity| self.prepare(entity))
            .collect::<StoreResult<Vec<T>>>()?;

        let saved = self.run(|ctx| {
            prepared
                .into_iter()
                .map(|entity| self.save_in(ctx, entity, &options))
                .collect::<StoreResult<Vec<T>>>()
        })?;
        debug!(entity_type = T::ENTITY_TYPE, count = saved.len(), "batch saved");

        Ok(saved
            .into_iter()
            .map(|entity| {
                let failures = self.handlers.after_save(&entity);
                Outcome::new(entity, failures)
            })
            .collect())
    }

    /// Deletes by internal id.
    ///
    /// The returned [`Outcome`] holds the entity as it was before deletion.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if there is no such entity, or the
    /// first `before_delete` failure unchanged.
    pub fn delete(&self, id: u64) -> StoreResult<Outcome<T>> {
        self.delete_found(|ctx| {
            self.adapter
                .find_by_id_in(ctx, id)?
                .ok_or_else(|| StoreError::not_found(T::ENTITY_TYPE, id))
        })
    }

    /// Deletes by uuid.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if there is no such entity, or the
    /// first `before_delete` failure unchanged.
    pub fn delete_by_uuid(&self, uuid: Uuid) -> StoreResult<Outcome<T>> {
        self.delete_found(|ctx| {
            self.adapter
                .find_by_uuid_in(ctx, uuid)?
                .ok_or_else(|| StoreError::not_found(T::ENTITY_TYPE, uuid))
        })
    }

    /// Finds by internal id.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored row cannot be decoded.
    pub fn find_by_id(&self, id: u64) -> StoreResult<Option<T>> {
        self.adapter.find_by_id(id)
    }

    /// Finds by uuid.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored row cannot be decoded.
    pub fn find_by_uuid(&self, uuid: Uuid) -> StoreResult<Option<T>> {
        self.adapter.find_by_uuid(uuid)
    }

    /// Gets by internal id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if there is no such entity.
    pub fn get_by_id(&self, id: u64) -> StoreResult<T> {
        self.adapter.get_by_id(id)
    }

    /// Gets by uuid.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if there is no such entity.
    pub fn get_by_uuid(&self, uuid: Uuid) -> StoreResult<T> {
        self.adapter.get_by_uuid(uuid)
    }

    /// All entities in internal id order.
    ///
    /// # Errors
    ///
    /// Returns an error if a stored row cannot be decoded.
    pub fn find_all(&self) -> StoreResult<Vec<T>> {
        self.adapter.find_all()
    }

    /// Number of entities.
    ///
    /// # Errors
    ///
    /// Returns an error if the adapter cannot count.
    pub fn count(&self) -> StoreResult<usize> {
        self.adapter.count()
    }

    /// Entities not yet synced.
    ///
    /// # Errors
    ///
    /// Returns an error if a stored row cannot be decoded.
    pub fn find_unsynced(&self) -> StoreResult<Vec<T>> {
        self.adapter.find_unsynced()
    }

    /// Entities owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnsupportedOperation`] if `T` is not ownable.
    pub fn find_by_owner(&self, owner: &str) -> StoreResult<Vec<T>> {
        self.adapter.find_by_owner(owner)
    }

    /// Version history of the entity with `uuid`, oldest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnsupportedOperation`] if `T` is not
    /// versionable or versioning is off for this repository.
    pub fn history(&self, uuid: Uuid) -> StoreResult<Vec<VersionRecord>> {
        require::<T>(Capabilities::VERSIONABLE, "history")?;
        let versions = self.versions.as_ref().ok_or_else(|| {
            StoreError::unsupported(format!(
                "history of {} needs versioning enabled on the repository",
                T::ENTITY_TYPE
            ))
        })?;
        versions.history(T::ENTITY_TYPE, uuid)
    }

    /// Entities most similar to `text`.
    ///
    /// The query embedding is generated before the store is read.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnsupportedOperation`] if `T` is not
    /// embeddable or the repository has no embedding service.
    pub fn semantic_search(
        &self,
        text: &str,
        limit: usize,
        min_similarity: f32,
    ) -> StoreResult<Vec<SearchHit<T>>> {
        require::<T>(Capabilities::EMBEDDABLE, "semantic_search")?;
        let embedder = self.embedder.as_ref().ok_or_else(|| {
            StoreError::unsupported(format!(
                "text search on {} needs an embedding service",
                T::ENTITY_TYPE
            ))
        })?;
        let query = embedder.generate(text)?;
        self.semantic_search_vector(&query, limit, min_similarity)
    }

    /// Entities most similar to an existing query vector.
    ///
    /// Scores with the embedding service's
    /// [`cosine_similarity`](EmbeddingService::cosine_similarity) when the
    /// repository has one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnsupportedOperation`] if `T` is not
    /// embeddable.
    pub fn semantic_search_vector(
        &self,
        query: &[f32],
        limit: usize,
        min_similarity: f32,
    ) -> StoreResult<Vec<SearchHit<T>>> {
        match &self.embedder {
            Some(embedder) => self.adapter.semantic_search_scored(
                query,
                limit,
                min_similarity,
                &|a, b| embedder.cosine_similarity(a, b),
            ),
            None => self.adapter.semantic_search(query, limit, min_similarity),
        }
    }

    /// [`semantic_search`](Self::semantic_search) with the configured
    /// defaults.
    ///
    /// # Errors
    ///
    /// See [`semantic_search`](Self::semantic_search).
    pub fn search(&self, text: &str) -> StoreResult<Vec<SearchHit<T>>> {
        self.semantic_search(text, self.search_limit, self.min_similarity)
    }

    fn run<R, F>(&self, body: F) -> StoreResult<R>
    where
        F: FnOnce(&mut TransactionContext<'_>) -> StoreResult<R>,
    {
        self.adapter.transactions().run(self.scope.as_slice(), body)
    }

    /// Fills in the embedding. Runs before any transaction opens.
    fn prepare(&self, mut entity: T) -> StoreResult<T> {
        let Some(embedder) = &self.embedder else {
            return Ok(entity);
        };
        if let Some(text) = entity.embedding_text().filter(|t| !t.is_empty()) {
            let embedding = embedder.generate(&text).inspect_err(|err| {
                warn!(entity_type = T::ENTITY_TYPE, error = %err, "embedding generation failed");
            })?;
            entity.set_embedding(embedding);
        }
        Ok(entity)
    }

    fn save_in(
        &self,
        ctx: &mut TransactionContext<'_>,
        mut entity: T,
        options: &SaveOptions,
    ) -> StoreResult<T> {
        let previous = self.adapter.find_by_uuid_in(ctx, entity.uuid())?;
        let mut event = SaveEvent {
            entity: &mut entity,
            previous: previous.as_ref(),
            options,
        };
        self.handlers.before_save(ctx, &mut event)?;
        self.adapter.save_in(ctx, entity, options.touch)
    }

    fn delete_found<F>(&self, lookup: F) -> StoreResult<Outcome<T>>
    where
        F: FnOnce(&TransactionContext<'_>) -> StoreResult<T>,
    {
        let deleted = self.run(|ctx| {
            let entity = lookup(ctx)?;
            self.handlers.before_delete(ctx, &entity)?;
            if let Some(id) = entity.meta().id() {
                self.adapter.delete_in(ctx, id)?;
            }
            Ok(entity)
        })?;
        debug!(entity_type = T::ENTITY_TYPE, uuid = %deleted.uuid(), "entity deleted");
        let failures = self.handlers.after_delete(&deleted);
        Ok(Outcome::new(deleted, failures))
    }
}

impl<T: Entity> fmt::Debug for EntityRepository<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityRepository")
            .field("entity_type", &T::ENTITY_TYPE)
            .field("handlers", &self.handlers.names())
            .field("scope", &self.scope)
            .field("embedder", &self.embedder.is_some())
            .finish_non_exhaustive()
    }
}
