//! Repository construction.

use crate::adapter::PersistenceAdapter;
use crate::entity::{Capabilities, Entity};
use crate::handler::{EntityHandler, HandlerChain};
use crate::repository::EntityRepository;
use crate::search::EmbeddingService;
use crate::version::{VersionStore, VersioningHandler};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Builds an [`EntityRepository`].
///
/// Capabilities are checked here, once: the versioning hook is only
/// installed for versionable types and an embedding service is only kept
/// for embeddable ones.
pub struct RepositoryBuilder<T: Entity> {
    adapter: Arc<dyn PersistenceAdapter<T>>,
    versions: Option<Arc<VersionStore>>,
    version_snapshots: bool,
    default_actor: String,
    handlers: Vec<Arc<dyn EntityHandler<T>>>,
    embedder: Option<Arc<dyn EmbeddingService>>,
    search_limit: usize,
    min_similarity: f32,
}

impl<T: Entity> RepositoryBuilder<T> {
    /// Starts a builder over `adapter` with no handlers.
    pub fn new(adapter: Arc<dyn PersistenceAdapter<T>>) -> Self {
        Self {
            adapter,
            versions: None,
            version_snapshots: false,
            default_actor: "system".to_string(),
            handlers: Vec::new(),
            embedder: None,
            search_limit: 10,
            min_similarity: 0.0,
        }
    }

    /// Appends a handler. Handlers run in the order they are added; the
    /// versioning hook, when installed, runs after all of them.
    #[must_use]
    pub fn handler(mut self, handler: Arc<dyn EntityHandler<T>>) -> Self {
        self.handlers.push(handler);
        self
    }

    /// Sets the embedding service used for saves and text search.
    #[must_use]
    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingService>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Records version history in `versions`.
    #[must_use]
    pub fn versioning(mut self, versions: Arc<VersionStore>) -> Self {
        self.versions = Some(versions);
        self
    }

    /// Stores a full snapshot on every version record.
    #[must_use]
    pub fn version_snapshots(mut self, value: bool) -> Self {
        self.version_snapshots = value;
        self
    }

    /// Actor recorded when a save names none.
    #[must_use]
    pub fn default_actor(mut self, actor: impl Into<String>) -> Self {
        self.default_actor = actor.into();
        self
    }

    /// Turns version history off.
    #[must_use]
    pub fn without_versioning(mut self) -> Self {
        self.versions = None;
        self
    }

    /// Default limit and threshold for [`EntityRepository::search`].
    #[must_use]
    pub fn search_defaults(mut self, limit: usize, min_similarity: f32) -> Self {
        self.search_limit = limit;
        self.min_similarity = min_similarity;
        self
    }

    /// Builds the repository.
    pub fn build(self) -> EntityRepository<T> {
        let capabilities = T::capabilities();

        let mut handlers: Vec<Arc<dyn EntityHandler<T>>> =
            Vec::with_capacity(self.handlers.len() + 1);
        handlers.extend(self.handlers);
        // last, so the record matches what the other hooks leave behind
        let versions = match self.versions {
            Some(versions) if capabilities.contains(Capabilities::VERSIONABLE) => {
                handlers.push(Arc::new(VersioningHandler::<T>::new(
                    Arc::clone(&versions),
                    self.version_snapshots,
                    self.default_actor,
                )));
                Some(versions)
            }
            _ => None,
        };

        let embedder = if capabilities.contains(Capabilities::EMBEDDABLE) {
            self.embedder
        } else {
            if self.embedder.is_some() {
                debug!(
                    entity_type = T::ENTITY_TYPE,
                    "embedding service ignored for non-embeddable type"
                );
            }
            None
        };

        let handlers = HandlerChain::new(handlers);
        let mut scope = BTreeSet::from([self.adapter.collection().to_string()]);
        scope.extend(handlers.collections());

        debug!(
            entity_type = T::ENTITY_TYPE,
            %capabilities,
            handlers = ?handlers.names(),
            scope = ?scope,
            "repository built"
        );

        EntityRepository {
            adapter: self.adapter,
            handlers,
            embedder,
            versions,
            scope: scope.into_iter().collect(),
            search_limit: self.search_limit,
            min_similarity: self.min_similarity,
        }
    }
}
