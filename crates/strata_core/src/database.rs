//! Database facade.

use crate::adapter::{AdapterFactory, PersistenceAdapter};
use crate::config::{BackendConfig, Config};
use crate::edge::EdgeStore;
use crate::entity::Entity;
use crate::error::StoreResult;
use crate::repository::RepositoryBuilder;
use crate::store::Store;
use crate::transaction::{TransactionContext, TransactionManager};
use crate::types::SequenceNumber;
use crate::version::VersionStore;
use std::sync::Arc;
use strata_storage::{FileBackend, InMemoryBackend, StorageBackend};
use tracing::info;

/// The main database handle.
///
/// `Database` owns the store and hands out everything built on it:
/// - transactions spanning any set of collections
/// - one adapter per entity type, overridable with
///   [`register_adapter`](Self::register_adapter)
/// - repositories, with versioning and search defaults taken from the
///   [`Config`]
/// - the version and edge stores
///
/// # Example
///
/// ```rust
/// use strata_core::{Config, Database};
///
/// let db = Database::open(Config::default())?;
/// db.transaction(&["notes"], |_ctx| Ok(()))?;
/// assert!(db.collections().is_empty());
/// # Ok::<(), strata_core::StoreError>(())
/// ```
pub struct Database {
    /// Configuration.
    config: Config,
    /// Transaction manager; owns the store.
    transactions: Arc<TransactionManager>,
    /// Per-type adapter resolution.
    adapters: AdapterFactory,
    /// Version history.
    versions: Arc<VersionStore>,
    /// Edges.
    edges: EdgeStore,
}

impl Database {
    /// Opens a database with the backend named in `config`.
    ///
    /// A file backend is created along with its parent directories if
    /// missing, and its journal is replayed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened or the journal is
    /// corrupt.
    pub fn open(config: Config) -> StoreResult<Self> {
        let backend: Box<dyn StorageBackend> = match config.backend.clone().resolve() {
            BackendConfig::Memory => Box::new(InMemoryBackend::new()),
            BackendConfig::File(path) | BackendConfig::Auto(path) => {
                Box::new(FileBackend::open_with_create_dirs(&path)?)
            }
        };
        Self::open_with_backend(config, backend)
    }

    /// Opens an empty in-memory database with default settings.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the signature matches [`open`](Self::open).
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::open(Config::default())
    }

    /// Opens a database over an existing backend, ignoring
    /// `config.backend`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend's journal is corrupt.
    pub fn open_with_backend(
        config: Config,
        backend: Box<dyn StorageBackend>,
    ) -> StoreResult<Self> {
        let store = Arc::new(Store::open(backend, config.sync_on_commit)?);
        let transactions = Arc::new(TransactionManager::new(Arc::clone(&store)));

        info!(
            backend = ?config.backend,
            collections = store.collections().len(),
            sequence = %store.sequence(),
            "database opened"
        );

        Ok(Self {
            adapters: AdapterFactory::new(Arc::clone(&transactions)),
            versions: Arc::new(VersionStore::new(Arc::clone(&transactions))),
            edges: EdgeStore::new(Arc::clone(&transactions)),
            transactions,
            config,
        })
    }

    /// Returns the configuration the database was opened with.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns the underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<Store> {
        self.transactions.store()
    }

    /// Returns the transaction manager.
    #[must_use]
    pub fn transactions(&self) -> &Arc<TransactionManager> {
        &self.transactions
    }

    /// Runs `body` in one transaction over `scope`.
    ///
    /// See [`TransactionManager::run`].
    ///
    /// # Errors
    ///
    /// Returns the body's error unchanged after rolling back, or the commit
    /// error.
    pub fn transaction<S, F, R>(&self, scope: &[S], body: F) -> StoreResult<R>
    where
        S: AsRef<str>,
        F: FnOnce(&mut TransactionContext<'_>) -> StoreResult<R>,
    {
        self.transactions.run(scope, body)
    }

    /// Returns the adapter factory.
    #[must_use]
    pub fn adapters(&self) -> &AdapterFactory {
        &self.adapters
    }

    /// Returns the adapter for `T`.
    #[must_use]
    pub fn adapter<T: Entity>(&self) -> Arc<dyn PersistenceAdapter<T>> {
        self.adapters.adapter::<T>()
    }

    /// Uses `adapter` for `T` in repositories built from now on.
    pub fn register_adapter<T: Entity>(&self, adapter: Arc<dyn PersistenceAdapter<T>>) {
        self.adapters.register(adapter);
    }

    /// Starts a repository for `T`.
    ///
    /// The builder is prefilled with the type's adapter, version history
    /// (used only if `T` is versionable) and the configured search
    /// defaults.
    pub fn repository<T: Entity>(&self) -> RepositoryBuilder<T> {
        RepositoryBuilder::new(self.adapter::<T>())
            .versioning(Arc::clone(&self.versions))
            .version_snapshots(self.config.version_snapshots)
            .default_actor(self.config.default_actor.clone())
            .search_defaults(self.config.search_limit, self.config.min_similarity)
    }

    /// Returns the version store.
    #[must_use]
    pub fn versions(&self) -> &Arc<VersionStore> {
        &self.versions
    }

    /// Returns the edge store.
    #[must_use]
    pub fn edges(&self) -> &EdgeStore {
        &self.edges
    }

    /// Collections that have ever held a committed row.
    #[must_use]
    pub fn collections(&self) -> Vec<String> {
        self.store().collections()
    }

    /// Sequence number of the last commit.
    #[must_use]
    pub fn committed_seq(&self) -> SequenceNumber {
        self.transactions.committed_seq()
    }

    /// Compacts the journal into a single snapshot.
    ///
    /// # Errors
    ///
    /// Returns an error if called inside a transaction or the snapshot
    /// cannot be written.
    pub fn checkpoint(&self) -> StoreResult<()> {
        self.transactions.checkpoint()
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("config", &self.config)
            .field("committed_seq", &self.committed_seq())
            .finish_non_exhaustive()
    }
}
