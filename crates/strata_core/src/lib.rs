//! # Strata Core
//!
//! Local persistence for structured entities.
//!
//! This crate provides:
//! - A journaled store with atomic transactions spanning several collections
//! - Per-type persistence adapters, resolved once per repository
//! - Repositories running an ordered pipeline of lifecycle hooks
//! - Version history written in the same transaction as the entity
//! - Typed edges between entities with short path traversal
//! - Brute-force semantic search over stored embeddings
//!
//! ```rust
//! use strata_core::{Database, Entity, EntityMeta, StoreResult};
//! use strata_codec::{FieldAccess, FieldMap, Value};
//!
//! #[derive(Debug, Clone)]
//! struct Note {
//!     meta: EntityMeta,
//!     body: String,
//! }
//!
//! impl Entity for Note {
//!     const ENTITY_TYPE: &'static str = "note";
//!
//!     fn meta(&self) -> &EntityMeta {
//!         &self.meta
//!     }
//!
//!     fn meta_mut(&mut self) -> &mut EntityMeta {
//!         &mut self.meta
//!     }
//!
//!     fn to_fields(&self) -> FieldMap {
//!         FieldMap::from([("body".to_string(), Value::from(self.body.as_str()))])
//!     }
//!
//!     fn from_fields(meta: EntityMeta, fields: &FieldMap) -> StoreResult<Self> {
//!         Ok(Note { meta, body: fields.text("body")? })
//!     }
//! }
//!
//! let db = Database::open_in_memory()?;
//! let notes = db.repository::<Note>().build();
//!
//! let saved = notes
//!     .save(Note { meta: EntityMeta::new(), body: "hello".into() })?
//!     .into_result()?;
//! assert_eq!(notes.get_by_uuid(saved.uuid())?.body, "hello");
//! # Ok::<(), strata_core::StoreError>(())
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
mod config;
mod database;
mod edge;
mod entity;
mod error;
mod handler;
mod repository;
mod search;
mod store;
mod transaction;
mod types;
mod version;

#[cfg(test)]
mod test_support;

pub use adapter::{AdapterFactory, PersistenceAdapter, StoreAdapter};
pub use config::{BackendConfig, Config};
pub use database::Database;
pub use edge::{
    ConnectOptions, Direction, EdgeRecord, EdgeStore, EntityRef, EDGES_COLLECTION,
    MAX_TRAVERSAL_HOPS,
};
pub use entity::{Capabilities, Entity, EntityMeta, SyncStatus, UuidGenerator};
pub use error::{StoreError, StoreResult};
pub use handler::{EntityHandler, HookFailure, HookPhase, Outcome, SaveEvent, SaveOptions};
pub use repository::{BatchFailure, BatchReport, EntityRepository, RepositoryBuilder};
pub use search::{
    cosine_similarity, rank_by_similarity, rank_with, EmbeddingService, SearchHit,
    SIMILARITY_TOLERANCE,
};
pub use store::{RowSource, Store, StoredRow};
pub use transaction::{TransactionContext, TransactionManager};
pub use types::{SequenceNumber, Timestamp, TransactionId};
pub use version::{VersionRecord, VersionStore, VersioningHandler, VERSIONS_COLLECTION};
