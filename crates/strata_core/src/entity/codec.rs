//! The entity trait.

use crate::entity::{Capabilities, EntityMeta};
use crate::error::StoreResult;
use strata_codec::FieldMap;
use uuid::Uuid;

/// Trait for types that can be stored through a repository.
///
/// Implementors provide:
/// - `ENTITY_TYPE`: the stable type name, also the collection name
/// - `meta()` / `meta_mut()`: the shared base attributes
/// - `to_fields()` / `from_fields()`: an explicit codec for the domain
///   fields (base attributes and embeddings are stored separately)
///
/// Optional capabilities are declared with [`Entity::capabilities`]; the
/// accessor methods matching a capability (`embedding`, `owner_id`, ...)
/// are only consulted when the capability is declared.
///
/// # Example
///
/// ```rust
/// use strata_codec::{FieldAccess, FieldMap, Value};
/// use strata_core::{Capabilities, Entity, EntityMeta, StoreResult};
///
/// #[derive(Debug, Clone)]
/// struct Task {
///     meta: EntityMeta,
///     title: String,
/// }
///
/// impl Entity for Task {
///     const ENTITY_TYPE: &'static str = "task";
///
///     fn capabilities() -> Capabilities {
///         Capabilities::VERSIONABLE
///     }
///
///     fn meta(&self) -> &EntityMeta {
///         &self.meta
///     }
///
///     fn meta_mut(&mut self) -> &mut EntityMeta {
///         &mut self.meta
///     }
///
///     fn to_fields(&self) -> FieldMap {
///         let mut fields = FieldMap::new();
///         fields.insert("title".into(), Value::from(self.title.as_str()));
///         fields
///     }
///
///     fn from_fields(meta: EntityMeta, fields: &FieldMap) -> StoreResult<Self> {
///         Ok(Task { meta, title: fields.text("title")? })
///     }
/// }
/// ```
pub trait Entity: Clone + Send + Sync + 'static {
    /// Stable name of the entity type.
    const ENTITY_TYPE: &'static str;

    /// Optional capabilities of this type.
    fn capabilities() -> Capabilities {
        Capabilities::NONE
    }

    /// Returns the base attributes.
    fn meta(&self) -> &EntityMeta;

    /// Returns the base attributes mutably.
    fn meta_mut(&mut self) -> &mut EntityMeta;

    /// Encodes the domain fields.
    ///
    /// Must be deterministic: equal entities produce equal maps. Version
    /// history diffs these maps.
    fn to_fields(&self) -> FieldMap;

    /// Rebuilds an entity from stored base attributes and domain fields.
    ///
    /// # Errors
    ///
    /// Returns an error if a required field is missing or malformed.
    fn from_fields(meta: EntityMeta, fields: &FieldMap) -> StoreResult<Self>;

    /// Stored embedding vector (embeddable types).
    fn embedding(&self) -> Option<&[f32]> {
        None
    }

    /// Replaces the embedding vector (embeddable types).
    fn set_embedding(&mut self, _embedding: Vec<f32>) {}

    /// Text the embedding is generated from (embeddable types).
    fn embedding_text(&self) -> Option<String> {
        None
    }

    /// Owner identifier (ownable types).
    fn owner_id(&self) -> Option<&str> {
        None
    }

    /// Shorthand for `self.meta().uuid()`.
    fn uuid(&self) -> Uuid {
        self.meta().uuid()
    }
}
