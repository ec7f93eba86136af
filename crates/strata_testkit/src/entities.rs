//! Sample entities.
//!
//! - [`Task`]: versionable and edgeable
//! - [`Note`]: embeddable and ownable
//! - [`Tag`]: no capabilities

use strata_codec::{FieldAccess, FieldMap, Value};
use strata_core::{Capabilities, Entity, EntityMeta, StoreResult};

/// A to-do item with version history and edges.
#[derive(Debug, Clone)]
pub struct Task {
    /// Base attributes.
    pub meta: EntityMeta,
    /// Title.
    pub title: String,
    /// Whether the task is done.
    pub done: bool,
    /// Optional priority.
    pub priority: Option<i64>,
}

impl Task {
    /// Creates an open task.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            meta: EntityMeta::new(),
            title: title.into(),
            done: false,
            priority: None,
        }
    }
}

impl Entity for Task {
    const ENTITY_TYPE: &'static str = "task";

    fn capabilities() -> Capabilities {
        Capabilities::VERSIONABLE | Capabilities::EDGEABLE
    }

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn to_fields(&self) -> FieldMap {
        let mut fields = FieldMap::new();
        fields.insert("title".into(), Value::from(self.title.as_str()));
        fields.insert("done".into(), Value::from(self.done));
        if let Some(priority) = self.priority {
            fields.insert("priority".into(), Value::from(priority));
        }
        fields
    }

    fn from_fields(meta: EntityMeta, fields: &FieldMap) -> StoreResult<Self> {
        Ok(Self {
            meta,
            title: fields.text("title")?,
            done: fields.boolean("done")?,
            priority: fields.opt_integer("priority")?,
        })
    }
}

/// A free-text note with an embedding and an owner.
#[derive(Debug, Clone)]
pub struct Note {
    /// Base attributes.
    pub meta: EntityMeta,
    /// Body text; the embedding is generated from it.
    pub body: String,
    /// Owning user.
    pub owner: Option<String>,
    /// Stored embedding.
    pub embedding: Option<Vec<f32>>,
}

impl Note {
    /// Creates an unowned note without embedding.
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            meta: EntityMeta::new(),
            body: body.into(),
            owner: None,
            embedding: None,
        }
    }

    /// Sets the owner.
    #[must_use]
    pub fn owned_by(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    /// Sets the embedding directly.
    #[must_use]
    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

impl Entity for Note {
    const ENTITY_TYPE: &'static str = "note";

    fn capabilities() -> Capabilities {
        Capabilities::EMBEDDABLE | Capabilities::OWNABLE
    }

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn to_fields(&self) -> FieldMap {
        let mut fields = FieldMap::new();
        fields.insert("body".into(), Value::from(self.body.as_str()));
        if let Some(owner) = &self.owner {
            fields.insert("owner".into(), Value::from(owner.as_str()));
        }
        fields
    }

    fn from_fields(meta: EntityMeta, fields: &FieldMap) -> StoreResult<Self> {
        Ok(Self {
            meta,
            body: fields.text("body")?,
            owner: fields.opt_text("owner")?,
            embedding: None,
        })
    }

    fn embedding(&self) -> Option<&[f32]> {
        self.embedding.as_deref()
    }

    fn set_embedding(&mut self, embedding: Vec<f32>) {
        self.embedding = Some(embedding);
    }

    fn embedding_text(&self) -> Option<String> {
        Some(self.body.clone())
    }

    fn owner_id(&self) -> Option<&str> {
        self.owner.as_deref()
    }
}

/// A label with no optional behaviour.
#[derive(Debug, Clone)]
pub struct Tag {
    /// Base attributes.
    pub meta: EntityMeta,
    /// Label text.
    pub label: String,
}

impl Tag {
    /// Creates a tag.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            meta: EntityMeta::new(),
            label: label.into(),
        }
    }
}

impl Entity for Tag {
    const ENTITY_TYPE: &'static str = "tag";

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn to_fields(&self) -> FieldMap {
        FieldMap::from([("label".to_string(), Value::from(self.label.as_str()))])
    }

    fn from_fields(meta: EntityMeta, fields: &FieldMap) -> StoreResult<Self> {
        Ok(Self {
            meta,
            label: fields.text("label")?,
        })
    }
}
