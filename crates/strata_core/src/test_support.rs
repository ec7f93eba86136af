//! Entities and fixtures shared by the unit tests.

use crate::entity::{Capabilities, Entity, EntityMeta};
use crate::error::StoreResult;
use crate::store::Store;
use crate::transaction::TransactionManager;
use std::sync::Arc;
use strata_codec::{FieldAccess, FieldMap, Value};
use strata_storage::InMemoryBackend;

pub(crate) fn transactions() -> Arc<TransactionManager> {
    let store = Store::open(Box::new(InMemoryBackend::new()), false).unwrap();
    Arc::new(TransactionManager::new(Arc::new(store)))
}

/// Declares every capability.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Doc {
    pub(crate) meta: EntityMeta,
    pub(crate) title: String,
    pub(crate) owner: Option<String>,
    pub(crate) embedding: Option<Vec<f32>>,
}

impl Doc {
    pub(crate) fn new(title: &str) -> Self {
        Self {
            meta: EntityMeta::new(),
            title: title.to_string(),
            owner: None,
            embedding: None,
        }
    }

    pub(crate) fn with_embedding(title: &str, embedding: Vec<f32>) -> Self {
        Self {
            embedding: Some(embedding),
            ..Self::new(title)
        }
    }

    pub(crate) fn owned_by(mut self, owner: &str) -> Self {
        self.owner = Some(owner.to_string());
        self
    }
}

impl Entity for Doc {
    const ENTITY_TYPE: &'static str = "doc";

    fn capabilities() -> Capabilities {
        Capabilities::EMBEDDABLE
            | Capabilities::VERSIONABLE
            | Capabilities::EDGEABLE
            | Capabilities::OWNABLE
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
        if let Some(owner) = &self.owner {
            fields.insert("owner".into(), Value::from(owner.as_str()));
        }
        fields
    }

    fn from_fields(meta: EntityMeta, fields: &FieldMap) -> StoreResult<Self> {
        Ok(Self {
            meta,
            title: fields.text("title")?,
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
        Some(self.title.clone())
    }

    fn owner_id(&self) -> Option<&str> {
        self.owner.as_deref()
    }
}

/// Declares no capability.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Plain {
    pub(crate) meta: EntityMeta,
    pub(crate) name: String,
}

impl Plain {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            meta: EntityMeta::new(),
            name: name.to_string(),
        }
    }
}

impl Entity for Plain {
    const ENTITY_TYPE: &'static str = "plain";

    fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    fn meta_mut(&mut self) -> &mut EntityMeta {
        &mut self.meta
    }

    fn to_fields(&self) -> FieldMap {
        FieldMap::from([("name".to_string(), Value::from(self.name.as_str()))])
    }

    fn from_fields(meta: EntityMeta, fields: &FieldMap) -> StoreResult<Self> {
        Ok(Self {
            meta,
            name: fields.text("name")?,
        })
    }
}
