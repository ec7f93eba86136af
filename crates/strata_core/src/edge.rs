//! Typed, directed edges between any two entities.
//!
//! Edges live in the reserved `_edges` collection, independent of the
//! entities they connect. Deleting an entity leaves its edges in place;
//! [`EdgeStore::remove_edges_for`] cleans them up when the caller asks.

use crate::adapter::require;
use crate::entity::{Capabilities, Entity, UuidGenerator};
use crate::error::{StoreError, StoreResult};
use crate::store::{RowSource, Store};
use crate::transaction::{TransactionContext, TransactionManager};
use crate::types::Timestamp;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use strata_codec::FieldMap;
use tracing::debug;
use uuid::Uuid;

/// Reserved collection holding edges.
pub const EDGES_COLLECTION: &str = "_edges";

/// Longest path [`EdgeStore::traverse`] accepts.
pub const MAX_TRAVERSAL_HOPS: usize = 3;

/// An entity named by type and universal identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityRef {
    /// Entity type name.
    pub entity_type: String,
    /// Universal identifier.
    pub entity_id: Uuid,
}

impl EntityRef {
    /// Creates a reference.
    pub fn new(entity_type: impl Into<String>, entity_id: Uuid) -> Self {
        Self {
            entity_type: entity_type.into(),
            entity_id,
        }
    }

    /// Reference to `entity`.
    pub fn of<T: Entity>(entity: &T) -> Self {
        Self::new(T::ENTITY_TYPE, entity.uuid())
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity_type, self.entity_id)
    }
}

/// Which end of an edge a query starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Edges pointing at the node; yields their sources.
    Incoming,
    /// Edges leaving the node; yields their targets.
    Outgoing,
}

/// A stored edge.
///
/// Serialized with camelCase keys. Identity is the tuple
/// `(sourceType, sourceId, targetType, targetId, edgeType)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRecord {
    /// Source entity type.
    pub source_type: String,
    /// Source entity uuid.
    pub source_id: Uuid,
    /// Target entity type.
    pub target_type: String,
    /// Target entity uuid.
    pub target_id: Uuid,
    /// Relationship kind.
    pub edge_type: String,
    /// Free-form attributes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<FieldMap>,
    /// When the edge was first created.
    pub created_at: Timestamp,
    /// Who created it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl EdgeRecord {
    /// Source end.
    #[must_use]
    pub fn source(&self) -> EntityRef {
        EntityRef::new(self.source_type.clone(), self.source_id)
    }

    /// Target end.
    #[must_use]
    pub fn target(&self) -> EntityRef {
        EntityRef::new(self.target_type.clone(), self.target_id)
    }

    fn starts_at(&self, node: &EntityRef) -> bool {
        self.source_type == node.entity_type && self.source_id == node.entity_id
    }

    fn ends_at(&self, node: &EntityRef) -> bool {
        self.target_type == node.entity_type && self.target_id == node.entity_id
    }

    fn touches(&self, node: &EntityRef) -> bool {
        self.starts_at(node) || self.ends_at(node)
    }
}

/// Optional attributes for a new edge.
#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    /// Metadata stored on the edge.
    pub metadata: Option<FieldMap>,
    /// Creator recorded on the edge.
    pub created_by: Option<String>,
}

impl ConnectOptions {
    /// Sets the metadata.
    #[must_use]
    pub fn metadata(mut self, metadata: FieldMap) -> Self {
        self.metadata = Some(metadata);
        self
    }

    /// Sets the creator.
    #[must_use]
    pub fn created_by(mut self, actor: impl Into<String>) -> Self {
        self.created_by = Some(actor.into());
        self
    }
}

/// Creates, queries and traverses edges.
pub struct EdgeStore {
    transactions: Arc<TransactionManager>,
}

impl EdgeStore {
    /// Creates an edge store.
    pub fn new(transactions: Arc<TransactionManager>) -> Self {
        Self { transactions }
    }

    fn committed(&self) -> &Store {
        self.transactions.store()
    }

    /// Identity of an edge.
    #[must_use]
    pub fn edge_uuid(source: &EntityRef, target: &EntityRef, edge_type: &str) -> Uuid {
        UuidGenerator::derive(&[
            &source.entity_type,
            &source.entity_id.to_string(),
            &target.entity_type,
            &target.entity_id.to_string(),
            edge_type,
        ])
    }

    /// Connects `source` to `target` in its own transaction.
    ///
    /// Connecting an already connected pair with the same `edge_type`
    /// returns the existing edge unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails.
    pub fn connect(
        &self,
        source: &EntityRef,
        target: &EntityRef,
        edge_type: &str,
        options: ConnectOptions,
    ) -> StoreResult<EdgeRecord> {
        self.transactions.run(&[EDGES_COLLECTION], |ctx| {
            self.connect_in(ctx, source, target, edge_type, options)
        })
    }

    /// Connects two entities, checking both types are edgeable.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnsupportedOperation`] if either type lacks the
    /// edgeable capability.
    pub fn connect_entities<A: Entity, B: Entity>(
        &self,
        source: &A,
        target: &B,
        edge_type: &str,
        options: ConnectOptions,
    ) -> StoreResult<EdgeRecord> {
        require::<A>(Capabilities::EDGEABLE, "connect")?;
        require::<B>(Capabilities::EDGEABLE, "connect")?;
        self.connect(
            &EntityRef::of(source),
            &EntityRef::of(target),
            edge_type,
            options,
        )
    }

    /// Connects `source` to `target` through an open transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if `_edges` is not in the context's scope.
    pub fn connect_in(
        &self,
        ctx: &mut TransactionContext<'_>,
        source: &EntityRef,
        target: &EntityRef,
        edge_type: &str,
        options: ConnectOptions,
    ) -> StoreResult<EdgeRecord> {
        if edge_type.is_empty() {
            return Err(StoreError::invalid_operation("edge type must not be empty"));
        }
        let uuid = Self::edge_uuid(source, target, edge_type);
        if let Some(row) = ctx.row_by_uuid(EDGES_COLLECTION, uuid)? {
            debug!(%source, %target, edge_type, "edge already present");
            return Ok(strata_codec::from_cbor(&row.payload)?);
        }

        let edge = EdgeRecord {
            source_type: source.entity_type.clone(),
            source_id: source.entity_id,
            target_type: target.entity_type.clone(),
            target_id: target.entity_id,
            edge_type: edge_type.to_string(),
            metadata: options.metadata,
            created_at: Timestamp::now(),
            created_by: options.created_by,
        };
        ctx.insert(EDGES_COLLECTION, uuid, strata_codec::to_cbor(&edge)?)?;
        debug!(%source, %target, edge_type, "edge created");
        Ok(edge)
    }

    /// Removes one edge. Returns false if it did not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails.
    pub fn disconnect(
        &self,
        source: &EntityRef,
        target: &EntityRef,
        edge_type: &str,
    ) -> StoreResult<bool> {
        self.transactions.run(&[EDGES_COLLECTION], |ctx| {
            self.disconnect_in(ctx, source, target, edge_type)
        })
    }

    /// Removes one edge through an open transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if `_edges` is not in the context's scope.
    pub fn disconnect_in(
        &self,
        ctx: &mut TransactionContext<'_>,
        source: &EntityRef,
        target: &EntityRef,
        edge_type: &str,
    ) -> StoreResult<bool> {
        let uuid = Self::edge_uuid(source, target, edge_type);
        match ctx.row_by_uuid(EDGES_COLLECTION, uuid)? {
            Some(row) => ctx.delete(EDGES_COLLECTION, row.id),
            None => Ok(false),
        }
    }

    /// Edges leaving `source`, optionally of one type.
    ///
    /// # Errors
    ///
    /// Returns an error if a stored edge cannot be decoded.
    pub fn edges_from(
        &self,
        source: &EntityRef,
        edge_type: Option<&str>,
    ) -> StoreResult<Vec<EdgeRecord>> {
        Ok(self
            .all_edges()?
            .into_iter()
            .filter(|e| e.starts_at(source) && type_matches(e, edge_type))
            .collect())
    }

    /// Edges pointing at `target`, optionally of one type.
    ///
    /// # Errors
    ///
    /// Returns an error if a stored edge cannot be decoded.
    pub fn edges_to(
        &self,
        target: &EntityRef,
        edge_type: Option<&str>,
    ) -> StoreResult<Vec<EdgeRecord>> {
        Ok(self
            .all_edges()?
            .into_iter()
            .filter(|e| e.ends_at(target) && type_matches(e, edge_type))
            .collect())
    }

    /// Entities one `edge_type` edge away from `node`.
    ///
    /// [`Direction::Incoming`] yields sources of edges pointing at `node`;
    /// [`Direction::Outgoing`] yields targets of edges leaving it.
    ///
    /// # Errors
    ///
    /// Returns an error if a stored edge cannot be decoded.
    pub fn find_connected(
        &self,
        node: &EntityRef,
        edge_type: &str,
        direction: Direction,
    ) -> StoreResult<Vec<EntityRef>> {
        let edges = match direction {
            Direction::Incoming => self.edges_to(node, Some(edge_type))?,
            Direction::Outgoing => self.edges_from(node, Some(edge_type))?,
        };
        Ok(edges
            .iter()
            .map(|e| match direction {
                Direction::Incoming => e.source(),
                Direction::Outgoing => e.target(),
            })
            .collect())
    }

    /// Follows `path` outward from `start`, one edge type per hop.
    ///
    /// Each hop joins the current set against the edges once and the
    /// targets become the next hop's input. Returns the set reached after
    /// the last hop; an empty path returns `{start}`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::UnsupportedOperation`] for paths longer than
    /// [`MAX_TRAVERSAL_HOPS`].
    pub fn traverse(&self, start: &EntityRef, path: &[&str]) -> StoreResult<BTreeSet<EntityRef>> {
        if path.len() > MAX_TRAVERSAL_HOPS {
            return Err(StoreError::unsupported(format!(
                "traversal of {} hops; at most {MAX_TRAVERSAL_HOPS} are supported",
                path.len()
            )));
        }

        let mut frontier = BTreeSet::from([start.clone()]);
        if path.is_empty() {
            return Ok(frontier);
        }

        let edges = self.all_edges()?;
        for hop in path {
            frontier = edges
                .iter()
                .filter(|e| e.edge_type == *hop && frontier.contains(&e.source()))
                .map(EdgeRecord::target)
                .collect();
            if frontier.is_empty() {
                break;
            }
        }
        Ok(frontier)
    }

    /// Removes every edge touching `node`. Returns how many.
    ///
    /// # Errors
    ///
    /// Returns an error if the transaction fails.
    pub fn remove_edges_for(&self, node: &EntityRef) -> StoreResult<usize> {
        self.transactions
            .run(&[EDGES_COLLECTION], |ctx| self.remove_edges_for_in(ctx, node))
    }

    /// Removes every edge touching `node` through an open transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if `_edges` is not in the context's scope.
    pub fn remove_edges_for_in(
        &self,
        ctx: &mut TransactionContext<'_>,
        node: &EntityRef,
    ) -> StoreResult<usize> {
        let mut doomed = Vec::new();
        for row in ctx.rows(EDGES_COLLECTION)? {
            let edge: EdgeRecord = strata_codec::from_cbor(&row.payload)?;
            if edge.touches(node) {
                doomed.push(row.id);
            }
        }
        for id in &doomed {
            ctx.delete(EDGES_COLLECTION, *id)?;
        }
        debug!(%node, removed = doomed.len(), "edges removed");
        Ok(doomed.len())
    }

    /// Number of committed edges.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot count.
    pub fn count(&self) -> StoreResult<usize> {
        self.committed().row_count(EDGES_COLLECTION)
    }

    fn all_edges(&self) -> StoreResult<Vec<EdgeRecord>> {
        self.committed()
            .rows(EDGES_COLLECTION)?
            .iter()
            .map(|row| Ok(strata_codec::from_cbor(&row.payload)?))
            .collect()
    }
}

impl fmt::Debug for EdgeStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EdgeStore").finish_non_exhaustive()
    }
}

fn type_matches(edge: &EdgeRecord, edge_type: Option<&str>) -> bool {
    edge_type.map_or(true, |t| edge.edge_type == t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{transactions, Doc, Plain};

    fn node(name: &str) -> EntityRef {
        EntityRef::new("doc", UuidGenerator::derive(&[name]))
    }

    fn edges() -> EdgeStore {
        EdgeStore::new(transactions())
    }

    #[test]
    fn connect_is_idempotent() {
        let store = edges();
        let (a, b) = (node("a"), node("b"));

        let first = store
            .connect(&a, &b, "belongs_to", ConnectOptions::default().created_by("ana"))
            .unwrap();
        let second = store
            .connect(&a, &b, "belongs_to", ConnectOptions::default())
            .unwrap();

        assert_eq!(store.count().unwrap(), 1);
        assert_eq!(first, second);
        assert_eq!(second.created_by.as_deref(), Some("ana"));
    }

    #[test]
    fn edge_type_is_part_of_identity() {
        let store = edges();
        let (a, b) = (node("a"), node("b"));
        store.connect(&a, &b, "likes", ConnectOptions::default()).unwrap();
        store.connect(&a, &b, "follows", ConnectOptions::default()).unwrap();
        store.connect(&b, &a, "likes", ConnectOptions::default()).unwrap();

        assert_eq!(store.count().unwrap(), 3);
        assert_eq!(store.edges_from(&a, None).unwrap().len(), 2);
        assert_eq!(store.edges_from(&a, Some("likes")).unwrap().len(), 1);
        assert_eq!(store.edges_to(&a, None).unwrap().len(), 1);
    }

    #[test]
    fn find_connected_by_direction() {
        let store = edges();
        let (a, b, c) = (node("a"), node("b"), node("c"));
        store.connect(&a, &c, "tagged", ConnectOptions::default()).unwrap();
        store.connect(&b, &c, "tagged", ConnectOptions::default()).unwrap();

        let incoming = store.find_connected(&c, "tagged", Direction::Incoming).unwrap();
        assert_eq!(incoming, vec![a.clone(), b]);
        let outgoing = store.find_connected(&a, "tagged", Direction::Outgoing).unwrap();
        assert_eq!(outgoing, vec![c.clone()]);
        assert!(store
            .find_connected(&c, "tagged", Direction::Outgoing)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn traverse_follows_each_hop() {
        let store = edges();
        let (a, b, c, d) = (node("a"), node("b"), node("c"), node("d"));
        store.connect(&a, &b, "next", ConnectOptions::default()).unwrap();
        store.connect(&b, &c, "next", ConnectOptions::default()).unwrap();
        store.connect(&b, &d, "other", ConnectOptions::default()).unwrap();

        assert_eq!(
            store.traverse(&a, &["next", "next"]).unwrap(),
            BTreeSet::from([c])
        );
        assert_eq!(store.traverse(&a, &[]).unwrap(), BTreeSet::from([a.clone()]));
        assert!(store.traverse(&a, &["other"]).unwrap().is_empty());
        assert!(store
            .traverse(&a, &["next", "next", "next", "next"])
            .unwrap_err()
            .is_unsupported());
    }

    #[test]
    fn disconnect_and_cleanup() {
        let store = edges();
        let (a, b, c) = (node("a"), node("b"), node("c"));
        store.connect(&a, &b, "x", ConnectOptions::default()).unwrap();
        store.connect(&c, &a, "y", ConnectOptions::default()).unwrap();
        store.connect(&b, &c, "z", ConnectOptions::default()).unwrap();

        assert!(store.disconnect(&a, &b, "x").unwrap());
        assert!(!store.disconnect(&a, &b, "x").unwrap());
        assert_eq!(store.remove_edges_for(&a).unwrap(), 1);
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn connect_entities_checks_capability() {
        let store = edges();
        let doc = Doc::new("a");
        let plain = Plain::new("p");

        assert!(store
            .connect_entities(&doc, &plain, "x", ConnectOptions::default())
            .unwrap_err()
            .is_unsupported());
        store
            .connect_entities(&doc, &Doc::new("b"), "x", ConnectOptions::default())
            .unwrap();
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn record_shape_is_camel_case() {
        let edge = EdgeRecord {
            source_type: "task".into(),
            source_id: Uuid::nil(),
            target_type: "project".into(),
            target_id: Uuid::nil(),
            edge_type: "belongs_to".into(),
            metadata: None,
            created_at: Timestamp::from_millis(5),
            created_by: None,
        };
        let json = serde_json::to_value(&edge).unwrap();
        let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["createdAt", "edgeType", "sourceId", "sourceType", "targetId", "targetType"]
        );
    }
}
