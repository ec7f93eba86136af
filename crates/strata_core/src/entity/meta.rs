//! Base attributes shared by every entity.

use crate::entity::UuidGenerator;
use crate::types::Timestamp;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Synchronisation state of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    /// Changed locally, not yet sent.
    #[default]
    Local,
    /// Being sent.
    Syncing,
    /// Matches the remote copy.
    Synced,
    /// Local and remote copies diverged.
    Conflict,
}

/// Identity and timestamps common to all entities.
///
/// - `id` is the store-assigned internal identity. It is local to one
///   backend and is never serialized with the entity.
/// - `uuid` is the universal identifier. It is fixed at construction and
///   unique within the entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityMeta {
    #[serde(skip)]
    id: Option<u64>,
    uuid: Uuid,
    created_at: Timestamp,
    updated_at: Timestamp,
    /// Sync-correlation identifier assigned by an external sync layer.
    pub sync_id: Option<String>,
    /// Synchronisation state.
    pub sync_status: SyncStatus,
}

impl EntityMeta {
    /// Creates metadata for a new entity with a random uuid.
    #[must_use]
    pub fn new() -> Self {
        Self::with_uuid(UuidGenerator::generate())
    }

    /// Creates metadata for a new entity with a known uuid, e.g. one
    /// received from another device.
    #[must_use]
    pub fn with_uuid(uuid: Uuid) -> Self {
        let now = Timestamp::now();
        Self {
            id: None,
            uuid,
            created_at: now,
            updated_at: now,
            sync_id: None,
            sync_status: SyncStatus::Local,
        }
    }

    /// Overrides both timestamps, e.g. when importing existing records.
    #[must_use]
    pub fn with_timestamps(mut self, created_at: Timestamp, updated_at: Timestamp) -> Self {
        self.created_at = created_at;
        self.updated_at = updated_at;
        self
    }

    /// Returns the internal identity, if the entity has been stored.
    #[must_use]
    pub fn id(&self) -> Option<u64> {
        self.id
    }

    /// Returns the universal identifier.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Returns the creation time.
    #[must_use]
    pub fn created_at(&self) -> Timestamp {
        self.created_at
    }

    /// Returns the last modification time.
    #[must_use]
    pub fn updated_at(&self) -> Timestamp {
        self.updated_at
    }

    /// Returns true once the entity has an internal identity.
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    pub(crate) fn assign_id(&mut self, id: u64) {
        self.id = Some(id);
    }

    /// Sets `updated_at` to now, never earlier than `created_at`.
    pub(crate) fn touch(&mut self) {
        self.updated_at = Timestamp::now().max(self.created_at);
    }
}

impl Default for EntityMeta {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_meta_is_unpersisted_local() {
        let meta = EntityMeta::new();
        assert!(meta.id().is_none());
        assert!(!meta.is_persisted());
        assert_eq!(meta.sync_status, SyncStatus::Local);
        assert_eq!(meta.created_at(), meta.updated_at());
    }

    #[test]
    fn touch_never_precedes_creation() {
        let future = Timestamp::from_millis(u64::MAX / 2);
        let mut meta = EntityMeta::new().with_timestamps(future, future);
        meta.touch();
        assert_eq!(meta.updated_at(), future);
    }

    #[test]
    fn id_is_not_serialized() {
        let mut meta = EntityMeta::new();
        meta.assign_id(7);
        let bytes = strata_codec::to_cbor(&meta).unwrap();
        let decoded: EntityMeta = strata_codec::from_cbor(&bytes).unwrap();
        assert_eq!(decoded.id(), None);
        assert_eq!(decoded.uuid(), meta.uuid());
    }

    #[test]
    fn sync_status_serializes_lowercase() {
        let json = serde_json::to_string(&SyncStatus::Synced).unwrap();
        assert_eq!(json, "\"synced\"");
    }
}
