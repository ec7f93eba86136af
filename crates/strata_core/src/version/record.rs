//! The version record shape.

use crate::types::Timestamp;
use serde::{Deserialize, Serialize};
use strata_codec::FieldMap;
use uuid::Uuid;

/// One entry in an entity's history.
///
/// Serialized with camelCase keys; audit tooling reads this shape directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionRecord {
    /// Entity type name.
    pub entity_type: String,
    /// Universal identifier of the entity.
    pub entity_id: Uuid,
    /// 1 for the first save, then +1 per save.
    pub version_number: u64,
    /// Who made the change.
    pub modified_by: String,
    /// When the change was made.
    pub modified_at: Timestamp,
    /// Changed or added fields with their new values; removed fields as null.
    pub changes: FieldMap,
    /// Full field state after the change, when snapshots are enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot: Option<FieldMap>,
}
