//! Append-only version history.

use crate::entity::UuidGenerator;
use crate::error::{StoreError, StoreResult};
use crate::store::{RowSource, Store};
use crate::transaction::{TransactionContext, TransactionManager};
use crate::version::VersionRecord;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Reserved collection holding version records.
pub const VERSIONS_COLLECTION: &str = "_versions";

/// Reads and appends version records.
///
/// Version `n` of an entity is stored under a uuid derived from
/// `(entity type, entity id, n)`, so a second record with the same number
/// cannot be stored. Histories are gapless, which lets the latest number be
/// found by probing derived uuids instead of scanning the collection.
///
/// Records are never deleted, including when their entity is.
pub struct VersionStore {
    transactions: Arc<TransactionManager>,
}

impl VersionStore {
    /// Creates a version store.
    pub fn new(transactions: Arc<TransactionManager>) -> Self {
        Self { transactions }
    }

    fn committed(&self) -> &Store {
        self.transactions.store()
    }

    /// Identity of version `number` of an entity.
    #[must_use]
    pub fn record_uuid(entity_type: &str, entity_id: Uuid, number: u64) -> Uuid {
        UuidGenerator::derive(&[entity_type, &entity_id.to_string(), &number.to_string()])
    }

    /// Committed history of an entity, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if a stored record cannot be decoded.
    pub fn history(&self, entity_type: &str, entity_id: Uuid) -> StoreResult<Vec<VersionRecord>> {
        history_from(self.committed(), entity_type, entity_id)
    }

    /// Latest committed version of an entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored record cannot be decoded.
    pub fn latest(&self, entity_type: &str, entity_id: Uuid) -> StoreResult<Option<VersionRecord>> {
        let source: &dyn RowSource = self.committed();
        let number = latest_number_from(source, entity_type, entity_id)?;
        if number == 0 {
            return Ok(None);
        }
        record_from(source, entity_type, entity_id, number)
    }

    /// Committed version `number` of an entity.
    ///
    /// # Errors
    ///
    /// Returns an error if the stored record cannot be decoded.
    pub fn version(
        &self,
        entity_type: &str,
        entity_id: Uuid,
        number: u64,
    ) -> StoreResult<Option<VersionRecord>> {
        record_from(self.committed(), entity_type, entity_id, number)
    }

    /// Number of committed version records across all entities.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot count.
    pub fn count(&self) -> StoreResult<usize> {
        self.transactions.store().row_count(VERSIONS_COLLECTION)
    }

    /// History including records pending in `ctx`.
    ///
    /// # Errors
    ///
    /// Returns an error if a record cannot be decoded or `_versions` is not
    /// in the context's scope.
    pub fn history_in(
        &self,
        ctx: &TransactionContext<'_>,
        entity_type: &str,
        entity_id: Uuid,
    ) -> StoreResult<Vec<VersionRecord>> {
        history_from(ctx, entity_type, entity_id)
    }

    /// Latest version number including records pending in `ctx`; 0 if the
    /// entity has no history.
    ///
    /// # Errors
    ///
    /// Returns an error if `_versions` is not in the context's scope.
    pub fn latest_number_in(
        &self,
        ctx: &TransactionContext<'_>,
        entity_type: &str,
        entity_id: Uuid,
    ) -> StoreResult<u64> {
        latest_number_from(ctx, entity_type, entity_id)
    }

    /// Appends `record` through `ctx`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] unless `record.version_number` is
    /// exactly one past the latest stored version.
    pub fn append_in(
        &self,
        ctx: &mut TransactionContext<'_>,
        record: &VersionRecord,
    ) -> StoreResult<()> {
        let latest = latest_number_from(ctx, &record.entity_type, record.entity_id)?;
        if record.version_number != latest + 1 {
            return Err(StoreError::conflict(
                &record.entity_type,
                format!(
                    "version {} of {} does not follow latest version {latest}",
                    record.version_number, record.entity_id
                ),
            ));
        }

        let uuid = Self::record_uuid(&record.entity_type, record.entity_id, record.version_number);
        ctx.insert(VERSIONS_COLLECTION, uuid, strata_codec::to_cbor(record)?)?;
        debug!(
            entity_type = %record.entity_type,
            entity_id = %record.entity_id,
            version = record.version_number,
            changes = record.changes.len(),
            "version appended"
        );
        Ok(())
    }
}

impl std::fmt::Debug for VersionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionStore").finish_non_exhaustive()
    }
}

fn exists(source: &dyn RowSource, entity_type: &str, entity_id: Uuid, n: u64) -> StoreResult<bool> {
    let uuid = VersionStore::record_uuid(entity_type, entity_id, n);
    Ok(source.row_by_uuid(VERSIONS_COLLECTION, uuid)?.is_some())
}

/// Largest stored version number, found by galloping then bisecting.
fn latest_number_from(
    source: &dyn RowSource,
    entity_type: &str,
    entity_id: Uuid,
) -> StoreResult<u64> {
    if !exists(source, entity_type, entity_id, 1)? {
        return Ok(0);
    }
    let mut low = 1u64;
    let mut high = 2u64;
    while exists(source, entity_type, entity_id, high)? {
        low = high;
        high = high.saturating_mul(2);
    }
    // low exists, high does not
    while high - low > 1 {
        let mid = low + (high - low) / 2;
        if exists(source, entity_type, entity_id, mid)? {
            low = mid;
        } else {
            high = mid;
        }
    }
    Ok(low)
}

fn record_from(
    source: &dyn RowSource,
    entity_type: &str,
    entity_id: Uuid,
    number: u64,
) -> StoreResult<Option<VersionRecord>> {
    let uuid = VersionStore::record_uuid(entity_type, entity_id, number);
    match source.row_by_uuid(VERSIONS_COLLECTION, uuid)? {
        Some(row) => Ok(Some(strata_codec::from_cbor(&row.payload)?)),
        None => Ok(None),
    }
}

fn history_from(
    source: &dyn RowSource,
    entity_type: &str,
    entity_id: Uuid,
) -> StoreResult<Vec<VersionRecord>> {
    let latest = latest_number_from(source, entity_type, entity_id)?;
    let mut history = Vec::with_capacity(latest as usize);
    for number in 1..=latest {
        if let Some(record) = record_from(source, entity_type, entity_id, number)? {
            history.push(record);
        }
    }
    Ok(history)
}
