//! Committed rows of one collection.

use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// A stored row: universal identifier plus encoded payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredRow {
    /// Internal identity (table key).
    pub id: u64,
    /// Universal identifier.
    pub uuid: Uuid,
    /// Encoded payload.
    pub payload: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Row {
    pub(crate) uuid: Uuid,
    pub(crate) payload: Vec<u8>,
}

/// Rows of one collection, indexed by internal id and by uuid.
#[derive(Debug, Clone)]
pub(crate) struct Table {
    rows: BTreeMap<u64, Row>,
    by_uuid: HashMap<Uuid, u64>,
    next_id: u64,
}

impl Default for Table {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
            by_uuid: HashMap::new(),
            next_id: 1,
        }
    }
}

impl Table {
    pub(crate) fn next_id(&self) -> u64 {
        self.next_id
    }

    pub(crate) fn len(&self) -> usize {
        self.rows.len()
    }

    pub(crate) fn get(&self, id: u64) -> Option<&Row> {
        self.rows.get(&id)
    }

    pub(crate) fn id_of(&self, uuid: &Uuid) -> Option<u64> {
        self.by_uuid.get(uuid).copied()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (u64, &Row)> {
        self.rows.iter().map(|(id, row)| (*id, row))
    }

    pub(crate) fn stored(&self, id: u64) -> Option<StoredRow> {
        self.rows.get(&id).map(|row| StoredRow {
            id,
            uuid: row.uuid,
            payload: row.payload.clone(),
        })
    }

    pub(crate) fn apply_put(&mut self, id: u64, uuid: Uuid, payload: Vec<u8>) {
        if let Some(old) = self.rows.insert(id, Row { uuid, payload }) {
            if old.uuid != uuid && self.by_uuid.get(&old.uuid) == Some(&id) {
                self.by_uuid.remove(&old.uuid);
            }
        }
        self.by_uuid.insert(uuid, id);
        self.next_id = self.next_id.max(id + 1);
    }

    pub(crate) fn apply_delete(&mut self, id: u64) {
        if let Some(row) = self.rows.remove(&id) {
            if self.by_uuid.get(&row.uuid) == Some(&id) {
                self.by_uuid.remove(&row.uuid);
            }
        }
    }

    pub(crate) fn bump_next_id(&mut self, next_id: u64) {
        self.next_id = self.next_id.max(next_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_indexes_uuid_and_advances_ids() {
        let mut table = Table::default();
        let uuid = Uuid::new_v4();
        table.apply_put(4, uuid, vec![1]);

        assert_eq!(table.id_of(&uuid), Some(4));
        assert_eq!(table.next_id(), 5);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn delete_drops_uuid_mapping() {
        let mut table = Table::default();
        let uuid = Uuid::new_v4();
        table.apply_put(1, uuid, vec![1]);
        table.apply_delete(1);

        assert!(table.get(1).is_none());
        assert!(table.id_of(&uuid).is_none());
        // ids are never reused
        assert_eq!(table.next_id(), 2);
    }

    #[test]
    fn delete_of_old_row_keeps_moved_uuid() {
        let mut table = Table::default();
        let uuid = Uuid::new_v4();
        table.apply_put(1, uuid, vec![1]);
        table.apply_put(2, uuid, vec![2]);
        table.apply_delete(1);

        assert_eq!(table.id_of(&uuid), Some(2));
    }
}
