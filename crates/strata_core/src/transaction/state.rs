//! Pending writes of an open transaction.

use crate::store::{CommitBatch, JournalWrite, StoredRow, WriteOp};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// A pending write in a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum PendingWrite {
    /// Insert or replace a row.
    Put { uuid: Uuid, payload: Vec<u8> },
    /// Remove a row that carried `uuid`.
    Delete { uuid: Uuid },
}

/// Everything a transaction has written so far.
///
/// Keys are `(collection, id)` in a `BTreeMap` so commits journal their
/// writes in a stable order and scans can merge by id.
#[derive(Debug, Default)]
pub(crate) struct WriteSet {
    writes: BTreeMap<(String, u64), PendingWrite>,
    /// uuid → id overlay; `None` marks a uuid released by a delete.
    uuids: HashMap<(String, Uuid), Option<u64>>,
    next_ids: HashMap<String, u64>,
}

impl WriteSet {
    pub(crate) fn put(&mut self, collection: &str, id: u64, uuid: Uuid, payload: Vec<u8>) {
        self.uuids.insert((collection.to_string(), uuid), Some(id));
        self.writes
            .insert((collection.to_string(), id), PendingWrite::Put { uuid, payload });
    }

    pub(crate) fn delete(&mut self, collection: &str, id: u64, uuid: Uuid) {
        self.uuids.insert((collection.to_string(), uuid), None);
        self.writes
            .insert((collection.to_string(), id), PendingWrite::Delete { uuid });
    }

    pub(crate) fn get(&self, collection: &str, id: u64) -> Option<&PendingWrite> {
        self.writes.get(&(collection.to_string(), id))
    }

    /// `Some(None)` when this transaction released the uuid.
    pub(crate) fn uuid_lookup(&self, collection: &str, uuid: Uuid) -> Option<Option<u64>> {
        self.uuids.get(&(collection.to_string(), uuid)).copied()
    }

    /// Hands out the next internal id, starting from `committed_next`.
    pub(crate) fn allocate_id(&mut self, collection: &str, committed_next: u64) -> u64 {
        let next = self
            .next_ids
            .entry(collection.to_string())
            .or_insert(committed_next);
        let id = *next;
        *next += 1;
        id
    }

    /// Pending writes of one collection in id order.
    pub(crate) fn collection(
        &self,
        collection: &str,
    ) -> impl Iterator<Item = (u64, &PendingWrite)> {
        let start = (collection.to_string(), 0);
        let end = (collection.to_string(), u64::MAX);
        self.writes.range(start..=end).map(|((_, id), write)| (*id, write))
    }

    /// Merges pending writes into a committed scan of the same collection.
    pub(crate) fn overlay(&self, collection: &str, committed: Vec<StoredRow>) -> Vec<StoredRow> {
        let mut merged: BTreeMap<u64, StoredRow> =
            committed.into_iter().map(|row| (row.id, row)).collect();
        for (id, write) in self.collection(collection) {
            match write {
                PendingWrite::Put { uuid, payload } => {
                    merged.insert(
                        id,
                        StoredRow {
                            id,
                            uuid: *uuid,
                            payload: payload.clone(),
                        },
                    );
                }
                PendingWrite::Delete { .. } => {
                    merged.remove(&id);
                }
            }
        }
        merged.into_values().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.writes.len()
    }

    pub(crate) fn into_batch(self) -> CommitBatch {
        let writes = self
            .writes
            .into_iter()
            .map(|((collection, id), write)| JournalWrite {
                collection,
                id,
                op: match write {
                    PendingWrite::Put { uuid, payload } => WriteOp::Put { uuid, payload },
                    PendingWrite::Delete { .. } => WriteOp::Delete,
                },
            })
            .collect();
        let mut next_ids: Vec<(String, u64)> = self.next_ids.into_iter().collect();
        next_ids.sort();
        CommitBatch { writes, next_ids }
    }
}
