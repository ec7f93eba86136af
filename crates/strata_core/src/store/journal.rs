//! Commit journal on top of a [`StorageBackend`].
//!
//! ## Frame format
//!
//! ```text
//! | magic (4) | length (4, LE) | payload (N) | crc32 (4, LE) |
//! ```
//!
//! The payload is the CBOR encoding of a [`JournalRecord`]. The checksum
//! covers the payload only.
//!
//! ## Recovery policy
//!
//! - A trailing frame that is cut short (header or payload) is a crash before
//!   the write finished. It is dropped and replay ends cleanly.
//! - A short frame followed by intact frames is not a torn tail: its length
//!   field is damaged. That is corruption, like bad magic, a checksum
//!   mismatch or an undecodable payload, and the store refuses to open
//!   without touching the journal.
//!
//! ## Checkpoints
//!
//! A snapshot frame is first appended behind the frames it supersedes, then
//! the backend is replaced by the snapshot alone. Replaying old frames plus
//! snapshot yields the same state, so a failure in either step leaves a
//! journal that still holds every commit. If the replacement fails, the
//! snapshot is kept and re-applied before the next append.

use crate::error::{StoreError, StoreResult};
use crate::types::SequenceNumber;
use serde::{Deserialize, Serialize};
use strata_storage::StorageBackend;
use tracing::{debug, warn};
use uuid::Uuid;

const MAGIC: [u8; 4] = *b"STJ1";
const HEADER_SIZE: usize = 8;
const CRC_SIZE: usize = 4;

/// One row mutation inside a commit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct JournalWrite {
    pub(crate) collection: String,
    pub(crate) id: u64,
    pub(crate) op: WriteOp,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum WriteOp {
    Put { uuid: Uuid, payload: Vec<u8> },
    Delete,
}

/// Full image of one collection, written by a checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct TableImage {
    pub(crate) name: String,
    pub(crate) next_id: u64,
    pub(crate) rows: Vec<(u64, Uuid, Vec<u8>)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) enum JournalRecord {
    Commit {
        sequence: SequenceNumber,
        writes: Vec<JournalWrite>,
        next_ids: Vec<(String, u64)>,
    },
    Snapshot {
        sequence: SequenceNumber,
        tables: Vec<TableImage>,
    },
}

/// Result of reading a journal back.
pub(crate) struct Replay {
    pub(crate) records: Vec<JournalRecord>,
    /// Length of the intact prefix; anything past it is a torn frame.
    pub(crate) valid_len: u64,
}

pub(crate) struct Journal {
    backend: Box<dyn StorageBackend>,
    sync_on_commit: bool,
    /// Snapshot frame that must replace the backend before the next write.
    pending_base: Option<Vec<u8>>,
}

impl Journal {
    pub(crate) fn new(backend: Box<dyn StorageBackend>, sync_on_commit: bool) -> Self {
        Self {
            backend,
            sync_on_commit,
            pending_base: None,
        }
    }

    /// Reads every intact frame and drops a torn tail from the backend.
    pub(crate) fn recover(&mut self) -> StoreResult<Vec<JournalRecord>> {
        let bytes = self.backend.read_all()?;
        let replay = decode_frames(&bytes)?;
        if replay.valid_len < bytes.len() as u64 {
            warn!(
                dropped = bytes.len() as u64 - replay.valid_len,
                "discarding torn journal frame"
            );
            self.backend.truncate(replay.valid_len)?;
        }
        debug!(records = replay.records.len(), "journal replayed");
        Ok(replay.records)
    }

    /// Appends one record. On failure the journal is cut back to its
    /// previous length so a half-written frame never outlives the error.
    pub(crate) fn append(&mut self, record: &JournalRecord) -> StoreResult<()> {
        let frame = encode_frame(record)?;
        self.settle()?;
        self.append_frame(&frame, self.sync_on_commit)
    }

    fn append_frame(&mut self, frame: &[u8], sync: bool) -> StoreResult<()> {
        let before = self.backend.size()?;
        if let Err(err) = self.write_frame(frame, sync) {
            if let Err(undo) = self.backend.truncate(before) {
                warn!(error = %undo, "failed to cut back journal after aborted write");
            }
            return Err(err);
        }
        Ok(())
    }

    fn write_frame(&mut self, frame: &[u8], sync: bool) -> StoreResult<()> {
        self.backend.append(frame)?;
        self.backend.flush()?;
        if sync {
            self.backend.sync()?;
        }
        Ok(())
    }

    /// Replaces the whole journal with a single snapshot frame.
    ///
    /// On error the journal still replays to the committed state.
    pub(crate) fn rewrite(&mut self, snapshot: &JournalRecord) -> StoreResult<()> {
        let frame = encode_frame(snapshot)?;
        self.settle()?;
        self.append_frame(&frame, true)?;
        if let Err(err) = self.backend.replace(&frame) {
            warn!(error = %err, "journal compaction failed, snapshot kept for the next write");
            self.pending_base = Some(frame);
            return Err(err.into());
        }
        Ok(())
    }

    /// Finishes an interrupted compaction.
    fn settle(&mut self) -> StoreResult<()> {
        let Some(base) = self.pending_base.take() else {
            return Ok(());
        };
        if let Err(err) = self.backend.replace(&base) {
            self.pending_base = Some(base);
            return Err(err.into());
        }
        debug!("interrupted compaction finished");
        Ok(())
    }

    pub(crate) fn size(&self) -> StoreResult<u64> {
        Ok(self.backend.size()?)
    }
}

pub(crate) fn encode_frame(record: &JournalRecord) -> StoreResult<Vec<u8>> {
    let payload = strata_codec::to_cbor(record)?;
    let len = u32::try_from(payload.len())
        .map_err(|_| StoreError::invalid_operation("commit exceeds 4 GiB journal frame"))?;

    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
    frame.extend_from_slice(&MAGIC);
    frame.extend_from_slice(&len.to_le_bytes());
    frame.extend_from_slice(&payload);
    frame.extend_from_slice(&compute_crc32(&payload).to_le_bytes());
    Ok(frame)
}

pub(crate) fn decode_frames(bytes: &[u8]) -> StoreResult<Replay> {
    let mut records = Vec::new();
    let mut offset = 0usize;

    while offset < bytes.len() {
        let rest = &bytes[offset..];
        if rest.len() < HEADER_SIZE {
            if !MAGIC.starts_with(&rest[..rest.len().min(MAGIC.len())]) {
                return Err(StoreError::journal_corruption(format!(
                    "trailing garbage at offset {offset}"
                )));
            }
            break;
        }
        if rest[..4] != MAGIC {
            return Err(StoreError::journal_corruption(format!(
                "bad frame magic at offset {offset}"
            )));
        }
        let len = u32::from_le_bytes([rest[4], rest[5], rest[6], rest[7]]) as usize;
        let end = HEADER_SIZE + len + CRC_SIZE;
        if rest.len() < end {
            if holds_intact_frame(&rest[HEADER_SIZE..]) {
                return Err(StoreError::journal_corruption(format!(
                    "frame at offset {offset} declares {len} bytes but intact frames follow it"
                )));
            }
            break;
        }

        let payload = &rest[HEADER_SIZE..HEADER_SIZE + len];
        let stored = &rest[HEADER_SIZE + len..end];
        let expected = u32::from_le_bytes([stored[0], stored[1], stored[2], stored[3]]);
        let actual = compute_crc32(payload);
        if expected != actual {
            return Err(StoreError::ChecksumMismatch { expected, actual });
        }

        let record = strata_codec::from_cbor(payload).map_err(|e| {
            StoreError::journal_corruption(format!("undecodable frame at offset {offset}: {e}"))
        })?;
        records.push(record);
        offset += end;
    }

    Ok(Replay {
        records,
        valid_len: offset as u64,
    })
}

/// Whether a complete frame with a valid checksum starts anywhere in `bytes`.
fn holds_intact_frame(bytes: &[u8]) -> bool {
    (0..bytes.len()).any(|at| bytes[at..].starts_with(&MAGIC) && is_intact_frame(&bytes[at..]))
}

fn is_intact_frame(bytes: &[u8]) -> bool {
    if bytes.len() < HEADER_SIZE {
        return false;
    }
    let len = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]) as usize;
    let end = HEADER_SIZE + len + CRC_SIZE;
    if bytes.len() < end {
        return false;
    }
    let stored = &bytes[HEADER_SIZE + len..end];
    u32::from_le_bytes([stored[0], stored[1], stored[2], stored[3]])
        == compute_crc32(&bytes[HEADER_SIZE..HEADER_SIZE + len])
}

/// Computes the CRC32 (IEEE) checksum of `data`.
pub(crate) fn compute_crc32(data: &[u8]) -> u32 {
    const CRC32_TABLE: [u32; 256] = {
        let mut table = [0u32; 256];
        let mut i = 0;
        while i < 256 {
            let mut crc = i as u32;
            let mut j = 0;
            while j < 8 {
                crc = if crc & 1 != 0 {
                    (crc >> 1) ^ 0xEDB8_8320
                } else {
                    crc >> 1
                };
                j += 1;
            }
            table[i] = crc;
            i += 1;
        }
        table
    };

    !data.iter().fold(0xFFFF_FFFF_u32, |crc, &byte| {
        (crc >> 8) ^ CRC32_TABLE[((crc ^ u32::from(byte)) & 0xFF) as usize]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use strata_storage::{InMemoryBackend, StorageError, StorageResult};

    fn commit(seq: u64) -> JournalRecord {
        JournalRecord::Commit {
            sequence: SequenceNumber::new(seq),
            writes: vec![JournalWrite {
                collection: "task".into(),
                id: seq,
                op: WriteOp::Put {
                    uuid: Uuid::from_u128(u128::from(seq)),
                    payload: vec![1, 2, 3],
                },
            }],
            next_ids: vec![("task".into(), seq + 1)],
        }
    }

    #[test]
    fn crc32_known_value() {
        assert_eq!(compute_crc32(b"123456789"), 0xCBF4_3926);
        assert_eq!(compute_crc32(b""), 0);
    }

    #[test]
    fn frames_replay_in_order() {
        let mut bytes = encode_frame(&commit(1)).unwrap();
        bytes.extend(encode_frame(&commit(2)).unwrap());

        let replay = decode_frames(&bytes).unwrap();
        assert_eq!(replay.records, vec![commit(1), commit(2)]);
        assert_eq!(replay.valid_len, bytes.len() as u64);
    }

    #[test]
    fn torn_tail_is_clean_end() {
        let first = encode_frame(&commit(1)).unwrap();
        let second = encode_frame(&commit(2)).unwrap();
        let mut bytes = first.clone();
        bytes.extend_from_slice(&second[..second.len() - 3]);

        let replay = decode_frames(&bytes).unwrap();
        assert_eq!(replay.records.len(), 1);
        assert_eq!(replay.valid_len, first.len() as u64);
    }

    #[test]
    fn torn_header_is_clean_end() {
        let mut bytes = encode_frame(&commit(1)).unwrap();
        bytes.extend_from_slice(&MAGIC[..3]);

        let replay = decode_frames(&bytes).unwrap();
        assert_eq!(replay.records.len(), 1);
    }

    #[test]
    fn flipped_payload_bit_is_fatal() {
        let mut bytes = encode_frame(&commit(1)).unwrap();
        bytes[HEADER_SIZE + 2] ^= 0x40;

        let err = decode_frames(&bytes).err().unwrap();
        assert!(matches!(err, StoreError::ChecksumMismatch { .. }));
    }

    #[test]
    fn bad_magic_is_fatal() {
        let mut bytes = encode_frame(&commit(1)).unwrap();
        bytes[0] = b'X';

        let err = decode_frames(&bytes).err().unwrap();
        assert!(matches!(err, StoreError::JournalCorruption { .. }));
    }

    #[test]
    fn damaged_length_mid_journal_is_fatal() {
        let mut bytes = Vec::new();
        let mut starts = Vec::new();
        for seq in 1..=5 {
            starts.push(bytes.len());
            bytes.extend(encode_frame(&commit(seq)).unwrap());
        }
        bytes[starts[1] + 7] = 0x7f;

        let err = decode_frames(&bytes).err().unwrap();
        assert!(matches!(err, StoreError::JournalCorruption { .. }));

        let backend = InMemoryBackend::with_data(bytes.clone());
        let mut journal = Journal::new(Box::new(backend.clone()), false);
        assert!(journal.recover().is_err());
        assert_eq!(backend.snapshot(), bytes);
    }

    #[test]
    fn trailing_garbage_is_fatal() {
        let mut bytes = encode_frame(&commit(1)).unwrap();
        bytes.extend_from_slice(b"xy");

        let err = decode_frames(&bytes).err().unwrap();
        assert!(matches!(err, StoreError::JournalCorruption { .. }));
    }

    #[derive(Clone, Default)]
    struct Flaky {
        inner: InMemoryBackend,
        fail_append: Arc<AtomicBool>,
        fail_truncate: Arc<AtomicBool>,
    }

    fn injected() -> StorageError {
        StorageError::Io(std::io::Error::other("injected"))
    }

    impl StorageBackend for Flaky {
        fn append(&mut self, data: &[u8]) -> StorageResult<u64> {
            if self.fail_append.load(Ordering::SeqCst) {
                return Err(injected());
            }
            self.inner.append(data)
        }

        fn read_all(&self) -> StorageResult<Vec<u8>> {
            self.inner.read_all()
        }

        fn flush(&mut self) -> StorageResult<()> {
            self.inner.flush()
        }

        fn sync(&mut self) -> StorageResult<()> {
            self.inner.sync()
        }

        fn size(&self) -> StorageResult<u64> {
            self.inner.size()
        }

        fn truncate(&mut self, len: u64) -> StorageResult<()> {
            if self.fail_truncate.load(Ordering::SeqCst) {
                return Err(injected());
            }
            self.inner.truncate(len)
        }
    }

    fn snapshot(seq: u64) -> JournalRecord {
        JournalRecord::Snapshot {
            sequence: SequenceNumber::new(seq),
            tables: Vec::new(),
        }
    }

    fn replayed(backend: &Flaky) -> Vec<JournalRecord> {
        decode_frames(&backend.inner.snapshot()).unwrap().records
    }

    #[test]
    fn failed_snapshot_append_leaves_commits() {
        let backend = Flaky::default();
        let mut journal = Journal::new(Box::new(backend.clone()), false);
        journal.append(&commit(1)).unwrap();
        journal.append(&commit(2)).unwrap();

        backend.fail_append.store(true, Ordering::SeqCst);
        assert!(journal.rewrite(&snapshot(2)).is_err());
        backend.fail_append.store(false, Ordering::SeqCst);

        assert_eq!(replayed(&backend), vec![commit(1), commit(2)]);
        journal.append(&commit(3)).unwrap();
        assert_eq!(replayed(&backend), vec![commit(1), commit(2), commit(3)]);
    }

    #[test]
    fn failed_compaction_is_finished_by_next_append() {
        let backend = Flaky::default();
        let mut journal = Journal::new(Box::new(backend.clone()), false);
        journal.append(&commit(1)).unwrap();
        journal.append(&commit(2)).unwrap();

        backend.fail_truncate.store(true, Ordering::SeqCst);
        assert!(journal.rewrite(&snapshot(2)).is_err());
        assert_eq!(replayed(&backend), vec![commit(1), commit(2), snapshot(2)]);

        assert!(journal.append(&commit(3)).is_err());
        assert_eq!(replayed(&backend), vec![commit(1), commit(2), snapshot(2)]);

        backend.fail_truncate.store(false, Ordering::SeqCst);
        journal.append(&commit(3)).unwrap();
        assert_eq!(replayed(&backend), vec![snapshot(2), commit(3)]);
    }

    #[test]
    fn recover_truncates_torn_frame() {
        let backend = InMemoryBackend::new();
        let mut journal = Journal::new(Box::new(backend.clone()), false);
        journal.append(&commit(1)).unwrap();
        let intact = journal.size().unwrap();

        let mut raw = backend.clone();
        raw.append(&MAGIC).unwrap();

        let records = journal.recover().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(journal.size().unwrap(), intact);
    }
}
