//! WAL record framing.
//!
//! Every record is self-delimiting and checksummed. All integers are
//! little-endian, independent of host byte order.
//!
//! # Record Layout
//!
//! ```text
//! ┌──────┬─────────┬──────┬──────────┬─────┬────────────┬───────┬──────────┬───────┐
//! │ type │ txn_id  │ lsn  │ key_len  │ key │ value_len  │ value │ pre-image│ crc32 │
//! │ (1)  │ (8)     │ (8)  │ (4)      │     │ (4)        │       │ (1|5+n)  │ (4)   │
//! └──────┴─────────┴──────┴──────────┴─────┴────────────┴───────┴──────────┴───────┘
//! ```
//!
//! The pre-image field is a one-byte tag: `0` means the key did not exist
//! before this operation, `1` means it did and is followed by
//! `[u32 prev_len][prev bytes]`. Put and Delete records carry the pre-image
//! so undo can restore the exact prior state; every other record type
//! writes tag `0`.
//!
//! The CRC32 (IEEE reflected polynomial) covers every framed byte before
//! the checksum itself.

use brine_core::{Key, Lsn, TxnId, Value};
use crc32fast::Hasher;

/// Record type tag, first byte of every framed record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    /// Transaction start.
    Begin = 0,
    /// Key write. Carries key, value, and the key's pre-image.
    Put = 1,
    /// Key removal. Carries key and the removed value as pre-image.
    Delete = 2,
    /// Transaction commit. The durability point once flushed.
    Commit = 3,
    /// Transaction abort.
    Rollback = 4,
    /// Durability boundary. The value holds the serialized list of
    /// transactions that were active when the checkpoint was taken.
    Checkpoint = 5,
}

impl RecordType {
    fn from_u8(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(RecordType::Begin),
            1 => Some(RecordType::Put),
            2 => Some(RecordType::Delete),
            3 => Some(RecordType::Commit),
            4 => Some(RecordType::Rollback),
            5 => Some(RecordType::Checkpoint),
            _ => None,
        }
    }
}

/// A single WAL record.
///
/// The `lsn` field is assigned by the WAL at append time; records are
/// constructed with `lsn = 0` and must not be considered addressable until
/// appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    /// What this record describes.
    pub record_type: RecordType,
    /// Owning transaction. 0 for Checkpoint records.
    pub txn_id: TxnId,
    /// Log sequence number, assigned by the WAL.
    pub lsn: Lsn,
    /// Affected key. Empty for Begin/Commit/Rollback/Checkpoint.
    pub key: Key,
    /// New value for Put; the active-transaction list for Checkpoint;
    /// empty otherwise.
    pub value: Value,
    /// The key's value before this operation, if it existed.
    pub prev: Option<Value>,
}

impl LogRecord {
    /// Transaction start record.
    pub fn begin(txn_id: TxnId) -> Self {
        Self::control(RecordType::Begin, txn_id)
    }

    /// Key write record with the key's pre-image.
    pub fn put(txn_id: TxnId, key: &[u8], value: &[u8], prev: Option<Value>) -> Self {
        LogRecord {
            record_type: RecordType::Put,
            txn_id,
            lsn: 0,
            key: key.to_vec(),
            value: value.to_vec(),
            prev,
        }
    }

    /// Key removal record with the removed value as pre-image.
    pub fn delete(txn_id: TxnId, key: &[u8], prev: Option<Value>) -> Self {
        LogRecord {
            record_type: RecordType::Delete,
            txn_id,
            lsn: 0,
            key: key.to_vec(),
            value: Vec::new(),
            prev,
        }
    }

    /// Commit record.
    pub fn commit(txn_id: TxnId) -> Self {
        Self::control(RecordType::Commit, txn_id)
    }

    /// Rollback record.
    pub fn rollback(txn_id: TxnId) -> Self {
        Self::control(RecordType::Rollback, txn_id)
    }

    /// Checkpoint record. `active_txns` is the serialized id list.
    pub fn checkpoint(active_txns: Vec<u8>) -> Self {
        LogRecord {
            record_type: RecordType::Checkpoint,
            txn_id: 0,
            lsn: 0,
            key: Vec::new(),
            value: active_txns,
            prev: None,
        }
    }

    fn control(record_type: RecordType, txn_id: TxnId) -> Self {
        LogRecord {
            record_type,
            txn_id,
            lsn: 0,
            key: Vec::new(),
            value: Vec::new(),
            prev: None,
        }
    }

    /// Serialize to the framed byte layout, checksum included.
    pub fn to_bytes(&self) -> Vec<u8> {
        let prev_len = self.prev.as_ref().map(|p| 4 + p.len()).unwrap_or(0);
        let mut out = Vec::with_capacity(1 + 8 + 8 + 4 + self.key.len() + 4 + self.value.len() + 1 + prev_len + 4);

        out.push(self.record_type as u8);
        out.extend_from_slice(&self.txn_id.to_le_bytes());
        out.extend_from_slice(&self.lsn.to_le_bytes());
        out.extend_from_slice(&(self.key.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.key);
        out.extend_from_slice(&(self.value.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.value);
        match &self.prev {
            Some(prev) => {
                out.push(1);
                out.extend_from_slice(&(prev.len() as u32).to_le_bytes());
                out.extend_from_slice(prev);
            }
            None => out.push(0),
        }

        let crc = compute_crc(&out);
        out.extend_from_slice(&crc.to_le_bytes());
        out
    }

    /// Deserialize one record from the front of `bytes`.
    ///
    /// Returns the record and the number of bytes consumed. A short buffer
    /// yields `RecordError::Incomplete`, which readers treat as a torn tail.
    pub fn from_bytes(bytes: &[u8]) -> Result<(Self, usize), RecordError> {
        let mut offset = 0usize;

        let type_byte = *bytes.first().ok_or(RecordError::Incomplete)?;
        offset += 1;

        let txn_id = read_u64(bytes, &mut offset)?;
        let lsn = read_u64(bytes, &mut offset)?;
        let key = read_chunk(bytes, &mut offset)?;
        let value = read_chunk(bytes, &mut offset)?;

        let prev_tag = *bytes.get(offset).ok_or(RecordError::Incomplete)?;
        offset += 1;
        let prev = match prev_tag {
            0 => None,
            1 => Some(read_chunk(bytes, &mut offset)?),
            other => return Err(RecordError::InvalidPreImageTag(other)),
        };

        let crc_offset = offset;
        let stored_crc = read_u32(bytes, &mut offset)?;
        let computed_crc = compute_crc(&bytes[..crc_offset]);
        if stored_crc != computed_crc {
            return Err(RecordError::ChecksumMismatch {
                expected: stored_crc,
                computed: computed_crc,
            });
        }

        let record_type =
            RecordType::from_u8(type_byte).ok_or(RecordError::UnknownType(type_byte))?;

        Ok((
            LogRecord {
                record_type,
                txn_id,
                lsn,
                key,
                value,
                prev,
            },
            offset,
        ))
    }
}

/// CRC32 with the IEEE reflected polynomial, initial value `0xFFFFFFFF`,
/// final XOR `0xFFFFFFFF`.
fn compute_crc(data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(data);
    hasher.finalize()
}

fn read_u64(bytes: &[u8], offset: &mut usize) -> Result<u64, RecordError> {
    let end = offset.checked_add(8).ok_or(RecordError::Incomplete)?;
    if end > bytes.len() {
        return Err(RecordError::Incomplete);
    }
    let value = u64::from_le_bytes(bytes[*offset..end].try_into().unwrap());
    *offset = end;
    Ok(value)
}

fn read_u32(bytes: &[u8], offset: &mut usize) -> Result<u32, RecordError> {
    let end = offset.checked_add(4).ok_or(RecordError::Incomplete)?;
    if end > bytes.len() {
        return Err(RecordError::Incomplete);
    }
    let value = u32::from_le_bytes(bytes[*offset..end].try_into().unwrap());
    *offset = end;
    Ok(value)
}

fn read_chunk(bytes: &[u8], offset: &mut usize) -> Result<Vec<u8>, RecordError> {
    let len = read_u32(bytes, offset)? as usize;
    let end = offset.checked_add(len).ok_or(RecordError::Incomplete)?;
    if end > bytes.len() {
        return Err(RecordError::Incomplete);
    }
    let chunk = bytes[*offset..end].to_vec();
    *offset = end;
    Ok(chunk)
}

/// WAL record parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RecordError {
    /// Not enough bytes for a complete record. Expected at the tail of a
    /// log that was being written when the process died.
    #[error("incomplete record")]
    Incomplete,

    /// Checksum verification failed.
    #[error("checksum mismatch: expected {expected:08x}, computed {computed:08x}")]
    ChecksumMismatch {
        /// Checksum stored in the record.
        expected: u32,
        /// Checksum computed over the framed bytes.
        computed: u32,
    },

    /// The type byte does not name a known record type.
    #[error("unknown record type: {0}")]
    UnknownType(u8),

    /// The pre-image tag byte was neither 0 nor 1.
    #[error("invalid pre-image tag: {0}")]
    InvalidPreImageTag(u8),
}
