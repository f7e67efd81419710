//! PAE non-volatile storage records
//!
//! Every record is a TLV entry:
//!   tag(2,BE) | len(2,BE) | payload(len)
//!
//! All multi-byte integers inside payloads are big-endian. Optional fields
//! are preceded by a one byte presence flag and always occupy their full
//! width, so the offsets of later fields never depend on presence.
//!
//! Reference: Wi-SUN FAN 1.0 / 1.1, PAE controller NVM storage

pub mod envelope;
pub mod frame_counter;
pub mod key_storage;
pub mod keys;
pub mod persist;
pub mod store;

use std::fmt;

use thiserror::Error;

use crate::security::{EUI64_LEN, GTK_LEN, GTK_NUM, PMK_LEN, PTK_LEN};

pub use envelope::{RecordReader, RecordTag, RecordWriter, ENVELOPE_LEN};
pub use frame_counter::{decode_frame_counters, encode_frame_counters, FrameCounterMeta};
pub use key_storage::{
    decode_key_storage, decode_key_storage_index, encode_key_storage, encode_key_storage_index,
};
pub use keys::{decode_keys, encode_keys};
pub use persist::PaeNvm;
pub use store::{FileStore, MemoryStore, NvmStore};

/// Keys record payload length
pub const KEYS_LEN: usize = 1 + EUI64_LEN + 1 + 4 + PMK_LEN + 8 + 1 + 4 + PTK_LEN;

/// Length of one frame counter slot: flag + key + frame counter + max change
pub const FRAME_COUNTER_SLOT_LEN: usize = 1 + GTK_LEN + 4 + 4;

/// Frame counter record payload length (GTK and LGTK slot arrays)
pub const FRAME_COUNTER_LEN: usize = 4 + 8 + 2 + 2 + 2 * GTK_NUM * FRAME_COUNTER_SLOT_LEN;

/// Key storage index record payload length
pub const KEY_STORAGE_INDEX_LEN: usize = 8;

/// Presence flag preceding every optional field
///
/// Only 0 and 1 are accepted when decoding. Any other byte rejects the
/// whole record, for keys and frame counter records alike. Firmware that
/// read such a byte as NOT_SET (keys) or SET (frame counters) will accept
/// records this crate refuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FieldFlag {
    NotSet = 0,
    Set = 1,
}

impl TryFrom<u8> for FieldFlag {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(FieldFlag::NotSet),
            1 => Ok(FieldFlag::Set),
            other => Err(other),
        }
    }
}

/// Why a record was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mismatch {
    /// Envelope carries another record's tag
    Tag(u16),
    /// Envelope length differs from the record kind's length
    Length(u16),
    /// Presence flag byte is neither SET nor NOT_SET
    Flag(u8),
    /// Buffer ends before the declared record does
    Truncated,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mismatch::Tag(tag) => match RecordTag::try_from(*tag) {
                Ok(found) => write!(f, "unexpected tag {} ({} record)", tag, found),
                Err(_) => write!(f, "unexpected tag {} (unknown)", tag),
            },
            Mismatch::Length(len) => write!(f, "unexpected length {}", len),
            Mismatch::Flag(flag) => write!(f, "invalid presence flag 0x{:02x}", flag),
            Mismatch::Truncated => write!(f, "buffer truncated"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NvmError {
    /// Persisted bytes do not form a valid record of the expected kind.
    /// The decode destination is left untouched.
    #[error("{kind} record format mismatch: {reason}")]
    FormatMismatch { kind: RecordTag, reason: Mismatch },
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}

impl NvmError {
    pub(crate) fn mismatch(kind: RecordTag, reason: Mismatch) -> Self {
        NvmError::FormatMismatch { kind, reason }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_lengths() {
        assert_eq!(KEYS_LEN, 107);
        assert_eq!(FRAME_COUNTER_SLOT_LEN, 25);
        assert_eq!(FRAME_COUNTER_LEN, 216);
    }

    #[test]
    fn test_field_flag_bytes() {
        assert_eq!(FieldFlag::try_from(0), Ok(FieldFlag::NotSet));
        assert_eq!(FieldFlag::try_from(1), Ok(FieldFlag::Set));
        assert_eq!(FieldFlag::try_from(0xFF), Err(0xFF));
    }

    #[test]
    fn test_error_display() {
        let err = NvmError::mismatch(RecordTag::Keys, Mismatch::Tag(3));
        assert_eq!(
            err.to_string(),
            "KEYS record format mismatch: unexpected tag 3 (FRAME_COUNTER record)"
        );

        let err = NvmError::mismatch(RecordTag::KeyStorage, Mismatch::Tag(0x4242));
        assert_eq!(
            err.to_string(),
            "KEY_STORAGE record format mismatch: unexpected tag 16962 (unknown)"
        );
    }
}
