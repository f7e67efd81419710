//! Key storage records
//!
//! Index record payload:
//!   Bitfield(8,BE)   bit n set = key storage record n is in use
//!
//! Key storage (container) record payload:
//!   opaque bytes, length = total record length - envelope length
//!
//! The container payload belongs to the key storage entry layer; this
//! module only creates and validates the record around it.

use tracing::{debug, info};

use super::envelope::{read_envelope, write_envelope, RecordTag};
use super::{NvmError, ENVELOPE_LEN, KEY_STORAGE_INDEX_LEN};

/// Encode the key storage index bitfield into `dest`
pub fn encode_key_storage_index(dest: &mut [u8], bitfield: u64) -> Result<usize, NvmError> {
    let mut w = write_envelope(dest, RecordTag::KeyStorageIndex, KEY_STORAGE_INDEX_LEN)?;
    w.put_u64(bitfield)?;

    info!("NVM KEY STORAGE INDEX write");
    Ok(ENVELOPE_LEN + KEY_STORAGE_INDEX_LEN)
}

pub fn decode_key_storage_index(src: &[u8]) -> Result<u64, NvmError> {
    let mut r = read_envelope(src, RecordTag::KeyStorageIndex, KEY_STORAGE_INDEX_LEN)?;
    let bitfield = r.u64()?;

    info!("NVM KEY STORAGE INDEX read");
    Ok(bitfield)
}

fn container_payload_len(total_len: usize) -> Result<usize, NvmError> {
    match total_len.checked_sub(ENVELOPE_LEN) {
        Some(len) if len > usize::from(u16::MAX) => {
            Err(NvmError::InvalidArgument("record length exceeds 65535"))
        }
        Some(len) if len > 0 => Ok(len),
        _ => Err(NvmError::InvalidArgument(
            "key storage length must exceed the envelope",
        )),
    }
}

/// Create an empty key storage record of `total_len` bytes in `dest`
///
/// The whole record is zeroed before the envelope is written.
pub fn encode_key_storage(dest: &mut [u8], total_len: usize) -> Result<usize, NvmError> {
    let len = container_payload_len(total_len)?;
    if dest.len() < total_len {
        return Err(NvmError::InvalidArgument("record buffer too small"));
    }
    dest[..total_len].fill(0);
    write_envelope(dest, RecordTag::KeyStorage, len)?;

    debug!("NVM KEY STORAGE create");
    Ok(total_len)
}

/// Validate a key storage record of `total_len` bytes and return its payload
///
/// The payload is handed back uninterpreted.
pub fn decode_key_storage(src: &[u8], total_len: usize) -> Result<&[u8], NvmError> {
    let len = container_payload_len(total_len)?;
    let r = read_envelope(src, RecordTag::KeyStorage, len)?;

    debug!("NVM KEY STORAGE read");
    Ok(r.rest())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nvm::Mismatch;

    #[test]
    fn test_index_bitfield_exact() {
        let mut record = [0u8; ENVELOPE_LEN + KEY_STORAGE_INDEX_LEN];
        encode_key_storage_index(&mut record, 0xA5A5_A5A5_A5A5_A5A5).unwrap();

        assert_eq!(&record[0..4], &[0x00, 0x04, 0x00, 0x08]);
        assert_eq!(decode_key_storage_index(&record).unwrap(), 0xA5A5_A5A5_A5A5_A5A5);
    }

    #[test]
    fn test_index_is_big_endian() {
        let mut record = [0u8; ENVELOPE_LEN + KEY_STORAGE_INDEX_LEN];
        encode_key_storage_index(&mut record, 1).unwrap();
        assert_eq!(record[ENVELOPE_LEN + 7], 1);
        assert!(record[ENVELOPE_LEN..ENVELOPE_LEN + 7].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_index_rejects_container_tag() {
        let mut record = [0u8; 12];
        encode_key_storage(&mut record, 12).unwrap();
        assert_eq!(
            decode_key_storage_index(&record).unwrap_err(),
            NvmError::FormatMismatch {
                kind: RecordTag::KeyStorageIndex,
                reason: Mismatch::Tag(5)
            }
        );
    }

    #[test]
    fn test_container_length_derivation() {
        let mut record = [0xFFu8; 64];
        assert_eq!(encode_key_storage(&mut record, 64).unwrap(), 64);
        assert_eq!(&record[0..4], &[0x00, 0x05, 0x00, 60]);

        let payload = decode_key_storage(&record, 64).unwrap();
        assert_eq!(payload.len(), 60);
        assert!(payload.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_container_mismatched_total_length() {
        let mut record = [0u8; 64];
        encode_key_storage(&mut record, 64).unwrap();

        assert_eq!(
            decode_key_storage(&record, 48).unwrap_err(),
            NvmError::FormatMismatch {
                kind: RecordTag::KeyStorage,
                reason: Mismatch::Length(60)
            }
        );
    }

    #[test]
    fn test_container_oversized_leaves_buffer_untouched() {
        let total = ENVELOPE_LEN + usize::from(u16::MAX) + 1;
        let mut record = vec![0xEEu8; total];
        assert_eq!(
            encode_key_storage(&mut record, total).unwrap_err(),
            NvmError::InvalidArgument("record length exceeds 65535")
        );
        assert!(record.iter().all(|b| *b == 0xEE));

        // Largest declarable payload still works
        let mut record = vec![0xEEu8; total - 1];
        assert_eq!(encode_key_storage(&mut record, total - 1).unwrap(), total - 1);
        assert_eq!(&record[0..4], &[0x00, 0x05, 0xFF, 0xFF]);
    }

    #[test]
    fn test_container_invalid_total_length() {
        let mut record = [0u8; 8];
        assert!(matches!(
            encode_key_storage(&mut record, 0),
            Err(NvmError::InvalidArgument(_))
        ));
        assert!(matches!(
            decode_key_storage(&record, ENVELOPE_LEN),
            Err(NvmError::InvalidArgument(_))
        ));
        assert!(matches!(
            encode_key_storage(&mut record, 16),
            Err(NvmError::InvalidArgument(_))
        ));
    }
}
