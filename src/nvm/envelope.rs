//! TLV envelope and bounded record cursors
//!
//! Envelope structure:
//!   tag(2,BE) | len(2,BE)
//!
//! Decoders validate the envelope against the expected record kind before
//! touching any payload byte, then walk the payload through a `RecordReader`
//! that can never step past the declared length.

use std::fmt;

use bytes::{Buf, BufMut};

use super::{FieldFlag, Mismatch, NvmError};

/// Envelope length: tag(2) + len(2)
pub const ENVELOPE_LEN: usize = 4;

/// Record kinds (envelope tag values)
///
/// Tag 1 belongs to the network info record of the bootstrap layer and is
/// never produced here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u16)]
pub enum RecordTag {
    Keys = 2,
    FrameCounter = 3,
    KeyStorageIndex = 4,
    KeyStorage = 5,
}

impl RecordTag {
    /// Name of the record in the storage driver
    pub fn file_name(&self) -> &'static str {
        match self {
            RecordTag::Keys => "pae_keys",
            RecordTag::FrameCounter => "pae_frame_counter",
            RecordTag::KeyStorageIndex => "pae_key_storage_index",
            RecordTag::KeyStorage => "pae_key_storage",
        }
    }
}

impl TryFrom<u16> for RecordTag {
    type Error = anyhow::Error;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(RecordTag::Keys),
            3 => Ok(RecordTag::FrameCounter),
            4 => Ok(RecordTag::KeyStorageIndex),
            5 => Ok(RecordTag::KeyStorage),
            _ => Err(anyhow::anyhow!("Unknown record tag: {}", value)),
        }
    }
}

impl fmt::Display for RecordTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordTag::Keys => write!(f, "KEYS"),
            RecordTag::FrameCounter => write!(f, "FRAME_COUNTER"),
            RecordTag::KeyStorageIndex => write!(f, "KEY_STORAGE_INDEX"),
            RecordTag::KeyStorage => write!(f, "KEY_STORAGE"),
        }
    }
}

/// Raw envelope as found at the start of a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Envelope {
    pub tag: u16,
    pub len: u16,
}

impl Envelope {
    /// Read the envelope without validating it against any record kind
    pub fn peek(src: &[u8]) -> Option<Self> {
        if src.len() < ENVELOPE_LEN {
            return None;
        }
        let mut buf = src;
        let tag = buf.get_u16();
        let len = buf.get_u16();
        Some(Self { tag, len })
    }
}

/// Write the envelope for `kind` and return a writer over exactly `len`
/// payload bytes
pub fn write_envelope(dest: &mut [u8], kind: RecordTag, len: usize) -> Result<RecordWriter<'_>, NvmError> {
    let declared =
        u16::try_from(len).map_err(|_| NvmError::InvalidArgument("record length exceeds 65535"))?;
    if dest.len() < ENVELOPE_LEN + len {
        return Err(NvmError::InvalidArgument("record buffer too small"));
    }

    let (header, rest) = dest.split_at_mut(ENVELOPE_LEN);
    let mut header = header;
    header.put_u16(kind as u16);
    header.put_u16(declared);

    Ok(RecordWriter {
        buf: &mut rest[..len],
    })
}

/// Validate the envelope of `src` against `kind` and `len` and return a
/// reader over the payload
pub fn read_envelope(src: &[u8], kind: RecordTag, len: usize) -> Result<RecordReader<'_>, NvmError> {
    let envelope = Envelope::peek(src).ok_or_else(|| NvmError::mismatch(kind, Mismatch::Truncated))?;

    if envelope.tag != kind as u16 {
        return Err(NvmError::mismatch(kind, Mismatch::Tag(envelope.tag)));
    }
    if usize::from(envelope.len) != len {
        return Err(NvmError::mismatch(kind, Mismatch::Length(envelope.len)));
    }
    if src.len() < ENVELOPE_LEN + len {
        return Err(NvmError::mismatch(kind, Mismatch::Truncated));
    }

    Ok(RecordReader {
        kind,
        buf: &src[ENVELOPE_LEN..ENVELOPE_LEN + len],
    })
}

/// Bounded writer over a record payload
#[derive(Debug)]
pub struct RecordWriter<'a> {
    buf: &'a mut [u8],
}

impl<'a> RecordWriter<'a> {
    /// Payload bytes still to be written
    pub fn remaining(&self) -> usize {
        self.buf.remaining_mut()
    }

    fn reserve(&self, n: usize) -> Result<(), NvmError> {
        if self.buf.remaining_mut() < n {
            return Err(NvmError::InvalidArgument("write past end of record"));
        }
        Ok(())
    }

    pub fn put_flag(&mut self, flag: FieldFlag) -> Result<(), NvmError> {
        self.reserve(1)?;
        self.buf.put_u8(flag as u8);
        Ok(())
    }

    pub fn put_u16(&mut self, value: u16) -> Result<(), NvmError> {
        self.reserve(2)?;
        self.buf.put_u16(value);
        Ok(())
    }

    pub fn put_u32(&mut self, value: u32) -> Result<(), NvmError> {
        self.reserve(4)?;
        self.buf.put_u32(value);
        Ok(())
    }

    pub fn put_u64(&mut self, value: u64) -> Result<(), NvmError> {
        self.reserve(8)?;
        self.buf.put_u64(value);
        Ok(())
    }

    pub fn put_slice(&mut self, src: &[u8]) -> Result<(), NvmError> {
        self.reserve(src.len())?;
        self.buf.put_slice(src);
        Ok(())
    }

    /// Zero-fill `n` bytes (placeholder for an absent field)
    pub fn put_zeros(&mut self, n: usize) -> Result<(), NvmError> {
        self.reserve(n)?;
        self.buf.put_bytes(0, n);
        Ok(())
    }
}

/// Bounded reader over a record payload
///
/// Running past the end is reported as a truncated record rather than a
/// panic.
#[derive(Debug)]
pub struct RecordReader<'a> {
    kind: RecordTag,
    buf: &'a [u8],
}

impl<'a> RecordReader<'a> {
    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn ensure(&self, n: usize) -> Result<(), NvmError> {
        if self.buf.remaining() < n {
            return Err(NvmError::mismatch(self.kind, Mismatch::Truncated));
        }
        Ok(())
    }

    pub fn flag(&mut self) -> Result<FieldFlag, NvmError> {
        self.ensure(1)?;
        let kind = self.kind;
        FieldFlag::try_from(self.buf.get_u8()).map_err(|b| NvmError::mismatch(kind, Mismatch::Flag(b)))
    }

    pub fn u16(&mut self) -> Result<u16, NvmError> {
        self.ensure(2)?;
        Ok(self.buf.get_u16())
    }

    pub fn u32(&mut self) -> Result<u32, NvmError> {
        self.ensure(4)?;
        Ok(self.buf.get_u32())
    }

    pub fn u64(&mut self) -> Result<u64, NvmError> {
        self.ensure(8)?;
        Ok(self.buf.get_u64())
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], NvmError> {
        self.ensure(N)?;
        let mut out = [0u8; N];
        self.buf.copy_to_slice(&mut out);
        Ok(out)
    }

    /// Step over `n` reserved bytes without interpreting them
    pub fn skip(&mut self, n: usize) -> Result<(), NvmError> {
        self.ensure(n)?;
        self.buf.advance(n);
        Ok(())
    }

    /// Unread payload bytes
    pub fn rest(&self) -> &'a [u8] {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_big_endian() {
        let mut buf = [0u8; 6];
        let mut writer = write_envelope(&mut buf, RecordTag::KeyStorageIndex, 2).unwrap();
        writer.put_u16(0xBEEF).unwrap();
        assert_eq!(writer.remaining(), 0);

        assert_eq!(buf, [0x00, 0x04, 0x00, 0x02, 0xBE, 0xEF]);
        assert_eq!(Envelope::peek(&buf), Some(Envelope { tag: 4, len: 2 }));
    }

    #[test]
    fn test_write_envelope_small_buffer() {
        let mut buf = [0u8; 5];
        let result = write_envelope(&mut buf, RecordTag::Keys, 2);
        assert!(matches!(result, Err(NvmError::InvalidArgument(_))));
    }

    #[test]
    fn test_writer_cannot_overrun() {
        let mut buf = [0u8; 8];
        let mut writer = write_envelope(&mut buf, RecordTag::Keys, 3).unwrap();
        assert!(writer.put_u32(1).is_err());
        writer.put_u16(1).unwrap();
        writer.put_zeros(1).unwrap();
        assert!(writer.put_flag(FieldFlag::Set).is_err());
        // Byte beyond the declared payload stays untouched
        assert_eq!(buf[7], 0);
    }

    #[test]
    fn test_read_envelope_rejects_tag() {
        let buf = [0x00, 0x03, 0x00, 0x01, 0xAA];
        let result = read_envelope(&buf, RecordTag::Keys, 1);
        assert_eq!(
            result.unwrap_err(),
            NvmError::mismatch(RecordTag::Keys, Mismatch::Tag(3))
        );
    }

    #[test]
    fn test_read_envelope_rejects_length() {
        let buf = [0x00, 0x02, 0x00, 0x02, 0xAA, 0xBB];
        let result = read_envelope(&buf, RecordTag::Keys, 1);
        assert_eq!(
            result.unwrap_err(),
            NvmError::mismatch(RecordTag::Keys, Mismatch::Length(2))
        );
    }

    #[test]
    fn test_read_envelope_truncated() {
        assert_eq!(
            read_envelope(&[0x00, 0x02], RecordTag::Keys, 1).unwrap_err(),
            NvmError::mismatch(RecordTag::Keys, Mismatch::Truncated)
        );
        // Envelope claims more payload than the buffer holds
        assert_eq!(
            read_envelope(&[0x00, 0x02, 0x00, 0x04, 0x01], RecordTag::Keys, 4).unwrap_err(),
            NvmError::mismatch(RecordTag::Keys, Mismatch::Truncated)
        );
    }

    #[test]
    fn test_reader_bounds_and_flags() {
        let buf = [0x00, 0x05, 0x00, 0x03, 0x01, 0x07, 0x02, 0xFF];
        let mut reader = read_envelope(&buf, RecordTag::KeyStorage, 3).unwrap();
        assert_eq!(reader.flag().unwrap(), FieldFlag::Set);
        reader.skip(1).unwrap();
        assert_eq!(
            reader.flag().unwrap_err(),
            NvmError::mismatch(RecordTag::KeyStorage, Mismatch::Flag(2))
        );
        // Trailing byte outside the record is not reachable
        assert!(reader.u16().is_err());
    }

    #[test]
    fn test_tag_from_u16() {
        assert_eq!(RecordTag::try_from(3).unwrap(), RecordTag::FrameCounter);
        assert!(RecordTag::try_from(1).is_err());
    }
}
