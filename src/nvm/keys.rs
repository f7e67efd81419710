//! Keys record: EUI-64, PMK, PMK replay counter and PTK
//!
//! Payload structure:
//!   EUI64Flag(1) | EUI64(8)
//!   PMKFlag(1) | PMKLifetime(4) | PMK(32)
//!   PMKReplayCounter(8)
//!   PTKFlag(1) | PTKLifetime(4) | PTK(48)
//!
//! Absent fields are written as NOT_SET followed by zeros. The replay
//! counter has no flag and is always stored.

use tracing::info;

use super::envelope::{read_envelope, write_envelope, RecordReader, RecordTag, RecordWriter};
use super::{FieldFlag, NvmError, ENVELOPE_LEN, KEYS_LEN};
use crate::security::{Eui64, LifetimeKey, SecurityKeys, EUI64_LEN, PMK_LEN, PTK_LEN};

/// Encode `keys` into `dest`, returning the number of bytes written
pub fn encode_keys(dest: &mut [u8], keys: &SecurityKeys) -> Result<usize, NvmError> {
    let mut w = write_envelope(dest, RecordTag::Keys, KEYS_LEN)?;

    match keys.eui64() {
        Some(eui64) => {
            w.put_flag(FieldFlag::Set)?;
            w.put_slice(eui64)?;
        }
        None => {
            w.put_flag(FieldFlag::NotSet)?;
            w.put_zeros(EUI64_LEN)?;
        }
    }

    put_lifetime_key(&mut w, keys.pmk())?;
    w.put_u64(keys.pmk_replay_counter())?;
    put_lifetime_key(&mut w, keys.ptk())?;

    info!("NVM KEYS write");
    Ok(ENVELOPE_LEN + KEYS_LEN)
}

fn put_lifetime_key<const N: usize>(
    w: &mut RecordWriter<'_>,
    key: Option<&LifetimeKey<N>>,
) -> Result<(), NvmError> {
    match key {
        Some(key) => {
            w.put_flag(FieldFlag::Set)?;
            w.put_u32(key.lifetime())?;
            w.put_slice(key.key())
        }
        None => {
            w.put_flag(FieldFlag::NotSet)?;
            w.put_zeros(4 + N)
        }
    }
}

/// Contents of a keys record, parsed before anything is applied
struct KeysPayload {
    eui64: Option<Eui64>,
    pmk: Option<LifetimeKey<PMK_LEN>>,
    pmk_replay_counter: u64,
    ptk: Option<LifetimeKey<PTK_LEN>>,
}

impl KeysPayload {
    fn parse(r: &mut RecordReader<'_>) -> Result<Self, NvmError> {
        let eui64 = match r.flag()? {
            FieldFlag::Set => Some(r.array::<EUI64_LEN>()?),
            FieldFlag::NotSet => {
                r.skip(EUI64_LEN)?;
                None
            }
        };
        let pmk = take_lifetime_key(r)?;
        let pmk_replay_counter = r.u64()?;
        let ptk = take_lifetime_key(r)?;

        Ok(Self {
            eui64,
            pmk,
            pmk_replay_counter,
            ptk,
        })
    }
}

fn take_lifetime_key<const N: usize>(
    r: &mut RecordReader<'_>,
) -> Result<Option<LifetimeKey<N>>, NvmError> {
    match r.flag()? {
        FieldFlag::Set => {
            let lifetime = r.u32()?;
            Ok(Some(LifetimeKey::new(r.array::<N>()?, lifetime)))
        }
        FieldFlag::NotSet => {
            r.skip(4 + N)?;
            Ok(None)
        }
    }
}

/// Decode a keys record into `keys`
///
/// Fields stored as NOT_SET leave the corresponding field of `keys` as it
/// was. On success the key set is marked clean. On error `keys` is not
/// modified.
pub fn decode_keys(src: &[u8], keys: &mut SecurityKeys) -> Result<(), NvmError> {
    let mut r = read_envelope(src, RecordTag::Keys, KEYS_LEN)?;
    let payload = KeysPayload::parse(&mut r)?;

    if let Some(eui64) = payload.eui64 {
        keys.set_eui64(eui64);
    }
    // Keys move into the destination; no plain copies are left behind
    if let Some(pmk) = payload.pmk {
        keys.set_pmk(pmk);
    }
    keys.set_pmk_replay_counter(payload.pmk_replay_counter);
    if let Some(ptk) = payload.ptk {
        keys.set_ptk(ptk);
    }
    keys.reset_updated();

    info!("NVM KEYS read");
    Ok(())
}
