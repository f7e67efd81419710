//! PAE NVM persistence: codecs on top of a storage driver
//!
//! This is what the PAE controller calls on a persistence trigger and once
//! at startup. A record that is missing or fails validation is treated as
//! "nothing stored": the caller keeps its defaults and re-authenticates.

use tracing::{info, warn};
use zeroize::Zeroizing;

use super::envelope::{RecordTag, ENVELOPE_LEN};
use super::frame_counter::{decode_frame_counters, encode_frame_counters, FrameCounterMeta};
use super::key_storage::{
    decode_key_storage, decode_key_storage_index, encode_key_storage, encode_key_storage_index,
};
use super::keys::{decode_keys, encode_keys};
use super::store::NvmStore;
use super::{NvmError, FRAME_COUNTER_LEN, KEYS_LEN, KEY_STORAGE_INDEX_LEN};
use crate::config::NvmConfig;
use crate::security::{FrameCounters, SecurityKeys};

/// Number of key storage records the index bitfield can address
pub const KEY_STORAGE_MAX: u8 = 64;

/// Name of key storage record `index`
pub fn key_storage_name(index: u8) -> String {
    format!("{}_{}", RecordTag::KeyStorage.file_name(), index)
}

pub struct PaeNvm<S: NvmStore> {
    store: S,
    config: NvmConfig,
    restart_count: u32,
}

impl<S: NvmStore> PaeNvm<S> {
    pub fn new(store: S, config: NvmConfig) -> Self {
        Self {
            store,
            config,
            restart_count: 0,
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    /// Restart count written with the next frame counter record
    pub fn restart_count(&self) -> u32 {
        self.restart_count
    }

    /// Stored records carry key material and are wiped once decoded
    fn read(&self, name: &str) -> anyhow::Result<Option<Zeroizing<Vec<u8>>>> {
        Ok(self.store.read(name)?.map(Zeroizing::new))
    }

    pub fn store_keys(&mut self, keys: &SecurityKeys) -> anyhow::Result<()> {
        let mut record = Zeroizing::new([0u8; ENVELOPE_LEN + KEYS_LEN]);
        encode_keys(record.as_mut_slice(), keys)?;
        self.store.persist(RecordTag::Keys.file_name(), record.as_slice())
    }

    /// Restore `keys` from NVM. Returns `false` when nothing valid is stored.
    pub fn load_keys(&self, keys: &mut SecurityKeys) -> anyhow::Result<bool> {
        let Some(record) = self.read(RecordTag::Keys.file_name())? else {
            return Ok(false);
        };
        Ok(accept(decode_keys(&record, keys))?.is_some())
    }

    /// Store frame counters with the current restart count
    pub fn store_frame_counters(
        &mut self,
        gtk_counters: &FrameCounters,
        lgtk_counters: &FrameCounters,
        pan_version: u16,
        lgtk_pan_version: u16,
        stored_time: u64,
    ) -> anyhow::Result<()> {
        let meta = FrameCounterMeta {
            restart_count: self.restart_count,
            stored_time,
            pan_version,
            lgtk_pan_version,
        };
        let mut record = Zeroizing::new([0u8; ENVELOPE_LEN + FRAME_COUNTER_LEN]);
        encode_frame_counters(record.as_mut_slice(), &meta, gtk_counters, lgtk_counters)?;
        self.store.persist(RecordTag::FrameCounter.file_name(), record.as_slice())
    }

    /// Restore frame counters and move them forward by the configured margin
    ///
    /// The restart count for this session becomes the stored one plus one.
    /// Returns the metadata as it was stored.
    pub fn load_frame_counters(
        &mut self,
        gtk_counters: &mut FrameCounters,
        lgtk_counters: &mut FrameCounters,
    ) -> anyhow::Result<Option<FrameCounterMeta>> {
        let Some(record) = self.read(RecordTag::FrameCounter.file_name())? else {
            return Ok(None);
        };
        let Some(meta) = accept(decode_frame_counters(&record, gtk_counters, lgtk_counters))? else {
            return Ok(None);
        };

        gtk_counters.advance(self.config.frame_counter_margin);
        lgtk_counters.advance(self.config.frame_counter_margin);
        self.restart_count = meta.restart_count.wrapping_add(1);

        info!(
            "Frame counters restored (restart {}, margin {})",
            self.restart_count, self.config.frame_counter_margin
        );
        Ok(Some(meta))
    }

    pub fn store_key_storage_index(&mut self, bitfield: u64) -> anyhow::Result<()> {
        let mut record = [0u8; ENVELOPE_LEN + KEY_STORAGE_INDEX_LEN];
        encode_key_storage_index(&mut record, bitfield)?;
        self.store
            .persist(RecordTag::KeyStorageIndex.file_name(), &record)
    }

    /// Occupied key storage records; 0 when nothing valid is stored
    pub fn load_key_storage_index(&self) -> anyhow::Result<u64> {
        let Some(record) = self.read(RecordTag::KeyStorageIndex.file_name())? else {
            return Ok(0);
        };
        Ok(accept(decode_key_storage_index(&record))?.unwrap_or(0))
    }

    /// Write an empty key storage record for `index`
    pub fn create_key_storage(&mut self, index: u8) -> anyhow::Result<()> {
        check_index(index)?;
        let mut record = vec![0u8; self.config.key_storage_len];
        encode_key_storage(&mut record, self.config.key_storage_len)?;
        self.store.persist(&key_storage_name(index), &record)
    }

    /// Payload of key storage record `index`, `None` when missing or invalid
    pub fn load_key_storage(&self, index: u8) -> anyhow::Result<Option<Vec<u8>>> {
        check_index(index)?;
        let Some(record) = self.read(&key_storage_name(index))? else {
            return Ok(None);
        };
        let payload = accept(decode_key_storage(&record, self.config.key_storage_len))?;
        Ok(payload.map(<[u8]>::to_vec))
    }

    /// Erase every record this layer owns
    pub fn remove_all(&mut self) -> anyhow::Result<()> {
        for tag in [
            RecordTag::Keys,
            RecordTag::FrameCounter,
            RecordTag::KeyStorageIndex,
        ] {
            self.store.remove(tag.file_name())?;
        }
        for index in 0..KEY_STORAGE_MAX {
            self.store.remove(&key_storage_name(index))?;
        }
        info!("NVM records removed");
        Ok(())
    }
}

fn check_index(index: u8) -> anyhow::Result<()> {
    if index >= KEY_STORAGE_MAX {
        anyhow::bail!("Key storage index {} out of range", index);
    }
    Ok(())
}

/// Format mismatches mean "nothing stored"; anything else is a real error
fn accept<T>(result: Result<T, NvmError>) -> anyhow::Result<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(e @ NvmError::FormatMismatch { .. }) => {
            warn!("Ignoring stored record: {}", e);
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}
