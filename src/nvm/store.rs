//! Storage drivers for NVM records
//!
//! Records are addressed by name (`pae_keys`, `pae_frame_counter`, ...).
//! A driver only moves opaque bytes; validation is done by the codecs.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use anyhow::Context;
use tracing::debug;

/// Byte-addressable record storage
pub trait NvmStore {
    /// Read a record, `None` when it was never written or was removed
    fn read(&self, name: &str) -> anyhow::Result<Option<Vec<u8>>>;

    /// Write a record, replacing any previous contents
    fn persist(&mut self, name: &str, record: &[u8]) -> anyhow::Result<()>;

    /// Remove a record. Removing a missing record is not an error.
    fn remove(&mut self, name: &str) -> anyhow::Result<()>;
}

/// Volatile store, used in tests and for dry runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: HashMap<String, Vec<u8>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl NvmStore for MemoryStore {
    fn read(&self, name: &str) -> anyhow::Result<Option<Vec<u8>>> {
        Ok(self.records.get(name).cloned())
    }

    fn persist(&mut self, name: &str, record: &[u8]) -> anyhow::Result<()> {
        self.records.insert(name.to_string(), record.to_vec());
        Ok(())
    }

    fn remove(&mut self, name: &str) -> anyhow::Result<()> {
        self.records.remove(name);
        Ok(())
    }
}

/// One file per record inside a directory
///
/// Writes go to a temporary file that is renamed over the record, so a
/// power loss leaves either the old or the new record.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open (and create if needed) the store directory
    pub fn open(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create NVM directory {:?}", dir))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

impl NvmStore for FileStore {
    fn read(&self, name: &str) -> anyhow::Result<Option<Vec<u8>>> {
        let path = self.path(name);
        match fs::read(&path) {
            Ok(bytes) => {
                debug!("Read {} bytes from {:?}", bytes.len(), path);
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read NVM record {:?}", path)),
        }
    }

    fn persist(&mut self, name: &str, record: &[u8]) -> anyhow::Result<()> {
        let path = self.path(name);
        let tmp = self.path(&format!("{}.tmp", name));
        fs::write(&tmp, record)
            .with_context(|| format!("Failed to write NVM record {:?}", tmp))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to replace NVM record {:?}", path))?;
        debug!("Wrote {} bytes to {:?}", record.len(), path);
        Ok(())
    }

    fn remove(&mut self, name: &str) -> anyhow::Result<()> {
        let path = self.path(name);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to remove NVM record {:?}", path)),
        }
    }
}
