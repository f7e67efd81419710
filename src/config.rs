use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
pub struct Config {
    pub store: StoreConfig,
    pub nvm: NvmConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    /// Directory holding one file per record
    pub path: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NvmConfig {
    /// Added to every restored frame counter before transmitting again
    pub frame_counter_margin: u32,
    /// Total size of one key storage record (envelope included)
    pub key_storage_len: usize,
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Config {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {:?}: {}", path, e))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Failed to parse config file: {}", e))?;
        Ok(config)
    }
}

impl Default for NvmConfig {
    fn default() -> Self {
        Self {
            frame_counter_margin: 1_000_000,
            key_storage_len: 1024,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig {
                path: PathBuf::from("pae-nvm"),
            },
            nvm: NvmConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}
