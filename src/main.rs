use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ws_pae_nvm::config::Config;
use ws_pae_nvm::nvm::persist::KEY_STORAGE_MAX;
use ws_pae_nvm::nvm::{
    decode_frame_counters, FileStore, FrameCounterMeta, NvmStore, PaeNvm, RecordTag,
};
use ws_pae_nvm::security::{FrameCounters, SecurityKeys};

#[derive(Parser)]
#[command(name = "pae-nvm")]
#[command(about = "Inspect Wi-SUN PAE security records in non-volatile storage")]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "pae-nvm.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Decode and print every stored record (key material is never printed)
    Show {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove every stored record
    Erase,
}

#[derive(Debug, Serialize)]
struct Report {
    store: PathBuf,
    keys: Option<KeysReport>,
    frame_counters: Option<FrameCountersReport>,
    key_storage_index: u64,
    key_storage: Vec<KeyStorageReport>,
}

#[derive(Debug, Serialize)]
struct KeysReport {
    eui64: Option<String>,
    pmk_lifetime: Option<u32>,
    pmk_replay_counter: u64,
    ptk_lifetime: Option<u32>,
}

#[derive(Debug, Serialize)]
struct FrameCountersReport {
    #[serde(flatten)]
    meta: FrameCounterMeta,
    stored_at: Option<DateTime<Utc>>,
    gtk: Vec<Option<SlotReport>>,
    lgtk: Vec<Option<SlotReport>>,
}

#[derive(Debug, Serialize)]
struct SlotReport {
    frame_counter: u32,
    max_frame_counter_chg: u32,
}

#[derive(Debug, Serialize)]
struct KeyStorageReport {
    index: u8,
    valid: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = Config::load(&cli.config).unwrap_or_else(|e| {
        eprintln!("Warning: Failed to load config from {:?}: {}", cli.config, e);
        eprintln!("Using default configuration");
        Config::default()
    });

    // Logs go to stderr so JSON output stays clean
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("pae-nvm v{}", env!("CARGO_PKG_VERSION"));

    let store = FileStore::open(&config.store.path)?;
    info!("Using NVM store at {:?}", store.dir());
    let mut nvm = PaeNvm::new(store, config.nvm.clone());

    match cli.command {
        Command::Show { json } => {
            let report = build_report(&nvm)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_report(&report);
            }
        }
        Command::Erase => {
            nvm.remove_all()?;
            info!("Erased all PAE records in {:?}", config.store.path);
        }
    }

    Ok(())
}

fn build_report(nvm: &PaeNvm<FileStore>) -> anyhow::Result<Report> {
    let mut keys = SecurityKeys::new();
    let keys = if nvm.load_keys(&mut keys)? {
        Some(KeysReport {
            eui64: keys.eui64().map(hex::encode),
            pmk_lifetime: keys.pmk().map(|k| k.lifetime()),
            pmk_replay_counter: keys.pmk_replay_counter(),
            ptk_lifetime: keys.ptk().map(|k| k.lifetime()),
        })
    } else {
        None
    };

    // Decode directly: the persistence layer would advance the counters
    let frame_counters = match nvm.store().read(RecordTag::FrameCounter.file_name())? {
        Some(record) => {
            let mut gtk = FrameCounters::new();
            let mut lgtk = FrameCounters::new();
            match decode_frame_counters(&record, &mut gtk, &mut lgtk) {
                Ok(meta) => Some(FrameCountersReport {
                    meta,
                    stored_at: i64::try_from(meta.stored_time)
                        .ok()
                        .and_then(|secs| DateTime::from_timestamp(secs, 0)),
                    gtk: slot_reports(&gtk),
                    lgtk: slot_reports(&lgtk),
                }),
                Err(e) => {
                    tracing::warn!("{}", e);
                    None
                }
            }
        }
        None => None,
    };

    let key_storage_index = nvm.load_key_storage_index()?;
    let mut key_storage = Vec::new();
    for index in 0..KEY_STORAGE_MAX {
        if key_storage_index & (1u64 << index) != 0 {
            key_storage.push(KeyStorageReport {
                index,
                valid: nvm.load_key_storage(index)?.is_some(),
            });
        }
    }

    Ok(Report {
        store: nvm.store().dir().to_path_buf(),
        keys,
        frame_counters,
        key_storage_index,
        key_storage,
    })
}

fn slot_reports(counters: &FrameCounters) -> Vec<Option<SlotReport>> {
    counters
        .slots()
        .iter()
        .map(|slot| {
            slot.as_ref().map(|entry| SlotReport {
                frame_counter: entry.frame_counter,
                max_frame_counter_chg: entry.max_frame_counter_chg,
            })
        })
        .collect()
}

fn print_report(report: &Report) {
    println!("Store: {}", report.store.display());

    match &report.keys {
        Some(keys) => {
            println!("Keys:");
            println!("  EUI-64: {}", keys.eui64.as_deref().unwrap_or("-"));
            println!("  PMK: {}", lifetime(keys.pmk_lifetime));
            println!("  PMK replay counter: {}", keys.pmk_replay_counter);
            println!("  PTK: {}", lifetime(keys.ptk_lifetime));
        }
        None => println!("Keys: none"),
    }

    match &report.frame_counters {
        Some(fc) => {
            println!("Frame counters:");
            println!("  Restart count: {}", fc.meta.restart_count);
            println!(
                "  Stored time: {} ({})",
                fc.meta.stored_time,
                fc.stored_at
                    .map(|t| t.to_rfc3339())
                    .unwrap_or_else(|| "-".to_string())
            );
            println!(
                "  PAN version: {}  LFN PAN version: {}",
                fc.meta.pan_version, fc.meta.lgtk_pan_version
            );
            print_slots("GTK", &fc.gtk);
            print_slots("LGTK", &fc.lgtk);
        }
        None => println!("Frame counters: none"),
    }

    println!("Key storage index: {:016X}", report.key_storage_index);
    for entry in &report.key_storage {
        println!(
            "  [{}] {}",
            entry.index,
            if entry.valid { "valid" } else { "invalid" }
        );
    }
}

fn print_slots(name: &str, slots: &[Option<SlotReport>]) {
    for (index, slot) in slots.iter().enumerate() {
        match slot {
            Some(s) => println!(
                "  {}[{}]: FrameCounter={} MaxChg={}",
                name, index, s.frame_counter, s.max_frame_counter_chg
            ),
            None => println!("  {}[{}]: -", name, index),
        }
    }
}

fn lifetime(value: Option<u32>) -> String {
    value
        .map(|l| format!("set, lifetime {} s", l))
        .unwrap_or_else(|| "not set".to_string())
}
