use clap::{Args, ValueEnum};
use crypsis_core::{FileKeyStore, KeyStore, KeyringStore, MemoryKeyStore};
use std::path::PathBuf;
use tracing::debug;

const DEFAULT_STORE_PATH: &str = "crypsis-keys.json";
const DEFAULT_LOG_LEVEL: &str = "info";

/// Where encrypted private keys are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// JSON file at `--store-path`
    File,
    /// OS credential manager
    Keyring,
    /// Nothing survives the process; `enroll` and `rotate-code` are refused
    Memory,
}

/// Settings shared by every command. Each can come from a flag, the
/// environment, or a `.env` file, in that order of precedence.
#[derive(Debug, Clone, Args)]
pub struct Config {
    /// Key store backend
    #[arg(long, env = "CRYPSIS_KEYSTORE", value_enum, default_value_t = StoreKind::File)]
    pub store: StoreKind,

    /// Key file used by the `file` backend
    #[arg(long, env = "CRYPSIS_KEYSTORE_PATH", default_value = DEFAULT_STORE_PATH)]
    pub store_path: PathBuf,

    /// Log filter when RUST_LOG is unset
    #[arg(long, env = "CRYPSIS_LOG", default_value = DEFAULT_LOG_LEVEL)]
    pub log_level: String,
}

impl Config {
    pub fn open_store(&self) -> Box<dyn KeyStore> {
        debug!(store = ?self.store, "opening key store");
        match self.store {
            StoreKind::File => Box::new(FileKeyStore::new(&self.store_path)),
            StoreKind::Keyring => Box::new(KeyringStore::default()),
            StoreKind::Memory => Box::new(MemoryKeyStore::new()),
        }
    }
}
