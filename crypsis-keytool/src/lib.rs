//! Command-line driver for the Crypsis key-management core.
//!
//! The library half exists so integration tests can run commands against
//! an in-memory or temporary key store.

mod commands;
mod config;
mod error;

pub use commands::{execute, Command};
pub use config::{Config, StoreKind};
pub use error::ToolError;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "crypsis-keytool", version, about = "Manage Crypsis identity keys")]
pub struct Cli {
    #[command(flatten)]
    pub config: Config,

    #[command(subcommand)]
    pub command: Command,
}

/// Open the configured store and run the command.
///
/// Commands that print a fresh recovery code are refused on the memory
/// store, since the key it unlocks would be gone once the process exits.
pub fn run(cli: Cli) -> Result<String, ToolError> {
    if cli.config.store == StoreKind::Memory {
        if let Some(name) = cli.command.writes_key() {
            return Err(ToolError::EphemeralStore(name));
        }
    }
    let store = cli.config.open_store();
    execute(cli.command, store.as_ref())
}
