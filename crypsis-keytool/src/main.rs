use clap::Parser;
use crypsis_keytool::{run, Cli};
use std::process::ExitCode;
use tracing::error;
use tracing_subscriber::EnvFilter;

fn main() -> ExitCode {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cli.config.log_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(cli) {
        Ok(output) => {
            println!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            if e.is_wrong_secret() {
                error!("Recovery code is incorrect or the stored key is corrupt");
            } else {
                error!("{}", e);
            }
            ExitCode::FAILURE
        }
    }
}
