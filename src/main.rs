//! catalog-store CLI entry point
//!
//! Installs the JSON log subscriber (filter from `CATALOG_STORE_LOG`,
//! default `info`), then delegates to the CLI module. Logs go to stderr so
//! stdout carries only the response envelope.

use catalog_store::cli;
use tracing_subscriber::EnvFilter;

const LOG_ENV: &str = "CATALOG_STORE_LOG";

fn main() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = cli::run() {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}
