//! CLI module for catalog-store
//!
//! Provides command-line administration of a catalog file store:
//! - init: Create the storage directory
//! - import / get / delete: Single-file operations
//! - query / by-publisher: Queries read as JSON from stdin
//! - reindex: Rebuild the fulltext index

mod args;
mod commands;
mod errors;
mod io;

pub use args::{CallerArgs, Cli, Command};
pub use commands::{by_publisher, delete, get, import, init, query, reindex, run_command};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{read_request, write_error, write_response};

/// Parse arguments and run the selected command
pub fn run() -> CliResult<()> {
    run_command(Cli::parse_args().command)
}
