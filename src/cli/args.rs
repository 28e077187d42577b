//! CLI argument definitions using clap
//!
//! Commands:
//! - catalog-store init --config <path>
//! - catalog-store import --config <path> --metadata <file> --content <file> [--overwrite]
//! - catalog-store get --config <path> --id <uuid>
//! - catalog-store query --config <path>          (query JSON on stdin)
//! - catalog-store by-publisher --config <path>   (query JSON on stdin)
//! - catalog-store delete --config <path> --id <uuid>
//! - catalog-store reindex --config <path>

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use uuid::Uuid;

use crate::auth::{CallerContext, DefaultAccessPolicy};

const CLI_SUBJECT: &str = "catalog-store-cli";

/// Catalog file store administration
#[derive(Parser, Debug)]
#[command(name = "catalog-store")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

/// Identity the command acts as; superadmin unless narrowed
#[derive(Args, Debug, Clone, Default)]
pub struct CallerArgs {
    /// Act as a member of this publisher
    #[arg(long, conflicts_with = "anonymous")]
    pub publisher: Option<String>,

    /// Act as an unauthenticated caller
    #[arg(long)]
    pub anonymous: bool,
}

impl CallerArgs {
    pub fn policy(&self) -> DefaultAccessPolicy {
        if self.anonymous {
            return DefaultAccessPolicy::anonymous();
        }
        match &self.publisher {
            Some(publisher) => DefaultAccessPolicy::new(CallerContext::publisher(CLI_SUBJECT, publisher.as_str())),
            None => DefaultAccessPolicy::new(CallerContext::superadmin(CLI_SUBJECT)),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create an empty store
    Init {
        /// Path to configuration file
        #[arg(long, default_value = "./catalog-store.json")]
        config: PathBuf,
    },

    /// Store a file with its metadata
    Import {
        #[arg(long, default_value = "./catalog-store.json")]
        config: PathBuf,

        /// JSON file holding the file metadata
        #[arg(long)]
        metadata: PathBuf,

        /// File holding the content bytes
        #[arg(long)]
        content: PathBuf,

        /// Replace an existing record with the same id
        #[arg(long)]
        overwrite: bool,

        #[command(flatten)]
        caller: CallerArgs,
    },

    /// Print the state of one file
    Get {
        #[arg(long, default_value = "./catalog-store.json")]
        config: PathBuf,

        #[arg(long)]
        id: Uuid,

        #[command(flatten)]
        caller: CallerArgs,
    },

    /// Run a query read from stdin
    Query {
        #[arg(long, default_value = "./catalog-store.json")]
        config: PathBuf,

        #[command(flatten)]
        caller: CallerArgs,
    },

    /// Run a query read from stdin, grouped by publisher
    ByPublisher {
        #[arg(long, default_value = "./catalog-store.json")]
        config: PathBuf,

        #[command(flatten)]
        caller: CallerArgs,
    },

    /// Delete one file
    Delete {
        #[arg(long, default_value = "./catalog-store.json")]
        config: PathBuf,

        #[arg(long)]
        id: Uuid,

        #[command(flatten)]
        caller: CallerArgs,
    },

    /// Rebuild the fulltext index from storage
    Reindex {
        #[arg(long, default_value = "./catalog-store.json")]
        config: PathBuf,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
