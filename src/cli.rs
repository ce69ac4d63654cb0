//! CLI argument parsing using clap.

use clap::{Parser, Subcommand};

use crate::format::ColorMode;

/// repodex - local git-aware code index and keyword search
///
/// Maintains an on-disk inverted index over chunked source files and
/// answers ranked keyword searches with snippets.
#[derive(Parser, Debug)]
#[command(name = "repodex")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create .repodex with detected profiles and default config
    Init {
        /// Overwrite an existing .repodex directory
        #[arg(long)]
        force: bool,
    },

    /// Show index state and the sync plan
    Status {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Reconcile the index with the current working tree
    Sync,

    /// Ranked keyword search over indexed chunks
    Search {
        /// Whitespace-separated keywords
        #[arg(long)]
        q: String,

        /// Maximum number of results (1-20)
        #[arg(long = "top_k", default_value_t = 20)]
        top_k: usize,

        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,

        /// Plain output without alignment or escape-sensitive prefixes
        #[arg(long = "no-format")]
        no_format: bool,

        /// Append scores to hit headers
        #[arg(long)]
        score: bool,

        /// Group results by matched query term
        #[arg(long)]
        explain: bool,

        /// Attach enclosing function scopes to results
        #[arg(long)]
        scope: bool,

        /// When to use ANSI colors
        #[arg(long, value_enum, default_value = "auto")]
        color: ColorMode,
    },

    /// Print source lines for chunk ids
    Fetch {
        /// Comma-separated chunk ids (max 5)
        #[arg(long, value_delimiter = ',', required = true)]
        ids: Vec<u32>,

        /// Lines per chunk (1-120)
        #[arg(long = "max_lines", default_value_t = 0)]
        max_lines: usize,
    },

    /// Index maintenance aliases
    Index {
        #[command(subcommand)]
        command: IndexCommands,
    },

    /// Serve the line-framed JSON protocol
    Serve {
        /// Read requests from stdin, one JSON object per line
        #[arg(long)]
        stdio: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum IndexCommands {
    /// Alias of `sync`
    Sync,
    /// Alias of `status`
    Status {
        /// Emit JSON instead of text
        #[arg(long)]
        json: bool,
    },
}
