//! Command-line interface definitions for fileorg.
//!
//! Global options (verbosity, state directory, JSON errors) plus one
//! subcommand per workflow.
//!
//! # Example
//!
//! ```bash
//! # Scan a directory, reusing the cache when nothing changed
//! fileorg scan ~/Downloads
//!
//! # Report duplicates, keeping the oldest copy of each
//! fileorg dupes ~/Downloads --keep oldest
//!
//! # Move the extra copies aside as an undoable batch
//! fileorg dupes ~/Downloads --move-to ~/dupes --batch cleanup
//!
//! # Put them back
//! fileorg undo --batch cleanup
//! ```

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::duplicates::KeepStrategy;

/// Incremental directory scanner, duplicate finder and undoable file mover.
#[derive(Debug, Parser)]
#[command(name = "fileorg")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Directory holding the scan cache, the operation log and config.toml
    #[arg(long, value_name = "DIR", global = true, env = "FILEORG_STATE_DIR")]
    pub state_dir: Option<PathBuf>,

    /// Print errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Scan a directory and refresh its cache
    Scan(ScanArgs),
    /// Find duplicate files, optionally moving the extra copies aside
    Dupes(DupesArgs),
    /// Show recorded operations
    History(HistoryArgs),
    /// Reverse recorded moves and copies
    Undo(UndoArgs),
}

/// Options shared by commands that walk a directory.
#[derive(Debug, Args)]
pub struct WalkArgs {
    /// Directory to scan
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Ignore the scan cache for this run
    #[arg(long)]
    pub no_cache: bool,

    /// Include dotfiles and dot-directories
    #[arg(long)]
    pub include_hidden: bool,

    /// Additional directory name to skip (can be given multiple times)
    #[arg(short, long = "exclude", value_name = "NAME")]
    pub exclude: Vec<String>,

    /// Number of hashing threads
    #[arg(long, value_name = "N")]
    pub threads: Option<usize>,
}

/// Arguments for the scan subcommand.
#[derive(Debug, Args)]
pub struct ScanArgs {
    #[command(flatten)]
    pub walk: WalkArgs,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Arguments for the dupes subcommand.
#[derive(Debug, Args)]
pub struct DupesArgs {
    #[command(flatten)]
    pub walk: WalkArgs,

    /// Which copy of each group to keep (defaults to the configured strategy)
    #[arg(short, long, value_enum, value_name = "STRATEGY")]
    pub keep: Option<KeepStrategy>,

    /// Move every copy except the kept one into this directory
    #[arg(long, value_name = "DIR")]
    pub move_to: Option<PathBuf>,

    /// Label for the moved files, usable with `undo --batch`
    #[arg(long, value_name = "LABEL", requires = "move_to")]
    pub batch: Option<String>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Arguments for the history subcommand.
#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Maximum number of operations to show
    #[arg(short = 'n', long, default_value = "20")]
    pub limit: usize,

    /// Include deletes and already undone or failed operations
    #[arg(short, long)]
    pub all: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    pub output: OutputFormat,
}

/// Arguments for the undo subcommand.
#[derive(Debug, Args)]
pub struct UndoArgs {
    /// Operation id to undo
    #[arg(value_name = "ID", required_unless_present_any = ["batch", "last"])]
    pub id: Option<i64>,

    /// Undo every pending operation of a batch
    #[arg(long, value_name = "LABEL", conflicts_with_all = ["id", "last"])]
    pub batch: Option<String>,

    /// Undo the most recent undoable operation
    #[arg(long, conflicts_with = "id")]
    pub last: bool,

    /// Only check whether the undo would succeed
    #[arg(long)]
    pub dry_run: bool,
}

/// Output format for command results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable lines on stdout
    #[default]
    Text,
    /// Pretty-printed JSON on stdout
    Json,
}
