use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use vbasync_core::config::ConflictStrategy;
use vbasync_core::sync::OrphanAction;

/// VBA Synchronization Tool for Visio
///
/// Export the VBA modules of Visio documents as text files, import them back,
/// and keep both sides in sync while editing
#[derive(Parser, Debug)]
#[command(name = "vbasync")]
#[command(about, long_about = None, version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Use specific config file
    #[arg(long, global = true, value_name = "PATH", conflicts_with = "no_config")]
    pub config: Option<PathBuf>,

    /// Ignore all config files
    #[arg(long, global = true, conflicts_with = "config")]
    pub no_config: bool,

    /// Host state file standing in for the running host application
    #[arg(long, global = true, value_name = "PATH", env = "VBASYNC_HOST_STATE")]
    pub host_state: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export VBA modules to text files
    Export {
        #[command(flatten)]
        sync: SyncArgs,

        /// Export directory (default: current directory)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,
    },

    /// Import text files into the VBA project
    Import {
        #[command(flatten)]
        sync: SyncArgs,

        /// Import directory (default: current directory)
        #[arg(short, long, value_name = "DIR")]
        input: Option<PathBuf>,
    },

    /// Export, then keep files and document in sync until Ctrl+C
    Edit {
        #[command(flatten)]
        sync: SyncArgs,

        /// Export directory (default: current directory)
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Remove host modules when their files are deleted
        #[arg(long)]
        sync_delete: bool,

        /// Only push local edits, never poll the document
        #[arg(long)]
        no_bidirectional: bool,

        /// Seconds between document polls
        #[arg(long, value_name = "SECS")]
        poll_interval: Option<u64>,
    },

    /// Show discovered config files and effective settings
    Config,
}

/// Options shared by the sync commands
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Visio document (.vsdm, .vssm, .vstm)
    #[arg(short, long, value_name = "PATH")]
    pub file: PathBuf,

    /// Allow replacing the document code-behind module
    #[arg(long)]
    pub force: bool,

    /// Host codepage (cp1252, windows-1251, ...)
    #[arg(long, value_name = "NAME")]
    pub codepage: Option<String>,

    /// Map @Folder annotations to sub-directories
    #[arg(long)]
    pub hierarchical: bool,

    /// Conflict resolution strategy
    #[arg(long, value_enum)]
    pub conflict: Option<ConflictMode>,

    /// What to do with local files whose module is gone from the document
    #[arg(long, value_enum)]
    pub orphans: Option<OrphanMode>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ConflictMode {
    /// Ask for every conflict (default)
    Prompt,
    /// Overwrite the target side
    Overwrite,
    /// Leave the target side untouched
    Skip,
    /// Stop processing the document on the first conflict
    Cancel,
}

impl From<ConflictMode> for ConflictStrategy {
    fn from(mode: ConflictMode) -> Self {
        match mode {
            ConflictMode::Prompt => Self::Prompt,
            ConflictMode::Overwrite => Self::Overwrite,
            ConflictMode::Skip => Self::Skip,
            ConflictMode::Cancel => Self::Cancel,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OrphanMode {
    /// Leave the files in place
    Keep,
    /// Delete the files
    Delete,
    /// Import the files into the document
    Import,
}

impl From<OrphanMode> for OrphanAction {
    fn from(mode: OrphanMode) -> Self {
        match mode {
            OrphanMode::Keep => Self::Keep,
            OrphanMode::Delete => Self::Delete,
            OrphanMode::Import => Self::Import,
        }
    }
}
