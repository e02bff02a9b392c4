use std::path::PathBuf;

use clap::{Parser, Subcommand};
use notesync_core::Mode;

#[derive(Parser)]
#[command(name = "notesync")]
#[command(about = "Inspect and drive locally synced note documents")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Optional path to local database file
    #[arg(long, global = true, value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// JSON file overriding sync timings and retry policy
    #[arg(long, global = true, value_name = "PATH")]
    pub settings: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the verified local copy of a document
    Show {
        /// Document ID
        id: String,
    },
    /// Replace a document's content, persist it, and push it
    Write {
        /// Document ID
        id: String,
        /// New content (read from stdin when omitted)
        content: Vec<String>,
    },
    /// Switch a document between simple and rich mode
    Mode {
        /// Document ID
        id: String,
        /// Target mode
        mode: Mode,
    },
    /// Record a snapshot of the current content
    Save {
        /// Document ID
        id: String,
        /// Snapshot even when nothing changed
        #[arg(long)]
        force: bool,
    },
    /// List snapshots, newest first
    History {
        /// Document ID
        id: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Make a snapshot the current content
    Restore {
        /// Document ID
        id: String,
        /// Snapshot ID
        snapshot: String,
    },
    /// Delete one snapshot
    Discard {
        /// Document ID
        id: String,
        /// Snapshot ID
        snapshot: String,
    },
    /// Delete every snapshot of a document
    Purge {
        /// Document ID
        id: String,
    },
    /// Fetch the remote copy and merge it with last-writer-wins
    Pull {
        /// Document ID
        id: String,
    },
}
