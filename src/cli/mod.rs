//! CLI definitions and entry point.

use crate::sync::ConflictStrategy;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// Git-transported sync for a local-first issue tracker
#[derive(Parser, Debug)]
#[command(name = "bsync", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (auto-discover .beads/*.db if not set)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// `SQLite` busy timeout in ms
    #[arg(long, global = true)]
    pub lock_timeout: Option<u64>,

    /// Sync branch (overrides sync.branch)
    #[arg(long, global = true, env = "BSYNC_BRANCH")]
    pub branch: Option<String>,

    /// Remote name (overrides sync.remote)
    #[arg(long, global = true)]
    pub remote: Option<String>,

    /// Tie-break for fields changed on both sides: manual, newest, ours, theirs
    #[arg(long, global = true)]
    pub strategy: Option<ConflictStrategy>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Append logs to this file instead of stderr
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a beads data directory in the current repository
    Init {
        /// Overwrite existing DB
        #[arg(long)]
        force: bool,
    },

    /// Export the database to the JSONL file
    Flush {
        /// Write even if it would replace a non-empty file with nothing
        #[arg(long)]
        force: bool,
    },

    /// Replace the database contents with a JSONL file
    Import {
        /// File to import (defaults to the configured JSONL file)
        input: Option<PathBuf>,
    },

    /// Commit local changes to the sync branch and push them
    Commit {
        /// Commit message (a change summary is generated if omitted)
        #[arg(short, long)]
        message: Option<String>,

        /// Commit without pushing
        #[arg(long)]
        no_push: bool,
    },

    /// Pull the sync branch, merge remote changes, then push
    #[command(visible_alias = "sync")]
    Pull {
        /// Merge remote changes without pushing
        #[arg(long)]
        no_push: bool,
    },

    /// Push pending sync-branch commits (confirms a withheld push)
    Push,

    /// Show how the local and remote sync branches relate
    Status,

    /// Three-way merge of JSONL record files (git merge driver)
    ///
    /// Configure with:
    ///   git config merge.beads.driver "bsync merge %O %A %B"
    ///   echo ".beads/issues.jsonl merge=beads" >> .gitattributes
    Merge(MergeArgs),

    /// Ensure the sync worktree exists and print its path
    Worktree {
        /// Remove and recreate the worktree
        #[arg(long)]
        recreate: bool,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct MergeArgs {
    /// Common ancestor version
    pub base: PathBuf,

    /// Our version (overwritten with the result unless --output is given)
    pub ours: PathBuf,

    /// Their version
    pub theirs: PathBuf,

    /// Write the merged result here instead of over OURS
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}
