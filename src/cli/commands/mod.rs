//! Command implementations.
//!
//! Every command that touches the workspace goes through [`Workspace`]:
//! discover `.beads`, open the database, then resolve the layered config.

pub mod flush;
pub mod import;
pub mod init;
pub mod merge;
pub mod status;
pub mod sync;
pub mod worktree;

use crate::config::{self, CliOverrides, ConfigPaths, METADATA_FILENAME, SyncConfig};
use crate::error::Result;
use crate::git::{CancelToken, GitCli, GitContext};
use crate::storage::SqliteStorage;
use crate::sync::{SyncEngine, SyncPaths};
use serde::Serialize;
use std::path::PathBuf;

/// An opened `.beads` directory with its resolved configuration.
pub struct Workspace {
    pub beads_dir: PathBuf,
    pub paths: ConfigPaths,
    pub storage: SqliteStorage,
    pub sync: SyncConfig,
}

impl Workspace {
    /// Open the workspace found from the current directory.
    ///
    /// # Errors
    ///
    /// Returns an error if no `.beads` directory exists, the database cannot
    /// be opened, or the config does not parse.
    pub fn open(cli: &CliOverrides) -> Result<Self> {
        let beads_dir = config::discover_beads_dir(None)?;
        let (storage, paths) = config::open_storage(&beads_dir, cli.db.as_ref(), cli.lock_timeout)?;
        let layer = config::load_config(&beads_dir, Some(&storage), cli)?;
        let sync = SyncConfig::from_layer(&layer)?;
        tracing::debug!(
            beads_dir = %beads_dir.display(),
            db = %paths.db_path.display(),
            jsonl = %paths.jsonl_path.display(),
            mode = %sync.mode,
            branch = %sync.branch,
            "Opened workspace"
        );
        Ok(Self {
            beads_dir,
            paths,
            storage,
            sync,
        })
    }

    /// Hand the store to a sync engine bound to the enclosing repository.
    ///
    /// # Errors
    ///
    /// - [`BeadsError::SyncModeDisabled`](crate::BeadsError::SyncModeDisabled)
    ///   when the mode does not use git
    /// - [`BeadsError::NotAGitRepo`](crate::BeadsError::NotAGitRepo) outside a repository
    pub fn into_engine(self) -> Result<SyncEngine<GitCli, SqliteStorage>> {
        self.sync.ensure_git_sync()?;
        let cancel = CancelToken::new();
        let git = GitCli::new(self.sync.git_timeout, cancel.clone());
        let ctx = GitContext::discover(&git, &self.beads_dir)?;
        let paths = SyncPaths::new(
            &ctx.repo_root,
            &self.beads_dir,
            &self.paths.jsonl_name(),
            METADATA_FILENAME,
        )?;
        Ok(SyncEngine::new(
            git,
            self.storage,
            ctx,
            paths,
            self.sync.to_options(cancel),
        ))
    }
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
