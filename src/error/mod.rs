//! Error types and handling for `beads_sync`.
//!
//! # Design
//!
//! - Uses `thiserror` for derive-based error types
//! - Accepts `anyhow` errors through [`BeadsError::Other`]
//! - Groups variants by how a caller should react: retry, resolve by hand,
//!   fix the environment, or give up
//! - Provides structured JSON output through [`StructuredError`]

mod context;
mod structured;

pub use context::{OptionExt, ResultExt};
pub use structured::{ErrorCode, StructuredError};

use crate::sync::merge::FieldConflict;
use std::path::PathBuf;
use thiserror::Error;

/// Primary error type for `beads_sync` operations.
#[derive(Error, Debug)]
pub enum BeadsError {
    // === Storage Errors ===
    /// `SQLite` database error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    // === Validation Errors ===
    /// A field or configuration value failed validation.
    #[error("Validation failed: {field}: {reason}")]
    Validation { field: String, reason: String },

    // === JSONL Errors ===
    /// Failed to parse a line of a record set.
    #[error("JSONL parse error at line {line}: {reason}")]
    JsonlParse { line: usize, reason: String },

    /// Textual merge conflict markers were found in a record set.
    #[error("Merge conflict markers detected in {origin} (first at line {line})")]
    ConflictMarkers { origin: String, line: usize },

    // === Configuration Errors ===
    /// Configuration file error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Beads workspace not initialized.
    #[error("Beads not initialized: run 'bsync init' first")]
    NotInitialized,

    /// Already initialized.
    #[error("Already initialized at '{path}'")]
    AlreadyInitialized { path: PathBuf },

    /// Git sync is disabled by the configured sync mode.
    #[error("JSONL git sync is disabled (sync.mode = {mode})")]
    SyncModeDisabled { mode: String },

    // === Environment Errors ===
    /// The working directory is not inside a git repository.
    #[error("Not a git repository: {path}")]
    NotAGitRepo { path: PathBuf },

    /// The repository has no commits to branch the sync branch from.
    #[error("Repository has no commits yet")]
    NoCommits,

    /// The configured remote does not exist.
    #[error("Git remote '{remote}' is not configured")]
    RemoteNotFound { remote: String },

    /// The sync branch is the branch checked out in the primary worktree.
    #[error("Sync branch '{branch}' is currently checked out; cannot create a second worktree for it")]
    BranchCheckedOut { branch: String },

    // === Git Transport Errors ===
    /// A git subprocess exited unsuccessfully.
    #[error("git {command} failed{}: {stderr}", .code.map_or_else(String::new, |c| format!(" (exit {c})")))]
    GitCommand {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    /// A git subprocess exceeded its time limit and was killed.
    #[error("git {command} timed out after {seconds}s")]
    GitTimeout { command: String, seconds: u64 },

    /// The operation was cancelled by the caller.
    #[error("Operation cancelled: {operation}")]
    Cancelled { operation: String },

    /// Transient push failures persisted past the retry limit.
    #[error("Push failed after {attempts} attempts: {last_error}")]
    PushRetriesExhausted { attempts: u32, last_error: String },

    // === Merge Errors ===
    /// The same field changed to different values on both sides.
    #[error("Merge conflict: {} field(s) changed differently on both sides", .conflicts.len())]
    MergeConflict { conflicts: Vec<FieldConflict> },

    /// A rejected push could not be reconciled with the new remote tip.
    #[error("Push to {remote}/{branch} was rejected and the remote changes conflict with local changes")]
    PushConflict {
        remote: String,
        branch: String,
        worktree: PathBuf,
        conflicts: Vec<FieldConflict>,
    },

    // === I/O Errors ===
    /// File system I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    // === Wrapped errors ===
    /// Error with additional context.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Wrapped anyhow error.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Stderr fragments git prints for failures that usually clear up on retry.
const TRANSIENT_PATTERNS: &[&str] = &[
    "could not resolve host",
    "connection timed out",
    "connection refused",
    "connection reset",
    "operation timed out",
    "the remote end hung up",
    "early eof",
    "network is unreachable",
    "temporary failure",
    "failed to connect",
    "cannot lock ref",
    "failed to update ref",
    "failed to lock",
    "index.lock",
];

impl BeadsError {
    /// Can the user fix this without code changes?
    #[must_use]
    pub const fn is_user_recoverable(&self) -> bool {
        matches!(
            self,
            Self::NotInitialized
                | Self::Validation { .. }
                | Self::ConflictMarkers { .. }
                | Self::NotAGitRepo { .. }
                | Self::NoCommits
                | Self::RemoteNotFound { .. }
                | Self::BranchCheckedOut { .. }
                | Self::MergeConflict { .. }
                | Self::PushConflict { .. }
                | Self::SyncModeDisabled { .. }
        )
    }

    /// Is this a network or lock failure worth retrying with backoff?
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::GitTimeout { .. } => true,
            Self::GitCommand { stderr, .. } => {
                let lower = stderr.to_lowercase();
                TRANSIENT_PATTERNS.iter().any(|p| lower.contains(p))
            }
            _ => false,
        }
    }

    /// Human-friendly suggestion for fixing this error.
    #[must_use]
    pub const fn suggestion(&self) -> Option<&'static str> {
        match self {
            Self::NotInitialized => Some("Run: bsync init"),
            Self::AlreadyInitialized { .. } => Some("Use --force to reinitialize"),
            Self::NotAGitRepo { .. } => Some("Run inside a git repository, or run: git init"),
            Self::NoCommits => Some("Create an initial commit first: git commit --allow-empty -m init"),
            Self::ConflictMarkers { .. } => {
                Some("Resolve the textual conflict, or rerun the merge with: bsync merge")
            }
            Self::SyncModeDisabled { .. } => {
                Some("Set sync.mode to git-portable or realtime in .beads/config.yaml")
            }
            Self::Cancelled { .. } => {
                Some("Rerun the command; the next run repairs the sync worktree if needed")
            }
            _ => None,
        }
    }

    /// Multi-line remediation text for conflicts and environment problems.
    #[must_use]
    pub fn remediation(&self) -> Option<String> {
        match self {
            Self::RemoteNotFound { remote } => Some(format!(
                "Add the remote first:\n  git remote add {remote} <url>\nor point sync.remote at an existing remote."
            )),
            Self::BranchCheckedOut { branch } => Some(format!(
                "The sync branch '{branch}' is your current checkout, so a separate worktree is not possible.\n\
                 `bsync commit` commits directly on this checkout; to pull, use git itself:\n  git pull\n\
                 or switch branches first:\n  git switch <work-branch>"
            )),
            Self::MergeConflict { conflicts } => {
                let mut out = String::from("Conflicting fields:\n");
                for conflict in conflicts.iter().take(20) {
                    out.push_str(&format!("  {conflict}\n"));
                }
                if conflicts.len() > 20 {
                    out.push_str(&format!("  ... and {} more\n", conflicts.len() - 20));
                }
                out.push_str(
                    "Edit one side so the fields agree, or rerun with --strategy newest|ours|theirs.",
                );
                Some(out)
            }
            Self::PushConflict {
                remote,
                branch,
                worktree,
                conflicts,
            } => {
                let wt = worktree.display();
                let mut out = String::new();
                for conflict in conflicts.iter().take(10) {
                    out.push_str(&format!("  {conflict}\n"));
                }
                out.push_str(&format!(
                    "Choose one recovery option:\n\
                     1. Reset to remote (discard local sync changes):\n     git -C {wt} reset --hard {remote}/{branch} && bsync pull\n\
                     2. Force-push local (overwrite remote changes):\n     git -C {wt} push --force {remote} {branch}\n\
                     3. Manual recovery in the worktree:\n     cd {wt}, fix the record set, git commit, then: bsync push"
                ));
                Some(out)
            }
            Self::PushRetriesExhausted { .. } => Some(
                "The remote kept failing transiently. Check connectivity, then run: bsync push"
                    .to_string(),
            ),
            _ => None,
        }
    }

    /// Create a validation error for a specific field.
    #[must_use]
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Result type using `BeadsError`.
pub type Result<T> = std::result::Result<T, BeadsError>;
