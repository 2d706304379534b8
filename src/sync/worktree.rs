//! Isolated worktree for the sync branch.
//!
//! The sync branch is checked out in a separate directory under the git
//! common dir, sparse-checked-out to the data directory only, so syncing
//! never touches the user's own checkout. A worktree that fails a health
//! check is removed and created again; it is never patched in place.

use crate::error::{BeadsError, Result};
use crate::git::{GitContext, GitTransport};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Result of inspecting a worktree path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorktreeHealth {
    Healthy,
    Missing,
    Unhealthy(String),
}

/// What [`WorktreeManager::ensure`] had to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnsureAction {
    AlreadyHealthy,
    Created,
    Recreated,
}

pub struct WorktreeManager<'a, G: GitTransport> {
    git: &'a G,
    ctx: &'a GitContext,
    /// Data directory relative to the repository root, e.g. `.beads`.
    data_dir: &'a str,
    remote: &'a str,
}

impl<'a, G: GitTransport> WorktreeManager<'a, G> {
    #[must_use]
    pub const fn new(git: &'a G, ctx: &'a GitContext, data_dir: &'a str, remote: &'a str) -> Self {
        Self {
            git,
            ctx,
            data_dir,
            remote,
        }
    }

    /// Make `path` a healthy worktree checked out to `branch`.
    ///
    /// # Errors
    ///
    /// - [`BeadsError::BranchCheckedOut`] when `branch` is the branch checked
    ///   out in the primary repository; commit in place instead.
    /// - [`BeadsError::NoCommits`] when the branch must be created and the
    ///   repository has no commits yet.
    /// - any git failure, or a worktree still unhealthy after recreation.
    pub fn ensure(&self, branch: &str, path: &Path) -> Result<EnsureAction> {
        if self.ctx.is_current_branch(branch) {
            return Err(BeadsError::BranchCheckedOut {
                branch: branch.to_string(),
            });
        }

        let action = match self.health(branch, path)? {
            WorktreeHealth::Healthy => return Ok(EnsureAction::AlreadyHealthy),
            WorktreeHealth::Missing => {
                tracing::info!(path = %path.display(), branch, "Creating sync worktree");
                EnsureAction::Created
            }
            WorktreeHealth::Unhealthy(reason) => {
                tracing::warn!(path = %path.display(), %reason, "Sync worktree unhealthy; recreating");
                self.remove(path)?;
                EnsureAction::Recreated
            }
        };

        self.create(branch, path)?;

        match self.health(branch, path)? {
            WorktreeHealth::Healthy => Ok(action),
            WorktreeHealth::Missing => Err(BeadsError::Config(format!(
                "worktree {} was not created",
                path.display()
            ))),
            WorktreeHealth::Unhealthy(reason) => Err(BeadsError::Config(format!(
                "worktree {} is unhealthy after recreation: {reason}",
                path.display()
            ))),
        }
    }

    /// Inspect `path` without changing anything.
    ///
    /// # Errors
    ///
    /// Returns an error only if git cannot be run.
    pub fn health(&self, branch: &str, path: &Path) -> Result<WorktreeHealth> {
        if !path.exists() {
            return Ok(WorktreeHealth::Missing);
        }
        let dot_git = path.join(".git");
        if !dot_git.is_file() {
            return Ok(WorktreeHealth::Unhealthy(
                ".git is not a worktree link file".to_string(),
            ));
        }
        if self.git.rev_parse(path, "HEAD")?.is_none() {
            return Ok(WorktreeHealth::Unhealthy("HEAD does not resolve".to_string()));
        }
        match self.git.symbolic_ref(path)? {
            Some(current) if current == branch => {}
            Some(other) => {
                return Ok(WorktreeHealth::Unhealthy(format!(
                    "checked out to '{other}' instead of '{branch}'"
                )));
            }
            None => return Ok(WorktreeHealth::Unhealthy("HEAD is detached".to_string())),
        }
        if !self.is_registered(path)? {
            return Ok(WorktreeHealth::Unhealthy(
                "not registered with the repository".to_string(),
            ));
        }
        Ok(WorktreeHealth::Healthy)
    }

    fn is_registered(&self, path: &Path) -> Result<bool> {
        let wanted = canonical(path);
        Ok(self
            .git
            .worktree_list(&self.ctx.repo_root)?
            .iter()
            .any(|listed| canonical(listed) == wanted))
    }

    /// Remove the worktree at `path` and its registration.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be deleted or pruning fails.
    pub fn remove(&self, path: &Path) -> Result<()> {
        if let Err(err) = self.git.worktree_remove(&self.ctx.repo_root, path) {
            tracing::debug!(error = %err, "git worktree remove failed; deleting directory");
        }
        if path.exists() {
            fs::remove_dir_all(path)?;
        }
        self.git.worktree_prune(&self.ctx.repo_root)
    }

    fn create(&self, branch: &str, path: &Path) -> Result<()> {
        let root = &self.ctx.repo_root;
        self.git.worktree_prune(root)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let local_ref = format!("refs/heads/{branch}");
        if self.git.rev_parse(root, &local_ref)?.is_some() {
            self.git.worktree_add(root, path, branch, None)?;
        } else {
            let remote_exists = match self.git.fetch(root, self.remote, branch) {
                Ok(exists) => exists,
                Err(err) => {
                    tracing::warn!(error = %err, "Fetch failed; creating sync branch from HEAD");
                    false
                }
            };
            let tracking = format!("refs/remotes/{}/{branch}", self.remote);
            let start = if remote_exists && self.git.rev_parse(root, &tracking)?.is_some() {
                tracking
            } else {
                self.git.rev_parse(root, "HEAD")?.ok_or(BeadsError::NoCommits)?
            };
            self.git.worktree_add(root, path, branch, Some(&start))?;
        }

        let pattern = format!("/{}/", self.data_dir.trim_matches('/'));
        self.git.sparse_checkout_set(path, &[pattern.as_str()])?;
        self.git.reset_hard(path, "HEAD")?;

        if let Err(err) = self.git.set_upstream(path, branch, self.remote) {
            tracing::debug!(error = %err, "Upstream not set (remote branch may not exist yet)");
        }
        Ok(())
    }
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}
