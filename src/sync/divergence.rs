//! Divergence between the local and remote tips of the sync branch.

use crate::error::Result;
use crate::git::{GitContext, GitTransport};
use serde::Serialize;
use std::path::Path;

/// Both sides past this many unique commits is worth a human look.
pub const SIGNIFICANT_DIVERGENCE_THRESHOLD: usize = 5;

/// How the local tip relates to the remote tip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    /// Nothing to take from the remote.
    UpToDate,
    /// Remote has commits and local has none of its own.
    FastForward,
    /// Both sides have unique commits.
    Diverged,
}

/// Commit counts unique to each side since the merge base.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Divergence {
    pub local_ahead: usize,
    pub remote_ahead: usize,
    /// False on the first sync, before the branch was ever pushed.
    pub remote_exists: bool,
}

impl Divergence {
    #[must_use]
    pub const fn new(local_ahead: usize, remote_ahead: usize) -> Self {
        Self {
            local_ahead,
            remote_ahead,
            remote_exists: true,
        }
    }

    /// A local-only lead is still up to date for pulling; it only needs a push.
    #[must_use]
    pub const fn classify(&self) -> Relationship {
        match (self.local_ahead, self.remote_ahead) {
            (_, 0) => Relationship::UpToDate,
            (0, _) => Relationship::FastForward,
            _ => Relationship::Diverged,
        }
    }

    #[must_use]
    pub const fn is_significant(&self) -> bool {
        self.local_ahead > SIGNIFICANT_DIVERGENCE_THRESHOLD
            && self.remote_ahead > SIGNIFICANT_DIVERGENCE_THRESHOLD
    }
}

/// Fetch the remote branch and count commits on each side of `HEAD`.
///
/// A remote branch that does not exist yet is not an error: every local
/// commit counts as ahead.
///
/// # Errors
///
/// Returns an error if the fetch fails for a reason other than a missing
/// branch, or if git cannot count commits.
pub fn divergence(
    git: &impl GitTransport,
    worktree: &Path,
    branch: &str,
    remote: &str,
) -> Result<Divergence> {
    if !git.fetch(worktree, remote, branch)? {
        let local = match git.rev_parse(worktree, "HEAD")? {
            Some(_) => git.commit_count(worktree, "HEAD")?,
            None => 0,
        };
        return Ok(Divergence {
            local_ahead: local,
            remote_ahead: 0,
            remote_exists: false,
        });
    }
    let tracking = format!("refs/remotes/{remote}/{branch}");
    let (local_ahead, remote_ahead) = git.rev_list_counts(worktree, "HEAD", &tracking)?;
    let result = Divergence::new(local_ahead, remote_ahead);
    tracing::debug!(
        branch,
        local_ahead,
        remote_ahead,
        relationship = ?result.classify(),
        "Computed divergence"
    );
    Ok(result)
}

/// Pre-flight report for `bsync status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DivergenceCheck {
    pub branch: String,
    pub remote: String,
    #[serde(flatten)]
    pub divergence: Divergence,
    pub relationship: Relationship,
    pub significant: bool,
    /// True when the fetch failed and counts reflect stale remote refs.
    pub offline: bool,
    pub guidance: Option<String>,
}

/// Compare the local sync branch with its remote tracking ref.
///
/// Runs against the primary repository so it works before any worktree
/// exists. The fetch is best-effort.
///
/// # Errors
///
/// Returns an error only if git cannot count commits.
pub fn check_divergence(
    git: &impl GitTransport,
    ctx: &GitContext,
    branch: &str,
    remote: &str,
) -> Result<DivergenceCheck> {
    let dir = ctx.repo_root.as_path();
    let local_ref = format!("refs/heads/{branch}");
    let tracking = format!("refs/remotes/{remote}/{branch}");

    let offline = match git.fetch(dir, remote, branch) {
        Ok(_) => false,
        Err(err) => {
            tracing::warn!(error = %err, "Fetch failed; divergence uses last known remote state");
            true
        }
    };

    let local = git.rev_parse(dir, &local_ref)?;
    let remote_tip = git.rev_parse(dir, &tracking)?;
    let divergence = match (local, remote_tip) {
        (Some(_), Some(_)) => {
            let (l, r) = git.rev_list_counts(dir, &local_ref, &tracking)?;
            Divergence::new(l, r)
        }
        (Some(_), None) => Divergence {
            local_ahead: git.commit_count(dir, &local_ref)?,
            remote_ahead: 0,
            remote_exists: false,
        },
        (None, Some(_)) => Divergence::new(0, git.commit_count(dir, &tracking)?),
        (None, None) => Divergence {
            remote_exists: false,
            ..Divergence::default()
        },
    };

    let significant = divergence.is_significant();
    let guidance = significant.then(|| {
        format!(
            "The sync branch has diverged significantly ({} local, {} remote commits).\n\
             Automatic merging may be risky. Options:\n  \
             1. Merge automatically:      bsync pull\n  \
             2. Inspect remote changes:   git log {local_ref}..{tracking}\n  \
             3. Discard local sync work:  git branch -f {branch} {tracking}",
            divergence.local_ahead, divergence.remote_ahead
        )
    });

    Ok(DivergenceCheck {
        branch: branch.to_string(),
        remote: remote.to_string(),
        relationship: divergence.classify(),
        divergence,
        significant,
        offline,
        guidance,
    })
}
