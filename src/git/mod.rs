//! Version control as a transport.
//!
//! All repository access goes through [`GitTransport`]: a single required
//! method that runs one git invocation, plus named operations built on it.
//! [`GitCli`] spawns real subprocesses; tests wrap or replace it to inject
//! rejections and failures without touching a network.
//!
//! [`GitContext`] is discovered once per command and passed down explicitly.

pub mod cli;

pub use cli::GitCli;

use crate::error::{BeadsError, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Shared cancellation flag checked by every git invocation.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// # Errors
    ///
    /// Returns [`BeadsError::Cancelled`] once [`cancel`](Self::cancel) was called.
    pub fn check(&self, operation: &str) -> Result<()> {
        if self.is_cancelled() {
            return Err(BeadsError::Cancelled {
                operation: operation.to_string(),
            });
        }
        Ok(())
    }
}

/// Captured result of one git invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl GitOutput {
    #[must_use]
    pub const fn success(&self) -> bool {
        matches!(self.code, Some(0))
    }

    fn into_error(self, args: &[&str]) -> BeadsError {
        BeadsError::GitCommand {
            command: args.join(" "),
            code: self.code,
            stderr: self.stderr.trim().to_string(),
        }
    }
}

/// How a push ended when git itself ran fine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Pushed,
    /// The remote tip moved; a merge is needed before retrying.
    Rejected { reason: String },
}

const REJECTION_PATTERNS: &[&str] = &[
    "[rejected]",
    "non-fast-forward",
    "fetch first",
    "stale info",
    "updates were rejected",
];

const MISSING_REF_PATTERNS: &[&str] = &["couldn't find remote ref", "no such ref"];

const MISSING_PATH_PATTERNS: &[&str] = &["does not exist in", "exists on disk, but not in"];

fn matches_any(text: &str, patterns: &[&str]) -> bool {
    let lower = text.to_lowercase();
    patterns.iter().any(|p| lower.contains(p))
}

/// Narrow interface over git.
///
/// Only [`run`](Self::run) must be implemented. Every other operation is a
/// thin, overridable wrapper so decorators can intercept a single step.
pub trait GitTransport {
    /// Run `git <args>` in `dir`, returning the raw outcome.
    ///
    /// # Errors
    ///
    /// Returns an error only when git could not be run at all, timed out, or
    /// was cancelled. A non-zero exit is reported in [`GitOutput::code`].
    fn run(&self, dir: &Path, args: &[&str]) -> Result<GitOutput>;

    /// Run and require success, returning stdout.
    ///
    /// # Errors
    ///
    /// Returns [`BeadsError::GitCommand`] on a non-zero exit.
    fn run_ok(&self, dir: &Path, args: &[&str]) -> Result<String> {
        let output = self.run(dir, args)?;
        if output.success() {
            Ok(output.stdout)
        } else {
            Err(output.into_error(args))
        }
    }

    /// Resolve a revision to a commit ID, `None` if it does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if git cannot be run.
    fn rev_parse(&self, dir: &Path, rev: &str) -> Result<Option<String>> {
        let revspec = format!("{rev}^{{commit}}");
        let output = self.run(dir, &["rev-parse", "--verify", "--quiet", revspec.as_str()])?;
        Ok(output
            .success()
            .then(|| output.stdout.trim().to_string())
            .filter(|s| !s.is_empty()))
    }

    /// Short name of the checked-out branch, `None` when HEAD is detached.
    ///
    /// # Errors
    ///
    /// Returns an error if git cannot be run.
    fn symbolic_ref(&self, dir: &Path) -> Result<Option<String>> {
        let output = self.run(dir, &["symbolic-ref", "--quiet", "--short", "HEAD"])?;
        Ok(output
            .success()
            .then(|| output.stdout.trim().to_string()))
    }

    /// # Errors
    ///
    /// Returns an error if git cannot be run.
    fn remote_url(&self, dir: &Path, remote: &str) -> Result<Option<String>> {
        let output = self.run(dir, &["remote", "get-url", remote])?;
        Ok(output
            .success()
            .then(|| output.stdout.trim().to_string()))
    }

    /// Fetch one branch into its remote-tracking ref.
    ///
    /// Returns `false` when the branch does not exist on the remote yet.
    ///
    /// # Errors
    ///
    /// Returns an error for any other fetch failure.
    fn fetch(&self, dir: &Path, remote: &str, branch: &str) -> Result<bool> {
        let refspec = format!("+refs/heads/{branch}:refs/remotes/{remote}/{branch}");
        let args = ["fetch", "--quiet", remote, refspec.as_str()];
        let output = self.run(dir, &args)?;
        if output.success() {
            return Ok(true);
        }
        if matches_any(&output.stderr, MISSING_REF_PATTERNS) {
            tracing::debug!(remote, branch, "Remote branch does not exist yet");
            return Ok(false);
        }
        Err(output.into_error(&args))
    }

    /// Commits only in `left` and only in `right`.
    ///
    /// # Errors
    ///
    /// Returns an error if either revision is unknown or output is malformed.
    fn rev_list_counts(&self, dir: &Path, left: &str, right: &str) -> Result<(usize, usize)> {
        let range = format!("{left}...{right}");
        let stdout = self.run_ok(dir, &["rev-list", "--left-right", "--count", range.as_str()])?;
        let mut parts = stdout.split_whitespace().map(str::parse::<usize>);
        match (parts.next(), parts.next()) {
            (Some(Ok(l)), Some(Ok(r))) => Ok((l, r)),
            _ => Err(BeadsError::GitCommand {
                command: format!("rev-list --left-right --count {range}"),
                code: Some(0),
                stderr: format!("unexpected output: {}", stdout.trim()),
            }),
        }
    }

    /// # Errors
    ///
    /// Returns an error if `rev` is unknown.
    fn commit_count(&self, dir: &Path, rev: &str) -> Result<usize> {
        let stdout = self.run_ok(dir, &["rev-list", "--count", rev])?;
        stdout.trim().parse().map_err(|_| BeadsError::GitCommand {
            command: format!("rev-list --count {rev}"),
            code: Some(0),
            stderr: format!("unexpected output: {}", stdout.trim()),
        })
    }

    /// Nearest common ancestor, `None` for unrelated histories.
    ///
    /// # Errors
    ///
    /// Returns an error if git fails for another reason.
    fn merge_base(&self, dir: &Path, a: &str, b: &str) -> Result<Option<String>> {
        let args = ["merge-base", a, b];
        let output = self.run(dir, &args)?;
        match output.code {
            Some(0) => Ok(Some(output.stdout.trim().to_string())),
            Some(1) if output.stderr.trim().is_empty() => Ok(None),
            _ => Err(output.into_error(&args)),
        }
    }

    /// File content at a revision, `None` if the path is absent there.
    ///
    /// # Errors
    ///
    /// Returns an error if the revision is unknown or git fails.
    fn show_file(&self, dir: &Path, rev: &str, path: &str) -> Result<Option<String>> {
        let object = format!("{rev}:{path}");
        let args = ["show", object.as_str()];
        let output = self.run(dir, &args)?;
        if output.success() {
            return Ok(Some(output.stdout));
        }
        if matches_any(&output.stderr, MISSING_PATH_PATTERNS) {
            return Ok(None);
        }
        Err(output.into_error(&args))
    }

    /// # Errors
    ///
    /// Returns an error if the merge is not a fast-forward.
    fn merge_ff_only(&self, dir: &Path, rev: &str) -> Result<()> {
        self.run_ok(dir, &["merge", "--ff-only", "--quiet", rev])
            .map(drop)
    }

    /// # Errors
    ///
    /// Returns an error if git fails.
    fn reset_hard(&self, dir: &Path, rev: &str) -> Result<()> {
        self.run_ok(dir, &["reset", "--hard", "--quiet", rev]).map(drop)
    }

    /// # Errors
    ///
    /// Returns an error if git fails.
    fn add(&self, dir: &Path, paths: &[&str]) -> Result<()> {
        let mut args = vec!["add", "--"];
        args.extend_from_slice(paths);
        self.run_ok(dir, &args).map(drop)
    }

    /// # Errors
    ///
    /// Returns an error if git fails.
    fn has_staged_changes(&self, dir: &Path) -> Result<bool> {
        let args = ["diff", "--cached", "--quiet"];
        let output = self.run(dir, &args)?;
        match output.code {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(output.into_error(&args)),
        }
    }

    /// Commit staged changes, skipping hooks.
    ///
    /// # Errors
    ///
    /// Returns an error if git fails.
    fn commit(&self, dir: &Path, message: &str) -> Result<()> {
        self.run_ok(dir, &["commit", "--quiet", "--no-verify", "-m", message])
            .map(drop)
    }

    /// Push `branch` to `remote`.
    ///
    /// # Errors
    ///
    /// A rejection is an `Ok` outcome; other failures are errors.
    fn push(&self, dir: &Path, remote: &str, branch: &str) -> Result<PushOutcome> {
        let refspec = format!("refs/heads/{branch}:refs/heads/{branch}");
        let args = ["push", "--set-upstream", remote, refspec.as_str()];
        let output = self.run(dir, &args)?;
        if output.success() {
            return Ok(PushOutcome::Pushed);
        }
        let combined = format!("{}\n{}", output.stdout, output.stderr);
        if matches_any(&combined, REJECTION_PATTERNS) {
            return Ok(PushOutcome::Rejected {
                reason: output.stderr.trim().to_string(),
            });
        }
        Err(output.into_error(&args))
    }

    /// Paths of all registered worktrees.
    ///
    /// # Errors
    ///
    /// Returns an error if git fails.
    fn worktree_list(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let stdout = self.run_ok(dir, &["worktree", "list", "--porcelain"])?;
        Ok(stdout
            .lines()
            .filter_map(|line| line.strip_prefix("worktree "))
            .map(PathBuf::from)
            .collect())
    }

    /// Add a worktree without populating it.
    ///
    /// With `start` the branch is created from that revision; otherwise the
    /// existing branch is checked out.
    ///
    /// # Errors
    ///
    /// Returns an error if git fails.
    fn worktree_add(&self, dir: &Path, path: &Path, branch: &str, start: Option<&str>) -> Result<()> {
        let path = path.to_string_lossy().into_owned();
        let args: Vec<&str> = match start {
            Some(start) => vec!["worktree", "add", "--no-checkout", "-b", branch, path.as_str(), start],
            None => vec!["worktree", "add", "--no-checkout", path.as_str(), branch],
        };
        self.run_ok(dir, &args).map(drop)
    }

    /// # Errors
    ///
    /// Returns an error if git fails.
    fn worktree_remove(&self, dir: &Path, path: &Path) -> Result<()> {
        let path = path.to_string_lossy().into_owned();
        self.run_ok(dir, &["worktree", "remove", "--force", path.as_str()])
            .map(drop)
    }

    /// # Errors
    ///
    /// Returns an error if git fails.
    fn worktree_prune(&self, dir: &Path) -> Result<()> {
        self.run_ok(dir, &["worktree", "prune"]).map(drop)
    }

    /// Restrict the checkout in `dir` to `patterns` (gitignore syntax).
    ///
    /// # Errors
    ///
    /// Returns an error if git fails.
    fn sparse_checkout_set(&self, dir: &Path, patterns: &[&str]) -> Result<()> {
        let mut args = vec!["sparse-checkout", "set", "--no-cone"];
        args.extend_from_slice(patterns);
        self.run_ok(dir, &args).map(drop)
    }

    /// # Errors
    ///
    /// Returns an error if git fails.
    fn set_upstream(&self, dir: &Path, branch: &str, remote: &str) -> Result<()> {
        let upstream = format!("--set-upstream-to={remote}/{branch}");
        self.run_ok(dir, &["branch", "--quiet", upstream.as_str(), branch])
            .map(drop)
    }
}

/// Repository facts for one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitContext {
    /// Top level of the checkout the user runs in.
    pub repo_root: PathBuf,
    pub git_dir: PathBuf,
    /// Directory shared by all worktrees of the repository.
    pub common_dir: PathBuf,
    /// True when `repo_root` is itself a linked worktree.
    pub is_worktree: bool,
    /// Checked-out branch; `None` when HEAD is detached.
    pub current_branch: Option<String>,
}

impl GitContext {
    /// Inspect the repository containing `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`BeadsError::NotAGitRepo`] if `dir` is not inside a work tree.
    pub fn discover(git: &impl GitTransport, dir: &Path) -> Result<Self> {
        let output = git.run(
            dir,
            &["rev-parse", "--show-toplevel", "--git-dir", "--git-common-dir"],
        )?;
        let mut lines = output.stdout.lines().map(str::trim);
        let (Some(top), Some(git_dir), Some(common), true) =
            (lines.next(), lines.next(), lines.next(), output.success())
        else {
            return Err(BeadsError::NotAGitRepo {
                path: dir.to_path_buf(),
            });
        };

        let repo_root = PathBuf::from(top);
        let absolute = |p: &str| {
            let p = PathBuf::from(p);
            let joined = if p.is_absolute() { p } else { dir.join(p) };
            joined.canonicalize().unwrap_or(joined)
        };
        let git_dir = absolute(git_dir);
        let common_dir = absolute(common);
        let is_worktree = git_dir != common_dir;
        let current_branch = git.symbolic_ref(&repo_root)?;

        tracing::debug!(
            repo_root = %repo_root.display(),
            common_dir = %common_dir.display(),
            is_worktree,
            branch = current_branch.as_deref().unwrap_or("(detached)"),
            "Discovered git context"
        );

        Ok(Self {
            repo_root,
            git_dir,
            common_dir,
            is_worktree,
            current_branch,
        })
    }

    /// Where the isolated worktree for `branch` lives unless configured.
    #[must_use]
    pub fn default_worktree_path(&self, branch: &str) -> PathBuf {
        self.common_dir.join("beads-worktrees").join(branch)
    }

    #[must_use]
    pub fn is_current_branch(&self, branch: &str) -> bool {
        self.current_branch.as_deref() == Some(branch)
    }
}
