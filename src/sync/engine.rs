//! Commit, push and pull over the sync branch.
//!
//! Commit: `WorktreeReady -> PreemptiveSynced -> ChangesStaged -> Committed
//! -> Pushed`. Pull: `WorktreeReady -> Fetched -> UpToDate | FastForward |
//! Diverged`, followed by the safety check and an optional push.
//!
//! A rejected push is never retried blindly. The engine fetches the new
//! remote tip, merges record content against it, resets the worktree onto
//! that tip, commits the merged content once, and only then pushes again.
//! Files are copied back to the primary checkout only from committed
//! history, never from the worktree's working files.

use super::divergence::{self, DivergenceCheck, Relationship};
use super::jsonl::RecordSet;
use super::merge::{ConflictStrategy, merge_record_sets};
use super::safety::{self, SafetyReport};
use super::worktree::{EnsureAction, WorktreeManager};
use super::ChangeSummary;
use crate::error::{BeadsError, OptionExt, Result};
use crate::git::{CancelToken, GitContext, GitTransport, PushOutcome};
use crate::storage::RecordStore;
use crate::util::{bytes_hash, write_atomic};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

pub const DEFAULT_SYNC_BRANCH: &str = "beads-sync";
pub const DEFAULT_REMOTE: &str = "origin";
pub const DEFAULT_PUSH_RETRIES: u32 = 5;
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_millis(100);

/// Where the record set lives, in the primary checkout and in git.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPaths {
    /// Record set file in the primary checkout.
    pub jsonl: PathBuf,
    /// The same file relative to the repository root, `/`-separated.
    pub jsonl_rel: String,
    pub metadata: PathBuf,
    pub metadata_rel: String,
    /// Data directory relative to the repository root, e.g. `.beads`.
    pub data_dir_rel: String,
}

impl SyncPaths {
    /// # Errors
    ///
    /// Returns an error if `beads_dir` is not strictly inside `repo_root`.
    pub fn new(
        repo_root: &Path,
        beads_dir: &Path,
        jsonl_name: &str,
        metadata_name: &str,
    ) -> Result<Self> {
        let root = repo_root.canonicalize()?;
        let dir = beads_dir.canonicalize()?;
        let rel = dir.strip_prefix(&root).map_err(|_| {
            BeadsError::Config(format!(
                "{} is outside the repository {}",
                dir.display(),
                root.display()
            ))
        })?;
        let data_dir_rel = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        if data_dir_rel.is_empty() {
            return Err(BeadsError::Config(
                "the data directory must be a subdirectory of the repository".to_string(),
            ));
        }
        Ok(Self {
            jsonl: dir.join(jsonl_name),
            jsonl_rel: format!("{data_dir_rel}/{jsonl_name}"),
            metadata: dir.join(metadata_name),
            metadata_rel: format!("{data_dir_rel}/{metadata_name}"),
            data_dir_rel,
        })
    }
}

/// Protocol knobs.
#[derive(Debug, Clone)]
pub struct SyncOptions {
    pub branch: String,
    pub remote: String,
    pub strategy: ConflictStrategy,
    /// Withhold the push when the safety check triggers.
    pub require_mass_delete_confirmation: bool,
    /// Cap for transient push failures and for rejection merges.
    pub max_push_retries: u32,
    pub backoff_base: Duration,
    /// Overrides the default location under the git common dir.
    pub worktree_path: Option<PathBuf>,
    pub cancel: CancelToken,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            branch: DEFAULT_SYNC_BRANCH.to_string(),
            remote: DEFAULT_REMOTE.to_string(),
            strategy: ConflictStrategy::default(),
            require_mass_delete_confirmation: false,
            max_push_retries: DEFAULT_PUSH_RETRIES,
            backoff_base: DEFAULT_BACKOFF_BASE,
            worktree_path: None,
            cancel: CancelToken::new(),
        }
    }
}

/// What a push loop went through before it stopped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PushReport {
    pub attempts: u32,
    /// Rejections resolved by merging the new remote tip.
    pub merges: u32,
    pub transient_retries: u32,
    /// A rejection merge tripped the safety check and the retry was held back.
    pub withheld: bool,
}

/// A finished push loop plus the safety report of its last merge, if any.
struct PushRun {
    report: PushReport,
    safety: Option<SafetyReport>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommitResult {
    pub committed: bool,
    pub pushed: bool,
    pub branch: String,
    pub message: Option<String>,
    /// Remote changes were merged in and imported along the way.
    pub merged_remote: bool,
    /// The safety check held back the push; run `bsync push` to confirm.
    pub push_withheld: bool,
    pub safety_check_triggered: bool,
    pub safety_check_details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push: Option<PushReport>,
}

impl CommitResult {
    fn note_safety(&mut self, report: &SafetyReport) {
        if report.triggered {
            self.safety_check_triggered = true;
            self.safety_check_details = Some(report.details());
        }
    }

    fn note_push(&mut self, run: &PushRun) {
        if let Some(report) = &run.safety {
            self.note_safety(report);
        }
        if run.report.merges > 0 {
            self.merged_remote = true;
        }
        self.push_withheld = run.report.withheld;
        self.pushed = !run.report.withheld;
        self.push = Some(run.report);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PullResult {
    pub pulled: bool,
    pub merged: bool,
    pub fast_forwarded: bool,
    pub pushed: bool,
    /// The safety check held back the push; run `bsync push` to confirm.
    pub push_withheld: bool,
    pub safety_check_triggered: bool,
    pub safety_check_details: Option<String>,
    pub safety_warnings: Vec<String>,
    /// Records in the store after the pull.
    pub imported: usize,
    /// Local changes committed before pulling.
    pub committed_local: bool,
}

impl PullResult {
    fn note_safety(&mut self, report: &SafetyReport, during: &str) {
        if !report.triggered {
            return;
        }
        self.safety_check_triggered = true;
        self.safety_check_details = Some(report.details());
        self.safety_warnings.push(format!(
            "{} of {} records vanished during {during}",
            report.vanished.len(),
            report.before_count
        ));
    }
}

/// Outcome of reconciling the store with the worktree head.
struct LocalCommit {
    committed: bool,
    message: Option<String>,
    merged: bool,
    /// Set when the store was merged against a moved head.
    safety: Option<SafetyReport>,
}

/// Sync protocol over one store, one repository and one sync branch.
pub struct SyncEngine<G: GitTransport, S: RecordStore> {
    git: G,
    store: S,
    ctx: GitContext,
    paths: SyncPaths,
    options: SyncOptions,
}

impl<G: GitTransport, S: RecordStore> SyncEngine<G, S> {
    #[must_use]
    pub const fn new(git: G, store: S, ctx: GitContext, paths: SyncPaths, options: SyncOptions) -> Self {
        Self {
            git,
            store,
            ctx,
            paths,
            options,
        }
    }

    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    #[must_use]
    pub const fn git(&self) -> &G {
        &self.git
    }

    #[must_use]
    pub const fn options(&self) -> &SyncOptions {
        &self.options
    }

    #[must_use]
    pub fn into_store(self) -> S {
        self.store
    }

    #[must_use]
    pub fn worktree_path(&self) -> PathBuf {
        self.options
            .worktree_path
            .clone()
            .unwrap_or_else(|| self.ctx.default_worktree_path(&self.options.branch))
    }

    fn tracking_ref(&self) -> String {
        format!("refs/remotes/{}/{}", self.options.remote, self.options.branch)
    }

    fn manager(&self) -> WorktreeManager<'_, G> {
        WorktreeManager::new(
            &self.git,
            &self.ctx,
            &self.paths.data_dir_rel,
            &self.options.remote,
        )
    }

    /// Make sure the sync worktree exists and is healthy.
    ///
    /// # Errors
    ///
    /// See [`WorktreeManager::ensure`].
    pub fn ensure_worktree(&self, recreate: bool) -> Result<(PathBuf, EnsureAction)> {
        let path = self.worktree_path();
        let manager = self.manager();
        if recreate && path.exists() {
            manager.remove(&path)?;
        }
        let action = manager.ensure(&self.options.branch, &path)?;
        Ok((path, action))
    }

    fn require_remote(&self) -> Result<()> {
        if self
            .git
            .remote_url(&self.ctx.repo_root, &self.options.remote)?
            .is_none()
        {
            return Err(BeadsError::RemoteNotFound {
                remote: self.options.remote.clone(),
            });
        }
        Ok(())
    }

    /// Pre-flight divergence report for the primary repository.
    ///
    /// # Errors
    ///
    /// Returns an error if git cannot count commits.
    pub fn check_divergence(&self) -> Result<DivergenceCheck> {
        divergence::check_divergence(
            &self.git,
            &self.ctx,
            &self.options.branch,
            &self.options.remote,
        )
    }

    /// Export the store and commit it to the sync branch, optionally pushing.
    ///
    /// # Errors
    ///
    /// - environment errors (missing remote, not a repository)
    /// - [`BeadsError::MergeConflict`] if the branch moved and the new
    ///   content conflicts with local changes
    /// - [`BeadsError::PushConflict`] or [`BeadsError::PushRetriesExhausted`]
    ///   from the push loop
    pub fn commit(&mut self, message: Option<&str>, push: bool) -> Result<CommitResult> {
        if push {
            self.require_remote()?;
        }
        let wt = match self.ensure_worktree(false) {
            Ok((path, _)) => path,
            Err(BeadsError::BranchCheckedOut { branch }) => {
                tracing::info!(branch = %branch, "Sync branch is checked out; committing in place");
                return self.commit_in_place(message, push);
            }
            Err(err) => return Err(err),
        };
        tracing::info!(worktree = %wt.display(), "Worktree ready");

        self.options.cancel.check("commit")?;
        self.preemptive_sync(&wt)?;

        let local = self.commit_local(&wt, message)?;
        let mut result = CommitResult {
            committed: local.committed,
            branch: self.options.branch.clone(),
            message: local.message,
            merged_remote: local.merged,
            ..CommitResult::default()
        };
        if let Some(report) = &local.safety {
            result.note_safety(report);
        }

        if push && self.local_ahead(&wt)? {
            if result.safety_check_triggered && self.options.require_mass_delete_confirmation {
                tracing::warn!("Push withheld until mass deletion is confirmed");
                result.push_withheld = true;
            } else {
                let run = self.push_with_retry(&wt)?;
                if run.report.merges > 0 {
                    self.adopt_head(&wt)?;
                }
                result.note_push(&run);
            }
        }
        Ok(result)
    }

    /// Fetch and merge the sync branch into the store, optionally pushing.
    ///
    /// Local changes are committed first so nothing in the store is lost.
    ///
    /// # Errors
    ///
    /// - environment errors (missing remote, branch checked out)
    /// - [`BeadsError::MergeConflict`] when the diverged histories conflict
    /// - push errors when `push` is set
    pub fn pull(&mut self, push: bool) -> Result<PullResult> {
        self.require_remote()?;
        let (wt, _) = self.ensure_worktree(false)?;
        self.options.cancel.check("pull")?;

        let local = self.commit_local(&wt, None)?;
        let before = self.content_at(&wt, "HEAD")?;

        let counts = divergence::divergence(
            &self.git,
            &wt,
            &self.options.branch,
            &self.options.remote,
        )?;
        let relationship = counts.classify();
        tracing::info!(
            local_ahead = counts.local_ahead,
            remote_ahead = counts.remote_ahead,
            ?relationship,
            "Fetched sync branch"
        );
        self.options.cancel.check("pull")?;

        let mut result = PullResult {
            pulled: true,
            committed_local: local.committed,
            ..PullResult::default()
        };
        if let Some(report) = &local.safety {
            result.note_safety(report, "commit");
        }
        match relationship {
            Relationship::UpToDate => {}
            Relationship::FastForward => {
                self.git.merge_ff_only(&wt, &self.tracking_ref())?;
                result.fast_forwarded = true;
            }
            Relationship::Diverged => {
                self.merge_remote_into_worktree(&wt)?;
                result.merged = true;
            }
        }

        let after = self.adopt_head(&wt)?;
        result.imported = after.len();

        result.note_safety(&safety::evaluate(&before, &after), "pull");

        if push && self.local_ahead(&wt)? {
            if result.safety_check_triggered && self.options.require_mass_delete_confirmation {
                tracing::warn!("Push withheld until mass deletion is confirmed");
                result.push_withheld = true;
            } else {
                let run = self.push_with_retry(&wt)?;
                if run.report.merges > 0 {
                    result.imported = self.adopt_head(&wt)?.len();
                    result.merged = true;
                }
                if let Some(report) = &run.safety {
                    result.note_safety(report, "push");
                }
                result.push_withheld = run.report.withheld;
                result.pushed = !run.report.withheld;
            }
        }
        if result.push_withheld {
            result.safety_warnings.push(
                "Push withheld: review the deletions, then run `bsync push` to confirm"
                    .to_string(),
            );
        }
        Ok(result)
    }

    /// Push pending sync-branch commits through the retry protocol.
    ///
    /// # Errors
    ///
    /// Same as the push half of [`commit`](Self::commit).
    pub fn push(&mut self) -> Result<CommitResult> {
        self.require_remote()?;
        let (wt, _) = self.ensure_worktree(false)?;
        let mut result = CommitResult {
            branch: self.options.branch.clone(),
            ..CommitResult::default()
        };
        if !self.local_ahead(&wt)? {
            tracing::info!("Nothing to push");
            return Ok(result);
        }
        let run = self.push_with_retry(&wt)?;
        if run.report.merges > 0 {
            self.adopt_head(&wt)?;
        }
        result.note_push(&run);
        Ok(result)
    }

    /// Fast-forward the worktree before staging. Failure is not fatal.
    fn preemptive_sync(&self, wt: &Path) -> Result<()> {
        let attempt = || -> Result<bool> {
            if !self.git.fetch(wt, &self.options.remote, &self.options.branch)? {
                return Ok(false);
            }
            let (local_ahead, remote_ahead) =
                self.git.rev_list_counts(wt, "HEAD", &self.tracking_ref())?;
            if local_ahead == 0 && remote_ahead > 0 {
                self.git.merge_ff_only(wt, &self.tracking_ref())?;
                return Ok(true);
            }
            Ok(false)
        };
        match attempt() {
            Ok(moved) => {
                tracing::debug!(fast_forwarded = moved, "Pre-emptive sync done");
                Ok(())
            }
            Err(err @ BeadsError::Cancelled { .. }) => Err(err),
            Err(err) => {
                tracing::warn!(error = %err, "Pre-emptive sync failed; continuing with commit");
                Ok(())
            }
        }
    }

    /// Record set committed at `rev` in the worktree; empty if absent.
    fn content_at(&self, wt: &Path, rev: &str) -> Result<RecordSet> {
        if self.git.rev_parse(wt, rev)?.is_none() {
            return Ok(RecordSet::new());
        }
        match self.git.show_file(wt, rev, &self.paths.jsonl_rel)? {
            Some(text) => RecordSet::parse(text.as_bytes(), rev),
            None => Ok(RecordSet::new()),
        }
    }

    fn tracked_paths(&self) -> Vec<&str> {
        let mut paths = vec![self.paths.jsonl_rel.as_str()];
        if self.paths.metadata.is_file() {
            paths.push(self.paths.metadata_rel.as_str());
        }
        paths
    }

    /// Write `bytes` as the record set in the worktree, with metadata.
    fn write_worktree_files(&self, wt: &Path, bytes: &[u8]) -> Result<()> {
        write_atomic(&wt.join(&self.paths.jsonl_rel), bytes)?;
        if self.paths.metadata.is_file() {
            let metadata = fs::read(&self.paths.metadata)?;
            write_atomic(&wt.join(&self.paths.metadata_rel), &metadata)?;
        }
        Ok(())
    }

    /// Stage what is written in the worktree and commit if anything changed.
    fn stage_and_commit(&self, wt: &Path, message: &str) -> Result<bool> {
        self.git.add(wt, &self.tracked_paths())?;
        if !self.git.has_staged_changes(wt)? {
            return Ok(false);
        }
        self.git.commit(wt, message)?;
        tracing::info!(message = %message.lines().next().unwrap_or_default(), "Committed to sync branch");
        Ok(true)
    }

    /// Reconcile the store with the worktree head and commit the result.
    ///
    /// When the head moved past the commit the store last matched, the store
    /// is merged against it first so remote records are not overwritten.
    fn commit_local(&mut self, wt: &Path, message: Option<&str>) -> Result<LocalCommit> {
        let head_rev = self.git.rev_parse(wt, "HEAD")?;
        let head = self.content_at(wt, "HEAD")?;
        let db_bytes = self.store.get_record_set()?;
        let db = RecordSet::parse(&db_bytes, "database")?;
        let dirty = self.store.dirty_ids()?;

        let base_rev = self.store.sync_base()?;
        let (content, merged) = if head_rev.is_none() || base_rev == head_rev {
            (db.clone(), false)
        } else {
            let base = match base_rev.as_deref() {
                Some(rev) => self.content_at(wt, rev)?,
                None => RecordSet::new(),
            };
            tracing::info!(
                base = base_rev.as_deref().unwrap_or("(none)"),
                "Sync branch moved since last sync; merging local changes"
            );
            let outcome = merge_record_sets(&base, &db, &head, self.options.strategy)?;
            (outcome.merged, true)
        };
        let bytes = content.to_bytes()?;

        self.write_worktree_files(wt, &bytes)?;
        let summary = ChangeSummary::between(&head, &content);
        let message = message.map_or_else(|| summary.to_commit_message(), ToString::to_string);
        let committed = self.stage_and_commit(wt, &message)?;

        if content == db {
            self.store.clear_dirty(&dirty)?;
        } else {
            self.store.replace_record_set(&bytes)?;
        }
        self.write_primary(&bytes)?;
        if let Some(head) = self.git.rev_parse(wt, "HEAD")? {
            self.store.set_sync_base(&head)?;
        }

        Ok(LocalCommit {
            committed,
            message: committed.then_some(message),
            merged,
            safety: merged.then(|| safety::evaluate(&db, &content)),
        })
    }

    fn write_primary(&self, bytes: &[u8]) -> Result<()> {
        let current = fs::read(&self.paths.jsonl).ok();
        if current.as_deref() != Some(bytes) {
            write_atomic(&self.paths.jsonl, bytes)?;
        }
        Ok(())
    }

    /// Copy the committed head content into the primary file and the store.
    fn adopt_head(&mut self, wt: &Path) -> Result<RecordSet> {
        let head = self.content_at(wt, "HEAD")?;
        let bytes = head.to_bytes()?;
        self.write_primary(&bytes)?;
        if self.store.get_record_set()? != bytes {
            let count = self.store.replace_record_set(&bytes)?;
            tracing::info!(records = count, "Imported sync branch content");
        }
        self.store.record_export(&bytes_hash(&bytes))?;
        if let Some(rev) = self.git.rev_parse(wt, "HEAD")? {
            self.store.set_sync_base(&rev)?;
        }
        Ok(head)
    }

    fn local_ahead(&self, wt: &Path) -> Result<bool> {
        match self.git.rev_parse(wt, &self.tracking_ref())? {
            None => Ok(self.git.rev_parse(wt, "HEAD")?.is_some()),
            Some(_) => Ok(self.git.rev_list_counts(wt, "HEAD", &self.tracking_ref())?.0 > 0),
        }
    }

    /// Merge the fetched remote tip into the worktree.
    ///
    /// The worktree is reset onto the remote tip and the merged content is
    /// committed on top, so local history is replaced by one merge commit.
    fn merge_remote_into_worktree(&self, wt: &Path) -> Result<RecordSet> {
        let tracking = self.tracking_ref();
        self.git
            .rev_parse(wt, &tracking)?
            .context(format!("{tracking} is missing after fetch; cannot merge"))?;
        let base_rev = self.git.merge_base(wt, "HEAD", &tracking)?;
        let base = match base_rev.as_deref() {
            Some(rev) => self.content_at(wt, rev)?,
            None => RecordSet::new(),
        };
        let local = self.content_at(wt, "HEAD")?;
        let remote = self.content_at(wt, &tracking)?;

        let outcome = merge_record_sets(&base, &local, &remote, self.options.strategy)?;
        tracing::info!(
            base = base_rev.as_deref().unwrap_or("(none)"),
            records = outcome.merged.len(),
            deleted = outcome.stats.deleted,
            "Merged diverged sync branch content"
        );

        self.git.reset_hard(wt, &tracking)?;
        self.write_worktree_files(wt, &outcome.merged.to_bytes()?)?;
        let message = format!(
            "{}\n\nMerged with {}/{}",
            ChangeSummary::between(&remote, &outcome.merged).to_commit_message(),
            self.options.remote,
            self.options.branch
        );
        self.stage_and_commit(wt, &message)?;
        Ok(outcome.merged)
    }

    /// Push with merge-on-rejection and backoff for transient failures.
    ///
    /// Each rejection merge goes through the safety check. Under
    /// `require_mass_delete_confirmation` a triggering merge stays committed
    /// locally and the loop stops without pushing it.
    fn push_with_retry(&self, wt: &Path) -> Result<PushRun> {
        let remote = self.options.remote.as_str();
        let branch = self.options.branch.as_str();
        let mut report = PushReport::default();
        let mut last_check = None;

        loop {
            self.options.cancel.check("push")?;
            report.attempts += 1;

            match self.git.push(wt, remote, branch) {
                Ok(PushOutcome::Pushed) => {
                    tracing::info!(
                        attempts = report.attempts,
                        merges = report.merges,
                        "Pushed sync branch"
                    );
                    return Ok(PushRun {
                        report,
                        safety: last_check,
                    });
                }
                Ok(PushOutcome::Rejected { reason }) => {
                    if report.merges >= self.options.max_push_retries {
                        return Err(BeadsError::PushRetriesExhausted {
                            attempts: report.attempts,
                            last_error: reason,
                        });
                    }
                    tracing::info!(
                        attempt = report.attempts,
                        "Push rejected; merging the new remote tip before retrying"
                    );
                    self.git.fetch(wt, remote, branch)?;
                    let before = self.content_at(wt, "HEAD")?;
                    let merged = match self.merge_remote_into_worktree(wt) {
                        Ok(merged) => merged,
                        Err(BeadsError::MergeConflict { conflicts }) => {
                            return Err(BeadsError::PushConflict {
                                remote: remote.to_string(),
                                branch: branch.to_string(),
                                worktree: wt.to_path_buf(),
                                conflicts,
                            });
                        }
                        Err(err) => return Err(err),
                    };
                    report.merges += 1;

                    let check = safety::evaluate(&before, &merged);
                    if check.triggered {
                        last_check = Some(check);
                        if self.options.require_mass_delete_confirmation {
                            tracing::warn!("Push withheld until mass deletion is confirmed");
                            report.withheld = true;
                            return Ok(PushRun {
                        report,
                        safety: last_check,
                    });
                        }
                    }
                }
                Err(err) if err.is_transient() => {
                    if report.transient_retries >= self.options.max_push_retries {
                        return Err(BeadsError::PushRetriesExhausted {
                            attempts: report.attempts,
                            last_error: err.to_string(),
                        });
                    }
                    let delay = self
                        .options
                        .backoff_base
                        .saturating_mul(2u32.saturating_pow(report.transient_retries));
                    tracing::warn!(
                        attempt = report.attempts,
                        delay_ms = delay.as_millis(),
                        error = %err,
                        "Transient push failure; backing off"
                    );
                    thread::sleep(delay);
                    report.transient_retries += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Commit on the primary checkout when it has the sync branch checked out.
    ///
    /// A second worktree of the same branch is impossible, so the record set
    /// file is committed where it is. A rejected push is reported, not merged.
    fn commit_in_place(&mut self, message: Option<&str>, push: bool) -> Result<CommitResult> {
        let root = self.ctx.repo_root.clone();
        let head = self.content_at(&root, "HEAD")?;
        let bytes = self.store.get_record_set()?;
        let content = RecordSet::parse(&bytes, "database")?;
        let dirty = self.store.dirty_ids()?;

        self.write_primary(&bytes)?;
        let message = message.map_or_else(
            || ChangeSummary::between(&head, &content).to_commit_message(),
            ToString::to_string,
        );
        let committed = self.stage_and_commit(&root, &message)?;
        self.store.clear_dirty(&dirty)?;
        if let Some(rev) = self.git.rev_parse(&root, "HEAD")? {
            self.store.set_sync_base(&rev)?;
        }

        let mut result = CommitResult {
            committed,
            branch: self.options.branch.clone(),
            message: committed.then_some(message),
            ..CommitResult::default()
        };
        if push {
            match self.git.push(&root, &self.options.remote, &self.options.branch)? {
                PushOutcome::Pushed => {
                    result.pushed = true;
                    result.push = Some(PushReport {
                        attempts: 1,
                        ..PushReport::default()
                    });
                }
                PushOutcome::Rejected { reason } => {
                    return Err(BeadsError::GitCommand {
                        command: format!("push {} {}", self.options.remote, self.options.branch),
                        code: Some(1),
                        stderr: format!("{reason}\nPull the branch (git pull) and commit again."),
                    });
                }
            }
        }
        Ok(result)
    }
}
