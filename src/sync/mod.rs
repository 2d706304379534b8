//! Git-transported synchronization of the record set.
//!
//! The database is the working copy. `flush_to_jsonl` writes it out as a
//! record set file, `import_from_jsonl` reads one back, and
//! [`engine::SyncEngine`] moves that file between replicas over a dedicated
//! git branch:
//!
//! - [`worktree`] keeps an isolated checkout of the sync branch
//! - [`divergence`] compares local and remote tips
//! - [`merge`] reconciles diverged record sets field by field
//! - [`safety`] flags merges that make most records disappear

pub mod divergence;
pub mod engine;
pub mod jsonl;
pub mod merge;
pub mod safety;
pub mod worktree;

pub use engine::{CommitResult, PullResult, PushReport, SyncEngine, SyncOptions, SyncPaths};
pub use jsonl::RecordSet;
pub use merge::{ConflictStrategy, FieldConflict, merge_bytes, merge_files, merge_record_sets};

use crate::error::{BeadsError, Result};
use crate::model::Issue;
use crate::storage::RecordStore;
use crate::util::{bytes_hash, truncate_title, write_atomic};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Prefix of every commit the engine writes on the sync branch.
pub const COMMIT_PREFIX: &str = "bd sync:";

const MAX_DETAILED_CHANGES: usize = 5;
const COMMIT_TITLE_WIDTH: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Created,
    Updated,
    Deleted,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Updated => "updated",
            Self::Deleted => "deleted",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChangeDetail {
    pub id: String,
    pub title: String,
    pub kind: ChangeKind,
}

/// Differences between two record sets, used for commit messages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChangeSummary {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub details: Vec<ChangeDetail>,
}

impl ChangeSummary {
    /// Tombstoning a record counts as deleting it.
    #[must_use]
    pub fn between(before: &RecordSet, after: &RecordSet) -> Self {
        let mut summary = Self::default();
        let push = |issue: &Issue, kind: ChangeKind, summary: &mut Self| {
            match kind {
                ChangeKind::Created => summary.created += 1,
                ChangeKind::Updated => summary.updated += 1,
                ChangeKind::Deleted => summary.deleted += 1,
            }
            summary.details.push(ChangeDetail {
                id: issue.id.clone(),
                title: issue.title.clone(),
                kind,
            });
        };

        for issue in after.iter() {
            match before.get(&issue.id) {
                None if issue.is_tombstone() => {}
                None => push(issue, ChangeKind::Created, &mut summary),
                Some(old) if old == issue => {}
                Some(old) if issue.is_tombstone() && !old.is_tombstone() => {
                    push(issue, ChangeKind::Deleted, &mut summary);
                }
                Some(_) => push(issue, ChangeKind::Updated, &mut summary),
            }
        }
        for issue in before.iter() {
            if !after.contains(&issue.id) && !issue.is_tombstone() {
                push(issue, ChangeKind::Deleted, &mut summary);
            }
        }
        summary
    }

    #[must_use]
    pub const fn total(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.total() == 0
    }

    fn subject(&self) -> String {
        let mut parts = Vec::new();
        if self.created > 0 {
            parts.push(format!("+{} created", self.created));
        }
        if self.updated > 0 {
            parts.push(format!("~{} updated", self.updated));
        }
        if self.deleted > 0 {
            parts.push(format!("-{} deleted", self.deleted));
        }
        if parts.is_empty() {
            format!("{COMMIT_PREFIX} no changes")
        } else {
            format!("{COMMIT_PREFIX} {}", parts.join(", "))
        }
    }

    /// Count subject, plus one line per record when few changed.
    #[must_use]
    pub fn to_commit_message(&self) -> String {
        let subject = self.subject();
        if self.details.is_empty() || self.total() > MAX_DETAILED_CHANGES {
            return subject;
        }
        let lines: Vec<String> = self
            .details
            .iter()
            .map(|d| {
                format!(
                    "{} {}: \"{}\"",
                    d.kind,
                    d.id,
                    truncate_title(&d.title, COMMIT_TITLE_WIDTH)
                )
            })
            .collect();
        format!("{subject}\n\n{}", lines.join("\n"))
    }
}

/// Outcome of writing the database out to a record set file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlushResult {
    pub path: PathBuf,
    pub exported: usize,
    pub dirty_cleared: usize,
    /// False when the file already had identical content.
    pub changed: bool,
    pub content_hash: String,
}

/// Write the store's record set to `path` atomically.
///
/// Refuses to replace a non-empty file with an empty export unless `force`
/// is set, since that usually means the database was lost, not emptied.
///
/// # Errors
///
/// Returns an error if the store cannot be read, the guard refuses, or the
/// write fails.
pub fn flush_to_jsonl(store: &mut impl RecordStore, path: &Path, force: bool) -> Result<FlushResult> {
    let bytes = store.get_record_set()?;
    let existing = match fs::read(path) {
        Ok(existing) => Some(existing),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
        Err(err) => return Err(err.into()),
    };

    if bytes.is_empty() && !force {
        if let Some(existing) = existing.as_deref() {
            let previous = RecordSet::parse(existing, &path.display().to_string())?;
            if !previous.is_empty() {
                return Err(BeadsError::validation(
                    "flush",
                    format!(
                        "refusing to overwrite {} ({} records) with an empty export; use --force",
                        path.display(),
                        previous.len()
                    ),
                ));
            }
        }
    }

    let changed = existing.as_deref() != Some(bytes.as_slice());
    if changed {
        write_atomic(path, &bytes)?;
    }

    let content_hash = bytes_hash(&bytes);
    store.record_export(&content_hash)?;
    let dirty = store.dirty_ids()?;
    let dirty_cleared = store.clear_dirty(&dirty)?;

    let exported = RecordSet::parse(&bytes, "export")?.len();
    tracing::info!(
        path = %path.display(),
        exported,
        changed,
        "Flushed database to record set file"
    );
    Ok(FlushResult {
        path: path.to_path_buf(),
        exported,
        dirty_cleared,
        changed,
        content_hash,
    })
}

/// Outcome of loading a record set file into the database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportResult {
    pub imported: usize,
    pub normalized: usize,
    pub content_hash: String,
}

/// Replace the store's records with the content of `path`.
///
/// Records violating the lifecycle rules are normalized before import. A
/// missing file imports nothing and leaves the store alone.
///
/// # Errors
///
/// Returns an error on conflict markers, unparsable lines, or a failed write.
pub fn import_from_jsonl(store: &mut impl RecordStore, path: &Path) -> Result<ImportResult> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "No record set file to import");
        return Ok(ImportResult {
            imported: 0,
            normalized: 0,
            content_hash: bytes_hash(&[]),
        });
    }
    let set = RecordSet::read_file(path)?;

    let mut normalized = 0;
    let set: RecordSet = set
        .into_iter()
        .map(|mut issue| {
            if let Some(reason) = issue.lifecycle_violation() {
                tracing::warn!(id = %issue.id, reason, "Normalizing record lifecycle on import");
                issue.normalize_lifecycle();
                normalized += 1;
            }
            issue
        })
        .collect();

    let bytes = set.to_bytes()?;
    let imported = store.replace_record_set(&bytes)?;
    let content_hash = bytes_hash(&bytes);
    store.record_export(&content_hash)?;

    tracing::info!(path = %path.display(), imported, normalized, "Imported record set file");
    Ok(ImportResult {
        imported,
        normalized,
        content_hash,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Status;
    use crate::storage::SqliteStorage;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn issue(id: &str, title: &str) -> Issue {
        Issue::new(id, title, Utc.timestamp_opt(1_700_000_000, 0).unwrap())
    }

    #[test]
    fn summary_counts_and_details() {
        let before: RecordSet = [issue("bd-1", "Keep"), issue("bd-2", "Edit"), issue("bd-3", "Drop")]
            .into_iter()
            .collect();
        let mut edited = issue("bd-2", "Edited");
        edited.updated_at = Utc.timestamp_opt(1_700_000_100, 0).unwrap();
        let after: RecordSet = [issue("bd-1", "Keep"), edited, issue("bd-4", "New")]
            .into_iter()
            .collect();

        let summary = ChangeSummary::between(&before, &after);
        assert_eq!((summary.created, summary.updated, summary.deleted), (1, 1, 1));

        let message = summary.to_commit_message();
        assert!(message.starts_with("bd sync: +1 created, ~1 updated, -1 deleted\n\n"));
        assert!(message.contains("created bd-4: \"New\""));
        assert!(message.contains("deleted bd-3: \"Drop\""));
    }

    #[test]
    fn tombstoning_counts_as_delete() {
        let before: RecordSet = [issue("bd-1", "A")].into_iter().collect();
        let mut gone = issue("bd-1", "A");
        gone.status = Status::Tombstone;
        gone.normalize_lifecycle();
        let after: RecordSet = [gone].into_iter().collect();
        let summary = ChangeSummary::between(&before, &after);
        assert_eq!(summary.deleted, 1);
        assert_eq!(summary.updated, 0);
    }

    #[test]
    fn large_change_sets_use_counts_only() {
        let after: RecordSet = (0..6).map(|i| issue(&format!("bd-{i}"), "x")).collect();
        let message = ChangeSummary::between(&RecordSet::new(), &after).to_commit_message();
        assert_eq!(message, "bd sync: +6 created");
    }

    #[test]
    fn flush_then_import_restores_database() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("issues.jsonl");
        let mut store = SqliteStorage::open_memory().unwrap();
        store.upsert_issue(&issue("bd-1", "A")).unwrap();
        store.upsert_issue(&issue("bd-2", "B")).unwrap();

        let flushed = flush_to_jsonl(&mut store, &path, false).unwrap();
        assert_eq!(flushed.exported, 2);
        assert_eq!(flushed.dirty_cleared, 2);
        assert!(flushed.changed);
        assert!(!flush_to_jsonl(&mut store, &path, false).unwrap().changed);

        let mut fresh = SqliteStorage::open_memory().unwrap();
        let imported = import_from_jsonl(&mut fresh, &path).unwrap();
        assert_eq!(imported.imported, 2);
        assert_eq!(imported.content_hash, flushed.content_hash);
        assert!(fresh.get_issue("bd-2").unwrap().is_some());
    }

    #[test]
    fn empty_flush_over_populated_file_needs_force() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("issues.jsonl");
        let mut store = SqliteStorage::open_memory().unwrap();
        store.upsert_issue(&issue("bd-1", "A")).unwrap();
        flush_to_jsonl(&mut store, &path, false).unwrap();

        let mut empty = SqliteStorage::open_memory().unwrap();
        assert!(flush_to_jsonl(&mut empty, &path, false).is_err());
        assert_eq!(flush_to_jsonl(&mut empty, &path, true).unwrap().exported, 0);
    }

    #[test]
    fn import_normalizes_lifecycle() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("issues.jsonl");
        let mut closed = issue("bd-1", "A");
        closed.status = Status::Closed;
        fs::write(&path, format!("{}\n", serde_json::to_string(&closed).unwrap())).unwrap();

        let mut store = SqliteStorage::open_memory().unwrap();
        let result = import_from_jsonl(&mut store, &path).unwrap();
        assert_eq!(result.normalized, 1);
        assert!(store.get_issue("bd-1").unwrap().unwrap().closed_at.is_some());
    }
}
