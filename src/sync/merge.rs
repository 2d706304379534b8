//! Content-level three-way merge of record sets.
//!
//! Records are matched by ID, never by line position. Each field is merged
//! with the classic three-way rule: a side that left a field at its base
//! value yields to the side that changed it. Deletion beats modification, so
//! a record removed on either side stays removed.
//!
//! Some fields never conflict:
//! - `created_at` takes the earliest value, `updated_at` the latest
//! - `labels`, `dependencies` and `comments` merge as sets
//! - a tombstone beats any live lifecycle state
//!
//! Everything else that changed differently on both sides is a conflict.
//! Under [`ConflictStrategy::Manual`] the merge fails closed and reports
//! every conflict; other strategies break ties for eligible fields.
//!
//! The merge is a pure function of its inputs and is symmetric in local and
//! remote for the `manual` and `newest` strategies.

use super::jsonl::RecordSet;
use crate::error::{BeadsError, Result};
use crate::model::Issue;
use serde::Serialize;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Fields moved as one unit so the lifecycle invariants survive a merge.
const LIFECYCLE_FIELDS: &[&str] = &[
    "status",
    "closed_at",
    "close_reason",
    "closed_by_session",
    "deleted_at",
    "deleted_by",
    "delete_reason",
    "original_type",
];

/// Fields that always escalate, whatever the strategy.
const NEVER_AUTO_RESOLVED: &[&str] = &["issue_type", "external_ref", "source_system", "ephemeral"];

const SET_FIELDS: &[&str] = &["labels", "dependencies", "comments"];
const TIMESTAMP_FIELDS: &[&str] = &["created_at", "updated_at"];

/// Tie-break preference for fields both sides changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConflictStrategy {
    /// Fail with a conflict error.
    #[default]
    Manual,
    /// The record with the later `updated_at` wins.
    Newest,
    /// Local wins.
    Ours,
    /// Remote wins.
    Theirs,
}

impl ConflictStrategy {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Newest => "newest",
            Self::Ours => "ours",
            Self::Theirs => "theirs",
        }
    }
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictStrategy {
    type Err = BeadsError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "manual" => Ok(Self::Manual),
            "newest" | "newest-wins" => Ok(Self::Newest),
            "ours" | "local" | "prefer-local" => Ok(Self::Ours),
            "theirs" | "remote" | "prefer-remote" => Ok(Self::Theirs),
            other => Err(BeadsError::validation(
                "conflict-strategy",
                format!("unknown strategy '{other}' (expected manual, newest, ours, theirs)"),
            )),
        }
    }
}

/// One field that changed to different values on both sides.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldConflict {
    pub id: String,
    pub field: String,
    pub base: Option<Value>,
    pub local: Option<Value>,
    pub remote: Option<Value>,
}

fn show_value(value: Option<&Value>) -> String {
    let text = value.map_or_else(|| "<absent>".to_string(), Value::to_string);
    crate::util::truncate_title(&text, 60)
}

impl fmt::Display for FieldConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}: base={} local={} remote={}",
            self.id,
            self.field,
            show_value(self.base.as_ref()),
            show_value(self.local.as_ref()),
            show_value(self.remote.as_ref())
        )
    }
}

/// Counts describing what a merge did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub unchanged: usize,
    pub added_local: usize,
    pub added_remote: usize,
    pub deleted: usize,
    pub merged: usize,
    pub resolved_by_strategy: usize,
}

/// Successful merge result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub merged: RecordSet,
    pub stats: MergeStats,
}

/// Merge three record sets.
///
/// # Errors
///
/// Returns [`BeadsError::MergeConflict`] listing every unresolved field,
/// sorted by record ID and field name.
pub fn merge_record_sets(
    base: &RecordSet,
    local: &RecordSet,
    remote: &RecordSet,
    strategy: ConflictStrategy,
) -> Result<MergeOutcome> {
    let ids: BTreeSet<&str> = base.ids().chain(local.ids()).chain(remote.ids()).collect();

    let mut merged = RecordSet::new();
    let mut stats = MergeStats::default();
    let mut conflicts = Vec::new();

    for id in ids {
        match (base.get(id), local.get(id), remote.get(id)) {
            (_, Some(l), Some(r)) if l == r => {
                stats.unchanged += 1;
                merged.insert(l.clone());
            }
            (b, Some(l), Some(r)) if b == Some(l) => {
                merged.insert(r.clone());
            }
            (b, Some(l), Some(r)) if b == Some(r) => {
                merged.insert(l.clone());
            }
            (b, Some(l), Some(r)) => match merge_issue(b, l, r, strategy)? {
                IssueMerge::Clean { issue, by_strategy } => {
                    stats.merged += 1;
                    stats.resolved_by_strategy += by_strategy;
                    merged.insert(issue);
                }
                IssueMerge::Conflicted(mut found) => conflicts.append(&mut found),
            },
            (None, Some(l), None) => {
                stats.added_local += 1;
                merged.insert(l.clone());
            }
            (None, None, Some(r)) => {
                stats.added_remote += 1;
                merged.insert(r.clone());
            }
            // Present in base and missing on at least one side: deleted.
            (Some(_), _, _) => {
                tracing::debug!(id, "Record deleted on one side; propagating deletion");
                stats.deleted += 1;
            }
            (None, None, None) => {}
        }
    }

    if !conflicts.is_empty() {
        conflicts.sort_by(|a, b| (&a.id, &a.field).cmp(&(&b.id, &b.field)));
        return Err(BeadsError::MergeConflict { conflicts });
    }

    tracing::debug!(
        records = merged.len(),
        merged = stats.merged,
        deleted = stats.deleted,
        added_local = stats.added_local,
        added_remote = stats.added_remote,
        "Record set merge complete"
    );
    Ok(MergeOutcome { merged, stats })
}

/// Merge three serialized record sets into serialized output.
///
/// # Errors
///
/// Returns an error if any input has conflict markers or fails to parse,
/// or if the merge conflicts.
pub fn merge_bytes(
    base: &[u8],
    local: &[u8],
    remote: &[u8],
    strategy: ConflictStrategy,
) -> Result<Vec<u8>> {
    let base = RecordSet::parse(base, "base")?;
    let local = RecordSet::parse(local, "local")?;
    let remote = RecordSet::parse(remote, "remote")?;
    merge_record_sets(&base, &local, &remote, strategy)?
        .merged
        .to_bytes()
}

/// Merge three record set files. A missing base file is the empty set.
///
/// # Errors
///
/// Returns an error if local or remote cannot be read, or if
/// [`merge_bytes`] fails.
pub fn merge_files(
    base: &Path,
    local: &Path,
    remote: &Path,
    strategy: ConflictStrategy,
) -> Result<Vec<u8>> {
    let base_bytes = match fs::read(base) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(err) => return Err(err.into()),
    };
    merge_bytes(&base_bytes, &fs::read(local)?, &fs::read(remote)?, strategy)
}

enum IssueMerge {
    Clean { issue: Issue, by_strategy: usize },
    Conflicted(Vec<FieldConflict>),
}

enum FieldMerge {
    Resolved(Option<Value>),
    ByStrategy(Option<Value>),
    Conflict,
}

type Fields = Map<String, Value>;

fn to_fields(issue: &Issue) -> Result<Fields> {
    match serde_json::to_value(issue)? {
        Value::Object(map) => Ok(map),
        _ => Err(BeadsError::validation("record", "did not serialize to an object")),
    }
}

/// Canonical text used for deterministic tie-breaks.
fn canonical(value: Option<&Value>) -> String {
    value.map_or_else(|| "null".to_string(), Value::to_string)
}

fn greater_value(a: Option<Value>, b: Option<Value>) -> Option<Value> {
    if canonical(a.as_ref()) >= canonical(b.as_ref()) {
        a
    } else {
        b
    }
}

struct Sides<'a> {
    local: &'a Issue,
    remote: &'a Issue,
    strategy: ConflictStrategy,
}

impl Sides<'_> {
    fn resolve(&self, field: &str, l: Option<Value>, r: Option<Value>) -> FieldMerge {
        if NEVER_AUTO_RESOLVED.contains(&field) {
            return FieldMerge::Conflict;
        }
        match self.strategy {
            ConflictStrategy::Manual => FieldMerge::Conflict,
            ConflictStrategy::Ours => FieldMerge::ByStrategy(l),
            ConflictStrategy::Theirs => FieldMerge::ByStrategy(r),
            ConflictStrategy::Newest => {
                let winner = match self.local.updated_at.cmp(&self.remote.updated_at) {
                    Ordering::Greater => l,
                    Ordering::Less => r,
                    Ordering::Equal => greater_value(l, r),
                };
                FieldMerge::ByStrategy(winner)
            }
        }
    }

    fn three_way(
        &self,
        field: &str,
        b: Option<&Value>,
        l: Option<&Value>,
        r: Option<&Value>,
    ) -> FieldMerge {
        if l == r || b == r {
            FieldMerge::Resolved(l.cloned())
        } else if b == l {
            FieldMerge::Resolved(r.cloned())
        } else {
            self.resolve(field, l.cloned(), r.cloned())
        }
    }
}

fn merge_issue(
    base: Option<&Issue>,
    local: &Issue,
    remote: &Issue,
    strategy: ConflictStrategy,
) -> Result<IssueMerge> {
    let sides = Sides {
        local,
        remote,
        strategy,
    };
    let b = base.map(to_fields).transpose()?.unwrap_or_default();
    let l = to_fields(local)?;
    let r = to_fields(remote)?;

    let mut out = Fields::new();
    let mut conflicts = Vec::new();
    let mut by_strategy = 0;

    let mut record = |field: &str, outcome: FieldMerge, base_v, local_v, remote_v, out: &mut Fields| {
        match outcome {
            FieldMerge::Resolved(value) => set_field(out, field, value),
            FieldMerge::ByStrategy(value) => {
                by_strategy += 1;
                set_field(out, field, value);
            }
            FieldMerge::Conflict => conflicts.push(FieldConflict {
                id: local.id.clone(),
                field: field.to_string(),
                base: base_v,
                local: local_v,
                remote: remote_v,
            }),
        }
    };

    let keys: BTreeSet<&String> = b.keys().chain(l.keys()).chain(r.keys()).collect();
    for key in keys {
        let field = key.as_str();
        if LIFECYCLE_FIELDS.contains(&field)
            || SET_FIELDS.contains(&field)
            || TIMESTAMP_FIELDS.contains(&field)
        {
            continue;
        }
        let outcome = sides.three_way(field, b.get(field), l.get(field), r.get(field));
        record(
            field,
            outcome,
            b.get(field).cloned(),
            l.get(field).cloned(),
            r.get(field).cloned(),
            &mut out,
        );
    }

    let (bl, ll, rl) = (
        base.map(|_| lifecycle_group(&b)),
        lifecycle_group(&l),
        lifecycle_group(&r),
    );
    let outcome = merge_lifecycle(&sides, bl.as_ref(), &ll, &rl);
    record("status", outcome, bl, Some(ll), Some(rl), &mut out);

    for field in SET_FIELDS {
        let merged = merge_set(field, b.get(*field), l.get(*field), r.get(*field));
        set_field(&mut out, field, (!merged.is_empty()).then_some(Value::Array(merged)));
    }

    if !conflicts.is_empty() {
        return Ok(IssueMerge::Conflicted(conflicts));
    }

    let mut merged: Issue = serde_json::from_value(Value::Object(out))?;
    merged.created_at = local.created_at.min(remote.created_at);
    merged.updated_at = local.updated_at.max(remote.updated_at);
    merged.normalize_lifecycle();

    Ok(IssueMerge::Clean {
        issue: merged,
        by_strategy,
    })
}

fn set_field(out: &mut Fields, field: &str, value: Option<Value>) {
    match value {
        Some(Value::Object(group)) if field == "status" => {
            for (k, v) in group {
                out.insert(k, v);
            }
        }
        Some(value) => {
            out.insert(field.to_string(), value);
        }
        None => {}
    }
}

fn lifecycle_group(fields: &Fields) -> Value {
    let group: Map<String, Value> = LIFECYCLE_FIELDS
        .iter()
        .filter_map(|k| fields.get(*k).map(|v| ((*k).to_string(), v.clone())))
        .collect();
    Value::Object(group)
}

fn is_tombstone_group(group: &Value) -> bool {
    group.get("status").and_then(Value::as_str) == Some("tombstone")
}

fn merge_lifecycle(sides: &Sides<'_>, b: Option<&Value>, l: &Value, r: &Value) -> FieldMerge {
    match (is_tombstone_group(l), is_tombstone_group(r)) {
        (true, false) => FieldMerge::Resolved(Some(l.clone())),
        (false, true) => FieldMerge::Resolved(Some(r.clone())),
        (true, true) if l == r => FieldMerge::Resolved(Some(l.clone())),
        (true, true) => {
            let winner = match sides.local.deleted_at.cmp(&sides.remote.deleted_at) {
                Ordering::Greater => l.clone(),
                Ordering::Less => r.clone(),
                Ordering::Equal => {
                    if canonical(Some(l)) >= canonical(Some(r)) {
                        l.clone()
                    } else {
                        r.clone()
                    }
                }
            };
            FieldMerge::Resolved(Some(winner))
        }
        (false, false) => sides.three_way("status", b, Some(l), Some(r)),
    }
}

fn elements(value: Option<&Value>) -> BTreeMap<String, Value> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .map(|item| (item.to_string(), item.clone()))
                .collect()
        })
        .unwrap_or_default()
}

/// Three-way set merge keyed by element value.
///
/// An element survives if both sides have it, or if one side added it.
/// Removing an element that was in the base wins over keeping it.
fn merge_set(field: &str, b: Option<&Value>, l: Option<&Value>, r: Option<&Value>) -> Vec<Value> {
    let (base, local, remote) = (elements(b), elements(l), elements(r));
    let keys: BTreeSet<&String> = local.keys().chain(remote.keys()).collect();

    let mut kept: Vec<Value> = keys
        .into_iter()
        .filter(|key| {
            let (in_l, in_r) = (local.contains_key(*key), remote.contains_key(*key));
            (in_l && in_r) || !base.contains_key(*key)
        })
        .filter_map(|key| local.get(key).or_else(|| remote.get(key)).cloned())
        .collect();

    if field == "dependencies" {
        kept = dedupe_dependencies(kept);
    }
    kept.sort_by(|a, b| set_sort_key(field, a).cmp(&set_sort_key(field, b)));
    kept
}

/// One edge per (target, type); the greater serialized value wins.
fn dedupe_dependencies(deps: Vec<Value>) -> Vec<Value> {
    let mut by_edge: BTreeMap<(String, String), Value> = BTreeMap::new();
    for dep in deps {
        let edge = (
            dep.get("depends_on_id").map(Value::to_string).unwrap_or_default(),
            dep.get("type").map(Value::to_string).unwrap_or_default(),
        );
        match by_edge.get(&edge) {
            Some(existing) if existing.to_string() >= dep.to_string() => {}
            _ => {
                by_edge.insert(edge, dep);
            }
        }
    }
    by_edge.into_values().collect()
}

fn set_sort_key(field: &str, value: &Value) -> (String, String) {
    let primary = match field {
        "dependencies" => value.get("depends_on_id"),
        "comments" => value.get("created_at"),
        _ => None,
    };
    (
        primary.map(Value::to_string).unwrap_or_default(),
        value.to_string(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Comment, Dependency, DependencyType, IssueType, Status};
    use chrono::{DateTime, TimeZone, Utc};

    fn ts(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn issue(id: &str, title: &str) -> Issue {
        Issue::new(id, title, ts(1_000))
    }

    fn set(issues: &[Issue]) -> RecordSet {
        issues.iter().cloned().collect()
    }

    fn merge(b: &[Issue], l: &[Issue], r: &[Issue]) -> Result<RecordSet> {
        merge_record_sets(&set(b), &set(l), &set(r), ConflictStrategy::Manual).map(|o| o.merged)
    }

    #[test]
    fn deletion_beats_close_on_other_side() {
        let a = issue("bd-a", "A");
        let mut closed = a.clone();
        closed.status = Status::Closed;
        closed.closed_at = Some(ts(2_000));
        closed.updated_at = ts(2_000);

        let merged = merge(&[a], &[closed], &[]).unwrap();
        assert!(!merged.contains("bd-a"));
    }

    #[test]
    fn deletion_on_local_propagates() {
        let a = issue("bd-a", "A");
        let b = issue("bd-b", "B");
        let merged = merge(&[a.clone(), b.clone()], &[b.clone()], &[a, b]).unwrap();
        assert_eq!(merged.ids().collect::<Vec<_>>(), vec!["bd-b"]);
    }

    #[test]
    fn additions_from_both_sides_are_kept() {
        let merged = merge(&[], &[issue("bd-l", "L")], &[issue("bd-r", "R")]).unwrap();
        assert_eq!(merged.len(), 2);
    }

    #[test]
    fn disjoint_field_changes_combine() {
        let base = issue("bd-a", "A");
        let mut local = base.clone();
        local.title = "A2".to_string();
        local.updated_at = ts(2_000);
        let mut remote = base.clone();
        remote.assignee = Some("alice".to_string());
        remote.updated_at = ts(3_000);

        let merged = merge(&[base], &[local], &[remote]).unwrap();
        let a = merged.get("bd-a").unwrap();
        assert_eq!(a.title, "A2");
        assert_eq!(a.assignee.as_deref(), Some("alice"));
        assert_eq!(a.updated_at, ts(3_000));
    }

    #[test]
    fn same_field_changed_both_sides_conflicts() {
        let base = issue("bd-a", "X");
        let mut local = base.clone();
        local.title = "Y".to_string();
        let mut remote = base.clone();
        remote.title = "Z".to_string();

        let err = merge(&[base], &[local], &[remote]).unwrap_err();
        let BeadsError::MergeConflict { conflicts } = err else {
            panic!("expected conflict, got {err:?}");
        };
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].id, "bd-a");
        assert_eq!(conflicts[0].field, "title");
        assert_eq!(conflicts[0].local, Some(Value::from("Y")));
        assert_eq!(conflicts[0].remote, Some(Value::from("Z")));
    }

    #[test]
    fn strategies_break_ties() {
        let base = issue("bd-a", "X");
        let mut local = base.clone();
        local.title = "Y".to_string();
        local.updated_at = ts(5_000);
        let mut remote = base.clone();
        remote.title = "Z".to_string();
        remote.updated_at = ts(4_000);
        let (b, l, r) = (set(&[base]), set(&[local]), set(&[remote]));

        let title = |s| {
            merge_record_sets(&b, &l, &r, s)
                .unwrap()
                .merged
                .get("bd-a")
                .unwrap()
                .title
                .clone()
        };
        assert_eq!(title(ConflictStrategy::Ours), "Y");
        assert_eq!(title(ConflictStrategy::Theirs), "Z");
        assert_eq!(title(ConflictStrategy::Newest), "Y");
    }

    #[test]
    fn issue_type_always_escalates() {
        let base = issue("bd-a", "A");
        let mut local = base.clone();
        local.issue_type = IssueType::Bug;
        let mut remote = base.clone();
        remote.issue_type = IssueType::Feature;
        let err = merge_record_sets(
            &set(&[base]),
            &set(&[local]),
            &set(&[remote]),
            ConflictStrategy::Theirs,
        )
        .unwrap_err();
        assert!(matches!(err, BeadsError::MergeConflict { .. }));
    }

    #[test]
    fn tombstone_beats_live_edit() {
        let base = issue("bd-a", "A");
        let mut local = base.clone();
        local.title = "edited".to_string();
        local.updated_at = ts(9_000);
        let mut remote = base.clone();
        remote.status = Status::Tombstone;
        remote.deleted_at = Some(ts(2_000));
        remote.original_type = Some("task".to_string());
        remote.updated_at = ts(2_000);

        let merged = merge(&[base], &[local], &[remote]).unwrap();
        let a = merged.get("bd-a").unwrap();
        assert_eq!(a.status, Status::Tombstone);
        assert_eq!(a.deleted_at, Some(ts(2_000)));
        assert_eq!(a.title, "edited");
        assert!(a.lifecycle_violation().is_none());
    }

    #[test]
    fn close_on_both_sides_with_different_reasons_conflicts() {
        let base = issue("bd-a", "A");
        let mut local = base.clone();
        local.status = Status::Closed;
        local.closed_at = Some(ts(2_000));
        local.close_reason = Some("done".to_string());
        let mut remote = local.clone();
        remote.close_reason = Some("wontfix".to_string());

        let err = merge(&[base], &[local], &[remote]).unwrap_err();
        let BeadsError::MergeConflict { conflicts } = err else {
            panic!("expected conflict");
        };
        assert_eq!(conflicts[0].field, "status");
    }

    #[test]
    fn labels_merge_as_sets() {
        let mut base = issue("bd-a", "A");
        base.labels = vec!["keep".to_string(), "drop".to_string()];
        let mut local = base.clone();
        local.labels = vec!["keep".to_string(), "local".to_string()];
        let mut remote = base.clone();
        remote.labels = vec!["drop".to_string(), "keep".to_string(), "remote".to_string()];

        let merged = merge(&[base], &[local], &[remote]).unwrap();
        assert_eq!(
            merged.get("bd-a").unwrap().labels,
            vec!["keep", "local", "remote"]
        );
    }

    #[test]
    fn dependencies_and_comments_union() {
        let base = issue("bd-a", "A");
        let mut local = base.clone();
        local.dependencies.push(Dependency {
            issue_id: "bd-a".to_string(),
            depends_on_id: "bd-x".to_string(),
            dep_type: DependencyType::Blocks,
            created_at: ts(1_500),
            created_by: None,
            metadata: None,
            thread_id: None,
        });
        let mut remote = base.clone();
        remote.comments.push(Comment {
            id: 1,
            issue_id: "bd-a".to_string(),
            author: "bob".to_string(),
            body: "hi".to_string(),
            created_at: ts(1_600),
        });

        let merged = merge(&[base], &[local], &[remote]).unwrap();
        let a = merged.get("bd-a").unwrap();
        assert_eq!(a.dependencies.len(), 1);
        assert_eq!(a.comments.len(), 1);
    }

    #[test]
    fn both_added_same_id_merge_against_empty_base() {
        let local = issue("bd-a", "same");
        let mut remote = local.clone();
        remote.notes = Some("remote notes".to_string());
        remote.created_at = ts(500);

        let merged = merge(&[], &[local], &[remote]).unwrap();
        let a = merged.get("bd-a").unwrap();
        assert_eq!(a.notes.as_deref(), Some("remote notes"));
        assert_eq!(a.created_at, ts(500));
    }

    #[test]
    fn line_order_does_not_matter() {
        let a = issue("bd-a", "A");
        let b = issue("bd-b", "B");
        let forward = format!(
            "{}\n{}\n",
            serde_json::to_string(&a).unwrap(),
            serde_json::to_string(&b).unwrap()
        );
        let backward = format!(
            "{}\n{}\n",
            serde_json::to_string(&b).unwrap(),
            serde_json::to_string(&a).unwrap()
        );
        let out = merge_bytes(
            forward.as_bytes(),
            backward.as_bytes(),
            forward.as_bytes(),
            ConflictStrategy::Manual,
        )
        .unwrap();
        assert_eq!(out, set(&[a, b]).to_bytes().unwrap());
    }

    #[test]
    fn conflict_markers_in_input_fail() {
        let err = merge_bytes(b"", b"<<<<<<< HEAD\n", b"", ConflictStrategy::Manual).unwrap_err();
        assert!(matches!(err, BeadsError::ConflictMarkers { .. }));
    }

    #[test]
    fn strategy_parsing_accepts_aliases() {
        assert_eq!(
            "prefer-local".parse::<ConflictStrategy>().unwrap(),
            ConflictStrategy::Ours
        );
        assert_eq!(
            "prefer_remote".parse::<ConflictStrategy>().unwrap(),
            ConflictStrategy::Theirs
        );
        assert_eq!(
            "Newest".parse::<ConflictStrategy>().unwrap(),
            ConflictStrategy::Newest
        );
        assert!("coinflip".parse::<ConflictStrategy>().is_err());
    }
}
