//! Content hashing for no-op change detection.
//!
//! Uses SHA256 over stable ordered fields with null separators, so two
//! replicas holding the same semantic content agree on the hash even when
//! timestamps or serialization order differ.

use sha2::{Digest, Sha256};

use crate::model::Issue;

/// Compute SHA256 content hash for an issue.
///
/// Fields included (stable order with null separators):
/// - title, description, design, `acceptance_criteria`, notes
/// - status, priority, `issue_type`
/// - assignee, `external_ref`
/// - pinned, `is_template`
/// - labels (sorted), dependency targets (sorted), comment bodies
///
/// Timestamps, actors and tombstone bookkeeping are excluded: touching a
/// record without changing it must not look like a change.
#[must_use]
pub fn content_hash(issue: &Issue) -> String {
    let mut hasher = Sha256::new();

    let mut add_field = |value: &str| {
        if value.contains('\0') {
            hasher.update(value.replace('\0', " ").as_bytes());
        } else {
            hasher.update(value.as_bytes());
        }
        hasher.update(b"\x00");
    };

    add_field(&issue.title);
    add_field(issue.description.as_deref().unwrap_or(""));
    add_field(issue.design.as_deref().unwrap_or(""));
    add_field(issue.acceptance_criteria.as_deref().unwrap_or(""));
    add_field(issue.notes.as_deref().unwrap_or(""));
    add_field(issue.status.as_str());
    add_field(&format!("P{}", issue.priority.0));
    add_field(issue.issue_type.as_str());
    add_field(issue.assignee.as_deref().unwrap_or(""));
    add_field(issue.external_ref.as_deref().unwrap_or(""));
    add_field(if issue.pinned { "true" } else { "false" });
    add_field(if issue.is_template { "true" } else { "false" });

    let mut labels: Vec<&str> = issue.labels.iter().map(String::as_str).collect();
    labels.sort_unstable();
    add_field(&labels.join(","));

    let mut deps: Vec<String> = issue
        .dependencies
        .iter()
        .map(|d| format!("{}:{}", d.depends_on_id, d.dep_type))
        .collect();
    deps.sort_unstable();
    add_field(&deps.join(","));

    for comment in &issue.comments {
        add_field(&comment.body);
    }

    format!("{:x}", hasher.finalize())
}

/// SHA256 of a serialized record set, as stored in sync metadata.
#[must_use]
pub fn bytes_hash(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn make_test_issue() -> Issue {
        let mut issue = Issue::new(
            "bd-test123",
            "Test Issue",
            Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
        );
        issue.description = Some("A test description".to_string());
        issue
    }

    #[test]
    fn test_content_hash_deterministic() {
        let issue = make_test_issue();
        assert_eq!(content_hash(&issue), content_hash(&issue));
        assert_eq!(content_hash(&issue).len(), 64);
    }

    #[test]
    fn test_content_hash_ignores_timestamps() {
        let issue = make_test_issue();
        let mut touched = issue.clone();
        touched.updated_at = Utc.timestamp_opt(1_800_000_000, 0).unwrap();
        assert_eq!(content_hash(&issue), content_hash(&touched));
    }

    #[test]
    fn test_content_hash_sees_label_changes_but_not_order() {
        let mut a = make_test_issue();
        a.labels = vec!["x".to_string(), "y".to_string()];
        let mut b = make_test_issue();
        b.labels = vec!["y".to_string(), "x".to_string()];
        assert_eq!(content_hash(&a), content_hash(&b));

        b.labels.push("z".to_string());
        assert_ne!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_null_bytes_do_not_shift_fields() {
        let mut a = make_test_issue();
        a.title = "a\0b".to_string();
        let mut b = make_test_issue();
        b.title = "a".to_string();
        b.description = Some("b".to_string());
        assert_ne!(content_hash(&a), content_hash(&b));
    }

    #[test]
    fn test_bytes_hash() {
        assert_eq!(
            bytes_hash(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
