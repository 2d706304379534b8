//! Record sets: ID-keyed collections serialized one JSON object per line.
//!
//! Line order carries no meaning. Parsing keys every record by its ID and
//! serialization always emits records sorted by ID, so the same logical set
//! always produces the same bytes.

use crate::error::{BeadsError, Result, ResultExt};
use crate::model::Issue;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

const CONFLICT_START: &str = "<<<<<<<";
const CONFLICT_SEPARATOR: &str = "=======";
const CONFLICT_END: &str = ">>>>>>>";

/// Line number (1-based) of the first textual conflict marker, if any.
#[must_use]
pub fn find_conflict_marker(bytes: &[u8]) -> Option<usize> {
    String::from_utf8_lossy(bytes)
        .lines()
        .position(|line| {
            line.starts_with(CONFLICT_START)
                || line.starts_with(CONFLICT_SEPARATOR)
                || line.starts_with(CONFLICT_END)
        })
        .map(|idx| idx + 1)
}

/// Fail if `bytes` contain merge conflict markers.
///
/// # Errors
///
/// Returns [`BeadsError::ConflictMarkers`] naming `origin` and the first
/// offending line.
pub fn ensure_no_conflict_markers(bytes: &[u8], origin: &str) -> Result<()> {
    match find_conflict_marker(bytes) {
        Some(line) => Err(BeadsError::ConflictMarkers {
            origin: origin.to_string(),
            line,
        }),
        None => Ok(()),
    }
}

/// The full collection of records visible to one replica.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSet {
    records: BTreeMap<String, Issue>,
}

impl RecordSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse serialized records, rejecting textual conflict markers.
    ///
    /// Blank lines are skipped. When an ID appears twice the later line wins.
    ///
    /// # Errors
    ///
    /// Returns an error on conflict markers, invalid UTF-8, or a line that is
    /// not a valid record.
    pub fn parse(bytes: &[u8], origin: &str) -> Result<Self> {
        ensure_no_conflict_markers(bytes, origin)?;
        let text = std::str::from_utf8(bytes).map_err(|e| BeadsError::JsonlParse {
            line: 0,
            reason: format!("{origin} is not valid UTF-8: {e}"),
        })?;

        let mut records = BTreeMap::new();
        for (idx, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let issue: Issue =
                serde_json::from_str(trimmed).map_err(|e| BeadsError::JsonlParse {
                    line: idx + 1,
                    reason: e.to_string(),
                })?;
            if let Some(previous) = records.insert(issue.id.clone(), issue) {
                tracing::warn!(
                    origin,
                    id = %previous.id,
                    line = idx + 1,
                    "Duplicate record ID; keeping the later line"
                );
            }
        }
        Ok(Self { records })
    }

    /// Read a record set file; a missing file is the empty set.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn read_file(path: &Path) -> Result<Self> {
        match fs::read(path) {
            Ok(bytes) => Self::parse(&bytes, &path.display().to_string()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(err) => Err(err).with_context(|| format!("reading {}", path.display())),
        }
    }

    /// Serialize sorted by ID, one record per line, newline-terminated.
    ///
    /// # Errors
    ///
    /// Returns an error if a record fails to serialize.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        for issue in self.records.values() {
            serde_json::to_writer(&mut out, issue)?;
            out.push(b'\n');
        }
        Ok(out)
    }

    /// Insert or replace a record, returning the previous one.
    pub fn insert(&mut self, issue: Issue) -> Option<Issue> {
        self.records.insert(issue.id.clone(), issue)
    }

    pub fn remove(&mut self, id: &str) -> Option<Issue> {
        self.records.remove(id)
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Issue> {
        self.records.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// IDs in sorted order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.records.keys().map(String::as_str)
    }

    /// Records in ID order.
    pub fn iter(&self) -> impl Iterator<Item = &Issue> {
        self.records.values()
    }
}

impl FromIterator<Issue> for RecordSet {
    fn from_iter<I: IntoIterator<Item = Issue>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().map(|i| (i.id.clone(), i)).collect(),
        }
    }
}

impl IntoIterator for RecordSet {
    type Item = Issue;
    type IntoIter = std::collections::btree_map::IntoValues<String, Issue>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use tempfile::TempDir;

    fn issue(id: &str, title: &str) -> Issue {
        Issue::new(id, title, Utc.timestamp_opt(1_700_000_000, 0).unwrap())
    }

    #[test]
    fn serialization_is_sorted_and_line_order_free() {
        let set: RecordSet = [issue("bd-b", "B"), issue("bd-a", "A")].into_iter().collect();
        let bytes = set.to_bytes().unwrap();
        let text = String::from_utf8(bytes.clone()).unwrap();
        let ids: Vec<&str> = text
            .lines()
            .map(|l| if l.contains("bd-a") { "a" } else { "b" })
            .collect();
        assert_eq!(ids, vec!["a", "b"]);

        let reversed: String = text.lines().rev().map(|l| format!("{l}\n")).collect();
        let reparsed = RecordSet::parse(reversed.as_bytes(), "test").unwrap();
        assert_eq!(reparsed, set);
        assert_eq!(reparsed.to_bytes().unwrap(), bytes);
    }

    #[test]
    fn blank_lines_are_ignored() {
        let set: RecordSet = [issue("bd-a", "A")].into_iter().collect();
        let mut bytes = b"\n   \n".to_vec();
        bytes.extend(set.to_bytes().unwrap());
        bytes.extend(b"\n\n");
        assert_eq!(RecordSet::parse(&bytes, "test").unwrap().len(), 1);
    }

    #[test]
    fn conflict_markers_are_rejected() {
        let text = "{\"id\":\"x\"}\n<<<<<<< HEAD\n=======\n>>>>>>> theirs\n";
        assert_eq!(find_conflict_marker(text.as_bytes()), Some(2));
        let err = RecordSet::parse(text.as_bytes(), "issues.jsonl").unwrap_err();
        assert!(matches!(err, BeadsError::ConflictMarkers { line: 2, .. }));
    }

    #[test]
    fn invalid_line_reports_line_number() {
        let text = "\n{not json}\n";
        let err = RecordSet::parse(text.as_bytes(), "test").unwrap_err();
        assert!(matches!(err, BeadsError::JsonlParse { line: 2, .. }));
    }

    #[test]
    fn duplicate_ids_keep_later_line() {
        let first = serde_json::to_string(&issue("bd-a", "first")).unwrap();
        let second = serde_json::to_string(&issue("bd-a", "second")).unwrap();
        let text = format!("{first}\n{second}\n");
        let set = RecordSet::parse(text.as_bytes(), "test").unwrap();
        assert_eq!(set.len(), 1);
        assert_eq!(set.get("bd-a").unwrap().title, "second");
    }

    #[test]
    fn missing_file_is_empty_set() {
        let temp = TempDir::new().expect("temp dir");
        let set = RecordSet::read_file(&temp.path().join("nope.jsonl")).unwrap();
        assert!(set.is_empty());
    }
}
