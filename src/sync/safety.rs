//! Mass-deletion safety guard.
//!
//! A merge that makes most of the record set disappear is far more likely to
//! be a broken replica than a real cleanup. The guard never fails an
//! operation; it produces a forensic report and lets the caller decide
//! whether to withhold the push.

use super::jsonl::RecordSet;
use crate::util::truncate_title;
use serde::Serialize;
use std::fmt::Write as _;

/// Below this many records the guard never triggers.
pub const MIN_RECORDS_FOR_CHECK: usize = 5;

/// Fraction of records that must vanish for the guard to trigger.
pub const VANISHED_RATIO_THRESHOLD: f64 = 0.5;

const TITLE_WIDTH: usize = 40;

/// Count-only check.
///
/// Triggers when more than five records existed, the count dropped, and more
/// than half of them vanished.
#[must_use]
pub fn check(before: usize, after: usize) -> (bool, String) {
    if before <= MIN_RECORDS_FOR_CHECK || after >= before {
        return (false, String::new());
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = (before - after) as f64 / before as f64;
    if ratio <= VANISHED_RATIO_THRESHOLD {
        return (false, String::new());
    }
    let details = format!(
        "{} of {before} records vanished ({:.0}%); {after} remain",
        before - after,
        ratio * 100.0
    );
    (true, details)
}

/// A record that was present before and absent after.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VanishedRecord {
    pub id: String,
    pub title: String,
}

/// Result of comparing two record sets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SafetyReport {
    pub triggered: bool,
    pub before_count: usize,
    pub after_count: usize,
    /// Sorted by ID.
    pub vanished: Vec<VanishedRecord>,
}

impl SafetyReport {
    /// Multi-line report listing every vanished record.
    #[must_use]
    pub fn details(&self) -> String {
        let (_, summary) = check(self.before_count, self.after_count);
        let mut out = format!(
            "Mass deletion detected: {summary}\n  before: {}\n  after:  {}\n  vanished:",
            self.before_count, self.after_count
        );
        for record in &self.vanished {
            let _ = write!(out, "\n    {}  {}", record.id, record.title);
        }
        out
    }
}

/// Compare the record set before and after a merge.
///
/// Closing or tombstoning a record is not vanishing; only records missing
/// from `after` entirely count.
#[must_use]
pub fn evaluate(before: &RecordSet, after: &RecordSet) -> SafetyReport {
    let vanished: Vec<VanishedRecord> = before
        .iter()
        .filter(|issue| !after.contains(&issue.id))
        .map(|issue| VanishedRecord {
            id: issue.id.clone(),
            title: truncate_title(&issue.title, TITLE_WIDTH),
        })
        .collect();

    let (triggered, _) = check(before.len(), after.len());
    if triggered {
        tracing::warn!(
            before = before.len(),
            after = after.len(),
            vanished = vanished.len(),
            "Mass deletion safety check triggered"
        );
    }

    SafetyReport {
        triggered,
        before_count: before.len(),
        after_count: after.len(),
        vanished,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Issue, Status};
    use chrono::Utc;

    fn records(n: usize) -> RecordSet {
        (0..n)
            .map(|i| Issue::new(format!("bd-{i:02}"), format!("Issue {i}"), Utc::now()))
            .collect()
    }

    #[test]
    fn ten_to_three_triggers() {
        let (triggered, details) = check(10, 3);
        assert!(triggered);
        assert!(details.contains("7 of 10"));
    }

    #[test]
    fn four_to_one_is_below_floor() {
        assert!(!check(4, 1).0);
    }

    #[test]
    fn exactly_half_does_not_trigger() {
        assert!(!check(10, 5).0);
        assert!(check(10, 4).0);
    }

    #[test]
    fn growth_never_triggers() {
        assert!(!check(10, 12).0);
        assert!(!check(6, 6).0);
    }

    #[test]
    fn report_lists_vanished_sorted_with_truncated_titles() {
        let mut before = records(8);
        let mut long = Issue::new("bd-00", "x".repeat(80), Utc::now());
        long.title.push_str(" tail");
        before.insert(long);

        let after: RecordSet = before.iter().skip(6).cloned().collect();
        let report = evaluate(&before, &after);

        assert!(report.triggered);
        assert_eq!(report.vanished.len(), 6);
        assert_eq!(report.vanished[0].id, "bd-00");
        assert!(report.vanished[0].title.ends_with("..."));
        assert_eq!(report.vanished[0].title.chars().count(), 40);
        assert!(report.details().contains("bd-05"));
    }

    #[test]
    fn closing_or_tombstoning_is_not_vanishing() {
        let before = records(8);
        let after: RecordSet = before
            .iter()
            .cloned()
            .map(|mut issue| {
                issue.status = Status::Tombstone;
                issue
            })
            .collect();
        let report = evaluate(&before, &after);
        assert!(!report.triggered);
        assert!(report.vanished.is_empty());
    }
}
