use super::{Workspace, print_json};
use crate::config::CliOverrides;
use crate::error::Result;
use crate::storage::RecordStore;
use crate::sync::divergence::{DivergenceCheck, Relationship};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
struct StatusReport {
    #[serde(flatten)]
    check: DivergenceCheck,
    dirty: usize,
    worktree: PathBuf,
    worktree_exists: bool,
}

/// Execute the status command.
///
/// # Errors
///
/// Returns an error if git sync is disabled or git cannot count commits.
/// An unreachable remote is reported, not raised.
pub fn execute(json: bool, cli: &CliOverrides) -> Result<()> {
    let engine = Workspace::open(cli)?.into_engine()?;
    let check = engine.check_divergence()?;
    let worktree = engine.worktree_path();
    let report = StatusReport {
        check,
        dirty: engine.store().dirty_ids()?.len(),
        worktree_exists: worktree.exists(),
        worktree,
    };

    if json {
        return print_json(&report);
    }

    let check = &report.check;
    println!("Sync branch: {} ({}/{})", check.branch, check.remote, check.branch);
    if !check.divergence.remote_exists {
        println!("  remote branch not pushed yet");
    }
    println!("  local ahead:  {}", check.divergence.local_ahead);
    println!("  remote ahead: {}", check.divergence.remote_ahead);
    let relation = match check.relationship {
        Relationship::UpToDate if check.divergence.local_ahead > 0 => "ahead (push pending)",
        Relationship::UpToDate => "up to date",
        Relationship::FastForward => "behind (fast-forward on pull)",
        Relationship::Diverged => "diverged (merge on pull)",
    };
    println!("  state:        {relation}");
    println!("  unsynced records: {}", report.dirty);
    println!(
        "  worktree:     {}{}",
        report.worktree.display(),
        if report.worktree_exists { "" } else { " (not created)" }
    );
    if check.offline {
        println!("  remote unreachable; counts use the last fetched state");
    }
    if let Some(guidance) = &check.guidance {
        println!();
        println!("{guidance}");
    }
    Ok(())
}
