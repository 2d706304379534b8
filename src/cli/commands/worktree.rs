use super::{Workspace, print_json};
use crate::config::CliOverrides;
use crate::error::Result;
use crate::sync::worktree::EnsureAction;
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
struct WorktreeReport {
    path: PathBuf,
    branch: String,
    action: EnsureAction,
}

/// Execute the worktree command.
///
/// # Errors
///
/// Returns an error if the worktree cannot be created, including when the
/// sync branch is checked out in the primary repository.
pub fn execute(recreate: bool, json: bool, quiet: bool, cli: &CliOverrides) -> Result<()> {
    let engine = Workspace::open(cli)?.into_engine()?;
    let (path, action) = engine.ensure_worktree(recreate)?;
    let report = WorktreeReport {
        path,
        branch: engine.options().branch.clone(),
        action,
    };

    if json {
        print_json(&report)?;
    } else if quiet {
        println!("{}", report.path.display());
    } else {
        let verb = match report.action {
            EnsureAction::AlreadyHealthy => "Healthy",
            EnsureAction::Created => "Created",
            EnsureAction::Recreated => "Recreated",
        };
        println!("{verb} worktree for {}: {}", report.branch, report.path.display());
    }
    Ok(())
}
