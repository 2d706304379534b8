//! `commit`, `pull` and `push`: the sync-branch protocol.

use super::{Workspace, print_json};
use crate::config::CliOverrides;
use crate::error::Result;
use crate::sync::{CommitResult, PullResult};
use crate::util::progress::{create_spinner, should_show_progress};

fn spinner_enabled(json: bool, quiet: bool) -> bool {
    !json && !quiet && should_show_progress()
}

/// Execute the commit command.
///
/// # Errors
///
/// Returns an error if git sync is disabled, the merge conflicts, or the
/// push cannot complete.
pub fn execute_commit(
    message: Option<&str>,
    no_push: bool,
    json: bool,
    quiet: bool,
    cli: &CliOverrides,
) -> Result<()> {
    let mut engine = Workspace::open(cli)?.into_engine()?;
    let spinner = create_spinner("Committing to sync branch...", spinner_enabled(json, quiet));
    let result = engine.commit(message, !no_push);
    spinner.finish_and_clear();
    let result = result?;

    if json {
        print_json(&result)?;
    } else {
        print_commit(&result, quiet);
    }
    Ok(())
}

/// Execute the pull command.
///
/// # Errors
///
/// Returns an error if git sync is disabled, the remote is missing, or the
/// merge conflicts.
pub fn execute_pull(no_push: bool, json: bool, quiet: bool, cli: &CliOverrides) -> Result<()> {
    let mut engine = Workspace::open(cli)?.into_engine()?;
    let spinner = create_spinner("Pulling sync branch...", spinner_enabled(json, quiet));
    let result = engine.pull(!no_push);
    spinner.finish_and_clear();
    let result = result?;

    if json {
        print_json(&result)?;
    } else {
        print_pull(&result, quiet);
    }
    Ok(())
}

/// Execute the push command.
///
/// # Errors
///
/// Returns an error if git sync is disabled or the push cannot complete.
pub fn execute_push(json: bool, quiet: bool, cli: &CliOverrides) -> Result<()> {
    let mut engine = Workspace::open(cli)?.into_engine()?;
    let spinner = create_spinner("Pushing sync branch...", spinner_enabled(json, quiet));
    let result = engine.push();
    spinner.finish_and_clear();
    let result = result?;

    if json {
        print_json(&result)?;
    } else {
        print_safety(result.safety_check_details.as_deref(), result.push_withheld);
        if quiet {
            return Ok(());
        }
        if result.pushed {
            println!("Pushed {}", result.branch);
        } else if !result.push_withheld {
            println!("Nothing to push on {}", result.branch);
        }
    }
    Ok(())
}

// Printed even in quiet mode
fn print_safety(details: Option<&str>, withheld: bool) {
    if let Some(details) = details {
        eprintln!("{details}");
    }
    if withheld {
        eprintln!("Warning: push withheld: review the deletions, then run `bsync push` to confirm");
    }
}

fn print_commit(result: &CommitResult, quiet: bool) {
    print_safety(result.safety_check_details.as_deref(), result.push_withheld);
    if quiet {
        return;
    }
    match &result.message {
        Some(message) if result.committed => {
            println!("Committed to {}:", result.branch);
            for line in message.lines() {
                println!("  {line}");
            }
        }
        _ => println!("No changes to commit on {}", result.branch),
    }
    if result.merged_remote {
        println!("Merged remote changes into the database");
    }
    if let Some(report) = result.push.filter(|_| result.pushed) {
        println!(
            "Pushed after {} attempt(s) ({} merge(s), {} transient retry(ies))",
            report.attempts, report.merges, report.transient_retries
        );
    }
}

fn print_pull(result: &PullResult, quiet: bool) {
    // Safety warnings are printed even in quiet mode
    for warning in &result.safety_warnings {
        eprintln!("Warning: {warning}");
    }
    if let Some(details) = &result.safety_check_details {
        eprintln!("{details}");
    }
    if quiet {
        return;
    }

    if result.committed_local {
        println!("Committed local changes");
    }
    if result.fast_forwarded {
        println!("Fast-forwarded to remote");
    } else if result.merged {
        println!("Merged remote changes");
    } else {
        println!("Already up to date");
    }
    println!("Database now holds {} records", result.imported);
    if result.pushed {
        println!("Pushed");
    }
}
