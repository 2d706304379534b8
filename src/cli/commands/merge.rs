//! Git merge driver for record set files.

use super::print_json;
use crate::cli::MergeArgs;
use crate::config::{self, CliOverrides, SyncConfig};
use crate::error::{BeadsError, Result};
use crate::sync::{ConflictStrategy, merge_files};
use crate::util::{bytes_hash, write_atomic};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Debug, Serialize)]
struct MergeReport {
    output: PathBuf,
    strategy: ConflictStrategy,
    content_hash: String,
}

/// Strategy from the CLI, else from config when run inside a workspace.
fn resolve_strategy(cli: &CliOverrides) -> Result<ConflictStrategy> {
    let beads_dir = match config::discover_beads_dir(None) {
        Ok(dir) => dir,
        Err(BeadsError::NotInitialized) => {
            return cli
                .strategy
                .as_deref()
                .map_or_else(|| Ok(ConflictStrategy::default()), str::parse);
        }
        Err(err) => return Err(err),
    };
    let layer = config::load_config(&beads_dir, None, cli)?;
    Ok(SyncConfig::from_layer(&layer)?.conflict_strategy)
}

/// Execute the merge command.
///
/// On conflict nothing is written and the error lists every conflicting
/// field, so git leaves the file marked as conflicted.
///
/// # Errors
///
/// Returns [`BeadsError::MergeConflict`] on unresolvable conflicts, or an
/// error if an input cannot be read or parsed.
pub fn execute(args: &MergeArgs, json: bool, quiet: bool, cli: &CliOverrides) -> Result<()> {
    let strategy = resolve_strategy(cli)?;
    tracing::debug!(
        base = %args.base.display(),
        ours = %args.ours.display(),
        theirs = %args.theirs.display(),
        %strategy,
        "Running record set merge"
    );
    let merged = merge_files(&args.base, &args.ours, &args.theirs, strategy)?;

    let output = args.output.clone().unwrap_or_else(|| args.ours.clone());
    write_atomic(&output, &merged)?;

    let report = MergeReport {
        output,
        strategy,
        content_hash: bytes_hash(&merged),
    };
    if json {
        print_json(&report)?;
    } else if !quiet {
        eprintln!("Merged records into {}", report.output.display());
    }
    Ok(())
}
