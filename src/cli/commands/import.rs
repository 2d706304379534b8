use super::{Workspace, print_json};
use crate::config::{CliOverrides, SyncMode};
use crate::error::Result;
use crate::sync::{flush_to_jsonl, import_from_jsonl};
use std::path::PathBuf;

/// Execute the import command.
///
/// In realtime mode the configured file is rewritten afterwards so it
/// reflects any normalization applied on the way in.
///
/// # Errors
///
/// Returns an error if the file has conflict markers, does not parse, or the
/// database write fails.
pub fn execute(input: Option<PathBuf>, json: bool, quiet: bool, cli: &CliOverrides) -> Result<()> {
    let mut ws = Workspace::open(cli)?;
    let path = input.unwrap_or_else(|| ws.paths.jsonl_path.clone());
    let result = import_from_jsonl(&mut ws.storage, &path)?;

    if ws.sync.mode == SyncMode::Realtime {
        flush_to_jsonl(&mut ws.storage, &ws.paths.jsonl_path, false)?;
    }

    if json {
        print_json(&result)?;
    } else if !quiet {
        println!("Imported {} records from {}", result.imported, path.display());
        if result.normalized > 0 {
            println!("  {} records had inconsistent lifecycle fields and were normalized", result.normalized);
        }
    }
    Ok(())
}
