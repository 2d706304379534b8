use super::{Workspace, print_json};
use crate::config::CliOverrides;
use crate::error::Result;
use crate::sync::flush_to_jsonl;

/// Execute the flush command.
///
/// # Errors
///
/// Returns an error if the workspace cannot be opened or the export fails.
pub fn execute(force: bool, json: bool, quiet: bool, cli: &CliOverrides) -> Result<()> {
    let mut ws = Workspace::open(cli)?;
    let result = flush_to_jsonl(&mut ws.storage, &ws.paths.jsonl_path, force)?;

    if json {
        print_json(&result)?;
    } else if !quiet {
        if result.changed {
            println!(
                "Exported {} records to {}",
                result.exported,
                result.path.display()
            );
        } else {
            println!("{} is up to date ({} records)", result.path.display(), result.exported);
        }
    }
    Ok(())
}
