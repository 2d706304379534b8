use crate::config::{CONFIG_FILENAME, CONFIG_TEMPLATE, DEFAULT_DB_FILENAME, Metadata};
use crate::error::{BeadsError, Result};
use crate::storage::SqliteStorage;
use std::fs;
use std::path::Path;

const GITIGNORE: &str = r"# Database
*.db
*.db-shm
*.db-wal

# Lock files
*.lock

# Temporary
*.tmp
";

/// Execute the init command.
///
/// # Errors
///
/// Returns an error if the directory or database cannot be created, or if a
/// database already exists and `force` is not set.
pub fn execute(force: bool, root_dir: Option<&Path>, quiet: bool) -> Result<()> {
    let base_dir = root_dir.unwrap_or_else(|| Path::new("."));
    let beads_dir = base_dir.join(".beads");
    let db_path = beads_dir.join(DEFAULT_DB_FILENAME);

    if beads_dir.exists() {
        if db_path.exists() {
            if !force {
                return Err(BeadsError::AlreadyInitialized { path: db_path });
            }
            for suffix in ["", "-wal", "-shm"] {
                let path = beads_dir.join(format!("{DEFAULT_DB_FILENAME}{suffix}"));
                if path.exists() {
                    fs::remove_file(&path)?;
                }
            }
            tracing::info!(path = %db_path.display(), "Removed existing database");
        }
    } else {
        fs::create_dir(&beads_dir)?;
    }

    // Creates the file and applies the schema
    SqliteStorage::open(&db_path)?;

    if !beads_dir.join("metadata.json").exists() || force {
        Metadata::default().save(&beads_dir)?;
    }

    let config_path = beads_dir.join(CONFIG_FILENAME);
    if !config_path.exists() {
        fs::write(config_path, CONFIG_TEMPLATE)?;
    }

    let gitignore_path = beads_dir.join(".gitignore");
    if !gitignore_path.exists() {
        fs::write(gitignore_path, GITIGNORE)?;
    }

    if !quiet {
        println!("Initialized beads workspace in .beads/");
    }
    Ok(())
}
