use beads_sync::cli::commands;
use beads_sync::cli::{Cli, Commands};
use beads_sync::config;
use beads_sync::logging::init_logging;
use beads_sync::{BeadsError, StructuredError};
use clap::Parser;
use std::io::{self, IsTerminal};

fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.verbose, cli.quiet, cli.log_file.as_deref()) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let overrides = build_cli_overrides(&cli);
    let (json, quiet) = (cli.json, cli.quiet);

    let result = match cli.command {
        Commands::Init { force } => commands::init::execute(force, None, quiet),
        Commands::Flush { force } => commands::flush::execute(force, json, quiet, &overrides),
        Commands::Import { input } => commands::import::execute(input, json, quiet, &overrides),
        Commands::Commit { message, no_push } => {
            commands::sync::execute_commit(message.as_deref(), no_push, json, quiet, &overrides)
        }
        Commands::Pull { no_push } => commands::sync::execute_pull(no_push, json, quiet, &overrides),
        Commands::Push => commands::sync::execute_push(json, quiet, &overrides),
        Commands::Status => commands::status::execute(json, &overrides),
        Commands::Merge(args) => commands::merge::execute(&args, json, quiet, &overrides),
        Commands::Worktree { recreate } => {
            commands::worktree::execute(recreate, json, quiet, &overrides)
        }
    };

    if let Err(e) = result {
        handle_error(&e, json);
    }
}

/// Handle errors with structured output support.
///
/// When --json is set or stdout is not a TTY, outputs structured JSON to stderr.
/// Otherwise, outputs human-readable error with optional color.
fn handle_error(err: &BeadsError, json_mode: bool) -> ! {
    let structured = StructuredError::from_error(err);
    let exit_code = structured.code.exit_code();

    let use_json = json_mode || !io::stdout().is_terminal();

    if use_json {
        let json = structured.to_json();
        eprintln!(
            "{}",
            serde_json::to_string_pretty(&json).unwrap_or_else(|_| json.to_string())
        );
    } else {
        let use_color = io::stderr().is_terminal();
        eprintln!("{}", structured.to_human(use_color));
    }

    std::process::exit(exit_code);
}

fn build_cli_overrides(cli: &Cli) -> config::CliOverrides {
    config::CliOverrides {
        db: cli.db.clone(),
        json: Some(cli.json),
        lock_timeout: cli.lock_timeout,
        branch: cli.branch.clone(),
        remote: cli.remote.clone(),
        strategy: cli.strategy.map(|strategy| strategy.to_string()),
    }
}
