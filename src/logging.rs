//! Tracing subscriber setup.
//!
//! `RUST_LOG` always wins. Without it, `-q` shows errors only, the default
//! shows warnings, and each `-v` widens the filter one level.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

/// Environment variable selecting JSON-lines log output.
pub const LOG_FORMAT_ENV: &str = "BSYNC_LOG_FORMAT";

fn default_directive(verbose: u8, quiet: bool) -> &'static str {
    if quiet {
        return "error";
    }
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

fn build_filter(verbose: u8, quiet: bool) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose, quiet)))
}

fn json_requested() -> bool {
    std::env::var(LOG_FORMAT_ENV).is_ok_and(|value| value.eq_ignore_ascii_case("json"))
}

/// Install the global subscriber for the binary.
///
/// Logs go to stderr unless `log_file` is given, in which case they are
/// appended to that file without ANSI colors.
///
/// # Errors
///
/// Returns an error if the log file cannot be opened or a global subscriber
/// is already installed.
pub fn init_logging(verbose: u8, quiet: bool, log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter = build_filter(verbose, quiet);
    let json = json_requested();

    if let Some(path) = log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let builder = fmt()
            .with_env_filter(filter)
            .with_ansi(false)
            .with_writer(Mutex::new(file));
        if json {
            builder.json().try_init().map_err(anyhow::Error::msg)?;
        } else {
            builder.try_init().map_err(anyhow::Error::msg)?;
        }
        return Ok(());
    }

    let builder = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if json {
        builder.json().try_init().map_err(anyhow::Error::msg)?;
    } else {
        builder.try_init().map_err(anyhow::Error::msg)?;
    }
    Ok(())
}

/// Install a subscriber that writes through the libtest capture.
///
/// Safe to call from many tests; only the first call installs anything.
pub fn init_test_logging() {
    let _ = fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
        )
        .with_test_writer()
        .try_init();
}
