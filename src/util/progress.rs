//! Terminal feedback for slow external operations.

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::io::{IsTerminal, stderr};
use std::time::{Duration, Instant};

/// Check if we should show progress indicators.
///
/// Progress is shown only if stderr is an interactive terminal.
#[must_use]
pub fn should_show_progress() -> bool {
    stderr().is_terminal()
}

/// Create a spinner for indeterminate operations.
///
/// When `show` is false the spinner is hidden and every call on it is a
/// no-op, so callers need not branch.
#[must_use]
pub fn create_spinner(message: &str, show: bool) -> ProgressBar {
    let pb = ProgressBar::new_spinner();

    if show {
        if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
            pb.set_style(style);
        }
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
    } else {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }

    pb
}

/// Informational message that appears only once an operation runs long.
///
/// Meant to be polled from a wait loop. It never aborts anything.
pub struct DelayedNotice {
    message: String,
    delay: Duration,
    started: Instant,
    spinner: Option<ProgressBar>,
}

impl DelayedNotice {
    #[must_use]
    pub fn new(message: impl Into<String>, delay: Duration) -> Self {
        Self {
            message: message.into(),
            delay,
            started: Instant::now(),
            spinner: None,
        }
    }

    /// Show the notice if the delay has passed. Returns true once shown.
    pub fn poll(&mut self) -> bool {
        if self.spinner.is_some() {
            return true;
        }
        if self.started.elapsed() < self.delay {
            return false;
        }
        tracing::info!(
            elapsed_ms = self.started.elapsed().as_millis(),
            "{}",
            self.message
        );
        self.spinner = Some(create_spinner(&self.message, should_show_progress()));
        true
    }

    /// Clear the spinner, if one was shown.
    pub fn finish(self) {
        if let Some(spinner) = self.spinner {
            spinner.finish_and_clear();
        }
    }
}
