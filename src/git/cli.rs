//! Subprocess-backed git transport.

use super::{CancelToken, GitOutput, GitTransport};
use crate::error::{BeadsError, Result};
use crate::util::progress::DelayedNotice;
use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Default limit for a single git invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Delay before a slow push prints an informational notice.
pub const PUSH_NOTICE_AFTER: Duration = Duration::from_secs(5);

/// Runs the `git` binary with a timeout and a cancellation token.
#[derive(Debug, Clone)]
pub struct GitCli {
    timeout: Duration,
    cancel: CancelToken,
    push_notice_after: Duration,
}

impl Default for GitCli {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT, CancelToken::new())
    }
}

impl GitCli {
    #[must_use]
    pub const fn new(timeout: Duration, cancel: CancelToken) -> Self {
        Self {
            timeout,
            cancel,
            push_notice_after: PUSH_NOTICE_AFTER,
        }
    }

    #[must_use]
    pub const fn with_push_notice_after(mut self, delay: Duration) -> Self {
        self.push_notice_after = delay;
        self
    }

    #[must_use]
    pub const fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        buf
    })
}

fn kill(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

impl GitTransport for GitCli {
    fn run(&self, dir: &Path, args: &[&str]) -> Result<GitOutput> {
        let command = args.join(" ");
        self.cancel.check(&format!("git {command}"))?;

        let started = Instant::now();
        let mut child = Command::new("git")
            .arg("-C")
            .arg(dir)
            .args(args)
            .env("LC_ALL", "C")
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| BeadsError::GitCommand {
                command: command.clone(),
                code: None,
                stderr: format!("failed to start git: {e}"),
            })?;

        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let mut notice = (args.first() == Some(&"push")).then(|| {
            DelayedNotice::new(
                "Push is taking a while (waiting for the remote or for authentication)...",
                self.push_notice_after,
            )
        });

        let status = loop {
            match child.try_wait()? {
                Some(status) => break status,
                None => {
                    if self.cancel.is_cancelled() {
                        kill(&mut child);
                        return Err(BeadsError::Cancelled {
                            operation: format!("git {command}"),
                        });
                    }
                    if started.elapsed() >= self.timeout {
                        kill(&mut child);
                        tracing::warn!(command = %command, "git timed out; process killed");
                        return Err(BeadsError::GitTimeout {
                            command,
                            seconds: self.timeout.as_secs(),
                        });
                    }
                    if let Some(notice) = notice.as_mut() {
                        notice.poll();
                    }
                    thread::sleep(POLL_INTERVAL);
                }
            }
        };
        if let Some(notice) = notice {
            notice.finish();
        }

        // Record set content comes through stdout; never patch it up lossily.
        let stdout = String::from_utf8(stdout.join().unwrap_or_default()).map_err(|e| {
            BeadsError::GitCommand {
                command: command.clone(),
                code: status.code(),
                stderr: format!(
                    "git output is not valid UTF-8 (first bad byte at offset {})",
                    e.utf8_error().valid_up_to()
                ),
            }
        })?;
        let output = GitOutput {
            code: status.code(),
            stdout,
            stderr: String::from_utf8_lossy(&stderr.join().unwrap_or_default()).into_owned(),
        };

        tracing::debug!(
            dir = %dir.display(),
            command = %command,
            code = ?output.code,
            elapsed_ms = started.elapsed().as_millis(),
            "git"
        );
        Ok(output)
    }
}
