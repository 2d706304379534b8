//! Structured error output for scripts and agents.
//!
//! Provides machine-parseable error information with:
//! - Error codes for categorization
//! - Hints for self-correction
//! - Retryability flags
//! - Context for debugging

use crate::error::BeadsError;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

/// Machine-readable error codes.
///
/// These codes are stable and can be used for programmatic error handling.
/// Format: `SCREAMING_SNAKE_CASE` for easy parsing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // === Database Errors (exit code 2) ===
    DatabaseError,
    NotInitialized,
    AlreadyInitialized,

    // === Validation Errors (exit code 4) ===
    ValidationFailed,

    // === Sync/JSONL Errors (exit code 6) ===
    JsonlParseError,
    ConflictMarkers,

    // === Config Errors (exit code 7) ===
    ConfigError,
    SyncModeDisabled,

    // === I/O Errors (exit code 8) ===
    IoError,
    JsonError,
    YamlError,

    // === Git/Environment Errors (exit code 9) ===
    NotAGitRepo,
    NoCommits,
    RemoteNotFound,
    BranchCheckedOut,
    GitCommandFailed,
    GitTimeout,
    Cancelled,
    PushRetriesExhausted,

    // === Merge Errors (exit code 10) ===
    MergeConflict,
    PushConflict,

    // === Internal Errors (exit code 1) ===
    InternalError,
}

impl ErrorCode {
    /// Get the string representation for JSON output.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::DatabaseError => "DATABASE_ERROR",
            Self::NotInitialized => "NOT_INITIALIZED",
            Self::AlreadyInitialized => "ALREADY_INITIALIZED",
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::JsonlParseError => "JSONL_PARSE_ERROR",
            Self::ConflictMarkers => "CONFLICT_MARKERS",
            Self::ConfigError => "CONFIG_ERROR",
            Self::SyncModeDisabled => "SYNC_MODE_DISABLED",
            Self::IoError => "IO_ERROR",
            Self::JsonError => "JSON_ERROR",
            Self::YamlError => "YAML_ERROR",
            Self::NotAGitRepo => "NOT_A_GIT_REPO",
            Self::NoCommits => "NO_COMMITS",
            Self::RemoteNotFound => "REMOTE_NOT_FOUND",
            Self::BranchCheckedOut => "BRANCH_CHECKED_OUT",
            Self::GitCommandFailed => "GIT_COMMAND_FAILED",
            Self::GitTimeout => "GIT_TIMEOUT",
            Self::Cancelled => "CANCELLED",
            Self::PushRetriesExhausted => "PUSH_RETRIES_EXHAUSTED",
            Self::MergeConflict => "MERGE_CONFLICT",
            Self::PushConflict => "PUSH_CONFLICT",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Whether this error is potentially retryable without changing anything.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::GitTimeout | Self::Cancelled | Self::PushRetriesExhausted
        )
    }

    /// Get the exit code for this error category.
    ///
    /// - 1: Internal/unknown errors
    /// - 2: Database errors
    /// - 4: Validation errors
    /// - 6: Sync/JSONL errors
    /// - 7: Config errors
    /// - 8: I/O errors
    /// - 9: Git/environment errors
    /// - 10: Merge conflicts
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::DatabaseError
            | Self::NotInitialized
            | Self::AlreadyInitialized => 2,
            Self::ValidationFailed => 4,
            Self::JsonlParseError | Self::ConflictMarkers => 6,
            Self::ConfigError | Self::SyncModeDisabled => 7,
            Self::IoError | Self::JsonError | Self::YamlError => 8,
            Self::NotAGitRepo
            | Self::NoCommits
            | Self::RemoteNotFound
            | Self::BranchCheckedOut
            | Self::GitCommandFailed
            | Self::GitTimeout
            | Self::Cancelled
            | Self::PushRetriesExhausted => 9,
            Self::MergeConflict | Self::PushConflict => 10,
            Self::InternalError => 1,
        }
    }
}

/// Structured error for machine-parseable output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredError {
    /// Machine-readable error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Optional hint for fixing the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    /// Whether the operation can be retried
    pub retryable: bool,
    /// Additional context data
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Value>,
}

impl StructuredError {
    /// Create a new structured error from a `BeadsError`.
    #[must_use]
    pub fn from_error(err: &BeadsError) -> Self {
        let (code, context) = Self::extract_code_and_context(err);
        let hint = err
            .remediation()
            .or_else(|| err.suggestion().map(str::to_string))
            .or_else(|| Self::generate_hint(err));

        Self {
            code,
            message: err.to_string(),
            hint,
            retryable: code.is_retryable() || err.is_transient(),
            context,
        }
    }

    /// Serialize to JSON value.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "error": {
                "code": self.code.as_str(),
                "message": self.message,
                "hint": self.hint,
                "retryable": self.retryable,
                "context": self.context,
            }
        })
    }

    /// Format for human-readable output.
    #[must_use]
    pub fn to_human(&self, color: bool) -> String {
        let mut output = String::new();

        if color {
            output.push_str("\x1b[31mError:\x1b[0m ");
        } else {
            output.push_str("Error: ");
        }

        output.push_str(&self.message);

        if let Some(hint) = &self.hint {
            output.push('\n');
            if color {
                output.push_str("\x1b[33mHint:\x1b[0m ");
            } else {
                output.push_str("Hint: ");
            }
            output.push_str(hint);
        }

        output
    }

    #[allow(clippy::too_many_lines)]
    fn extract_code_and_context(err: &BeadsError) -> (ErrorCode, Option<Value>) {
        match err {
            BeadsError::Database(_) => (ErrorCode::DatabaseError, None),
            BeadsError::NotInitialized => (ErrorCode::NotInitialized, None),
            BeadsError::AlreadyInitialized { path } => (
                ErrorCode::AlreadyInitialized,
                Some(json!({"path": path.display().to_string()})),
            ),
            BeadsError::Validation { field, reason } => (
                ErrorCode::ValidationFailed,
                Some(json!({"field": field, "reason": reason})),
            ),
            BeadsError::JsonlParse { line, reason } => (
                ErrorCode::JsonlParseError,
                Some(json!({"line": line, "reason": reason})),
            ),
            BeadsError::ConflictMarkers { origin, line } => (
                ErrorCode::ConflictMarkers,
                Some(json!({"origin": origin, "line": line})),
            ),
            BeadsError::Config(_) => (ErrorCode::ConfigError, None),
            BeadsError::SyncModeDisabled { mode } => {
                (ErrorCode::SyncModeDisabled, Some(json!({"mode": mode})))
            }
            BeadsError::NotAGitRepo { path } => (
                ErrorCode::NotAGitRepo,
                Some(json!({"path": path.display().to_string()})),
            ),
            BeadsError::NoCommits => (ErrorCode::NoCommits, None),
            BeadsError::RemoteNotFound { remote } => {
                (ErrorCode::RemoteNotFound, Some(json!({"remote": remote})))
            }
            BeadsError::BranchCheckedOut { branch } => (
                ErrorCode::BranchCheckedOut,
                Some(json!({"branch": branch, "commit_in_place": true})),
            ),
            BeadsError::GitCommand {
                command,
                code,
                stderr,
            } => (
                ErrorCode::GitCommandFailed,
                Some(json!({"command": command, "exit_code": code, "stderr": stderr})),
            ),
            BeadsError::GitTimeout { command, seconds } => (
                ErrorCode::GitTimeout,
                Some(json!({"command": command, "timeout_secs": seconds})),
            ),
            BeadsError::Cancelled { operation } => {
                (ErrorCode::Cancelled, Some(json!({"operation": operation})))
            }
            BeadsError::PushRetriesExhausted {
                attempts,
                last_error,
            } => (
                ErrorCode::PushRetriesExhausted,
                Some(json!({"attempts": attempts, "last_error": last_error})),
            ),
            BeadsError::MergeConflict { conflicts } => (
                ErrorCode::MergeConflict,
                Some(json!({"conflicts": conflicts})),
            ),
            BeadsError::PushConflict {
                remote,
                branch,
                worktree,
                conflicts,
            } => (
                ErrorCode::PushConflict,
                Some(json!({
                    "remote": remote,
                    "branch": branch,
                    "worktree": worktree.display().to_string(),
                    "conflicts": conflicts,
                    "options": ["reset-to-remote", "force-push-local", "manual-recovery"],
                })),
            ),
            BeadsError::Io(_) => (ErrorCode::IoError, None),
            BeadsError::Json(_) => (ErrorCode::JsonError, None),
            BeadsError::Yaml(_) => (ErrorCode::YamlError, None),
            BeadsError::WithContext { context, .. } => {
                (ErrorCode::InternalError, Some(json!({"context": context})))
            }
            BeadsError::Other(_) => (ErrorCode::InternalError, None),
        }
    }

    fn generate_hint(err: &BeadsError) -> Option<String> {
        match err {
            BeadsError::JsonlParse { line, .. } => Some(format!(
                "Check line {line} of the JSONL file for syntax errors."
            )),
            BeadsError::GitCommand { .. } if err.is_transient() => {
                Some("This looks like a network or lock problem; retry shortly.".to_string())
            }
            BeadsError::GitTimeout { .. } => Some(
                "Raise sync.git-timeout, or check for a pending credential prompt.".to_string(),
            ),
            _ => None,
        }
    }
}
