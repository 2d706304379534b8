//! `beads_sync`: replicate a beads issue database through a git branch.
//!
//! The tracker keeps issues in `SQLite` and exports them as JSONL. This crate
//! carries that JSONL between collaborators on a dedicated sync branch,
//! merging diverged copies record by record instead of line by line.

pub mod cli;
pub mod config;
pub mod error;
pub mod git;
pub mod logging;
pub mod model;
pub mod storage;
pub mod sync;
pub mod util;

pub use error::{BeadsError, ErrorCode, Result, StructuredError};
