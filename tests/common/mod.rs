#![allow(dead_code)]

use beads_sync::git::{GitCli, GitContext, GitTransport};
use beads_sync::model::{Issue, Status};
use beads_sync::storage::SqliteStorage;
use beads_sync::sync::{SyncEngine, SyncOptions, SyncPaths};
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Once;
use std::time::Duration;
use tempfile::TempDir;

static INIT: Once = Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        beads_sync::logging::init_test_logging();
    });
}

/// True when a `git` binary can be run. Tests that need one return early
/// without it.
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .is_ok_and(|output| output.status.success())
}

/// Run git in `dir`, panicking with its stderr on failure.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .env("LC_ALL", "C")
        .output()
        .expect("spawn git");
    assert!(
        output.status.success(),
        "git {} failed in {}: {}",
        args.join(" "),
        dir.display(),
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn configure_identity(dir: &Path, name: &str) {
    git(dir, &["config", "user.email", &format!("{name}@example.com")]);
    git(dir, &["config", "user.name", name]);
    git(dir, &["config", "commit.gpgsign", "false"]);
}

/// A bare remote seeded with one commit on `main`, plus scratch space for
/// clones.
pub struct GitFixture {
    pub root: TempDir,
    pub remote: PathBuf,
}

impl GitFixture {
    /// `None` when git is not installed.
    pub fn new() -> Option<Self> {
        init_test_logging();
        if !git_available() {
            eprintln!("git not available; skipping");
            return None;
        }
        let root = TempDir::new().expect("tempdir");
        let remote = root.path().join("remote.git");
        fs::create_dir_all(&remote).expect("create remote dir");
        git(&remote, &["init", "--bare", "--quiet"]);

        let seed = root.path().join("seed");
        git(
            root.path(),
            &["clone", "--quiet", remote.to_str().expect("utf8 path"), "seed"],
        );
        configure_identity(&seed, "seed");
        git(&seed, &["checkout", "--quiet", "-b", "main"]);
        fs::write(seed.join("README.md"), "project\n").expect("write readme");
        git(&seed, &["add", "README.md"]);
        git(&seed, &["commit", "--quiet", "-m", "initial"]);
        git(&seed, &["push", "--quiet", "origin", "main"]);
        git(&remote, &["symbolic-ref", "HEAD", "refs/heads/main"]);

        Some(Self { root, remote })
    }

    /// Clone the remote into `name` with a fresh `.beads` directory.
    pub fn clone_repo(&self, name: &str) -> Checkout {
        git(
            self.root.path(),
            &[
                "clone",
                "--quiet",
                self.remote.to_str().expect("utf8 path"),
                name,
            ],
        );
        let dir = self.root.path().join(name);
        configure_identity(&dir, name);
        let beads_dir = dir.join(".beads");
        fs::create_dir_all(&beads_dir).expect("create .beads");
        Checkout { dir, beads_dir }
    }

    /// Content of `path` on `branch` in the bare remote, if present.
    pub fn remote_file(&self, branch: &str, path: &str) -> Option<String> {
        let output = Command::new("git")
            .arg("--git-dir")
            .arg(&self.remote)
            .args(["show", &format!("refs/heads/{branch}:{path}")])
            .output()
            .expect("spawn git");
        output
            .status
            .success()
            .then(|| String::from_utf8_lossy(&output.stdout).into_owned())
    }

    pub fn remote_commit_count(&self, branch: &str) -> usize {
        let output = Command::new("git")
            .arg("--git-dir")
            .arg(&self.remote)
            .args(["rev-list", "--count", &format!("refs/heads/{branch}")])
            .output()
            .expect("spawn git");
        String::from_utf8_lossy(&output.stdout)
            .trim()
            .parse()
            .unwrap_or(0)
    }
}

/// One collaborator's checkout.
pub struct Checkout {
    pub dir: PathBuf,
    pub beads_dir: PathBuf,
}

impl Checkout {
    pub fn db_path(&self) -> PathBuf {
        self.beads_dir.join("beads.db")
    }

    pub fn jsonl_path(&self) -> PathBuf {
        self.beads_dir.join("issues.jsonl")
    }

    pub fn storage(&self) -> SqliteStorage {
        SqliteStorage::open(&self.db_path()).expect("open storage")
    }

    pub fn engine(&self, options: SyncOptions) -> SyncEngine<GitCli, SqliteStorage> {
        self.engine_with(GitCli::default(), options)
    }

    pub fn engine_with<G: GitTransport>(
        &self,
        git: G,
        options: SyncOptions,
    ) -> SyncEngine<G, SqliteStorage> {
        let ctx = GitContext::discover(&git, &self.dir).expect("discover git context");
        let paths = SyncPaths::new(&self.dir, &self.beads_dir, "issues.jsonl", "metadata.json")
            .expect("sync paths");
        SyncEngine::new(git, self.storage(), ctx, paths, options)
    }
}

/// Options tuned for tests: fast backoff, everything else default.
pub fn fast_options() -> SyncOptions {
    SyncOptions {
        backoff_base: Duration::from_millis(5),
        ..SyncOptions::default()
    }
}

pub fn base_time() -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000, 0).unwrap()
}

pub fn at(minutes: i64) -> DateTime<Utc> {
    base_time() + ChronoDuration::minutes(minutes)
}

pub fn issue(id: &str, title: &str) -> Issue {
    Issue::new(id, title, base_time())
}

/// Tombstone `issue` at `when`, keeping the lifecycle invariants.
pub fn tombstone(mut issue: Issue, when: DateTime<Utc>) -> Issue {
    issue.original_type = Some(issue.issue_type.as_str().to_string());
    issue.status = Status::Tombstone;
    issue.deleted_at = Some(when);
    issue.deleted_by = Some("tester".to_string());
    issue.updated_at = when;
    issue
}
