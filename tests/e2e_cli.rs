//! End-to-end tests for the `bsync` binary.

mod common;

use assert_cmd::Command;
use beads_sync::model::{Issue, Priority};
use common::{GitFixture, at, git, init_test_logging, issue};
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn bsync(cwd: &Path, home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("bsync"));
    cmd.current_dir(cwd);
    cmd.env("NO_COLOR", "1");
    cmd.env("HOME", home);
    cmd.env("RUST_LOG", "beads_sync=debug");
    cmd.env_remove("BEADS_DIR");
    cmd.env_remove("BSYNC_BRANCH");
    cmd
}

fn jsonl(issues: &[Issue]) -> String {
    issues
        .iter()
        .map(|issue| serde_json::to_string(issue).expect("serialize issue") + "\n")
        .collect()
}

struct MergeInputs {
    dir: TempDir,
}

impl MergeInputs {
    fn new(base: &[Issue], ours: &[Issue], theirs: &[Issue]) -> Self {
        let dir = TempDir::new().expect("tempdir");
        fs::write(dir.path().join("base.jsonl"), jsonl(base)).expect("write base");
        fs::write(dir.path().join("ours.jsonl"), jsonl(ours)).expect("write ours");
        fs::write(dir.path().join("theirs.jsonl"), jsonl(theirs)).expect("write theirs");
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn ours(&self) -> String {
        fs::read_to_string(self.path().join("ours.jsonl")).expect("read ours")
    }
}

#[test]
fn help_lists_sync_commands() {
    let home = TempDir::new().unwrap();
    bsync(home.path(), home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("commit"))
        .stdout(predicate::str::contains("pull"))
        .stdout(predicate::str::contains("merge"));
}

#[test]
fn merge_driver_combines_disjoint_edits() {
    init_test_logging();
    let home = TempDir::new().unwrap();
    let mut renamed = issue("bd-1", "Renamed ours");
    renamed.updated_at = at(5);
    let mut urgent = issue("bd-1", "Original");
    urgent.priority = Priority::CRITICAL;
    urgent.updated_at = at(7);
    let inputs = MergeInputs::new(
        &[issue("bd-1", "Original")],
        &[renamed, issue("bd-2", "Ours only")],
        &[urgent, issue("bd-3", "Theirs only")],
    );

    bsync(inputs.path(), home.path())
        .args(["merge", "base.jsonl", "ours.jsonl", "theirs.jsonl"])
        .assert()
        .success();

    let merged = inputs.ours();
    let lines: Vec<&str> = merged.lines().collect();
    assert_eq!(lines.len(), 3);
    let first: Issue = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first.title, "Renamed ours");
    assert_eq!(first.priority, Priority::CRITICAL);
    assert_eq!(first.updated_at, at(7));
    assert!(lines[1].contains("\"bd-2\""));
    assert!(lines[2].contains("\"bd-3\""));
}

#[test]
fn merge_driver_conflict_leaves_ours_untouched() {
    init_test_logging();
    let home = TempDir::new().unwrap();
    let mut ours = issue("bd-1", "Ours");
    ours.updated_at = at(5);
    let mut theirs = issue("bd-1", "Theirs");
    theirs.updated_at = at(9);
    let inputs = MergeInputs::new(&[issue("bd-1", "Original")], &[ours], &[theirs]);
    let before = inputs.ours();

    bsync(inputs.path(), home.path())
        .args(["--json", "merge", "base.jsonl", "ours.jsonl", "theirs.jsonl"])
        .assert()
        .code(10)
        .stderr(predicate::str::contains("MERGE_CONFLICT"))
        .stderr(predicate::str::contains("title"));
    assert_eq!(inputs.ours(), before);

    bsync(inputs.path(), home.path())
        .args([
            "--strategy",
            "newest",
            "merge",
            "base.jsonl",
            "ours.jsonl",
            "theirs.jsonl",
            "-o",
            "out.jsonl",
        ])
        .assert()
        .success();
    let out = fs::read_to_string(inputs.path().join("out.jsonl")).unwrap();
    assert!(out.contains("\"Theirs\""));
    assert_eq!(inputs.ours(), before);
}

#[test]
fn merge_driver_rejects_conflict_markers() {
    let home = TempDir::new().unwrap();
    let inputs = MergeInputs::new(&[], &[issue("bd-1", "Ours")], &[]);
    fs::write(
        inputs.path().join("theirs.jsonl"),
        "<<<<<<< HEAD\n=======\n>>>>>>> other\n",
    )
    .unwrap();

    bsync(inputs.path(), home.path())
        .args(["merge", "base.jsonl", "ours.jsonl", "theirs.jsonl"])
        .assert()
        .code(6);
}

#[test]
fn init_import_commit_and_status() {
    let Some(fixture) = GitFixture::new() else {
        return;
    };
    let home = TempDir::new().unwrap();
    let checkout = fixture.clone_repo("cli");
    fs::remove_dir_all(&checkout.beads_dir).unwrap();

    bsync(&checkout.dir, home.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized"));
    bsync(&checkout.dir, home.path())
        .arg("init")
        .assert()
        .code(2);

    let seed = checkout.dir.join("seed.jsonl");
    fs::write(&seed, jsonl(&[issue("bd-1", "One"), issue("bd-2", "Two")])).unwrap();
    bsync(&checkout.dir, home.path())
        .args(["import", "seed.jsonl"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Imported 2 records"));

    bsync(&checkout.dir, home.path())
        .args(["--json", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"remote_exists\": false"))
        .stdout(predicate::str::contains("\"worktree_exists\": false"));

    bsync(&checkout.dir, home.path())
        .args(["commit", "-m", "bd sync: seed records"])
        .assert()
        .success();
    let remote = fixture.remote_file("beads-sync", ".beads/issues.jsonl").unwrap();
    assert!(remote.contains("bd-1"));
    assert!(remote.contains("bd-2"));
    assert!(fixture.remote_file("beads-sync", ".beads/metadata.json").is_some());
    assert!(fixture.remote_file("beads-sync", "README.md").is_some());

    let subject = git(
        &fixture.remote,
        &["log", "-1", "--format=%s", "refs/heads/beads-sync"],
    );
    assert_eq!(subject, "bd sync: seed records");

    bsync(&checkout.dir, home.path())
        .args(["--json", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"local_ahead\": 0"))
        .stdout(predicate::str::contains("\"remote_ahead\": 0"))
        .stdout(predicate::str::contains("\"dirty\": 0"));
}

#[test]
fn native_remote_mode_refuses_git_sync() {
    let Some(fixture) = GitFixture::new() else {
        return;
    };
    let home = TempDir::new().unwrap();
    let checkout = fixture.clone_repo("native");
    fs::remove_dir_all(&checkout.beads_dir).unwrap();
    bsync(&checkout.dir, home.path()).arg("init").assert().success();
    fs::write(
        checkout.beads_dir.join("config.yaml"),
        "sync:\n  mode: native-remote\n",
    )
    .unwrap();

    bsync(&checkout.dir, home.path())
        .args(["--json", "commit"])
        .assert()
        .code(7)
        .stderr(predicate::str::contains("SYNC_MODE_DISABLED"));
    bsync(&checkout.dir, home.path())
        .arg("pull")
        .assert()
        .code(7);
    assert!(fixture.remote_file("beads-sync", ".beads/issues.jsonl").is_none());
}

#[test]
fn commands_outside_a_workspace_fail_cleanly() {
    let home = TempDir::new().unwrap();
    let dir = TempDir::new().unwrap();
    bsync(dir.path(), home.path())
        .arg("status")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("NOT_INITIALIZED"));
}
