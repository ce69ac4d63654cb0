// SPDX-License-Identifier: MIT OR Apache-2.0

use assert_cmd::Command;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::Command as ProcessCommand;
use tempfile::TempDir;

use repodex::store;

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("create parent");
    }
    fs::write(path, content).expect("write file");
}

fn run_git(dir: &Path, args: &[&str]) {
    let output = ProcessCommand::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .output()
        .expect("run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}

fn init_git_repo(dir: &Path) {
    run_git(dir, &["init", "-q"]);
    run_git(dir, &["config", "user.email", "test@example.com"]);
    run_git(dir, &["config", "user.name", "test"]);
}

fn repodex(dir: &Path, args: &[&str]) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("repodex"));
    cmd.current_dir(dir).args(args);
    cmd
}

fn status_json(dir: &Path) -> Value {
    let assert = repodex(dir, &["status", "--json"]).assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");
    serde_json::from_str(&stdout).expect("json")
}

fn setup_synced_repo(root: &Path) {
    init_git_repo(root);
    write_file(&root.join("src/main.ts"), "export const marker = 1;\n");
    run_git(root, &["add", "."]);
    run_git(root, &["commit", "-q", "-m", "init"]);
    repodex(root, &["init"]).assert().success();
    repodex(root, &["sync"]).assert().success();
}

#[test]
fn missing_index_reports_full_plan() {
    let dir = TempDir::new().expect("tempdir");
    let root = dir.path();
    init_git_repo(root);
    write_file(&root.join("a.ts"), "const a = 1;\n");
    run_git(root, &["add", "."]);
    run_git(root, &["commit", "-q", "-m", "init"]);
    repodex(root, &["init"]).assert().success();

    let status = status_json(root);
    assert_eq!(status["indexed"], Value::Bool(false));
    assert_eq!(status["sync_plan"]["mode"], "full");
    assert_eq!(status["sync_plan"]["why"], "missing_index");
}

#[test]
fn repodex_only_dirt_is_a_noop_and_sync_leaves_meta_untouched() {
    let dir = TempDir::new().expect("tempdir");
    let root = dir.path();
    setup_synced_repo(root);

    // Only .repodex is dirty (untracked artifacts).
    let status = status_json(root);
    assert_eq!(status["dirty"], Value::Bool(false));
    assert_eq!(status["git_dirty_repodex_only"], Value::Bool(true));
    assert_eq!(status["sync_plan"]["mode"], "noop");
    assert_eq!(status["sync_plan"]["why"], "git_changed_non_indexable");

    let meta_path = store::meta_path(root);
    let before_bytes = fs::read(&meta_path).expect("meta bytes");
    let before_mtime = fs::metadata(&meta_path)
        .expect("meta stat")
        .modified()
        .expect("mtime");

    repodex(root, &["sync"]).assert().success();

    let after_bytes = fs::read(&meta_path).expect("meta bytes");
    let after_mtime = fs::metadata(&meta_path)
        .expect("meta stat")
        .modified()
        .expect("mtime");
    assert_eq!(before_bytes, after_bytes);
    assert_eq!(before_mtime, after_mtime);
}

#[test]
fn indexable_worktree_change_forces_full_sync() {
    let dir = TempDir::new().expect("tempdir");
    let root = dir.path();
    setup_synced_repo(root);

    write_file(&root.join("src/extra.ts"), "export const extra = 2;\n");

    let status = status_json(root);
    assert_eq!(status["dirty"], Value::Bool(true));
    assert_eq!(status["sync_plan"]["mode"], "full");
    assert_eq!(status["sync_plan"]["why"], "git_worktree_changed");
    let changed = status["sync_plan"]["changed_paths"]
        .as_array()
        .expect("changed paths");
    assert!(changed.iter().any(|p| p == "src/extra.ts"));

    repodex(root, &["sync"]).assert().success();
    let status = status_json(root);
    assert_eq!(status["file_count"], serde_json::json!(2));
}

#[test]
fn head_change_after_commit_forces_full_sync() {
    let dir = TempDir::new().expect("tempdir");
    let root = dir.path();
    setup_synced_repo(root);

    write_file(&root.join("src/extra.ts"), "export const extra = 2;\n");
    run_git(root, &["add", "src/extra.ts"]);
    run_git(root, &["commit", "-q", "-m", "extra"]);

    // The untracked .repodex artifacts keep the worktree dirty, so the
    // head change is reported together with the worktree state.
    let status = status_json(root);
    assert_eq!(status["sync_plan"]["mode"], "full");
    assert_eq!(status["sync_plan"]["why"], "git_head_and_worktree_changed");

    repodex(root, &["sync"]).assert().success();
    let status = status_json(root);
    assert_eq!(status["sync_plan"]["why"], "git_changed_non_indexable");
    assert_eq!(status["file_count"], serde_json::json!(2));
}

#[test]
fn status_text_mentions_sync_plan() {
    let dir = TempDir::new().expect("tempdir");
    let root = dir.path();
    setup_synced_repo(root);

    let assert = repodex(root, &["status"]).assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");
    assert!(stdout.contains("Indexed: true"));
    assert!(stdout.contains("Sync plan: mode=noop, why=git_changed_non_indexable"));
    assert!(stdout.contains(".repodex"));
}

#[test]
fn commands_outside_a_git_repo_fail() {
    let dir = TempDir::new().expect("tempdir");
    repodex(dir.path(), &["status"]).assert().failure();
    repodex(dir.path(), &["sync"]).assert().failure();
}
