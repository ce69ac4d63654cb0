// SPDX-License-Identifier: MIT OR Apache-2.0

use assert_cmd::Command;
use std::fs;
use std::path::Path;
use std::process::Command as ProcessCommand;
use tempfile::TempDir;

use repodex::index::load_file_entries;
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

fn read_index_bytes(root: &Path) -> Vec<(String, Vec<u8>)> {
    ["files.dat", "chunks.dat", "terms.dat", "postings.dat"]
        .iter()
        .map(|name| {
            let data = fs::read(store::dir(root).join(name)).expect("read index file");
            (name.to_string(), data)
        })
        .collect()
}

#[test]
fn sync_assigns_file_ids_in_sorted_order_and_skips_ignored() {
    let dir = TempDir::new().expect("tempdir");
    let root = dir.path();
    init_git_repo(root);
    write_file(&root.join("b.ts"), "import './a'\nconst b=1\nconst c=2\n");
    write_file(
        &root.join("a.ts"),
        "export function a(){return 1}\nexport const x=2\n",
    );
    write_file(
        &root.join("nested/c.ts"),
        "interface Foo { bar: string }\nconst c=3\n",
    );
    write_file(&root.join("bundle.js.map"), "{}");
    run_git(root, &["add", "."]);
    run_git(root, &["commit", "-q", "-m", "init"]);

    repodex(root, &["init"]).assert().success();
    repodex(root, &["sync"]).assert().success();

    let files = load_file_entries(&store::files_path(root)).expect("files.dat");
    let got: Vec<(u32, String)> = files
        .iter()
        .map(|f| (f.file_id, f.path.clone()))
        .collect();
    assert_eq!(
        got,
        vec![
            (1, "a.ts".to_string()),
            (2, "b.ts".to_string()),
            (3, "nested/c.ts".to_string()),
        ]
    );
    assert!(!files.iter().any(|f| f.path.contains("bundle.js.map")));
}

#[test]
fn full_rebuild_reproduces_identical_index_bytes() {
    let dir = TempDir::new().expect("tempdir");
    let root = dir.path();
    init_git_repo(root);
    write_file(&root.join("b.ts"), "import './a'\nconst b=1\nconst c=2\n");
    write_file(
        &root.join("a.ts"),
        "export function a(){return 1}\nexport const x=2\n",
    );
    write_file(
        &root.join("nested/c.ts"),
        "interface Foo { bar: string }\nconst c=3\n",
    );
    run_git(root, &["add", "."]);
    run_git(root, &["commit", "-q", "-m", "init"]);

    repodex(root, &["init"]).assert().success();
    repodex(root, &["sync"]).assert().success();
    let first = read_index_bytes(root);

    // Dropping an artifact forces a full missing-index rebuild.
    fs::remove_file(store::files_path(root)).expect("remove files.dat");
    repodex(root, &["sync"]).assert().success();
    let second = read_index_bytes(root);

    assert_eq!(first, second);
}

#[test]
fn crlf_files_index_cleanly() {
    let dir = TempDir::new().expect("tempdir");
    let root = dir.path();
    init_git_repo(root);
    write_file(&root.join("w.ts"), "const a = 1;\r\nconst b = 2;\r\n");
    run_git(root, &["add", "."]);
    run_git(root, &["commit", "-q", "-m", "init"]);

    repodex(root, &["init"]).assert().success();
    repodex(root, &["sync"]).assert().success();

    let assert = repodex(root, &["status", "--json"]).assert().success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");
    let status: serde_json::Value = serde_json::from_str(&stdout).expect("json");
    assert_eq!(status["dirty"], serde_json::Value::Bool(false));
    assert_eq!(status["file_count"], serde_json::json!(1));
}

#[test]
fn init_refuses_to_overwrite_without_force() {
    let dir = TempDir::new().expect("tempdir");
    let root = dir.path();
    init_git_repo(root);
    write_file(&root.join("a.ts"), "const a = 1;\n");
    run_git(root, &["add", "."]);
    run_git(root, &["commit", "-q", "-m", "init"]);

    repodex(root, &["init"]).assert().success();
    repodex(root, &["init"]).assert().failure();
    repodex(root, &["init", "--force"]).assert().success();
}

#[test]
fn index_sync_alias_matches_sync() {
    let dir = TempDir::new().expect("tempdir");
    let root = dir.path();
    init_git_repo(root);
    write_file(&root.join("a.ts"), "export const marker = 1;\n");
    run_git(root, &["add", "."]);
    run_git(root, &["commit", "-q", "-m", "init"]);

    repodex(root, &["init"]).assert().success();
    repodex(root, &["index", "sync"]).assert().success();
    assert!(store::files_path(root).exists());
    repodex(root, &["index", "status", "--json"]).assert().success();
}
