// SPDX-License-Identifier: MIT OR Apache-2.0

use assert_cmd::Command;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::Command as ProcessCommand;
use tempfile::TempDir;

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

fn setup_repo(root: &Path) {
    run_git(root, &["init", "-q"]);
    run_git(root, &["config", "user.email", "test@example.com"]);
    run_git(root, &["config", "user.name", "test"]);
    write_file(&root.join("a.ts"), "export const findableThing = 1;\n");
    run_git(root, &["add", "."]);
    run_git(root, &["commit", "-q", "-m", "init"]);

    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("repodex"));
    cmd.current_dir(root).arg("init").assert().success();
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("repodex"));
    cmd.current_dir(root).arg("sync").assert().success();
}

fn serve_lines(root: &Path, input: String) -> Vec<Value> {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("repodex"));
    let assert = cmd
        .current_dir(root)
        .args(["serve", "--stdio"])
        .write_stdin(input)
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8");
    stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("response json"))
        .collect()
}

#[test]
fn serve_answers_status_search_and_fetch() {
    let dir = TempDir::new().expect("tempdir");
    setup_repo(dir.path());

    let input = concat!(
        "{\"op\":\"status\"}\n",
        "{\"op\":\"search\",\"q\":\"findableThing\"}\n",
        "{\"op\":\"fetch\",\"ids\":[1]}\n",
    )
    .to_string();
    let responses = serve_lines(dir.path(), input);
    assert_eq!(responses.len(), 3);

    assert_eq!(responses[0]["ok"], Value::Bool(true));
    assert_eq!(responses[0]["op"], "status");
    assert_eq!(responses[0]["data"]["indexed"], Value::Bool(true));

    assert_eq!(responses[1]["ok"], Value::Bool(true));
    let hits = responses[1]["data"].as_array().expect("search data");
    assert_eq!(hits[0]["path"], "a.ts");

    assert_eq!(responses[2]["ok"], Value::Bool(true));
    let chunks = responses[2]["data"].as_array().expect("fetch data");
    assert_eq!(chunks[0]["chunk_id"], serde_json::json!(1));
}

#[test]
fn serve_rejects_invalid_requests_without_terminating() {
    let dir = TempDir::new().expect("tempdir");
    setup_repo(dir.path());

    let mut input = String::new();
    input.push_str("{\"op\":\"bogus\"}\n");
    input.push_str("{\"op\":\"search\"}\n");
    input.push_str("{\"op\":\"fetch\",\"ids\":[]}\n");
    // Oversized line, then a valid request afterwards.
    input.push_str(&"x".repeat((1 << 20) + 16));
    input.push('\n');
    input.push_str("{\"op\":\"status\"}\n");

    let responses = serve_lines(dir.path(), input);
    assert_eq!(responses.len(), 5);
    assert_eq!(responses[0]["error"], "unknown op");
    assert_eq!(responses[0]["op"], "");
    assert_eq!(responses[1]["error"], "invalid search request: q is required");
    assert_eq!(responses[2]["error"], "invalid fetch request: ids are required");
    assert_eq!(responses[3]["error"], "request too large");
    assert_eq!(responses[4]["ok"], Value::Bool(true));
    assert_eq!(responses[4]["op"], "status");
}
