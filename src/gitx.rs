// SPDX-License-Identifier: MIT OR Apache-2.0

//! Git subprocess probes. Every helper tolerates a missing git binary by
//! degrading to "no repository" answers; other failures surface so status
//! collection can classify them as unknown.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::errors::RepodexError;

fn run_git(root: &Path, args: &[&str]) -> Result<std::process::Output> {
    Command::new("git")
        .arg("-C")
        .arg(root)
        .args(args)
        .output()
        .with_context(|| format!("git {} failed to spawn", args.join(" ")))
}

fn git_unavailable(err: &anyhow::Error) -> bool {
    err.downcast_ref::<std::io::Error>()
        .map(|io| io.kind() == std::io::ErrorKind::NotFound)
        .unwrap_or(false)
}

fn stdout_string(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Returns the absolute path of the git repository root for the starting
/// directory, or a [`RepodexError::VcsMissing`] error.
pub fn top_level(start: &Path) -> Result<PathBuf> {
    let output = match run_git(start, &["rev-parse", "--show-toplevel"]) {
        Ok(output) => output,
        Err(_) => return Err(RepodexError::VcsMissing.into()),
    };
    if !output.status.success() {
        return Err(RepodexError::VcsMissing.into());
    }
    let path = stdout_string(&output);
    if path.is_empty() {
        bail!("git rev-parse --show-toplevel returned empty path");
    }
    Ok(PathBuf::from(path))
}

/// Reports whether the provided root is inside a git work tree. A missing
/// git binary or a non-repo both answer `false`.
pub fn is_repo(root: &Path) -> Result<bool> {
    let output = match run_git(root, &["rev-parse", "--is-inside-work-tree"]) {
        Ok(output) => output,
        Err(err) if git_unavailable(&err) => return Ok(false),
        Err(err) => return Err(err),
    };
    if !output.status.success() {
        return Ok(false);
    }
    Ok(stdout_string(&output) == "true")
}

/// Returns the SHA of HEAD, or empty when git is unavailable.
pub fn head(root: &Path) -> Result<String> {
    let output = match run_git(root, &["rev-parse", "HEAD"]) {
        Ok(output) => output,
        Err(err) if git_unavailable(&err) => return Ok(String::new()),
        Err(err) => return Err(err),
    };
    if !output.status.success() {
        bail!(
            "git rev-parse HEAD failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(stdout_string(&output))
}

/// Reports whether there are no staged, unstaged, or untracked changes.
pub fn worktree_clean(root: &Path) -> Result<bool> {
    let output = match run_git(root, &["status", "--porcelain"]) {
        Ok(output) => output,
        Err(err) if git_unavailable(&err) => return Ok(false),
        Err(err) => return Err(err),
    };
    if !output.status.success() {
        bail!(
            "git status --porcelain failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(output.stdout.iter().all(|b| b.is_ascii_whitespace()))
}

/// Returns the paths reported by `git status --porcelain`, with rename
/// lines resolved to their destination.
pub fn porcelain_paths(root: &Path) -> Result<Vec<String>> {
    let output = match run_git(root, &["status", "--porcelain"]) {
        Ok(output) => output,
        Err(err) if git_unavailable(&err) => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };
    if !output.status.success() {
        bail!(
            "git status --porcelain failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    let text = String::from_utf8_lossy(&output.stdout).to_string();
    let mut paths = Vec::new();
    for line in text.lines() {
        let line = line.trim_end_matches('\r');
        if line.len() < 4 {
            continue;
        }
        // Porcelain v1: `XY <path>` or `XY <from> -> <to>`.
        let mut rest = line[2..].trim();
        if let Some(idx) = rest.rfind("->") {
            rest = rest[idx + 2..].trim();
        }
        if !rest.is_empty() {
            paths.push(rest.to_string());
        }
    }
    Ok(paths)
}

/// Returns the set of paths changed between two refs.
pub fn diff_name_only(root: &Path, a: &str, b: &str) -> Result<Vec<String>> {
    let output = match run_git(root, &["diff", "--name-only", a, b]) {
        Ok(output) => output,
        Err(err) if git_unavailable(&err) => return Ok(Vec::new()),
        Err(err) => return Err(err),
    };
    if !output.status.success() {
        bail!(
            "git diff --name-only failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    let text = String::from_utf8_lossy(&output.stdout).to_string();
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}
