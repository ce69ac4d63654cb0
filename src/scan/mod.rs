// SPDX-License-Identifier: MIT OR Apache-2.0

//! File enumeration with ignore rules and size/binary gates.
//!
//! The walk is depth-first and the result list is sorted by relative path,
//! so downstream id assignment is deterministic.

mod ignore_match;

pub use ignore_match::IgnoreMatcher;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

use crate::hash;
use crate::profile::{is_binary_sniff, is_known_binary_ext, EffectiveRules};
use crate::textutil;

const SNIFF_BYTES: usize = 4096;

/// A file collected during scanning, with normalized content.
#[derive(Debug, Clone)]
pub struct ScannedFile {
    pub path: String,
    pub content: Vec<u8>,
    pub mtime: i64,
    pub size: i64,
    pub hash64: u64,
}

/// File path and stat metadata without content.
#[derive(Debug, Clone)]
pub struct FileRef {
    pub rel_path: String,
    pub abs_path: PathBuf,
    pub size: i64,
    pub mtime: i64,
}

/// Collects all matching files with newline-normalized content.
pub fn walk(root: &Path, rules: &EffectiveRules) -> Result<Vec<ScannedFile>> {
    let refs = walk_refs(root, rules)?;
    let mut files = Vec::with_capacity(refs.len());
    for r in refs {
        let content = std::fs::read(&r.abs_path)
            .with_context(|| format!("read {}", r.abs_path.display()))?;
        let content = textutil::normalize_newlines_bytes(content);
        let hash64 = hash::sum64(&content);
        files.push(ScannedFile {
            path: r.rel_path,
            content,
            mtime: r.mtime,
            size: r.size,
            hash64,
        });
    }
    Ok(files)
}

/// Enumerates indexable files with stat metadata, sorted by relative path.
pub fn walk_refs(root: &Path, rules: &EffectiveRules) -> Result<Vec<FileRef>> {
    let matcher = IgnoreMatcher::new(&rules.scan_ignore);
    let mut refs = Vec::new();

    let root_owned = root.to_path_buf();
    let dir_matcher = matcher.clone();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(move |entry| {
            let Some(rel) = rel_path(&root_owned, entry.path()) else {
                return true;
            };
            if rel.is_empty() {
                return true;
            }
            if is_hard_excluded(&rel) {
                return false;
            }
            if entry.path_is_symlink() {
                return false;
            }
            // Prune ignored directories wholesale; files are gated below.
            if entry.file_type().is_dir() {
                return !dir_matcher.should_ignore(&rel, true);
            }
            true
        });

    for entry in walker {
        let entry = entry.context("walk repository tree")?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(rel) = rel_path(root, entry.path()) else {
            continue;
        };
        if matcher.should_ignore(&rel, false) {
            continue;
        }
        let lower_rel = rel.to_lowercase();
        if is_known_binary_ext(&lower_rel) {
            continue;
        }
        if !matches_ext(&lower_rel, &rules.include_ext) {
            continue;
        }
        let metadata = entry
            .metadata()
            .with_context(|| format!("stat {}", entry.path().display()))?;
        let size = metadata.len() as i64;
        if size > rules.scan_settings.max_text_file_size_bytes {
            continue;
        }
        if is_binary_sniff(entry.path(), SNIFF_BYTES)? {
            continue;
        }
        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        refs.push(FileRef {
            rel_path: rel,
            abs_path: entry.path().to_path_buf(),
            size,
            mtime,
        });
    }

    refs.sort_by(|a, b| a.rel_path.cmp(&b.rel_path));
    Ok(refs)
}

fn rel_path(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(rel.to_string_lossy().replace('\\', "/"))
}

fn is_hard_excluded(rel: &str) -> bool {
    rel == ".repodex"
        || rel.starts_with(".repodex/")
        || rel == ".git"
        || rel.starts_with(".git/")
}

fn matches_ext(lower_path: &str, exts: &[String]) -> bool {
    if exts.is_empty() {
        return true;
    }
    exts.iter()
        .any(|ext| lower_path.ends_with(&ext.to_lowercase()))
}
