// SPDX-License-Identifier: MIT OR Apache-2.0

//! Line extraction for indexed chunks.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Component, Path};

use crate::errors::RepodexError;
use crate::index::{self, ChunkEntry};
use crate::store;
use crate::textutil;

const MAX_IDS: usize = 5;
const MAX_LINES: usize = 120;

/// Extracted lines for one chunk. Lines render as `"<n>| <content>"`.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkText {
    pub chunk_id: u32,
    pub path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub returned_from: u32,
    pub returned_to: u32,
    pub lines: Vec<String>,
}

/// Fetches chunk text constrained by limits, loading the chunk map from
/// the serialized index.
pub fn fetch(root: &Path, ids: &[u32], max_lines: usize) -> Result<Vec<ChunkText>> {
    let chunks = index::load_chunk_entries(&store::chunks_path(root))?;
    let chunk_map: HashMap<u32, ChunkEntry> =
        chunks.into_iter().map(|ch| (ch.chunk_id, ch)).collect();
    fetch_with_chunk_map(root, &chunk_map, ids, max_lines)
}

/// Fetches chunk text using a preloaded chunk map.
pub fn fetch_with_chunk_map(
    root: &Path,
    chunk_map: &HashMap<u32, ChunkEntry>,
    ids: &[u32],
    max_lines: usize,
) -> Result<Vec<ChunkText>> {
    let ids = if ids.len() > MAX_IDS {
        &ids[..MAX_IDS]
    } else {
        ids
    };
    let max_lines = if max_lines == 0 || max_lines > MAX_LINES {
        MAX_LINES
    } else {
        max_lines
    };

    let mut results = Vec::with_capacity(ids.len());
    for &id in ids {
        let ch = chunk_map
            .get(&id)
            .ok_or(RepodexError::FetchIdUnknown(id))?;
        reject_traversal(root, &ch.path)?;
        let data = std::fs::read(root.join(&ch.path))
            .with_context(|| format!("chunk {} path {}", id, ch.path))?;
        let normalized = textutil::normalize_newlines_bytes(data);
        let text = String::from_utf8_lossy(&normalized);
        let lines: Vec<&str> = text.split('\n').collect();

        let mut start = ch.start_line.max(1) as usize;
        let mut end = (ch.end_line as usize).min(lines.len());
        if lines.len() == 1 && lines[0].is_empty() {
            // Empty file: empty range, empty lines.
            start = 1;
            end = 0;
        }
        if start > end && end > 0 {
            start = end;
        }
        let returned_to = if end >= start {
            end.min(start + max_lines - 1)
        } else {
            end
        };

        let mut formatted = Vec::new();
        if end >= start {
            for n in start..=returned_to {
                let content = lines.get(n - 1).copied().unwrap_or("");
                formatted.push(format!("{n}| {content}"));
            }
        }

        results.push(ChunkText {
            chunk_id: ch.chunk_id,
            path: ch.path.clone(),
            start_line: ch.start_line,
            end_line: ch.end_line,
            returned_from: if end >= start { start as u32 } else { 0 },
            returned_to: returned_to as u32,
            lines: formatted,
        });
    }
    Ok(results)
}

/// Rejects any relative path containing `..` segments or resolving outside
/// the root, even when the cleaned result would land back inside it.
fn reject_traversal(root: &Path, rel_path: &str) -> Result<()> {
    let rel = Path::new(rel_path);
    let traversal = rel.is_absolute()
        || rel
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_)));
    if traversal {
        return Err(RepodexError::PathTraversal(rel_path.to_string()).into());
    }
    if !root.join(rel).starts_with(root) {
        return Err(RepodexError::PathTraversal(rel_path.to_string()).into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map_with(path: &str, start: u32, end: u32) -> HashMap<u32, ChunkEntry> {
        let mut map = HashMap::new();
        map.insert(
            1,
            ChunkEntry {
                chunk_id: 1,
                file_id: 1,
                path: path.to_string(),
                start_line: start,
                end_line: end,
                snippet: String::new(),
            },
        );
        map
    }

    #[test]
    fn lines_are_annotated_and_clamped() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        std::fs::write(dir.path().join("a.ts"), "one\ntwo\nthree\n").expect("write");

        let map = map_with("a.ts", 2, 99);
        let results = fetch_with_chunk_map(dir.path(), &map, &[1], 0).expect("fetch");
        assert_eq!(results[0].returned_from, 2);
        // The trailing newline yields a final empty line, clamped in range.
        assert_eq!(results[0].lines[0], "2| two");
        assert_eq!(results[0].lines[1], "3| three");
    }

    #[test]
    fn max_lines_trims_from_start() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        std::fs::write(dir.path().join("a.ts"), "l1\nl2\nl3\nl4\nl5").expect("write");

        let map = map_with("a.ts", 1, 5);
        let results = fetch_with_chunk_map(dir.path(), &map, &[1], 2).expect("fetch");
        assert_eq!(results[0].returned_from, 1);
        assert_eq!(results[0].returned_to, 2);
        assert_eq!(results[0].lines, vec!["1| l1", "2| l2"]);
    }

    #[test]
    fn crlf_input_is_normalized() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        std::fs::write(dir.path().join("a.ts"), "one\r\ntwo\r\n").expect("write");

        let map = map_with("a.ts", 1, 2);
        let results = fetch_with_chunk_map(dir.path(), &map, &[1], 0).expect("fetch");
        assert_eq!(results[0].lines, vec!["1| one", "2| two"]);
    }

    #[test]
    fn unknown_id_is_an_error() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let map = HashMap::new();
        assert!(fetch_with_chunk_map(dir.path(), &map, &[42], 0).is_err());
    }

    #[test]
    fn traversal_paths_are_rejected() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        std::fs::create_dir_all(dir.path().join("sub")).expect("mkdir");
        std::fs::write(dir.path().join("safe.ts"), "ok\n").expect("write");

        // Cleans back inside the root, still rejected.
        let map = map_with("sub/../safe.ts", 1, 1);
        let err = fetch_with_chunk_map(dir.path(), &map, &[1], 0).expect_err("traversal");
        assert!(err.to_string().contains("escapes"));
    }

    #[test]
    fn excess_ids_are_trimmed() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        std::fs::write(dir.path().join("a.ts"), "one\n").expect("write");
        let map = map_with("a.ts", 1, 1);

        let ids = [1u32, 1, 1, 1, 1, 99, 98];
        let results = fetch_with_chunk_map(dir.path(), &map, &ids, 0).expect("fetch");
        assert_eq!(results.len(), 5);
    }

    #[test]
    fn empty_file_returns_empty_range() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        std::fs::write(dir.path().join("empty.ts"), "").expect("write");
        let map = map_with("empty.ts", 1, 3);
        let results = fetch_with_chunk_map(dir.path(), &map, &[1], 0).expect("fetch");
        assert!(results[0].lines.is_empty());
        assert_eq!(results[0].returned_from, 0);
        assert_eq!(results[0].returned_to, 0);
    }
}
