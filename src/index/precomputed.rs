// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assembly of index structures from precomputed chunk/token data.

use std::collections::BTreeSet;

use super::{ChunkEntry, FileEntry, Postings};

/// Chunk/token data for one file, ready for index assembly.
#[derive(Debug, Clone)]
pub struct PrecomputedFile {
    pub path: String,
    pub mtime: i64,
    pub size: i64,
    pub hash64: u64,
    pub chunks: Vec<PrecomputedChunk>,
}

/// A chunk with its unique sorted token list.
#[derive(Debug, Clone)]
pub struct PrecomputedChunk {
    pub start_line: u32,
    pub end_line: u32,
    pub snippet: String,
    pub tokens: Vec<String>,
}

/// Assembles file entries, chunk entries, and postings.
///
/// Files are sorted by slash-normalized path; ids are dense 1-based
/// counters assigned in that order. Posting lists come out sorted and
/// deduplicated.
pub fn build_from_precomputed(
    files: &[PrecomputedFile],
) -> (Vec<FileEntry>, Vec<ChunkEntry>, Postings) {
    let mut sorted: Vec<&PrecomputedFile> = files.iter().collect();
    sorted.sort_by(|a, b| normalize(&a.path).cmp(&normalize(&b.path)));

    let mut file_entries = Vec::with_capacity(sorted.len());
    let mut chunk_entries = Vec::new();
    let mut postings = Postings::new();
    let mut next_file_id: u32 = 1;
    let mut next_chunk_id: u32 = 1;

    for file in sorted {
        let path = normalize(&file.path);
        let file_id = next_file_id;
        next_file_id += 1;
        file_entries.push(FileEntry {
            file_id,
            path: path.clone(),
            mtime: file.mtime,
            size: file.size,
            hash64: file.hash64,
        });

        for chunk in &file.chunks {
            let chunk_id = next_chunk_id;
            next_chunk_id += 1;
            chunk_entries.push(ChunkEntry {
                chunk_id,
                file_id,
                path: path.clone(),
                start_line: chunk.start_line,
                end_line: chunk.end_line,
                snippet: chunk.snippet.clone(),
            });
            // Token lists are unique by contract; dedupe defensively.
            let unique: BTreeSet<&String> = chunk.tokens.iter().collect();
            for term in unique {
                postings.entry(term.clone()).or_default().push(chunk_id);
            }
        }
    }

    for ids in postings.values_mut() {
        ids.sort_unstable();
        ids.dedup();
    }

    (file_entries, chunk_entries, postings)
}

fn normalize(path: &str) -> String {
    path.replace('\\', "/")
}
