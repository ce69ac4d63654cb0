// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory index assembly and the on-disk binary format.

mod deserialize;
mod precomputed;
mod serialize;

pub use deserialize::{load_chunk_entries, load_file_entries, load_postings, load_terms};
pub use precomputed::{build_from_precomputed, PrecomputedChunk, PrecomputedFile};
pub use serialize::serialize;

use std::collections::BTreeMap;

/// A scanned file as recorded in `files.dat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub file_id: u32,
    pub path: String,
    pub mtime: i64,
    pub size: i64,
    pub hash64: u64,
}

/// A chunk of a file as recorded in `chunks.dat`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkEntry {
    pub chunk_id: u32,
    pub file_id: u32,
    pub path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub snippet: String,
}

/// Location and document frequency of a term in the posting stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TermInfo {
    pub offset: u64,
    pub df: u32,
}

/// Postings keyed by term; the map is ordered so serialization emits terms
/// in ascending lexicographic order without a separate sort.
pub type Postings = BTreeMap<String, Vec<u32>>;
