// SPDX-License-Identifier: MIT OR Apache-2.0

//! Readers for the binary index files.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::errors::RepodexError;

use super::{ChunkEntry, FileEntry, TermInfo};

/// Reads file entries from `files.dat`.
pub fn load_file_entries(path: &Path) -> Result<Vec<FileEntry>> {
    let mut r = BufReader::new(File::open(path)?);
    let count = read_u32(&mut r)?;
    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let file_id = read_u32(&mut r)?;
        let path = read_string(&mut r)?;
        let mtime = read_i64(&mut r)?;
        let size = read_i64(&mut r)?;
        let hash64 = read_u64(&mut r)?;
        entries.push(FileEntry {
            file_id,
            path,
            mtime,
            size,
            hash64,
        });
    }
    Ok(entries)
}

/// Reads chunk entries from `chunks.dat`.
pub fn load_chunk_entries(path: &Path) -> Result<Vec<ChunkEntry>> {
    let mut r = BufReader::new(File::open(path)?);
    let count = read_u32(&mut r)?;
    let mut entries = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let chunk_id = read_u32(&mut r)?;
        let file_id = read_u32(&mut r)?;
        let path = read_string(&mut r)?;
        let start_line = read_u32(&mut r)?;
        let end_line = read_u32(&mut r)?;
        let snippet = read_string(&mut r)?;
        entries.push(ChunkEntry {
            chunk_id,
            file_id,
            path,
            start_line,
            end_line,
            snippet,
        });
    }
    Ok(entries)
}

/// Reads term metadata from `terms.dat`.
pub fn load_terms(path: &Path) -> Result<(HashMap<String, TermInfo>, u32)> {
    let mut r = BufReader::new(File::open(path)?);
    let term_count = read_u32(&mut r)?;
    let mut terms = HashMap::with_capacity(term_count as usize);
    for _ in 0..term_count {
        let term = read_string(&mut r)?;
        let offset = read_u64(&mut r)?;
        let df = read_u32(&mut r)?;
        terms.insert(term, TermInfo { offset, df });
    }
    Ok((terms, term_count))
}

/// Reads the posting stream as a `u32` vector, validating alignment.
pub fn load_postings(path: &Path) -> Result<Vec<u32>> {
    let data = std::fs::read(path)?;
    if data.len() % 4 != 0 {
        return Err(
            RepodexError::IndexCorrupt("postings file size is invalid".to_string()).into(),
        );
    }
    Ok(data
        .chunks_exact(4)
        .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect())
}

fn read_u32<R: Read>(r: &mut R) -> Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

fn read_u64<R: Read>(r: &mut R) -> Result<u64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(u64::from_le_bytes(buf))
}

fn read_i64<R: Read>(r: &mut R) -> Result<i64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

fn read_string<R: Read>(r: &mut R) -> Result<String> {
    let length = read_u32(r)? as usize;
    let mut buf = vec![0u8; length];
    r.read_exact(&mut buf)?;
    String::from_utf8(buf).context("index string is not valid UTF-8")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn misaligned_postings_are_rejected() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("postings.dat");
        std::fs::write(&path, [1u8, 2, 3]).expect("write");
        assert!(load_postings(&path).is_err());
    }

    #[test]
    fn empty_postings_load() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("postings.dat");
        std::fs::write(&path, []).expect("write");
        assert!(load_postings(&path).expect("load").is_empty());
    }
}
