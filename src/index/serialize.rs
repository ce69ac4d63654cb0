// SPDX-License-Identifier: MIT OR Apache-2.0

//! Binary serialization of the index.
//!
//! All integers are little-endian; strings are a `u32` length followed by
//! UTF-8 bytes. Terms are written in ascending lexicographic order and
//! posting offsets grow in multiples of four.

use anyhow::Result;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::store;

use super::{ChunkEntry, FileEntry, Postings};

/// Writes `files.dat`, `chunks.dat`, `terms.dat`, and `postings.dat`.
pub fn serialize(
    root: &Path,
    files: &[FileEntry],
    chunks: &[ChunkEntry],
    postings: &Postings,
) -> Result<()> {
    std::fs::create_dir_all(store::dir(root))?;
    write_files(&store::files_path(root), files)?;
    write_chunks(&store::chunks_path(root), chunks)?;
    write_terms_and_postings(
        &store::terms_path(root),
        &store::postings_path(root),
        postings,
    )?;
    Ok(())
}

fn write_files(path: &Path, files: &[FileEntry]) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    w.write_all(&(files.len() as u32).to_le_bytes())?;
    for fe in files {
        w.write_all(&fe.file_id.to_le_bytes())?;
        write_string(&mut w, &fe.path)?;
        w.write_all(&fe.mtime.to_le_bytes())?;
        w.write_all(&fe.size.to_le_bytes())?;
        w.write_all(&fe.hash64.to_le_bytes())?;
    }
    w.flush()?;
    Ok(())
}

fn write_chunks(path: &Path, chunks: &[ChunkEntry]) -> Result<()> {
    let mut w = BufWriter::new(File::create(path)?);
    w.write_all(&(chunks.len() as u32).to_le_bytes())?;
    for ch in chunks {
        w.write_all(&ch.chunk_id.to_le_bytes())?;
        w.write_all(&ch.file_id.to_le_bytes())?;
        write_string(&mut w, &ch.path)?;
        w.write_all(&ch.start_line.to_le_bytes())?;
        w.write_all(&ch.end_line.to_le_bytes())?;
        write_string(&mut w, &ch.snippet)?;
    }
    w.flush()?;
    Ok(())
}

fn write_terms_and_postings(
    terms_path: &Path,
    postings_path: &Path,
    postings: &Postings,
) -> Result<()> {
    let mut terms_file = BufWriter::new(File::create(terms_path)?);
    let mut postings_file = BufWriter::new(File::create(postings_path)?);

    terms_file.write_all(&(postings.len() as u32).to_le_bytes())?;

    // BTreeMap iteration yields terms in ascending lexicographic order.
    let mut offset: u64 = 0;
    for (term, ids) in postings {
        write_string(&mut terms_file, term)?;
        terms_file.write_all(&offset.to_le_bytes())?;
        terms_file.write_all(&(ids.len() as u32).to_le_bytes())?;
        for id in ids {
            postings_file.write_all(&id.to_le_bytes())?;
            offset += 4;
        }
    }
    terms_file.flush()?;
    postings_file.flush()?;
    Ok(())
}

fn write_string<W: Write>(w: &mut W, s: &str) -> Result<()> {
    w.write_all(&(s.len() as u32).to_le_bytes())?;
    w.write_all(s.as_bytes())?;
    Ok(())
}
