// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-file JSON cache under `.repodex/cache/<version>/`.
//!
//! Entries are keyed by the SHA-1 of the slash-normalized relative path.
//! Freshness is delegated to the git-based change detector, so loads skip
//! stat validation entirely.

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::path::{Path, PathBuf};

use crate::store::{self, CacheMeta};

pub const CACHE_VERSION: &str = "v1";

/// A serialized per-file cache record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub rel_path: String,
    pub size: i64,
    pub mtime: i64,
    pub hash64: u64,
    pub chunks: Vec<LocalChunk>,
    pub tokens: Vec<Vec<String>>,
}

/// A chunk without a global chunk id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalChunk {
    pub start: u32,
    pub end: u32,
    pub snippet: String,
}

/// Returns the versioned cache directory under the repo root.
pub fn cache_dir(root: &Path) -> PathBuf {
    store::dir(root).join("cache").join(CACHE_VERSION)
}

fn cache_path(dir: &Path, rel_path: &str) -> PathBuf {
    let mut hasher = Sha1::new();
    hasher.update(rel_path.as_bytes());
    let digest = hasher.finalize();
    dir.join(format!("{}.json", hex::encode(digest)))
}

/// Removes the versioned cache directory entirely.
pub fn purge(root: &Path) -> Result<()> {
    match std::fs::remove_dir_all(cache_dir(root)) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(err.into()),
    }
}

/// Writes a cache entry for the provided file.
pub fn save(root: &Path, mut entry: CacheEntry) -> Result<()> {
    entry.rel_path = entry.rel_path.replace('\\', "/");
    let path = cache_path(&cache_dir(root), &entry.rel_path);
    let data = serde_json::to_vec(&entry)?;
    write_file_atomic_replace(&path, &data)
}

/// Reads a cache entry for the given relative path without stat
/// validation. Returns `None` when the entry is missing or fails its
/// structural checks.
pub fn load_by_path(root: &Path, rel_path: &str) -> Result<Option<CacheEntry>> {
    let normalized = rel_path.replace('\\', "/");
    let path = cache_path(&cache_dir(root), &normalized);
    let data = match std::fs::read(&path) {
        Ok(data) => data,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let entry: CacheEntry =
        serde_json::from_slice(&data).with_context(|| format!("parse cache entry for {normalized}"))?;
    if entry.rel_path.replace('\\', "/") != normalized {
        return Ok(None);
    }
    if entry.chunks.len() != entry.tokens.len() {
        return Ok(None);
    }
    Ok(Some(entry))
}

fn legacy_meta_path(root: &Path) -> PathBuf {
    cache_dir(root).join("meta.json")
}

/// Loads cache metadata: the block embedded in `meta.json` when present,
/// falling back to the legacy `cache/<version>/meta.json` file.
pub fn load_cache_meta(root: &Path) -> Result<Option<CacheMeta>> {
    if let Ok(meta) = store::load_meta(&store::meta_path(root)) {
        if let Some(cache) = meta.cache {
            return Ok(Some(cache));
        }
    }
    load_legacy_meta(root)
}

fn load_legacy_meta(root: &Path) -> Result<Option<CacheMeta>> {
    let path = legacy_meta_path(root);
    let data = match std::fs::read(&path) {
        Ok(data) => data,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err.into()),
    };
    let meta = serde_json::from_slice(&data).context("parse cache meta")?;
    Ok(Some(meta))
}

fn save_cache_meta(root: &Path, meta: &CacheMeta) -> Result<()> {
    let data = serde_json::to_vec(meta)?;
    write_file_atomic_replace(&legacy_meta_path(root), &data)
}

/// Verifies cache metadata, purging the cache on mismatch.
///
/// Returns `true` when a purge happened. Equality compares the cache
/// version, schema version, config hash, and the ordered profile list.
pub fn ensure_meta(root: &Path, mut want: CacheMeta) -> Result<bool> {
    want.cache_version = CACHE_VERSION.to_string();
    want.schema_version = store::SCHEMA_VERSION;

    let existing = load_cache_meta(root)?;
    match existing {
        None => {
            save_cache_meta(root, &want)?;
            Ok(false)
        }
        Some(existing) if existing == want => Ok(false),
        Some(_) => {
            purge(root)?;
            save_cache_meta(root, &want)?;
            Ok(true)
        }
    }
}

/// Writes bytes to a temp file and renames into place. When the rename
/// fails over an existing destination, the destination is removed and the
/// rename retried once.
pub fn write_file_atomic_replace(path: &Path, data: &[u8]) -> Result<()> {
    let Some(parent) = path.parent() else {
        bail!("cannot atomically write {} without parent", path.display());
    };
    std::fs::create_dir_all(parent)?;

    let tmp = path.with_extension("json.tmp");
    if let Err(err) = std::fs::write(&tmp, data) {
        let _ = std::fs::remove_file(&tmp);
        return Err(err).with_context(|| format!("write {}", tmp.display()));
    }
    if let Err(err) = std::fs::rename(&tmp, path) {
        if path.exists() {
            if let Err(remove_err) = std::fs::remove_file(path) {
                let _ = std::fs::remove_file(&tmp);
                return Err(remove_err.into());
            }
            if let Err(retry_err) = std::fs::rename(&tmp, path) {
                let _ = std::fs::remove_file(&tmp);
                return Err(retry_err.into());
            }
            return Ok(());
        }
        let _ = std::fs::remove_file(&tmp);
        return Err(err.into());
    }
    Ok(())
}
