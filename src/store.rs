// SPDX-License-Identifier: MIT OR Apache-2.0

//! `.repodex` path layout and persisted index metadata.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const DIR_NAME: &str = ".repodex";

/// Index schema version; bumping it forces a full rebuild.
pub const SCHEMA_VERSION: u32 = 2;

/// Version string recorded in meta for diagnostics.
pub const TOOL_VERSION: &str = env!("CARGO_PKG_VERSION");

pub fn dir(root: &Path) -> PathBuf {
    root.join(DIR_NAME)
}

pub fn config_path(root: &Path) -> PathBuf {
    dir(root).join("config.json")
}

pub fn ignore_path(root: &Path) -> PathBuf {
    dir(root).join("ignore")
}

pub fn meta_path(root: &Path) -> PathBuf {
    dir(root).join("meta.json")
}

pub fn files_path(root: &Path) -> PathBuf {
    dir(root).join("files.dat")
}

pub fn chunks_path(root: &Path) -> PathBuf {
    dir(root).join("chunks.dat")
}

pub fn terms_path(root: &Path) -> PathBuf {
    dir(root).join("terms.dat")
}

pub fn postings_path(root: &Path) -> PathBuf {
    dir(root).join("postings.dat")
}

/// Cache-level metadata used for validation; embedded in [`Meta`] and
/// mirrored in the cache directory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheMeta {
    pub cache_version: String,
    pub schema_version: u32,
    pub config_hash: u64,
    pub profiles: Vec<String>,
}

/// Persisted index metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Meta {
    pub index_version: u32,
    pub indexed_at_unix: i64,
    pub file_count: usize,
    pub chunk_count: usize,
    pub term_count: usize,
    pub config_hash: u64,
    pub schema_version: u32,
    #[serde(default)]
    pub repo_head: String,
    #[serde(default)]
    pub tool_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheMeta>,
}

impl Meta {
    /// Builds a meta record with the supplied counts and current timestamp.
    pub fn new(
        index_version: u32,
        file_count: usize,
        chunk_count: usize,
        term_count: usize,
        config_hash: u64,
        repo_head: String,
    ) -> Self {
        let indexed_at_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        Self {
            index_version,
            indexed_at_unix,
            file_count,
            chunk_count,
            term_count,
            config_hash,
            schema_version: SCHEMA_VERSION,
            repo_head,
            tool_version: TOOL_VERSION.to_string(),
            cache: None,
        }
    }
}

/// Writes the metadata to disk as pretty-printed JSON.
pub fn save_meta(path: &Path, meta: &Meta) -> Result<()> {
    let data = serde_json::to_vec_pretty(meta)?;
    std::fs::write(path, data)?;
    Ok(())
}

/// Reads metadata from disk.
pub fn load_meta(path: &Path) -> Result<Meta> {
    let data = std::fs::read(path)?;
    let meta = serde_json::from_slice(&data)?;
    Ok(meta)
}
