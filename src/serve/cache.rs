// SPDX-License-Identifier: MIT OR Apache-2.0

//! Preloaded index data shared across serve requests.
//!
//! The cache is the only in-memory shared state in the serve process. It
//! is guarded by a mutex and handlers receive snapshot copies, so the lock
//! is never held during request processing.

use anyhow::Result;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use crate::config::{self, Config};
use crate::index::{self, ChunkEntry, TermInfo};
use crate::profile;
use crate::store;

/// A consistent snapshot of the loaded index.
#[derive(Debug, Clone)]
pub struct IndexSnapshot {
    pub cfg: Config,
    pub chunks: Vec<ChunkEntry>,
    pub chunk_map: HashMap<u32, ChunkEntry>,
    pub terms: HashMap<String, TermInfo>,
    pub postings: Vec<u32>,
}

#[derive(Default)]
pub struct IndexCache {
    state: Mutex<Option<IndexSnapshot>>,
}

impl IndexCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot, loading the index first when the cache is cold.
    pub fn load(&self, root: &Path) -> Result<IndexSnapshot> {
        let mut state = self.state.lock().expect("index cache poisoned");
        if let Some(snapshot) = state.as_ref() {
            return Ok(snapshot.clone());
        }

        let user_cfg = config::load_user_config(&store::config_path(root))?;
        let (mut cfg, profiles) =
            config::apply_overrides(config::default_runtime_config(), &user_cfg)?;
        let rules = profile::build_effective_rules(root, &profiles, &cfg)?;
        cfg.token = rules.token_config.clone();

        let chunks = index::load_chunk_entries(&store::chunks_path(root))?;
        let chunk_map: HashMap<u32, ChunkEntry> = chunks
            .iter()
            .map(|ch| (ch.chunk_id, ch.clone()))
            .collect();
        let (terms, _) = index::load_terms(&store::terms_path(root))?;
        let postings = index::load_postings(&store::postings_path(root))?;

        let snapshot = IndexSnapshot {
            cfg,
            chunks,
            chunk_map,
            terms,
            postings,
        };
        *state = Some(snapshot.clone());
        Ok(snapshot)
    }

    /// Clears the cached data; the next request reloads from disk.
    pub fn invalidate(&self) {
        let mut state = self.state.lock().expect("index cache poisoned");
        *state = None;
    }
}
