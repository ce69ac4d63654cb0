// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain error taxonomy.
//!
//! Most call sites propagate through `anyhow`; these variants exist so that
//! callers can classify failures (and so serve can report stable messages)
//! without matching on strings.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RepodexError {
    #[error("repodex requires a git repository")]
    VcsMissing,

    #[error("index schema version {found} is incompatible (expected {expected})")]
    SchemaIncompatible { found: u32, expected: u32 },

    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("path {0} escapes the repository root")]
    PathTraversal(String),

    #[error("cache invalid for {rel_path}: {reason}")]
    CacheInvalid { rel_path: String, reason: String },

    #[error("index corrupt: {0}")]
    IndexCorrupt(String),

    #[error("invalid chunk line range {start}-{end} in {path}")]
    ChunkerInvariant { path: String, start: u32, end: u32 },

    #[error("query cannot be empty")]
    QueryEmpty,

    #[error("chunk {0} not found in index")]
    FetchIdUnknown(u32),

    #[error("request too large")]
    RequestTooLarge,

    #[error("unknown op")]
    UnknownOp,
}
