// SPDX-License-Identifier: MIT OR Apache-2.0

//! Runtime configuration defaults and user overrides.
//!
//! User overrides live in `.repodex/config.json`; profiles are mandatory
//! there, everything else is optional.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use crate::errors::RepodexError;

/// Index format version recorded in meta.
pub const INDEX_VERSION: u32 = 1;

/// Root runtime configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub scan: ScanConfig,
    pub chunk: ChunkingConfig,
    pub token: TokenizationConfig,
    pub limits: LimitsConfig,
}

/// Controls how files are chunked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    pub max_lines: u32,
    pub overlap_lines: u32,
    pub min_chunk_lines: u32,
}

/// Controls token extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenizationConfig {
    pub min_token_len: usize,
    pub max_token_len: usize,
    pub drop_hex_len: usize,
    pub allow_short_tokens: Vec<String>,
    pub stop_words: Vec<String>,
    pub tokenize_string_literals: bool,
    pub path_strip_suffixes: Vec<String>,
    pub path_strip_exts: Vec<String>,
}

/// Controls scanning behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    pub max_text_file_size_bytes: i64,
}

/// Controls output limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub max_snippet_bytes: usize,
}

/// User overrides stored on disk at `.repodex/config.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserConfig {
    pub profiles: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scan: Option<UserScanOverrides>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk: Option<UserChunkOverrides>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limits: Option<UserLimitsOverrides>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserChunkOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_lines: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub overlap_lines: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_chunk_lines: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserScanOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_text_file_size_bytes: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLimitsOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_snippet_bytes: Option<usize>,
}

/// Returns a [`Config`] populated with defaults.
pub fn default_runtime_config() -> Config {
    Config {
        scan: ScanConfig {
            max_text_file_size_bytes: 1024 * 1024,
        },
        chunk: ChunkingConfig {
            max_lines: 200,
            overlap_lines: 20,
            min_chunk_lines: 20,
        },
        token: TokenizationConfig {
            min_token_len: 3,
            max_token_len: 64,
            drop_hex_len: 16,
            allow_short_tokens: to_strings(&[
                "api", "jwt", "url", "ui", "css", "tsx", "jsx", "dom", "id",
            ]),
            stop_words: default_stop_words(),
            tokenize_string_literals: true,
            path_strip_suffixes: to_strings(&[".d.ts.map", ".d.tsx", ".d.ts"]),
            path_strip_exts: Vec::new(),
        },
        limits: LimitsConfig {
            max_snippet_bytes: 800,
        },
    }
}

fn default_stop_words() -> Vec<String> {
    to_strings(&[
        "const",
        "let",
        "var",
        "function",
        "return",
        "export",
        "import",
        "from",
        "class",
        "interface",
        "type",
        "enum",
        "extends",
        "implements",
        "new",
        "this",
        "super",
        "public",
        "private",
        "protected",
        "readonly",
        "async",
        "await",
        "if",
        "else",
        "switch",
        "case",
        "for",
        "while",
        "do",
        "break",
        "continue",
        "try",
        "catch",
        "finally",
        "throw",
        "true",
        "false",
        "null",
        "undefined",
    ])
}

fn to_strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

/// Writes the user config to disk as pretty-printed JSON.
pub fn save_user_config(path: &Path, cfg: &UserConfig) -> Result<()> {
    let data = serde_json::to_vec_pretty(cfg)?;
    std::fs::write(path, data)?;
    Ok(())
}

/// Reads and parses a user config from disk.
pub fn load_user_config(path: &Path) -> Result<UserConfig> {
    let data = std::fs::read(path)?;
    let cfg = serde_json::from_slice(&data)?;
    Ok(cfg)
}

/// Merges a user config into runtime defaults.
///
/// Returns the merged config plus the sanitized profile list. Profiles are
/// mandatory: an empty list after sanitization is a configuration error.
pub fn apply_overrides(defaults: Config, user: &UserConfig) -> Result<(Config, Vec<String>)> {
    let profiles = sanitize_profiles(&user.profiles);
    if profiles.is_empty() {
        return Err(RepodexError::ConfigInvalid(
            "profiles are required in .repodex/config.json".to_string(),
        )
        .into());
    }
    let mut cfg = defaults;
    if let Some(scan) = &user.scan {
        if let Some(max) = scan.max_text_file_size_bytes {
            cfg.scan.max_text_file_size_bytes = max;
        }
    }
    if let Some(chunk) = &user.chunk {
        if let Some(max_lines) = chunk.max_lines {
            cfg.chunk.max_lines = max_lines;
        }
        if let Some(overlap) = chunk.overlap_lines {
            cfg.chunk.overlap_lines = overlap;
        }
        if let Some(min) = chunk.min_chunk_lines {
            cfg.chunk.min_chunk_lines = min;
        }
    }
    if let Some(limits) = &user.limits {
        if let Some(max) = limits.max_snippet_bytes {
            cfg.limits.max_snippet_bytes = max;
        }
    }
    Ok((cfg, profiles))
}

fn sanitize_profiles(values: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for value in values {
        let trimmed = value.trim();
        if trimmed.is_empty() || !seen.insert(trimmed.to_string()) {
            continue;
        }
        out.push(trimmed.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_only_set_fields() {
        let user = UserConfig {
            profiles: vec!["ts_js".to_string()],
            chunk: Some(UserChunkOverrides {
                max_lines: Some(50),
                ..Default::default()
            }),
            ..Default::default()
        };
        let (cfg, profiles) = apply_overrides(default_runtime_config(), &user).expect("apply");
        assert_eq!(cfg.chunk.max_lines, 50);
        assert_eq!(cfg.chunk.overlap_lines, 20);
        assert_eq!(profiles, vec!["ts_js".to_string()]);
    }

    #[test]
    fn missing_profiles_is_an_error() {
        let user = UserConfig::default();
        assert!(apply_overrides(default_runtime_config(), &user).is_err());
    }

    #[test]
    fn profiles_are_trimmed_and_deduped() {
        let user = UserConfig {
            profiles: vec![
                " ts_js ".to_string(),
                "ts_js".to_string(),
                "".to_string(),
                "go".to_string(),
            ],
            ..Default::default()
        };
        let (_, profiles) = apply_overrides(default_runtime_config(), &user).expect("apply");
        assert_eq!(profiles, vec!["ts_js".to_string(), "go".to_string()]);
    }

    #[test]
    fn user_config_round_trips() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let path = dir.path().join("config.json");
        let cfg = UserConfig {
            profiles: vec!["go".to_string()],
            ..Default::default()
        };
        save_user_config(&path, &cfg).expect("save");
        let loaded = load_user_config(&path).expect("load");
        assert_eq!(loaded.profiles, cfg.profiles);
    }
}
