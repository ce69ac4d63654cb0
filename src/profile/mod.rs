// SPDX-License-Identifier: MIT OR Apache-2.0

//! Technology profiles: detection, scan/tokenize rules, and the merged
//! effective rule set used by scanning and indexing.

mod effective;
mod global;
mod golang;
mod node;
mod tsjs;

use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::config::TokenizationConfig;

pub use effective::{build_effective_rules, glob_match};
pub use global::{global_scan_ignore, is_binary_sniff, is_known_binary_ext};

/// Rules schema version; bumping it forces full rebuilds through the
/// rules hash.
pub const RULES_SCHEMA_VERSION: u32 = 1;

/// Detection and rule hooks for a technology profile.
pub trait Profile {
    fn id(&self) -> &'static str;
    fn detect(&self, ctx: &DetectContext) -> Result<bool>;
    fn rules(&self) -> Rules;
}

/// Scan and tokenization rules contributed by a profile.
#[derive(Debug, Clone, Default)]
pub struct Rules {
    pub scan_ignore: Vec<String>,
    pub include_ext: Vec<String>,
    pub tokenize: TokenizeRules,
}

/// Path/token tweaks layered over the base tokenization config.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TokenizeRules {
    pub path_strip_suffixes: Vec<String>,
    pub path_strip_exts: Vec<String>,
    pub stop_words: Vec<String>,
    pub min_token_len: usize,
    pub max_token_len: usize,
    pub drop_hex_len: usize,
    pub allow_short_tokens: Vec<String>,
    pub tokenize_strings: Option<bool>,
}

/// Helpers for profile detection.
#[derive(Debug, Clone)]
pub struct DetectContext {
    pub root: PathBuf,
}

impl DetectContext {
    pub fn new(root: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
        }
    }

    /// Returns an absolute path inside the repo root.
    pub fn join(&self, part: &str) -> PathBuf {
        self.root.join(part)
    }
}

/// The merged product of profile defaults, the user ignore file, and
/// configuration overrides.
#[derive(Debug, Clone)]
pub struct EffectiveRules {
    pub scan_ignore: Vec<String>,
    pub include_ext: Vec<String>,
    pub tokenize: TokenizeRules,
    pub token_config: TokenizationConfig,
    pub profiles: Vec<String>,
    pub scan_settings: ScanSettings,
    pub rules_hash: u64,
}

/// Scan-level knobs folded into the rules hash.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ScanSettings {
    pub max_text_file_size_bytes: i64,
}

/// Detected profiles plus contextual facts.
pub struct DetectResult {
    pub profiles: Vec<Box<dyn Profile>>,
    pub has_package_json: bool,
}

/// Registry order is stable to keep rule merging deterministic.
fn registry() -> Vec<Box<dyn Profile>> {
    vec![
        Box::new(node::NodeProfile),
        Box::new(tsjs::TsJsProfile),
        Box::new(golang::GoProfile),
    ]
}

/// Returns profiles in the provided order, validating ids.
pub fn resolve_profiles(ids: &[String]) -> Result<Vec<Box<dyn Profile>>> {
    if ids.is_empty() {
        bail!("profiles list is empty");
    }
    let mut out = Vec::with_capacity(ids.len());
    for id in ids {
        let profile = registry()
            .into_iter()
            .find(|p| p.id() == id)
            .with_context(|| format!("unknown profile {id:?}"))?;
        out.push(profile);
    }
    Ok(out)
}

/// Runs detection in registry order.
pub fn detect_profiles(ctx: &DetectContext) -> Result<DetectResult> {
    let mut enabled = Vec::new();
    let mut has_package_json = false;
    for profile in registry() {
        let matched = profile
            .detect(ctx)
            .with_context(|| format!("{} detect failed", profile.id()))?;
        if matched {
            if profile.id() == "node" {
                has_package_json = true;
            }
            enabled.push(profile);
        }
    }
    Ok(DetectResult {
        profiles: enabled,
        has_package_json,
    })
}
