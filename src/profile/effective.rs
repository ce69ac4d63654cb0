// SPDX-License-Identifier: MIT OR Apache-2.0

//! Effective-rule merging: global defaults, profile rules, the user ignore
//! file, and the tokenize override file, summarized by a rules hash.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::{Config, TokenizationConfig};
use crate::hash;
use crate::store;

use super::{
    global_scan_ignore, resolve_profiles, EffectiveRules, Profile, ScanSettings, TokenizeRules,
    RULES_SCHEMA_VERSION,
};

/// Merges global defaults, profile rules, and user overrides for the
/// provided profile list.
pub fn build_effective_rules(
    root: &Path,
    profiles: &[String],
    cfg: &Config,
) -> Result<EffectiveRules> {
    let resolved = resolve_profiles(profiles)?;

    let has_package_json = root.join("package.json").is_file();
    let mut scan_ignore = global_scan_ignore(has_package_json);
    let mut include_ext: Vec<String> = Vec::new();
    for profile in &resolved {
        let rules = profile.rules();
        scan_ignore.extend(rules.scan_ignore);
        for ext in rules.include_ext {
            if !include_ext.contains(&ext) {
                include_ext.push(ext);
            }
        }
    }
    match load_user_ignore(root) {
        Ok(patterns) => scan_ignore.extend(patterns),
        Err(err) if is_not_found(&err) => {}
        Err(err) => return Err(err).context("load .repodex/ignore"),
    }

    let mut tokenize = merge_token_rules(&cfg.token, &resolved);
    match load_tokenize_override(root) {
        Ok(user) => tokenize = apply_tokenize_override(tokenize, user),
        Err(err) if is_not_found(&err) => {}
        Err(err) => return Err(err),
    }
    let token_config = tokenize.to_config(&cfg.token);

    let scan_settings = ScanSettings {
        max_text_file_size_bytes: cfg.scan.max_text_file_size_bytes,
    };
    let rules_hash = compute_rules_hash(profiles, &scan_ignore, scan_settings, &tokenize)?;

    Ok(EffectiveRules {
        scan_ignore,
        include_ext,
        tokenize,
        token_config,
        profiles: profiles.to_vec(),
        scan_settings,
        rules_hash,
    })
}

fn is_not_found(err: &anyhow::Error) -> bool {
    err.downcast_ref::<std::io::Error>()
        .map(|io| io.kind() == std::io::ErrorKind::NotFound)
        .unwrap_or(false)
}

fn merge_token_rules(base: &TokenizationConfig, profiles: &[Box<dyn Profile>]) -> TokenizeRules {
    let mut eff = TokenizeRules {
        path_strip_suffixes: base.path_strip_suffixes.clone(),
        path_strip_exts: base.path_strip_exts.clone(),
        stop_words: base.stop_words.clone(),
        allow_short_tokens: base.allow_short_tokens.clone(),
        min_token_len: base.min_token_len,
        max_token_len: base.max_token_len,
        drop_hex_len: base.drop_hex_len,
        tokenize_strings: Some(base.tokenize_string_literals),
    };

    for profile in profiles {
        let rules = profile.rules().tokenize;
        eff.path_strip_suffixes.extend(rules.path_strip_suffixes);
        eff.path_strip_exts.extend(rules.path_strip_exts);
        eff.stop_words.extend(rules.stop_words);
        eff.allow_short_tokens.extend(rules.allow_short_tokens);
        if rules.min_token_len > 0 {
            eff.min_token_len = rules.min_token_len;
        }
        if rules.max_token_len > 0 {
            eff.max_token_len = rules.max_token_len;
        }
        if rules.drop_hex_len > 0 {
            eff.drop_hex_len = rules.drop_hex_len;
        }
        if rules.tokenize_strings.is_some() {
            eff.tokenize_strings = rules.tokenize_strings;
        }
    }
    eff
}

impl TokenizeRules {
    /// Converts the rules into a [`TokenizationConfig`] over base defaults.
    pub fn to_config(&self, base: &TokenizationConfig) -> TokenizationConfig {
        let mut out = base.clone();
        out.path_strip_suffixes = self.path_strip_suffixes.clone();
        out.path_strip_exts = self.path_strip_exts.clone();
        out.stop_words = self.stop_words.clone();
        out.allow_short_tokens = self.allow_short_tokens.clone();
        if self.min_token_len > 0 {
            out.min_token_len = self.min_token_len;
        }
        if self.max_token_len > 0 {
            out.max_token_len = self.max_token_len;
        }
        if self.drop_hex_len > 0 {
            out.drop_hex_len = self.drop_hex_len;
        }
        if let Some(tokenize_strings) = self.tokenize_strings {
            out.tokenize_string_literals = tokenize_strings;
        }
        out
    }
}

#[derive(Debug, Clone, Deserialize)]
struct ListOverride {
    #[serde(default)]
    mode: String,
    #[serde(default)]
    values: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TokenizeOverride {
    path_strip_suffixes: Option<ListOverride>,
    path_strip_exts: Option<ListOverride>,
    stop_words: Option<ListOverride>,
    allow_short_tokens: Option<ListOverride>,
    min_token_len: Option<usize>,
    max_token_len: Option<usize>,
    drop_hex_len: Option<usize>,
    tokenize_string_literals: Option<bool>,
}

fn load_tokenize_override(root: &Path) -> Result<TokenizeOverride> {
    let path = store::dir(root).join("tokenize.json");
    let data = std::fs::read(&path).map_err(anyhow::Error::from)?;
    serde_json::from_slice(&data).context("parse tokenize override")
}

fn apply_tokenize_override(mut base: TokenizeRules, user: TokenizeOverride) -> TokenizeRules {
    fn apply_list(current: &mut Vec<String>, over: Option<ListOverride>) {
        let Some(over) = over else {
            return;
        };
        match over.mode.trim().to_lowercase().as_str() {
            "replace" => *current = over.values,
            "append" | "" => current.extend(over.values),
            _ => {}
        }
    }
    apply_list(&mut base.path_strip_suffixes, user.path_strip_suffixes);
    apply_list(&mut base.path_strip_exts, user.path_strip_exts);
    apply_list(&mut base.stop_words, user.stop_words);
    apply_list(&mut base.allow_short_tokens, user.allow_short_tokens);

    if let Some(min) = user.min_token_len.filter(|v| *v > 0) {
        base.min_token_len = min;
    }
    if let Some(max) = user.max_token_len.filter(|v| *v > 0) {
        base.max_token_len = max;
    }
    if let Some(hex) = user.drop_hex_len.filter(|v| *v > 0) {
        base.drop_hex_len = hex;
    }
    if user.tokenize_string_literals.is_some() {
        base.tokenize_strings = user.tokenize_string_literals;
    }
    base
}

/// Reads the newline-separated user ignore file, skipping blanks and
/// `#` comments.
fn load_user_ignore(root: &Path) -> Result<Vec<String>> {
    let path = store::ignore_path(root);
    let data = std::fs::read_to_string(&path).map_err(anyhow::Error::from)?;
    let mut patterns = Vec::new();
    for line in data.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        patterns.push(trimmed.replace('\\', "/"));
    }
    Ok(patterns)
}

fn compute_rules_hash(
    profiles: &[String],
    scan_ignore: &[String],
    scan_settings: ScanSettings,
    tokenize: &TokenizeRules,
) -> Result<u64> {
    #[derive(Serialize)]
    struct RulesState<'a> {
        schema_version: u32,
        profiles: &'a [String],
        scan_ignore: &'a [String],
        scan_settings: ScanSettings,
        tokenize: &'a TokenizeRules,
    }

    let bytes = serde_json::to_vec(&RulesState {
        schema_version: RULES_SCHEMA_VERSION,
        profiles,
        scan_ignore,
        scan_settings,
        tokenize,
    })?;
    Ok(hash::sum64(&bytes))
}

/// Matches `/`-segment glob patterns where `**` spans any number of
/// segments and single segments support `*`, `?`, and character classes.
pub fn glob_match(pattern: &str, path: &str) -> bool {
    let pattern_parts: Vec<&str> = pattern.split('/').collect();
    let path_parts: Vec<&str> = path.split('/').collect();
    match_segments(&pattern_parts, &path_parts)
}

fn match_segments(pattern_parts: &[&str], path_parts: &[&str]) -> bool {
    let Some((head, rest)) = pattern_parts.split_first() else {
        return path_parts.is_empty();
    };
    if *head == "**" {
        for i in 0..=path_parts.len() {
            if match_segments(rest, &path_parts[i..]) {
                return true;
            }
        }
        return false;
    }
    let Some((first, remaining)) = path_parts.split_first() else {
        return false;
    };
    if !match_segment(head, first) {
        return false;
    }
    match_segments(rest, remaining)
}

/// Single-segment wildcard matching (`*`, `?`, `[class]` with ranges and
/// leading `^`/`!` negation).
fn match_segment(pattern: &str, name: &str) -> bool {
    let pat: Vec<char> = pattern.chars().collect();
    let txt: Vec<char> = name.chars().collect();
    match_segment_at(&pat, 0, &txt, 0)
}

fn match_segment_at(pat: &[char], mut pi: usize, txt: &[char], mut ti: usize) -> bool {
    while pi < pat.len() {
        match pat[pi] {
            '*' => {
                // Collapse consecutive stars, then try every split point.
                while pi + 1 < pat.len() && pat[pi + 1] == '*' {
                    pi += 1;
                }
                if pi + 1 == pat.len() {
                    return true;
                }
                for skip in ti..=txt.len() {
                    if match_segment_at(pat, pi + 1, txt, skip) {
                        return true;
                    }
                }
                return false;
            }
            '?' => {
                if ti >= txt.len() {
                    return false;
                }
                ti += 1;
                pi += 1;
            }
            '[' => {
                let Some((matched, next)) = match_class(pat, pi, txt, ti) else {
                    return false;
                };
                if !matched {
                    return false;
                }
                ti += 1;
                pi = next;
            }
            ch => {
                if ti >= txt.len() || txt[ti] != ch {
                    return false;
                }
                ti += 1;
                pi += 1;
            }
        }
    }
    ti == txt.len()
}

fn match_class(pat: &[char], open: usize, txt: &[char], ti: usize) -> Option<(bool, usize)> {
    if ti >= txt.len() {
        return None;
    }
    let target = txt[ti];
    let mut i = open + 1;
    let negated = matches!(pat.get(i), Some('^') | Some('!'));
    if negated {
        i += 1;
    }
    let mut matched = false;
    let mut first = true;
    while i < pat.len() {
        let ch = pat[i];
        if ch == ']' && !first {
            return Some((matched != negated, i + 1));
        }
        first = false;
        if i + 2 < pat.len() && pat[i + 1] == '-' && pat[i + 2] != ']' {
            let (lo, hi) = (ch, pat[i + 2]);
            if lo <= target && target <= hi {
                matched = true;
            }
            i += 3;
        } else {
            if ch == target {
                matched = true;
            }
            i += 1;
        }
    }
    // Unterminated class.
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_runtime_config;

    #[test]
    fn double_star_spans_segments() {
        assert!(glob_match("**/node_modules/**", "a/b/node_modules/c"));
        assert!(glob_match("**/node_modules/**", "node_modules"));
        assert!(!glob_match("**/node_modules/**", "src/modules/c"));
    }

    #[test]
    fn single_segment_wildcards() {
        assert!(glob_match("**/*.map", "dist/app.js.map"));
        assert!(glob_match("src/?.ts", "src/a.ts"));
        assert!(!glob_match("src/?.ts", "src/ab.ts"));
        assert!(glob_match("log[0-9].txt", "log7.txt"));
        assert!(!glob_match("log[0-9].txt", "logx.txt"));
    }

    #[test]
    fn rules_hash_is_stable_and_sensitive() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let cfg = default_runtime_config();
        let profiles = vec!["ts_js".to_string()];

        let a = build_effective_rules(dir.path(), &profiles, &cfg).expect("rules");
        let b = build_effective_rules(dir.path(), &profiles, &cfg).expect("rules");
        assert_eq!(a.rules_hash, b.rules_hash);

        std::fs::create_dir_all(crate::store::dir(dir.path())).expect("mkdir");
        std::fs::write(crate::store::ignore_path(dir.path()), "extra/\n").expect("write");
        let c = build_effective_rules(dir.path(), &profiles, &cfg).expect("rules");
        assert_ne!(a.rules_hash, c.rules_hash);
        assert!(c.scan_ignore.contains(&"extra/".to_string()));
    }

    #[test]
    fn go_profile_contributes_include_exts_and_stop_words() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let cfg = default_runtime_config();
        let rules =
            build_effective_rules(dir.path(), &["go".to_string()], &cfg).expect("rules");
        assert!(rules.include_ext.contains(&".go".to_string()));
        assert!(rules.token_config.stop_words.contains(&"func".to_string()));
    }

    #[test]
    fn tokenize_override_replaces_and_appends() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        std::fs::create_dir_all(crate::store::dir(dir.path())).expect("mkdir");
        std::fs::write(
            crate::store::dir(dir.path()).join("tokenize.json"),
            r#"{"stop_words":{"mode":"replace","values":["foo"]},"min_token_len":2}"#,
        )
        .expect("write");

        let cfg = default_runtime_config();
        let rules =
            build_effective_rules(dir.path(), &["ts_js".to_string()], &cfg).expect("rules");
        assert_eq!(rules.token_config.stop_words, vec!["foo".to_string()]);
        assert_eq!(rules.token_config.min_token_len, 2);
    }
}
