// SPDX-License-Identifier: MIT OR Apache-2.0

//! Deterministic tokenization for code, identifiers, and paths.
//!
//! The tokenizer normalizes tokens, enforces length limits, removes stop
//! words, and guarantees uniqueness plus sorted order. For identical input
//! and config the output is byte-identical across runs and platforms.

use std::collections::{BTreeSet, HashSet};

use crate::config::TokenizationConfig;

/// Carries string-literal scanning state across calls.
///
/// Template literals span lines, so the delimiter and the one-shot escape
/// bit must survive from one line to the next.
#[derive(Debug, Clone, Copy, Default)]
pub struct StringScanState {
    pub in_string: bool,
    pub delim: char,
    pub escaped: bool,
}

pub struct Tokenizer {
    cfg: TokenizationConfig,
    stop_words: HashSet<String>,
    allow_short: HashSet<String>,
}

impl Tokenizer {
    pub fn new(cfg: &TokenizationConfig) -> Self {
        let stop_words = cfg.stop_words.iter().map(|w| w.to_lowercase()).collect();
        let allow_short = cfg
            .allow_short_tokens
            .iter()
            .map(|w| w.to_lowercase())
            .collect();
        Self {
            cfg: cfg.clone(),
            stop_words,
            allow_short,
        }
    }

    /// Tokenizes chunk text and path together, returning the sorted union.
    pub fn with_path(&self, path: &str, chunk_text: &str) -> Vec<String> {
        let mut set: BTreeSet<String> = self.text(chunk_text).into_iter().collect();
        set.extend(self.path(path));
        set.into_iter().collect()
    }

    /// Tokenizes text according to the tokenizer configuration.
    pub fn text(&self, text: &str) -> Vec<String> {
        let raw = self.scan(text, self.cfg.tokenize_string_literals);
        self.normalize(raw)
    }

    /// Tokenizes text while carrying string-literal state across calls when
    /// string-literal indexing is disabled. With literals enabled this is
    /// just [`Tokenizer::text`].
    pub fn text_with_state(&self, text: &str, st: &mut StringScanState) -> Vec<String> {
        if self.cfg.tokenize_string_literals {
            return self.text(text);
        }
        let mut tokens = Vec::new();
        let mut buf = String::new();
        for r in text.chars() {
            if st.in_string {
                if st.escaped {
                    st.escaped = false;
                    continue;
                }
                if r == '\\' {
                    st.escaped = true;
                    continue;
                }
                if r == st.delim {
                    st.in_string = false;
                }
                continue;
            }
            match r {
                '\'' | '"' | '`' => {
                    flush(&mut buf, &mut tokens);
                    st.in_string = true;
                    st.delim = r;
                    st.escaped = false;
                }
                _ if r.is_alphabetic() || r.is_numeric() => buf.push(r),
                _ => flush(&mut buf, &mut tokens),
            }
        }
        flush(&mut buf, &mut tokens);
        self.normalize(expand_tokens(tokens))
    }

    /// Tokenizes a path, stripping known suffixes and the final extension
    /// before applying the same normalization rules as [`Tokenizer::text`].
    pub fn path(&self, path: &str) -> Vec<String> {
        let mut clean = path.replace('\\', "/");
        let base = clean.rsplit('/').next().unwrap_or("").to_string();
        let lower_base = base.to_lowercase();
        let mut stripped_base = base.clone();
        for suffix in &self.cfg.path_strip_suffixes {
            let lower_suffix = suffix.to_lowercase();
            if lower_base.ends_with(&lower_suffix) && base.len() > suffix.len() {
                stripped_base = base[..base.len() - suffix.len()].to_string();
                clean.truncate(clean.len() - base.len());
                clean.push_str(&stripped_base);
                break;
            }
        }
        if let Some(ext) = final_extension(&stripped_base) {
            if stripped_base.len() > ext.len() {
                clean.truncate(clean.len() - ext.len());
            }
        }
        let raw = self.scan(&clean, true);
        self.normalize(raw)
    }

    fn scan(&self, text: &str, include_strings: bool) -> Vec<String> {
        let mut tokens = Vec::new();
        let mut buf = String::new();

        if !include_strings {
            let mut st = StringScanState::default();
            for r in text.chars() {
                if st.escaped {
                    st.escaped = false;
                    continue;
                }
                if st.in_string {
                    if r == '\\' {
                        st.escaped = true;
                        continue;
                    }
                    if r == st.delim {
                        st.in_string = false;
                    }
                    continue;
                }
                match r {
                    '\'' | '"' | '`' => {
                        flush(&mut buf, &mut tokens);
                        st.in_string = true;
                        st.delim = r;
                    }
                    _ if r.is_alphabetic() || r.is_numeric() => buf.push(r),
                    _ => flush(&mut buf, &mut tokens),
                }
            }
            flush(&mut buf, &mut tokens);
            return expand_tokens(tokens);
        }

        for r in text.chars() {
            if r.is_alphabetic() || r.is_numeric() {
                buf.push(r);
            } else {
                flush(&mut buf, &mut tokens);
            }
        }
        flush(&mut buf, &mut tokens);
        expand_tokens(tokens)
    }

    fn normalize(&self, tokens: Vec<String>) -> Vec<String> {
        let mut unique = BTreeSet::new();
        for tok in tokens {
            let lower = tok.to_lowercase();
            if lower.is_empty() || self.stop_words.contains(&lower) {
                continue;
            }
            let length = lower.chars().count();
            if length > self.cfg.max_token_len {
                continue;
            }
            if length < self.cfg.min_token_len && !self.allow_short.contains(&lower) {
                continue;
            }
            if is_numeric(&lower) {
                continue;
            }
            if self.cfg.drop_hex_len > 0 && length >= self.cfg.drop_hex_len && is_hex(&lower) {
                continue;
            }
            unique.insert(lower);
        }
        unique.into_iter().collect()
    }
}

fn flush(buf: &mut String, tokens: &mut Vec<String>) {
    if !buf.is_empty() {
        tokens.push(std::mem::take(buf));
    }
}

fn expand_tokens(tokens: Vec<String>) -> Vec<String> {
    let mut expanded = Vec::new();
    for tok in tokens {
        expanded.extend(split_identifier(&tok));
    }
    expanded
}

/// Splits an identifier run at underscore boundaries (removed during
/// scanning), digit/letter transitions, lower-to-upper transitions, and
/// upper runs followed by a lowercase char (`HTTPRequest` -> `HTTP`,
/// `Request`).
fn split_identifier(tok: &str) -> Vec<String> {
    let runes: Vec<char> = tok.chars().collect();
    if runes.is_empty() {
        return Vec::new();
    }
    let mut parts = Vec::new();
    let mut start = 0;
    for i in 1..runes.len() {
        let prev = runes[i - 1];
        let curr = runes[i];
        let next_lower = i + 1 < runes.len() && runes[i + 1].is_lowercase();

        let boundary = prev.is_numeric() != curr.is_numeric()
            || (prev.is_lowercase() && curr.is_uppercase())
            || (prev.is_uppercase() && curr.is_uppercase() && next_lower);
        if boundary {
            parts.push(runes[start..i].iter().collect());
            start = i;
        }
    }
    if start < runes.len() {
        parts.push(runes[start..].iter().collect());
    }
    parts
}

fn final_extension(base: &str) -> Option<&str> {
    base.rfind('.').map(|idx| &base[idx..])
}

fn is_numeric(tok: &str) -> bool {
    !tok.is_empty() && tok.chars().all(|r| r.is_numeric())
}

fn is_hex(tok: &str) -> bool {
    !tok.is_empty() && tok.chars().all(|r| r.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_runtime_config;

    fn tokenizer() -> Tokenizer {
        Tokenizer::new(&default_runtime_config().token)
    }

    fn no_literals_tokenizer() -> Tokenizer {
        let mut cfg = default_runtime_config().token;
        cfg.tokenize_string_literals = false;
        Tokenizer::new(&cfg)
    }

    #[test]
    fn splits_camel_case_and_acronyms() {
        let tokens = tokenizer().text("HTTPRequestHandler parseURL");
        assert_eq!(tokens, vec!["handler", "http", "parse", "request", "url"]);
    }

    #[test]
    fn splits_digit_letter_transitions() {
        let tokens = tokenizer().text("sha256sum");
        assert_eq!(tokens, vec!["sha", "sum"]);
    }

    #[test]
    fn output_is_sorted_unique_and_idempotent() {
        let tok = tokenizer();
        let first = tok.text("beta Alpha beta gamma Alpha");
        let mut sorted = first.clone();
        sorted.sort();
        sorted.dedup();
        assert_eq!(first, sorted);

        let again = tok.text(&first.join(" "));
        assert_eq!(again, first);
    }

    #[test]
    fn drops_stop_words_numbers_and_long_hex() {
        let tokens = tokenizer().text("const value 12345 deadbeefdeadbeef1");
        assert_eq!(tokens, vec!["value"]);
    }

    #[test]
    fn short_tokens_pass_only_when_allowed() {
        let tokens = tokenizer().text("ui ab api");
        assert_eq!(tokens, vec!["api", "ui"]);
    }

    #[test]
    fn string_literals_are_skipped_when_disabled() {
        let tokens = no_literals_tokenizer().text("callFn(\"hiddenWord\", visible)");
        assert!(!tokens.contains(&"hidden".to_string()));
        assert!(tokens.contains(&"visible".to_string()));
    }

    #[test]
    fn escaped_delimiters_do_not_terminate_strings() {
        let tokens = no_literals_tokenizer().text(r#"take("a\"stillHidden", shown)"#);
        assert!(!tokens.contains(&"still".to_string()));
        assert!(tokens.contains(&"shown".to_string()));
    }

    #[test]
    fn template_literal_state_carries_across_lines() {
        let tok = no_literals_tokenizer();
        let mut st = StringScanState::default();
        let first = tok.text_with_state("const msg = `start", &mut st);
        assert!(st.in_string);
        assert!(!first.contains(&"start".to_string()));
        let second = tok.text_with_state("middleWord` tail", &mut st);
        assert!(!st.in_string);
        assert!(!second.contains(&"middle".to_string()));
        assert!(second.contains(&"tail".to_string()));
    }

    #[test]
    fn escape_state_carries_across_lines() {
        let tok = no_literals_tokenizer();
        let mut st = StringScanState::default();
        tok.text_with_state("const s = \"abc\\", &mut st);
        assert!(st.in_string);
        assert!(st.escaped);
        // The leading quote on the next line is consumed by the escape.
        let tokens = tok.text_with_state("\"inner\" outside", &mut st);
        assert!(!tokens.contains(&"inner".to_string()));
    }

    #[test]
    fn path_tokens_strip_declaration_suffixes() {
        let tokens = tokenizer().path("src/models/userProfile.d.ts");
        assert!(tokens.contains(&"user".to_string()));
        assert!(tokens.contains(&"profile".to_string()));
        assert!(tokens.contains(&"src".to_string()));
        assert!(!tokens.contains(&"ts".to_string()));
    }

    #[test]
    fn path_tokens_strip_final_extension() {
        let tokens = tokenizer().path("pkg/scanWalker.go");
        assert!(tokens.contains(&"scan".to_string()));
        assert!(tokens.contains(&"walker".to_string()));
        assert!(!tokens.contains(&"go".to_string()));
    }
}
