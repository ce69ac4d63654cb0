// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ordered ignore matching: each matching pattern flips the decision, so a
//! later `!pattern` restores inclusion. Trailing-slash patterns mark
//! directory trees and are rewritten to `**/pattern/**`.

use crate::profile::glob_match;

#[derive(Debug, Clone)]
struct Pattern {
    value: String,
    negate: bool,
    dir_only: bool,
}

#[derive(Debug, Clone, Default)]
pub struct IgnoreMatcher {
    patterns: Vec<Pattern>,
}

impl IgnoreMatcher {
    pub fn new(patterns: &[String]) -> Self {
        let mut compiled = Vec::with_capacity(patterns.len());
        for raw in patterns {
            if raw.is_empty() {
                continue;
            }
            let negate = raw.starts_with('!');
            let value = raw.strip_prefix('!').unwrap_or(raw);
            let dir_only = value.ends_with('/');
            let mut normalized = value.trim_end_matches('/').to_string();
            if dir_only {
                if !normalized.starts_with("**/") {
                    normalized = format!("**/{normalized}");
                }
                if !normalized.ends_with("/**") {
                    normalized = format!("{normalized}/**");
                }
            }
            compiled.push(Pattern {
                value: normalized,
                negate,
                dir_only,
            });
        }
        Self { patterns: compiled }
    }

    /// Applies every pattern in order; the final decision wins.
    pub fn should_ignore(&self, path: &str, is_dir: bool) -> bool {
        let mut ignored = false;
        for pattern in &self.patterns {
            if pattern.matches(path, is_dir) {
                ignored = !pattern.negate;
            }
        }
        ignored
    }
}

impl Pattern {
    fn matches(&self, path: &str, is_dir: bool) -> bool {
        if glob_match(&self.value, path) {
            return true;
        }
        self.dir_only && is_dir && path == self.value
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matcher(patterns: &[&str]) -> IgnoreMatcher {
        let owned: Vec<String> = patterns.iter().map(|s| s.to_string()).collect();
        IgnoreMatcher::new(&owned)
    }

    #[test]
    fn trailing_slash_prunes_at_any_depth() {
        let m = matcher(&["node_modules/"]);
        assert!(m.should_ignore("node_modules", true));
        assert!(m.should_ignore("a/b/node_modules", true));
        assert!(m.should_ignore("a/node_modules/pkg/index.js", false));
        assert!(!m.should_ignore("src/index.js", false));
    }

    #[test]
    fn negation_restores_inclusion() {
        let m = matcher(&["dist/", "!dist/keep.js"]);
        assert!(m.should_ignore("dist/app.js", false));
        assert!(!m.should_ignore("dist/keep.js", false));
    }

    #[test]
    fn later_patterns_win() {
        let m = matcher(&["!logs/special.log", "logs/"]);
        // The un-ignore precedes the ignore, so the ignore wins.
        assert!(m.should_ignore("logs/special.log", false));
    }

    #[test]
    fn plain_glob_patterns_match_files() {
        let m = matcher(&["**/*.map", "package-lock.json"]);
        assert!(m.should_ignore("dist/main.js.map", false));
        assert!(m.should_ignore("package-lock.json", false));
        assert!(!m.should_ignore("nested/package-lock.json", false));
    }
}
