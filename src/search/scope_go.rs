// SPDX-License-Identifier: MIT OR Apache-2.0

//! Line-range discovery of Go function scopes.
//!
//! Scans for top-level `func` declarations and tracks brace depth until
//! the body closes. This intentionally stops at line ranges; there is no
//! deeper syntax analysis.

use std::collections::HashMap;
use std::path::Path;

use crate::lang::DepthTracker;
use crate::textutil;

use super::SearchResult;

#[derive(Debug, Clone)]
struct FuncScope {
    start: u32,
    end: u32,
    name: String,
}

/// Attaches the smallest enclosing function scope to each `.go` result.
pub fn enrich_go_scopes(root: &Path, results: &mut [SearchResult]) {
    if results.is_empty() {
        return;
    }
    let mut cache: HashMap<String, Vec<FuncScope>> = HashMap::new();
    for result in results.iter_mut() {
        if !result.path.ends_with(".go") {
            continue;
        }
        let scopes = cache
            .entry(result.path.clone())
            .or_insert_with(|| parse_go_func_scopes(root, &result.path));
        if scopes.is_empty() {
            continue;
        }
        let line = if result.match_line > 0 {
            result.match_line
        } else {
            result.start_line
        };
        if line == 0 {
            continue;
        }
        let best = scopes
            .iter()
            .filter(|scope| scope.start <= line && line <= scope.end)
            .min_by_key(|scope| scope.end - scope.start);
        if let Some(best) = best {
            result.scope_start_line = Some(best.start);
            result.scope_end_line = Some(best.end);
            result.scope_kind = Some("func".to_string());
            result.scope_name = Some(best.name.clone());
        }
    }
}

fn parse_go_func_scopes(root: &Path, rel_path: &str) -> Vec<FuncScope> {
    let Ok(data) = std::fs::read(root.join(rel_path)) else {
        return Vec::new();
    };
    let normalized = textutil::normalize_newlines_bytes(data);
    let text = String::from_utf8_lossy(&normalized);
    let lines: Vec<&str> = text.split('\n').collect();

    let mut scopes = Vec::new();
    let mut tracker = DepthTracker::default();
    let mut current: Option<(u32, String)> = None;

    for (i, raw) in lines.iter().enumerate() {
        let line_num = (i + 1) as u32;
        let trimmed = raw.trim();
        if current.is_none() && tracker.at_top_level() && is_func_decl(trimmed) {
            current = Some((line_num, parse_func_name(trimmed)));
        }
        tracker.update(raw);
        if let Some((start, name)) = current.take() {
            if tracker.at_top_level() {
                scopes.push(FuncScope {
                    start,
                    end: line_num,
                    name,
                });
            } else {
                current = Some((start, name));
            }
        }
    }

    scopes.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.end.cmp(&b.end)));
    scopes
}

fn is_func_decl(trimmed: &str) -> bool {
    trimmed
        .strip_prefix("func")
        .map(|rest| matches!(rest.chars().next(), Some(' ') | Some('(')))
        .unwrap_or(false)
}

/// Extracts the declared name, skipping an optional method receiver.
fn parse_func_name(trimmed: &str) -> String {
    let rest = trimmed.strip_prefix("func").unwrap_or(trimmed).trim_start();
    let rest = if let Some(after_paren) = rest.strip_prefix('(') {
        match after_paren.find(')') {
            Some(idx) => after_paren[idx + 1..].trim_start(),
            None => return String::new(),
        }
    } else {
        rest
    };
    rest.chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_')
        .collect()
}
