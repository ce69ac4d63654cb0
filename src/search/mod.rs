// SPDX-License-Identifier: MIT OR Apache-2.0

//! TF-IDF retrieval with a bounded reranker and token-aware snippet
//! selection.

mod scope_go;

pub use scope_go::enrich_go_scopes;

use anyhow::Result;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

use crate::config::{self, Config};
use crate::index::{self, ChunkEntry, TermInfo};
use crate::profile;
use crate::store;
use crate::textutil;
use crate::tokenize::Tokenizer;

/// Controls search behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchOptions {
    pub top_k: usize,
    pub max_per_file: usize,
}

/// A ranked chunk.
#[derive(Debug, Clone, Serialize)]
pub struct SearchResult {
    pub chunk_id: u32,
    pub path: String,
    pub start_line: u32,
    pub end_line: u32,
    #[serde(skip_serializing_if = "is_zero")]
    pub match_line: u32,
    pub score: f64,
    pub snippet: String,
    pub why: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope_start_line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope_end_line: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope_name: Option<String>,
}

fn is_zero(value: &u32) -> bool {
    *value == 0
}

const RERANK_BAND_FACTOR: usize = 50;

/// Executes a keyword search over the serialized index.
pub fn search(root: &Path, q: &str, opts: SearchOptions) -> Result<Vec<SearchResult>> {
    let user_cfg = config::load_user_config(&store::config_path(root))?;
    let (mut cfg, profiles) = config::apply_overrides(config::default_runtime_config(), &user_cfg)?;
    let rules = profile::build_effective_rules(root, &profiles, &cfg)?;
    cfg.token = rules.token_config.clone();

    let chunks = index::load_chunk_entries(&store::chunks_path(root))?;
    let (terms, _) = index::load_terms(&store::terms_path(root))?;
    let postings = index::load_postings(&store::postings_path(root))?;

    search_with_index(Some(root), &cfg, &chunks, None, &terms, &postings, q, opts)
}

/// Executes a keyword search using provided index data. When `root` is
/// absent the rerank and snippet-enrichment passes (which read source
/// files) are skipped.
#[allow(clippy::too_many_arguments)]
pub fn search_with_index(
    root: Option<&Path>,
    cfg: &Config,
    chunks: &[ChunkEntry],
    chunk_map: Option<&HashMap<u32, ChunkEntry>>,
    terms: &HashMap<String, TermInfo>,
    postings: &[u32],
    q: &str,
    opts: SearchOptions,
) -> Result<Vec<SearchResult>> {
    let top_k = if opts.top_k == 0 {
        20
    } else {
        opts.top_k.min(20)
    };
    let max_per_file = if opts.max_per_file == 0 {
        2
    } else {
        opts.max_per_file
    };

    let tokenizer = Tokenizer::new(&cfg.token);
    let mut unique_terms = Vec::new();
    let mut seen = HashSet::new();
    for token in tokenizer.text(q) {
        if seen.insert(token.clone()) {
            unique_terms.push(token);
        }
    }
    if unique_terms.is_empty() || chunks.is_empty() {
        return Ok(Vec::new());
    }

    let owned_map;
    let chunk_map = match chunk_map {
        Some(map) => map,
        None => {
            owned_map = chunks
                .iter()
                .map(|ch| (ch.chunk_id, ch.clone()))
                .collect::<HashMap<_, _>>();
            &owned_map
        }
    };

    let total = chunks.len() as f64;
    let mut scores: HashMap<u32, f64> = HashMap::new();
    let mut why: HashMap<u32, Vec<String>> = HashMap::new();

    for term in &unique_terms {
        let Some(info) = terms.get(term) else {
            continue;
        };
        if info.df == 0 {
            continue;
        }
        let idf = (1.0 + total / f64::from(info.df)).ln();
        let start = (info.offset / 4) as usize;
        let end = start + info.df as usize;
        if end > postings.len() {
            return Err(crate::errors::RepodexError::IndexCorrupt(format!(
                "postings out of range for term {term}"
            ))
            .into());
        }
        for &chunk_id in &postings[start..end] {
            *scores.entry(chunk_id).or_insert(0.0) += idf;
            why.entry(chunk_id).or_default().push(term.clone());
        }
    }

    let mut results = Vec::with_capacity(scores.len());
    for (id, score) in scores {
        let Some(ch) = chunk_map.get(&id) else {
            return Err(
                crate::errors::RepodexError::IndexCorrupt(format!("missing chunk {id}")).into(),
            );
        };
        results.push(SearchResult {
            chunk_id: id,
            path: ch.path.clone(),
            start_line: ch.start_line,
            end_line: ch.end_line,
            match_line: 0,
            score,
            snippet: ch.snippet.clone(),
            why: why.remove(&id).unwrap_or_default(),
            scope_start_line: None,
            scope_end_line: None,
            scope_kind: None,
            scope_name: None,
        });
    }

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });

    if let Some(root) = root {
        rerank_top(root, &tokenizer, &mut results, &unique_terms, max_per_file, top_k);
    }

    let mut filtered = Vec::with_capacity(top_k);
    let mut per_file: HashMap<&str, usize> = HashMap::new();
    for result in &results {
        let count = per_file.entry(result.path.as_str()).or_insert(0);
        if *count >= max_per_file {
            continue;
        }
        *count += 1;
        filtered.push(result.clone());
        if filtered.len() >= top_k {
            break;
        }
    }

    if let Some(root) = root {
        enrich_snippets(
            root,
            &tokenizer,
            &mut filtered,
            &unique_terms,
            cfg.limits.max_snippet_bytes,
        );
    }

    Ok(filtered)
}

/// Rounds result scores to two decimal places for display.
pub fn round_scores(results: &mut [SearchResult]) {
    for result in results {
        result.score = (result.score * 100.0).round() / 100.0;
    }
}

fn load_lines<'a>(
    root: &Path,
    rel_path: &str,
    cache: &'a mut HashMap<String, Option<Vec<String>>>,
) -> Option<&'a [String]> {
    if !cache.contains_key(rel_path) {
        let abs = root.join(rel_path);
        let lines = std::fs::read(&abs).ok().map(|data| {
            let normalized = textutil::normalize_newlines_bytes(data);
            String::from_utf8_lossy(&normalized)
                .split('\n')
                .map(str::to_string)
                .collect::<Vec<String>>()
        });
        cache.insert(rel_path.to_string(), lines);
    }
    cache.get(rel_path).and_then(|v| v.as_deref())
}

fn clamp_range(start: u32, end: u32, line_count: usize) -> Option<(usize, usize)> {
    let start = start.max(1) as usize;
    let end = (end as usize).min(line_count);
    if start > end {
        return None;
    }
    Some((start, end))
}

fn enrich_snippets(
    root: &Path,
    tokenizer: &Tokenizer,
    results: &mut [SearchResult],
    terms: &[String],
    max_bytes: usize,
) {
    if results.is_empty() || terms.is_empty() {
        return;
    }
    let term_set: HashSet<&str> = terms.iter().map(|t| t.trim()).filter(|t| !t.is_empty()).collect();
    if term_set.is_empty() {
        return;
    }
    let mut cache: HashMap<String, Option<Vec<String>>> = HashMap::new();
    for result in results.iter_mut() {
        let Some(lines) = load_lines(root, &result.path, &mut cache) else {
            continue;
        };
        let lines = lines.to_vec();
        if result.match_line == 0 {
            result.match_line = find_best_match_line(
                &lines,
                result.start_line,
                result.end_line,
                &term_set,
                tokenizer,
            );
        }
        let snippet = extract_term_snippet(
            &lines,
            result.start_line,
            result.end_line,
            &term_set,
            max_bytes,
            tokenizer,
        );
        if !snippet.is_empty() {
            result.snippet = snippet;
        }
    }
}

fn line_coverage(line: &str, term_set: &HashSet<&str>, tokenizer: &Tokenizer) -> usize {
    let mut seen = HashSet::new();
    let mut coverage = 0;
    for token in tokenizer.text(line) {
        if term_set.contains(token.as_str()) && seen.insert(token) {
            coverage += 1;
        }
    }
    coverage
}

/// Picks the line with the most distinct query terms; ties go to the
/// earliest line. Returns 0 when no line matches.
fn find_best_match_line(
    lines: &[String],
    start: u32,
    end: u32,
    term_set: &HashSet<&str>,
    tokenizer: &Tokenizer,
) -> u32 {
    let Some((start, end)) = clamp_range(start, end, lines.len()) else {
        return 0;
    };
    let mut best_line = 0u32;
    let mut best_coverage = 0usize;
    for (idx, line) in lines.iter().enumerate().take(end).skip(start - 1) {
        if line.trim().is_empty() {
            continue;
        }
        let coverage = line_coverage(line, term_set, tokenizer);
        if coverage > best_coverage {
            best_coverage = coverage;
            best_line = (idx + 1) as u32;
        }
    }
    best_line
}

/// Token-aware snippet selection: a single line when it covers every query
/// term, otherwise up to three lines ordered by coverage then position.
fn extract_term_snippet(
    lines: &[String],
    start: u32,
    end: u32,
    term_set: &HashSet<&str>,
    max_bytes: usize,
    tokenizer: &Tokenizer,
) -> String {
    let Some((start, end)) = clamp_range(start, end, lines.len()) else {
        return String::new();
    };

    struct Candidate {
        idx: usize,
        coverage: usize,
    }
    let mut candidates = Vec::new();
    let mut best_coverage = 0usize;
    let mut best_idx: Option<usize> = None;

    for (idx, raw) in lines.iter().enumerate().take(end).skip(start - 1) {
        let line = raw.trim();
        if line.is_empty() {
            continue;
        }
        let coverage = line_coverage(line, term_set, tokenizer);
        if coverage == 0 {
            continue;
        }
        candidates.push(Candidate { idx, coverage });
        if coverage > best_coverage {
            best_coverage = coverage;
            best_idx = Some(idx);
        }
    }
    if candidates.is_empty() {
        return String::new();
    }

    let mut selected = Vec::with_capacity(3);
    if best_coverage == term_set.len() {
        if let Some(idx) = best_idx {
            selected.push(idx);
        }
    } else {
        candidates.sort_by(|a, b| {
            b.coverage
                .cmp(&a.coverage)
                .then_with(|| a.idx.cmp(&b.idx))
        });
        for candidate in &candidates {
            if selected.len() >= 3 {
                break;
            }
            if !selected.contains(&candidate.idx) {
                selected.push(candidate.idx);
            }
        }
    }

    let snippet = selected
        .iter()
        .map(|&idx| lines[idx].trim())
        .collect::<Vec<_>>()
        .join("\n");
    let truncated = crate::lang::truncate_utf8(snippet, max_bytes);
    truncated.trim_end_matches('\n').to_string()
}

#[derive(Debug, Default, Clone, Copy)]
struct RerankInfo {
    best_line_coverage: usize,
    chunk_coverage: usize,
    span_lines: u32,
    is_test: bool,
}

/// Stable second-pass ordering of the top band: score, best-line coverage,
/// chunk coverage, non-test before test, shorter span, chunk id.
fn rerank_top(
    root: &Path,
    tokenizer: &Tokenizer,
    results: &mut [SearchResult],
    terms: &[String],
    max_per_file: usize,
    top_k: usize,
) {
    if results.len() < 2 || terms.is_empty() {
        return;
    }
    let term_set: HashSet<&str> = terms.iter().map(|t| t.trim()).filter(|t| !t.is_empty()).collect();
    if term_set.is_empty() {
        return;
    }

    let mut limit = top_k
        .saturating_mul(max_per_file)
        .saturating_mul(RERANK_BAND_FACTOR);
    if limit == 0 || limit > results.len() {
        limit = results.len();
    }

    let mut cache: HashMap<String, Option<Vec<String>>> = HashMap::new();
    let mut info_by_id: HashMap<u32, RerankInfo> = HashMap::with_capacity(limit);

    for result in results.iter().take(limit) {
        let mut info = RerankInfo {
            span_lines: result.end_line.saturating_sub(result.start_line) + 1,
            is_test: result.path.ends_with("_test.go"),
            ..Default::default()
        };
        if let Some(lines) = load_lines(root, &result.path, &mut cache) {
            let (best_line, chunk_cov) = compute_chunk_match_stats(
                lines,
                result.start_line,
                result.end_line,
                &term_set,
                tokenizer,
            );
            info.best_line_coverage = best_line;
            info.chunk_coverage = chunk_cov;
        }
        info_by_id.insert(result.chunk_id, info);
    }

    results[..limit].sort_by(|a, b| {
        let ia = info_by_id.get(&a.chunk_id).copied().unwrap_or_default();
        let ib = info_by_id.get(&b.chunk_id).copied().unwrap_or_default();
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| ib.best_line_coverage.cmp(&ia.best_line_coverage))
            .then_with(|| ib.chunk_coverage.cmp(&ia.chunk_coverage))
            .then_with(|| ia.is_test.cmp(&ib.is_test))
            .then_with(|| ia.span_lines.cmp(&ib.span_lines))
            .then_with(|| a.chunk_id.cmp(&b.chunk_id))
    });
}

fn compute_chunk_match_stats(
    lines: &[String],
    start: u32,
    end: u32,
    term_set: &HashSet<&str>,
    tokenizer: &Tokenizer,
) -> (usize, usize) {
    let Some((start, end)) = clamp_range(start, end, lines.len()) else {
        return (0, 0);
    };
    let mut best_line = 0usize;
    let mut chunk_seen: HashSet<String> = HashSet::new();
    for line in lines.iter().take(end).skip(start - 1) {
        if line.trim().is_empty() {
            continue;
        }
        let mut line_cov = 0usize;
        let mut line_seen = HashSet::new();
        for token in tokenizer.text(line) {
            if term_set.contains(token.as_str()) && line_seen.insert(token.clone()) {
                line_cov += 1;
                chunk_seen.insert(token);
            }
        }
        best_line = best_line.max(line_cov);
    }
    (best_line, chunk_seen.len())
}
