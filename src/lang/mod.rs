// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-language chunk boundary detection.
//!
//! Language handling is a closed enum dispatched by file extension. Each
//! language contributes a boundary classifier; the block machinery (depth
//! tracking, min-chunk merging, max-line splitting, snippets) is shared.

mod golang;
mod ts;

use anyhow::Result;

use crate::config::{ChunkingConfig, LimitsConfig};
use crate::textutil;

/// A chunk produced during language-specific chunking. Line numbers are
/// 1-based and inclusive.
#[derive(Debug, Clone)]
pub struct ChunkDraft {
    pub start_line: u32,
    pub end_line: u32,
    pub snippet: String,
}

/// Language dispatch for chunking. `Plain` covers indexable files with no
/// dedicated chunker and treats the whole file as one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LanguagePlugin {
    Ts,
    Go,
    Plain,
}

impl LanguagePlugin {
    pub fn for_path(path: &str) -> Self {
        let lower = path.to_lowercase();
        let ext = lower.rsplit('.').next().unwrap_or("");
        match ext {
            "ts" | "tsx" | "js" | "jsx" | "mjs" | "cjs" => Self::Ts,
            "go" => Self::Go,
            _ => Self::Plain,
        }
    }

    pub fn id(&self) -> &'static str {
        match self {
            Self::Ts => "ts",
            Self::Go => "go",
            Self::Plain => "plain",
        }
    }

    /// Splits a file into chunk drafts.
    pub fn chunk_file(
        &self,
        content: &[u8],
        cfg: &ChunkingConfig,
        limits: &LimitsConfig,
    ) -> Result<Vec<ChunkDraft>> {
        let normalized = textutil::normalize_newlines_str(&String::from_utf8_lossy(content));
        let lines: Vec<&str> = normalized.split('\n').collect();

        let mut blocks = match self {
            Self::Ts => collect_blocks(&lines, ts::classify_boundary),
            Self::Go => collect_blocks(&lines, golang::classify_boundary),
            Self::Plain => Vec::new(),
        };
        trim_trailing_blanks(&mut blocks, &lines);
        if blocks.is_empty() && !lines.is_empty() {
            blocks = vec![Block {
                start: 1,
                end: lines.len() as u32,
            }];
        }
        let blocks = enforce_min_lines(blocks, cfg.min_chunk_lines);

        let mut drafts = Vec::new();
        for block in blocks {
            for chunk in split_block(block, cfg.max_lines, cfg.overlap_lines) {
                let snippet =
                    build_snippet(&lines, chunk.start, chunk.end, limits.max_snippet_bytes);
                drafts.push(ChunkDraft {
                    start_line: chunk.start,
                    end_line: chunk.end,
                    snippet,
                });
            }
        }
        Ok(drafts)
    }
}

/// A contiguous top-level block, 1-based inclusive.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Block {
    pub start: u32,
    pub end: u32,
}

/// Boundary kind; `Import` and `ConstVar` runs coalesce into one block,
/// every other declaration starts a fresh block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Trigger {
    Import,
    ConstVar,
    Decl,
}

pub(crate) fn collect_blocks(
    lines: &[&str],
    classify: impl Fn(&str) -> Option<Trigger>,
) -> Vec<Block> {
    let mut blocks: Vec<Block> = Vec::new();
    let mut tracker = DepthTracker::default();
    let mut current_kind: Option<Trigger> = None;
    let mut current: Option<usize> = None;

    for (i, raw) in lines.iter().enumerate() {
        let line_num = (i + 1) as u32;
        let top_level = tracker.at_top_level();
        let trimmed = raw.trim();

        if top_level {
            match classify(trimmed) {
                Some(trigger) => {
                    let coalesce = matches!(trigger, Trigger::Import | Trigger::ConstVar)
                        && current_kind == Some(trigger)
                        && current.is_some();
                    if coalesce {
                        blocks[current.unwrap()].end = line_num;
                    } else {
                        blocks.push(Block {
                            start: line_num,
                            end: line_num,
                        });
                        current = Some(blocks.len() - 1);
                        current_kind = Some(trigger);
                    }
                }
                None => {
                    if let Some(idx) = current {
                        blocks[idx].end = line_num;
                    }
                }
            }
        } else if let Some(idx) = current {
            blocks[idx].end = line_num;
        }

        tracker.update(raw);
    }
    blocks
}

/// Tracks brace/paren depth and block-comment state across lines. String
/// and line-comment state reset per line; block comments span lines.
#[derive(Debug, Default)]
pub(crate) struct DepthTracker {
    brace_depth: i32,
    paren_depth: i32,
    in_block_comment: bool,
}

impl DepthTracker {
    pub(crate) fn at_top_level(&self) -> bool {
        self.brace_depth == 0 && self.paren_depth == 0 && !self.in_block_comment
    }

    pub(crate) fn update(&mut self, line: &str) {
        let chars: Vec<char> = line.chars().collect();
        let mut in_string = false;
        let mut string_delim = '\0';
        let mut i = 0;

        while i < chars.len() {
            let ch = chars[i];

            if self.in_block_comment {
                if ch == '*' && chars.get(i + 1) == Some(&'/') {
                    self.in_block_comment = false;
                    i += 1;
                }
                i += 1;
                continue;
            }

            if !in_string && ch == '/' {
                match chars.get(i + 1) {
                    Some('/') => break,
                    Some('*') => {
                        self.in_block_comment = true;
                        i += 2;
                        continue;
                    }
                    _ => {}
                }
            }

            if ch == '"' || ch == '\'' || ch == '`' {
                if in_string && ch == string_delim {
                    in_string = false;
                } else if !in_string {
                    in_string = true;
                    string_delim = ch;
                }
                i += 1;
                continue;
            }

            if in_string {
                i += 1;
                continue;
            }

            match ch {
                '{' => self.brace_depth += 1,
                '}' => {
                    if self.brace_depth > 0 {
                        self.brace_depth -= 1;
                    }
                }
                '(' => self.paren_depth += 1,
                ')' => {
                    if self.paren_depth > 0 {
                        self.paren_depth -= 1;
                    }
                }
                _ => {}
            }
            i += 1;
        }
    }
}

/// Drops blank lines absorbed at the tail of each block so ranges end on
/// content. Blocks always start on a boundary line, so `start` is safe.
pub(crate) fn trim_trailing_blanks(blocks: &mut [Block], lines: &[&str]) {
    for block in blocks.iter_mut() {
        while block.end > block.start {
            let idx = (block.end - 1) as usize;
            match lines.get(idx) {
                Some(line) if line.trim().is_empty() => block.end -= 1,
                _ => break,
            }
        }
    }
}

/// Fuses consecutive blocks left to right until each reaches the minimum
/// line count or the list is exhausted.
pub(crate) fn enforce_min_lines(blocks: Vec<Block>, min_lines: u32) -> Vec<Block> {
    if blocks.is_empty() {
        return blocks;
    }
    let mut merged = Vec::new();
    let mut i = 0;
    while i < blocks.len() {
        let mut acc = blocks[i];
        let mut length = acc.end - acc.start + 1;
        let mut j = i + 1;
        while length < min_lines && j < blocks.len() {
            acc.end = blocks[j].end;
            length = acc.end - acc.start + 1;
            j += 1;
        }
        merged.push(acc);
        i = j;
    }
    merged
}

/// Splits an oversized block into `max_lines`-sized chunks; each next chunk
/// starts `overlap` lines before the previous end, always strictly
/// advancing.
pub(crate) fn split_block(block: Block, max_lines: u32, overlap: u32) -> Vec<Block> {
    if max_lines == 0 || block.end <= block.start {
        return vec![block];
    }
    let mut chunks = Vec::new();
    let mut start = block.start;
    loop {
        let end = (start + max_lines - 1).min(block.end);
        chunks.push(Block { start, end });
        if end == block.end {
            break;
        }
        let next_start = (end + 1).saturating_sub(overlap);
        start = if next_start <= start { end + 1 } else { next_start };
    }
    chunks
}

/// Picks up to three non-blank trimmed lines from the chunk, joined with
/// `\n` and truncated to `max_bytes` on a UTF-8 boundary.
pub(crate) fn build_snippet(lines: &[&str], start: u32, end: u32, max_bytes: usize) -> String {
    let mut picked = Vec::new();
    let mut i = start.saturating_sub(1) as usize;
    while i < end as usize && i < lines.len() && picked.len() < 3 {
        let line = lines[i].trim();
        if !line.is_empty() {
            picked.push(line);
        }
        i += 1;
    }
    truncate_utf8(picked.join("\n"), max_bytes)
}

/// Truncates to at most `max_bytes`, backing off to a valid UTF-8 boundary.
pub(crate) fn truncate_utf8(mut s: String, max_bytes: usize) -> String {
    if max_bytes == 0 || s.len() <= max_bytes {
        return s;
    }
    let mut cut = max_bytes;
    while cut > 0 && !s.is_char_boundary(cut) {
        cut -= 1;
    }
    s.truncate(cut);
    s
}
