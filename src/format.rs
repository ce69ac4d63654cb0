// SPDX-License-Identifier: MIT OR Apache-2.0

//! Search output rendering: grouped (by why-term) and compact per-path
//! forms, plus the color policy shared by all textual output.

use colored::Colorize;
use std::collections::HashMap;
use std::io::{self, IsTerminal, Write};

use crate::search::SearchResult;

/// When ANSI output should be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ColorMode {
    #[default]
    Auto,
    Always,
    Never,
}

/// Resolved color behavior.
#[derive(Debug, Clone, Copy, Default)]
pub struct ColorPolicy {
    pub enabled: bool,
}

/// Decides whether ANSI output is enabled and forces the `colored` crate
/// override accordingly (so `always` survives piped output).
pub fn resolve_color_policy(mode: ColorMode, no_format: bool, json_out: bool) -> ColorPolicy {
    let no_color = std::env::var_os("NO_COLOR").is_some();
    let term_dumb = std::env::var("TERM").map(|t| t == "dumb").unwrap_or(false);
    if no_color || no_format || json_out {
        return ColorPolicy { enabled: false };
    }
    let enabled = match mode {
        ColorMode::Never => false,
        ColorMode::Always => true,
        ColorMode::Auto => io::stdout().is_terminal() && !term_dumb,
    };
    if enabled {
        colored::control::set_override(true);
    }
    ColorPolicy { enabled }
}

/// Controls search output formatting.
#[derive(Debug, Clone, Default)]
pub struct SearchFormatOptions {
    pub no_format: bool,
    pub with_score: bool,
    pub explain: bool,
    pub scope: bool,
    pub color: ColorPolicy,
    pub query_terms: Vec<String>,
}

struct Group<'a> {
    file_order: Vec<&'a str>,
    files: HashMap<&'a str, Vec<&'a SearchResult>>,
}

/// Writes grouped output: one `>why=<term>` section per query term, with
/// `-<path>` file headers and `@id:start-end!bytes` hit lines.
pub fn write_search_grouped<W: Write>(
    w: &mut W,
    results: &[SearchResult],
    opt: &SearchFormatOptions,
) -> io::Result<()> {
    let mut groups: HashMap<&str, Group<'_>> = HashMap::new();
    let mut group_order: Vec<&str> = Vec::new();

    for result in results {
        let tags: Vec<&str> = if result.why.is_empty() {
            vec!["none"]
        } else {
            result.why.iter().map(String::as_str).collect()
        };
        for tag in tags {
            if !groups.contains_key(tag) {
                group_order.push(tag);
                groups.insert(
                    tag,
                    Group {
                        file_order: Vec::new(),
                        files: HashMap::new(),
                    },
                );
            }
            let group = groups.get_mut(tag).expect("group just ensured");
            if !group.files.contains_key(result.path.as_str()) {
                group.file_order.push(&result.path);
            }
            group.files.entry(&result.path).or_default().push(result);
        }
    }

    for tag in group_order {
        let group = &groups[tag];
        writeln!(w, ">why={tag}")?;
        for path in &group.file_order {
            writeln!(w, "-{path}")?;
            for hit in &group.files[path] {
                write_hit(w, hit, opt)?;
            }
        }
    }
    Ok(())
}

fn write_hit<W: Write>(w: &mut W, hit: &SearchResult, opt: &SearchFormatOptions) -> io::Result<()> {
    let trimmed: Vec<&str> = hit
        .snippet
        .split('\n')
        .map(|line| line.trim_start_matches([' ', '\t']))
        .collect();
    let byte_count = trimmed.join("\n").len();
    let prefix = if opt.no_format { "" } else { " " };
    if opt.with_score {
        writeln!(
            w,
            "{prefix}@{}:{}-{}!{}~{:.2}",
            hit.chunk_id, hit.start_line, hit.end_line, byte_count, hit.score
        )?;
    } else {
        writeln!(
            w,
            "{prefix}@{}:{}-{}!{}",
            hit.chunk_id, hit.start_line, hit.end_line, byte_count
        )?;
    }
    for line in trimmed {
        if opt.no_format {
            writeln!(w, "{}", escape_no_format_line(line))?;
        } else {
            writeln!(w, "  {line}")?;
        }
    }
    Ok(())
}

/// Writes compact output: a `-path` header per file followed by one
/// gutter-prefixed snippet line per hit.
pub fn write_search_compact<W: Write>(
    w: &mut W,
    results: &[SearchResult],
    opt: &SearchFormatOptions,
) -> io::Result<()> {
    if results.is_empty() {
        return Ok(());
    }

    let mut width = 1;
    if !opt.scope {
        let max_line = results
            .iter()
            .map(|hit| display_line(hit))
            .max()
            .unwrap_or(0);
        if max_line > 0 {
            width = max_line.to_string().len();
        }
    }

    let color = opt.color.enabled && !opt.no_format;
    let mut last_path = "";
    for hit in results {
        let is_test = hit.path.ends_with("_test.go");
        if hit.path != last_path {
            let path_line = format!("-{}", hit.path);
            let rendered = if color {
                if is_test {
                    path_line.cyan().dimmed().to_string()
                } else {
                    path_line.cyan().bold().to_string()
                }
            } else {
                path_line
            };
            writeln!(w, "{rendered}")?;
            last_path = &hit.path;
        }

        let line = display_line(hit);
        let mut code_line = hit.snippet.split('\n').next().unwrap_or("");
        code_line = code_line.trim_start_matches([' ', '\t']);
        let is_def = code_line.starts_with("func ");
        let is_scope_def = opt.scope
            && hit.scope_start_line.map(|s| s == line).unwrap_or(false)
            && is_def;
        let mut rendered = if opt.no_format {
            escape_no_format_line(code_line)
        } else {
            code_line.to_string()
        };
        if color {
            let terms: Vec<&str> = if opt.query_terms.is_empty() {
                hit.why.iter().map(String::as_str).collect()
            } else {
                opt.query_terms.iter().map(String::as_str).collect()
            };
            rendered = highlight_terms(&rendered, &terms);
            if if opt.scope { is_scope_def } else { is_def } {
                rendered = rendered.green().to_string();
            } else if is_test {
                rendered = rendered.dimmed().to_string();
            }
        }

        if opt.scope {
            let token = match (hit.scope_start_line, hit.scope_end_line) {
                (Some(start), Some(end)) if is_scope_def => format!("{start}-{end}:"),
                (Some(start), Some(end)) => format!("{start}-{end}@{line}:"),
                _ => format!("{line}:"),
            };
            let token = if color {
                token.dimmed().to_string()
            } else {
                token
            };
            writeln!(w, "{token} {rendered}")?;
        } else {
            let gutter = format!("[{line:>width$}]");
            let gutter = if color {
                gutter.dimmed().to_string()
            } else {
                gutter
            };
            writeln!(w, "{gutter} {rendered}")?;
        }
    }
    Ok(())
}

fn display_line(hit: &SearchResult) -> u32 {
    if hit.match_line > 0 {
        hit.match_line
    } else {
        hit.start_line
    }
}

/// Escapes leading structural markers so `--no-format` output stays
/// machine-splittable.
fn escape_no_format_line(line: &str) -> String {
    match line.chars().next() {
        Some('>') | Some('-') | Some('@') | Some('\\') => format!("\\{line}"),
        _ => line.to_string(),
    }
}

/// Underlines case-insensitive occurrences of the query terms.
fn highlight_terms(line: &str, terms: &[&str]) -> String {
    let mut out = line.to_string();
    for term in terms {
        if term.is_empty() {
            continue;
        }
        let lower_out = out.to_lowercase();
        // Lowercasing can change byte lengths outside ASCII; skip
        // highlighting rather than slice on a stale index.
        if lower_out.len() != out.len() {
            return out;
        }
        let lower_term = term.to_lowercase();
        let mut highlighted = String::with_capacity(out.len());
        let mut cursor = 0;
        let mut search_from = 0;
        while let Some(found) = lower_out[search_from..].find(&lower_term) {
            let at = search_from + found;
            highlighted.push_str(&out[cursor..at]);
            highlighted.push_str(&out[at..at + term.len()].underline().to_string());
            cursor = at + term.len();
            search_from = cursor;
            if search_from >= lower_out.len() {
                break;
            }
        }
        highlighted.push_str(&out[cursor..]);
        out = highlighted;
    }
    out
}
