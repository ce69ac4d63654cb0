// SPDX-License-Identifier: MIT OR Apache-2.0

//! Go boundary classification for the shared block collector.

use super::Trigger;

/// Classifies a trimmed top-level line as a Go block boundary. Grouped
/// forms (`import (`, `const (`, ...) count the same as their single-line
/// variants.
pub(super) fn classify_boundary(trimmed: &str) -> Option<Trigger> {
    let lowered = trimmed.to_lowercase();
    if starts_with_keyword(&lowered, "import") {
        return Some(Trigger::Import);
    }
    if starts_with_keyword(&lowered, "const") || starts_with_keyword(&lowered, "var") {
        return Some(Trigger::ConstVar);
    }
    if starts_with_keyword(&lowered, "package")
        || starts_with_keyword(&lowered, "type")
        || starts_with_keyword(&lowered, "func")
    {
        return Some(Trigger::Decl);
    }
    None
}

fn starts_with_keyword(lowered: &str, keyword: &str) -> bool {
    let Some(rest) = lowered.strip_prefix(keyword) else {
        return false;
    };
    matches!(rest.chars().next(), Some(' ') | Some('('))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::default_runtime_config;
    use crate::lang::LanguagePlugin;

    #[test]
    fn recognizes_go_declarations() {
        assert_eq!(classify_boundary("package main"), Some(Trigger::Decl));
        assert_eq!(classify_boundary("import ("), Some(Trigger::Import));
        assert_eq!(classify_boundary("const ("), Some(Trigger::ConstVar));
        assert_eq!(classify_boundary("var x = 1"), Some(Trigger::ConstVar));
        assert_eq!(classify_boundary("type block struct {"), Some(Trigger::Decl));
        assert_eq!(classify_boundary("func (p TSPlugin) ID() string {"), Some(Trigger::Decl));
        assert_eq!(classify_boundary("funcs := map[string]int{}"), None);
    }

    #[test]
    fn grouped_imports_span_their_paren_block() {
        let content = "package main\n\nimport (\n\t\"fmt\"\n\t\"os\"\n)\n\nfunc main() {\n\tfmt.Println(os.Args)\n}\n";
        let cfg = crate::config::ChunkingConfig {
            max_lines: 50,
            overlap_lines: 5,
            min_chunk_lines: 1,
        };
        let limits = default_runtime_config().limits;
        let drafts = LanguagePlugin::Go
            .chunk_file(content.as_bytes(), &cfg, &limits)
            .expect("chunk");
        let ranges: Vec<(u32, u32)> = drafts.iter().map(|d| (d.start_line, d.end_line)).collect();
        assert_eq!(ranges, vec![(1, 1), (3, 6), (8, 10)]);
    }
}
