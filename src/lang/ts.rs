// SPDX-License-Identifier: MIT OR Apache-2.0

//! TypeScript/JavaScript boundary classification. Brace and paren tracking
//! (including JSX expression braces) is handled by the shared depth
//! tracker; this module only recognizes top-level declaration starts.

use super::Trigger;

const IMPORT_PREFIXES: &[&str] = &["import ", "import{", "import("];
const CONST_VAR_PREFIXES: &[&str] = &["const ", "let ", "var "];
const DECL_PREFIXES: &[&str] = &[
    "class ",
    "interface ",
    "type ",
    "enum ",
    "function ",
    "function(",
    "function*",
    "async function ",
    "abstract class ",
    "declare ",
    "namespace ",
];

/// Classifies a trimmed top-level line as a block boundary. Leading
/// `export`/`export default` modifiers are transparent, so
/// `export { foo };` is not a boundary and extends the current block.
pub(super) fn classify_boundary(trimmed: &str) -> Option<Trigger> {
    let lowered = trimmed.to_lowercase();
    let mut rest = lowered.as_str();
    if let Some(stripped) = rest.strip_prefix("export ") {
        rest = stripped.strip_prefix("default ").unwrap_or(stripped);
    }

    if IMPORT_PREFIXES.iter().any(|p| rest.starts_with(p)) {
        return Some(Trigger::Import);
    }
    if CONST_VAR_PREFIXES.iter().any(|p| rest.starts_with(p)) {
        return Some(Trigger::ConstVar);
    }
    if DECL_PREFIXES.iter().any(|p| rest.starts_with(p)) {
        return Some(Trigger::Decl);
    }
    None
}
