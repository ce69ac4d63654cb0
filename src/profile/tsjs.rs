// SPDX-License-Identifier: MIT OR Apache-2.0

use anyhow::Result;
use walkdir::WalkDir;

use super::{DetectContext, Profile, Rules, TokenizeRules};

const SOURCE_EXTS: &[&str] = &[".ts", ".tsx", ".js", ".jsx", ".mjs", ".cjs"];

/// TypeScript/JavaScript projects: detected by `tsconfig.json` or the
/// presence of any TS/JS source file.
pub struct TsJsProfile;

impl Profile for TsJsProfile {
    fn id(&self) -> &'static str {
        "ts_js"
    }

    fn detect(&self, ctx: &DetectContext) -> Result<bool> {
        if ctx.join("tsconfig.json").is_file() {
            return Ok(true);
        }
        Ok(any_file_with_ext(
            ctx,
            SOURCE_EXTS,
            &[".git", ".repodex", "node_modules", "dist", "build"],
        ))
    }

    fn rules(&self) -> Rules {
        Rules {
            scan_ignore: vec!["**/*.map".to_string()],
            include_ext: SOURCE_EXTS.iter().map(|s| s.to_string()).collect(),
            tokenize: TokenizeRules {
                path_strip_suffixes: [".d.ts.map", ".d.tsx", ".d.ts"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                path_strip_exts: SOURCE_EXTS.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            },
        }
    }
}

/// Bounded existence probe: stops at the first matching file and never
/// descends into the pruned directories.
pub(super) fn any_file_with_ext(ctx: &DetectContext, exts: &[&str], prune: &[&str]) -> bool {
    let walker = WalkDir::new(&ctx.root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| {
            if !entry.file_type().is_dir() {
                return true;
            }
            entry
                .file_name()
                .to_str()
                .map(|name| !prune.contains(&name))
                .unwrap_or(true)
        });
    for entry in walker.flatten() {
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            continue;
        };
        let lower = name.to_lowercase();
        if exts.iter().any(|ext| lower.ends_with(ext)) {
            return true;
        }
    }
    false
}
