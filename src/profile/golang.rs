// SPDX-License-Identifier: MIT OR Apache-2.0

use anyhow::Result;

use super::tsjs::any_file_with_ext;
use super::{DetectContext, Profile, Rules, TokenizeRules};

/// Go projects: detected by `go.mod`/`go.work` or any `.go` source file.
pub struct GoProfile;

impl Profile for GoProfile {
    fn id(&self) -> &'static str {
        "go"
    }

    fn detect(&self, ctx: &DetectContext) -> Result<bool> {
        if ctx.join("go.mod").is_file() || ctx.join("go.work").is_file() {
            return Ok(true);
        }
        Ok(any_file_with_ext(
            ctx,
            &[".go"],
            &[
                ".git", ".repodex", "vendor", "bin", "dist", "build", "out", "tmp",
            ],
        ))
    }

    fn rules(&self) -> Rules {
        Rules {
            scan_ignore: [
                "vendor/",
                "bin/",
                "dist/",
                "build/",
                "out/",
                "coverage/",
                "tmp/",
                ".cache/",
                ".idea/",
                ".vscode/",
                ".DS_Store",
                "**/*.test",
                "**/*.out",
                "**/*.prof",
                "**/*.trace",
                "**/*.coverprofile",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            include_ext: [".go", ".mod", ".sum", ".work"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            tokenize: TokenizeRules {
                path_strip_exts: [".go", ".mod", ".sum", ".work"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                stop_words: [
                    "break",
                    "case",
                    "chan",
                    "const",
                    "continue",
                    "default",
                    "defer",
                    "else",
                    "fallthrough",
                    "for",
                    "func",
                    "go",
                    "goto",
                    "if",
                    "import",
                    "interface",
                    "map",
                    "package",
                    "range",
                    "return",
                    "select",
                    "struct",
                    "switch",
                    "type",
                    "var",
                    "true",
                    "false",
                    "nil",
                ]
                .iter()
                .map(|s| s.to_string())
                .collect(),
                ..Default::default()
            },
        }
    }
}
