// SPDX-License-Identifier: MIT OR Apache-2.0

use anyhow::Result;

use super::{DetectContext, Profile, Rules};

/// Node projects are detected by a root `package.json`. The profile only
/// contributes ignore patterns; indexable extensions come from `ts_js`.
pub struct NodeProfile;

impl Profile for NodeProfile {
    fn id(&self) -> &'static str {
        "node"
    }

    fn detect(&self, ctx: &DetectContext) -> Result<bool> {
        Ok(ctx.join("package.json").is_file())
    }

    fn rules(&self) -> Rules {
        Rules {
            scan_ignore: [
                "node_modules/",
                "dist/",
                "build/",
                "coverage/",
                ".cache/",
                "package-lock.json",
                "npm-debug.log*",
                "yarn-debug.log*",
                "yarn-error.log*",
                "pnpm-debug.log*",
                ".DS_Store",
                "**/*.map",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            ..Default::default()
        }
    }
}
