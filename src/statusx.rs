// SPDX-License-Identifier: MIT OR Apache-2.0

//! Git info collection and the sync-plan decision table.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use crate::gitx;
use crate::store::{Meta, SCHEMA_VERSION};

/// Upper bound on the changed-path list carried in plans and status.
pub const MAX_CHANGED_PATHS: usize = 200;

/// Git-domain change signal (not a plan reason).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangedReason {
    #[serde(rename = "none")]
    None,
    #[serde(rename = "worktree")]
    Worktree,
    #[serde(rename = "head")]
    Head,
    #[serde(rename = "head+worktree")]
    HeadAndWorktree,
    #[serde(rename = "unknown")]
    Unknown,
}

#[derive(Debug, Clone, Default)]
pub struct GitInfo {
    pub repo: bool,
    pub base_head: String,
    pub current_head: String,
    pub worktree_clean: bool,
    pub worktree_dirty: bool,
    pub dirty_path_count: usize,
    pub dirty_repodex_only: bool,
    pub changed_paths: Vec<String>,
    pub changed_path_count: usize,
    pub changed_reason: Option<ChangedReason>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    Full,
    Noop,
    /// Reserved for future use.
    Incremental,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanWhy {
    UpToDate,
    MissingIndex,
    /// Reserved; git-only operation errors out before planning instead.
    NotGitRepo,
    SchemaChanged,
    ConfigChanged,
    GitHeadChanged,
    GitWorktreeChanged,
    GitHeadAndWorktreeChanged,
    GitChangedNonIndexable,
    Unknown,
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SyncMode::Full => "full",
            SyncMode::Noop => "noop",
            SyncMode::Incremental => "incremental",
        };
        f.write_str(name)
    }
}

impl std::fmt::Display for PlanWhy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            PlanWhy::UpToDate => "up_to_date",
            PlanWhy::MissingIndex => "missing_index",
            PlanWhy::NotGitRepo => "not_git_repo",
            PlanWhy::SchemaChanged => "schema_changed",
            PlanWhy::ConfigChanged => "config_changed",
            PlanWhy::GitHeadChanged => "git_head_changed",
            PlanWhy::GitWorktreeChanged => "git_worktree_changed",
            PlanWhy::GitHeadAndWorktreeChanged => "git_head_and_worktree_changed",
            PlanWhy::GitChangedNonIndexable => "git_changed_non_indexable",
            PlanWhy::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// The planner's decision object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncPlan {
    pub mode: SyncMode,
    pub why: PlanWhy,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub base_head: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub current_head: String,
    #[serde(default)]
    pub worktree_clean: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changed_paths: Vec<String>,
    #[serde(default)]
    pub changed_path_count: usize,
}

/// Collects git state relative to the indexed base head. Every probe
/// failure degrades to `ChangedReason::Unknown` instead of surfacing.
pub fn collect_git_info(root: &Path, base_head: &str, include_ext: &[String]) -> GitInfo {
    let mut info = GitInfo {
        base_head: base_head.to_string(),
        ..Default::default()
    };

    let is_repo = match gitx::is_repo(root) {
        Ok(value) => value,
        Err(_) => {
            info.changed_reason = Some(ChangedReason::Unknown);
            return info;
        }
    };
    if !is_repo {
        // Non-git root: no change reason or paths; the plan explains it.
        info.worktree_clean = true;
        return info;
    }
    info.repo = true;

    match gitx::head(root) {
        Ok(head) => info.current_head = head,
        Err(_) => {
            info.changed_reason = Some(ChangedReason::Unknown);
            return info;
        }
    }

    match gitx::worktree_clean(root) {
        Ok(clean) => {
            info.worktree_clean = clean;
            info.worktree_dirty = !clean;
        }
        Err(_) => {
            info.changed_reason = Some(ChangedReason::Unknown);
            return info;
        }
    }

    let mut changed_set = BTreeSet::new();
    if info.worktree_dirty {
        let paths = match gitx::porcelain_paths(root) {
            Ok(paths) => paths,
            Err(_) => {
                info.changed_reason = Some(ChangedReason::Unknown);
                return info;
            }
        };
        info.dirty_path_count = paths.len();
        if !paths.is_empty() {
            info.dirty_repodex_only = paths.iter().all(|p| is_repodex_path(p));
        }
        // Porcelain paths are the single source for worktree changes
        // (staged, unstaged, and untracked alike).
        add_changed_paths(&mut changed_set, &paths, include_ext);
    }

    let head_changed = !info.base_head.is_empty()
        && !info.current_head.is_empty()
        && info.base_head != info.current_head;
    let mut git_err = false;
    if head_changed {
        match gitx::diff_name_only(root, &info.base_head, &info.current_head) {
            Ok(paths) => add_changed_paths(&mut changed_set, &paths, include_ext),
            Err(_) => git_err = true,
        }
    }
    info.changed_path_count = changed_set.len();
    info.changed_paths = changed_set.into_iter().take(MAX_CHANGED_PATHS).collect();
    if git_err {
        info.changed_reason = Some(ChangedReason::Unknown);
        return info;
    }

    let worktree_changed = info.worktree_dirty;
    info.changed_reason = Some(match (head_changed, worktree_changed) {
        (false, false) => ChangedReason::None,
        (false, true) => ChangedReason::Worktree,
        (true, false) => ChangedReason::Head,
        (true, true) => ChangedReason::HeadAndWorktree,
    });
    info
}

/// Chooses the sync plan for the collected state. The missing-index rule
/// is applied by the caller before any git state is consulted.
pub fn build_sync_plan(meta: &Meta, cfg_hash: u64, info: &GitInfo) -> SyncPlan {
    let mut plan = SyncPlan {
        mode: SyncMode::Full,
        why: PlanWhy::Unknown,
        base_head: meta.repo_head.clone(),
        current_head: info.current_head.clone(),
        worktree_clean: info.worktree_clean,
        changed_paths: info.changed_paths.clone(),
        changed_path_count: info.changed_path_count,
    };

    if !info.repo {
        plan.why = PlanWhy::NotGitRepo;
        return plan;
    }
    if info.changed_reason == Some(ChangedReason::Unknown) {
        plan.why = PlanWhy::Unknown;
        return plan;
    }
    if meta.schema_version != SCHEMA_VERSION {
        plan.why = PlanWhy::SchemaChanged;
        return plan;
    }
    if meta.config_hash != cfg_hash {
        plan.why = PlanWhy::ConfigChanged;
        return plan;
    }

    let head_matches = !info.base_head.is_empty()
        && !info.current_head.is_empty()
        && info.base_head == info.current_head;
    if info.dirty_repodex_only && head_matches {
        plan.mode = SyncMode::Noop;
        plan.why = PlanWhy::GitChangedNonIndexable;
        return plan;
    }

    if info.worktree_dirty && !head_matches {
        plan.why = PlanWhy::GitHeadAndWorktreeChanged;
        return plan;
    }
    if !head_matches {
        plan.why = PlanWhy::GitHeadChanged;
        return plan;
    }
    if info.worktree_dirty {
        if info.changed_path_count > 0 {
            plan.why = PlanWhy::GitWorktreeChanged;
            return plan;
        }
        plan.mode = SyncMode::Noop;
        plan.why = PlanWhy::GitChangedNonIndexable;
        return plan;
    }

    plan.mode = SyncMode::Noop;
    plan.why = PlanWhy::UpToDate;
    plan
}

fn add_changed_paths(set: &mut BTreeSet<String>, paths: &[String], include_ext: &[String]) {
    for path in paths {
        let p = path.trim().replace('\\', "/");
        if p.is_empty() || !is_indexable_changed_path(&p, include_ext) {
            continue;
        }
        set.insert(p);
    }
}

fn is_repodex_path(path: &str) -> bool {
    let p = path.replace('\\', "/");
    p == ".repodex" || p.starts_with(".repodex/")
}

/// A changed path counts only when it could land in the index: never an
/// index artifact, never a declaration file, and its suffix must be in the
/// active include set (an empty set admits any suffix).
fn is_indexable_changed_path(path: &str, include_ext: &[String]) -> bool {
    if path.is_empty() || is_repodex_path(path) {
        return false;
    }
    let lower = path.to_lowercase();
    if lower.ends_with(".d.ts") {
        return false;
    }
    if include_ext.is_empty() {
        return true;
    }
    include_ext
        .iter()
        .any(|ext| lower.ends_with(&ext.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta_with(config_hash: u64, repo_head: &str) -> Meta {
        let mut meta = Meta::new(1, 0, 0, 0, config_hash, repo_head.to_string());
        meta.schema_version = SCHEMA_VERSION;
        meta
    }

    fn clean_info(head: &str) -> GitInfo {
        GitInfo {
            repo: true,
            base_head: head.to_string(),
            current_head: head.to_string(),
            worktree_clean: true,
            changed_reason: Some(ChangedReason::None),
            ..Default::default()
        }
    }

    #[test]
    fn clean_repo_is_a_noop() {
        let plan = build_sync_plan(&meta_with(7, "abc"), 7, &clean_info("abc"));
        assert_eq!(plan.mode, SyncMode::Noop);
        assert_eq!(plan.why, PlanWhy::UpToDate);
    }

    #[test]
    fn unknown_reason_forces_full() {
        let mut info = clean_info("abc");
        info.changed_reason = Some(ChangedReason::Unknown);
        let plan = build_sync_plan(&meta_with(7, "abc"), 7, &info);
        assert_eq!(plan.mode, SyncMode::Full);
        assert_eq!(plan.why, PlanWhy::Unknown);
    }

    #[test]
    fn schema_change_beats_config_change() {
        let mut meta = meta_with(7, "abc");
        meta.schema_version = SCHEMA_VERSION - 1;
        let plan = build_sync_plan(&meta, 8, &clean_info("abc"));
        assert_eq!(plan.why, PlanWhy::SchemaChanged);
    }

    #[test]
    fn config_change_forces_full() {
        let plan = build_sync_plan(&meta_with(7, "abc"), 8, &clean_info("abc"));
        assert_eq!(plan.mode, SyncMode::Full);
        assert_eq!(plan.why, PlanWhy::ConfigChanged);
    }

    #[test]
    fn repodex_only_dirt_with_matching_head_is_noop() {
        let mut info = clean_info("abc");
        info.worktree_clean = false;
        info.worktree_dirty = true;
        info.dirty_path_count = 1;
        info.dirty_repodex_only = true;
        info.changed_reason = Some(ChangedReason::Worktree);
        let plan = build_sync_plan(&meta_with(7, "abc"), 7, &info);
        assert_eq!(plan.mode, SyncMode::Noop);
        assert_eq!(plan.why, PlanWhy::GitChangedNonIndexable);
    }

    #[test]
    fn head_and_worktree_changes_are_ranked() {
        let mut info = clean_info("abc");
        info.current_head = "def".to_string();
        info.worktree_dirty = true;
        info.worktree_clean = false;
        info.changed_reason = Some(ChangedReason::HeadAndWorktree);
        let plan = build_sync_plan(&meta_with(7, "abc"), 7, &info);
        assert_eq!(plan.why, PlanWhy::GitHeadAndWorktreeChanged);

        let mut info = clean_info("abc");
        info.current_head = "def".to_string();
        info.changed_reason = Some(ChangedReason::Head);
        let plan = build_sync_plan(&meta_with(7, "abc"), 7, &info);
        assert_eq!(plan.why, PlanWhy::GitHeadChanged);
    }

    #[test]
    fn dirty_worktree_with_indexable_changes_forces_full() {
        let mut info = clean_info("abc");
        info.worktree_dirty = true;
        info.worktree_clean = false;
        info.changed_paths = vec!["src/a.ts".to_string()];
        info.changed_path_count = 1;
        info.changed_reason = Some(ChangedReason::Worktree);
        let plan = build_sync_plan(&meta_with(7, "abc"), 7, &info);
        assert_eq!(plan.mode, SyncMode::Full);
        assert_eq!(plan.why, PlanWhy::GitWorktreeChanged);
    }

    #[test]
    fn dirty_worktree_without_indexable_changes_is_noop() {
        let mut info = clean_info("abc");
        info.worktree_dirty = true;
        info.worktree_clean = false;
        info.changed_reason = Some(ChangedReason::Worktree);
        let plan = build_sync_plan(&meta_with(7, "abc"), 7, &info);
        assert_eq!(plan.mode, SyncMode::Noop);
        assert_eq!(plan.why, PlanWhy::GitChangedNonIndexable);
    }

    #[test]
    fn changed_paths_are_filtered_sorted_and_capped() {
        let mut set = BTreeSet::new();
        let include = vec![".ts".to_string(), ".tsx".to_string()];
        let paths: Vec<String> = vec![
            "z.ts".to_string(),
            ".repodex/meta.json".to_string(),
            "types.d.ts".to_string(),
            "a.tsx".to_string(),
            "README.md".to_string(),
        ];
        add_changed_paths(&mut set, &paths, &include);
        let out: Vec<String> = set.into_iter().collect();
        assert_eq!(out, vec!["a.tsx".to_string(), "z.ts".to_string()]);
    }

    #[test]
    fn empty_include_set_admits_any_suffix() {
        assert!(is_indexable_changed_path("README.md", &[]));
        assert!(!is_indexable_changed_path(".repodex/files.dat", &[]));
        assert!(!is_indexable_changed_path("lib/types.d.ts", &[]));
    }
}
