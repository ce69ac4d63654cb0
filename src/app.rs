// SPDX-License-Identifier: MIT OR Apache-2.0

//! Command orchestration: init, status, sync, search, fetch, and serve.

use anyhow::{bail, Context, Result};
use log::{debug, info};
use serde::Serialize;
use std::collections::{BTreeSet, HashSet};
use std::path::{Path, PathBuf};

use crate::cachex;
use crate::cli::{Cli, Commands, IndexCommands};
use crate::config::{self, Config, TokenizationConfig, UserConfig, INDEX_VERSION};
use crate::errors::RepodexError;
use crate::fetch;
use crate::format::{self, ColorMode, SearchFormatOptions};
use crate::gitx;
use crate::hash;
use crate::index::{self, PrecomputedChunk, PrecomputedFile};
use crate::lang::LanguagePlugin;
use crate::profile::{self, DetectContext};
use crate::scan::{self, FileRef};
use crate::search::{self, SearchOptions};
use crate::serve;
use crate::statusx::{self, ChangedReason, GitInfo, PlanWhy, SyncMode, SyncPlan};
use crate::store::{self, CacheMeta, Meta};
use crate::textutil;
use crate::tokenize::{StringScanState, Tokenizer};

/// Output of the status command.
#[derive(Debug, Clone, Serialize)]
pub struct StatusResponse {
    pub indexed: bool,
    pub indexed_at_unix: i64,
    pub file_count: usize,
    pub chunk_count: usize,
    pub term_count: usize,
    pub dirty: bool,
    pub changed_files: usize,

    #[serde(skip_serializing_if = "is_zero_usize")]
    pub git_dirty_path_count: usize,
    #[serde(skip_serializing_if = "is_false")]
    pub git_dirty_repodex_only: bool,

    #[serde(skip_serializing_if = "is_zero_u32")]
    pub schema_version: u32,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub tool_version: String,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub git_base_head: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub git_current_head: String,
    pub git_worktree_clean: bool,
    #[serde(skip_serializing_if = "is_zero_usize")]
    pub git_changed_path_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub git_changed_paths: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_changed_reason: Option<ChangedReason>,
    pub git_changed_indexable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sync_plan: Option<SyncPlan>,
}

/// Status JSON shape kept backward compatible with earlier releases.
#[derive(Debug, Serialize)]
struct LegacyStatusResponse {
    #[serde(flatten)]
    status: StatusResponse,
    #[serde(skip_serializing_if = "is_false")]
    git_repo: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    repo_head: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    current_head: String,
    worktree_clean: bool,
    head_matches: bool,
}

fn is_zero_usize(value: &usize) -> bool {
    *value == 0
}

fn is_zero_u32(value: &u32) -> bool {
    *value == 0
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn legacy_from_status(status: StatusResponse) -> LegacyStatusResponse {
    let git_repo = status.git_changed_reason.is_some();
    let head_matches = !status.git_base_head.is_empty()
        && !status.git_current_head.is_empty()
        && status.git_base_head == status.git_current_head;
    LegacyStatusResponse {
        git_repo,
        repo_head: status.git_base_head.clone(),
        current_head: status.git_current_head.clone(),
        worktree_clean: status.git_worktree_clean,
        head_matches,
        status,
    }
}

/// Executes the parsed CLI command.
pub fn run(cli: Cli) -> Result<()> {
    let root = resolve_repo_root()?;
    match cli.command {
        Commands::Init { force } => run_init(&root, force),
        Commands::Status { json } => run_status(&root, json),
        Commands::Sync => run_sync(&root),
        Commands::Search {
            q,
            top_k,
            json,
            no_format,
            score,
            explain,
            scope,
            color,
        } => run_search(&root, &q, top_k, json, no_format, score, explain, scope, color),
        Commands::Fetch { ids, max_lines } => run_fetch(&root, &ids, max_lines),
        Commands::Index { command } => match command {
            IndexCommands::Sync => run_sync(&root),
            IndexCommands::Status { json } => run_status(&root, json),
        },
        Commands::Serve { stdio } => {
            if !stdio {
                bail!("serve supports --stdio only");
            }
            run_serve_stdio(&root)
        }
    }
}

fn resolve_repo_root() -> Result<PathBuf> {
    gitx::top_level(Path::new("."))
}

fn exists(path: &Path) -> bool {
    path.exists()
}

pub fn run_init(root: &Path, force: bool) -> Result<()> {
    let dir = store::dir(root);
    let cfg_path = store::config_path(root);
    let ignore_path = store::ignore_path(root);
    if !force {
        for path in [&dir, &cfg_path, &ignore_path] {
            if exists(path) {
                bail!("{} already exists; rerun with --force to overwrite", path.display());
            }
        }
    } else if dir.exists() {
        std::fs::remove_dir_all(&dir)?;
    }
    std::fs::create_dir_all(&dir)?;

    let detected = profile::detect_profiles(&DetectContext::new(root))?;
    let mut profiles: Vec<String> = detected.profiles.iter().map(|p| p.id().to_string()).collect();
    if profiles.is_empty() {
        profiles = vec!["ts_js".to_string()];
    }
    info!("init profiles: {}", profiles.join(","));

    let user_cfg = UserConfig {
        profiles: profiles.clone(),
        ..Default::default()
    };
    config::save_user_config(&cfg_path, &user_cfg)?;

    let resolved = profile::resolve_profiles(&profiles)?;
    let mut ignore_patterns = profile::global_scan_ignore(detected.has_package_json);
    for p in &resolved {
        ignore_patterns.extend(p.rules().scan_ignore);
    }
    write_ignore_file(&ignore_path, &ignore_patterns)?;

    let repo_head = current_repo_head(root);
    let (cfg, profiles) = config::apply_overrides(config::default_runtime_config(), &user_cfg)?;
    let rules = profile::build_effective_rules(root, &profiles, &cfg)?;
    let cfg_hash = combined_config_hash(&cfg, rules.rules_hash)?;

    let mut meta = Meta::new(INDEX_VERSION, 0, 0, 0, cfg_hash, repo_head);
    meta.cache = Some(CacheMeta {
        cache_version: cachex::CACHE_VERSION.to_string(),
        schema_version: store::SCHEMA_VERSION,
        config_hash: cfg_hash,
        profiles,
    });
    store::save_meta(&store::meta_path(root), &meta)?;
    Ok(())
}

fn write_ignore_file(path: &Path, patterns: &[String]) -> Result<()> {
    let mut content = patterns.join("\n");
    content.push('\n');
    std::fs::write(path, content)?;
    Ok(())
}

fn current_repo_head(root: &Path) -> String {
    match gitx::is_repo(root) {
        Ok(true) => gitx::head(root).unwrap_or_default(),
        _ => String::new(),
    }
}

pub fn run_status(root: &Path, json: bool) -> Result<()> {
    let resp = compute_status_resolved(root)?;
    output_status(resp, json)
}

fn output_status(resp: StatusResponse, json: bool) -> Result<()> {
    if json {
        let legacy = legacy_from_status(resp);
        println!("{}", serde_json::to_string(&legacy)?);
        return Ok(());
    }
    println!(
        "Indexed: {}\nDirty: {}\nChanged files: {}",
        resp.indexed, resp.dirty, resp.changed_files
    );
    if !resp.git_worktree_clean && resp.git_dirty_repodex_only {
        println!(
            "Git: working tree dirty due to .repodex only (commit index artifacts if you rely on portable index)"
        );
    } else if !resp.git_worktree_clean {
        println!("Git: working tree dirty ({} paths)", resp.git_dirty_path_count);
    }
    if let Some(plan) = &resp.sync_plan {
        println!("Sync plan: mode={}, why={}", plan.mode, plan.why);
        if plan.why == PlanWhy::GitChangedNonIndexable && resp.git_dirty_repodex_only {
            println!("Note: repo dirty only due to .repodex; commit index artifacts for portability.");
        }
    }
    Ok(())
}

pub fn compute_status_resolved(root: &Path) -> Result<StatusResponse> {
    let meta_path = store::meta_path(root);
    let artifacts = [
        meta_path.clone(),
        store::files_path(root),
        store::chunks_path(root),
        store::terms_path(root),
        store::postings_path(root),
    ];
    let all_present = artifacts.iter().all(|p| exists(p));

    let user_cfg = config::load_user_config(&store::config_path(root))
        .context("load .repodex/config.json (run `repodex init` first)")?;
    let (cfg, profiles) = config::apply_overrides(config::default_runtime_config(), &user_cfg)?;
    let rules = profile::build_effective_rules(root, &profiles, &cfg)?;

    if !all_present {
        let meta = if exists(&meta_path) {
            store::load_meta(&meta_path).unwrap_or_default()
        } else {
            Meta::default()
        };
        let git_info = statusx::collect_git_info(root, &meta.repo_head, &rules.include_ext);
        if !git_info.repo {
            return Err(RepodexError::VcsMissing.into());
        }
        let mut resp = StatusResponse {
            indexed: false,
            indexed_at_unix: 0,
            file_count: 0,
            chunk_count: 0,
            term_count: 0,
            dirty: true,
            changed_files: 0,
            git_dirty_path_count: 0,
            git_dirty_repodex_only: false,
            schema_version: 0,
            tool_version: String::new(),
            git_base_head: String::new(),
            git_current_head: String::new(),
            git_worktree_clean: false,
            git_changed_path_count: 0,
            git_changed_paths: Vec::new(),
            git_changed_reason: None,
            git_changed_indexable: false,
            sync_plan: None,
        };
        apply_git_info(&mut resp, &git_info);
        resp.sync_plan = Some(SyncPlan {
            mode: SyncMode::Full,
            why: PlanWhy::MissingIndex,
            base_head: git_info.base_head.clone(),
            current_head: git_info.current_head.clone(),
            worktree_clean: git_info.worktree_clean,
            changed_paths: git_info.changed_paths.clone(),
            changed_path_count: git_info.changed_path_count,
        });
        resp.changed_files = git_info.changed_path_count;
        return Ok(resp);
    }

    let meta = store::load_meta(&meta_path)?;
    let cfg_hash = combined_config_hash(&cfg, rules.rules_hash)?;
    let git_info = statusx::collect_git_info(root, &meta.repo_head, &rules.include_ext);
    if !git_info.repo {
        return Err(RepodexError::VcsMissing.into());
    }

    let plan = statusx::build_sync_plan(&meta, cfg_hash, &git_info);
    let mut resp = StatusResponse {
        indexed: true,
        indexed_at_unix: meta.indexed_at_unix,
        file_count: meta.file_count,
        chunk_count: meta.chunk_count,
        term_count: meta.term_count,
        dirty: plan.mode != SyncMode::Noop,
        changed_files: plan.changed_path_count,
        git_dirty_path_count: 0,
        git_dirty_repodex_only: false,
        schema_version: meta.schema_version,
        tool_version: meta.tool_version.clone(),
        git_base_head: String::new(),
        git_current_head: String::new(),
        git_worktree_clean: false,
        git_changed_path_count: 0,
        git_changed_paths: Vec::new(),
        git_changed_reason: None,
        git_changed_indexable: false,
        sync_plan: None,
    };
    apply_git_info(&mut resp, &git_info);
    resp.sync_plan = Some(plan);
    Ok(resp)
}

fn apply_git_info(resp: &mut StatusResponse, info: &GitInfo) {
    resp.git_dirty_path_count = info.dirty_path_count;
    resp.git_dirty_repodex_only = info.dirty_repodex_only;
    resp.git_base_head = info.base_head.clone();
    resp.git_current_head = info.current_head.clone();
    resp.git_worktree_clean = info.worktree_clean;
    resp.git_changed_path_count = info.changed_path_count;
    resp.git_changed_paths = info.changed_paths.clone();
    resp.git_changed_reason = info.changed_reason;
    resp.git_changed_indexable = info.repo && info.changed_path_count > 0;
    if !info.repo {
        resp.git_changed_reason = None;
        resp.git_changed_paths = Vec::new();
        resp.git_changed_path_count = 0;
        resp.git_changed_indexable = false;
    }
}

/// Folds the effective chunk/scan/limits config and the rules hash into a
/// single fingerprint. Field order is part of the contract; changing the
/// encoding is a schema version bump.
pub fn combined_config_hash(cfg: &Config, rules_hash: u64) -> Result<u64> {
    #[derive(Serialize)]
    struct HashState<'a> {
        chunk: &'a config::ChunkingConfig,
        scan: &'a config::ScanConfig,
        limits: &'a config::LimitsConfig,
        rules_hash: u64,
    }
    let bytes = serde_json::to_vec(&HashState {
        chunk: &cfg.chunk,
        scan: &cfg.scan,
        limits: &cfg.limits,
        rules_hash,
    })?;
    Ok(hash::sum64(&bytes))
}

fn precomputed_from_cache(entry: cachex::CacheEntry) -> Result<PrecomputedFile> {
    if entry.chunks.len() != entry.tokens.len() {
        return Err(RepodexError::CacheInvalid {
            rel_path: entry.rel_path.clone(),
            reason: "chunk/token length mismatch".to_string(),
        }
        .into());
    }
    let mut chunks = Vec::with_capacity(entry.chunks.len());
    for (chunk, tokens) in entry.chunks.iter().zip(entry.tokens.iter()) {
        if chunk.start < 1 || chunk.end < chunk.start {
            return Err(RepodexError::ChunkerInvariant {
                path: entry.rel_path.clone(),
                start: chunk.start,
                end: chunk.end,
            }
            .into());
        }
        chunks.push(PrecomputedChunk {
            start_line: chunk.start,
            end_line: chunk.end,
            snippet: chunk.snippet.clone(),
            tokens: tokens.clone(),
        });
    }
    Ok(PrecomputedFile {
        path: entry.rel_path.replace('\\', "/"),
        mtime: entry.mtime,
        size: entry.size,
        hash64: entry.hash64,
        chunks,
    })
}

fn build_cache_entry(
    file_ref: &FileRef,
    cfg: &Config,
    token_cfg: &TokenizationConfig,
) -> Result<(PrecomputedFile, cachex::CacheEntry)> {
    let content = std::fs::read(&file_ref.abs_path)
        .with_context(|| format!("read {}", file_ref.abs_path.display()))?;
    let normalized = textutil::normalize_newlines_bytes(content);
    let hash64 = hash::sum64(&normalized);

    let plugin = LanguagePlugin::for_path(&file_ref.rel_path);
    let chunk_drafts = plugin.chunk_file(&normalized, &cfg.chunk, &cfg.limits)?;

    let text = String::from_utf8_lossy(&normalized);
    let lines: Vec<&str> = text.split('\n').collect();
    let tokenizer = Tokenizer::new(token_cfg);
    let path_tokens = tokenizer.path(&file_ref.rel_path);

    let line_tokens: Vec<Vec<String>> = if token_cfg.tokenize_string_literals {
        lines.iter().map(|line| tokenizer.text(line)).collect()
    } else {
        let mut st = StringScanState::default();
        lines
            .iter()
            .map(|line| tokenizer.text_with_state(line, &mut st))
            .collect()
    };

    let mut precomputed_chunks = Vec::with_capacity(chunk_drafts.len());
    let mut cache_chunks = Vec::with_capacity(chunk_drafts.len());
    let mut token_sets = Vec::with_capacity(chunk_drafts.len());

    for draft in &chunk_drafts {
        let start = (draft.start_line.max(1) - 1) as usize;
        let end = (draft.end_line as usize).min(lines.len());
        // Tokens stay unique and sorted so index building is deterministic.
        let mut token_set: BTreeSet<String> = path_tokens.iter().cloned().collect();
        for tokens in line_tokens.iter().take(end).skip(start) {
            token_set.extend(tokens.iter().cloned());
        }
        let tokens: Vec<String> = token_set.into_iter().collect();
        precomputed_chunks.push(PrecomputedChunk {
            start_line: draft.start_line,
            end_line: draft.end_line,
            snippet: draft.snippet.clone(),
            tokens: tokens.clone(),
        });
        cache_chunks.push(cachex::LocalChunk {
            start: draft.start_line,
            end: draft.end_line,
            snippet: draft.snippet.clone(),
        });
        token_sets.push(tokens);
    }

    let file = PrecomputedFile {
        path: file_ref.rel_path.replace('\\', "/"),
        mtime: file_ref.mtime,
        size: file_ref.size,
        hash64,
        chunks: precomputed_chunks,
    };
    let entry = cachex::CacheEntry {
        rel_path: file_ref.rel_path.replace('\\', "/"),
        size: file_ref.size,
        mtime: file_ref.mtime,
        hash64,
        chunks: cache_chunks,
        tokens: token_sets,
    };
    Ok((file, entry))
}

pub fn run_sync(root: &Path) -> Result<()> {
    let status = compute_status_resolved(root)?;
    if let Some(plan) = &status.sync_plan {
        if plan.mode == SyncMode::Noop {
            debug!("sync noop: {}", plan.why);
            return Ok(());
        }
    }

    let user_cfg = config::load_user_config(&store::config_path(root))?;
    let (cfg, profiles) = config::apply_overrides(config::default_runtime_config(), &user_cfg)?;
    let rules = profile::build_effective_rules(root, &profiles, &cfg)?;
    let cfg_hash = combined_config_hash(&cfg, rules.rules_hash)?;

    let mut changed_set: HashSet<String> = HashSet::new();
    let mut full_rebuild = true;
    if let Some(plan) = &status.sync_plan {
        for path in &plan.changed_paths {
            changed_set.insert(path.replace('\\', "/"));
        }
        full_rebuild = matches!(
            plan.why,
            PlanWhy::MissingIndex | PlanWhy::SchemaChanged | PlanWhy::ConfigChanged
        );
    }

    if full_rebuild {
        cachex::purge(root)?;
    }
    let purged = cachex::ensure_meta(
        root,
        CacheMeta {
            config_hash: cfg_hash,
            profiles: profiles.clone(),
            ..Default::default()
        },
    )?;
    if purged {
        full_rebuild = true;
    }

    let refs = scan::walk_refs(root, &rules)?;
    info!(
        "sync: {} files, full_rebuild={}, changed={}",
        refs.len(),
        full_rebuild,
        changed_set.len()
    );

    let mut precomputed = Vec::with_capacity(refs.len());
    for file_ref in &refs {
        let rebuild = full_rebuild || changed_set.contains(&file_ref.rel_path);
        if !rebuild {
            if let Some(entry) = cachex::load_by_path(root, &file_ref.rel_path)? {
                precomputed.push(precomputed_from_cache(entry)?);
                continue;
            }
        }
        let (file, entry) = build_cache_entry(file_ref, &cfg, &rules.token_config)?;
        cachex::save(root, entry)?;
        precomputed.push(file);
    }

    let (file_entries, chunk_entries, postings) = index::build_from_precomputed(&precomputed);
    index::serialize(root, &file_entries, &chunk_entries, &postings)?;

    let repo_head = current_repo_head(root);
    let mut meta = Meta::new(
        INDEX_VERSION,
        file_entries.len(),
        chunk_entries.len(),
        postings.len(),
        cfg_hash,
        repo_head,
    );
    meta.cache = Some(CacheMeta {
        cache_version: cachex::CACHE_VERSION.to_string(),
        schema_version: store::SCHEMA_VERSION,
        config_hash: cfg_hash,
        profiles,
    });
    store::save_meta(&store::meta_path(root), &meta)?;
    Ok(())
}

#[allow(clippy::too_many_arguments)]
pub fn run_search(
    root: &Path,
    q: &str,
    top_k: usize,
    json: bool,
    no_format: bool,
    score: bool,
    explain: bool,
    scope: bool,
    color: ColorMode,
) -> Result<()> {
    if q.trim().is_empty() {
        return Err(RepodexError::QueryEmpty.into());
    }
    let mut results = search::search(
        root,
        q,
        SearchOptions {
            top_k,
            max_per_file: 0,
        },
    )?;
    if scope {
        search::enrich_go_scopes(root, &mut results);
    }

    if json {
        println!("{}", serde_json::to_string(&results)?);
        return Ok(());
    }

    search::round_scores(&mut results);
    let policy = format::resolve_color_policy(color, no_format, json);
    let opt = SearchFormatOptions {
        no_format,
        with_score: score,
        explain,
        scope,
        color: policy,
        query_terms: q.split_whitespace().map(|t| t.to_lowercase()).collect(),
    };
    let stdout = std::io::stdout();
    let mut writer = std::io::BufWriter::new(stdout.lock());
    if explain {
        format::write_search_grouped(&mut writer, &results, &opt)?;
    } else {
        format::write_search_compact(&mut writer, &results, &opt)?;
    }
    use std::io::Write;
    writer.flush()?;
    Ok(())
}

pub fn run_fetch(root: &Path, ids: &[u32], max_lines: usize) -> Result<()> {
    if ids.is_empty() {
        bail!("at least one id is required");
    }
    let results = fetch::fetch(root, ids, max_lines)?;
    println!("{}", serde_json::to_string(&results)?);
    Ok(())
}

pub fn run_serve_stdio(root: &Path) -> Result<()> {
    let status_root = root.to_path_buf();
    let status_fn = move || -> Result<serde_json::Value> {
        let resp = compute_status_resolved(&status_root)?;
        Ok(serde_json::to_value(legacy_from_status(resp))?)
    };
    let sync_root = root.to_path_buf();
    let sync_fn = move || -> Result<serde_json::Value> {
        run_sync(&sync_root)?;
        let resp = compute_status_resolved(&sync_root)?;
        Ok(serde_json::to_value(legacy_from_status(resp))?)
    };
    serve::serve_stdio(root, status_fn, sync_fn)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_hash_is_stable_and_field_sensitive() {
        let cfg = config::default_runtime_config();
        let a = combined_config_hash(&cfg, 1).expect("hash");
        let b = combined_config_hash(&cfg, 1).expect("hash");
        assert_eq!(a, b);
        let c = combined_config_hash(&cfg, 2).expect("hash");
        assert_ne!(a, c);

        let mut changed = cfg.clone();
        changed.chunk.max_lines += 1;
        let d = combined_config_hash(&changed, 1).expect("hash");
        assert_ne!(a, d);
    }

    #[test]
    fn cache_round_trip_preserves_precomputed_shape() {
        let dir = tempfile::TempDir::new().expect("tempdir");
        let abs = dir.path().join("src/a.ts");
        std::fs::create_dir_all(abs.parent().unwrap()).expect("mkdir");
        std::fs::write(&abs, "export function alphaBeta() { return 1; }\n").expect("write");

        let cfg = config::default_runtime_config();
        let file_ref = FileRef {
            rel_path: "src/a.ts".to_string(),
            abs_path: abs,
            size: 42,
            mtime: 7,
        };
        let (file, entry) = build_cache_entry(&file_ref, &cfg, &cfg.token).expect("build");
        assert_eq!(file.chunks.len(), entry.chunks.len());
        assert_eq!(entry.chunks.len(), entry.tokens.len());
        assert!(file.chunks[0].tokens.contains(&"alpha".to_string()));
        assert!(file.chunks[0].tokens.contains(&"src".to_string()));

        let round = precomputed_from_cache(entry).expect("from cache");
        assert_eq!(round.path, file.path);
        assert_eq!(round.chunks[0].tokens, file.chunks[0].tokens);
    }

    #[test]
    fn invalid_cache_ranges_are_rejected() {
        let entry = cachex::CacheEntry {
            rel_path: "a.ts".to_string(),
            size: 1,
            mtime: 1,
            hash64: 1,
            chunks: vec![cachex::LocalChunk {
                start: 3,
                end: 2,
                snippet: String::new(),
            }],
            tokens: vec![vec![]],
        };
        assert!(precomputed_from_cache(entry).is_err());
    }
}
