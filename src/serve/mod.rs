// SPDX-License-Identifier: MIT OR Apache-2.0

//! Line-framed JSON request/response loop over stdio.
//!
//! One JSON object per line in each direction. Oversized requests are
//! discarded up to the next newline and answered with a fixed error.

mod cache;

pub use cache::{IndexCache, IndexSnapshot};

use anyhow::Result;
use log::debug;
use serde::{Deserialize, Serialize};
use std::io::{BufRead, Write};
use std::path::Path;

use crate::errors::RepodexError;
use crate::fetch;
use crate::search::{self, SearchOptions};

/// Limit on the size of a single request line.
pub const MAX_REQUEST_BYTES: usize = 1 << 20;

#[derive(Debug, Default, Deserialize)]
pub struct Request {
    #[serde(default)]
    pub op: String,
    #[serde(default)]
    pub q: String,
    #[serde(default)]
    pub top_k: usize,
    #[serde(default)]
    pub ids: Vec<u32>,
    #[serde(default)]
    pub max_lines: usize,
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
pub struct Response {
    pub ok: bool,
    pub op: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Response {
    fn ok(op: &str, data: serde_json::Value) -> Self {
        Self {
            ok: true,
            op: op.to_string(),
            error: String::new(),
            data: Some(data),
        }
    }

    fn err(op: &str, message: impl Into<String>) -> Self {
        Self {
            ok: false,
            op: op.to_string(),
            error: message.into(),
            data: None,
        }
    }
}

/// Runs the stdio server until EOF. `status_fn` and `sync_fn` produce the
/// data payloads for their ops; `sync` additionally invalidates the index
/// cache.
pub fn serve_stdio(
    root: &Path,
    status_fn: impl Fn() -> Result<serde_json::Value>,
    sync_fn: impl Fn() -> Result<serde_json::Value>,
) -> Result<()> {
    let stdin = std::io::stdin();
    let stdout = std::io::stdout();
    let mut reader = stdin.lock();
    let mut writer = stdout.lock();
    let cache = IndexCache::new();

    loop {
        let Some((line, too_large)) = read_line_capped(&mut reader)? else {
            break;
        };
        let response = if too_large {
            Response::err("", RepodexError::RequestTooLarge.to_string())
        } else {
            handle_line(root, &line, &cache, &status_fn, &sync_fn)
        };
        serde_json::to_writer(&mut writer, &response)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
    }
    Ok(())
}

fn handle_line(
    root: &Path,
    line: &[u8],
    cache: &IndexCache,
    status_fn: &impl Fn() -> Result<serde_json::Value>,
    sync_fn: &impl Fn() -> Result<serde_json::Value>,
) -> Response {
    if line.is_empty() {
        return Response::err("", "invalid request: empty");
    }
    let request: Request = match serde_json::from_slice(line) {
        Ok(request) => request,
        Err(err) => return Response::err("", format!("invalid request: {err}")),
    };
    debug!("serve op={}", request.op);
    dispatch(root, &request, cache, status_fn, sync_fn)
}

fn dispatch(
    root: &Path,
    request: &Request,
    cache: &IndexCache,
    status_fn: &impl Fn() -> Result<serde_json::Value>,
    sync_fn: &impl Fn() -> Result<serde_json::Value>,
) -> Response {
    match request.op.as_str() {
        "status" => match status_fn() {
            Ok(data) => Response::ok("status", data),
            Err(err) => Response::err("status", err.to_string()),
        },
        "sync" => match sync_fn() {
            Ok(data) => {
                cache.invalidate();
                Response::ok("sync", data)
            }
            Err(err) => Response::err("sync", err.to_string()),
        },
        "search" => {
            if request.q.trim().is_empty() {
                return Response::err("", "invalid search request: q is required");
            }
            let snapshot = match cache.load(root) {
                Ok(snapshot) => snapshot,
                Err(err) => return Response::err("search", err.to_string()),
            };
            let results = search::search_with_index(
                Some(root),
                &snapshot.cfg,
                &snapshot.chunks,
                Some(&snapshot.chunk_map),
                &snapshot.terms,
                &snapshot.postings,
                &request.q,
                SearchOptions {
                    top_k: request.top_k,
                    max_per_file: 0,
                },
            );
            match results {
                Ok(results) => match serde_json::to_value(results) {
                    Ok(data) => Response::ok("search", data),
                    Err(err) => Response::err("search", err.to_string()),
                },
                Err(err) => Response::err("search", err.to_string()),
            }
        }
        "fetch" => {
            if request.ids.is_empty() {
                return Response::err("", "invalid fetch request: ids are required");
            }
            if request.ids.len() > 5 {
                return Response::err("", "invalid fetch request: maximum 5 ids allowed");
            }
            let snapshot = match cache.load(root) {
                Ok(snapshot) => snapshot,
                Err(err) => return Response::err("fetch", err.to_string()),
            };
            let results = fetch::fetch_with_chunk_map(
                root,
                &snapshot.chunk_map,
                &request.ids,
                request.max_lines,
            );
            match results {
                Ok(results) => match serde_json::to_value(results) {
                    Ok(data) => Response::ok("fetch", data),
                    Err(err) => Response::err("fetch", err.to_string()),
                },
                Err(err) => Response::err("fetch", err.to_string()),
            }
        }
        _ => Response::err("", RepodexError::UnknownOp.to_string()),
    }
}

/// Reads one line with the request-size cap applied. Returns the line with
/// trailing `\r\n` trimmed plus a too-large flag; `None` signals EOF.
fn read_line_capped<R: BufRead>(reader: &mut R) -> Result<Option<(Vec<u8>, bool)>> {
    let mut buf: Vec<u8> = Vec::new();
    loop {
        let available = reader.fill_buf()?;
        if available.is_empty() {
            if buf.is_empty() {
                return Ok(None);
            }
            trim_line_ending(&mut buf);
            return Ok(Some((buf, false)));
        }

        match available.iter().position(|&b| b == b'\n') {
            Some(newline) => {
                let take = newline + 1;
                if buf.len() + take > MAX_REQUEST_BYTES {
                    let allowed = MAX_REQUEST_BYTES.saturating_sub(buf.len());
                    buf.extend_from_slice(&available[..allowed]);
                    reader.consume(take);
                    trim_line_ending(&mut buf);
                    return Ok(Some((buf, true)));
                }
                buf.extend_from_slice(&available[..take]);
                reader.consume(take);
                trim_line_ending(&mut buf);
                return Ok(Some((buf, false)));
            }
            None => {
                let take = available.len();
                if buf.len() + take > MAX_REQUEST_BYTES {
                    let allowed = MAX_REQUEST_BYTES.saturating_sub(buf.len());
                    buf.extend_from_slice(&available[..allowed]);
                    reader.consume(take);
                    discard_until_newline(reader)?;
                    trim_line_ending(&mut buf);
                    return Ok(Some((buf, true)));
                }
                buf.extend_from_slice(available);
                reader.consume(take);
            }
        }
    }
}

fn discard_until_newline<R: BufRead>(reader: &mut R) -> Result<()> {
    loop {
        let available = reader.fill_buf()?;
        if available.is_empty() {
            return Ok(());
        }
        match available.iter().position(|&b| b == b'\n') {
            Some(newline) => {
                reader.consume(newline + 1);
                return Ok(());
            }
            None => {
                let len = available.len();
                reader.consume(len);
            }
        }
    }
}

fn trim_line_ending(buf: &mut Vec<u8>) {
    while matches!(buf.last(), Some(b'\n') | Some(b'\r')) {
        buf.pop();
    }
}
