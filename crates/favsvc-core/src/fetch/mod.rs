//! Bounded-redirect HTTP retrieval.
//!
//! Uses the curl crate (libcurl) with `follow_location` off: redirects are
//! resolved here so the budget and the path-substitution rule apply to every
//! hop. Transport errors, timeouts, rejected content-types, and exhausted
//! budgets all resolve to "no result", never to an error. A fetch chain
//! performs at most `max_redirects + 1` GETs.
//!
//! Bodies are decompressed by libcurl (`Accept-Encoding` with all built-in
//! codings) before they reach the caller's sink.

mod parse;
pub mod redirect;

use anyhow::{Context, Result};
use std::cell::Cell;
use std::collections::HashMap;
use std::str;
use std::time::Duration;
use url::Url;

use crate::config::FavsvcConfig;
use crate::mime;
use crate::scan::IconScanner;

/// A successfully fetched icon payload.
#[derive(Debug, Clone)]
pub struct FetchedIcon {
    pub bytes: Vec<u8>,
    /// Content-type after parameter stripping (or the coerced default).
    pub content_type: String,
    /// URL the bytes actually came from, after redirects.
    pub source_url: Url,
}

/// Outcome of scanning a page: where the document ended up after redirects
/// and the raw icon references found in it, in document order.
#[derive(Debug, Clone)]
pub struct PageScan {
    pub final_url: Url,
    pub references: Vec<String>,
}

#[derive(Debug)]
struct ResponseInfo {
    status: u32,
    content_type: Option<String>,
    location: Option<String>,
}

/// Fetch one icon candidate, following redirects within the budget.
///
/// With `accept_default` set (the well-known `/favicon.ico` guess) the
/// payload is trusted unconditionally and coerced to `image/x-icon`.
/// Runs in the current thread; call from `spawn_blocking` in async code.
pub fn fetch_icon(start: &Url, accept_default: bool, cfg: &FavsvcConfig) -> Option<FetchedIcon> {
    let timeout = Duration::from_secs(cfg.timeout.icon_secs);
    let original_path = start.path().to_string();
    let mut current = start.clone();

    for attempt in 0..=cfg.max_redirects {
        let mut body = Vec::new();
        let info = match perform_get(current.as_str(), timeout, &cfg.request_headers, &mut |d| {
            body.extend_from_slice(d)
        }) {
            Ok(info) => info,
            Err(err) => {
                tracing::debug!(url = %current, error = %err, "icon fetch failed");
                return None;
            }
        };

        match info.status {
            200 => {
                if accept_default {
                    // Educated guess: the well-known path is always an .ico.
                    return Some(FetchedIcon {
                        bytes: body,
                        content_type: "image/x-icon".to_string(),
                        source_url: current,
                    });
                }
                let stripped = info
                    .content_type
                    .as_deref()
                    .map(mime::strip_parameters)
                    .unwrap_or("");
                if cfg.accepts_type(stripped) {
                    return Some(FetchedIcon {
                        bytes: body,
                        content_type: stripped.to_ascii_lowercase(),
                        source_url: current,
                    });
                }
                tracing::info!(url = %current, content_type = stripped, "unsupported icon content-type");
                return None;
            }
            301 | 302 => {
                if attempt == cfg.max_redirects {
                    tracing::debug!(url = %current, "icon redirect budget exhausted");
                    return None;
                }
                let Some(location) = info.location else {
                    return None;
                };
                let accepted = info
                    .content_type
                    .as_deref()
                    .map(|c| cfg.accepts_type(mime::strip_parameters(c)))
                    .unwrap_or(false);
                current = redirect::next_icon_url(&current, &original_path, &location, accepted)?;
            }
            status => {
                tracing::debug!(url = %current, status, "icon fetch rejected");
                return None;
            }
        }
    }

    None
}

/// Fetch a page and stream its body through an [`IconScanner`], following
/// redirects within the budget.
///
/// Runs in the current thread; call from `spawn_blocking` in async code.
pub fn fetch_page(start: &Url, cfg: &FavsvcConfig) -> Option<PageScan> {
    let timeout = Duration::from_secs(cfg.timeout.page_secs);
    let mut scanner = IconScanner::new(&cfg.accepted_rels);
    let mut current = start.clone();

    for attempt in 0..=cfg.max_redirects {
        let info = match perform_get(current.as_str(), timeout, &cfg.request_headers, &mut |d| {
            scanner.push(d)
        }) {
            Ok(info) => info,
            Err(err) => {
                tracing::debug!(url = %current, error = %err, "page fetch failed");
                return None;
            }
        };

        match info.status {
            200 => {
                return Some(PageScan {
                    final_url: current,
                    references: scanner.finish(),
                });
            }
            301 | 302 => {
                if attempt == cfg.max_redirects {
                    tracing::debug!(url = %current, "page redirect budget exhausted");
                    return None;
                }
                let Some(location) = info.location else {
                    return None;
                };
                current = redirect::resolve_location(&current, &location)?;
            }
            status => {
                tracing::debug!(url = %current, status, "page fetch rejected");
                return None;
            }
        }
    }

    None
}

/// One GET. Header lines are collected for [`parse::parse_headers`]; body
/// chunks reach `on_body` only while the response status is 200, so
/// redirect bodies are never streamed to the caller. The timeout covers the
/// whole transfer and aborts the connection when it fires.
fn perform_get(
    url: &str,
    timeout: Duration,
    request_headers: &HashMap<String, String>,
    on_body: &mut dyn FnMut(&[u8]),
) -> Result<ResponseInfo> {
    let mut header_lines: Vec<String> = Vec::new();
    let status_seen = Cell::new(0u32);

    let mut easy = curl::easy::Easy::new();
    easy.url(url).context("invalid URL")?;
    easy.get(true)?;
    easy.follow_location(false)?;
    // Empty string: offer every built-in coding and decode transparently.
    easy.accept_encoding("")?;
    easy.connect_timeout(timeout)?;
    easy.timeout(timeout)?;

    let mut list = curl::easy::List::new();
    for (k, v) in request_headers {
        list.append(&format!("{}: {}", k.trim(), v.trim()))?;
    }
    if !request_headers.is_empty() {
        easy.http_headers(list)?;
    }

    {
        let mut transfer = easy.transfer();
        transfer.header_function(|data| {
            if let Ok(s) = str::from_utf8(data) {
                let line = s.trim_end();
                if let Some(code) = parse::parse_status_line(line) {
                    // New response head (e.g. after 100 Continue): start over.
                    status_seen.set(code);
                    header_lines.clear();
                } else {
                    header_lines.push(line.to_string());
                }
            }
            true
        })?;
        transfer.write_function(|data| {
            if status_seen.get() == 200 {
                on_body(data);
            }
            Ok(data.len())
        })?;
        transfer.perform().context("GET failed")?;
    }

    let status = easy.response_code().context("no response code")?;
    let headers = parse::parse_headers(&header_lines);

    Ok(ResponseInfo {
        status,
        content_type: headers.content_type,
        location: headers.location,
    })
}
