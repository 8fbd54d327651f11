//! Turning raw markup references into fetchable icon candidates.

use base64::Engine;
use regex::Regex;
use std::sync::OnceLock;
use url::Url;

use crate::config::FavsvcConfig;
use crate::urlnorm;

/// One schedulable icon candidate.
///
/// Inline candidates carry their payload already; remote ones still need a
/// network fetch. `accept_default` marks the well-known `/favicon.ico`
/// guess, which is trusted regardless of the reported content-type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IconCandidate {
    Remote { url: Url, accept_default: bool },
    Inline { content_type: String, bytes: Vec<u8> },
}

/// The well-known `/favicon.ico` path under the page's host. Always
/// scheduled, regardless of what the markup contains.
pub fn well_known(page_url: &Url) -> Option<IconCandidate> {
    let url = page_url.join("/favicon.ico").ok()?;
    Some(IconCandidate::Remote {
        url,
        accept_default: true,
    })
}

/// Resolve one raw markup reference. Returns `None` for references that
/// yield nothing (empty, malformed, or inline payloads of unsupported type);
/// that is exclusion from the candidate set, not an error.
pub fn resolve(reference: &str, page_url: &Url, cfg: &FavsvcConfig) -> Option<IconCandidate> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }

    let is_data = reference
        .get(..5)
        .map(|p| p.eq_ignore_ascii_case("data:"))
        .unwrap_or(false);
    if is_data {
        return resolve_inline(reference, cfg);
    }

    let url = urlnorm::resolve_reference(page_url, reference).ok()?;
    Some(IconCandidate::Remote {
        url,
        accept_default: false,
    })
}

fn resolve_inline(reference: &str, cfg: &FavsvcConfig) -> Option<IconCandidate> {
    static DATA_URL: OnceLock<Regex> = OnceLock::new();
    let data_url = DATA_URL.get_or_init(|| {
        Regex::new(r"^(?is)data:([A-Za-z0-9/+.\-]+);base64,(.*)$")
            .unwrap_or_else(|err| panic!("invalid data URL regex: {err}"))
    });

    let caps = data_url.captures(reference)?;
    let content_type = caps.get(1)?.as_str().to_ascii_lowercase();
    if !cfg.accepts_type(&content_type) {
        tracing::debug!(content_type, "inline icon with unsupported content-type");
        return None;
    }

    let bytes = decode_base64(caps.get(2)?.as_str())?;
    if bytes.is_empty() {
        return None;
    }

    Some(IconCandidate::Inline {
        content_type,
        bytes,
    })
}

/// Decode base64, tolerating ASCII whitespace inside the payload.
fn decode_base64(data: &str) -> Option<Vec<u8>> {
    let cleaned: Vec<u8> = data
        .bytes()
        .filter(|b| !b.is_ascii_whitespace())
        .collect();
    base64::engine::general_purpose::STANDARD.decode(cleaned).ok()
}
