//! Page resolution orchestration and the response contract.
//!
//! Wires normalization, cache, page fetch, candidate fan-out, and
//! selection together. Every request terminates in a response: cache hits
//! (fresh or 304), freshly resolved icons, the compiled-in default, the
//! usage hint, or a 500 for unexpected internal failures. Per-candidate
//! failures never escape the aggregation step.

use anyhow::{Context, Result};
use std::fs;
use std::sync::Arc;
use tokio::task::JoinSet;
use url::Url;

use crate::cache::DiskCache;
use crate::candidate::{self, IconCandidate};
use crate::config::FavsvcConfig;
use crate::fetch::{self, FetchedIcon};
use crate::select;
use crate::urlnorm;

/// Plain-text body of the 300 response when the `url` parameter is missing.
pub const USAGE_HINT: &str = "/?url=http://missi.ng/url.html";

/// Conditional request headers, exactly as received.
#[derive(Debug, Clone, Copy, Default)]
pub struct Conditional<'a> {
    pub if_modified_since: Option<&'a str>,
    pub if_none_match: Option<&'a str>,
}

impl Conditional<'_> {
    /// A 304 requires both headers to match the cached values exactly.
    fn matches(&self, last_modified: &str, etag: &str) -> bool {
        self.if_modified_since == Some(last_modified) && self.if_none_match == Some(etag)
    }
}

/// Response produced for the routing layer: status plus the headers and
/// body it should relay.
#[derive(Debug, Clone)]
pub struct IconResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub content_length: u64,
    pub last_modified: Option<String>,
    pub etag: Option<String>,
    pub body: Vec<u8>,
}

impl IconResponse {
    fn ok(
        body: Vec<u8>,
        content_type: impl Into<String>,
        last_modified: Option<String>,
        etag: Option<String>,
    ) -> Self {
        Self {
            status: 200,
            content_type: Some(content_type.into()),
            content_length: body.len() as u64,
            last_modified,
            etag,
            body,
        }
    }

    fn not_modified() -> Self {
        Self {
            status: 304,
            content_type: None,
            content_length: 0,
            last_modified: None,
            etag: None,
            body: Vec::new(),
        }
    }

    fn usage() -> Self {
        let body = USAGE_HINT.as_bytes().to_vec();
        Self {
            status: 300,
            content_type: Some("text/plain".to_string()),
            content_length: body.len() as u64,
            last_modified: None,
            etag: None,
            body,
        }
    }

    fn internal_error() -> Self {
        // No internal detail leaks into the body.
        Self {
            status: 500,
            content_type: None,
            content_length: 0,
            last_modified: None,
            etag: None,
            body: Vec::new(),
        }
    }
}

/// The compiled-in fallback icon, read once at startup and immutable after.
#[derive(Debug, Clone)]
pub struct DefaultIcon {
    pub bytes: Vec<u8>,
    pub content_type: String,
}

impl DefaultIcon {
    /// Missing default icon aborts startup; there is no fallback for the
    /// fallback.
    pub fn load(cfg: &FavsvcConfig) -> Result<Self> {
        let bytes = fs::read(&cfg.default_icon.path).with_context(|| {
            format!(
                "cannot read default icon: {}",
                cfg.default_icon.path.display()
            )
        })?;
        Ok(Self {
            bytes,
            content_type: cfg.default_icon.content_type.clone(),
        })
    }
}

pub struct Resolver {
    cfg: Arc<FavsvcConfig>,
    cache: DiskCache,
    default_icon: Arc<DefaultIcon>,
}

impl Resolver {
    /// Build the resolver; creates the cache directory, which is the other
    /// fatal startup condition besides the default icon.
    pub fn new(cfg: FavsvcConfig, default_icon: DefaultIcon) -> Result<Self> {
        cfg.validate()?;
        let cache = DiskCache::new(&cfg.cache_dir, &cfg.etag_salt);
        cache.ensure_dir()?;
        Ok(Self {
            cfg: Arc::new(cfg),
            cache,
            default_icon: Arc::new(default_icon),
        })
    }

    pub fn cache(&self) -> &DiskCache {
        &self.cache
    }

    /// Serve one request: the single entry point the routing layer maps
    /// its `url` query parameter onto.
    pub async fn respond(&self, query_url: Option<&str>, cond: Conditional<'_>) -> IconResponse {
        let Some(raw) = query_url else {
            return IconResponse::usage();
        };
        tracing::info!(url = raw, "search");

        let url = match urlnorm::ensure_scheme(raw) {
            Ok(url) => url,
            Err(err) => {
                // Unusable input resolves like an unreachable page.
                tracing::info!(url = raw, error = %err, "unusable URL, serving default");
                return self.default_response();
            }
        };
        let host = url.host_str().unwrap_or_default().to_string();

        if let Some(entry) = self.cache.lookup(&host) {
            match self.cache.read(&entry) {
                Ok((bytes, content_type)) => {
                    return if cond.matches(&entry.last_modified, &entry.etag) {
                        tracing::info!(url = raw, "cache 304");
                        IconResponse::not_modified()
                    } else {
                        tracing::info!(url = raw, "cache 200");
                        IconResponse::ok(
                            bytes,
                            content_type,
                            Some(entry.last_modified),
                            Some(entry.etag),
                        )
                    };
                }
                Err(err) => {
                    // Entry vanished between stat and read (e.g. a purge
                    // raced us). Treat it as a miss and refetch.
                    tracing::warn!(url = raw, error = %err, "cache entry unreadable, refetching");
                }
            }
        }

        match self.resolve_network(&url).await {
            Ok(Some(icon)) => {
                tracing::info!(url = raw, bytes = icon.bytes.len(), "internet");
                self.persist_and_respond(&host, icon)
            }
            Ok(None) => {
                tracing::info!(url = raw, "default");
                self.default_response()
            }
            Err(err) => {
                tracing::error!(url = raw, error = %err, "resolution failed");
                IconResponse::internal_error()
            }
        }
    }

    /// Resolve a page URL to its best icon, if any. Fetches the page,
    /// streams the markup scan, fans candidate fetches out as tasks, waits
    /// for all of them to settle, and reduces by byte length.
    pub async fn resolve_network(&self, url: &Url) -> Result<Option<FetchedIcon>> {
        let page = {
            let cfg = Arc::clone(&self.cfg);
            let url = url.clone();
            tokio::task::spawn_blocking(move || fetch::fetch_page(&url, &cfg))
                .await
                .context("page fetch task panicked")?
        };
        let Some(scan) = page else {
            return Ok(None);
        };

        // Frozen candidate set: the well-known guess first, then markup
        // references in document order. Slot index = submission order.
        let mut candidates = Vec::new();
        candidates.extend(candidate::well_known(&scan.final_url));
        for reference in &scan.references {
            candidates.extend(candidate::resolve(reference, &scan.final_url, &self.cfg));
        }
        tracing::debug!(
            url = %scan.final_url,
            candidates = candidates.len(),
            "scheduling candidate fetches"
        );

        let mut slots: Vec<Option<FetchedIcon>> = vec![None; candidates.len()];
        let mut join_set = JoinSet::new();
        for (index, cand) in candidates.into_iter().enumerate() {
            match cand {
                IconCandidate::Inline {
                    content_type,
                    bytes,
                } => {
                    // Already resolved; no network fetch.
                    slots[index] = Some(FetchedIcon {
                        bytes,
                        content_type,
                        source_url: scan.final_url.clone(),
                    });
                }
                IconCandidate::Remote {
                    url,
                    accept_default,
                } => {
                    let cfg = Arc::clone(&self.cfg);
                    join_set.spawn(async move {
                        let outcome = tokio::task::spawn_blocking(move || {
                            fetch::fetch_icon(&url, accept_default, &cfg)
                        })
                        .await;
                        (index, outcome)
                    });
                }
            }
        }

        // All-complete barrier: every scheduled fetch settles before
        // selection, so the winner is independent of completion order.
        while let Some(joined) = join_set.join_next().await {
            let (index, outcome) = joined.context("candidate task join")?;
            slots[index] = outcome.context("candidate fetch task panicked")?;
        }

        Ok(select::select_largest(&slots).cloned())
    }

    fn persist_and_respond(&self, host: &str, icon: FetchedIcon) -> IconResponse {
        match self.cache.write(host, &icon.bytes) {
            Ok(entry) => IconResponse::ok(
                icon.bytes,
                icon.content_type,
                Some(entry.last_modified),
                Some(entry.etag),
            ),
            Err(err) => {
                // Persistence is best effort; still serve the fetched bytes.
                tracing::warn!(host, error = %err, "cache write failed");
                IconResponse::ok(icon.bytes, icon.content_type, None, None)
            }
        }
    }

    fn default_response(&self) -> IconResponse {
        IconResponse::ok(
            self.default_icon.bytes.clone(),
            self.default_icon.content_type.clone(),
            None,
            None,
        )
    }
}
