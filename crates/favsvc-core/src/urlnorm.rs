//! URL normalization for free-form user input.
//!
//! Users may omit the scheme entirely or pass protocol-relative input:
//!
//! - `www.example.com`   -> `http://www.example.com/`
//! - `//www.example.com` -> `http://www.example.com/`
//! - `http://www.example.com` -> unchanged

use thiserror::Error;
use url::Url;

/// Why an input string could not be turned into a usable absolute URL.
/// Downstream this is never fatal: an unusable URL resolves like an
/// unreachable page.
#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("empty URL")]
    Empty,
    #[error("URL has no host: {0}")]
    NoHost(String),
    #[error("cannot parse URL {input}: {source}")]
    Parse {
        input: String,
        #[source]
        source: url::ParseError,
    },
}

/// Parse `input` into an absolute http(s) URL, prepending a scheme when missing.
pub fn ensure_scheme(input: &str) -> Result<Url, NormalizeError> {
    let input = input.trim();
    if input.is_empty() {
        return Err(NormalizeError::Empty);
    }

    let candidate = if has_http_scheme(input) {
        input.to_string()
    } else if input.starts_with("//") {
        format!("http:{}", input)
    } else {
        format!("http://{}", input)
    };

    let url = Url::parse(&candidate).map_err(|source| NormalizeError::Parse {
        input: input.to_string(),
        source,
    })?;

    if url.host_str().map_or(true, str::is_empty) {
        return Err(NormalizeError::NoHost(input.to_string()));
    }

    Ok(url)
}

/// Resolve a possibly-relative reference against a base URL, then normalize.
/// References that already carry a host are taken as-is (scheme completed).
pub fn resolve_reference(base: &Url, reference: &str) -> Result<Url, NormalizeError> {
    let reference = reference.trim();
    if reference.is_empty() {
        return Err(NormalizeError::Empty);
    }

    if has_http_scheme(reference) || reference.starts_with("//") {
        return ensure_scheme(reference);
    }

    base.join(reference).map_err(|source| NormalizeError::Parse {
        input: reference.to_string(),
        source,
    })
}

fn has_http_scheme(s: &str) -> bool {
    let prefix: String = s.chars().take(8).collect::<String>().to_ascii_lowercase();
    prefix.starts_with("http://") || prefix.starts_with("https://")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_host_gets_http_scheme() {
        let url = ensure_scheme("www.x.com").unwrap();
        assert_eq!(url.as_str(), "http://www.x.com/");
    }

    #[test]
    fn protocol_relative_gets_http_only() {
        let url = ensure_scheme("//www.x.com").unwrap();
        assert_eq!(url.as_str(), "http://www.x.com/");
    }

    #[test]
    fn existing_scheme_unchanged() {
        let url = ensure_scheme("http://www.x.com").unwrap();
        assert_eq!(url.as_str(), "http://www.x.com/");
        let url = ensure_scheme("https://www.x.com/a/b?c=d").unwrap();
        assert_eq!(url.as_str(), "https://www.x.com/a/b?c=d");
    }

    #[test]
    fn path_and_query_survive_prefixing() {
        let url = ensure_scheme("example.com/deep/page.html?x=1").unwrap();
        assert_eq!(url.as_str(), "http://example.com/deep/page.html?x=1");
    }

    #[test]
    fn empty_and_hostless_rejected() {
        assert!(matches!(ensure_scheme(""), Err(NormalizeError::Empty)));
        assert!(matches!(ensure_scheme("   "), Err(NormalizeError::Empty)));
        assert!(matches!(
            ensure_scheme("http://"),
            Err(NormalizeError::NoHost(_)) | Err(NormalizeError::Parse { .. })
        ));
    }

    #[test]
    fn resolve_relative_against_page() {
        let base = Url::parse("http://example.com/dir/page.html").unwrap();
        let url = resolve_reference(&base, "favicon.png").unwrap();
        assert_eq!(url.as_str(), "http://example.com/dir/favicon.png");
        let url = resolve_reference(&base, "/favicon.png").unwrap();
        assert_eq!(url.as_str(), "http://example.com/favicon.png");
    }

    #[test]
    fn resolve_absolute_and_protocol_relative() {
        let base = Url::parse("https://example.com/").unwrap();
        let url = resolve_reference(&base, "http://cdn.example.com/i.png").unwrap();
        assert_eq!(url.as_str(), "http://cdn.example.com/i.png");
        let url = resolve_reference(&base, "//cdn.example.com/i.png").unwrap();
        assert_eq!(url.as_str(), "http://cdn.example.com/i.png");
    }

    #[test]
    fn resolve_empty_reference_rejected() {
        let base = Url::parse("http://example.com/").unwrap();
        assert!(resolve_reference(&base, "").is_err());
        assert!(resolve_reference(&base, "  ").is_err());
    }
}
