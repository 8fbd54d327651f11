//! Parsing of collected response header lines.

/// Headers the fetcher cares about, parsed from raw lines.
#[derive(Debug, Clone, Default)]
pub struct ResponseHeaders {
    /// `Content-Type` value if present, verbatim (parameters included).
    pub content_type: Option<String>,
    /// `Location` value if present (redirect target).
    pub location: Option<String>,
}

/// Parse an `HTTP/x.y NNN ...` status line; returns the code.
pub fn parse_status_line(line: &str) -> Option<u32> {
    let mut parts = line.trim().split_whitespace();
    let proto = parts.next()?;
    if !proto.to_ascii_lowercase().starts_with("http/") {
        return None;
    }
    parts.next()?.parse::<u32>().ok()
}

/// Parse collected header lines into [`ResponseHeaders`].
pub fn parse_headers(lines: &[String]) -> ResponseHeaders {
    let mut out = ResponseHeaders::default();

    for line in lines {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            let name = name.trim();
            let value = value.trim();
            if name.eq_ignore_ascii_case("content-type") {
                out.content_type = Some(value.to_string());
            }
            if name.eq_ignore_ascii_case("location") {
                out.location = Some(value.to_string());
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_line_parses_code() {
        assert_eq!(parse_status_line("HTTP/1.1 200 OK"), Some(200));
        assert_eq!(parse_status_line("HTTP/2 301"), Some(301));
        assert_eq!(parse_status_line("http/1.0 404 Not Found"), Some(404));
        assert_eq!(parse_status_line("Content-Type: image/png"), None);
        assert_eq!(parse_status_line(""), None);
    }

    #[test]
    fn parse_headers_content_type_and_location() {
        let lines = [
            "Content-Type: image/png;charset=UTF-8".to_string(),
            "Location: /moved/favicon.ico".to_string(),
            "Server: nginx".to_string(),
        ];
        let h = parse_headers(&lines);
        assert_eq!(h.content_type.as_deref(), Some("image/png;charset=UTF-8"));
        assert_eq!(h.location.as_deref(), Some("/moved/favicon.ico"));
    }

    #[test]
    fn parse_headers_case_insensitive_names() {
        let lines = [
            "content-TYPE: image/gif".to_string(),
            "LOCATION: http://elsewhere.example/".to_string(),
        ];
        let h = parse_headers(&lines);
        assert_eq!(h.content_type.as_deref(), Some("image/gif"));
        assert_eq!(h.location.as_deref(), Some("http://elsewhere.example/"));
    }

    #[test]
    fn parse_headers_missing_values() {
        let h = parse_headers(&["Server: nginx".to_string()]);
        assert!(h.content_type.is_none());
        assert!(h.location.is_none());
    }
}
