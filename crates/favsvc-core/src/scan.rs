//! Streaming icon discovery over HTML markup.
//!
//! The scanner is fed decoded body chunks as they arrive and emits raw icon
//! references in document order. Only the unterminated tail of the current
//! tag is carried between chunks, so the document is never buffered whole.
//!
//! Recognized elements:
//! - `<link rel="...">` where `rel` is an accepted value; reference is `href`.
//! - `<meta name="...">` where `name` is an accepted value; reference is `content`.
//!
//! Attribute extraction is regex-based rather than a full HTML parse; for
//! icon discovery "good enough" coverage beats strict spec parsing.

use regex::Regex;
use std::sync::OnceLock;

/// Tags longer than this without a closing `>` are treated as stray `<`.
const MAX_TAG_BYTES: usize = 64 * 1024;

fn attr_regex(attr: &str) -> Regex {
    let pattern = format!(
        r#"(?is)(?:^|\s){attr}\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#
    );
    Regex::new(&pattern).unwrap_or_else(|err| panic!("invalid {attr} attr regex: {err}"))
}

fn capture_first<'t>(caps: &regex::Captures<'t>) -> Option<&'t str> {
    (1..=3).find_map(|idx| caps.get(idx).map(|m| m.as_str()))
}

fn attr_value<'t>(regex: &Regex, tag: &'t str) -> Option<&'t str> {
    regex.captures(tag).and_then(|caps| capture_first(&caps))
}

/// Incremental scanner for one page. Create per request; not reusable.
pub struct IconScanner {
    accepted_rels: Vec<String>,
    carry: Vec<u8>,
    refs: Vec<String>,
}

impl IconScanner {
    pub fn new(accepted_rels: &[String]) -> Self {
        Self {
            accepted_rels: accepted_rels.iter().map(|r| r.to_ascii_lowercase()).collect(),
            carry: Vec::new(),
            refs: Vec::new(),
        }
    }

    /// Feed the next chunk of (already decompressed) markup.
    pub fn push(&mut self, chunk: &[u8]) {
        self.carry.extend_from_slice(chunk);

        let mut start = 0usize;
        loop {
            let Some(open) = find_byte(&self.carry[start..], b'<').map(|i| start + i) else {
                self.carry.clear();
                return;
            };
            match find_byte(&self.carry[open + 1..], b'>').map(|i| open + 1 + i) {
                Some(close) => {
                    let tag = String::from_utf8_lossy(&self.carry[open + 1..close]).into_owned();
                    self.scan_tag(&tag);
                    start = close + 1;
                }
                None => {
                    if self.carry.len() - open > MAX_TAG_BYTES {
                        // Oversized: not a real tag, skip past this '<'.
                        start = open + 1;
                        continue;
                    }
                    self.carry.drain(..open);
                    return;
                }
            }
        }
    }

    /// End-of-document signal; freezes and returns the reference set.
    pub fn finish(self) -> Vec<String> {
        self.refs
    }

    fn scan_tag(&mut self, tag: &str) {
        static ATTR_REL: OnceLock<Regex> = OnceLock::new();
        static ATTR_NAME: OnceLock<Regex> = OnceLock::new();
        static ATTR_HREF: OnceLock<Regex> = OnceLock::new();
        static ATTR_CONTENT: OnceLock<Regex> = OnceLock::new();

        let reference = match tag_name(tag) {
            Some(name) if name.eq_ignore_ascii_case("link") => {
                let rel = ATTR_REL.get_or_init(|| attr_regex("rel"));
                let href = ATTR_HREF.get_or_init(|| attr_regex("href"));
                attr_value(rel, tag)
                    .filter(|rel| self.accepts(rel))
                    .and_then(|_| attr_value(href, tag))
            }
            Some(name) if name.eq_ignore_ascii_case("meta") => {
                let name_attr = ATTR_NAME.get_or_init(|| attr_regex("name"));
                let content = ATTR_CONTENT.get_or_init(|| attr_regex("content"));
                attr_value(name_attr, tag)
                    .filter(|name| self.accepts(name))
                    .and_then(|_| attr_value(content, tag))
            }
            _ => None,
        };

        if let Some(reference) = reference {
            let reference = reference.trim();
            if !reference.is_empty() {
                self.refs.push(reference.to_string());
            }
        }
    }

    fn accepts(&self, rel: &str) -> bool {
        let rel = rel.trim().to_ascii_lowercase();
        self.accepted_rels.iter().any(|r| *r == rel)
    }
}

fn tag_name(tag: &str) -> Option<&str> {
    let tag = tag.trim_start();
    if tag.starts_with(['/', '!', '?']) {
        return None;
    }
    let end = tag
        .find(|c: char| c.is_ascii_whitespace() || c == '/')
        .unwrap_or(tag.len());
    let name = &tag[..end];
    (!name.is_empty()).then_some(name)
}

fn find_byte(haystack: &[u8], needle: u8) -> Option<usize> {
    haystack.iter().position(|b| *b == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rels() -> Vec<String> {
        vec![
            "icon".to_string(),
            "shortcut icon".to_string(),
            "apple-touch-icon".to_string(),
            "apple-touch-icon-precomposed".to_string(),
            "msapplication-TileImage".to_string(),
        ]
    }

    fn scan(html: &str) -> Vec<String> {
        let mut scanner = IconScanner::new(&rels());
        scanner.push(html.as_bytes());
        scanner.finish()
    }

    #[test]
    fn finds_link_icons_in_document_order() {
        let refs = scan(
            r#"<html><head>
                <link rel="icon" href="/small.png">
                <link rel="stylesheet" href="/style.css">
                <link rel="apple-touch-icon" href="touch.png">
                <link href="second.ico" rel="shortcut icon">
            </head></html>"#,
        );
        assert_eq!(refs, vec!["/small.png", "touch.png", "second.ico"]);
    }

    #[test]
    fn finds_meta_tile_image() {
        let refs = scan(r#"<meta name="msapplication-TileImage" content="/tile.png">"#);
        assert_eq!(refs, vec!["/tile.png"]);
    }

    #[test]
    fn rel_match_is_exact_and_case_insensitive() {
        let refs = scan(
            r#"<link rel="ICON" href="a.png">
               <link rel="icons" href="b.png">
               <link rel="an icon" href="c.png">"#,
        );
        assert_eq!(refs, vec!["a.png"]);
    }

    #[test]
    fn missing_or_empty_reference_yields_nothing() {
        let refs = scan(
            r#"<link rel="icon">
               <link rel="icon" href="">
               <link rel="icon" href="   ">
               <meta name="msapplication-TileImage">"#,
        );
        assert!(refs.is_empty());
    }

    #[test]
    fn handles_single_quotes_and_unquoted_attrs() {
        let refs = scan(
            r#"<link rel='icon' href='sq.png'>
               <link rel=icon href=unquoted.ico>"#,
        );
        assert_eq!(refs, vec!["sq.png", "unquoted.ico"]);
    }

    #[test]
    fn tag_split_across_chunks() {
        let mut scanner = IconScanner::new(&rels());
        scanner.push(b"<head><link rel=\"ic");
        scanner.push(b"on\" href=\"/split");
        scanner.push(b".png\"></head>");
        assert_eq!(scanner.finish(), vec!["/split.png"]);
    }

    #[test]
    fn chunk_boundary_between_tags() {
        let mut scanner = IconScanner::new(&rels());
        scanner.push(b"<link rel=\"icon\" href=\"a.png\">");
        scanner.push(b"<link rel=\"icon\" href=\"b.png\">");
        assert_eq!(scanner.finish(), vec!["a.png", "b.png"]);
    }

    #[test]
    fn ignores_closing_tags_comments_and_doctype() {
        let refs = scan(
            r#"<!DOCTYPE html><!-- <link rel="icon" href="x.png"> is text --></link>"#,
        );
        assert!(refs.is_empty());
    }

    #[test]
    fn data_href_attribute_is_not_href() {
        let refs = scan(r#"<link data-href="bad.ico" rel="icon" href="good.ico">"#);
        assert_eq!(refs, vec!["good.ico"]);
    }

    #[test]
    fn incomplete_trailing_tag_is_dropped_at_finish() {
        let mut scanner = IconScanner::new(&rels());
        scanner.push(b"<link rel=\"icon\" href=\"ok.png\"><link rel=\"icon\" href=\"trunc");
        assert_eq!(scanner.finish(), vec!["ok.png"]);
    }

    #[test]
    fn oversized_pseudo_tag_does_not_grow_carry() {
        let mut scanner = IconScanner::new(&rels());
        scanner.push(b"<");
        for _ in 0..80 {
            scanner.push(&[b'a'; 1024]);
        }
        scanner.push(b"<link rel=\"icon\" href=\"after.png\">");
        assert_eq!(scanner.finish(), vec!["after.png"]);
    }
}
