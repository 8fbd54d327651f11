//! Icon content-type table and magic-byte sniffing.
//!
//! Cached files are named by host only, so the content-type of a cache hit
//! is recovered from the file bytes rather than stored alongside them.

/// Image formats the service knows how to store and sniff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IconType {
    Ico,
    Png,
    Gif,
    Jpeg,
    Svg,
    Webp,
    Bmp,
}

impl IconType {
    /// Canonical MIME type for this format.
    pub fn mime(self) -> &'static str {
        match self {
            IconType::Ico => "image/x-icon",
            IconType::Png => "image/png",
            IconType::Gif => "image/gif",
            IconType::Jpeg => "image/jpeg",
            IconType::Svg => "image/svg+xml",
            IconType::Webp => "image/webp",
            IconType::Bmp => "image/bmp",
        }
    }

    /// Map a MIME type (no parameters) to a format, accepting common aliases.
    pub fn from_mime(mime: &str) -> Option<IconType> {
        match mime.trim().to_ascii_lowercase().as_str() {
            "image/x-icon" | "image/vnd.microsoft.icon" | "image/ico" => Some(IconType::Ico),
            "image/png" => Some(IconType::Png),
            "image/gif" => Some(IconType::Gif),
            "image/jpeg" | "image/jpg" => Some(IconType::Jpeg),
            "image/svg+xml" => Some(IconType::Svg),
            "image/webp" => Some(IconType::Webp),
            "image/bmp" | "image/x-ms-bmp" => Some(IconType::Bmp),
            _ => None,
        }
    }
}

/// Strip `;charset=...` and other parameters from a Content-Type header value.
pub fn strip_parameters(content_type: &str) -> &str {
    content_type
        .split(';')
        .next()
        .unwrap_or(content_type)
        .trim()
}

/// Sniff the image format from leading magic bytes.
///
/// SVG has no magic number; a leading `<` after optional whitespace/BOM is
/// treated as markup and classified as SVG, since nothing else stored in
/// the cache starts that way.
pub fn sniff(bytes: &[u8]) -> Option<IconType> {
    if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]) {
        return Some(IconType::Png);
    }
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some(IconType::Gif);
    }
    if bytes.starts_with(&[0xff, 0xd8, 0xff]) {
        return Some(IconType::Jpeg);
    }
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some(IconType::Webp);
    }
    if bytes.starts_with(b"BM") {
        return Some(IconType::Bmp);
    }
    if bytes.len() >= 4 && bytes[0] == 0 && bytes[1] == 0 && bytes[2] == 1 && bytes[3] == 0 {
        return Some(IconType::Ico);
    }
    let trimmed = strip_leading_markup_noise(bytes);
    if trimmed.starts_with(b"<") {
        return Some(IconType::Svg);
    }
    None
}

/// Sniff with a fallback: anything unrecognized is served as `image/x-icon`,
/// matching how the well-known `/favicon.ico` guess is classified.
pub fn sniff_or_default(bytes: &[u8]) -> &'static str {
    sniff(bytes).unwrap_or(IconType::Ico).mime()
}

fn strip_leading_markup_noise(bytes: &[u8]) -> &[u8] {
    let bytes = bytes.strip_prefix(&[0xef, 0xbb, 0xbf]).unwrap_or(bytes);
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    &bytes[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strip_parameters_removes_charset() {
        assert_eq!(strip_parameters("image/png;charset=UTF-8"), "image/png");
        assert_eq!(strip_parameters("image/png; charset=UTF-8"), "image/png");
        assert_eq!(strip_parameters("image/png"), "image/png");
        assert_eq!(strip_parameters("  text/html ; x=y"), "text/html");
    }

    #[test]
    fn from_mime_accepts_aliases() {
        assert_eq!(IconType::from_mime("image/vnd.microsoft.icon"), Some(IconType::Ico));
        assert_eq!(IconType::from_mime("IMAGE/JPG"), Some(IconType::Jpeg));
        assert_eq!(IconType::from_mime("text/html"), None);
    }

    #[test]
    fn sniff_recognizes_common_formats() {
        let png = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a, 0, 0];
        assert_eq!(sniff(&png), Some(IconType::Png));
        assert_eq!(sniff(b"GIF89a....."), Some(IconType::Gif));
        assert_eq!(sniff(&[0xff, 0xd8, 0xff, 0xe0, 0x00]), Some(IconType::Jpeg));
        assert_eq!(sniff(&[0, 0, 1, 0, 2, 0]), Some(IconType::Ico));
        assert_eq!(sniff(b"RIFF\x00\x00\x00\x00WEBPVP8 "), Some(IconType::Webp));
        assert_eq!(sniff(b"BM\x00\x00"), Some(IconType::Bmp));
    }

    #[test]
    fn sniff_classifies_markup_as_svg() {
        assert_eq!(sniff(b"<svg xmlns=\"...\"/>"), Some(IconType::Svg));
        assert_eq!(sniff(b"  <?xml version=\"1.0\"?><svg/>"), Some(IconType::Svg));
        assert_eq!(
            sniff(b"\xef\xbb\xbf<svg/>"),
            Some(IconType::Svg),
            "BOM before markup"
        );
    }

    #[test]
    fn sniff_unknown_bytes() {
        assert_eq!(sniff(b"plain text"), None);
        assert_eq!(sniff(&[]), None);
        assert_eq!(sniff_or_default(b"plain text"), "image/x-icon");
    }
}
