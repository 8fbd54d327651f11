//! Redirect target resolution for page and icon fetch chains.

use url::Url;

use crate::urlnorm;

/// Resolve a `Location` header value against the URL that produced it.
/// Handles absolute targets, protocol-relative targets, and host-relative
/// paths.
pub fn resolve_location(current: &Url, location: &str) -> Option<Url> {
    urlnorm::resolve_reference(current, location).ok()
}

/// Where an icon chain goes after a 301/302.
///
/// When the redirecting response already carried an accepted icon
/// content-type the target is followed as given. Otherwise the target's
/// path is replaced with the original request path; hosts that redirect
/// everything to a landing page still get asked for the icon path.
pub fn next_icon_url(
    current: &Url,
    original_path: &str,
    location: &str,
    current_type_accepted: bool,
) -> Option<Url> {
    let target = resolve_location(current, location)?;
    if current_type_accepted {
        return Some(target);
    }
    target.join(original_path).ok()
}
