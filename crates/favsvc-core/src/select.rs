//! Reducing settled candidate fetches to the single best icon.

use crate::fetch::FetchedIcon;

/// Pick the largest icon by byte length from submission-ordered slots.
///
/// Slots are indexed by submission order, not completion order, so the
/// result is deterministic regardless of network timing. Ties go to the
/// first-seen slot; zero-length payloads are never selected.
pub fn select_largest(outcomes: &[Option<FetchedIcon>]) -> Option<&FetchedIcon> {
    let mut best: Option<&FetchedIcon> = None;
    let mut best_len = 0usize;

    for icon in outcomes.iter().flatten() {
        if icon.bytes.len() > best_len {
            best_len = icon.bytes.len();
            best = Some(icon);
        }
    }

    best
}
