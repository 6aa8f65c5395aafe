//! Media items reported as missing subtitles, and the keys used to track them.

mod types;

pub use types::*;

/// Normalize a raw title into a subject key.
///
/// Lower-cases, trims and collapses every whitespace run to a single space.
pub fn normalize_subject_key(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}
