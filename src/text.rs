//! Text normalization for command and section-name matching
//!
//! Recognizer output is noisy: casing, punctuation, and stray whitespace
//! vary between fragments for the same spoken words. All matching in the
//! daemon happens on normalized text.

use std::sync::OnceLock;

use regex::Regex;

/// Matches every character that is neither a word character nor whitespace.
fn non_word_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^\w\s]").expect("valid pattern"))
}

/// Normalize a raw fragment or section name for matching.
///
/// Strips punctuation, trims surrounding whitespace, and lowercases.
/// Idempotent: normalizing an already-normalized string is a no-op.
pub fn normalize(text: &str) -> String {
    non_word_pattern()
        .replace_all(text, "")
        .trim()
        .to_lowercase()
}
