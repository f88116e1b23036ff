// promptforge — Keyword engine
//
// Deterministic term extraction and overlap scoring. No fuzzy matching:
// two keywords match only when they are the same token.

use std::collections::BTreeSet;

/// Words carrying no selection signal.
pub const STOP_WORDS: &[&str] = &[
    "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with", "by",
    "from", "as", "is", "are", "was", "were", "be", "been", "have", "has", "had", "do", "does",
    "did", "will", "would", "should", "could", "may", "might", "must", "can", "this", "that",
    "these", "those", "i", "you", "he", "she", "it", "we", "they",
];

/// Tokens shorter than this are discarded.
pub const MIN_KEYWORD_LEN: usize = 3;

/// Extract the salient terms of `text`.
///
/// Lower-cases, splits on non-alphanumeric boundaries, drops stop-words and
/// tokens shorter than [`MIN_KEYWORD_LEN`] characters.
pub fn extract_keywords(text: &str) -> BTreeSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|token| token.chars().count() >= MIN_KEYWORD_LEN)
        .filter(|token| !STOP_WORDS.contains(token))
        .map(str::to_string)
        .collect()
}

/// Fraction of `query` keywords present in `candidate`, in `[0, 1]`.
///
/// An empty query scores 0 against anything.
pub fn matches(query: &BTreeSet<String>, candidate: &BTreeSet<String>) -> f64 {
    let hits = query.intersection(candidate).count();
    hits as f64 / query.len().max(1) as f64
}
