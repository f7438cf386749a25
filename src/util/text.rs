//! Text helpers shared by the cleansing stages and response parsers.
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;

static CODE_FENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^\s*```[A-Za-z0-9_-]*\s*\n?(.*?)\n?\s*```\s*$").expect("valid fence regex")
});

/// Comparison key for labels: NFC, collapsed whitespace, lowercase.
///
/// `label_key(label_key(x)) == label_key(x)` for every input.
#[must_use]
pub(crate) fn label_key(label: &str) -> String {
    let normalized: String = label.nfc().collect();
    normalized
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Trims whitespace, surrounding quotes and trailing sentence punctuation
/// from a single-label model response.
#[must_use]
pub(crate) fn clean_label(response: &str) -> String {
    let collapsed = response.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '*' | '.' | '!' | ' '))
        .to_string()
}

/// Case-insensitive substring test.
#[must_use]
pub(crate) fn contains_case_insensitive(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

/// Removes a surrounding markdown code fence, if any.
#[must_use]
pub(crate) fn strip_code_fence(response: &str) -> &str {
    CODE_FENCE
        .captures(response)
        .and_then(|captures| captures.get(1))
        .map_or_else(|| response.trim(), |inner| inner.as_str().trim())
}
