/// At most this many texts are kept per cycle.
pub const MAX_IMPORTANT_TEXTS: usize = 3;
/// Longest all-caps string treated as signage.
pub const SIGNAGE_MAX_CHARS: usize = 20;

/// Substrings (case-insensitive) that make OCR text worth announcing.
pub const IMPORTANT_KEYWORDS: &[&str] = &[
    "exit",
    "entrance",
    "danger",
    "warning",
    "caution",
    "stop",
    "stairs",
    "elevator",
    "restroom",
    "emergency",
    "no entry",
    "room",
    "floor",
    "open",
    "closed",
];

/// Keep safety-relevant text and short all-caps signage, in input order.
pub fn select<S: AsRef<str>>(texts: &[S]) -> Vec<String> {
    texts
        .iter()
        .map(AsRef::as_ref)
        .filter(|text| is_important(text))
        .take(MAX_IMPORTANT_TEXTS)
        .map(str::to_string)
        .collect()
}

pub fn is_important(text: &str) -> bool {
    let lower = text.to_lowercase();
    IMPORTANT_KEYWORDS.iter().any(|kw| lower.contains(kw)) || is_short_signage(text)
}

/// All cased characters upper-case (at least one), and short.
fn is_short_signage(text: &str) -> bool {
    text.chars().any(char::is_uppercase)
        && !text.chars().any(char::is_lowercase)
        && text.chars().count() <= SIGNAGE_MAX_CHARS
}
