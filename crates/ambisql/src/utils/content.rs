pub const DEFAULT_EXCERPT_MAX_CHARS: usize = 160;

/// Single-line, bounded view of an oracle reply for log fields.
#[must_use]
pub fn derive_excerpt(text: &str, max_chars: usize) -> Option<String> {
    if max_chars == 0 {
        return None;
    }

    let normalized = normalize_whitespace(text);
    if normalized.is_empty() {
        return None;
    }

    if normalized.chars().count() <= max_chars {
        return Some(normalized);
    }

    let mut excerpt: String = normalized.chars().take(max_chars).collect();
    excerpt.push_str("...");
    Some(excerpt)
}

#[must_use]
pub fn excerpt(text: &str) -> String {
    derive_excerpt(text, DEFAULT_EXCERPT_MAX_CHARS).unwrap_or_default()
}

#[must_use]
pub fn non_empty_text(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

#[must_use]
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Uppercases the first character, leaving the rest untouched.
#[must_use]
pub fn capitalize_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
