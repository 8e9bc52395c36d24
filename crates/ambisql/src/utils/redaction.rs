use std::collections::BTreeSet;
use std::sync::OnceLock;

use regex::{Captures, Regex};

pub const REDACTION_TOKEN: &str = "[REDACTED]";

struct CredentialMatcher {
    class_name: &'static str,
    regex: fn() -> &'static Regex,
    replacement: for<'a> fn(&Captures<'a>) -> String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedactedText {
    pub text: String,
    pub redacted: bool,
    pub truncated: bool,
    pub classes: Vec<String>,
}

#[must_use]
pub fn redact_secret(value: &str) -> String {
    if value.is_empty() {
        String::new()
    } else {
        REDACTION_TOKEN.to_string()
    }
}

/// Scrubs credentials echoed back by an oracle endpoint, then bounds the length.
#[must_use]
pub fn redact_and_truncate_text(value: &str, max_chars: usize) -> RedactedText {
    let mut classes = BTreeSet::new();
    let mut scrubbed = value.to_string();

    for matcher in credential_matchers() {
        let replaced = (matcher.regex)()
            .replace_all(&scrubbed, |captures: &Captures<'_>| {
                (matcher.replacement)(captures)
            })
            .into_owned();
        if replaced != scrubbed {
            classes.insert(matcher.class_name.to_string());
            scrubbed = replaced;
        }
    }

    let (text, truncated) = truncate_chars(&scrubbed, max_chars);
    RedactedText {
        text,
        redacted: !classes.is_empty(),
        truncated,
        classes: classes.into_iter().collect(),
    }
}

fn truncate_chars(value: &str, max_chars: usize) -> (String, bool) {
    if value.chars().count() <= max_chars {
        return (value.to_string(), false);
    }
    if max_chars <= 3 {
        return (".".repeat(max_chars), true);
    }

    let prefix = value.chars().take(max_chars - 3).collect::<String>();
    (format!("{prefix}..."), true)
}

fn credential_matchers() -> &'static [CredentialMatcher] {
    static CATALOG: OnceLock<Vec<CredentialMatcher>> = OnceLock::new();
    CATALOG.get_or_init(|| {
        vec![
            CredentialMatcher {
                class_name: "bearer_token",
                regex: bearer_token_regex,
                replacement: replace_bearer_token,
            },
            CredentialMatcher {
                class_name: "api_key",
                regex: api_key_regex,
                replacement: replace_with_token,
            },
            CredentialMatcher {
                class_name: "key_assignment",
                regex: key_assignment_regex,
                replacement: replace_key_assignment,
            },
        ]
    })
}

fn bearer_token_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?i)\bbearer\s+[A-Za-z0-9._=\-]{8,}")
            .expect("bearer token regex should compile")
    })
}

fn api_key_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"\b(?:sk-[A-Za-z0-9_\-]{8,}|ms-[A-Za-z0-9\-]{8,})\b")
            .expect("api key regex should compile")
    })
}

fn key_assignment_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r#"(?i)\b(api[_\-]?key|secret|token)\b(\s*[:=]\s*)([^\s,;"']+)"#)
            .expect("key assignment regex should compile")
    })
}

fn replace_with_token(_captures: &Captures<'_>) -> String {
    REDACTION_TOKEN.to_string()
}

fn replace_bearer_token(_captures: &Captures<'_>) -> String {
    format!("Bearer {REDACTION_TOKEN}")
}

fn replace_key_assignment(captures: &Captures<'_>) -> String {
    format!("{}{}{}", &captures[1], &captures[2], REDACTION_TOKEN)
}
