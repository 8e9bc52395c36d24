use std::sync::OnceLock;

use regex::Regex;
use serde_json::Value;

use super::{JsonShape, extract_json_span, fenced_block, normalize_python_literals};
use crate::utils::content::capitalize_first;

const CHOICE_KEYS: &[&str] = &["choices", "options"];

/// Which step of the fallback chain produced the options.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceSource {
    JsonArray,
    JsonObject,
    MarkdownList,
    QuestionDisjunction,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChoicesReply {
    Options {
        choices: Vec<String>,
        source: ChoiceSource,
    },
    FreeText,
}

impl ChoicesReply {
    #[must_use]
    pub fn into_choices(self) -> Vec<String> {
        match self {
            Self::Options { choices, .. } => choices,
            Self::FreeText => Vec::new(),
        }
    }
}

/// Runs the full fallback chain.
///
/// `reply` is `None` when the oracle call itself failed; the question text is
/// still consulted in that case.
#[must_use]
pub fn parse_choices_reply(reply: Option<&str>, question: &str) -> ChoicesReply {
    if let Some(reply) = reply {
        if let Some(choices) = choices_from_json_array(reply) {
            return options(choices, ChoiceSource::JsonArray);
        }
        if let Some(choices) = choices_from_json_object(reply) {
            return options(choices, ChoiceSource::JsonObject);
        }
        if let Some(choices) = choices_from_markdown_list(reply) {
            return options(choices, ChoiceSource::MarkdownList);
        }
    }

    match choices_from_question(question) {
        Some(choices) => options(choices, ChoiceSource::QuestionDisjunction),
        None => ChoicesReply::FreeText,
    }
}

/// Splits an explicit disjunction such as "Do you mean the end day or the end year?".
#[must_use]
pub fn choices_from_question(question: &str) -> Option<Vec<String>> {
    let stripped = leading_prompt_regex().replace(question.trim(), "");
    let stripped = stripped.trim().trim_end_matches(['?', '.', ' ']);
    if !or_word_regex().is_match(stripped) {
        return None;
    }

    let parts: Vec<String> = or_word_regex()
        .split(stripped)
        .map(|part| part.trim_matches(|ch: char| ch == ' ' || ch == '.' || ch == ','))
        .filter(|part| !part.is_empty())
        .map(capitalize_first)
        .collect();

    (parts.len() >= 2).then_some(parts)
}

fn options(choices: Vec<String>, source: ChoiceSource) -> ChoicesReply {
    ChoicesReply::Options { choices, source }
}

fn choices_from_json_array(reply: &str) -> Option<Vec<String>> {
    let span = extract_json_span(reply, JsonShape::Array)?;
    // An array nested in an object is handled by the object step.
    if let Some(object) = extract_json_span(reply, JsonShape::Object)
        && encloses(reply, object, span)
    {
        return None;
    }

    let value: Value = serde_json::from_str(&normalize_python_literals(span)).ok()?;
    string_list(&value)
}

/// Both spans must be slices of `text`.
fn encloses(text: &str, outer: &str, inner: &str) -> bool {
    let base = text.as_ptr() as usize;
    let outer_start = outer.as_ptr() as usize - base;
    let inner_start = inner.as_ptr() as usize - base;
    outer_start < inner_start && inner_start + inner.len() <= outer_start + outer.len()
}

fn choices_from_json_object(reply: &str) -> Option<Vec<String>> {
    let span = extract_json_span(reply, JsonShape::Object)?;
    let value: Value = serde_json::from_str(&normalize_python_literals(span)).ok()?;
    let object = value.as_object()?;

    CHOICE_KEYS
        .iter()
        .filter_map(|key| object.get(*key))
        .find_map(string_list)
}

fn choices_from_markdown_list(reply: &str) -> Option<Vec<String>> {
    let body = fenced_block(reply).unwrap_or(reply);
    let choices: Vec<String> = body
        .lines()
        .filter_map(|line| list_item_regex().captures(line))
        .filter_map(|captures| captures.get(1))
        .map(|item| item.as_str().trim().to_string())
        .filter(|item| !item.is_empty())
        .collect();

    (!choices.is_empty()).then_some(choices)
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    let items = value.as_array()?;
    let mut choices = Vec::with_capacity(items.len());
    for item in items {
        let text = item.as_str()?.trim();
        if !text.is_empty() {
            choices.push(text.to_string());
        }
    }

    (!choices.is_empty()).then_some(choices)
}

fn leading_prompt_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?i)^do\s+you\s+mean\s*").expect("leading prompt regex should compile")
    })
}

fn or_word_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| Regex::new(r"(?i)\s+or\s+").expect("or regex should compile"))
}

fn list_item_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"^\s*(?:[-*\u{2022}]|\d+[.)])\s+(.+?)\s*$")
            .expect("list item regex should compile")
    })
}
