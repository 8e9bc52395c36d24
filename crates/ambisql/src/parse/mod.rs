//! Oracle reply parsing.
//!
//! Replies are free text that usually, but not always, contain the JSON the
//! prompt asked for. Each call site gets its own reply type with a strict
//! parser; leniency lives in the extraction helpers and the choice fallback
//! chain only.

pub mod choices;

use std::fmt::{Display, Formatter};
use std::sync::OnceLock;

use regex::Regex;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::Value;

use crate::error::{ClarifyError, ClarifyResult};
use crate::models::{AmbiguityItem, QaFact};
use crate::utils::content::{excerpt, non_empty_text};

pub use choices::{ChoiceSource, ChoicesReply, choices_from_question, parse_choices_reply};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReplyKind {
    Detection,
    Merge,
    Choices,
    Refinement,
    SqlGeneration,
}

impl ReplyKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Detection => "detection",
            Self::Merge => "merge",
            Self::Choices => "choices",
            Self::Refinement => "refinement",
            Self::SqlGeneration => "sql_generation",
        }
    }
}

impl Display for ReplyKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JsonShape {
    Object,
    Array,
}

/// Outcome of one ambiguity-detection call.
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionReply {
    Clear,
    Ambiguous(Vec<AmbiguityItem>),
}

/// The merged fact list proposed by the oracle for one leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeReply {
    pub facts: Vec<QaFact>,
}

/// The refined question text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefinementReply {
    pub question: String,
}

#[derive(Deserialize)]
struct DetectionWire {
    #[serde(deserialize_with = "lenient_bool")]
    has_ambiguity: bool,

    #[serde(default)]
    question_set: Option<Vec<AmbiguityItem>>,
}

/// Returns the contents of the first fenced code block, preferring a `json` fence.
#[must_use]
pub fn fenced_block(text: &str) -> Option<&str> {
    json_fence_regex()
        .captures(text)
        .or_else(|| any_fence_regex().captures(text))
        .and_then(|captures| captures.get(1))
        .map(|body| body.as_str().trim())
}

/// Narrows a reply to the widest span that looks like the requested JSON shape.
///
/// A fenced block is searched first; the whole reply is searched when the
/// fence holds no such span.
#[must_use]
pub fn extract_json_span(text: &str, shape: JsonShape) -> Option<&str> {
    fenced_block(text)
        .and_then(|body| widest_span(body, shape))
        .or_else(|| widest_span(text, shape))
}

fn widest_span(candidate: &str, shape: JsonShape) -> Option<&str> {
    let (open, close) = match shape {
        JsonShape::Object => ('{', '}'),
        JsonShape::Array => ('[', ']'),
    };

    let start = candidate.find(open)?;
    let end = candidate.rfind(close)?;
    (end > start).then(|| &candidate[start..=end])
}

/// Rewrites bare `True`, `False` and `None` tokens outside string literals into JSON literals.
#[must_use]
pub fn normalize_python_literals(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    let mut word = String::new();

    let flush = |word: &mut String, out: &mut String| {
        match word.as_str() {
            "True" => out.push_str("true"),
            "False" => out.push_str("false"),
            "None" => out.push_str("null"),
            other => out.push_str(other),
        }
        word.clear();
    };

    for ch in text.chars() {
        if in_string {
            normalized.push(ch);
            if escaped {
                escaped = false;
            } else if ch == '\\' {
                escaped = true;
            } else if ch == '"' {
                in_string = false;
            }
            continue;
        }

        if ch.is_alphanumeric() || ch == '_' {
            word.push(ch);
            continue;
        }

        flush(&mut word, &mut normalized);
        if ch == '"' {
            in_string = true;
        }
        normalized.push(ch);
    }
    flush(&mut word, &mut normalized);

    normalized
}

/// Extracts and decodes a JSON value of the given shape from a free-text reply.
pub fn parse_json_reply(text: &str, shape: JsonShape, kind: ReplyKind) -> ClarifyResult<Value> {
    let span = extract_json_span(text, shape).ok_or_else(|| {
        ClarifyError::malformed(
            kind,
            format!("no JSON {} found in reply: {}", shape_name(shape), excerpt(text)),
        )
    })?;

    let normalized = normalize_python_literals(span);
    serde_json::from_str(&normalized).map_err(|error| {
        ClarifyError::malformed(kind, format!("{error} in reply: {}", excerpt(text)))
    })
}

pub fn parse_detection_reply(text: &str) -> ClarifyResult<DetectionReply> {
    let value = parse_json_reply(text, JsonShape::Object, ReplyKind::Detection)?;
    let wire: DetectionWire = serde_json::from_value(value)
        .map_err(|error| ClarifyError::malformed(ReplyKind::Detection, error.to_string()))?;

    let items = wire.question_set.unwrap_or_default();
    if !wire.has_ambiguity || items.is_empty() {
        return Ok(DetectionReply::Clear);
    }

    if let Some(position) = items
        .iter()
        .position(|item| item.question.trim().is_empty())
    {
        return Err(ClarifyError::malformed(
            ReplyKind::Detection,
            format!("question_set[{position}] has an empty question"),
        ));
    }

    Ok(DetectionReply::Ambiguous(items))
}

pub fn parse_merge_reply(text: &str) -> ClarifyResult<MergeReply> {
    let value = parse_json_reply(text, JsonShape::Array, ReplyKind::Merge)?;
    let facts: Vec<QaFact> = serde_json::from_value(value)
        .map_err(|error| ClarifyError::malformed(ReplyKind::Merge, error.to_string()))?;

    Ok(MergeReply { facts })
}

pub fn parse_refinement_reply(text: &str) -> ClarifyResult<RefinementReply> {
    let body = fenced_block(text).unwrap_or(text).trim();
    let body = refinement_label_regex().replace(body, "");
    let body = body.trim().trim_matches(|ch| ch == '"' || ch == '\'' || ch == '`');

    non_empty_text(body)
        .map(|question| RefinementReply { question })
        .ok_or_else(|| ClarifyError::malformed(ReplyKind::Refinement, "empty refined question"))
}

fn shape_name(shape: JsonShape) -> &'static str {
    match shape {
        JsonShape::Object => "object",
        JsonShape::Array => "array",
    }
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::Bool(flag) => Ok(flag),
        Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" => Ok(true),
            "false" | "no" => Ok(false),
            other => Err(de::Error::custom(format!("invalid boolean string `{other}`"))),
        },
        Value::Number(number) => Ok(number.as_i64().is_some_and(|n| n != 0)),
        other => Err(de::Error::custom(format!("invalid boolean value `{other}`"))),
    }
}

fn json_fence_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?is)```json\s*(.*?)```").expect("json fence regex should compile")
    })
}

fn any_fence_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?s)```[A-Za-z0-9_-]*\s*(.*?)```").expect("code fence regex should compile")
    })
}

fn refinement_label_regex() -> &'static Regex {
    static REGEX: OnceLock<Regex> = OnceLock::new();
    REGEX.get_or_init(|| {
        Regex::new(r"(?i)^(?:rewritten|refined)\s+question\s*:\s*")
            .expect("refinement label regex should compile")
    })
}
