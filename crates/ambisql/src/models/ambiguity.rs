use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DB_RELATED: &str = "DB-related ambiguity";
pub const LLM_RELATED: &str = "LLM-related ambiguity";

/// One ambiguity reported by the detection step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AmbiguityItem {
    pub question: String,

    #[serde(rename = "level_1_label", alias = "level1")]
    pub level1: String,

    #[serde(rename = "level_2_label", alias = "level2")]
    pub level2: String,

    /// Either free text or structured choice data (for example candidate columns).
    #[serde(default)]
    pub description: Value,

    /// `None` until choice synthesis ran; an empty list means a free-text answer is expected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
}

impl AmbiguityItem {
    #[must_use]
    pub fn new(
        question: impl Into<String>,
        level1: impl Into<String>,
        level2: impl Into<String>,
        description: Value,
    ) -> Self {
        Self {
            question: question.into(),
            level1: level1.into(),
            level2: level2.into(),
            description,
            choices: None,
        }
    }

    #[must_use]
    pub fn description_text(&self) -> String {
        match &self.description {
            Value::Null => String::new(),
            Value::String(text) => text.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
        }
    }

    #[must_use]
    pub fn expects_free_text(&self) -> bool {
        self.choices.as_ref().is_none_or(Vec::is_empty)
    }

    /// Builds the answer record for this item, ready to be folded into the preference tree.
    #[must_use]
    pub fn answered(&self, answer: impl Into<String>) -> QaAnswer {
        QaAnswer {
            level1: self.level1.clone(),
            level2: self.level2.clone(),
            question: self.question.clone(),
            answer: answer.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub struct QaFact {
    pub question: String,
    pub answer: String,
}

impl QaFact {
    #[must_use]
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
        }
    }
}

/// A user's answer to one ambiguity, still carrying its classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct QaAnswer {
    #[serde(rename = "level_1_label", alias = "level1")]
    pub level1: String,

    #[serde(rename = "level_2_label", alias = "level2")]
    pub level2: String,

    pub question: String,
    pub answer: String,
}

impl QaAnswer {
    #[must_use]
    pub fn fact(&self) -> QaFact {
        QaFact::new(self.question.clone(), self.answer.clone())
    }
}

/// Final payload handed to the SQL-generation collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SqlHandoff {
    pub question: String,
    pub evidence: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "DetectionResultWire", try_from = "DetectionResultWire")]
pub enum DetectionResult {
    Ambiguous { question_set: Vec<AmbiguityItem> },
    Resolved(SqlHandoff),
}

impl DetectionResult {
    #[must_use]
    pub const fn is_ambiguous(&self) -> bool {
        matches!(self, Self::Ambiguous { .. })
    }

    #[must_use]
    pub fn question_set(&self) -> Option<&[AmbiguityItem]> {
        match self {
            Self::Ambiguous { question_set } => Some(question_set),
            Self::Resolved(_) => None,
        }
    }

    #[must_use]
    pub const fn handoff(&self) -> Option<&SqlHandoff> {
        match self {
            Self::Ambiguous { .. } => None,
            Self::Resolved(handoff) => Some(handoff),
        }
    }
}

/// Flat JSON shape of [`DetectionResult`] exchanged with callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DetectionResultWire {
    pub ambiguous: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_set: Option<Vec<AmbiguityItem>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub evidence: Option<String>,
}

impl From<DetectionResult> for DetectionResultWire {
    fn from(result: DetectionResult) -> Self {
        match result {
            DetectionResult::Ambiguous { question_set } => Self {
                ambiguous: true,
                question_set: Some(question_set),
                question: None,
                evidence: None,
            },
            DetectionResult::Resolved(handoff) => Self {
                ambiguous: false,
                question_set: None,
                question: Some(handoff.question),
                evidence: Some(handoff.evidence),
            },
        }
    }
}

impl TryFrom<DetectionResultWire> for DetectionResult {
    type Error = String;

    fn try_from(wire: DetectionResultWire) -> Result<Self, Self::Error> {
        if wire.ambiguous {
            let question_set = wire
                .question_set
                .ok_or_else(|| "ambiguous result requires question_set".to_string())?;
            return Ok(Self::Ambiguous { question_set });
        }

        let question = wire
            .question
            .ok_or_else(|| "resolved result requires question".to_string())?;
        Ok(Self::Resolved(SqlHandoff {
            question,
            evidence: wire.evidence.unwrap_or_default(),
        }))
    }
}

#[must_use]
pub fn detection_result_schema() -> Value {
    schema_value(schemars::schema_for!(DetectionResultWire))
}

#[must_use]
pub fn answer_set_schema() -> Value {
    schema_value(schemars::schema_for!(Vec<QaAnswer>))
}

#[must_use]
pub fn sql_handoff_schema() -> Value {
    schema_value(schemars::schema_for!(SqlHandoff))
}

fn schema_value(schema: schemars::Schema) -> Value {
    match serde_json::to_value(schema) {
        Ok(value) => value,
        Err(error) => {
            panic!("failed to serialize generated schema: {error}");
        }
    }
}
