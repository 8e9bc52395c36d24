#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use ambisql::oracle::{LanguageOracle, Message, OracleError};
use async_trait::async_trait;
use serde_json::{Value, json};

pub const VIETNAM_QUESTION: &str =
    "How many drivers born after the end of Vietnam War have been ranked 2?";
pub const TEMPORAL_SCOPE: &str = "Ambiguous temporal/spatial scope";
pub const SCHEMA_REFERENCE: &str = "Unclear schema reference";

/// Replays queued replies in call order and records every request.
pub struct ScriptedOracle {
    replies: Mutex<VecDeque<Result<String, OracleError>>>,
    requests: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedOracle {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_results(replies.into_iter().map(|reply| Ok(reply.into())))
    }

    pub fn with_results<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = Result<String, OracleError>>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn requests(&self) -> Vec<Vec<Message>> {
        self.requests.lock().expect("request log lock").clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().expect("request log lock").len()
    }

    pub fn remaining(&self) -> usize {
        self.replies.lock().expect("reply queue lock").len()
    }

    /// User prompt of the `index`-th request.
    pub fn user_prompt(&self, index: usize) -> String {
        self.requests()[index]
            .last()
            .map(|message| message.content.clone())
            .expect("request should carry a user message")
    }
}

#[async_trait]
impl LanguageOracle for ScriptedOracle {
    async fn call(&self, messages: &[Message]) -> Result<String, OracleError> {
        self.requests
            .lock()
            .expect("request log lock")
            .push(messages.to_vec());
        self.replies
            .lock()
            .expect("reply queue lock")
            .pop_front()
            .unwrap_or_else(|| Err(OracleError::Transport("script exhausted".to_string())))
    }
}

/// Answers each request from a closure over the user prompt, independent of call order.
pub struct RoutedOracle<F> {
    route: F,
    calls: Mutex<usize>,
}

impl<F> RoutedOracle<F>
where
    F: Fn(&str) -> Result<String, OracleError> + Send + Sync,
{
    pub fn new(route: F) -> Self {
        Self {
            route,
            calls: Mutex::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().expect("call counter lock")
    }
}

#[async_trait]
impl<F> LanguageOracle for RoutedOracle<F>
where
    F: Fn(&str) -> Result<String, OracleError> + Send + Sync,
{
    async fn call(&self, messages: &[Message]) -> Result<String, OracleError> {
        *self.calls.lock().expect("call counter lock") += 1;
        let prompt = messages
            .last()
            .map(|message| message.content.as_str())
            .unwrap_or_default();
        (self.route)(prompt)
    }
}

/// Rejects every call the way an endpoint without credentials does.
pub struct FailingOracle;

#[async_trait]
impl LanguageOracle for FailingOracle {
    async fn call(&self, _messages: &[Message]) -> Result<String, OracleError> {
        Err(OracleError::MissingCredential("no api key configured".to_string()))
    }
}

pub fn drivers_schema() -> String {
    json!({
        "tables": [
            {"name": "drivers", "columns": ["driverId", "forename", "surname", "dob"]},
            {"name": "results", "columns": ["resultId", "driverId", "rank"]},
            {"name": "driverStandings", "columns": ["driverStandingsId", "driverId", "position"]}
        ]
    })
    .to_string()
}

pub fn detection_reply(items: &[Value]) -> String {
    json!({"has_ambiguity": !items.is_empty(), "question_set": items}).to_string()
}

pub fn vietnam_item() -> Value {
    json!({
        "question": "Do you mean drivers born after the end day or the end year of the Vietnam War?",
        "level_1_label": "LLM-related ambiguity",
        "level_2_label": TEMPORAL_SCOPE,
        "description": "The war ended on 1975-04-30; the end year is 1975."
    })
}

pub fn ranking_item() -> Value {
    json!({
        "question": "Which column should be used to rank the drivers?",
        "level_1_label": "DB-related ambiguity",
        "level_2_label": SCHEMA_REFERENCE,
        "description": {
            "columns": [
                {"table_name": "results", "column_name": "rank"},
                {"table_name": "driverStandings", "column_name": "position"}
            ]
        }
    })
}

pub fn choices_reply(choices: &[&str]) -> String {
    json!({ "choices": choices }).to_string()
}

pub fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system time should be after unix epoch")
        .as_nanos();
    std::env::temp_dir().join(format!("{prefix}-{nanos}"))
}
