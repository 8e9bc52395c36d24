//! SQL-generation sink for clarified questions.
//!
//! Generated text is cleaned up for display only. It is never validated or executed.

use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use regex::Regex;
use serde::Serialize;
use tracing::debug;

use crate::error::{ClarifyError, ClarifyResult};
use crate::models::SqlHandoff;
use crate::oracle::{LanguageOracle, OracleError};
use crate::parse::{ReplyKind, fenced_block};
use crate::prompts;

pub const DEFAULT_DIALECT: &str = "SQLite";

#[async_trait]
pub trait SqlGenerator: Send + Sync {
    async fn generate(&self, schema: &str, handoff: &SqlHandoff) -> ClarifyResult<String>;
}

/// Statements for the question as first asked and for the clarified question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SqlPair {
    pub raw: String,
    pub clarified: String,
}

pub struct OracleSqlGenerator {
    oracle: Arc<dyn LanguageOracle>,
    dialect: String,
}

impl OracleSqlGenerator {
    #[must_use]
    pub fn new(oracle: Arc<dyn LanguageOracle>, dialect: impl Into<String>) -> Self {
        Self {
            oracle,
            dialect: dialect.into(),
        }
    }

    #[must_use]
    pub fn dialect(&self) -> &str {
        &self.dialect
    }

    /// Generates the unclarified baseline and the clarified statement in one batch.
    pub async fn generate_pair(
        &self,
        schema: &str,
        original_question: &str,
        handoff: &SqlHandoff,
    ) -> ClarifyResult<SqlPair> {
        let requests = vec![
            prompts::sql_generation(&self.dialect, original_question, schema, None),
            prompts::sql_generation(
                &self.dialect,
                &handoff.question,
                schema,
                Some(&handoff.evidence),
            ),
        ];
        let mut replies = self.oracle.call_many(requests).await.into_iter();

        let raw = next_statement(replies.next())?;
        let clarified = next_statement(replies.next())?;
        debug!(dialect = %self.dialect, "generated raw and clarified sql");

        Ok(SqlPair { raw, clarified })
    }
}

#[async_trait]
impl SqlGenerator for OracleSqlGenerator {
    async fn generate(&self, schema: &str, handoff: &SqlHandoff) -> ClarifyResult<String> {
        let messages = prompts::sql_generation(
            &self.dialect,
            &handoff.question,
            schema,
            Some(&handoff.evidence),
        );
        let reply = self.oracle.call(&messages).await?;
        statement_from_reply(&reply)
    }
}

fn next_statement(reply: Option<Result<String, OracleError>>) -> ClarifyResult<String> {
    match reply {
        Some(reply) => statement_from_reply(&reply?),
        None => Err(ClarifyError::malformed(
            ReplyKind::SqlGeneration,
            "batch returned fewer replies than requests",
        )),
    }
}

fn statement_from_reply(reply: &str) -> ClarifyResult<String> {
    let sql = sanitize_sql(reply);
    if sql.is_empty() {
        return Err(ClarifyError::malformed(
            ReplyKind::SqlGeneration,
            "reply contained no SQL",
        ));
    }
    Ok(sql)
}

/// Strips code fences and a leading `SQL:` label, collapses the statement onto
/// trimmed lines and terminates it with `;`.
#[must_use]
pub fn sanitize_sql(text: &str) -> String {
    let body = fenced_block(text).unwrap_or(text);
    let body = sql_label_regex().replace(body.trim(), "");
    let sql = body
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    add_semicolon(sql.trim())
}

#[must_use]
pub fn add_semicolon(sql: &str) -> String {
    let sql = sql.trim();
    if sql.is_empty() || sql.ends_with(';') {
        sql.to_string()
    } else {
        format!("{sql};")
    }
}

fn sql_label_regex() -> &'static Regex {
    static SQL_LABEL_RE: OnceLock<Regex> = OnceLock::new();
    SQL_LABEL_RE.get_or_init(|| {
        Regex::new(r"(?i)^(?:sql|query)\s*:\s*").expect("sql label regex should compile")
    })
}
