//! Language oracle contract.
//!
//! The oracle is the external reasoning capability behind every decision point
//! of the clarification loop. The core only relies on a single request/response
//! call plus an order-preserving batch variant with bounded admission.

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Semaphore;

pub use http::{ChatCompletionsOracle, OracleUsage};

pub const DEFAULT_MAX_CONCURRENCY: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum OracleError {
    #[error("missing credential: {0}")]
    MissingCredential(String),

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("endpoint rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("undecodable completion payload: {0}")]
    Decode(String),

    #[error("completion contained no choices")]
    EmptyCompletion,

    #[error("admission limiter closed")]
    AdmissionClosed,
}

#[async_trait]
pub trait LanguageOracle: Send + Sync {
    /// Sends one conversation and returns the completion text.
    async fn call(&self, messages: &[Message]) -> Result<String, OracleError>;

    /// Upper bound on in-flight requests issued by [`LanguageOracle::call_many`].
    fn max_concurrency(&self) -> usize {
        DEFAULT_MAX_CONCURRENCY
    }

    /// Runs independent requests with bounded concurrency.
    ///
    /// Results line up with `requests` by index regardless of completion order.
    async fn call_many(&self, requests: Vec<Vec<Message>>) -> Vec<Result<String, OracleError>> {
        call_bounded(self, &requests, self.max_concurrency()).await
    }
}

pub async fn call_bounded<O>(
    oracle: &O,
    requests: &[Vec<Message>],
    limit: usize,
) -> Vec<Result<String, OracleError>>
where
    O: LanguageOracle + ?Sized,
{
    let admission = Semaphore::new(limit.max(1));
    let admission = &admission;
    let pending = requests.iter().map(|messages| async move {
        let _permit = admission
            .acquire()
            .await
            .map_err(|_| OracleError::AdmissionClosed)?;
        oracle.call(messages).await
    });

    futures::future::join_all(pending).await
}
