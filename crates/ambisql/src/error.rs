use thiserror::Error;

use crate::oracle::OracleError;
use crate::parse::ReplyKind;
use crate::rewriter::RoundState;
use crate::session::SessionId;

/// Errors surfaced by the clarification core.
///
/// Every variant leaves the conversation in the state it was in before the
/// failing call, so callers may retry.
#[derive(Debug, Error)]
pub enum ClarifyError {
    #[error("language oracle unavailable: {0}")]
    OracleUnavailable(#[from] OracleError),

    #[error("malformed {kind} reply: {reason}")]
    MalformedOracleReply { kind: ReplyKind, reason: String },

    #[error("invalid transition: `{operation}` is not allowed in state {state}")]
    InvalidTransition {
        operation: &'static str,
        state: RoundState,
    },

    #[error("session not found: {0}")]
    SessionNotFound(SessionId),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ClarifyError {
    pub(crate) fn malformed(kind: ReplyKind, reason: impl Into<String>) -> Self {
        Self::MalformedOracleReply {
            kind,
            reason: reason.into(),
        }
    }

    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::OracleUnavailable(_) => "oracle_unavailable",
            Self::MalformedOracleReply { .. } => "malformed_oracle_reply",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::SessionNotFound(_) => "session_not_found",
            Self::Config(_) => "invalid_configuration",
        }
    }
}

pub type ClarifyResult<T> = Result<T, ClarifyError>;
