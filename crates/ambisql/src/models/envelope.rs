use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::ClarifyError;
use crate::utils::time::{format_unix_ms, unix_timestamp_ms};

pub const CLARIFY_ENVELOPE_SCHEMA_VERSION: &str = "ambisql.clarify-envelope.v1";

pub type ClarifyEnvelopeMeta = BTreeMap<String, Value>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClarifyEnvelopeError {
    pub code: String,
    pub message: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Machine-readable wrapper printed by `--json` commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClarifyEnvelope {
    pub ok: bool,
    pub command: String,
    pub generated_at_utc: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,

    pub meta: ClarifyEnvelopeMeta,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ClarifyEnvelopeError>,
}

/// Carries an error envelope through `anyhow` so `main` can print it verbatim.
#[derive(Debug, Clone)]
pub struct ClarifyEnvelopeFailure {
    envelope: ClarifyEnvelope,
    malformed_reply: bool,
}

impl ClarifyEnvelopeFailure {
    #[must_use]
    pub fn from_error(command: impl Into<String>, error: &ClarifyError) -> Self {
        let envelope = ClarifyEnvelope::error(command, error.code(), error.to_string());
        Self {
            envelope,
            malformed_reply: matches!(error, ClarifyError::MalformedOracleReply { .. }),
        }
    }

    #[must_use]
    pub fn envelope(&self) -> &ClarifyEnvelope {
        &self.envelope
    }

    #[must_use]
    pub const fn is_malformed_reply(&self) -> bool {
        self.malformed_reply
    }
}

impl Display for ClarifyEnvelopeFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match serde_json::to_string(&self.envelope) {
            Ok(encoded) => f.write_str(&encoded),
            Err(_) => f.write_str("clarify envelope serialization failure"),
        }
    }
}

impl std::error::Error for ClarifyEnvelopeFailure {}

impl ClarifyEnvelope {
    #[must_use]
    pub fn ok(command: impl Into<String>, data: Value) -> Self {
        Self::base(command, true).with_data(data)
    }

    #[must_use]
    pub fn error(
        command: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let mut envelope = Self::base(command, false);
        envelope.error = Some(ClarifyEnvelopeError {
            code: code.into(),
            message: message.into(),
            details: None,
        });
        envelope
    }

    fn base(command: impl Into<String>, ok: bool) -> Self {
        let mut meta = ClarifyEnvelopeMeta::new();
        meta.insert(
            "schema_version".to_string(),
            json!(CLARIFY_ENVELOPE_SCHEMA_VERSION),
        );

        Self {
            ok,
            command: command.into(),
            generated_at_utc: format_unix_ms(unix_timestamp_ms()),
            data: None,
            meta,
            error: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    #[must_use]
    pub fn with_meta(mut self, key: impl Into<String>, value: Value) -> Self {
        self.meta.insert(key.into(), value);
        self
    }

    #[must_use]
    pub fn with_error_details(mut self, details: Value) -> Self {
        if let Some(error) = self.error.as_mut() {
            error.details = Some(details);
        }
        self
    }
}
