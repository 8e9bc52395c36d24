use std::fmt::{Debug, Formatter};
use std::time::Duration;

use crate::error::{ClarifyError, ClarifyResult};
use crate::oracle::DEFAULT_MAX_CONCURRENCY;
use crate::utils::redaction::redact_secret;

pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-2024-08-06";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(30 * 60);

pub const ENV_ENDPOINT: &str = "AMBISQL_ORACLE_URL";
pub const ENV_MODEL: &str = "AMBISQL_MODEL";
pub const ENV_API_KEY: &str = "AMBISQL_API_KEY";
pub const ENV_FALLBACK_API_KEY: &str = "OPENAI_API_KEY";
pub const ENV_MAX_CONCURRENCY: &str = "AMBISQL_MAX_CONCURRENCY";

#[derive(Clone, PartialEq, Eq)]
pub struct OracleConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key: Option<String>,
    pub max_concurrency: usize,
    pub timeout: Duration,
}

impl Debug for OracleConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OracleConfig")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field(
                "api_key",
                &self.api_key.as_deref().map(redact_secret),
            )
            .field("max_concurrency", &self.max_concurrency)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Values supplied explicitly on the command line; they win over the environment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OracleOverrides {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub max_concurrency: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub ttl: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_SESSION_TTL,
        }
    }
}

pub fn resolve_oracle_config(
    overrides: &OracleOverrides,
    env: impl Fn(&str) -> Option<String>,
) -> ClarifyResult<OracleConfig> {
    let endpoint = overrides
        .endpoint
        .clone()
        .or_else(|| non_empty(env(ENV_ENDPOINT)))
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
    if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
        return Err(ClarifyError::Config(format!(
            "oracle endpoint must be an http(s) url: {endpoint}"
        )));
    }

    let model = overrides
        .model
        .clone()
        .or_else(|| non_empty(env(ENV_MODEL)))
        .unwrap_or_else(|| DEFAULT_MODEL.to_string());

    let api_key = overrides
        .api_key
        .clone()
        .or_else(|| non_empty(env(ENV_API_KEY)))
        .or_else(|| non_empty(env(ENV_FALLBACK_API_KEY)));

    let max_concurrency = match overrides.max_concurrency {
        Some(limit) => limit,
        None => match non_empty(env(ENV_MAX_CONCURRENCY)) {
            Some(raw) => raw.trim().parse::<usize>().map_err(|_| {
                ClarifyError::Config(format!(
                    "{ENV_MAX_CONCURRENCY} must be a positive integer: {raw}"
                ))
            })?,
            None => DEFAULT_MAX_CONCURRENCY,
        },
    };
    if max_concurrency == 0 {
        return Err(ClarifyError::Config(
            "max_concurrency must be greater than zero".to_string(),
        ));
    }

    Ok(OracleConfig {
        endpoint,
        model,
        api_key,
        max_concurrency,
        timeout: DEFAULT_TIMEOUT,
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|text| !text.trim().is_empty())
}
