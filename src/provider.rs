//! Provider client abstraction.
//!
//! A provider client performs exactly one outbound request per call and
//! classifies the result into an [`AttemptOutcome`]. Retry and fallback
//! decisions belong to the orchestrator.

use std::fmt;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Temperature sent with every analysis request.
pub const ANALYSIS_TEMPERATURE: f32 = 0.2;

const MAX_ERROR_MESSAGE_CHARS: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderKind {
    #[serde(rename = "gemini")]
    Gemini,
    #[serde(rename = "openai")]
    OpenAi,
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Gemini => write!(f, "gemini"),
            ProviderKind::OpenAi => write!(f, "openai"),
        }
    }
}

/// Why a retryable attempt failed. Drives the orchestrator's next move.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    RateLimited,
    Overloaded,
    ModelUnavailable,
    Network,
    MalformedEnvelope,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttemptOutcome {
    Success(String),
    Retryable {
        kind: FailureKind,
        status: Option<u16>,
        message: String,
    },
    Fatal {
        credential: bool,
        status: Option<u16>,
        message: String,
    },
}

impl AttemptOutcome {
    pub fn retryable(kind: FailureKind, status: Option<u16>, message: impl Into<String>) -> Self {
        AttemptOutcome::Retryable {
            kind,
            status,
            message: message.into(),
        }
    }
}

/// Failure of the diagnostic model listing.
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeError {
    Unauthorized { status: u16, message: String },
    Failed { message: String },
}

#[async_trait]
pub trait ProviderClient: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Whether the endpoint constrains output to the response schema itself.
    fn enforces_schema(&self) -> bool;

    async fn generate(&self, model: &str, prompt: &str) -> AttemptOutcome;

    /// Lists the models the configured credential can generate content with.
    async fn list_models(&self) -> Result<Vec<String>, ProbeError>;
}

pub fn build_http_client(timeout_secs: Option<u64>) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder();
    if let Some(secs) = timeout_secs.filter(|secs| *secs > 0) {
        builder = builder.timeout(Duration::from_secs(secs));
    }
    builder.build()
}

fn credential_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(?i)(api[ _-]?key[ _-]?(not[ _-]?valid|invalid|expired)|invalid[ _-]api[ _-]key|api_key_invalid|incorrect api key|permission[ _-]denied|unauthenticated)")
            .expect("credential pattern is valid")
    })
}

/// True when an error body says the credential itself is the problem.
pub fn is_credential_message(body: &str) -> bool {
    credential_pattern().is_match(body)
}

/// Pulls a readable message out of a provider error body.
///
/// Both Gemini and OpenAI wrap errors as `{"error": {"message": ...}}`;
/// anything else is returned trimmed and truncated.
pub fn error_message(body: &str) -> String {
    let parsed = serde_json::from_str::<Value>(body).ok();
    let message = parsed
        .as_ref()
        .and_then(|value| value.pointer("/error/message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| body.trim().to_string());
    truncate(&message, MAX_ERROR_MESSAGE_CHARS)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut cut: String = text.chars().take(max_chars).collect();
        cut.push('…');
        cut
    }
}

/// Maps a non-success HTTP status to an attempt outcome.
pub fn classify_status(status: u16, body: &str) -> AttemptOutcome {
    let message = error_message(body);
    match status {
        401 | 403 => AttemptOutcome::Fatal {
            credential: true,
            status: Some(status),
            message,
        },
        429 => AttemptOutcome::retryable(FailureKind::RateLimited, Some(status), message),
        503 => AttemptOutcome::retryable(FailureKind::Overloaded, Some(status), message),
        400 if is_credential_message(body) => AttemptOutcome::Fatal {
            credential: true,
            status: Some(status),
            message,
        },
        // A 400 that is not about the key usually means the model name is
        // not served for this key.
        400 | 404 => AttemptOutcome::retryable(FailureKind::ModelUnavailable, Some(status), message),
        _ => AttemptOutcome::Fatal {
            credential: false,
            status: Some(status),
            message,
        },
    }
}

/// Transport failures (no HTTP response) are retried like rate limits.
pub fn classify_transport_error(err: reqwest::Error) -> AttemptOutcome {
    // The Gemini key travels in the query string; keep it out of messages.
    let err = err.without_url();
    let message = if err.is_timeout() {
        format!("request timed out: {}", err)
    } else {
        err.to_string()
    };
    AttemptOutcome::retryable(FailureKind::Network, None, message)
}

/// Replaces every occurrence of `secret` in `text`.
pub fn redact(text: &str, secret: &str) -> String {
    if secret.is_empty() {
        text.to_string()
    } else {
        text.replace(secret, "[REDACTED]")
    }
}
