//! Resilient request orchestration over a ranked list of model candidates.
//!
//! The orchestrator is an explicit state machine: a candidate index, a
//! per-candidate try counter and the last observed failure. Every path
//! ends in a success, a fatal abort or the exhausted state, which runs a
//! single diagnostic model listing before reporting.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::analyzer::AnalysisRequest;
use crate::config::Config;
use crate::error::AnalysisError;
use crate::gemini::GeminiClient;
use crate::openai::OpenAiClient;
use crate::prompt::build_prompt;
use crate::provider::{
    build_http_client, AttemptOutcome, FailureKind, ProbeError, ProviderClient, ProviderKind,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCandidate {
    pub provider: ProviderKind,
    pub model: String,
    #[serde(default)]
    pub order: u32,
}

impl ModelCandidate {
    pub fn new(provider: ProviderKind, model: impl Into<String>, order: u32) -> Self {
        Self {
            provider,
            model: model.into(),
            order,
        }
    }

    pub fn label(&self) -> String {
        format!("{}:{}", self.provider, self.model)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Tries per candidate for transient failures. Values below 1 behave as 1.
    pub max_retries: u32,
    pub rate_limit_base: Duration,
    pub overload_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            rate_limit_base: Duration::from_secs(1),
            overload_base: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    /// Delay before retrying the same candidate after try number `attempt`
    /// (counted from 0). `None` means the failure is not retried in place.
    pub fn backoff_delay(&self, kind: FailureKind, attempt: u32) -> Option<Duration> {
        let base = match kind {
            FailureKind::RateLimited | FailureKind::Network => self.rate_limit_base,
            FailureKind::Overloaded => self.overload_base,
            FailureKind::ModelUnavailable | FailureKind::MalformedEnvelope => return None,
        };
        Some(base.saturating_mul(2u32.saturating_pow(attempt)))
    }

    fn tries_per_candidate(&self) -> u32 {
        self.max_retries.max(1)
    }
}

#[derive(Debug, Clone)]
struct Failure {
    kind: FailureKind,
    message: String,
}

#[derive(Debug)]
enum State {
    SelectingCandidate,
    Attempting,
    Retrying(Duration),
    NextCandidate,
    Exhausted,
}

pub struct Orchestrator {
    candidates: Vec<ModelCandidate>,
    providers: HashMap<ProviderKind, Arc<dyn ProviderClient>>,
    policy: RetryPolicy,
}

impl Orchestrator {
    pub fn new(mut candidates: Vec<ModelCandidate>, policy: RetryPolicy) -> Self {
        candidates.sort_by_key(|candidate| candidate.order);
        Self {
            candidates,
            providers: HashMap::new(),
            policy,
        }
    }

    pub fn with_provider(mut self, client: Arc<dyn ProviderClient>) -> Self {
        self.providers.insert(client.kind(), client);
        self
    }

    /// Builds provider clients for every provider that has a credential.
    pub fn from_config(config: &Config) -> Result<Self, AnalysisError> {
        let http = build_http_client(config.provider.timeout_secs)
            .map_err(|e| AnalysisError::Configuration(format!("could not build HTTP client: {}", e)))?;

        let mut orchestrator = Self::new(config.candidates.clone(), config.retry.policy());

        if let Some(key) = config.provider.api_key.as_deref().filter(|k| !k.trim().is_empty()) {
            let mut client = GeminiClient::new(http.clone(), key);
            if let Some(base_url) = config.provider.base_url.as_deref() {
                client = client.with_base_url(base_url);
            }
            orchestrator = orchestrator.with_provider(Arc::new(client));
        }

        if let Some(key) = config
            .provider
            .openai_api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
        {
            let mut client = OpenAiClient::new(http, key);
            if let Some(base_url) = config.provider.openai_base_url.as_deref() {
                client = client.with_base_url(base_url);
            }
            orchestrator = orchestrator.with_provider(Arc::new(client));
        }

        Ok(orchestrator)
    }

    pub fn candidates(&self) -> &[ModelCandidate] {
        &self.candidates
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Runs the request across the candidates and returns the first
    /// successful raw payload.
    pub async fn run(&self, request: &AnalysisRequest) -> Result<String, AnalysisError> {
        if self.providers.is_empty() {
            return Err(AnalysisError::Credential {
                message: "no API key is configured for any provider".to_string(),
            });
        }

        let context = request.context.as_deref();
        let mut prompts: HashMap<bool, String> = HashMap::new();
        let mut tried: Vec<String> = Vec::new();
        let mut last_failure: Option<Failure> = None;
        let mut index = 0usize;
        let mut attempt = 0u32;
        let mut state = State::SelectingCandidate;

        loop {
            state = match state {
                State::SelectingCandidate => match self.candidates.get(index) {
                    None => State::Exhausted,
                    Some(candidate) if !self.providers.contains_key(&candidate.provider) => {
                        debug!(candidate = %candidate.label(), "skipping candidate without configured client");
                        State::NextCandidate
                    }
                    Some(_) => {
                        attempt = 0;
                        State::Attempting
                    }
                },

                State::Attempting => {
                    let candidate = &self.candidates[index];
                    let client = &self.providers[&candidate.provider];
                    if attempt == 0 {
                        tried.push(candidate.label());
                    }

                    let embed_schema = !client.enforces_schema();
                    let prompt = prompts
                        .entry(embed_schema)
                        .or_insert_with(|| build_prompt(&request.contract_text, context, embed_schema));

                    debug!(candidate = %candidate.label(), attempt = attempt + 1, "attempting analysis");

                    match client.generate(&candidate.model, prompt).await {
                        AttemptOutcome::Success(text) => {
                            info!(candidate = %candidate.label(), attempt = attempt + 1, "analysis succeeded");
                            return Ok(text);
                        }
                        AttemptOutcome::Fatal {
                            credential,
                            status,
                            message,
                        } => {
                            warn!(candidate = %candidate.label(), ?status, credential, "fatal provider failure, aborting");
                            return Err(if credential {
                                AnalysisError::Credential { message }
                            } else {
                                AnalysisError::Upstream {
                                    status: status.unwrap_or(0),
                                    message,
                                }
                            });
                        }
                        AttemptOutcome::Retryable {
                            kind,
                            status,
                            message,
                        } => {
                            warn!(candidate = %candidate.label(), attempt = attempt + 1, ?kind, ?status, "retryable provider failure");
                            last_failure = Some(Failure { kind, message });
                            match self.policy.backoff_delay(kind, attempt) {
                                Some(delay) if attempt + 1 < self.policy.tries_per_candidate() => {
                                    State::Retrying(delay)
                                }
                                _ => State::NextCandidate,
                            }
                        }
                    }
                }

                State::Retrying(delay) => {
                    debug!(delay_ms = delay.as_millis() as u64, "backing off before retry");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    State::Attempting
                }

                State::NextCandidate => {
                    index += 1;
                    State::SelectingCandidate
                }

                State::Exhausted => return Err(self.exhausted(last_failure, tried).await),
            };
        }
    }

    /// Lists the models the primary provider's credential can use.
    pub async fn probe(&self) -> Result<Vec<String>, ProbeError> {
        let client = self
            .candidates
            .iter()
            .find_map(|candidate| self.providers.get(&candidate.provider))
            .or_else(|| self.providers.values().next())
            .ok_or_else(|| ProbeError::Failed {
                message: "no provider client is configured".to_string(),
            })?;
        client.list_models().await
    }

    async fn exhausted(&self, last_failure: Option<Failure>, tried: Vec<String>) -> AnalysisError {
        // A reachable model answered with garbage; listing models adds nothing.
        if let Some(Failure {
            kind: FailureKind::MalformedEnvelope,
            message,
        }) = last_failure
        {
            return AnalysisError::MalformedResponse {
                message: "the provider response did not contain generated text".to_string(),
                raw: message,
            };
        }

        warn!(tried = ?tried, "all model candidates exhausted, probing available models");
        let available = match self.probe().await {
            Ok(models) => {
                info!(count = models.len(), "diagnostic probe listed available models");
                Some(models)
            }
            Err(ProbeError::Unauthorized { status, message }) => {
                warn!(status, "diagnostic probe rejected the credential");
                return AnalysisError::Credential { message };
            }
            Err(ProbeError::Failed { message }) => {
                warn!(%message, "diagnostic probe failed");
                None
            }
        };

        match last_failure {
            Some(Failure {
                kind: FailureKind::RateLimited,
                message,
            }) => AnalysisError::RateLimited { message },
            Some(Failure {
                kind: FailureKind::Overloaded,
                message,
            }) => AnalysisError::ServiceUnavailable { message },
            Some(Failure {
                kind: FailureKind::Network,
                message,
            }) => AnalysisError::Network { message },
            _ => AnalysisError::ModelUnavailable { tried, available },
        }
    }
}
