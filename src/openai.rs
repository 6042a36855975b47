use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::provider::{
    classify_status, classify_transport_error, error_message, is_credential_message,
    AttemptOutcome, FailureKind, ProbeError, ProviderClient, ProviderKind, ANALYSIS_TEMPERATURE,
};

pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: Option<ChatResponseMessage>,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ModelList {
    #[serde(default)]
    data: Vec<ModelEntry>,
}

#[derive(Deserialize)]
struct ModelEntry {
    id: String,
}

fn choice_text(body: &str) -> Option<String> {
    let response: ChatResponse = serde_json::from_str(body).ok()?;
    response
        .choices
        .into_iter()
        .next()?
        .message?
        .content
        .filter(|text| !text.trim().is_empty())
}

/// Client for OpenAI-compatible chat completion endpoints (OpenAI, Azure
/// deployments behind a compatible gateway, local Ollama `/v1`).
///
/// These endpoints do not enforce the response schema, so the prompt
/// carries it instead.
pub struct OpenAiClient {
    http: Client,
    api_key: String,
    base_url: String,
}

impl OpenAiClient {
    pub fn new(http: Client, api_key: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl ProviderClient for OpenAiClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn enforces_schema(&self) -> bool {
        false
    }

    async fn generate(&self, model: &str, prompt: &str) -> AttemptOutcome {
        let request = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: ANALYSIS_TEMPERATURE,
        };

        let url = format!("{}/chat/completions", self.base_url);
        debug!(model, url = %url, "calling chat completions");

        let response = match self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => return classify_transport_error(e),
        };

        let status = response.status();
        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return classify_transport_error(e),
        };

        if !status.is_success() {
            return classify_status(status.as_u16(), &body);
        }

        match choice_text(&body) {
            Some(text) => AttemptOutcome::Success(text),
            None => AttemptOutcome::retryable(
                FailureKind::MalformedEnvelope,
                Some(status.as_u16()),
                body,
            ),
        }
    }

    async fn list_models(&self) -> Result<Vec<String>, ProbeError> {
        let response = self
            .http
            .get(format!("{}/models", self.base_url))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| ProbeError::Failed {
                message: e.to_string(),
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| ProbeError::Failed {
            message: e.to_string(),
        })?;

        if status == 401 || status == 403 || (status == 400 && is_credential_message(&body)) {
            return Err(ProbeError::Unauthorized {
                status,
                message: error_message(&body),
            });
        }
        if !(200..300).contains(&status) {
            return Err(ProbeError::Failed {
                message: format!("HTTP {}: {}", status, error_message(&body)),
            });
        }

        let listing: ModelList = serde_json::from_str(&body).map_err(|e| ProbeError::Failed {
            message: format!("could not parse model listing: {}", e),
        })?;
        Ok(listing.data.into_iter().map(|model| model.id).collect())
    }
}
