use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::provider::{
    classify_status, classify_transport_error, error_message, is_credential_message, redact,
    AttemptOutcome, FailureKind, ProbeError, ProviderClient, ProviderKind, ANALYSIS_TEMPERATURE,
};
use crate::schema::analysis_schema;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content {
    role: &'static str,
    parts: Vec<RequestPart>,
}

#[derive(Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
    #[serde(rename = "responseSchema")]
    response_schema: Value,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

#[derive(Deserialize)]
struct ModelInfo {
    name: String,
    #[serde(rename = "supportedGenerationMethods", default)]
    supported_generation_methods: Vec<String>,
}

/// Extracts `candidates[0].content.parts[0].text` from a generateContent
/// envelope. Returns `None` when the body is not an envelope or the text is blank.
pub fn candidate_text(body: &str) -> Option<String> {
    let response: GenerateContentResponse = serde_json::from_str(body).ok()?;
    response
        .candidates
        .into_iter()
        .next()?
        .content?
        .parts
        .into_iter()
        .next()?
        .text
        .filter(|text| !text.trim().is_empty())
}

pub struct GeminiClient {
    http: Client,
    api_key: String,
    base_url: String,
    schema: Value,
}

impl GeminiClient {
    pub fn new(http: Client, api_key: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            schema: analysis_schema(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn generate_url(&self, model: &str) -> String {
        let model = model.trim_start_matches("models/");
        format!("{}/models/{}:generateContent", self.base_url, model)
    }
}

#[async_trait]
impl ProviderClient for GeminiClient {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn enforces_schema(&self) -> bool {
        true
    }

    async fn generate(&self, model: &str, prompt: &str) -> AttemptOutcome {
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![RequestPart {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: GenerationConfig {
                temperature: ANALYSIS_TEMPERATURE,
                response_mime_type: "application/json",
                response_schema: self.schema.clone(),
            },
        };

        let url = self.generate_url(model);
        debug!(model, url = %url, "calling gemini generateContent");

        let response = match self
            .http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .header("Content-Type", "application/json")
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
        let body = redact(&body, &self.api_key);

        if !status.is_success() {
            return classify_status(status.as_u16(), &body);
        }

        match candidate_text(&body) {
            Some(text) => AttemptOutcome::Success(text),
            None => AttemptOutcome::retryable(
                FailureKind::MalformedEnvelope,
                Some(status.as_u16()),
                body,
            ),
        }
    }

    async fn list_models(&self) -> Result<Vec<String>, ProbeError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("key", self.api_key.as_str()), ("pageSize", "1000")])
            .send()
            .await
            .map_err(|e| ProbeError::Failed {
                message: e.without_url().to_string(),
            })?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| ProbeError::Failed {
            message: e.without_url().to_string(),
        })?;
        let body = redact(&body, &self.api_key);

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

        let listing: ListModelsResponse =
            serde_json::from_str(&body).map_err(|e| ProbeError::Failed {
                message: format!("could not parse model listing: {}", e),
            })?;

        Ok(listing
            .models
            .into_iter()
            .filter(|model| {
                model
                    .supported_generation_methods
                    .iter()
                    .any(|method| method == "generateContent")
            })
            .map(|model| model.name.trim_start_matches("models/").to_string())
            .collect())
    }
}
