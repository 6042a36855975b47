use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::AnalysisError;
use crate::orchestrator::Orchestrator;
use crate::provider::{build_http_client, error_message};
use crate::validator::{normalize_risk_level, parse_analysis};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    #[serde(rename = "contractText", alias = "text")]
    pub contract_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    #[serde(default)]
    pub executive_summary: String,
    #[serde(default)]
    pub contract_type: String,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub risk_clauses: Vec<RiskClause>,
    #[serde(default)]
    pub missing_terms: Vec<String>,
    #[serde(default)]
    pub favorable_terms: Vec<FavorableTerm>,
    #[serde(default)]
    pub practical_recommendations: Vec<String>,
    #[serde(default)]
    pub client_questions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskClause {
    pub clause: String,
    pub reason: String,
    pub impact: String,
    pub recommendation: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavorableTerm {
    pub clause: String,
    pub benefit: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RiskLevel {
    #[serde(rename = "BAIXO")]
    Baixo,
    #[serde(rename = "MÉDIO")]
    Medio,
    #[serde(rename = "ALTO")]
    Alto,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Baixo => "BAIXO",
            RiskLevel::Medio => "MÉDIO",
            RiskLevel::Alto => "ALTO",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// Models occasionally answer "Alto" or "risco médio"; accept any label.
impl<'de> Deserialize<'de> for RiskLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let label = String::deserialize(deserializer)?;
        Ok(normalize_risk_level(&label))
    }
}

/// One way of turning a validated request into a result.
#[async_trait]
pub trait AnalysisBackend: Send + Sync {
    fn name(&self) -> &'static str;

    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError>;
}

/// Calls the provider directly: prompt, orchestrated attempts, validation.
pub struct DirectBackend {
    orchestrator: Orchestrator,
}

impl DirectBackend {
    pub fn new(orchestrator: Orchestrator) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &Orchestrator {
        &self.orchestrator
    }
}

#[async_trait]
impl AnalysisBackend for DirectBackend {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        let raw = self.orchestrator.run(request).await?;
        parse_analysis(&raw)
    }
}

/// Delegates to a trusted backend exposing `POST /api/analyze`.
pub struct RemoteBackend {
    http: Client,
    endpoint: String,
}

#[derive(Deserialize)]
struct BackendErrorBody {
    error: Option<String>,
    message: Option<String>,
}

impl RemoteBackend {
    pub fn new(http: Client, base_url: &str) -> Self {
        Self {
            http,
            endpoint: format!("{}/api/analyze", base_url.trim_end_matches('/')),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl AnalysisBackend for RemoteBackend {
    fn name(&self) -> &'static str {
        "backend"
    }

    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult, AnalysisError> {
        debug!(endpoint = %self.endpoint, "forwarding analysis to backend");
        let response = self
            .http
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| AnalysisError::Network {
                message: e.to_string(),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| AnalysisError::Network {
            message: e.to_string(),
        })?;

        if !status.is_success() {
            let message = serde_json::from_str::<BackendErrorBody>(&body)
                .ok()
                .and_then(|b| b.message.or(b.error))
                .unwrap_or_else(|| {
                    let detail = error_message(&body);
                    if detail.is_empty() {
                        format!("Server error: {}", status.as_u16())
                    } else {
                        format!("Server error: {} ({})", status.as_u16(), detail)
                    }
                });
            warn!(status = status.as_u16(), "backend rejected analysis");
            return Err(AnalysisError::Backend {
                status: status.as_u16(),
                message,
            });
        }

        parse_analysis(&body)
    }
}

/// Entry point for contract analysis.
///
/// Validates the input before any network call and routes it to the
/// backend chosen at construction time.
#[derive(Clone)]
pub struct ContractAnalyzer {
    backend: Arc<dyn AnalysisBackend>,
    max_contract_bytes: usize,
}

impl ContractAnalyzer {
    pub fn new(backend: Arc<dyn AnalysisBackend>, max_contract_bytes: usize) -> Self {
        Self {
            backend,
            max_contract_bytes,
        }
    }

    /// Picks the trusted backend when enabled, the direct pipeline otherwise.
    pub fn from_config(config: &Config) -> Result<Self, AnalysisError> {
        if config.backend.enabled {
            let url = config.backend.url.as_deref().ok_or_else(|| {
                AnalysisError::Configuration("backend mode is enabled but no backend URL is set".to_string())
            })?;
            let http = build_http_client(config.provider.timeout_secs).map_err(|e| {
                AnalysisError::Configuration(format!("could not build HTTP client: {}", e))
            })?;
            return Ok(Self::new(
                Arc::new(RemoteBackend::new(http, url)),
                config.limits.max_contract_bytes,
            ));
        }
        Self::direct_from_config(config)
    }

    /// Always calls the provider directly. Used by the backend server itself.
    pub fn direct_from_config(config: &Config) -> Result<Self, AnalysisError> {
        let orchestrator = Orchestrator::from_config(config)?;
        Ok(Self::new(
            Arc::new(DirectBackend::new(orchestrator)),
            config.limits.max_contract_bytes,
        ))
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    pub fn max_contract_bytes(&self) -> usize {
        self.max_contract_bytes
    }

    pub fn validate_request(
        &self,
        contract_text: &str,
        context: Option<&str>,
    ) -> Result<AnalysisRequest, AnalysisError> {
        if contract_text.trim().is_empty() {
            return Err(AnalysisError::EmptyContract);
        }
        if contract_text.len() > self.max_contract_bytes {
            return Err(AnalysisError::ContractTooLarge {
                size: contract_text.len(),
                max: self.max_contract_bytes,
            });
        }
        Ok(AnalysisRequest {
            contract_text: contract_text.to_string(),
            context: context
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string),
        })
    }

    pub async fn analyze(
        &self,
        contract_text: &str,
        context: Option<&str>,
    ) -> Result<AnalysisResult, AnalysisError> {
        let request = self.validate_request(contract_text, context)?;
        debug!(
            backend = self.backend.name(),
            bytes = request.contract_text.len(),
            has_context = request.context.is_some(),
            "starting contract analysis"
        );

        let result = self.backend.analyze(&request).await;
        match &result {
            Ok(analysis) => info!(risk = %analysis.risk_level, clauses = analysis.risk_clauses.len(), "contract analysis completed"),
            Err(e) => warn!(error = %e, "contract analysis failed"),
        }
        result
    }
}
