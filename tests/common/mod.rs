#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;
use tokio::time::Instant;

use themis_scan::provider::{AttemptOutcome, FailureKind, ProbeError, ProviderClient, ProviderKind};

pub fn sample_analysis_json() -> String {
    json!({
        "executiveSummary": "Contrato de prestação de serviços de TI por 12 meses.",
        "contractType": "Prestação de Serviços",
        "riskLevel": "ALTO",
        "riskClauses": [{
            "clause": "Cláusula 7 - Multa rescisória de 100% do valor total",
            "reason": "Multa desproporcional ao dano",
            "impact": "Contratante",
            "recommendation": "Limitar a multa a 10% do saldo remanescente"
        }],
        "missingTerms": ["Confidencialidade", "Proteção de dados (LGPD)"],
        "favorableTerms": [{
            "clause": "Cláusula 3 - Pagamento em 30 dias",
            "benefit": "Prazo confortável de pagamento"
        }],
        "practicalRecommendations": ["Renegociar a multa", "Incluir cláusula de LGPD"],
        "clientQuestions": ["Qual o prazo desejado de aviso prévio?"]
    })
    .to_string()
}

pub fn success() -> AttemptOutcome {
    AttemptOutcome::Success(sample_analysis_json())
}

pub fn rate_limited() -> AttemptOutcome {
    AttemptOutcome::retryable(FailureKind::RateLimited, Some(429), "Resource has been exhausted")
}

pub fn overloaded() -> AttemptOutcome {
    AttemptOutcome::retryable(FailureKind::Overloaded, Some(503), "The model is overloaded")
}

pub fn network_error() -> AttemptOutcome {
    AttemptOutcome::retryable(FailureKind::Network, None, "error sending request: connection reset")
}

pub fn not_found() -> AttemptOutcome {
    AttemptOutcome::retryable(FailureKind::ModelUnavailable, Some(404), "model is not found")
}

pub fn unauthorized() -> AttemptOutcome {
    AttemptOutcome::Fatal {
        credential: true,
        status: Some(401),
        message: "API key not valid".to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct Call {
    pub model: String,
    pub prompt: String,
    pub at: Instant,
}

/// Provider double that replays a per-model script of outcomes.
///
/// The last scripted outcome repeats once the script runs out; models
/// without a script answer "not found".
pub struct ScriptedProvider {
    kind: ProviderKind,
    enforces_schema: bool,
    scripts: Mutex<HashMap<String, VecDeque<AttemptOutcome>>>,
    probe_result: Mutex<Result<Vec<String>, ProbeError>>,
    calls: Mutex<Vec<Call>>,
    probe_calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(kind: ProviderKind) -> Self {
        Self {
            kind,
            enforces_schema: kind == ProviderKind::Gemini,
            scripts: Mutex::new(HashMap::new()),
            probe_result: Mutex::new(Ok(Vec::new())),
            calls: Mutex::new(Vec::new()),
            probe_calls: AtomicUsize::new(0),
        }
    }

    pub fn script(self, model: &str, outcomes: Vec<AttemptOutcome>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(model.to_string(), outcomes.into());
        self
    }

    pub fn probe(self, result: Result<Vec<String>, ProbeError>) -> Self {
        *self.probe_result.lock().unwrap() = result;
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn models_called(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.model).collect()
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderClient for ScriptedProvider {
    fn kind(&self) -> ProviderKind {
        self.kind
    }

    fn enforces_schema(&self) -> bool {
        self.enforces_schema
    }

    async fn generate(&self, model: &str, prompt: &str) -> AttemptOutcome {
        self.calls.lock().unwrap().push(Call {
            model: model.to_string(),
            prompt: prompt.to_string(),
            at: Instant::now(),
        });

        let mut scripts = self.scripts.lock().unwrap();
        match scripts.get_mut(model) {
            Some(queue) if queue.len() > 1 => queue.pop_front().unwrap_or_else(not_found),
            Some(queue) => queue.front().cloned().unwrap_or_else(not_found),
            None => not_found(),
        }
    }

    async fn list_models(&self) -> Result<Vec<String>, ProbeError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        self.probe_result.lock().unwrap().clone()
    }
}

/// Serves `router` on an ephemeral local port and returns its base URL.
pub async fn spawn_stub(router: axum::Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

/// A base URL on which nothing is listening.
pub async fn refused_base_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}
