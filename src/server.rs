//! Trusted backend endpoint: `POST /api/analyze`.
//!
//! The provider credential stays on the server; callers only ever see
//! the normalized error body `{ "error": ..., "message": ... }`.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{rejection::JsonRejection, DefaultBodyLimit, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, MethodRouter},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::analyzer::ContractAnalyzer;
use crate::config::Config;

/// Extra room on top of the escaped contract for JSON framing and context.
const BODY_LIMIT_SLACK: usize = 64 * 1024;

/// Worst-case JSON growth per contract byte (a control byte becomes `\u00XX`).
const JSON_ESCAPE_FACTOR: usize = 6;

#[derive(Clone)]
pub struct AppState {
    analyzer: Arc<ContractAnalyzer>,
    allowed_origin: Option<String>,
}

impl AppState {
    pub fn new(analyzer: ContractAnalyzer, allowed_origin: Option<String>) -> Self {
        Self {
            analyzer: Arc::new(analyzer),
            allowed_origin,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeBody {
    #[serde(rename = "contractText", alias = "text")]
    contract_text: Option<String>,
    context: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

pub fn router(state: AppState) -> Router {
    let limit = body_limit(state.analyzer.max_contract_bytes());

    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/analyze", analyze_route())
        .route("/analyze", analyze_route())
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(limit))
        .layer(middleware::from_fn_with_state(state.clone(), cors))
        .with_state(state)
}

/// Request body cap for a given contract limit. The exact contract limit is
/// enforced on the decoded text by the analyzer.
pub fn body_limit(max_contract_bytes: usize) -> usize {
    max_contract_bytes
        .saturating_mul(JSON_ESCAPE_FACTOR)
        .saturating_add(BODY_LIMIT_SLACK)
}

fn analyze_route() -> MethodRouter<AppState> {
    post(analyze)
        .options(preflight)
        .fallback(method_not_allowed)
}

pub async fn serve(config: &Config, bind: SocketAddr) -> Result<()> {
    let analyzer = ContractAnalyzer::direct_from_config(config)?;
    if !config.is_ai_configured() {
        warn!("no provider API key configured; analysis requests will fail until one is set");
    }
    let state = AppState::new(analyzer, config.server.allowed_origin.clone());
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %bind, "themis backend listening");
    println!("⚖️  ThemisScan backend listening on http://{}", bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;
    Ok(())
}

/// Chooses the `Access-Control-Allow-Origin` value.
///
/// Unset or `*` allows every origin. Otherwise the request origin is
/// echoed when it starts with the allowed value, and the allowed value is
/// returned as-is when it does not.
pub fn allow_origin(request_origin: Option<&str>, allowed: Option<&str>) -> String {
    match allowed {
        Some(allowed) if allowed != "*" => match request_origin {
            Some(origin) if origin.starts_with(allowed) => origin.to_string(),
            _ => allowed.to_string(),
        },
        _ => request_origin.unwrap_or("*").to_string(),
    }
}

async fn cors(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let origin = request
        .headers()
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let mut response = next.run(request).await;

    let allowed = allow_origin(origin.as_deref(), state.allowed_origin.as_deref());
    let headers = response.headers_mut();
    if let Ok(value) = HeaderValue::from_str(&allowed) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, value);
    }
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    headers.insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("Content-Type"),
    );
    response
}

fn error_response(status: StatusCode, error: &str, message: Option<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: error.to_string(),
            message,
        }),
    )
        .into_response()
}

async fn healthz(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "backend": state.analyzer.backend_name(),
    }))
}

async fn preflight() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn method_not_allowed() -> Response {
    error_response(
        StatusCode::METHOD_NOT_ALLOWED,
        "Method not allowed",
        Some("Only POST requests are accepted".to_string()),
    )
}

async fn not_found() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not Found", None)
}

async fn analyze(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<AnalyzeBody>, JsonRejection>,
) -> Response {
    let Json(body) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            let status = rejection.status();
            warn!(status = status.as_u16(), "rejected analysis body");
            return if status == StatusCode::PAYLOAD_TOO_LARGE {
                error_response(status, "Payload too large", Some(rejection.body_text()))
            } else {
                error_response(StatusCode::BAD_REQUEST, "Invalid JSON", Some(rejection.body_text()))
            };
        }
    };

    let Some(contract_text) = body.contract_text else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "Invalid request",
            Some("contractText is required and must be a string".to_string()),
        );
    };

    let origin = headers
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("-");
    info!(origin, bytes = contract_text.len(), "analysis requested");

    match state
        .analyzer
        .analyze(&contract_text, body.context.as_deref())
        .await
    {
        Ok(result) => (StatusCode::OK, Json(result)).into_response(),
        Err(err) => {
            let status = StatusCode::from_u16(err.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            if status.is_server_error() {
                warn!(status = status.as_u16(), error = %err, "analysis failed");
            }
            error_response(status, err.label(), Some(err.public_message()))
        }
    }
}
