//! Turns a raw provider payload into a typed [`AnalysisResult`].
//!
//! The schema sent to the provider is advisory: parsing checks the JSON
//! structure and the mandatory sub-fields of list items, nothing more.

use serde_json::Value;

use crate::analyzer::{AnalysisResult, RiskLevel};
use crate::error::AnalysisError;
use crate::gemini::candidate_text;

/// Extracts the generated text from a provider envelope when `raw` is one,
/// and strips a surrounding Markdown code fence.
pub fn extract_payload(raw: &str) -> String {
    let text = if is_envelope(raw) {
        candidate_text(raw).unwrap_or_default()
    } else {
        raw.to_string()
    };
    strip_code_fence(&text).to_string()
}

fn is_envelope(raw: &str) -> bool {
    serde_json::from_str::<Value>(raw)
        .map(|value| value.get("candidates").is_some())
        .unwrap_or(false)
}

fn strip_code_fence(response: &str) -> &str {
    let trimmed = response.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    if trimmed.contains("```json") {
        trimmed
            .split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .unwrap_or(trimmed)
            .trim()
    } else {
        trimmed
            .split("```")
            .nth(1)
            .unwrap_or(trimmed)
            .trim()
    }
}

pub fn parse_analysis(raw: &str) -> Result<AnalysisResult, AnalysisError> {
    let payload = extract_payload(raw);
    if payload.is_empty() {
        return Err(AnalysisError::MalformedResponse {
            message: "the AI returned an empty response".to_string(),
            raw: raw.to_string(),
        });
    }

    let value: Value =
        serde_json::from_str(&payload).map_err(|e| AnalysisError::MalformedResponse {
            message: format!("response is not valid JSON ({})", e),
            raw: payload.clone(),
        })?;

    serde_json::from_value(value).map_err(|e| AnalysisError::MalformedResponse {
        message: format!("response does not match the analysis structure ({})", e),
        raw: payload,
    })
}

/// Maps an arbitrary risk label to one of the three levels by substring
/// containment, case-insensitively.
///
/// `ALTO` is checked before `BAIXO`; any label containing neither maps to
/// `MÉDIO`. This is lossy on purpose: "crítico" or "unknown" both become
/// `MÉDIO`.
pub fn normalize_risk_level(label: &str) -> RiskLevel {
    let upper = label.to_uppercase();
    if upper.contains("ALTO") {
        RiskLevel::Alto
    } else if upper.contains("BAIXO") {
        RiskLevel::Baixo
    } else {
        RiskLevel::Medio
    }
}
