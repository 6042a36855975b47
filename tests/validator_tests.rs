mod common;

use common::sample_analysis_json;
use serde_json::json;
use themis_scan::validator::{extract_payload, normalize_risk_level, parse_analysis};
use themis_scan::{AnalysisError, RiskLevel};

#[test]
fn test_parse_complete_result() {
    let result = parse_analysis(&sample_analysis_json()).unwrap();

    assert_eq!(result.contract_type, "Prestação de Serviços");
    assert_eq!(result.risk_level, RiskLevel::Alto);
    assert_eq!(result.risk_clauses.len(), 1);
    assert_eq!(result.risk_clauses[0].impact, "Contratante");
    assert_eq!(result.missing_terms, vec!["Confidencialidade", "Proteção de dados (LGPD)"]);
    assert_eq!(result.favorable_terms[0].benefit, "Prazo confortável de pagamento");
    assert_eq!(result.practical_recommendations.len(), 2);
    assert_eq!(result.client_questions.len(), 1);
}

#[test]
fn test_parse_strips_code_fences() {
    let fenced = format!("```json\n{}\n```", sample_analysis_json());
    assert_eq!(parse_analysis(&fenced).unwrap(), parse_analysis(&sample_analysis_json()).unwrap());
}

#[test]
fn test_parse_unwraps_gemini_envelope() {
    let envelope = json!({
        "candidates": [{
            "content": { "parts": [{ "text": sample_analysis_json() }], "role": "model" },
            "finishReason": "STOP"
        }]
    })
    .to_string();

    assert_eq!(extract_payload(&envelope), sample_analysis_json());
    assert_eq!(parse_analysis(&envelope).unwrap().risk_level, RiskLevel::Alto);
}

#[test]
fn test_empty_envelope_is_malformed() {
    let envelope = json!({ "candidates": [{ "content": { "parts": [{ "text": "  " }] } }] }).to_string();
    let err = parse_analysis(&envelope).unwrap_err();
    assert!(matches!(err, AnalysisError::MalformedResponse { .. }));
    assert!(err.to_string().contains("empty response"));
}

#[test]
fn test_invalid_json_keeps_raw_text() {
    let err = parse_analysis("Desculpe, não consigo analisar este contrato.").unwrap_err();
    match err {
        AnalysisError::MalformedResponse { message, raw } => {
            assert!(message.contains("not valid JSON"));
            assert_eq!(raw, "Desculpe, não consigo analisar este contrato.");
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_missing_risk_level_is_malformed() {
    let body = json!({ "executiveSummary": "Resumo", "contractType": "Locação" }).to_string();
    let err = parse_analysis(&body).unwrap_err();
    assert!(matches!(err, AnalysisError::MalformedResponse { .. }));
}

#[test]
fn test_risk_clause_missing_field_is_malformed() {
    let body = json!({
        "executiveSummary": "Resumo",
        "contractType": "Locação",
        "riskLevel": "MÉDIO",
        "riskClauses": [{ "clause": "Multa", "reason": "Alta" }]
    })
    .to_string();
    assert!(matches!(
        parse_analysis(&body).unwrap_err(),
        AnalysisError::MalformedResponse { .. }
    ));
}

#[test]
fn test_missing_lists_default_to_empty() {
    let body = json!({
        "executiveSummary": "Contrato simples.",
        "contractType": "Compra e Venda",
        "riskLevel": "BAIXO"
    })
    .to_string();
    let result = parse_analysis(&body).unwrap();
    assert_eq!(result.risk_level, RiskLevel::Baixo);
    assert!(result.risk_clauses.is_empty());
    assert!(result.missing_terms.is_empty());
    assert!(result.client_questions.is_empty());
}

#[test]
fn test_risk_level_labels_are_normalized() {
    let cases = [
        ("ALTO", RiskLevel::Alto),
        ("Risco alto", RiskLevel::Alto),
        ("baixo", RiskLevel::Baixo),
        ("MÉDIO", RiskLevel::Medio),
        ("medio", RiskLevel::Medio),
        ("crítico", RiskLevel::Medio),
        ("", RiskLevel::Medio),
        // ALTO wins when both appear.
        ("entre baixo e alto", RiskLevel::Alto),
    ];
    for (label, expected) in cases {
        assert_eq!(normalize_risk_level(label), expected, "label {:?}", label);
    }

    let body = json!({ "executiveSummary": "", "contractType": "", "riskLevel": "Alto" }).to_string();
    let result = parse_analysis(&body).unwrap();
    assert_eq!(result.risk_level, RiskLevel::Alto);
    assert_eq!(serde_json::to_value(&result).unwrap()["riskLevel"], "ALTO");
}
