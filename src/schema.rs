//! Response schema for the structured contract analysis.
//!
//! The same schema is sent as `responseSchema` to providers with native
//! structured output and embedded verbatim in the prompt for the others.
//! It must stay in sync with [`crate::analyzer::AnalysisResult`].

use serde_json::{json, Value};

pub const RISK_LEVELS: [&str; 3] = ["BAIXO", "MÉDIO", "ALTO"];

pub const REQUIRED_FIELDS: [&str; 8] = [
    "executiveSummary",
    "contractType",
    "riskLevel",
    "riskClauses",
    "missingTerms",
    "favorableTerms",
    "practicalRecommendations",
    "clientQuestions",
];

pub const RISK_CLAUSE_FIELDS: [&str; 4] = ["clause", "reason", "impact", "recommendation"];

pub const FAVORABLE_TERM_FIELDS: [&str; 2] = ["clause", "benefit"];

pub fn analysis_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "executiveSummary": {
                "type": "string",
                "description": "Resumo executivo em 3-5 linhas (Tipo, partes, duração, valor)."
            },
            "contractType": {
                "type": "string",
                "description": "O tipo de contrato identificado (ex: Prestação de Serviços)."
            },
            "riskLevel": {
                "type": "string",
                "enum": RISK_LEVELS,
                "description": "Status de risco geral."
            },
            "riskClauses": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "clause": { "type": "string", "description": "A cláusula problemática." },
                        "reason": { "type": "string", "description": "Por que é perigosa (linguagem simples)." },
                        "impact": { "type": "string", "description": "Quem se prejudica." },
                        "recommendation": { "type": "string", "description": "Recomendação de mudança específica." }
                    },
                    "required": RISK_CLAUSE_FIELDS
                }
            },
            "missingTerms": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Lista de termos importantes que estão faltando."
            },
            "favorableTerms": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "clause": { "type": "string", "description": "A cláusula favorável." },
                        "benefit": { "type": "string", "description": "Por que é vantajoso." }
                    },
                    "required": FAVORABLE_TERM_FIELDS
                }
            },
            "practicalRecommendations": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Ações práticas priorizadas para o advogado/cliente."
            },
            "clientQuestions": {
                "type": "array",
                "items": { "type": "string" },
                "description": "Perguntas para pedir contexto ao cliente, se necessário."
            }
        },
        "required": REQUIRED_FIELDS
    })
}

/// Names listed under `required` at the given JSON pointer
/// (`""` for the top level, `"/properties/riskClauses/items"` for a nested object).
pub fn required_at(schema: &Value, pointer: &str) -> Vec<String> {
    schema
        .pointer(pointer)
        .and_then(|node| node.get("required"))
        .and_then(Value::as_array)
        .map(|names| {
            names
                .iter()
                .filter_map(|name| name.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
