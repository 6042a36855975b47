use crate::schema::analysis_schema;

const PREAMBLE: &str = "Você é um assistente jurídico sênior especializado em análise de contratos sob a legislação brasileira (Código Civil, CDC, etc.).

Analise o seguinte contrato com extremo rigor. Identifique riscos, cláusulas abusivas, termos faltantes e oportunidades.
Seja prático e direto. Foco na proteção de quem está recebendo esta análise.";

const CONTEXT_LABEL: &str = "CONTEXTO ADICIONAL FORNECIDO PELO USUÁRIO:";

const CONTRACT_LABEL: &str = "CONTRATO PARA ANÁLISE:";

const CONTRACT_DELIMITER: &str = "---";

const SCHEMA_INSTRUCTION: &str = "Responda APENAS com um objeto JSON válido, sem texto adicional e sem blocos de código, seguindo exatamente este schema:";

/// Builds the instruction text sent to the model.
///
/// The context block is emitted only when `context` has non-whitespace
/// content. With `embed_schema` set, the response schema is appended for
/// providers that cannot enforce it natively.
pub fn build_prompt(contract_text: &str, context: Option<&str>, embed_schema: bool) -> String {
    let mut prompt = String::with_capacity(contract_text.len() + 1024);
    prompt.push_str(PREAMBLE);
    prompt.push_str("\n\n");

    if let Some(context) = context.filter(|c| !c.trim().is_empty()) {
        prompt.push_str(CONTEXT_LABEL);
        prompt.push(' ');
        prompt.push_str(context);
        prompt.push_str("\n\n");
    }

    prompt.push_str(CONTRACT_LABEL);
    prompt.push('\n');
    prompt.push_str(CONTRACT_DELIMITER);
    prompt.push('\n');
    prompt.push_str(contract_text);
    prompt.push('\n');
    prompt.push_str(CONTRACT_DELIMITER);

    if embed_schema {
        // Pretty printing a json! value cannot fail.
        let schema = serde_json::to_string_pretty(&analysis_schema()).unwrap_or_default();
        prompt.push_str("\n\n");
        prompt.push_str(SCHEMA_INSTRUCTION);
        prompt.push('\n');
        prompt.push_str(&schema);
    }

    prompt
}

pub fn has_context_block(prompt: &str) -> bool {
    prompt.contains(CONTEXT_LABEL)
}
