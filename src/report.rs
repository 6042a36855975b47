use anyhow::{anyhow, Result};
use handlebars::{no_escape, Context, Handlebars, Helper, HelperResult, Output, RenderContext};
use std::path::Path;
use tokio::fs;

use crate::analyzer::{AnalysisResult, RiskLevel};

const REPORT_TEMPLATE: &str = "report";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Json,
    Markdown,
    Plain,
}

#[derive(Debug, Clone)]
pub struct ReportContext {
    pub branding: Option<String>,
    pub timestamp: String,
}

impl ReportContext {
    pub fn now(branding: Option<String>) -> Self {
        Self {
            branding,
            timestamp: chrono::Local::now().format("%d/%m/%Y %H:%M:%S").to_string(),
        }
    }
}

/// Renders analysis results for export.
pub struct ReportRenderer {
    handlebars: Handlebars<'static>,
}

fn inc_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let index = h.param(0).and_then(|v| v.value().as_u64()).unwrap_or(0);
    out.write(&(index + 1).to_string())?;
    Ok(())
}

fn risk_badge_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let level = h.param(0).and_then(|v| v.value().as_str()).unwrap_or("");
    out.write(risk_icon(level))?;
    Ok(())
}

fn risk_icon(level: &str) -> &'static str {
    match level {
        "ALTO" => "🔴",
        "MÉDIO" => "🟡",
        "BAIXO" => "🟢",
        _ => "⚪",
    }
}

impl ReportRenderer {
    pub fn new() -> Result<Self> {
        let mut handlebars = Handlebars::new();
        handlebars.set_strict_mode(false);
        handlebars.register_escape_fn(no_escape);
        handlebars.register_helper("inc", Box::new(inc_helper));
        handlebars.register_helper("risk_badge", Box::new(risk_badge_helper));
        handlebars
            .register_template_string(REPORT_TEMPLATE, include_str!("../templates/report.hbs"))
            .map_err(|e| anyhow!("Failed to register report template: {}", e))?;

        Ok(Self { handlebars })
    }

    /// Replaces the built-in Markdown template with a custom `.hbs` file.
    pub async fn with_template_file(mut self, path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).await?;
        self.handlebars
            .register_template_string(REPORT_TEMPLATE, content)
            .map_err(|e| anyhow!("Failed to register template '{}': {}", path.display(), e))?;
        Ok(self)
    }

    pub fn render(&self, format: ReportFormat, result: &AnalysisResult, context: &ReportContext) -> Result<String> {
        match format {
            ReportFormat::Json => Ok(serde_json::to_string_pretty(result)?),
            ReportFormat::Markdown => self.render_markdown(result, context),
            ReportFormat::Plain => Ok(render_plain(result)),
        }
    }

    pub fn render_markdown(&self, result: &AnalysisResult, context: &ReportContext) -> Result<String> {
        let mut render_data = match serde_json::to_value(result)? {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        render_data.insert(
            "branding".to_string(),
            context
                .branding
                .as_ref()
                .map(|b| serde_json::Value::String(b.clone()))
                .unwrap_or(serde_json::Value::Null),
        );
        render_data.insert(
            "timestamp".to_string(),
            serde_json::Value::String(context.timestamp.clone()),
        );

        self.handlebars
            .render(REPORT_TEMPLATE, &serde_json::Value::Object(render_data))
            .map_err(|e| anyhow!("Failed to render report: {}", e))
    }
}

pub fn render_plain(result: &AnalysisResult) -> String {
    let mut output = String::new();

    output.push_str("THEMISSCAN - CONTRACT ANALYSIS\n");
    output.push_str("==============================\n\n");
    output.push_str(&format!("Overall risk:   {}\n", result.risk_level));
    output.push_str(&format!("Contract type:  {}\n\n", result.contract_type));
    output.push_str("EXECUTIVE SUMMARY\n");
    output.push_str(&format!("{}\n\n", result.executive_summary.trim()));

    output.push_str(&format!("RISK CLAUSES ({})\n", result.risk_clauses.len()));
    if result.risk_clauses.is_empty() {
        output.push_str("  No high-risk clause detected.\n");
    }
    for (i, risk) in result.risk_clauses.iter().enumerate() {
        output.push_str(&format!("  {}. {}\n", i + 1, risk.clause));
        output.push_str(&format!("     Problem:        {}\n", risk.reason));
        output.push_str(&format!("     Impact:         {}\n", risk.impact));
        output.push_str(&format!("     Recommendation: {}\n", risk.recommendation));
    }
    output.push('\n');

    push_list(&mut output, "MISSING TERMS", &result.missing_terms);

    output.push_str(&format!("FAVORABLE TERMS ({})\n", result.favorable_terms.len()));
    for term in &result.favorable_terms {
        output.push_str(&format!("  - {}: {}\n", term.clause, term.benefit));
    }
    output.push('\n');

    output.push_str("ACTION PLAN\n");
    for (i, recommendation) in result.practical_recommendations.iter().enumerate() {
        output.push_str(&format!("  {}. {}\n", i + 1, recommendation));
    }
    output.push('\n');

    push_list(&mut output, "QUESTIONS FOR THE CLIENT", &result.client_questions);

    output
}

fn push_list(output: &mut String, title: &str, items: &[String]) {
    output.push_str(&format!("{} ({})\n", title, items.len()));
    for item in items {
        output.push_str(&format!("  - {}\n", item));
    }
    output.push('\n');
}

/// One-line summary printed after an analysis.
pub fn summary_line(result: &AnalysisResult) -> String {
    let icon = risk_icon(result.risk_level.as_str());
    let high_risk = if result.risk_level == RiskLevel::Alto { " - review before signing" } else { "" };
    format!(
        "{} Risk {}{}: {} risk clause(s), {} missing term(s)",
        icon,
        result.risk_level,
        high_risk,
        result.risk_clauses.len(),
        result.missing_terms.len()
    )
}
