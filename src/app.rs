use anyhow::{anyhow, Result};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use walkdir::WalkDir;

use crate::analyzer::{AnalysisResult, ContractAnalyzer};
use crate::cli::{AiProvider, Commands, OutputFormat};
use crate::config::{mask_secret, Config};
use crate::document_processor::DocumentProcessor;
use crate::error::AnalysisError;
use crate::error_handler::{ErrorHandler, ProcessingError};
use crate::orchestrator::Orchestrator;
use crate::provider::{ProbeError, ProviderKind};
use crate::report::{summary_line, ReportContext, ReportFormat, ReportRenderer};

pub struct App {
    pub config: Config,
    document_processor: DocumentProcessor,
}

/// Report options shared by single-file and batch analysis.
struct ReportOptions {
    format: ReportFormat,
    branding: Option<String>,
    renderer: ReportRenderer,
}

impl From<OutputFormat> for ReportFormat {
    fn from(format: OutputFormat) -> Self {
        match format {
            OutputFormat::Json => ReportFormat::Json,
            OutputFormat::Markdown => ReportFormat::Markdown,
            OutputFormat::Plain => ReportFormat::Plain,
        }
    }
}

impl From<AiProvider> for ProviderKind {
    fn from(provider: AiProvider) -> Self {
        match provider {
            AiProvider::Gemini => ProviderKind::Gemini,
            AiProvider::OpenAi => ProviderKind::OpenAi,
        }
    }
}

impl ReportOptions {
    fn render(&self, result: &AnalysisResult) -> Result<String> {
        self.renderer
            .render(self.format, result, &ReportContext::now(self.branding.clone()))
    }

    fn extension(&self) -> &'static str {
        match self.format {
            ReportFormat::Json => "json",
            ReportFormat::Markdown => "md",
            ReportFormat::Plain => "txt",
        }
    }
}

impl App {
    pub async fn new() -> Result<Self> {
        let config = Config::load().await?;
        Ok(Self::with_config(config))
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            document_processor: DocumentProcessor::new(),
        }
    }

    fn print_branded_header(&self) {
        println!("⚖️  ThemisScan - AI-Powered Contract Risk Analyzer");
        println!("==================================================");
    }

    pub async fn run_command(&mut self, command: Commands) -> Result<()> {
        match command {
            Commands::Analyze {
                text,
                file,
                dir,
                context,
                output,
                format,
                template,
                branding,
                continue_on_error,
                skip_invalid,
            } => {
                self.print_branded_header();

                let mut renderer = ReportRenderer::new()?;
                if let Some(template_path) = template {
                    renderer = renderer.with_template_file(&template_path).await?;
                }
                let report = ReportOptions {
                    format: format.unwrap_or(OutputFormat::Markdown).into(),
                    branding,
                    renderer,
                };
                let analyzer = ContractAnalyzer::from_config(&self.config)?;

                if let Some(dir_path) = dir {
                    return self
                        .process_directory_batch(
                            &analyzer,
                            &dir_path,
                            context.as_deref(),
                            output,
                            &report,
                            continue_on_error,
                            skip_invalid,
                        )
                        .await;
                }

                let contract_text = self.get_input_text(text, file).await?;
                self.print_analysis_target(&analyzer);

                let result = analyzer
                    .analyze(&contract_text, context.as_deref())
                    .await
                    .inspect_err(log_detail)?;
                println!("✅ Analysis completed successfully!");
                println!("{}", summary_line(&result));

                let content = report.render(&result)?;
                match output {
                    Some(path) => {
                        fs::write(&path, content).await?;
                        println!("📁 Report saved to: {}", path.display());
                    }
                    None => println!("\n{}", content),
                }
            }
            Commands::Serve { bind } => {
                let bind = bind.unwrap_or_else(|| self.config.server.bind.clone());
                let addr: SocketAddr = bind
                    .parse()
                    .map_err(|e| anyhow!("Invalid bind address '{}': {}", bind, e))?;
                crate::server::serve(&self.config, addr).await?;
            }
            Commands::Config {
                api_key,
                openai_api_key,
                model,
                provider,
                backend_url,
                disable_backend,
                show,
                validate,
            } => {
                if show {
                    self.show_config_status();
                    return Ok(());
                }

                if validate {
                    self.print_validation();
                    return Ok(());
                }

                // Edit the stored file only, so keys from the environment are never persisted.
                let path = Config::config_path()?;
                let mut stored = Config::load_from(&path).await?;
                let mut updated = false;

                if let Some(key) = api_key {
                    stored.set_api_key(key);
                    updated = true;
                }

                if let Some(key) = openai_api_key {
                    stored.set_openai_api_key(key);
                    updated = true;
                }

                if let Some(model_name) = model {
                    stored.promote_model(provider.into(), &model_name);
                    updated = true;
                }

                if let Some(url) = backend_url {
                    stored.set_backend_url(Some(url));
                    updated = true;
                } else if disable_backend {
                    stored.set_backend_url(None);
                    updated = true;
                }

                if updated {
                    stored.save_to(&path).await?;
                    stored.apply_env_overrides();
                    self.config = stored;
                    println!("✅ Configuration updated successfully!");
                    self.show_config_status();
                } else {
                    println!("🔧 No configuration changes specified. Use --help for options.");
                }
            }
            Commands::Models => {
                let orchestrator = Orchestrator::from_config(&self.config)?;
                println!("🔍 Listing models available to your API key...");
                match orchestrator.probe().await {
                    Ok(models) if models.is_empty() => {
                        println!("⚠️  The key is valid but no model supports content generation.");
                    }
                    Ok(models) => {
                        println!("✅ {} model(s) available:", models.len());
                        for model in models {
                            println!("   • {}", model);
                        }
                    }
                    Err(ProbeError::Unauthorized { status, message }) => {
                        println!("❌ The API key was rejected (HTTP {}): {}", status, message);
                        println!("   Run 'themis config --api-key <KEY>' to update it.");
                    }
                    Err(ProbeError::Failed { message }) => {
                        println!("❌ Could not list models: {}", message);
                    }
                }
            }
        }

        Ok(())
    }

    fn print_analysis_target(&self, analyzer: &ContractAnalyzer) {
        if analyzer.backend_name() == "backend" {
            let url = self.config.backend.url.as_deref().unwrap_or("-");
            println!("🌐 Analyzing your contract through the backend at {}...", url);
        } else if let Some(candidate) = self.config.candidates.iter().min_by_key(|c| c.order) {
            println!("🤖 Analyzing your contract with {}...", candidate.label());
        }
    }

    async fn get_input_text(&self, text: Option<String>, file: Option<PathBuf>) -> Result<String> {
        if let Some(text) = text {
            return Ok(text);
        }

        if let Some(file_path) = file {
            return self.read_file(&file_path).await;
        }

        Err(anyhow!("No input provided. Pass contract text, --file or --dir"))
    }

    async fn read_file(&self, path: &Path) -> Result<String> {
        if !path.exists() {
            return Err(anyhow!("File does not exist: {:?}", path));
        }

        println!("📖 Reading contract from: {}", path.display());
        let content = self.document_processor.extract_text_from_file(path).await?;
        println!("📄 Loaded {} characters from file", content.chars().count());
        Ok(content)
    }

    #[allow(clippy::too_many_arguments)]
    async fn process_directory_batch(
        &self,
        analyzer: &ContractAnalyzer,
        dir_path: &Path,
        context: Option<&str>,
        output: Option<PathBuf>,
        report: &ReportOptions,
        continue_on_error: bool,
        skip_invalid: bool,
    ) -> Result<()> {
        if !dir_path.is_dir() {
            return Err(anyhow!("Directory does not exist: {:?}", dir_path));
        }

        println!("📁 Scanning directory: {}", dir_path.display());

        let mut handler = ErrorHandler::new(continue_on_error, skip_invalid);
        let mut contract_files = Vec::new();
        let mut ignored = 0;
        for entry in WalkDir::new(dir_path).into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            if self.document_processor.is_supported_format(path) {
                contract_files.push(path.to_path_buf());
            } else {
                ignored += 1;
            }
        }

        if contract_files.is_empty() {
            return Err(anyhow!("No readable contracts (.pdf, .docx, .txt, .md) found in directory"));
        }
        if ignored > 0 {
            handler.add_warning(format!("⚠️  Ignored {} file(s) with unsupported formats", ignored));
        }

        println!("📊 Found {} contract(s) to analyze", contract_files.len());
        self.print_analysis_target(analyzer);

        let mut processed = 0;
        let mut stopped = false;

        for file_path in contract_files {
            println!("\n🔍 Processing: {}", file_path.display());

            let content = match self.document_processor.extract_text_from_file(&file_path).await {
                Ok(content) => content,
                Err(e) => {
                    let error = if file_path.exists() {
                        ProcessingError::unreadable_format(file_path, e.to_string())
                    } else {
                        ProcessingError::file_not_found(file_path)
                    };
                    if !handler.handle_error(error) {
                        stopped = true;
                        break;
                    }
                    continue;
                }
            };

            let result = match analyzer.analyze(&content, context).await {
                Ok(result) => result,
                Err(e) => {
                    log_detail(&e);
                    eprintln!("❌ {}", e);
                    if !handler.handle_error(ProcessingError::analysis(file_path, &e)) {
                        stopped = true;
                        break;
                    }
                    continue;
                }
            };

            println!("{}", summary_line(&result));
            let report_path = batch_report_path(&file_path, output.as_deref(), report.extension());
            fs::write(&report_path, report.render(&result)?).await?;
            println!("📁 Report saved: {}", report_path.display());
            processed += 1;
        }

        handler.print_summary();

        if stopped {
            return Err(anyhow!(
                "Batch processing stopped after {} successful analysis(es); use --continue-on-error or --skip-invalid to keep going",
                processed
            ));
        }

        println!("\n🎉 Batch processing complete!");
        println!("📊 Successfully analyzed {} contract(s)", processed);
        Ok(())
    }

    fn show_config_status(&self) {
        println!("🔧 Current ThemisScan Configuration");
        println!("===================================");

        if let Ok(path) = Config::config_path() {
            println!("📄 File: {}", path.display());
        }

        let key_status = |key: &Option<String>| match key {
            Some(key) if !key.trim().is_empty() => format!("{} ✅", mask_secret(key)),
            _ => "Not configured ❌".to_string(),
        };
        println!("🔑 Gemini API Key: {}", key_status(&self.config.provider.api_key));
        println!("🔑 OpenAI API Key: {}", key_status(&self.config.provider.openai_api_key));
        if let Some(url) = &self.config.provider.base_url {
            println!("🌐 Gemini Base URL: {}", url);
        }
        if let Some(url) = &self.config.provider.openai_base_url {
            println!("🌐 OpenAI Base URL: {}", url);
        }
        if let Some(secs) = self.config.provider.timeout_secs {
            println!("⏱️  Timeout: {}s", secs);
        }

        println!("\n🤖 Model candidates (in order):");
        let mut candidates = self.config.candidates.clone();
        candidates.sort_by_key(|c| c.order);
        for candidate in &candidates {
            println!("  {}. {}", candidate.order + 1, candidate.label());
        }

        println!(
            "\n🔁 Retries: {} per candidate (rate limit base {}ms, overload base {}ms)",
            self.config.retry.max_retries, self.config.retry.rate_limit_base_ms, self.config.retry.overload_base_ms
        );
        println!("📏 Max contract size: {} bytes", self.config.limits.max_contract_bytes);

        if self.config.backend.enabled {
            println!(
                "🌐 Backend mode: enabled ({})",
                self.config.backend.url.as_deref().unwrap_or("no URL")
            );
        } else {
            println!("🌐 Backend mode: disabled (calling the provider directly)");
        }
        println!("🖥️  Server bind: {}", self.config.server.bind);

        if self.config.is_ai_configured() {
            println!("\n✅ Ready to analyze contracts!");
        } else {
            println!("\n⚠️  No credential configured. Run 'themis config --api-key <KEY>'.");
        }
    }

    fn print_validation(&self) {
        println!("🔍 Validating configuration...");
        let result = self.config.validate();
        if result.is_valid {
            println!("✅ Configuration is valid!");
        } else {
            println!("❌ Configuration issues found:");
            for issue in &result.issues {
                println!("   • {}", issue);
            }
        }
        if !result.warnings.is_empty() {
            println!("⚠️  Warnings:");
            for warning in &result.warnings {
                println!("   • {}", warning);
            }
        }
    }
}

fn log_detail(err: &AnalysisError) {
    if let Some(detail) = err.detail() {
        debug!(%detail, "analysis failure detail");
    }
}

/// Report path for one file of a batch: `{base}_{stem}.{ext}` next to
/// `--output` when given, `{stem}_analysis.{ext}` otherwise.
fn batch_report_path(file_path: &Path, output: Option<&Path>, default_ext: &str) -> PathBuf {
    let file_stem = file_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "contract".to_string());

    match output {
        Some(base_output) => {
            let base_name = base_output
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "report".to_string());
            let extension = base_output
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_else(|| default_ext.to_string());
            base_output.with_file_name(format!("{}_{}.{}", base_name, file_stem, extension))
        }
        None => PathBuf::from(format!("{}_analysis.{}", file_stem, default_ext)),
    }
}
