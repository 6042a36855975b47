use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "themis")]
#[command(about = "⚖️  ThemisScan - AI-Powered Contract Risk Analyzer")]
#[command(long_about = "ThemisScan reviews contracts with a generative model and reports risky clauses, missing terms and a practical action plan.

QUICK START:
  themis config --api-key \"your-gemini-key\"                 # Store your API key
  themis analyze --file contrato.pdf                          # Analyze a contract
  themis serve                                                # Run the trusted backend

EXAMPLES:
  themis analyze --file contrato.docx --context \"Sou o locatário\" --format markdown
  themis analyze --dir ./contratos --output relatorio.md --continue-on-error
  themis models")]
#[command(version = "1.0.0")]
pub struct Cli {
    #[arg(short, long, global = true, help = "Enable debug logging on stderr")]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    #[command(about = "Analyze a contract and report its risks")]
    #[command(long_about = "Analyze contract text for risky clauses, missing terms and favorable terms.

INPUT OPTIONS (choose one):
  <TEXT>     Contract text in quotes
  --file     Single contract to analyze (.pdf, .docx, .txt, .md)
  --dir      Directory of contracts, each analyzed into its own report

OUTPUT OPTIONS:
  --format   Output format: json, markdown, plain
  --output   Save the report to a file instead of displaying it

EXAMPLES:
  themis analyze \"CLÁUSULA 1 - O locatário pagará multa de 10 aluguéis...\"
  themis analyze --file contrato.pdf --context \"Represento o contratante\"
  themis analyze --dir ./contratos --format json --skip-invalid")]
    Analyze {
        #[arg(help = "Contract text to analyze (use quotes for multi-word text)")]
        text: Option<String>,

        #[arg(short, long, help = "Contract file to analyze (.pdf, .docx, .txt, .md)")]
        file: Option<PathBuf>,

        #[arg(short, long, help = "Directory of contracts to analyze individually")]
        dir: Option<PathBuf>,

        #[arg(short, long, help = "Additional context for the reviewer, e.g. which party you represent")]
        context: Option<String>,

        #[arg(short, long, help = "Save output to file instead of displaying on screen")]
        output: Option<PathBuf>,

        #[arg(long, help = "Output format", value_enum)]
        format: Option<OutputFormat>,

        #[arg(long, help = "Use a custom Handlebars template for markdown reports")]
        template: Option<PathBuf>,

        #[arg(long, help = "Add custom branding to markdown reports")]
        branding: Option<String>,

        #[arg(long, help = "Continue processing on errors instead of stopping")]
        continue_on_error: bool,

        #[arg(long, help = "Skip unreadable or invalid files during directory processing")]
        skip_invalid: bool,
    },

    #[command(about = "Run the trusted backend HTTP endpoint")]
    #[command(long_about = "Serve POST /api/analyze so browsers and other clients can analyze contracts without holding the provider API key.

The key is read from the configuration file or GEMINI_API_KEY / OPENAI_API_KEY.
Set ALLOWED_ORIGIN to restrict cross-origin callers.

EXAMPLES:
  themis serve
  themis serve --bind 0.0.0.0:8787")]
    Serve {
        #[arg(short, long, help = "Address to listen on (default from config, 127.0.0.1:8787)")]
        bind: Option<String>,
    },

    #[command(about = "Setup and manage configuration")]
    #[command(long_about = "Configure ThemisScan providers, model preference and backend mode.

EXAMPLES:
  themis config --api-key \"your-gemini-key\"
  themis config --model gemini-2.0-flash
  themis config --openai-api-key \"sk-...\" --model gpt-4o-mini --provider openai
  themis config --backend-url https://themis.example.com
  themis config --show
  themis config --validate

CONFIGURATION FILE: ~/.themis/config.yml")]
    Config {
        #[arg(short, long, help = "Set the Gemini API key")]
        api_key: Option<String>,

        #[arg(long, help = "Set the OpenAI API key")]
        openai_api_key: Option<String>,

        #[arg(short, long, help = "Move a model to the top of the candidate list")]
        model: Option<String>,

        #[arg(short, long, help = "Provider of --model", value_enum, default_value = "gemini")]
        provider: AiProvider,

        #[arg(long, help = "Route analyses through a trusted backend at this URL")]
        backend_url: Option<String>,

        #[arg(long, help = "Call the provider directly again")]
        disable_backend: bool,

        #[arg(long, help = "Display current configuration values")]
        show: bool,

        #[arg(long, help = "Validate all configuration settings")]
        validate: bool,
    },

    #[command(about = "List the models your API key can use")]
    Models,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum OutputFormat {
    Json,
    Markdown,
    Plain,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
pub enum AiProvider {
    Gemini,
    #[value(name = "openai")]
    OpenAi,
}
