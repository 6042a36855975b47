//! ThemisScan: contract risk analysis backed by a generative model.

pub mod analyzer;
pub mod app;
pub mod cli;
pub mod config;
pub mod document_processor;
pub mod error;
pub mod error_handler;
pub mod gemini;
pub mod openai;
pub mod orchestrator;
pub mod prompt;
pub mod provider;
pub mod report;
pub mod schema;
pub mod server;
pub mod validator;

pub use analyzer::{AnalysisRequest, AnalysisResult, ContractAnalyzer, RiskLevel};
pub use error::AnalysisError;
