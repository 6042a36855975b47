use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::AnalysisError;

#[derive(Debug, Clone)]
pub struct ProcessingError {
    pub file_path: Option<PathBuf>,
    pub error_type: ErrorType,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    FileNotFound,
    UnreadableFormat,
    InvalidContract,
    ServiceError,
    AnalysisFailed,
    ConfigurationError,
}

/// Ledger for batch analysis of a directory of contracts.
///
/// Decides per failure whether the batch may continue and keeps the
/// errors and warnings for the final summary.
pub struct ErrorHandler {
    continue_on_error: bool,
    skip_invalid: bool,
    errors: Vec<ProcessingError>,
    warnings: Vec<String>,
}

impl ErrorHandler {
    pub fn new(continue_on_error: bool, skip_invalid: bool) -> Self {
        Self {
            continue_on_error,
            skip_invalid,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Records `error` and returns whether the batch should continue.
    pub fn handle_error(&mut self, error: ProcessingError) -> bool {
        match error.error_type {
            ErrorType::FileNotFound | ErrorType::UnreadableFormat | ErrorType::InvalidContract => {
                if self.skip_invalid {
                    self.warnings.push(format!(
                        "⚠️  Skipped invalid file: {} - {}",
                        error.display_path(),
                        error.message
                    ));
                    true
                } else {
                    self.errors.push(error);
                    self.continue_on_error
                }
            }
            ErrorType::ServiceError | ErrorType::AnalysisFailed => {
                self.errors.push(error);
                self.continue_on_error
            }
            // A bad key fails every remaining file the same way.
            ErrorType::ConfigurationError => {
                self.errors.push(error);
                false
            }
        }
    }

    pub fn add_warning(&mut self, message: String) {
        self.warnings.push(message);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    pub fn get_summary(&self) -> ErrorSummary {
        let mut error_counts = HashMap::new();
        for error in &self.errors {
            *error_counts.entry(error.error_type).or_insert(0) += 1;
        }

        ErrorSummary {
            total_errors: self.errors.len(),
            total_warnings: self.warnings.len(),
            error_counts,
            errors: self.errors.clone(),
            warnings: self.warnings.clone(),
        }
    }

    pub fn print_summary(&self) {
        if !self.has_errors() && !self.has_warnings() {
            return;
        }

        println!("\n📊 Processing Summary");
        println!("===================");

        if self.has_warnings() {
            println!("⚠️  Warnings: {}", self.warnings.len());
            for warning in &self.warnings {
                println!("   {}", warning);
            }
        }

        if self.has_errors() {
            println!("❌ Errors: {}", self.errors.len());
            for error in &self.errors {
                println!("   {} [{:?}]: {}", error.display_path(), error.error_type, error.message);
            }
        }
    }
}

#[derive(Debug)]
pub struct ErrorSummary {
    pub total_errors: usize,
    pub total_warnings: usize,
    pub error_counts: HashMap<ErrorType, usize>,
    pub errors: Vec<ProcessingError>,
    pub warnings: Vec<String>,
}

impl ProcessingError {
    pub fn file_not_found(path: PathBuf) -> Self {
        Self {
            file_path: Some(path),
            error_type: ErrorType::FileNotFound,
            message: "File not found".to_string(),
        }
    }

    pub fn unreadable_format(path: PathBuf, details: String) -> Self {
        Self {
            file_path: Some(path),
            error_type: ErrorType::UnreadableFormat,
            message: format!("Could not extract text: {}", details),
        }
    }

    pub fn analysis(path: PathBuf, error: &AnalysisError) -> Self {
        let error_type = match error {
            AnalysisError::EmptyContract | AnalysisError::ContractTooLarge { .. } => ErrorType::InvalidContract,
            AnalysisError::Credential { .. } | AnalysisError::Configuration(_) => ErrorType::ConfigurationError,
            e if e.is_retryable_later() => ErrorType::ServiceError,
            _ => ErrorType::AnalysisFailed,
        };
        Self {
            file_path: Some(path),
            error_type,
            message: error.to_string(),
        }
    }

    fn display_path(&self) -> String {
        self.file_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "unknown".to_string())
    }
}
