use thiserror::Error;

/// The single error type that leaves the analysis pipeline.
///
/// Provider- and transport-level failures are classified inside the
/// provider clients and the orchestrator; callers only ever see one of
/// these variants, each carrying a message that can be shown to a user.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    #[error("The contract text is empty. Paste the contract or select a file to analyze.")]
    EmptyContract,

    #[error("The contract is too large ({size} bytes). The maximum accepted size is {max} bytes.")]
    ContractTooLarge { size: usize, max: usize },

    #[error("The AI provider rejected the API key: {message}. Check the configured key (themis config --api-key) and its permissions.")]
    Credential { message: String },

    #[error("The AI provider is rate limiting requests. Please try again later.")]
    RateLimited { message: String },

    #[error("The AI service is temporarily unavailable. Please try again later.")]
    ServiceUnavailable { message: String },

    #[error("{}", model_unavailable_message(.tried, .available))]
    ModelUnavailable {
        tried: Vec<String>,
        available: Option<Vec<String>>,
    },

    #[error("The AI returned a response that could not be read: {message}")]
    MalformedResponse { message: String, raw: String },

    #[error("Could not reach the AI service: {message}")]
    Network { message: String },

    #[error("The AI provider returned HTTP {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("{message}")]
    Backend { status: u16, message: String },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

fn model_unavailable_message(tried: &[String], available: &Option<Vec<String>>) -> String {
    let mut message = if tried.is_empty() {
        "No model candidate is configured for analysis.".to_string()
    } else {
        format!(
            "None of the configured models answered ({}).",
            tried.join(", ")
        )
    };
    match available {
        Some(models) if !models.is_empty() => {
            message.push_str(&format!(
                " Your API key can access: {}. Update the candidate list to one of these models.",
                models.join(", ")
            ));
        }
        Some(_) => {
            message.push_str(" Your API key does not list any model that supports content generation.");
        }
        None => {}
    }
    message
}

impl AnalysisError {
    /// Status code used when the error is returned by the backend endpoint.
    pub fn http_status(&self) -> u16 {
        match self {
            AnalysisError::EmptyContract => 400,
            AnalysisError::ContractTooLarge { .. } => 413,
            // The key belongs to the server, not to the caller.
            AnalysisError::Credential { .. } | AnalysisError::Configuration(_) => 500,
            AnalysisError::RateLimited { .. } => 429,
            AnalysisError::ServiceUnavailable { .. }
            | AnalysisError::Network { .. }
            | AnalysisError::ModelUnavailable { .. } => 503,
            AnalysisError::MalformedResponse { .. } => 502,
            AnalysisError::Upstream { .. } => 500,
            AnalysisError::Backend { status, .. } => *status,
        }
    }

    /// Short label used as the `error` field of backend error bodies.
    pub fn label(&self) -> &'static str {
        match self {
            AnalysisError::EmptyContract => "Invalid request",
            AnalysisError::ContractTooLarge { .. } => "Payload too large",
            AnalysisError::Credential { .. } | AnalysisError::Configuration(_) => "Configuration error",
            AnalysisError::RateLimited { .. } => "Rate limited",
            AnalysisError::ServiceUnavailable { .. } | AnalysisError::Network { .. } => "Service unavailable",
            AnalysisError::ModelUnavailable { .. } => "Model unavailable",
            AnalysisError::MalformedResponse { .. } => "Malformed upstream response",
            AnalysisError::Upstream { .. } | AnalysisError::Backend { .. } => "Analysis failed",
        }
    }

    /// Message safe to hand to a remote caller. Credential problems are
    /// reported as a server misconfiguration without provider details.
    pub fn public_message(&self) -> String {
        match self {
            AnalysisError::Credential { .. } | AnalysisError::Configuration(_) => {
                "Server is not properly configured. Please contact the administrator.".to_string()
            }
            other => other.to_string(),
        }
    }

    /// Raw diagnostic text, for verbose output and logs.
    pub fn detail(&self) -> Option<&str> {
        match self {
            AnalysisError::MalformedResponse { raw, .. } => Some(raw),
            AnalysisError::Credential { message }
            | AnalysisError::RateLimited { message }
            | AnalysisError::ServiceUnavailable { message }
            | AnalysisError::Network { message } => Some(message),
            _ => None,
        }
    }

    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            AnalysisError::EmptyContract | AnalysisError::ContractTooLarge { .. }
        )
    }

    /// True for failures the user can fix by simply trying again later.
    pub fn is_retryable_later(&self) -> bool {
        matches!(
            self,
            AnalysisError::RateLimited { .. }
                | AnalysisError::ServiceUnavailable { .. }
                | AnalysisError::Network { .. }
        )
    }
}
