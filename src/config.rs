use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::orchestrator::{ModelCandidate, RetryPolicy};
use crate::provider::ProviderKind;

pub const DEFAULT_MAX_CONTRACT_BYTES: usize = 10 * 1024 * 1024;

pub const DEFAULT_BIND: &str = "127.0.0.1:8787";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default = "default_candidates")]
    pub candidates: Vec<ModelCandidate>,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub backend: BackendConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Gemini API key.
    pub api_key: Option<String>,
    /// Overrides the Gemini base URL, e.g. a corporate proxy.
    pub base_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    /// Transport timeout for provider calls. No timeout when unset.
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub rate_limit_base_ms: u64,
    pub overload_base_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub max_contract_bytes: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Route analyses through a trusted backend instead of calling the provider.
    pub enabled: bool,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
    pub allowed_origin: Option<String>,
}

fn default_candidates() -> Vec<ModelCandidate> {
    ["gemini-2.5-flash", "gemini-2.0-flash", "gemini-1.5-flash"]
        .iter()
        .enumerate()
        .map(|(order, model)| ModelCandidate::new(ProviderKind::Gemini, *model, order as u32))
        .collect()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: ProviderConfig::default(),
            candidates: default_candidates(),
            retry: RetryConfig::default(),
            limits: LimitsConfig::default(),
            backend: BackendConfig::default(),
            server: ServerConfig::default(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            rate_limit_base_ms: 1_000,
            overload_base_ms: 2_000,
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_contract_bytes: DEFAULT_MAX_CONTRACT_BYTES,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: DEFAULT_BIND.to_string(),
            allowed_origin: None,
        }
    }
}

impl RetryConfig {
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            rate_limit_base: Duration::from_millis(self.rate_limit_base_ms),
            overload_base: Duration::from_millis(self.overload_base_ms),
        }
    }
}

impl Config {
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;
        Ok(home.join(".themis").join("config.yml"))
    }

    /// Loads the config file (creating it with defaults when missing) and
    /// applies environment overrides on top.
    pub async fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::config_path()?).await?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Loads exactly what is on disk, without environment overrides.
    pub async fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = fs::read_to_string(path).await?;
            let config: Config = serde_yaml::from_str(&content)
                .map_err(|e| anyhow::anyhow!("Invalid config file {}: {}", path.display(), e))?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path).await?;
            Ok(config)
        }
    }

    pub async fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?).await
    }

    pub async fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let content = serde_yaml::to_string(self)?;
        fs::write(path, content).await?;

        Ok(())
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Applies overrides from a variable lookup. Blank values are ignored.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(key) = get("GEMINI_API_KEY").or_else(|| get("GENAI_API_KEY")) {
            self.provider.api_key = Some(key);
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            self.provider.openai_api_key = Some(key);
        }
        if let Some(url) = get("THEMIS_PROXY_BASE_URL") {
            self.provider.base_url = Some(url);
        }
        if let Some(url) = get("THEMIS_BACKEND_URL") {
            self.backend.enabled = true;
            self.backend.url = Some(url);
        }
        if let Some(origin) = get("ALLOWED_ORIGIN") {
            self.server.allowed_origin = Some(origin);
        }
        if let Some(bind) = get("THEMIS_BIND") {
            self.server.bind = bind;
        }
    }

    pub fn set_api_key(&mut self, api_key: String) {
        self.provider.api_key = Some(api_key);
    }

    pub fn set_openai_api_key(&mut self, api_key: String) {
        self.provider.openai_api_key = Some(api_key);
    }

    pub fn set_backend_url(&mut self, url: Option<String>) {
        self.backend.enabled = url.is_some();
        self.backend.url = url;
    }

    /// Moves `model` to the top of the candidate list, adding it if needed.
    /// Remaining candidates keep their relative order.
    pub fn promote_model(&mut self, provider: ProviderKind, model: &str) {
        let mut candidates: Vec<ModelCandidate> = self
            .candidates
            .iter()
            .filter(|c| !(c.provider == provider && c.model == model))
            .cloned()
            .collect();
        candidates.sort_by_key(|c| c.order);
        candidates.insert(0, ModelCandidate::new(provider, model, 0));
        for (order, candidate) in candidates.iter_mut().enumerate() {
            candidate.order = order as u32;
        }
        self.candidates = candidates;
    }

    pub fn has_credential_for(&self, provider: ProviderKind) -> bool {
        let key = match provider {
            ProviderKind::Gemini => &self.provider.api_key,
            ProviderKind::OpenAi => &self.provider.openai_api_key,
        };
        key.as_ref().map_or(false, |k| !k.trim().is_empty())
    }

    pub fn is_ai_configured(&self) -> bool {
        if self.backend.enabled {
            return self.backend.url.is_some();
        }
        self.candidates
            .iter()
            .any(|candidate| self.has_credential_for(candidate.provider))
    }

    pub fn validate(&self) -> ValidationResult {
        let mut issues = Vec::new();
        let mut warnings = Vec::new();

        if self.backend.enabled {
            match self.backend.url.as_deref() {
                None | Some("") => issues.push("Backend mode is enabled but no backend URL is set".to_string()),
                Some(url) if !url.starts_with("http://") && !url.starts_with("https://") => {
                    issues.push(format!("Backend URL must start with http:// or https:// (got '{}')", url))
                }
                _ => {}
            }
        } else {
            if self.candidates.is_empty() {
                issues.push("No model candidates configured".to_string());
            }
            for candidate in &self.candidates {
                if candidate.model.trim().is_empty() {
                    issues.push(format!("Candidate #{} has an empty model name", candidate.order));
                }
                if !self.has_credential_for(candidate.provider) {
                    warnings.push(format!(
                        "No API key configured for {}; candidate '{}' will be skipped",
                        candidate.provider, candidate.model
                    ));
                }
            }
            if !self.is_ai_configured() {
                issues.push("No API key configured for any candidate provider".to_string());
            }
        }

        if let Some(ref key) = self.provider.api_key {
            if key.len() < 10 {
                warnings.push("Gemini API key seems too short".to_string());
            }
        }

        if self.retry.max_retries == 0 {
            warnings.push("max_retries is 0; each candidate is still tried once".to_string());
        } else if self.retry.max_retries > 10 {
            warnings.push("max_retries is very high (>10), consider reducing it".to_string());
        }

        if self.limits.max_contract_bytes == 0 {
            issues.push("max_contract_bytes must be greater than 0".to_string());
        }

        if let Some(0) = self.provider.timeout_secs {
            warnings.push("timeout_secs is 0, which disables the transport timeout".to_string());
        }

        if self.server.bind.parse::<std::net::SocketAddr>().is_err() {
            issues.push(format!("Invalid server bind address: {}", self.server.bind));
        }

        ValidationResult {
            is_valid: issues.is_empty(),
            issues,
            warnings,
        }
    }
}

/// Masks all but the last four characters of a secret.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    if chars.len() <= 4 {
        return "*".repeat(chars.len());
    }
    let visible: String = chars[chars.len() - 4..].iter().collect();
    format!("{}{}", "*".repeat(chars.len() - 4), visible)
}

#[derive(Debug)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub issues: Vec<String>,
    pub warnings: Vec<String>,
}
