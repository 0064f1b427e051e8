//! Backend selection and construction

use super::{LlmError, LlmService, LoggingService, OllamaService, OpenAiService, SamplingParams};
use crate::config::{env_parse, env_parse_opt, env_var, ConfigError};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_TEMPERATURE: f32 = 0.1;
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 300;

/// Which chat API to talk to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendKind {
    /// Ollama `/api/chat`
    #[default]
    Ollama,
    /// `/v1/chat/completions` (llama.cpp server, vLLM, `OpenAI`)
    OpenAi,
}

impl BackendKind {
    pub fn default_base_url(self) -> &'static str {
        match self {
            BackendKind::Ollama => "http://localhost:11434",
            BackendKind::OpenAi => "http://localhost:8080",
        }
    }

    pub fn default_model(self) -> &'static str {
        match self {
            BackendKind::Ollama => "qwen38B_analyst:latest",
            BackendKind::OpenAi => "qwen2.5-14b-instruct",
        }
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ollama" => Ok(BackendKind::Ollama),
            "openai" | "llamacpp" | "llama.cpp" => Ok(BackendKind::OpenAi),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Ollama => write!(f, "ollama"),
            BackendKind::OpenAi => write!(f, "openai"),
        }
    }
}

/// Configuration for the model backend
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: BackendKind,
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub http_timeout: Duration,
}

impl LlmConfig {
    /// Defaults for a backend
    pub fn for_backend(backend: BackendKind) -> Self {
        Self {
            backend,
            model: backend.default_model().to_string(),
            base_url: backend.default_base_url().to_string(),
            api_key: None,
            temperature: Some(DEFAULT_TEMPERATURE),
            max_tokens: None,
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
        }
    }

    pub fn from_env() -> Result<Self, ConfigError> {
        let backend = match env_var("LLM_BACKEND") {
            Some(name) => name.parse()?,
            None => BackendKind::default(),
        };
        let defaults = Self::for_backend(backend);

        Ok(Self {
            backend,
            model: env_var("LLM_MODEL").unwrap_or(defaults.model),
            base_url: env_var("LLM_BASE_URL").unwrap_or(defaults.base_url),
            api_key: env_var("LLM_API_KEY"),
            temperature: Some(env_parse("LLM_TEMPERATURE", DEFAULT_TEMPERATURE)?),
            max_tokens: env_parse_opt("LLM_MAX_TOKENS")?,
            http_timeout: Duration::from_secs(env_parse(
                "LLM_TIMEOUT_SECS",
                DEFAULT_HTTP_TIMEOUT_SECS,
            )?),
        })
    }

    pub fn sampling(&self) -> SamplingParams {
        SamplingParams {
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self::for_backend(BackendKind::default())
    }
}

/// Build the configured backend, wrapped with logging
pub fn build_service(config: &LlmConfig) -> Result<Arc<dyn LlmService>, LlmError> {
    let service: Arc<dyn LlmService> = match config.backend {
        BackendKind::Ollama => Arc::new(OllamaService::new(
            &config.base_url,
            &config.model,
            config.http_timeout,
        )?),
        BackendKind::OpenAi => Arc::new(OpenAiService::new(
            &config.base_url,
            &config.model,
            config.api_key.clone(),
            config.http_timeout,
        )?),
    };

    tracing::info!(
        backend = %config.backend,
        model = %config.model,
        base_url = %config.base_url,
        "Model backend configured"
    );
    Ok(Arc::new(LoggingService::new(service)))
}
