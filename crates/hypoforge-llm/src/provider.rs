//! Backend selection from configuration.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::backend::{
    LlmBackend, LlmError, OllamaBackend, OpenAiBackend, OpenAiCompatibleBackend,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Ollama,
    OpenAi,
    #[serde(rename = "openai_compatible")]
    OpenAiCompatible,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Ollama           => "ollama",
            BackendKind::OpenAi           => "openai",
            BackendKind::OpenAiCompatible => "openai_compatible",
        }
    }
}

#[derive(Debug)]
pub struct BackendConfig {
    pub kind: BackendKind,
    pub model: String,
    pub base_url: Option<String>,
    pub chat_path: Option<String>,
    pub api_key: Option<SecretString>,
    pub timeout: Duration,
}

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// Build the configured backend.
pub fn build_backend(cfg: BackendConfig) -> Result<Arc<dyn LlmBackend>, LlmError> {
    let backend: Arc<dyn LlmBackend> = match cfg.kind {
        BackendKind::Ollama => {
            let url = cfg.base_url.unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
            Arc::new(OllamaBackend::new(url, cfg.model).with_timeout(cfg.timeout))
        }
        BackendKind::OpenAi => {
            let key = cfg.api_key.ok_or_else(|| {
                LlmError::Unavailable("OpenAI backend selected but no API key configured".to_string())
            })?;
            Arc::new(OpenAiBackend::new(key, cfg.model).with_timeout(cfg.timeout))
        }
        BackendKind::OpenAiCompatible => {
            let url = cfg.base_url.ok_or_else(|| {
                LlmError::Unavailable("OpenAI-compatible backend requires llm.base_url".to_string())
            })?;
            let mut b = OpenAiCompatibleBackend::new(url, cfg.model, cfg.api_key)
                .with_timeout(cfg.timeout);
            if let Some(p) = cfg.chat_path {
                b = b.with_chat_path(p);
            }
            Arc::new(b)
        }
    };

    tracing::info!(
        backend = backend.backend_name(),
        model = backend.model_id(),
        is_local = backend.is_local(),
        "LLM backend ready"
    );
    Ok(backend)
}
