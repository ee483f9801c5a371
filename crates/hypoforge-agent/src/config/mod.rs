//! Configuration loading for Hypoforge.
//! Reads hypoforge.toml from the current directory, the `--config` flag, or
//! the path in the HYPOFORGE_CONFIG env var.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use hypoforge_common::RetryPolicy;
use hypoforge_ingestion::models::PreprintServer;
use hypoforge_ingestion::publisher::seechat::{SEECHAT_API_BASE, SEECHAT_WEB_BASE};
use hypoforge_ingestion::reputation::DEFAULT_H_INDEX_THRESHOLD;
use hypoforge_llm::provider::BackendKind;
use secrecy::SecretString;
use serde::Deserialize;

pub const DEFAULT_CONFIG_PATH: &str = "hypoforge.toml";

pub const SEECHAT_KEY_ENV: &str = "HYPOFORGE_SEECHAT_API_KEY";
pub const LLM_KEY_ENV: &str = "HYPOFORGE_LLM_API_KEY";
pub const S2_KEY_ENV: &str = "HYPOFORGE_S2_API_KEY";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub reputation: ReputationConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub publisher: PublisherConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourceConfig {
    #[serde(default = "default_server")]
    pub server: PreprintServer,
    /// Overrides https://api.biorxiv.org (mirrors, local testing).
    pub base_url: Option<String>,
    #[serde(default = "default_source_retries")]
    pub max_retries: u32,
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

fn default_server()         -> PreprintServer { PreprintServer::MedRxiv }
fn default_source_retries() -> u32 { 3 }
fn default_retry_delay_ms() -> u64 { 2000 }
fn default_http_timeout()   -> u64 { 30 }

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            server: default_server(),
            base_url: None,
            max_retries: default_source_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            timeout_secs: default_http_timeout(),
        }
    }
}

impl SourceConfig {
    pub fn retry(&self) -> RetryPolicy {
        RetryPolicy { max_retries: self.max_retries, base_delay: Duration::from_millis(self.retry_delay_ms) }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReputationConfig {
    /// Overrides https://api.semanticscholar.org.
    pub base_url: Option<String>,
    #[serde(default = "default_threshold")]
    pub threshold: u32,
    /// Optional; falls back to HYPOFORGE_S2_API_KEY.
    pub api_key: Option<String>,
    #[serde(default = "default_lookup_retries")]
    pub max_retries: u32,
    #[serde(default = "default_lookup_delay_ms")]
    pub retry_delay_ms: u64,
    #[serde(default = "default_lookup_timeout")]
    pub timeout_secs: u64,
}

fn default_threshold()       -> u32 { DEFAULT_H_INDEX_THRESHOLD }
fn default_lookup_retries()  -> u32 { 2 }
fn default_lookup_delay_ms() -> u64 { 1000 }
fn default_lookup_timeout()  -> u64 { 10 }

impl Default for ReputationConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            threshold: default_threshold(),
            api_key: None,
            max_retries: default_lookup_retries(),
            retry_delay_ms: default_lookup_delay_ms(),
            timeout_secs: default_lookup_timeout(),
        }
    }
}

impl ReputationConfig {
    pub fn retry(&self) -> RetryPolicy {
        RetryPolicy { max_retries: self.max_retries, base_delay: Duration::from_millis(self.retry_delay_ms) }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_kind")]
    pub kind: BackendKind,
    #[serde(default = "default_llm_model")]
    pub model: String,
    pub base_url: Option<String>,
    pub chat_path: Option<String>,
    /// Falls back to HYPOFORGE_LLM_API_KEY.
    pub api_key: Option<String>,
    #[serde(default = "default_max_words")]
    pub max_words: usize,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_llm_kind()    -> BackendKind { BackendKind::Ollama }
fn default_llm_model()   -> String { "llama3:8b".to_string() }
fn default_max_words()   -> usize { 20 }
fn default_max_tokens()  -> u32 { 100 }
fn default_temperature() -> f32 { 0.2 }
fn default_llm_timeout() -> u64 { 60 }

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            kind: default_llm_kind(),
            model: default_llm_model(),
            base_url: None,
            chat_path: None,
            api_key: None,
            max_words: default_max_words(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PublisherConfig {
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_web_base")]
    pub web_base: String,
    /// Falls back to HYPOFORGE_SEECHAT_API_KEY. Required.
    pub api_key: Option<String>,
    #[serde(default = "default_field_of_study")]
    pub field_of_study: String,
    /// Defaults to the display name of `[source] server`.
    pub data_source: Option<String>,
    #[serde(default)]
    pub is_private: bool,
    #[serde(default = "default_edit_retries")]
    pub edit_retries: u32,
    #[serde(default = "default_http_timeout")]
    pub timeout_secs: u64,
}

fn default_api_base()       -> String { SEECHAT_API_BASE.to_string() }
fn default_web_base()       -> String { SEECHAT_WEB_BASE.to_string() }
fn default_field_of_study() -> String { "Medicine".to_string() }
fn default_edit_retries()   -> u32 { 3 }

impl Default for PublisherConfig {
    fn default() -> Self {
        Self {
            api_base: default_api_base(),
            web_base: default_web_base(),
            api_key: None,
            field_of_study: default_field_of_study(),
            data_source: None,
            is_private: false,
            edit_retries: default_edit_retries(),
            timeout_secs: default_http_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: String,
}

fn default_store_path() -> String { "processed_titles.txt".to_string() }

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: default_store_path() }
    }
}

/// Config value if set and non-empty, else the environment variable.
pub fn resolve_secret(configured: Option<&str>, env_var: &str) -> Option<SecretString> {
    configured
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(String::from)
        .or_else(|| std::env::var(env_var).ok().filter(|k| !k.trim().is_empty()))
        .map(SecretString::from)
}

mod tests;

impl Config {
    /// Load configuration from `path`, else HYPOFORGE_CONFIG, else hypoforge.toml.
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let path = path
            .map(String::from)
            .or_else(|| std::env::var("HYPOFORGE_CONFIG").ok())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

        if !Path::new(&path).exists() {
            anyhow::bail!(
                "Config file not found: {}\n\
                 Copy hypoforge.example.toml to hypoforge.toml and edit it.",
                path
            );
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("reading {path}"))?;
        Self::from_toml(&content).with_context(|| format!("parsing {path}"))
    }

    /// Label attached to published hypotheses.
    pub fn data_source(&self) -> String {
        self.publisher
            .data_source
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(self.source.server.display_name())
            .to_string()
    }

    pub fn from_toml(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        if config.llm.max_words == 0 {
            anyhow::bail!("llm.max_words must be at least 1");
        }
        Ok(config)
    }
}
