//! Audit records for LLM calls.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::backend::{LlmBackend, LlmResponse};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmAuditEntry {
    pub id: Uuid,
    /// What the call was for, e.g. "problem_extraction".
    pub purpose: String,
    pub model: String,
    pub backend: String,
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub output_hash: String,
    pub latency_ms: u64,
    pub called_at: chrono::DateTime<Utc>,
}

impl LlmAuditEntry {
    pub fn new(
        purpose: impl Into<String>,
        backend: &dyn LlmBackend,
        response: &LlmResponse,
        latency_ms: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            purpose: purpose.into(),
            model: response.model.clone(),
            backend: backend.backend_name().to_string(),
            prompt_tokens: response.prompt_tokens,
            completion_tokens: response.completion_tokens,
            output_hash: output_hash(&response.content),
            latency_ms,
            called_at: Utc::now(),
        }
    }

    /// Emit the entry on the `hypoforge::llm_audit` tracing target.
    pub fn record(&self) {
        tracing::debug!(
            target: "hypoforge::llm_audit",
            id = %self.id,
            purpose = %self.purpose,
            model = %self.model,
            backend = %self.backend,
            prompt_tokens = self.prompt_tokens,
            completion_tokens = self.completion_tokens,
            output_hash = %self.output_hash,
            latency_ms = self.latency_ms,
            "LLM call"
        );
    }
}

pub fn output_hash(output: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(output.as_bytes());
    format!("{:x}", hasher.finalize())
}
