//! hypoforge-llm: LLM backend abstraction layer.
//! Chat-completion backends, provider selection from configuration,
//! and audit records for every model call.

pub mod audit;
pub mod backend;
pub mod provider;
