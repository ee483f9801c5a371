//! Problem statement extraction.
//!
//! Asks the configured LLM to reduce an abstract to one plain sentence naming
//! the paper's core research problem. Output is cleaned, then checked against
//! the word budget; an empty or far-over-budget answer gets exactly one retry.

use std::sync::Arc;
use std::time::Instant;

use hypoforge_llm::audit::LlmAuditEntry;
use hypoforge_llm::backend::{LlmBackend, LlmError, LlmRequest, Message};
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::models::{word_count, ProblemStatement};

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("paper has no abstract")]
    EmptyAbstract,
    #[error("model call failed: {0}")]
    Backend(#[from] LlmError),
    #[error("model returned an empty statement")]
    EmptyOutput,
    #[error("statement has {words} words, limit is {limit}")]
    OverBudget { words: usize, limit: usize },
}

#[derive(Debug, Clone)]
pub struct ExtractionConfig {
    /// Target length requested from the model.
    pub max_words: usize,
    /// Answers longer than `max_words * overrun_factor` are regenerated once.
    pub overrun_factor: f64,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self { max_words: 20, overrun_factor: 1.5, max_tokens: 100, temperature: 0.2 }
    }
}

impl ExtractionConfig {
    pub fn hard_limit(&self) -> usize {
        (self.max_words as f64 * self.overrun_factor).floor() as usize
    }

    fn within_budget(&self, words: usize) -> bool {
        words as f64 <= self.max_words as f64 * self.overrun_factor
    }
}

lazy_static! {
    static ref LABEL_PREFIX: Regex = Regex::new(
        r"(?i)^(?:\*\*)?\s*(?:the\s+)?(?:core\s+)?(?:research\s+)?(?:problem(?:\s+statement)?|answer|output)\s*(?:\*\*)?\s*[:\-]\s*(?:\*\*)?\s*"
    ).expect("valid regex");
    static ref PREAMBLE: Regex = Regex::new(
        r"(?i)^(?:\*\*)?\s*here(?:\s+is|'s|’s)\b[^:]*:\s*(?:\*\*)?\s*"
    ).expect("valid regex");
    static ref PROMPT_ECHO: Regex = Regex::new(
        r#"(?i)^\s*(?:abstract\s*:|"""|extract the core research problem|take a deep breath)"#
    ).expect("valid regex");
}

fn system_prompt(max_words: usize) -> String {
    format!(
        "You are a scientific research assistant who reads research abstracts and identifies \
         the core problem a paper addresses.\n\
         Reply with the core problem or main issue only. Do not mention methods, solutions or results.\n\
         Use plain language any reader can follow.\n\
         Reply with a single sentence of no more than {max_words} words and nothing else: \
         no introduction, no explanation, no labels."
    )
}

fn user_prompt(abstract_text: &str, max_words: usize) -> String {
    format!(
        "Abstract: \"\"\"{}\"\"\"\n\nExtract the core research problem in at most {max_words} words.",
        abstract_text.trim()
    )
}

/// Strip labels, quotes and echoed prompt lines from a raw completion.
///
/// Returns the first line with something left after cleaning; a
/// "Here is the problem:" preamble on its own line falls through to the next.
pub fn clean_statement(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !PROMPT_ECHO.is_match(l))
        .map(clean_line)
        .find(|l| !l.is_empty())
        .unwrap_or_default()
}

fn clean_line(line: &str) -> String {
    let line = PREAMBLE.replace(line, "");
    let unlabelled = LABEL_PREFIX.replace(line.trim(), "");
    unlabelled
        .trim()
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '“' | '”' | '*' | '`'))
        .trim()
        .to_string()
}

pub struct ProblemExtractor {
    backend: Arc<dyn LlmBackend>,
    cfg: ExtractionConfig,
}

impl ProblemExtractor {
    pub fn new(backend: Arc<dyn LlmBackend>, cfg: ExtractionConfig) -> Self {
        Self { backend, cfg }
    }

    #[instrument(skip_all, fields(model = self.backend.model_id()))]
    pub async fn extract(&self, abstract_text: &str) -> Result<ProblemStatement, ExtractionError> {
        if abstract_text.trim().is_empty() {
            return Err(ExtractionError::EmptyAbstract);
        }

        let mut messages = vec![
            Message::system(system_prompt(self.cfg.max_words)),
            Message::user(user_prompt(abstract_text, self.cfg.max_words)),
        ];

        let first = self.complete(&messages).await?;
        let words = word_count(&first);
        if !first.is_empty() && self.cfg.within_budget(words) {
            return Ok(ProblemStatement { text: first });
        }

        warn!(words, limit = self.cfg.hard_limit(), "Statement empty or over budget, regenerating once");
        messages.push(Message { role: "assistant".to_string(), content: first });
        messages.push(Message::user(format!(
            "That answer had {words} words. Reply again with one sentence of at most {} words.",
            self.cfg.max_words
        )));

        let second = self.complete(&messages).await?;
        let words = word_count(&second);
        if second.is_empty() {
            return Err(ExtractionError::EmptyOutput);
        }
        if !self.cfg.within_budget(words) {
            return Err(ExtractionError::OverBudget { words, limit: self.cfg.hard_limit() });
        }
        Ok(ProblemStatement { text: second })
    }

    async fn complete(&self, messages: &[Message]) -> Result<String, ExtractionError> {
        let req = LlmRequest {
            messages: messages.to_vec(),
            model: None,
            max_tokens: Some(self.cfg.max_tokens),
            temperature: Some(self.cfg.temperature),
        };

        let t0 = Instant::now();
        let resp = self.backend.complete(req).await?;
        LlmAuditEntry::new("problem_extraction", self.backend.as_ref(), &resp, t0.elapsed().as_millis() as u64)
            .record();

        let cleaned = clean_statement(&resp.content);
        debug!(raw_len = resp.content.len(), words = word_count(&cleaned), "Completion cleaned");
        Ok(cleaned)
    }
}
