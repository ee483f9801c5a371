//! Hypothesis publishing.
//!
//! Callers see a single `publish` call. The SeeChat client needs two remote
//! calls (create, then edit); if the second fails the created record is left
//! behind and reported through `PublishError::Partial` with its remote id.

pub mod seechat;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{Hypothesis, Paper, ProblemStatement};

#[derive(Debug, Error)]
pub enum PublishError {
    /// Nothing was created remotely.
    #[error("publish failed: {0}")]
    Failed(String),
    /// The hypothesis exists remotely but is incomplete.
    #[error("hypothesis {remote_id} created but not completed: {reason}")]
    Partial { remote_id: String, reason: String },
}

impl PublishError {
    pub fn remote_id(&self) -> Option<&str> {
        match self {
            PublishError::Failed(_) => None,
            PublishError::Partial { remote_id, .. } => Some(remote_id),
        }
    }
}

/// Everything needed to publish one paper's hypothesis.
#[derive(Debug, Clone, Copy)]
pub struct PublishRequest<'a> {
    pub field_of_study: &'a str,
    pub statement: &'a ProblemStatement,
    pub paper: &'a Paper,
}

#[async_trait]
pub trait HypothesisPublisher: Send + Sync {
    async fn publish(&self, req: PublishRequest<'_>) -> Result<Hypothesis, PublishError>;
}
