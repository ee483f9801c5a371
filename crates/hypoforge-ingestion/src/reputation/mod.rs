//! Author reputation gate.
//!
//! A paper passes when at least one author's H-index reaches the configured
//! threshold. Lookup failures never fail the paper: the author is treated as
//! unknown (H-index 0) and the remaining authors are still checked.

pub mod semantic_scholar;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::AuthorReputation;

pub const DEFAULT_H_INDEX_THRESHOLD: u32 = 10;

#[derive(Debug, Error)]
pub enum ReputationError {
    #[error("reputation lookup failed: {0}")]
    Lookup(String),
}

/// Bibliographic database keyed by author name.
#[async_trait]
pub trait ReputationLookup: Send + Sync {
    /// `Ok(None)` when the author is not found.
    async fn h_index(&self, author: &str) -> Result<Option<u32>, ReputationError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterDecision {
    Accept { author: String, h_index: u32 },
    Reject { best_h_index: u32, unknown: usize },
}

impl FilterDecision {
    pub fn is_accept(&self) -> bool {
        matches!(self, FilterDecision::Accept { .. })
    }
}

pub struct AuthorReputationFilter {
    lookup: Arc<dyn ReputationLookup>,
    threshold: u32,
}

impl AuthorReputationFilter {
    pub fn new(lookup: Arc<dyn ReputationLookup>, threshold: u32) -> Self {
        Self { lookup, threshold }
    }

    /// Resolve one author; errors degrade to unknown.
    pub async fn resolve(&self, author: &str) -> AuthorReputation {
        let h_index = match self.lookup.h_index(author).await {
            Ok(h) => h,
            Err(e) => {
                warn!(author, error = %e, "Reputation lookup failed, treating author as unknown");
                None
            }
        };
        AuthorReputation { author_id: author.to_string(), h_index }
    }

    /// Checks authors in listing order and stops at the first one that clears the threshold.
    pub async fn check(&self, authors: &[String]) -> FilterDecision {
        let mut best = 0;
        let mut unknown = 0;

        for author in authors {
            let rep = self.resolve(author).await;
            debug!(author = %rep.author_id, h_index = ?rep.h_index, "Author resolved");
            if rep.h_index.is_none() {
                unknown += 1;
            }
            let h = rep.effective_h_index();
            if h >= self.threshold {
                return FilterDecision::Accept { author: rep.author_id, h_index: h };
            }
            best = best.max(h);
        }

        FilterDecision::Reject { best_h_index: best, unknown }
    }
}
