//! Semantic Scholar author lookup.
//!
//! API: https://api.semanticscholar.org/graph/v1/author/search?query={name}&fields=name,hIndex
//! An API key (header `x-api-key`) raises the rate limit but is optional.

use std::time::Duration;

use async_trait::async_trait;
use hypoforge_common::{HypoforgeError, RetryPolicy, SandboxClient};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::instrument;

use super::{ReputationError, ReputationLookup};

const S2_API_BASE: &str = "https://api.semanticscholar.org";

#[derive(Debug, Deserialize)]
struct AuthorSearchResponse {
    #[serde(default)]
    data: Vec<AuthorRecord>,
}

#[derive(Debug, Deserialize)]
struct AuthorRecord {
    #[serde(rename = "hIndex", default)]
    h_index: Option<i64>,
}

pub struct SemanticScholarClient {
    client:  SandboxClient,
    base:    String,
    api_key: Option<SecretString>,
    retry:   RetryPolicy,
}

impl SemanticScholarClient {
    pub fn new(api_key: Option<SecretString>, timeout: Duration, retry: RetryPolicy) -> Result<Self, HypoforgeError> {
        Ok(Self {
            client: SandboxClient::new(timeout)?,
            base: S2_API_BASE.to_string(),
            api_key,
            retry,
        })
    }

    pub fn with_base_url(mut self, base: impl Into<String>) -> Result<Self, HypoforgeError> {
        let base = base.into();
        self.client.allow_url_host(&base)?;
        self.base = base.trim_end_matches('/').to_string();
        Ok(self)
    }
}

/// Preprint listings write authors as "Family, Given"; the search endpoint
/// matches "Given Family" far more reliably.
pub fn search_name(author: &str) -> String {
    match author.split_once(',') {
        Some((family, given)) if !given.trim().is_empty() => {
            format!("{} {}", given.trim(), family.trim())
        }
        _ => author.trim().trim_end_matches(',').to_string(),
    }
}

#[async_trait]
impl ReputationLookup for SemanticScholarClient {
    #[instrument(skip(self))]
    async fn h_index(&self, author: &str) -> Result<Option<u32>, ReputationError> {
        let url = format!("{}/graph/v1/author/search", self.base);
        let query = search_name(author);

        let resp: AuthorSearchResponse = self.retry
            .run("author lookup", || async {
                let mut req = self.client.get(&url)?
                    .query(&[("query", query.as_str()), ("fields", "name,hIndex"), ("limit", "1")]);
                if let Some(key) = &self.api_key {
                    req = req.header("x-api-key", key.expose_secret());
                }
                let resp = self.client.send(req).await?;
                Ok::<_, HypoforgeError>(resp.json::<AuthorSearchResponse>().await?)
            })
            .await
            .map_err(|e| ReputationError::Lookup(e.to_string()))?;

        Ok(resp.data
            .first()
            .and_then(|a| a.h_index)
            .map(|h| h.max(0) as u32))
    }
}
