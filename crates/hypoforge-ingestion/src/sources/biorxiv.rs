//! bioRxiv / medRxiv preprint client.
//!
//! Uses the bioRxiv REST API:
//!   https://api.biorxiv.org/details/{server}/{start}/{end}/{cursor}/json
//!
//! Each call returns at most 100 records; `messages[0]` carries the cursor,
//! the page count and the total for the interval.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use hypoforge_common::{HypoforgeError, RetryPolicy, SandboxClient};
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use crate::models::{normalize_title, DateRange, Paper, PreprintServer};
use super::{PaperPage, PaperSource, SourceError};

const BIORXIV_API_BASE: &str = "https://api.biorxiv.org";
const PAGE_SIZE: u64 = 100;

#[derive(Debug, Deserialize)]
struct ListingResponse {
    #[serde(default)]
    messages: Vec<serde_json::Value>,
    #[serde(default)]
    collection: Vec<PreprintRecord>,
}

#[derive(Debug, Deserialize)]
struct PreprintRecord {
    #[serde(default)]
    doi: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    authors: String,
    #[serde(default)]
    date: String,
    #[serde(default)]
    version: Option<serde_json::Value>,
    #[serde(default)]
    category: Option<String>,
    #[serde(rename = "abstract", default)]
    abstract_text: String,
}

pub struct BioRxivClient {
    client: SandboxClient,
    server: PreprintServer,
    base:   String,
    retry:  RetryPolicy,
}

impl BioRxivClient {
    pub fn new(server: PreprintServer, timeout: Duration, retry: RetryPolicy) -> Result<Self, HypoforgeError> {
        Ok(Self {
            client: SandboxClient::new(timeout)?,
            server,
            base: BIORXIV_API_BASE.to_string(),
            retry,
        })
    }

    /// Point the client at a different API host (mirrors, tests).
    pub fn with_base_url(mut self, base: impl Into<String>) -> Result<Self, HypoforgeError> {
        let base = base.into();
        self.client.allow_url_host(&base)?;
        self.base = base.trim_end_matches('/').to_string();
        Ok(self)
    }

    fn page_url(&self, range: &DateRange, cursor: u64) -> String {
        format!("{}/details/{}/{}/{}/json", self.base, self.server.as_str(), range.interval(), cursor)
    }

    fn record_to_paper(&self, record: PreprintRecord) -> Option<Paper> {
        let title = normalize_title(&record.title);
        if title.is_empty() {
            warn!(server = self.server.as_str(), doi = ?record.doi, "Skipping record without title");
            return None;
        }

        let publication_date = match NaiveDate::parse_from_str(record.date.trim(), "%Y-%m-%d") {
            Ok(d) => d,
            Err(_) => {
                warn!(title = %title, date = %record.date, "Skipping record with unparseable date");
                return None;
            }
        };

        let authors: Vec<String> = record.authors
            .split(';')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        let version = record.version.and_then(|v| match v {
            serde_json::Value::String(s) => Some(s),
            serde_json::Value::Number(n) => Some(n.to_string()),
            _ => None,
        });

        Some(Paper {
            title,
            abstract_text: record.abstract_text.trim().to_string(),
            authors,
            publication_date,
            doi: record.doi.filter(|d| !d.trim().is_empty()),
            version,
            category: record.category.filter(|c| !c.trim().is_empty()),
            server: self.server,
        })
    }
}

/// Numbers in `messages` arrive either as JSON numbers or as strings.
fn lenient_u64(v: &serde_json::Value) -> Option<u64> {
    v.as_u64().or_else(|| v.as_str().and_then(|s| s.trim().parse().ok()))
}

/// Cursor of the page after `cursor`, given what this page reported.
fn next_cursor(cursor: u64, count: u64, total: Option<u64>) -> Option<u64> {
    if count == 0 {
        return None;
    }
    let next = cursor + count;
    match total {
        Some(total) if next < total => Some(next),
        Some(_) => None,
        None if count >= PAGE_SIZE => Some(next),
        None => None,
    }
}

#[async_trait]
impl PaperSource for BioRxivClient {
    #[instrument(skip(self), fields(server = self.server.as_str()))]
    async fn fetch_page(&self, range: DateRange, cursor: u64) -> Result<PaperPage, SourceError> {
        let url = self.page_url(&range, cursor);

        let body = self.retry
            .run("preprint listing", || async {
                let req = self.client.get(&url)?;
                let resp = self.client.send(req).await?;
                Ok::<_, HypoforgeError>(resp.text().await?)
            })
            .await
            .map_err(|e| SourceError::Unavailable(e.to_string()))?;

        let listing: ListingResponse = serde_json::from_str(&body)
            .map_err(|e| SourceError::Malformed(e.to_string()))?;

        let status = listing.messages.first()
            .and_then(|m| m["status"].as_str())
            .unwrap_or("ok");
        if status != "ok" {
            // "no posts found" is how the API reports an empty interval
            debug!(status, "Listing reported no records");
            return Ok(PaperPage::default());
        }

        let fetched = listing.collection.len() as u64;
        let total = listing.messages.first().and_then(|m| lenient_u64(&m["total"]));
        let count = listing.messages.first()
            .and_then(|m| lenient_u64(&m["count"]))
            .unwrap_or(fetched);

        let papers: Vec<Paper> = listing.collection
            .into_iter()
            .filter_map(|r| self.record_to_paper(r))
            .collect();

        debug!(fetched, kept = papers.len(), ?total, "bioRxiv API response");

        Ok(PaperPage { papers, next_cursor: next_cursor(cursor, count, total) })
    }

    fn name(&self) -> &str {
        self.server.as_str()
    }
}
