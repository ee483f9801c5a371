//! Preprint source clients.

pub mod biorxiv;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use thiserror::Error;

use crate::models::{DateRange, InvalidDateRange, Paper};

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    InvalidRange(#[from] InvalidDateRange),
    #[error("malformed listing response: {0}")]
    Malformed(String),
}

/// One page of a date-range listing.
#[derive(Debug, Clone, Default)]
pub struct PaperPage {
    pub papers: Vec<Paper>,
    /// Cursor of the following page, `None` once the upstream has no more.
    pub next_cursor: Option<u64>,
}

/// Common interface for preprint listing clients.
#[async_trait]
pub trait PaperSource: Send + Sync {
    /// Fetch the page starting at `cursor` for papers published within `range`.
    async fn fetch_page(&self, range: DateRange, cursor: u64) -> Result<PaperPage, SourceError>;

    /// Human-readable name for logs.
    fn name(&self) -> &str;
}

/// Lazily walks every page of `range`, yielding papers as pages arrive.
/// Calling it again restarts from the first page.
pub fn paper_stream<'a>(
    source: &'a dyn PaperSource,
    range: DateRange,
) -> BoxStream<'a, Result<Paper, SourceError>> {
    stream::try_unfold(Some(0u64), move |cursor| async move {
        let Some(cursor) = cursor else {
            return Ok::<_, SourceError>(None);
        };
        let page = source.fetch_page(range, cursor).await?;
        tracing::debug!(
            source = source.name(),
            cursor,
            n = page.papers.len(),
            next = ?page.next_cursor,
            "Listing page fetched"
        );
        Ok(Some((page.papers, page.next_cursor)))
    })
    .map_ok(|papers| stream::iter(papers.into_iter().map(Ok::<_, SourceError>)))
    .try_flatten()
    .boxed()
}
