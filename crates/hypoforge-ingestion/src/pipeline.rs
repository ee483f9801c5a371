//! Preprint-to-hypothesis pipeline.
//!
//! Papers are processed strictly one at a time:
//!   1. Skip titles already in the title store
//!   2. Gate on author reputation
//!   3. Extract the problem statement
//!   4. Publish the hypothesis
//!   5. Record the title (only after a complete publish)
//!
//! A failure at any stage ends that paper's processing and the run moves on.
//! Only a source failure before the first paper arrives, or a store write
//! failure, aborts the run.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use futures::StreamExt;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::dedup::{StoreError, TitleStore};
use crate::extraction::ProblemExtractor;
use crate::models::{normalize_title, DateRange, Hypothesis, Paper};
use crate::publisher::{HypothesisPublisher, PublishError, PublishRequest};
use crate::reputation::{AuthorReputationFilter, FilterDecision};
use crate::sources::{paper_stream, PaperSource, SourceError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Source(#[from] SourceError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

// ── Progress events ───────────────────────────────────────────────────────────

/// Progress event emitted during a run (cloneable for broadcast).
#[derive(Debug, Clone, Serialize)]
pub struct PipelineProgress {
    pub run_id: Uuid,
    /// `start`, an outcome label per paper, or `complete`.
    pub stage: String,
    pub title: Option<String>,
    pub message: String,
    pub papers_seen: usize,
}

// ── Per-paper outcome ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum PaperOutcome {
    /// Title already processed by an earlier run.
    Skipped,
    Rejected { best_h_index: u32, unknown_authors: usize },
    ExtractionFailed(String),
    PublishFailed(String),
    /// Created remotely but not completed; needs manual follow-up.
    Partial { remote_id: String, reason: String },
    Published(Hypothesis),
}

impl PaperOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            PaperOutcome::Skipped => "skipped",
            PaperOutcome::Rejected { .. } => "rejected",
            PaperOutcome::ExtractionFailed(_) => "extraction_failed",
            PaperOutcome::PublishFailed(_) => "publish_failed",
            PaperOutcome::Partial { .. } => "partial",
            PaperOutcome::Published(_) => "published",
        }
    }
}

// ── Result summary ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PartialPublish {
    pub title: String,
    pub remote_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    /// Every paper the source yielded, skipped ones included.
    pub fetched: usize,
    pub skipped: usize,
    pub rejected: usize,
    pub extraction_failed: usize,
    pub publish_failed: usize,
    pub published: usize,
    pub partial: usize,
    pub partials: Vec<PartialPublish>,
    pub published_urls: Vec<String>,
    /// Set when fetching stopped early after some papers were processed.
    pub source_error: Option<String>,
    pub duration_ms: u64,
}

impl RunSummary {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            fetched: 0,
            skipped: 0,
            rejected: 0,
            extraction_failed: 0,
            publish_failed: 0,
            published: 0,
            partial: 0,
            partials: Vec::new(),
            published_urls: Vec::new(),
            source_error: None,
            duration_ms: 0,
        }
    }

    fn tally(&mut self, title: &str, outcome: &PaperOutcome) {
        match outcome {
            PaperOutcome::Skipped => self.skipped += 1,
            PaperOutcome::Rejected { .. } => self.rejected += 1,
            PaperOutcome::ExtractionFailed(_) => self.extraction_failed += 1,
            PaperOutcome::PublishFailed(_) => self.publish_failed += 1,
            PaperOutcome::Partial { remote_id, .. } => {
                self.partial += 1;
                self.partials.push(PartialPublish {
                    title: title.to_string(),
                    remote_id: remote_id.clone(),
                });
            }
            PaperOutcome::Published(h) => {
                self.published += 1;
                self.published_urls.push(h.url.clone());
            }
        }
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Run {} finished in {} ms", self.run_id, self.duration_ms)?;
        writeln!(f, "  fetched:           {}", self.fetched)?;
        writeln!(f, "  skipped:           {}", self.skipped)?;
        writeln!(f, "  rejected:          {}", self.rejected)?;
        writeln!(f, "  extraction failed: {}", self.extraction_failed)?;
        writeln!(f, "  publish failed:    {}", self.publish_failed)?;
        writeln!(f, "  published:         {}", self.published)?;
        write!(f, "  partial:           {}", self.partial)?;
        if !self.partials.is_empty() {
            write!(f, "\nPartially published (created but not completed, fix by hand):")?;
            for p in &self.partials {
                write!(f, "\n  - {} (remote id {})", p.title, p.remote_id)?;
            }
        }
        if let Some(err) = &self.source_error {
            write!(f, "\nFetching stopped early: {err}")?;
        }
        Ok(())
    }
}

// ── Orchestrator ──────────────────────────────────────────────────────────────

pub struct Pipeline {
    source: Arc<dyn PaperSource>,
    filter: AuthorReputationFilter,
    extractor: ProblemExtractor,
    publisher: Arc<dyn HypothesisPublisher>,
    field_of_study: String,
    progress_tx: Option<broadcast::Sender<PipelineProgress>>,
}

impl Pipeline {
    pub fn new(
        source: Arc<dyn PaperSource>,
        filter: AuthorReputationFilter,
        extractor: ProblemExtractor,
        publisher: Arc<dyn HypothesisPublisher>,
        field_of_study: impl Into<String>,
    ) -> Self {
        Self {
            source,
            filter,
            extractor,
            publisher,
            field_of_study: field_of_study.into(),
            progress_tx: None,
        }
    }

    pub fn with_progress(mut self, tx: broadcast::Sender<PipelineProgress>) -> Self {
        self.progress_tx = Some(tx);
        self
    }

    fn emit(&self, run_id: Uuid, stage: &str, title: Option<&str>, message: String, papers_seen: usize) {
        if let Some(tx) = &self.progress_tx {
            // no receivers is fine
            let _ = tx.send(PipelineProgress {
                run_id,
                stage: stage.to_string(),
                title: title.map(String::from),
                message,
                papers_seen,
            });
        }
    }

    /// Process every paper published within `range`.
    ///
    /// The store is only written after a paper's hypothesis is fully
    /// published, and is flushed paper by paper.
    #[instrument(skip(self, store, range), fields(source = self.source.name(), range = %range.interval()))]
    pub async fn run(&self, range: DateRange, store: &mut dyn TitleStore) -> Result<RunSummary, PipelineError> {
        let run_id = Uuid::new_v4();
        let t0 = Instant::now();
        let mut summary = RunSummary::new(run_id);

        info!(run_id = %run_id, known_titles = store.len(), "Starting hypothesis pipeline");
        self.emit(run_id, "start", None, format!("Fetching {}", range.interval()), 0);

        let mut papers = paper_stream(self.source.as_ref(), range);
        while let Some(next) = papers.next().await {
            let mut paper = match next {
                Ok(p) => p,
                Err(e) if summary.fetched == 0 => {
                    warn!(run_id = %run_id, error = %e, "Source unavailable, aborting run");
                    return Err(e.into());
                }
                Err(e) => {
                    warn!(run_id = %run_id, fetched = summary.fetched, error = %e, "Source failed mid-run, stopping fetch");
                    summary.source_error = Some(e.to_string());
                    break;
                }
            };
            summary.fetched += 1;
            // Sources other than bioRxiv may hand over raw titles.
            paper.title = normalize_title(&paper.title);

            let outcome = self.process_paper(&paper, &*store).await;
            if matches!(outcome, PaperOutcome::Published(_)) {
                store.record(&paper.title)?;
            }

            log_outcome(&paper, &outcome);
            summary.tally(&paper.title, &outcome);
            self.emit(run_id, outcome.label(), Some(&paper.title), outcome_message(&outcome), summary.fetched);
        }

        summary.duration_ms = t0.elapsed().as_millis() as u64;
        info!(
            run_id = %run_id,
            fetched = summary.fetched,
            skipped = summary.skipped,
            rejected = summary.rejected,
            extraction_failed = summary.extraction_failed,
            publish_failed = summary.publish_failed,
            published = summary.published,
            partial = summary.partial,
            duration_ms = summary.duration_ms,
            "Hypothesis pipeline complete"
        );
        self.emit(run_id, "complete", None, format!("{} published", summary.published), summary.fetched);

        Ok(summary)
    }

    /// Drive one paper through the state machine. Never writes the store.
    pub async fn process_paper(&self, paper: &Paper, store: &dyn TitleStore) -> PaperOutcome {
        if store.contains(&paper.title) {
            return PaperOutcome::Skipped;
        }

        if let FilterDecision::Reject { best_h_index, unknown } = self.filter.check(&paper.authors).await {
            return PaperOutcome::Rejected { best_h_index, unknown_authors: unknown };
        }

        let statement = match self.extractor.extract(&paper.abstract_text).await {
            Ok(s) => s,
            Err(e) => return PaperOutcome::ExtractionFailed(e.to_string()),
        };

        let req = PublishRequest {
            field_of_study: &self.field_of_study,
            statement: &statement,
            paper,
        };
        match self.publisher.publish(req).await {
            Ok(h) => PaperOutcome::Published(h),
            Err(PublishError::Partial { remote_id, reason }) => PaperOutcome::Partial { remote_id, reason },
            Err(e @ PublishError::Failed(_)) => PaperOutcome::PublishFailed(e.to_string()),
        }
    }
}

fn outcome_message(outcome: &PaperOutcome) -> String {
    match outcome {
        PaperOutcome::Skipped => "already processed".to_string(),
        PaperOutcome::Rejected { best_h_index, .. } => format!("best h-index {best_h_index}"),
        PaperOutcome::ExtractionFailed(e) | PaperOutcome::PublishFailed(e) => e.clone(),
        PaperOutcome::Partial { remote_id, reason } => format!("{remote_id}: {reason}"),
        PaperOutcome::Published(h) => h.url.clone(),
    }
}

fn log_outcome(paper: &Paper, outcome: &PaperOutcome) {
    let title = paper.title.as_str();
    match outcome {
        PaperOutcome::Skipped => info!(title, "Skipped: already processed"),
        PaperOutcome::Rejected { best_h_index, unknown_authors } => {
            info!(title, best_h_index, unknown_authors, "Rejected: no author meets the h-index threshold")
        }
        PaperOutcome::ExtractionFailed(e) => warn!(title, error = %e, "Extraction failed"),
        PaperOutcome::PublishFailed(e) => warn!(title, error = %e, "Publish failed"),
        PaperOutcome::Partial { remote_id, reason } => {
            warn!(title, remote_id = %remote_id, reason = %reason, "Partially published, needs manual follow-up")
        }
        PaperOutcome::Published(h) => info!(title, remote_id = %h.remote_id, url = %h.url, "Published"),
    }
}
