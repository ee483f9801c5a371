//! Orchestrator scenarios driven with in-memory fakes of every external component.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::NaiveDate;
use hypoforge_ingestion::dedup::{FileTitleStore, InMemoryTitleStore, TitleStore};
use hypoforge_ingestion::extraction::{ExtractionConfig, ProblemExtractor};
use hypoforge_ingestion::models::{DateRange, Hypothesis, Paper, PreprintServer};
use hypoforge_ingestion::pipeline::{Pipeline, PipelineError};
use hypoforge_ingestion::publisher::{HypothesisPublisher, PublishError, PublishRequest};
use hypoforge_ingestion::reputation::{AuthorReputationFilter, ReputationError, ReputationLookup};
use hypoforge_ingestion::sources::{PaperPage, PaperSource, SourceError};
use hypoforge_llm::backend::{LlmBackend, LlmError, LlmRequest, LlmResponse};
use tokio::sync::broadcast;
use uuid::Uuid;

// ── Fakes ─────────────────────────────────────────────────────────────────────

/// Serves one page per entry; `Err` entries fail that page.
struct PagedSource {
    pages: Vec<Result<Vec<Paper>, String>>,
}

#[async_trait]
impl PaperSource for PagedSource {
    async fn fetch_page(&self, _range: DateRange, cursor: u64) -> Result<PaperPage, SourceError> {
        let idx = cursor as usize;
        match self.pages.get(idx) {
            Some(Ok(papers)) => Ok(PaperPage {
                papers: papers.clone(),
                next_cursor: (idx + 1 < self.pages.len()).then_some(cursor + 1),
            }),
            Some(Err(msg)) => Err(SourceError::Unavailable(msg.clone())),
            None => Ok(PaperPage::default()),
        }
    }

    fn name(&self) -> &str {
        "fake"
    }
}

#[derive(Default)]
struct TableLookup {
    table: HashMap<String, u32>,
    calls: Mutex<Vec<String>>,
}

#[async_trait]
impl ReputationLookup for TableLookup {
    async fn h_index(&self, author: &str) -> Result<Option<u32>, ReputationError> {
        self.calls.lock().unwrap().push(author.to_string());
        Ok(self.table.get(author).copied())
    }
}

/// Answers every prompt with the same statement.
struct FixedModel {
    answer: String,
    calls: Mutex<usize>,
}

#[async_trait]
impl LlmBackend for FixedModel {
    async fn complete(&self, _req: LlmRequest) -> Result<LlmResponse, LlmError> {
        *self.calls.lock().unwrap() += 1;
        Ok(LlmResponse {
            content: self.answer.clone(),
            model: "fixed".to_string(),
            prompt_tokens: 0,
            completion_tokens: 0,
        })
    }
    fn model_id(&self) -> &str { "fixed" }
    fn backend_name(&self) -> &'static str { "fixed" }
    fn is_local(&self) -> bool { true }
}

#[derive(Default)]
struct FakePublisher {
    published: Mutex<Vec<String>>,
    edit_fails_for: HashSet<String>,
    create_fails_for: HashSet<String>,
}

#[async_trait]
impl HypothesisPublisher for FakePublisher {
    async fn publish(&self, req: PublishRequest<'_>) -> Result<Hypothesis, PublishError> {
        let title = req.paper.title.clone();
        if self.create_fails_for.contains(&title) {
            return Err(PublishError::Failed("401 Unauthorized".to_string()));
        }
        let mut published = self.published.lock().unwrap();
        published.push(title.clone());
        let remote_id = format!("hyp-{}", published.len());
        if self.edit_fails_for.contains(&title) {
            return Err(PublishError::Partial { remote_id, reason: "502 Bad Gateway".to_string() });
        }
        Ok(Hypothesis {
            id: Uuid::new_v4(),
            field_of_study: req.field_of_study.to_string(),
            problem_statement: req.statement.text.clone(),
            source_reference: title,
            url: format!("https://staging.seechat.ai/idea/{remote_id}"),
            remote_id,
        })
    }
}

// ── Harness ───────────────────────────────────────────────────────────────────

fn paper(title: &str, author: &str) -> Paper {
    Paper {
        title: title.to_string(),
        abstract_text: format!("Background: {title}. Results: it mattered."),
        authors: vec![author.to_string()],
        publication_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        doi: None,
        version: None,
        category: Some("epidemiology".to_string()),
        server: PreprintServer::MedRxiv,
    }
}

fn range() -> DateRange {
    DateRange::new(
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(),
    )
    .unwrap()
}

/// Three papers: two by established authors, one by a newcomer.
fn three_papers() -> Vec<Paper> {
    vec![
        paper("Lactate in sepsis", "Smith, J."),
        paper("Statins and delirium", "Doe, A."),
        paper("A small pilot", "Newcomer, N."),
    ]
}

struct Harness {
    lookup: Arc<TableLookup>,
    model: Arc<FixedModel>,
    publisher: Arc<FakePublisher>,
}

impl Harness {
    fn new(publisher: FakePublisher) -> Self {
        let table = [("Smith, J.", 25), ("Doe, A.", 12), ("Newcomer, N.", 2)]
            .into_iter()
            .map(|(a, h)| (a.to_string(), h))
            .collect();
        Self {
            lookup: Arc::new(TableLookup { table, calls: Mutex::new(vec![]) }),
            model: Arc::new(FixedModel {
                answer: "Why do some patients deteriorate despite standard care?".to_string(),
                calls: Mutex::new(0),
            }),
            publisher: Arc::new(publisher),
        }
    }

    fn with_answer(mut self, answer: &str) -> Self {
        self.model = Arc::new(FixedModel { answer: answer.to_string(), calls: Mutex::new(0) });
        self
    }

    fn pipeline(&self, pages: Vec<Result<Vec<Paper>, String>>) -> Pipeline {
        Pipeline::new(
            Arc::new(PagedSource { pages }),
            AuthorReputationFilter::new(self.lookup.clone(), 10),
            ProblemExtractor::new(self.model.clone(), ExtractionConfig::default()),
            self.publisher.clone(),
            "Medicine",
        )
    }

    fn model_calls(&self) -> usize {
        *self.model.calls.lock().unwrap()
    }

    fn published(&self) -> Vec<String> {
        self.publisher.published.lock().unwrap().clone()
    }
}

// ── Scenarios ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_accept_accept_reject() {
    let h = Harness::new(FakePublisher::default());
    let mut store = InMemoryTitleStore::new();

    let summary = h.pipeline(vec![Ok(three_papers())]).run(range(), &mut store).await.unwrap();

    assert_eq!(summary.fetched, 3);
    assert_eq!(summary.rejected, 1);
    assert_eq!(summary.published, 2);
    assert_eq!(summary.partial, 0);
    assert_eq!(store.len(), 2);
    assert!(store.contains("Lactate in sepsis"));
    assert!(!store.contains("A small pilot"));
    assert_eq!(h.model_calls(), 2);
    assert_eq!(h.published(), vec!["Lactate in sepsis", "Statins and delirium"]);
}

#[tokio::test]
async fn test_known_title_skipped_before_filtering() {
    let h = Harness::new(FakePublisher::default());
    let mut store = InMemoryTitleStore::with_titles(["Lactate in sepsis"]);

    let summary = h.pipeline(vec![Ok(three_papers())]).run(range(), &mut store).await.unwrap();

    assert_eq!(summary.fetched, 3);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.published, 1);
    assert!(!h.lookup.calls.lock().unwrap().contains(&"Smith, J.".to_string()));
    assert_eq!(h.model_calls(), 1);
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn test_rejected_paper_never_reaches_model_or_publisher() {
    let h = Harness::new(FakePublisher::default());
    let mut store = InMemoryTitleStore::new();
    let pages = vec![Ok(vec![paper("A small pilot", "Newcomer, N.")])];

    let summary = h.pipeline(pages).run(range(), &mut store).await.unwrap();

    assert_eq!(summary.rejected, 1);
    assert_eq!(h.model_calls(), 0);
    assert!(h.published().is_empty());
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_edit_failure_is_partial_and_not_recorded() {
    let publisher = FakePublisher {
        edit_fails_for: HashSet::from(["Statins and delirium".to_string()]),
        ..Default::default()
    };
    let h = Harness::new(publisher);
    let mut store = InMemoryTitleStore::new();

    let summary = h.pipeline(vec![Ok(three_papers())]).run(range(), &mut store).await.unwrap();

    assert_eq!(summary.partial, 1);
    assert_eq!(summary.published, 1);
    assert_eq!(summary.partials[0].title, "Statins and delirium");
    assert_eq!(summary.partials[0].remote_id, "hyp-2");
    assert!(!store.contains("Statins and delirium"));
    assert!(summary.to_string().contains("remote id hyp-2"));
}

#[tokio::test]
async fn test_create_failure_counts_as_publish_failed() {
    let publisher = FakePublisher {
        create_fails_for: HashSet::from(["Lactate in sepsis".to_string()]),
        ..Default::default()
    };
    let h = Harness::new(publisher);
    let mut store = InMemoryTitleStore::new();

    let summary = h.pipeline(vec![Ok(three_papers())]).run(range(), &mut store).await.unwrap();

    assert_eq!(summary.publish_failed, 1);
    assert_eq!(summary.published, 1);
    assert!(!store.contains("Lactate in sepsis"));
}

#[tokio::test]
async fn test_over_budget_statement_is_extraction_failure() {
    let long = vec!["word"; 40].join(" ");
    let h = Harness::new(FakePublisher::default()).with_answer(&long);
    let mut store = InMemoryTitleStore::new();

    let summary = h.pipeline(vec![Ok(three_papers())]).run(range(), &mut store).await.unwrap();

    assert_eq!(summary.extraction_failed, 2);
    assert_eq!(summary.published, 0);
    // one retry per accepted paper
    assert_eq!(h.model_calls(), 4);
    assert!(h.published().is_empty());
    assert!(store.is_empty());
}

#[tokio::test]
async fn test_two_runs_publish_each_paper_once() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("processed_titles.txt");
    let h = Harness::new(FakePublisher::default());

    {
        let mut store = FileTitleStore::open(&path).unwrap();
        let first = h.pipeline(vec![Ok(three_papers())]).run(range(), &mut store).await.unwrap();
        assert_eq!(first.published, 2);
    }
    {
        let mut store = FileTitleStore::open(&path).unwrap();
        let second = h.pipeline(vec![Ok(three_papers())]).run(range(), &mut store).await.unwrap();
        assert_eq!(second.published, 0);
        assert_eq!(second.skipped, 2);
        // rejected titles are never recorded, so they are re-checked
        assert_eq!(second.rejected, 1);
    }

    assert_eq!(h.published().len(), 2);
    let lines: Vec<String> = std::fs::read_to_string(&path)
        .unwrap()
        .lines()
        .map(String::from)
        .collect();
    assert_eq!(lines, vec!["Lactate in sepsis", "Statins and delirium"]);
}

#[tokio::test]
async fn test_carriage_return_title_is_published_once_and_run_continues() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("processed_titles.txt");
    let h = Harness::new(FakePublisher::default());
    let pages = || -> Vec<Result<Vec<Paper>, String>> {
        vec![Ok(vec![paper("Lactate\rin sepsis", "Smith, J."), paper("Statins and delirium", "Doe, A.")])]
    };

    {
        let mut store = FileTitleStore::open(&path).unwrap();
        let first = h.pipeline(pages()).run(range(), &mut store).await.unwrap();
        assert_eq!(first.published, 2);
    }
    {
        let mut store = FileTitleStore::open(&path).unwrap();
        let second = h.pipeline(pages()).run(range(), &mut store).await.unwrap();
        assert_eq!(second.skipped, 2);
        assert_eq!(second.published, 0);
    }

    assert_eq!(h.published(), vec!["Lactate in sepsis", "Statins and delirium"]);
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "Lactate in sepsis\nStatins and delirium\n"
    );
}

#[tokio::test]
async fn test_source_down_before_any_paper_aborts() {
    let h = Harness::new(FakePublisher::default());
    let mut store = InMemoryTitleStore::new();

    let err = h.pipeline(vec![Err("connection refused".to_string())])
        .run(range(), &mut store)
        .await
        .unwrap_err();

    assert!(matches!(err, PipelineError::Source(SourceError::Unavailable(_))));
}

#[tokio::test]
async fn test_source_failure_mid_run_keeps_processed_work() {
    let h = Harness::new(FakePublisher::default());
    let mut store = InMemoryTitleStore::new();
    let pages = vec![
        Ok(vec![paper("Lactate in sepsis", "Smith, J.")]),
        Err("503 Service Unavailable".to_string()),
        Ok(vec![paper("Statins and delirium", "Doe, A.")]),
    ];

    let summary = h.pipeline(pages).run(range(), &mut store).await.unwrap();

    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.published, 1);
    assert!(summary.source_error.as_deref().unwrap().contains("503"));
    assert!(store.contains("Lactate in sepsis"));
}

#[tokio::test]
async fn test_progress_events_bracket_each_paper() {
    let h = Harness::new(FakePublisher::default());
    let (tx, mut rx) = broadcast::channel(32);
    let mut store = InMemoryTitleStore::new();

    h.pipeline(vec![Ok(three_papers())])
        .with_progress(tx)
        .run(range(), &mut store)
        .await
        .unwrap();

    let mut stages = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        stages.push(ev.stage);
    }
    assert_eq!(stages, vec!["start", "published", "published", "rejected", "complete"]);
}
