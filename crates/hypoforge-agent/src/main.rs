//! Hypoforge: turns recently published preprints into research hypotheses.
//! Entry point for the batch binary.

mod config;

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::{Local, NaiveDate};
use clap::Parser;
use hypoforge_ingestion::dedup::FileTitleStore;
use hypoforge_ingestion::extraction::{ExtractionConfig, ProblemExtractor};
use hypoforge_ingestion::models::DateRange;
use hypoforge_ingestion::pipeline::Pipeline;
use hypoforge_ingestion::publisher::seechat::SeeChatPublisher;
use hypoforge_ingestion::reputation::semantic_scholar::SemanticScholarClient;
use hypoforge_ingestion::reputation::AuthorReputationFilter;
use hypoforge_ingestion::sources::biorxiv::BioRxivClient;
use hypoforge_common::RetryPolicy;
use hypoforge_llm::provider::{build_backend, BackendConfig};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::{resolve_secret, Config, LLM_KEY_ENV, S2_KEY_ENV, SEECHAT_KEY_ENV};

/// Days covered by the default window ending today.
const DEFAULT_WINDOW_DAYS: i64 = 7;

#[derive(Parser, Debug)]
#[command(name = "hypoforge")]
#[command(about = "Publish research hypotheses drawn from recent preprints", long_about = None)]
#[command(version)]
struct Cli {
    /// First publication date to fetch (YYYY-MM-DD)
    #[arg(long)]
    start: Option<NaiveDate>,

    /// Last publication date to fetch, inclusive (YYYY-MM-DD)
    #[arg(long)]
    end: Option<NaiveDate>,

    /// Configuration file path
    #[arg(short, long, env = "HYPOFORGE_CONFIG")]
    config: Option<String>,

    /// Use the default window for missing dates instead of prompting
    #[arg(long)]
    no_prompt: bool,
}

fn prompt_date(label: &str, default: NaiveDate) -> anyhow::Result<NaiveDate> {
    let raw: String = dialoguer::Input::new()
        .with_prompt(format!("{label} (YYYY-MM-DD)"))
        .default(default.format("%Y-%m-%d").to_string())
        .validate_with(|s: &String| -> Result<(), String> {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                .map(|_| ())
                .map_err(|e| format!("not a date: {e}"))
        })
        .interact_text()?;
    Ok(NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")?)
}

/// Dates from flags, else prompted for, else the last week.
fn resolve_range(cli: &Cli) -> anyhow::Result<DateRange> {
    let today = Local::now().date_naive();
    let default_start = today - chrono::Duration::days(DEFAULT_WINDOW_DAYS);
    let interactive = !cli.no_prompt && std::io::stdin().is_terminal();

    let start = match cli.start {
        Some(d) => d,
        None if interactive => prompt_date("Start date", default_start)?,
        None => default_start,
    };
    let end = match cli.end {
        Some(d) => d,
        None if interactive => prompt_date("End date", today)?,
        None => today,
    };

    Ok(DateRange::new(start, end)?)
}

fn build_pipeline(config: &Config) -> anyhow::Result<Pipeline> {
    let secs = Duration::from_secs;

    let mut source = BioRxivClient::new(config.source.server, secs(config.source.timeout_secs), config.source.retry())?;
    if let Some(url) = &config.source.base_url {
        source = source.with_base_url(url)?;
    }

    let s2_key = resolve_secret(config.reputation.api_key.as_deref(), S2_KEY_ENV);
    if s2_key.is_none() {
        info!("No Semantic Scholar API key set ({S2_KEY_ENV}); using the shared rate limit");
    }
    let mut lookup = SemanticScholarClient::new(s2_key, secs(config.reputation.timeout_secs), config.reputation.retry())?;
    if let Some(url) = &config.reputation.base_url {
        lookup = lookup.with_base_url(url)?;
    }
    let filter = AuthorReputationFilter::new(Arc::new(lookup), config.reputation.threshold);

    let backend = build_backend(BackendConfig {
        kind: config.llm.kind,
        model: config.llm.model.clone(),
        base_url: config.llm.base_url.clone(),
        chat_path: config.llm.chat_path.clone(),
        api_key: resolve_secret(config.llm.api_key.as_deref(), LLM_KEY_ENV),
        timeout: secs(config.llm.timeout_secs),
    })?;
    let extractor = ProblemExtractor::new(backend, ExtractionConfig {
        max_words: config.llm.max_words,
        max_tokens: config.llm.max_tokens,
        temperature: config.llm.temperature,
        ..ExtractionConfig::default()
    });

    let seechat_key = resolve_secret(config.publisher.api_key.as_deref(), SEECHAT_KEY_ENV)
        .with_context(|| format!("no SeeChat API key (set publisher.api_key or {SEECHAT_KEY_ENV})"))?;
    let publisher = SeeChatPublisher::new(seechat_key, config.data_source(), secs(config.publisher.timeout_secs))?
        .with_endpoints(config.publisher.api_base.clone(), config.publisher.web_base.clone())?
        .with_private(config.publisher.is_private)
        .with_edit_retry(RetryPolicy { max_retries: config.publisher.edit_retries, ..RetryPolicy::default() });

    Ok(Pipeline::new(
        Arc::new(source),
        filter,
        extractor,
        Arc::new(publisher),
        config.publisher.field_of_study.clone(),
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env is fine
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("hypoforge=debug,info")),
        )
        .init();

    let cli = Cli::parse();
    info!("Hypoforge {}", env!("CARGO_PKG_VERSION"));

    let config = Config::load(cli.config.as_deref())?;
    info!(
        server = config.source.server.as_str(),
        threshold = config.reputation.threshold,
        llm = config.llm.kind.as_str(),
        model = %config.llm.model,
        field_of_study = %config.publisher.field_of_study,
        "Configuration loaded"
    );

    let range = resolve_range(&cli)?;
    let pipeline = build_pipeline(&config)?;
    let mut store = FileTitleStore::open(&config.store.path)?;

    let summary = pipeline.run(range, &mut store).await?;

    println!("\n{summary}");
    for url in &summary.published_urls {
        println!("  {url}");
    }
    if summary.partial > 0 {
        warn!(partial = summary.partial, "Some hypotheses were created but not completed");
    }

    Ok(())
}
