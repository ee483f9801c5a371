//! hypoforge-ingestion: Preprint-to-hypothesis pipeline.
//! - Paper discovery by publication date range (medRxiv / bioRxiv)
//! - Author reputation gate (H-index)
//! - Problem statement extraction via LLM
//! - Hypothesis publishing (create + edit)
//! - Deduplication of processed titles

pub mod dedup;
pub mod extraction;
pub mod formatting;
pub mod models;
pub mod pipeline;
pub mod publisher;
pub mod reputation;
pub mod sources;
