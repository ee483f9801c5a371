//! Data models for the hypothesis pipeline.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A preprint as listed by the source repository. Title is the identity key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Paper {
    pub title: String,
    pub abstract_text: String,
    /// Author names in listing order.
    pub authors: Vec<String>,
    pub publication_date: NaiveDate,
    pub doi: Option<String>,
    pub version: Option<String>,
    pub category: Option<String>,
    pub server: PreprintServer,
}

impl Paper {
    /// Public landing page of the exact version that was fetched.
    pub fn source_url(&self) -> Option<String> {
        let doi = self.doi.as_deref()?;
        let version = self.version.as_deref().unwrap_or("1");
        Some(format!("https://www.{}.org/content/{}v{}", self.server.as_str(), doi, version))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PreprintServer {
    BioRxiv,
    MedRxiv,
}

impl PreprintServer {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreprintServer::BioRxiv => "biorxiv",
            PreprintServer::MedRxiv => "medrxiv",
        }
    }

    /// Name used as the hypothesis `data_source`.
    pub fn display_name(&self) -> &'static str {
        match self {
            PreprintServer::BioRxiv => "bioRxiv",
            PreprintServer::MedRxiv => "medRxiv",
        }
    }
}

#[derive(Debug, Error, PartialEq)]
#[error("invalid date range: start {start} is after end {end}")]
pub struct InvalidDateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

/// Inclusive publication-date window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, InvalidDateRange> {
        if start > end {
            return Err(InvalidDateRange { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDate { self.start }
    pub fn end(&self) -> NaiveDate { self.end }

    /// `YYYY-MM-DD/YYYY-MM-DD`, the interval segment of the bioRxiv API path.
    pub fn interval(&self) -> String {
        format!("{}/{}", self.start.format("%Y-%m-%d"), self.end.format("%Y-%m-%d"))
    }
}

/// Looked up per author during filtering; never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorReputation {
    pub author_id: String,
    /// `None` when the author could not be resolved.
    pub h_index: Option<u32>,
}

impl AuthorReputation {
    /// Unknown authors count as zero.
    pub fn effective_h_index(&self) -> u32 {
        self.h_index.unwrap_or(0)
    }
}

/// Short model-generated restatement of a paper's core research problem.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProblemStatement {
    pub text: String,
}

impl ProblemStatement {
    pub fn word_count(&self) -> usize {
        word_count(&self.text)
    }
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Collapse every whitespace run (line breaks included) to one space.
/// Titles are stored one per line, so this is their canonical form.
pub fn normalize_title(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// A hypothesis as it exists on the publishing platform after create + edit.
#[derive(Debug, Clone, Serialize)]
pub struct Hypothesis {
    /// Local id for log correlation.
    pub id: Uuid,
    pub field_of_study: String,
    pub problem_statement: String,
    /// Link back to the source paper.
    pub source_reference: String,
    pub remote_id: String,
    pub url: String,
}
