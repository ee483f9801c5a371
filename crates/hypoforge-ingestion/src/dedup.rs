//! Processed-title store.
//!
//! A flat file with one title per line. The whole file is read into a set at
//! startup; each successful publish appends a single line and flushes it, so
//! a killed run loses at most the paper that was in flight.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::models::normalize_title;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("title store {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Titles are compared in their normalized single-line form.
pub trait TitleStore: Send {
    fn contains(&self, title: &str) -> bool;

    /// Mark `title` as processed. Recording a known title is a no-op.
    fn record(&mut self, title: &str) -> Result<(), StoreError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct FileTitleStore {
    path: PathBuf,
    titles: HashSet<String>,
    file: File,
}

impl FileTitleStore {
    /// Open (or create) the store at `path` and load every recorded title.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let io_err = |source: std::io::Error| StoreError::Io { path: path.clone(), source };

        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(io_err(e)),
        };
        let titles: HashSet<String> = contents
            .lines()
            .map(normalize_title)
            .filter(|t| !t.is_empty())
            .collect();

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;
        // A hand-edited file may lack the final newline.
        if !contents.is_empty() && !contents.ends_with('\n') {
            writeln!(file).map_err(io_err)?;
        }

        info!(path = %path.display(), titles = titles.len(), "Title store loaded");
        Ok(Self { path, titles, file })
    }
}

impl TitleStore for FileTitleStore {
    fn contains(&self, title: &str) -> bool {
        self.titles.contains(&normalize_title(title))
    }

    fn record(&mut self, title: &str) -> Result<(), StoreError> {
        let title = normalize_title(title);
        if title.is_empty() || self.titles.contains(&title) {
            return Ok(());
        }

        let io_err = |source: std::io::Error| StoreError::Io { path: self.path.clone(), source };
        writeln!(self.file, "{title}").map_err(io_err)?;
        self.file.flush().map_err(io_err)?;
        debug!(title = %title, "Title recorded");
        self.titles.insert(title);
        Ok(())
    }

    fn len(&self) -> usize {
        self.titles.len()
    }
}

/// Non-durable store for tests and dry runs.
#[derive(Debug, Default)]
pub struct InMemoryTitleStore {
    titles: HashSet<String>,
}

impl InMemoryTitleStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_titles<I, S>(titles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self { titles: titles.into_iter().map(|t| normalize_title(t.as_ref())).collect() }
    }
}

impl TitleStore for InMemoryTitleStore {
    fn contains(&self, title: &str) -> bool {
        self.titles.contains(&normalize_title(title))
    }

    fn record(&mut self, title: &str) -> Result<(), StoreError> {
        let title = normalize_title(title);
        if !title.is_empty() {
            self.titles.insert(title);
        }
        Ok(())
    }

    fn len(&self) -> usize {
        self.titles.len()
    }
}
