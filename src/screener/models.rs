// src/screener/models.rs
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Transcript and presentation links published for earnings calls.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallDocuments {
    pub transcripts: Vec<String>,
    #[serde(rename = "ppt")]
    pub presentation_slides: Vec<String>,
}

/// Period label -> document URL, kept in the order the listing page shows them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuarterlyResults {
    entries: IndexMap<String, String>,
}

impl QuarterlyResults {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the URL for `period`. A replaced entry keeps its position.
    pub fn insert(&mut self, period: impl Into<String>, url: impl Into<String>) {
        self.entries.insert(period.into(), url.into());
    }

    pub fn get(&self, period: &str) -> Option<&str> {
        self.entries.get(period).map(String::as_str)
    }

    /// Last entry in page order. This is positional, not a date comparison.
    pub fn latest(&self) -> Option<(&str, &str)> {
        self.entries
            .last()
            .map(|(period, url)| (period.as_str(), url.as_str()))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(p, u)| (p.as_str(), u.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Everything scraped from one listing page. Rebuilt on every scrape.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentSet {
    #[serde(rename = "concalls")]
    pub calls: CallDocuments,
    pub quarterly_results: QuarterlyResults,
}

/// A quarterly result document present in the content cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedDocument {
    pub stock_id: String,
    pub period_label: String,
    pub path: PathBuf,
}
