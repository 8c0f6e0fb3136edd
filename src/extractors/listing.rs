// src/extractors/listing.rs

// --- Imports ---
use crate::screener::models::{CallDocuments, DocumentSet, QuarterlyResults};
use crate::utils::error::ExtractError;
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use url::Url;

// --- CSS Selectors (Lazy Static) ---
static CALL_LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("a.concall-link[href]").expect("Failed to compile CALL_LINK_SELECTOR")
});

static QUARTERS_SECTION_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("section#quarters").expect("Failed to compile QUARTERS_SECTION_SELECTOR")
});

static DATA_TABLE_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("table.data-table").expect("Failed to compile DATA_TABLE_SELECTOR")
});

static HEADER_CELL_SELECTOR: Lazy<Selector> = Lazy::new(|| {
    Selector::parse("thead th").expect("Failed to compile HEADER_CELL_SELECTOR")
});

static ROW_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("tr").expect("Failed to compile ROW_SELECTOR"));

static CELL_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("td").expect("Failed to compile CELL_SELECTOR"));

static ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("Failed to compile ANCHOR_SELECTOR"));

// --- Constants ---
/// Links into blob storage are mirrors, not filings.
const BLOB_STORAGE_MARKER: &str = "amazonaws";
const RAW_PDF_MARKER: &str = "Raw PDF";
const TRANSCRIPT_KEYWORD: &str = "transcript";
const SLIDES_KEYWORD: &str = "ppt";

/// Turns a listing page into a [`DocumentSet`]. Best effort: missing
/// structure yields empty collections, never an error.
#[derive(Debug, Clone)]
pub struct ListingParser {
    site: Url,
}

impl ListingParser {
    pub fn new(site_url: &str) -> Result<Self, ExtractError> {
        Ok(Self {
            site: Url::parse(site_url)?,
        })
    }

    pub fn parse(&self, page: &[u8]) -> DocumentSet {
        let html = String::from_utf8_lossy(page);
        let document = Html::parse_document(&html);

        let calls = self.extract_call_documents(&document);
        let quarterly_results = self.extract_quarterly_results(&document);

        tracing::info!(
            "Parsed listing: {} transcripts, {} slide decks, {} quarterly results",
            calls.transcripts.len(),
            calls.presentation_slides.len(),
            quarterly_results.len()
        );

        DocumentSet {
            calls,
            quarterly_results,
        }
    }

    /// Resolves `href` against the canonical host. Only absolute http(s) and
    /// root-relative links are accepted; scheme-relative `//host` links are not.
    pub fn absolutize(&self, href: &str) -> Option<String> {
        let href = href.trim();
        if href.starts_with("http://") || href.starts_with("https://") {
            return Url::parse(href).ok().map(String::from);
        }
        // Scheme-relative "//host/..." would name another host.
        if href.starts_with('/') && !href.starts_with("//") {
            return self.site.join(href).ok().map(String::from);
        }
        None
    }

    fn extract_call_documents(&self, document: &Html) -> CallDocuments {
        let mut calls = CallDocuments::default();

        for link in document.select(&CALL_LINK_SELECTOR) {
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            if href.contains(BLOB_STORAGE_MARKER) {
                tracing::debug!("Skipping blob storage link: {}", href);
                continue;
            }
            let Some(url) = self.absolutize(href) else {
                tracing::debug!("Skipping unresolvable link: {}", href);
                continue;
            };

            let label = stripped_text(link).to_lowercase();
            if label.contains(TRANSCRIPT_KEYWORD) {
                calls.transcripts.push(url);
            } else if label.contains(SLIDES_KEYWORD) {
                calls.presentation_slides.push(url);
            }
        }

        calls
    }

    fn extract_quarterly_results(&self, document: &Html) -> QuarterlyResults {
        let mut results = QuarterlyResults::new();

        let Some(section) = document.select(&QUARTERS_SECTION_SELECTOR).next() else {
            tracing::warn!("Quarters section not found on listing page");
            return results;
        };
        let Some(table) = section.select(&DATA_TABLE_SELECTOR).next() else {
            tracing::warn!("Results table not found in quarters section");
            return results;
        };

        // First header column labels the row names, not a period.
        let periods: Vec<String> = table
            .select(&HEADER_CELL_SELECTOR)
            .skip(1)
            .map(stripped_text)
            .collect();
        if periods.is_empty() {
            tracing::warn!("Results table has no period headers");
            return results;
        }

        let mut found_row = false;
        for row in table.select(&ROW_SELECTOR) {
            let mut cells = row.select(&CELL_SELECTOR);
            let Some(first) = cells.next() else { continue };
            if !stripped_text(first).contains(RAW_PDF_MARKER) {
                continue;
            }
            found_row = true;

            for (period, cell) in periods.iter().zip(cells) {
                let href = cell
                    .select(&ANCHOR_SELECTOR)
                    .next()
                    .and_then(|a| a.value().attr("href"));
                if let Some(url) = href.and_then(|h| self.absolutize(h)) {
                    results.insert(period.clone(), url);
                }
            }
        }

        if !found_row {
            tracing::warn!("No '{}' row in results table", RAW_PDF_MARKER);
        }
        results
    }
}

/// Concatenated text of `element` with each text node trimmed.
fn stripped_text(element: ElementRef) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("")
}
