// src/acquisition.rs
use crate::config::PipelineConfig;
use crate::extractors::ListingParser;
use crate::screener::client::Fetcher;
use crate::screener::models::{CachedDocument, DocumentSet};
use crate::storage::StorageManager;
use crate::utils::error::{AppError, PipelineError};

/// Identifiers become file names, so only a conservative character set is allowed.
pub fn validate_stock_id(raw: Option<&str>) -> Result<String, PipelineError> {
    let id = raw.map(str::trim).unwrap_or_default();
    if id.is_empty() {
        return Err(PipelineError::MissingStockId);
    }
    let allowed = |c: char| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '&' | '.');
    if id.starts_with('.') || !id.chars().all(allowed) {
        return Err(PipelineError::InvalidStockId(id.to_string()));
    }
    Ok(id.to_string())
}

/// Scrapes a stock's listing page and keeps its latest quarterly result in the content cache.
#[derive(Debug, Clone)]
pub struct AcquisitionManager {
    config: PipelineConfig,
    fetcher: Fetcher,
    parser: ListingParser,
    storage: StorageManager,
}

impl AcquisitionManager {
    pub fn new(config: PipelineConfig, storage: StorageManager) -> Result<Self, AppError> {
        let fetcher = Fetcher::new(config.fetch.clone())?;
        let parser = ListingParser::new(&config.site_url)?;
        Ok(Self {
            config,
            fetcher,
            parser,
            storage,
        })
    }

    pub fn storage(&self) -> &StorageManager {
        &self.storage
    }

    /// Fetches and parses the listing page for `stock_id`.
    pub async fn scrape(&self, stock_id: &str) -> Result<DocumentSet, PipelineError> {
        let stock_id = validate_stock_id(Some(stock_id))?;
        let url = self.config.listing_url(&stock_id);
        let page = self.fetcher.fetch(&url).await?;
        Ok(self.parser.parse(&page))
    }

    /// Scrape followed by [`acquire_latest`](Self::acquire_latest).
    pub async fn refresh(&self, stock_id: &str) -> Result<CachedDocument, PipelineError> {
        let documents = self.scrape(stock_id).await?;
        self.acquire_latest(stock_id, &documents).await
    }

    /// Persists `documents` as the listing snapshot and makes sure the latest
    /// quarterly result is in the content cache, downloading it at most once.
    pub async fn acquire_latest(
        &self,
        stock_id: &str,
        documents: &DocumentSet,
    ) -> Result<CachedDocument, PipelineError> {
        let stock_id = validate_stock_id(Some(stock_id))?;
        let stock_id = stock_id.as_str();
        if let Err(e) = self.storage.save_snapshot(stock_id, documents) {
            tracing::error!("Failed to save listing snapshot for {}: {}", stock_id, e);
        }

        let (period_label, url) = documents
            .quarterly_results
            .latest()
            .ok_or(PipelineError::NoQuarterlyResults)?;

        let path = self.storage.cache_path(stock_id, period_label);
        let cached = CachedDocument {
            stock_id: stock_id.to_string(),
            period_label: period_label.to_string(),
            path,
        };

        if tokio::fs::try_exists(&cached.path).await.unwrap_or(false) {
            tracing::info!("Skipping already downloaded file: {}", cached.path.display());
            return Ok(cached);
        }

        tracing::info!("Downloading {} result for {} from {}", period_label, stock_id, url);
        self.fetcher.download_to(url, &cached.path).await?;
        Ok(cached)
    }
}
