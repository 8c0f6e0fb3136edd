// src/lib.rs
//! Scrapes a company's listing page for quarterly result filings, caches the
//! latest one and extracts consolidated financial metrics from it with a
//! document-understanding model.

pub mod acquisition;
pub mod analysis;
pub mod config;
pub mod extractors;
pub mod screener;
pub mod service;
pub mod storage;
pub mod utils;

pub use acquisition::AcquisitionManager;
pub use analysis::{ExtractionCapability, ExtractionOrchestrator, ExtractionResult, GeminiCapability};
pub use config::{FetchConfig, InferenceConfig, PipelineConfig};
pub use service::{AnalysisService, AnalyzeRequest, ServiceResponse};
pub use storage::StorageManager;
pub use utils::{AppError, PipelineError};
