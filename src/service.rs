// src/service.rs
use crate::acquisition::validate_stock_id;
use crate::analysis::orchestrator::{ExtractionOrchestrator, ExtractionResult};
use crate::utils::error::PipelineError;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Inbound analysis request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnalyzeRequest {
    #[serde(rename = "stockName", alias = "stock_id", default)]
    pub stock_id: Option<String>,
}

/// Status plus JSON body: the extraction result, or `{"error": "..."}`.
#[derive(Debug, Clone, PartialEq)]
pub struct ServiceResponse {
    pub status: StatusCode,
    pub body: Value,
}

impl ServiceResponse {
    fn ok(body: Value) -> Self {
        Self {
            status: StatusCode::OK,
            body,
        }
    }

    fn failure(error: &PipelineError) -> Self {
        Self {
            status: error.status(),
            body: json!({ "error": error.to_string() }),
        }
    }
}

struct Inner {
    orchestrator: ExtractionOrchestrator,
    serialize_per_stock: bool,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

/// Runs scrape, acquire and extract for one stock per request. Requests for
/// different stocks never contend. Requests for the same stock only queue
/// behind each other when `serialize_per_stock` is set.
#[derive(Clone)]
pub struct AnalysisService {
    inner: Arc<Inner>,
}

impl AnalysisService {
    pub fn new(orchestrator: ExtractionOrchestrator, serialize_per_stock: bool) -> Self {
        Self {
            inner: Arc::new(Inner {
                orchestrator,
                serialize_per_stock,
                locks: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Liveness check.
    pub fn health() -> ServiceResponse {
        ServiceResponse::ok(json!({ "status": "healthy" }))
    }

    /// Never panics and never returns a bare error: every outcome is an envelope.
    pub async fn analyze(&self, request: AnalyzeRequest) -> ServiceResponse {
        let stock_id = match validate_stock_id(request.stock_id.as_deref()) {
            Ok(id) => id,
            Err(e) => return ServiceResponse::failure(&e),
        };

        let service = self.clone();
        let task = tokio::spawn(async move { service.run(&stock_id).await });

        let outcome = match task.await {
            Ok(outcome) => outcome,
            Err(join_error) => {
                tracing::error!("Analysis task aborted: {}", join_error);
                Err(PipelineError::Unexpected(join_error.to_string()))
            }
        };

        match outcome.and_then(|result| {
            serde_json::to_value(&result).map_err(|e| PipelineError::Unexpected(e.to_string()))
        }) {
            Ok(body) => ServiceResponse::ok(body),
            Err(e) => {
                tracing::error!("Analysis failed: {}", e);
                ServiceResponse::failure(&e)
            }
        }
    }

    /// Scrape the listing, cache the latest document, then extract from it.
    pub async fn run(&self, stock_id: &str) -> Result<ExtractionResult, PipelineError> {
        let lock = self.lock_for(stock_id);
        let _guard = match &lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        let orchestrator = &self.inner.orchestrator;
        let cached = orchestrator.acquisition().refresh(stock_id).await?;
        tracing::info!("Latest result for {} is {}", stock_id, cached.period_label);
        orchestrator.analyze(stock_id).await
    }

    fn lock_for(&self, stock_id: &str) -> Option<Arc<tokio::sync::Mutex<()>>> {
        if !self.inner.serialize_per_stock {
            return None;
        }
        let mut locks = self
            .inner
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Some(locks.entry(stock_id.to_string()).or_default().clone())
    }
}
