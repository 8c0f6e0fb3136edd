// src/analysis/orchestrator.rs
use crate::acquisition::{validate_stock_id, AcquisitionManager};
use crate::analysis::capability::ExtractionCapability;
use crate::analysis::prompt;
use crate::extractors::json_recovery::recover_json;
use crate::screener::models::{CachedDocument, DocumentSet};
use crate::utils::error::{ExtractError, PipelineError, StorageError};
use serde::{Deserialize, Deserializer, Serialize};
use std::sync::Arc;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// One reported figure. `value` is `None` when the document does not state it.
/// A bare `null` in place of the object reads as an unstated figure.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Metric {
    pub value: Option<f64>,
    pub unit: String,
}

#[derive(Deserialize)]
struct MetricFields {
    #[serde(default)]
    value: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    unit: String,
}

impl<'de> Deserialize<'de> for Metric {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Option::<MetricFields>::deserialize(deserializer)?
            .map(|f| Metric {
                value: f.value,
                unit: f.unit,
            })
            .unwrap_or_default())
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreFinancials {
    pub revenue: Metric,
    pub total_income: Metric,
    pub total_expenses: Metric,
    pub total_tax_expense: Metric,
    pub profit_before_tax: Metric,
    pub net_profit: Metric,
    pub basic_eps: Metric,
    pub diluted_eps: Metric,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OtherDisclosures {
    pub operating_margin: Metric,
    pub net_margin: Metric,
    pub total_debt_to_asset_ratio: Metric,
    pub debt_equity_ratio: Metric,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalanceSheet {
    pub total_assets: Metric,
    pub total_liabilities: Metric,
    pub net_worth: Metric,
    pub debt: Metric,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Metrics {
    #[serde(deserialize_with = "null_as_default")]
    pub core_financials: CoreFinancials,
    #[serde(alias = "other_discloures", deserialize_with = "null_as_default")]
    pub other_disclosures: OtherDisclosures,
    #[serde(deserialize_with = "null_as_default")]
    pub balance_sheet: BalanceSheet,
}

/// The part of the result produced by the model.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Report {
    #[serde(default)]
    pub quarter: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub metrics: Metrics,
}

/// Extracted metrics plus where and when they came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub quarter: Option<String>,
    pub date: Option<String>,
    pub metrics: Metrics,
    #[serde(rename = "stock_name")]
    pub stock_id: String,
    pub period_label: String,
    #[serde(rename = "pdf_source")]
    pub source_path: String,
    #[serde(rename = "extraction_date")]
    pub extracted_at: String,
}

impl ExtractionResult {
    fn new(report: Report, document: &CachedDocument, extracted_at: String) -> Self {
        Self {
            quarter: report.quarter,
            date: report.date,
            metrics: report.metrics,
            stock_id: document.stock_id.clone(),
            period_label: document.period_label.clone(),
            source_path: document.path.display().to_string(),
            extracted_at,
        }
    }
}

/// Turns raw model output into a [`Report`], or the matching terminal failure.
///
/// The non-financial sentinel is checked before any decoding is attempted.
pub fn interpret_response(raw: &str) -> Result<Report, PipelineError> {
    if prompt::is_not_financial(raw) {
        return Err(PipelineError::NotFinancialReport);
    }

    let malformed = |reason: String| PipelineError::MalformedResponse {
        reason,
        raw: raw.to_string(),
    };

    let value = recover_json(raw).map_err(|e| match e {
        ExtractError::Decode { source, payload } => {
            tracing::debug!("Undecodable payload: {}", payload);
            malformed(format!("invalid JSON: {}", source))
        }
        other => malformed(other.to_string()),
    })?;

    serde_json::from_value(value).map_err(|e| malformed(format!("unexpected schema: {}", e)))
}

/// Drives one analysis: locate the cached document, ask the extraction
/// capability about it, validate the answer and persist the result.
pub struct ExtractionOrchestrator {
    acquisition: AcquisitionManager,
    capability: Arc<dyn ExtractionCapability>,
}

impl ExtractionOrchestrator {
    pub fn new(acquisition: AcquisitionManager, capability: Arc<dyn ExtractionCapability>) -> Self {
        Self {
            acquisition,
            capability,
        }
    }

    pub fn acquisition(&self) -> &AcquisitionManager {
        &self.acquisition
    }

    pub async fn analyze(&self, stock_id: &str) -> Result<ExtractionResult, PipelineError> {
        let stock_id = validate_stock_id(Some(stock_id))?;
        let stock_id = stock_id.as_str();
        let document = self.locate(stock_id).await?;

        let bytes = tokio::fs::read(&document.path)
            .await
            .map_err(StorageError::from)?;

        let raw = self
            .capability
            .extract(&bytes, &prompt::instruction())
            .await?;

        let report = interpret_response(&raw).inspect_err(|e| {
            tracing::error!("Rejected {} response for {}: {}", self.capability.name(), stock_id, e);
            if let PipelineError::MalformedResponse { raw, .. } = e {
                tracing::debug!("Raw response: {}", raw);
            }
        })?;

        let extracted_at = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
        let result = ExtractionResult::new(report, &document, extracted_at);

        if let Err(e) = self.acquisition.storage().save_result(stock_id, &result) {
            tracing::error!("Failed to save extraction result for {}: {}", stock_id, e);
        }

        tracing::info!(
            "Extracted {} metrics for {} ({})",
            result.quarter.as_deref().unwrap_or("unknown quarter"),
            stock_id,
            document.period_label
        );
        Ok(result)
    }

    /// Finds the cached latest document from the snapshot, recovering once if needed.
    async fn locate(&self, stock_id: &str) -> Result<CachedDocument, PipelineError> {
        let storage = self.acquisition.storage();
        let snapshot = match storage.load_snapshot(stock_id) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!("Unreadable listing snapshot for {}: {}", stock_id, e);
                None
            }
        };

        if let Some(documents) = &snapshot {
            if let Some((period_label, _)) = documents.quarterly_results.latest() {
                let path = storage.cache_path(stock_id, period_label);
                if tokio::fs::try_exists(&path).await.unwrap_or(false) {
                    return Ok(CachedDocument {
                        stock_id: stock_id.to_string(),
                        period_label: period_label.to_string(),
                        path,
                    });
                }
            }
        }

        self.recover(stock_id, snapshot).await
    }

    async fn recover(
        &self,
        stock_id: &str,
        snapshot: Option<DocumentSet>,
    ) -> Result<CachedDocument, PipelineError> {
        let attempt = match snapshot {
            Some(documents) if !documents.quarterly_results.is_empty() => {
                tracing::info!("Cached document missing for {}, re-acquiring from snapshot", stock_id);
                self.acquisition.acquire_latest(stock_id, &documents).await
            }
            _ => {
                tracing::info!("No usable listing snapshot for {}, re-scraping", stock_id);
                self.acquisition.refresh(stock_id).await
            }
        };

        attempt.map_err(|e| {
            tracing::warn!("Recovery for {} failed: {}", stock_id, e);
            PipelineError::LatestNotFound
        })
    }
}
