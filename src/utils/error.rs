// src/utils/error.rs
use thiserror::Error;

// Define specific error types for different parts of the application
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("Gave up on {url} after {attempts} attempts: {cause}")]
    Transient {
        url: String,
        attempts: u32,
        cause: String,
    },

    #[error("HTTP error {status} for {url}")]
    Http {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("Network request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to write download to disk: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("Invalid site URL: {0}")]
    InvalidSiteUrl(#[from] url::ParseError),

    #[error("No JSON object delimiters found in response")]
    MissingDelimiters,

    #[error("Failed to decode JSON payload: {source}")]
    Decode {
        #[source]
        source: serde_json::Error,
        payload: String,
    },
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

#[derive(Error, Debug)]
pub enum CapabilityError {
    #[error("Inference request failed: {0}")]
    Request(#[source] reqwest::Error),

    #[error("Inference endpoint returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("Inference response contained no text")]
    EmptyResponse,
}

/// Terminal failure of the pipeline for a single stock identifier.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Stock name is required")]
    MissingStockId,

    #[error("Invalid stock name: {0}")]
    InvalidStockId(String),

    #[error("Fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("no quarterly results found")]
    NoQuarterlyResults,

    #[error("latest quarterly result not found")]
    LatestNotFound,

    #[error("document is not a financial report")]
    NotFinancialReport,

    #[error("malformed model response: {reason}")]
    MalformedResponse { reason: String, raw: String },

    #[error("extraction capability failed: {0}")]
    Capability(#[from] CapabilityError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Unexpected error: {0}")]
    Unexpected(String),
}

impl PipelineError {
    /// Status code reported at the service boundary.
    pub fn status(&self) -> reqwest::StatusCode {
        use reqwest::StatusCode;
        match self {
            PipelineError::MissingStockId | PipelineError::InvalidStockId(_) => {
                StatusCode::BAD_REQUEST
            }
            PipelineError::Fetch(_) => StatusCode::BAD_GATEWAY,
            PipelineError::NoQuarterlyResults | PipelineError::LatestNotFound => {
                StatusCode::NOT_FOUND
            }
            PipelineError::NotFinancialReport => StatusCode::UNPROCESSABLE_ENTITY,
            PipelineError::MalformedResponse { .. } | PipelineError::Capability(_) => {
                StatusCode::BAD_GATEWAY
            }
            PipelineError::Storage(_) | PipelineError::Unexpected(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Cannot prepare storage: {0}")]
    Storage(#[from] StorageError),

    #[error("Fetcher setup failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("Parser setup failed: {0}")]
    Extract(#[from] ExtractError),

    #[error("Inference client setup failed: {0}")]
    Capability(#[from] CapabilityError),

    #[error("Pipeline failed: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Data processing failed: {0}")]
    Processing(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failures_map_to_distinct_statuses() {
        assert_eq!(PipelineError::MissingStockId.status(), 400);
        assert_eq!(PipelineError::NoQuarterlyResults.status(), 404);
        assert_eq!(PipelineError::NotFinancialReport.status(), 422);
        let malformed = PipelineError::MalformedResponse {
            reason: "x".into(),
            raw: "y".into(),
        };
        assert_eq!(malformed.status(), 502);
        assert_eq!(PipelineError::Unexpected("boom".into()).status(), 500);
    }

    #[test]
    fn storage_setup_failure_is_reported_as_storage() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"").unwrap();

        let err: AppError = crate::storage::StorageManager::new(&blocker, dir.path())
            .unwrap_err()
            .into();
        assert!(matches!(err, AppError::Storage(StorageError::IoError(_))), "{err:?}");
        assert!(err.to_string().starts_with("Cannot prepare storage"));
    }

    #[test]
    fn user_facing_messages_are_stable() {
        assert_eq!(
            PipelineError::LatestNotFound.to_string(),
            "latest quarterly result not found"
        );
        assert_eq!(
            PipelineError::NotFinancialReport.to_string(),
            "document is not a financial report"
        );
    }
}
