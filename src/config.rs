// src/config.rs
use std::path::PathBuf;
use std::time::Duration;

/// Desktop browser identification; the listing site blocks obvious bots.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Windows; Windows x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/103.0.5060.114 Safari/537.36";

pub const DEFAULT_SITE: &str = "https://www.screener.in";
pub const DEFAULT_LISTING_PATH: &str = "/company/{stock}/consolidated/";
pub const DEFAULT_CACHE_DIR: &str = "QuarterlyResultPdf";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_INFERENCE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// HTTP behaviour shared by every outbound request to the filings site.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub request_timeout: Duration,
    pub connect_timeout: Duration,
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first attempt of every request.
    pub initial_delay: Duration,
    /// Backoff after failed attempt `n` (0-based) is `backoff_base * 2^n`.
    pub backoff_base: Duration,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: BROWSER_USER_AGENT.to_string(),
            request_timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            max_attempts: 3,
            initial_delay: Duration::from_millis(150),
            backoff_base: Duration::from_secs(1),
        }
    }
}

/// Settings for the document-understanding endpoint.
#[derive(Clone)]
pub struct InferenceConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
}

impl std::fmt::Debug for InferenceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .field("temperature", &self.temperature)
            .field("top_p", &self.top_p)
            .field("top_k", &self.top_k)
            .field("max_output_tokens", &self.max_output_tokens)
            .finish()
    }
}

impl InferenceConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_INFERENCE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(120),
            temperature: 0.1,
            top_p: 0.1,
            top_k: 16,
            max_output_tokens: 2048,
        }
    }
}

/// Everything the pipeline needs, passed explicitly into each component.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Canonical host used to resolve root-relative links.
    pub site_url: String,
    /// Listing page path; `{stock}` is replaced with the stock identifier.
    pub listing_path: String,
    /// Directory for listing snapshots and extraction results.
    pub data_dir: PathBuf,
    /// Content cache for downloaded documents.
    pub cache_dir: PathBuf,
    pub fetch: FetchConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            site_url: DEFAULT_SITE.to_string(),
            listing_path: DEFAULT_LISTING_PATH.to_string(),
            data_dir: PathBuf::from("."),
            cache_dir: PathBuf::from(DEFAULT_CACHE_DIR),
            fetch: FetchConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Absolute URL of the listing page for `stock_id`.
    pub fn listing_url(&self, stock_id: &str) -> String {
        format!(
            "{}{}",
            self.site_url.trim_end_matches('/'),
            self.listing_path.replace("{stock}", stock_id)
        )
    }
}
