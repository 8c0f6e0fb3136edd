// src/main.rs
use clap::Parser;
use quarterly_extractor::acquisition::validate_stock_id;
use quarterly_extractor::config::{DEFAULT_CACHE_DIR, DEFAULT_MODEL, DEFAULT_SITE};
use quarterly_extractor::utils::logging;
use quarterly_extractor::{
    AcquisitionManager, AnalysisService, AnalyzeRequest, AppError, ExtractionOrchestrator,
    GeminiCapability, InferenceConfig, PipelineConfig, StorageManager,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Quarterly result extractor: scrape, cache and analyze the latest filing for a stock
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Stock identifier as used by the listing site (e.g. TCS)
    #[arg(short, long, required_unless_present = "health")]
    stock: Option<String>,

    /// Directory for listing snapshots and extraction results
    #[arg(short, long, default_value = ".")]
    data_dir: PathBuf,

    /// Content cache for downloaded result documents
    #[arg(long, default_value = DEFAULT_CACHE_DIR)]
    cache_dir: PathBuf,

    /// Canonical host of the listing site
    #[arg(long, default_value = DEFAULT_SITE)]
    site: String,

    /// Inference model name
    #[arg(long, default_value = DEFAULT_MODEL)]
    model: String,

    /// Only scrape the listing and cache the latest document
    #[arg(long)]
    scrape_only: bool,

    /// Print the liveness response and exit
    #[arg(long)]
    health: bool,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    // 1. Setup Logging (reads RUST_LOG env var)
    logging::setup_logging();

    // 2. Parse CLI Arguments
    let args = Args::parse();
    tracing::debug!("Starting with args: {:?}", args);

    if args.health {
        println!("{}", AnalysisService::health().body);
        return Ok(());
    }
    let stock = validate_stock_id(args.stock.as_deref())?;

    // 3. Build the pipeline
    let config = PipelineConfig {
        site_url: args.site.clone(),
        data_dir: args.data_dir.clone(),
        cache_dir: args.cache_dir.clone(),
        ..PipelineConfig::default()
    };
    let storage = StorageManager::new(&config.data_dir, &config.cache_dir)?;
    let acquisition = AcquisitionManager::new(config, storage)?;

    if args.scrape_only {
        let documents = acquisition.scrape(&stock).await?;
        let cached = acquisition.acquire_latest(&stock, &documents).await?;
        tracing::info!("Latest document cached at {}", cached.path.display());
        println!("{}", serde_json::to_string_pretty(&documents)?);
        return Ok(());
    }

    let api_key = std::env::var("GEMINI_API_KEY")
        .map_err(|_| AppError::Config("GEMINI_API_KEY environment variable not set".to_string()))?;
    let mut inference = InferenceConfig::new(api_key);
    inference.model = args.model.clone();
    let capability = Arc::new(GeminiCapability::new(inference)?);

    let service = AnalysisService::new(ExtractionOrchestrator::new(acquisition, capability), false);

    // 4. Run the analysis
    let response = service
        .analyze(AnalyzeRequest {
            stock_id: Some(stock),
        })
        .await;
    println!("{}", serde_json::to_string_pretty(&response.body)?);

    if !response.status.is_success() {
        let message = response.body["error"].as_str().unwrap_or("analysis failed").to_string();
        return Err(AppError::Processing(message));
    }
    Ok(())
}
