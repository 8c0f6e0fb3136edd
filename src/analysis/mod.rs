// src/analysis/mod.rs
pub mod capability;
pub mod orchestrator;
pub mod prompt;

pub use capability::{ExtractionCapability, GeminiCapability};
pub use orchestrator::{ExtractionOrchestrator, ExtractionResult, Metric, Metrics};
