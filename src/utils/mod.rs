// src/utils/mod.rs
pub mod error;
pub mod logging;

pub use error::{AppError, PipelineError}; // Re-export main error types for convenience
