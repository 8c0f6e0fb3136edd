// src/screener/mod.rs
pub mod client;
pub mod models;

pub use client::Fetcher;
pub use models::{CachedDocument, CallDocuments, DocumentSet, QuarterlyResults};
