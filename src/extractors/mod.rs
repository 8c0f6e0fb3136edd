// src/extractors/mod.rs
pub mod json_recovery;
pub mod listing;

// Re-export key extraction types for convenience
pub use json_recovery::recover_json;
pub use listing::ListingParser;
