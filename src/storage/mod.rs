// src/storage/mod.rs
use crate::screener::models::DocumentSet;
use crate::utils::error::StorageError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

static WHITESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s").expect("Failed to compile WHITESPACE_RE"));

/// On-disk layout: listing snapshots and extraction results under `data_dir`,
/// downloaded documents under `cache_dir`. Every file is keyed by stock identifier
/// and overwritten on each run.
#[derive(Debug, Clone)]
pub struct StorageManager {
    data_dir: PathBuf,
    cache_dir: PathBuf,
}

impl StorageManager {
    /// Creates a new StorageManager, creating both directories if needed
    pub fn new<P: AsRef<Path>, Q: AsRef<Path>>(data_dir: P, cache_dir: Q) -> Result<Self, StorageError> {
        let data_dir = data_dir.as_ref().to_path_buf();
        let cache_dir = cache_dir.as_ref().to_path_buf();

        fs::create_dir_all(&data_dir)?;
        fs::create_dir_all(&cache_dir)?;

        Ok(Self { data_dir, cache_dir })
    }

    pub fn snapshot_path(&self, stock_id: &str) -> PathBuf {
        self.data_dir.join(format!("{}_documents.json", stock_id))
    }

    pub fn result_path(&self, stock_id: &str) -> PathBuf {
        self.data_dir.join(format!("{}_quarterly_data.json", stock_id))
    }

    /// Deterministic cache location for a (stock, period) pair.
    pub fn cache_path(&self, stock_id: &str, period_label: &str) -> PathBuf {
        let period = WHITESPACE_RE.replace_all(period_label, "_");
        self.cache_dir.join(format!("{}_{}.pdf", stock_id, period))
    }

    /// Writes the listing snapshot, replacing any previous one.
    pub fn save_snapshot(&self, stock_id: &str, documents: &DocumentSet) -> Result<PathBuf, StorageError> {
        let path = self.snapshot_path(stock_id);
        write_json(&path, documents)?;
        tracing::info!("Saved listing snapshot to {}", path.display());
        Ok(path)
    }

    /// Reads the listing snapshot. `Ok(None)` when none has been written yet.
    pub fn load_snapshot(&self, stock_id: &str) -> Result<Option<DocumentSet>, StorageError> {
        let path = self.snapshot_path(stock_id);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Writes the extraction result, replacing any previous one.
    pub fn save_result<T: Serialize>(&self, stock_id: &str, result: &T) -> Result<PathBuf, StorageError> {
        let path = self.result_path(stock_id);
        write_json(&path, result)?;
        tracing::info!("Saved extraction result to {}", path.display());
        Ok(path)
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StorageError> {
    let body = serde_json::to_string_pretty(value)?;
    fs::write(path, body)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cache_path_replaces_whitespace() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path(), dir.path().join("pdf")).unwrap();
        assert_eq!(
            storage.cache_path("TCS", "Sep 2024"),
            dir.path().join("pdf").join("TCS_Sep_2024.pdf")
        );
        assert!(dir.path().join("pdf").is_dir());
    }

    #[test]
    fn snapshot_round_trip_and_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path(), dir.path().join("pdf")).unwrap();
        assert_eq!(storage.load_snapshot("TCS").unwrap(), None);

        let mut first = DocumentSet::default();
        first.quarterly_results.insert("Jun 2024", "https://www.screener.in/a");
        first.quarterly_results.insert("Sep 2024", "https://www.screener.in/b");
        storage.save_snapshot("TCS", &first).unwrap();

        let mut second = DocumentSet::default();
        second.quarterly_results.insert("Dec 2024", "https://www.screener.in/c");
        storage.save_snapshot("TCS", &second).unwrap();

        let loaded = storage.load_snapshot("TCS").unwrap().unwrap();
        assert_eq!(loaded, second);
    }

    #[test]
    fn corrupt_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageManager::new(dir.path(), dir.path().join("pdf")).unwrap();
        fs::write(storage.snapshot_path("TCS"), "not json").unwrap();
        assert!(matches!(
            storage.load_snapshot("TCS"),
            Err(StorageError::SerializationError(_))
        ));
    }
}
