//! JSON result persistence.
//!
//! One file per test, `{test_id}.json`, under a configurable results
//! directory. Directory scans tolerate individually corrupt files by
//! skipping them with a warning; loading an explicitly requested test id
//! that does not exist is a hard error.

pub mod model;

pub use model::{Measurement, TestMetadata, TestResult};

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::device::DeviceKind;

/// Error type for result persistence.
#[derive(Debug, Clone)]
pub enum StorageError {
    /// A requested test id has no result file.
    NotFound(String),
    /// I/O failure reading or writing a result.
    Io(String),
    /// A result file exists but cannot be parsed.
    Parse(String),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::NotFound(test_id) => write!(f, "test result not found: {}", test_id),
            StorageError::Io(msg) => write!(f, "I/O error: {}", msg),
            StorageError::Parse(msg) => write!(f, "parse error: {}", msg),
        }
    }
}

impl std::error::Error for StorageError {}

/// Filter for directory scans.
///
/// Date bounds are inclusive and compared against the `YYYY-MM-DD` prefix
/// of the metadata timestamp; plain string comparison is valid because the
/// format is zero-padded ISO 8601.
#[derive(Debug, Clone, Default)]
pub struct TestFilter {
    pub device_kind: Option<DeviceKind>,
    pub from_date: Option<String>,
    pub to_date: Option<String>,
}

impl TestFilter {
    fn matches(&self, result: &TestResult) -> bool {
        if let Some(kind) = self.device_kind
            && result.metadata.device_kind != kind
        {
            return false;
        }
        let date = result.date();
        if let Some(ref from) = self.from_date
            && date < from.as_str()
        {
            return false;
        }
        if let Some(ref to) = self.to_date
            && date > to.as_str()
        {
            return false;
        }
        true
    }
}

/// Directory-backed store of test results.
pub struct ResultStore {
    root: PathBuf,
}

impl ResultStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory results are stored under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the result file for a test id.
    pub fn path_for(&self, test_id: &str) -> PathBuf {
        self.root.join(format!("{}.json", test_id))
    }

    /// Persists one result, creating the directory if needed.
    pub fn save(&self, result: &TestResult) -> Result<PathBuf, StorageError> {
        fs::create_dir_all(&self.root).map_err(|e| StorageError::Io(e.to_string()))?;
        let path = self.path_for(&result.metadata.test_id);
        let json = serde_json::to_string_pretty(result)
            .map_err(|e| StorageError::Parse(e.to_string()))?;
        fs::write(&path, json).map_err(|e| StorageError::Io(e.to_string()))?;
        debug!("saved result {} to {}", result.metadata.test_id, path.display());
        Ok(path)
    }

    /// Loads one result by test id. Missing id is a hard error.
    pub fn load(&self, test_id: &str) -> Result<TestResult, StorageError> {
        let path = self.path_for(test_id);
        if !path.exists() {
            return Err(StorageError::NotFound(test_id.to_string()));
        }
        let data = fs::read_to_string(&path).map_err(|e| StorageError::Io(e.to_string()))?;
        serde_json::from_str(&data).map_err(|e| StorageError::Parse(e.to_string()))
    }

    /// Scans the results directory, newest first.
    ///
    /// Corrupt or unreadable files are skipped with a warning; a missing
    /// directory yields an empty list.
    pub fn find(&self, filter: &TestFilter) -> Result<Vec<TestResult>, StorageError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.root).map_err(|e| StorageError::Io(e.to_string()))?;
        let mut results = Vec::new();

        for entry in entries {
            let entry = entry.map_err(|e| StorageError::Io(e.to_string()))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }

            let result = match fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|data| serde_json::from_str::<TestResult>(&data).map_err(|e| e.to_string()))
            {
                Ok(result) => result,
                Err(e) => {
                    warn!("skipping corrupted result file {}: {}", path.display(), e);
                    continue;
                }
            };

            if filter.matches(&result) {
                results.push(result);
            }
        }

        results.sort_by(|a, b| b.metadata.timestamp.cmp(&a.metadata.timestamp));
        Ok(results)
    }
}
