//! Per-run collection of records that could not be migrated.

use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// One record that failed to reach the destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    /// Human identifier of the record (contact email, ticket title).
    pub identifier: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<i64>,
    pub error_message: String,
}

impl FailureRecord {
    pub fn new(identifier: impl Into<String>, source_id: Option<i64>, error: impl ToString) -> Self {
        Self {
            identifier: identifier.into(),
            source_id,
            error_message: error.to_string(),
        }
    }
}

/// Failures gathered by one stage run, owned by the caller and passed to
/// the components that can fail per record.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ErrorLedger {
    entries: Vec<FailureRecord>,
}

impl ErrorLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, failure: FailureRecord) {
        self.entries.push(failure);
    }

    pub fn entries(&self) -> &[FailureRecord] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Write the failures as a JSON array to `{dir}/{stage}-{timestamp}.json`.
    ///
    /// Nothing is written for an empty ledger, and `Ok(None)` is returned.
    pub fn persist(&self, dir: &Path, stage: &str) -> io::Result<Option<PathBuf>> {
        if self.entries.is_empty() {
            return Ok(None);
        }

        std::fs::create_dir_all(dir)?;
        let stamp = Utc::now().format("%Y%m%dT%H%M%S");
        let path = dir.join(format!("{}-{}.json", stage, stamp));
        let json = serde_json::to_string_pretty(&self.entries)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        std::fs::write(&path, json)?;
        Ok(Some(path))
    }
}
