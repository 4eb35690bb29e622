//! Per-URL failure ledger
//!
//! Entries accumulate in memory during a run and are appended to the durable
//! error log (a JSON array, oldest first) batch by batch, before the checkpoint
//! moves past their URLs. Earlier runs' history is kept for the reconciler.

#![allow(clippy::uninlined_format_args)]

use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::domain::ErrorEntry;
use crate::infrastructure::shard_store::write_atomic;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Error log I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Error log is not a valid entry list: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default)]
pub struct ErrorLedger {
    entries: Vec<ErrorEntry>,
    /// Entries before this index are already in the durable log
    persisted: usize,
}

impl ErrorLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, entry: ErrorEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[ErrorEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<ErrorEntry> {
        self.entries
    }

    /// Entries not yet written to the durable log
    pub fn pending(&self) -> &[ErrorEntry] {
        &self.entries[self.persisted..]
    }

    /// Append pending entries to the log at `path`; nothing is written when
    /// there are none. On error the entries stay pending.
    pub fn append_to(&mut self, path: &Path) -> Result<usize, LedgerError> {
        let pending = self.pending();
        if pending.is_empty() {
            return Ok(0);
        }
        let appended = pending.len();
        let mut history = load(path)?;
        history.extend(pending.iter().cloned());

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        write_atomic(path, &serde_json::to_vec_pretty(&history)?)?;
        self.persisted = self.entries.len();
        info!(
            "📝 Appended {} error entries to {} ({} total)",
            appended,
            path.display(),
            history.len()
        );
        Ok(appended)
    }
}

/// Read the durable log; a missing file is an empty history
pub fn load(path: &Path) -> Result<Vec<ErrorEntry>, LedgerError> {
    match std::fs::read_to_string(path) {
        Ok(content) if content.trim().is_empty() => Ok(Vec::new()),
        Ok(content) => Ok(serde_json::from_str(&content)?),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(error) => Err(error.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CanonicalUrl;
    use tempfile::TempDir;

    fn entry(url: &str, error: &str) -> ErrorEntry {
        ErrorEntry::new(CanonicalUrl::new(url), error)
    }

    #[test]
    fn empty_ledger_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("error_log.json");
        assert_eq!(ErrorLedger::new().append_to(&path).unwrap(), 0);
        assert!(!path.exists());
    }

    #[test]
    fn runs_append_to_history() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("error_log.json");

        let mut first = ErrorLedger::new();
        first.record(entry("https://x.test/a", "HTTP error! status: 404"));
        first.append_to(&path).unwrap();

        let mut second = ErrorLedger::new();
        second.record(entry("https://x.test/b", "No response received from the server"));
        second.append_to(&path).unwrap();

        let history = load(&path).unwrap();
        assert_eq!(
            history,
            vec![
                entry("https://x.test/a", "HTTP error! status: 404"),
                entry("https://x.test/b", "No response received from the server"),
            ]
        );
    }

    #[test]
    fn corrupt_history_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("error_log.json");
        std::fs::write(&path, "{").unwrap();
        let mut ledger = ErrorLedger::new();
        ledger.record(entry("https://x.test/a", "boom"));
        assert!(matches!(ledger.append_to(&path), Err(LedgerError::Decode(_))));
        assert_eq!(ledger.pending().len(), 1);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{");
    }

    #[test]
    fn repeated_appends_write_each_entry_once() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("error_log.json");
        let mut ledger = ErrorLedger::new();

        ledger.record(entry("https://x.test/a", "HTTP error! status: 404"));
        assert_eq!(ledger.append_to(&path).unwrap(), 1);
        assert_eq!(ledger.append_to(&path).unwrap(), 0);

        ledger.record(entry("https://x.test/b", "Request timed out after 10s"));
        assert_eq!(ledger.append_to(&path).unwrap(), 1);

        assert_eq!(load(&path).unwrap().len(), 2);
        assert!(ledger.pending().is_empty());
        assert_eq!(ledger.len(), 2);
    }
}
