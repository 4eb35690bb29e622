//! Durable checkpoint file
//!
//! Loading never fails a run: a missing, corrupt or legacy-shaped file loads as
//! the empty checkpoint and the run starts over. Saves are atomic and, within one
//! store, `processedCount` may never go backwards.

#![allow(clippy::uninlined_format_args)]

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::domain::Checkpoint;
use crate::infrastructure::shard_store::write_atomic;

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("Checkpoint I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to encode checkpoint: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Checkpoint regression: processedCount {attempted} is below {previous}")]
    Regression { previous: u64, attempted: u64 },
}

#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    last_saved: Option<u64>,
}

impl CheckpointStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            last_saved: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the checkpoint, defaulting to `{null, 0}` when absent or unusable
    pub fn load(&self) -> Checkpoint {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!("No checkpoint at {}", self.path.display());
                return Checkpoint::default();
            }
            Err(error) => {
                warn!("⚠️ Cannot read checkpoint {}: {}", self.path.display(), error);
                return Checkpoint::default();
            }
        };

        match serde_json::from_str::<Checkpoint>(&content) {
            Ok(checkpoint) => checkpoint,
            Err(error) => {
                warn!(
                    "⚠️ Ignoring unrecognised checkpoint {} ({}), starting from the beginning",
                    self.path.display(),
                    error
                );
                Checkpoint::default()
            }
        }
    }

    /// Atomically replace the checkpoint file
    pub fn save(&mut self, checkpoint: &Checkpoint) -> Result<(), CheckpointError> {
        if let Some(previous) = self.last_saved {
            if checkpoint.processed_count < previous {
                return Err(CheckpointError::Regression {
                    previous,
                    attempted: checkpoint.processed_count,
                });
            }
        }

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let json = serde_json::to_vec_pretty(checkpoint)?;
        write_atomic(&self.path, &json)?;
        self.last_saved = Some(checkpoint.processed_count);
        debug!(
            "Checkpoint saved: processedCount={} lastUrl={:?}",
            checkpoint.processed_count, checkpoint.last_url
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::CanonicalUrl;
    use tempfile::TempDir;

    #[test]
    fn missing_file_is_the_empty_checkpoint() {
        let dir = TempDir::new().unwrap();
        let store = CheckpointStore::new(dir.path().join("last_processed_info.json"));
        assert_eq!(store.load(), Checkpoint::default());
    }

    #[test]
    fn legacy_shape_is_treated_as_absent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("last_processed_info.json");
        std::fs::write(&path, r#"{"url":"https://x.test/a","fileIndex":3,"positionInFile":12}"#).unwrap();
        assert_eq!(CheckpointStore::new(&path).load(), Checkpoint::default());
    }

    #[test]
    fn corrupt_file_is_treated_as_absent() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("last_processed_info.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert_eq!(CheckpointStore::new(&path).load(), Checkpoint::default());
    }

    #[test]
    fn save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("last_processed_info.json");
        let mut store = CheckpointStore::new(&path);
        let checkpoint = Checkpoint::new(CanonicalUrl::new("https://x.test/b"), 2);
        store.save(&checkpoint).unwrap();
        assert_eq!(CheckpointStore::new(&path).load(), checkpoint);
        assert!(!dir.path().join("nested").join("last_processed_info.json.tmp").exists());
    }

    #[test]
    fn processed_count_cannot_regress() {
        let dir = TempDir::new().unwrap();
        let mut store = CheckpointStore::new(dir.path().join("cp.json"));
        store.save(&Checkpoint::new(CanonicalUrl::new("b"), 5)).unwrap();
        let result = store.save(&Checkpoint::new(CanonicalUrl::new("a"), 4));
        assert!(matches!(result, Err(CheckpointError::Regression { previous: 5, attempted: 4 })));
        store.save(&Checkpoint::new(CanonicalUrl::new("c"), 5)).unwrap();
    }
}
