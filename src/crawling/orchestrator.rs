//! # Batch Orchestrator
//!
//! Drives one resumable crawl over the canonical URL list:
//!
//! - **Init**: load and dedupe the URL list, load the checkpoint, pick the resume index.
//! - **Per batch**: every URL runs fetch → extract → validate under the concurrency
//!   limiter. Results come back to this loop, the only place that touches the shard
//!   writer, the ledger and the progress tracker. A URL's failure becomes an
//!   `ErrorEntry` and never aborts the batch.
//! - **Checkpoint**: after each batch the open shard is synced and the batch's
//!   failures are appended to the error log, then the checkpoint moves to the
//!   batch's last URL.
//! - **Terminal**: close the final shard, return stats.
//!
//! Only setup failures (URL list, error log, output directories) and persistence
//! failures abort a run.

#![allow(clippy::uninlined_format_args)]

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::crawling::limiter::ConcurrencyLimiter;
use crate::crawling::progress::ProgressTracker;
use crate::crawling::validator::RecordValidator;
use crate::domain::{CanonicalUrl, Checkpoint, ErrorEntry, Record, ResumePoint, canonical_key};
use crate::infrastructure::checkpoint_store::{CheckpointError, CheckpointStore};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::error_ledger::{self, ErrorLedger, LedgerError};
use crate::infrastructure::http_client::PageFetcher;
use crate::infrastructure::parsing::FieldExtractor;
use crate::infrastructure::shard_store::{ShardError, ShardWriter};

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("Cannot read URL list {path:?}: {source}")]
    UrlList {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("URL list {path:?} is not a JSON array of strings: {source}")]
    UrlListFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Cannot create output directory {path:?}: {source}")]
    OutputDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Shard(#[from] ShardError),

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Aggregate result of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    /// URLs attempted by this run
    pub processed: u64,
    pub accepted: u64,
    pub errors: Vec<ErrorEntry>,
    pub shards_written: u64,
}

/// Per-run state, passed explicitly
#[derive(Debug)]
pub struct RunContext {
    pub run_id: Uuid,
    pub tracker: ProgressTracker,
    pub ledger: ErrorLedger,
}

impl RunContext {
    pub fn new(total: u64, progress_interval: u64) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            tracker: ProgressTracker::new(total, progress_interval),
            ledger: ErrorLedger::new(),
        }
    }

    /// Run start; elapsed-time figures are measured from the same instant
    pub fn started_at(&self) -> DateTime<Utc> {
        self.tracker.started_at()
    }
}

/// Result of one fetch+extract+validate unit
#[derive(Debug)]
pub enum UnitOutcome {
    Accepted(Record),
    Failed(ErrorEntry),
}

/// Locations and sizes for a run
#[derive(Debug, Clone)]
pub struct RunSettings {
    pub url_list: PathBuf,
    pub json_dir: PathBuf,
    pub csv_dir: PathBuf,
    pub shard_prefix: String,
    pub checkpoint_file: PathBuf,
    pub error_log: PathBuf,
    pub batch_size: usize,
    pub records_per_file: usize,
    pub progress_interval: u64,
}

impl RunSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            url_list: config.paths.url_list.clone(),
            json_dir: config.paths.output_dir.clone(),
            csv_dir: config.paths.csv_dir().to_path_buf(),
            shard_prefix: config.paths.shard_prefix.clone(),
            checkpoint_file: config.paths.checkpoint_path(),
            error_log: config.paths.error_log.clone(),
            batch_size: config.crawl.batch_size,
            records_per_file: config.crawl.records_per_file,
            progress_interval: config.crawl.progress_interval,
        }
    }
}

/// Read the URL list, trimming entries and dropping blanks and duplicates
pub fn load_url_list(path: &Path) -> Result<Vec<CanonicalUrl>, OrchestratorError> {
    let content = std::fs::read_to_string(path).map_err(|source| OrchestratorError::UrlList {
        path: path.to_path_buf(),
        source,
    })?;
    let raw: Vec<String> = serde_json::from_str(&content).map_err(|source| OrchestratorError::UrlListFormat {
        path: path.to_path_buf(),
        source,
    })?;

    let mut seen = HashSet::new();
    let urls: Vec<CanonicalUrl> = raw
        .iter()
        .map(|url| canonical_key(url))
        .filter(|url| !url.is_empty() && seen.insert(*url))
        .map(CanonicalUrl::new)
        .collect();

    if urls.len() < raw.len() {
        debug!("Dropped {} blank or duplicate URLs", raw.len() - urls.len());
    }
    Ok(urls)
}

pub struct BatchOrchestrator {
    fetcher: Arc<PageFetcher>,
    extractor: Arc<dyn FieldExtractor>,
    validator: RecordValidator,
    limiter: ConcurrencyLimiter,
    settings: RunSettings,
}

impl BatchOrchestrator {
    pub fn new(
        fetcher: Arc<PageFetcher>,
        extractor: Arc<dyn FieldExtractor>,
        validator: RecordValidator,
        limiter: ConcurrencyLimiter,
        settings: RunSettings,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            validator,
            limiter,
            settings,
        }
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    pub fn limiter(&self) -> &ConcurrencyLimiter {
        &self.limiter
    }

    /// Run from the checkpoint to the end of the URL list
    pub async fn run(&self) -> Result<RunStats, OrchestratorError> {
        let settings = &self.settings;
        let urls = load_url_list(&settings.url_list)?;
        // the error log must load before any URL is attempted
        let history = error_ledger::load(&settings.error_log)?;
        debug!("Error log {:?} holds {} entries", settings.error_log, history.len());
        for dir in [&settings.json_dir, &settings.csv_dir] {
            std::fs::create_dir_all(dir).map_err(|source| OrchestratorError::OutputDir {
                path: dir.clone(),
                source,
            })?;
        }

        let mut store = CheckpointStore::new(&settings.checkpoint_file);
        let loaded = store.load();
        let (start, mut checkpoint) = match loaded.resume_point(&urls) {
            ResumePoint::Start => (0, loaded),
            ResumePoint::From(index) => {
                info!("🔄 Resuming after {:?} at index {}", loaded.last_url, index);
                (index, loaded)
            }
            ResumePoint::NotFound => {
                warn!(
                    "⚠️ Checkpoint URL {:?} is not in the URL list, starting from the beginning",
                    loaded.last_url
                );
                (0, Checkpoint::default())
            }
            ResumePoint::Completed => {
                info!("✅ All {} URLs already processed, nothing to do", urls.len());
                return Ok(RunStats::default());
            }
        };

        let remaining = &urls[start..];
        if remaining.is_empty() {
            info!("✅ URL list is empty, nothing to do");
            return Ok(RunStats::default());
        }

        let mut context = RunContext::new(remaining.len() as u64, settings.progress_interval);
        let mut shards = ShardWriter::open(
            &settings.json_dir,
            &settings.csv_dir,
            settings.shard_prefix.as_str(),
            settings.records_per_file,
            self.extractor.schema().clone(),
        )?;
        info!(
            "🚀 Run {} started at {}: {} of {} URLs remaining, batches of {}",
            context.run_id,
            context.started_at().to_rfc3339(),
            remaining.len(),
            urls.len(),
            settings.batch_size
        );

        let batch_count = remaining.len().div_ceil(settings.batch_size.max(1));
        let mut accepted = 0;
        for (batch_index, batch) in remaining.chunks(settings.batch_size.max(1)).enumerate() {
            debug!("Batch {}/{}: {} URLs", batch_index + 1, batch_count, batch.len());

            let mut units = self
                .limiter
                .run_all(batch.iter().cloned(), |url| self.process_unit(url));
            while let Some(outcome) = units.next().await {
                match outcome {
                    UnitOutcome::Accepted(record) => {
                        shards.append(record);
                        shards.flush_if_full()?;
                        accepted += 1;
                    }
                    UnitOutcome::Failed(entry) => {
                        warn!("❌ {}: {}", entry.url, entry.error);
                        context.ledger.record(entry);
                    }
                }
                context.tracker.record_unit();
            }

            shards.sync()?;
            context.ledger.append_to(&settings.error_log)?;
            if let Some(last) = batch.last() {
                checkpoint = checkpoint.advanced(last.clone(), batch.len() as u64);
                store.save(&checkpoint)?;
            }
            info!(
                "📊 Batch {}/{} done. {}",
                batch_index + 1,
                batch_count,
                context.tracker.snapshot().summary()
            );
        }

        shards.flush_remainder()?;

        let stats = RunStats {
            processed: context.tracker.processed(),
            accepted,
            errors: context.ledger.into_entries(),
            shards_written: shards.shards_written(),
        };
        info!(
            "✅ Run {} finished: {} processed, {} accepted, {} errors, {} shards written",
            context.run_id,
            stats.processed,
            stats.accepted,
            stats.errors.len(),
            stats.shards_written
        );
        Ok(stats)
    }

    /// Fetch, extract and validate one URL
    pub async fn process_unit(&self, url: CanonicalUrl) -> UnitOutcome {
        let body = match self.fetcher.fetch(url.as_str()).await {
            Ok(body) => body,
            Err(error) => return UnitOutcome::Failed(ErrorEntry::new(url, error.to_string())),
        };

        let mut record = match self.extractor.extract(&body, &url) {
            Ok(record) => record,
            Err(error) => return UnitOutcome::Failed(ErrorEntry::new(url, error.to_string())),
        };
        record.set_url(&url);

        let report = self.validator.validate(&record);
        if !report.is_valid {
            return UnitOutcome::Failed(ErrorEntry::new(url, report.rejection_message()));
        }
        UnitOutcome::Accepted(record)
    }
}
