//! Post-run reconciliation
//!
//! Compares the canonical URL list with the URLs found in shard records and the
//! error ledger: `rerunSet = dedupe(transient ∪ missing) - permanent`.
//! Read-only except for the rerun file; shards and checkpoint are never touched.

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::cast_precision_loss)]

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::info;

use crate::domain::{CanonicalUrl, ErrorEntry, FailureClass, canonical_key};
use crate::infrastructure::shard_store::{read_shards, write_atomic};

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Cannot read shard directory: {0}")]
    Shards(#[source] io::Error),

    #[error("Cannot write rerun file: {0}")]
    Write(#[from] io::Error),

    #[error("Cannot encode rerun set: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
    pub total_count: usize,
    pub downloaded_count: usize,
    pub missing_count: usize,
    pub downloaded_percentage: f64,
    pub missing_percentage: f64,
    /// Distinct URLs whose latest ledger entry is a not-found
    pub permanent_failures: usize,
    pub transient_failures: usize,
    pub rerun_set: Vec<CanonicalUrl>,
}

fn percentage(part: usize, total: usize) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (part as f64 / total as f64 * 10_000.0).round() / 100.0
}

/// Reconcile `canonical` against the shards in `shard_dir` and the failure `ledger`
pub fn reconcile(
    canonical: &[CanonicalUrl],
    shard_dir: &Path,
    prefix: &str,
    ledger: &[ErrorEntry],
) -> Result<ReconcileReport, ReconcileError> {
    let scraped: HashSet<String> = read_shards(shard_dir, prefix)
        .map_err(ReconcileError::Shards)?
        .into_iter()
        .flat_map(|shard| shard.records)
        .filter_map(|record| record.url().map(|url| canonical_key(url).to_string()))
        .collect();

    // latest entry per URL decides its class; first appearance keeps ledger order
    let mut classes: HashMap<&str, FailureClass> = HashMap::new();
    let mut failed_order: Vec<&str> = Vec::new();
    for entry in ledger {
        let key = canonical_key(entry.url.as_str());
        if classes.insert(key, entry.class()).is_none() {
            failed_order.push(key);
        }
    }
    let is_class = |url: &str, class: FailureClass| classes.get(url) == Some(&class);

    let mut downloaded_count = 0;
    let mut missing_count = 0;
    let mut seen = HashSet::new();
    let mut rerun_set = Vec::new();
    for url in canonical {
        let key = canonical_key(url.as_str());
        let missing = !scraped.contains(key);
        if missing {
            missing_count += 1;
        } else {
            downloaded_count += 1;
        }
        if (missing || is_class(key, FailureClass::Transient))
            && !is_class(key, FailureClass::Permanent)
            && seen.insert(key)
        {
            rerun_set.push(CanonicalUrl::new(key));
        }
    }
    for key in failed_order.iter().copied() {
        if is_class(key, FailureClass::Transient) && seen.insert(key) {
            rerun_set.push(CanonicalUrl::new(key));
        }
    }

    let total_count = canonical.len();
    let report = ReconcileReport {
        total_count,
        downloaded_count,
        missing_count,
        downloaded_percentage: percentage(downloaded_count, total_count),
        missing_percentage: percentage(missing_count, total_count),
        permanent_failures: classes.values().filter(|c| **c == FailureClass::Permanent).count(),
        transient_failures: classes.values().filter(|c| **c == FailureClass::Transient).count(),
        rerun_set,
    };

    info!("📊 Downloaded URLs: {:.2}%", report.downloaded_percentage);
    info!("📊 Missing URLs: {:.2}%", report.missing_percentage);
    info!(
        "📊 {} downloaded, {} missing, {} permanent and {} transient failures, {} to rerun",
        report.downloaded_count,
        report.missing_count,
        report.permanent_failures,
        report.transient_failures,
        report.rerun_set.len()
    );
    Ok(report)
}

/// Persist the rerun set as a JSON array of URLs
pub fn write_rerun_file(path: &Path, report: &ReconcileReport) -> Result<(), ReconcileError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    write_atomic(path, &serde_json::to_vec_pretty(&report.rerun_set)?)?;
    info!("📝 Rerun set of {} URLs written to {}", report.rerun_set.len(), path.display());
    Ok(())
}
