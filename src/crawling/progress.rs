//! Run progress accounting
//!
//! Remaining time is a linear extrapolation:
//! `remaining = elapsed / processed * total - elapsed`, floored at zero.
//! Elapsed time is measured from the tracker's wall-clock start, the same
//! instant the run reports as its start.

#![allow(clippy::cast_precision_loss)]

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use tracing::info;

/// Point-in-time progress figures
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSnapshot {
    pub processed: u64,
    pub total: u64,
    pub percent: f64,
    pub elapsed: Duration,
    pub remaining: Duration,
}

impl ProgressSnapshot {
    pub fn summary(&self) -> String {
        format!(
            "Processed {}/{} URLs ({:.2}%). Elapsed: {}. Estimated remaining: {}",
            self.processed,
            self.total,
            self.percent,
            format_duration(self.elapsed),
            format_duration(self.remaining)
        )
    }
}

#[derive(Debug, Clone)]
pub struct ProgressTracker {
    started_at: DateTime<Utc>,
    total: u64,
    processed: u64,
    interval: u64,
}

impl ProgressTracker {
    /// `total` is the number of URLs this run will attempt
    pub fn new(total: u64, interval: u64) -> Self {
        Self::starting_at(Utc::now(), total, interval)
    }

    pub fn starting_at(started_at: DateTime<Utc>, total: u64, interval: u64) -> Self {
        Self {
            started_at,
            total,
            processed: 0,
            interval: interval.max(1),
        }
    }

    pub const fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Time since start; zero if the clock moved backwards
    pub fn elapsed(&self) -> Duration {
        (Utc::now() - self.started_at).to_std().unwrap_or_default()
    }

    pub const fn processed(&self) -> u64 {
        self.processed
    }

    /// Count one finished unit; logs every `interval` units
    pub fn record_unit(&mut self) {
        self.processed += 1;
        if self.processed % self.interval == 0 {
            info!("📊 {}", self.snapshot().summary());
        }
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.snapshot_at(self.elapsed())
    }

    pub fn snapshot_at(&self, elapsed: Duration) -> ProgressSnapshot {
        let percent = if self.total == 0 {
            100.0
        } else {
            self.processed as f64 / self.total as f64 * 100.0
        };
        ProgressSnapshot {
            processed: self.processed,
            total: self.total,
            percent,
            elapsed,
            remaining: estimate_remaining(elapsed, self.processed, self.total),
        }
    }
}

/// Linear extrapolation of the time left; zero before the first unit finishes
pub fn estimate_remaining(elapsed: Duration, processed: u64, total: u64) -> Duration {
    if processed == 0 || processed >= total {
        return Duration::ZERO;
    }
    let estimated_total = elapsed.as_secs_f64() / processed as f64 * total as f64;
    let remaining = estimated_total - elapsed.as_secs_f64();
    if remaining.is_finite() && remaining > 0.0 {
        Duration::from_secs_f64(remaining)
    } else {
        Duration::ZERO
    }
}

/// `"Xh Ym Zs"`
pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
}
