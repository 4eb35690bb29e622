//! Logging system configuration and initialization
//!
//! This module provides the logging setup shared by the CLI and the control server:
//! - Console output for operators
//! - File output through a non-blocking appender, JSON lines by default so the
//!   log viewer can parse it back
//! - Previous log file rotated to a timestamped name on startup
//! - `RUST_LOG` overrides the configured level and module filters

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result, anyhow};
use chrono::Local;
use once_cell::sync::Lazy;
use std::path::Path;
use std::sync::Mutex;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{
    EnvFilter, Layer, Registry,
    fmt::{self, time::FormatTime},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

pub use crate::infrastructure::config::LoggingConfig;

// Keeps the file writer alive for the lifetime of the process
static LOG_GUARDS: Lazy<Mutex<Vec<WorkerGuard>>> = Lazy::new(|| Mutex::new(Vec::new()));

/// Local wall-clock timestamps with milliseconds
struct LocalTimeFormatter;

impl FormatTime for LocalTimeFormatter {
    fn format_time(&self, w: &mut fmt::format::Writer<'_>) -> std::fmt::Result {
        write!(w, "{}", Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z"))
    }
}

/// Initialize the logging system with default configuration
pub fn init_logging() -> Result<()> {
    init_logging_with_config(&LoggingConfig::default())
}

/// Build the filter: `RUST_LOG` wins, otherwise the level plus module directives.
fn build_env_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }

    let mut filter = EnvFilter::try_new(&config.level)
        .map_err(|e| anyhow!("Invalid log level '{}': {}", config.level, e))?;

    if !config.level.to_lowercase().contains("trace") {
        for (module, level) in &config.module_filters {
            let directive = format!("{}={}", module, level)
                .parse()
                .map_err(|e| anyhow!("Invalid module filter {}={}: {}", module, level, e))?;
            filter = filter.add_directive(directive);
        }
    }
    Ok(filter)
}

/// Initialize logging with custom configuration
///
/// A second call in the same process is a no-op.
pub fn init_logging_with_config(config: &LoggingConfig) -> Result<()> {
    if !config.file_output && !config.console_output {
        return Err(anyhow!("No logging output configured"));
    }
    if tracing::dispatcher::has_been_set() {
        return Ok(());
    }

    let env_filter = build_env_filter(config)?;

    let file_layer = if config.file_output {
        std::fs::create_dir_all(&config.log_dir)
            .with_context(|| format!("Failed to create log directory {:?}", config.log_dir))?;
        rotate_existing_log_file(&config.log_dir, &config.file_name)?;
        if config.auto_cleanup_logs {
            cleanup_old_logs(&config.log_dir, &config.file_name, config.max_files)?;
        }

        let file_appender = rolling::never(&config.log_dir, &config.file_name);
        let (file_writer, file_guard) = non_blocking(file_appender);
        LOG_GUARDS
            .lock()
            .map_err(|_| anyhow!("Log guard registry poisoned"))?
            .push(file_guard);

        let layer = fmt::Layer::new()
            .with_writer(file_writer)
            .with_timer(LocalTimeFormatter)
            .with_ansi(false);
        Some(if config.json_format {
            layer.json().with_target(true).boxed()
        } else {
            layer.with_target(false).boxed()
        })
    } else {
        None
    };

    let console_layer = config.console_output.then(|| {
        fmt::Layer::new()
            .with_writer(std::io::stdout)
            .with_timer(LocalTimeFormatter)
            .with_target(false)
    });

    let initialized = Registry::default()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init();

    if initialized.is_err() {
        // Already initialized by an earlier call
        return Ok(());
    }

    info!("📝 Logging system initialized");
    info!("Log level: {}", config.level);
    if config.file_output {
        info!("Log file: {:?}", log_file_path(config));
    }
    Ok(())
}

/// Path of the active log file
pub fn log_file_path(config: &LoggingConfig) -> std::path::PathBuf {
    config.log_dir.join(&config.file_name)
}

/// Rotate existing log file by renaming it with its modification timestamp
fn rotate_existing_log_file(log_dir: &Path, log_file_name: &str) -> Result<()> {
    let log_file_path = log_dir.join(log_file_name);
    if !log_file_path.exists() {
        return Ok(());
    }

    let metadata = std::fs::metadata(&log_file_path)
        .with_context(|| format!("Failed to get log file metadata: {:?}", log_file_path))?;
    let file_time = metadata
        .modified()
        .unwrap_or_else(|_| std::time::SystemTime::now());
    let datetime: chrono::DateTime<Local> = file_time.into();

    let (stem, extension) = split_file_name(log_file_name);
    let timestamped_name = format!("{}.{}.{}", stem, datetime.format("%Y%m%dT%H%M%S"), extension);
    let timestamped_path = log_dir.join(&timestamped_name);

    std::fs::rename(&log_file_path, &timestamped_path).with_context(|| {
        format!(
            "Failed to rotate log file {} to {}",
            log_file_path.display(),
            timestamped_path.display()
        )
    })?;
    Ok(())
}

fn split_file_name(file_name: &str) -> (&str, &str) {
    file_name.rsplit_once('.').unwrap_or((file_name, "log"))
}

/// Delete rotated log files beyond `max_files`, newest kept
fn cleanup_old_logs(log_dir: &Path, log_file_name: &str, max_files: u32) -> Result<usize> {
    if !log_dir.exists() {
        return Ok(0);
    }

    let (stem, _) = split_file_name(log_file_name);
    let rotated_prefix = format!("{}.", stem);
    let mut log_files = Vec::new();

    for entry in std::fs::read_dir(log_dir)? {
        let entry = entry?;
        let path = entry.path();
        let Some(filename) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if path.is_file() && filename.starts_with(&rotated_prefix) && filename != log_file_name {
            if let Ok(modified) = entry.metadata().and_then(|m| m.modified()) {
                log_files.push((path, modified));
            }
        }
    }

    // Newest first
    log_files.sort_by(|a, b| b.1.cmp(&a.1));

    let mut removed = 0;
    for (path, _) in log_files.iter().skip(max_files as usize) {
        if let Err(e) = std::fs::remove_file(path) {
            warn!("Failed to remove old log file {:?}: {}", path, e);
        } else {
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_logging_config_default() {
        let config = LoggingConfig::default();
        assert!(!config.level.is_empty());
        assert!(config.console_output);
        assert!(config.file_output);
        assert!(config.json_format);
    }

    #[test]
    fn no_outputs_is_an_error() {
        let config = LoggingConfig {
            console_output: false,
            file_output: false,
            ..LoggingConfig::default()
        };
        assert!(init_logging_with_config(&config).is_err());
    }

    #[test]
    fn rotation_renames_existing_file() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("scraper.log"), "{}\n").unwrap();

        rotate_existing_log_file(dir.path(), "scraper.log").unwrap();

        assert!(!dir.path().join("scraper.log").exists());
        let rotated: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(rotated.len(), 1);
        assert!(rotated[0].starts_with("scraper.") && rotated[0].ends_with(".log"));
    }

    #[test]
    fn cleanup_keeps_newest_rotated_files() {
        let dir = TempDir::new().unwrap();
        for i in 0..4 {
            std::fs::write(dir.path().join(format!("scraper.2024010{}T000000.log", i)), "x").unwrap();
        }
        std::fs::write(dir.path().join("scraper.log"), "current").unwrap();
        std::fs::write(dir.path().join("other.log"), "x").unwrap();

        let removed = cleanup_old_logs(dir.path(), "scraper.log", 2).unwrap();

        assert_eq!(removed, 2);
        assert!(dir.path().join("scraper.log").exists());
        assert!(dir.path().join("other.log").exists());
    }
}
