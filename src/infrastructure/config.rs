//! Configuration infrastructure
//!
//! Layered loading with the `config` crate:
//! 1. Built-in defaults (`defaults` module)
//! 2. Optional JSON config file
//! 3. `HARVEST__<SECTION>__<KEY>` environment variables
//! 4. Legacy proxy variables (`PROXY_HOST`, `PROXY_USER`, `PROXY_PASS`)

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::derivable_impls)]

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};

use crate::domain::UrlNormalizer;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Configuration I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub proxy: ProxyConfig,
    pub crawl: CrawlConfig,
    pub paths: PathsConfig,
    pub validation: ValidationConfig,
    pub sitemap: SitemapConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

/// Rotating proxy gateway settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    pub enabled: bool,
    pub scheme: String,
    pub host: String,
    /// Inclusive port range of equivalent gateway nodes
    pub port_min: u16,
    pub port_max: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Crawl engine tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Max concurrently in-flight fetch+extract+validate units
    pub rate_limit: usize,
    pub batch_size: usize,
    /// Shard capacity
    pub records_per_file: usize,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub request_timeout_secs: u64,
    /// Request pacing quota; 0 disables pacing
    pub requests_per_second: u32,
    pub progress_interval: u64,
    pub user_agent: String,
}

/// Input and output locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    pub url_list: PathBuf,
    pub output_dir: PathBuf,
    /// Tabular shard directory, `output_dir` when unset
    pub csv_dir: Option<PathBuf>,
    pub shard_prefix: String,
    /// Override for the checkpoint location, `<output_dir>/last_processed_info.json` when unset
    pub checkpoint_file: Option<PathBuf>,
    pub error_log: PathBuf,
    pub rerun_file: PathBuf,
    pub sitemap_dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    pub field: String,
    pub message: String,
}

impl FieldRule {
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

/// Record acceptance policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub required: Vec<FieldRule>,
    /// Checked for URL syntax only when present
    pub url_fields: Vec<FieldRule>,
}

/// Sitemap discovery and URL normalization rules
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SitemapConfig {
    pub base_url: String,
    /// `{base}` and `{index}` are substituted
    pub index_template: String,
    pub max_indices: u32,
    pub strip_suffixes: Vec<String>,
    /// Paths relative to `base_url`; an empty path excludes the base itself
    pub excluded_paths: Vec<String>,
    pub excluded_fragments: Vec<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// JSON lines in the log file (read back by the log viewer)
    pub json_format: bool,

    pub console_output: bool,

    pub file_output: bool,

    pub log_dir: PathBuf,

    pub file_name: String,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Delete rotated files beyond `max_files` on startup
    pub auto_cleanup_logs: bool,

    /// Module-specific log level filters (e.g., "reqwest": "warn")
    pub module_filters: HashMap<String, String>,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            enabled: defaults::PROXY_ENABLED,
            scheme: defaults::PROXY_SCHEME.to_string(),
            host: String::new(),
            port_min: defaults::PROXY_PORT_MIN,
            port_max: defaults::PROXY_PORT_MAX,
            username: None,
            password: None,
        }
    }
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            rate_limit: defaults::RATE_LIMIT,
            batch_size: defaults::BATCH_SIZE,
            records_per_file: defaults::RECORDS_PER_FILE,
            max_retries: defaults::MAX_RETRIES,
            retry_base_delay_ms: defaults::RETRY_BASE_DELAY_MS,
            request_timeout_secs: defaults::REQUEST_TIMEOUT_SECONDS,
            requests_per_second: defaults::REQUESTS_PER_SECOND,
            progress_interval: defaults::PROGRESS_INTERVAL,
            user_agent: defaults::USER_AGENT.to_string(),
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            url_list: PathBuf::from(defaults::URL_LIST_PATH),
            output_dir: PathBuf::from(defaults::OUTPUT_DIR),
            csv_dir: None,
            shard_prefix: defaults::SHARD_PREFIX.to_string(),
            checkpoint_file: None,
            error_log: PathBuf::from(defaults::ERROR_LOG_PATH),
            rerun_file: PathBuf::from(defaults::RERUN_FILE_PATH),
            sitemap_dir: PathBuf::from(defaults::SITEMAP_DIR),
        }
    }
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            required: vec![
                FieldRule::new("Website", "Website URL is missing"),
                FieldRule::new("CompanyDescription", "Company description is missing"),
                FieldRule::new("AlternativesPageURL", "Alternatives page URL is missing"),
                FieldRule::new("StatusPageURL", "Status page URL is missing"),
            ],
            url_fields: vec![FieldRule::new("Website", "Website URL is not valid")],
        }
    }
}

impl Default for SitemapConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::SITE_BASE_URL.to_string(),
            index_template: defaults::SITEMAP_INDEX_TEMPLATE.to_string(),
            max_indices: defaults::SITEMAP_MAX_INDICES,
            strip_suffixes: vec!["-alternatives".into(), "-status".into()],
            excluded_paths: vec![String::new(), "/status-pages".into()],
            excluded_fragments: vec![
                vec!["best-".into(), "-software".into()],
                vec!["sitemap/".into()],
            ],
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: defaults::SERVER_BIND_ADDRESS.to_string(),
            port: defaults::SERVER_PORT,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            log_dir: PathBuf::from(defaults::LOG_DIR),
            file_name: defaults::LOG_FILE_NAME.to_string(),
            max_files: defaults::LOG_MAX_FILES,
            auto_cleanup_logs: defaults::LOG_AUTO_CLEANUP,
            module_filters: {
                let mut filters = HashMap::new();
                filters.insert("reqwest".to_string(), "warn".to_string());
                filters.insert("hyper".to_string(), "warn".to_string());
                filters.insert("h2".to_string(), "warn".to_string());
                filters.insert("html5ever".to_string(), "error".to_string());
                filters
            },
        }
    }
}

impl CrawlConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

impl PathsConfig {
    pub fn csv_dir(&self) -> &Path {
        self.csv_dir.as_deref().unwrap_or(&self.output_dir)
    }

    pub fn checkpoint_path(&self) -> PathBuf {
        self.checkpoint_file
            .clone()
            .unwrap_or_else(|| self.output_dir.join(defaults::CHECKPOINT_FILE_NAME))
    }
}

impl SitemapConfig {
    pub fn index_url(&self, index: u32) -> String {
        self.index_template
            .replace("{base}", self.base_url.trim_end_matches('/'))
            .replace("{index}", &index.to_string())
    }

    pub fn normalizer(&self) -> UrlNormalizer {
        let base = self.base_url.trim_end_matches('/');
        UrlNormalizer::new(
            self.strip_suffixes.clone(),
            self.excluded_paths.iter().map(|path| format!("{base}{path}")),
            self.excluded_fragments.clone(),
        )
    }
}

impl AppConfig {
    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        let crawl = &self.crawl;
        if crawl.rate_limit == 0 {
            return Err(ConfigError::Invalid("crawl.rate_limit must be at least 1".into()));
        }
        if crawl.batch_size == 0 {
            return Err(ConfigError::Invalid("crawl.batch_size must be at least 1".into()));
        }
        if crawl.records_per_file == 0 {
            return Err(ConfigError::Invalid("crawl.records_per_file must be at least 1".into()));
        }
        if crawl.max_retries == 0 {
            return Err(ConfigError::Invalid("crawl.max_retries must be at least 1".into()));
        }
        if self.proxy.port_min > self.proxy.port_max {
            return Err(ConfigError::Invalid(format!(
                "proxy.port_min ({}) is greater than proxy.port_max ({})",
                self.proxy.port_min, self.proxy.port_max
            )));
        }
        if self.proxy.enabled && self.proxy.host.trim().is_empty() {
            return Err(ConfigError::Invalid("proxy.enabled requires proxy.host".into()));
        }
        if self.paths.shard_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("paths.shard_prefix must not be empty".into()));
        }
        Ok(())
    }

    /// Apply the legacy `PROXY_*` variables on top of the layered configuration
    pub fn apply_proxy_env<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in vars {
            let value = value.into();
            match key.as_ref() {
                "PROXY_HOST" => {
                    self.proxy.host = value;
                    self.proxy.enabled = true;
                }
                "PROXY_USER" => self.proxy.username = Some(value),
                "PROXY_PASS" => self.proxy.password = Some(value),
                _ => {}
            }
        }
    }
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    pub config_path: PathBuf,
}

impl ConfigManager {
    /// Get the per-user configuration directory
    pub fn get_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(defaults::APP_DIR_NAME))
    }

    /// Resolve the config file: explicit path, `./harvester.json`, then the user config dir
    pub fn new(explicit: Option<PathBuf>) -> Self {
        let config_path = explicit.unwrap_or_else(|| {
            let local = PathBuf::from(defaults::CONFIG_FILE_NAME);
            if local.exists() {
                return local;
            }
            Self::get_config_dir()
                .map(|dir| dir.join(defaults::CONFIG_FILE_NAME))
                .unwrap_or(local)
        });
        Self { config_path }
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Load the layered configuration; a missing file means defaults.
    pub fn load_config(&self) -> Result<AppConfig, ConfigError> {
        let builder = config::Config::builder()
            .add_source(
                config::File::from(self.config_path.as_path())
                    .format(config::FileFormat::Json)
                    .required(false),
            )
            .add_source(
                config::Environment::with_prefix(defaults::ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            );

        let mut app_config: AppConfig = builder.build()?.try_deserialize()?;
        app_config.apply_proxy_env(std::env::vars());
        app_config.validate()?;

        if self.config_path.exists() {
            info!("Loaded configuration from: {:?}", self.config_path);
        } else {
            warn!("Configuration file not found, using defaults: {:?}", self.config_path);
        }
        Ok(app_config)
    }

    /// Save configuration to file
    pub async fn save_config(&self, app_config: &AppConfig) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let content = serde_json::to_string_pretty(app_config)?;
        fs::write(&self.config_path, content).await?;

        info!("Saved configuration to: {:?}", self.config_path);
        Ok(())
    }
}

/// Default configuration values
pub mod defaults {
    pub const APP_DIR_NAME: &str = "listing-harvester";
    pub const CONFIG_FILE_NAME: &str = "harvester.json";
    pub const ENV_PREFIX: &str = "HARVEST";

    pub const PROXY_ENABLED: bool = false;
    pub const PROXY_SCHEME: &str = "http";
    pub const PROXY_PORT_MIN: u16 = 9000;
    pub const PROXY_PORT_MAX: u16 = 9010;

    /// Concurrent units per run
    pub const RATE_LIMIT: usize = 30;
    pub const BATCH_SIZE: usize = 100;
    pub const RECORDS_PER_FILE: usize = 100;
    pub const MAX_RETRIES: u32 = 3;
    pub const RETRY_BASE_DELAY_MS: u64 = 10;
    pub const REQUEST_TIMEOUT_SECONDS: u64 = 10;
    pub const REQUESTS_PER_SECOND: u32 = 0;
    pub const PROGRESS_INTERVAL: u64 = 100;
    pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/128.0.0.0 Safari/537.36";

    pub const URL_LIST_PATH: &str = "sitemap_urls/all_urls.json";
    pub const OUTPUT_DIR: &str = "scraping_results";
    pub const SHARD_PREFIX: &str = "saas_data";
    pub const CHECKPOINT_FILE_NAME: &str = "last_processed_info.json";
    pub const ERROR_LOG_PATH: &str = "error_log.json";
    pub const RERUN_FILE_PATH: &str = "sitemap_urls/rerun_urls.json";
    pub const SITEMAP_DIR: &str = "sitemap_data";

    pub const SITE_BASE_URL: &str = "https://www.saashub.com";
    pub const SITEMAP_INDEX_TEMPLATE: &str = "{base}/sitemaps/sitemap{index}.xml.gz";
    pub const SITEMAP_MAX_INDICES: u32 = 500;

    pub const SERVER_BIND_ADDRESS: &str = "0.0.0.0";
    pub const SERVER_PORT: u16 = 8080;

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_JSON_FORMAT: bool = true;
    pub const LOG_CONSOLE_OUTPUT: bool = true;
    pub const LOG_FILE_OUTPUT: bool = true;
    pub const LOG_DIR: &str = "logs";
    pub const LOG_FILE_NAME: &str = "scraper.log";
    pub const LOG_MAX_FILES: u32 = 5;
    pub const LOG_AUTO_CLEANUP: bool = true;
}
