//! Crawl use cases
//!
//! Wires configuration into the engine components and exposes the one-shot jobs
//! the CLI and the control surface trigger: harvest, run, reconcile, consolidate.

#![allow(clippy::uninlined_format_args)]

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

use crate::application::consolidate::{self, ConsolidationSummary};
use crate::crawling::limiter::ConcurrencyLimiter;
use crate::crawling::orchestrator::{BatchOrchestrator, RunSettings, RunStats, load_url_list};
use crate::crawling::reconciler::{self, ReconcileReport};
use crate::crawling::validator::RecordValidator;
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::error_ledger;
use crate::infrastructure::http_client::{PageFetcher, ProxyTransport, browser_headers, build_client};
use crate::infrastructure::parsing::{FieldExtractor, ListingPageParser};
use crate::infrastructure::retry_policy::RetryPolicy;
use crate::infrastructure::sitemap::{HarvestSummary, SitemapHarvester};

pub struct CrawlUseCases {
    config: AppConfig,
}

impl CrawlUseCases {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn extractor(&self) -> Result<ListingPageParser> {
        ListingPageParser::new(&self.config.sitemap.base_url).context("Failed to build the listing page parser")
    }

    /// Engine wired with the proxy transport and the listing page parser
    pub fn build_orchestrator(&self) -> Result<BatchOrchestrator> {
        let transport = ProxyTransport::new(&self.config.proxy, &self.config.crawl)?;
        let fetcher = PageFetcher::new(Arc::new(transport), RetryPolicy::from_config(&self.config.crawl));
        let extractor: Arc<dyn FieldExtractor> = Arc::new(self.extractor()?);

        Ok(BatchOrchestrator::new(
            Arc::new(fetcher),
            extractor,
            RecordValidator::new(&self.config.validation),
            ConcurrencyLimiter::new(self.config.crawl.rate_limit),
            RunSettings::from_config(&self.config),
        ))
    }

    pub async fn run_crawl(&self) -> Result<RunStats> {
        let orchestrator = self.build_orchestrator()?;
        let stats = orchestrator.run().await.context("Crawl run failed")?;
        Ok(stats)
    }

    /// Reconcile the URL list against shards and the error log, then write the rerun file
    pub fn reconcile(&self) -> Result<ReconcileReport> {
        let paths = &self.config.paths;
        let urls = load_url_list(&paths.url_list)?;
        let ledger = error_ledger::load(&paths.error_log)
            .with_context(|| format!("Failed to read error log {:?}", paths.error_log))?;

        let report = reconciler::reconcile(&urls, &paths.output_dir, &paths.shard_prefix, &ledger)?;
        reconciler::write_rerun_file(&paths.rerun_file, &report)?;
        Ok(report)
    }

    pub async fn harvest_sitemaps(&self) -> Result<HarvestSummary> {
        let headers = browser_headers(&self.config.crawl.user_agent)?;
        let client = build_client(&headers, self.config.crawl.request_timeout(), None)?;
        let harvester = SitemapHarvester::new(client, self.config.sitemap.clone(), &self.config.paths.sitemap_dir);
        let summary = harvester.harvest(&self.config.paths.url_list).await?;
        info!("✅ Harvested {} URLs from {} sitemaps", summary.unique_urls, summary.sitemaps);
        Ok(summary)
    }

    pub fn consolidate(&self) -> Result<ConsolidationSummary> {
        let schema = ListingPageParser::declared_schema();
        let summary = consolidate::consolidate(&self.config.paths, &schema)?;
        consolidate::archive_json_shards(&self.config.paths)?;
        Ok(summary)
    }
}
