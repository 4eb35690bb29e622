//! listing-harvester command line

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

use listing_harvester::application::crawl_use_cases::CrawlUseCases;
use listing_harvester::control::{self, AppState};
use listing_harvester::infrastructure::config::{AppConfig, ConfigManager};
use listing_harvester::infrastructure::logging::{init_logging_with_config, log_file_path};

#[derive(Parser, Debug)]
#[command(name = "listing-harvester", version, about = "Resumable, proxy-routed listing page crawler")]
struct Cli {
    /// Configuration file (JSON)
    #[arg(long, global = true, env = "HARVEST_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Download the sitemaps and write the canonical URL list
    Harvest,
    /// Crawl the URL list, resuming from the checkpoint
    Run {
        /// URL list to crawl instead of the configured one
        #[arg(long)]
        urls: Option<PathBuf>,
        /// Checkpoint file to resume from
        #[arg(long)]
        checkpoint: Option<PathBuf>,
    },
    /// Report downloaded and missing URLs and write the rerun list
    Reconcile {
        #[arg(long)]
        urls: Option<PathBuf>,
    },
    /// Merge all shards into all.csv, all_two_columns.csv and the zip archives
    Consolidate,
    /// Start the HTTP control surface
    Serve {
        #[arg(long)]
        port: Option<u16>,
    },
    /// Configuration helpers
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write the default configuration
    Init { path: Option<PathBuf> },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    if let Command::Config {
        action: ConfigCommand::Init { path },
    } = &cli.command
    {
        let manager = ConfigManager::new(path.clone().or_else(|| cli.config.clone()));
        manager.save_config(&AppConfig::default()).await?;
        println!("Wrote default configuration to {}", manager.config_path().display());
        return Ok(());
    }

    let mut config = ConfigManager::new(cli.config.clone())
        .load_config()
        .context("Failed to load configuration")?;
    init_logging_with_config(&config.logging)?;

    match cli.command {
        Command::Harvest => {
            let summary = CrawlUseCases::new(config).harvest_sitemaps().await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Run { urls, checkpoint } => {
            if let Some(urls) = urls {
                config.paths.url_list = urls;
            }
            if checkpoint.is_some() {
                config.paths.checkpoint_file = checkpoint;
            }
            let stats = CrawlUseCases::new(config).run_crawl().await?;
            info!(
                "✅ Processed {} URLs, {} accepted, {} errors",
                stats.processed,
                stats.accepted,
                stats.errors.len()
            );
        }
        Command::Reconcile { urls } => {
            if let Some(urls) = urls {
                config.paths.url_list = urls;
            }
            let report = CrawlUseCases::new(config).reconcile()?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Consolidate => {
            let summary = CrawlUseCases::new(config).consolidate()?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        Command::Serve { port } => {
            let port = port.unwrap_or(config.server.port);
            let bind_address = config.server.bind_address.clone();
            let log_file = log_file_path(&config.logging);
            let state = AppState::new(Arc::new(CrawlUseCases::new(config)), log_file);
            control::serve(state, &bind_address, port).await?;
        }
        Command::Config { .. } => {}
    }
    Ok(())
}
