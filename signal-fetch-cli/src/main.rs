use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use signal_core::{BatchReport, Symbol, SymbolUniverse, SystemClock};
use signal_data_services::{CacheConfig, CacheKey, ReportWriter, ResponseCache, SnapshotStore};
use signal_fetcher::{
    BatchConfig, BatchScheduler, CampaignConfig, CampaignLedger, CampaignTick, FetchCampaign,
    FetcherConfig, LlmConfig, LlmGateway, OpenAiBackend, RetryingFetcher,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn, Level};

/// Stock Signal Fetch CLI
///
/// Asks an LLM with live web search for per-symbol trading analysis, in
/// paced batches, and persists reports, snapshots and cached responses.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// API key for the chat completion endpoint
    #[arg(long, env = "MOONSHOT_API_KEY", hide_env_values = true, global = true)]
    api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[arg(long, env = "MOONSHOT_API_BASE", default_value = "https://api.moonshot.cn/v1", global = true)]
    api_base: String,

    /// Model name
    #[arg(long, default_value = "kimi-k2-0711-preview", global = true)]
    model: String,

    /// Seconds between retries of a failed symbol, scaled by attempt
    #[arg(long, default_value = "5.0", global = true)]
    api_delay: f64,

    /// Attempts per symbol
    #[arg(long, default_value = "3", global = true)]
    max_retries: u32,

    /// Directory holding cached responses
    #[arg(long, default_value = "cache", global = true)]
    cache_dir: PathBuf,

    /// Default cache TTL in seconds
    #[arg(long, default_value = "3600", global = true)]
    cache_ttl: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch a list of symbols once and write the batch reports
    Fetch {
        /// Symbols to fetch (comma-separated); defaults to the whole universe
        #[arg(short, long, value_delimiter = ',')]
        symbols: Vec<String>,

        #[arg(short, long, default_value = "3")]
        batch_size: usize,

        /// Seconds to wait between batches
        #[arg(short, long, default_value = "15.0")]
        delay: f64,

        /// Where the full and simple reports are written
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Multi-session fetch over the whole universe
    Campaign {
        /// Holds progress.json and per-symbol snapshots
        #[arg(long, default_value = "auto_data")]
        data_dir: PathBuf,

        #[arg(short, long, default_value = "2")]
        batch_size: usize,

        #[command(subcommand)]
        action: CampaignAction,
    },

    /// Inspect or clear the response cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Write the latest successful snapshot per symbol as signal cards
    ExportSignals {
        #[arg(long, default_value = "auto_data")]
        data_dir: PathBuf,

        #[arg(short, long, default_value = "signals.json")]
        output: PathBuf,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum CampaignAction {
    /// Fetch batches until nothing is pending, waiting between checks
    Run {
        /// Seconds between batches
        #[arg(long, default_value = "180")]
        check_interval: u64,
    },
    /// Fetch the next pending batch and exit
    Once,
    /// Show progress
    Status,
    /// Move failed symbols back to pending
    ResetFailed,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum CacheAction {
    Stats,
    Clear,
    ClearExpired,
}

impl Args {
    /// Parse log level from string
    fn parse_log_level(&self) -> Level {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Level::TRACE,
            "debug" => Level::DEBUG,
            "info" => Level::INFO,
            "warn" => Level::WARN,
            "error" => Level::ERROR,
            _ => Level::INFO,
        }
    }

    fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            dir: self.cache_dir.clone(),
            default_ttl_seconds: self.cache_ttl,
        }
    }

    /// Build the fetch pipeline; needs an API key
    fn scheduler(&self) -> Result<BatchScheduler> {
        let api_key = match &self.api_key {
            Some(key) if !key.trim().is_empty() => key.clone(),
            _ => bail!("No API key: pass --api-key or set MOONSHOT_API_KEY"),
        };

        let llm = LlmConfig {
            api_base: self.api_base.clone(),
            model: self.model.clone(),
            ..Default::default()
        };
        let backend = OpenAiBackend::new(llm, api_key)?;
        let gateway = Arc::new(LlmGateway::new(Arc::new(backend)));
        let fetcher = RetryingFetcher::new(
            gateway,
            FetcherConfig {
                api_delay_seconds: self.api_delay,
                max_retries: self.max_retries,
            },
        );

        Ok(BatchScheduler::new(Arc::new(fetcher)))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(args.parse_log_level())
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    let universe = SymbolUniverse::default();

    match &args.command {
        Command::Fetch {
            symbols,
            batch_size,
            delay,
            output_dir,
        } => {
            let symbols = if symbols.is_empty() {
                universe.symbols().to_vec()
            } else {
                universe.resolve_all(symbols)?
            };
            let config = BatchConfig {
                batch_size: *batch_size,
                inter_batch_delay_seconds: *delay,
            };
            fetch(&args, &universe, &symbols, &config, output_dir).await
        }
        Command::Campaign {
            data_dir,
            batch_size,
            action,
        } => campaign(&args, universe, data_dir, *batch_size, *action).await,
        Command::Cache { action } => cache(&args, *action),
        Command::ExportSignals { data_dir, output } => export_signals(data_dir, output),
    }
}

async fn fetch(
    args: &Args,
    universe: &SymbolUniverse,
    symbols: &[Symbol],
    config: &BatchConfig,
    output_dir: &Path,
) -> Result<()> {
    info!("🚀 Stock Signal Fetch");
    info!("=====================");
    info!("Configuration:");
    info!("  Symbols: {}", symbols.len());
    info!("  Batch size: {}", config.batch_size);
    info!("  Inter-batch delay: {}s", config.inter_batch_delay_seconds);
    info!("  Model: {}", args.model);
    info!("");

    let scheduler = args.scheduler()?;
    let cache = ResponseCache::new(args.cache_config())?;

    let report = scheduler.run(symbols, config).await?;

    for record in report.successful_records() {
        if let Ok(symbol) = universe.resolve(&record.symbol) {
            let value = serde_json::to_value(record)?;
            cache.set(&CacheKey::symbol(&symbol), &value, None);
        }
    }

    let (full, simple) = ReportWriter::new(output_dir)?.save(&report)?;

    info!("");
    info!("✅ Fetch Complete!");
    info!("==================");
    info!("  Success rate: {}%", report.success_rate);
    info!("  Report: {}", full.display());
    info!("  Simple report: {}", simple.display());
    print_market_summary(&report);

    Ok(())
}

fn print_market_summary(report: &BatchReport) {
    let Some(summary) = report.market_summary(3) else {
        warn!("No successful records to summarise");
        return;
    };

    info!("");
    info!("Market summary:");
    info!("  Average change: {:.2}%", summary.average_change);
    info!("  Gainers: {}  Losers: {}", summary.gainers_count, summary.losers_count);
    for record in &summary.top_gainers {
        info!("  ▲ {} {:+.2}%", record.symbol, record.change().unwrap_or_default());
    }
    for record in &summary.top_losers {
        info!("  ▼ {} {:+.2}%", record.symbol, record.change().unwrap_or_default());
    }
}

async fn campaign(
    args: &Args,
    universe: SymbolUniverse,
    data_dir: &Path,
    batch_size: usize,
    action: CampaignAction,
) -> Result<()> {
    let mut config = CampaignConfig {
        data_dir: data_dir.to_path_buf(),
        batch_size,
        ..Default::default()
    };

    match action {
        CampaignAction::Status => {
            let ledger = CampaignLedger::new(universe, data_dir, Arc::new(SystemClock))?;
            println!("{}", serde_json::to_string_pretty(&ledger.status())?);
        }
        CampaignAction::ResetFailed => {
            let ledger = CampaignLedger::new(universe, data_dir, Arc::new(SystemClock))?;
            let count = ledger.reset_failed()?;
            info!("Moved {} failed symbols back to pending", count);
        }
        CampaignAction::Once => {
            let campaign = FetchCampaign::new(universe, args.scheduler()?, config)?;
            match campaign.fetch_next_batch(campaign.config().batch_size).await? {
                CampaignTick::Completed => info!("✅ Nothing pending, campaign complete"),
                CampaignTick::Batch { report, remaining } => {
                    info!(
                        "Batch done: {} ok, {} failed, {} remaining",
                        report.successful_count, report.failed_count, remaining
                    );
                }
            }
        }
        CampaignAction::Run { check_interval } => {
            config.check_interval_seconds = check_interval;
            let campaign = FetchCampaign::new(universe, args.scheduler()?, config)?;
            let config = campaign.config();
            info!(
                "🚀 Campaign started, batch size {}, checking every {}s",
                config.batch_size, config.check_interval_seconds
            );
            tokio::select! {
                batches = campaign.run_continuous(config.batch_size, config.check_interval()) => {
                    info!("✅ Campaign complete after {} batches", batches?);
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted; progress is saved after every batch");
                }
            }
        }
    }

    Ok(())
}

fn cache(args: &Args, action: CacheAction) -> Result<()> {
    let cache = ResponseCache::new(args.cache_config())?;

    match action {
        CacheAction::Stats => {
            println!("{}", serde_json::to_string_pretty(&cache.stats())?);
        }
        CacheAction::Clear => {
            if !cache.clear_all() {
                bail!("Failed to clear cache at {}", cache.dir().display());
            }
            info!("Cache cleared");
        }
        CacheAction::ClearExpired => {
            info!("Removed {} expired entries", cache.clear_expired());
        }
    }

    Ok(())
}

fn export_signals(data_dir: &Path, output: &Path) -> Result<()> {
    let cards = SnapshotStore::new(data_dir)?.load_signal_cards()?;
    let json = serde_json::to_string_pretty(&cards)?;
    std::fs::write(output, json)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    info!("Exported {} signals to {}", cards.len(), output.display());
    Ok(())
}
