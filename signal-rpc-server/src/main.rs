use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use signal_data_services::CacheConfig;
use signal_fetcher::{FetcherConfig, LlmConfig};
use signal_rpc_server::{HandlerConfig, RpcServer, ServerConfig};

#[derive(Parser)]
#[command(name = "signal-rpc-server")]
#[command(about = "JSON-RPC server for cached LLM stock signals")]
struct Cli {
    /// Server host to bind to
    #[arg(long, default_value = "0.0.0.0")]
    host: String,

    /// Server port to bind to
    #[arg(long, default_value = "7879")]
    port: u16,

    /// API key for the chat completion endpoint
    #[arg(long, env = "MOONSHOT_API_KEY", hide_env_values = true)]
    api_key: String,

    /// Base URL of the OpenAI-compatible endpoint
    #[arg(long, env = "MOONSHOT_API_BASE", default_value = "https://api.moonshot.cn/v1")]
    api_base: String,

    /// Model name
    #[arg(long, default_value = "kimi-k2-0711-preview")]
    model: String,

    /// Directory holding cached responses
    #[arg(long, default_value = "cache")]
    cache_dir: PathBuf,

    /// Default cache TTL in seconds
    #[arg(long, default_value = "3600")]
    cache_ttl: u64,

    /// Seconds between retries of a failed symbol, scaled by attempt
    #[arg(long, default_value = "5.0")]
    api_delay: f64,

    /// Attempts per symbol
    #[arg(long, default_value = "3")]
    max_retries: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "signal_rpc_server={},signal_fetcher={},signal_data_services={}",
                cli.log_level, cli.log_level, cli.log_level
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("🚀 Stock JSON-RPC Server Starting");
    tracing::info!("Configuration:");
    tracing::info!("  Host: {}", cli.host);
    tracing::info!("  Port: {}", cli.port);
    tracing::info!("  API base: {}", cli.api_base);
    tracing::info!("  Model: {}", cli.model);
    tracing::info!("  Cache dir: {}", cli.cache_dir.display());
    tracing::info!("  Cache TTL: {}s", cli.cache_ttl);

    let config = ServerConfig {
        host: cli.host,
        port: cli.port,
        llm: LlmConfig {
            api_base: cli.api_base,
            model: cli.model,
            ..Default::default()
        },
        fetcher: FetcherConfig {
            api_delay_seconds: cli.api_delay,
            max_retries: cli.max_retries,
        },
        cache: CacheConfig {
            dir: cli.cache_dir,
            default_ttl_seconds: cli.cache_ttl,
        },
        handler: HandlerConfig::default(),
    };

    let server = RpcServer::new(config, cli.api_key)?;
    server.run().await?;

    Ok(())
}
