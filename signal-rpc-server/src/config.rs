use serde::{Deserialize, Serialize};
use signal_data_services::CacheConfig;
use signal_fetcher::{FetcherConfig, LlmConfig};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub llm: LlmConfig,
    pub fetcher: FetcherConfig,
    pub cache: CacheConfig,
    pub handler: HandlerConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7879,
            llm: LlmConfig::default(),
            fetcher: FetcherConfig::default(),
            cache: CacheConfig::default(),
            handler: HandlerConfig::default(),
        }
    }
}

/// Limits and pacing for the stock query methods
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerConfig {
    /// Pause between batches when `stock.search` fetches misses
    pub search_batch_delay_seconds: f64,
    /// Largest symbol list `stock.batch` accepts
    pub max_batch_symbols: usize,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            search_batch_delay_seconds: 2.0,
            max_batch_symbols: 10,
        }
    }
}
