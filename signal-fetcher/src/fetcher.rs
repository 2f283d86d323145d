use serde::{Deserialize, Serialize};
use signal_core::{normalize_analysis, Clock, RawAnalysis, StockRecord, Symbol, SystemClock};
use std::sync::Arc;

use crate::llm::{prompts, FetchMetrics, LlmGateway, MetricsTimer};
use crate::pacing::{seconds, Pacer, TokioPacer};

/// Configuration for per-symbol retries
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// Base backoff; attempt `i` waits `api_delay_seconds × (i + 1)`
    pub api_delay_seconds: f64,

    /// Total attempts per symbol. 0 is treated as 1.
    pub max_retries: u32,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            api_delay_seconds: 5.0,
            max_retries: 3,
        }
    }
}

/// Fetches one symbol's analysis with bounded retries and linear backoff
pub struct RetryingFetcher {
    gateway: Arc<LlmGateway>,
    pacer: Arc<dyn Pacer>,
    clock: Arc<dyn Clock>,
    config: FetcherConfig,
}

impl RetryingFetcher {
    pub fn new(gateway: Arc<LlmGateway>, config: FetcherConfig) -> Self {
        tracing::info!(
            "Initializing fetcher: backend={}, api_delay={}s, max_retries={}",
            gateway.backend_name(),
            config.api_delay_seconds,
            config.max_retries
        );

        Self {
            gateway,
            pacer: Arc::new(TokioPacer),
            clock: Arc::new(SystemClock),
            config,
        }
    }

    pub fn with_pacer(mut self, pacer: Arc<dyn Pacer>) -> Self {
        self.pacer = pacer;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn gateway(&self) -> &Arc<LlmGateway> {
        &self.gateway
    }

    pub fn pacer(&self) -> Arc<dyn Pacer> {
        Arc::clone(&self.pacer)
    }

    pub fn clock(&self) -> Arc<dyn Clock> {
        Arc::clone(&self.clock)
    }

    pub fn config(&self) -> &FetcherConfig {
        &self.config
    }

    /// Fetch and normalize one symbol.
    ///
    /// Returns `None` once every attempt has failed; the caller decides how
    /// to record the failure.
    pub async fn fetch_one(&self, symbol: &Symbol) -> Option<StockRecord> {
        self.fetch_measured(symbol, &mut FetchMetrics::new()).await
    }

    /// [`fetch_one`](Self::fetch_one), recording every attempt into `metrics`
    pub async fn fetch_measured(
        &self,
        symbol: &Symbol,
        metrics: &mut FetchMetrics,
    ) -> Option<StockRecord> {
        let attempts = self.config.max_retries.max(1);
        let prompt = prompts::stock_analysis_prompt(symbol.as_str());

        for attempt in 0..attempts {
            tracing::info!("Fetching {} (attempt {}/{})", symbol, attempt + 1, attempts);

            let timer = MetricsTimer::start();
            let response = self
                .gateway
                .complete_with_template(&prompt, prompts::STOCK_ANALYZER)
                .await;
            let raw = RawAnalysis::from_value(&response);
            metrics.record_attempt(raw.is_some(), timer.stop());

            if let Some(raw) = raw {
                let analysis = normalize_analysis(symbol.as_str(), raw);
                tracing::info!(
                    "Fetched {}: price={}, change={}, signal={:?}",
                    symbol,
                    analysis.price,
                    analysis.change,
                    analysis.signal
                );
                return Some(StockRecord::success(symbol.as_str(), analysis, self.clock.now()));
            }

            tracing::warn!(
                "Fetch attempt {}/{} for {} failed: {}",
                attempt + 1,
                attempts,
                symbol,
                describe_failure(&response)
            );

            if attempt + 1 < attempts {
                let backoff = seconds(self.config.api_delay_seconds * f64::from(attempt + 1));
                tracing::debug!("Retrying {} in {:?}", symbol, backoff);
                self.pacer.pause(backoff).await;
            }
        }

        tracing::error!("Giving up on {} after {} attempts", symbol, attempts);
        metrics.record_exhausted();
        None
    }
}

fn describe_failure(response: &serde_json::Value) -> String {
    match response.get("error") {
        Some(serde_json::Value::String(message)) => message.clone(),
        Some(other) => other.to_string(),
        None => "response is not a JSON object".to_string(),
    }
}
