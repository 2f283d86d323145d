use serde::{Deserialize, Serialize};
use signal_core::{BatchReport, StockRecord, Symbol, FETCH_FAILED_MESSAGE};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::fetcher::RetryingFetcher;
use crate::llm::FetchMetrics;
use crate::pacing::seconds;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("batch size must be at least 1")]
    ZeroBatchSize,
}

/// Batch partitioning and pacing for a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    pub batch_size: usize,
    pub inter_batch_delay_seconds: f64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 3,
            inter_batch_delay_seconds: 15.0,
        }
    }
}

impl BatchConfig {
    pub fn inter_batch_delay(&self) -> Duration {
        seconds(self.inter_batch_delay_seconds)
    }
}

/// Runs symbols through the fetcher in fixed-size, paced batches
pub struct BatchScheduler {
    fetcher: Arc<RetryingFetcher>,
}

impl BatchScheduler {
    pub fn new(fetcher: Arc<RetryingFetcher>) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &Arc<RetryingFetcher> {
        &self.fetcher
    }

    pub async fn run(
        &self,
        symbols: &[Symbol],
        config: &BatchConfig,
    ) -> Result<BatchReport, ScheduleError> {
        self.run_batch(symbols, config.batch_size, config.inter_batch_delay())
            .await
    }

    /// Fetch every symbol, in order, `batch_size` at a time.
    ///
    /// Repeated symbols are fetched once, at their first position. Symbols
    /// within a batch are fetched sequentially; the pacer waits
    /// `inter_batch_delay` between batches but not after the last one.
    /// Exhausted symbols become failure records, so the report always
    /// accounts for every requested symbol.
    pub async fn run_batch(
        &self,
        symbols: &[Symbol],
        batch_size: usize,
        inter_batch_delay: Duration,
    ) -> Result<BatchReport, ScheduleError> {
        let (report, _) = self
            .run_batch_measured(symbols, batch_size, inter_batch_delay)
            .await?;
        Ok(report)
    }

    /// [`run_batch`](Self::run_batch), also returning the metrics of this run
    pub async fn run_batch_measured(
        &self,
        symbols: &[Symbol],
        batch_size: usize,
        inter_batch_delay: Duration,
    ) -> Result<(BatchReport, FetchMetrics), ScheduleError> {
        if batch_size == 0 {
            return Err(ScheduleError::ZeroBatchSize);
        }

        let symbols = unique(symbols);
        let batch_count = symbols.len().div_ceil(batch_size);
        tracing::info!(
            "Starting fetch of {} symbols in {} batches of up to {}",
            symbols.len(),
            batch_count,
            batch_size
        );

        let clock = self.fetcher.clock();
        let pacer = self.fetcher.pacer();
        let mut metrics = FetchMetrics::new();
        let mut records = Vec::with_capacity(symbols.len());

        for (index, batch) in symbols.chunks(batch_size).enumerate() {
            tracing::info!(
                "Batch {}/{}: {}",
                index + 1,
                batch_count,
                batch.iter().map(Symbol::as_str).collect::<Vec<_>>().join(", ")
            );

            for symbol in batch {
                let record = match self.fetcher.fetch_measured(symbol, &mut metrics).await {
                    Some(record) => record,
                    None => StockRecord::failure(symbol.as_str(), FETCH_FAILED_MESSAGE, clock.now()),
                };
                records.push(record);
            }

            if index + 1 < batch_count {
                tracing::info!("Waiting {:?} before next batch", inter_batch_delay);
                pacer.pause(inter_batch_delay).await;
            }
        }

        let report = BatchReport::from_records(symbols.len(), records, clock.now());
        tracing::info!(
            "Fetch complete: {}/{} succeeded ({}%)",
            report.successful_count,
            report.total_symbols,
            report.success_rate
        );
        metrics.report();

        Ok((report, metrics))
    }
}

/// First occurrence of each symbol, in input order
fn unique(symbols: &[Symbol]) -> Vec<Symbol> {
    let mut seen: Vec<Symbol> = Vec::with_capacity(symbols.len());
    for symbol in symbols {
        if !seen.contains(symbol) {
            seen.push(symbol.clone());
        }
    }
    seen
}
