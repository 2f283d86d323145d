use serde::{Deserialize, Serialize};
use signal_core::{
    BatchReport, Clock, FetchStatistics, Progress, Symbol, SymbolUniverse, Timestamp,
};
use signal_data_services::{ProgressStore, SnapshotStore, StoreError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::pacing::{seconds, Pacer};
use crate::scheduler::{BatchScheduler, ScheduleError};

/// Symbols previewed as the next batch in a status report
const NEXT_BATCH_PREVIEW: usize = 2;

#[derive(Error, Debug)]
pub enum CampaignError {
    #[error(transparent)]
    Schedule(#[from] ScheduleError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CampaignConfig {
    /// Holds `progress.json` and the per-symbol snapshots
    pub data_dir: PathBuf,
    pub batch_size: usize,
    pub inter_batch_delay_seconds: f64,
    pub check_interval_seconds: u64,
}

impl Default for CampaignConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("auto_data"),
            batch_size: 2,
            inter_batch_delay_seconds: 5.0,
            check_interval_seconds: 180,
        }
    }
}

impl CampaignConfig {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_seconds)
    }
}

/// Outcome of one `fetch_next_batch` call
#[derive(Debug, Clone, PartialEq)]
pub enum CampaignTick {
    /// Nothing was pending
    Completed,
    Batch {
        report: BatchReport,
        remaining: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignStatus {
    pub total_symbols: usize,
    pub completed: usize,
    pub failed: usize,
    pub pending: usize,
    pub completion_rate: f64,
    pub last_update: Option<Timestamp>,
    pub start_time: Timestamp,
    pub statistics: FetchStatistics,
    pub next_batch: Vec<String>,
}

/// Persisted campaign state: progress and snapshots under one data directory.
///
/// Needs no backend, so status and maintenance work offline.
pub struct CampaignLedger {
    universe: SymbolUniverse,
    progress: ProgressStore,
    snapshots: SnapshotStore,
    clock: Arc<dyn Clock>,
}

impl CampaignLedger {
    pub fn new(
        universe: SymbolUniverse,
        data_dir: &Path,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, StoreError> {
        Ok(Self {
            universe,
            progress: ProgressStore::new(data_dir)?,
            snapshots: SnapshotStore::new(data_dir)?,
            clock,
        })
    }

    pub fn universe(&self) -> &SymbolUniverse {
        &self.universe
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        &self.snapshots
    }

    fn load(&self) -> Progress {
        self.progress.load(&self.universe, self.clock.now())
    }

    /// Universe order minus completed minus failed
    pub fn pending(&self) -> Vec<Symbol> {
        self.load().pending(&self.universe).into_iter().cloned().collect()
    }

    pub fn status(&self) -> CampaignStatus {
        let progress = self.load();
        let pending = progress.pending(&self.universe);

        CampaignStatus {
            total_symbols: self.universe.len(),
            completed: progress.completed_symbols.len(),
            failed: progress.failed_symbols.len(),
            pending: pending.len(),
            completion_rate: progress.completion_rate(&self.universe),
            last_update: progress.last_update,
            start_time: progress.start_time,
            next_batch: pending
                .iter()
                .take(NEXT_BATCH_PREVIEW)
                .map(|s| s.to_string())
                .collect(),
            statistics: progress.statistics,
        }
    }

    /// Make failed symbols pending again
    pub fn reset_failed(&self) -> Result<usize, StoreError> {
        let mut progress = self.load();
        let released = progress.release_failed();
        self.progress.save(&progress)?;

        tracing::info!("Released {} failed symbols back to pending", released);
        Ok(released)
    }

    /// Write snapshots for the successes and fold the batch into progress.
    /// Returns how many symbols are still pending.
    fn record(
        &self,
        mut progress: Progress,
        attempted: usize,
        report: &BatchReport,
    ) -> Result<usize, StoreError> {
        let now = self.clock.now();
        for record in report.successful_records() {
            if let Err(e) = self.snapshots.write(record, now) {
                tracing::warn!("Snapshot for {} not saved: {}", record.symbol, e);
            }
        }

        progress.record_batch(
            attempted,
            &report.successful_symbols,
            &report.failed_symbols,
            now,
        );
        self.progress.save(&progress)?;

        Ok(progress.pending(&self.universe).len())
    }
}

/// Long-running fetch over a symbol universe that survives restarts.
///
/// Progress is re-read from disk at the start of every operation, so any
/// number of short-lived processes can advance the same campaign in turn.
pub struct FetchCampaign {
    ledger: CampaignLedger,
    scheduler: BatchScheduler,
    pacer: Arc<dyn Pacer>,
    config: CampaignConfig,
}

impl FetchCampaign {
    pub fn new(
        universe: SymbolUniverse,
        scheduler: BatchScheduler,
        config: CampaignConfig,
    ) -> Result<Self, CampaignError> {
        let ledger =
            CampaignLedger::new(universe, &config.data_dir, scheduler.fetcher().clock())?;
        let pacer = scheduler.fetcher().pacer();

        tracing::info!(
            "Campaign over {} symbols, data_dir={}",
            ledger.universe().len(),
            config.data_dir.display()
        );

        Ok(Self {
            ledger,
            scheduler,
            pacer,
            config,
        })
    }

    pub fn config(&self) -> &CampaignConfig {
        &self.config
    }

    pub fn ledger(&self) -> &CampaignLedger {
        &self.ledger
    }

    pub fn snapshots(&self) -> &SnapshotStore {
        self.ledger.snapshots()
    }

    pub fn pending(&self) -> Vec<Symbol> {
        self.ledger.pending()
    }

    pub fn status(&self) -> CampaignStatus {
        self.ledger.status()
    }

    pub fn reset_failed(&self) -> Result<usize, CampaignError> {
        Ok(self.ledger.reset_failed()?)
    }

    /// Fetch the first `batch_size` pending symbols and record the outcome
    pub async fn fetch_next_batch(&self, batch_size: usize) -> Result<CampaignTick, CampaignError> {
        if batch_size == 0 {
            return Err(ScheduleError::ZeroBatchSize.into());
        }

        let progress = self.ledger.load();
        let batch: Vec<Symbol> = progress
            .pending(self.ledger.universe())
            .into_iter()
            .take(batch_size)
            .cloned()
            .collect();

        if batch.is_empty() {
            tracing::info!("All symbols processed, nothing pending");
            return Ok(CampaignTick::Completed);
        }

        let report = self
            .scheduler
            .run_batch(
                &batch,
                batch_size,
                seconds(self.config.inter_batch_delay_seconds),
            )
            .await?;

        let remaining = self.ledger.record(progress, batch.len(), &report)?;
        tracing::info!(
            "Batch done: {} ok, {} failed, {} remaining",
            report.successful_count,
            report.failed_count,
            remaining
        );

        Ok(CampaignTick::Batch { report, remaining })
    }

    /// Keep fetching batches, pausing `check_interval` between them, until
    /// nothing is pending. Returns the number of batches run.
    pub async fn run_continuous(
        &self,
        batch_size: usize,
        check_interval: Duration,
    ) -> Result<usize, CampaignError> {
        let mut batches = 0;

        loop {
            match self.fetch_next_batch(batch_size).await? {
                CampaignTick::Completed => break,
                CampaignTick::Batch { remaining, .. } => {
                    batches += 1;
                    if remaining == 0 {
                        break;
                    }
                    tracing::info!("Next check in {:?}", check_interval);
                    self.pacer.pause(check_interval).await;
                }
            }
        }

        tracing::info!("Campaign finished after {} batches", batches);
        Ok(batches)
    }
}
