use crate::types::symbol::{Symbol, SymbolUniverse};
use crate::types::{round2, Timestamp};
use serde::{Deserialize, Serialize};

/// Running counters for a fetch campaign
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchStatistics {
    pub total_attempts: u64,
    pub successful_fetches: u64,
    pub failed_fetches: u64,
}

/// Continuation state of a long-running fetch campaign
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Progress {
    pub total_symbols: usize,
    pub completed_symbols: Vec<String>,
    pub failed_symbols: Vec<String>,
    pub last_update: Option<Timestamp>,
    pub start_time: Timestamp,
    pub statistics: FetchStatistics,
}

impl Progress {
    /// Fresh state for a campaign over `universe`
    pub fn new(universe: &SymbolUniverse, start_time: Timestamp) -> Self {
        Self {
            total_symbols: universe.len(),
            completed_symbols: Vec::new(),
            failed_symbols: Vec::new(),
            last_update: None,
            start_time,
            statistics: FetchStatistics::default(),
        }
    }

    /// Universe order minus completed minus failed
    pub fn pending<'a>(&self, universe: &'a SymbolUniverse) -> Vec<&'a Symbol> {
        universe
            .iter()
            .filter(|s| !self.is_settled(s.as_str()))
            .collect()
    }

    pub fn is_settled(&self, symbol: &str) -> bool {
        self.completed_symbols.iter().any(|s| s == symbol)
            || self.failed_symbols.iter().any(|s| s == symbol)
    }

    /// Fold one batch outcome into the state
    pub fn record_batch(
        &mut self,
        attempted: usize,
        successful: &[String],
        failed: &[String],
        at: Timestamp,
    ) {
        for symbol in successful {
            if !self.completed_symbols.contains(symbol) {
                self.completed_symbols.push(symbol.clone());
            }
        }
        for symbol in failed {
            if !self.failed_symbols.contains(symbol) {
                self.failed_symbols.push(symbol.clone());
            }
        }

        self.statistics.total_attempts += attempted as u64;
        self.statistics.successful_fetches += successful.len() as u64;
        self.statistics.failed_fetches += failed.len() as u64;
        self.last_update = Some(at);
    }

    /// Make failed symbols pending again. Returns how many were released.
    pub fn release_failed(&mut self) -> usize {
        let released = self.failed_symbols.len();
        self.failed_symbols.clear();
        released
    }

    /// (completed + failed) / universe × 100, two decimals
    pub fn completion_rate(&self, universe: &SymbolUniverse) -> f64 {
        if universe.is_empty() {
            return 0.0;
        }
        let settled = universe.iter().filter(|s| self.is_settled(s.as_str())).count();
        round2(settled as f64 / universe.len() as f64 * 100.0)
    }
}
