use serde::{Deserialize, Serialize};
use serde_json::Value;
use signal_core::{SignalCard, StockRecord, Timestamp};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use super::progress_store::PROGRESS_FILE;
use super::{ensure_dir, json_files, write_json_atomic, StoreError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMetadata {
    pub fetch_success: bool,
    pub file_created: Timestamp,
}

/// One fetch event for one symbol, as written to disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolSnapshot {
    pub symbol: String,
    pub timestamp: Timestamp,
    pub data: Value,
    pub metadata: SnapshotMetadata,
}

impl SymbolSnapshot {
    pub fn from_record(record: &StockRecord, at: Timestamp) -> Result<Self, serde_json::Error> {
        Ok(Self {
            symbol: record.symbol.clone(),
            timestamp: at,
            data: serde_json::to_value(record)?,
            metadata: SnapshotMetadata {
                fetch_success: record.is_success(),
                file_created: at,
            },
        })
    }

    /// `{SYMBOL}_{YYYYmmdd_HHMMSS}.json`
    pub fn file_name(&self) -> String {
        format!("{}_{}.json", self.symbol, self.timestamp.format("%Y%m%d_%H%M%S"))
    }
}

/// Directory of per-symbol snapshots written by a fetch campaign.
///
/// Shares its directory with `progress.json`, which listing skips.
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        ensure_dir(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write a snapshot of `record` and return its path
    pub fn write(&self, record: &StockRecord, at: Timestamp) -> Result<PathBuf, StoreError> {
        let snapshot = SymbolSnapshot::from_record(record, at)
            .map_err(|e| StoreError::json(&self.dir, e))?;
        let path = self.dir.join(snapshot.file_name());

        write_json_atomic(&path, &snapshot)?;
        tracing::info!("Saved snapshot {}", path.display());
        Ok(path)
    }

    /// All readable snapshots in file-name order. Unreadable files are
    /// skipped with a warning.
    pub fn list(&self) -> Result<Vec<SymbolSnapshot>, StoreError> {
        let mut snapshots = Vec::new();

        for path in json_files(&self.dir)? {
            if path.file_name().is_some_and(|name| name == PROGRESS_FILE) {
                continue;
            }

            let parsed = fs::read(&path)
                .map_err(|e| StoreError::io(&path, e))
                .and_then(|bytes| {
                    serde_json::from_slice::<SymbolSnapshot>(&bytes)
                        .map_err(|e| StoreError::json(&path, e))
                });

            match parsed {
                Ok(snapshot) => snapshots.push(snapshot),
                Err(e) => tracing::warn!("Skipping snapshot: {}", e),
            }
        }

        Ok(snapshots)
    }

    /// Latest successful snapshot per symbol, converted to signal cards and
    /// ordered by symbol
    pub fn load_signal_cards(&self) -> Result<Vec<SignalCard>, StoreError> {
        let mut latest: BTreeMap<String, SymbolSnapshot> = BTreeMap::new();

        for snapshot in self.list()? {
            if !snapshot.metadata.fetch_success {
                continue;
            }
            let newer = latest
                .get(&snapshot.symbol)
                .map_or(true, |current| snapshot.timestamp >= current.timestamp);
            if newer {
                latest.insert(snapshot.symbol.clone(), snapshot);
            }
        }

        let cards: Vec<SignalCard> = latest
            .into_values()
            .filter_map(|snapshot| {
                let mut data = snapshot.data;
                if let Some(object) = data.as_object_mut() {
                    object
                        .entry("asset")
                        .or_insert_with(|| Value::String(snapshot.symbol.clone()));
                }
                SignalCard::from_snapshot_data(&data)
            })
            .collect();

        tracing::info!("Loaded {} signal cards from {}", cards.len(), self.dir.display());
        Ok(cards)
    }
}
