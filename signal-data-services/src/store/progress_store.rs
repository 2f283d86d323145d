use signal_core::{Progress, SymbolUniverse, Timestamp};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use super::{ensure_dir, write_json_atomic, StoreError};

pub const PROGRESS_FILE: &str = "progress.json";

/// Persists campaign [`Progress`] as `progress.json` in a data directory
pub struct ProgressStore {
    path: PathBuf,
}

impl ProgressStore {
    pub fn new(data_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let data_dir = data_dir.as_ref();
        ensure_dir(data_dir)?;
        Ok(Self {
            path: data_dir.join(PROGRESS_FILE),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load saved progress, or start fresh when the file is missing or
    /// unreadable. A corrupt file is logged and replaced on next save.
    pub fn load(&self, universe: &SymbolUniverse, now: Timestamp) -> Progress {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!("No saved progress at {}, starting fresh", self.path.display());
                return Progress::new(universe, now);
            }
            Err(e) => {
                tracing::warn!("Cannot read {}: {}, starting fresh", self.path.display(), e);
                return Progress::new(universe, now);
            }
        };

        match serde_json::from_slice::<Progress>(&bytes) {
            Ok(mut progress) => {
                progress.total_symbols = universe.len();
                tracing::info!(
                    "Loaded progress: {} completed, {} failed",
                    progress.completed_symbols.len(),
                    progress.failed_symbols.len()
                );
                progress
            }
            Err(e) => {
                tracing::warn!("Corrupt progress file {}: {}, starting fresh", self.path.display(), e);
                Progress::new(universe, now)
            }
        }
    }

    pub fn save(&self, progress: &Progress) -> Result<(), StoreError> {
        write_json_atomic(&self.path, progress)?;
        tracing::debug!("Saved progress to {}", self.path.display());
        Ok(())
    }
}
