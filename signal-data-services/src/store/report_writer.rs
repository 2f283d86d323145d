use signal_core::BatchReport;
use std::path::{Path, PathBuf};

use super::{ensure_dir, write_json_atomic, StoreError};

pub const FULL_REPORT_FILE: &str = "improved_stock_data.json";
pub const SIMPLE_REPORT_FILE: &str = "simple_stock_data.json";

/// Writes the full and simplified JSON reports of a batch run
pub struct ReportWriter {
    dir: PathBuf,
}

impl ReportWriter {
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        ensure_dir(&dir)?;
        Ok(Self { dir })
    }

    /// Returns the paths of the full and simple reports
    pub fn save(&self, report: &BatchReport) -> Result<(PathBuf, PathBuf), StoreError> {
        let full = self.dir.join(FULL_REPORT_FILE);
        let simple = self.dir.join(SIMPLE_REPORT_FILE);

        write_json_atomic(&full, report)?;
        write_json_atomic(&simple, &report.simple())?;

        tracing::info!(
            "Saved reports: {} and {} ({} stocks)",
            full.display(),
            simple.display(),
            report.successful_count
        );
        Ok((full, simple))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::Value;
    use signal_core::{normalize_analysis, RawAnalysis, StockRecord, FETCH_FAILED_MESSAGE};

    #[test]
    fn test_save_writes_both_reports() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = ReportWriter::new(tmp.path()).unwrap();

        let report = BatchReport::from_records(
            2,
            vec![
                StockRecord::success(
                    "AAPL",
                    normalize_analysis("AAPL", RawAnalysis::default()),
                    Utc::now(),
                ),
                StockRecord::failure("TSLA", FETCH_FAILED_MESSAGE, Utc::now()),
            ],
            Utc::now(),
        );

        let (full, simple) = writer.save(&report).unwrap();

        let full: Value = serde_json::from_slice(&std::fs::read(full).unwrap()).unwrap();
        assert_eq!(full["success_rate"], 50.0);
        assert_eq!(full["data"]["TSLA"]["fetch_success"], false);

        let simple: Value = serde_json::from_slice(&std::fs::read(simple).unwrap()).unwrap();
        let stocks = simple["stocks"].as_array().unwrap();
        assert_eq!(stocks.len(), 1);
        assert_eq!(stocks[0]["symbol"], "AAPL");
        assert_eq!(stocks[0]["price"], "N/A");
        assert_eq!(stocks[0]["signal"], "neutral");
    }
}
