use crate::types::stock_record::{Signal, StockRecord};
use crate::types::{round2, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Aggregate over one batch run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchReport {
    pub fetch_timestamp: Timestamp,
    pub total_symbols: usize,
    pub successful_count: usize,
    pub failed_count: usize,
    /// successful / total × 100, two decimals
    pub success_rate: f64,
    /// In request order
    pub successful_symbols: Vec<String>,
    /// In request order
    pub failed_symbols: Vec<String>,
    pub data: BTreeMap<String, StockRecord>,
    pub summary: ReportSummary,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataQuality {
    Good,
    Poor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportSummary {
    pub total_stocks: usize,
    pub data_quality: DataQuality,
    pub recommendations: Vec<String>,
}

impl BatchReport {
    /// Build a report from records in the order they were requested.
    ///
    /// `total_symbols` is the number of symbols requested in the run, which
    /// can exceed `records.len()` if the run was cut short.
    pub fn from_records(total_symbols: usize, records: Vec<StockRecord>, at: Timestamp) -> Self {
        let mut successful_symbols = Vec::new();
        let mut failed_symbols = Vec::new();
        let mut data = BTreeMap::new();

        for record in records {
            let symbol = record.symbol.clone();
            // A symbol requested twice keeps its latest outcome only
            successful_symbols.retain(|s| s != &symbol);
            failed_symbols.retain(|s| s != &symbol);

            if record.is_success() {
                successful_symbols.push(symbol.clone());
            } else {
                failed_symbols.push(symbol.clone());
            }
            data.insert(symbol, record);
        }

        let success_rate = if total_symbols == 0 {
            0.0
        } else {
            round2(successful_symbols.len() as f64 / total_symbols as f64 * 100.0)
        };

        let data_quality = if successful_symbols.len() > failed_symbols.len() {
            DataQuality::Good
        } else {
            DataQuality::Poor
        };

        let mut recommendations = Vec::new();
        if successful_symbols.is_empty() {
            recommendations.push("Check network connectivity and API key".to_string());
        } else {
            recommendations.push("Data fetched successfully".to_string());
        }
        recommendations.push(format!(
            "Success rate: {}/{}",
            successful_symbols.len(),
            total_symbols
        ));

        Self {
            fetch_timestamp: at,
            total_symbols,
            successful_count: successful_symbols.len(),
            failed_count: failed_symbols.len(),
            success_rate,
            successful_symbols,
            failed_symbols,
            data,
            summary: ReportSummary {
                total_stocks: total_symbols,
                data_quality,
                recommendations,
            },
        }
    }

    /// Successful records in request order
    pub fn successful_records(&self) -> impl Iterator<Item = &StockRecord> {
        self.successful_symbols
            .iter()
            .filter_map(|symbol| self.data.get(symbol))
    }

    pub fn market_summary(&self, top_n: usize) -> Option<MarketSummary> {
        MarketSummary::from_records(self.successful_records(), top_n)
    }

    /// Reduced view: successful symbols with their headline fields
    pub fn simple(&self) -> SimpleReport {
        SimpleReport {
            timestamp: self.fetch_timestamp,
            stocks: self
                .successful_records()
                .filter_map(|record| {
                    record.analysis.as_ref().map(|a| SimpleStock {
                        symbol: record.symbol.clone(),
                        price: a.price.clone(),
                        change: a.change,
                        signal: a.signal,
                        confidence: a.confidence,
                    })
                })
                .collect(),
        }
    }
}

/// Gainers/losers overview over successful records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketSummary {
    pub total_stocks: usize,
    pub average_change: f64,
    pub gainers_count: usize,
    pub losers_count: usize,
    pub top_gainers: Vec<StockRecord>,
    pub top_losers: Vec<StockRecord>,
}

impl MarketSummary {
    /// `None` when there is no successful record to summarise.
    ///
    /// Gainers are sorted by change descending and losers ascending; the
    /// sort is stable so ties keep input order.
    pub fn from_records<'a, I>(records: I, top_n: usize) -> Option<Self>
    where
        I: IntoIterator<Item = &'a StockRecord>,
    {
        let successful: Vec<(&StockRecord, f64)> = records
            .into_iter()
            .filter_map(|r| r.change().map(|c| (r, c)))
            .collect();

        if successful.is_empty() {
            return None;
        }

        let average_change =
            successful.iter().map(|(_, c)| c).sum::<f64>() / successful.len() as f64;

        let mut gainers: Vec<(&StockRecord, f64)> =
            successful.iter().copied().filter(|(_, c)| *c > 0.0).collect();
        let mut losers: Vec<(&StockRecord, f64)> =
            successful.iter().copied().filter(|(_, c)| *c < 0.0).collect();

        gainers.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        losers.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

        Some(Self {
            total_stocks: successful.len(),
            average_change,
            gainers_count: gainers.len(),
            losers_count: losers.len(),
            top_gainers: gainers.iter().take(top_n).map(|(r, _)| (*r).clone()).collect(),
            top_losers: losers.iter().take(top_n).map(|(r, _)| (*r).clone()).collect(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleReport {
    pub timestamp: Timestamp,
    pub stocks: Vec<SimpleStock>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleStock {
    pub symbol: String,
    pub price: String,
    pub change: f64,
    pub signal: Signal,
    pub confidence: u8,
}
