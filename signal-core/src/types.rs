pub mod progress;
pub mod report;
pub mod signal_card;
pub mod stock_record;
pub mod symbol;

// Re-export common types
pub use progress::{FetchStatistics, Progress};
pub use report::{BatchReport, DataQuality, MarketSummary, ReportSummary, SimpleReport, SimpleStock};
pub use signal_card::SignalCard;
pub use stock_record::{
    normalize_analysis, RawAnalysis, Signal, SocialSentiment, StockAnalysis, StockRecord,
    DEFAULTS, FETCH_FAILED_MESSAGE,
};
pub use symbol::{Symbol, SymbolUniverse, DEFAULT_SYMBOLS};

/// Wall-clock instant used in persisted records
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Round to two decimal places, the precision used for every reported percentage
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
