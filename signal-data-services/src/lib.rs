pub mod store;

// Re-export commonly used items
pub use store::{
    CacheConfig, CacheEntry, CacheKey, CacheStats, ProgressStore, ReportWriter, ResponseCache,
    SnapshotStore, StoreError, SymbolSnapshot,
};
