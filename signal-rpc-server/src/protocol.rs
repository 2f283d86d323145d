use serde::{Deserialize, Serialize};
use serde_json::Value;
use signal_core::{StockRecord, Timestamp};
use signal_data_services::CacheStats;
use std::collections::BTreeMap;

/// JSON-RPC 2.0 Request
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    pub params: Option<Value>,
}

/// JSON-RPC Error Object
#[derive(Debug, Serialize)]
pub struct ErrorObject {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

// Standard JSON-RPC error codes
pub const PARSE_ERROR: i32 = -32700;
pub const INVALID_REQUEST: i32 = -32600;
pub const METHOD_NOT_FOUND: i32 = -32601;
pub const INVALID_PARAMS: i32 = -32602;
pub const INTERNAL_ERROR: i32 = -32603;

// Custom error codes for stock operations
pub const UNKNOWN_SYMBOL: i32 = -32002;
pub const TOO_MANY_SYMBOLS: i32 = -32003;
pub const FETCH_FAILED: i32 = -32004;
pub const LLM_ERROR: i32 = -32005;

// Method names
pub const METHOD_LLM_SEARCH: &str = "llm.search";
pub const METHOD_STOCK_GET: &str = "stock.get";
pub const METHOD_STOCK_SEARCH: &str = "stock.search";
pub const METHOD_STOCK_BATCH: &str = "stock.batch";
pub const METHOD_STOCK_SYMBOLS: &str = "stock.symbols";
pub const METHOD_CACHE_STATS: &str = "cache.stats";
pub const METHOD_CACHE_CLEAR: &str = "cache.clear";
pub const METHOD_CACHE_CLEAR_EXPIRED: &str = "cache.clear_expired";
pub const METHOD_HEALTH: &str = "health";

/// `llm.search` parameters
#[derive(Debug, Deserialize)]
pub struct LlmSearchParams {
    pub prompt: String,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub force_refresh: bool,
}

/// `stock.get` parameters
#[derive(Debug, Deserialize)]
pub struct StockGetParams {
    pub symbol: String,
    #[serde(default)]
    pub force_refresh: bool,
}

/// `stock.search` and `stock.batch` parameters
#[derive(Debug, Deserialize)]
pub struct StockSearchParams {
    pub symbols: Vec<String>,
    #[serde(default)]
    pub force_refresh: bool,
}

/// Result of `stock.search` / `stock.batch`
#[derive(Debug, Serialize)]
pub struct StockSearchResponse {
    /// Successful records, cached or fresh
    pub data: BTreeMap<String, StockRecord>,
    pub cached: Vec<String>,
    pub fetched: Vec<String>,
    pub failed: Vec<String>,
    pub invalid_symbols: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct SymbolsResponse {
    pub symbols: Vec<String>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
pub struct ClearExpiredResponse {
    pub cleared: usize,
}

#[derive(Debug, Serialize)]
pub struct ClearAllResponse {
    pub cleared: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub backend: String,
    pub timestamp: Timestamp,
    pub symbols: usize,
    pub cache: CacheStats,
}
