use signal_core::CoreError;
use thiserror::Error;

#[derive(Error, Debug, Clone)]
pub enum RpcError {
    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("Invalid params: {0}")]
    InvalidParams(String),

    #[error("Internal error: {0}")]
    InternalError(String),

    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),

    #[error("Too many symbols: got {got}, limit {limit}")]
    TooManySymbols { got: usize, limit: usize },

    #[error("Failed to fetch data for {0}")]
    FetchFailed(String),

    #[error("LLM error: {0}")]
    LlmError(String),
}

impl RpcError {
    /// Get the JSON-RPC error code for this error
    pub fn code(&self) -> i32 {
        use crate::protocol::*;
        match self {
            RpcError::ParseError(_) => PARSE_ERROR,
            RpcError::InvalidRequest(_) => INVALID_REQUEST,
            RpcError::MethodNotFound(_) => METHOD_NOT_FOUND,
            RpcError::InvalidParams(_) => INVALID_PARAMS,
            RpcError::InternalError(_) => INTERNAL_ERROR,
            RpcError::UnknownSymbol(_) => UNKNOWN_SYMBOL,
            RpcError::TooManySymbols { .. } => TOO_MANY_SYMBOLS,
            RpcError::FetchFailed(_) => FETCH_FAILED,
            RpcError::LlmError(_) => LLM_ERROR,
        }
    }

    /// Get additional error data (optional)
    pub fn data(&self) -> Option<serde_json::Value> {
        match self {
            RpcError::TooManySymbols { got, limit } => Some(serde_json::json!({
                "symbols_given": got,
                "max_symbols": limit,
                "suggestion": "Split the request or use stock.search"
            })),
            RpcError::UnknownSymbol(_) => Some(serde_json::json!({
                "suggestion": "Call stock.symbols for the supported list"
            })),
            _ => None,
        }
    }
}

impl From<CoreError> for RpcError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::UnknownSymbol(symbol) => RpcError::UnknownSymbol(symbol),
            CoreError::EmptySymbol => RpcError::InvalidParams("symbol is empty".to_string()),
        }
    }
}
