use anyhow::{Context, Result};
use futures::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use signal_core::SymbolUniverse;
use signal_data_services::ResponseCache;
use signal_fetcher::{BatchScheduler, LlmGateway, OpenAiBackend, RetryingFetcher};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio_util::codec::{Framed, LinesCodec};

use crate::config::ServerConfig;
use crate::error::RpcError;
use crate::handler::StockQueryHandler;
use crate::protocol::*;

/// Longest request line accepted
const MAX_LINE_LENGTH: usize = 1024 * 1024;

/// JSON-RPC server for stock queries
pub struct RpcServer {
    config: ServerConfig,
    handler: Arc<StockQueryHandler>,
}

impl RpcServer {
    /// Create a new RPC server
    pub fn new(config: ServerConfig, api_key: String) -> Result<Self> {
        tracing::info!("Initializing fetch pipeline...");

        let cache = Arc::new(
            ResponseCache::new(config.cache.clone()).context("Failed to open response cache")?,
        );
        let backend = OpenAiBackend::new(config.llm.clone(), api_key)
            .context("Failed to initialize LLM backend")?;
        let gateway = Arc::new(LlmGateway::new(Arc::new(backend)));
        let fetcher = Arc::new(RetryingFetcher::new(gateway, config.fetcher.clone()));
        let scheduler = Arc::new(BatchScheduler::new(fetcher));

        let handler = Arc::new(StockQueryHandler::new(
            SymbolUniverse::default(),
            cache,
            scheduler,
            config.handler.clone(),
        ));

        tracing::info!("✅ Fetch pipeline initialized successfully");

        Ok(Self::with_handler(config, handler))
    }

    pub fn with_handler(config: ServerConfig, handler: Arc<StockQueryHandler>) -> Self {
        Self { config, handler }
    }

    /// Bind the configured address and serve until the process stops
    pub async fn run(&self) -> Result<()> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .context(format!("Failed to bind to {}", addr))?;

        tracing::info!("✅ Stock JSON-RPC Server listening on {}", addr);
        self.serve(listener).await
    }

    /// Accept connections on an already bound listener
    pub async fn serve(&self, listener: TcpListener) -> Result<()> {
        tracing::info!("Ready to accept connections");

        loop {
            match listener.accept().await {
                Ok((socket, addr)) => {
                    tracing::debug!("New connection from {}", addr);
                    let handler = Arc::clone(&self.handler);

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(socket, handler).await {
                            tracing::error!("Connection error from {}: {}", addr, e);
                        }
                    });
                }
                Err(e) => {
                    tracing::error!("Failed to accept connection: {}", e);
                }
            }
        }
    }
}

/// Handle a single TCP connection, one request per line
async fn handle_connection(socket: TcpStream, handler: Arc<StockQueryHandler>) -> Result<()> {
    let mut framed = Framed::new(socket, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

    while let Some(line) = framed.next().await {
        let line = line.context("Failed to read request line")?;
        if line.trim().is_empty() {
            continue;
        }

        tracing::debug!("Received request: {}", line.trim());

        let response = process_request(&line, &handler).await;
        framed
            .send(serde_json::to_string(&response)?)
            .await
            .context("Failed to send response")?;

        tracing::debug!("Sent response");
    }

    Ok(())
}

/// Process a JSON-RPC request
pub(crate) async fn process_request(line: &str, handler: &StockQueryHandler) -> Value {
    let request: JsonRpcRequest = match serde_json::from_str(line) {
        Ok(req) => req,
        Err(e) => {
            return create_error_response(None, RpcError::ParseError(e.to_string()));
        }
    };

    if request.jsonrpc != "2.0" {
        return create_error_response(
            request.id,
            RpcError::InvalidRequest("JSON-RPC version must be 2.0".to_string()),
        );
    }

    let id = request.id.clone();
    let result = dispatch(request, handler).await;

    match result {
        Ok(result) => create_success_response(id, result),
        Err(e) => {
            tracing::warn!("Request failed: {}", e);
            create_error_response(id, e)
        }
    }
}

async fn dispatch(request: JsonRpcRequest, handler: &StockQueryHandler) -> Result<Value, RpcError> {
    match request.method.as_str() {
        METHOD_LLM_SEARCH => handler.llm_search(params(request.params)?).await,
        METHOD_STOCK_GET => handler.stock_get(params(request.params)?).await,
        METHOD_STOCK_SEARCH => to_result(&handler.stock_search(params(request.params)?).await?),
        METHOD_STOCK_BATCH => to_result(&handler.stock_batch(params(request.params)?).await?),
        METHOD_STOCK_SYMBOLS => to_result(&handler.symbols()),
        METHOD_CACHE_STATS => to_result(&handler.cache().stats()),
        METHOD_CACHE_CLEAR => to_result(&ClearAllResponse {
            cleared: handler.cache().clear_all(),
        }),
        METHOD_CACHE_CLEAR_EXPIRED => to_result(&ClearExpiredResponse {
            cleared: handler.cache().clear_expired(),
        }),
        METHOD_HEALTH => to_result(&handler.health()),
        other => Err(RpcError::MethodNotFound(other.to_string())),
    }
}

fn params<T: DeserializeOwned>(params: Option<Value>) -> Result<T, RpcError> {
    let params = params.ok_or_else(|| RpcError::InvalidParams("Missing params".to_string()))?;
    serde_json::from_value(params).map_err(|e| RpcError::InvalidParams(e.to_string()))
}

fn to_result<T: Serialize>(value: &T) -> Result<Value, RpcError> {
    serde_json::to_value(value).map_err(|e| RpcError::InternalError(e.to_string()))
}

fn create_success_response(id: Option<Value>, result: Value) -> Value {
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "result": result,
    })
}

/// Create an error response
fn create_error_response(id: Option<Value>, error: RpcError) -> Value {
    let error = ErrorObject {
        code: error.code(),
        message: error.to_string(),
        data: error.data(),
    };
    serde_json::json!({
        "jsonrpc": "2.0",
        "id": id,
        "error": error,
    })
}
