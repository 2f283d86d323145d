pub mod config;
pub mod error;
pub mod handler;
pub mod protocol;
pub mod server;

pub use config::{HandlerConfig, ServerConfig};
pub use error::RpcError;
pub use handler::StockQueryHandler;
pub use server::RpcServer;
