use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Unsupported symbol: {0}")]
    UnknownSymbol(String),

    #[error("Empty symbol")]
    EmptySymbol,
}
