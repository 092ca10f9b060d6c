use ledgerline_config::ConfigError;
use ledgerline_core::CoreError;
use thiserror::Error;

/// Error type surfaced by the engine facade and the maintenance binary.
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

pub type LedgerResult<T> = Result<T, LedgerError>;
