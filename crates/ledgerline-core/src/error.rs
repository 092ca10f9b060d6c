use ledgerline_domain::{AccountId, CategoryId, CurrencyCode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid account: {0}")]
    InvalidAccount(AccountId),
    #[error("Invalid category: {0}")]
    InvalidCategory(String),
    #[error("Access denied: {0}")]
    AccessDenied(String),
    #[error("Invalid transaction: {0}")]
    InvalidTransaction(String),
    #[error("Invalid period: {0}")]
    InvalidPeriod(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("No rate to convert {from} to {to}: {reason}")]
    Conversion {
        from: CurrencyCode,
        to: CurrencyCode,
        reason: String,
    },
    #[error("Validation failed: {0}")]
    Validation(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serde(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CoreError {
    pub fn invalid_category(id: CategoryId) -> Self {
        CoreError::InvalidCategory(id.to_string())
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
