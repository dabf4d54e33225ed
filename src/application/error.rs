use std::time::Duration;

use serde::Serialize;
use thiserror::Error;

use crate::domain::Amount;
use crate::storage::StoreError;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Insufficient {currency} balance: available {available}, requested {requested}")]
    InsufficientFunds {
        currency: String,
        available: Amount,
        requested: u64,
    },

    #[error("No {currency} balance for user {user_id}")]
    BalanceNotFound { user_id: String, currency: String },

    #[error("Operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("Database error: {0:#}")]
    Database(#[from] anyhow::Error),
}

impl LedgerError {
    pub(crate) fn from_store(err: StoreError, currency: &str) -> Self {
        match err {
            StoreError::InsufficientFunds {
                available,
                requested,
            } => LedgerError::InsufficientFunds {
                currency: currency.to_string(),
                available,
                requested,
            },
            StoreError::Overflow => {
                LedgerError::Validation("amount would overflow the balance".to_string())
            }
            StoreError::Storage(err) => LedgerError::Database(err),
        }
    }

    /// Caller-visible classification of this error.
    pub fn status(&self) -> Status {
        match self {
            LedgerError::Validation(_) => Status::BadRequest,
            LedgerError::InsufficientFunds { .. } => Status::InsufficientFunds,
            LedgerError::BalanceNotFound { .. } => Status::NotFound,
            LedgerError::Timeout(_) | LedgerError::Database(_) => Status::InternalError,
        }
    }

    /// Human-readable detail that is safe to hand back to a caller.
    /// Internal failures are reported opaquely; their cause is only logged.
    pub fn detail(&self) -> String {
        match self.status() {
            Status::InternalError => "internal server error".to_string(),
            _ => self.to_string(),
        }
    }
}

impl From<validator::ValidationErrors> for LedgerError {
    fn from(errors: validator::ValidationErrors) -> Self {
        LedgerError::Validation(errors.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Ok,
    BadRequest,
    InsufficientFunds,
    NotFound,
    InternalError,
}

impl Status {
    pub fn of<T>(result: &Result<T, LedgerError>) -> Self {
        match result {
            Ok(_) => Status::Ok,
            Err(err) => err.status(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Ok => "ok",
            Status::BadRequest => "bad_request",
            Status::InsufficientFunds => "insufficient_funds",
            Status::NotFound => "not_found",
            Status::InternalError => "internal_error",
        }
    }

    /// HTTP status a delivery layer should answer with.
    /// Insufficient funds is a client error, not a server fault.
    pub fn http_status(&self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::BadRequest | Status::InsufficientFunds => 400,
            Status::NotFound => 404,
            Status::InternalError => 500,
        }
    }

    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Status::BadRequest | Status::InsufficientFunds | Status::NotFound
        )
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
