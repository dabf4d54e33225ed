mod repository;

use std::future::Future;

use thiserror::Error;

use crate::domain::{Amount, Balance, BalanceHistory, KeyTotals, MutationRejected, MutationRequest};

pub use repository::*;

/// SQL migration for the balances and history tables
pub const MIGRATION_001_INITIAL: &str = include_str!("migrations/001_initial.sql");

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds { available: Amount, requested: u64 },

    #[error("Balance would overflow")]
    Overflow,

    #[error("Storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl From<MutationRejected> for StoreError {
    fn from(rejected: MutationRejected) -> Self {
        match rejected {
            MutationRejected::InsufficientFunds {
                available,
                requested,
            } => StoreError::InsufficientFunds {
                available,
                requested,
            },
            MutationRejected::Overflow => StoreError::Overflow,
        }
    }
}

/// Store-wide figures used to verify the ledger invariants.
#[derive(Debug, Clone, Default)]
pub struct IntegrityStats {
    pub balance_count: i64,
    pub history_count: i64,
    pub keys: Vec<KeyTotals>,
}

/// Persistence contract for balances and their history.
///
/// `mutate` is the only write path. It applies one signed delta to the
/// (user, currency) balance and appends the matching history entry as a single
/// atomic unit: either both are committed or neither is. Mutations of the same
/// key must serialize. Dropping a returned future before it completes must
/// leave no partial state behind.
pub trait BalanceStore: Send + Sync {
    /// Apply a mutation and return the resulting balance amount.
    fn mutate(
        &self,
        request: MutationRequest,
    ) -> impl Future<Output = Result<Amount, StoreError>> + Send;

    /// All balances of a user, largest amount first.
    fn get_balances(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<Balance>, StoreError>> + Send;

    fn get_balance(
        &self,
        user_id: &str,
        currency: &str,
    ) -> impl Future<Output = Result<Option<Balance>, StoreError>> + Send;

    /// A page of a user's history, newest first.
    fn get_history(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> impl Future<Output = Result<Vec<BalanceHistory>, StoreError>> + Send;

    /// Every history entry of a user, newest first, read as one snapshot.
    fn get_full_history(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Vec<BalanceHistory>, StoreError>> + Send;

    fn count_history(&self, user_id: &str)
    -> impl Future<Output = Result<i64, StoreError>> + Send;

    fn integrity_stats(&self) -> impl Future<Output = Result<IntegrityStats, StoreError>> + Send;
}
