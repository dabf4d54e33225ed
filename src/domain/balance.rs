use serde::{Deserialize, Serialize};

use super::Amount;

/// The authoritative balance row for one (user, currency) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Balance {
    pub id: String,
    pub user_id: String,
    /// ISO 4217 code
    pub currency: String,
    /// Minor units, never negative once committed
    pub amount: Amount,
}

/// Bank account a deposit came from, or a withdrawal went to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BankSource {
    pub account_number: String,
    pub bank_name: String,
}

/// Append-only audit record of one committed mutation.
/// History rows are never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceHistory {
    pub id: String,
    /// Empty for deposits, generated for withdrawals
    pub transaction_id: String,
    pub user_id: String,
    /// Signed amount applied to the balance
    pub delta: Amount,
    pub currency: String,
    /// Proof-of-transfer image, present for deposits
    pub proof_image_url: String,
    pub source: BankSource,
    /// Milliseconds since the Unix epoch
    pub created_at: i64,
}

/// A single credit or debit handed to the store. Built per call, consumed once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRequest {
    pub user_id: String,
    pub currency: String,
    /// Positive credits, negative debits
    pub delta: Amount,
    pub transaction_id: Option<String>,
    pub proof_image_url: Option<String>,
    pub source: BankSource,
}

impl MutationRequest {
    pub fn credit(user_id: impl Into<String>, currency: impl Into<String>, amount: Amount) -> Self {
        Self {
            user_id: user_id.into(),
            currency: currency.into(),
            delta: amount,
            transaction_id: None,
            proof_image_url: None,
            source: BankSource::default(),
        }
    }

    pub fn debit(
        user_id: impl Into<String>,
        currency: impl Into<String>,
        amount: Amount,
        transaction_id: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            currency: currency.into(),
            delta: -amount,
            transaction_id: Some(transaction_id.into()),
            proof_image_url: None,
            source: BankSource::default(),
        }
    }

    pub fn with_proof(mut self, proof_image_url: impl Into<String>) -> Self {
        self.proof_image_url = Some(proof_image_url.into());
        self
    }

    pub fn with_source(mut self, source: BankSource) -> Self {
        self.source = source;
        self
    }
}

/// Compute the amount a balance holds after applying `delta`.
///
/// `current` is `None` when no row exists yet for the key; a debit against a
/// missing balance is rejected the same way as one that would overdraw.
pub fn apply_delta(current: Option<Amount>, delta: Amount) -> Result<Amount, MutationRejected> {
    let available = current.unwrap_or(0);
    let candidate = available
        .checked_add(delta)
        .ok_or(MutationRejected::Overflow)?;

    if candidate < 0 || (current.is_none() && delta < 0) {
        return Err(MutationRejected::InsufficientFunds {
            available,
            requested: delta.unsigned_abs(),
        });
    }

    Ok(candidate)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRejected {
    InsufficientFunds { available: Amount, requested: u64 },
    Overflow,
}

impl std::fmt::Display for MutationRejected {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MutationRejected::InsufficientFunds {
                available,
                requested,
            } => write!(
                f,
                "balance is not enough: available {}, requested {}",
                available, requested
            ),
            MutationRejected::Overflow => write!(f, "balance would overflow"),
        }
    }
}

impl std::error::Error for MutationRejected {}
