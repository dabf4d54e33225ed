use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use validator::{Validate, ValidationError};

use crate::domain::is_iso4217;

/// Proof images must live on an http(s) host with a dotted domain name.
static PROOF_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^https?://[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)+(:\d+)?(/\S*)?$")
        .expect("proof URL pattern is valid")
});

fn validate_currency_code(code: &str) -> Result<(), ValidationError> {
    if is_iso4217(code) {
        Ok(())
    } else {
        Err(ValidationError::new("iso4217"))
    }
}

fn validate_proof_url(url: &str) -> Result<(), ValidationError> {
    if PROOF_URL.is_match(url) {
        Ok(())
    } else {
        Err(ValidationError::new("proof_url"))
    }
}

/// A deposit into the user's balance, backed by proof of an external transfer.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AddBalance {
    /// Authenticated user, filled in by the caller rather than the payload
    #[serde(skip)]
    #[validate(length(min = 1))]
    pub user_id: String,

    #[serde(rename = "senderBankAccountNumber")]
    #[validate(length(min = 5, max = 30))]
    pub bank_account_number: String,

    #[serde(rename = "senderBankName")]
    #[validate(length(min = 3, max = 30))]
    pub bank_name: String,

    /// Minor units; zero is accepted
    #[serde(rename = "addedBalance")]
    #[validate(range(min = 0))]
    pub amount: i64,

    #[validate(custom = "validate_currency_code")]
    pub currency: String,

    #[serde(rename = "transferProofImg")]
    #[validate(url, custom = "validate_proof_url")]
    pub proof_image_url: String,
}

/// A withdrawal to an external bank account.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateTransaction {
    #[serde(skip)]
    #[validate(length(min = 1))]
    pub user_id: String,

    #[serde(rename = "recipientBankAccountNumber")]
    #[validate(length(min = 5, max = 30))]
    pub bank_account_number: String,

    #[serde(rename = "recipientBankName")]
    #[validate(length(min = 3, max = 30))]
    pub bank_name: String,

    #[serde(rename = "fromCurrency")]
    #[validate(custom = "validate_currency_code")]
    pub currency: String,

    /// Minor units; must be positive
    #[serde(rename = "balances")]
    #[validate(range(min = 1))]
    pub amount: i64,
}

/// Pagination for a user's history. Missing values fall back to the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HistoryQuery {
    #[serde(skip)]
    pub user_id: String,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl HistoryQuery {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            limit: None,
            offset: None,
        }
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }
}
