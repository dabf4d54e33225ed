use serde::Serialize;

use crate::domain::{Amount, Balance, BalanceHistory};

/// A balance as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceView {
    #[serde(rename = "balance")]
    pub amount: Amount,
    pub currency: String,
}

impl From<Balance> for BalanceView {
    fn from(balance: Balance) -> Self {
        Self {
            amount: balance.amount,
            currency: balance.currency,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceView {
    pub bank_account_number: String,
    pub bank_name: String,
}

/// A history entry as shown to the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryView {
    pub transaction_id: String,
    #[serde(rename = "balance")]
    pub amount: Amount,
    pub currency: String,
    #[serde(rename = "transferProofImg")]
    pub proof_image_url: String,
    pub created_at: i64,
    pub source: SourceView,
}

impl From<BalanceHistory> for HistoryView {
    fn from(entry: BalanceHistory) -> Self {
        Self {
            transaction_id: entry.transaction_id,
            amount: entry.delta,
            currency: entry.currency,
            proof_image_url: entry.proof_image_url,
            created_at: entry.created_at,
            source: SourceView {
                bank_account_number: entry.source.account_number,
                bank_name: entry.source.bank_name,
            },
        }
    }
}

/// Result of a committed withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionReceipt {
    pub transaction_id: String,
    pub currency: String,
    pub remaining_balance: Amount,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BankSource;

    #[test]
    fn test_balance_view_wire_names() {
        let view = BalanceView::from(Balance {
            id: "b-1".to_string(),
            user_id: "user-1".to_string(),
            currency: "IDR".to_string(),
            amount: 250,
        });

        let json = serde_json::to_value(view).unwrap();

        assert_eq!(json, serde_json::json!({ "balance": 250, "currency": "IDR" }));
    }

    #[test]
    fn test_history_view_nests_source() {
        let entry = BalanceHistory {
            id: "h-1".to_string(),
            transaction_id: String::new(),
            user_id: "user-1".to_string(),
            delta: 100,
            currency: "USD".to_string(),
            proof_image_url: "https://bucket.example.com/p.png".to_string(),
            source: BankSource {
                account_number: "1234567890".to_string(),
                bank_name: "Bank Central".to_string(),
            },
            created_at: 1_700_000_000_000,
        };

        let json = serde_json::to_value(HistoryView::from(entry)).unwrap();

        assert_eq!(json["transactionId"], "");
        assert_eq!(json["balance"], 100);
        assert_eq!(json["transferProofImg"], "https://bucket.example.com/p.png");
        assert_eq!(json["createdAt"], 1_700_000_000_000i64);
        assert_eq!(json["source"]["bankAccountNumber"], "1234567890");
        assert_eq!(json["source"]["bankName"], "Bank Central");
    }
}
