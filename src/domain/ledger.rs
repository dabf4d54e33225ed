use std::collections::HashMap;

use serde::Serialize;

use super::{Amount, BalanceHistory};

/// Sum history deltas per (user, currency).
/// For a consistent ledger each total equals the matching balance amount.
pub fn sum_deltas_by_key(history: &[BalanceHistory]) -> HashMap<(String, String), Amount> {
    let mut totals: HashMap<(String, String), Amount> = HashMap::new();

    for entry in history {
        *totals
            .entry((entry.user_id.clone(), entry.currency.clone()))
            .or_insert(0) += entry.delta;
    }

    totals
}

/// Persisted figures for one (user, currency) key, as read back from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTotals {
    pub user_id: String,
    pub currency: String,
    /// `None` when history exists but no balance row does
    pub balance: Option<Amount>,
    pub history_total: Amount,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityIssue {
    ConservationMismatch {
        user_id: String,
        currency: String,
        balance: Amount,
        history_total: Amount,
    },
    NegativeBalance {
        user_id: String,
        currency: String,
        balance: Amount,
    },
    MissingBalance {
        user_id: String,
        currency: String,
        history_total: Amount,
    },
}

impl std::fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IntegrityIssue::ConservationMismatch {
                user_id,
                currency,
                balance,
                history_total,
            } => write!(
                f,
                "{}/{}: balance {} does not match history total {}",
                user_id, currency, balance, history_total
            ),
            IntegrityIssue::NegativeBalance {
                user_id,
                currency,
                balance,
            } => write!(f, "{}/{}: negative balance {}", user_id, currency, balance),
            IntegrityIssue::MissingBalance {
                user_id,
                currency,
                history_total,
            } => write!(
                f,
                "{}/{}: history totals {} but no balance row exists",
                user_id, currency, history_total
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct IntegrityReport {
    pub balance_count: i64,
    pub history_count: i64,
    pub issues: Vec<IntegrityIssue>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }
}

pub fn build_integrity_report(
    totals: &[KeyTotals],
    balance_count: i64,
    history_count: i64,
) -> IntegrityReport {
    let mut issues = Vec::new();

    for key in totals {
        match key.balance {
            None => issues.push(IntegrityIssue::MissingBalance {
                user_id: key.user_id.clone(),
                currency: key.currency.clone(),
                history_total: key.history_total,
            }),
            Some(balance) => {
                if balance < 0 {
                    issues.push(IntegrityIssue::NegativeBalance {
                        user_id: key.user_id.clone(),
                        currency: key.currency.clone(),
                        balance,
                    });
                }
                if balance != key.history_total {
                    issues.push(IntegrityIssue::ConservationMismatch {
                        user_id: key.user_id.clone(),
                        currency: key.currency.clone(),
                        balance,
                        history_total: key.history_total,
                    });
                }
            }
        }
    }

    IntegrityReport {
        balance_count,
        history_count,
        issues,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BankSource;

    fn entry(user_id: &str, currency: &str, delta: Amount) -> BalanceHistory {
        BalanceHistory {
            id: format!("{}-{}-{}", user_id, currency, delta),
            transaction_id: String::new(),
            user_id: user_id.to_string(),
            delta,
            currency: currency.to_string(),
            proof_image_url: String::new(),
            source: BankSource::default(),
            created_at: 0,
        }
    }

    fn totals(balance: Option<Amount>, history_total: Amount) -> KeyTotals {
        KeyTotals {
            user_id: "alice".to_string(),
            currency: "USD".to_string(),
            balance,
            history_total,
        }
    }

    #[test]
    fn test_sum_deltas_empty() {
        assert!(sum_deltas_by_key(&[]).is_empty());
    }

    #[test]
    fn test_sum_deltas_groups_by_user_and_currency() {
        let history = vec![
            entry("alice", "USD", 100),
            entry("alice", "USD", -30),
            entry("alice", "EUR", 50),
            entry("bob", "USD", 10),
        ];

        let sums = sum_deltas_by_key(&history);

        assert_eq!(sums.get(&("alice".into(), "USD".into())), Some(&70));
        assert_eq!(sums.get(&("alice".into(), "EUR".into())), Some(&50));
        assert_eq!(sums.get(&("bob".into(), "USD".into())), Some(&10));
    }

    #[test]
    fn test_consistent_ledger_is_healthy() {
        let report = build_integrity_report(&[totals(Some(70), 70)], 1, 2);
        assert!(report.is_healthy());
    }

    #[test]
    fn test_mismatch_is_reported() {
        let report = build_integrity_report(&[totals(Some(80), 70)], 1, 2);
        assert!(matches!(
            report.issues.as_slice(),
            [IntegrityIssue::ConservationMismatch { balance: 80, history_total: 70, .. }]
        ));
    }

    #[test]
    fn test_negative_balance_is_reported() {
        let report = build_integrity_report(&[totals(Some(-5), -5)], 1, 1);
        assert!(matches!(
            report.issues.as_slice(),
            [IntegrityIssue::NegativeBalance { balance: -5, .. }]
        ));
    }

    #[test]
    fn test_history_without_balance_is_reported() {
        let report = build_integrity_report(&[totals(None, 40)], 0, 1);
        assert!(matches!(
            report.issues.as_slice(),
            [IntegrityIssue::MissingBalance { history_total: 40, .. }]
        ));
    }
}
