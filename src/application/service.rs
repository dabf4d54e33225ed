use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{error, info, instrument, warn};
use validator::Validate;

use crate::domain::{
    Amount, BankSource, IdGenerator, IntegrityReport, MutationRequest, TimeOrderedIds,
    build_integrity_report, is_iso4217,
};
use crate::storage::{BalanceStore, Repository};

use super::{
    AddBalance, BalanceView, CreateTransaction, HistoryQuery, HistoryView, LedgerConfig,
    LedgerError, Status, TransactionReceipt,
};

/// Application service providing the ledger operations.
/// This is the primary interface for any delivery layer (CLI, HTTP, etc.).
///
/// Every operation runs under the configured deadline. When it expires the
/// in-flight store call is dropped, which rolls its transaction back.
pub struct LedgerService<S = Repository> {
    store: S,
    ids: Arc<dyn IdGenerator>,
    operation_timeout: Duration,
    default_history_limit: i64,
}

impl LedgerService<Repository> {
    /// Open (creating if needed) and migrate the database described by `config`.
    pub async fn init(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let repo = Repository::init(&config.database_url, &config.store).await?;
        Ok(Self::new(repo).configured(config))
    }

    /// Connect to an existing, already migrated database.
    pub async fn connect(config: &LedgerConfig) -> Result<Self, LedgerError> {
        let repo = Repository::connect(&config.database_url, &config.store).await?;
        Ok(Self::new(repo).configured(config))
    }
}

impl<S: BalanceStore> LedgerService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            ids: Arc::new(TimeOrderedIds),
            operation_timeout: Duration::from_secs(10),
            default_history_limit: LedgerConfig::DEFAULT_HISTORY_LIMIT,
        }
    }

    pub fn configured(mut self, config: &LedgerConfig) -> Self {
        self.operation_timeout = config.operation_timeout;
        self.default_history_limit = config.default_history_limit;
        self
    }

    /// Use a different generator for transaction identifiers.
    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ========================
    // Mutations
    // ========================

    /// Credit the user's balance with a proven external deposit.
    /// Returns the balance after the deposit.
    #[instrument(skip(self, payload), fields(user_id = %payload.user_id, currency = %payload.currency))]
    pub async fn add_balance(&self, payload: AddBalance) -> Result<Amount, LedgerError> {
        payload.validate()?;

        let request = MutationRequest::credit(payload.user_id, payload.currency, payload.amount)
            .with_proof(payload.proof_image_url)
            .with_source(BankSource {
                account_number: payload.bank_account_number,
                bank_name: payload.bank_name,
            });

        self.apply(request).await
    }

    /// Debit the user's balance for a transfer to an external account.
    #[instrument(skip(self, payload), fields(user_id = %payload.user_id, currency = %payload.currency))]
    pub async fn create_transaction(
        &self,
        payload: CreateTransaction,
    ) -> Result<TransactionReceipt, LedgerError> {
        payload.validate()?;

        let transaction_id = self.ids.next_id();
        let currency = payload.currency.clone();
        let request = MutationRequest::debit(
            payload.user_id,
            payload.currency,
            payload.amount,
            transaction_id.clone(),
        )
        .with_source(BankSource {
            account_number: payload.bank_account_number,
            bank_name: payload.bank_name,
        });

        let remaining_balance = self.apply(request).await?;

        Ok(TransactionReceipt {
            transaction_id,
            currency,
            remaining_balance,
        })
    }

    async fn apply(&self, request: MutationRequest) -> Result<Amount, LedgerError> {
        let currency = request.currency.clone();
        let delta = request.delta;

        let result = self
            .with_deadline(async {
                self.store
                    .mutate(request)
                    .await
                    .map_err(|err| LedgerError::from_store(err, &currency))
            })
            .await;

        match &result {
            Ok(new_amount) => info!(delta, new_amount, "balance updated"),
            Err(err) if err.status() == Status::InternalError => {
                error!(delta, error = %err, "balance mutation failed")
            }
            Err(err) => warn!(delta, reason = %err, "balance mutation rejected"),
        }

        result
    }

    // ========================
    // Queries
    // ========================

    /// All balances held by the user, largest first.
    #[instrument(skip(self))]
    pub async fn get_balances(&self, user_id: &str) -> Result<Vec<BalanceView>, LedgerError> {
        require_user(user_id)?;

        let balances = self
            .with_deadline(async { self.store.get_balances(user_id).await.map_err(internal) })
            .await?;

        Ok(balances.into_iter().map(BalanceView::from).collect())
    }

    /// The user's balance in one currency.
    #[instrument(skip(self))]
    pub async fn get_balance(
        &self,
        user_id: &str,
        currency: &str,
    ) -> Result<BalanceView, LedgerError> {
        require_user(user_id)?;
        if !is_iso4217(currency) {
            return Err(LedgerError::Validation(format!(
                "currency: '{}' is not an ISO 4217 code",
                currency
            )));
        }

        let balance = self
            .with_deadline(async {
                self.store
                    .get_balance(user_id, currency)
                    .await
                    .map_err(internal)
            })
            .await?;

        balance
            .map(BalanceView::from)
            .ok_or_else(|| LedgerError::BalanceNotFound {
                user_id: user_id.to_string(),
                currency: currency.to_string(),
            })
    }

    /// A page of the user's history, newest first.
    #[instrument(skip(self, query), fields(user_id = %query.user_id))]
    pub async fn get_balances_history(
        &self,
        query: HistoryQuery,
    ) -> Result<Vec<HistoryView>, LedgerError> {
        require_user(&query.user_id)?;

        let limit = query.limit.unwrap_or(self.default_history_limit);
        let offset = query.offset.unwrap_or(0);
        if limit < 0 || offset < 0 {
            return Err(LedgerError::Validation(
                "limit and offset must not be negative".to_string(),
            ));
        }

        let history = self
            .with_deadline(async {
                self.store
                    .get_history(&query.user_id, limit, offset)
                    .await
                    .map_err(internal)
            })
            .await?;

        Ok(history.into_iter().map(HistoryView::from).collect())
    }

    /// The user's entire history, newest first, as one consistent snapshot.
    #[instrument(skip(self))]
    pub async fn get_full_history(&self, user_id: &str) -> Result<Vec<HistoryView>, LedgerError> {
        require_user(user_id)?;

        let history = self
            .with_deadline(async { self.store.get_full_history(user_id).await.map_err(internal) })
            .await?;

        Ok(history.into_iter().map(HistoryView::from).collect())
    }

    /// Number of history entries recorded for the user.
    pub async fn count_history(&self, user_id: &str) -> Result<i64, LedgerError> {
        require_user(user_id)?;
        self.with_deadline(async { self.store.count_history(user_id).await.map_err(internal) })
            .await
    }

    /// Recheck conservation and non-negativity over everything persisted.
    #[instrument(skip(self))]
    pub async fn check_integrity(&self) -> Result<IntegrityReport, LedgerError> {
        let stats = self
            .with_deadline(async { self.store.integrity_stats().await.map_err(internal) })
            .await?;

        let report =
            build_integrity_report(&stats.keys, stats.balance_count, stats.history_count);

        for issue in &report.issues {
            warn!(%issue, "ledger integrity issue");
        }

        Ok(report)
    }

    async fn with_deadline<T, F>(&self, operation: F) -> Result<T, LedgerError>
    where
        F: Future<Output = Result<T, LedgerError>>,
    {
        match tokio::time::timeout(self.operation_timeout, operation).await {
            Ok(result) => result,
            Err(_) => {
                error!(timeout = ?self.operation_timeout, "ledger operation timed out");
                Err(LedgerError::Timeout(self.operation_timeout))
            }
        }
    }
}

fn require_user(user_id: &str) -> Result<(), LedgerError> {
    if user_id.is_empty() {
        return Err(LedgerError::Validation("user_id is required".to_string()));
    }
    Ok(())
}

/// Reads never reject on business rules, so any store error is internal.
fn internal(err: crate::storage::StoreError) -> LedgerError {
    LedgerError::from_store(err, "")
}
