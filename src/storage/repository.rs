use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use tracing::debug;

use crate::domain::{
    Amount, Balance, BalanceHistory, BankSource, Clock, IdGenerator, KeyTotals, MutationRequest,
    SystemClock, TimeOrderedIds, apply_delta,
};

use super::{BalanceStore, IntegrityStats, MIGRATION_001_INITIAL, StoreError};

/// Connection settings for the SQLite store.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub max_connections: u32,
    /// How long a writer waits for the database lock before failing
    pub busy_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            max_connections: 8,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// SQLite-backed balance store.
pub struct Repository {
    pool: SqlitePool,
    ids: Arc<dyn IdGenerator>,
    clock: Arc<dyn Clock>,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            ids: Arc::new(TimeOrderedIds),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Connect to a SQLite database, creating the file if it doesn't exist.
    /// The database runs in WAL mode so readers never block the writer.
    pub async fn connect(database_url: &str, options: &StoreOptions) -> Result<Self> {
        let connect_options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("Invalid database URL: {}", database_url))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(options.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(options.max_connections)
            .connect_with(connect_options)
            .await
            .context("Failed to connect to database")?;

        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;
        Ok(())
    }

    /// Initialize a database (connect + migrate).
    pub async fn init(database_url: &str, options: &StoreOptions) -> Result<Self> {
        let repo = Self::connect(database_url, options).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    fn row_to_balance(row: &sqlx::sqlite::SqliteRow) -> Balance {
        Balance {
            id: row.get("id"),
            user_id: row.get("user_id"),
            currency: row.get("currency"),
            amount: row.get("amount"),
        }
    }

    fn row_to_history(row: &sqlx::sqlite::SqliteRow) -> BalanceHistory {
        BalanceHistory {
            id: row.get("id"),
            transaction_id: row.get("transaction_id"),
            user_id: row.get("user_id"),
            delta: row.get("delta"),
            currency: row.get("currency"),
            proof_image_url: row.get("proof_image_url"),
            source: BankSource {
                account_number: row.get("source_bank_account_number"),
                bank_name: row.get("source_bank_name"),
            },
            created_at: row.get("created_at"),
        }
    }
}

impl BalanceStore for Repository {
    async fn mutate(&self, request: MutationRequest) -> Result<Amount, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        // Claim the key first. A write statement takes SQLite's write lock for
        // the rest of the transaction, so no concurrent mutation can read the
        // amount below until this one commits or rolls back.
        let claimed = sqlx::query(
            r#"
            INSERT INTO balances (id, user_id, currency, amount)
            VALUES (?, ?, ?, 0)
            ON CONFLICT (user_id, currency) DO NOTHING
            "#,
        )
        .bind(self.ids.next_id())
        .bind(&request.user_id)
        .bind(&request.currency)
        .execute(&mut *tx)
        .await
        .context("Failed to claim balance row")?;
        let created = claimed.rows_affected() == 1;

        let row = sqlx::query("SELECT id, amount FROM balances WHERE user_id = ? AND currency = ?")
            .bind(&request.user_id)
            .bind(&request.currency)
            .fetch_one(&mut *tx)
            .await
            .context("Failed to read balance")?;
        let balance_id: String = row.get("id");
        let current: Amount = row.get("amount");

        let new_amount = match apply_delta((!created).then_some(current), request.delta) {
            Ok(amount) => amount,
            Err(rejected) => {
                tx.rollback()
                    .await
                    .context("Failed to roll back rejected mutation")?;
                return Err(rejected.into());
            }
        };

        sqlx::query("UPDATE balances SET amount = ? WHERE id = ?")
            .bind(new_amount)
            .bind(&balance_id)
            .execute(&mut *tx)
            .await
            .context("Failed to update balance")?;

        sqlx::query(
            r#"
            INSERT INTO balances_history (id, transaction_id, user_id, delta, currency, proof_image_url, source_bank_account_number, source_bank_name, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(self.ids.next_id())
        .bind(request.transaction_id.as_deref().unwrap_or_default())
        .bind(&request.user_id)
        .bind(request.delta)
        .bind(&request.currency)
        .bind(request.proof_image_url.as_deref().unwrap_or_default())
        .bind(&request.source.account_number)
        .bind(&request.source.bank_name)
        .bind(self.clock.now_millis())
        .execute(&mut *tx)
        .await
        .context("Failed to append balance history")?;

        tx.commit().await.context("Failed to commit mutation")?;

        debug!(
            user_id = %request.user_id,
            currency = %request.currency,
            delta = request.delta,
            new_amount,
            "mutation committed"
        );

        Ok(new_amount)
    }

    async fn get_balances(&self, user_id: &str) -> Result<Vec<Balance>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, user_id, currency, amount
            FROM balances
            WHERE user_id = ?
            ORDER BY amount DESC, currency
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list balances")?;

        Ok(rows.iter().map(Self::row_to_balance).collect())
    }

    async fn get_balance(
        &self,
        user_id: &str,
        currency: &str,
    ) -> Result<Option<Balance>, StoreError> {
        let row = sqlx::query(
            r#"
            SELECT id, user_id, currency, amount
            FROM balances
            WHERE user_id = ? AND currency = ?
            "#,
        )
        .bind(user_id)
        .bind(currency)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch balance")?;

        Ok(row.as_ref().map(Self::row_to_balance))
    }

    async fn get_history(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<BalanceHistory>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT id, transaction_id, user_id, delta, currency, proof_image_url, source_bank_account_number, source_bank_name, created_at
            FROM balances_history
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list balance history")?;

        Ok(rows.iter().map(Self::row_to_history).collect())
    }

    async fn get_full_history(&self, user_id: &str) -> Result<Vec<BalanceHistory>, StoreError> {
        // One statement reads one WAL snapshot, so concurrent commits cannot
        // shift or duplicate rows the way offset paging would.
        let rows = sqlx::query(
            r#"
            SELECT id, transaction_id, user_id, delta, currency, proof_image_url, source_bank_account_number, source_bank_name, created_at
            FROM balances_history
            WHERE user_id = ?
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .context("Failed to read full balance history")?;

        Ok(rows.iter().map(Self::row_to_history).collect())
    }

    async fn count_history(&self, user_id: &str) -> Result<i64, StoreError> {
        let count: i64 =
            sqlx::query("SELECT COUNT(*) as count FROM balances_history WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(&self.pool)
                .await
                .context("Failed to count balance history")?
                .get("count");
        Ok(count)
    }

    async fn integrity_stats(&self) -> Result<IntegrityStats, StoreError> {
        let balance_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM balances")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count balances")?
            .get("count");

        let history_count: i64 = sqlx::query("SELECT COUNT(*) as count FROM balances_history")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count balance history")?
            .get("count");

        // Every key that has history, plus balance rows that have none
        let rows = sqlx::query(
            r#"
            SELECT h.user_id AS user_id, h.currency AS currency,
                   MAX(b.amount) AS balance, SUM(h.delta) AS history_total
            FROM balances_history h
            LEFT JOIN balances b ON b.user_id = h.user_id AND b.currency = h.currency
            GROUP BY h.user_id, h.currency
            UNION ALL
            SELECT b.user_id, b.currency, b.amount, 0
            FROM balances b
            WHERE NOT EXISTS (
                SELECT 1 FROM balances_history h
                WHERE h.user_id = b.user_id AND h.currency = b.currency
            )
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to compute ledger totals")?;

        let keys = rows
            .iter()
            .map(|row| KeyTotals {
                user_id: row.get("user_id"),
                currency: row.get("currency"),
                balance: row.get("balance"),
                history_total: row.get("history_total"),
            })
            .collect();

        Ok(IntegrityStats {
            balance_count,
            history_count,
            keys,
        })
    }
}
