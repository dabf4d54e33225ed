// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use anyhow::Result;
use tabungan::application::{AddBalance, CreateTransaction, LedgerConfig, LedgerService};
use tabungan::domain::{Amount, Clock};
use tabungan::storage::Repository;
use tempfile::TempDir;

/// A clock that only moves when read. Each reading advances it by `step`
/// milliseconds, so consecutive entries get distinct timestamps.
#[derive(Debug)]
pub struct ManualClock {
    now: AtomicI64,
    step: i64,
}

impl ManualClock {
    pub fn new(start_millis: i64, step: i64) -> Self {
        Self {
            now: AtomicI64::new(start_millis),
            step,
        }
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now.fetch_add(self.step, Ordering::SeqCst)
    }
}

pub const PROOF_URL: &str = "https://bucket.example.com/proofs/transfer.png";

/// Helper to create a test service with a temporary database
pub async fn test_service() -> Result<(LedgerService, TempDir)> {
    let temp_dir = TempDir::new()?;
    let config = test_config(&temp_dir);
    let service = LedgerService::init(&config).await?;
    Ok((service, temp_dir))
}

/// Test service whose history timestamps come from a manual clock,
/// starting at `start_millis` and advancing `step_millis` per entry.
pub async fn test_service_with_clock(
    start_millis: i64,
    step_millis: i64,
) -> Result<(LedgerService, Arc<ManualClock>, TempDir)> {
    let temp_dir = TempDir::new()?;
    let config = test_config(&temp_dir);
    let clock = Arc::new(ManualClock::new(start_millis, step_millis));
    let repo = Repository::init(&config.database_url, &config.store)
        .await?
        .with_clock(clock.clone());
    let service = LedgerService::new(repo).configured(&config);
    Ok((service, clock, temp_dir))
}

pub fn test_config(temp_dir: &TempDir) -> LedgerConfig {
    let db_path = temp_dir.path().join("test.db");
    LedgerConfig::for_path(db_path.to_str().unwrap())
}

pub fn deposit(user_id: &str, amount: Amount, currency: &str) -> AddBalance {
    AddBalance {
        user_id: user_id.to_string(),
        bank_account_number: "1234567890".to_string(),
        bank_name: "Bank Central".to_string(),
        amount,
        currency: currency.to_string(),
        proof_image_url: PROOF_URL.to_string(),
    }
}

pub fn withdrawal(user_id: &str, amount: Amount, currency: &str) -> CreateTransaction {
    CreateTransaction {
        user_id: user_id.to_string(),
        bank_account_number: "9876543210".to_string(),
        bank_name: "Other Bank".to_string(),
        currency: currency.to_string(),
        amount,
    }
}
