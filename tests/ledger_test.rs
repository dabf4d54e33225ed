mod common;

use anyhow::Result;
use common::{PROOF_URL, deposit, test_service, test_service_with_clock, withdrawal};
use tabungan::application::{HistoryQuery, LedgerError, Status};
use tabungan::domain::sum_deltas_by_key;
use tabungan::storage::BalanceStore;

#[tokio::test]
async fn test_first_deposit_creates_balance_and_history() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let balance = service.add_balance(deposit("alice", 100, "USD")).await?;
    assert_eq!(balance, 100);

    let balances = service.get_balances("alice").await?;
    assert_eq!(balances.len(), 1);
    assert_eq!(balances[0].amount, 100);
    assert_eq!(balances[0].currency, "USD");

    let history = service
        .get_balances_history(HistoryQuery::new("alice"))
        .await?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].amount, 100);
    assert_eq!(history[0].transaction_id, "");
    assert_eq!(history[0].proof_image_url, PROOF_URL);

    Ok(())
}

#[tokio::test]
async fn test_withdrawal_debits_and_records_transaction_id() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service.add_balance(deposit("alice", 100, "USD")).await?;

    let receipt = service
        .create_transaction(withdrawal("alice", 30, "USD"))
        .await?;

    assert_eq!(receipt.remaining_balance, 70);
    assert_eq!(receipt.currency, "USD");
    assert!(!receipt.transaction_id.is_empty());

    let balance = service.get_balance("alice", "USD").await?;
    assert_eq!(balance.amount, 70);

    let history = service
        .get_balances_history(HistoryQuery::new("alice"))
        .await?;
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].amount, -30);
    assert_eq!(history[0].transaction_id, receipt.transaction_id);
    assert_eq!(history[0].proof_image_url, "");
    assert_eq!(history[0].source.bank_name, "Other Bank");

    Ok(())
}

#[tokio::test]
async fn test_overdraw_leaves_ledger_untouched() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service.add_balance(deposit("alice", 100, "USD")).await?;
    service
        .create_transaction(withdrawal("alice", 30, "USD"))
        .await?;
    let entries_before = service.count_history("alice").await?;

    let err = service
        .create_transaction(withdrawal("alice", 1000, "USD"))
        .await
        .unwrap_err();

    assert_eq!(err.status(), Status::InsufficientFunds);
    assert!(matches!(
        err,
        LedgerError::InsufficientFunds {
            available: 70,
            requested: 1000,
            ..
        }
    ));
    assert_eq!(service.get_balance("alice", "USD").await?.amount, 70);
    assert_eq!(service.count_history("alice").await?, entries_before);

    Ok(())
}

#[tokio::test]
async fn test_history_page_returns_most_recent_first() -> Result<()> {
    let (service, _clock, _temp) = test_service_with_clock(1_700_000_000_000, 1_000).await?;
    service.add_balance(deposit("alice", 100, "USD")).await?;
    let receipt = service
        .create_transaction(withdrawal("alice", 30, "USD"))
        .await?;

    let page = service
        .get_balances_history(HistoryQuery::new("alice").limit(1).offset(0))
        .await?;

    assert_eq!(page.len(), 1);
    assert_eq!(page[0].amount, -30);
    assert_eq!(page[0].transaction_id, receipt.transaction_id);
    assert_eq!(page[0].created_at, 1_700_000_001_000);

    Ok(())
}

#[tokio::test]
async fn test_invalid_currency_writes_nothing() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let result = service.add_balance(deposit("alice", 100, "US")).await;

    assert_eq!(Status::of(&result), Status::BadRequest);
    assert_eq!(service.count_history("alice").await?, 0);
    assert!(service.get_balances("alice").await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_debit_without_balance_is_insufficient_funds() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let result = service
        .create_transaction(withdrawal("bob", 10, "EUR"))
        .await;

    assert_eq!(Status::of(&result), Status::InsufficientFunds);
    assert!(service.get_balances("bob").await?.is_empty());
    assert_eq!(service.count_history("bob").await?, 0);

    let missing = service.get_balance("bob", "EUR").await;
    assert_eq!(Status::of(&missing), Status::NotFound);

    Ok(())
}

#[tokio::test]
async fn test_withdrawing_entire_balance_reaches_zero() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service.add_balance(deposit("alice", 250, "IDR")).await?;

    let receipt = service
        .create_transaction(withdrawal("alice", 250, "IDR"))
        .await?;

    assert_eq!(receipt.remaining_balance, 0);
    assert_eq!(service.get_balance("alice", "IDR").await?.amount, 0);

    let rejected = service
        .create_transaction(withdrawal("alice", 1, "IDR"))
        .await;
    assert_eq!(Status::of(&rejected), Status::InsufficientFunds);

    Ok(())
}

#[tokio::test]
async fn test_currencies_and_users_are_independent() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service.add_balance(deposit("alice", 500, "USD")).await?;
    service.add_balance(deposit("alice", 20, "EUR")).await?;
    service.add_balance(deposit("bob", 75, "USD")).await?;

    let result = service
        .create_transaction(withdrawal("alice", 50, "EUR"))
        .await;
    assert_eq!(Status::of(&result), Status::InsufficientFunds);

    let alice = service.get_balances("alice").await?;
    assert_eq!(alice.len(), 2);
    // Largest balance first
    assert_eq!(alice[0].currency, "USD");
    assert_eq!(alice[0].amount, 500);
    assert_eq!(alice[1].currency, "EUR");
    assert_eq!(alice[1].amount, 20);

    assert_eq!(service.get_balance("bob", "USD").await?.amount, 75);

    Ok(())
}

#[tokio::test]
async fn test_zero_deposit_is_recorded() -> Result<()> {
    let (service, _temp) = test_service().await?;

    let balance = service.add_balance(deposit("alice", 0, "USD")).await?;

    assert_eq!(balance, 0);
    assert_eq!(service.count_history("alice").await?, 1);
    assert_eq!(service.get_balance("alice", "USD").await?.amount, 0);

    Ok(())
}

#[tokio::test]
async fn test_history_sums_to_balances() -> Result<()> {
    let (service, _temp) = test_service().await?;
    service.add_balance(deposit("alice", 1_000, "USD")).await?;
    service.add_balance(deposit("alice", 300, "JPY")).await?;
    service
        .create_transaction(withdrawal("alice", 250, "USD"))
        .await?;
    service
        .create_transaction(withdrawal("alice", 400, "JPY"))
        .await
        .unwrap_err();
    service
        .create_transaction(withdrawal("alice", 100, "JPY"))
        .await?;

    let history = service.store().get_history("alice", 100, 0).await?;
    let totals = sum_deltas_by_key(&history);

    for balance in service.get_balances("alice").await? {
        let key = ("alice".to_string(), balance.currency.clone());
        assert_eq!(totals.get(&key).copied(), Some(balance.amount));
    }

    let report = service.check_integrity().await?;
    assert!(report.is_healthy(), "issues: {:?}", report.issues);
    assert_eq!(report.balance_count, 2);
    assert_eq!(report.history_count, 4);

    Ok(())
}

#[tokio::test]
async fn test_reopening_database_keeps_ledger() -> Result<()> {
    let temp_dir = tempfile::TempDir::new()?;
    let config = common::test_config(&temp_dir);

    {
        let service = tabungan::LedgerService::init(&config).await?;
        service.add_balance(deposit("alice", 42, "USD")).await?;
        service.store().close().await;
    }

    let service = tabungan::LedgerService::connect(&config).await?;
    assert_eq!(service.get_balance("alice", "USD").await?.amount, 42);
    assert_eq!(service.count_history("alice").await?, 1);

    Ok(())
}
