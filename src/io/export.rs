use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::Write;

use crate::application::{BalanceView, HistoryView, LedgerService};
use crate::storage::BalanceStore;

/// Everything the ledger holds for one user
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub user_id: String,
    pub balances: Vec<BalanceView>,
    pub history: Vec<HistoryView>,
}

/// Exporter for converting a user's ledger data to CSV or JSON
pub struct Exporter<'a, S> {
    service: &'a LedgerService<S>,
}

impl<'a, S: BalanceStore> Exporter<'a, S> {
    pub fn new(service: &'a LedgerService<S>) -> Self {
        Self { service }
    }

    /// Export a user's history to CSV format
    pub async fn export_history_csv<W: Write>(&self, user_id: &str, writer: W) -> Result<usize> {
        let history = self.service.get_full_history(user_id).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "created_at",
            "transaction_id",
            "currency",
            "amount",
            "proof_image_url",
            "source_bank_account_number",
            "source_bank_name",
        ])?;

        for entry in &history {
            let created_at = DateTime::<Utc>::from_timestamp_millis(entry.created_at)
                .map(|dt| dt.to_rfc3339())
                .unwrap_or_else(|| entry.created_at.to_string());

            csv_writer.write_record([
                created_at.as_str(),
                entry.transaction_id.as_str(),
                entry.currency.as_str(),
                entry.amount.to_string().as_str(),
                entry.proof_image_url.as_str(),
                entry.source.bank_account_number.as_str(),
                entry.source.bank_name.as_str(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(history.len())
    }

    /// Export a user's balances to CSV format
    pub async fn export_balances_csv<W: Write>(&self, user_id: &str, writer: W) -> Result<usize> {
        let balances = self.service.get_balances(user_id).await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["currency", "amount"])?;
        for balance in &balances {
            csv_writer.write_record([balance.currency.as_str(), balance.amount.to_string().as_str()])?;
        }

        csv_writer.flush()?;
        Ok(balances.len())
    }

    /// Export balances and full history of a user as a JSON snapshot
    pub async fn export_user_json<W: Write>(
        &self,
        user_id: &str,
        mut writer: W,
    ) -> Result<UserSnapshot> {
        let snapshot = UserSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            user_id: user_id.to_string(),
            balances: self.service.get_balances(user_id).await?,
            history: self.service.get_full_history(user_id).await?,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}
