use std::time::Duration;

use anyhow::{Context, Result};
use chrono::DateTime;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::application::{
    AddBalance, CreateTransaction, HistoryQuery, LedgerConfig, LedgerError, LedgerService,
};
use crate::domain::{format_amount, minor_unit_exponent, parse_amount};

/// Tabungan - balance ledger
#[derive(Parser)]
#[command(name = "tabungan")]
#[command(about = "A per-user, per-currency balance ledger with an append-only audit trail")]
#[command(version)]
pub struct Cli {
    /// Database file path
    #[arg(short, long, env = "TABUNGAN_DATABASE", default_value = "tabungan.db")]
    pub database: String,

    /// Maximum number of pooled database connections
    #[arg(long, env = "TABUNGAN_MAX_CONNECTIONS", default_value_t = 8)]
    pub max_connections: u32,

    /// Deadline for each ledger operation, in milliseconds
    #[arg(long, env = "TABUNGAN_OPERATION_TIMEOUT_MS", default_value_t = 10_000)]
    pub operation_timeout_ms: u64,

    /// How long a writer waits for the database lock, in milliseconds
    #[arg(long, env = "TABUNGAN_BUSY_TIMEOUT_MS", default_value_t = 5_000)]
    pub busy_timeout_ms: u64,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new database
    Init,

    /// Credit a user's balance from an external bank transfer
    Deposit {
        /// Amount in major units (e.g., "50.00" or "50")
        amount: String,

        /// User receiving the deposit
        #[arg(short, long)]
        user: String,

        /// ISO 4217 currency code (e.g., USD, IDR)
        #[arg(short, long)]
        currency: String,

        /// Sender bank account number
        #[arg(long)]
        account: String,

        /// Sender bank name
        #[arg(long)]
        bank: String,

        /// URL of the transfer proof image
        #[arg(long)]
        proof: String,
    },

    /// Debit a user's balance for a transfer to an external bank account
    Withdraw {
        /// Amount in major units (e.g., "50.00" or "50")
        amount: String,

        /// User sending the money
        #[arg(short, long)]
        user: String,

        /// ISO 4217 currency code
        #[arg(short, long)]
        currency: String,

        /// Recipient bank account number
        #[arg(long)]
        account: String,

        /// Recipient bank name
        #[arg(long)]
        bank: String,
    },

    /// Show all balances of a user
    Balances {
        #[arg(short, long)]
        user: String,
    },

    /// Show a user's balance in one currency
    Balance {
        /// ISO 4217 currency code
        currency: String,

        #[arg(short, long)]
        user: String,
    },

    /// List a user's balance history, newest first
    History {
        #[arg(short, long)]
        user: String,

        /// Maximum number of entries to show (default 10)
        #[arg(short, long)]
        limit: Option<i64>,

        /// Number of entries to skip
        #[arg(short, long)]
        offset: Option<i64>,
    },

    /// Verify ledger integrity
    Check,

    /// Export a user's data to CSV or JSON
    Export {
        /// What to export: history, balances, full
        export_type: String,

        #[arg(short, long)]
        user: String,

        /// Output file (stdout if omitted)
        #[arg(short, long)]
        output: Option<String>,
    },
}

impl Cli {
    pub fn config(&self) -> LedgerConfig {
        LedgerConfig::for_path(&self.database)
            .with_max_connections(self.max_connections)
            .with_busy_timeout(Duration::from_millis(self.busy_timeout_ms))
            .with_operation_timeout(Duration::from_millis(self.operation_timeout_ms))
    }

    /// Install the global tracing subscriber. `RUST_LOG` overrides the level.
    pub fn init_tracing(&self) {
        let default_level = if self.verbose { "debug" } else { "warn" };
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(format!("tabungan={}", default_level)));

        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr);

        if self.log_json {
            builder.json().init();
        } else {
            builder.init();
        }
    }

    pub async fn run(self) -> Result<()> {
        let config = self.config();

        match self.command {
            Commands::Init => {
                LedgerService::init(&config).await?;
                println!("Database initialized: {}", self.database);
            }

            Commands::Deposit {
                amount,
                user,
                currency,
                account,
                bank,
                proof,
            } => {
                let service = LedgerService::init(&config).await?;
                let exponent = currency_exponent(&currency)?;
                let amount = parse_amount(&amount, exponent)
                    .context("Invalid amount format. Use '50.00' or '50'")?;

                let balance = service
                    .add_balance(AddBalance {
                        user_id: user,
                        bank_account_number: account,
                        bank_name: bank,
                        amount,
                        currency: currency.clone(),
                        proof_image_url: proof,
                    })
                    .await
                    .map_err(rejected)?;

                println!(
                    "Deposited {} {} (balance: {} {})",
                    format_amount(amount, exponent),
                    currency,
                    format_amount(balance, exponent),
                    currency
                );
            }

            Commands::Withdraw {
                amount,
                user,
                currency,
                account,
                bank,
            } => {
                let service = LedgerService::init(&config).await?;
                let exponent = currency_exponent(&currency)?;
                let amount = parse_amount(&amount, exponent)
                    .context("Invalid amount format. Use '50.00' or '50'")?;

                let receipt = service
                    .create_transaction(CreateTransaction {
                        user_id: user,
                        bank_account_number: account,
                        bank_name: bank,
                        currency: currency.clone(),
                        amount,
                    })
                    .await
                    .map_err(rejected)?;

                println!(
                    "Withdrew {} {} ({})",
                    format_amount(amount, exponent),
                    currency,
                    receipt.transaction_id
                );
                println!(
                    "Remaining balance: {} {}",
                    format_amount(receipt.remaining_balance, exponent),
                    currency
                );
            }

            Commands::Balances { user } => {
                let service = LedgerService::init(&config).await?;
                let balances = service.get_balances(&user).await.map_err(rejected)?;

                if balances.is_empty() {
                    println!("No balances found.");
                } else {
                    println!("{:<8} {:>16}", "CURRENCY", "BALANCE");
                    println!("{}", "-".repeat(25));
                    for balance in balances {
                        println!(
                            "{:<8} {:>16}",
                            balance.currency,
                            display_amount(balance.amount, &balance.currency)
                        );
                    }
                }
            }

            Commands::Balance { currency, user } => {
                let service = LedgerService::init(&config).await?;
                let balance = service
                    .get_balance(&user, &currency)
                    .await
                    .map_err(rejected)?;
                println!(
                    "{}: {} {}",
                    user,
                    display_amount(balance.amount, &balance.currency),
                    balance.currency
                );
            }

            Commands::History {
                user,
                limit,
                offset,
            } => {
                let service = LedgerService::init(&config).await?;
                let query = HistoryQuery {
                    user_id: user,
                    limit,
                    offset,
                };
                let history = service
                    .get_balances_history(query)
                    .await
                    .map_err(rejected)?;

                if history.is_empty() {
                    println!("No history found.");
                } else {
                    println!(
                        "{:<20} {:>14} {:<8} {:<38} {}",
                        "DATE", "AMOUNT", "CURRENCY", "TRANSACTION", "BANK"
                    );
                    println!("{}", "-".repeat(100));
                    for entry in history {
                        let date = DateTime::from_timestamp_millis(entry.created_at)
                            .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
                            .unwrap_or_else(|| entry.created_at.to_string());
                        let transaction = if entry.transaction_id.is_empty() {
                            "(deposit)".to_string()
                        } else {
                            entry.transaction_id
                        };
                        println!(
                            "{:<20} {:>14} {:<8} {:<38} {} {}",
                            date,
                            display_amount(entry.amount, &entry.currency),
                            entry.currency,
                            transaction,
                            entry.source.bank_name,
                            entry.source.bank_account_number
                        );
                    }
                }
            }

            Commands::Check => {
                let service = LedgerService::init(&config).await?;
                run_check_command(&service).await?;
            }

            Commands::Export {
                export_type,
                user,
                output,
            } => {
                let service = LedgerService::init(&config).await?;
                run_export_command(&service, &export_type, &user, output.as_deref()).await?;
            }
        }

        Ok(())
    }
}

fn currency_exponent(currency: &str) -> Result<u32> {
    minor_unit_exponent(currency)
        .ok_or_else(|| anyhow::anyhow!("'{}' is not an ISO 4217 currency code", currency))
}

fn display_amount(amount: i64, currency: &str) -> String {
    format_amount(amount, minor_unit_exponent(currency).unwrap_or(0))
}

/// Turn a ledger error into the message shown to the operator.
fn rejected(err: LedgerError) -> anyhow::Error {
    anyhow::anyhow!("{}: {}", err.status(), err)
}

async fn run_check_command(service: &LedgerService) -> Result<()> {
    println!("Checking ledger integrity...\n");

    let report = service.check_integrity().await?;

    println!("Balances: {}", report.balance_count);
    println!("History:  {}", report.history_count);
    println!();

    if report.is_healthy() {
        println!("Ledger is consistent.");
    } else {
        println!("Issues found:");
        for issue in &report.issues {
            println!("  - {}", issue);
        }
        anyhow::bail!("Ledger integrity check failed");
    }

    Ok(())
}

async fn run_export_command(
    service: &LedgerService,
    export_type: &str,
    user: &str,
    output: Option<&str>,
) -> Result<()> {
    use crate::io::Exporter;
    use std::fs::File;
    use std::io::{Write, stdout};

    let exporter = Exporter::new(service);

    let writer: Box<dyn Write> = match output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {}", path))?;
            Box::new(file)
        }
        None => Box::new(stdout()),
    };

    match export_type {
        "history" => {
            let count = exporter.export_history_csv(user, writer).await?;
            if output.is_some() {
                eprintln!("Exported {} history entries", count);
            }
        }
        "balances" => {
            let count = exporter.export_balances_csv(user, writer).await?;
            if output.is_some() {
                eprintln!("Exported {} balances", count);
            }
        }
        "full" => {
            let snapshot = exporter.export_user_json(user, writer).await?;
            if output.is_some() {
                eprintln!(
                    "Exported {} balances and {} history entries for {}",
                    snapshot.balances.len(),
                    snapshot.history.len(),
                    snapshot.user_id
                );
            }
        }
        other => anyhow::bail!(
            "Unknown export type '{}'. Valid types: history, balances, full",
            other
        ),
    }

    Ok(())
}
