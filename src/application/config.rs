use std::time::Duration;

use crate::storage::StoreOptions;

/// Runtime settings for a ledger service backed by SQLite.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub database_url: String,
    pub store: StoreOptions,
    /// Deadline applied to every ledger operation
    pub operation_timeout: Duration,
    /// Page size used when a history query does not give one
    pub default_history_limit: i64,
}

impl LedgerConfig {
    pub const DEFAULT_HISTORY_LIMIT: i64 = 10;

    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            store: StoreOptions::default(),
            operation_timeout: Duration::from_secs(10),
            default_history_limit: Self::DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Config for a database file on disk.
    pub fn for_path(database_path: &str) -> Self {
        Self::new(format!("sqlite:{}", database_path))
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn with_max_connections(mut self, max_connections: u32) -> Self {
        self.store.max_connections = max_connections;
        self
    }

    pub fn with_busy_timeout(mut self, busy_timeout: Duration) -> Self {
        self.store.busy_timeout = busy_timeout;
        self
    }
}
