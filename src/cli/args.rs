// CLI arguments parsing using clap

use crate::core::validation::parse_date;
use crate::store::StoreConfig;
use crate::strategy::BatchConfig;
use crate::types::{AccountId, HistoryFilter, LedgerError};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments for the wallet ledger replay tool
#[derive(Parser, Debug)]
#[command(name = "wallet-ledger")]
#[command(
    about = "Replay wallet operations against a double-entry ledger",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the input CSV file (required)
    #[arg(value_name = "INPUT", help = "Path to the operation CSV file")]
    pub input_file: PathBuf,

    /// Replay strategy
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "concurrent",
        help = "Replay strategy: 'sequential' or 'concurrent'"
    )]
    pub strategy: StrategyType,

    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of operations per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Maximum number of lanes processing concurrently (default: CPU cores)"
    )]
    pub max_concurrent_batches: Option<usize>,

    #[arg(
        long = "lock-timeout-ms",
        value_name = "MILLIS",
        default_value_t = 5000,
        help = "How long a unit of work waits for a balance lock"
    )]
    pub lock_timeout_ms: u64,

    /// Print this account's history instead of the balances
    #[arg(long = "history", value_name = "ACCOUNT")]
    pub history: Option<AccountId>,

    #[arg(
        long = "from",
        value_name = "YYYY-MM-DD",
        requires = "history",
        help = "Earliest transaction date to include (inclusive)"
    )]
    pub from: Option<String>,

    #[arg(
        long = "to",
        value_name = "YYYY-MM-DD",
        requires = "history",
        help = "Latest transaction date to include (inclusive)"
    )]
    pub to: Option<String>,

    /// Verify balances against the ledger after the replay
    #[arg(long = "audit")]
    pub audit: bool,

    /// Emit logs as JSON lines on stderr
    #[arg(long = "json-logs")]
    pub json_logs: bool,

    /// PostgreSQL connection string; the in-memory store is used when absent
    #[cfg(feature = "postgres")]
    #[arg(long = "database-url", env = "DATABASE_URL", value_name = "URL")]
    pub database_url: Option<String>,
}

/// Available replay strategies
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    /// One operation at a time in file order
    Sequential,
    /// Independent accounts processed concurrently
    Concurrent,
}

impl CliArgs {
    /// Convert CLI arguments to BatchConfig
    ///
    /// If custom values are provided via CLI, uses them. Otherwise, uses defaults.
    /// Invalid values (0) will fall back to defaults via BatchConfig::new()
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_some() || self.max_concurrent_batches.is_some() {
            let default = BatchConfig::default();
            BatchConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.max_concurrent_batches
                    .unwrap_or(default.max_concurrent_batches),
            )
        } else {
            BatchConfig::default()
        }
    }

    pub fn to_store_config(&self) -> StoreConfig {
        StoreConfig::new(Duration::from_millis(self.lock_timeout_ms))
    }

    /// Parse the `--from`/`--to` bounds
    pub fn history_filter(&self) -> Result<HistoryFilter, LedgerError> {
        let start_date = self
            .from
            .as_deref()
            .map(|value| parse_date("--from", value))
            .transpose()?;
        let end_date = self
            .to
            .as_deref()
            .map(|value| parse_date("--to", value))
            .transpose()?;
        Ok(HistoryFilter::new(start_date, end_date))
    }
}
