//! Wallet Ledger CLI
//!
//! Replays wallet operations from a CSV file against the ledger and prints
//! the resulting balances, or one account's history, to stdout.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- operations.csv > balances.csv
//! cargo run -- --strategy sequential operations.csv > balances.csv
//! cargo run -- --strategy concurrent --batch-size 2000 --max-concurrent 8 operations.csv
//! cargo run -- --history 1 --from 2024-01-01 --to 2024-01-31 operations.csv
//! cargo run -- --audit operations.csv
//! RUST_LOG=debug cargo run -- --json-logs operations.csv
//! ```
//!
//! With the `postgres` feature, `--database-url` (or `DATABASE_URL`) replays
//! against PostgreSQL instead of the in-memory store.
//!
//! # Exit Codes
//!
//! - 0: Success
//! - 1: Error (unreadable input, store failure, audit mismatch, etc.)

use std::process;
use std::sync::Arc;
use tracing::{error, info};
use wallet_ledger::cli::{self, CliArgs};
use wallet_ledger::core::{audit, AccountService, Ledger, LedgerStore};
use wallet_ledger::io::{write_accounts_csv, write_history_csv};
use wallet_ledger::store::MemoryStore;
use wallet_ledger::strategy::{self, BatchConfig};
use wallet_ledger::telemetry;
use wallet_ledger::types::ReplayError;

fn main() {
    let args = cli::parse_args();
    telemetry::init_tracing(args.json_logs);

    if let Err(e) = run(args) {
        error!(error = %e, "replay failed");
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run(args: CliArgs) -> Result<(), ReplayError> {
    let batch_config = args.to_batch_config();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(batch_config.max_concurrent_batches)
        .enable_all()
        .build()?;

    runtime.block_on(async {
        #[cfg(feature = "postgres")]
        if let Some(url) = &args.database_url {
            let store = wallet_ledger::store::PgStore::connect(url, args.to_store_config()).await?;
            store.migrate().await?;
            return replay(Arc::new(store), &args, batch_config).await;
        }

        let store = MemoryStore::with_config(args.to_store_config());
        replay(Arc::new(store), &args, batch_config).await
    })
}

async fn replay<S: LedgerStore>(
    store: Arc<S>,
    args: &CliArgs,
    batch_config: BatchConfig,
) -> Result<(), ReplayError> {
    // Reject bad dates before doing any work
    let history_filter = args.history_filter()?;

    let ledger = Ledger::new(Arc::clone(&store));
    let strategy = strategy::create_strategy::<S>(args.strategy, batch_config);
    let summary = strategy.replay(&ledger, &args.input_file).await?;
    info!(?summary, "replay summary");

    if args.audit {
        let report = audit(store.as_ref()).await?;
        if !report.is_clean() {
            return Err(ReplayError::AuditFailed(report.issue_count()));
        }
    }

    let mut output = std::io::stdout().lock();
    match args.history {
        Some(account) => {
            let history = AccountService::new(store)
                .get_transaction_history(account, history_filter)
                .await?;
            write_history_csv(&history, &mut output)?;
        }
        None => {
            let accounts = ledger.list_accounts().await?;
            write_accounts_csv(&accounts, &mut output)?;
        }
    }

    Ok(())
}
