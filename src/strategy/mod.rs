//! Replay strategies
//!
//! A strategy reads an operation CSV and applies every row through a
//! [`Ledger`]. Both strategies produce the same final state for the same
//! input; they differ in how much of the work runs concurrently.
//!
//! - `sequential` - one operation at a time, in file order
//! - `concurrent` - batches split into independent lanes run as tokio tasks

use crate::cli::StrategyType;
use crate::core::{Ledger, LedgerStore, ProcessingResult};
use crate::io::AsyncReader;
use crate::types::{ErrorKind, ReplayError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::Path;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};
use tracing::debug;

pub mod concurrent;
pub mod sequential;

pub use concurrent::{BatchConfig, ConcurrentStrategy};
pub use sequential::SequentialStrategy;

/// Counters of one replay run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Operations that succeeded
    pub applied: u64,

    /// Operations the ledger rejected, by error kind
    pub rejected: BTreeMap<ErrorKind, u64>,

    /// Input rows that could not be turned into an operation
    pub skipped_rows: u64,
}

impl ReplaySummary {
    pub fn record(&mut self, result: &ProcessingResult) {
        match &result.result {
            Ok(_) => self.applied += 1,
            Err(e) => {
                debug!(line = result.record.line, error = %e, "operation rejected");
                *self.rejected.entry(e.kind()).or_default() += 1;
            }
        }
    }

    pub fn rejected_total(&self) -> u64 {
        self.rejected.values().sum()
    }
}

/// Replays an operation file against a ledger
// The CSV stream is polled on the caller's task, so the future need not be Send
#[async_trait(?Send)]
pub trait ReplayStrategy<S: LedgerStore>: Send + Sync {
    async fn replay(
        &self,
        ledger: &Ledger<S>,
        input_path: &Path,
    ) -> Result<ReplaySummary, ReplayError>;
}

pub fn create_strategy<S: LedgerStore>(
    strategy_type: StrategyType,
    config: BatchConfig,
) -> Box<dyn ReplayStrategy<S>> {
    match strategy_type {
        StrategyType::Sequential => Box::new(SequentialStrategy::new(config.batch_size)),
        StrategyType::Concurrent => Box::new(ConcurrentStrategy::new(config)),
    }
}

/// Open the input file for batch reading
pub(crate) async fn open_input(
    input_path: &Path,
) -> Result<AsyncReader<Compat<tokio::fs::File>>, ReplayError> {
    let file = tokio::fs::File::open(input_path)
        .await
        .map_err(|source| ReplayError::FileOpen {
            path: input_path.to_path_buf(),
            source,
        })?;

    Ok(AsyncReader::new(file.compat()))
}
