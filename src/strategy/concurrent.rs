//! Concurrent replay
//!
//! Reads the input in batches and hands each batch to a `BatchProcessor`,
//! which runs operations on disjoint accounts as concurrent tokio tasks.
//! Batches themselves are applied one after another, so every operation in a
//! batch sees the effects of all earlier batches.

use crate::core::{BatchProcessor, Ledger, LedgerStore};
use crate::strategy::{open_input, ReplayStrategy, ReplaySummary};
use crate::types::ReplayError;
use async_trait::async_trait;
use std::path::Path;
use tracing::{info, warn};

/// Configuration for batch replay
#[derive(Clone, Debug)]
pub struct BatchConfig {
    /// Number of operations read per batch
    pub batch_size: usize,

    /// Maximum number of lanes in flight at once, also used as the runtime's
    /// worker thread count
    pub max_concurrent_batches: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_concurrent_batches: num_cpus::get(),
        }
    }
}

impl BatchConfig {
    /// Create a new BatchConfig, falling back to defaults for zero values
    pub fn new(batch_size: usize, max_concurrent_batches: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            warn!(
                default = default.batch_size,
                "invalid batch_size (0), using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent_batches = if max_concurrent_batches == 0 {
            warn!(
                default = default.max_concurrent_batches,
                "invalid max_concurrent_batches (0), using default"
            );
            default.max_concurrent_batches
        } else {
            max_concurrent_batches
        };

        Self {
            batch_size,
            max_concurrent_batches,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConcurrentStrategy {
    config: BatchConfig,
}

impl ConcurrentStrategy {
    pub fn new(config: BatchConfig) -> Self {
        Self { config }
    }
}

#[async_trait(?Send)]
impl<S: LedgerStore> ReplayStrategy<S> for ConcurrentStrategy {
    async fn replay(
        &self,
        ledger: &Ledger<S>,
        input_path: &Path,
    ) -> Result<ReplaySummary, ReplayError> {
        let mut reader = open_input(input_path).await?;
        let processor = BatchProcessor::new(ledger.clone(), self.config.max_concurrent_batches);
        let mut summary = ReplaySummary::default();

        loop {
            let batch = reader.read_batch(self.config.batch_size).await;
            if batch.is_empty() {
                break;
            }

            for result in processor.process_batch(batch).await? {
                summary.record(&result);
            }
        }

        summary.skipped_rows = reader.skipped();
        info!(
            applied = summary.applied,
            rejected = summary.rejected_total(),
            skipped = summary.skipped_rows,
            "concurrent replay finished"
        );
        Ok(summary)
    }
}
