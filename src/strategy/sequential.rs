//! Sequential replay
//!
//! Applies operations one at a time in file order. Rows are still read in
//! batches to bound memory, but each operation completes before the next
//! starts.

use crate::core::{Ledger, LedgerStore, ProcessingResult};
use crate::strategy::{open_input, ReplayStrategy, ReplaySummary};
use crate::types::ReplayError;
use async_trait::async_trait;
use std::path::Path;
use tracing::info;

#[derive(Debug, Clone, Copy)]
pub struct SequentialStrategy {
    batch_size: usize,
}

impl SequentialStrategy {
    pub fn new(batch_size: usize) -> Self {
        Self {
            batch_size: batch_size.max(1),
        }
    }
}

#[async_trait(?Send)]
impl<S: LedgerStore> ReplayStrategy<S> for SequentialStrategy {
    async fn replay(
        &self,
        ledger: &Ledger<S>,
        input_path: &Path,
    ) -> Result<ReplaySummary, ReplayError> {
        let mut reader = open_input(input_path).await?;
        let mut summary = ReplaySummary::default();

        loop {
            let batch = reader.read_batch(self.batch_size).await;
            if batch.is_empty() {
                break;
            }

            for record in batch {
                let result = ledger.apply(&record.operation).await;
                summary.record(&ProcessingResult { record, result });
            }
        }

        summary.skipped_rows = reader.skipped();
        info!(
            applied = summary.applied,
            rejected = summary.rejected_total(),
            skipped = summary.skipped_rows,
            "sequential replay finished"
        );
        Ok(summary)
    }
}
