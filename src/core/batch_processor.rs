//! Batch processing with account-based partitioning
//!
//! This module provides the `BatchProcessor` struct, which applies a batch of
//! operations concurrently while keeping the result identical to applying them
//! one by one in file order.
//!
//! # Design
//!
//! A batch is first cut at `open` rows. Account IDs are assigned by the store
//! in creation order, so every `open` runs alone, after everything before it
//! and before everything after it.
//!
//! Between two barriers, operations are grouped into lanes: two operations
//! share a lane when they touch a common account, directly or through a chain
//! of other operations (connected components over accounts). Lanes share no
//! account, so their relative order cannot change any balance or outcome.
//! Within a lane, operations run sequentially in file order.
//!
//! # Architecture
//!
//! ```text
//! BatchProcessor
//!     ├── Ledger<S>          (shared request layer)
//!     └── max_concurrent     (lanes in flight at once)
//! ```

use crate::core::ledger::Ledger;
use crate::core::traits::LedgerStore;
use crate::types::{AccountId, LedgerError, OperationRecord, ReplayError};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, error};

/// Outcome of one operation
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    pub record: OperationRecord,

    /// Created account ID for `open`, `None` for postings
    pub result: Result<Option<AccountId>, LedgerError>,
}

/// A run of operations between barriers, or a barrier itself
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Barrier(OperationRecord),
    Parallel(Vec<OperationRecord>),
}

/// Cut a batch at operations that touch no existing account
pub fn split_at_barriers(batch: Vec<OperationRecord>) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut pending = Vec::new();

    for record in batch {
        if record.operation.accounts().is_empty() {
            if !pending.is_empty() {
                segments.push(Segment::Parallel(std::mem::take(&mut pending)));
            }
            segments.push(Segment::Barrier(record));
        } else {
            pending.push(record);
        }
    }
    if !pending.is_empty() {
        segments.push(Segment::Parallel(pending));
    }

    segments
}

/// Group operations into lanes that share no account
///
/// Lanes are returned in order of their first operation, and each lane keeps
/// its operations in input order.
pub fn partition_into_lanes(records: Vec<OperationRecord>) -> Vec<Vec<OperationRecord>> {
    let mut sets = DisjointSet::new(records.len());
    let mut first_seen: HashMap<AccountId, usize> = HashMap::new();

    for (index, record) in records.iter().enumerate() {
        for account in record.operation.accounts() {
            match first_seen.get(&account) {
                Some(&other) => sets.union(index, other),
                None => {
                    first_seen.insert(account, index);
                }
            }
        }
    }

    let mut lane_of_root: HashMap<usize, usize> = HashMap::new();
    let mut lanes: Vec<Vec<OperationRecord>> = Vec::new();
    for (index, record) in records.into_iter().enumerate() {
        let root = sets.find(index);
        let lane = *lane_of_root.entry(root).or_insert_with(|| {
            lanes.push(Vec::new());
            lanes.len() - 1
        });
        lanes[lane].push(record);
    }

    lanes
}

/// Union-find over operation indices
struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(size: usize) -> Self {
        Self {
            parent: (0..size).collect(),
        }
    }

    fn find(&mut self, mut node: usize) -> usize {
        while self.parent[node] != node {
            self.parent[node] = self.parent[self.parent[node]];
            node = self.parent[node];
        }
        node
    }

    fn union(&mut self, a: usize, b: usize) {
        let (root_a, root_b) = (self.find(a), self.find(b));
        if root_a != root_b {
            // Keep the smaller index as root
            let (keep, merge) = if root_a < root_b {
                (root_a, root_b)
            } else {
                (root_b, root_a)
            };
            self.parent[merge] = keep;
        }
    }
}

/// Applies batches of operations concurrently across independent lanes
pub struct BatchProcessor<S: LedgerStore> {
    ledger: Ledger<S>,
    max_concurrent: usize,
}

impl<S: LedgerStore> Clone for BatchProcessor<S> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
            max_concurrent: self.max_concurrent,
        }
    }
}

impl<S: LedgerStore> fmt::Debug for BatchProcessor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchProcessor")
            .field("max_concurrent", &self.max_concurrent)
            .finish_non_exhaustive()
    }
}

impl<S: LedgerStore> BatchProcessor<S> {
    /// # Arguments
    ///
    /// * `ledger` - Request layer every lane applies operations through
    /// * `max_concurrent` - Upper bound on lanes running at once (at least 1)
    pub fn new(ledger: Ledger<S>, max_concurrent: usize) -> Self {
        Self {
            ledger,
            max_concurrent: max_concurrent.max(1),
        }
    }

    /// Apply one lane sequentially in order
    pub async fn process_lane(&self, lane: Vec<OperationRecord>) -> Vec<ProcessingResult> {
        let mut results = Vec::with_capacity(lane.len());

        for record in lane {
            let result = self.ledger.apply(&record.operation).await;
            results.push(ProcessingResult { record, result });
        }

        results
    }

    /// Apply a batch and return every result ordered by line number
    ///
    /// # Errors
    ///
    /// `LaneFailed` if a lane task panicked; its results are lost and the
    /// replay cannot report them.
    pub async fn process_batch(
        &self,
        batch: Vec<OperationRecord>,
    ) -> Result<Vec<ProcessingResult>, ReplayError> {
        let mut results = Vec::with_capacity(batch.len());

        for segment in split_at_barriers(batch) {
            match segment {
                Segment::Barrier(record) => {
                    results.extend(self.process_lane(vec![record]).await);
                }
                Segment::Parallel(records) => {
                    results.extend(self.process_parallel(records).await?);
                }
            }
        }

        results.sort_by_key(|result| result.record.line);
        Ok(results)
    }

    async fn process_parallel(
        &self,
        records: Vec<OperationRecord>,
    ) -> Result<Vec<ProcessingResult>, ReplayError> {
        let lanes = partition_into_lanes(records);
        debug!(lanes = lanes.len(), "running lanes");

        let lane_results: Vec<Vec<ProcessingResult>> = stream::iter(lanes)
            .map(|lane| {
                let processor = self.clone();
                tokio::spawn(async move { processor.process_lane(lane).await })
            })
            .buffer_unordered(self.max_concurrent)
            .try_collect()
            .await
            .inspect_err(|e| error!(error = %e, "lane task failed"))?;

        Ok(lane_results.into_iter().flatten().collect())
    }
}
