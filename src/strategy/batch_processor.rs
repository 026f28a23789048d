//! Batch processing with user-based partitioning for the async strategy
//!
//! The `BatchProcessor` partitions a batch of request rows by acting user, so rows of
//! different users are replayed concurrently while each user's rows keep their file
//! order.
//!
//! The orchestrator is blocking (the HTTP adapters use a blocking client), so every
//! partition runs on tokio's blocking pool rather than as an async task.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::Replayer;
use crate::io::csv_format::RequestRecord;
use crate::types::ReplayOutcome;

/// Batch processor with user-based partitioning
#[derive(Clone)]
pub struct BatchProcessor {
    replayer: Arc<Replayer>,
}

impl BatchProcessor {
    pub fn new(replayer: Arc<Replayer>) -> Self {
        Self { replayer }
    }

    /// Partition a batch of rows by acting user
    ///
    /// # Guarantees
    ///
    /// - Each row appears in exactly one sub-batch
    /// - Rows of each user keep their original order
    pub fn partition_by_user(
        &self,
        batch: Vec<RequestRecord>,
    ) -> HashMap<String, Vec<RequestRecord>> {
        let mut user_batches: HashMap<String, Vec<RequestRecord>> = HashMap::new();

        for record in batch {
            user_batches
                .entry(record.user.clone())
                .or_default()
                .push(record);
        }

        user_batches
    }

    /// Replay all rows of one user sequentially
    pub fn process_user_requests(&self, records: Vec<RequestRecord>) -> Vec<ReplayOutcome> {
        records
            .into_iter()
            .map(|record| self.replayer.replay(record))
            .collect()
    }

    /// Replay a batch with one blocking worker per user
    ///
    /// Results come back grouped by user, not in file order.
    pub async fn process_batch(&self, batch: Vec<RequestRecord>) -> Vec<ReplayOutcome> {
        let tasks = self
            .partition_by_user(batch)
            .into_values()
            .map(|records| {
                let processor = self.clone();
                tokio::task::spawn_blocking(move || processor.process_user_requests(records))
            });

        let mut results = Vec::new();
        for joined in futures::future::join_all(tasks).await {
            match joined {
                Ok(user_results) => results.extend(user_results),
                Err(e) => tracing::error!(error = %e, "replay worker panicked"),
            }
        }

        results
    }
}
