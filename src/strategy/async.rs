//! Asynchronous batch processing strategy
//!
//! ```text
//! AsyncProcessingStrategy
//!     ├── BatchConfig (batch_size, max_concurrent_batches)
//!     ├── AsyncReader (batch CSV reading)
//!     └── BatchProcessor (user partitioning + blocking workers)
//!         └── Replayer → TransactionOrchestrator
//! ```
//!
//! Batches are processed one after another so a user's rows keep their order across
//! batch boundaries. Within a batch, users are replayed in parallel. Rows of
//! different users have no ordering guarantee relative to each other, so a
//! lifecycle row should only target the acting user's own earlier requests.

use crate::core::Replayer;
use crate::io::async_reader::AsyncReader;
use crate::io::csv_format::write_results_csv;
use crate::strategy::{BatchProcessor, ProcessingStrategy};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Configuration for batch processing
#[derive(Clone, Debug)]
pub struct BatchConfig {
    /// Number of request rows per batch
    pub batch_size: usize,
    /// Maximum number of users replayed concurrently
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
    /// Create a BatchConfig; zero values fall back to the defaults
    pub fn new(batch_size: usize, max_concurrent_batches: usize) -> Self {
        let default = Self::default();

        let batch_size = if batch_size == 0 {
            tracing::warn!(
                batch_size,
                default = default.batch_size,
                "invalid batch size, using default"
            );
            default.batch_size
        } else {
            batch_size
        };

        let max_concurrent_batches = if max_concurrent_batches == 0 {
            tracing::warn!(
                max_concurrent_batches,
                default = default.max_concurrent_batches,
                "invalid concurrency, using default"
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

/// Asynchronous batch processing strategy
#[derive(Debug, Clone)]
pub struct AsyncProcessingStrategy {
    config: BatchConfig,
}

impl AsyncProcessingStrategy {
    pub fn new(config: BatchConfig) -> Self {
        Self { config }
    }
}

impl ProcessingStrategy for AsyncProcessingStrategy {
    /// Replay the requests batch by batch
    ///
    /// 1. Creates a tokio multi-threaded runtime sized from the config
    /// 2. Reads request rows in batches using AsyncReader
    /// 3. Replays each batch, users in parallel, and waits before reading the next
    /// 4. Writes all result rows, sorted by request number
    fn process(
        &self,
        replayer: &Arc<Replayer>,
        input_path: &Path,
        output: &mut dyn Write,
    ) -> Result<(), String> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(self.config.max_concurrent_batches)
            .max_blocking_threads(self.config.max_concurrent_batches)
            .build()
            .map_err(|e| format!("Failed to create tokio runtime: {}", e))?;

        let processor = BatchProcessor::new(Arc::clone(replayer));

        let outcomes = runtime.block_on(async {
            let file = tokio::fs::File::open(input_path)
                .await
                .map_err(|e| format!("Failed to open file '{}': {}", input_path.display(), e))?;

            // csv-async reads futures::io, tokio files implement tokio::io
            let compat_file = tokio_util::compat::TokioAsyncReadCompatExt::compat(file);
            let mut reader = AsyncReader::new(compat_file);

            let mut outcomes = Vec::new();
            loop {
                let batch = reader.read_batch(self.config.batch_size).await;
                if batch.is_empty() {
                    break;
                }
                outcomes.extend(processor.process_batch(batch).await);
            }
            Ok::<_, String>(outcomes)
        })?;

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        tracing::info!(requests = outcomes.len(), failed, "replay finished");

        write_results_csv(&outcomes, output)
    }
}
