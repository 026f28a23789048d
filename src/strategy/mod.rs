//! Processing strategy module for request replay
//!
//! This module defines the Strategy pattern for complete replay pipelines,
//! encompassing both CSV parsing and orchestration. This allows different processing
//! implementations (synchronous, asynchronous batch) to be selected at runtime.

use crate::cli::StrategyType;
use crate::core::Replayer;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

pub mod r#async;
pub mod batch_processor;
pub mod sync;

pub use self::r#async::{AsyncProcessingStrategy, BatchConfig};
pub use batch_processor::BatchProcessor;
pub use sync::SyncProcessingStrategy;

/// Processing strategy trait for complete replay pipelines
pub trait ProcessingStrategy: Send + Sync {
    /// Replay every request in `input_path` and write one result row per request
    ///
    /// # Arguments
    ///
    /// * `replayer` - Shared replayer wrapping the orchestrator
    /// * `input_path` - Path to the requests CSV file
    /// * `output` - Writer receiving the results CSV
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The input file cannot be opened (file not found, permission denied)
    /// - A fatal I/O error occurs during reading or writing
    ///
    /// A request that fails is not an error here: it becomes a result row and
    /// processing continues with the next one. Rows that cannot be parsed at all are
    /// logged and skipped.
    fn process(
        &self,
        replayer: &Arc<Replayer>,
        input_path: &Path,
        output: &mut dyn Write,
    ) -> Result<(), String>;
}

/// Create a processing strategy based on the specified strategy type
///
/// # Arguments
///
/// * `strategy_type` - The type of processing strategy to create (Sync or Async)
/// * `config` - Optional configuration for async batch processing (ignored for sync)
pub fn create_strategy(
    strategy_type: StrategyType,
    config: Option<BatchConfig>,
) -> Box<dyn ProcessingStrategy> {
    match strategy_type {
        StrategyType::Sync => Box::new(SyncProcessingStrategy),
        StrategyType::Async => {
            let config = config.unwrap_or_default();
            Box::new(AsyncProcessingStrategy::new(config))
        }
    }
}
