//! Synchronous processing strategy
//!
//! Replays requests one at a time, in file order, on the calling thread. CSV parsing
//! is delegated to `SyncReader`, orchestration to the `Replayer` and output to
//! `csv_format::write_results_csv`.

use crate::core::Replayer;
use crate::io::csv_format::{write_results_csv, RequestRecord};
use crate::io::sync_reader::SyncReader;
use crate::strategy::ProcessingStrategy;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

/// Synchronous processing strategy
///
/// ```no_run
/// use transaction_engine::strategy::{ProcessingStrategy, SyncProcessingStrategy};
/// # fn run(replayer: std::sync::Arc<transaction_engine::core::Replayer>) {
/// let mut output = std::io::stdout();
/// SyncProcessingStrategy
///     .process(&replayer, std::path::Path::new("requests.csv"), &mut output)
///     .expect("Processing failed");
/// # }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct SyncProcessingStrategy;

impl ProcessingStrategy for SyncProcessingStrategy {
    fn process(
        &self,
        replayer: &Arc<Replayer>,
        input_path: &Path,
        output: &mut dyn Write,
    ) -> Result<(), String> {
        let reader = SyncReader::<RequestRecord>::new(input_path)?;

        let mut outcomes = Vec::new();
        for result in reader {
            match result {
                Ok(record) => outcomes.push(replayer.replay(record)),
                Err(e) => tracing::warn!(error = %e, "skipping malformed request row"),
            }
        }

        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        tracing::info!(requests = outcomes.len(), failed, "replay finished");

        write_results_csv(&outcomes, output)
    }
}
