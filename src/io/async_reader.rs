//! Asynchronous CSV reader with batch interface
//!
//! Streams request rows with csv-async and hands them out in batches for the async
//! strategy.
//!
//! ```text
//! tokio File → compat → AsyncReader → batches of RequestRecords
//! ```

use crate::io::csv_format::RequestRecord;
use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;

/// Asynchronous CSV reader over replay requests
pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,
    line_num: usize,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self {
            csv_reader,
            line_num: 0,
        }
    }

    /// Read up to `batch_size` request rows
    ///
    /// Rows that fail to parse are logged and skipped. Returns an empty vector at end
    /// of file.
    pub async fn read_batch(&mut self, batch_size: usize) -> Vec<RequestRecord> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut records = self.csv_reader.deserialize::<RequestRecord>();

        while batch.len() < batch_size {
            match records.next().await {
                Some(Ok(record)) => {
                    self.line_num += 1;
                    batch.push(record);
                }
                Some(Err(e)) => {
                    self.line_num += 1;
                    tracing::warn!(line = self.line_num + 1, error = %e, "skipping malformed request row");
                }
                None => break,
            }
        }

        batch
    }
}
