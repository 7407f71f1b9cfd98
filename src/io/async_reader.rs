//! Asynchronous CSV reader with a batch interface
//!
//! Wraps `csv_async` to read operation rows in batches. Rows that fail to
//! parse or convert are logged and skipped; they never end a read. Each
//! accepted operation is tagged with its line number so results can be
//! reported in file order.

use crate::io::csv_format::{convert_csv_operation, CsvOperation};
use crate::types::OperationRecord;
use csv_async::AsyncReaderBuilder;
use futures::io::AsyncRead;
use futures::stream::StreamExt;
use tracing::warn;

/// Asynchronous reader of operation rows
pub struct AsyncReader<R: AsyncRead + Unpin> {
    csv_reader: csv_async::AsyncDeserializer<R>,
    /// Data rows consumed so far, valid or not
    rows_read: u64,
    skipped: u64,
}

impl<R: AsyncRead + Unpin + Send + 'static> AsyncReader<R> {
    pub fn new(reader: R) -> Self {
        let csv_reader = AsyncReaderBuilder::new()
            .flexible(true)
            .trim(csv_async::Trim::All)
            .create_deserializer(reader);

        Self {
            csv_reader,
            rows_read: 0,
            skipped: 0,
        }
    }

    /// Read up to `batch_size` valid operations
    ///
    /// # Returns
    ///
    /// The operations in file order; an empty batch means the input is
    /// exhausted.
    pub async fn read_batch(&mut self, batch_size: usize) -> Vec<OperationRecord> {
        let mut batch = Vec::with_capacity(batch_size);
        let mut rows = self.csv_reader.deserialize::<CsvOperation>();

        while batch.len() < batch_size {
            let Some(row) = rows.next().await else {
                break;
            };
            self.rows_read += 1;
            // Header is line 1
            let line = self.rows_read + 1;

            match row {
                Ok(csv_operation) => match convert_csv_operation(csv_operation) {
                    Ok(operation) => batch.push(OperationRecord { line, operation }),
                    Err(e) => {
                        self.skipped += 1;
                        warn!(line, error = %e, "skipping invalid row");
                    }
                },
                Err(e) => {
                    self.skipped += 1;
                    warn!(line, error = %e, "skipping unparseable row");
                }
            }
        }

        batch
    }

    /// Rows skipped so far
    pub fn skipped(&self) -> u64 {
        self.skipped
    }
}
