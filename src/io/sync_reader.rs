//! Synchronous CSV reader with iterator interface
//!
//! Provides a streaming iterator over the rows of a CSV file, deserialized into a
//! record type from the csv_format module. Conversion to domain types is left to the
//! caller, which knows how to report a bad row.
//!
//! ```no_run
//! use transaction_engine::io::csv_format::RequestRecord;
//! use transaction_engine::io::sync_reader::SyncReader;
//! use std::path::Path;
//!
//! let reader = SyncReader::<RequestRecord>::new(Path::new("requests.csv")).unwrap();
//! for result in reader {
//!     match result {
//!         Ok(record) => println!("Replaying request {}", record.request),
//!         Err(e) => eprintln!("Error: {}", e),
//!     }
//! }
//! ```
//!
//! # Error Handling
//!
//! - Fatal errors (file not found, I/O errors) are returned from `new()`
//! - Individual row parsing errors are yielded as Err variants in the iterator
//! - Line numbers are included in error messages for debugging

use crate::io::csv_format::{convert_account_record, AccountRecord};
use crate::types::Account;
use csv::{ReaderBuilder, Trim};
use serde::de::DeserializeOwned;
use std::fs::File;
use std::marker::PhantomData;
use std::path::Path;

/// Synchronous CSV reader
///
/// Reads one row at a time; memory use does not grow with the file.
#[derive(Debug)]
pub struct SyncReader<T> {
    reader: csv::Reader<File>,
    line_num: usize,
    _record: PhantomData<T>,
}

impl<T: DeserializeOwned> SyncReader<T> {
    /// Open a CSV file for streaming iteration
    ///
    /// The CSV reader is configured to:
    /// - Trim whitespace from all fields
    /// - Allow flexible field counts (trailing optional columns may be omitted)
    /// - Use an 8KB buffer for efficient I/O
    ///
    /// # Errors
    ///
    /// Returns an error message if the file could not be opened.
    pub fn new(path: &Path) -> Result<Self, String> {
        let file = File::open(path)
            .map_err(|e| format!("Failed to open file '{}': {}", path.display(), e))?;

        let reader = ReaderBuilder::new()
            .trim(Trim::All)
            .flexible(true)
            .buffer_capacity(8 * 1024)
            .from_reader(file);

        Ok(Self {
            reader,
            line_num: 0,
            _record: PhantomData,
        })
    }
}

impl<T: DeserializeOwned> Iterator for SyncReader<T> {
    type Item = Result<T, String>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut deserializer = self.reader.deserialize::<T>();
        let result = deserializer.next()?;
        self.line_num += 1;

        // +1 for the header row
        Some(result.map_err(|e| format!("Line {}: CSV parse error: {}", self.line_num + 1, e)))
    }
}

/// Load the accounts file used to seed an in-memory ledger
///
/// Unlike request replay, a bad account row is fatal: the ledger would otherwise start
/// from a state nobody asked for.
pub fn read_accounts(path: &Path) -> Result<Vec<Account>, String> {
    let mut accounts = Vec::new();
    for (index, result) in SyncReader::<AccountRecord>::new(path)?.enumerate() {
        let account = convert_account_record(result?)
            .map_err(|e| format!("Line {}: {}", index + 2, e))?;
        accounts.push(account);
    }
    Ok(accounts)
}
