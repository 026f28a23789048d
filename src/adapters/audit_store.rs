//! In-memory append-only audit storage

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use crate::core::traits::AuditRepository;
use crate::types::{AuditEntry, TransactionError, TransactionId};

/// In-memory [`AuditRepository`]
///
/// Entries can only be appended. There is no way to edit or remove one.
#[derive(Debug, Default)]
pub struct InMemoryAuditStore {
    entries: RwLock<Vec<AuditEntry>>,
    fail_appends: AtomicBool,
}

impl InMemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later append fail
    pub fn set_fail_appends(&self, fail: bool) {
        self.fail_appends.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn select(
        &self,
        predicate: impl Fn(&AuditEntry) -> bool,
    ) -> Result<Vec<AuditEntry>, TransactionError> {
        let entries = self
            .entries
            .read()
            .map_err(|_| TransactionError::storage("audit store lock poisoned"))?;
        let mut selected: Vec<AuditEntry> =
            entries.iter().filter(|e| predicate(e)).cloned().collect();
        selected.sort_by_key(|entry| entry.created_at);
        Ok(selected)
    }
}

impl AuditRepository for InMemoryAuditStore {
    fn append(&self, entry: AuditEntry) -> Result<(), TransactionError> {
        if self.fail_appends.load(Ordering::SeqCst) {
            return Err(TransactionError::storage("audit store unavailable"));
        }
        self.entries
            .write()
            .map_err(|_| TransactionError::storage("audit store lock poisoned"))?
            .push(entry);
        Ok(())
    }

    fn by_transaction(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Vec<AuditEntry>, TransactionError> {
        self.select(|entry| entry.transaction_id == transaction_id)
    }

    fn by_user(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AuditEntry>, TransactionError> {
        self.select(|entry| {
            entry.user_id == user_id && entry.created_at >= from && entry.created_at <= to
        })
    }
}
