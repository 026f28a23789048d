//! Thread-safe in-memory transaction storage
//!
//! `InMemoryTransactionStore` keeps transaction records in a `DashMap` keyed by
//! transaction id, so workers handling different transactions never contend on a
//! global lock.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::core::traits::TransactionRepository;
use crate::types::{
    Transaction, TransactionError, TransactionFilters, TransactionId, TransactionStatus,
};

/// In-memory [`TransactionRepository`]
#[derive(Debug, Default)]
pub struct InMemoryTransactionStore {
    transactions: DashMap<TransactionId, Transaction>,
    fail_writes: AtomicBool,
}

impl InMemoryTransactionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later write fail with a storage error
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    /// Snapshot of every stored record, oldest first
    pub fn all(&self) -> Vec<Transaction> {
        let mut all: Vec<Transaction> = self
            .transactions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by_key(|tx| tx.created_at);
        all
    }

    fn check_writable(&self) -> Result<(), TransactionError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(TransactionError::storage("transaction store is read-only"));
        }
        Ok(())
    }
}

impl TransactionRepository for InMemoryTransactionStore {
    fn create(&self, transaction: &Transaction) -> Result<(), TransactionError> {
        self.check_writable()?;
        match self.transactions.entry(transaction.id) {
            Entry::Occupied(_) => Err(TransactionError::storage(format!(
                "transaction {} already exists",
                transaction.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(transaction.clone());
                Ok(())
            }
        }
    }

    fn get(&self, id: TransactionId) -> Result<Option<Transaction>, TransactionError> {
        Ok(self.transactions.get(&id).map(|entry| entry.value().clone()))
    }

    fn update(&self, transaction: &Transaction) -> Result<(), TransactionError> {
        self.check_writable()?;
        match self.transactions.get_mut(&transaction.id) {
            Some(mut entry) => {
                *entry = transaction.clone();
                Ok(())
            }
            None => Err(TransactionError::TransactionNotFound { id: transaction.id }),
        }
    }

    fn list_by_user(
        &self,
        user_id: &str,
        filters: &TransactionFilters,
    ) -> Result<(Vec<Transaction>, usize), TransactionError> {
        let owned = self
            .transactions
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .map(|entry| entry.value().clone())
            .collect::<Vec<_>>();
        Ok(filters.apply(owned))
    }

    fn completed_volume(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Decimal, TransactionError> {
        Ok(self
            .transactions
            .iter()
            .filter(|entry| {
                entry.user_id == user_id
                    && entry.status == TransactionStatus::Completed
                    && entry.created_at >= from
                    && entry.created_at < to
            })
            .map(|entry| entry.amount)
            .sum())
    }
}
