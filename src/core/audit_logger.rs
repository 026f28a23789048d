//! Audit logging
//!
//! The `AuditLogger` appends one immutable [`AuditEntry`] per state-affecting
//! operation. Writing is fire-and-forget: a failed append is reported through
//! `tracing` and never reaches the caller, so an audit outage cannot fail or roll
//! back a money movement.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::core::traits::{AuditRepository, Clock};
use crate::types::{AuditChange, AuditEntry, TransactionError, TransactionId};

pub struct AuditLogger {
    store: Arc<dyn AuditRepository>,
    clock: Arc<dyn Clock>,
}

impl AuditLogger {
    pub fn new(store: Arc<dyn AuditRepository>, clock: Arc<dyn Clock>) -> Self {
        AuditLogger { store, clock }
    }

    /// Append an entry for `change`
    ///
    /// Never fails. An append error is logged at `warn` with the transaction id and
    /// action, then dropped.
    pub fn log_change(&self, change: AuditChange) {
        let transaction_id = change.transaction_id;
        let action = change.action;
        let entry = change.into_entry(self.clock.now());

        if let Err(e) = self.store.append(entry) {
            let error = TransactionError::AuditLogging {
                message: e.to_string(),
            };
            tracing::warn!(
                transaction_id = %transaction_id,
                action = %action,
                error = %error,
                "audit entry dropped"
            );
        }
    }

    /// Full history of a transaction, oldest first
    pub fn get_audit_trail(
        &self,
        transaction_id: TransactionId,
    ) -> Result<Vec<AuditEntry>, TransactionError> {
        self.store.by_transaction(transaction_id)
    }

    /// History of every transaction owned by a user within `[from, to]`, oldest first
    pub fn get_user_audit_trail(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AuditEntry>, TransactionError> {
        self.store.by_user(user_id, from, to)
    }
}
