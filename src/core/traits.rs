//! Core traits for the engine's collaborators and stores
//!
//! This module defines the seams between the orchestration core and everything it
//! talks to. Each trait has an in-memory implementation in [`crate::adapters`];
//! the ledger, user directory and notification dispatcher also have HTTP
//! implementations. All traits are object safe and `Send + Sync` so one set of
//! collaborators can be shared by every worker of the async strategy.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::types::{
    AccountInfo, AuditEntry, RuleId, ServiceError, Transaction, TransactionError,
    TransactionFilters, TransactionId, TransactionRule, UserLimits,
};

/// The system of record for balances
///
/// Implementations must apply `withdraw_funds` and `update_credit_usage` as one
/// atomic check-and-mutate per call: re-check the balance (or credit line) and fail
/// with [`ServiceError::InsufficientFunds`] instead of going negative. The engine's
/// own pre-checks are advisory only.
pub trait AccountLedger: Send + Sync {
    /// Current balance of an account
    fn get_balance(&self, account_id: &str) -> Result<Decimal, ServiceError>;

    /// Credit `amount` and return the new balance
    fn add_funds(
        &self,
        account_id: &str,
        amount: Decimal,
        description: &str,
        reference: &str,
    ) -> Result<Decimal, ServiceError>;

    /// Debit `amount` and return the new balance
    ///
    /// # Errors
    ///
    /// `InsufficientFunds` when the balance cannot cover `amount`; nothing is debited.
    fn withdraw_funds(
        &self,
        account_id: &str,
        amount: Decimal,
        description: &str,
        reference: &str,
    ) -> Result<Decimal, ServiceError>;

    /// Change used credit by `delta` (positive draws, negative repays) and return
    /// the new used credit
    fn update_credit_usage(
        &self,
        account_id: &str,
        delta: Decimal,
        reference: &str,
    ) -> Result<Decimal, ServiceError>;

    fn get_account_info(&self, account_id: &str) -> Result<AccountInfo, ServiceError>;

    fn get_available_credit(&self, account_id: &str) -> Result<Decimal, ServiceError>;

    /// Whether the account exists and is active
    fn validate_account_exists(&self, account_id: &str) -> Result<bool, ServiceError>;
}

/// Source of user identities and their limits
pub trait UserDirectory: Send + Sync {
    /// # Errors
    ///
    /// `NotFound` when the user does not exist.
    fn validate_user(&self, user_id: &str) -> Result<(), ServiceError>;

    /// Limits configured for the user, if any
    fn get_user_limits(&self, user_id: &str) -> Result<Option<UserLimits>, ServiceError>;
}

/// Outbound notifications about completed transactions
pub trait NotificationDispatcher: Send + Sync {
    fn send_transaction_notification(&self, transaction: &Transaction) -> Result<(), ServiceError>;
}

/// Durable storage of transaction records
pub trait TransactionRepository: Send + Sync {
    /// Insert a new record
    fn create(&self, transaction: &Transaction) -> Result<(), TransactionError>;

    fn get(&self, id: TransactionId) -> Result<Option<Transaction>, TransactionError>;

    /// Replace an existing record
    fn update(&self, transaction: &Transaction) -> Result<(), TransactionError>;

    /// One page of a user's transactions and the total number of matches
    fn list_by_user(
        &self,
        user_id: &str,
        filters: &TransactionFilters,
    ) -> Result<(Vec<Transaction>, usize), TransactionError>;

    /// Sum of a user's completed transactions created in `[from, to)`
    fn completed_volume(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Decimal, TransactionError>;
}

/// Storage of transaction rules
pub trait RuleRepository: Send + Sync {
    fn create(&self, rule: &TransactionRule) -> Result<(), TransactionError>;

    fn get(&self, id: RuleId) -> Result<Option<TransactionRule>, TransactionError>;

    fn update(&self, rule: &TransactionRule) -> Result<(), TransactionError>;

    /// Returns whether a rule was removed
    fn delete(&self, id: RuleId) -> Result<bool, TransactionError>;

    /// Every rule scoped to the user, ordered by creation time
    fn rules_for_user(&self, user_id: &str) -> Result<Vec<TransactionRule>, TransactionError>;
}

/// Append-only storage of audit entries
pub trait AuditRepository: Send + Sync {
    fn append(&self, entry: AuditEntry) -> Result<(), TransactionError>;

    /// Entries of one transaction, oldest first
    fn by_transaction(&self, transaction_id: TransactionId)
        -> Result<Vec<AuditEntry>, TransactionError>;

    /// Entries of one user created in `[from, to]`, oldest first
    fn by_user(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AuditEntry>, TransactionError>;
}

/// Source of the current time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
