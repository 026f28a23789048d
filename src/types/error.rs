//! Error types for the transaction engine
//!
//! Two layers of errors exist:
//!
//! - [`TransactionError`] is the taxonomy surfaced by the orchestrator to its callers.
//! - [`ServiceError`] is what external collaborators (ledger, user directory,
//!   notification dispatcher) report. The orchestrator and executor translate it into
//!   a [`TransactionError`] depending on the step that failed.
//!
//! # Error Categories
//!
//! - **Request errors**: validation failures, rule violations, unknown users
//! - **Funding errors**: insufficient funds or credit, unknown accounts or cards
//! - **Execution errors**: ledger failures mid-mutation, failed transfer compensation
//! - **Lifecycle errors**: illegal status transitions, operations on the wrong state
//! - **Infrastructure errors**: storage and collaborator outages, audit failures

use rust_decimal::Decimal;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

use super::transaction::{TransactionId, TransactionStatus};

/// Which limit a [`TransactionError::RuleViolation`] tripped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleViolationKind {
    SingleAmountLimit,
    DailyAmountLimit,
    MonthlyAmountLimit,
    OutsideAllowedHours,
}

impl fmt::Display for RuleViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RuleViolationKind::SingleAmountLimit => "single amount limit",
            RuleViolationKind::DailyAmountLimit => "daily amount limit",
            RuleViolationKind::MonthlyAmountLimit => "monthly amount limit",
            RuleViolationKind::OutsideAllowedHours => "allowed hours",
        };
        f.write_str(name)
    }
}

/// Main error type for the transaction engine
///
/// Every variant carries enough context to be written verbatim into a
/// transaction's `failure_reason`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransactionError {
    /// The acting user does not exist in the user directory
    #[error("User {user_id} not found")]
    UserNotFound { user_id: String },

    /// The request is malformed (non-positive amount, missing references, ...)
    ///
    /// Raised before the transaction is persisted.
    #[error("Validation failed: {message}")]
    Validation { message: String },

    /// A limit, approval or allowed-hours rule rejected the transaction
    #[error("Rule violation ({kind}): {message}")]
    RuleViolation {
        kind: RuleViolationKind,
        message: String,
    },

    /// The source account cannot cover the requested amount
    #[error("Insufficient funds in account {account}: available {available}, requested {requested}")]
    InsufficientFunds {
        account: String,
        available: Decimal,
        requested: Decimal,
    },

    /// The credit line cannot cover the requested amount
    #[error("Insufficient credit on {account}: available {available}, requested {requested}")]
    InsufficientCredit {
        account: String,
        available: Decimal,
        requested: Decimal,
    },

    /// The referenced account does not exist or is inactive
    #[error("Account {account} not found or inactive")]
    AccountNotFound { account: String },

    /// The referenced card does not exist or is inactive
    #[error("Card {card} not found or inactive")]
    CardNotFound { card: String },

    /// A ledger call failed while balances were being mutated
    #[error("Execution failed during {stage}: {message}")]
    Execution { stage: String, message: String },

    /// A transfer's deposit leg failed and the compensating deposit failed too
    ///
    /// The source account is left debited. The transaction stays `Failed` and must be
    /// reconciled manually; it is never retried automatically.
    #[error("Transfer {transaction_id} failed and rollback failed - original error: {original}, rollback error: {rollback}")]
    Compensation {
        transaction_id: TransactionId,
        original: String,
        rollback: String,
    },

    /// The requested status change is not an edge of the lifecycle state machine
    #[error("Invalid status transition from {from} to {to}")]
    InvalidTransition {
        from: TransactionStatus,
        to: TransactionStatus,
    },

    /// The operation is not allowed for the transaction's current state
    #[error("Transaction {id} cannot be {operation} in its current state: {status}")]
    InvalidState {
        id: TransactionId,
        status: TransactionStatus,
        operation: String,
    },

    #[error("Transaction {id} not found")]
    TransactionNotFound { id: TransactionId },

    #[error("Rule {id} not found")]
    RuleNotFound { id: Uuid },

    #[error("User {user_id} does not have permission to view transaction {id}")]
    Forbidden { id: TransactionId, user_id: String },

    #[error("Storage error: {message}")]
    Storage { message: String },

    /// A collaborator was unreachable or answered with an unexpected error
    #[error("Collaborator error: {message}")]
    Collaborator { message: String },

    /// Writing an audit entry failed
    ///
    /// Only ever logged; never returned from an orchestrator operation.
    #[error("Audit logging failed: {message}")]
    AuditLogging { message: String },
}

impl TransactionError {
    /// Create a Validation error
    pub fn validation(message: impl Into<String>) -> Self {
        TransactionError::Validation {
            message: message.into(),
        }
    }

    /// Create a RuleViolation error
    pub fn rule_violation(kind: RuleViolationKind, message: impl Into<String>) -> Self {
        TransactionError::RuleViolation {
            kind,
            message: message.into(),
        }
    }

    /// Create an InsufficientFunds error
    pub fn insufficient_funds(account: &str, available: Decimal, requested: Decimal) -> Self {
        TransactionError::InsufficientFunds {
            account: account.to_string(),
            available,
            requested,
        }
    }

    /// Create an InsufficientCredit error
    pub fn insufficient_credit(account: &str, available: Decimal, requested: Decimal) -> Self {
        TransactionError::InsufficientCredit {
            account: account.to_string(),
            available,
            requested,
        }
    }

    /// Create an AccountNotFound error
    pub fn account_not_found(account: &str) -> Self {
        TransactionError::AccountNotFound {
            account: account.to_string(),
        }
    }

    /// Create a CardNotFound error
    pub fn card_not_found(card: &str) -> Self {
        TransactionError::CardNotFound {
            card: card.to_string(),
        }
    }

    /// Create an Execution error
    pub fn execution(stage: &str, message: impl Into<String>) -> Self {
        TransactionError::Execution {
            stage: stage.to_string(),
            message: message.into(),
        }
    }

    /// Create an InvalidState error
    pub fn invalid_state(id: TransactionId, status: TransactionStatus, operation: &str) -> Self {
        TransactionError::InvalidState {
            id,
            status,
            operation: operation.to_string(),
        }
    }

    /// Create a Storage error
    pub fn storage(message: impl Into<String>) -> Self {
        TransactionError::Storage {
            message: message.into(),
        }
    }

    /// Short machine-readable name of the variant, used in replay output
    pub fn kind(&self) -> &'static str {
        match self {
            TransactionError::UserNotFound { .. } => "user_not_found",
            TransactionError::Validation { .. } => "validation_error",
            TransactionError::RuleViolation { .. } => "rule_violation",
            TransactionError::InsufficientFunds { .. } => "insufficient_funds",
            TransactionError::InsufficientCredit { .. } => "insufficient_credit",
            TransactionError::AccountNotFound { .. } => "account_not_found",
            TransactionError::CardNotFound { .. } => "card_not_found",
            TransactionError::Execution { .. } => "execution_error",
            TransactionError::Compensation { .. } => "compensation_error",
            TransactionError::InvalidTransition { .. } => "invalid_transition",
            TransactionError::InvalidState { .. } => "invalid_state",
            TransactionError::TransactionNotFound { .. } => "transaction_not_found",
            TransactionError::RuleNotFound { .. } => "rule_not_found",
            TransactionError::Forbidden { .. } => "forbidden",
            TransactionError::Storage { .. } => "storage_error",
            TransactionError::Collaborator { .. } => "collaborator_error",
            TransactionError::AuditLogging { .. } => "audit_logging_error",
        }
    }
}

/// Error reported by an external collaborator
///
/// Deliberately coarse: collaborators only tell the engine *what kind* of problem
/// occurred. Mapping to the user-facing taxonomy happens in the core.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ServiceError {
    /// The account, card or user does not exist
    #[error("{id} not found")]
    NotFound { id: String },

    /// The ledger refused a debit because it would go below zero (or above the
    /// credit limit for credit usage)
    #[error("Insufficient funds on {id}: available {available}, requested {requested}")]
    InsufficientFunds {
        id: String,
        available: Decimal,
        requested: Decimal,
    },

    /// The collaborator understood the request but refused it
    #[error("Request for {id} rejected: {message}")]
    Rejected { id: String, message: String },

    /// The collaborator could not be reached or failed internally
    #[error("Service unavailable: {message}")]
    Unavailable { message: String },
}

impl ServiceError {
    /// Create a NotFound error
    pub fn not_found(id: &str) -> Self {
        ServiceError::NotFound { id: id.to_string() }
    }

    /// Create a Rejected error
    pub fn rejected(id: &str, message: impl Into<String>) -> Self {
        ServiceError::Rejected {
            id: id.to_string(),
            message: message.into(),
        }
    }

    /// Create an Unavailable error
    pub fn unavailable(message: impl Into<String>) -> Self {
        ServiceError::Unavailable {
            message: message.into(),
        }
    }
}
