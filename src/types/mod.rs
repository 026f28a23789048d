//! Types module
//!
//! Contains core data structures used throughout the application.
//! This module organizes types into logical submodules:
//! - `account`: Ledger-side account types and user limits
//! - `transaction`: Transaction record, types, statuses and creation requests
//! - `rule`: Transaction rules and their merge semantics
//! - `audit`: Audit trail entries
//! - `filter`: Listing filters
//! - `replay`: Replay commands and result rows
//! - `error`: Error types for the transaction engine

pub mod account;
pub mod audit;
pub mod error;
pub mod filter;
pub mod replay;
pub mod rule;
pub mod transaction;

pub use account::{Account, AccountId, AccountInfo, AccountType, UserId, UserLimits};
pub use audit::{AuditAction, AuditChange, AuditEntry};
pub use error::{RuleViolationKind, ServiceError, TransactionError};
pub use filter::{OrderBy, SortOrder, TransactionFilters};
pub use replay::{ReplayAction, ReplayCommand, ReplayOutcome, RequestNo};
pub use rule::{AllowedHours, RuleId, RuleLimits, RulePatch, RuleScope, TransactionRule};
pub use transaction::{
    BalanceSnapshot, CreateTransactionRequest, LedgerRef, MutationKind, PaymentMethod, RefKind,
    Transaction, TransactionId, TransactionStatus, TransactionType,
};
