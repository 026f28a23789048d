//! Transaction Engine Library
//! # Overview
//!
//! This library orchestrates money-moving transactions against an external account
//! ledger: it validates requests against per-user rules, applies balance mutations
//! with compensation for multi-leg transfers, drives each transaction through a
//! lifecycle state machine and keeps an audit trail.
//!
//! # Architecture
//!
//! - [`types`] - Core data types (Transaction, rules, audit entries, errors)
//! - [`core`] - Business logic components:
//!   - [`core::orchestrator`] - Transaction lifecycle orchestration
//!   - [`core::rule_engine`] - Limits, approval thresholds and allowed hours
//!   - [`core::executor`] - Ledger mutations per transaction type
//!   - [`core::state_machine`] - Legal status transitions
//!   - [`core::audit_logger`] - Audit trail
//! - [`adapters`] - In-memory and HTTP implementations of the collaborators
//! - [`config`] - Engine configuration
//! - [`io`] - CSV handling for the replay CLI
//! - [`strategy`] - Sync and async replay pipelines
//! - [`cli`] - CLI arguments parsing
//!
//! # Transaction Lifecycle
//!
//! ```text
//! Pending ──► Completed ──► Reversed
//!    │
//!    ├──► Failed
//!    └──► Canceled
//! ```
//!
//! `Failed`, `Canceled` and `Reversed` are terminal. A reversal is a new transaction
//! in the opposite direction; the original only gets its status flag and a link.

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod io;
pub mod strategy;
pub mod types;

pub use config::EngineConfig;
pub use core::{Collaborators, Replayer, TransactionOrchestrator};
pub use types::{
    CreateTransactionRequest, Transaction, TransactionError, TransactionId, TransactionStatus,
    TransactionType,
};
