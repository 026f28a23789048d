//! Core business logic module
//!
//! This module contains the transaction processing components:
//! - `traits` - Seams to the ledger, user directory, notifier, stores and clock
//! - `state_machine` - Legal status transitions
//! - `rule_engine` - Rule resolution, validation and management
//! - `executor` - Balance mutations per transaction type, with transfer compensation
//! - `audit_logger` - Fire-and-forget audit trail
//! - `orchestrator` - Transaction lifecycle orchestration
//! - `convenience` - Shorthands for common transaction kinds
//! - `replay` - Replay of request files through the orchestrator

pub mod audit_logger;
pub mod convenience;
pub mod executor;
pub mod orchestrator;
pub mod replay;
pub mod rule_engine;
pub mod state_machine;
pub mod traits;

pub use audit_logger::AuditLogger;
pub use executor::BalanceMutationExecutor;
pub use orchestrator::{Collaborators, TransactionOrchestrator};
pub use replay::Replayer;
pub use rule_engine::{RuleEngine, RuleOutcome, VolumeUsage};
pub use traits::{
    AccountLedger, AuditRepository, Clock, NotificationDispatcher, RuleRepository, SystemClock,
    TransactionRepository, UserDirectory,
};
