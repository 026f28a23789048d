//! Collaborator implementations
//!
//! - `ledger` - In-memory account ledger with fault injection
//! - `transaction_store`, `rule_store`, `audit_store` - In-memory repositories
//! - `directory` - In-memory user directory and recording notifier
//! - `clock` - Controllable clock
//! - `http` - Blocking HTTP clients for the ledger, user and notification services

pub mod audit_store;
pub mod clock;
pub mod directory;
pub mod http;
pub mod ledger;
pub mod rule_store;
pub mod transaction_store;

pub use audit_store::InMemoryAuditStore;
pub use clock::FixedClock;
pub use directory::{InMemoryUserDirectory, RecordingNotifier};
pub use http::{HttpAccountLedger, HttpNotificationDispatcher, HttpUserDirectory};
pub use ledger::{InMemoryLedger, LedgerEntry, LedgerOperation};
pub use rule_store::InMemoryRuleStore;
pub use transaction_store::InMemoryTransactionStore;
