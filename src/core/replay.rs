//! Replay of request files through the orchestrator
//!
//! The `Replayer` turns parsed request rows into orchestrator calls and one
//! [`ReplayOutcome`] per row. It remembers which transaction each create request
//! produced so later lifecycle rows can name it by request number. It is shared by
//! both processing strategies and is safe to call from several threads.
//!
//! A request number is claimed before its row runs, so a number is used at most
//! once whether the row succeeds or fails.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

use crate::core::orchestrator::TransactionOrchestrator;
use crate::io::csv_format::{convert_request_record, RequestRecord};
use crate::types::{
    ReplayAction, ReplayCommand, ReplayOutcome, RequestNo, Transaction, TransactionError,
    TransactionId,
};

pub struct Replayer {
    orchestrator: Arc<TransactionOrchestrator>,
    /// Claimed request numbers, with the transaction a successful row produced
    submitted: DashMap<RequestNo, Option<TransactionId>>,
}

impl Replayer {
    pub fn new(orchestrator: Arc<TransactionOrchestrator>) -> Self {
        Replayer {
            orchestrator,
            submitted: DashMap::new(),
        }
    }

    pub fn orchestrator(&self) -> &TransactionOrchestrator {
        &self.orchestrator
    }

    /// Transaction produced by an earlier request
    pub fn transaction_of(&self, request: RequestNo) -> Option<TransactionId> {
        self.submitted.get(&request).and_then(|entry| *entry.value())
    }

    /// Parse and apply one request row
    pub fn replay(&self, record: RequestRecord) -> ReplayOutcome {
        let request = record.request;
        match convert_request_record(record, &self.orchestrator.config().default_currency) {
            Ok(command) => self.apply(command),
            Err(message) => {
                tracing::warn!(request, error = %message, "rejecting request row");
                ReplayOutcome::rejected(request, "parse_error", message)
            }
        }
    }

    /// Apply one parsed command
    ///
    /// Never fails: every problem ends up in the returned outcome.
    pub fn apply(&self, command: ReplayCommand) -> ReplayOutcome {
        let ReplayCommand {
            request,
            user,
            action,
        } = command;
        tracing::debug!(request, user = %user, op = action.name(), "replaying request");

        match self.submitted.entry(request) {
            Entry::Occupied(_) => {
                return ReplayOutcome::rejected(
                    request,
                    "duplicate_request",
                    format!("Request {} was already replayed", request),
                );
            }
            Entry::Vacant(slot) => {
                slot.insert(None);
            }
        }

        let orchestrator = &self.orchestrator;
        let (target, op) = match action {
            ReplayAction::Create(create) => {
                return match orchestrator.create_transaction(create, &user) {
                    Ok(transaction) => self.record(request, &transaction),
                    Err(e) => ReplayOutcome::failed(request, &e, None),
                };
            }
            ReplayAction::Process { target } => (target, Op::Process),
            ReplayAction::Complete { target } => (target, Op::Complete),
            ReplayAction::Fail { target, reason } => (target, Op::Fail(reason)),
            ReplayAction::Cancel { target, reason } => (target, Op::Cancel(reason)),
            ReplayAction::Reverse { target, reason } => (target, Op::Reverse(reason)),
        };

        let Some(id) = self.transaction_of(target) else {
            return ReplayOutcome::rejected(
                request,
                "unknown_target",
                format!("Request {} names unknown request {}", request, target),
            );
        };

        match self.run(id, &user, op) {
            Ok(transaction) => self.record(request, &transaction),
            Err(e) => {
                let current = orchestrator.get_transaction(id, &user).ok();
                ReplayOutcome::failed(request, &e, current.as_ref())
            }
        }
    }

    fn run(&self, id: TransactionId, user: &str, op: Op) -> Result<Transaction, TransactionError> {
        let orchestrator = &self.orchestrator;
        // Lifecycle rows may only touch the acting user's own transactions
        orchestrator.get_transaction(id, user)?;

        match op {
            Op::Process => orchestrator.process_transaction(id, user),
            Op::Complete => orchestrator.complete_transaction(id, user),
            Op::Fail(reason) => orchestrator.fail_transaction(id, &reason, user),
            Op::Cancel(reason) => orchestrator.cancel_transaction(id, &reason, user),
            Op::Reverse(reason) => orchestrator.reverse_transaction(id, &reason, user),
        }
    }

    fn record(&self, request: RequestNo, transaction: &Transaction) -> ReplayOutcome {
        self.submitted.insert(request, Some(transaction.id));
        ReplayOutcome::succeeded(request, transaction)
    }
}

enum Op {
    Process,
    Complete,
    Fail(String),
    Cancel(String),
    Reverse(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{InMemoryLedger, InMemoryUserDirectory};
    use crate::config::EngineConfig;
    use crate::core::orchestrator::Collaborators;
    use crate::types::{Account, AccountType, TransactionStatus};
    use rust_decimal::Decimal;

    fn replayer() -> (Replayer, Arc<InMemoryLedger>) {
        let ledger = Arc::new(InMemoryLedger::with_accounts([
            Account::new("w1", "u1", AccountType::Wallet, Decimal::new(100, 0)),
            Account::new("w2", "u1", AccountType::Wallet, Decimal::ZERO),
        ]));
        let users = Arc::new(InMemoryUserDirectory::with_users(["u1", "u2"]));
        let orchestrator = TransactionOrchestrator::new(
            EngineConfig::default(),
            Collaborators::in_memory(ledger.clone(), users),
        );
        (Replayer::new(Arc::new(orchestrator)), ledger)
    }

    fn row(request: RequestNo, op: Option<&str>, target: Option<RequestNo>) -> RequestRecord {
        RequestRecord {
            request,
            op: op.map(str::to_string),
            user: "u1".to_string(),
            tx_type: Some("wallet_transfer".to_string()),
            amount: Some("40".to_string()),
            from_account: Some("w1".to_string()),
            to_account: Some("w2".to_string()),
            target,
            ..RequestRecord::default()
        }
    }

    #[test]
    fn test_create_then_reverse_by_request_number() {
        let (replayer, ledger) = replayer();

        let created = replayer.replay(row(1, None, None));
        assert_eq!(created.status, Some(TransactionStatus::Completed));

        let reversed = replayer.replay(row(2, Some("reverse"), Some(1)));
        assert!(reversed.is_success(), "{:?}", reversed);
        assert_ne!(reversed.transaction_id, created.transaction_id);

        assert_eq!(ledger.account("w1").unwrap().balance, Decimal::new(100, 0));
        assert_eq!(ledger.account("w2").unwrap().balance, Decimal::ZERO);
    }

    #[test]
    fn test_unknown_target_is_rejected() {
        let (replayer, _) = replayer();

        let outcome = replayer.replay(row(5, Some("cancel"), Some(4)));

        assert_eq!(outcome.error_kind, Some("unknown_target"));
        assert_eq!(outcome.transaction_id, None);
    }

    #[test]
    fn test_failed_lifecycle_reports_current_state() {
        let (replayer, _) = replayer();
        replayer.replay(row(1, None, None));

        let outcome = replayer.replay(row(2, Some("cancel"), Some(1)));

        assert_eq!(outcome.error_kind, Some("invalid_state"));
        assert_eq!(outcome.status, Some(TransactionStatus::Completed));
        assert_eq!(outcome.transaction_id, replayer.transaction_of(1));
    }

    #[test]
    fn test_other_users_transaction_is_forbidden() {
        let (replayer, _) = replayer();
        replayer.replay(row(1, None, None));

        let mut foreign = row(2, Some("reverse"), Some(1));
        foreign.user = "u2".to_string();
        let outcome = replayer.replay(foreign);

        assert_eq!(outcome.error_kind, Some("forbidden"));
    }

    #[test]
    fn test_duplicate_request_number_is_rejected() {
        let (replayer, ledger) = replayer();
        replayer.replay(row(1, None, None));

        let outcome = replayer.replay(row(1, None, None));

        assert_eq!(outcome.error_kind, Some("duplicate_request"));
        assert_eq!(ledger.account("w1").unwrap().balance, Decimal::new(60, 0));
    }

    #[test]
    fn test_failed_request_number_cannot_be_reused() {
        let (replayer, ledger) = replayer();
        let mut overdraw = row(1, None, None);
        overdraw.amount = Some("500".to_string());

        let failed = replayer.replay(overdraw);
        assert_eq!(failed.error_kind, Some("insufficient_funds"));
        assert_eq!(replayer.transaction_of(1), None);

        let outcome = replayer.replay(row(1, None, None));

        assert_eq!(outcome.error_kind, Some("duplicate_request"));
        assert_eq!(ledger.account("w1").unwrap().balance, Decimal::new(100, 0));
    }

    #[test]
    fn test_concurrent_rows_with_one_request_number_run_once() {
        let (replayer, ledger) = replayer();

        let outcomes: Vec<ReplayOutcome> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| replayer.replay(row(1, None, None))))
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().unwrap())
                .collect()
        });

        let duplicates = outcomes
            .iter()
            .filter(|outcome| outcome.error_kind == Some("duplicate_request"))
            .count();
        assert_eq!(duplicates, 7);
        assert_eq!(ledger.account("w1").unwrap().balance, Decimal::new(60, 0));
    }

    #[test]
    fn test_unparseable_row_is_rejected() {
        let (replayer, _) = replayer();
        let mut bad = row(1, None, None);
        bad.amount = Some("forty".to_string());

        let outcome = replayer.replay(bad);

        assert_eq!(outcome.error_kind, Some("parse_error"));
        assert!(outcome.message.contains("Invalid amount"));
    }
}
