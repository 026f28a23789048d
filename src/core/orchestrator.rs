//! Transaction orchestration
//!
//! This module provides the `TransactionOrchestrator`, the entry point of the
//! engine. It composes the rule engine, the balance mutation executor, the
//! lifecycle state machine, the audit logger and the transaction store.
//!
//! # Creation
//!
//! 1. Validate the acting user
//! 2. Build the transaction in `Pending` and validate its structure
//! 3. Validate it against the user's rules
//! 4. Pre-check funds, credit and account existence
//! 5. Persist it as `Pending`
//! 6. Execute the balance mutation unless the request is record-only
//! 7. Mark it `Completed` (or `Failed` with the reason) and audit the change
//!
//! Structural validation failures abort before anything is stored. Every later
//! failure still leaves a durable `Failed` record with its reason.
//!
//! # Concurrency
//!
//! The orchestrator holds no lock across ledger calls. Balance races between
//! concurrent transactions on one account are settled by the ledger, which
//! re-checks funds atomically on every debit; the pre-check here is advisory.
//! Lifecycle operations on one existing transaction are serialized by an
//! in-flight guard: a second concurrent caller gets `InvalidState`.

use chrono::{DateTime, Datelike, Duration, NaiveTime, Utc};
use dashmap::DashSet;
use rust_decimal::Decimal;
use serde_json::Value;
use std::sync::Arc;

use crate::adapters::{InMemoryAuditStore, InMemoryRuleStore, InMemoryTransactionStore};
use crate::config::EngineConfig;
use crate::core::audit_logger::AuditLogger;
use crate::core::executor::BalanceMutationExecutor;
use crate::core::rule_engine::{RuleEngine, RuleOutcome, VolumeUsage};
use crate::core::state_machine;
use crate::core::traits::{
    AccountLedger, AuditRepository, Clock, NotificationDispatcher, RuleRepository, SystemClock,
    TransactionRepository, UserDirectory,
};
use crate::types::transaction::{APPROVAL_REQUIRED_KEY, RECONCILIATION_KEY};
use crate::types::{
    AccountType, AuditAction, AuditChange, AuditEntry, CreateTransactionRequest, LedgerRef,
    MutationKind, RuleLimits, ServiceError, Transaction, TransactionError, TransactionFilters,
    TransactionId, TransactionStatus,
};

/// Everything the orchestrator talks to
#[derive(Clone)]
pub struct Collaborators {
    pub ledger: Arc<dyn AccountLedger>,
    pub users: Arc<dyn UserDirectory>,
    pub notifier: Option<Arc<dyn NotificationDispatcher>>,
    pub transactions: Arc<dyn TransactionRepository>,
    pub rules: Arc<dyn RuleRepository>,
    pub audit: Arc<dyn AuditRepository>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// In-memory stores, the system clock and no notifier around the given ledger
    /// and user directory
    pub fn in_memory(ledger: Arc<dyn AccountLedger>, users: Arc<dyn UserDirectory>) -> Self {
        Collaborators {
            ledger,
            users,
            notifier: None,
            transactions: Arc::new(InMemoryTransactionStore::new()),
            rules: Arc::new(InMemoryRuleStore::new()),
            audit: Arc::new(InMemoryAuditStore::new()),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationDispatcher>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_transactions(mut self, transactions: Arc<dyn TransactionRepository>) -> Self {
        self.transactions = transactions;
        self
    }

    pub fn with_rules(mut self, rules: Arc<dyn RuleRepository>) -> Self {
        self.rules = rules;
        self
    }

    pub fn with_audit(mut self, audit: Arc<dyn AuditRepository>) -> Self {
        self.audit = audit;
        self
    }
}

/// Marks a transaction as being worked on until dropped
struct InFlight<'a> {
    ids: &'a DashSet<TransactionId>,
    id: TransactionId,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.ids.remove(&self.id);
    }
}

fn user_error(user_id: &str, error: ServiceError) -> TransactionError {
    match error {
        ServiceError::NotFound { .. } => TransactionError::UserNotFound {
            user_id: user_id.to_string(),
        },
        other => TransactionError::Collaborator {
            message: other.to_string(),
        },
    }
}

/// Ledger failures during the pre-check: unknown accounts keep their meaning,
/// everything else is a collaborator problem
fn precheck_error(error: ServiceError, target: LedgerRef<'_>) -> TransactionError {
    match error {
        ServiceError::NotFound { .. } => target.not_found(),
        other => TransactionError::Collaborator {
            message: other.to_string(),
        },
    }
}

/// Orchestrates the transaction lifecycle
pub struct TransactionOrchestrator {
    config: EngineConfig,
    ledger: Arc<dyn AccountLedger>,
    users: Arc<dyn UserDirectory>,
    notifier: Option<Arc<dyn NotificationDispatcher>>,
    transactions: Arc<dyn TransactionRepository>,
    rules: RuleEngine,
    executor: BalanceMutationExecutor,
    audit: AuditLogger,
    clock: Arc<dyn Clock>,
    in_flight: DashSet<TransactionId>,
}

impl TransactionOrchestrator {
    pub fn new(config: EngineConfig, collaborators: Collaborators) -> Self {
        let Collaborators {
            ledger,
            users,
            notifier,
            transactions,
            rules,
            audit,
            clock,
        } = collaborators;

        TransactionOrchestrator {
            rules: RuleEngine::new(rules, config.default_rule.clone()),
            executor: BalanceMutationExecutor::new(Arc::clone(&ledger)),
            audit: AuditLogger::new(audit, Arc::clone(&clock)),
            config,
            ledger,
            users,
            notifier,
            transactions,
            clock,
            in_flight: DashSet::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Rule management
    pub fn rules(&self) -> &RuleEngine {
        &self.rules
    }

    /// Create a transaction and, unless it needs approval, execute it
    ///
    /// # Arguments
    ///
    /// * `request` - What to create
    /// * `initiated_by` - The actor creating it; recorded on the transaction and
    ///   in the audit trail
    ///
    /// # Returns
    ///
    /// The `Completed` transaction, or the `Pending` one when a rule requires
    /// manual approval.
    ///
    /// # Errors
    ///
    /// - `UserNotFound` if the user is unknown
    /// - `Validation` for malformed requests; nothing is stored
    /// - `RuleViolation`, `InsufficientFunds`, `InsufficientCredit`,
    ///   `AccountNotFound`, `CardNotFound`, `Execution` or `Compensation`; the
    ///   transaction is stored as `Failed`
    pub fn create_transaction(
        &self,
        request: CreateTransactionRequest,
        initiated_by: &str,
    ) -> Result<Transaction, TransactionError> {
        self.create(request, initiated_by, true)
    }

    fn create(
        &self,
        request: CreateTransactionRequest,
        initiated_by: &str,
        apply_rules: bool,
    ) -> Result<Transaction, TransactionError> {
        self.users
            .validate_user(&request.user_id)
            .map_err(|e| user_error(&request.user_id, e))?;

        let now = self.clock.now();
        let mut transaction = Transaction::pending(request, initiated_by, now);
        transaction.validate()?;

        let record_only = transaction.is_record_only();

        if apply_rules && !record_only {
            match self.check_rules(&transaction, now) {
                Ok(RuleOutcome::Approved) => {}
                Ok(RuleOutcome::RequiresApproval) => {
                    transaction
                        .metadata
                        .insert(APPROVAL_REQUIRED_KEY.to_string(), Value::Bool(true));
                    self.transactions.create(&transaction)?;
                    self.audit.log_change(
                        AuditChange::new(
                            transaction.id,
                            &transaction.user_id,
                            AuditAction::Created,
                            initiated_by,
                        )
                        .status(None, TransactionStatus::Pending)
                        .reason("awaiting manual approval"),
                    );
                    tracing::info!(
                        transaction_id = %transaction.id,
                        user_id = %transaction.user_id,
                        kind = %transaction.tx_type,
                        "transaction awaiting approval"
                    );
                    return Ok(transaction);
                }
                Err(e) => return Err(self.reject_new(transaction, e, initiated_by)),
            }
        }

        // Record-only balances already moved upstream; a funds check would count it twice
        if !record_only {
            if let Err(e) = self.pre_check(&transaction) {
                return Err(self.reject_new(transaction, e, initiated_by));
            }
        }

        self.transactions.create(&transaction)?;
        self.audit.log_change(
            AuditChange::new(
                transaction.id,
                &transaction.user_id,
                AuditAction::Created,
                initiated_by,
            )
            .status(None, TransactionStatus::Pending),
        );

        self.execute_and_complete(transaction, initiated_by)
    }

    /// Resolve the rules for `transaction` and validate it against them
    fn check_rules(
        &self,
        transaction: &Transaction,
        now: DateTime<Utc>,
    ) -> Result<RuleOutcome, TransactionError> {
        let account_id = transaction
            .from_account_id
            .as_deref()
            .or(transaction.to_account_id.as_deref());
        let card_id = transaction
            .from_card_id
            .as_deref()
            .or(transaction.to_card_id.as_deref());

        let mut limits = self.rules.resolve_rules(
            &transaction.user_id,
            account_id,
            card_id,
            transaction.tx_type,
            now,
        )?;
        let user_limits = self
            .users
            .get_user_limits(&transaction.user_id)
            .map_err(|e| user_error(&transaction.user_id, e))?;
        if let Some(user_limits) = user_limits {
            limits = limits.merge(&RuleLimits::from(&user_limits));
        }

        let usage = self.volume_usage(&transaction.user_id, now)?;
        RuleEngine::validate(&limits, transaction, usage, now)
    }

    /// Completed volume of a user in the current UTC day and month
    fn volume_usage(&self, user_id: &str, now: DateTime<Utc>) -> Result<VolumeUsage, TransactionError> {
        let today = now.date_naive();
        let day_start = today.and_time(NaiveTime::MIN).and_utc();
        let month_start = today
            .with_day(1)
            .unwrap_or(today)
            .and_time(NaiveTime::MIN)
            .and_utc();

        Ok(VolumeUsage {
            daily: self
                .transactions
                .completed_volume(user_id, day_start, DateTime::<Utc>::MAX_UTC)?,
            monthly: self
                .transactions
                .completed_volume(user_id, month_start, DateTime::<Utc>::MAX_UTC)?,
        })
    }

    /// Advisory check that the ledger can take the mutation
    ///
    /// The ledger re-checks on every debit; this only avoids mutating calls that are
    /// bound to fail.
    fn pre_check(&self, transaction: &Transaction) -> Result<(), TransactionError> {
        match transaction.tx_type.mutation() {
            MutationKind::Deposit | MutationKind::CreditRepayment => {
                self.ensure_exists(transaction.destination_ref())
            }
            MutationKind::Withdrawal => self.ensure_funds(transaction.source_ref(), transaction.amount),
            MutationKind::Transfer => {
                self.ensure_funds(transaction.source_ref(), transaction.amount)?;
                self.ensure_exists(transaction.destination_ref())
            }
            MutationKind::CardCharge => {
                let Some(target) = transaction.source_ref() else {
                    return Err(TransactionError::validation("source is required"));
                };
                let info = self
                    .ledger
                    .get_account_info(target.id)
                    .map_err(|e| precheck_error(e, target))?;
                if !info.is_active {
                    return Err(target.not_found());
                }
                if info.account_type != AccountType::Credit {
                    return self.ensure_funds(Some(target), transaction.amount);
                }
                let available = self
                    .ledger
                    .get_available_credit(target.id)
                    .map_err(|e| precheck_error(e, target))?;
                if available < transaction.amount {
                    return Err(TransactionError::insufficient_credit(
                        target.id,
                        available,
                        transaction.amount,
                    ));
                }
                Ok(())
            }
            MutationKind::RecordOnly => Ok(()),
        }
    }

    fn ensure_exists(&self, target: Option<LedgerRef<'_>>) -> Result<(), TransactionError> {
        let Some(target) = target else {
            return Err(TransactionError::validation("destination is required"));
        };
        let exists = self
            .ledger
            .validate_account_exists(target.id)
            .map_err(|e| precheck_error(e, target))?;
        if !exists {
            return Err(target.not_found());
        }
        Ok(())
    }

    fn ensure_funds(
        &self,
        target: Option<LedgerRef<'_>>,
        amount: Decimal,
    ) -> Result<(), TransactionError> {
        self.ensure_exists(target)?;
        let Some(target) = target else {
            return Err(TransactionError::validation("source is required"));
        };
        let balance = self
            .ledger
            .get_balance(target.id)
            .map_err(|e| precheck_error(e, target))?;
        if balance < amount {
            return Err(TransactionError::insufficient_funds(target.id, balance, amount));
        }
        Ok(())
    }

    /// Store a transaction that never reached `Pending` storage as `Failed`
    ///
    /// Returns `error` so callers can propagate it.
    fn reject_new(
        &self,
        mut transaction: Transaction,
        error: TransactionError,
        actor: &str,
    ) -> TransactionError {
        let reason = error.to_string();
        if let Err(e) = transaction.fail(&reason, self.clock.now()) {
            return e;
        }
        if let Err(e) = self.transactions.create(&transaction) {
            tracing::warn!(
                transaction_id = %transaction.id,
                error = %e,
                "failed to store rejected transaction"
            );
        }
        self.audit.log_change(
            AuditChange::new(
                transaction.id,
                &transaction.user_id,
                AuditAction::Failed,
                actor,
            )
            .status(None, TransactionStatus::Failed)
            .reason(reason),
        );
        tracing::warn!(
            transaction_id = %transaction.id,
            user_id = %transaction.user_id,
            kind = error.kind(),
            error = %error,
            "transaction rejected"
        );
        error
    }

    /// Execute a stored `Pending` transaction and record the outcome
    fn execute_and_complete(
        &self,
        mut transaction: Transaction,
        actor: &str,
    ) -> Result<Transaction, TransactionError> {
        let snapshot = if transaction.is_record_only() {
            None
        } else {
            match self.executor.execute(&transaction) {
                Ok(snapshot) => snapshot,
                Err(e) => return Err(self.fail_stored(transaction, e, actor)),
            }
        };

        if let Some(snapshot) = snapshot {
            transaction.previous_balance = Some(snapshot.previous);
            transaction.new_balance = Some(snapshot.new);
        }
        let previous = transaction.transition(TransactionStatus::Completed, self.clock.now())?;
        self.transactions.update(&transaction)?;
        self.audit.log_change(
            AuditChange::new(
                transaction.id,
                &transaction.user_id,
                AuditAction::Completed,
                actor,
            )
            .status(Some(previous), TransactionStatus::Completed)
            .reason("Transaction completed successfully"),
        );
        tracing::info!(
            transaction_id = %transaction.id,
            user_id = %transaction.user_id,
            kind = %transaction.tx_type,
            amount = %transaction.amount,
            "transaction completed"
        );

        self.notify(&transaction);
        Ok(transaction)
    }

    /// Move a stored `Pending` transaction to `Failed` after an execution error
    fn fail_stored(
        &self,
        mut transaction: Transaction,
        error: TransactionError,
        actor: &str,
    ) -> TransactionError {
        if matches!(error, TransactionError::Compensation { .. }) {
            transaction
                .metadata
                .insert(RECONCILIATION_KEY.to_string(), Value::Bool(true));
        }
        let reason = error.to_string();
        let previous = match transaction.fail(&reason, self.clock.now()) {
            Ok(previous) => previous,
            Err(e) => return e,
        };
        if let Err(e) = self.transactions.update(&transaction) {
            tracing::warn!(
                transaction_id = %transaction.id,
                error = %e,
                "failed to store failed transaction"
            );
        }
        self.audit.log_change(
            AuditChange::new(
                transaction.id,
                &transaction.user_id,
                AuditAction::Failed,
                actor,
            )
            .status(Some(previous), TransactionStatus::Failed)
            .reason(reason),
        );
        tracing::warn!(
            transaction_id = %transaction.id,
            user_id = %transaction.user_id,
            kind = error.kind(),
            error = %error,
            "transaction failed"
        );
        error
    }

    fn notify(&self, transaction: &Transaction) {
        if !self.config.notifications_enabled {
            return;
        }
        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.send_transaction_notification(transaction) {
                tracing::warn!(
                    transaction_id = %transaction.id,
                    error = %e,
                    "notification not sent"
                );
            }
        }
    }

    /// Claim a transaction for one lifecycle operation
    fn claim(&self, id: TransactionId, operation: &str) -> Result<InFlight<'_>, TransactionError> {
        if self.in_flight.insert(id) {
            return Ok(InFlight {
                ids: &self.in_flight,
                id,
            });
        }
        let status = self.load(id)?.status;
        Err(TransactionError::invalid_state(id, status, operation))
    }

    fn load(&self, id: TransactionId) -> Result<Transaction, TransactionError> {
        self.transactions
            .get(id)?
            .ok_or(TransactionError::TransactionNotFound { id })
    }

    /// Execute a pending transaction
    ///
    /// This is how a transaction held for approval is approved: the pre-check runs
    /// again and the balance mutation is applied.
    ///
    /// # Errors
    ///
    /// `InvalidState` unless the transaction is `Pending`; otherwise the same
    /// pre-check and execution errors as creation, leaving the record `Failed`.
    pub fn process_transaction(
        &self,
        id: TransactionId,
        processed_by: &str,
    ) -> Result<Transaction, TransactionError> {
        let _guard = self.claim(id, "processed")?;
        let transaction = self.load(id)?;
        if transaction.status != TransactionStatus::Pending {
            return Err(TransactionError::invalid_state(
                id,
                transaction.status,
                "processed",
            ));
        }
        self.run_pending(transaction, processed_by)
    }

    /// Pre-check and execute a stored `Pending` transaction
    fn run_pending(
        &self,
        mut transaction: Transaction,
        processed_by: &str,
    ) -> Result<Transaction, TransactionError> {
        if transaction.awaits_approval() {
            transaction
                .metadata
                .insert("approved_by".to_string(), Value::String(processed_by.to_string()));
        }

        if !transaction.is_record_only() {
            if let Err(e) = self.pre_check(&transaction) {
                return Err(self.fail_stored(transaction, e, processed_by));
            }
        }

        self.execute_and_complete(transaction, processed_by)
    }

    /// Change the status along a legal edge without touching balances
    ///
    /// A `Pending` transaction only reaches `Completed` through
    /// [`TransactionOrchestrator::process_transaction`] or
    /// [`TransactionOrchestrator::complete_transaction`], which execute it.
    ///
    /// # Errors
    ///
    /// - `InvalidState` when asked to complete a `Pending` transaction
    /// - `InvalidTransition` if the edge is not legal
    ///
    /// The stored record is unchanged on error.
    pub fn update_transaction_status(
        &self,
        id: TransactionId,
        status: TransactionStatus,
        reason: &str,
        updated_by: &str,
    ) -> Result<Transaction, TransactionError> {
        let _guard = self.claim(id, "updated")?;
        if status == TransactionStatus::Completed {
            let current = self.load(id)?.status;
            if current == TransactionStatus::Pending {
                return Err(TransactionError::invalid_state(
                    id,
                    current,
                    "completed without execution",
                ));
            }
        }
        self.apply_status(id, status, reason, updated_by, AuditAction::StatusChanged)
    }

    fn apply_status(
        &self,
        id: TransactionId,
        status: TransactionStatus,
        reason: &str,
        actor: &str,
        action: AuditAction,
    ) -> Result<Transaction, TransactionError> {
        let mut transaction = self.load(id)?;
        let previous = transaction.transition(status, self.clock.now())?;
        if status == TransactionStatus::Failed {
            transaction.failure_reason = Some(reason.to_string());
        }
        self.transactions.update(&transaction)?;
        self.audit.log_change(
            AuditChange::new(id, &transaction.user_id, action, actor)
                .status(Some(previous), status)
                .reason(reason),
        );
        tracing::info!(
            transaction_id = %id,
            from = %previous,
            to = %status,
            "transaction status changed"
        );
        Ok(transaction)
    }

    /// Complete a pending transaction
    ///
    /// The balance mutation is applied exactly as in
    /// [`TransactionOrchestrator::process_transaction`]; record-only transactions
    /// complete without touching the ledger.
    ///
    /// # Errors
    ///
    /// `InvalidTransition` unless the transaction is `Pending`; otherwise the same
    /// pre-check and execution errors as processing.
    pub fn complete_transaction(
        &self,
        id: TransactionId,
        completed_by: &str,
    ) -> Result<Transaction, TransactionError> {
        let _guard = self.claim(id, "completed")?;
        let transaction = self.load(id)?;
        state_machine::ensure_transition(transaction.status, TransactionStatus::Completed)?;
        self.run_pending(transaction, completed_by)
    }

    pub fn fail_transaction(
        &self,
        id: TransactionId,
        reason: &str,
        failed_by: &str,
    ) -> Result<Transaction, TransactionError> {
        let _guard = self.claim(id, "failed")?;
        self.apply_status(id, TransactionStatus::Failed, reason, failed_by, AuditAction::Failed)
    }

    /// Cancel a pending transaction
    ///
    /// # Errors
    ///
    /// `InvalidState` unless the transaction is `Pending`.
    pub fn cancel_transaction(
        &self,
        id: TransactionId,
        reason: &str,
        canceled_by: &str,
    ) -> Result<Transaction, TransactionError> {
        let _guard = self.claim(id, "canceled")?;
        let transaction = self.load(id)?;
        if transaction.status != TransactionStatus::Pending {
            return Err(TransactionError::invalid_state(
                id,
                transaction.status,
                "canceled",
            ));
        }
        self.apply_status(
            id,
            TransactionStatus::Canceled,
            reason,
            canceled_by,
            AuditAction::Canceled,
        )
    }

    /// Reverse a completed transaction
    ///
    /// Creates a new transaction moving the same amount in the opposite direction,
    /// validated and executed on its own. Only once it completes is the original
    /// marked `Reversed` and linked to it through `reversed_by`.
    ///
    /// Transaction rules are not applied to the reversal: it undoes a movement
    /// that already passed them, so limits and hour windows set since then cannot
    /// block it. Structural validation and the funds pre-check still run.
    ///
    /// # Returns
    ///
    /// The new reversal transaction.
    ///
    /// # Errors
    ///
    /// - `InvalidState` unless the original is `Completed` and inside the reversal
    ///   window
    /// - any creation error of the reversal; the original then stays `Completed`
    pub fn reverse_transaction(
        &self,
        id: TransactionId,
        reason: &str,
        reversed_by: &str,
    ) -> Result<Transaction, TransactionError> {
        let _guard = self.claim(id, "reversed")?;
        let original = self.load(id)?;
        if original.status != TransactionStatus::Completed
            || self.clock.now() - original.created_at > self.config.reversal_window
        {
            return Err(TransactionError::invalid_state(
                id,
                original.status,
                "reversed",
            ));
        }

        let request = original.reversal_request(reason)?;
        let reversal = self.create(request, reversed_by, false)?;

        let mut original = self.load(id)?;
        let previous = original.transition(TransactionStatus::Reversed, self.clock.now())?;
        original.reversed_by = Some(reversal.id);
        self.transactions.update(&original)?;
        self.audit.log_change(
            AuditChange::new(id, &original.user_id, AuditAction::Reversed, reversed_by)
                .status(Some(previous), TransactionStatus::Reversed)
                .field("reversed_by", Value::String(reversal.id.to_string()))
                .reason(reason),
        );
        tracing::info!(
            transaction_id = %id,
            reversal_id = %reversal.id,
            "transaction reversed"
        );
        Ok(reversal)
    }

    /// Fetch a transaction owned by `user_id`
    ///
    /// # Errors
    ///
    /// `TransactionNotFound` if it does not exist, `Forbidden` if another user owns it.
    pub fn get_transaction(
        &self,
        id: TransactionId,
        user_id: &str,
    ) -> Result<Transaction, TransactionError> {
        let transaction = self.load(id)?;
        if transaction.user_id != user_id {
            return Err(TransactionError::Forbidden {
                id,
                user_id: user_id.to_string(),
            });
        }
        Ok(transaction)
    }

    /// One page of a user's transactions and the total number of matches
    pub fn list_transactions(
        &self,
        user_id: &str,
        filters: &TransactionFilters,
    ) -> Result<(Vec<Transaction>, usize), TransactionError> {
        self.transactions.list_by_user(user_id, filters)
    }

    pub fn get_audit_trail(&self, id: TransactionId) -> Result<Vec<AuditEntry>, TransactionError> {
        self.audit.get_audit_trail(id)
    }

    pub fn get_user_audit_trail(
        &self,
        user_id: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AuditEntry>, TransactionError> {
        self.audit.get_user_audit_trail(user_id, from, to)
    }

    /// Time left before a completed transaction can no longer be reversed
    pub fn reversal_time_left(&self, transaction: &Transaction) -> Duration {
        let elapsed = self.clock.now() - transaction.created_at;
        (self.config.reversal_window - elapsed).max(Duration::zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{FixedClock, InMemoryLedger, InMemoryUserDirectory, RecordingNotifier};
    use crate::types::{Account, AllowedHours, RuleScope, TransactionType};
    use chrono::TimeZone;

    struct Fixture {
        orchestrator: TransactionOrchestrator,
        ledger: Arc<InMemoryLedger>,
        clock: Arc<FixedClock>,
        notifier: Arc<RecordingNotifier>,
        transactions: Arc<InMemoryTransactionStore>,
    }

    fn fixture() -> Fixture {
        let ledger = Arc::new(InMemoryLedger::with_accounts([
            Account::new("a", "u1", AccountType::Wallet, Decimal::new(100, 0)),
            Account::new("b", "u1", AccountType::Checking, Decimal::new(20, 0)),
        ]));
        let users = Arc::new(InMemoryUserDirectory::with_users(["u1", "u2"]));
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 6, 3, 10, 0, 0).unwrap(),
        ));
        let notifier = Arc::new(RecordingNotifier::new());
        let transactions = Arc::new(InMemoryTransactionStore::new());
        let collaborators = Collaborators::in_memory(ledger.clone(), users)
            .with_clock(clock.clone())
            .with_notifier(notifier.clone())
            .with_transactions(transactions.clone());

        Fixture {
            orchestrator: TransactionOrchestrator::new(EngineConfig::default(), collaborators),
            ledger,
            clock,
            notifier,
            transactions,
        }
    }

    fn withdrawal(amount: i64) -> CreateTransactionRequest {
        CreateTransactionRequest::new("u1", TransactionType::WalletWithdrawal, Decimal::new(amount, 0))
            .currency("USD")
            .from_account("a")
    }

    #[test]
    fn test_unknown_user_is_rejected_before_anything_is_stored() {
        let f = fixture();
        let request = CreateTransactionRequest::new("ghost", TransactionType::WalletDeposit, Decimal::ONE)
            .currency("USD")
            .to_account("a");

        let result = f.orchestrator.create_transaction(request, "ghost");

        assert_eq!(
            result,
            Err(TransactionError::UserNotFound {
                user_id: "ghost".to_string()
            })
        );
        assert!(f.transactions.is_empty());
    }

    #[test]
    fn test_successful_withdrawal_records_snapshot_and_notifies() {
        let f = fixture();

        let tx = f.orchestrator.create_transaction(withdrawal(30), "u1").unwrap();

        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.previous_balance, Some(Decimal::new(100, 0)));
        assert_eq!(tx.new_balance, Some(Decimal::new(70, 0)));
        assert_eq!(tx.processed_at, Some(f.clock.now()));
        assert_eq!(f.notifier.sent(), vec![tx.id]);
    }

    #[test]
    fn test_notification_failure_does_not_fail_the_transaction() {
        let f = fixture();
        f.notifier.set_failing(true);

        let tx = f.orchestrator.create_transaction(withdrawal(30), "u1").unwrap();

        assert_eq!(tx.status, TransactionStatus::Completed);
    }

    #[test]
    fn test_approval_required_leaves_transaction_pending_until_processed() {
        let f = fixture();
        f.orchestrator
            .rules()
            .create_rule(
                RuleScope::user("u1"),
                RuleLimits {
                    requires_approval: true,
                    ..RuleLimits::default()
                },
                "admin",
                f.clock.now() - Duration::days(1),
            )
            .unwrap();

        let pending = f.orchestrator.create_transaction(withdrawal(30), "u1").unwrap();

        assert_eq!(pending.status, TransactionStatus::Pending);
        assert!(pending.awaits_approval());
        assert_eq!(f.ledger.mutation_calls(), 0);

        let processed = f.orchestrator.process_transaction(pending.id, "admin").unwrap();

        assert_eq!(processed.status, TransactionStatus::Completed);
        assert_eq!(f.ledger.get_balance("a").unwrap(), Decimal::new(70, 0));
    }

    fn pending_withdrawal(f: &Fixture, amount: i64) -> Transaction {
        f.orchestrator
            .rules()
            .create_rule(
                RuleScope::user("u1"),
                RuleLimits {
                    requires_approval: true,
                    ..RuleLimits::default()
                },
                "admin",
                f.clock.now() - Duration::days(1),
            )
            .unwrap();
        f.orchestrator.create_transaction(withdrawal(amount), "u1").unwrap()
    }

    #[test]
    fn test_complete_executes_pending_transaction_before_reversal() {
        let f = fixture();
        let pending = pending_withdrawal(&f, 30);

        let completed = f.orchestrator.complete_transaction(pending.id, "admin").unwrap();

        assert_eq!(completed.status, TransactionStatus::Completed);
        assert_eq!(completed.new_balance, Some(Decimal::new(70, 0)));
        assert_eq!(f.ledger.get_balance("a").unwrap(), Decimal::new(70, 0));

        f.orchestrator
            .reverse_transaction(pending.id, "customer request", "admin")
            .unwrap();

        assert_eq!(f.ledger.get_balance("a").unwrap(), Decimal::new(100, 0));
    }

    #[test]
    fn test_complete_rejects_transaction_that_is_not_pending() {
        let f = fixture();
        let tx = f.orchestrator.create_transaction(withdrawal(10), "u1").unwrap();

        let result = f.orchestrator.complete_transaction(tx.id, "admin");

        assert_eq!(
            result,
            Err(TransactionError::InvalidTransition {
                from: TransactionStatus::Completed,
                to: TransactionStatus::Completed,
            })
        );
        assert_eq!(f.ledger.get_balance("a").unwrap(), Decimal::new(90, 0));
    }

    #[test]
    fn test_update_status_cannot_complete_without_execution() {
        let f = fixture();
        let pending = pending_withdrawal(&f, 30);

        let result = f.orchestrator.update_transaction_status(
            pending.id,
            TransactionStatus::Completed,
            "approved",
            "admin",
        );

        assert_eq!(
            result,
            Err(TransactionError::invalid_state(
                pending.id,
                TransactionStatus::Pending,
                "completed without execution"
            ))
        );
        assert_eq!(f.orchestrator.get_transaction(pending.id, "u1").unwrap(), pending);
        assert_eq!(f.ledger.mutation_calls(), 0);

        let reversal = f.orchestrator.reverse_transaction(pending.id, "refund", "admin");

        assert!(matches!(reversal, Err(TransactionError::InvalidState { .. })));
        assert_eq!(f.ledger.get_balance("a").unwrap(), Decimal::new(100, 0));
    }

    #[test]
    fn test_daily_volume_counts_completed_transactions() {
        let f = fixture();
        f.ledger.insert(Account::new("rich", "u1", AccountType::Wallet, Decimal::new(50_000, 0)));
        let big = |amount: i64| {
            CreateTransactionRequest::new("u1", TransactionType::WalletWithdrawal, Decimal::new(amount, 0))
                .currency("USD")
                .from_account("rich")
        };

        for _ in 0..10 {
            f.orchestrator.create_transaction(big(1000), "u1").unwrap();
        }
        let result = f.orchestrator.create_transaction(big(1), "u1");

        assert!(matches!(
            result,
            Err(TransactionError::RuleViolation {
                kind: crate::types::RuleViolationKind::DailyAmountLimit,
                ..
            })
        ));

        f.clock.advance(Duration::days(1));
        assert!(f.orchestrator.create_transaction(big(1), "u1").is_ok());
    }

    #[test]
    fn test_record_only_skips_the_ledger() {
        let f = fixture();

        let tx = f
            .orchestrator
            .create_transaction(withdrawal(500).record_only(), "u1")
            .unwrap();

        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.new_balance, None);
        assert_eq!(f.ledger.mutation_calls(), 0);
    }

    #[test]
    fn test_record_only_above_balance_skips_the_funds_check() {
        let f = fixture();
        f.ledger.insert(Account::new("drained", "u1", AccountType::Wallet, Decimal::ZERO));

        let tx = f
            .orchestrator
            .create_transaction(
                CreateTransactionRequest::new("u1", TransactionType::WalletWithdrawal, Decimal::new(40, 0))
                    .currency("USD")
                    .from_account("drained")
                    .record_only(),
                "u1",
            )
            .unwrap();

        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.failure_reason, None);
        assert_eq!(f.ledger.get_balance("drained").unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_cancel_only_while_pending() {
        let f = fixture();
        let completed = f.orchestrator.create_transaction(withdrawal(10), "u1").unwrap();

        let result = f.orchestrator.cancel_transaction(completed.id, "changed mind", "u1");

        assert_eq!(
            result,
            Err(TransactionError::invalid_state(
                completed.id,
                TransactionStatus::Completed,
                "canceled"
            ))
        );
    }

    #[test]
    fn test_fail_transaction_records_reason() {
        let f = fixture();
        f.orchestrator
            .rules()
            .create_rule(
                RuleScope::user("u1"),
                RuleLimits {
                    requires_approval: true,
                    ..RuleLimits::unlimited()
                },
                "admin",
                f.clock.now(),
            )
            .unwrap();
        let pending = f.orchestrator.create_transaction(withdrawal(10), "u1").unwrap();

        let failed = f
            .orchestrator
            .fail_transaction(pending.id, "fraud suspected", "ops")
            .unwrap();

        assert_eq!(failed.status, TransactionStatus::Failed);
        assert_eq!(failed.failure_reason.as_deref(), Some("fraud suspected"));
        assert_eq!(failed.failed_at, Some(f.clock.now()));
    }

    #[test]
    fn test_update_status_rejects_illegal_edge_and_keeps_record() {
        let f = fixture();
        let tx = f.orchestrator.create_transaction(withdrawal(10), "u1").unwrap();

        let result = f.orchestrator.update_transaction_status(
            tx.id,
            TransactionStatus::Pending,
            "retry",
            "ops",
        );

        assert_eq!(
            result,
            Err(TransactionError::InvalidTransition {
                from: TransactionStatus::Completed,
                to: TransactionStatus::Pending,
            })
        );
        assert_eq!(f.orchestrator.get_transaction(tx.id, "u1").unwrap(), tx);
    }

    #[test]
    fn test_get_transaction_of_another_user_is_forbidden() {
        let f = fixture();
        let tx = f.orchestrator.create_transaction(withdrawal(10), "u1").unwrap();

        assert_eq!(
            f.orchestrator.get_transaction(tx.id, "u2"),
            Err(TransactionError::Forbidden {
                id: tx.id,
                user_id: "u2".to_string(),
            })
        );
    }

    #[test]
    fn test_reversal_ignores_rules_added_after_the_original() {
        let f = fixture();
        let tx = f.orchestrator.create_transaction(withdrawal(30), "u1").unwrap();
        f.orchestrator
            .rules()
            .create_rule(
                RuleScope::user("u1"),
                RuleLimits {
                    max_single_amount: Some(Decimal::new(5, 0)),
                    requires_approval: true,
                    allowed_hours: vec![AllowedHours::new(20, 22).unwrap()],
                    ..RuleLimits::unlimited()
                },
                "admin",
                f.clock.now(),
            )
            .unwrap();

        let reversal = f.orchestrator.reverse_transaction(tx.id, "refund", "ops").unwrap();

        assert_eq!(reversal.status, TransactionStatus::Completed);
        assert!(!reversal.awaits_approval());
        assert_eq!(f.ledger.get_balance("a").unwrap(), Decimal::new(100, 0));
    }

    #[test]
    fn test_reversal_window() {
        let f = fixture();
        let tx = f.orchestrator.create_transaction(withdrawal(10), "u1").unwrap();

        f.clock.advance(Duration::hours(25));
        let result = f.orchestrator.reverse_transaction(tx.id, "late", "ops");

        assert_eq!(
            result,
            Err(TransactionError::invalid_state(
                tx.id,
                TransactionStatus::Completed,
                "reversed"
            ))
        );
        assert_eq!(f.orchestrator.reversal_time_left(&tx), Duration::zero());
    }

    #[test]
    fn test_concurrent_lifecycle_operation_is_rejected() {
        let f = fixture();
        let tx = f.orchestrator.create_transaction(withdrawal(10), "u1").unwrap();

        let _held = f.orchestrator.claim(tx.id, "reversed").unwrap();
        let result = f.orchestrator.reverse_transaction(tx.id, "dup", "ops");

        assert_eq!(
            result,
            Err(TransactionError::invalid_state(
                tx.id,
                TransactionStatus::Completed,
                "reversed"
            ))
        );
    }

    #[test]
    fn test_audit_trail_of_completed_transaction() {
        let f = fixture();
        let tx = f.orchestrator.create_transaction(withdrawal(10), "u1").unwrap();

        let actions: Vec<AuditAction> = f
            .orchestrator
            .get_audit_trail(tx.id)
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect();

        assert_eq!(actions, vec![AuditAction::Created, AuditAction::Completed]);
    }
}
