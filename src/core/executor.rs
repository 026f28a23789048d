//! Balance mutation executor
//!
//! This module provides the `BalanceMutationExecutor`, which applies the balance
//! effect of a transaction through the injected [`AccountLedger`]. Dispatch is a
//! closed `match` over [`MutationKind`]; the executor itself holds no state.
//!
//! # Transfers
//!
//! A transfer is two ledger calls: withdraw from the source, then deposit to the
//! destination. If the deposit fails the executor issues a compensating deposit
//! back to the source, tagged `rollback-<transaction id>`. If that deposit fails
//! too the source stays debited and [`TransactionError::Compensation`] is returned
//! so the record can be flagged for manual reconciliation.

use std::sync::Arc;

use crate::core::traits::AccountLedger;
use crate::types::{
    AccountType, BalanceSnapshot, LedgerRef, MutationKind, ServiceError, Transaction,
    TransactionError,
};

/// Ledger reference used for the compensating deposit of a transfer
pub fn rollback_reference(transaction: &Transaction) -> String {
    format!("rollback-{}", transaction.id)
}

/// Translate a ledger failure into the engine's taxonomy
///
/// `stage` names the step for errors that carry no more specific meaning.
pub fn map_ledger_error(error: ServiceError, target: LedgerRef<'_>, stage: &str) -> TransactionError {
    match error {
        ServiceError::NotFound { .. } => target.not_found(),
        ServiceError::InsufficientFunds {
            available,
            requested,
            ..
        } => TransactionError::insufficient_funds(target.id, available, requested),
        ServiceError::Rejected { message, .. } => TransactionError::execution(stage, message),
        ServiceError::Unavailable { message } => TransactionError::execution(stage, message),
    }
}

/// Applies the balance effect of transactions
pub struct BalanceMutationExecutor {
    ledger: Arc<dyn AccountLedger>,
}

impl BalanceMutationExecutor {
    pub fn new(ledger: Arc<dyn AccountLedger>) -> Self {
        BalanceMutationExecutor { ledger }
    }

    /// Apply the balance effect of `transaction`
    ///
    /// # Returns
    ///
    /// The previous and new balance of the primary account (used credit for credit
    /// accounts), or `None` for types without a balance effect.
    ///
    /// # Errors
    ///
    /// Returns the mapped ledger error of the failing step. For transfers see the
    /// module documentation.
    pub fn execute(
        &self,
        transaction: &Transaction,
    ) -> Result<Option<BalanceSnapshot>, TransactionError> {
        let snapshot = match transaction.tx_type.mutation() {
            MutationKind::Deposit => self.deposit(transaction)?,
            MutationKind::Withdrawal => self.withdraw(transaction)?,
            MutationKind::Transfer => self.transfer(transaction)?,
            MutationKind::CardCharge => self.card_charge(transaction)?,
            MutationKind::CreditRepayment => self.credit_repayment(transaction)?,
            MutationKind::RecordOnly => return Ok(None),
        };
        Ok(Some(snapshot))
    }

    fn description(transaction: &Transaction) -> String {
        if transaction.description.is_empty() {
            transaction.tx_type.display_name().to_string()
        } else {
            format!("{} - {}", transaction.tx_type, transaction.description)
        }
    }

    fn source(transaction: &Transaction) -> Result<LedgerRef<'_>, TransactionError> {
        transaction.source_ref().ok_or_else(|| {
            TransactionError::validation(format!("source is required for {}", transaction.tx_type))
        })
    }

    fn destination(transaction: &Transaction) -> Result<LedgerRef<'_>, TransactionError> {
        transaction.destination_ref().ok_or_else(|| {
            TransactionError::validation(format!(
                "destination is required for {}",
                transaction.tx_type
            ))
        })
    }

    fn deposit(&self, transaction: &Transaction) -> Result<BalanceSnapshot, TransactionError> {
        let target = Self::destination(transaction)?;
        self.add_to(target, transaction, "deposit")
    }

    fn withdraw(&self, transaction: &Transaction) -> Result<BalanceSnapshot, TransactionError> {
        let target = Self::source(transaction)?;
        self.withdraw_from(target, transaction, "withdrawal")
    }

    fn add_to(
        &self,
        target: LedgerRef<'_>,
        transaction: &Transaction,
        stage: &str,
    ) -> Result<BalanceSnapshot, TransactionError> {
        let new = self
            .ledger
            .add_funds(
                target.id,
                transaction.amount,
                &Self::description(transaction),
                &transaction.id.to_string(),
            )
            .map_err(|e| map_ledger_error(e, target, stage))?;
        Ok(BalanceSnapshot {
            previous: new - transaction.amount,
            new,
        })
    }

    fn withdraw_from(
        &self,
        target: LedgerRef<'_>,
        transaction: &Transaction,
        stage: &str,
    ) -> Result<BalanceSnapshot, TransactionError> {
        let new = self
            .ledger
            .withdraw_funds(
                target.id,
                transaction.amount,
                &Self::description(transaction),
                &transaction.id.to_string(),
            )
            .map_err(|e| map_ledger_error(e, target, stage))?;
        Ok(BalanceSnapshot {
            previous: new + transaction.amount,
            new,
        })
    }

    fn transfer(&self, transaction: &Transaction) -> Result<BalanceSnapshot, TransactionError> {
        let source = Self::source(transaction)?;
        let destination = Self::destination(transaction)?;

        let snapshot = self.withdraw_from(source, transaction, "transfer withdrawal")?;

        let deposit_error = match self.add_to(destination, transaction, "transfer deposit") {
            Ok(_) => return Ok(snapshot),
            Err(e) => e,
        };

        tracing::warn!(
            transaction_id = %transaction.id,
            source = source.id,
            destination = destination.id,
            error = %deposit_error,
            "transfer deposit leg failed, compensating"
        );

        match self.ledger.add_funds(
            source.id,
            transaction.amount,
            &format!("Rollback - {}", Self::description(transaction)),
            &rollback_reference(transaction),
        ) {
            Ok(_) => Err(deposit_error),
            Err(rollback_error) => {
                tracing::error!(
                    transaction_id = %transaction.id,
                    source = source.id,
                    amount = %transaction.amount,
                    error = %rollback_error,
                    "transfer compensation failed, source left debited"
                );
                Err(TransactionError::Compensation {
                    transaction_id: transaction.id,
                    original: deposit_error.to_string(),
                    rollback: rollback_error.to_string(),
                })
            }
        }
    }

    fn card_charge(&self, transaction: &Transaction) -> Result<BalanceSnapshot, TransactionError> {
        let target = Self::source(transaction)?;
        let info = self
            .ledger
            .get_account_info(target.id)
            .map_err(|e| map_ledger_error(e, target, "card charge"))?;

        if info.account_type != AccountType::Credit {
            return self.withdraw_from(target, transaction, "card charge");
        }

        let used = self
            .ledger
            .update_credit_usage(target.id, transaction.amount, &transaction.id.to_string())
            .map_err(|e| match e {
                ServiceError::InsufficientFunds {
                    available,
                    requested,
                    ..
                } => TransactionError::insufficient_credit(target.id, available, requested),
                other => map_ledger_error(other, target, "card charge"),
            })?;
        Ok(BalanceSnapshot {
            previous: used - transaction.amount,
            new: used,
        })
    }

    fn credit_repayment(&self, transaction: &Transaction) -> Result<BalanceSnapshot, TransactionError> {
        let target = Self::destination(transaction)?;
        let used = self
            .ledger
            .update_credit_usage(target.id, -transaction.amount, &transaction.id.to_string())
            .map_err(|e| map_ledger_error(e, target, "credit repayment"))?;
        Ok(BalanceSnapshot {
            previous: used + transaction.amount,
            new: used,
        })
    }
}
