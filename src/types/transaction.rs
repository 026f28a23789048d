//! Transaction-related types
//!
//! This module defines the transaction record, its closed set of types and statuses,
//! the creation request, and the mapping from each type to the balance mutation it
//! performs.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::error::TransactionError;
use crate::core::state_machine;

/// Transaction identifier
pub type TransactionId = Uuid;

/// Metadata key that marks a transaction as already applied upstream
pub const RECORD_ONLY_KEY: &str = "recordOnly";

/// Metadata key set when a rule requires manual approval before execution
pub const APPROVAL_REQUIRED_KEY: &str = "approval_required";

/// Metadata key set when a failed transfer left the source debited
pub const RECONCILIATION_KEY: &str = "requires_reconciliation";

/// Transaction types supported by the engine
///
/// The set is closed: every variant maps to exactly one [`MutationKind`] through
/// [`TransactionType::mutation`], so adding a variant forces every dispatch site to
/// be revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    WalletDeposit,
    WalletWithdrawal,
    WalletTransfer,
    CreditCharge,
    CreditPayment,
    CreditRefund,
    DebitPurchase,
    DebitWithdrawal,
    DebitRefund,
    AccountTransfer,
    AccountDeposit,
    AccountWithdraw,
    InstallmentPayment,
    InstallmentRefund,
    InstallmentPlanCompletion,
}

/// The balance effect a transaction type has on the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    /// Add funds to the destination
    Deposit,
    /// Subtract funds from the source
    Withdrawal,
    /// Withdraw from the source, then deposit to the destination
    Transfer,
    /// Increase used credit on credit accounts, withdraw on anything else
    CardCharge,
    /// Decrease used credit on the destination credit account
    CreditRepayment,
    /// No balance effect; the transaction is only recorded
    RecordOnly,
}

impl TransactionType {
    /// Every transaction type, in declaration order
    pub const ALL: [TransactionType; 15] = [
        TransactionType::WalletDeposit,
        TransactionType::WalletWithdrawal,
        TransactionType::WalletTransfer,
        TransactionType::CreditCharge,
        TransactionType::CreditPayment,
        TransactionType::CreditRefund,
        TransactionType::DebitPurchase,
        TransactionType::DebitWithdrawal,
        TransactionType::DebitRefund,
        TransactionType::AccountTransfer,
        TransactionType::AccountDeposit,
        TransactionType::AccountWithdraw,
        TransactionType::InstallmentPayment,
        TransactionType::InstallmentRefund,
        TransactionType::InstallmentPlanCompletion,
    ];

    /// The balance mutation performed for this type
    pub fn mutation(self) -> MutationKind {
        match self {
            TransactionType::WalletDeposit
            | TransactionType::AccountDeposit
            | TransactionType::DebitRefund
            | TransactionType::InstallmentRefund => MutationKind::Deposit,
            TransactionType::WalletWithdrawal
            | TransactionType::AccountWithdraw
            | TransactionType::DebitWithdrawal
            | TransactionType::InstallmentPayment => MutationKind::Withdrawal,
            TransactionType::WalletTransfer | TransactionType::AccountTransfer => {
                MutationKind::Transfer
            }
            TransactionType::CreditCharge | TransactionType::DebitPurchase => {
                MutationKind::CardCharge
            }
            TransactionType::CreditPayment | TransactionType::CreditRefund => {
                MutationKind::CreditRepayment
            }
            TransactionType::InstallmentPlanCompletion => MutationKind::RecordOnly,
        }
    }

    /// The type used to undo a completed transaction of this type
    ///
    /// Source and destination references are swapped by the caller.
    pub fn reversal(self) -> Option<TransactionType> {
        let reversal = match self {
            TransactionType::WalletDeposit => TransactionType::WalletWithdrawal,
            TransactionType::WalletWithdrawal => TransactionType::WalletDeposit,
            TransactionType::WalletTransfer => TransactionType::WalletTransfer,
            TransactionType::AccountDeposit => TransactionType::AccountWithdraw,
            TransactionType::AccountWithdraw => TransactionType::AccountDeposit,
            TransactionType::AccountTransfer => TransactionType::AccountTransfer,
            TransactionType::CreditCharge => TransactionType::CreditRefund,
            TransactionType::CreditRefund => TransactionType::CreditCharge,
            TransactionType::CreditPayment => TransactionType::CreditCharge,
            TransactionType::DebitPurchase => TransactionType::DebitRefund,
            TransactionType::DebitRefund => TransactionType::DebitPurchase,
            TransactionType::DebitWithdrawal => TransactionType::AccountDeposit,
            TransactionType::InstallmentPayment => TransactionType::InstallmentRefund,
            TransactionType::InstallmentRefund => TransactionType::InstallmentPayment,
            TransactionType::InstallmentPlanCompletion => return None,
        };
        Some(reversal)
    }

    /// Whether a source account or card must be referenced
    pub fn requires_source(self) -> bool {
        matches!(
            self.mutation(),
            MutationKind::Withdrawal | MutationKind::Transfer | MutationKind::CardCharge
        )
    }

    /// Whether a destination account or card must be referenced
    pub fn requires_destination(self) -> bool {
        matches!(
            self.mutation(),
            MutationKind::Deposit | MutationKind::Transfer | MutationKind::CreditRepayment
        )
    }

    /// Snake-case wire name
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::WalletDeposit => "wallet_deposit",
            TransactionType::WalletWithdrawal => "wallet_withdrawal",
            TransactionType::WalletTransfer => "wallet_transfer",
            TransactionType::CreditCharge => "credit_charge",
            TransactionType::CreditPayment => "credit_payment",
            TransactionType::CreditRefund => "credit_refund",
            TransactionType::DebitPurchase => "debit_purchase",
            TransactionType::DebitWithdrawal => "debit_withdrawal",
            TransactionType::DebitRefund => "debit_refund",
            TransactionType::AccountTransfer => "account_transfer",
            TransactionType::AccountDeposit => "account_deposit",
            TransactionType::AccountWithdraw => "account_withdraw",
            TransactionType::InstallmentPayment => "installment_payment",
            TransactionType::InstallmentRefund => "installment_refund",
            TransactionType::InstallmentPlanCompletion => "installment_plan_completion",
        }
    }

    /// Human-readable name
    pub fn display_name(self) -> &'static str {
        match self {
            TransactionType::WalletDeposit => "Wallet Deposit",
            TransactionType::WalletWithdrawal => "Wallet Withdrawal",
            TransactionType::WalletTransfer => "Wallet Transfer",
            TransactionType::CreditCharge => "Credit Card Charge",
            TransactionType::CreditPayment => "Credit Card Payment",
            TransactionType::CreditRefund => "Credit Card Refund",
            TransactionType::DebitPurchase => "Debit Card Purchase",
            TransactionType::DebitWithdrawal => "Debit Card Withdrawal",
            TransactionType::DebitRefund => "Debit Card Refund",
            TransactionType::AccountTransfer => "Account Transfer",
            TransactionType::AccountDeposit => "Account Deposit",
            TransactionType::AccountWithdraw => "Account Withdrawal",
            TransactionType::InstallmentPayment => "Installment Payment",
            TransactionType::InstallmentRefund => "Installment Refund",
            TransactionType::InstallmentPlanCompletion => "Installment Plan Completion",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        TransactionType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| format!("Invalid transaction type: '{}'", s))
    }
}

/// Lifecycle status of a transaction
///
/// Legal transitions are defined by [`crate::core::state_machine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
    Canceled,
    Reversed,
}

impl TransactionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Canceled => "canceled",
            TransactionStatus::Reversed => "reversed",
        }
    }

    /// A terminal status has no outgoing transition
    pub fn is_terminal(self) -> bool {
        state_machine::is_terminal(self)
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(TransactionStatus::Pending),
            "completed" => Ok(TransactionStatus::Completed),
            "failed" => Ok(TransactionStatus::Failed),
            "canceled" | "cancelled" => Ok(TransactionStatus::Canceled),
            "reversed" => Ok(TransactionStatus::Reversed),
            _ => Err(format!("Invalid transaction status: '{}'", s)),
        }
    }
}

/// Method used to fund a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    BankTransfer,
    CreditCard,
    DebitCard,
    Wallet,
    InstallmentCompletion,
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "bank_transfer" => Ok(PaymentMethod::BankTransfer),
            "credit_card" => Ok(PaymentMethod::CreditCard),
            "debit_card" => Ok(PaymentMethod::DebitCard),
            "wallet" => Ok(PaymentMethod::Wallet),
            "installment_completion" => Ok(PaymentMethod::InstallmentCompletion),
            _ => Err(format!("Invalid payment method: '{}'", s)),
        }
    }
}

/// Whether a ledger reference points at an account or a card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefKind {
    Account,
    Card,
}

/// A borrowed reference to a ledger entry named by a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerRef<'a> {
    pub id: &'a str,
    pub kind: RefKind,
}

impl<'a> LedgerRef<'a> {
    pub fn account(id: &'a str) -> Self {
        LedgerRef {
            id,
            kind: RefKind::Account,
        }
    }

    pub fn card(id: &'a str) -> Self {
        LedgerRef {
            id,
            kind: RefKind::Card,
        }
    }

    /// The not-found error matching the kind of reference
    pub fn not_found(&self) -> TransactionError {
        match self.kind {
            RefKind::Account => TransactionError::account_not_found(self.id),
            RefKind::Card => TransactionError::card_not_found(self.id),
        }
    }
}

/// Balance of the primary account before and after execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceSnapshot {
    pub previous: Decimal,
    pub new: Decimal,
}

/// Data needed to create a transaction
///
/// Built with [`CreateTransactionRequest::new`] and the chained setters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTransactionRequest {
    pub user_id: String,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub amount: Decimal,
    pub currency: String,
    pub from_account_id: Option<String>,
    pub to_account_id: Option<String>,
    pub from_card_id: Option<String>,
    pub to_card_id: Option<String>,
    pub description: String,
    pub payment_method: Option<PaymentMethod>,
    pub merchant_name: Option<String>,
    pub merchant_id: Option<String>,
    pub reference_id: Option<String>,
    pub external_id: Option<String>,
    pub metadata: Map<String, Value>,
    pub tags: Vec<String>,
    /// Balance effect was already applied by an upstream caller
    pub record_only: bool,
}

impl CreateTransactionRequest {
    pub fn new(user_id: impl Into<String>, tx_type: TransactionType, amount: Decimal) -> Self {
        CreateTransactionRequest {
            user_id: user_id.into(),
            tx_type,
            amount,
            currency: String::new(),
            from_account_id: None,
            to_account_id: None,
            from_card_id: None,
            to_card_id: None,
            description: String::new(),
            payment_method: None,
            merchant_name: None,
            merchant_id: None,
            reference_id: None,
            external_id: None,
            metadata: Map::new(),
            tags: Vec::new(),
            record_only: false,
        }
    }

    pub fn currency(mut self, currency: impl Into<String>) -> Self {
        self.currency = currency.into();
        self
    }

    pub fn from_account(mut self, id: impl Into<String>) -> Self {
        self.from_account_id = Some(id.into());
        self
    }

    pub fn to_account(mut self, id: impl Into<String>) -> Self {
        self.to_account_id = Some(id.into());
        self
    }

    pub fn from_card(mut self, id: impl Into<String>) -> Self {
        self.from_card_id = Some(id.into());
        self
    }

    pub fn to_card(mut self, id: impl Into<String>) -> Self {
        self.to_card_id = Some(id.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn payment_method(mut self, method: PaymentMethod) -> Self {
        self.payment_method = Some(method);
        self
    }

    pub fn merchant(mut self, name: impl Into<String>) -> Self {
        self.merchant_name = Some(name.into());
        self
    }

    pub fn reference(mut self, reference_id: impl Into<String>) -> Self {
        self.reference_id = Some(reference_id.into());
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tags.push(tag.into());
        self
    }

    pub fn record_only(mut self) -> Self {
        self.record_only = true;
        self
    }
}

/// A financial transaction
///
/// Created in [`TransactionStatus::Pending`]. Status changes go through
/// [`Transaction::transition`], which consults the lifecycle state machine, so an
/// illegal status can never be written through this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub reference_id: Option<String>,
    pub external_id: Option<String>,
    #[serde(rename = "type")]
    pub tx_type: TransactionType,
    pub status: TransactionStatus,
    pub amount: Decimal,
    pub currency: String,
    pub from_account_id: Option<String>,
    pub to_account_id: Option<String>,
    pub from_card_id: Option<String>,
    pub to_card_id: Option<String>,
    pub user_id: String,
    pub initiated_by: String,
    pub description: String,
    pub payment_method: Option<PaymentMethod>,
    pub merchant_name: Option<String>,
    pub merchant_id: Option<String>,
    pub previous_balance: Option<Decimal>,
    pub new_balance: Option<Decimal>,
    pub processed_at: Option<DateTime<Utc>>,
    pub failed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
    pub metadata: Map<String, Value>,
    pub tags: Vec<String>,
    /// Id of the transaction that reversed this one
    pub reversed_by: Option<TransactionId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl Transaction {
    /// Build a new pending transaction from a request
    pub fn pending(
        request: CreateTransactionRequest,
        initiated_by: &str,
        now: DateTime<Utc>,
    ) -> Self {
        let mut metadata = request.metadata;
        if request.record_only {
            metadata.insert(RECORD_ONLY_KEY.to_string(), Value::Bool(true));
        }

        Transaction {
            id: Uuid::new_v4(),
            reference_id: request.reference_id,
            external_id: request.external_id,
            tx_type: request.tx_type,
            status: TransactionStatus::Pending,
            amount: request.amount,
            currency: request.currency,
            from_account_id: request.from_account_id,
            to_account_id: request.to_account_id,
            from_card_id: request.from_card_id,
            to_card_id: request.to_card_id,
            user_id: request.user_id,
            initiated_by: initiated_by.to_string(),
            description: request.description,
            payment_method: request.payment_method,
            merchant_name: request.merchant_name,
            merchant_id: request.merchant_id,
            previous_balance: None,
            new_balance: None,
            processed_at: None,
            failed_at: None,
            failure_reason: None,
            metadata,
            tags: request.tags,
            reversed_by: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Structural validation: amount, identities and the references required by the type
    pub fn validate(&self) -> Result<(), TransactionError> {
        if self.amount <= Decimal::ZERO {
            return Err(TransactionError::validation(
                "transaction amount must be positive",
            ));
        }
        if self.currency.trim().is_empty() {
            return Err(TransactionError::validation("currency is required"));
        }
        if self.user_id.trim().is_empty() {
            return Err(TransactionError::validation("user ID is required"));
        }
        if self.initiated_by.trim().is_empty() {
            return Err(TransactionError::validation("initiated by is required"));
        }

        if self.tx_type.mutation() == MutationKind::Transfer {
            let (from, to) = match (
                non_empty(&self.from_account_id),
                non_empty(&self.to_account_id),
            ) {
                (Some(from), Some(to)) => (from, to),
                _ => {
                    return Err(TransactionError::validation(
                        "both source and destination accounts required for transfer",
                    ))
                }
            };
            if from == to {
                return Err(TransactionError::validation(
                    "cannot transfer to the same account",
                ));
            }
            return Ok(());
        }

        if self.tx_type.requires_source() && self.source_ref().is_none() {
            return Err(TransactionError::validation(format!(
                "source account or card is required for {}",
                self.tx_type
            )));
        }
        if self.tx_type.requires_destination() && self.destination_ref().is_none() {
            return Err(TransactionError::validation(format!(
                "destination account or card is required for {}",
                self.tx_type
            )));
        }

        Ok(())
    }

    /// The ledger entry funds leave from
    ///
    /// Card-funded types prefer the card reference, everything else the account.
    pub fn source_ref(&self) -> Option<LedgerRef<'_>> {
        let account = non_empty(&self.from_account_id).map(LedgerRef::account);
        let card = non_empty(&self.from_card_id).map(LedgerRef::card);
        if self.tx_type.mutation() == MutationKind::CardCharge {
            card.or(account)
        } else {
            account.or(card)
        }
    }

    /// The ledger entry funds arrive at
    pub fn destination_ref(&self) -> Option<LedgerRef<'_>> {
        let account = non_empty(&self.to_account_id).map(LedgerRef::account);
        let card = non_empty(&self.to_card_id).map(LedgerRef::card);
        if self.tx_type.mutation() == MutationKind::CreditRepayment {
            card.or(account)
        } else {
            account.or(card)
        }
    }

    /// Balance effect was already applied upstream
    ///
    /// Accepts both `true` and `"true"` under the `recordOnly` metadata key.
    pub fn is_record_only(&self) -> bool {
        match self.metadata.get(RECORD_ONLY_KEY) {
            Some(Value::Bool(flag)) => *flag,
            Some(Value::String(flag)) => flag == "true",
            _ => false,
        }
    }

    /// Waiting for a manual approval before execution
    pub fn awaits_approval(&self) -> bool {
        self.status == TransactionStatus::Pending
            && matches!(self.metadata.get(APPROVAL_REQUIRED_KEY), Some(Value::Bool(true)))
    }

    /// Move to `to`, enforcing the lifecycle state machine
    ///
    /// Returns the previous status. Timestamps that belong to the target status are
    /// stamped here; the stored record is left untouched on error.
    pub fn transition(
        &mut self,
        to: TransactionStatus,
        now: DateTime<Utc>,
    ) -> Result<TransactionStatus, TransactionError> {
        state_machine::ensure_transition(self.status, to)?;

        let from = self.status;
        self.status = to;
        self.updated_at = now;
        match to {
            TransactionStatus::Completed => self.processed_at = Some(now),
            TransactionStatus::Failed => self.failed_at = Some(now),
            _ => {}
        }
        Ok(from)
    }

    /// Transition to `Failed` and record the reason
    pub fn fail(
        &mut self,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<TransactionStatus, TransactionError> {
        let from = self.transition(TransactionStatus::Failed, now)?;
        self.failure_reason = Some(reason.to_string());
        Ok(from)
    }

    /// Build the request for the inverse transaction
    pub fn reversal_request(&self, reason: &str) -> Result<CreateTransactionRequest, TransactionError> {
        let tx_type = self.tx_type.reversal().ok_or_else(|| {
            TransactionError::validation(format!(
                "no reversal type defined for {}",
                self.tx_type
            ))
        })?;

        let mut request = CreateTransactionRequest::new(self.user_id.clone(), tx_type, self.amount)
            .currency(self.currency.clone())
            .description(format!("Reversal of transaction {} - {}", self.id, reason))
            .reference(self.id.to_string())
            .metadata("reversal_of", Value::String(self.id.to_string()))
            .tag("reversal");
        request.from_account_id = self.to_account_id.clone();
        request.to_account_id = self.from_account_id.clone();
        request.from_card_id = self.to_card_id.clone();
        request.to_card_id = self.from_card_id.clone();
        request.payment_method = self.payment_method;
        request.merchant_name = self.merchant_name.clone();
        request.merchant_id = self.merchant_id.clone();
        Ok(request)
    }
}
