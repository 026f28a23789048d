//! Replay commands and their outcomes
//!
//! A replay file is a CSV of requests, each carrying a caller-chosen request number.
//! Lifecycle commands point at an earlier create request through that number.

use super::error::TransactionError;
use super::transaction::{CreateTransactionRequest, Transaction, TransactionId, TransactionStatus};

/// Caller-chosen number of a replayed request
pub type RequestNo = u32;

/// What a replayed request asks the orchestrator to do
#[derive(Debug, Clone, PartialEq)]
pub enum ReplayAction {
    Create(CreateTransactionRequest),
    Process { target: RequestNo },
    Complete { target: RequestNo },
    Fail { target: RequestNo, reason: String },
    Cancel { target: RequestNo, reason: String },
    Reverse { target: RequestNo, reason: String },
}

impl ReplayAction {
    pub fn name(&self) -> &'static str {
        match self {
            ReplayAction::Create(_) => "create",
            ReplayAction::Process { .. } => "process",
            ReplayAction::Complete { .. } => "complete",
            ReplayAction::Fail { .. } => "fail",
            ReplayAction::Cancel { .. } => "cancel",
            ReplayAction::Reverse { .. } => "reverse",
        }
    }
}

/// One parsed replay request
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayCommand {
    pub request: RequestNo,
    /// Acting user
    pub user: String,
    pub action: ReplayAction,
}

/// Result row of one replayed request
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayOutcome {
    pub request: RequestNo,
    pub transaction_id: Option<TransactionId>,
    pub status: Option<TransactionStatus>,
    pub error_kind: Option<&'static str>,
    pub message: String,
}

impl ReplayOutcome {
    pub fn succeeded(request: RequestNo, transaction: &Transaction) -> Self {
        ReplayOutcome {
            request,
            transaction_id: Some(transaction.id),
            status: Some(transaction.status),
            error_kind: None,
            message: String::new(),
        }
    }

    /// `transaction` is the stored record left behind by the failure, if any
    pub fn failed(
        request: RequestNo,
        error: &TransactionError,
        transaction: Option<&Transaction>,
    ) -> Self {
        ReplayOutcome {
            request,
            transaction_id: transaction.map(|tx| tx.id),
            status: transaction.map(|tx| tx.status),
            error_kind: Some(error.kind()),
            message: error.to_string(),
        }
    }

    /// The request could not be parsed or resolved
    pub fn rejected(request: RequestNo, kind: &'static str, message: impl Into<String>) -> Self {
        ReplayOutcome {
            request,
            transaction_id: None,
            status: None,
            error_kind: Some(kind),
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error_kind.is_none()
    }
}
