//! Transaction lifecycle state machine
//!
//! A fixed table of legal status edges:
//!
//! ```text
//! Pending   -> Completed | Failed | Canceled
//! Completed -> Reversed
//! Failed, Canceled, Reversed: terminal
//! ```
//!
//! Every status-changing operation goes through [`ensure_transition`]. Nothing else
//! in the crate decides whether an edge is legal.

use crate::types::error::TransactionError;
use crate::types::transaction::TransactionStatus;

/// Statuses reachable in one step from `from`
pub fn allowed_transitions(from: TransactionStatus) -> &'static [TransactionStatus] {
    match from {
        TransactionStatus::Pending => &[
            TransactionStatus::Completed,
            TransactionStatus::Failed,
            TransactionStatus::Canceled,
        ],
        TransactionStatus::Completed => &[TransactionStatus::Reversed],
        TransactionStatus::Failed | TransactionStatus::Canceled | TransactionStatus::Reversed => {
            &[]
        }
    }
}

pub fn can_transition(from: TransactionStatus, to: TransactionStatus) -> bool {
    allowed_transitions(from).contains(&to)
}

/// Fail with `InvalidTransition` unless `from -> to` is a legal edge
pub fn ensure_transition(
    from: TransactionStatus,
    to: TransactionStatus,
) -> Result<(), TransactionError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(TransactionError::InvalidTransition { from, to })
    }
}

pub fn is_terminal(status: TransactionStatus) -> bool {
    allowed_transitions(status).is_empty()
}
