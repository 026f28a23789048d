//! Audit trail records

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use uuid::Uuid;

use super::transaction::{TransactionId, TransactionStatus};

/// Action recorded by an audit entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Created,
    StatusChanged,
    Completed,
    Failed,
    Canceled,
    Reversed,
}

impl AuditAction {
    pub fn as_str(self) -> &'static str {
        match self {
            AuditAction::Created => "created",
            AuditAction::StatusChanged => "status_changed",
            AuditAction::Completed => "completed",
            AuditAction::Failed => "failed",
            AuditAction::Canceled => "canceled",
            AuditAction::Reversed => "reversed",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable record of one state-affecting operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub transaction_id: TransactionId,
    /// Owner of the transaction
    pub user_id: String,
    pub action: AuditAction,
    pub old_status: Option<TransactionStatus>,
    pub new_status: Option<TransactionStatus>,
    /// `status: {old, new}` plus whatever extra fields the caller supplied
    pub changed_fields: Map<String, Value>,
    pub actor: String,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input to `AuditLogger::log_change`
#[derive(Debug, Clone, PartialEq)]
pub struct AuditChange {
    pub transaction_id: TransactionId,
    pub user_id: String,
    pub action: AuditAction,
    pub old_status: Option<TransactionStatus>,
    pub new_status: Option<TransactionStatus>,
    pub actor: String,
    pub reason: Option<String>,
    pub extra_fields: Map<String, Value>,
}

impl AuditChange {
    pub fn new(
        transaction_id: TransactionId,
        user_id: &str,
        action: AuditAction,
        actor: &str,
    ) -> Self {
        AuditChange {
            transaction_id,
            user_id: user_id.to_string(),
            action,
            old_status: None,
            new_status: None,
            actor: actor.to_string(),
            reason: None,
            extra_fields: Map::new(),
        }
    }

    pub fn status(mut self, old: Option<TransactionStatus>, new: TransactionStatus) -> Self {
        self.old_status = old;
        self.new_status = Some(new);
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn field(mut self, name: &str, value: Value) -> Self {
        self.extra_fields.insert(name.to_string(), value);
        self
    }

    /// Freeze the change into an entry stamped at `now`
    pub fn into_entry(self, now: DateTime<Utc>) -> AuditEntry {
        let mut changed_fields = self.extra_fields;
        if self.old_status != self.new_status {
            changed_fields.insert(
                "status".to_string(),
                json!({ "old": self.old_status, "new": self.new_status }),
            );
        }

        AuditEntry {
            id: Uuid::new_v4(),
            transaction_id: self.transaction_id,
            user_id: self.user_id,
            action: self.action,
            old_status: self.old_status,
            new_status: self.new_status,
            changed_fields,
            actor: self.actor,
            reason: self.reason,
            created_at: now,
        }
    }
}
