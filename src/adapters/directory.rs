//! In-memory user directory and notification dispatcher

use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::core::traits::{NotificationDispatcher, UserDirectory};
use crate::types::{ServiceError, Transaction, TransactionId, UserLimits};

/// In-memory [`UserDirectory`]
#[derive(Debug, Default)]
pub struct InMemoryUserDirectory {
    users: DashMap<String, Option<UserLimits>>,
}

impl InMemoryUserDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a directory with the given users, none of them limited
    pub fn with_users<I, S>(users: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let directory = Self::new();
        for user in users {
            directory.add_user(user);
        }
        directory
    }

    /// Register a user without limits; keeps existing limits of a known user
    pub fn add_user(&self, user_id: impl Into<String>) {
        self.users.entry(user_id.into()).or_insert(None);
    }

    /// Register a user with limits, replacing any previous ones
    pub fn set_limits(&self, user_id: impl Into<String>, limits: UserLimits) {
        self.users.insert(user_id.into(), Some(limits));
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn validate_user(&self, user_id: &str) -> Result<(), ServiceError> {
        if self.users.contains_key(user_id) {
            Ok(())
        } else {
            Err(ServiceError::not_found(user_id))
        }
    }

    fn get_user_limits(&self, user_id: &str) -> Result<Option<UserLimits>, ServiceError> {
        self.users
            .get(user_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| ServiceError::not_found(user_id))
    }
}

/// [`NotificationDispatcher`] that remembers what it was asked to send
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<TransactionId>>,
    failing: AtomicBool,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later notification fail
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Ids of the transactions notified so far
    pub fn sent(&self) -> Vec<TransactionId> {
        self.sent.lock().map(|sent| sent.clone()).unwrap_or_default()
    }
}

impl NotificationDispatcher for RecordingNotifier {
    fn send_transaction_notification(&self, transaction: &Transaction) -> Result<(), ServiceError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(ServiceError::unavailable("notification channel down"));
        }
        self.sent
            .lock()
            .map_err(|_| ServiceError::unavailable("notifier lock poisoned"))?
            .push(transaction.id);
        Ok(())
    }
}
