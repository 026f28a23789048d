//! In-memory account ledger
//!
//! This module provides [`InMemoryLedger`], a thread-safe [`AccountLedger`] backed by
//! a `DashMap`. It is used by the replay CLI and by tests, which can also inject
//! faults into individual operations.
//!
//! # Thread Safety
//!
//! Every mutating operation runs inside [`InMemoryLedger::update`], which holds the
//! `DashMap` entry guard for the account while the closure checks and mutates it.
//! Two concurrent withdrawals on the same account are therefore serialized, and the
//! second one sees the balance left by the first.

use dashmap::DashMap;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::core::traits::AccountLedger;
use crate::types::{Account, AccountInfo, AccountType, ServiceError};

/// Ledger operations that can be made to fail on purpose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LedgerOperation {
    GetBalance,
    AddFunds,
    WithdrawFunds,
    UpdateCreditUsage,
    GetAccountInfo,
}

/// One applied balance movement
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry {
    pub account_id: String,
    /// Positive for credits, negative for debits
    pub delta: Decimal,
    pub description: String,
    pub reference: String,
}

/// Thread-safe in-memory ledger
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    accounts: DashMap<String, Account>,
    faults: Mutex<HashSet<(String, LedgerOperation)>>,
    journal: Mutex<Vec<LedgerEntry>>,
    mutation_calls: AtomicUsize,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a ledger holding `accounts`
    pub fn with_accounts<I>(accounts: I) -> Self
    where
        I: IntoIterator<Item = Account>,
    {
        let ledger = Self::new();
        for account in accounts {
            ledger.insert(account);
        }
        ledger
    }

    /// Insert or replace an account
    pub fn insert(&self, account: Account) {
        self.accounts.insert(account.id.clone(), account);
    }

    /// Snapshot of one account
    pub fn account(&self, account_id: &str) -> Option<Account> {
        self.accounts.get(account_id).map(|entry| entry.value().clone())
    }

    /// Snapshot of every account, sorted by id
    pub fn accounts(&self) -> Vec<Account> {
        let mut accounts: Vec<Account> = self
            .accounts
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        accounts.sort_by(|a, b| a.id.cmp(&b.id));
        accounts
    }

    /// Make every later `operation` on `account_id` fail with `Unavailable`
    pub fn inject_fault(&self, account_id: &str, operation: LedgerOperation) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.insert((account_id.to_string(), operation));
        }
    }

    pub fn clear_faults(&self) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.clear();
        }
    }

    /// Number of calls made to `add_funds`, `withdraw_funds` and `update_credit_usage`,
    /// successful or not
    pub fn mutation_calls(&self) -> usize {
        self.mutation_calls.load(Ordering::SeqCst)
    }

    /// Every applied balance movement, oldest first
    pub fn journal(&self) -> Vec<LedgerEntry> {
        self.journal
            .lock()
            .map(|journal| journal.clone())
            .unwrap_or_default()
    }

    fn check_fault(&self, account_id: &str, operation: LedgerOperation) -> Result<(), ServiceError> {
        let injected = self
            .faults
            .lock()
            .map(|faults| faults.contains(&(account_id.to_string(), operation)))
            .unwrap_or(false);
        if injected {
            return Err(ServiceError::unavailable(format!(
                "injected {:?} fault on {}",
                operation, account_id
            )));
        }
        Ok(())
    }

    fn record(&self, entry: LedgerEntry) {
        if let Ok(mut journal) = self.journal.lock() {
            journal.push(entry);
        }
    }

    /// Read an active account
    fn read<T>(&self, account_id: &str, f: impl FnOnce(&Account) -> T) -> Result<T, ServiceError> {
        match self.accounts.get(account_id) {
            Some(entry) if entry.is_active => Ok(f(entry.value())),
            _ => Err(ServiceError::not_found(account_id)),
        }
    }

    /// Update an active account using a closure
    ///
    /// The closure runs while the entry guard is held, so the check and the mutation
    /// it performs are atomic with respect to every other ledger call on the account.
    /// Inactive and unknown accounts fail with `NotFound` without calling the closure.
    pub fn update<T, F>(&self, account_id: &str, f: F) -> Result<T, ServiceError>
    where
        F: FnOnce(&mut Account) -> Result<T, ServiceError>,
    {
        match self.accounts.get_mut(account_id) {
            Some(mut entry) if entry.is_active => f(entry.value_mut()),
            _ => Err(ServiceError::not_found(account_id)),
        }
    }

    fn ensure_positive(account_id: &str, amount: Decimal) -> Result<(), ServiceError> {
        if amount <= Decimal::ZERO {
            return Err(ServiceError::rejected(
                account_id,
                format!("amount must be positive, got {}", amount),
            ));
        }
        Ok(())
    }
}

impl AccountLedger for InMemoryLedger {
    fn get_balance(&self, account_id: &str) -> Result<Decimal, ServiceError> {
        self.check_fault(account_id, LedgerOperation::GetBalance)?;
        self.read(account_id, |account| account.balance)
    }

    fn add_funds(
        &self,
        account_id: &str,
        amount: Decimal,
        description: &str,
        reference: &str,
    ) -> Result<Decimal, ServiceError> {
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);
        self.check_fault(account_id, LedgerOperation::AddFunds)?;
        Self::ensure_positive(account_id, amount)?;

        let balance = self.update(account_id, |account| {
            account.balance = account
                .balance
                .checked_add(amount)
                .ok_or_else(|| ServiceError::rejected(account_id, "balance overflow"))?;
            Ok(account.balance)
        })?;

        self.record(LedgerEntry {
            account_id: account_id.to_string(),
            delta: amount,
            description: description.to_string(),
            reference: reference.to_string(),
        });
        Ok(balance)
    }

    fn withdraw_funds(
        &self,
        account_id: &str,
        amount: Decimal,
        description: &str,
        reference: &str,
    ) -> Result<Decimal, ServiceError> {
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);
        self.check_fault(account_id, LedgerOperation::WithdrawFunds)?;
        Self::ensure_positive(account_id, amount)?;

        let balance = self.update(account_id, |account| {
            if account.balance < amount {
                return Err(ServiceError::InsufficientFunds {
                    id: account_id.to_string(),
                    available: account.balance,
                    requested: amount,
                });
            }
            account.balance = account
                .balance
                .checked_sub(amount)
                .ok_or_else(|| ServiceError::rejected(account_id, "balance underflow"))?;
            Ok(account.balance)
        })?;

        self.record(LedgerEntry {
            account_id: account_id.to_string(),
            delta: -amount,
            description: description.to_string(),
            reference: reference.to_string(),
        });
        Ok(balance)
    }

    fn update_credit_usage(
        &self,
        account_id: &str,
        delta: Decimal,
        reference: &str,
    ) -> Result<Decimal, ServiceError> {
        self.mutation_calls.fetch_add(1, Ordering::SeqCst);
        self.check_fault(account_id, LedgerOperation::UpdateCreditUsage)?;

        let used = self.update(account_id, |account| {
            if account.account_type != AccountType::Credit {
                return Err(ServiceError::rejected(account_id, "not a credit account"));
            }
            let used = account
                .used_credit
                .checked_add(delta)
                .ok_or_else(|| ServiceError::rejected(account_id, "credit overflow"))?;
            if used > account.credit_limit {
                return Err(ServiceError::InsufficientFunds {
                    id: account_id.to_string(),
                    available: account.available_credit(),
                    requested: delta,
                });
            }
            if used < Decimal::ZERO {
                return Err(ServiceError::rejected(
                    account_id,
                    format!(
                        "repayment of {} exceeds used credit {}",
                        -delta, account.used_credit
                    ),
                ));
            }
            account.used_credit = used;
            Ok(used)
        })?;

        self.record(LedgerEntry {
            account_id: account_id.to_string(),
            delta,
            description: "credit usage".to_string(),
            reference: reference.to_string(),
        });
        Ok(used)
    }

    fn get_account_info(&self, account_id: &str) -> Result<AccountInfo, ServiceError> {
        self.check_fault(account_id, LedgerOperation::GetAccountInfo)?;
        self.read(account_id, Account::info)
    }

    fn get_available_credit(&self, account_id: &str) -> Result<Decimal, ServiceError> {
        self.read(account_id, Account::available_credit)
    }

    fn validate_account_exists(&self, account_id: &str) -> Result<bool, ServiceError> {
        Ok(self
            .accounts
            .get(account_id)
            .is_some_and(|account| account.is_active))
    }
}
