//! Account-related types for the transaction engine
//!
//! This module defines the ledger-side view of an account or card and the
//! per-user limits reported by the user directory.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account or card identifier
pub type AccountId = String;

/// User identifier
pub type UserId = String;

/// Kind of ledger entry
///
/// Only [`AccountType::Credit`] entries track used credit; card charges against any
/// other kind withdraw from the balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    Wallet,
    Checking,
    Savings,
    Credit,
    Debit,
}

impl AccountType {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountType::Wallet => "wallet",
            AccountType::Checking => "checking",
            AccountType::Savings => "savings",
            AccountType::Credit => "credit",
            AccountType::Debit => "debit",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "wallet" => Ok(AccountType::Wallet),
            "checking" => Ok(AccountType::Checking),
            "savings" => Ok(AccountType::Savings),
            "credit" | "credit_card" => Ok(AccountType::Credit),
            "debit" | "debit_card" => Ok(AccountType::Debit),
            _ => Err(format!("Invalid account type: '{}'", s)),
        }
    }
}

/// Ledger state of an account or card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,

    /// The user owning the account
    pub owner: UserId,

    pub account_type: AccountType,

    /// Funds on the account
    ///
    /// Never negative: the ledger refuses any withdrawal that would take it below zero.
    pub balance: Decimal,

    /// Credit line, zero for non-credit accounts
    pub credit_limit: Decimal,

    /// Credit currently drawn, always within `0..=credit_limit`
    pub used_credit: Decimal,

    /// Inactive accounts are reported as not found
    pub is_active: bool,
}

impl Account {
    /// Create an active account with the given opening balance and no credit line
    pub fn new(
        id: impl Into<AccountId>,
        owner: impl Into<UserId>,
        account_type: AccountType,
        balance: Decimal,
    ) -> Self {
        Account {
            id: id.into(),
            owner: owner.into(),
            account_type,
            balance,
            credit_limit: Decimal::ZERO,
            used_credit: Decimal::ZERO,
            is_active: true,
        }
    }

    /// Create an active credit account with the given credit line
    pub fn credit(id: impl Into<AccountId>, owner: impl Into<UserId>, credit_limit: Decimal) -> Self {
        Account {
            credit_limit,
            ..Account::new(id, owner, AccountType::Credit, Decimal::ZERO)
        }
    }

    /// Credit still available on the line
    pub fn available_credit(&self) -> Decimal {
        self.credit_limit - self.used_credit
    }

    /// Summary returned by `get_account_info`
    pub fn info(&self) -> AccountInfo {
        AccountInfo {
            id: self.id.clone(),
            owner: self.owner.clone(),
            account_type: self.account_type,
            is_active: self.is_active,
        }
    }
}

/// Metadata about an account, without balances
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub id: AccountId,
    pub owner: UserId,
    pub account_type: AccountType,
    pub is_active: bool,
}

/// Limits the user directory attaches to a user
///
/// `None` means no limit of that kind.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserLimits {
    pub daily_limit: Option<Decimal>,
    pub monthly_limit: Option<Decimal>,
    pub single_transaction_limit: Option<Decimal>,
    /// Amounts above this need a manual approval
    pub approval_threshold: Option<Decimal>,
}
