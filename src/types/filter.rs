//! Query filters for listing a user's transactions

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::transaction::{PaymentMethod, Transaction, TransactionStatus, TransactionType};

/// Default page size when no limit is given
pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Field used to order a listing
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderBy {
    #[default]
    CreatedAt,
    Amount,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Filters, ordering and paging for `list_transactions`
///
/// Empty vectors and `None` fields do not filter. Date bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TransactionFilters {
    pub types: Vec<TransactionType>,
    pub statuses: Vec<TransactionStatus>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    /// Matches either side of the transaction
    pub account_id: Option<String>,
    /// Matches either side of the transaction
    pub card_id: Option<String>,
    /// Case-insensitive substring of the merchant name
    pub merchant_name: Option<String>,
    pub payment_method: Option<PaymentMethod>,
    pub limit: Option<usize>,
    pub offset: usize,
    pub order_by: OrderBy,
    pub sort_order: SortOrder,
}

impl TransactionFilters {
    pub fn matches(&self, tx: &Transaction) -> bool {
        if !self.types.is_empty() && !self.types.contains(&tx.tx_type) {
            return false;
        }
        if !self.statuses.is_empty() && !self.statuses.contains(&tx.status) {
            return false;
        }
        if self.start_date.is_some_and(|start| tx.created_at < start)
            || self.end_date.is_some_and(|end| tx.created_at > end)
        {
            return false;
        }
        if self.min_amount.is_some_and(|min| tx.amount < min)
            || self.max_amount.is_some_and(|max| tx.amount > max)
        {
            return false;
        }
        if let Some(account) = self.account_id.as_deref() {
            let on_either_side = tx.from_account_id.as_deref() == Some(account)
                || tx.to_account_id.as_deref() == Some(account);
            if !on_either_side {
                return false;
            }
        }
        if let Some(card) = self.card_id.as_deref() {
            let on_either_side =
                tx.from_card_id.as_deref() == Some(card) || tx.to_card_id.as_deref() == Some(card);
            if !on_either_side {
                return false;
            }
        }
        if let Some(merchant) = self.merchant_name.as_deref() {
            let needle = merchant.to_lowercase();
            let found = tx
                .merchant_name
                .as_deref()
                .is_some_and(|name| name.to_lowercase().contains(&needle));
            if !found {
                return false;
            }
        }
        if self.payment_method.is_some() && tx.payment_method != self.payment_method {
            return false;
        }
        true
    }

    /// Ordering of two matching transactions
    pub fn compare(&self, a: &Transaction, b: &Transaction) -> Ordering {
        let ordering = match self.order_by {
            OrderBy::CreatedAt => a.created_at.cmp(&b.created_at),
            OrderBy::Amount => a.amount.cmp(&b.amount),
        };
        match self.sort_order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    }

    /// Apply filters, ordering and paging to a set of candidates
    ///
    /// Returns the requested page and the number of matches before paging.
    pub fn apply<I>(&self, candidates: I) -> (Vec<Transaction>, usize)
    where
        I: IntoIterator<Item = Transaction>,
    {
        let mut matching: Vec<Transaction> =
            candidates.into_iter().filter(|tx| self.matches(tx)).collect();
        matching.sort_by(|a, b| self.compare(a, b));

        let total = matching.len();
        let page = matching
            .into_iter()
            .skip(self.offset)
            .take(self.limit.unwrap_or(DEFAULT_PAGE_SIZE))
            .collect();
        (page, total)
    }
}
