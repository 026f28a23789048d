//! Rule resolution and validation
//!
//! This module provides the `RuleEngine`, which turns the stored rules of a user
//! into one merged [`RuleLimits`] and checks a transaction against it.
//!
//! # Resolution
//!
//! Only rules whose scope matches the transaction (user, and account, card and type
//! when the rule names them) and whose validity interval contains the evaluation
//! time are considered. They are folded left to right with [`RuleLimits::merge`]
//! in creation order. When nothing applies the configured default limits are used.
//!
//! # Validation
//!
//! Validation is pure. It never touches the ledger or any store; it only tells
//! the orchestrator whether the transaction may proceed, must wait for a manual
//! approval, or is rejected.

use chrono::{DateTime, Timelike, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::core::traits::RuleRepository;
use crate::types::{
    RuleId, RuleLimits, RulePatch, RuleScope, RuleViolationKind, Transaction, TransactionError,
    TransactionRule, TransactionType,
};

/// Result of a successful rule validation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleOutcome {
    /// The transaction may execute immediately
    Approved,
    /// The transaction must stay pending until an operator processes it
    RequiresApproval,
}

/// A user's completed volume in the current periods
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VolumeUsage {
    /// Completed volume since the start of the current UTC day
    pub daily: Decimal,
    /// Completed volume since the start of the current UTC month
    pub monthly: Decimal,
}

/// Resolves, validates and manages transaction rules
pub struct RuleEngine {
    rules: Arc<dyn RuleRepository>,
    default_limits: RuleLimits,
}

impl RuleEngine {
    /// Create a rule engine over a rule store
    ///
    /// # Arguments
    ///
    /// * `rules` - Rule storage
    /// * `default_limits` - Limits applied when no stored rule matches
    pub fn new(rules: Arc<dyn RuleRepository>, default_limits: RuleLimits) -> Self {
        RuleEngine {
            rules,
            default_limits,
        }
    }

    /// Merge every applicable rule into one set of limits
    ///
    /// # Errors
    ///
    /// Returns a storage error when the rule store cannot be read.
    pub fn resolve_rules(
        &self,
        user_id: &str,
        account_id: Option<&str>,
        card_id: Option<&str>,
        tx_type: TransactionType,
        at: DateTime<Utc>,
    ) -> Result<RuleLimits, TransactionError> {
        let applicable = self
            .rules
            .rules_for_user(user_id)?
            .into_iter()
            .filter(|rule| rule.is_effective(at))
            .filter(|rule| rule.scope.matches(user_id, account_id, card_id, tx_type));

        let merged = applicable.fold(None, |merged: Option<RuleLimits>, rule| {
            Some(match merged {
                Some(limits) => limits.merge(&rule.limits),
                None => rule.limits,
            })
        });

        Ok(merged.unwrap_or_else(|| self.default_limits.clone()))
    }

    /// Check a transaction against resolved limits
    ///
    /// Checks run in order: single amount, allowed hours, daily volume, monthly
    /// volume, then the approval requirement.
    ///
    /// # Arguments
    ///
    /// * `limits` - Limits returned by [`RuleEngine::resolve_rules`]
    /// * `transaction` - The transaction being created
    /// * `usage` - The user's completed volume in the current day and month
    /// * `at` - Evaluation time; its UTC hour is checked against the allowed window
    ///
    /// # Errors
    ///
    /// Returns `RuleViolation` naming the limit that was exceeded.
    pub fn validate(
        limits: &RuleLimits,
        transaction: &Transaction,
        usage: VolumeUsage,
        at: DateTime<Utc>,
    ) -> Result<RuleOutcome, TransactionError> {
        let amount = transaction.amount;

        if let Some(max) = limits.max_single_amount {
            if amount > max {
                return Err(TransactionError::rule_violation(
                    RuleViolationKind::SingleAmountLimit,
                    format!("transaction amount {} exceeds maximum allowed {}", amount, max),
                ));
            }
        }

        let hour = at.hour();
        if let Some(window) = limits.allowed_hours.iter().find(|w| !w.contains(hour)) {
            return Err(TransactionError::rule_violation(
                RuleViolationKind::OutsideAllowedHours,
                format!(
                    "transaction not allowed at hour {} UTC, allowed hours {}",
                    hour, window
                ),
            ));
        }

        if let Some(max) = limits.max_daily_amount {
            if usage.daily + amount > max {
                return Err(TransactionError::rule_violation(
                    RuleViolationKind::DailyAmountLimit,
                    format!(
                        "daily limit {} exceeded: {} already used, {} requested",
                        max, usage.daily, amount
                    ),
                ));
            }
        }

        if let Some(max) = limits.max_monthly_amount {
            if usage.monthly + amount > max {
                return Err(TransactionError::rule_violation(
                    RuleViolationKind::MonthlyAmountLimit,
                    format!(
                        "monthly limit {} exceeded: {} already used, {} requested",
                        max, usage.monthly, amount
                    ),
                ));
            }
        }

        if limits.needs_approval(amount) {
            return Ok(RuleOutcome::RequiresApproval);
        }
        Ok(RuleOutcome::Approved)
    }

    /// Store a new rule effective from `now`
    pub fn create_rule(
        &self,
        scope: RuleScope,
        limits: RuleLimits,
        created_by: &str,
        now: DateTime<Utc>,
    ) -> Result<TransactionRule, TransactionError> {
        validate_limits(&limits)?;
        let rule = TransactionRule::new(scope, limits, created_by, now);
        self.rules.create(&rule)?;
        Ok(rule)
    }

    /// Apply a partial update to a stored rule
    pub fn update_rule(&self, id: RuleId, patch: RulePatch) -> Result<TransactionRule, TransactionError> {
        let mut rule = self
            .rules
            .get(id)?
            .ok_or(TransactionError::RuleNotFound { id })?;
        patch.apply(&mut rule);
        validate_limits(&rule.limits)?;
        if rule
            .effective_until
            .is_some_and(|until| until <= rule.effective_from)
        {
            return Err(TransactionError::validation(
                "rule must end after it becomes effective",
            ));
        }
        self.rules.update(&rule)?;
        Ok(rule)
    }

    pub fn delete_rule(&self, id: RuleId) -> Result<(), TransactionError> {
        if self.rules.delete(id)? {
            Ok(())
        } else {
            Err(TransactionError::RuleNotFound { id })
        }
    }

    /// Every stored rule of a user, effective or not
    pub fn list_rules(&self, user_id: &str) -> Result<Vec<TransactionRule>, TransactionError> {
        self.rules.rules_for_user(user_id)
    }
}

fn validate_limits(limits: &RuleLimits) -> Result<(), TransactionError> {
    let numeric = [
        ("max_single_amount", limits.max_single_amount),
        ("max_daily_amount", limits.max_daily_amount),
        ("max_monthly_amount", limits.max_monthly_amount),
        ("approval_threshold", limits.approval_threshold),
    ];
    for (name, value) in numeric {
        if value.is_some_and(|v| v <= Decimal::ZERO) {
            return Err(TransactionError::validation(format!(
                "{} must be positive",
                name
            )));
        }
    }
    Ok(())
}
