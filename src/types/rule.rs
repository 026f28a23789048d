//! Transaction rules
//!
//! A rule limits what a user may do, optionally narrowed to one account, card or
//! transaction type. The rule engine merges every applicable rule into a single
//! [`RuleLimits`] with [`RuleLimits::merge`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use super::account::UserLimits;
use super::transaction::TransactionType;

/// Rule identifier
pub type RuleId = Uuid;

/// Inclusive window of UTC hours during which transactions are accepted
///
/// `0-23` accepts every hour. A window whose start is after its end wraps midnight,
/// so `22-6` accepts 22:00 through 06:59.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AllowedHours {
    start: u8,
    end: u8,
}

impl AllowedHours {
    /// The window accepting every hour of the day
    pub const ALWAYS: AllowedHours = AllowedHours { start: 0, end: 23 };

    pub fn new(start: u8, end: u8) -> Result<Self, String> {
        if start > 23 || end > 23 {
            return Err(format!("hours must be within 0-23, got {}-{}", start, end));
        }
        Ok(AllowedHours { start, end })
    }

    pub fn start(&self) -> u8 {
        self.start
    }

    pub fn end(&self) -> u8 {
        self.end
    }

    /// Whether `hour` (0-23) falls inside the window
    pub fn contains(&self, hour: u32) -> bool {
        let (start, end) = (u32::from(self.start), u32::from(self.end));
        if start <= end {
            (start..=end).contains(&hour)
        } else {
            hour >= start || hour <= end
        }
    }
}

impl Default for AllowedHours {
    fn default() -> Self {
        AllowedHours::ALWAYS
    }
}

impl fmt::Display for AllowedHours {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl FromStr for AllowedHours {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .trim()
            .split_once('-')
            .ok_or_else(|| format!("Invalid allowed hours: '{}'", s))?;
        let parse = |part: &str| {
            part.trim()
                .parse::<u8>()
                .map_err(|_| format!("Invalid allowed hours: '{}'", s))
        };
        AllowedHours::new(parse(start)?, parse(end)?)
    }
}

impl TryFrom<String> for AllowedHours {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AllowedHours> for String {
    fn from(value: AllowedHours) -> Self {
        value.to_string()
    }
}

/// What a rule applies to
///
/// `None` fields match anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleScope {
    pub user_id: String,
    pub account_id: Option<String>,
    pub card_id: Option<String>,
    pub tx_type: Option<TransactionType>,
}

impl RuleScope {
    pub fn user(user_id: impl Into<String>) -> Self {
        RuleScope {
            user_id: user_id.into(),
            account_id: None,
            card_id: None,
            tx_type: None,
        }
    }

    pub fn account(mut self, account_id: impl Into<String>) -> Self {
        self.account_id = Some(account_id.into());
        self
    }

    pub fn card(mut self, card_id: impl Into<String>) -> Self {
        self.card_id = Some(card_id.into());
        self
    }

    pub fn tx_type(mut self, tx_type: TransactionType) -> Self {
        self.tx_type = Some(tx_type);
        self
    }

    pub fn matches(
        &self,
        user_id: &str,
        account_id: Option<&str>,
        card_id: Option<&str>,
        tx_type: TransactionType,
    ) -> bool {
        self.user_id == user_id
            && self
                .account_id
                .as_deref()
                .is_none_or(|id| Some(id) == account_id)
            && self.card_id.as_deref().is_none_or(|id| Some(id) == card_id)
            && self.tx_type.is_none_or(|t| t == tx_type)
    }
}

/// The limits a rule imposes
///
/// `None` means unlimited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleLimits {
    pub max_single_amount: Option<Decimal>,
    pub max_daily_amount: Option<Decimal>,
    pub max_monthly_amount: Option<Decimal>,
    pub requires_approval: bool,
    /// Amounts strictly above this need approval
    pub approval_threshold: Option<Decimal>,
    /// Every window must contain the hour; empty means any hour
    #[serde(default)]
    pub allowed_hours: Vec<AllowedHours>,
}

fn min_limit(a: Option<Decimal>, b: Option<Decimal>) -> Option<Decimal> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

impl RuleLimits {
    /// No limits at all
    pub fn unlimited() -> Self {
        RuleLimits {
            max_single_amount: None,
            max_daily_amount: None,
            max_monthly_amount: None,
            requires_approval: false,
            approval_threshold: None,
            allowed_hours: Vec::new(),
        }
    }

    /// Combine two limit sets into the most restrictive one
    ///
    /// Numeric limits take the smaller defined value, approval flags are OR-ed and hour
    /// windows accumulate so the allowed hours are their intersection.
    pub fn merge(self, other: &RuleLimits) -> RuleLimits {
        let mut allowed_hours = self.allowed_hours;
        for window in &other.allowed_hours {
            if !allowed_hours.contains(window) {
                allowed_hours.push(*window);
            }
        }

        RuleLimits {
            max_single_amount: min_limit(self.max_single_amount, other.max_single_amount),
            max_daily_amount: min_limit(self.max_daily_amount, other.max_daily_amount),
            max_monthly_amount: min_limit(self.max_monthly_amount, other.max_monthly_amount),
            requires_approval: self.requires_approval || other.requires_approval,
            approval_threshold: min_limit(self.approval_threshold, other.approval_threshold),
            allowed_hours,
        }
    }

    /// Whether `amount` needs a manual approval under these limits
    pub fn needs_approval(&self, amount: Decimal) -> bool {
        self.requires_approval
            || self
                .approval_threshold
                .is_some_and(|threshold| amount > threshold)
    }
}

impl Default for RuleLimits {
    /// Built-in rule used when nothing else applies
    fn default() -> Self {
        RuleLimits {
            max_single_amount: Some(Decimal::new(1_000, 0)),
            max_daily_amount: Some(Decimal::new(10_000, 0)),
            max_monthly_amount: None,
            requires_approval: false,
            approval_threshold: None,
            allowed_hours: vec![AllowedHours::ALWAYS],
        }
    }
}

impl From<&UserLimits> for RuleLimits {
    fn from(limits: &UserLimits) -> Self {
        RuleLimits {
            max_single_amount: limits.single_transaction_limit,
            max_daily_amount: limits.daily_limit,
            max_monthly_amount: limits.monthly_limit,
            requires_approval: false,
            approval_threshold: limits.approval_threshold,
            allowed_hours: Vec::new(),
        }
    }
}

/// A stored transaction rule
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRule {
    pub id: RuleId,
    pub scope: RuleScope,
    pub limits: RuleLimits,
    pub effective_from: DateTime<Utc>,
    pub effective_until: Option<DateTime<Utc>>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

impl TransactionRule {
    /// A rule effective from `now` with no end date
    pub fn new(scope: RuleScope, limits: RuleLimits, created_by: &str, now: DateTime<Utc>) -> Self {
        TransactionRule {
            id: Uuid::new_v4(),
            scope,
            limits,
            effective_from: now,
            effective_until: None,
            created_by: created_by.to_string(),
            created_at: now,
        }
    }

    /// Whether the validity interval contains `at`
    pub fn is_effective(&self, at: DateTime<Utc>) -> bool {
        self.effective_from <= at && self.effective_until.is_none_or(|until| at < until)
    }
}

/// Partial update of a stored rule
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RulePatch {
    pub limits: Option<RuleLimits>,
    pub effective_from: Option<DateTime<Utc>>,
    pub effective_until: Option<Option<DateTime<Utc>>>,
}

impl RulePatch {
    pub fn apply(self, rule: &mut TransactionRule) {
        if let Some(limits) = self.limits {
            rule.limits = limits;
        }
        if let Some(from) = self.effective_from {
            rule.effective_from = from;
        }
        if let Some(until) = self.effective_until {
            rule.effective_until = until;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rstest::rstest;

    fn hours(s: &str) -> AllowedHours {
        s.parse().unwrap()
    }

    #[rstest]
    #[case::whole_day("0-23", 0, true)]
    #[case::whole_day_last_hour("0-23", 23, true)]
    #[case::office_inside("9-17", 12, true)]
    #[case::office_end_inclusive("9-17", 17, true)]
    #[case::office_before("9-17", 8, false)]
    #[case::overnight_late("22-6", 23, true)]
    #[case::overnight_early("22-6", 3, true)]
    #[case::overnight_midday("22-6", 12, false)]
    fn test_allowed_hours_contains(#[case] window: &str, #[case] hour: u32, #[case] expected: bool) {
        assert_eq!(hours(window).contains(hour), expected);
    }

    #[rstest]
    #[case::missing_dash("9")]
    #[case::out_of_range("9-24")]
    #[case::not_a_number("a-b")]
    fn test_invalid_allowed_hours(#[case] input: &str) {
        assert!(input.parse::<AllowedHours>().is_err());
    }

    #[test]
    fn test_allowed_hours_serde_as_string() {
        let json = serde_json::to_string(&hours("9-17")).unwrap();
        assert_eq!(json, "\"9-17\"");
        let parsed: AllowedHours = serde_json::from_str("\"22-6\"").unwrap();
        assert_eq!(parsed, hours("22-6"));
    }

    #[test]
    fn test_merge_takes_most_restrictive_limits() {
        let a = RuleLimits {
            max_single_amount: Some(Decimal::new(500, 0)),
            max_daily_amount: None,
            allowed_hours: vec![hours("0-23")],
            ..RuleLimits::unlimited()
        };
        let b = RuleLimits {
            max_single_amount: Some(Decimal::new(800, 0)),
            max_daily_amount: Some(Decimal::new(2000, 0)),
            requires_approval: true,
            allowed_hours: vec![hours("9-17")],
            ..RuleLimits::unlimited()
        };

        let merged = a.merge(&b);

        assert_eq!(merged.max_single_amount, Some(Decimal::new(500, 0)));
        assert_eq!(merged.max_daily_amount, Some(Decimal::new(2000, 0)));
        assert!(merged.requires_approval);
        assert_eq!(merged.allowed_hours, vec![hours("0-23"), hours("9-17")]);
    }

    #[test]
    fn test_merge_keeps_every_distinct_window() {
        let a = RuleLimits {
            allowed_hours: vec![hours("8-16")],
            ..RuleLimits::unlimited()
        };
        let b = RuleLimits {
            allowed_hours: vec![hours("10-18"), hours("8-16")],
            ..RuleLimits::unlimited()
        };

        assert_eq!(
            a.merge(&b).allowed_hours,
            vec![hours("8-16"), hours("10-18")]
        );
    }

    #[test]
    fn test_limits_without_hours_deserialize_as_any_hour() {
        let limits: RuleLimits = serde_json::from_str(
            r#"{"max_single_amount": null, "max_daily_amount": null, "max_monthly_amount": null,
                "requires_approval": false, "approval_threshold": null}"#,
        )
        .unwrap();

        assert!(limits.allowed_hours.is_empty());
    }

    #[rstest]
    #[case::below_threshold(Decimal::new(100, 0), false)]
    #[case::at_threshold(Decimal::new(500, 0), false)]
    #[case::above_threshold(Decimal::new(501, 0), true)]
    fn test_needs_approval_threshold(#[case] amount: Decimal, #[case] expected: bool) {
        let limits = RuleLimits {
            approval_threshold: Some(Decimal::new(500, 0)),
            ..RuleLimits::unlimited()
        };
        assert_eq!(limits.needs_approval(amount), expected);
    }

    #[test]
    fn test_scope_matching() {
        let scope = RuleScope::user("u1")
            .account("acc-1")
            .tx_type(TransactionType::WalletWithdrawal);

        assert!(scope.matches("u1", Some("acc-1"), None, TransactionType::WalletWithdrawal));
        assert!(!scope.matches("u1", Some("acc-2"), None, TransactionType::WalletWithdrawal));
        assert!(!scope.matches("u1", Some("acc-1"), None, TransactionType::WalletDeposit));
        assert!(!scope.matches("u2", Some("acc-1"), None, TransactionType::WalletWithdrawal));
        assert!(RuleScope::user("u1").matches("u1", None, Some("card-1"), TransactionType::CreditCharge));
    }

    #[test]
    fn test_rule_validity_interval() {
        let now = Utc::now();
        let mut rule = TransactionRule::new(RuleScope::user("u1"), RuleLimits::default(), "admin", now);
        rule.effective_until = Some(now + Duration::hours(1));

        assert!(rule.is_effective(now));
        assert!(!rule.is_effective(now - Duration::seconds(1)));
        assert!(!rule.is_effective(now + Duration::hours(1)));
    }

    #[test]
    fn test_patch_replaces_only_given_fields() {
        let now = Utc::now();
        let mut rule = TransactionRule::new(RuleScope::user("u1"), RuleLimits::default(), "admin", now);
        let until = now + Duration::days(7);

        RulePatch {
            effective_until: Some(Some(until)),
            ..RulePatch::default()
        }
        .apply(&mut rule);

        assert_eq!(rule.effective_until, Some(until));
        assert_eq!(rule.limits, RuleLimits::default());
    }
}
