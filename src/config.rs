//! Engine configuration

use chrono::Duration;

use crate::types::RuleLimits;

/// Currency used by the convenience operations
pub const DEFAULT_CURRENCY: &str = "USD";

/// How long after creation a completed transaction may be reversed
pub const DEFAULT_REVERSAL_WINDOW_HOURS: i64 = 24;

/// Settings of a [`crate::TransactionOrchestrator`]
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Currency applied by the convenience wrappers
    pub default_currency: String,

    /// Limits used when no stored rule applies
    pub default_rule: RuleLimits,

    pub reversal_window: Duration,

    /// Send a notification after each completed transaction
    pub notifications_enabled: bool,
}

impl EngineConfig {
    pub fn with_currency(mut self, currency: impl Into<String>) -> Self {
        self.default_currency = currency.into();
        self
    }

    pub fn with_reversal_window_hours(mut self, hours: i64) -> Self {
        self.reversal_window = Duration::hours(hours);
        self
    }

    pub fn with_default_rule(mut self, rule: RuleLimits) -> Self {
        self.default_rule = rule;
        self
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            default_currency: DEFAULT_CURRENCY.to_string(),
            default_rule: RuleLimits::default(),
            reversal_window: Duration::hours(DEFAULT_REVERSAL_WINDOW_HOURS),
            notifications_enabled: true,
        }
    }
}
