use crate::config::{EngineConfig, DEFAULT_CURRENCY, DEFAULT_REVERSAL_WINDOW_HOURS};
use crate::strategy::BatchConfig;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

/// Replay transaction requests through the transaction engine
#[derive(Parser, Debug)]
#[command(name = "transaction-engine")]
#[command(about = "Replay transaction requests through the transaction engine", long_about = None)]
pub struct CliArgs {
    /// Requests CSV file
    #[arg(value_name = "REQUESTS", help = "Path to the requests CSV file")]
    pub requests_file: PathBuf,

    /// Accounts CSV used to seed the in-memory ledger
    #[arg(
        long = "accounts",
        value_name = "FILE",
        required_unless_present = "ledger_url",
        help = "Accounts CSV seeding the in-memory ledger (required without --ledger-url)"
    )]
    pub accounts_file: Option<PathBuf>,

    /// Where to write the final ledger state
    #[arg(
        long = "balances",
        value_name = "FILE",
        help = "Write final balances of the in-memory ledger to this CSV file"
    )]
    pub balances_file: Option<PathBuf>,

    /// Processing strategy
    #[arg(
        long = "strategy",
        value_name = "STRATEGY",
        default_value = "async",
        help = "Processing strategy: 'sync' for synchronous or 'async' for asynchronous"
    )]
    pub strategy: StrategyType,

    /// Number of requests per batch (async mode only)
    #[arg(
        long = "batch-size",
        value_name = "SIZE",
        help = "Number of requests per batch (default: 1000)"
    )]
    pub batch_size: Option<usize>,

    /// Maximum number of users replayed concurrently (async mode only)
    #[arg(
        long = "max-concurrent",
        value_name = "COUNT",
        help = "Maximum number of users replayed concurrently (default: CPU cores)"
    )]
    pub max_concurrent_batches: Option<usize>,

    /// Base URL of the account ledger service
    #[arg(long = "ledger-url", value_name = "URL", env = "TXN_LEDGER_URL")]
    pub ledger_url: Option<String>,

    /// Base URL of the user directory service
    #[arg(long = "users-url", value_name = "URL", env = "TXN_USERS_URL")]
    pub users_url: Option<String>,

    /// Base URL of the notification service
    #[arg(long = "notify-url", value_name = "URL", env = "TXN_NOTIFY_URL")]
    pub notify_url: Option<String>,

    /// Currency for requests that leave it empty
    #[arg(
        long = "currency",
        value_name = "CODE",
        env = "TXN_DEFAULT_CURRENCY",
        default_value = DEFAULT_CURRENCY
    )]
    pub currency: String,

    /// How long a completed transaction stays reversible
    #[arg(
        long = "reversal-window-hours",
        value_name = "HOURS",
        env = "TXN_REVERSAL_WINDOW_HOURS",
        default_value_t = DEFAULT_REVERSAL_WINDOW_HOURS
    )]
    pub reversal_window_hours: i64,
}

/// Available processing strategies
#[derive(Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum StrategyType {
    Sync,
    Async,
}

impl CliArgs {
    /// Create a BatchConfig from CLI arguments, falling back to defaults
    pub fn to_batch_config(&self) -> BatchConfig {
        if self.batch_size.is_some() || self.max_concurrent_batches.is_some() {
            let default = BatchConfig::default();
            BatchConfig::new(
                self.batch_size.unwrap_or(default.batch_size),
                self.max_concurrent_batches
                    .unwrap_or(default.max_concurrent_batches),
            )
        } else {
            BatchConfig::default()
        }
    }

    /// Engine settings from CLI arguments and environment
    ///
    /// Notifications are only enabled when a notification service is configured.
    pub fn to_engine_config(&self) -> EngineConfig {
        let mut config = EngineConfig::default()
            .with_currency(self.currency.trim().to_uppercase())
            .with_reversal_window_hours(self.reversal_window_hours);
        config.notifications_enabled = self.notify_url.is_some();
        config
    }
}
