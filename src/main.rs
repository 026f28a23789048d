//! Transaction Engine CLI
//!
//! Replays a CSV of transaction requests through the engine and writes one result
//! row per request to stdout.
//!
//! # Usage
//!
//! ```bash
//! cargo run -- --accounts accounts.csv requests.csv > results.csv
//! cargo run -- --accounts accounts.csv --balances balances.csv --strategy sync requests.csv
//! TXN_LEDGER_URL=http://ledger:8080 cargo run -- requests.csv > results.csv
//! ```
//!
//! Without `--ledger-url` the ledger is in memory, seeded from `--accounts`, and the
//! owners of the seeded accounts are the known users. Logs go to stderr; set
//! `RUST_LOG` to change the level (default `info`).
//!
//! # Exit Codes
//!
//! - 0: Success (individual requests may still have failed, see the results)
//! - 1: Error (missing arguments, unreadable files, invalid service URLs, etc.)

use std::fs::File;
use std::process;
use std::sync::Arc;

use tracing_subscriber::prelude::*;
use transaction_engine::adapters::{
    HttpAccountLedger, HttpNotificationDispatcher, HttpUserDirectory, InMemoryLedger,
    InMemoryUserDirectory,
};
use transaction_engine::cli::{self, CliArgs, StrategyType};
use transaction_engine::core::{AccountLedger, UserDirectory};
use transaction_engine::io::{read_accounts, write_balances_csv};
use transaction_engine::{strategy, Collaborators, Replayer, TransactionOrchestrator};

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = cli::parse_args();

    if let Err(e) = run(&args) {
        tracing::error!(error = %e, "replay aborted");
        process::exit(1);
    }
}

fn run(args: &CliArgs) -> Result<(), String> {
    let accounts = match &args.accounts_file {
        Some(path) => read_accounts(path)?,
        None => Vec::new(),
    };

    let (ledger, memory_ledger): (Arc<dyn AccountLedger>, Option<Arc<InMemoryLedger>>) =
        match &args.ledger_url {
            Some(url) => {
                let ledger = HttpAccountLedger::new(url)
                    .map_err(|e| format!("Invalid ledger URL '{}': {}", url, e))?;
                (Arc::new(ledger), None)
            }
            None => {
                let ledger = Arc::new(InMemoryLedger::with_accounts(accounts.iter().cloned()));
                (ledger.clone(), Some(ledger))
            }
        };

    let users: Arc<dyn UserDirectory> = match args.users_url.as_ref().or(args.ledger_url.as_ref()) {
        Some(url) => Arc::new(
            HttpUserDirectory::new(url)
                .map_err(|e| format!("Invalid user directory URL '{}': {}", url, e))?,
        ),
        None => Arc::new(InMemoryUserDirectory::with_users(
            accounts.iter().map(|account| account.owner.clone()),
        )),
    };

    let mut collaborators = Collaborators::in_memory(ledger, users);
    if let Some(url) = &args.notify_url {
        let notifier = HttpNotificationDispatcher::new(url)
            .map_err(|e| format!("Invalid notification URL '{}': {}", url, e))?;
        collaborators = collaborators.with_notifier(Arc::new(notifier));
    }

    let orchestrator = TransactionOrchestrator::new(args.to_engine_config(), collaborators);
    let replayer = Arc::new(Replayer::new(Arc::new(orchestrator)));

    let strategy = {
        let config = if args.strategy == StrategyType::Async {
            Some(args.to_batch_config())
        } else {
            None
        };
        strategy::create_strategy(args.strategy.clone(), config)
    };

    let mut output = std::io::stdout();
    strategy.process(&replayer, &args.requests_file, &mut output)?;

    if let Some(path) = &args.balances_file {
        match &memory_ledger {
            Some(ledger) => {
                let mut file = File::create(path)
                    .map_err(|e| format!("Failed to create '{}': {}", path.display(), e))?;
                write_balances_csv(&ledger.accounts(), &mut file)?;
            }
            None => tracing::warn!("--balances is ignored with a remote ledger"),
        }
    }

    Ok(())
}
