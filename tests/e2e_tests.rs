//! End-to-end integration tests
//!
//! These tests validate the complete replay pipeline using predefined CSV fixtures.
//! Each test:
//! 1. Seeds an in-memory ledger from accounts.csv
//! 2. Replays requests.csv through the engine
//! 3. Compares the request, status and error columns of the results with
//!    expected_results.csv
//! 4. Compares the final ledger state with expected_balances.csv
//!
//! Messages and transaction ids are left out of the comparison: ids are random and
//! messages are for humans.
//!
//! Each test is run twice: once with the synchronous strategy and once with the
//! async one.

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;
    use transaction_engine::adapters::{InMemoryLedger, InMemoryUserDirectory};
    use transaction_engine::cli::StrategyType;
    use transaction_engine::io::{read_accounts, write_balances_csv};
    use transaction_engine::strategy::{create_strategy, BatchConfig};
    use transaction_engine::{Collaborators, EngineConfig, Replayer, TransactionOrchestrator};

    /// Keep the first three columns of every row, trimmed
    fn project(csv_text: &str) -> Vec<Vec<String>> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(csv_text.as_bytes());
        reader
            .records()
            .map(|record| {
                let record = record.expect("Invalid CSV in results");
                record
                    .iter()
                    .take(3)
                    .map(|field| field.trim().to_string())
                    .collect()
            })
            .collect()
    }

    /// Run a fixture and compare results and balances with the expected files
    ///
    /// # Arguments
    ///
    /// * `fixture_name` - Name of the fixture directory under tests/fixtures
    /// * `strategy_type` - Processing strategy to use (Sync or Async)
    /// * `config` - Batch configuration for the async strategy
    ///
    /// # Panics
    ///
    /// Panics if a fixture file is missing or the output doesn't match.
    fn run_test_fixture(fixture_name: &str, strategy_type: StrategyType, config: Option<BatchConfig>) {
        let fixture_dir = format!("tests/fixtures/{}", fixture_name);
        let path = |file: &str| format!("{}/{}", fixture_dir, file);
        for file in ["accounts.csv", "requests.csv", "expected_results.csv", "expected_balances.csv"] {
            assert!(Path::new(&path(file)).exists(), "Fixture file not found: {}", path(file));
        }

        let accounts = read_accounts(Path::new(&path("accounts.csv")))
            .unwrap_or_else(|e| panic!("Failed to read accounts: {}", e));
        let ledger = Arc::new(InMemoryLedger::with_accounts(accounts.iter().cloned()));
        let users = Arc::new(InMemoryUserDirectory::with_users(
            accounts.iter().map(|account| account.owner.clone()),
        ));
        let orchestrator = TransactionOrchestrator::new(
            EngineConfig::default(),
            Collaborators::in_memory(ledger.clone(), users),
        );
        let replayer = Arc::new(Replayer::new(Arc::new(orchestrator)));

        let strategy = create_strategy(strategy_type.clone(), config);
        let mut results = Vec::new();
        strategy
            .process(&replayer, Path::new(&path("requests.csv")), &mut results)
            .unwrap_or_else(|e| panic!("Failed to process requests: {}", e));
        let results = String::from_utf8(results).expect("Results are not UTF-8");

        let expected_results = fs::read_to_string(path("expected_results.csv"))
            .unwrap_or_else(|e| panic!("Failed to read expected results: {}", e));
        assert_eq!(
            project(&results),
            project(&expected_results),
            "\n\nResult mismatch for fixture: {} (strategy: {:?})\n\nActual output:\n{}\n",
            fixture_name,
            strategy_type,
            results
        );

        let mut balances = Vec::new();
        write_balances_csv(&ledger.accounts(), &mut balances)
            .unwrap_or_else(|e| panic!("Failed to write balances: {}", e));
        let balances = String::from_utf8(balances).expect("Balances are not UTF-8");
        let expected_balances = fs::read_to_string(path("expected_balances.csv"))
            .unwrap_or_else(|e| panic!("Failed to read expected balances: {}", e));
        assert_eq!(
            balances.trim(),
            expected_balances.trim(),
            "\n\nBalance mismatch for fixture: {} (strategy: {:?})\n",
            fixture_name,
            strategy_type
        );
    }

    /// End-to-end test for all fixtures with both processing strategies
    #[rstest]
    #[case("happy_path")]
    #[case("failures")]
    #[case("lifecycle")]
    fn test_fixtures(
        #[case] fixture: &str,
        #[values(StrategyType::Sync, StrategyType::Async)] strategy: StrategyType,
    ) {
        run_test_fixture(fixture, strategy, None);
    }

    /// Small batches keep per-user order across batch boundaries
    #[rstest]
    #[case::one_per_batch(1, 2)]
    #[case::two_per_batch(2, 4)]
    fn test_fixtures_with_small_batches(#[case] batch_size: usize, #[case] max_concurrent: usize) {
        run_test_fixture(
            "lifecycle",
            StrategyType::Async,
            Some(BatchConfig::new(batch_size, max_concurrent)),
        );
    }
}
