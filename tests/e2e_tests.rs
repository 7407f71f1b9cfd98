//! End-to-end integration tests
//!
//! These tests validate the complete replay pipeline using predefined CSV
//! test fixtures. Each test:
//! 1. Reads input.csv from a fixture directory
//! 2. Replays all operations through the ledger
//! 3. Writes the balances CSV
//! 4. Compares actual output with expected.csv
//!
//! Test fixtures are located in tests/fixtures/ and cover:
//! - Happy path scenarios
//! - Rejected operations (insufficient funds, missing accounts, invalid input)
//! - Malformed rows
//! - Decimal precision
//! - Chains of transfers across several accounts
//!
//! Each test is run twice: once with the sequential strategy and once with the
//! concurrent strategy.

#[cfg(test)]
mod tests {
    use rstest::rstest;
    use std::fs;
    use std::path::Path;
    use std::sync::Arc;
    use wallet_ledger::cli::StrategyType;
    use wallet_ledger::core::Ledger;
    use wallet_ledger::store::MemoryStore;
    use wallet_ledger::strategy::{create_strategy, BatchConfig};
    use wallet_ledger::write_accounts_csv;

    /// Run a test fixture by replaying input.csv and comparing with expected.csv
    ///
    /// # Arguments
    ///
    /// * `fixture_name` - Name of the fixture directory (e.g., "happy_path")
    /// * `strategy_type` - Replay strategy to use
    ///
    /// # Panics
    ///
    /// Panics if:
    /// - Input or expected files cannot be read
    /// - Output doesn't match expected
    async fn run_test_fixture(fixture_name: &str, strategy_type: StrategyType) {
        let fixture_dir = format!("tests/fixtures/{}", fixture_name);
        let input_path = format!("{}/input.csv", fixture_dir);
        let expected_path = format!("{}/expected.csv", fixture_dir);

        assert!(
            Path::new(&input_path).exists(),
            "Input file not found: {}",
            input_path
        );

        // Small batches so fixtures span several of them
        let strategy = create_strategy::<MemoryStore>(strategy_type, BatchConfig::new(3, 4));
        let ledger = Ledger::new(Arc::new(MemoryStore::new()));

        strategy
            .replay(&ledger, Path::new(&input_path))
            .await
            .unwrap_or_else(|e| panic!("Failed to replay operations: {}", e));

        let mut output = Vec::new();
        let accounts = ledger.list_accounts().await.unwrap();
        write_accounts_csv(&accounts, &mut output).unwrap();
        let actual_output = String::from_utf8(output).unwrap();

        let expected_output = fs::read_to_string(&expected_path)
            .unwrap_or_else(|e| panic!("Failed to read expected file {}: {}", expected_path, e));

        assert_eq!(
            actual_output, expected_output,
            "\n\nOutput mismatch for fixture: {} (strategy: {:?})\n\nActual output:\n{}\n\nExpected output:\n{}\n",
            fixture_name, strategy_type, actual_output, expected_output
        );
    }

    /// End-to-end test for all fixtures with both replay strategies
    #[rstest]
    #[case("happy_path")]
    #[case("insufficient_funds")]
    #[case("invalid_references")]
    #[case("malformed_data")]
    #[case("precision_testing")]
    #[case("multiple_accounts")]
    #[case("description_limits")]
    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_fixtures(
        #[case] fixture: &str,
        #[values(StrategyType::Sequential, StrategyType::Concurrent)] strategy: StrategyType,
    ) {
        run_test_fixture(fixture, strategy).await;
    }
}
