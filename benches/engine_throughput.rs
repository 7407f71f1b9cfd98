//! Benchmark suite for ledger throughput
//!
//! Compares the sequential and concurrent replay strategies and measures raw
//! engine transfers under contention, using the divan benchmarking framework.
//!
//! # Running Benchmarks
//!
//! ```bash
//! # Run all benchmarks
//! cargo bench
//! ```
//!
//! Input files are generated per run: a fixed set of accounts, then a
//! deterministic mix of deposits, withdrawals and transfers across them.

use rust_decimal::Decimal;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::runtime::Runtime;
use wallet_ledger::cli::StrategyType;
use wallet_ledger::core::Ledger;
use wallet_ledger::store::MemoryStore;
use wallet_ledger::strategy::{create_strategy, BatchConfig};

const ACCOUNTS: usize = 64;

fn main() {
    divan::main();
}

fn runtime() -> Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Failed to build runtime")
}

/// Write an operation CSV with `operations` rows after the account openings
fn operations_csv(operations: usize) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("Failed to create temp file");
    writeln!(file, "type,account,counterparty,amount,description").unwrap();

    for account in 0..ACCOUNTS {
        writeln!(file, "open,,,,holder-{account}").unwrap();
        writeln!(file, "deposit,{},,1000.00,seed", account + 1).unwrap();
    }
    for i in 0..operations {
        let account = i % ACCOUNTS + 1;
        let counterparty = (i * 7 + 3) % ACCOUNTS + 1;
        match i % 3 {
            0 => writeln!(file, "deposit,{account},,12.50,bench").unwrap(),
            1 => writeln!(file, "withdrawal,{account},,7.25,bench").unwrap(),
            _ => writeln!(file, "transfer,{account},{counterparty},3.10,bench").unwrap(),
        }
    }

    file.flush().expect("Failed to flush temp file");
    file
}

async fn replay(strategy_type: StrategyType, path: &Path) {
    let strategy = create_strategy::<MemoryStore>(strategy_type, BatchConfig::default());
    let ledger = Ledger::new(Arc::new(MemoryStore::new()));
    strategy
        .replay(&ledger, path)
        .await
        .expect("Replay failed");
}

/// Sequential replay of generated operation files
#[divan::bench(args = [1_000, 10_000])]
fn sequential_replay(bencher: divan::Bencher, operations: usize) {
    let input = operations_csv(operations);
    let runtime = runtime();

    bencher.bench_local(|| runtime.block_on(replay(StrategyType::Sequential, input.path())));
}

/// Concurrent replay of generated operation files
#[divan::bench(args = [1_000, 10_000])]
fn concurrent_replay(bencher: divan::Bencher, operations: usize) {
    let input = operations_csv(operations);
    let runtime = runtime();

    bencher.bench_local(|| runtime.block_on(replay(StrategyType::Concurrent, input.path())));
}

/// Concurrent transfers that all contend for the same two balance rows
#[divan::bench(args = [100, 1_000])]
fn contended_transfers(bencher: divan::Bencher, transfers: usize) {
    let runtime = runtime();

    bencher.bench_local(|| {
        runtime.block_on(async {
            let ledger = Ledger::new(Arc::new(MemoryStore::new()));
            let a = ledger.create_account("a").await.unwrap().id;
            let b = ledger.create_account("b").await.unwrap().id;
            ledger.deposit(a, Decimal::from(1_000_000), "seed").await.unwrap();
            ledger.deposit(b, Decimal::from(1_000_000), "seed").await.unwrap();

            let tasks: Vec<_> = (0..transfers)
                .map(|i| {
                    let ledger = ledger.clone();
                    let (from, to) = if i % 2 == 0 { (a, b) } else { (b, a) };
                    tokio::spawn(async move { ledger.transfer(from, to, Decimal::ONE, "bench").await })
                })
                .collect();
            for task in tasks {
                task.await.unwrap().unwrap();
            }
        })
    });
}
