//! CLI orchestration tests with real files on disk.

mod common;

use common::*;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use tradekit::cli::{self, Cli, Command, build_backtest_config, build_strategy};
use tradekit::adapters::file_config_adapter::FileConfigAdapter;
use tradekit::domain::strategy::StrategyKind;

/// Write a CSV data file plus an INI config pointing at it.
fn setup_workspace() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let data_dir = dir.path().join("data");
    fs::create_dir(&data_dir).unwrap();

    let mut csv = String::from("timestamp,open,high,low,close,volume\n");
    for (i, close) in cross_path().iter().enumerate() {
        let candle = make_candle(i as i64, *close);
        csv.push_str(&format!(
            "{},{},{},{},{},{}\n",
            candle.timestamp.format("%Y-%m-%d %H:%M:%S"),
            candle.open,
            candle.high,
            candle.low,
            candle.close,
            candle.volume
        ));
    }
    fs::write(data_dir.join("EURUSD_H1.csv"), csv).unwrap();

    let config = format!(
        r#"
[data]
base_path = {}
pair = EURUSD
timeframe = H1

[backtest]
initial_balance = 10000.0
leverage = 30
commission = 1.0

[strategy]
name = trend
kind = ma_crossover
fast = 3
slow = 10
risk_per_trade = 0.1
max_open_positions = 1
"#,
        data_dir.display()
    );
    let config_path = dir.path().join("backtest.ini");
    fs::write(&config_path, config).unwrap();

    (dir, config_path)
}

#[test]
fn full_backtest_writes_report() {
    let (dir, config_path) = setup_workspace();
    let report_path = dir.path().join("report.txt");

    let _ = cli::run(Cli {
        command: Command::Backtest {
            config: config_path,
            output: Some(report_path.clone()),
            pair: None,
        },
    });

    let report = fs::read_to_string(&report_path).expect("report file expected");
    assert!(report.contains("Backtest report: trend"));
    assert!(report.contains("Trades:"));
    assert!(report.contains("Max drawdown:"));
}

#[test]
fn validate_accepts_good_config() {
    let (_dir, config_path) = setup_workspace();

    let adapter = FileConfigAdapter::from_file(&config_path).unwrap();
    let strategy = build_strategy(&adapter).unwrap();
    assert!(matches!(
        strategy.kind,
        StrategyKind::MaCrossover { fast: 3, slow: 10 }
    ));
    assert!(build_backtest_config(&adapter, strategy).is_ok());
}

#[test]
fn backtest_with_missing_config_fails() {
    let (dir, _config_path) = setup_workspace();

    // the run must fail cleanly, without creating a report
    let report_path = dir.path().join("never.txt");
    let _ = cli::run(Cli {
        command: Command::Backtest {
            config: dir.path().join("nope.ini"),
            output: Some(report_path.clone()),
            pair: None,
        },
    });
    assert!(!report_path.exists());
}

#[test]
fn backtest_with_unknown_pair_fails() {
    let (dir, config_path) = setup_workspace();

    let report_path = dir.path().join("never.txt");
    let _ = cli::run(Cli {
        command: Command::Backtest {
            config: config_path,
            output: Some(report_path.clone()),
            pair: Some("XAUUSD".into()),
        },
    });
    assert!(!report_path.exists());
}

#[test]
fn invalid_strategy_config_rejected_before_data_access() {
    let (dir, config_path) = setup_workspace();

    let broken = fs::read_to_string(&config_path)
        .unwrap()
        .replace("risk_per_trade = 0.1", "risk_per_trade = -1");
    let broken_path = dir.path().join("broken.ini");
    fs::write(&broken_path, broken).unwrap();

    let adapter = FileConfigAdapter::from_file(&broken_path).unwrap();
    assert!(build_strategy(&adapter).is_err());
}

#[test]
fn analyze_runs_on_valid_workspace() {
    let (_dir, config_path) = setup_workspace();

    let _ = cli::run(Cli {
        command: Command::Analyze {
            config: config_path,
            pair: None,
        },
    });
}
