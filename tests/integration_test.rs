//! End-to-end engine tests.
//!
//! Covers the chain market data port → indicators → analyzers → fusion →
//! backtest, plus the engine's stated invariants: equity-curve shape,
//! determinism, PnL conservation, bounded statistics and the conservative
//! intrabar tie-break.

mod common;

use chrono::{Duration, TimeZone, Utc};
use common::*;
use proptest::prelude::*;

use tradekit::domain::backtest::{BacktestHooks, BacktestStatus, run_backtest};
use tradekit::domain::candle::{Candle, CandleSeries, Timeframe};
use tradekit::domain::indicator::rsi::calculate_rsi;
use tradekit::domain::indicator::sma::calculate_sma;
use tradekit::domain::mtf::{Alignment, analyze_multi_timeframe, analyze_timeframe};
use tradekit::domain::pattern::detect_patterns;
use tradekit::domain::position::ExitReason;
use tradekit::domain::scheduler::CancelToken;
use tradekit::domain::signal::Signal;
use tradekit::domain::snapshot::{Trend, compute_snapshots};
use tradekit::domain::strategy::{StopRule, TargetRule};
use tradekit::ports::market_data::MarketDataPort;

mod pipeline {
    use super::*;

    #[test]
    fn port_to_backtest_roundtrip() {
        let port = MockMarketDataPort::new().with_series(series_from_closes("EURUSD", &cross_path()));

        let series = port
            .fetch_candles("EURUSD", Timeframe::H1, None, None)
            .unwrap();
        let result =
            run_backtest(&series, &sample_config(ma_strategy()), BacktestHooks::default()).unwrap();

        assert_eq!(result.status, BacktestStatus::Completed);
        assert!(!result.trades.is_empty());
        assert_eq!(result.equity_curve.len(), series.len());
    }

    #[test]
    fn port_errors_propagate() {
        let port = MockMarketDataPort::new().with_error("EURUSD", "feed offline");
        assert!(port.fetch_candles("EURUSD", Timeframe::H1, None, None).is_err());
    }

    #[test]
    fn equity_starts_at_initial_balance() {
        let series = series_from_closes("EURUSD", &cross_path());
        let result =
            run_backtest(&series, &sample_config(ma_strategy()), BacktestHooks::default()).unwrap();
        assert!((result.equity_curve[0].equity - 10_000.0).abs() < 1e-9);
    }
}

mod invariants {
    use super::*;

    #[test]
    fn determinism_identical_results() {
        let series = series_from_closes("EURUSD", &cross_path());
        let config = sample_config(ma_strategy());

        let a = run_backtest(&series, &config, BacktestHooks::default()).unwrap();
        let b = run_backtest(&series, &config, BacktestHooks::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn conservation_with_costs() {
        let series = series_from_closes("EURUSD", &cross_path());
        let mut config = sample_config(ma_strategy());
        config.commission = 3.0;
        config.spread = 0.2;
        config.slippage = 0.05;

        let result = run_backtest(&series, &config, BacktestHooks::default()).unwrap();
        let pnl_sum: f64 = result.trades.iter().map(|t| t.pnl).sum();
        let expected = config.initial_balance + pnl_sum - result.total_commission;
        assert!((result.final_balance - expected).abs() < 1e-6);
    }

    #[test]
    fn exit_always_after_entry() {
        let series = series_from_closes("EURUSD", &cross_path());
        let result =
            run_backtest(&series, &sample_config(ma_strategy()), BacktestHooks::default()).unwrap();
        for trade in &result.trades {
            assert!(trade.exit_index > trade.entry_index);
        }
    }

    #[test]
    fn statistics_bounded() {
        let series = series_from_closes("EURUSD", &cross_path());
        let result =
            run_backtest(&series, &sample_config(ma_strategy()), BacktestHooks::default()).unwrap();

        assert!((0.0..=100.0).contains(&result.metrics.win_rate));
        assert!((0.0..=100.0).contains(&result.metrics.max_drawdown_pct));
    }

    #[test]
    fn pattern_confidences_bounded() {
        let closes: Vec<f64> = (0..80)
            .map(|i| 100.0 + ((i % 17) as f64 - 8.0) * 1.5)
            .collect();
        let series = series_from_closes("EURUSD", &closes);
        for pattern in detect_patterns(&series) {
            assert!((0.0..=100.0).contains(&pattern.confidence));
        }
    }

    #[test]
    fn rsi_warmup_undefined_over_short_series() {
        let closes: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let series = series_from_closes("EURUSD", &closes);
        let rsi = calculate_rsi(series.candles(), 14);

        assert_eq!(rsi.values.len(), 10);
        assert!(rsi.values.iter().all(|p| !p.valid));
    }

    #[test]
    fn indicator_idempotence() {
        let closes: Vec<f64> = (0..60)
            .map(|i| 100.0 + ((i * 13) % 7) as f64)
            .collect();
        let series = series_from_closes("EURUSD", &closes);

        assert_eq!(
            calculate_sma(series.candles(), 20),
            calculate_sma(series.candles(), 20)
        );
        assert_eq!(compute_snapshots(&series), compute_snapshots(&series));
    }
}

mod scenarios {
    use super::*;

    /// Scenario: a flat series moves nothing — no trend, no trades, no
    /// drawdown.
    #[test]
    fn flat_series_stays_flat() {
        let series = series_from_closes("EURUSD", &vec![100.0; 30]);

        let analysis = analyze_timeframe(&series);
        assert_eq!(analysis.trend, Trend::Sideways);

        let result =
            run_backtest(&series, &sample_config(ma_strategy()), BacktestHooks::default()).unwrap();
        assert!(result.trades.is_empty());
        assert!((result.metrics.max_drawdown_pct - 0.0).abs() < 1e-9);
        assert!((result.final_balance - result.initial_balance).abs() < 1e-9);
    }

    /// Scenario: max_open_positions = 1 means the ledger never contains
    /// overlapping holding ranges.
    #[test]
    fn single_position_never_overlaps() {
        let series = series_from_closes("EURUSD", &cross_path());
        let result =
            run_backtest(&series, &sample_config(ma_strategy()), BacktestHooks::default()).unwrap();

        for (i, a) in result.trades.iter().enumerate() {
            for b in result.trades.iter().skip(i + 1) {
                let overlap = a.entry_index < b.exit_index && b.entry_index < a.exit_index;
                assert!(!overlap, "overlapping trades in ledger");
            }
        }
    }

    /// Scenario: a strictly rising series across all three timeframes.
    #[test]
    fn rising_series_fully_aligned_bullish() {
        fn rising(timeframe: Timeframe) -> CandleSeries {
            let candles: Vec<Candle> = (0..300)
                .map(|i| {
                    let close = 1.10 + i as f64 * 0.0005;
                    Candle {
                        timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                            + Duration::minutes(i * timeframe.minutes()),
                        open: close - 0.0002,
                        high: close + 0.0005,
                        low: close - 0.0005,
                        close,
                        volume: 1000.0,
                    }
                })
                .collect();
            CandleSeries::new("EURUSD", timeframe, candles).unwrap()
        }

        let result = analyze_multi_timeframe(
            &rising(Timeframe::M15),
            &rising(Timeframe::H1),
            &rising(Timeframe::H4),
        );

        assert_eq!(result.alignment, Alignment::Full);
        assert_eq!(result.overall_trend, Trend::Bullish);
        assert_eq!(result.overall_signal, Signal::Buy);
        assert!(result.confidence > 70.0);
    }

    /// Scenario: stop and target both inside one bar's range — the stop
    /// wins, the conservative assumption.
    #[test]
    fn double_breach_closes_at_stop() {
        let mut closes = vec![100.0; 15];
        closes.extend((1..=10).map(|i| 100.0 + i as f64 * 2.0));
        let last = closes.len() - 1;

        let candles: Vec<Candle> = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| {
                let mut candle = make_candle(i as i64, close);
                if i == last {
                    candle.high = close + 60.0;
                    candle.low = close - 60.0;
                }
                candle
            })
            .collect();
        let series = CandleSeries::new("EURUSD", Timeframe::H1, candles).unwrap();

        let mut config = sample_config(ma_strategy());
        config.strategy.stop_loss = StopRule::Percent(2.0);
        config.strategy.take_profit = TargetRule::Percent(50.0);

        let result = run_backtest(&series, &config, BacktestHooks::default()).unwrap();
        let trade = result
            .trades
            .iter()
            .find(|t| t.exit_index == last)
            .expect("a trade should close on the wide bar");

        assert_eq!(trade.reason, ExitReason::StopLoss);
        assert!((trade.exit_price - trade.entry_price * 0.98).abs() < 1e-9);
    }

    #[test]
    fn cancellation_is_a_distinct_terminal_state() {
        let series = series_from_closes("EURUSD", &cross_path());
        let cancel = CancelToken::new();
        cancel.cancel();

        let hooks = BacktestHooks {
            progress: None,
            cancel: Some(&cancel),
        };
        let result = run_backtest(&series, &sample_config(ma_strategy()), hooks).unwrap();
        assert_eq!(result.status, BacktestStatus::Cancelled);
    }
}

mod properties {
    use super::*;

    fn closes_from_steps(steps: &[f64]) -> Vec<f64> {
        let mut closes = Vec::with_capacity(steps.len() + 1);
        let mut price = 100.0;
        closes.push(price);
        for step in steps {
            price = (price * (1.0 + step)).max(1.0);
            closes.push(price);
        }
        closes
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn backtest_deterministic(steps in prop::collection::vec(-0.01f64..0.01, 30..100)) {
            let closes = closes_from_steps(&steps);
            let series = series_from_closes("EURUSD", &closes);
            let config = sample_config(ma_strategy());

            let a = run_backtest(&series, &config, BacktestHooks::default()).unwrap();
            let b = run_backtest(&series, &config, BacktestHooks::default()).unwrap();
            prop_assert_eq!(a, b);
        }

        #[test]
        fn balance_always_conserved(
            steps in prop::collection::vec(-0.01f64..0.01, 30..100),
            commission in 0.0f64..5.0,
        ) {
            let closes = closes_from_steps(&steps);
            let series = series_from_closes("EURUSD", &closes);
            let mut config = sample_config(ma_strategy());
            config.commission = commission;

            let result = run_backtest(&series, &config, BacktestHooks::default()).unwrap();
            let pnl_sum: f64 = result.trades.iter().map(|t| t.pnl).sum();
            let expected = config.initial_balance + pnl_sum - result.total_commission;
            prop_assert!((result.final_balance - expected).abs() < 1e-6);
        }

        #[test]
        fn equity_curve_always_full_length(steps in prop::collection::vec(-0.01f64..0.01, 30..100)) {
            let closes = closes_from_steps(&steps);
            let series = series_from_closes("EURUSD", &closes);
            let result =
                run_backtest(&series, &sample_config(ma_strategy()), BacktestHooks::default())
                    .unwrap();
            prop_assert_eq!(result.equity_curve.len(), series.len());
        }
    }
}
