//! CLI definition and dispatch.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::text_report_adapter::TextReportAdapter;
use crate::domain::backtest::{BacktestConfig, BacktestHooks, run_backtest};
use crate::domain::cache::{CacheKey, IndicatorCache};
use crate::domain::candle::{CandleSeries, Timeframe};
use crate::domain::error::TradekitError;
use crate::domain::indicator::atr::calculate_atr;
use crate::domain::indicator::fibonacci::{self, calculate_fibonacci};
use crate::domain::indicator::pivot::calculate_pivot;
use crate::domain::indicator::rsi::calculate_rsi;
use crate::domain::indicator::sma::calculate_sma;
use crate::domain::indicator::{IndicatorType, IndicatorValue};
use crate::domain::mtf::analyze_multi_timeframe;
use crate::domain::pattern::detect_patterns;
use crate::domain::predict::{Horizon, predict_price};
use crate::domain::scheduler::SystemClock;
use crate::domain::strategy::{BacktestStrategy, StopRule, StrategyKind, TargetRule};
use crate::ports::config_port::ConfigPort;
use crate::ports::market_data::MarketDataPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "tradekit", about = "Trading strategy evaluation engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        pair: Option<String>,
    },
    /// Analyze current market state for a pair
    Analyze {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        pair: Option<String>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

/// Backtests over fewer bars than this cannot warm up a single indicator.
pub const MIN_BACKTEST_CANDLES: usize = 30;

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            output,
            pair,
        } => run_backtest_cmd(&config, output.as_ref(), pair.as_deref()),
        Command::Analyze { config, pair } => run_analyze(&config, pair.as_deref()),
        Command::Validate { config } => run_validate(&config),
    }
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        let err = TradekitError::ConfigParse {
            file: path.display().to_string(),
            reason: e.to_string(),
        };
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn run_backtest_cmd(
    config_path: &PathBuf,
    output_path: Option<&PathBuf>,
    pair_override: Option<&str>,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let strategy = match build_strategy(&adapter) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    eprintln!("Strategy: {}", strategy.name);

    let bt_config = match build_backtest_config(&adapter, strategy) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    let series = match fetch_series(&adapter, pair_override) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    if series.len() < MIN_BACKTEST_CANDLES {
        let err = TradekitError::InsufficientData {
            pair: series.pair().to_string(),
            have: series.len(),
            need: MIN_BACKTEST_CANDLES,
        };
        eprintln!("error: {err}");
        return (&err).into();
    }
    eprintln!(
        "Loaded {} candles for {} {}",
        series.len(),
        series.pair(),
        series.timeframe()
    );

    let mut last_reported = 0u32;
    let mut progress = |p: crate::domain::backtest::Progress| {
        let decile = (p.percent / 10.0) as u32;
        if decile > last_reported {
            last_reported = decile;
            eprintln!("  {:>3.0}% ({}/{} bars)", p.percent, p.processed, p.total);
        }
    };
    let hooks = BacktestHooks {
        progress: Some(&mut progress),
        cancel: None,
    };

    let result = match run_backtest(&series, &bt_config, hooks) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    print!(
        "{}",
        TextReportAdapter::render(&result, &bt_config.strategy)
    );

    if let Some(path) = output_path {
        let path_str = path.display().to_string();
        if let Err(e) = TextReportAdapter.write(&result, &bt_config.strategy, &path_str) {
            eprintln!("error: {e}");
            return (&e).into();
        }
        eprintln!("Report written to {}", path_str);
    }

    ExitCode::SUCCESS
}

fn run_analyze(config_path: &PathBuf, pair_override: Option<&str>) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let series = match fetch_series(&adapter, pair_override) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };

    println!("{} {} — {} candles", series.pair(), series.timeframe(), series.len());

    // caller-owned cache: repeated lookups within this run hit it
    let mut cache = IndicatorCache::new(chrono::Duration::minutes(5), Arc::new(SystemClock));
    print_indicator_summary(&series, &mut cache);

    let patterns = detect_patterns(&series);
    if patterns.is_empty() {
        println!("\nPatterns: none");
    } else {
        println!("\nPatterns:");
        for p in patterns.iter().take(5) {
            println!(
                "  {:?} [{}..{}] {} (confidence {:.0})",
                p.pattern_type, p.start_index, p.end_index, p.signal, p.confidence
            );
        }
    }

    match series.timeframe().analysis_pair() {
        Some((medium_tf, long_tf)) => {
            let medium = series.resample(medium_tf);
            let long = series.resample(long_tf);
            match (medium, long) {
                (Ok(medium), Ok(long)) => {
                    let mtf = analyze_multi_timeframe(&series, &medium, &long);
                    println!(
                        "\nMulti-timeframe: {:?} / {} (alignment {:?}, confidence {:.0})",
                        mtf.overall_trend, mtf.overall_signal, mtf.alignment, mtf.confidence
                    );
                }
                _ => println!("\nMulti-timeframe: unavailable"),
            }
        }
        None => println!("\nMulti-timeframe: no higher timeframes for {}", series.timeframe()),
    }

    for horizon in [Horizon::H1, Horizon::H4, Horizon::D1] {
        let prediction = predict_price(&series, horizon);
        if prediction.insufficient_data {
            println!(
                "Prediction {:?}: insufficient data (confidence {:.0})",
                horizon, prediction.confidence
            );
        } else {
            println!(
                "Prediction {:?}: {:?} to {:.5} ({:+.2}%, confidence {:.0})",
                horizon,
                prediction.direction,
                prediction.predicted_price,
                prediction.price_change_percent,
                prediction.confidence
            );
        }
    }

    ExitCode::SUCCESS
}

fn print_indicator_summary(series: &CandleSeries, cache: &mut IndicatorCache) {
    let fingerprint = series.fingerprint();
    let candles = series.candles();
    let last = series.len().saturating_sub(1);

    let rsi = cache.get_or_compute(
        CacheKey {
            fingerprint,
            indicator: IndicatorType::Rsi(14),
        },
        || calculate_rsi(candles, 14),
    );
    let atr = cache.get_or_compute(
        CacheKey {
            fingerprint,
            indicator: IndicatorType::Atr(14),
        },
        || calculate_atr(candles, 14),
    );
    let sma200 = cache.get_or_compute(
        CacheKey {
            fingerprint,
            indicator: IndicatorType::Sma(200),
        },
        || calculate_sma(candles, 200),
    );

    let pivots = cache.get_or_compute(
        CacheKey {
            fingerprint,
            indicator: IndicatorType::Pivot,
        },
        || calculate_pivot(candles),
    );
    let fib = cache.get_or_compute(
        CacheKey {
            fingerprint,
            indicator: IndicatorType::Fibonacci {
                lookback: fibonacci::DEFAULT_LOOKBACK,
            },
        },
        || calculate_fibonacci(candles, fibonacci::DEFAULT_LOOKBACK),
    );

    let fmt = |value: Option<f64>| match value {
        Some(v) => format!("{:.5}", v),
        None => "warming up".to_string(),
    };
    println!("RSI(14):  {}", fmt(rsi.simple_at(last)));
    println!("ATR(14):  {}", fmt(atr.simple_at(last)));
    println!("SMA(200): {}", fmt(sma200.simple_at(last)));

    if let Some(point) = pivots.point_at(last) {
        if let IndicatorValue::Pivot { pivot, r1, s1, .. } = point.value {
            println!("Pivot:    {:.5} (R1 {:.5} / S1 {:.5})", pivot, r1, s1);
        }
    }
    if let Some(point) = fib.point_at(last) {
        if let IndicatorValue::Fibonacci {
            level_38_2,
            level_61_8,
            ..
        } = point.value
        {
            println!("Fib 38.2: {:.5}  Fib 61.8: {:.5}", level_38_2, level_61_8);
        }
    }
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let strategy = match build_strategy(&adapter) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {e}");
            return (&e).into();
        }
    };
    if let Err(e) = build_backtest_config(&adapter, strategy) {
        eprintln!("error: {e}");
        return (&e).into();
    }

    println!("Configuration OK");
    ExitCode::SUCCESS
}

fn fetch_series(
    config: &dyn ConfigPort,
    pair_override: Option<&str>,
) -> Result<CandleSeries, TradekitError> {
    let base_path = config
        .get_string("data", "base_path")
        .ok_or_else(|| TradekitError::ConfigMissing {
            section: "data".into(),
            key: "base_path".into(),
        })?;
    let pair = match pair_override {
        Some(p) => p.to_string(),
        None => config
            .get_string("data", "pair")
            .ok_or_else(|| TradekitError::ConfigMissing {
                section: "data".into(),
                key: "pair".into(),
            })?,
    };
    let timeframe_str =
        config
            .get_string("data", "timeframe")
            .ok_or_else(|| TradekitError::ConfigMissing {
                section: "data".into(),
                key: "timeframe".into(),
            })?;
    let timeframe =
        Timeframe::parse(&timeframe_str).ok_or_else(|| TradekitError::ConfigInvalid {
            section: "data".into(),
            key: "timeframe".into(),
            reason: format!("unknown timeframe {:?}", timeframe_str),
        })?;

    let adapter = CsvAdapter::new(PathBuf::from(base_path));
    adapter.fetch_candles(&pair, timeframe, None, None)
}

pub fn build_backtest_config(
    config: &dyn ConfigPort,
    strategy: BacktestStrategy,
) -> Result<BacktestConfig, TradekitError> {
    let bt_config = BacktestConfig {
        strategy,
        start: parse_optional_time(config, "backtest", "start")?,
        end: parse_optional_time(config, "backtest", "end")?,
        initial_balance: config.get_double("backtest", "initial_balance", 10_000.0),
        leverage: config.get_double("backtest", "leverage", 1.0),
        commission: config.get_double("backtest", "commission", 0.0),
        spread: config.get_double("backtest", "spread", 0.0),
        slippage: config.get_double("backtest", "slippage", 0.0),
    };
    bt_config.validate()?;
    Ok(bt_config)
}

fn parse_optional_time(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<Option<DateTime<Utc>>, TradekitError> {
    let Some(raw) = config.get_string(section, key) else {
        return Ok(None);
    };
    if let Ok(dt) = NaiveDateTime::parse_from_str(&raw, "%Y-%m-%d %H:%M:%S") {
        return Ok(Some(dt.and_utc()));
    }
    if let Ok(date) = NaiveDate::parse_from_str(&raw, "%Y-%m-%d") {
        if let Some(dt) = date.and_hms_opt(0, 0, 0) {
            return Ok(Some(dt.and_utc()));
        }
    }
    Err(TradekitError::ConfigInvalid {
        section: section.into(),
        key: key.into(),
        reason: format!("invalid {} format, expected YYYY-MM-DD [HH:MM:SS]", key),
    })
}

pub fn build_strategy(config: &dyn ConfigPort) -> Result<BacktestStrategy, TradekitError> {
    let name = config
        .get_string("strategy", "name")
        .unwrap_or_else(|| "unnamed".to_string());
    let kind_str =
        config
            .get_string("strategy", "kind")
            .ok_or_else(|| TradekitError::ConfigMissing {
                section: "strategy".into(),
                key: "kind".into(),
            })?;

    let kind = match kind_str.as_str() {
        "ma_crossover" => StrategyKind::MaCrossover {
            fast: config.get_int("strategy", "fast", 10) as usize,
            slow: config.get_int("strategy", "slow", 50) as usize,
        },
        "rsi_reversion" => StrategyKind::RsiReversion {
            period: config.get_int("strategy", "period", 14) as usize,
            oversold: config.get_double("strategy", "oversold", 30.0),
            overbought: config.get_double("strategy", "overbought", 70.0),
        },
        "macd_momentum" => StrategyKind::MacdMomentum,
        "composite" => StrategyKind::Composite {
            min_confidence: config.get_double("strategy", "min_confidence", 65.0),
        },
        other => {
            return Err(TradekitError::ConfigInvalid {
                section: "strategy".into(),
                key: "kind".into(),
                reason: format!("unknown strategy kind {:?}", other),
            });
        }
    };

    let stop_loss = parse_level_rule(config, "stop_loss")?;
    let take_profit = match parse_level_rule(config, "take_profit")? {
        StopRule::None => TargetRule::None,
        StopRule::Percent(p) => TargetRule::Percent(p),
        StopRule::AtrMultiple(m) => TargetRule::AtrMultiple(m),
    };

    let strategy = BacktestStrategy {
        name,
        kind,
        stop_loss,
        take_profit,
        risk_per_trade: config.get_double("strategy", "risk_per_trade", 0.02),
        max_open_positions: config.get_int("strategy", "max_open_positions", 1) as usize,
    };
    strategy.validate()?;
    Ok(strategy)
}

fn parse_level_rule(config: &dyn ConfigPort, prefix: &str) -> Result<StopRule, TradekitError> {
    let kind_key = format!("{}_type", prefix);
    let value_key = format!("{}_value", prefix);
    match config.get_string("strategy", &kind_key).as_deref() {
        None | Some("none") => Ok(StopRule::None),
        Some("percent") => Ok(StopRule::Percent(config.get_double(
            "strategy",
            &value_key,
            0.0,
        ))),
        Some("atr") => Ok(StopRule::AtrMultiple(config.get_double(
            "strategy",
            &value_key,
            0.0,
        ))),
        Some(other) => Err(TradekitError::ConfigInvalid {
            section: "strategy".into(),
            key: kind_key,
            reason: format!("unknown {} type {:?}", prefix, other),
        }),
    }
}
