#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::HashMap;

use tradekit::domain::backtest::BacktestConfig;
use tradekit::domain::candle::{Candle, CandleSeries, Timeframe};
use tradekit::domain::error::TradekitError;
use tradekit::domain::strategy::{BacktestStrategy, StopRule, StrategyKind, TargetRule};
use tradekit::ports::market_data::MarketDataPort;

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

pub fn make_candle(hour: i64, close: f64) -> Candle {
    Candle {
        timestamp: base_time() + Duration::hours(hour),
        open: close,
        high: close + 0.5,
        low: close - 0.5,
        close,
        volume: 1000.0,
    }
}

pub fn series_from_closes(pair: &str, closes: &[f64]) -> CandleSeries {
    let candles = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| make_candle(i as i64, close))
        .collect();
    CandleSeries::new(pair, Timeframe::H1, candles).unwrap()
}

/// Flat run followed by a ramp up and a ramp back down: produces one
/// crossover in each direction for MA presets.
pub fn cross_path() -> Vec<f64> {
    let mut closes = vec![100.0; 15];
    closes.extend((1..=10).map(|i| 100.0 + i as f64 * 2.0));
    closes.extend((1..=15).map(|i| 120.0 - i as f64 * 2.0));
    closes
}

pub fn ma_strategy() -> BacktestStrategy {
    BacktestStrategy {
        name: "ma_crossover".into(),
        kind: StrategyKind::MaCrossover { fast: 3, slow: 10 },
        stop_loss: StopRule::None,
        take_profit: TargetRule::None,
        risk_per_trade: 0.1,
        max_open_positions: 1,
    }
}

pub fn sample_config(strategy: BacktestStrategy) -> BacktestConfig {
    BacktestConfig {
        strategy,
        start: None,
        end: None,
        initial_balance: 10_000.0,
        leverage: 30.0,
        commission: 0.0,
        spread: 0.0,
        slippage: 0.0,
    }
}

pub struct MockMarketDataPort {
    pub data: HashMap<String, CandleSeries>,
    pub errors: HashMap<String, String>,
}

impl MockMarketDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_series(mut self, series: CandleSeries) -> Self {
        self.data.insert(series.pair().to_string(), series);
        self
    }

    pub fn with_error(mut self, pair: &str, reason: &str) -> Self {
        self.errors.insert(pair.to_string(), reason.to_string());
        self
    }
}

impl MarketDataPort for MockMarketDataPort {
    fn fetch_candles(
        &self,
        pair: &str,
        _timeframe: Timeframe,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<CandleSeries, TradekitError> {
        if let Some(reason) = self.errors.get(pair) {
            return Err(TradekitError::Data {
                reason: reason.clone(),
            });
        }
        match self.data.get(pair) {
            Some(series) => Ok(series.window(start, end)),
            None => Err(TradekitError::Data {
                reason: format!("no data for {}", pair),
            }),
        }
    }

    fn list_pairs(&self) -> Result<Vec<String>, TradekitError> {
        let mut pairs: Vec<String> = self.data.keys().cloned().collect();
        pairs.sort();
        Ok(pairs)
    }

    fn data_range(
        &self,
        pair: &str,
        _timeframe: Timeframe,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, TradekitError> {
        match self.data.get(pair) {
            Some(series) if !series.is_empty() => {
                let candles = series.candles();
                Ok(Some((
                    candles[0].timestamp,
                    candles[candles.len() - 1].timestamp,
                    candles.len(),
                )))
            }
            _ => Ok(None),
        }
    }
}
