//! Per-bar indicator snapshots.
//!
//! One `IndicatorSnapshot` per input candle, with `Option` fields left
//! `None` during each indicator's warm-up. Assembled from the pure
//! calculators, so recomputing over the same slice always yields the same
//! snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::candle::CandleSeries;
use crate::domain::indicator::atr::calculate_atr;
use crate::domain::indicator::bollinger::{calculate_bollinger, percent_b};
use crate::domain::indicator::macd::calculate_macd_default;
use crate::domain::indicator::rsi::calculate_rsi;
use crate::domain::indicator::sma::calculate_sma;
use crate::domain::indicator::stochastic::calculate_stochastic_default;
use crate::domain::indicator::{IndicatorValue, atr, bollinger};

/// One pip for a 4-decimal quoted pair.
pub const PIP: f64 = 0.0001;

/// ATR bucket thresholds, in pips.
pub const LOW_VOLATILITY_PIPS: f64 = 30.0;
pub const HIGH_VOLATILITY_PIPS: f64 = 80.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Bullish,
    Bearish,
    Sideways,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VolatilityBucket {
    Low,
    Medium,
    High,
}

impl VolatilityBucket {
    pub fn from_atr(atr: f64) -> VolatilityBucket {
        let pips = atr / PIP;
        if pips < LOW_VOLATILITY_PIPS {
            VolatilityBucket::Low
        } else if pips <= HIGH_VOLATILITY_PIPS {
            VolatilityBucket::Medium
        } else {
            VolatilityBucket::High
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MacdCrossover {
    Bullish,
    Bearish,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdReading {
    pub line: f64,
    pub signal: f64,
    pub histogram: f64,
    pub crossover: MacdCrossover,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerReading {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
    pub percent_b: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StochasticReading {
    pub k: f64,
    pub d: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AtrReading {
    pub value: f64,
    pub bucket: VolatilityBucket,
}

/// The three reference moving averages. Trend is only classified once all
/// three are out of warm-up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MovingAverages {
    pub sma20: Option<f64>,
    pub sma50: Option<f64>,
    pub sma200: Option<f64>,
    pub trend: Trend,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub close: f64,
    pub rsi: Option<f64>,
    pub macd: Option<MacdReading>,
    pub bollinger: Option<BollingerReading>,
    pub stochastic: Option<StochasticReading>,
    pub atr: Option<AtrReading>,
    pub moving_averages: MovingAverages,
}

/// Classify trend from stacked moving averages.
pub fn classify_trend(sma20: f64, sma50: f64, sma200: f64) -> Trend {
    if sma20 > sma50 && sma50 > sma200 {
        Trend::Bullish
    } else if sma20 < sma50 && sma50 < sma200 {
        Trend::Bearish
    } else {
        Trend::Sideways
    }
}

pub fn compute_snapshots(series: &CandleSeries) -> Vec<IndicatorSnapshot> {
    let candles = series.candles();

    let rsi = calculate_rsi(candles, 14);
    let macd = calculate_macd_default(candles);
    let boll = calculate_bollinger(candles, bollinger::DEFAULT_PERIOD, bollinger::DEFAULT_MULT_X100);
    let stoch = calculate_stochastic_default(candles);
    let atr_series = calculate_atr(candles, atr::DEFAULT_PERIOD);
    let sma20 = calculate_sma(candles, 20);
    let sma50 = calculate_sma(candles, 50);
    let sma200 = calculate_sma(candles, 200);

    candles
        .iter()
        .enumerate()
        .map(|(i, candle)| {
            let macd_reading = macd.point_at(i).and_then(|point| match point.value {
                IndicatorValue::Macd {
                    line,
                    signal,
                    histogram,
                } => {
                    let crossover = match macd.point_at(i.wrapping_sub(1)) {
                        Some(prev) if i > 0 => match prev.value {
                            IndicatorValue::Macd {
                                line: prev_line,
                                signal: prev_signal,
                                ..
                            } => {
                                let prev_diff = prev_line - prev_signal;
                                let diff = line - signal;
                                if prev_diff <= 0.0 && diff > 0.0 {
                                    MacdCrossover::Bullish
                                } else if prev_diff >= 0.0 && diff < 0.0 {
                                    MacdCrossover::Bearish
                                } else {
                                    MacdCrossover::None
                                }
                            }
                            _ => MacdCrossover::None,
                        },
                        _ => MacdCrossover::None,
                    };
                    Some(MacdReading {
                        line,
                        signal,
                        histogram,
                        crossover,
                    })
                }
                _ => None,
            });

            let bollinger_reading = boll.point_at(i).and_then(|point| match point.value {
                IndicatorValue::Bollinger {
                    upper,
                    middle,
                    lower,
                } => Some(BollingerReading {
                    upper,
                    middle,
                    lower,
                    percent_b: percent_b(candle.close, upper, lower),
                }),
                _ => None,
            });

            let stochastic_reading = stoch.point_at(i).and_then(|point| match point.value {
                IndicatorValue::Stochastic { k, d } => Some(StochasticReading { k, d }),
                _ => None,
            });

            let atr_reading = atr_series.simple_at(i).map(|value| AtrReading {
                value,
                bucket: VolatilityBucket::from_atr(value),
            });

            let ma20 = sma20.simple_at(i);
            let ma50 = sma50.simple_at(i);
            let ma200 = sma200.simple_at(i);
            let trend = match (ma20, ma50, ma200) {
                (Some(a), Some(b), Some(c)) => classify_trend(a, b, c),
                _ => Trend::Sideways,
            };

            IndicatorSnapshot {
                index: i,
                timestamp: candle.timestamp,
                close: candle.close,
                rsi: rsi.simple_at(i),
                macd: macd_reading,
                bollinger: bollinger_reading,
                stochastic: stochastic_reading,
                atr: atr_reading,
                moving_averages: MovingAverages {
                    sma20: ma20,
                    sma50: ma50,
                    sma200: ma200,
                    trend,
                },
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::candle::{Candle, Timeframe};
    use chrono::{Duration, TimeZone, Utc};

    fn make_series(closes: &[f64]) -> CandleSeries {
        let candles: Vec<Candle> = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                    + Duration::hours(i as i64),
                open: close,
                high: close + 0.001,
                low: close - 0.001,
                close,
                volume: 1000.0,
            })
            .collect();
        CandleSeries::new("EURUSD", Timeframe::H1, candles).unwrap()
    }

    #[test]
    fn snapshots_align_with_candles() {
        let closes: Vec<f64> = (0..250).map(|i| 1.10 + (i % 7) as f64 * 0.001).collect();
        let series = make_series(&closes);
        let snapshots = compute_snapshots(&series);
        assert_eq!(snapshots.len(), series.len());
        for (i, snap) in snapshots.iter().enumerate() {
            assert_eq!(snap.index, i);
        }
    }

    #[test]
    fn warmup_fields_are_none() {
        let closes: Vec<f64> = (0..10).map(|i| 1.10 + i as f64 * 0.001).collect();
        let snapshots = compute_snapshots(&make_series(&closes));

        // period-14 RSI over 10 candles: no bar ever becomes valid
        assert!(snapshots.iter().all(|s| s.rsi.is_none()));
        assert!(snapshots.iter().all(|s| s.macd.is_none()));
        assert!(snapshots[5].bollinger.is_none());
    }

    #[test]
    fn fields_fill_in_after_warmup() {
        let closes: Vec<f64> = (0..250).map(|i| 1.10 + (i % 9) as f64 * 0.001).collect();
        let snapshots = compute_snapshots(&make_series(&closes));

        let last = snapshots.last().unwrap();
        assert!(last.rsi.is_some());
        assert!(last.macd.is_some());
        assert!(last.bollinger.is_some());
        assert!(last.stochastic.is_some());
        assert!(last.atr.is_some());
        assert!(last.moving_averages.sma200.is_some());
    }

    #[test]
    fn trend_bullish_when_mas_stacked() {
        let closes: Vec<f64> = (0..250).map(|i| 1.10 + i as f64 * 0.001).collect();
        let snapshots = compute_snapshots(&make_series(&closes));
        assert_eq!(snapshots.last().unwrap().moving_averages.trend, Trend::Bullish);
    }

    #[test]
    fn trend_sideways_on_flat_series() {
        let closes = vec![1.10; 250];
        let snapshots = compute_snapshots(&make_series(&closes));
        assert_eq!(
            snapshots.last().unwrap().moving_averages.trend,
            Trend::Sideways
        );
    }

    #[test]
    fn volatility_buckets() {
        assert_eq!(VolatilityBucket::from_atr(0.0010), VolatilityBucket::Low);
        assert_eq!(VolatilityBucket::from_atr(0.0050), VolatilityBucket::Medium);
        assert_eq!(VolatilityBucket::from_atr(0.0120), VolatilityBucket::High);
    }

    #[test]
    fn snapshots_idempotent() {
        let closes: Vec<f64> = (0..80).map(|i| 1.10 + ((i * 17) % 11) as f64 * 0.0005).collect();
        let series = make_series(&closes);
        assert_eq!(compute_snapshots(&series), compute_snapshots(&series));
    }

    #[test]
    fn classify_trend_variants() {
        assert_eq!(classify_trend(3.0, 2.0, 1.0), Trend::Bullish);
        assert_eq!(classify_trend(1.0, 2.0, 3.0), Trend::Bearish);
        assert_eq!(classify_trend(2.0, 2.0, 2.0), Trend::Sideways);
        assert_eq!(classify_trend(3.0, 1.0, 2.0), Trend::Sideways);
    }
}
