//! Technical indicator types and calculators.
//!
//! Every calculator is a pure function of its candle slice: same input,
//! same output, no hidden state. Output series are aligned index-for-index
//! with the input; warm-up bars are marked `valid: false` so callers can
//! tell "not yet computable" from "computed as zero".

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod fibonacci;
pub mod macd;
pub mod pivot;
pub mod rsi;
pub mod sma;
pub mod stddev;
pub mod stochastic;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorPoint {
    pub timestamp: DateTime<Utc>,
    pub valid: bool,
    pub value: IndicatorValue,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IndicatorValue {
    Simple(f64),
    Macd {
        line: f64,
        signal: f64,
        histogram: f64,
    },
    Stochastic {
        k: f64,
        d: f64,
    },
    Bollinger {
        upper: f64,
        middle: f64,
        lower: f64,
    },
    Pivot {
        pivot: f64,
        r1: f64,
        r2: f64,
        r3: f64,
        s1: f64,
        s2: f64,
        s3: f64,
    },
    Fibonacci {
        swing_high: f64,
        swing_low: f64,
        level_23_6: f64,
        level_38_2: f64,
        level_50_0: f64,
        level_61_8: f64,
        level_78_6: f64,
    },
}

/// Indicator identity + parameters; serves as the cache key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IndicatorType {
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Atr(usize),
    Stddev(usize),
    Macd {
        fast: usize,
        slow: usize,
        signal: usize,
    },
    Stochastic {
        k_period: usize,
        d_period: usize,
    },
    Bollinger {
        period: usize,
        stddev_mult_x100: u32,
    },
    Pivot,
    Fibonacci {
        lookback: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSeries {
    pub indicator_type: IndicatorType,
    pub values: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// The simple value at `index`, if valid. `None` during warm-up.
    pub fn simple_at(&self, index: usize) -> Option<f64> {
        let point = self.values.get(index)?;
        if !point.valid {
            return None;
        }
        match point.value {
            IndicatorValue::Simple(v) => Some(v),
            _ => None,
        }
    }

    pub fn point_at(&self, index: usize) -> Option<&IndicatorPoint> {
        self.values.get(index).filter(|p| p.valid)
    }
}

impl fmt::Display for IndicatorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndicatorType::Sma(period) => write!(f, "SMA({})", period),
            IndicatorType::Ema(period) => write!(f, "EMA({})", period),
            IndicatorType::Rsi(period) => write!(f, "RSI({})", period),
            IndicatorType::Atr(period) => write!(f, "ATR({})", period),
            IndicatorType::Stddev(period) => write!(f, "STDDEV({})", period),
            IndicatorType::Macd { fast, slow, signal } => {
                write!(f, "MACD({},{},{})", fast, slow, signal)
            }
            IndicatorType::Stochastic { k_period, d_period } => {
                write!(f, "STOCHASTIC({},{})", k_period, d_period)
            }
            IndicatorType::Bollinger {
                period,
                stddev_mult_x100,
            } => {
                let mult = *stddev_mult_x100 as f64 / 100.0;
                write!(f, "BOLLINGER({},{})", period, mult)
            }
            IndicatorType::Pivot => write!(f, "PIVOT"),
            IndicatorType::Fibonacci { lookback } => write!(f, "FIBONACCI({})", lookback),
        }
    }
}
