//! Exponential Moving Average.
//!
//! k = 2/(n+1), seeded with the first SMA, then EMA[i] = C[i]*k + EMA[i-1]*(1-k).
//! Warmup: first (n-1) bars are invalid.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub fn calculate_ema(candles: &[Candle], period: usize) -> IndicatorSeries {
    if period == 0 || candles.is_empty() {
        let values = candles
            .iter()
            .map(|c| IndicatorPoint {
                timestamp: c.timestamp,
                valid: false,
                value: IndicatorValue::Simple(0.0),
            })
            .collect();
        return IndicatorSeries {
            indicator_type: IndicatorType::Ema(period),
            values,
        };
    }

    let mut values = Vec::with_capacity(candles.len());
    let k = 2.0 / (period as f64 + 1.0);
    let mut ema = 0.0;
    let mut sum = 0.0;

    for (i, candle) in candles.iter().enumerate() {
        if i < period - 1 {
            sum += candle.close;
            values.push(IndicatorPoint {
                timestamp: candle.timestamp,
                valid: false,
                value: IndicatorValue::Simple(0.0),
            });
        } else if i == period - 1 {
            sum += candle.close;
            ema = sum / period as f64;
            values.push(IndicatorPoint {
                timestamp: candle.timestamp,
                valid: true,
                value: IndicatorValue::Simple(ema),
            });
        } else {
            ema = candle.close * k + ema * (1.0 - k);
            values.push(IndicatorPoint {
                timestamp: candle.timestamp,
                valid: true,
                value: IndicatorValue::Simple(ema),
            });
        }
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Ema(period),
        values,
    }
}
