//! Stochastic oscillator.
//!
//! %K = (close - lowest_low(k)) / (highest_high(k) - lowest_low(k)) × 100
//! %D = SMA(d) of %K
//!
//! Default parameters: k=14, d=3.
//! Warmup: (k-1) + (d-1) bars.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub const DEFAULT_K: usize = 14;
pub const DEFAULT_D: usize = 3;

pub fn calculate_stochastic(candles: &[Candle], k_period: usize, d_period: usize) -> IndicatorSeries {
    let indicator_type = IndicatorType::Stochastic { k_period, d_period };

    if k_period == 0 || d_period == 0 {
        let values = candles
            .iter()
            .map(|c| IndicatorPoint {
                timestamp: c.timestamp,
                valid: false,
                value: IndicatorValue::Stochastic { k: 0.0, d: 0.0 },
            })
            .collect();
        return IndicatorSeries {
            indicator_type,
            values,
        };
    }

    let mut k_values = vec![0.0; candles.len()];
    for i in (k_period - 1)..candles.len() {
        let window = &candles[i + 1 - k_period..=i];
        let highest = window.iter().map(|c| c.high).fold(f64::MIN, f64::max);
        let lowest = window.iter().map(|c| c.low).fold(f64::MAX, f64::min);
        let range = highest - lowest;
        // flat window: park %K mid-scale instead of dividing by zero
        k_values[i] = if range <= f64::EPSILON {
            50.0
        } else {
            (candles[i].close - lowest) / range * 100.0
        };
    }

    let warmup = k_period - 1 + d_period - 1;
    let values = candles
        .iter()
        .enumerate()
        .map(|(i, candle)| {
            let valid = i >= warmup;
            let (k, d) = if valid {
                let d_window = &k_values[i + 1 - d_period..=i];
                (
                    k_values[i],
                    d_window.iter().sum::<f64>() / d_period as f64,
                )
            } else {
                (0.0, 0.0)
            };
            IndicatorPoint {
                timestamp: candle.timestamp,
                valid,
                value: IndicatorValue::Stochastic { k, d },
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type,
        values,
    }
}

pub fn calculate_stochastic_default(candles: &[Candle]) -> IndicatorSeries {
    calculate_stochastic(candles, DEFAULT_K, DEFAULT_D)
}
