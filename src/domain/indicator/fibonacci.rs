//! Fibonacci retracement levels over a trailing lookback window.
//!
//! Levels are measured down from the window's swing high toward the swing
//! low at the standard ratios 23.6 / 38.2 / 50 / 61.8 / 78.6.
//! Warmup: first (lookback-1) bars are invalid.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub const DEFAULT_LOOKBACK: usize = 50;

pub fn calculate_fibonacci(candles: &[Candle], lookback: usize) -> IndicatorSeries {
    let mut values = Vec::with_capacity(candles.len());
    let warmup = lookback.saturating_sub(1);

    for (i, candle) in candles.iter().enumerate() {
        let valid = lookback > 0 && i >= warmup;
        let value = if valid {
            let window = &candles[i + 1 - lookback..=i];
            let swing_high = window.iter().map(|c| c.high).fold(f64::MIN, f64::max);
            let swing_low = window.iter().map(|c| c.low).fold(f64::MAX, f64::min);
            let span = swing_high - swing_low;
            IndicatorValue::Fibonacci {
                swing_high,
                swing_low,
                level_23_6: swing_high - span * 0.236,
                level_38_2: swing_high - span * 0.382,
                level_50_0: swing_high - span * 0.500,
                level_61_8: swing_high - span * 0.618,
                level_78_6: swing_high - span * 0.786,
            }
        } else {
            IndicatorValue::Fibonacci {
                swing_high: 0.0,
                swing_low: 0.0,
                level_23_6: 0.0,
                level_38_2: 0.0,
                level_50_0: 0.0,
                level_61_8: 0.0,
                level_78_6: 0.0,
            }
        };
        values.push(IndicatorPoint {
            timestamp: candle.timestamp,
            valid,
            value,
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Fibonacci { lookback },
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn make_candle(i: i64, high: f64, low: f64) -> Candle {
        Candle {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(i),
            open: (high + low) / 2.0,
            high,
            low,
            close: (high + low) / 2.0,
            volume: 1000.0,
        }
    }

    #[test]
    fn fibonacci_warmup() {
        let candles: Vec<Candle> = (0..5).map(|i| make_candle(i, 110.0, 90.0)).collect();
        let series = calculate_fibonacci(&candles, 4);
        assert!(!series.values[2].valid);
        assert!(series.values[3].valid);
    }

    #[test]
    fn fibonacci_levels_from_swing() {
        let candles = vec![
            make_candle(0, 100.0, 90.0),
            make_candle(1, 120.0, 95.0),
            make_candle(2, 110.0, 80.0),
        ];
        let series = calculate_fibonacci(&candles, 3);

        if let IndicatorValue::Fibonacci {
            swing_high,
            swing_low,
            level_50_0,
            level_61_8,
            ..
        } = series.values[2].value
        {
            assert!((swing_high - 120.0).abs() < 1e-9);
            assert!((swing_low - 80.0).abs() < 1e-9);
            assert!((level_50_0 - 100.0).abs() < 1e-9);
            assert!((level_61_8 - (120.0 - 40.0 * 0.618)).abs() < 1e-9);
        } else {
            panic!("expected Fibonacci value");
        }
    }

    #[test]
    fn fibonacci_levels_ordered() {
        let candles: Vec<Candle> = (0..4)
            .map(|i| make_candle(i, 110.0 + i as f64, 90.0 - i as f64))
            .collect();
        let series = calculate_fibonacci(&candles, 4);

        if let IndicatorValue::Fibonacci {
            level_23_6,
            level_38_2,
            level_50_0,
            level_61_8,
            level_78_6,
            ..
        } = series.values[3].value
        {
            assert!(level_23_6 > level_38_2);
            assert!(level_38_2 > level_50_0);
            assert!(level_50_0 > level_61_8);
            assert!(level_61_8 > level_78_6);
        } else {
            panic!("expected Fibonacci value");
        }
    }
}
