//! Rolling population standard deviation of closes.
//!
//! Divides by N (population), matching the Bollinger Band convention.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub fn calculate_stddev(candles: &[Candle], period: usize) -> IndicatorSeries {
    let mut values = Vec::with_capacity(candles.len());

    for (i, candle) in candles.iter().enumerate() {
        let valid = period > 0 && i + 1 >= period;
        let value = if valid {
            let window = &candles[i + 1 - period..=i];
            IndicatorValue::Simple(population_stddev(window.iter().map(|c| c.close)))
        } else {
            IndicatorValue::Simple(0.0)
        };
        values.push(IndicatorPoint {
            timestamp: candle.timestamp,
            valid,
            value,
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Stddev(period),
        values,
    }
}

/// Population standard deviation of an iterator of values.
pub fn population_stddev(values: impl Iterator<Item = f64> + Clone) -> f64 {
    let n = values.clone().count();
    if n == 0 {
        return 0.0;
    }
    let mean = values.clone().sum::<f64>() / n as f64;
    let variance = values.map(|v| (v - mean) * (v - mean)).sum::<f64>() / n as f64;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn make_candles(closes: &[f64]) -> Vec<Candle> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                    + Duration::hours(i as i64),
                open: close,
                high: close,
                low: close,
                close,
                volume: 1000.0,
            })
            .collect()
    }

    #[test]
    fn stddev_constant_is_zero() {
        let series = calculate_stddev(&make_candles(&[5.0; 6]), 3);
        assert!(series.simple_at(5).unwrap().abs() < f64::EPSILON);
    }

    #[test]
    fn stddev_known_window() {
        // window [2, 4, 6]: mean 4, variance 8/3
        let series = calculate_stddev(&make_candles(&[2.0, 4.0, 6.0]), 3);
        let expected = (8.0f64 / 3.0).sqrt();
        assert!((series.simple_at(2).unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn stddev_warmup() {
        let series = calculate_stddev(&make_candles(&[1.0, 2.0, 3.0, 4.0]), 3);
        assert!(!series.values[0].valid);
        assert!(!series.values[1].valid);
        assert!(series.values[2].valid);
    }

    #[test]
    fn population_stddev_empty() {
        assert_eq!(population_stddev(std::iter::empty()), 0.0);
    }
}
