//! Simple Moving Average.
//!
//! Warmup: first (n-1) bars are invalid.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub fn calculate_sma(candles: &[Candle], period: usize) -> IndicatorSeries {
    if period == 0 {
        let values = candles
            .iter()
            .map(|c| IndicatorPoint {
                timestamp: c.timestamp,
                valid: false,
                value: IndicatorValue::Simple(0.0),
            })
            .collect();
        return IndicatorSeries {
            indicator_type: IndicatorType::Sma(period),
            values,
        };
    }

    let mut values = Vec::with_capacity(candles.len());
    let mut rolling_sum = 0.0;

    for (i, candle) in candles.iter().enumerate() {
        rolling_sum += candle.close;
        if i >= period {
            rolling_sum -= candles[i - period].close;
        }

        if i + 1 >= period {
            values.push(IndicatorPoint {
                timestamp: candle.timestamp,
                valid: true,
                value: IndicatorValue::Simple(rolling_sum / period as f64),
            });
        } else {
            values.push(IndicatorPoint {
                timestamp: candle.timestamp,
                valid: false,
                value: IndicatorValue::Simple(0.0),
            });
        }
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Sma(period),
        values,
    }
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
    fn sma_warmup() {
        let candles = make_candles(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        let series = calculate_sma(&candles, 3);

        assert_eq!(series.values.len(), 5);
        assert!(!series.values[0].valid);
        assert!(!series.values[1].valid);
        assert!(series.values[2].valid);
    }

    #[test]
    fn sma_values() {
        let candles = make_candles(&[10.0, 20.0, 30.0, 40.0, 50.0]);
        let series = calculate_sma(&candles, 3);

        assert_eq!(series.simple_at(2), Some(20.0));
        assert_eq!(series.simple_at(3), Some(30.0));
        assert_eq!(series.simple_at(4), Some(40.0));
    }

    #[test]
    fn sma_period_1_tracks_close() {
        let candles = make_candles(&[10.0, 20.0, 30.0]);
        let series = calculate_sma(&candles, 1);
        assert_eq!(series.simple_at(0), Some(10.0));
        assert_eq!(series.simple_at(2), Some(30.0));
    }

    #[test]
    fn sma_zero_period_all_invalid() {
        let candles = make_candles(&[10.0, 20.0]);
        let series = calculate_sma(&candles, 0);
        assert!(series.values.iter().all(|p| !p.valid));
    }

    #[test]
    fn sma_empty_input() {
        let series = calculate_sma(&[], 3);
        assert!(series.values.is_empty());
    }
}
