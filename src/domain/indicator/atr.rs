//! Average True Range.
//!
//! Seeded with the simple mean of the first n true ranges, then Wilder
//! smoothing: atr = (prev_atr * (n-1) + tr) / n.
//! The first bar's true range is high - low (no previous close).
//! Warmup: first (n-1) bars are invalid.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub const DEFAULT_PERIOD: usize = 14;

pub fn calculate_atr(candles: &[Candle], period: usize) -> IndicatorSeries {
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
            indicator_type: IndicatorType::Atr(period),
            values,
        };
    }

    let tr_values: Vec<f64> = candles
        .iter()
        .enumerate()
        .map(|(i, candle)| {
            if i == 0 {
                candle.high - candle.low
            } else {
                candle.true_range(candles[i - 1].close)
            }
        })
        .collect();

    let mut values = Vec::with_capacity(candles.len());
    let mut atr = 0.0;

    for (i, candle) in candles.iter().enumerate() {
        if i < period - 1 {
            values.push(IndicatorPoint {
                timestamp: candle.timestamp,
                valid: false,
                value: IndicatorValue::Simple(0.0),
            });
            continue;
        }

        if i == period - 1 {
            atr = tr_values[..period].iter().sum::<f64>() / period as f64;
        } else {
            atr = (atr * (period - 1) as f64 + tr_values[i]) / period as f64;
        }
        values.push(IndicatorPoint {
            timestamp: candle.timestamp,
            valid: true,
            value: IndicatorValue::Simple(atr),
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Atr(period),
        values,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn make_candle(i: i64, high: f64, low: f64, close: f64) -> Candle {
        Candle {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::hours(i),
            open: close,
            high,
            low,
            close,
            volume: 1000.0,
        }
    }

    #[test]
    fn atr_warmup_and_length() {
        let candles: Vec<Candle> = (0..5).map(|i| make_candle(i, 110.0, 90.0, 100.0)).collect();
        let series = calculate_atr(&candles, 3);

        assert_eq!(series.values.len(), 5);
        assert!(!series.values[0].valid);
        assert!(!series.values[1].valid);
        assert!(series.values[2].valid);
    }

    #[test]
    fn atr_seed_is_mean_of_true_ranges() {
        let candles = vec![
            make_candle(0, 110.0, 100.0, 105.0),
            make_candle(1, 115.0, 105.0, 110.0),
            make_candle(2, 120.0, 110.0, 115.0),
        ];
        let series = calculate_atr(&candles, 3);
        let expected = (10.0 + 10.0 + 10.0) / 3.0;
        assert!((series.simple_at(2).unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn atr_wilder_smoothing() {
        let candles = vec![
            make_candle(0, 110.0, 100.0, 105.0),
            make_candle(1, 115.0, 105.0, 110.0),
            make_candle(2, 120.0, 110.0, 115.0),
            make_candle(3, 125.0, 115.0, 120.0),
        ];
        let series = calculate_atr(&candles, 3);
        // seed 10, then (10*2 + 10) / 3 = 10
        assert!((series.simple_at(3).unwrap() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn atr_short_series_all_invalid() {
        let candles: Vec<Candle> = (0..2).map(|i| make_candle(i, 110.0, 90.0, 100.0)).collect();
        let series = calculate_atr(&candles, 5);
        assert_eq!(series.values.len(), 2);
        assert!(series.values.iter().all(|p| !p.valid));
    }

    #[test]
    fn atr_gap_dominates_true_range() {
        let candles = vec![
            make_candle(0, 110.0, 100.0, 105.0),
            make_candle(1, 130.0, 120.0, 125.0), // gap up: TR = 130-105 = 25
        ];
        let series = calculate_atr(&candles, 2);
        let expected = (10.0 + 25.0) / 2.0;
        assert!((series.simple_at(1).unwrap() - expected).abs() < 1e-9);
    }
}
