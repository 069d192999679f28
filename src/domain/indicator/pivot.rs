//! Classic floor-trader pivot points.
//!
//! Each bar's levels are derived from the previous bar:
//! P = (H + L + C) / 3, R1 = 2P - L, S1 = 2P - H,
//! R2 = P + (H - L), S2 = P - (H - L),
//! R3 = H + 2(P - L), S3 = L - 2(H - P).
//! Warmup: the first bar has no previous bar and is invalid.

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub fn calculate_pivot(candles: &[Candle]) -> IndicatorSeries {
    let values = candles
        .iter()
        .enumerate()
        .map(|(i, candle)| {
            if i == 0 {
                return IndicatorPoint {
                    timestamp: candle.timestamp,
                    valid: false,
                    value: IndicatorValue::Pivot {
                        pivot: 0.0,
                        r1: 0.0,
                        r2: 0.0,
                        r3: 0.0,
                        s1: 0.0,
                        s2: 0.0,
                        s3: 0.0,
                    },
                };
            }

            let prev = &candles[i - 1];
            let pivot = prev.typical_price();
            let range = prev.high - prev.low;
            IndicatorPoint {
                timestamp: candle.timestamp,
                valid: true,
                value: IndicatorValue::Pivot {
                    pivot,
                    r1: 2.0 * pivot - prev.low,
                    r2: pivot + range,
                    r3: prev.high + 2.0 * (pivot - prev.low),
                    s1: 2.0 * pivot - prev.high,
                    s2: pivot - range,
                    s3: prev.low - 2.0 * (prev.high - pivot),
                },
            }
        })
        .collect();

    IndicatorSeries {
        indicator_type: IndicatorType::Pivot,
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
    fn pivot_first_bar_invalid() {
        let candles = vec![make_candle(0, 110.0, 90.0, 100.0)];
        let series = calculate_pivot(&candles);
        assert!(!series.values[0].valid);
    }

    #[test]
    fn pivot_levels_from_previous_bar() {
        let candles = vec![
            make_candle(0, 110.0, 90.0, 100.0),
            make_candle(1, 112.0, 95.0, 105.0),
        ];
        let series = calculate_pivot(&candles);

        let point = &series.values[1];
        assert!(point.valid);
        if let IndicatorValue::Pivot {
            pivot,
            r1,
            r2,
            s1,
            s2,
            ..
        } = point.value
        {
            let expected_pivot = (110.0 + 90.0 + 100.0) / 3.0;
            assert!((pivot - expected_pivot).abs() < 1e-9);
            assert!((r1 - (2.0 * expected_pivot - 90.0)).abs() < 1e-9);
            assert!((s1 - (2.0 * expected_pivot - 110.0)).abs() < 1e-9);
            assert!((r2 - (expected_pivot + 20.0)).abs() < 1e-9);
            assert!((s2 - (expected_pivot - 20.0)).abs() < 1e-9);
        } else {
            panic!("expected Pivot value");
        }
    }

    #[test]
    fn pivot_level_ordering() {
        let candles = vec![
            make_candle(0, 110.0, 90.0, 100.0),
            make_candle(1, 111.0, 91.0, 101.0),
        ];
        let series = calculate_pivot(&candles);

        if let IndicatorValue::Pivot {
            pivot,
            r1,
            r2,
            r3,
            s1,
            s2,
            s3,
        } = series.values[1].value
        {
            assert!(r3 > r2 && r2 > r1 && r1 > pivot);
            assert!(pivot > s1 && s1 > s2 && s2 > s3);
        } else {
            panic!("expected Pivot value");
        }
    }
}
