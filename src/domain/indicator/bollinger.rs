//! Bollinger Bands.
//!
//! - Middle: SMA over n periods
//! - Upper/Lower: middle ± multiplier × population standard deviation
//!
//! Default parameters: period=20, multiplier=2.0.
//! Warmup: first (period-1) bars are invalid.

use crate::domain::candle::Candle;
use crate::domain::indicator::stddev::population_stddev;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub const DEFAULT_PERIOD: usize = 20;
pub const DEFAULT_MULT_X100: u32 = 200;

pub fn calculate_bollinger(
    candles: &[Candle],
    period: usize,
    stddev_mult_x100: u32,
) -> IndicatorSeries {
    let mut values = Vec::with_capacity(candles.len());
    let warmup = period.saturating_sub(1);
    let mult = stddev_mult_x100 as f64 / 100.0;

    for (i, candle) in candles.iter().enumerate() {
        let valid = period > 0 && i >= warmup;

        let (upper, middle, lower) = if valid {
            let window = &candles[i + 1 - period..=i];
            let middle = window.iter().map(|c| c.close).sum::<f64>() / period as f64;
            let stddev = population_stddev(window.iter().map(|c| c.close));
            (middle + mult * stddev, middle, middle - mult * stddev)
        } else {
            (0.0, 0.0, 0.0)
        };

        values.push(IndicatorPoint {
            timestamp: candle.timestamp,
            valid,
            value: IndicatorValue::Bollinger {
                upper,
                middle,
                lower,
            },
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Bollinger {
            period,
            stddev_mult_x100,
        },
        values,
    }
}

/// %B: where the close sits inside the band. 0.5 when the band has no
/// width (flat window).
pub fn percent_b(close: f64, upper: f64, lower: f64) -> f64 {
    let width = upper - lower;
    if width <= f64::EPSILON {
        0.5
    } else {
        (close - lower) / width
    }
}
