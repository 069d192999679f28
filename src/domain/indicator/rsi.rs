//! Relative Strength Index.
//!
//! Uses Wilder's smoothing for average gain/loss:
//! - First average: simple mean of gains/losses over the first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! RSI = 100 - (100 / (1 + avg_gain / avg_loss)); 100 when avg_loss == 0.
//! Warmup: first n bars are invalid (n price changes are needed).

use crate::domain::candle::Candle;
use crate::domain::indicator::{IndicatorPoint, IndicatorSeries, IndicatorType, IndicatorValue};

pub fn calculate_rsi(candles: &[Candle], period: usize) -> IndicatorSeries {
    if period == 0 || candles.len() < 2 {
        let values = candles
            .iter()
            .map(|c| IndicatorPoint {
                timestamp: c.timestamp,
                valid: false,
                value: IndicatorValue::Simple(0.0),
            })
            .collect();
        return IndicatorSeries {
            indicator_type: IndicatorType::Rsi(period),
            values,
        };
    }

    let mut values = Vec::with_capacity(candles.len());
    values.push(IndicatorPoint {
        timestamp: candles[0].timestamp,
        valid: false,
        value: IndicatorValue::Simple(0.0),
    });

    let mut gains: Vec<f64> = Vec::with_capacity(candles.len() - 1);
    let mut losses: Vec<f64> = Vec::with_capacity(candles.len() - 1);
    for i in 1..candles.len() {
        let change = candles[i].close - candles[i - 1].close;
        gains.push(if change > 0.0 { change } else { 0.0 });
        losses.push(if change < 0.0 { -change } else { 0.0 });
    }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for (i, candle) in candles.iter().enumerate().skip(1) {
        let change_idx = i - 1;

        if change_idx < period - 1 {
            values.push(IndicatorPoint {
                timestamp: candle.timestamp,
                valid: false,
                value: IndicatorValue::Simple(0.0),
            });
            continue;
        }

        if change_idx == period - 1 {
            avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
            avg_loss = losses[..period].iter().sum::<f64>() / period as f64;
        } else {
            avg_gain = (avg_gain * (period - 1) as f64 + gains[change_idx]) / period as f64;
            avg_loss = (avg_loss * (period - 1) as f64 + losses[change_idx]) / period as f64;
        }

        let rsi = if avg_loss == 0.0 {
            100.0
        } else {
            100.0 - (100.0 / (1.0 + avg_gain / avg_loss))
        };
        values.push(IndicatorPoint {
            timestamp: candle.timestamp,
            valid: true,
            value: IndicatorValue::Simple(rsi),
        });
    }

    IndicatorSeries {
        indicator_type: IndicatorType::Rsi(period),
        values,
    }
}
