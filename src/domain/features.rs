//! Feature extraction for the prediction ensemble.
//!
//! Each row is built from a trailing 20-bar window and carries exactly 13
//! features. Labels are forward returns over the prediction horizon; the
//! final rows of a series have no label yet. Normalization statistics are
//! fit on training rows only so no information leaks from the rows being
//! predicted.

use crate::domain::candle::Candle;
use crate::domain::indicator::rsi::calculate_rsi;
use crate::domain::indicator::sma::calculate_sma;
use crate::domain::indicator::stddev::population_stddev;

pub const FEATURE_COUNT: usize = 13;
pub const FEATURE_WINDOW: usize = 20;
const MOMENTUM_SPAN: usize = 10;

pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "return_1",
    "volatility",
    "momentum_10",
    "rsi_norm",
    "ma_ratio_5_20",
    "ma_ratio_10_20",
    "price_to_ma10",
    "price_to_ma20",
    "body_ratio",
    "upper_wick_ratio",
    "lower_wick_ratio",
    "bullish_flag",
    "volume_delta",
];

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    /// Candle index the row describes.
    pub index: usize,
    pub features: [f64; FEATURE_COUNT],
    /// Forward return over the horizon; `None` for the most recent rows.
    pub label: Option<f64>,
}

/// Extract one row per candle from `FEATURE_WINDOW` onward.
pub fn extract_features(candles: &[Candle], horizon: usize) -> Vec<FeatureRow> {
    if candles.len() <= FEATURE_WINDOW {
        return Vec::new();
    }

    let rsi = calculate_rsi(candles, 14);
    let sma5 = calculate_sma(candles, 5);
    let sma10 = calculate_sma(candles, 10);
    let sma20 = calculate_sma(candles, 20);

    let mut rows = Vec::with_capacity(candles.len() - FEATURE_WINDOW);

    for i in FEATURE_WINDOW..candles.len() {
        let candle = &candles[i];
        let window = &candles[i + 1 - FEATURE_WINDOW..=i];

        let ret1 = ratio_return(candle.close, candles[i - 1].close);
        let returns = window
            .windows(2)
            .map(|w| ratio_return(w[1].close, w[0].close))
            .collect::<Vec<f64>>();
        let volatility = population_stddev(returns.iter().copied());
        let momentum = ratio_return(candle.close, candles[i - MOMENTUM_SPAN].close);
        let rsi_norm = rsi.simple_at(i).unwrap_or(50.0) / 100.0;

        let ma5 = sma5.simple_at(i).unwrap_or(candle.close);
        let ma10 = sma10.simple_at(i).unwrap_or(candle.close);
        let ma20 = sma20.simple_at(i).unwrap_or(candle.close);
        let ma_ratio_5_20 = ratio_return(ma5, ma20);
        let ma_ratio_10_20 = ratio_return(ma10, ma20);
        let price_to_ma10 = ratio_return(candle.close, ma10);
        let price_to_ma20 = ratio_return(candle.close, ma20);

        let range = candle.range();
        let (body_ratio, upper_wick_ratio, lower_wick_ratio) = if range > 0.0 {
            (
                (candle.close - candle.open) / range,
                candle.upper_wick() / range,
                candle.lower_wick() / range,
            )
        } else {
            (0.0, 0.0, 0.0)
        };
        let bullish_flag = if candle.is_bullish() { 1.0 } else { 0.0 };

        let mean_volume = window.iter().map(|c| c.volume).sum::<f64>() / window.len() as f64;
        let volume_delta = if mean_volume > 0.0 {
            candle.volume / mean_volume - 1.0
        } else {
            0.0
        };

        let label = if i + horizon < candles.len() {
            Some(ratio_return(candles[i + horizon].close, candle.close))
        } else {
            None
        };

        rows.push(FeatureRow {
            index: i,
            features: [
                ret1,
                volatility,
                momentum,
                rsi_norm,
                ma_ratio_5_20,
                ma_ratio_10_20,
                price_to_ma10,
                price_to_ma20,
                body_ratio,
                upper_wick_ratio,
                lower_wick_ratio,
                bullish_flag,
                volume_delta,
            ],
            label,
        });
    }

    rows
}

fn ratio_return(current: f64, base: f64) -> f64 {
    if base.abs() <= f64::EPSILON {
        0.0
    } else {
        current / base - 1.0
    }
}

/// Z-score normalizer. Fit on the training rows; applied to anything.
#[derive(Debug, Clone)]
pub struct Normalizer {
    means: [f64; FEATURE_COUNT],
    stds: [f64; FEATURE_COUNT],
}

impl Normalizer {
    pub fn fit(rows: &[FeatureRow]) -> Normalizer {
        let mut means = [0.0; FEATURE_COUNT];
        let mut stds = [1.0; FEATURE_COUNT];
        if rows.is_empty() {
            return Normalizer { means, stds };
        }

        let n = rows.len() as f64;
        for f in 0..FEATURE_COUNT {
            means[f] = rows.iter().map(|r| r.features[f]).sum::<f64>() / n;
        }
        for f in 0..FEATURE_COUNT {
            let variance = rows
                .iter()
                .map(|r| (r.features[f] - means[f]).powi(2))
                .sum::<f64>()
                / n;
            let std = variance.sqrt();
            // constant features stay untouched rather than dividing by zero
            stds[f] = if std > 1e-12 { std } else { 1.0 };
        }

        Normalizer { means, stds }
    }

    pub fn apply(&self, features: &[f64; FEATURE_COUNT]) -> [f64; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        for f in 0..FEATURE_COUNT {
            out[f] = (features[f] - self.means[f]) / self.stds[f];
        }
        out
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
                open: close - 0.2,
                high: close + 0.5,
                low: close - 0.7,
                close,
                volume: 1000.0 + (i % 5) as f64 * 100.0,
            })
            .collect()
    }

    #[test]
    fn row_count_and_indices() {
        let closes: Vec<f64> = (0..50).map(|i| 100.0 + i as f64 * 0.1).collect();
        let rows = extract_features(&make_candles(&closes), 4);

        assert_eq!(rows.len(), 30);
        assert_eq!(rows[0].index, FEATURE_WINDOW);
        assert_eq!(rows.last().unwrap().index, 49);
    }

    #[test]
    fn too_few_candles_yields_no_rows() {
        let closes: Vec<f64> = (0..FEATURE_WINDOW).map(|i| 100.0 + i as f64).collect();
        assert!(extract_features(&make_candles(&closes), 1).is_empty());
    }

    #[test]
    fn labels_are_forward_returns() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let rows = extract_features(&make_candles(&closes), 2);

        let row = &rows[0]; // index 20, close 120; label from close 122
        let expected = 122.0 / 120.0 - 1.0;
        assert!((row.label.unwrap() - expected).abs() < 1e-12);
    }

    #[test]
    fn trailing_rows_have_no_label() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let rows = extract_features(&make_candles(&closes), 4);

        let n = rows.len();
        assert!(rows[n - 1].label.is_none());
        assert!(rows[n - 4].label.is_none());
        assert!(rows[n - 5].label.is_some());
    }

    #[test]
    fn exactly_thirteen_features() {
        assert_eq!(FEATURE_NAMES.len(), FEATURE_COUNT);
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let rows = extract_features(&make_candles(&closes), 1);
        assert_eq!(rows[0].features.len(), FEATURE_COUNT);
    }

    #[test]
    fn bullish_flag_feature() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let rows = extract_features(&make_candles(&closes), 1);
        // open = close - 0.2 everywhere, every candle is bullish
        assert!(rows.iter().all(|r| r.features[11] == 1.0));
    }

    #[test]
    fn normalizer_zero_mean_unit_std() {
        let closes: Vec<f64> = (0..60)
            .map(|i| 100.0 + ((i * 7) % 13) as f64 * 0.5)
            .collect();
        let rows = extract_features(&make_candles(&closes), 1);
        let labeled: Vec<FeatureRow> = rows.iter().filter(|r| r.label.is_some()).cloned().collect();

        let normalizer = Normalizer::fit(&labeled);
        let normalized: Vec<[f64; FEATURE_COUNT]> = labeled
            .iter()
            .map(|r| normalizer.apply(&r.features))
            .collect();

        for f in 0..FEATURE_COUNT {
            let mean = normalized.iter().map(|r| r[f]).sum::<f64>() / normalized.len() as f64;
            assert!(mean.abs() < 1e-9, "feature {} mean {}", f, mean);
        }
    }

    #[test]
    fn normalizer_handles_constant_feature() {
        let closes = vec![100.0; 40];
        let rows = extract_features(&make_candles(&closes), 1);
        let normalizer = Normalizer::fit(&rows);
        let out = normalizer.apply(&rows[0].features);
        assert!(out.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn extraction_deterministic() {
        let closes: Vec<f64> = (0..50).map(|i| 100.0 + ((i * 11) % 17) as f64).collect();
        let candles = make_candles(&closes);
        assert_eq!(extract_features(&candles, 4), extract_features(&candles, 4));
    }
}
