//! Chart and candlestick pattern recognition.
//!
//! Detection runs over a fixed candle window and produces immutable
//! `DetectedPattern` values; each re-run starts from scratch. Each detector
//! reports at most one match per pattern type, and the aggregate pass
//! returns all matches sorted by descending confidence.

pub mod candlestick;
pub mod chart;
pub mod extrema;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::candle::CandleSeries;
use crate::domain::signal::Signal;

/// Minimum candles before any detection is attempted. Below this the
/// aggregate detector returns an empty list, not an error.
pub const MIN_PATTERN_CANDLES: usize = 20;

pub const BASE_CONFIDENCE: f64 = 70.0;
pub const MAX_CONFIDENCE: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    // chart patterns
    HeadAndShoulders,
    InverseHeadAndShoulders,
    DoubleTop,
    DoubleBottom,
    TripleTop,
    TripleBottom,
    AscendingTriangle,
    DescendingTriangle,
    SymmetricalTriangle,
    // candlestick patterns
    Doji,
    Hammer,
    InvertedHammer,
    ShootingStar,
    BullishEngulfing,
    BearishEngulfing,
    MorningStar,
    EveningStar,
    ThreeWhiteSoldiers,
    ThreeBlackCrows,
}

/// A vertex of the detected shape, for rendering by external consumers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PatternPoint {
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedPattern {
    pub pattern_type: PatternType,
    pub start_index: usize,
    pub end_index: usize,
    pub confidence: f64,
    pub signal: Signal,
    pub target_price: f64,
    pub stop_loss: f64,
    pub points: Vec<PatternPoint>,
}

/// Confidence from how well a tolerance was met: `BASE_CONFIDENCE` plus a
/// bonus proportional to the headroom left under `tolerance`, capped.
pub(crate) fn tolerance_confidence(deviation: f64, tolerance: f64) -> f64 {
    if tolerance <= 0.0 {
        return BASE_CONFIDENCE;
    }
    let headroom = (1.0 - deviation / tolerance).clamp(0.0, 1.0);
    (BASE_CONFIDENCE + headroom * (MAX_CONFIDENCE - BASE_CONFIDENCE)).min(MAX_CONFIDENCE)
}

/// Run every detector over the series and collect all matches, best first.
pub fn detect_patterns(series: &CandleSeries) -> Vec<DetectedPattern> {
    let candles = series.candles();
    if candles.len() < MIN_PATTERN_CANDLES {
        return Vec::new();
    }

    let mut matches = chart::detect_chart_patterns(candles);
    matches.extend(candlestick::detect_candlestick_patterns(candles));

    matches.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    matches
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::candle::{Candle, Timeframe};
    use chrono::{Duration, TimeZone, Utc};

    fn make_series(closes: &[f64]) -> CandleSeries {
        let candles: Vec<Candle> = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Candle {
                timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                    + Duration::hours(i as i64),
                open: close,
                high: close + 0.5,
                low: close - 0.5,
                close,
                volume: 1000.0,
            })
            .collect();
        CandleSeries::new("EURUSD", Timeframe::H1, candles).unwrap()
    }

    #[test]
    fn fewer_than_minimum_candles_is_empty_not_error() {
        let closes: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        assert!(detect_patterns(&make_series(&closes)).is_empty());
    }

    #[test]
    fn matches_sorted_by_confidence_desc() {
        let closes: Vec<f64> = (0..60)
            .map(|i| 100.0 + ((i % 13) as f64 - 6.0) * 2.0)
            .collect();
        let matches = detect_patterns(&make_series(&closes));
        for pair in matches.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
    }

    #[test]
    fn all_confidences_in_range() {
        let closes: Vec<f64> = (0..80)
            .map(|i| 100.0 + ((i % 17) as f64 - 8.0) * 1.5)
            .collect();
        for m in detect_patterns(&make_series(&closes)) {
            assert!(
                (0.0..=100.0).contains(&m.confidence),
                "{:?} confidence {} out of range",
                m.pattern_type,
                m.confidence
            );
        }
    }

    #[test]
    fn tolerance_confidence_bounds() {
        assert!((tolerance_confidence(0.0, 0.02) - 100.0).abs() < 1e-9);
        assert!((tolerance_confidence(0.02, 0.02) - 70.0).abs() < 1e-9);
        let mid = tolerance_confidence(0.01, 0.02);
        assert!(mid > 70.0 && mid < 100.0);
    }
}
