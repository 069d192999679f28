//! Multi-point chart pattern recognition over local extrema.
//!
//! Detectors scan the most recent 2-3 extrema and check shape constraints
//! with explicit tolerances. Each returns at most one match.

use crate::domain::candle::Candle;
use crate::domain::pattern::extrema::{self, Extremum, find_extrema};
use crate::domain::pattern::{DetectedPattern, PatternPoint, PatternType, tolerance_confidence};
use crate::domain::signal::Signal;

/// Shoulder height symmetry for head & shoulders.
const SHOULDER_TOLERANCE: f64 = 0.02;
/// Price symmetry for double tops/bottoms.
const DOUBLE_TOLERANCE: f64 = 0.015;
/// Price symmetry for triple tops/bottoms.
const TRIPLE_TOLERANCE: f64 = 0.02;
/// Per-bar relative slope under which a trendline counts as flat.
const FLAT_SLOPE: f64 = 0.0002;

pub fn detect_chart_patterns(candles: &[Candle]) -> Vec<DetectedPattern> {
    let all = find_extrema(candles, extrema::DEFAULT_WINDOW);
    let peaks = extrema::peaks(&all);
    let troughs = extrema::troughs(&all);

    let mut matches = Vec::new();
    if let Some(m) = head_and_shoulders(candles, &peaks, &troughs) {
        matches.push(m);
    }
    if let Some(m) = inverse_head_and_shoulders(candles, &peaks, &troughs) {
        matches.push(m);
    }
    if let Some(m) = double_extreme(candles, &peaks, &troughs, true) {
        matches.push(m);
    }
    if let Some(m) = double_extreme(candles, &troughs, &peaks, false) {
        matches.push(m);
    }
    if let Some(m) = triple_extreme(candles, &peaks, true) {
        matches.push(m);
    }
    if let Some(m) = triple_extreme(candles, &troughs, false) {
        matches.push(m);
    }
    matches.extend(triangles(candles, &peaks, &troughs));
    matches
}

fn pattern_point(candles: &[Candle], e: &Extremum) -> PatternPoint {
    PatternPoint {
        index: e.index,
        timestamp: candles[e.index].timestamp,
        price: e.price,
    }
}

/// The most recent extremum strictly between two indices.
fn extremum_between(list: &[Extremum], start: usize, end: usize) -> Option<&Extremum> {
    list.iter().filter(|e| e.index > start && e.index < end).last()
}

fn head_and_shoulders(
    candles: &[Candle],
    peaks: &[Extremum],
    troughs: &[Extremum],
) -> Option<DetectedPattern> {
    let n = peaks.len();
    if n < 3 {
        return None;
    }
    let (left, head, right) = (&peaks[n - 3], &peaks[n - 2], &peaks[n - 1]);
    if head.price <= left.price || head.price <= right.price {
        return None;
    }
    let shoulder_diff = (left.price - right.price).abs() / left.price;
    if shoulder_diff > SHOULDER_TOLERANCE {
        return None;
    }

    let left_valley = extremum_between(troughs, left.index, head.index)?;
    let right_valley = extremum_between(troughs, head.index, right.index)?;
    let neckline = (left_valley.price + right_valley.price) / 2.0;

    Some(DetectedPattern {
        pattern_type: PatternType::HeadAndShoulders,
        start_index: left.index,
        end_index: right.index,
        confidence: tolerance_confidence(shoulder_diff, SHOULDER_TOLERANCE),
        signal: Signal::Sell,
        target_price: neckline - (head.price - neckline),
        stop_loss: head.price,
        points: vec![
            pattern_point(candles, left),
            pattern_point(candles, left_valley),
            pattern_point(candles, head),
            pattern_point(candles, right_valley),
            pattern_point(candles, right),
        ],
    })
}

fn inverse_head_and_shoulders(
    candles: &[Candle],
    peaks: &[Extremum],
    troughs: &[Extremum],
) -> Option<DetectedPattern> {
    let n = troughs.len();
    if n < 3 {
        return None;
    }
    let (left, head, right) = (&troughs[n - 3], &troughs[n - 2], &troughs[n - 1]);
    if head.price >= left.price || head.price >= right.price {
        return None;
    }
    let shoulder_diff = (left.price - right.price).abs() / left.price;
    if shoulder_diff > SHOULDER_TOLERANCE {
        return None;
    }

    let left_crest = extremum_between(peaks, left.index, head.index)?;
    let right_crest = extremum_between(peaks, head.index, right.index)?;
    let neckline = (left_crest.price + right_crest.price) / 2.0;

    Some(DetectedPattern {
        pattern_type: PatternType::InverseHeadAndShoulders,
        start_index: left.index,
        end_index: right.index,
        confidence: tolerance_confidence(shoulder_diff, SHOULDER_TOLERANCE),
        signal: Signal::Buy,
        target_price: neckline + (neckline - head.price),
        stop_loss: head.price,
        points: vec![
            pattern_point(candles, left),
            pattern_point(candles, left_crest),
            pattern_point(candles, head),
            pattern_point(candles, right_crest),
            pattern_point(candles, right),
        ],
    })
}

/// Double top (`top == true`) or double bottom over the last two extrema of
/// the primary kind, requiring an opposite extremum between them.
fn double_extreme(
    candles: &[Candle],
    primary: &[Extremum],
    opposite: &[Extremum],
    top: bool,
) -> Option<DetectedPattern> {
    let n = primary.len();
    if n < 2 {
        return None;
    }
    let (first, second) = (&primary[n - 2], &primary[n - 1]);
    let diff = (first.price - second.price).abs() / first.price;
    if diff > DOUBLE_TOLERANCE {
        return None;
    }
    let between = extremum_between(opposite, first.index, second.index)?;

    let level = (first.price + second.price) / 2.0;
    let height = (level - between.price).abs();
    let (pattern_type, signal, target, stop) = if top {
        (
            PatternType::DoubleTop,
            Signal::Sell,
            between.price - height,
            first.price.max(second.price),
        )
    } else {
        (
            PatternType::DoubleBottom,
            Signal::Buy,
            between.price + height,
            first.price.min(second.price),
        )
    };

    Some(DetectedPattern {
        pattern_type,
        start_index: first.index,
        end_index: second.index,
        confidence: tolerance_confidence(diff, DOUBLE_TOLERANCE),
        signal,
        target_price: target,
        stop_loss: stop,
        points: vec![
            pattern_point(candles, first),
            pattern_point(candles, between),
            pattern_point(candles, second),
        ],
    })
}

fn triple_extreme(
    candles: &[Candle],
    primary: &[Extremum],
    top: bool,
) -> Option<DetectedPattern> {
    let n = primary.len();
    if n < 3 {
        return None;
    }
    let last3 = &primary[n - 3..];
    let mean = last3.iter().map(|e| e.price).sum::<f64>() / 3.0;
    let worst_diff = last3
        .iter()
        .map(|e| (e.price - mean).abs() / mean)
        .fold(0.0, f64::max);
    if worst_diff > TRIPLE_TOLERANCE {
        return None;
    }

    let height = mean * TRIPLE_TOLERANCE * 2.0;
    let (pattern_type, signal, target, stop) = if top {
        (
            PatternType::TripleTop,
            Signal::Sell,
            mean - height,
            last3.iter().map(|e| e.price).fold(f64::MIN, f64::max),
        )
    } else {
        (
            PatternType::TripleBottom,
            Signal::Buy,
            mean + height,
            last3.iter().map(|e| e.price).fold(f64::MAX, f64::min),
        )
    };

    Some(DetectedPattern {
        pattern_type,
        start_index: last3[0].index,
        end_index: last3[2].index,
        confidence: tolerance_confidence(worst_diff, TRIPLE_TOLERANCE),
        signal,
        target_price: target,
        stop_loss: stop,
        points: last3.iter().map(|e| pattern_point(candles, e)).collect(),
    })
}

/// Relative per-bar slope of the line through the first and last extrema.
fn trendline_slope(list: &[Extremum]) -> Option<f64> {
    let first = list.first()?;
    let last = list.last()?;
    if last.index == first.index {
        return None;
    }
    let bars = (last.index - first.index) as f64;
    let mid = (first.price + last.price) / 2.0;
    if mid <= 0.0 {
        return None;
    }
    Some((last.price - first.price) / bars / mid)
}

fn triangles(
    candles: &[Candle],
    peaks: &[Extremum],
    troughs: &[Extremum],
) -> Vec<DetectedPattern> {
    let mut matches = Vec::new();
    if peaks.len() < 2 || troughs.len() < 2 {
        return matches;
    }

    let recent_peaks = &peaks[peaks.len().saturating_sub(3)..];
    let recent_troughs = &troughs[troughs.len().saturating_sub(3)..];
    let (Some(top_slope), Some(bottom_slope)) =
        (trendline_slope(recent_peaks), trendline_slope(recent_troughs))
    else {
        return matches;
    };

    let start_index = recent_peaks[0].index.min(recent_troughs[0].index);
    let end_index = recent_peaks
        .last()
        .map(|e| e.index)
        .unwrap_or(0)
        .max(recent_troughs.last().map(|e| e.index).unwrap_or(0));
    let resistance = recent_peaks.last().map(|e| e.price).unwrap_or(0.0);
    let support = recent_troughs.last().map(|e| e.price).unwrap_or(0.0);
    let height = resistance - support;

    let mut points: Vec<PatternPoint> = recent_peaks
        .iter()
        .chain(recent_troughs.iter())
        .map(|e| pattern_point(candles, e))
        .collect();
    points.sort_by_key(|p| p.index);

    let top_flat = top_slope.abs() <= FLAT_SLOPE;
    let bottom_flat = bottom_slope.abs() <= FLAT_SLOPE;

    if top_flat && bottom_slope > FLAT_SLOPE {
        matches.push(DetectedPattern {
            pattern_type: PatternType::AscendingTriangle,
            start_index,
            end_index,
            confidence: tolerance_confidence(top_slope.abs(), FLAT_SLOPE),
            signal: Signal::Buy,
            target_price: resistance + height,
            stop_loss: support,
            points: points.clone(),
        });
    } else if bottom_flat && top_slope < -FLAT_SLOPE {
        matches.push(DetectedPattern {
            pattern_type: PatternType::DescendingTriangle,
            start_index,
            end_index,
            confidence: tolerance_confidence(bottom_slope.abs(), FLAT_SLOPE),
            signal: Signal::Sell,
            target_price: support - height,
            stop_loss: resistance,
            points: points.clone(),
        });
    } else if top_slope < -FLAT_SLOPE && bottom_slope > FLAT_SLOPE {
        matches.push(DetectedPattern {
            pattern_type: PatternType::SymmetricalTriangle,
            start_index,
            end_index,
            confidence: crate::domain::pattern::BASE_CONFIDENCE,
            signal: Signal::Hold,
            target_price: (resistance + support) / 2.0,
            stop_loss: support,
            points,
        });
    }

    matches
}
