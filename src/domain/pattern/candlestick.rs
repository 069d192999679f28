//! Candlestick pattern recognition on the most recent 1-3 bars.
//!
//! All thresholds are body/wick ratios of the bar's full range. Single-bar
//! shapes with a long upper wick are disambiguated by the short trend
//! leading into them: after a rise it is a shooting star, after a fall an
//! inverted hammer.

use crate::domain::candle::Candle;
use crate::domain::pattern::{
    BASE_CONFIDENCE, DetectedPattern, MAX_CONFIDENCE, PatternPoint, PatternType,
    tolerance_confidence,
};
use crate::domain::signal::Signal;

/// body ≤ 10% of range
const DOJI_BODY_RATIO: f64 = 0.10;
/// dominant wick must be at least twice the body
const WICK_BODY_MULT: f64 = 2.0;
/// the opposite wick may be at most 30% of the range
const OPPOSITE_WICK_RATIO: f64 = 0.30;
/// soldiers/crows need real bodies: at least half the range
const SOLDIER_BODY_RATIO: f64 = 0.5;

pub fn detect_candlestick_patterns(candles: &[Candle]) -> Vec<DetectedPattern> {
    let mut matches = Vec::new();

    if let Some(m) = detect_doji(candles) {
        matches.push(m);
    }
    if let Some(m) = detect_hammer(candles) {
        matches.push(m);
    }
    if let Some(m) = detect_upper_wick_reversal(candles) {
        matches.push(m);
    }
    if let Some(m) = detect_engulfing(candles) {
        matches.push(m);
    }
    if let Some(m) = detect_star(candles) {
        matches.push(m);
    }
    if let Some(m) = detect_three_in_a_row(candles) {
        matches.push(m);
    }

    matches
}

fn point(candles: &[Candle], index: usize, price: f64) -> PatternPoint {
    PatternPoint {
        index,
        timestamp: candles[index].timestamp,
        price,
    }
}

/// Mean close direction over the few bars before `index`.
fn prior_trend_is_up(candles: &[Candle], index: usize, span: usize) -> bool {
    if index < span {
        return false;
    }
    candles[index].close > candles[index - span].close
}

fn detect_doji(candles: &[Candle]) -> Option<DetectedPattern> {
    let i = candles.len().checked_sub(1)?;
    let c = &candles[i];
    let range = c.range();
    if range <= 0.0 {
        return None;
    }
    let body_ratio = c.body() / range;
    if body_ratio > DOJI_BODY_RATIO {
        return None;
    }

    Some(DetectedPattern {
        pattern_type: PatternType::Doji,
        start_index: i,
        end_index: i,
        confidence: tolerance_confidence(body_ratio, DOJI_BODY_RATIO),
        signal: Signal::Hold,
        target_price: c.close,
        stop_loss: c.low,
        points: vec![point(candles, i, c.close)],
    })
}

fn detect_hammer(candles: &[Candle]) -> Option<DetectedPattern> {
    let i = candles.len().checked_sub(1)?;
    let c = &candles[i];
    let range = c.range();
    let body = c.body();
    if range <= 0.0 || body <= 0.0 {
        return None;
    }
    if c.lower_wick() < body * WICK_BODY_MULT || c.upper_wick() / range > OPPOSITE_WICK_RATIO {
        return None;
    }
    // a hammer only means reversal after a decline
    if prior_trend_is_up(candles, i, 3) {
        return None;
    }

    let wick_strength = c.lower_wick() / range;
    Some(DetectedPattern {
        pattern_type: PatternType::Hammer,
        start_index: i,
        end_index: i,
        confidence: (BASE_CONFIDENCE + wick_strength * 30.0).min(MAX_CONFIDENCE),
        signal: Signal::Buy,
        target_price: c.close + range,
        stop_loss: c.low,
        points: vec![point(candles, i, c.close)],
    })
}

/// Long upper wick, small body: shooting star after a rise, inverted
/// hammer after a fall.
fn detect_upper_wick_reversal(candles: &[Candle]) -> Option<DetectedPattern> {
    let i = candles.len().checked_sub(1)?;
    let c = &candles[i];
    let range = c.range();
    let body = c.body();
    if range <= 0.0 || body <= 0.0 {
        return None;
    }
    if c.upper_wick() < body * WICK_BODY_MULT || c.lower_wick() / range > OPPOSITE_WICK_RATIO {
        return None;
    }

    let wick_strength = c.upper_wick() / range;
    let confidence = (BASE_CONFIDENCE + wick_strength * 30.0).min(MAX_CONFIDENCE);
    let (pattern_type, signal, target, stop) = if prior_trend_is_up(candles, i, 3) {
        (
            PatternType::ShootingStar,
            Signal::Sell,
            c.close - range,
            c.high,
        )
    } else {
        (
            PatternType::InvertedHammer,
            Signal::Buy,
            c.close + range,
            c.low,
        )
    };

    Some(DetectedPattern {
        pattern_type,
        start_index: i,
        end_index: i,
        confidence,
        signal,
        target_price: target,
        stop_loss: stop,
        points: vec![point(candles, i, c.close)],
    })
}

fn detect_engulfing(candles: &[Candle]) -> Option<DetectedPattern> {
    let i = candles.len().checked_sub(1)?;
    if i < 1 {
        return None;
    }
    let prev = &candles[i - 1];
    let curr = &candles[i];
    if prev.body() <= 0.0 || curr.body() <= 0.0 {
        return None;
    }

    let bullish = curr.is_bullish()
        && !prev.is_bullish()
        && curr.open <= prev.close
        && curr.close >= prev.open;
    let bearish = !curr.is_bullish()
        && prev.is_bullish()
        && curr.open >= prev.close
        && curr.close <= prev.open;
    if !bullish && !bearish {
        return None;
    }

    let dominance = (curr.body() / prev.body() - 1.0).clamp(0.0, 1.0);
    let range = curr.range();
    let (pattern_type, signal, target, stop) = if bullish {
        (
            PatternType::BullishEngulfing,
            Signal::Buy,
            curr.close + range,
            curr.low.min(prev.low),
        )
    } else {
        (
            PatternType::BearishEngulfing,
            Signal::Sell,
            curr.close - range,
            curr.high.max(prev.high),
        )
    };

    Some(DetectedPattern {
        pattern_type,
        start_index: i - 1,
        end_index: i,
        confidence: (BASE_CONFIDENCE + dominance * 30.0).min(MAX_CONFIDENCE),
        signal,
        target_price: target,
        stop_loss: stop,
        points: vec![
            point(candles, i - 1, prev.close),
            point(candles, i, curr.close),
        ],
    })
}

/// Morning star / evening star: a strong bar, a small-bodied star, then a
/// strong bar the other way closing beyond the first bar's midpoint.
fn detect_star(candles: &[Candle]) -> Option<DetectedPattern> {
    let i = candles.len().checked_sub(1)?;
    if i < 2 {
        return None;
    }
    let (first, star, last) = (&candles[i - 2], &candles[i - 1], &candles[i]);
    if first.range() <= 0.0 || last.range() <= 0.0 {
        return None;
    }

    let star_is_small = star.range() <= 0.0 || star.body() / first.body().max(1e-12) < 0.5;
    if !star_is_small {
        return None;
    }
    let first_mid = (first.open + first.close) / 2.0;

    let morning = !first.is_bullish() && last.is_bullish() && last.close > first_mid;
    let evening = first.is_bullish() && !last.is_bullish() && last.close < first_mid;
    if !morning && !evening {
        return None;
    }

    // how far past the midpoint the close pushed, relative to the first body
    let push = ((last.close - first_mid).abs() / first.body().max(1e-12)).clamp(0.0, 1.0);
    let (pattern_type, signal, target, stop) = if morning {
        (
            PatternType::MorningStar,
            Signal::Buy,
            last.close + first.body(),
            star.low.min(first.low),
        )
    } else {
        (
            PatternType::EveningStar,
            Signal::Sell,
            last.close - first.body(),
            star.high.max(first.high),
        )
    };

    Some(DetectedPattern {
        pattern_type,
        start_index: i - 2,
        end_index: i,
        confidence: (BASE_CONFIDENCE + push * 25.0).min(MAX_CONFIDENCE),
        signal,
        target_price: target,
        stop_loss: stop,
        points: vec![
            point(candles, i - 2, first.close),
            point(candles, i - 1, star.close),
            point(candles, i, last.close),
        ],
    })
}

/// Three white soldiers / three black crows.
fn detect_three_in_a_row(candles: &[Candle]) -> Option<DetectedPattern> {
    let i = candles.len().checked_sub(1)?;
    if i < 2 {
        return None;
    }
    let window = &candles[i - 2..=i];

    let all_strong_bull = window.iter().all(|c| {
        c.is_bullish() && c.range() > 0.0 && c.body() / c.range() >= SOLDIER_BODY_RATIO
    }) && window[1].close > window[0].close
        && window[2].close > window[1].close;

    let all_strong_bear = window.iter().all(|c| {
        !c.is_bullish() && c.range() > 0.0 && c.body() / c.range() >= SOLDIER_BODY_RATIO
    }) && window[1].close < window[0].close
        && window[2].close < window[1].close;

    if !all_strong_bull && !all_strong_bear {
        return None;
    }

    let avg_body_ratio =
        window.iter().map(|c| c.body() / c.range()).sum::<f64>() / window.len() as f64;
    let span = window[2].close - window[0].open;
    let (pattern_type, signal, target, stop) = if all_strong_bull {
        (
            PatternType::ThreeWhiteSoldiers,
            Signal::Buy,
            window[2].close + span.abs(),
            window[0].low,
        )
    } else {
        (
            PatternType::ThreeBlackCrows,
            Signal::Sell,
            window[2].close - span.abs(),
            window[0].high,
        )
    };

    Some(DetectedPattern {
        pattern_type,
        start_index: i - 2,
        end_index: i,
        confidence: (BASE_CONFIDENCE + (avg_body_ratio - SOLDIER_BODY_RATIO) * 60.0)
            .min(MAX_CONFIDENCE),
        signal,
        target_price: target,
        stop_loss: stop,
        points: window
            .iter()
            .enumerate()
            .map(|(j, c)| point(candles, i - 2 + j, c.close))
            .collect(),
    })
}
