//! Multi-timeframe trend analysis and vote fusion.
//!
//! The indicator engine runs independently on three candle series (short,
//! medium, long timeframe). Votes are fused with fixed weights — long 3,
//! medium 2, short 1 — applied identically to the RSI, MACD and
//! moving-average votes. Ties go to the earliest-scored timeframe, which is
//! the long one.

use serde::{Deserialize, Serialize};

use crate::domain::candle::{CandleSeries, Timeframe};
use crate::domain::pattern::extrema::{self, find_extrema};
use crate::domain::signal::Signal;
use crate::domain::snapshot::{IndicatorSnapshot, Trend, VolatilityBucket, compute_snapshots};

pub const LONG_WEIGHT: f64 = 3.0;
pub const MEDIUM_WEIGHT: f64 = 2.0;
pub const SHORT_WEIGHT: f64 = 1.0;

/// RSI momentum thresholds for the trend vote. In trend context RSI reads
/// as momentum: above the upper bound is bullish pressure, below the lower
/// bound bearish.
const RSI_BULL: f64 = 55.0;
const RSI_BEAR: f64 = 45.0;

/// How many recent bars the strength measure looks at.
const STRENGTH_LOOKBACK: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeframeAnalysis {
    pub timeframe: Timeframe,
    pub trend: Trend,
    pub strength: f64,
    pub rsi_signal: Signal,
    pub macd_signal: Signal,
    pub ma_signal: Signal,
    pub support: f64,
    pub resistance: f64,
    pub volatility: VolatilityBucket,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Alignment {
    Full,
    Partial,
    Conflicting,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MultiTimeframeResult {
    pub overall_trend: Trend,
    pub overall_signal: Signal,
    pub confidence: f64,
    pub alignment: Alignment,
    pub entry_zone: (f64, f64),
    pub stop_loss: f64,
    pub take_profits: Vec<f64>,
    /// Ordered long, medium, short — the order they are scored in.
    pub analyses: Vec<TimeframeAnalysis>,
}

/// Analyze a single timeframe. Degrades to a neutral reading when the
/// series is too short for the underlying indicators; never fails.
pub fn analyze_timeframe(series: &CandleSeries) -> TimeframeAnalysis {
    let snapshots = compute_snapshots(series);
    let last = snapshots.last();

    let trend = last
        .map(|s| s.moving_averages.trend)
        .unwrap_or(Trend::Sideways);

    let rsi_signal = match last.and_then(|s| s.rsi) {
        Some(rsi) if rsi >= RSI_BULL => Signal::Buy,
        Some(rsi) if rsi <= RSI_BEAR => Signal::Sell,
        _ => Signal::Hold,
    };

    let macd_signal = match last.and_then(|s| s.macd) {
        Some(macd) if macd.histogram > 0.0 => Signal::Buy,
        Some(macd) if macd.histogram < 0.0 => Signal::Sell,
        _ => Signal::Hold,
    };

    let ma_signal = match last {
        Some(s) => match (s.moving_averages.sma20, s.moving_averages.sma50) {
            (Some(sma20), Some(sma50)) if sma20 > sma50 && s.close > sma20 => Signal::Buy,
            (Some(sma20), Some(sma50)) if sma20 < sma50 && s.close < sma20 => Signal::Sell,
            _ => Signal::Hold,
        },
        None => Signal::Hold,
    };

    let volatility = last
        .and_then(|s| s.atr)
        .map(|a| a.bucket)
        .unwrap_or(VolatilityBucket::Low);

    let (support, resistance) = support_resistance(series);

    TimeframeAnalysis {
        timeframe: series.timeframe(),
        trend,
        strength: trend_strength(&snapshots, trend),
        rsi_signal,
        macd_signal,
        ma_signal,
        support,
        resistance,
        volatility,
    }
}

/// Share of recent bars consistent with the classified trend, in [0, 100].
fn trend_strength(snapshots: &[IndicatorSnapshot], trend: Trend) -> f64 {
    if snapshots.is_empty() {
        return 0.0;
    }
    let tail = &snapshots[snapshots.len().saturating_sub(STRENGTH_LOOKBACK)..];
    let consistent = tail
        .iter()
        .filter(|s| match (trend, s.moving_averages.sma20) {
            (Trend::Bullish, Some(sma20)) => s.close > sma20,
            (Trend::Bearish, Some(sma20)) => s.close < sma20,
            (Trend::Sideways, _) => false,
            (_, None) => false,
        })
        .count();
    consistent as f64 / tail.len() as f64 * 100.0
}

/// Most recent swing trough / peak; falls back to the window min/max when
/// no extrema exist.
fn support_resistance(series: &CandleSeries) -> (f64, f64) {
    let candles = series.candles();
    let all = find_extrema(candles, extrema::DEFAULT_WINDOW);
    let support = extrema::troughs(&all)
        .last()
        .map(|e| e.price)
        .or_else(|| {
            candles
                .iter()
                .map(|c| c.low)
                .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.min(v))))
        })
        .unwrap_or(0.0);
    let resistance = extrema::peaks(&all)
        .last()
        .map(|e| e.price)
        .or_else(|| {
            candles
                .iter()
                .map(|c| c.high)
                .fold(None, |acc: Option<f64>, v| Some(acc.map_or(v, |a| a.max(v))))
        })
        .unwrap_or(0.0);
    (support, resistance)
}

/// Fuse three independently analyzed timeframes.
pub fn analyze_multi_timeframe(
    short: &CandleSeries,
    medium: &CandleSeries,
    long: &CandleSeries,
) -> MultiTimeframeResult {
    let long_analysis = analyze_timeframe(long);
    let medium_analysis = analyze_timeframe(medium);
    let short_analysis = analyze_timeframe(short);

    // scored long-first so ties resolve toward the long timeframe
    let weighted: [(&TimeframeAnalysis, f64); 3] = [
        (&long_analysis, LONG_WEIGHT),
        (&medium_analysis, MEDIUM_WEIGHT),
        (&short_analysis, SHORT_WEIGHT),
    ];

    let mut signal_tally: Vec<(Signal, f64)> = Vec::new();
    let mut trend_tally: Vec<(Trend, f64)> = Vec::new();
    let mut total_weight = 0.0;

    for (analysis, weight) in &weighted {
        for vote in [
            analysis.rsi_signal,
            analysis.macd_signal,
            analysis.ma_signal,
        ] {
            tally(&mut signal_tally, vote, *weight);
            total_weight += weight;
        }
        tally(&mut trend_tally, analysis.trend, *weight * 3.0);
    }

    let (overall_signal, top_weight) = winner(&signal_tally).unwrap_or((Signal::Hold, 0.0));
    let (overall_trend, _) = winner(&trend_tally).unwrap_or((Trend::Sideways, 0.0));

    let confidence = if total_weight > 0.0 {
        (top_weight / total_weight * 100.0).round()
    } else {
        0.0
    };

    let trends = [
        long_analysis.trend,
        medium_analysis.trend,
        short_analysis.trend,
    ];
    let alignment = if trends[0] == trends[1] && trends[1] == trends[2] {
        Alignment::Full
    } else if trends[0] != trends[1] && trends[1] != trends[2] && trends[0] != trends[2] {
        Alignment::Conflicting
    } else {
        Alignment::Partial
    };

    let close = long.last().map(|c| c.close).unwrap_or(0.0);
    let atr = compute_snapshots(long)
        .last()
        .and_then(|s| s.atr)
        .map(|a| a.value)
        .unwrap_or(0.0);
    let (entry_zone, stop_loss, take_profits) = trade_levels(overall_signal, close, atr);

    MultiTimeframeResult {
        overall_trend,
        overall_signal,
        confidence,
        alignment,
        entry_zone,
        stop_loss,
        take_profits,
        analyses: vec![long_analysis, medium_analysis, short_analysis],
    }
}

fn tally<K: PartialEq>(tally: &mut Vec<(K, f64)>, key: K, weight: f64) {
    if let Some(entry) = tally.iter_mut().find(|(k, _)| *k == key) {
        entry.1 += weight;
    } else {
        tally.push((key, weight));
    }
}

/// Highest-weight entry; insertion order breaks ties.
fn winner<K: Copy>(tally: &[(K, f64)]) -> Option<(K, f64)> {
    let mut best: Option<(K, f64)> = None;
    for &(k, w) in tally {
        match best {
            Some((_, bw)) if w <= bw => {}
            _ => best = Some((k, w)),
        }
    }
    best
}

/// Entry zone, stop and take-profit ladder from the long-timeframe ATR.
fn trade_levels(signal: Signal, close: f64, atr: f64) -> ((f64, f64), f64, Vec<f64>) {
    match signal {
        Signal::Buy => (
            (close - 0.5 * atr, close + 0.2 * atr),
            close - 2.0 * atr,
            vec![close + 1.5 * atr, close + 2.5 * atr, close + 4.0 * atr],
        ),
        Signal::Sell => (
            (close - 0.2 * atr, close + 0.5 * atr),
            close + 2.0 * atr,
            vec![close - 1.5 * atr, close - 2.5 * atr, close - 4.0 * atr],
        ),
        Signal::Hold => ((close, close), close, Vec::new()),
    }
}
