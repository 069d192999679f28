//! Signal fusion and trade decision engine.
//!
//! Inputs per evaluation cycle: an optional multi-timeframe result, an
//! optional pattern list, an optional ML prediction, and the raw oscillator
//! readings that are always present. Account limits are checked before any
//! fusion runs; a breached limit short-circuits to hold with the reason
//! logged and recorded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::domain::candle::{Timeframe, in_trading_hours};
use crate::domain::mtf::{Alignment, MultiTimeframeResult};
use crate::domain::pattern::DetectedPattern;
use crate::domain::predict::PredictionResult;
use crate::domain::signal::{Signal, SignalStatus, SignalStrength, TradingSignal};

/// Oscillator confirmation thresholds.
const RSI_OVERSOLD: f64 = 30.0;
const RSI_OVERBOUGHT: f64 = 70.0;

/// Stop and take-profit distances in ATR multiples.
pub const STOP_ATR_MULT: f64 = 2.0;
pub const TP_ATR_MULTS: [f64; 2] = [3.0, 5.0];

/// Consensus vote weights, in scoring order.
const MTF_VOTE_WEIGHT: f64 = 3.0;
const ML_VOTE_WEIGHT: f64 = 2.0;
const PATTERN_VOTE_WEIGHT: f64 = 2.0;
const OSCILLATOR_VOTE_WEIGHT: f64 = 1.0;

/// Per-source confirmation bonuses; disagreement always costs 10.
const MTF_AGREE_BONUS: f64 = 15.0;
const ML_AGREE_BONUS: f64 = 12.0;
const PATTERN_AGREE_BONUS: f64 = 10.0;
const OSCILLATOR_AGREE_BONUS: f64 = 5.0;
const DISAGREE_PENALTY: f64 = 10.0;

/// Raw per-bar readings, always available to the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OscillatorReadings {
    pub close: f64,
    pub rsi: Option<f64>,
    pub macd_histogram: Option<f64>,
    pub atr: Option<f64>,
    pub timestamp: DateTime<Utc>,
}

/// External rate limits enforced before fusion. `None` disables a check.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TradeLimits {
    pub max_daily_trades: Option<u32>,
    pub max_daily_loss: Option<f64>,
    /// UTC hour window `[open, close)`; may wrap midnight.
    pub trading_hours: Option<(u32, u32)>,
    pub max_open_positions: Option<usize>,
}

/// Caller-maintained account counters the limits are checked against.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AccountState {
    pub trades_today: u32,
    pub loss_today: f64,
    pub open_positions: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecisionConfig {
    pub min_confidence: f64,
    pub limits: TradeLimits,
}

impl Default for DecisionConfig {
    fn default() -> Self {
        Self {
            min_confidence: 65.0,
            limits: TradeLimits::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub signal: Signal,
    pub confidence: f64,
    pub reasoning: Vec<String>,
    /// Present only when the resolved signal is actionable and confidence
    /// clears the configured minimum.
    pub trading_signal: Option<TradingSignal>,
}

impl Decision {
    fn hold(reason: String) -> Decision {
        Decision {
            signal: Signal::Hold,
            confidence: 0.0,
            reasoning: vec![reason],
            trading_signal: None,
        }
    }
}

/// Run one fusion cycle.
#[allow(clippy::too_many_arguments)]
pub fn decide(
    pair: &str,
    timeframe: Timeframe,
    mtf: Option<&MultiTimeframeResult>,
    patterns: &[DetectedPattern],
    prediction: Option<&PredictionResult>,
    oscillators: &OscillatorReadings,
    account: &AccountState,
    config: &DecisionConfig,
) -> Decision {
    if let Some(reason) = check_limits(&config.limits, account, oscillators.timestamp) {
        info!(pair, %reason, "skipping evaluation");
        return Decision::hold(reason);
    }

    let mut reasoning = Vec::new();

    // collect votes in fixed order; earlier sources win ties
    let mut votes: Vec<(&'static str, Signal, f64, f64)> = Vec::new();

    if let Some(mtf_result) = mtf {
        votes.push((
            "mtf",
            mtf_result.overall_signal,
            MTF_VOTE_WEIGHT,
            MTF_AGREE_BONUS,
        ));
    }
    if let Some(pred) = prediction {
        if !pred.insufficient_data {
            votes.push((
                "ml",
                pred.direction.to_signal(),
                ML_VOTE_WEIGHT,
                ML_AGREE_BONUS,
            ));
        }
    }
    let top_pattern = patterns.iter().find(|p| p.signal.is_actionable());
    if let Some(pattern) = top_pattern {
        votes.push((
            "pattern",
            pattern.signal,
            PATTERN_VOTE_WEIGHT,
            PATTERN_AGREE_BONUS,
        ));
    }

    let rsi_signal = match oscillators.rsi {
        Some(rsi) if rsi <= RSI_OVERSOLD => Signal::Buy,
        Some(rsi) if rsi >= RSI_OVERBOUGHT => Signal::Sell,
        _ => Signal::Hold,
    };
    votes.push((
        "rsi",
        rsi_signal,
        OSCILLATOR_VOTE_WEIGHT,
        OSCILLATOR_AGREE_BONUS,
    ));

    let macd_signal = match oscillators.macd_histogram {
        Some(h) if h > 0.0 => Signal::Buy,
        Some(h) if h < 0.0 => Signal::Sell,
        _ => Signal::Hold,
    };
    votes.push((
        "macd",
        macd_signal,
        OSCILLATOR_VOTE_WEIGHT,
        OSCILLATOR_AGREE_BONUS,
    ));

    let consensus = resolve_consensus(&votes);

    let mut confidence: f64 = 50.0;

    if let Some(mtf_result) = mtf {
        let (delta, label) = match mtf_result.alignment {
            Alignment::Full => (20.0, "full"),
            Alignment::Partial => (10.0, "partial"),
            Alignment::Conflicting => (-15.0, "conflicting"),
        };
        confidence += delta;
        reasoning.push(format!("timeframe alignment {}", label));
    }

    for (source, signal, _, bonus) in &votes {
        if !signal.is_actionable() {
            continue;
        }
        if *signal == consensus {
            confidence += bonus;
            reasoning.push(format!("{} confirms {}", source, consensus));
        } else {
            confidence -= DISAGREE_PENALTY;
            reasoning.push(format!("{} disagrees ({})", source, signal));
        }
    }

    let confidence = confidence.clamp(0.0, 100.0);

    let trading_signal = if consensus.is_actionable() && confidence >= config.min_confidence {
        oscillators.atr.map(|atr| {
            let entry = oscillators.close;
            let (stop_loss, take_profits) = match consensus {
                Signal::Buy => (
                    entry - STOP_ATR_MULT * atr,
                    TP_ATR_MULTS.iter().map(|m| entry + m * atr).collect(),
                ),
                Signal::Sell => (
                    entry + STOP_ATR_MULT * atr,
                    TP_ATR_MULTS.iter().map(|m| entry - m * atr).collect(),
                ),
                Signal::Hold => (entry, Vec::new()),
            };
            TradingSignal {
                pair: pair.to_string(),
                signal: consensus,
                strength: SignalStrength::from_confidence(confidence),
                entry_price: entry,
                stop_loss,
                take_profits,
                confidence,
                reasoning: reasoning.clone(),
                timeframe,
                timestamp: oscillators.timestamp,
                status: SignalStatus::Active,
            }
        })
    } else {
        None
    };

    Decision {
        signal: consensus,
        confidence,
        reasoning,
        trading_signal,
    }
}

/// Highest weighted vote wins; earlier insertion wins ties; hold votes
/// carry no weight.
fn resolve_consensus(votes: &[(&'static str, Signal, f64, f64)]) -> Signal {
    let mut tally: Vec<(Signal, f64)> = Vec::new();
    for (_, signal, weight, _) in votes {
        if !signal.is_actionable() {
            continue;
        }
        if let Some(entry) = tally.iter_mut().find(|(s, _)| s == signal) {
            entry.1 += weight;
        } else {
            tally.push((*signal, *weight));
        }
    }

    let mut best: Option<(Signal, f64)> = None;
    for &(signal, weight) in &tally {
        match best {
            Some((_, bw)) if weight <= bw => {}
            _ => best = Some((signal, weight)),
        }
    }
    best.map(|(s, _)| s).unwrap_or(Signal::Hold)
}

fn check_limits(
    limits: &TradeLimits,
    account: &AccountState,
    timestamp: DateTime<Utc>,
) -> Option<String> {
    if let Some(max_trades) = limits.max_daily_trades {
        if account.trades_today >= max_trades {
            return Some(format!("daily trade limit reached ({})", max_trades));
        }
    }
    if let Some(max_loss) = limits.max_daily_loss {
        if account.loss_today >= max_loss {
            return Some(format!("daily loss limit reached ({:.2})", max_loss));
        }
    }
    if let Some((open, close)) = limits.trading_hours {
        if !in_trading_hours(timestamp, open, close) {
            return Some(format!("outside trading hours ({}-{})", open, close));
        }
    }
    if let Some(max_open) = limits.max_open_positions {
        if account.open_positions >= max_open {
            return Some(format!("max open positions reached ({})", max_open));
        }
    }
    None
}
