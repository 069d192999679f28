//! Strategy presets and validation.
//!
//! Strategies are fixed parameterized presets, not user scripts. Each
//! preset resolves to a per-bar signal via `StrategyEngine`, which
//! precomputes whatever indicator series the preset needs so the backtest
//! loop stays O(1) per bar for the classic presets.

use serde::{Deserialize, Serialize};

use crate::domain::candle::CandleSeries;
use crate::domain::decision::{AccountState, DecisionConfig, OscillatorReadings, decide};
use crate::domain::error::TradekitError;
use crate::domain::indicator::IndicatorSeries;
use crate::domain::indicator::sma::calculate_sma;
use crate::domain::pattern::detect_patterns;
use crate::domain::signal::Signal;
use crate::domain::snapshot::{IndicatorSnapshot, compute_snapshots};

/// Candle window handed to the pattern detector by the composite preset.
const COMPOSITE_PATTERN_WINDOW: usize = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StrategyKind {
    /// Enter long when the fast SMA crosses above the slow one, exit/short
    /// on the opposite cross.
    MaCrossover { fast: usize, slow: usize },
    /// Buy oversold, sell overbought.
    RsiReversion {
        period: usize,
        oversold: f64,
        overbought: f64,
    },
    /// Trade MACD histogram sign changes.
    MacdMomentum,
    /// Run the fusion engine per bar and act on its decisions.
    Composite { min_confidence: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum StopRule {
    None,
    Percent(f64),
    AtrMultiple(f64),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum TargetRule {
    None,
    Percent(f64),
    AtrMultiple(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestStrategy {
    pub name: String,
    pub kind: StrategyKind,
    pub stop_loss: StopRule,
    pub take_profit: TargetRule,
    /// Fraction of balance risked per trade, in (0, 1].
    pub risk_per_trade: f64,
    pub max_open_positions: usize,
}

impl BacktestStrategy {
    /// Fail-fast parameter validation, run before any simulation starts.
    pub fn validate(&self) -> Result<(), TradekitError> {
        if !(self.risk_per_trade > 0.0 && self.risk_per_trade <= 1.0) {
            return Err(TradekitError::StrategyInvalid {
                reason: format!(
                    "risk_per_trade must be in (0, 1], got {}",
                    self.risk_per_trade
                ),
            });
        }
        if self.max_open_positions == 0 {
            return Err(TradekitError::StrategyInvalid {
                reason: "max_open_positions must be at least 1".into(),
            });
        }
        match self.kind {
            StrategyKind::MaCrossover { fast, slow } => {
                if fast == 0 || slow == 0 || fast >= slow {
                    return Err(TradekitError::StrategyInvalid {
                        reason: format!("ma_crossover needs 0 < fast < slow, got {}/{}", fast, slow),
                    });
                }
            }
            StrategyKind::RsiReversion {
                period,
                oversold,
                overbought,
            } => {
                if period == 0 {
                    return Err(TradekitError::StrategyInvalid {
                        reason: "rsi period must be positive".into(),
                    });
                }
                if !(0.0..=100.0).contains(&oversold)
                    || !(0.0..=100.0).contains(&overbought)
                    || oversold >= overbought
                {
                    return Err(TradekitError::StrategyInvalid {
                        reason: format!(
                            "rsi thresholds need 0 <= oversold < overbought <= 100, got {}/{}",
                            oversold, overbought
                        ),
                    });
                }
            }
            StrategyKind::MacdMomentum => {}
            StrategyKind::Composite { min_confidence } => {
                if !(0.0..=100.0).contains(&min_confidence) {
                    return Err(TradekitError::StrategyInvalid {
                        reason: format!("min_confidence must be in [0, 100], got {}", min_confidence),
                    });
                }
            }
        }
        match self.stop_loss {
            StopRule::Percent(p) if p <= 0.0 => {
                return Err(TradekitError::StrategyInvalid {
                    reason: "stop_loss percent must be positive".into(),
                });
            }
            StopRule::AtrMultiple(m) if m <= 0.0 => {
                return Err(TradekitError::StrategyInvalid {
                    reason: "stop_loss atr multiple must be positive".into(),
                });
            }
            _ => {}
        }
        match self.take_profit {
            TargetRule::Percent(p) if p <= 0.0 => {
                return Err(TradekitError::StrategyInvalid {
                    reason: "take_profit percent must be positive".into(),
                });
            }
            TargetRule::AtrMultiple(m) if m <= 0.0 => {
                return Err(TradekitError::StrategyInvalid {
                    reason: "take_profit atr multiple must be positive".into(),
                });
            }
            _ => {}
        }
        Ok(())
    }
}

/// Precomputed per-series evaluation state for one strategy.
pub struct StrategyEngine<'a> {
    strategy: &'a BacktestStrategy,
    series: &'a CandleSeries,
    snapshots: Vec<IndicatorSnapshot>,
    fast_ma: Option<IndicatorSeries>,
    slow_ma: Option<IndicatorSeries>,
    rsi: Option<IndicatorSeries>,
}

impl<'a> StrategyEngine<'a> {
    pub fn new(strategy: &'a BacktestStrategy, series: &'a CandleSeries) -> StrategyEngine<'a> {
        let snapshots = compute_snapshots(series);
        let (fast_ma, slow_ma) = match strategy.kind {
            StrategyKind::MaCrossover { fast, slow } => (
                Some(calculate_sma(series.candles(), fast)),
                Some(calculate_sma(series.candles(), slow)),
            ),
            _ => (None, None),
        };
        let rsi = match strategy.kind {
            StrategyKind::RsiReversion { period, .. } => Some(
                crate::domain::indicator::rsi::calculate_rsi(series.candles(), period),
            ),
            _ => None,
        };
        StrategyEngine {
            strategy,
            series,
            snapshots,
            fast_ma,
            slow_ma,
            rsi,
        }
    }

    pub fn snapshots(&self) -> &[IndicatorSnapshot] {
        &self.snapshots
    }

    pub fn atr_at(&self, index: usize) -> Option<f64> {
        self.snapshots.get(index).and_then(|s| s.atr).map(|a| a.value)
    }

    /// The preset's signal on bar `index`. Warm-up bars always hold.
    pub fn signal_at(&self, index: usize) -> Signal {
        match self.strategy.kind {
            StrategyKind::MaCrossover { .. } => self.ma_crossover_signal(index),
            StrategyKind::RsiReversion {
                oversold,
                overbought,
                ..
            } => {
                let rsi = self.rsi.as_ref().and_then(|s| s.simple_at(index));
                match rsi {
                    Some(v) if v <= oversold => Signal::Buy,
                    Some(v) if v >= overbought => Signal::Sell,
                    _ => Signal::Hold,
                }
            }
            StrategyKind::MacdMomentum => self.macd_momentum_signal(index),
            StrategyKind::Composite { min_confidence } => {
                self.composite_signal(index, min_confidence)
            }
        }
    }

    fn ma_crossover_signal(&self, index: usize) -> Signal {
        if index == 0 {
            return Signal::Hold;
        }
        let (Some(fast), Some(slow)) = (self.fast_ma.as_ref(), self.slow_ma.as_ref()) else {
            return Signal::Hold;
        };
        let (Some(f_curr), Some(s_curr), Some(f_prev), Some(s_prev)) = (
            fast.simple_at(index),
            slow.simple_at(index),
            fast.simple_at(index - 1),
            slow.simple_at(index - 1),
        ) else {
            return Signal::Hold;
        };

        if f_curr > s_curr && f_prev <= s_prev {
            Signal::Buy
        } else if f_curr < s_curr && f_prev >= s_prev {
            Signal::Sell
        } else {
            Signal::Hold
        }
    }

    fn macd_momentum_signal(&self, index: usize) -> Signal {
        if index == 0 {
            return Signal::Hold;
        }
        let curr = self.snapshots.get(index).and_then(|s| s.macd);
        let prev = self.snapshots.get(index - 1).and_then(|s| s.macd);
        match (prev, curr) {
            (Some(p), Some(c)) if p.histogram <= 0.0 && c.histogram > 0.0 => Signal::Buy,
            (Some(p), Some(c)) if p.histogram >= 0.0 && c.histogram < 0.0 => Signal::Sell,
            _ => Signal::Hold,
        }
    }

    fn composite_signal(&self, index: usize, min_confidence: f64) -> Signal {
        let Some(snapshot) = self.snapshots.get(index) else {
            return Signal::Hold;
        };

        let start = (index + 1).saturating_sub(COMPOSITE_PATTERN_WINDOW);
        let window = self
            .series
            .window(
                Some(self.series.candles()[start].timestamp),
                Some(snapshot.timestamp),
            );
        let patterns = detect_patterns(&window);

        let readings = OscillatorReadings {
            close: snapshot.close,
            rsi: snapshot.rsi,
            macd_histogram: snapshot.macd.map(|m| m.histogram),
            atr: snapshot.atr.map(|a| a.value),
            timestamp: snapshot.timestamp,
        };
        let config = DecisionConfig {
            min_confidence,
            ..DecisionConfig::default()
        };
        let decision = decide(
            self.series.pair(),
            self.series.timeframe(),
            None,
            &patterns,
            None,
            &readings,
            &AccountState::default(),
            &config,
        );
        if decision.trading_signal.is_some() {
            decision.signal
        } else {
            Signal::Hold
        }
    }
}
