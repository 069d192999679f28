//! Sequential bar-by-bar backtest engine.
//!
//! Per-bar order: mark open positions to the close, check stop/take-profit
//! against the bar's high and low (stop first when both are breached
//! intrabar), act on the strategy signal, then append an equity point.
//! The run owns all of its mutable state; independent runs never share
//! anything, so parameter sweeps can execute in parallel.
//!
//! Trade `pnl` is price PnL only; commissions are accumulated separately,
//! so `final_balance = initial_balance + Σ pnl − Σ commission` holds to
//! floating-point tolerance.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::candle::CandleSeries;
use crate::domain::error::TradekitError;
use crate::domain::metrics::{BacktestMetrics, EquityPoint};
use crate::domain::position::{BacktestTrade, ExitReason, OpenPosition, Side};
use crate::domain::scheduler::CancelToken;
use crate::domain::signal::Signal;
use crate::domain::strategy::{BacktestStrategy, StopRule, StrategyEngine, TargetRule};

/// Progress callback cadence: once per percent of bars processed.
const PROGRESS_STRIDE_DIVISOR: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub strategy: BacktestStrategy,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub initial_balance: f64,
    pub leverage: f64,
    /// Flat commission per side, in account currency.
    pub commission: f64,
    /// Spread in price units, added against the entry.
    pub spread: f64,
    /// Fixed slippage offset in price units, always adverse.
    pub slippage: f64,
}

impl BacktestConfig {
    /// Fail-fast validation; nothing runs partially on a bad config.
    pub fn validate(&self) -> Result<(), TradekitError> {
        self.strategy.validate()?;
        if self.initial_balance <= 0.0 {
            return Err(TradekitError::ConfigInvalid {
                section: "backtest".into(),
                key: "initial_balance".into(),
                reason: "initial_balance must be positive".into(),
            });
        }
        if self.leverage < 1.0 {
            return Err(TradekitError::ConfigInvalid {
                section: "backtest".into(),
                key: "leverage".into(),
                reason: "leverage must be at least 1".into(),
            });
        }
        for (key, value) in [
            ("commission", self.commission),
            ("spread", self.spread),
            ("slippage", self.slippage),
        ] {
            if value < 0.0 {
                return Err(TradekitError::ConfigInvalid {
                    section: "backtest".into(),
                    key: key.into(),
                    reason: format!("{} must be non-negative", key),
                });
            }
        }
        if let (Some(start), Some(end)) = (self.start, self.end) {
            if start >= end {
                return Err(TradekitError::ConfigInvalid {
                    section: "backtest".into(),
                    key: "start".into(),
                    reason: "start must be before end".into(),
                });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BacktestStatus {
    Completed,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    pub status: BacktestStatus,
    pub trades: Vec<BacktestTrade>,
    pub equity_curve: Vec<EquityPoint>,
    pub metrics: BacktestMetrics,
    pub initial_balance: f64,
    pub final_balance: f64,
    pub total_commission: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub processed: usize,
    pub total: usize,
    pub percent: f64,
}

/// Optional per-run hooks. The progress callback is the only side effect
/// permitted mid-run and must not touch engine state.
#[derive(Default)]
pub struct BacktestHooks<'a> {
    pub progress: Option<&'a mut dyn FnMut(Progress)>,
    pub cancel: Option<&'a CancelToken>,
}

pub fn run_backtest(
    series: &CandleSeries,
    config: &BacktestConfig,
    mut hooks: BacktestHooks<'_>,
) -> Result<BacktestResult, TradekitError> {
    config.validate()?;

    let window = series.window(config.start, config.end);
    let candles = window.candles();
    let total = candles.len();

    let engine = StrategyEngine::new(&config.strategy, &window);

    let mut balance = config.initial_balance;
    let mut total_commission = 0.0;
    let mut open_positions: Vec<OpenPosition> = Vec::new();
    let mut trades: Vec<BacktestTrade> = Vec::new();
    let mut equity_curve: Vec<EquityPoint> = Vec::with_capacity(total);
    let mut status = BacktestStatus::Completed;

    let stride = (total / PROGRESS_STRIDE_DIVISOR).max(1);

    for (i, candle) in candles.iter().enumerate() {
        if let Some(cancel) = hooks.cancel {
            if cancel.is_cancelled() {
                debug!(bar = i, "backtest cancelled");
                status = BacktestStatus::Cancelled;
                break;
            }
        }

        // 1. resolve stop/take-profit against the bar's full range;
        //    a double breach closes at the stop
        let mut still_open = Vec::with_capacity(open_positions.len());
        for position in open_positions.drain(..) {
            let stop = position.stop_hit(candle);
            let take = position.take_profit_hit(candle);
            if stop {
                let raw = position.stop_loss.unwrap_or(candle.close);
                let price = exit_price(position.side, raw, config.slippage);
                close_position(
                    &mut trades,
                    &mut balance,
                    &mut total_commission,
                    position,
                    price,
                    i,
                    candle.timestamp,
                    ExitReason::StopLoss,
                    config.commission,
                );
            } else if take {
                let raw = position.take_profit.unwrap_or(candle.close);
                let price = exit_price(position.side, raw, config.slippage);
                close_position(
                    &mut trades,
                    &mut balance,
                    &mut total_commission,
                    position,
                    price,
                    i,
                    candle.timestamp,
                    ExitReason::TakeProfit,
                    config.commission,
                );
            } else {
                still_open.push(position);
            }
        }
        open_positions = still_open;

        // 2. act on the strategy's signal at this bar
        let signal = engine.signal_at(i);
        match signal {
            Signal::Buy | Signal::Sell => {
                let entry_side = if signal == Signal::Buy {
                    Side::Long
                } else {
                    Side::Short
                };

                // opposite signal closes positions on the other side
                let mut keep = Vec::with_capacity(open_positions.len());
                for position in open_positions.drain(..) {
                    if position.side != entry_side {
                        let price = exit_price(position.side, candle.close, config.slippage);
                        close_position(
                            &mut trades,
                            &mut balance,
                            &mut total_commission,
                            position,
                            price,
                            i,
                            candle.timestamp,
                            ExitReason::OppositeSignal,
                            config.commission,
                        );
                    } else {
                        keep.push(position);
                    }
                }
                open_positions = keep;

                // no entries on the final bar: there would be nothing left
                // to close them against
                if i + 1 < total && open_positions.len() < config.strategy.max_open_positions {
                    if let Some(position) =
                        build_entry(&engine, &window, config, entry_side, i, balance)
                    {
                        balance -= config.commission;
                        total_commission += config.commission;
                        open_positions.push(position);
                    }
                }
            }
            Signal::Hold => {}
        }

        // 3. mark to the close and record the equity point
        let unrealized: f64 = open_positions
            .iter()
            .map(|p| p.unrealized_pnl(candle.close))
            .sum();
        equity_curve.push(EquityPoint {
            index: i,
            timestamp: candle.timestamp,
            equity: balance + unrealized,
        });

        if let Some(progress) = hooks.progress.as_mut() {
            if (i + 1) % stride == 0 || i + 1 == total {
                progress(Progress {
                    processed: i + 1,
                    total,
                    percent: (i + 1) as f64 / total as f64 * 100.0,
                });
            }
        }
    }

    // force-close whatever is still open at the last processed bar
    let last_index = equity_curve.len().saturating_sub(1);
    if let Some(last) = candles.get(last_index) {
        for position in open_positions.drain(..) {
            close_position(
                &mut trades,
                &mut balance,
                &mut total_commission,
                position,
                last.close,
                last_index,
                last.timestamp,
                ExitReason::EndOfData,
                config.commission,
            );
        }
        // the final equity point reflects the forced closes
        if let Some(point) = equity_curve.last_mut() {
            point.equity = balance;
        }
    }

    let metrics = BacktestMetrics::compute(
        &trades,
        &equity_curve,
        config.initial_balance,
        window.timeframe(),
    );

    Ok(BacktestResult {
        status,
        trades,
        equity_curve,
        metrics,
        initial_balance: config.initial_balance,
        final_balance: balance,
        total_commission,
    })
}

/// Exit prices move against the trader by the slippage offset.
fn exit_price(side: Side, raw: f64, slippage: f64) -> f64 {
    match side {
        Side::Long => raw - slippage,
        Side::Short => raw + slippage,
    }
}

#[allow(clippy::too_many_arguments)]
fn close_position(
    trades: &mut Vec<BacktestTrade>,
    balance: &mut f64,
    total_commission: &mut f64,
    position: OpenPosition,
    exit_price: f64,
    exit_index: usize,
    exit_time: DateTime<Utc>,
    reason: ExitReason,
    commission: f64,
) {
    let pnl = position.unrealized_pnl(exit_price);
    *balance += pnl - commission;
    *total_commission += commission;
    trades.push(BacktestTrade {
        side: position.side,
        entry_price: position.entry_price,
        exit_price,
        units: position.units,
        pnl,
        reason,
        entry_index: position.entry_index,
        exit_index,
        entry_time: position.entry_time,
        exit_time,
    });
}

/// Size and open a position at this bar's close, with spread and slippage
/// against the entry. Returns `None` when the position cannot be sized
/// (zero risk distance, ATR still warming up for an ATR stop, or a
/// non-positive size after the leverage cap).
fn build_entry(
    engine: &StrategyEngine<'_>,
    series: &CandleSeries,
    config: &BacktestConfig,
    side: Side,
    index: usize,
    balance: f64,
) -> Option<OpenPosition> {
    let candle = &series.candles()[index];
    let adverse = config.spread / 2.0 + config.slippage;
    let entry_price = match side {
        Side::Long => candle.close + adverse,
        Side::Short => candle.close - adverse,
    };
    if entry_price <= 0.0 {
        return None;
    }

    let atr = engine.atr_at(index);
    let stop_distance = match config.strategy.stop_loss {
        StopRule::None => None,
        StopRule::Percent(pct) => Some(entry_price * pct / 100.0),
        StopRule::AtrMultiple(mult) => Some(atr? * mult),
    };
    let target_distance = match config.strategy.take_profit {
        TargetRule::None => None,
        TargetRule::Percent(pct) => Some(entry_price * pct / 100.0),
        TargetRule::AtrMultiple(mult) => Some(atr? * mult),
    };

    let risk_amount = balance * config.strategy.risk_per_trade;
    let units = match stop_distance {
        Some(distance) if distance > 0.0 => risk_amount / distance,
        Some(_) => return None,
        // no stop: fall back to notional sizing
        None => risk_amount / entry_price,
    };

    let max_units = balance * config.leverage / entry_price;
    let units = units.min(max_units);
    if units <= 0.0 {
        return None;
    }

    let (stop_loss, take_profit) = match side {
        Side::Long => (
            stop_distance.map(|d| entry_price - d),
            target_distance.map(|d| entry_price + d),
        ),
        Side::Short => (
            stop_distance.map(|d| entry_price + d),
            target_distance.map(|d| entry_price - d),
        ),
    };

    Some(OpenPosition {
        side,
        entry_price,
        units,
        entry_index: index,
        entry_time: candle.timestamp,
        stop_loss,
        take_profit,
    })
}
