//! Backtest performance metrics.
//!
//! A pure function of the trade ledger and equity curve; recomputed once
//! after the simulation pass and always re-derivable from the same inputs.
//!
//! Degenerate ratios follow one documented rule: profit factor equals gross
//! profit when there are wins but no losses (the finite all-win sentinel),
//! and 0 when there are neither. Sharpe and Sortino are 0 when the
//! deviation in the denominator is 0, Calmar is 0 when drawdown is 0.

use serde::{Deserialize, Serialize};

use crate::domain::candle::Timeframe;
use crate::domain::position::BacktestTrade;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub index: usize,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub equity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestMetrics {
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub breakeven: usize,
    /// Percent in [0, 100].
    pub win_rate: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub profit_factor: f64,
    pub total_return_pct: f64,
    pub annualized_return_pct: f64,
    /// Max peak-to-trough drop, percent in [0, 100].
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub calmar_ratio: f64,
    pub expectancy: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub avg_holding_hours: f64,
}

impl BacktestMetrics {
    pub fn zero() -> BacktestMetrics {
        BacktestMetrics {
            total_trades: 0,
            wins: 0,
            losses: 0,
            breakeven: 0,
            win_rate: 0.0,
            gross_profit: 0.0,
            gross_loss: 0.0,
            profit_factor: 0.0,
            total_return_pct: 0.0,
            annualized_return_pct: 0.0,
            max_drawdown_pct: 0.0,
            sharpe_ratio: 0.0,
            sortino_ratio: 0.0,
            calmar_ratio: 0.0,
            expectancy: 0.0,
            avg_win: 0.0,
            avg_loss: 0.0,
            largest_win: 0.0,
            largest_loss: 0.0,
            avg_holding_hours: 0.0,
        }
    }

    pub fn compute(
        trades: &[BacktestTrade],
        equity_curve: &[EquityPoint],
        initial_balance: f64,
        timeframe: Timeframe,
    ) -> BacktestMetrics {
        let mut metrics = BacktestMetrics::zero();

        let mut total_holding_bars = 0usize;
        for trade in trades {
            if trade.pnl > 0.0 {
                metrics.wins += 1;
                metrics.gross_profit += trade.pnl;
                if trade.pnl > metrics.largest_win {
                    metrics.largest_win = trade.pnl;
                }
            } else if trade.pnl < 0.0 {
                metrics.losses += 1;
                metrics.gross_loss += trade.pnl.abs();
                if trade.pnl.abs() > metrics.largest_loss {
                    metrics.largest_loss = trade.pnl.abs();
                }
            } else {
                metrics.breakeven += 1;
            }
            total_holding_bars += trade.holding_bars();
        }
        metrics.total_trades = trades.len();

        if metrics.total_trades > 0 {
            metrics.win_rate = metrics.wins as f64 / metrics.total_trades as f64 * 100.0;
            metrics.avg_holding_hours = total_holding_bars as f64
                / metrics.total_trades as f64
                * timeframe.minutes() as f64
                / 60.0;
        }
        if metrics.wins > 0 {
            metrics.avg_win = metrics.gross_profit / metrics.wins as f64;
        }
        if metrics.losses > 0 {
            metrics.avg_loss = metrics.gross_loss / metrics.losses as f64;
        }

        metrics.profit_factor = if metrics.gross_loss > 0.0 {
            metrics.gross_profit / metrics.gross_loss
        } else {
            // all-win sentinel: the gross profit itself, 0 when flat
            metrics.gross_profit
        };

        let win_rate_frac = metrics.win_rate / 100.0;
        let loss_rate_frac = if metrics.total_trades > 0 {
            metrics.losses as f64 / metrics.total_trades as f64
        } else {
            0.0
        };
        metrics.expectancy = metrics.avg_win * win_rate_frac - metrics.avg_loss * loss_rate_frac;

        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_balance);
        if initial_balance > 0.0 {
            metrics.total_return_pct = (final_equity - initial_balance) / initial_balance * 100.0;
        }

        let bars = equity_curve.len() as f64;
        let years = bars / timeframe.bars_per_year();
        if years > 0.0 && final_equity > 0.0 && initial_balance > 0.0 {
            let growth = final_equity / initial_balance;
            metrics.annualized_return_pct = (growth.powf(1.0 / years) - 1.0) * 100.0;
        }

        metrics.max_drawdown_pct = max_drawdown_pct(equity_curve);

        let (sharpe, sortino) = risk_adjusted(equity_curve, timeframe);
        metrics.sharpe_ratio = sharpe;
        metrics.sortino_ratio = sortino;

        metrics.calmar_ratio = if metrics.max_drawdown_pct > 0.0 {
            metrics.annualized_return_pct / metrics.max_drawdown_pct
        } else {
            0.0
        };

        metrics
    }
}

fn max_drawdown_pct(equity_curve: &[EquityPoint]) -> f64 {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0f64;
    for point in equity_curve {
        if point.equity > peak {
            peak = point.equity;
        } else if peak > 0.0 {
            let dd = (peak - point.equity) / peak * 100.0;
            if dd > max_dd {
                max_dd = dd;
            }
        }
    }
    max_dd
}

fn risk_adjusted(equity_curve: &[EquityPoint], timeframe: Timeframe) -> (f64, f64) {
    if equity_curve.len() < 2 {
        return (0.0, 0.0);
    }

    let returns: Vec<f64> = equity_curve
        .windows(2)
        .map(|w| {
            if w[0].equity > 0.0 {
                (w[1].equity - w[0].equity) / w[0].equity
            } else {
                0.0
            }
        })
        .collect();

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    let annualizer = timeframe.bars_per_year().sqrt();

    let sharpe = if stddev > 0.0 {
        mean / stddev * annualizer
    } else {
        0.0
    };

    let downside_variance = returns
        .iter()
        .filter(|&&r| r < 0.0)
        .map(|r| r * r)
        .sum::<f64>()
        / n;
    let downside_dev = downside_variance.sqrt();

    let sortino = if downside_dev > 0.0 {
        mean / downside_dev * annualizer
    } else {
        0.0
    };

    (sharpe, sortino)
}
