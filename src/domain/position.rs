//! Simulated position and trade records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::candle::Candle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Long,
    Short,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    OppositeSignal,
    EndOfData,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OpenPosition {
    pub side: Side,
    pub entry_price: f64,
    pub units: f64,
    pub entry_index: usize,
    pub entry_time: DateTime<Utc>,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
}

impl OpenPosition {
    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        match self.side {
            Side::Long => self.units * (price - self.entry_price),
            Side::Short => self.units * (self.entry_price - price),
        }
    }

    /// Stop breached anywhere inside the bar's high-low range.
    pub fn stop_hit(&self, bar: &Candle) -> bool {
        match (self.side, self.stop_loss) {
            (Side::Long, Some(stop)) => bar.low <= stop,
            (Side::Short, Some(stop)) => bar.high >= stop,
            (_, None) => false,
        }
    }

    /// Take-profit reached anywhere inside the bar's high-low range.
    pub fn take_profit_hit(&self, bar: &Candle) -> bool {
        match (self.side, self.take_profit) {
            (Side::Long, Some(tp)) => bar.high >= tp,
            (Side::Short, Some(tp)) => bar.low <= tp,
            (_, None) => false,
        }
    }
}

/// Immutable once created; the ledger is append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestTrade {
    pub side: Side,
    pub entry_price: f64,
    pub exit_price: f64,
    pub units: f64,
    /// Price PnL of the round trip; commissions are tracked separately.
    pub pnl: f64,
    pub reason: ExitReason,
    pub entry_index: usize,
    pub exit_index: usize,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
}

impl BacktestTrade {
    pub fn holding_bars(&self) -> usize {
        self.exit_index - self.entry_index
    }
}
