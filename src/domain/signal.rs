//! Trading signal types.
//!
//! `Signal` is a closed enum and every consumer matches it exhaustively:
//! there is no silent fall-through to hold anywhere in the crate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::candle::Timeframe;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

impl Signal {
    pub fn opposite(&self) -> Signal {
        match self {
            Signal::Buy => Signal::Sell,
            Signal::Sell => Signal::Buy,
            Signal::Hold => Signal::Hold,
        }
    }

    pub fn is_actionable(&self) -> bool {
        !matches!(self, Signal::Hold)
    }
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Signal::Buy => "buy",
            Signal::Sell => "sell",
            Signal::Hold => "hold",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalStrength {
    Weak,
    Moderate,
    Strong,
}

impl SignalStrength {
    /// Bucket a fused confidence value.
    pub fn from_confidence(confidence: f64) -> SignalStrength {
        if confidence >= 80.0 {
            SignalStrength::Strong
        } else if confidence >= 65.0 {
            SignalStrength::Moderate
        } else {
            SignalStrength::Weak
        }
    }
}

/// Lifecycle owned by the external caller; the core only ever creates
/// signals in `Active` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalStatus {
    Active,
    Executed,
    Expired,
    Cancelled,
}

/// The fused decision emitted by the decision engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingSignal {
    pub pair: String,
    pub signal: Signal,
    pub strength: SignalStrength,
    pub entry_price: f64,
    pub stop_loss: f64,
    pub take_profits: Vec<f64>,
    pub confidence: f64,
    pub reasoning: Vec<String>,
    pub timeframe: Timeframe,
    pub timestamp: DateTime<Utc>,
    pub status: SignalStatus,
}
