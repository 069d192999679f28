//! Market data access port trait.

use chrono::{DateTime, Utc};

use crate::domain::candle::{CandleSeries, Timeframe};
use crate::domain::error::TradekitError;

pub trait MarketDataPort {
    /// Fetch a validated candle series for one pair and timeframe.
    /// `None` bounds are open.
    fn fetch_candles(
        &self,
        pair: &str,
        timeframe: Timeframe,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<CandleSeries, TradekitError>;

    fn list_pairs(&self) -> Result<Vec<String>, TradekitError>;

    /// First/last timestamp and candle count, or `None` when no data exists.
    fn data_range(
        &self,
        pair: &str,
        timeframe: Timeframe,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, TradekitError>;
}
