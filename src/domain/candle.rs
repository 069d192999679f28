//! OHLCV candle representation, validated series, and timeframes.
//!
//! A `CandleSeries` is the ingestion boundary for the whole engine: ordering
//! violations and duplicate timestamps are rejected here, because every
//! downstream metric assumes a strictly ascending series.

use chrono::{DateTime, Duration, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::error::TradekitError;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// (high + low + close) / 3
    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }

    pub fn range(&self) -> f64 {
        self.high - self.low
    }

    pub fn body(&self) -> f64 {
        (self.close - self.open).abs()
    }

    pub fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    pub fn upper_wick(&self) -> f64 {
        self.high - self.open.max(self.close)
    }

    pub fn lower_wick(&self) -> f64 {
        self.open.min(self.close) - self.low
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    M5,
    M15,
    M30,
    H1,
    H4,
    D1,
    W1,
}

impl Timeframe {
    pub fn minutes(&self) -> i64 {
        match self {
            Timeframe::M5 => 5,
            Timeframe::M15 => 15,
            Timeframe::M30 => 30,
            Timeframe::H1 => 60,
            Timeframe::H4 => 240,
            Timeframe::D1 => 1440,
            Timeframe::W1 => 10080,
        }
    }

    pub fn duration(&self) -> Duration {
        Duration::minutes(self.minutes())
    }

    /// Bars per calendar year for a continuously traded market.
    pub fn bars_per_year(&self) -> f64 {
        365.0 * 24.0 * 60.0 / self.minutes() as f64
    }

    /// The medium and long timeframes conventionally paired with this one
    /// for multi-timeframe analysis. Undefined above H4.
    pub fn analysis_pair(&self) -> Option<(Timeframe, Timeframe)> {
        match self {
            Timeframe::M5 => Some((Timeframe::M15, Timeframe::H1)),
            Timeframe::M15 => Some((Timeframe::H1, Timeframe::H4)),
            Timeframe::M30 => Some((Timeframe::H1, Timeframe::D1)),
            Timeframe::H1 => Some((Timeframe::H4, Timeframe::D1)),
            Timeframe::H4 => Some((Timeframe::D1, Timeframe::W1)),
            Timeframe::D1 | Timeframe::W1 => None,
        }
    }

    pub fn parse(s: &str) -> Option<Timeframe> {
        match s.to_uppercase().as_str() {
            "M5" => Some(Timeframe::M5),
            "M15" => Some(Timeframe::M15),
            "M30" => Some(Timeframe::M30),
            "H1" => Some(Timeframe::H1),
            "H4" => Some(Timeframe::H4),
            "D1" => Some(Timeframe::D1),
            "W1" => Some(Timeframe::W1),
            _ => None,
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Timeframe::M5 => "M5",
            Timeframe::M15 => "M15",
            Timeframe::M30 => "M30",
            Timeframe::H1 => "H1",
            Timeframe::H4 => "H4",
            Timeframe::D1 => "D1",
            Timeframe::W1 => "W1",
        };
        write!(f, "{}", s)
    }
}

/// An ordered, duplicate-free candle series for one pair and timeframe.
/// Only serializable outward; rebuilding one goes through [`CandleSeries::new`]
/// so validation cannot be bypassed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandleSeries {
    pair: String,
    timeframe: Timeframe,
    candles: Vec<Candle>,
}

impl CandleSeries {
    /// Validates ordering on construction: timestamps must be strictly
    /// ascending. A violation means the feed is corrupt and every
    /// downstream result would be invalid, so this fails rather than sorts.
    pub fn new(
        pair: impl Into<String>,
        timeframe: Timeframe,
        candles: Vec<Candle>,
    ) -> Result<Self, TradekitError> {
        let pair = pair.into();
        for pair_of_candles in candles.windows(2) {
            let (prev, curr) = (&pair_of_candles[0], &pair_of_candles[1]);
            if curr.timestamp == prev.timestamp {
                return Err(TradekitError::CorruptSeries {
                    pair,
                    reason: format!("duplicate timestamp {}", curr.timestamp),
                });
            }
            if curr.timestamp < prev.timestamp {
                return Err(TradekitError::CorruptSeries {
                    pair,
                    reason: format!(
                        "timestamps out of order: {} after {}",
                        curr.timestamp, prev.timestamp
                    ),
                });
            }
        }
        Ok(Self {
            pair,
            timeframe,
            candles,
        })
    }

    pub fn pair(&self) -> &str {
        &self.pair
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn last(&self) -> Option<&Candle> {
        self.candles.last()
    }

    /// Sub-series restricted to `[start, end]` (inclusive). `None` bounds are
    /// open. The result shares this series' pair and timeframe.
    pub fn window(
        &self,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> CandleSeries {
        let candles = self
            .candles
            .iter()
            .filter(|c| {
                start.is_none_or(|s| c.timestamp >= s) && end.is_none_or(|e| c.timestamp <= e)
            })
            .copied()
            .collect();
        CandleSeries {
            pair: self.pair.clone(),
            timeframe: self.timeframe,
            candles,
        }
    }

    /// Aggregate into a coarser timeframe. Buckets are aligned to the epoch,
    /// open/close come from the first/last bar in the bucket, high/low are
    /// extremes, volume is summed.
    pub fn resample(&self, target: Timeframe) -> Result<CandleSeries, TradekitError> {
        if target.minutes() <= self.timeframe.minutes() {
            return Err(TradekitError::ConfigInvalid {
                section: "data".into(),
                key: "timeframe".into(),
                reason: format!("cannot resample {} to {}", self.timeframe, target),
            });
        }

        let bucket_secs = target.minutes() * 60;
        let mut out: Vec<Candle> = Vec::new();
        let mut current_bucket: Option<(i64, Candle)> = None;

        for candle in &self.candles {
            let bucket = candle.timestamp.timestamp().div_euclid(bucket_secs);
            match &mut current_bucket {
                Some((b, agg)) if *b == bucket => {
                    agg.high = agg.high.max(candle.high);
                    agg.low = agg.low.min(candle.low);
                    agg.close = candle.close;
                    agg.volume += candle.volume;
                }
                _ => {
                    if let Some((_, agg)) = current_bucket.take() {
                        out.push(agg);
                    }
                    let bucket_start = Utc
                        .timestamp_opt(bucket * bucket_secs, 0)
                        .single()
                        .unwrap_or(candle.timestamp);
                    current_bucket = Some((
                        bucket,
                        Candle {
                            timestamp: bucket_start,
                            ..*candle
                        },
                    ));
                }
            }
        }
        if let Some((_, agg)) = current_bucket {
            out.push(agg);
        }

        CandleSeries::new(self.pair.clone(), target, out)
    }

    /// Stable identity for cache keys: pair, timeframe and the shape of the
    /// data, not the full contents.
    pub fn fingerprint(&self) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.pair.hash(&mut hasher);
        self.timeframe.hash(&mut hasher);
        self.candles.len().hash(&mut hasher);
        if let Some(first) = self.candles.first() {
            first.timestamp.timestamp().hash(&mut hasher);
        }
        if let Some(last) = self.candles.last() {
            last.timestamp.timestamp().hash(&mut hasher);
            last.close.to_bits().hash(&mut hasher);
        }
        hasher.finish()
    }
}

/// True when `hour` falls inside the `[open, close)` UTC trading window.
/// Windows may wrap midnight (e.g. 22..6).
pub fn in_trading_hours(timestamp: DateTime<Utc>, open: u32, close: u32) -> bool {
    let hour = timestamp.hour();
    if open <= close {
        hour >= open && hour < close
    } else {
        hour >= open || hour < close
    }
}
