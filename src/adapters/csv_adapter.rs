//! CSV file market data adapter.
//!
//! Files are named `{PAIR}_{TIMEFRAME}.csv` under a base directory, columns
//! `timestamp,open,high,low,close,volume` with RFC 3339 or
//! `YYYY-MM-DD HH:MM:SS` timestamps. Rows are NOT sorted on load: the
//! series constructor rejects unordered or duplicated timestamps, because a
//! disordered file means the feed is corrupt.

use chrono::{DateTime, NaiveDateTime, Utc};
use std::fs;
use std::path::PathBuf;

use crate::domain::candle::{Candle, CandleSeries, Timeframe};
use crate::domain::error::TradekitError;
use crate::ports::market_data::MarketDataPort;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, pair: &str, timeframe: Timeframe) -> PathBuf {
        self.base_path.join(format!("{}_{}.csv", pair, timeframe))
    }
}

fn parse_timestamp(value: &str) -> Result<DateTime<Utc>, TradekitError> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc())
        .map_err(|e| TradekitError::Data {
            reason: format!("invalid timestamp {:?}: {}", value, e),
        })
}

fn parse_field(record: &csv::StringRecord, index: usize, name: &str) -> Result<f64, TradekitError> {
    record
        .get(index)
        .ok_or_else(|| TradekitError::Data {
            reason: format!("missing {} column", name),
        })?
        .parse()
        .map_err(|e| TradekitError::Data {
            reason: format!("invalid {} value: {}", name, e),
        })
}

impl MarketDataPort for CsvAdapter {
    fn fetch_candles(
        &self,
        pair: &str,
        timeframe: Timeframe,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<CandleSeries, TradekitError> {
        let path = self.csv_path(pair, timeframe);
        let content = fs::read_to_string(&path).map_err(|e| TradekitError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut candles = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| TradekitError::Data {
                reason: format!("CSV parse error: {}", e),
            })?;

            let timestamp_str = record.get(0).ok_or_else(|| TradekitError::Data {
                reason: "missing timestamp column".into(),
            })?;
            let timestamp = parse_timestamp(timestamp_str)?;

            if start.is_some_and(|s| timestamp < s) || end.is_some_and(|e| timestamp > e) {
                continue;
            }

            candles.push(Candle {
                timestamp,
                open: parse_field(&record, 1, "open")?,
                high: parse_field(&record, 2, "high")?,
                low: parse_field(&record, 3, "low")?,
                close: parse_field(&record, 4, "close")?,
                volume: parse_field(&record, 5, "volume")?,
            });
        }

        CandleSeries::new(pair, timeframe, candles)
    }

    fn list_pairs(&self) -> Result<Vec<String>, TradekitError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| TradekitError::Data {
            reason: format!("failed to read directory {}: {}", self.base_path.display(), e),
        })?;

        let mut pairs = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| TradekitError::Data {
                reason: format!("directory entry error: {}", e),
            })?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();

            if let Some(stem) = name_str.strip_suffix(".csv") {
                if let Some((pair, tf)) = stem.rsplit_once('_') {
                    if Timeframe::parse(tf).is_some() && !pairs.contains(&pair.to_string()) {
                        pairs.push(pair.to_string());
                    }
                }
            }
        }

        pairs.sort();
        Ok(pairs)
    }

    fn data_range(
        &self,
        pair: &str,
        timeframe: Timeframe,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>, usize)>, TradekitError> {
        match self.fetch_candles(pair, timeframe, None, None) {
            Ok(series) if !series.is_empty() => {
                let first = series.candles()[0].timestamp;
                let last = series.candles()[series.len() - 1].timestamp;
                Ok(Some((first, last, series.len())))
            }
            Ok(_) => Ok(None),
            Err(e) => Err(e),
        }
    }
}
