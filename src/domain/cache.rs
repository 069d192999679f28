//! Explicit indicator cache.
//!
//! Owned by the caller and passed by reference into whatever computes
//! indicators; there is no module-level cache anywhere in the crate.
//! Entries expire after a TTL measured against an injectable clock, and a
//! series can be invalidated explicitly when its data changes.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::indicator::{IndicatorSeries, IndicatorType};
use crate::domain::scheduler::Clock;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// `CandleSeries::fingerprint()` of the source data.
    pub fingerprint: u64,
    pub indicator: IndicatorType,
}

struct CacheEntry {
    stored_at: DateTime<Utc>,
    series: IndicatorSeries,
}

pub struct IndicatorCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: HashMap<CacheKey, CacheEntry>,
}

impl IndicatorCache {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> IndicatorCache {
        IndicatorCache {
            ttl,
            clock,
            entries: HashMap::new(),
        }
    }

    /// Cached series for `key`, or `compute` and store it. Expired entries
    /// are recomputed in place.
    pub fn get_or_compute(
        &mut self,
        key: CacheKey,
        compute: impl FnOnce() -> IndicatorSeries,
    ) -> IndicatorSeries {
        let now = self.clock.now();

        if let Some(entry) = self.entries.get(&key) {
            if now - entry.stored_at < self.ttl {
                return entry.series.clone();
            }
        }

        let series = compute();
        self.entries.insert(
            key,
            CacheEntry {
                stored_at: now,
                series: series.clone(),
            },
        );
        series
    }

    /// Drop every entry computed from the series with this fingerprint.
    pub fn invalidate(&mut self, fingerprint: u64) {
        self.entries.retain(|key, _| key.fingerprint != fingerprint);
    }

    pub fn purge_expired(&mut self) {
        let now = self.clock.now();
        let ttl = self.ttl;
        self.entries.retain(|_, entry| now - entry.stored_at < ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
