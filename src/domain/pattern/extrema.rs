//! Local extrema detection.
//!
//! A bar is a peak iff its high is strictly greater than every high within
//! ±window bars; troughs are symmetric on lows. Bars closer than `window`
//! to either end of the slice are never extrema.

use crate::domain::candle::Candle;

pub const DEFAULT_WINDOW: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtremumKind {
    Peak,
    Trough,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extremum {
    pub index: usize,
    pub price: f64,
    pub kind: ExtremumKind,
}

pub fn find_extrema(candles: &[Candle], window: usize) -> Vec<Extremum> {
    let mut extrema = Vec::new();
    if window == 0 || candles.len() < 2 * window + 1 {
        return extrema;
    }

    for i in window..candles.len() - window {
        let high = candles[i].high;
        let low = candles[i].low;

        let mut is_peak = true;
        let mut is_trough = true;
        for j in i - window..=i + window {
            if j == i {
                continue;
            }
            if candles[j].high >= high {
                is_peak = false;
            }
            if candles[j].low <= low {
                is_trough = false;
            }
            if !is_peak && !is_trough {
                break;
            }
        }

        if is_peak {
            extrema.push(Extremum {
                index: i,
                price: high,
                kind: ExtremumKind::Peak,
            });
        } else if is_trough {
            extrema.push(Extremum {
                index: i,
                price: low,
                kind: ExtremumKind::Trough,
            });
        }
    }

    extrema
}

pub fn peaks(extrema: &[Extremum]) -> Vec<Extremum> {
    extrema
        .iter()
        .filter(|e| e.kind == ExtremumKind::Peak)
        .copied()
        .collect()
}

pub fn troughs(extrema: &[Extremum]) -> Vec<Extremum> {
    extrema
        .iter()
        .filter(|e| e.kind == ExtremumKind::Trough)
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn make_candles(highs_lows: &[(f64, f64)]) -> Vec<Candle> {
        highs_lows
            .iter()
            .enumerate()
            .map(|(i, &(high, low))| Candle {
                timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
                    + Duration::hours(i as i64),
                open: (high + low) / 2.0,
                high,
                low,
                close: (high + low) / 2.0,
                volume: 1000.0,
            })
            .collect()
    }

    fn tent(center: usize, len: usize) -> Vec<(f64, f64)> {
        // prices rise to a single spike at `center`, then fall
        (0..len)
            .map(|i| {
                let dist = center.abs_diff(i) as f64;
                let high = 110.0 - dist;
                (high, high - 2.0)
            })
            .collect()
    }

    #[test]
    fn finds_single_peak() {
        let candles = make_candles(&tent(5, 11));
        let extrema = find_extrema(&candles, 5);

        let found_peaks = peaks(&extrema);
        assert_eq!(found_peaks.len(), 1);
        assert_eq!(found_peaks[0].index, 5);
        assert!((found_peaks[0].price - 110.0).abs() < f64::EPSILON);
    }

    #[test]
    fn finds_single_trough() {
        // prices fall to a single low at the center, then recover
        let rows: Vec<(f64, f64)> = (0..11)
            .map(|i| {
                let dist = 5usize.abs_diff(i) as f64;
                let low = 90.0 + dist;
                (low + 2.0, low)
            })
            .collect();
        let candles = make_candles(&rows);
        let extrema = find_extrema(&candles, 5);

        let found = troughs(&extrema);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].index, 5);
        assert!((found[0].price - 90.0).abs() < f64::EPSILON);
    }

    #[test]
    fn equal_highs_are_not_strict_peaks() {
        let rows = vec![(100.0, 98.0); 11];
        let candles = make_candles(&rows);
        assert!(find_extrema(&candles, 5).is_empty());
    }

    #[test]
    fn too_few_candles_returns_empty() {
        let candles = make_candles(&tent(2, 5));
        assert!(find_extrema(&candles, 5).is_empty());
    }

    #[test]
    fn edges_are_never_extrema() {
        // monotonic rise: the max is at the last bar, inside the edge margin
        let rows: Vec<(f64, f64)> = (0..12).map(|i| (100.0 + i as f64, 98.0 + i as f64)).collect();
        let candles = make_candles(&rows);
        assert!(peaks(&find_extrema(&candles, 5)).is_empty());
    }
}
