//! MarketBar and MarketSeries — the market data units every strategy consumes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV bar for a single symbol at a single timestamp.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketBar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Why a bar was rejected by `MarketBar::check`.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BarError {
    #[error("non-finite value in bar at {0}")]
    NonFinite(DateTime<Utc>),
    #[error("non-positive price in bar at {0}")]
    NonPositivePrice(DateTime<Utc>),
    #[error("inconsistent OHLC range in bar at {0}")]
    InconsistentRange(DateTime<Utc>),
    #[error("negative volume in bar at {0}")]
    NegativeVolume(DateTime<Utc>),
}

impl MarketBar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// OHLCV sanity check: finite, positive prices, high/low enclose open/close.
    pub fn check(&self) -> Result<(), BarError> {
        let values = [self.open, self.high, self.low, self.close, self.volume];
        if values.iter().any(|v| !v.is_finite()) {
            return Err(BarError::NonFinite(self.timestamp));
        }
        if self.open <= 0.0 || self.high <= 0.0 || self.low <= 0.0 || self.close <= 0.0 {
            return Err(BarError::NonPositivePrice(self.timestamp));
        }
        if self.high < self.low
            || self.high < self.open.max(self.close)
            || self.low > self.open.min(self.close)
        {
            return Err(BarError::InconsistentRange(self.timestamp));
        }
        if self.volume < 0.0 {
            return Err(BarError::NegativeVolume(self.timestamp));
        }
        Ok(())
    }

    pub fn is_sane(&self) -> bool {
        self.check().is_ok()
    }
}

/// A validated, timestamp-ascending bar series.
///
/// Construction sorts by timestamp, keeps the last bar for duplicate
/// timestamps and drops bars that fail `MarketBar::check`. Strategies only
/// accept `&MarketSeries`, so they never see an unordered series.
/// Serializes as a plain bar list; deserializing goes through `new`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<MarketBar>", into = "Vec<MarketBar>")]
pub struct MarketSeries {
    bars: Vec<MarketBar>,
    rejected: usize,
}

impl MarketSeries {
    pub fn new(mut bars: Vec<MarketBar>) -> Self {
        let before = bars.len();
        bars.retain(MarketBar::is_sane);
        // Stable sort keeps arrival order among equal timestamps, so the
        // dedup below keeps the last one that arrived.
        bars.sort_by_key(|b| b.timestamp);
        let mut deduped: Vec<MarketBar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match deduped.last_mut() {
                Some(last) if last.timestamp == bar.timestamp => *last = bar,
                _ => deduped.push(bar),
            }
        }
        let rejected = before - deduped.len();
        Self {
            bars: deduped,
            rejected,
        }
    }

    pub fn bars(&self) -> &[MarketBar] {
        &self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Number of input bars dropped as invalid or duplicate.
    pub fn rejected(&self) -> usize {
        self.rejected
    }

    pub fn last(&self) -> Option<&MarketBar> {
        self.bars.last()
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn volumes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.volume).collect()
    }
}

impl From<Vec<MarketBar>> for MarketSeries {
    fn from(bars: Vec<MarketBar>) -> Self {
        Self::new(bars)
    }
}

impl From<MarketSeries> for Vec<MarketBar> {
    fn from(series: MarketSeries) -> Self {
        series.bars
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn ts(i: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap() + Duration::days(i)
    }

    fn sample_bar(i: i64, close: f64) -> MarketBar {
        MarketBar::new(ts(i), close, close + 1.0, close - 1.0, close, 1_000.0)
    }

    #[test]
    fn bar_is_sane() {
        assert!(sample_bar(0, 100.0).is_sane());
    }

    #[test]
    fn bar_detects_nan() {
        let mut bar = sample_bar(0, 100.0);
        bar.open = f64::NAN;
        assert_eq!(bar.check(), Err(BarError::NonFinite(ts(0))));
    }

    #[test]
    fn bar_detects_inverted_range() {
        let mut bar = sample_bar(0, 100.0);
        bar.high = 98.0;
        assert!(matches!(bar.check(), Err(BarError::InconsistentRange(_))));
    }

    #[test]
    fn series_sorts_by_timestamp() {
        let series = MarketSeries::new(vec![
            sample_bar(2, 102.0),
            sample_bar(0, 100.0),
            sample_bar(1, 101.0),
        ]);
        assert_eq!(series.closes(), vec![100.0, 101.0, 102.0]);
        assert_eq!(series.rejected(), 0);
    }

    #[test]
    fn series_keeps_last_duplicate_and_drops_invalid() {
        let mut bad = sample_bar(3, 50.0);
        bad.close = -1.0;
        let series = MarketSeries::new(vec![
            sample_bar(0, 100.0),
            sample_bar(1, 101.0),
            sample_bar(1, 111.0),
            bad,
        ]);
        assert_eq!(series.closes(), vec![100.0, 111.0]);
        assert_eq!(series.rejected(), 2);
    }

    #[test]
    fn deserialized_series_is_sorted_and_validated() {
        let mut bad = sample_bar(2, 60.0);
        bad.close = -5.0;
        bad.volume = -1.0;
        let json = serde_json::to_string(&vec![
            sample_bar(1, 100.0),
            sample_bar(0, 50.0),
            bad,
        ])
        .unwrap();

        let series: MarketSeries = serde_json::from_str(&json).unwrap();
        assert_eq!(series.closes(), vec![50.0, 100.0]);
        assert_eq!(series.rejected(), 1);

        let again: MarketSeries =
            serde_json::from_str(&serde_json::to_string(&series).unwrap()).unwrap();
        assert_eq!(again.bars(), series.bars());
    }

    #[test]
    fn bar_serialization_roundtrip() {
        let bar = sample_bar(0, 100.0);
        let json = serde_json::to_string(&bar).unwrap();
        let deser: MarketBar = serde_json::from_str(&json).unwrap();
        assert_eq!(bar, deser);
    }
}
