//! Bar input for the CLI: CSV files and a seeded synthetic random walk.

use std::path::Path;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;
use tracing::warn;

use quorum_core::domain::{MarketBar, MarketSeries};

#[derive(Debug, Deserialize)]
struct BarRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

/// RFC 3339 timestamp, or a plain `YYYY-MM-DD` date at midnight UTC.
fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .with_context(|| format!("unrecognized timestamp '{raw}'"))?;
    match date.and_hms_opt(0, 0, 0) {
        Some(naive) => Ok(Utc.from_utc_datetime(&naive)),
        None => bail!("unrecognized timestamp '{raw}'"),
    }
}

/// Read `timestamp,open,high,low,close,volume` rows.
///
/// Bars failing the OHLCV sanity check are dropped by `MarketSeries::new`;
/// the count is logged.
pub fn load_csv(path: &Path) -> Result<MarketSeries> {
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open bars file {}", path.display()))?;
    let mut bars = Vec::new();
    for (i, row) in reader.deserialize::<BarRow>().enumerate() {
        let row = row.with_context(|| format!("bad row {} in {}", i + 1, path.display()))?;
        bars.push(MarketBar::new(
            parse_timestamp(row.timestamp.trim())?,
            row.open,
            row.high,
            row.low,
            row.close,
            row.volume,
        ));
    }
    let series = MarketSeries::new(bars);
    if series.rejected() > 0 {
        warn!(
            rejected = series.rejected(),
            file = %path.display(),
            "invalid bars dropped"
        );
    }
    Ok(series)
}

/// Daily random walk starting at 100, deterministic for a given seed.
pub fn random_walk(n: usize, seed: u64, start: DateTime<Utc>) -> Vec<MarketBar> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut price = 100.0_f64;
    let mut bars = Vec::with_capacity(n);
    for i in 0..n {
        let daily_return: f64 = rng.gen_range(-0.02..0.02);
        let open = price;
        let close = price * (1.0 + daily_return);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
        let volume = rng.gen_range(500_000.0..5_000_000.0);
        bars.push(MarketBar::new(
            start + Duration::days(i as i64),
            open,
            high,
            low,
            close,
            volume,
        ));
        price = close;
    }
    bars
}
