//! Bollinger Bands — moving average +/- standard deviation multiplier.
//!
//! - Middle: SMA(period)
//! - Upper: middle + k * stddev(period)
//! - Lower: middle - k * stddev(period)
//!
//! Uses population stddev (divide by N).
//! Output length: n - period + 1 for each band.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BollingerBands {
    pub upper: Vec<f64>,
    pub middle: Vec<f64>,
    pub lower: Vec<f64>,
}

impl BollingerBands {
    pub fn is_empty(&self) -> bool {
        self.middle.is_empty()
    }
}

pub fn bollinger(values: &[f64], period: usize, std_devs: f64) -> BollingerBands {
    let n = values.len();
    if period == 0 || n < period {
        return BollingerBands::default();
    }

    let len = n - period + 1;
    let mut bands = BollingerBands {
        upper: Vec::with_capacity(len),
        middle: Vec::with_capacity(len),
        lower: Vec::with_capacity(len),
    };

    for window in values.windows(period) {
        let mean = super::stats::mean(window);
        let stddev = super::stats::std_dev(window);
        bands.middle.push(mean);
        bands.upper.push(mean + std_devs * stddev);
        bands.lower.push(mean - std_devs * stddev);
    }

    bands
}
