//! Moving Average Convergence Divergence (MACD).
//!
//! - MACD line: EMA(fast) - EMA(slow)
//! - Signal line: EMA(signal) of the MACD line
//! - Histogram: MACD line - signal line
//!
//! The three series are tail-aligned but not equally long: the MACD line
//! starts `signal - 1` points before the signal line and the histogram.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MacdSeries {
    pub macd: Vec<f64>,
    pub signal: Vec<f64>,
    pub histogram: Vec<f64>,
}

impl MacdSeries {
    pub fn is_empty(&self) -> bool {
        self.histogram.is_empty()
    }
}

/// MACD over `values`. Returns an empty series when `fast >= slow`, any period
/// is zero, or there are fewer than `slow + signal - 1` points.
pub fn macd(values: &[f64], fast: usize, slow: usize, signal: usize) -> MacdSeries {
    if fast == 0 || signal == 0 || fast >= slow || values.len() < slow + signal - 1 {
        return MacdSeries::default();
    }

    let fast_ema = super::ema(values, fast);
    let slow_ema = super::ema(values, slow);
    let offset = slow - fast;

    let macd_line: Vec<f64> = slow_ema
        .iter()
        .enumerate()
        .map(|(i, s)| fast_ema[i + offset] - s)
        .collect();

    let signal_line = super::ema(&macd_line, signal);
    let skip = macd_line.len() - signal_line.len();
    let histogram = macd_line[skip..]
        .iter()
        .zip(&signal_line)
        .map(|(m, s)| m - s)
        .collect();

    MacdSeries {
        macd: macd_line,
        signal: signal_line,
        histogram,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    fn ramp(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 + i as f64).collect()
    }

    #[test]
    fn lengths_are_tail_aligned() {
        let m = macd(&ramp(40), 12, 26, 9);
        assert_eq!(m.macd.len(), 40 - 26 + 1);
        assert_eq!(m.signal.len(), m.macd.len() - 8);
        assert_eq!(m.histogram.len(), m.signal.len());
    }

    #[test]
    fn rising_series_has_positive_macd() {
        let m = macd(&ramp(60), 12, 26, 9);
        assert!(m.macd.iter().all(|&v| v > 0.0));
    }

    #[test]
    fn constant_series_is_flat() {
        let m = macd(&[42.0; 50], 12, 26, 9);
        assert!(m.histogram.iter().all(|v| v.abs() < DEFAULT_EPSILON));
    }

    #[test]
    fn histogram_is_macd_minus_signal() {
        let values: Vec<f64> = (0..60).map(|i| 100.0 + (i as f64 * 0.3).sin() * 5.0).collect();
        let m = macd(&values, 12, 26, 9);
        let last = m.histogram.len() - 1;
        assert_approx(
            m.histogram[last],
            m.macd[m.macd.len() - 1] - m.signal[last],
            DEFAULT_EPSILON,
        );
    }

    #[test]
    fn insufficient_or_invalid_is_empty() {
        assert!(macd(&ramp(30), 12, 26, 9).is_empty());
        assert!(macd(&ramp(100), 26, 12, 9).is_empty());
        assert!(macd(&ramp(100), 0, 26, 9).is_empty());
    }
}
