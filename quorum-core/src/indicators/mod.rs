//! Indicator library — pure numeric functions over a price or volume slice.
//!
//! Contract shared by every function here:
//! - fewer points than the indicator needs → empty `Vec` (insufficient data,
//!   never a panic);
//! - outputs are aligned to the tail of the input: the last element
//!   corresponds to the most recent input value;
//! - zero variance and zero division resolve to 0 instead of NaN/inf.

pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;
pub mod stats;
pub mod zscore;

pub use bollinger::{bollinger, BollingerBands};
pub use ema::ema;
pub use macd::{macd, MacdSeries};
pub use rsi::rsi;
pub use sma::sma;
pub use zscore::zscore;

/// Last value of an indicator series, if any.
pub fn last(series: &[f64]) -> Option<f64> {
    series.last().copied()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
