//! Simple Moving Average (SMA).
//!
//! Rolling mean over a lookback window.
//! Output length: n - period + 1 (first value covers values[0..period]).

/// Rolling mean of `values` over `period` points.
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    if period == 0 || n < period {
        return Vec::new();
    }

    let mut result = Vec::with_capacity(n - period + 1);
    let mut sum: f64 = values[..period].iter().sum();
    result.push(sum / period as f64);

    // Roll the window forward
    for i in period..n {
        sum += values[i] - values[i - period];
        result.push(sum / period as f64);
    }

    result
}
