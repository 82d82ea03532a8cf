//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = alpha * x[t] + (1 - alpha) * EMA[t-1], alpha = 2 / (period + 1).
//! Seed: SMA of the first `period` values.
//! Output length: n - period + 1.

pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    if period == 0 || n < period {
        return Vec::new();
    }

    let alpha = 2.0 / (period as f64 + 1.0);
    let seed = values[..period].iter().sum::<f64>() / period as f64;

    let mut result = Vec::with_capacity(n - period + 1);
    result.push(seed);

    let mut prev = seed;
    for &x in &values[period..] {
        prev = alpha * x + (1.0 - alpha) * prev;
        result.push(prev);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn ema_seed_is_sma() {
        let result = ema(&[10.0, 11.0, 12.0], 3);
        assert_eq!(result.len(), 1);
        assert_approx(result[0], 11.0, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_recursion() {
        // period 3 → alpha 0.5; seed 11, next = 0.5*13 + 0.5*11 = 12
        let result = ema(&[10.0, 11.0, 12.0, 13.0], 3);
        assert_approx(result[1], 12.0, DEFAULT_EPSILON);
    }

    #[test]
    fn ema_constant_series_is_constant() {
        let result = ema(&[50.0; 20], 5);
        assert_eq!(result.len(), 16);
        assert!(result.iter().all(|v| (v - 50.0).abs() < DEFAULT_EPSILON));
    }

    #[test]
    fn ema_too_few_points() {
        assert!(ema(&[1.0, 2.0], 3).is_empty());
    }
}
