//! Rolling z-score: how many standard deviations the latest value in each
//! window sits from the window mean. Zero variance → 0.
//! Output length: n - period + 1.

pub fn zscore(values: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || values.len() < period {
        return Vec::new();
    }

    values
        .windows(period)
        .map(|window| {
            let mean = super::stats::mean(window);
            let sd = super::stats::std_dev(window);
            if sd > f64::EPSILON {
                (window[period - 1] - mean) / sd
            } else {
                0.0
            }
        })
        .collect()
}
