//! Crossover (dual MA) — golden/death crosses, with trend-continuation entries.
//!
//! A cross is fresh while it is at most `fresh_cross_bars - 1` bars old; its
//! confidence decays with age. Without a fresh cross the strategy only enters
//! on a pullback to the fast MA in the direction of the trend.

use serde::{Deserialize, Serialize};

use super::{require_period, require_range, StrategyConfigError};
use crate::domain::signal::directional;
use crate::domain::{Action, MarketSeries, Signal};
use crate::indicators::{ema, sma};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum MaType {
    #[default]
    Sma,
    Ema,
}

impl MaType {
    fn apply(self, values: &[f64], period: usize) -> Vec<f64> {
        match self {
            MaType::Sma => sma(values, period),
            MaType::Ema => ema(values, period),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossoverParams {
    pub fast_period: usize,
    pub slow_period: usize,
    pub ma_type: MaType,
    pub fresh_cross_bars: usize,
    /// Max distance from the fast MA, as a fraction, for a continuation entry.
    pub continuation_band: f64,
    pub stop_loss_pct: f64,
    /// Distance beyond the fast MA for the MA-based stop.
    pub ma_buffer: f64,
    pub take_profit_pct: f64,
}

impl Default for CrossoverParams {
    fn default() -> Self {
        Self {
            fast_period: 10,
            slow_period: 30,
            ma_type: MaType::Sma,
            fresh_cross_bars: 10,
            continuation_band: 0.01,
            stop_loss_pct: 0.03,
            ma_buffer: 0.02,
            take_profit_pct: 0.06,
        }
    }
}

impl CrossoverParams {
    pub fn min_bars(&self) -> usize {
        self.slow_period + 1
    }

    pub fn validate(&self) -> Result<(), StrategyConfigError> {
        require_period("fast_period", self.fast_period)?;
        require_period("fresh_cross_bars", self.fresh_cross_bars)?;
        if self.fast_period >= self.slow_period {
            return Err(StrategyConfigError::FastNotBelowSlow {
                fast: self.fast_period,
                slow: self.slow_period,
            });
        }
        require_range("continuation_band", self.continuation_band, 0.0, 1.0)?;
        require_range("stop_loss_pct", self.stop_loss_pct, 0.0, 1.0)?;
        require_range("ma_buffer", self.ma_buffer, 0.0, 1.0)?;
        require_range("take_profit_pct", self.take_profit_pct, 0.0, 10.0)?;
        Ok(())
    }
}

/// Most recent cross within `window` bars: (action, age in bars).
fn recent_cross(diff: &[f64], window: usize) -> Option<(Action, usize)> {
    let n = diff.len();
    (0..window.min(n.saturating_sub(1))).find_map(|age| {
        let i = n - 1 - age;
        if diff[i - 1] <= 0.0 && diff[i] > 0.0 {
            Some((Action::Buy, age))
        } else if diff[i - 1] >= 0.0 && diff[i] < 0.0 {
            Some((Action::Sell, age))
        } else {
            None
        }
    })
}

pub(crate) fn analyze(series: &MarketSeries, p: &CrossoverParams) -> Signal {
    let closes = series.closes();
    let price = closes[closes.len() - 1];

    let fast = p.ma_type.apply(&closes, p.fast_period);
    let slow = p.ma_type.apply(&closes, p.slow_period);
    if slow.len() < 2 || fast.len() < slow.len() {
        return Signal::hold("crossover_ma: moving averages unavailable");
    }
    let fast = &fast[fast.len() - slow.len()..];
    let diff: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
    let fast_now = fast[fast.len() - 1];
    let slow_now = slow[slow.len() - 1];

    let (action, confidence, reason) = match recent_cross(&diff, p.fresh_cross_bars) {
        Some((action, age)) => {
            let gap = ((fast_now - slow_now).abs() / slow_now * 10.0).min(0.15);
            let confidence = 0.75 - age as f64 * 0.02 + gap;
            let name = if action == Action::Buy {
                "Golden Cross"
            } else {
                "Death Cross"
            };
            (
                action,
                confidence,
                format!(
                    "crossover_ma: {name}: fast {fast_now:.2} vs slow {slow_now:.2}, \
                     {age} bars ago"
                ),
            )
        }
        None => {
            let distance = (price - fast_now).abs() / fast_now;
            let uptrend = fast_now > slow_now && price >= slow_now;
            let downtrend = fast_now < slow_now && price <= slow_now;
            if distance > p.continuation_band || !(uptrend || downtrend) {
                return Signal::hold(format!(
                    "crossover_ma: no fresh cross, price {:.1}% from fast MA",
                    distance * 100.0
                ));
            }
            let action = if uptrend { Action::Buy } else { Action::Sell };
            (
                action,
                0.5,
                format!(
                    "crossover_ma: trend continuation near fast MA ({:.2}% away)",
                    distance * 100.0
                ),
            )
        }
    };

    // Tighter of the fixed stop and the MA-buffer stop, if on the right side.
    let stop = match action {
        Action::Buy => {
            let fixed = price * (1.0 - p.stop_loss_pct);
            let ma_stop = fast_now * (1.0 - p.ma_buffer);
            if ma_stop < price {
                fixed.max(ma_stop)
            } else {
                fixed
            }
        }
        _ => {
            let fixed = price * (1.0 + p.stop_loss_pct);
            let ma_stop = fast_now * (1.0 + p.ma_buffer);
            if ma_stop > price {
                fixed.min(ma_stop)
            } else {
                fixed
            }
        }
    };
    let target = match action {
        Action::Buy => price * (1.0 + p.take_profit_pct),
        _ => price * (1.0 - p.take_profit_pct),
    };

    Signal::new(action, directional(confidence), 0.4, reason)
        .with_stop_loss(stop)
        .with_take_profit(target)
}
