//! Statistical mean-reversion — rolling z-score with RSI confirmation,
//! adapted to the current volatility regime.
//!
//! The regime (annualized volatility of simple returns) picks the z-score
//! lookback, the entry threshold and how wide the stop sits. Before any of
//! that, an exhaustion guard refuses to fade a move that is still running:
//! large recent momentum or a steep regression trend forces HOLD.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{require_below, require_period, require_range, StrategyConfigError};
use crate::domain::signal::directional;
use crate::domain::{Action, MarketSeries, Signal};
use crate::indicators::stats::{linear_regression_slope, mean, simple_returns, std_dev};
use crate::indicators::{last, rsi, zscore};

const TRADING_DAYS: f64 = 252.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VolatilityRegime {
    Low,
    Medium,
    High,
}

impl fmt::Display for VolatilityRegime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VolatilityRegime::Low => "LOW",
            VolatilityRegime::Medium => "MEDIUM",
            VolatilityRegime::High => "HIGH",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatReversionParams {
    pub volatility_lookback: usize,
    /// Annualized volatility below which the regime is LOW.
    pub low_volatility: f64,
    /// Annualized volatility above which the regime is HIGH.
    pub high_volatility: f64,
    pub low_window: usize,
    pub medium_window: usize,
    pub high_window: usize,
    pub low_z: f64,
    pub medium_z: f64,
    pub high_z: f64,
    pub rsi_period: usize,
    pub rsi_oversold: f64,
    pub rsi_overbought: f64,
    pub momentum_bars: usize,
    /// Max |momentum| over `momentum_bars` before the guard trips.
    pub momentum_limit: f64,
    pub trend_window: usize,
    /// Max |regression trend| (total move over the window / mean price).
    pub trend_limit: f64,
    pub stop_loss_pct: f64,
}

impl Default for StatReversionParams {
    fn default() -> Self {
        Self {
            volatility_lookback: 20,
            low_volatility: 0.15,
            high_volatility: 0.40,
            low_window: 15,
            medium_window: 20,
            high_window: 30,
            low_z: 1.5,
            medium_z: 2.0,
            high_z: 2.5,
            rsi_period: 14,
            rsi_oversold: 35.0,
            rsi_overbought: 65.0,
            momentum_bars: 10,
            momentum_limit: 0.15,
            trend_window: 20,
            trend_limit: 0.20,
            stop_loss_pct: 0.03,
        }
    }
}

impl StatReversionParams {
    pub fn min_bars(&self) -> usize {
        [
            self.low_window,
            self.medium_window,
            self.high_window,
            self.volatility_lookback + 1,
            self.rsi_period + 1,
            self.momentum_bars + 1,
            self.trend_window,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }

    pub fn validate(&self) -> Result<(), StrategyConfigError> {
        require_period("volatility_lookback", self.volatility_lookback)?;
        require_period("low_window", self.low_window)?;
        require_period("medium_window", self.medium_window)?;
        require_period("high_window", self.high_window)?;
        require_period("rsi_period", self.rsi_period)?;
        require_period("momentum_bars", self.momentum_bars)?;
        if self.trend_window < 2 {
            return Err(StrategyConfigError::OutOfRange {
                field: "trend_window",
                value: self.trend_window as f64,
                min: 2.0,
                max: f64::INFINITY,
            });
        }
        require_below(
            "low_volatility",
            self.low_volatility,
            "high_volatility",
            self.high_volatility,
        )?;
        require_below(
            "rsi_oversold",
            self.rsi_oversold,
            "rsi_overbought",
            self.rsi_overbought,
        )?;
        for (field, z) in [
            ("low_z", self.low_z),
            ("medium_z", self.medium_z),
            ("high_z", self.high_z),
        ] {
            require_range(field, z, 0.1, 10.0)?;
        }
        require_range("momentum_limit", self.momentum_limit, 0.0, 10.0)?;
        require_range("trend_limit", self.trend_limit, 0.0, 10.0)?;
        require_range("stop_loss_pct", self.stop_loss_pct, 0.0, 1.0)?;
        Ok(())
    }

    fn regime(&self, annualized: f64) -> VolatilityRegime {
        if annualized < self.low_volatility {
            VolatilityRegime::Low
        } else if annualized > self.high_volatility {
            VolatilityRegime::High
        } else {
            VolatilityRegime::Medium
        }
    }

    /// (z-score window, z threshold, stop multiplier, risk) for a regime.
    fn regime_settings(&self, regime: VolatilityRegime) -> (usize, f64, f64, f64) {
        match regime {
            VolatilityRegime::Low => (self.low_window, self.low_z, 1.0, 0.3),
            VolatilityRegime::Medium => (self.medium_window, self.medium_z, 1.25, 0.45),
            VolatilityRegime::High => (self.high_window, self.high_z, 1.5, 0.65),
        }
    }
}

pub(crate) fn analyze(series: &MarketSeries, p: &StatReversionParams) -> Signal {
    let closes = series.closes();
    let n = closes.len();
    let price = closes[n - 1];

    let anchor = closes[n - 1 - p.momentum_bars];
    let momentum = if anchor > 0.0 { price / anchor - 1.0 } else { 0.0 };
    let trend_slice = &closes[n - p.trend_window..];
    let trend_mean = mean(trend_slice);
    let trend = if trend_mean > 0.0 {
        linear_regression_slope(trend_slice) * (p.trend_window - 1) as f64 / trend_mean
    } else {
        0.0
    };
    if momentum.abs() > p.momentum_limit || trend.abs() > p.trend_limit {
        return Signal::hold(format!(
            "stat_zscore: Exhaustion guard: momentum {:+.1}%, trend {:+.1}%",
            momentum * 100.0,
            trend * 100.0
        ));
    }

    let returns = simple_returns(&closes[n - (p.volatility_lookback + 1)..]);
    let annualized = std_dev(&returns) * TRADING_DAYS.sqrt();
    let regime = p.regime(annualized);
    let (window, threshold, stop_factor, risk) = p.regime_settings(regime);

    let Some(z) = last(&zscore(&closes, window)) else {
        return Signal::hold("stat_zscore: z-score unavailable");
    };
    let Some(r) = last(&rsi(&closes, p.rsi_period)) else {
        return Signal::hold("stat_zscore: RSI unavailable");
    };

    let (action, rsi_bonus) = if z <= -threshold && r < p.rsi_oversold {
        (Action::Buy, (p.rsi_oversold - r) / p.rsi_oversold * 0.3)
    } else if z >= threshold && r > p.rsi_overbought {
        (
            Action::Sell,
            (r - p.rsi_overbought) / (100.0 - p.rsi_overbought) * 0.3,
        )
    } else {
        return Signal::hold(format!(
            "stat_zscore: z {z:.2} / RSI {r:.1} not confirmed \
             ({regime} vol, threshold {threshold:.1})"
        ));
    };

    let confidence =
        0.5 + ((z.abs() - threshold) * 0.2).min(0.25) + rsi_bonus.clamp(0.0, 0.15);
    let stop_pct = p.stop_loss_pct * stop_factor;
    let stop = match action {
        Action::Buy => price * (1.0 - stop_pct),
        _ => price * (1.0 + stop_pct),
    };
    let target = mean(&closes[n - window..]);

    Signal::new(
        action,
        directional(confidence),
        directional(risk),
        format!(
            "stat_zscore: z {z:.2} beyond {threshold:.1} with RSI {r:.1} ({regime} vol {:.0}%)",
            annualized * 100.0
        ),
    )
    .with_stop_loss(stop)
    .with_take_profit(target)
}
