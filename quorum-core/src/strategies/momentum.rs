//! Momentum (RSI) — buy oversold, sell overbought, with volatility-adaptive
//! thresholds.
//!
//! Confidence starts from how far RSI sits beyond its threshold and is then
//! scaled by three confirmations: trend (price vs long SMA), volume (current
//! vs the prior average) and short EMA direction.

use serde::{Deserialize, Serialize};

use super::{require_below, require_period, require_range, StrategyConfigError};
use crate::domain::signal::directional;
use crate::domain::{Action, MarketSeries, Signal};
use crate::indicators::stats::{mean, simple_returns, std_dev};
use crate::indicators::{ema, last, rsi, sma};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumParams {
    pub rsi_period: usize,
    pub oversold: f64,
    pub overbought: f64,
    /// Bars of simple returns used for the volatility estimate.
    pub volatility_lookback: usize,
    /// Per-bar return std-dev above which thresholds widen.
    pub high_volatility: f64,
    /// Per-bar return std-dev below which thresholds narrow.
    pub low_volatility: f64,
    pub threshold_shift: f64,
    pub trend_period: usize,
    pub volume_period: usize,
    /// Volume ratio at or above which the signal is volume-confirmed.
    pub volume_confirmation: f64,
    pub ema_period: usize,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
}

impl Default for MomentumParams {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            oversold: 30.0,
            overbought: 70.0,
            volatility_lookback: 20,
            high_volatility: 0.03,
            low_volatility: 0.01,
            threshold_shift: 5.0,
            trend_period: 50,
            volume_period: 20,
            volume_confirmation: 1.2,
            ema_period: 9,
            stop_loss_pct: 0.02,
            take_profit_pct: 0.04,
        }
    }
}

impl MomentumParams {
    pub fn min_bars(&self) -> usize {
        (self.rsi_period + 1)
            .max(self.trend_period)
            .max(self.volume_period + 1)
            .max(self.ema_period + 1)
            .max(self.volatility_lookback + 1)
    }

    pub fn validate(&self) -> Result<(), StrategyConfigError> {
        require_period("rsi_period", self.rsi_period)?;
        require_period("volatility_lookback", self.volatility_lookback)?;
        require_period("trend_period", self.trend_period)?;
        require_period("volume_period", self.volume_period)?;
        require_period("ema_period", self.ema_period)?;
        require_range("oversold", self.oversold, 0.0, 100.0)?;
        require_range("overbought", self.overbought, 0.0, 100.0)?;
        require_below("oversold", self.oversold, "overbought", self.overbought)?;
        require_range("threshold_shift", self.threshold_shift, 0.0, 50.0)?;
        require_below(
            "oversold + threshold_shift",
            self.oversold + self.threshold_shift,
            "overbought - threshold_shift",
            self.overbought - self.threshold_shift,
        )?;
        require_below(
            "low_volatility",
            self.low_volatility,
            "high_volatility",
            self.high_volatility,
        )?;
        require_range("volume_confirmation", self.volume_confirmation, 0.0, 100.0)?;
        require_range("stop_loss_pct", self.stop_loss_pct, 0.0, 1.0)?;
        require_range("take_profit_pct", self.take_profit_pct, 0.0, 10.0)?;
        Ok(())
    }
}

pub(crate) fn analyze(series: &MarketSeries, p: &MomentumParams) -> Signal {
    let closes = series.closes();
    let volumes = series.volumes();
    let n = closes.len();

    let Some(current_rsi) = last(&rsi(&closes, p.rsi_period)) else {
        return Signal::hold("momentum_rsi: RSI unavailable");
    };

    let window = &closes[n - (p.volatility_lookback + 1)..];
    let volatility = std_dev(&simple_returns(window));
    let (oversold, overbought, regime) = if volatility > p.high_volatility {
        (
            p.oversold - p.threshold_shift,
            p.overbought + p.threshold_shift,
            "high vol",
        )
    } else if volatility < p.low_volatility {
        (
            p.oversold + p.threshold_shift,
            p.overbought - p.threshold_shift,
            "low vol",
        )
    } else {
        (p.oversold, p.overbought, "normal vol")
    };

    let (action, extremity) = if current_rsi < oversold {
        (Action::Buy, (oversold - current_rsi) / oversold)
    } else if current_rsi > overbought {
        (Action::Sell, (current_rsi - overbought) / (100.0 - overbought))
    } else {
        return Signal::hold(format!(
            "momentum_rsi: RSI {current_rsi:.1} neutral ({oversold:.0}/{overbought:.0}, {regime})"
        ));
    };
    let mut confidence = 0.6 + 0.4 * extremity.clamp(0.0, 1.0);

    let price = closes[n - 1];
    let Some(trend_sma) = last(&sma(&closes, p.trend_period)) else {
        return Signal::hold("momentum_rsi: trend SMA unavailable");
    };
    let with_trend = match action {
        Action::Buy => price > trend_sma,
        _ => price < trend_sma,
    };
    confidence *= if with_trend { 1.1 } else { 0.85 };

    // Current bar against the mean of the preceding volumes.
    let prior = mean(&volumes[n - 1 - p.volume_period..n - 1]);
    let volume_ratio = if prior > 0.0 { volumes[n - 1] / prior } else { 1.0 };
    if volume_ratio >= p.volume_confirmation {
        confidence *= 1.2;
    } else if volume_ratio < 0.8 {
        confidence *= 0.9;
    }

    let short_ema = ema(&closes, p.ema_period);
    if short_ema.len() < 2 {
        return Signal::hold("momentum_rsi: EMA unavailable");
    }
    let rising = short_ema[short_ema.len() - 1] > short_ema[short_ema.len() - 2];
    let ema_agrees = match action {
        Action::Buy => rising,
        _ => !rising,
    };
    confidence *= if ema_agrees { 1.1 } else { 0.9 };
    let confidence = confidence.clamp(0.1, 1.0);

    let mut risk = directional(0.3 + volatility * 10.0);
    if !with_trend {
        risk = directional(risk + 0.1);
    }

    let (stop, target, side) = match action {
        Action::Buy => (
            price * (1.0 - p.stop_loss_pct),
            price * (1.0 + p.take_profit_pct),
            "oversold",
        ),
        _ => (
            price * (1.0 + p.stop_loss_pct),
            price * (1.0 - p.take_profit_pct),
            "overbought",
        ),
    };

    Signal::new(
        action,
        confidence,
        risk,
        format!(
            "momentum_rsi: RSI {current_rsi:.1} {side} ({regime}, volume x{volume_ratio:.2}, {})",
            if with_trend { "with trend" } else { "counter-trend" }
        ),
    )
    .with_stop_loss(stop)
    .with_take_profit(target)
    .with_suggested_size(confidence * (1.0 - risk))
}
