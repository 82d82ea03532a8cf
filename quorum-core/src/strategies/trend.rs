//! Trend (MACD) — histogram crossovers, plus accelerating-momentum entries.

use serde::{Deserialize, Serialize};

use super::{require_period, require_range, StrategyConfigError};
use crate::domain::signal::directional;
use crate::domain::{Action, MarketSeries, Signal};
use crate::indicators::{last, macd, sma};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendParams {
    pub fast_period: usize,
    pub slow_period: usize,
    pub signal_period: usize,
    pub trend_period: usize,
    /// Consecutive histogram bars that must expand for a momentum entry.
    pub acceleration_bars: usize,
    pub stop_loss_pct: f64,
    pub take_profit_pct: f64,
}

impl Default for TrendParams {
    fn default() -> Self {
        Self {
            fast_period: 12,
            slow_period: 26,
            signal_period: 9,
            trend_period: 50,
            acceleration_bars: 3,
            stop_loss_pct: 0.03,
            take_profit_pct: 0.06,
        }
    }
}

impl TrendParams {
    pub fn min_bars(&self) -> usize {
        (self.slow_period + self.signal_period + self.acceleration_bars).max(self.trend_period)
    }

    pub fn validate(&self) -> Result<(), StrategyConfigError> {
        require_period("fast_period", self.fast_period)?;
        require_period("signal_period", self.signal_period)?;
        require_period("trend_period", self.trend_period)?;
        require_period("acceleration_bars", self.acceleration_bars)?;
        if self.fast_period >= self.slow_period {
            return Err(StrategyConfigError::FastNotBelowSlow {
                fast: self.fast_period,
                slow: self.slow_period,
            });
        }
        require_range("stop_loss_pct", self.stop_loss_pct, 0.0, 1.0)?;
        require_range("take_profit_pct", self.take_profit_pct, 0.0, 10.0)?;
        Ok(())
    }
}

pub(crate) fn analyze(series: &MarketSeries, p: &TrendParams) -> Signal {
    let closes = series.closes();
    let price = closes[closes.len() - 1];

    let m = macd(&closes, p.fast_period, p.slow_period, p.signal_period);
    let hist = &m.histogram;
    if hist.len() < p.acceleration_bars + 1 {
        return Signal::hold("trend_macd: MACD unavailable");
    }
    let Some(macd_line) = last(&m.macd) else {
        return Signal::hold("trend_macd: MACD unavailable");
    };
    let h_now = hist[hist.len() - 1];
    let h_prev = hist[hist.len() - 2];

    let crossover = if h_prev <= 0.0 && h_now > 0.0 {
        Some(Action::Buy)
    } else if h_prev >= 0.0 && h_now < 0.0 {
        Some(Action::Sell)
    } else {
        None
    };

    let (action, base, kind) = match crossover {
        Some(action) => {
            let base = 0.55
                + (macd_line.abs() / price * 50.0).min(0.2)
                + (h_now.abs() / price * 100.0).min(0.15);
            let kind = if action == Action::Buy {
                "bullish crossover"
            } else {
                "bearish crossover"
            };
            (action, base, kind)
        }
        None => {
            let tail = &hist[hist.len() - (p.acceleration_bars + 1)..];
            let expanding_up =
                tail.windows(2).all(|w| w[0] < w[1]) && tail.iter().all(|&h| h > 0.0);
            let expanding_down =
                tail.windows(2).all(|w| w[0] > w[1]) && tail.iter().all(|&h| h < 0.0);
            let base = 0.4 + (h_now.abs() / price * 100.0).min(0.2);
            if expanding_up {
                (Action::Buy, base, "accelerating bullish momentum")
            } else if expanding_down {
                (Action::Sell, base, "accelerating bearish momentum")
            } else {
                return Signal::hold(format!(
                    "trend_macd: no crossover, histogram {h_now:.4} not accelerating"
                ));
            }
        }
    };

    let Some(trend_sma) = last(&sma(&closes, p.trend_period)) else {
        return Signal::hold("trend_macd: trend SMA unavailable");
    };
    let aligned = match action {
        Action::Buy => price > trend_sma,
        _ => price < trend_sma,
    };
    let confidence = directional(base * if aligned { 1.2 } else { 0.7 });

    let mut risk = if aligned { 0.35 } else { 0.6 };
    if crossover.is_none() {
        risk += 0.1;
    }

    let (stop, target) = match action {
        Action::Buy => (price * (1.0 - p.stop_loss_pct), price * (1.0 + p.take_profit_pct)),
        _ => (price * (1.0 + p.stop_loss_pct), price * (1.0 - p.take_profit_pct)),
    };

    Signal::new(
        action,
        confidence,
        directional(risk),
        format!(
            "trend_macd: {kind} (MACD {macd_line:.3}, hist {h_now:.4}, {})",
            if aligned { "trend aligned" } else { "counter-trend" }
        ),
    )
    .with_stop_loss(stop)
    .with_take_profit(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::make_series;

    /// +0.5 per bar to bar 39, a ten-bar pullback, then +0.8 per bar.
    fn pullback_closes(n: usize) -> Vec<f64> {
        let mut closes = vec![100.0];
        for i in 1..n {
            let step = if i < 40 {
                0.5
            } else if i < 50 {
                -0.6
            } else {
                0.8
            };
            closes.push(closes[i - 1] + step);
        }
        closes
    }

    #[test]
    fn histogram_turning_positive_is_bullish_crossover() {
        let series = make_series(&pullback_closes(58), None);
        let signal = analyze(&series, &TrendParams::default());
        assert_eq!(signal.action, Action::Buy);
        assert!(signal.reason.contains("bullish crossover"));
        assert!(signal.confidence > 0.8);
        assert!((signal.risk_score - 0.35).abs() < 1e-12);
    }

    #[test]
    fn mirrored_series_is_bearish_crossover() {
        let closes: Vec<f64> = pullback_closes(58).iter().map(|c| 300.0 - c).collect();
        let signal = analyze(&make_series(&closes, None), &TrendParams::default());
        assert_eq!(signal.action, Action::Sell);
        assert!(signal.reason.contains("bearish crossover"));
        assert!(signal.stop_loss.unwrap() > signal.take_profit.unwrap());
    }

    #[test]
    fn expanding_positive_histogram_is_momentum_buy() {
        let signal = analyze(&make_series(&pullback_closes(62), None), &TrendParams::default());
        assert_eq!(signal.action, Action::Buy);
        assert!(signal.reason.contains("accelerating"));
        assert!((signal.risk_score - 0.45).abs() < 1e-12);
    }

    #[test]
    fn recovering_negative_histogram_is_hold() {
        let signal = analyze(&make_series(&pullback_closes(54), None), &TrendParams::default());
        assert_eq!(signal.action, Action::Hold);
        assert_eq!(signal.confidence, 0.0);
    }

    #[test]
    fn fast_must_be_below_slow() {
        let p = TrendParams {
            fast_period: 26,
            ..TrendParams::default()
        };
        assert!(matches!(
            p.validate(),
            Err(StrategyConfigError::FastNotBelowSlow { .. })
        ));
    }
}
