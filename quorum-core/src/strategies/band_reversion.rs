//! Band mean-reversion (Bollinger) — fade moves to the outer bands.
//!
//! Position inside the bands is `(price - lower) / (upper - lower)`: 0 at the
//! lower band, 1 at the upper. Within `edge_threshold` of either edge the
//! signal is actionable, unless the bands are squeezed, in which case a
//! breakout is more likely than a reversion.

use serde::{Deserialize, Serialize};

use super::{require_period, require_range, StrategyConfigError};
use crate::domain::signal::directional;
use crate::domain::{Action, MarketSeries, Signal};
use crate::indicators::{bollinger, last, rsi};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BandReversionParams {
    pub period: usize,
    pub std_devs: f64,
    /// Fraction of the band width treated as "at the edge".
    pub edge_threshold: f64,
    /// Band width over middle band below which the bands count as squeezed.
    pub squeeze_threshold: f64,
    /// Signals below this confidence are demoted to HOLD.
    pub min_confidence: f64,
    pub rsi_period: usize,
    pub stop_loss_pct: f64,
}

impl Default for BandReversionParams {
    fn default() -> Self {
        Self {
            period: 20,
            std_devs: 2.0,
            edge_threshold: 0.05,
            squeeze_threshold: 0.02,
            min_confidence: 0.3,
            rsi_period: 14,
            stop_loss_pct: 0.03,
        }
    }
}

impl BandReversionParams {
    pub fn min_bars(&self) -> usize {
        self.period.max(self.rsi_period + 1)
    }

    pub fn validate(&self) -> Result<(), StrategyConfigError> {
        require_period("period", self.period)?;
        require_period("rsi_period", self.rsi_period)?;
        require_range("std_devs", self.std_devs, 0.1, 10.0)?;
        require_range("edge_threshold", self.edge_threshold, 0.0, 0.5)?;
        require_range("squeeze_threshold", self.squeeze_threshold, 0.0, 1.0)?;
        require_range("min_confidence", self.min_confidence, 0.0, 1.0)?;
        require_range("stop_loss_pct", self.stop_loss_pct, 0.0, 1.0)?;
        Ok(())
    }
}

pub(crate) fn analyze(series: &MarketSeries, p: &BandReversionParams) -> Signal {
    let closes = series.closes();
    let price = closes[closes.len() - 1];

    let bands = bollinger(&closes, p.period, p.std_devs);
    let (Some(upper), Some(middle), Some(lower)) =
        (last(&bands.upper), last(&bands.middle), last(&bands.lower))
    else {
        return Signal::hold("band_bollinger: bands unavailable");
    };

    let width = upper - lower;
    if middle <= 0.0 || width <= 0.0 {
        return Signal::hold("band_bollinger: zero band width");
    }
    let bandwidth = width / middle;
    if bandwidth < p.squeeze_threshold {
        return Signal::hold(format!(
            "band_bollinger: squeeze (width {:.2}%), breakout anticipated",
            bandwidth * 100.0
        ));
    }

    let position = (price - lower) / width;
    let current_rsi = last(&rsi(&closes, p.rsi_period));

    let (action, mut confidence) = if position <= p.edge_threshold {
        (Action::Buy, 0.55 + ((p.edge_threshold - position) * 2.0).min(0.3))
    } else if position >= 1.0 - p.edge_threshold {
        (
            Action::Sell,
            0.55 + ((position - (1.0 - p.edge_threshold)) * 2.0).min(0.3),
        )
    } else {
        return Signal::hold(format!(
            "band_bollinger: price inside bands (position {position:.2})"
        ));
    };

    if let Some(r) = current_rsi {
        confidence *= match action {
            Action::Buy if r < 35.0 => 1.15,
            Action::Buy if r > 50.0 => 0.8,
            Action::Sell if r > 65.0 => 1.15,
            Action::Sell if r < 50.0 => 0.8,
            _ => 1.0,
        };
    }
    let confidence = directional(confidence);

    if confidence < p.min_confidence {
        return Signal::hold(format!(
            "band_bollinger: confidence {confidence:.2} below minimum {:.2}",
            p.min_confidence
        ));
    }

    let (stop, edge) = match action {
        Action::Buy => (price.min(lower) * (1.0 - p.stop_loss_pct), "lower"),
        _ => (price.max(upper) * (1.0 + p.stop_loss_pct), "upper"),
    };

    Signal::new(
        action,
        confidence,
        directional(0.3 + bandwidth * 2.0),
        format!(
            "band_bollinger: price at {edge} band (position {position:.2}, RSI {})",
            current_rsi.map_or_else(|| "n/a".to_string(), |r| format!("{r:.1}"))
        ),
    )
    .with_stop_loss(stop)
    .with_take_profit(middle)
}
