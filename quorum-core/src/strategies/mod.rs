//! Strategies — the closed set of signal generators the ensemble runs.
//!
//! Each variant carries its own parameter struct and is dispatched through a
//! single `analyze(&MarketSeries) -> Signal`. Strategies are stateless and
//! portfolio-agnostic: the same series always produces the same signal, so the
//! ensemble can evaluate them concurrently without locking.
//!
//! Failure semantics shared by every variant:
//! - series shorter than `min_bars()` → HOLD, confidence 0, explicit reason;
//! - an indicator returning an empty series → HOLD, confidence 0;
//! - otherwise a well-formed `Signal`; `analyze` never panics.

pub mod band_reversion;
pub mod crossover;
pub mod momentum;
pub mod registry;
pub mod stat_reversion;
pub mod trend;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::domain::{MarketSeries, Signal, StrategyId};

pub use band_reversion::BandReversionParams;
pub use crossover::{CrossoverParams, MaType};
pub use momentum::MomentumParams;
pub use registry::{
    build_registry, default_configs, default_registry, RegistrationError, StrategyConfig,
};
pub use stat_reversion::{StatReversionParams, VolatilityRegime};
pub use trend::TrendParams;

/// Parameter validation failures (the ConfigurationInvalid case).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StrategyConfigError {
    #[error("{field} must be >= 1")]
    ZeroPeriod { field: &'static str },
    #[error("fast period ({fast}) must be < slow period ({slow})")]
    FastNotBelowSlow { fast: usize, slow: usize },
    #[error("{field} must be in [{min}, {max}], got {value}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("{low} must be below {high}")]
    InvertedThresholds {
        low: &'static str,
        high: &'static str,
    },
}

pub(crate) fn require_period(field: &'static str, value: usize) -> Result<(), StrategyConfigError> {
    if value == 0 {
        Err(StrategyConfigError::ZeroPeriod { field })
    } else {
        Ok(())
    }
}

pub(crate) fn require_range(
    field: &'static str,
    value: f64,
    min: f64,
    max: f64,
) -> Result<(), StrategyConfigError> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(StrategyConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

pub(crate) fn require_below(
    low: &'static str,
    low_value: f64,
    high: &'static str,
    high_value: f64,
) -> Result<(), StrategyConfigError> {
    if low_value < high_value {
        Ok(())
    } else {
        Err(StrategyConfigError::InvertedThresholds { low, high })
    }
}

/// The five strategy variants and their parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyKind {
    Momentum(MomentumParams),
    Trend(TrendParams),
    BandReversion(BandReversionParams),
    Crossover(CrossoverParams),
    StatReversion(StatReversionParams),
}

impl StrategyKind {
    /// Short label used in reasons and logs.
    pub fn label(&self) -> &'static str {
        match self {
            StrategyKind::Momentum(_) => "momentum_rsi",
            StrategyKind::Trend(_) => "trend_macd",
            StrategyKind::BandReversion(_) => "band_bollinger",
            StrategyKind::Crossover(_) => "crossover_ma",
            StrategyKind::StatReversion(_) => "stat_zscore",
        }
    }

    pub fn min_bars(&self) -> usize {
        match self {
            StrategyKind::Momentum(p) => p.min_bars(),
            StrategyKind::Trend(p) => p.min_bars(),
            StrategyKind::BandReversion(p) => p.min_bars(),
            StrategyKind::Crossover(p) => p.min_bars(),
            StrategyKind::StatReversion(p) => p.min_bars(),
        }
    }

    pub fn validate(&self) -> Result<(), StrategyConfigError> {
        match self {
            StrategyKind::Momentum(p) => p.validate(),
            StrategyKind::Trend(p) => p.validate(),
            StrategyKind::BandReversion(p) => p.validate(),
            StrategyKind::Crossover(p) => p.validate(),
            StrategyKind::StatReversion(p) => p.validate(),
        }
    }

    pub fn analyze(&self, series: &MarketSeries) -> Signal {
        let required = self.min_bars();
        if series.len() < required {
            return Signal::insufficient_data(self.label(), required, series.len());
        }
        match self {
            StrategyKind::Momentum(p) => momentum::analyze(series, p),
            StrategyKind::Trend(p) => trend::analyze(series, p),
            StrategyKind::BandReversion(p) => band_reversion::analyze(series, p),
            StrategyKind::Crossover(p) => crossover::analyze(series, p),
            StrategyKind::StatReversion(p) => stat_reversion::analyze(series, p),
        }
    }

    /// All five variants with default parameters, in registry order.
    pub fn defaults() -> Vec<StrategyKind> {
        vec![
            StrategyKind::Momentum(MomentumParams::default()),
            StrategyKind::Trend(TrendParams::default()),
            StrategyKind::BandReversion(BandReversionParams::default()),
            StrategyKind::Crossover(CrossoverParams::default()),
            StrategyKind::StatReversion(StatReversionParams::default()),
        ]
    }
}

/// A registered strategy: identity, enablement, optional manual weight, variant.
#[derive(Debug, Clone, PartialEq)]
pub struct Strategy {
    pub id: StrategyId,
    pub name: String,
    pub kind: StrategyKind,
    pub enabled: bool,
    /// Manual ensemble weight; overrides the performance-derived weight.
    pub weight: Option<f64>,
}

impl Strategy {
    /// Validated constructor. Invalid parameters never produce a `Strategy`.
    pub fn new(
        id: impl Into<StrategyId>,
        name: impl Into<String>,
        kind: StrategyKind,
    ) -> Result<Self, StrategyConfigError> {
        kind.validate()?;
        Ok(Self {
            id: id.into(),
            name: name.into(),
            kind,
            enabled: true,
            weight: None,
        })
    }

    /// Strategy with default name and id taken from the variant label.
    pub fn from_kind(kind: StrategyKind) -> Result<Self, StrategyConfigError> {
        let label = kind.label();
        Self::new(label, label, kind)
    }

    pub fn with_weight(mut self, weight: f64) -> Self {
        self.weight = Some(weight.max(0.0));
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    pub fn min_bars(&self) -> usize {
        self.kind.min_bars()
    }

    pub fn analyze(&self, series: &MarketSeries) -> Signal {
        let signal = self.kind.analyze(series);
        debug!(
            strategy = %self.id,
            action = %signal.action,
            confidence = signal.confidence,
            reason = %signal.reason,
            "strategy evaluated"
        );
        signal
    }
}

/// Build a `MarketSeries` from closes (and optional volumes) for tests.
///
/// Generates plausible OHLC: open = previous close (or close for the first
/// bar), high = max(open, close) + 0.5, low = min(open, close) - 0.5,
/// one bar per day starting 2024-01-02.
#[cfg(test)]
pub fn make_series(closes: &[f64], volumes: Option<&[f64]>) -> MarketSeries {
    use crate::domain::MarketBar;
    use chrono::{Duration, TimeZone, Utc};

    let base = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            MarketBar::new(
                base + Duration::days(i as i64),
                open,
                open.max(close) + 0.5,
                (open.min(close) - 0.5).max(0.01),
                close,
                volumes.map_or(1_000.0, |v| v[i]),
            )
        })
        .collect();
    MarketSeries::new(bars)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Action;

    #[test]
    fn every_default_variant_validates() {
        for kind in StrategyKind::defaults() {
            assert!(kind.validate().is_ok(), "{} failed validation", kind.label());
        }
    }

    #[test]
    fn short_series_is_hold_with_zero_confidence() {
        let series = make_series(&[100.0; 10], None);
        for kind in StrategyKind::defaults() {
            let signal = kind.analyze(&series);
            assert_eq!(signal.action, Action::Hold, "{}", kind.label());
            assert_eq!(signal.confidence, 0.0);
            assert!(signal.reason.contains("insufficient data"));
        }
    }

    #[test]
    fn invalid_params_are_rejected_by_constructor() {
        let kind = StrategyKind::Crossover(CrossoverParams {
            fast_period: 30,
            slow_period: 10,
            ..CrossoverParams::default()
        });
        let err = Strategy::from_kind(kind).unwrap_err();
        assert_eq!(
            err,
            StrategyConfigError::FastNotBelowSlow { fast: 30, slow: 10 }
        );
    }

    #[test]
    fn kind_serializes_with_type_tag() {
        let kind = StrategyKind::Trend(TrendParams::default());
        let json = serde_json::to_value(&kind).unwrap();
        assert_eq!(json["type"], "trend");
        assert_eq!(json["fast_period"], 12);
    }

    #[test]
    fn labels_are_unique() {
        let mut labels: Vec<_> = StrategyKind::defaults().iter().map(|k| k.label()).collect();
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels.len(), 5);
    }
}
