//! Position sizer — maps a strategy's record and signal confidence to dollars.
//!
//! Strategies on probation trade inside the small testing band. Graduated
//! strategies trade inside the production band, scaled up for a good record
//! and down for a poor one. Confidence below 0.6 is floored to 0.6, so a
//! weak signal still takes the lower part of the band rather than nothing.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::signal::unit;
use crate::domain::StrategyPerformance;

/// Confidence floor applied before interpolating inside a band.
pub const CONFIDENCE_FLOOR: f64 = 0.6;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SizingConfigError {
    #[error("{field} must be a positive finite amount, got {value}")]
    NonPositive { field: &'static str, value: f64 },
    #[error("{min} must not exceed {max}")]
    InvertedBounds {
        min: &'static str,
        max: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionSizingConfig {
    pub min_test_size: f64,
    pub max_test_size: f64,
    pub min_production_size: f64,
    pub max_production_size: f64,
    /// Applied to both production bounds for a profitable, >50% win-rate record.
    pub profit_multiplier: f64,
    /// Applied to both production bounds for a losing or <40% win-rate record.
    pub loss_multiplier: f64,
}

impl Default for PositionSizingConfig {
    fn default() -> Self {
        Self {
            min_test_size: 5.0,
            max_test_size: 10.0,
            min_production_size: 10.0,
            max_production_size: 50.0,
            profit_multiplier: 1.5,
            loss_multiplier: 0.5,
        }
    }
}

impl PositionSizingConfig {
    pub fn validate(&self) -> Result<(), SizingConfigError> {
        for (field, value) in [
            ("min_test_size", self.min_test_size),
            ("max_test_size", self.max_test_size),
            ("min_production_size", self.min_production_size),
            ("max_production_size", self.max_production_size),
            ("profit_multiplier", self.profit_multiplier),
            ("loss_multiplier", self.loss_multiplier),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(SizingConfigError::NonPositive { field, value });
            }
        }
        if self.min_test_size > self.max_test_size {
            return Err(SizingConfigError::InvertedBounds {
                min: "min_test_size",
                max: "max_test_size",
            });
        }
        if self.min_production_size > self.max_production_size {
            return Err(SizingConfigError::InvertedBounds {
                min: "min_production_size",
                max: "max_production_size",
            });
        }
        if self.max_test_size > self.max_production_size {
            return Err(SizingConfigError::InvertedBounds {
                min: "max_test_size",
                max: "max_production_size",
            });
        }
        Ok(())
    }
}

/// Which band a size was drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SizingMode {
    Testing,
    Production,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PositionSizer {
    config: PositionSizingConfig,
}

impl PositionSizer {
    pub fn new(config: PositionSizingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PositionSizingConfig {
        &self.config
    }

    pub fn mode(performance: &StrategyPerformance) -> SizingMode {
        if performance.is_testing() {
            SizingMode::Testing
        } else {
            SizingMode::Production
        }
    }

    /// Position size in dollars.
    pub fn size(&self, performance: &StrategyPerformance, confidence: f64) -> f64 {
        let c = &self.config;
        let scale = unit(confidence).max(CONFIDENCE_FLOOR);

        match Self::mode(performance) {
            SizingMode::Testing => {
                c.min_test_size + (c.max_test_size - c.min_test_size) * scale
            }
            SizingMode::Production => {
                let (mut lo, mut hi) = (c.min_production_size, c.max_production_size);
                if performance.total_pnl > 0.0 && performance.win_rate > 0.5 {
                    lo *= c.profit_multiplier;
                    hi *= c.profit_multiplier;
                } else if performance.total_pnl < 0.0 || performance.win_rate < 0.4 {
                    lo *= c.loss_multiplier;
                    hi *= c.loss_multiplier;
                }
                (lo + (hi - lo) * scale).clamp(c.min_test_size, c.max_production_size)
            }
        }
    }
}

impl Default for PositionSizer {
    fn default() -> Self {
        Self::new(PositionSizingConfig::default())
    }
}
