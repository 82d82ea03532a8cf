//! Signal — one strategy's recommendation for one evaluation cycle.
//!
//! Confidence ("how sure") and risk score ("how dangerous if wrong") are
//! independent axes. Both are clamped into [0, 1] at construction; strategies
//! further clamp directional signals into their own tighter band.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lower bound strategies apply to directional confidence and risk.
pub const MIN_DIRECTIONAL: f64 = 0.1;
/// Upper bound strategies apply to directional confidence and risk.
pub const MAX_DIRECTIONAL: f64 = 0.95;

/// Recommended trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    Buy,
    Sell,
    Hold,
}

impl Action {
    pub const ALL: [Action; 3] = [Action::Buy, Action::Sell, Action::Hold];

    pub fn is_directional(self) -> bool {
        !matches!(self, Action::Hold)
    }

    /// BUY ↔ SELL; HOLD is unchanged.
    pub fn inverted(self) -> Self {
        match self {
            Action::Buy => Action::Sell,
            Action::Sell => Action::Buy,
            Action::Hold => Action::Hold,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Buy => "BUY",
            Action::Sell => "SELL",
            Action::Hold => "HOLD",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub action: Action,
    pub confidence: f64,
    pub reason: String,
    pub risk_score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<f64>,
    /// Suggested fraction of the maximum position, in [0, 1].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_size: Option<f64>,
}

impl Signal {
    pub fn new(
        action: Action,
        confidence: f64,
        risk_score: f64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            action,
            confidence: unit(confidence),
            reason: reason.into(),
            risk_score: unit(risk_score),
            stop_loss: None,
            take_profit: None,
            suggested_size: None,
        }
    }

    /// HOLD with zero confidence. Used for every degraded path.
    pub fn hold(reason: impl Into<String>) -> Self {
        Self::new(Action::Hold, 0.0, 0.0, reason)
    }

    /// HOLD for a series shorter than the strategy's minimum length.
    pub fn insufficient_data(strategy: &str, required: usize, available: usize) -> Self {
        Self::hold(format!(
            "{strategy}: insufficient data ({available} bars, need {required})"
        ))
    }

    pub fn with_stop_loss(mut self, price: f64) -> Self {
        self.stop_loss = price.is_finite().then_some(price);
        self
    }

    pub fn with_take_profit(mut self, price: f64) -> Self {
        self.take_profit = price.is_finite().then_some(price);
        self
    }

    pub fn with_suggested_size(mut self, fraction: f64) -> Self {
        self.suggested_size = Some(unit(fraction));
        self
    }

    /// Swap BUY and SELL together with the protective levels.
    ///
    /// Stop-loss and take-profit were computed for the original direction, so
    /// they trade places: the old target becomes the stop and vice versa.
    pub fn inverted(mut self) -> Self {
        if self.action.is_directional() {
            self.action = self.action.inverted();
            std::mem::swap(&mut self.stop_loss, &mut self.take_profit);
            self.reason = format!("[inverse] {}", self.reason);
        }
        self
    }

    pub fn is_hold(&self) -> bool {
        self.action == Action::Hold
    }
}

/// Clamp into [0, 1]; NaN becomes 0.
pub fn unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Clamp a directional confidence or risk value into the strategy band.
pub fn directional(value: f64) -> f64 {
    if value.is_nan() {
        MIN_DIRECTIONAL
    } else {
        value.clamp(MIN_DIRECTIONAL, MAX_DIRECTIONAL)
    }
}
