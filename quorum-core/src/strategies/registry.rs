//! Registry — converts `StrategyConfig` entries into validated `Strategy` values.
//!
//! Each entry is validated on its own: an invalid or duplicate entry is
//! excluded and reported, the rest of the registry is still built.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{Strategy, StrategyConfigError, StrategyKind};
use crate::domain::StrategyId;

// ─── Error type ──────────────────────────────────────────────────────

/// Why a configured strategy was left out of the registry.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RegistrationError {
    #[error("strategy '{id}' has invalid parameters: {source}")]
    Invalid {
        id: StrategyId,
        #[source]
        source: StrategyConfigError,
    },
    #[error("duplicate strategy id: {0}")]
    DuplicateId(StrategyId),
    #[error("strategy '{0}' has an invalid manual weight")]
    InvalidWeight(StrategyId),
}

// ─── Config ──────────────────────────────────────────────────────────

fn default_enabled() -> bool {
    true
}

/// One registered strategy as it appears in configuration.
///
/// ```toml
/// [[strategies]]
/// id = "fast_cross"
/// type = "crossover"
/// fast_period = 5
/// slow_period = 20
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    pub id: StrategyId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(flatten)]
    pub kind: StrategyKind,
}

impl StrategyConfig {
    pub fn new(id: impl Into<StrategyId>, kind: StrategyKind) -> Self {
        Self {
            id: id.into(),
            name: None,
            enabled: true,
            weight: None,
            kind,
        }
    }

    fn build(&self) -> Result<Strategy, RegistrationError> {
        let name = self
            .name
            .clone()
            .unwrap_or_else(|| self.kind.label().to_string());
        let mut strategy =
            Strategy::new(self.id.clone(), name, self.kind.clone()).map_err(|source| {
                RegistrationError::Invalid {
                    id: self.id.clone(),
                    source,
                }
            })?;
        if let Some(weight) = self.weight {
            if !weight.is_finite() || weight < 0.0 {
                return Err(RegistrationError::InvalidWeight(self.id.clone()));
            }
            strategy = strategy.with_weight(weight);
        }
        strategy.enabled = self.enabled;
        Ok(strategy)
    }
}

/// Default configuration: all five variants, ids equal to their labels.
pub fn default_configs() -> Vec<StrategyConfig> {
    StrategyKind::defaults()
        .into_iter()
        .map(|kind| StrategyConfig::new(kind.label(), kind))
        .collect()
}

/// Build the registry in configuration order.
pub fn build_registry(configs: &[StrategyConfig]) -> (Vec<Strategy>, Vec<RegistrationError>) {
    let mut seen = HashSet::new();
    let mut strategies = Vec::with_capacity(configs.len());
    let mut errors = Vec::new();

    for config in configs {
        if !seen.insert(config.id.clone()) {
            warn!(strategy = %config.id, "duplicate strategy id excluded");
            errors.push(RegistrationError::DuplicateId(config.id.clone()));
            continue;
        }
        match config.build() {
            Ok(strategy) => strategies.push(strategy),
            Err(err) => {
                warn!(strategy = %config.id, error = %err, "strategy excluded from registry");
                errors.push(err);
            }
        }
    }

    (strategies, errors)
}

/// All five variants with default parameters.
pub fn default_registry() -> Vec<Strategy> {
    let (strategies, _) = build_registry(&default_configs());
    strategies
}
