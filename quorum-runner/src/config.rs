//! Engine configuration — one immutable struct supplied at engine construction.
//!
//! Every field has a default, so an empty TOML file is a valid configuration.
//! `validate` is run once by `Engine::new`; strategy parameters are validated
//! per entry by the registry instead, so one bad strategy never rejects the
//! whole file.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use quorum_core::ensemble::EnsembleConfig;
use quorum_core::sizing::{PositionSizingConfig, SizingConfigError};
use quorum_core::strategies::{default_configs, StrategyConfig};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("invalid config: {field} {reason}")]
    Invalid { field: &'static str, reason: String },
    #[error("invalid position sizing: {0}")]
    Sizing(#[from] SizingConfigError),
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.into(),
    }
}

/// Which signal drives the final decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionSource {
    /// The authoritative strategy picked by the adaptive selector.
    #[default]
    Adaptive,
    /// The performance-weighted ensemble signal.
    Ensemble,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub min_trades_before_switch: u32,
    /// Win rate below which an authoritative strategy is replaced.
    pub poor_performance_threshold: f64,
    pub switch_cooldown_ms: u64,
    pub test_trades_required: u32,
    pub test_pass_win_rate: f64,
    pub test_pass_profit_min: f64,
    /// Cumulative P&L (dollars) below which a strategy is replaced.
    pub loss_floor: f64,
    pub loss_floor_min_trades: u32,
    /// Closed trades kept per strategy for the rolling metrics.
    pub performance_window: usize,
    pub auto_switch_enabled: bool,
    pub inverse_mode: bool,
    pub decision_source: DecisionSource,
    pub position_sizing: PositionSizingConfig,
    pub ensemble: EnsembleConfig,
    pub strategies: Vec<StrategyConfig>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_trades_before_switch: 5,
            poor_performance_threshold: 0.25,
            switch_cooldown_ms: 5 * 60 * 1000,
            test_trades_required: 5,
            test_pass_win_rate: 0.40,
            test_pass_profit_min: 0.0,
            loss_floor: -20.0,
            loss_floor_min_trades: 10,
            performance_window: 100,
            auto_switch_enabled: true,
            inverse_mode: false,
            decision_source: DecisionSource::Adaptive,
            position_sizing: PositionSizingConfig::default(),
            ensemble: EnsembleConfig::default(),
            strategies: default_configs(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn switch_cooldown(&self) -> Duration {
        Duration::milliseconds(i64::try_from(self.switch_cooldown_ms).unwrap_or(i64::MAX))
    }

    /// Content hash of the configuration (blake3 over canonical JSON).
    ///
    /// Snapshots carry it so a restore under a different configuration is
    /// detectable.
    pub fn fingerprint(&self) -> String {
        match serde_json::to_vec(self) {
            Ok(bytes) => blake3::hash(&bytes).to_hex().to_string(),
            Err(_) => String::new(),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.test_trades_required == 0 {
            return Err(invalid("test_trades_required", "must be >= 1"));
        }
        if self.performance_window == 0 {
            return Err(invalid("performance_window", "must be >= 1"));
        }
        for (field, value) in [
            ("poor_performance_threshold", self.poor_performance_threshold),
            ("test_pass_win_rate", self.test_pass_win_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid(field, format!("must be in [0, 1], got {value}")));
            }
        }
        for (field, value) in [
            ("test_pass_profit_min", self.test_pass_profit_min),
            ("loss_floor", self.loss_floor),
        ] {
            if !value.is_finite() {
                return Err(invalid(field, "must be finite"));
            }
        }
        if !self.ensemble.flat_weight.is_finite() || self.ensemble.flat_weight < 0.0 {
            return Err(invalid("ensemble.flat_weight", "must be a non-negative number"));
        }
        self.position_sizing.validate()?;
        Ok(())
    }
}
