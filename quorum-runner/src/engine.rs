//! Engine — the single entry point callers talk to.
//!
//! Owns the strategy registry (immutable after construction) and one
//! `Mutex<EngineState>` holding everything that changes: performance records,
//! the authoritative strategy, the last switch time and the inverse flag.
//! Trade feedback and the selection step both take the lock; strategy
//! evaluation runs on a cloned performance snapshot outside it.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use quorum_core::domain::{
    Action, MarketSeries, Signal, StrategyId, StrategyPerformance, TradeRecord,
};
use quorum_core::ensemble::{analyze_all, Consensus, EnsembleResult};
use quorum_core::sizing::PositionSizer;
use quorum_core::strategies::{build_registry, RegistrationError, Strategy};

use crate::config::{ConfigError, DecisionSource, EngineConfig};
use crate::selector::{
    AdaptiveSelector, SelectionState, SelectorConfig, SelectorError, SwitchReason, SwitchResult,
};
use crate::snapshot::EngineSnapshot;
use crate::tracker::{
    PerformanceStore, StrategyComparison, TrackerConfig, TrackerError, TradeRecorded,
};

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    #[error(transparent)]
    Selector(#[from] SelectorError),
}

/// Mutable engine state. Only reachable through the engine's lock.
#[derive(Debug, Clone)]
pub struct EngineState {
    pub store: PerformanceStore,
    pub selection: SelectionState,
    pub inverse_mode: bool,
}

/// Read-only copy of the engine state handed to callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineStateView {
    pub authoritative: Option<StrategyId>,
    pub last_switch: Option<DateTime<Utc>>,
    pub inverse_mode: bool,
    pub performances: Vec<StrategyPerformance>,
}

/// The engine's answer for one symbol and one evaluation cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub action: Action,
    pub confidence: f64,
    /// Dollars; 0 for HOLD.
    pub size: f64,
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
    pub reason: String,
    /// Strategy whose signal drove the decision, if any.
    pub strategy_id: Option<StrategyId>,
    pub switch: SwitchResult,
    pub consensus: Option<Consensus>,
}

impl Decision {
    /// HOLD with zero size when no strategy can govern.
    fn cold(symbol: &str, now: DateTime<Utc>, switch: SwitchResult) -> Self {
        Self {
            symbol: symbol.to_string(),
            timestamp: now,
            action: Action::Hold,
            confidence: 0.0,
            size: 0.0,
            stop_loss: None,
            take_profit: None,
            reason: switch.reason.to_string(),
            strategy_id: None,
            switch,
            consensus: None,
        }
    }
}

pub struct Engine {
    config: EngineConfig,
    strategies: Vec<Strategy>,
    registration_errors: Vec<RegistrationError>,
    selector: AdaptiveSelector,
    sizer: PositionSizer,
    state: Mutex<EngineState>,
}

impl Engine {
    /// Validate the configuration and build the registry from it.
    ///
    /// Invalid strategy entries are excluded (see `registration_errors`),
    /// never fatal.
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let (strategies, registration_errors) = build_registry(&config.strategies);
        Ok(Self::assemble(config, strategies, registration_errors))
    }

    /// Engine over an explicit strategy list; `config.strategies` is ignored.
    ///
    /// A strategy reusing an earlier id is excluded, as in `build_registry`.
    pub fn with_strategies(
        config: EngineConfig,
        strategies: Vec<Strategy>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        let mut seen = HashSet::new();
        let mut kept = Vec::with_capacity(strategies.len());
        let mut errors = Vec::new();
        for strategy in strategies {
            if seen.insert(strategy.id.clone()) {
                kept.push(strategy);
            } else {
                warn!(strategy = %strategy.id, "duplicate strategy id excluded");
                errors.push(RegistrationError::DuplicateId(strategy.id));
            }
        }
        Ok(Self::assemble(config, kept, errors))
    }

    fn assemble(
        config: EngineConfig,
        strategies: Vec<Strategy>,
        registration_errors: Vec<RegistrationError>,
    ) -> Self {
        // Disabled strategies never govern, so they get no performance record.
        let ids = strategies
            .iter()
            .filter(|s| s.enabled)
            .map(|s| s.id.clone());
        let store = PerformanceStore::new(
            ids,
            TrackerConfig {
                window: config.performance_window,
                test_trades_required: config.test_trades_required,
                test_pass_win_rate: config.test_pass_win_rate,
                test_pass_profit_min: config.test_pass_profit_min,
            },
        );
        let selector = AdaptiveSelector::new(SelectorConfig {
            min_trades_before_switch: config.min_trades_before_switch,
            poor_performance_threshold: config.poor_performance_threshold,
            switch_cooldown: config.switch_cooldown(),
            loss_floor: config.loss_floor,
            loss_floor_min_trades: config.loss_floor_min_trades,
            auto_switch_enabled: config.auto_switch_enabled,
        });
        let sizer = PositionSizer::new(config.position_sizing.clone());
        let state = Mutex::new(EngineState {
            store,
            selection: SelectionState::default(),
            inverse_mode: config.inverse_mode,
        });
        info!(
            strategies = strategies.len(),
            excluded = registration_errors.len(),
            fingerprint = %config.fingerprint(),
            "engine ready"
        );
        Self {
            config,
            strategies,
            registration_errors,
            selector,
            sizer,
            state,
        }
    }

    fn lock(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn strategies(&self) -> &[Strategy] {
        &self.strategies
    }

    pub fn registration_errors(&self) -> &[RegistrationError] {
        &self.registration_errors
    }

    /// Run one decision cycle for `symbol`.
    pub fn decide(&self, symbol: &str, series: &MarketSeries, now: DateTime<Utc>) -> Decision {
        let (switch, governing, performances, inverse) = {
            let mut guard = self.lock();
            let state = &mut *guard;
            let switch = self.selector.select(&mut state.selection, &mut state.store, now);
            let governing = state
                .selection
                .authoritative
                .as_ref()
                .and_then(|id| state.store.get(id))
                .cloned();
            (
                switch,
                governing,
                state.store.records().to_vec(),
                state.inverse_mode,
            )
        };

        let Some(governing) = governing else {
            let decision = Decision::cold(symbol, now, switch);
            info!(symbol, reason = %decision.reason, "cold decision");
            return decision;
        };

        let ensemble = analyze_all(&self.strategies, series, &performances, &self.config.ensemble);
        let (signal, driver) = self.pick_signal(&ensemble, &governing.strategy_id);
        let signal = if inverse { signal.inverted() } else { signal };

        let size = if signal.action.is_directional() {
            self.sizer.size(&governing, signal.confidence)
        } else {
            0.0
        };

        let decision = Decision {
            symbol: symbol.to_string(),
            timestamp: now,
            action: signal.action,
            confidence: signal.confidence,
            size,
            stop_loss: signal.stop_loss,
            take_profit: signal.take_profit,
            reason: signal.reason,
            strategy_id: driver,
            switch,
            consensus: Some(ensemble.consensus),
        };
        info!(
            symbol,
            action = %decision.action,
            confidence = decision.confidence,
            size = decision.size,
            strategy = decision.strategy_id.as_ref().map(|id| id.as_str()).unwrap_or("ensemble"),
            "decision"
        );
        decision
    }

    fn pick_signal(
        &self,
        ensemble: &EnsembleResult,
        governing: &StrategyId,
    ) -> (Signal, Option<StrategyId>) {
        match self.config.decision_source {
            DecisionSource::Ensemble => (ensemble.weighted_signal.clone(), None),
            DecisionSource::Adaptive => ensemble
                .signals
                .iter()
                .find(|s| &s.strategy_id == governing)
                .map(|s| (s.signal.clone(), Some(governing.clone())))
                .unwrap_or_else(|| {
                    (
                        Signal::hold(format!("{governing}: no signal this cycle")),
                        Some(governing.clone()),
                    )
                }),
        }
    }

    /// Feed back one closed trade. The only write path into performance.
    pub fn record_trade(
        &self,
        strategy_id: &StrategyId,
        symbol: &str,
        realized_pnl: f64,
        closed_at: DateTime<Utc>,
    ) -> Result<TradeRecorded, EngineError> {
        let trade = TradeRecord::new(symbol, realized_pnl, closed_at);
        let recorded = self.lock().store.record(strategy_id, trade)?;
        Ok(recorded)
    }

    /// Replace performance records with persisted ones; returns how many loaded.
    pub fn load_performances(&self, performances: Vec<StrategyPerformance>) -> usize {
        self.lock().store.load(performances)
    }

    pub fn force_strategy(
        &self,
        id: &StrategyId,
        now: DateTime<Utc>,
    ) -> Result<SwitchResult, EngineError> {
        let mut guard = self.lock();
        let state = &mut *guard;
        Ok(self
            .selector
            .force(&mut state.selection, &state.store, id, now)?)
    }

    /// Put every strategy back into probation now.
    pub fn reset_testing(&self) -> SwitchResult {
        let mut guard = self.lock();
        guard.store.reset_testing();
        let from = guard.selection.authoritative.take();
        SwitchResult {
            switched: from.is_some(),
            from,
            to: None,
            reason: SwitchReason::GlobalReset,
            detail: "manual reset".to_string(),
        }
    }

    pub fn set_inverse_mode(&self, enabled: bool) {
        let mut guard = self.lock();
        if guard.inverse_mode != enabled {
            info!(enabled, "inverse mode changed");
        }
        guard.inverse_mode = enabled;
    }

    pub fn state(&self) -> EngineStateView {
        let guard = self.lock();
        EngineStateView {
            authoritative: guard.selection.authoritative.clone(),
            last_switch: guard.selection.last_switch,
            inverse_mode: guard.inverse_mode,
            performances: guard.store.records().to_vec(),
        }
    }

    pub fn comparison(&self) -> StrategyComparison {
        self.lock().store.comparison()
    }

    pub fn snapshot(&self, now: DateTime<Utc>) -> EngineSnapshot {
        EngineSnapshot::new(&self.config, self.state(), now)
    }

    /// Restore selection state and performance from a snapshot.
    ///
    /// A snapshot taken under a different configuration still restores;
    /// the mismatch is logged.
    pub fn restore(&self, snapshot: EngineSnapshot) -> usize {
        if snapshot.config_fingerprint != self.config.fingerprint() {
            warn!(
                saved = %snapshot.config_fingerprint,
                current = %self.config.fingerprint(),
                "snapshot was taken under a different configuration"
            );
        }
        let mut guard = self.lock();
        let state = &mut *guard;
        let loaded = state.store.load(snapshot.performances);
        let authoritative = snapshot
            .authoritative
            .filter(|id| state.store.get(id).is_some());
        state.selection = SelectionState {
            authoritative,
            last_switch: snapshot.last_switch,
        };
        state.inverse_mode = snapshot.inverse_mode;
        loaded
    }
}
