//! Adaptive selector — decides which strategy governs trading.
//!
//! Each decision cycle produces exactly one `SwitchResult`, whether or not
//! anything changed. Switch triggers, in priority order:
//! 1. the authoritative strategy completed probation and failed;
//! 2. its win rate fell below the poor-performance threshold with enough trades;
//! 3. its cumulative P&L fell below the loss floor with enough trades.
//!
//! No trigger is evaluated inside the cooldown window that follows a switch.

use std::cmp::Ordering;
use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use quorum_core::domain::{StrategyId, StrategyPerformance, TestingStatus};

use crate::tracker::PerformanceStore;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SelectorError {
    #[error("unknown strategy: {0}")]
    UnknownStrategy(StrategyId),
    #[error("strategy {0} failed testing and cannot govern until a reset")]
    StrategyFailed(StrategyId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectorConfig {
    pub min_trades_before_switch: u32,
    pub poor_performance_threshold: f64,
    pub switch_cooldown: Duration,
    pub loss_floor: f64,
    pub loss_floor_min_trades: u32,
    pub auto_switch_enabled: bool,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            min_trades_before_switch: 5,
            poor_performance_threshold: 0.25,
            switch_cooldown: Duration::minutes(5),
            loss_floor: -20.0,
            loss_floor_min_trades: 10,
            auto_switch_enabled: true,
        }
    }
}

/// Who governs, and since when.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionState {
    pub authoritative: Option<StrategyId>,
    pub last_switch: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SwitchReason {
    /// Nothing governed; the best candidate was picked.
    InitialSelection,
    FailedTesting,
    PoorWinRate,
    LossFloor,
    /// Operator override via `force_strategy`.
    Manual,
    /// Every strategy failed probation; all were put back into testing.
    GlobalReset,
    /// Nothing is eligible to govern.
    NoEligibleStrategy,
    CooldownActive,
    AutoSwitchDisabled,
    /// No trigger fired.
    Retained,
}

impl SwitchReason {
    fn is_trigger(self) -> bool {
        matches!(
            self,
            SwitchReason::FailedTesting | SwitchReason::PoorWinRate | SwitchReason::LossFloor
        )
    }
}

impl fmt::Display for SwitchReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SwitchReason::InitialSelection => "initial selection",
            SwitchReason::FailedTesting => "failed testing",
            SwitchReason::PoorWinRate => "poor win rate",
            SwitchReason::LossFloor => "loss floor breached",
            SwitchReason::Manual => "manual override",
            SwitchReason::GlobalReset => "all strategies failed testing",
            SwitchReason::NoEligibleStrategy => "no eligible strategy",
            SwitchReason::CooldownActive => "cooldown active",
            SwitchReason::AutoSwitchDisabled => "auto switch disabled",
            SwitchReason::Retained => "retained",
        };
        f.write_str(s)
    }
}

/// Explicit outcome of one selection step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchResult {
    pub switched: bool,
    pub from: Option<StrategyId>,
    pub to: Option<StrategyId>,
    pub reason: SwitchReason,
    pub detail: String,
}

impl SwitchResult {
    fn unchanged(current: Option<StrategyId>, reason: SwitchReason, detail: String) -> Self {
        Self {
            switched: false,
            from: current.clone(),
            to: current,
            reason,
            detail,
        }
    }
}

/// Candidate order: probation first, then total P&L, then win rate.
/// Callers break remaining ties by registration order.
fn candidate_order(a: &StrategyPerformance, b: &StrategyPerformance) -> Ordering {
    let testing = |p: &StrategyPerformance| p.status().in_testing();
    testing(b)
        .cmp(&testing(a))
        .then_with(|| b.total_pnl.total_cmp(&a.total_pnl))
        .then_with(|| b.win_rate.total_cmp(&a.win_rate))
}

#[derive(Debug, Clone, PartialEq)]
pub struct AdaptiveSelector {
    config: SelectorConfig,
}

impl AdaptiveSelector {
    pub fn new(config: SelectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SelectorConfig {
        &self.config
    }

    /// Best non-failed strategy, optionally excluding one id.
    pub fn best_candidate(
        &self,
        store: &PerformanceStore,
        exclude: Option<&StrategyId>,
    ) -> Option<StrategyId> {
        store
            .records()
            .iter()
            .filter(|p| p.status().is_eligible())
            .filter(|p| Some(&p.strategy_id) != exclude)
            // min_by keeps the first of equal elements: registration order.
            .min_by(|a, b| candidate_order(a, b))
            .map(|p| p.strategy_id.clone())
    }

    /// First switch trigger that applies to `perf`, if any.
    pub fn trigger(&self, perf: &StrategyPerformance) -> Option<(SwitchReason, String)> {
        let c = &self.config;
        if perf.status() == TestingStatus::Failed {
            return Some((
                SwitchReason::FailedTesting,
                format!(
                    "test win rate {:.0}%, test P&L {:.2}",
                    perf.testing.test_win_rate * 100.0,
                    perf.testing.test_pnl
                ),
            ));
        }
        if perf.total_trades >= c.min_trades_before_switch
            && perf.win_rate < c.poor_performance_threshold
        {
            return Some((
                SwitchReason::PoorWinRate,
                format!(
                    "win rate {:.1}% below {:.0}% after {} trades",
                    perf.win_rate * 100.0,
                    c.poor_performance_threshold * 100.0,
                    perf.total_trades
                ),
            ));
        }
        if perf.total_trades >= c.loss_floor_min_trades && perf.total_pnl < c.loss_floor {
            return Some((
                SwitchReason::LossFloor,
                format!(
                    "P&L {:.2} below floor {:.2} after {} trades",
                    perf.total_pnl, c.loss_floor, perf.total_trades
                ),
            ));
        }
        None
    }

    fn switch_to(
        &self,
        state: &mut SelectionState,
        to: StrategyId,
        reason: SwitchReason,
        detail: String,
        now: DateTime<Utc>,
    ) -> SwitchResult {
        let from = state.authoritative.replace(to.clone());
        state.last_switch = Some(now);
        info!(
            from = from.as_ref().map(|id| id.as_str()).unwrap_or("-"),
            to = %to,
            reason = %reason,
            detail = %detail,
            "strategy switch"
        );
        SwitchResult {
            switched: true,
            from,
            to: Some(to),
            reason,
            detail,
        }
    }

    /// One selection step.
    ///
    /// When every strategy has failed probation the store is reset and no
    /// strategy governs for this cycle.
    pub fn select(
        &self,
        state: &mut SelectionState,
        store: &mut PerformanceStore,
        now: DateTime<Utc>,
    ) -> SwitchResult {
        if store.all_failed() {
            store.reset_testing();
            let from = state.authoritative.take();
            warn!("all strategies failed testing, probation restarted");
            return SwitchResult {
                switched: from.is_some(),
                from,
                to: None,
                reason: SwitchReason::GlobalReset,
                detail: format!("{} strategies returned to testing", store.len()),
            };
        }

        // An id that is no longer registered counts as nothing governing.
        let current = state
            .authoritative
            .clone()
            .filter(|id| store.get(id).is_some());

        let Some(current) = current else {
            return match self.best_candidate(store, None) {
                Some(to) => self.switch_to(
                    state,
                    to,
                    SwitchReason::InitialSelection,
                    "best available candidate".to_string(),
                    now,
                ),
                None => {
                    state.authoritative = None;
                    SwitchResult::unchanged(
                        None,
                        SwitchReason::NoEligibleStrategy,
                        "no registered strategy can govern".to_string(),
                    )
                }
            };
        };

        if !self.config.auto_switch_enabled {
            return SwitchResult::unchanged(
                Some(current),
                SwitchReason::AutoSwitchDisabled,
                String::new(),
            );
        }

        if let Some(last) = state.last_switch {
            let elapsed = now - last;
            if elapsed < self.config.switch_cooldown {
                let remaining = self.config.switch_cooldown - elapsed;
                return SwitchResult::unchanged(
                    Some(current),
                    SwitchReason::CooldownActive,
                    format!("{}s until next switch", remaining.num_seconds()),
                );
            }
        }

        let Some(perf) = store.get(&current) else {
            return SwitchResult::unchanged(Some(current), SwitchReason::Retained, String::new());
        };
        let Some((reason, detail)) = self.trigger(perf) else {
            return SwitchResult::unchanged(Some(current), SwitchReason::Retained, String::new());
        };
        debug_assert!(reason.is_trigger());

        match self.best_candidate(store, Some(&current)) {
            Some(to) => self.switch_to(state, to, reason, detail, now),
            None => {
                warn!(
                    strategy = %current,
                    reason = %reason,
                    "switch warranted but no eligible alternative"
                );
                SwitchResult::unchanged(
                    Some(current),
                    reason,
                    format!("{detail}; no eligible alternative"),
                )
            }
        }
    }

    /// Make `id` authoritative now and restart the cooldown window.
    pub fn force(
        &self,
        state: &mut SelectionState,
        store: &PerformanceStore,
        id: &StrategyId,
        now: DateTime<Utc>,
    ) -> Result<SwitchResult, SelectorError> {
        let status = store
            .status(id)
            .ok_or_else(|| SelectorError::UnknownStrategy(id.clone()))?;
        if !status.is_eligible() {
            return Err(SelectorError::StrategyFailed(id.clone()));
        }
        Ok(self.switch_to(
            state,
            id.clone(),
            SwitchReason::Manual,
            "forced by operator".to_string(),
            now,
        ))
    }
}

impl Default for AdaptiveSelector {
    fn default() -> Self {
        Self::new(SelectorConfig::default())
    }
}
