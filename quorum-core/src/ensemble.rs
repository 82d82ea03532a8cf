//! Ensemble aggregator — runs every enabled strategy and combines the results.
//!
//! Two views of the same signal set:
//! - **consensus**: one strategy, one vote; a tie for the top count is HOLD;
//! - **weighted signal**: votes weighted by each strategy's track record (or
//!   a manual override), confidence averaged over the winning side.
//!
//! Strategies are evaluated in parallel with rayon; results are collected in
//! registry order so every downstream sum runs in a fixed order and the
//! result is deterministic.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::{Action, MarketSeries, Signal, StrategyId, StrategyPerformance};
use crate::strategies::Strategy;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnsembleConfig {
    /// Closed trades required before the performance-derived weight applies.
    pub min_trades_for_weighting: u32,
    /// Weight of a strategy without enough history.
    pub flat_weight: f64,
    /// Evaluate strategies on the rayon pool.
    pub parallel: bool,
}

impl Default for EnsembleConfig {
    fn default() -> Self {
        Self {
            min_trades_for_weighting: 10,
            flat_weight: 0.5,
            parallel: true,
        }
    }
}

/// One strategy's output for the current cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySignal {
    pub strategy_id: StrategyId,
    pub weight: f64,
    pub signal: Signal,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct VoteCount {
    pub buy: usize,
    pub sell: usize,
    pub hold: usize,
}

impl VoteCount {
    pub fn total(&self) -> usize {
        self.buy + self.sell + self.hold
    }

    fn add(&mut self, action: Action) {
        match action {
            Action::Buy => self.buy += 1,
            Action::Sell => self.sell += 1,
            Action::Hold => self.hold += 1,
        }
    }

    fn get(&self, action: Action) -> usize {
        match action {
            Action::Buy => self.buy,
            Action::Sell => self.sell,
            Action::Hold => self.hold,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consensus {
    pub action: Action,
    /// Share of votes cast for the winning action; 0 when nothing voted.
    pub agreement: f64,
    pub votes: VoteCount,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnsembleResult {
    pub signals: Vec<StrategySignal>,
    pub consensus: Consensus,
    pub weighted_signal: Signal,
    pub best_strategy: Option<StrategyId>,
}

/// Ensemble weight of a strategy: manual override, else track record, else flat.
pub fn strategy_weight(
    strategy: &Strategy,
    performance: Option<&StrategyPerformance>,
    config: &EnsembleConfig,
) -> f64 {
    if let Some(weight) = strategy.weight {
        return weight;
    }
    match performance {
        Some(perf) if perf.total_trades >= config.min_trades_for_weighting => {
            let sharpe = (perf.sharpe_ratio / 2.0).clamp(0.0, 1.0);
            let profitable = if perf.is_profitable() { 1.0 } else { 0.0 };
            0.35 * perf.win_rate + 0.25 * sharpe + 0.25 * perf.consistency + 0.15 * profitable
        }
        _ => config.flat_weight,
    }
}

/// Run every enabled strategy over `series` and aggregate.
pub fn analyze_all(
    strategies: &[Strategy],
    series: &MarketSeries,
    performances: &[StrategyPerformance],
    config: &EnsembleConfig,
) -> EnsembleResult {
    let enabled: Vec<&Strategy> = strategies.iter().filter(|s| s.enabled).collect();

    let evaluate = |strategy: &&Strategy| {
        let perf = performances.iter().find(|p| p.strategy_id == strategy.id);
        StrategySignal {
            strategy_id: strategy.id.clone(),
            weight: strategy_weight(strategy, perf, config),
            signal: strategy.analyze(series),
        }
    };
    let signals: Vec<StrategySignal> = if config.parallel {
        enabled.par_iter().map(evaluate).collect()
    } else {
        enabled.iter().map(evaluate).collect()
    };

    let consensus = consensus(&signals);
    let weighted_signal = weighted_signal(&signals);
    let best_strategy = best_strategy(&signals);

    debug!(
        strategies = signals.len(),
        consensus = %consensus.action,
        agreement = consensus.agreement,
        weighted = %weighted_signal.action,
        confidence = weighted_signal.confidence,
        "ensemble evaluated"
    );

    EnsembleResult {
        signals,
        consensus,
        weighted_signal,
        best_strategy,
    }
}

/// Majority vote. A tie for the most votes resolves to HOLD.
pub fn consensus(signals: &[StrategySignal]) -> Consensus {
    let mut votes = VoteCount::default();
    for s in signals {
        votes.add(s.signal.action);
    }
    let total = votes.total();
    if total == 0 {
        return Consensus {
            action: Action::Hold,
            agreement: 0.0,
            votes,
        };
    }

    let max = Action::ALL.iter().map(|&a| votes.get(a)).max().unwrap_or(0);
    let leaders: Vec<Action> = Action::ALL
        .iter()
        .copied()
        .filter(|&a| votes.get(a) == max)
        .collect();
    let action = match leaders.as_slice() {
        [single] => *single,
        _ => Action::Hold,
    };

    Consensus {
        action,
        agreement: max as f64 / total as f64,
        votes,
    }
}

/// Weight-normalized composite signal. Equal top weights resolve to HOLD.
pub fn weighted_signal(signals: &[StrategySignal]) -> Signal {
    let total_weight: f64 = signals.iter().map(|s| s.weight).sum();
    if signals.is_empty() || total_weight <= 0.0 {
        return Signal::hold("ensemble: no weighted votes");
    }

    let side_weight = |action: Action| -> f64 {
        signals
            .iter()
            .filter(|s| s.signal.action == action)
            .map(|s| s.weight)
            .sum()
    };
    let weights: Vec<(Action, f64)> = Action::ALL.iter().map(|&a| (a, side_weight(a))).collect();
    let top = weights
        .iter()
        .map(|&(_, w)| w)
        .fold(f64::NEG_INFINITY, f64::max);
    let leaders: Vec<Action> = weights
        .iter()
        .filter(|&&(_, w)| w == top)
        .map(|&(a, _)| a)
        .collect();

    let action = match leaders.as_slice() {
        [single] => *single,
        _ => {
            return Signal::hold(format!(
                "ensemble: tied weight {:.2} between {}",
                top / total_weight,
                leaders
                    .iter()
                    .map(|a| a.to_string())
                    .collect::<Vec<_>>()
                    .join("/")
            ))
        }
    };
    if action == Action::Hold {
        return Signal::hold(format!(
            "ensemble: HOLD carries {:.0}% of weight",
            top / total_weight * 100.0
        ));
    }

    let voters: Vec<&StrategySignal> =
        signals.iter().filter(|s| s.signal.action == action).collect();
    let confidence = voters.iter().map(|s| s.weight * s.signal.confidence).sum::<f64>() / top;
    let risk = voters.iter().map(|s| s.weight * s.signal.risk_score).sum::<f64>() / top;

    // Protective levels come from the heaviest voter (first in registry order on ties).
    let lead = voters.iter().fold(None::<&StrategySignal>, |best, s| match best {
        Some(b) if b.weight >= s.weight => Some(b),
        _ => Some(s),
    });

    let mut signal = Signal::new(
        action,
        confidence,
        risk,
        format!(
            "ensemble: {action} with {:.0}% of weight ({}/{} strategies)",
            top / total_weight * 100.0,
            voters.len(),
            signals.len()
        ),
    );
    if let Some(lead) = lead {
        signal.stop_loss = lead.signal.stop_loss;
        signal.take_profit = lead.signal.take_profit;
    }
    signal
}

/// Highest-weighted strategy; ties go to the earliest registered.
pub fn best_strategy(signals: &[StrategySignal]) -> Option<StrategyId> {
    signals
        .iter()
        .fold(None::<&StrategySignal>, |best, s| match best {
            Some(b) if b.weight >= s.weight => Some(b),
            _ => Some(s),
        })
        .map(|s| s.strategy_id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vote(id: &str, action: Action, confidence: f64, weight: f64) -> StrategySignal {
        StrategySignal {
            strategy_id: StrategyId::new(id),
            weight,
            signal: Signal::new(action, confidence, 0.4, id),
        }
    }

    #[test]
    fn majority_wins_consensus() {
        let signals = vec![
            vote("a", Action::Buy, 0.7, 0.5),
            vote("b", Action::Buy, 0.6, 0.5),
            vote("c", Action::Sell, 0.9, 0.5),
        ];
        let c = consensus(&signals);
        assert_eq!(c.action, Action::Buy);
        assert!((c.agreement - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(c.votes, VoteCount { buy: 2, sell: 1, hold: 0 });
    }

    #[test]
    fn tied_vote_is_hold() {
        let signals = vec![
            vote("a", Action::Buy, 0.7, 0.5),
            vote("b", Action::Sell, 0.6, 0.5),
        ];
        let c = consensus(&signals);
        assert_eq!(c.action, Action::Hold);
        assert!((c.agreement - 0.5).abs() < 1e-12);
    }

    #[test]
    fn empty_consensus_is_hold_with_zero_agreement() {
        let c = consensus(&[]);
        assert_eq!(c.action, Action::Hold);
        assert_eq!(c.agreement, 0.0);
    }

    #[test]
    fn weighted_confidence_is_weight_normalized_mean() {
        let signals = vec![
            vote("a", Action::Buy, 0.8, 0.75),
            vote("b", Action::Buy, 0.4, 0.25),
            vote("c", Action::Sell, 0.9, 0.5),
        ];
        let s = weighted_signal(&signals);
        assert_eq!(s.action, Action::Buy);
        assert!((s.confidence - (0.8 * 0.75 + 0.4 * 0.25)).abs() < 1e-12);
    }

    #[test]
    fn heavier_minority_beats_lighter_majority() {
        let signals = vec![
            vote("a", Action::Sell, 0.8, 0.9),
            vote("b", Action::Buy, 0.6, 0.3),
            vote("c", Action::Buy, 0.6, 0.3),
        ];
        assert_eq!(consensus(&signals).action, Action::Buy);
        assert_eq!(weighted_signal(&signals).action, Action::Sell);
    }

    #[test]
    fn equal_top_weights_are_hold() {
        let signals = vec![
            vote("a", Action::Buy, 0.8, 0.5),
            vote("b", Action::Sell, 0.8, 0.5),
        ];
        let s = weighted_signal(&signals);
        assert_eq!(s.action, Action::Hold);
        assert_eq!(s.confidence, 0.0);
        assert!(s.reason.contains("tied"));
    }

    #[test]
    fn best_strategy_ties_go_to_registry_order() {
        let signals = vec![
            vote("a", Action::Hold, 0.0, 0.5),
            vote("b", Action::Buy, 0.6, 0.7),
            vote("c", Action::Buy, 0.6, 0.7),
        ];
        assert_eq!(best_strategy(&signals), Some(StrategyId::new("b")));
        assert_eq!(best_strategy(&[]), None);
    }

    #[test]
    fn weight_uses_track_record_after_enough_trades() {
        let strategy = crate::strategies::default_registry().remove(0);
        let config = EnsembleConfig::default();
        let mut perf = StrategyPerformance::new(strategy.id.clone(), 5);
        perf.total_trades = 9;
        assert_eq!(strategy_weight(&strategy, Some(&perf), &config), 0.5);

        perf.total_trades = 12;
        perf.win_rate = 0.6;
        perf.sharpe_ratio = 3.0;
        perf.consistency = 0.6;
        perf.total_pnl = 14.0;
        let w = strategy_weight(&strategy, Some(&perf), &config);
        assert!((w - (0.35 * 0.6 + 0.25 + 0.25 * 0.6 + 0.15)).abs() < 1e-12);

        let manual = strategy.with_weight(2.0);
        assert_eq!(strategy_weight(&manual, Some(&perf), &config), 2.0);
    }
}
