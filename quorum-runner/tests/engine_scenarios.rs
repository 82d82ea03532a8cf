//! BDD tests for the engine loop: decide → record_trade → decide.
//!
//! These tests drive the public `Engine` API only:
//! - Adaptive switching away from a losing strategy
//! - Cooldown producing exactly one switch
//! - Graduation after exactly `test_trades_required` trades
//! - Ranking idempotence
//! - Inverse mode and the ensemble decision source

use chrono::{DateTime, Duration, TimeZone, Utc};
use quorum_core::domain::{Action, MarketBar, MarketSeries, StrategyId};
use quorum_core::strategies::{CrossoverParams, Strategy, StrategyKind};
use quorum_runner::tracker::Graduation;
use quorum_runner::{DecisionSource, Engine, EngineConfig, SwitchReason};

// ── Helpers ──────────────────────────────────────────────────────────

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 3, 13, 30, 0).unwrap()
}

fn empty() -> MarketSeries {
    MarketSeries::new(Vec::new())
}

fn uptrend(n: usize) -> MarketSeries {
    let base = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    let closes: Vec<f64> = (0..n).map(|i| 100.0 + 0.1 * i as f64).collect();
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            MarketBar::new(
                base + Duration::days(i as i64),
                open,
                open.max(close) + 0.5,
                open.min(close) - 0.5,
                close,
                1_000.0,
            )
        })
        .collect();
    MarketSeries::new(bars)
}

fn record_all(engine: &Engine, id: &StrategyId, pnls: &[f64], at: DateTime<Utc>) {
    for (i, &pnl) in pnls.iter().enumerate() {
        engine
            .record_trade(id, "SPY", pnl, at + Duration::seconds(i as i64))
            .unwrap();
    }
}

// ── Adaptive switch ──────────────────────────────────────────────────

#[test]
fn bdd_scenario_losing_strategy_is_replaced_on_next_cycle() {
    // GIVEN an engine whose first cycle picked the first registered strategy
    let engine = Engine::new(EngineConfig::default()).unwrap();
    let first = engine.decide("SPY", &empty(), t0());
    let governing = first.switch.to.clone().unwrap();
    assert_eq!(governing.as_str(), "momentum_rsi");

    // AND that strategy then closes 6 trades: 1 win, 5 losses
    record_all(
        &engine,
        &governing,
        &[2.0, -1.0, -1.0, -1.0, -1.0, -1.0],
        t0() + Duration::minutes(1),
    );

    // WHEN the next cycle runs outside the cooldown window
    let next = engine.decide("SPY", &empty(), t0() + Duration::minutes(10));

    // THEN the selector switched away from it
    assert!(next.switch.switched);
    assert_eq!(next.switch.from.as_ref(), Some(&governing));
    assert_ne!(next.switch.to.as_ref(), Some(&governing));
    assert_eq!(next.strategy_id, next.switch.to);
}

#[test]
fn bdd_scenario_poor_win_rate_triggers_switch_during_long_probation() {
    // GIVEN probation long enough that 6 trades do not finish it
    let config = EngineConfig {
        test_trades_required: 10,
        ..EngineConfig::default()
    };
    let engine = Engine::new(config).unwrap();
    let governing = engine.decide("SPY", &empty(), t0()).switch.to.unwrap();

    // AND a win rate of 1/6
    record_all(
        &engine,
        &governing,
        &[2.0, -1.0, -1.0, -1.0, -1.0, -1.0],
        t0() + Duration::minutes(1),
    );

    // WHEN the next cycle runs
    let next = engine.decide("SPY", &empty(), t0() + Duration::minutes(10));

    // THEN the switch is attributed to the poor win rate
    assert!(next.switch.switched);
    assert_eq!(next.switch.reason, SwitchReason::PoorWinRate);
    assert_eq!(next.switch.to.as_ref().map(|id| id.as_str()), Some("trend_macd"));
}

// ── Cooldown ─────────────────────────────────────────────────────────

#[test]
fn bdd_scenario_cooldown_allows_exactly_one_switch() {
    // GIVEN the default 5 minute cooldown and an initial selection at t0
    let engine = Engine::new(EngineConfig::default()).unwrap();
    let first = engine.decide("SPY", &empty(), t0()).switch.to.unwrap();

    // AND the governing strategy fails probation a minute later
    record_all(&engine, &first, &[-1.0; 5], t0() + Duration::minutes(1));

    // WHEN cycles run every 30 seconds and the replacement also fails right away
    let mut switches = Vec::new();
    for step in 2..20 {
        let now = t0() + Duration::seconds(30 * step);
        let decision = engine.decide("SPY", &empty(), now);
        if decision.switch.switched {
            let to = decision.switch.to.clone().unwrap();
            record_all(&engine, &to, &[-1.0; 5], now + Duration::seconds(10));
            switches.push((now, decision.switch));
        }
    }

    // THEN exactly one switch happened inside the window, at the 5 minute mark
    assert_eq!(switches.len(), 1);
    let (at, switch) = &switches[0];
    assert_eq!(*at, t0() + Duration::minutes(5));
    assert_eq!(switch.reason, SwitchReason::FailedTesting);

    // AND the second failure is acted on once the new window has elapsed
    let later = engine.decide("SPY", &empty(), t0() + Duration::minutes(10));
    assert!(later.switch.switched);
    assert_eq!(later.switch.from, switch.to);
}

#[test]
fn bdd_scenario_auto_switch_disabled_keeps_governing_strategy() {
    let config = EngineConfig {
        auto_switch_enabled: false,
        ..EngineConfig::default()
    };
    let engine = Engine::new(config).unwrap();
    let governing = engine.decide("SPY", &empty(), t0()).switch.to.unwrap();
    record_all(&engine, &governing, &[-1.0; 5], t0());

    let next = engine.decide("SPY", &empty(), t0() + Duration::hours(1));
    assert!(!next.switch.switched);
    assert_eq!(next.switch.reason, SwitchReason::AutoSwitchDisabled);
    assert_eq!(next.strategy_id, Some(governing));
}

// ── Graduation ───────────────────────────────────────────────────────

#[test]
fn bdd_scenario_graduation_happens_on_exactly_the_required_trade() {
    let engine = Engine::new(EngineConfig::default()).unwrap();
    let id = StrategyId::new("band_bollinger");

    for i in 0..4 {
        let recorded = engine
            .record_trade(&id, "SPY", 1.0, t0() + Duration::minutes(i))
            .unwrap();
        assert!(recorded.graduation.is_none());
        assert!(recorded.status.in_testing());
    }

    let fifth = engine
        .record_trade(&id, "SPY", -0.5, t0() + Duration::minutes(5))
        .unwrap();
    assert_eq!(fifth.graduation, Some(Graduation::Passed));
    assert!(!fifth.status.in_testing());

    let sixth = engine
        .record_trade(&id, "SPY", 1.0, t0() + Duration::minutes(6))
        .unwrap();
    assert!(sixth.graduation.is_none());
}

// ── Ranking ──────────────────────────────────────────────────────────

#[test]
fn bdd_scenario_ranking_is_idempotent() {
    let engine = Engine::new(EngineConfig::default()).unwrap();
    record_all(&engine, &"trend_macd".into(), &[3.0, -1.0, 2.0], t0());
    record_all(&engine, &"stat_zscore".into(), &[-2.0, -2.0], t0());

    let first = engine.comparison();
    let second = engine.comparison();
    assert_eq!(first, second);
    assert_eq!(first.rankings.len(), 5);
    assert_eq!(
        first.top().map(|r| r.strategy_id.as_str()),
        Some("trend_macd")
    );
}

// ── Inverse mode and decision source ─────────────────────────────────

fn crossover_engine(inverse: bool) -> Engine {
    let config = EngineConfig {
        inverse_mode: inverse,
        ..EngineConfig::default()
    };
    let strategy =
        Strategy::from_kind(StrategyKind::Crossover(CrossoverParams::default())).unwrap();
    Engine::with_strategies(config, vec![strategy]).unwrap()
}

#[test]
fn bdd_scenario_inverse_mode_flips_direction_and_protective_levels() {
    // GIVEN a steady uptrend the crossover strategy reads as BUY
    let series = uptrend(60);
    let normal = crossover_engine(false).decide("SPY", &series, t0());
    assert_eq!(normal.action, Action::Buy);
    assert!(normal.size > 0.0);

    // WHEN the same cycle runs with inverse mode on
    let inverse = crossover_engine(true).decide("SPY", &series, t0());

    // THEN direction flips while confidence and size are unchanged
    assert_eq!(inverse.action, Action::Sell);
    assert_eq!(inverse.confidence, normal.confidence);
    assert_eq!(inverse.size, normal.size);
    assert_eq!(inverse.stop_loss, normal.take_profit);
    assert_eq!(inverse.take_profit, normal.stop_loss);
}

#[test]
fn bdd_scenario_inverse_mode_can_be_toggled_at_runtime() {
    let engine = crossover_engine(false);
    engine.set_inverse_mode(true);
    assert!(engine.state().inverse_mode);
    let decision = engine.decide("SPY", &uptrend(60), t0());
    assert_eq!(decision.action, Action::Sell);
}

#[test]
fn bdd_scenario_ensemble_source_is_not_attributed_to_one_strategy() {
    let config = EngineConfig {
        decision_source: DecisionSource::Ensemble,
        ..EngineConfig::default()
    };
    let engine = Engine::new(config).unwrap();
    let decision = engine.decide("SPY", &empty(), t0());
    assert_eq!(decision.action, Action::Hold);
    assert_eq!(decision.size, 0.0);
    assert!(decision.strategy_id.is_none());
    assert!(decision.switch.switched);
    let consensus = decision.consensus.unwrap();
    assert_eq!(consensus.votes.hold, 5);
}
