//! Property tests for performance tracking and selection.
//!
//! Uses proptest to verify:
//! 1. Counters: wins + losses never exceed trades, win rate in [0, 1],
//!    total P&L equals the sum of recorded P&L
//! 2. Graduation: the verdict arrives on exactly the Nth trade, never before
//! 3. Window: the trailing window never exceeds its configured length
//! 4. Ranking: repeated comparisons are identical and ranks are 1..=N

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use quorum_core::domain::{StrategyId, TradeRecord};
use quorum_runner::{PerformanceStore, TrackerConfig};

fn arb_pnls(max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(prop_oneof![Just(0.0), -25.0..25.0_f64], 0..max_len)
}

fn store(ids: &[&str], config: TrackerConfig) -> PerformanceStore {
    PerformanceStore::new(ids.iter().map(|id| StrategyId::new(*id)), config)
}

fn trade(pnl: f64, i: usize) -> TradeRecord {
    let base = Utc.with_ymd_and_hms(2024, 2, 1, 15, 0, 0).unwrap();
    TradeRecord::new("SPY", pnl, base + Duration::minutes(i as i64))
}

proptest! {
    #[test]
    fn counters_stay_consistent(pnls in arb_pnls(80)) {
        let id = StrategyId::new("a");
        let mut store = store(&["a"], TrackerConfig::default());
        for (i, &pnl) in pnls.iter().enumerate() {
            store.record(&id, trade(pnl, i)).unwrap();
        }
        let perf = store.get(&id).unwrap();
        prop_assert_eq!(perf.total_trades as usize, pnls.len());
        prop_assert!(perf.winning_trades + perf.losing_trades <= perf.total_trades);
        prop_assert!((0.0..=1.0).contains(&perf.win_rate));
        let sum: f64 = pnls.iter().sum();
        prop_assert!((perf.total_pnl - sum).abs() < 1e-6);
        prop_assert!(perf.max_drawdown >= 0.0);
        prop_assert!(perf.sharpe_ratio.is_finite());
    }

    #[test]
    fn graduation_arrives_on_exactly_the_required_trade(
        required in 1u32..12,
        pnls in arb_pnls(30),
    ) {
        let id = StrategyId::new("a");
        let config = TrackerConfig {
            test_trades_required: required,
            ..TrackerConfig::default()
        };
        let mut store = store(&["a"], config);
        for (i, &pnl) in pnls.iter().enumerate() {
            let recorded = store.record(&id, trade(pnl, i)).unwrap();
            prop_assert_eq!(recorded.graduation.is_some(), i + 1 == required as usize);
        }
    }

    #[test]
    fn trailing_window_is_bounded(window in 1usize..20, pnls in arb_pnls(60)) {
        let id = StrategyId::new("a");
        let config = TrackerConfig {
            window,
            ..TrackerConfig::default()
        };
        let mut store = store(&["a"], config);
        for (i, &pnl) in pnls.iter().enumerate() {
            store.record(&id, trade(pnl, i)).unwrap();
        }
        let perf = store.get(&id).unwrap();
        prop_assert_eq!(perf.recent_trades.len(), pnls.len().min(window));
    }

    #[test]
    fn ranking_is_idempotent_and_dense(a in arb_pnls(20), b in arb_pnls(20), c in arb_pnls(20)) {
        let mut store = store(&["a", "b", "c"], TrackerConfig::default());
        for (id, pnls) in [("a", &a), ("b", &b), ("c", &c)] {
            for (i, &pnl) in pnls.iter().enumerate() {
                store.record(&StrategyId::new(id), trade(pnl, i)).unwrap();
            }
        }
        let first = store.comparison();
        let second = store.comparison();
        prop_assert_eq!(&first, &second);
        let ranks: Vec<usize> = first.rankings.iter().map(|r| r.rank).collect();
        prop_assert_eq!(ranks, vec![1, 2, 3]);
        prop_assert!(first.rankings.windows(2).all(|w| w[0].score >= w[1].score));
    }
}
