//! Performance tracker — the only writer of per-strategy performance records.
//!
//! Every closed trade is appended to a bounded trailing window and all derived
//! metrics are recomputed over that window (O(window) per trade). Cumulative
//! totals are kept outside the window, so they survive trades rolling off.
//!
//! Probation: while a record is in testing mode each trade also counts toward
//! its test. When the required number of test trades is reached the verdict
//! is computed exactly once and testing mode switches off until a global reset.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use quorum_core::domain::{
    StrategyId, StrategyPerformance, TestingRecord, TestingStatus, TradeRecord,
};
use quorum_core::indicators::stats;

/// Annualization basis for the Sharpe-like ratio.
const TRADING_DAYS: f64 = 252.0;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TrackerError {
    #[error("unknown strategy: {0}")]
    UnknownStrategy(StrategyId),
    #[error("non-finite P&L for strategy {0}")]
    NonFinitePnl(StrategyId),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackerConfig {
    pub window: usize,
    pub test_trades_required: u32,
    pub test_pass_win_rate: f64,
    pub test_pass_profit_min: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            window: 100,
            test_trades_required: 5,
            test_pass_win_rate: 0.40,
            test_pass_profit_min: 0.0,
        }
    }
}

/// Probation verdict, reported on the trade that completes the test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Graduation {
    Passed,
    Failed,
}

/// Outcome of recording one trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecorded {
    pub strategy_id: StrategyId,
    pub total_trades: u32,
    pub win_rate: f64,
    pub total_pnl: f64,
    pub status: TestingStatus,
    /// Set only on the trade that completed probation.
    pub graduation: Option<Graduation>,
}

// ─── Metric computation ──────────────────────────────────────────────

/// Mean over sample standard deviation of window P&L, scaled by sqrt(252/N).
/// Fewer than two trades or zero variance gives 0.
pub fn sharpe_ratio(pnls: &[f64]) -> f64 {
    let n = pnls.len();
    if n < 2 {
        return 0.0;
    }
    let sd = stats::sample_std_dev(pnls);
    if sd <= f64::EPSILON {
        return 0.0;
    }
    stats::mean(pnls) / sd * (TRADING_DAYS / n as f64).sqrt()
}

/// (max drawdown, current drawdown) in dollars over the cumulative P&L path.
/// The running peak starts at zero.
pub fn drawdowns(pnls: &[f64]) -> (f64, f64) {
    let mut equity = 0.0;
    let mut peak = 0.0_f64;
    let mut max_dd = 0.0_f64;
    for pnl in pnls {
        equity += pnl;
        peak = peak.max(equity);
        max_dd = max_dd.max(peak - equity);
    }
    (max_dd, peak - equity)
}

fn recompute_window_metrics(perf: &mut StrategyPerformance) {
    let pnls: Vec<f64> = perf.recent_trades.iter().map(|t| t.pnl).collect();
    perf.sharpe_ratio = sharpe_ratio(&pnls);
    let (max_dd, current_dd) = drawdowns(&pnls);
    perf.max_drawdown = max_dd;
    perf.current_drawdown = current_dd;
    perf.consistency = if pnls.is_empty() {
        0.0
    } else {
        pnls.iter().filter(|&&p| p > 0.0).count() as f64 / pnls.len() as f64
    };
}

// ─── Store ───────────────────────────────────────────────────────────

/// One performance record per registered strategy, in registration order.
#[derive(Debug, Clone, PartialEq)]
pub struct PerformanceStore {
    config: TrackerConfig,
    records: Vec<StrategyPerformance>,
}

impl PerformanceStore {
    pub fn new(ids: impl IntoIterator<Item = StrategyId>, config: TrackerConfig) -> Self {
        let records = ids
            .into_iter()
            .map(|id| StrategyPerformance::new(id, config.test_trades_required))
            .collect();
        Self { config, records }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    pub fn records(&self) -> &[StrategyPerformance] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: &StrategyId) -> Option<&StrategyPerformance> {
        self.records.iter().find(|p| &p.strategy_id == id)
    }

    pub fn status(&self, id: &StrategyId) -> Option<TestingStatus> {
        self.get(id).map(StrategyPerformance::status)
    }

    /// True when the store is non-empty and every record failed probation.
    pub fn all_failed(&self) -> bool {
        !self.records.is_empty()
            && self
                .records
                .iter()
                .all(|p| p.status() == TestingStatus::Failed)
    }

    /// Record one closed trade. The only mutation path for a record.
    pub fn record(
        &mut self,
        id: &StrategyId,
        trade: TradeRecord,
    ) -> Result<TradeRecorded, TrackerError> {
        if !trade.pnl.is_finite() {
            return Err(TrackerError::NonFinitePnl(id.clone()));
        }
        let config = self.config.clone();
        let perf = self
            .records
            .iter_mut()
            .find(|p| &p.strategy_id == id)
            .ok_or_else(|| TrackerError::UnknownStrategy(id.clone()))?;

        let pnl = trade.pnl;
        perf.total_trades += 1;
        perf.total_pnl += pnl;
        if trade.is_win() {
            perf.winning_trades += 1;
            perf.consecutive_wins += 1;
            perf.consecutive_losses = 0;
        } else if trade.is_loss() {
            perf.losing_trades += 1;
            perf.consecutive_losses += 1;
            perf.consecutive_wins = 0;
        } else {
            perf.consecutive_wins = 0;
            perf.consecutive_losses = 0;
        }
        let decided = perf.winning_trades + perf.losing_trades;
        perf.win_rate = if decided == 0 {
            0.0
        } else {
            perf.winning_trades as f64 / decided as f64
        };
        perf.avg_pnl = perf.total_pnl / perf.total_trades as f64;
        perf.last_trade_at = Some(trade.closed_at);

        perf.recent_trades.push_back(trade);
        while perf.recent_trades.len() > config.window {
            perf.recent_trades.pop_front();
        }
        recompute_window_metrics(perf);

        let mut graduation = None;
        if perf.testing.testing_mode {
            let testing = &mut perf.testing;
            testing.test_trades_completed += 1;
            testing.test_pnl += pnl;
            if pnl > 0.0 {
                testing.test_wins += 1;
            }
            testing.test_win_rate =
                testing.test_wins as f64 / testing.test_trades_completed as f64;

            if testing.test_trades_completed >= testing.test_trades_required {
                let passed = testing.test_win_rate >= config.test_pass_win_rate
                    && testing.test_pnl >= config.test_pass_profit_min;
                testing.test_passed = Some(passed);
                testing.testing_mode = false;
                let verdict = if passed {
                    Graduation::Passed
                } else {
                    Graduation::Failed
                };
                info!(
                    strategy = %perf.strategy_id,
                    verdict = ?verdict,
                    test_win_rate = testing.test_win_rate,
                    test_pnl = testing.test_pnl,
                    "probation complete"
                );
                graduation = Some(verdict);
            }
        }

        Ok(TradeRecorded {
            strategy_id: perf.strategy_id.clone(),
            total_trades: perf.total_trades,
            win_rate: perf.win_rate,
            total_pnl: perf.total_pnl,
            status: perf.status(),
            graduation,
        })
    }

    /// Put every record back into probation. Cumulative metrics are kept.
    pub fn reset_testing(&mut self) {
        let required = self.config.test_trades_required;
        for perf in &mut self.records {
            perf.testing = TestingRecord::new(required);
        }
        warn!(strategies = self.records.len(), "testing state reset for all strategies");
    }

    /// Replace records with persisted ones, matched by id.
    ///
    /// Unknown ids are skipped; windows longer than the configured window are
    /// trimmed to the most recent trades. Returns how many records loaded.
    pub fn load(&mut self, persisted: Vec<StrategyPerformance>) -> usize {
        let window = self.config.window;
        let mut loaded = 0;
        for mut perf in persisted {
            match self
                .records
                .iter_mut()
                .find(|p| p.strategy_id == perf.strategy_id)
            {
                Some(slot) => {
                    if perf.recent_trades.len() > window {
                        while perf.recent_trades.len() > window {
                            perf.recent_trades.pop_front();
                        }
                        recompute_window_metrics(&mut perf);
                    }
                    *slot = perf;
                    loaded += 1;
                }
                None => {
                    warn!(
                        strategy = %perf.strategy_id,
                        "persisted record for unregistered strategy skipped"
                    );
                }
            }
        }
        loaded
    }

    /// Rank all strategies by composite score. Pure read.
    pub fn comparison(&self) -> StrategyComparison {
        let mut rankings: Vec<RankedStrategy> = self
            .records
            .iter()
            .map(|perf| RankedStrategy {
                rank: 0,
                strategy_id: perf.strategy_id.clone(),
                score: composite_score(perf),
                status: perf.status(),
                total_trades: perf.total_trades,
                win_rate: perf.win_rate,
                total_pnl: perf.total_pnl,
                sharpe_ratio: perf.sharpe_ratio,
            })
            .collect();
        // Stable sort: equal scores keep registration order.
        rankings.sort_by(|a, b| b.score.total_cmp(&a.score));
        for (i, r) in rankings.iter_mut().enumerate() {
            r.rank = i + 1;
        }
        let recommendation = recommend(&rankings);
        StrategyComparison {
            rankings,
            recommendation,
        }
    }
}

// ─── Comparison ──────────────────────────────────────────────────────

/// P&L (dollars) that earns the full profit score; its negative earns zero.
pub const PROFIT_SCALE: f64 = 50.0;
/// Drawdown (dollars) at which the drawdown score reaches zero.
pub const DRAWDOWN_SCALE: f64 = 50.0;
/// Closed trades that earn the full volume score.
pub const VOLUME_SCALE: f64 = 20.0;

/// Composite score out of 100: win rate 25, profit 20, Sharpe 20,
/// consistency 15, drawdown 10, volume 10.
pub fn composite_score(perf: &StrategyPerformance) -> f64 {
    let win_rate = 25.0 * perf.win_rate.clamp(0.0, 1.0);
    let profit = 20.0 * (0.5 + perf.total_pnl / (2.0 * PROFIT_SCALE)).clamp(0.0, 1.0);
    let sharpe = 20.0 * (perf.sharpe_ratio / 2.0).clamp(0.0, 1.0);
    let consistency = 15.0 * perf.consistency.clamp(0.0, 1.0);
    let drawdown = 10.0 * (1.0 - perf.max_drawdown / DRAWDOWN_SCALE).clamp(0.0, 1.0);
    let volume = 10.0 * (perf.total_trades as f64 / VOLUME_SCALE).min(1.0);
    win_rate + profit + sharpe + consistency + drawdown + volume
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedStrategy {
    pub rank: usize,
    pub strategy_id: StrategyId,
    pub score: f64,
    pub status: TestingStatus,
    pub total_trades: u32,
    pub win_rate: f64,
    pub total_pnl: f64,
    pub sharpe_ratio: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyComparison {
    pub rankings: Vec<RankedStrategy>,
    pub recommendation: String,
}

impl StrategyComparison {
    pub fn top(&self) -> Option<&RankedStrategy> {
        self.rankings.first()
    }
}

impl fmt::Display for StrategyComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:<4} {:<20} {:>6} {:>9} {:>7} {:>8} {:>10}",
            "#", "strategy", "score", "status", "trades", "win%", "pnl"
        )?;
        for r in &self.rankings {
            writeln!(
                f,
                "{:<4} {:<20} {:>6.1} {:>9} {:>7} {:>7.1}% {:>10.2}",
                r.rank,
                r.strategy_id.as_str(),
                r.score,
                r.status.to_string(),
                r.total_trades,
                r.win_rate * 100.0,
                r.total_pnl
            )?;
        }
        write!(f, "{}", self.recommendation)
    }
}

fn recommend(rankings: &[RankedStrategy]) -> String {
    let Some(top) = rankings.first() else {
        return "No strategies registered.".to_string();
    };
    if rankings.iter().all(|r| r.total_trades == 0) {
        return "No closed trades yet; every strategy is still in testing.".to_string();
    }
    let id = &top.strategy_id;
    let score = top.score;
    if score >= 70.0 {
        format!("Strong performer: {id} (score {score:.1}) should govern at production size.")
    } else if score >= 50.0 {
        format!(
            "Moderate performer: {id} leads (score {score:.1}); \
             keep monitoring before scaling up."
        )
    } else {
        format!(
            "Weak field: best is {id} (score {score:.1}); trade minimum size or stand aside."
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn trade(symbol: &str, pnl: f64, closed_at: DateTime<Utc>) -> TradeRecord {
        TradeRecord::new(symbol, pnl, closed_at)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, 14, 30, 0).unwrap()
    }

    fn store(ids: &[&str]) -> PerformanceStore {
        PerformanceStore::new(ids.iter().map(|&s| StrategyId::new(s)), TrackerConfig::default())
    }

    fn feed(store: &mut PerformanceStore, id: &str, pnls: &[f64]) -> Vec<TradeRecorded> {
        let id = StrategyId::new(id);
        pnls.iter()
            .enumerate()
            .map(|(i, &pnl)| {
                store
                    .record(&id, trade("SPY", pnl, t0() + Duration::minutes(i as i64)))
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn breakeven_counts_toward_total_only() {
        let mut s = store(&["a"]);
        feed(&mut s, "a", &[2.0, 0.0, -1.0]);
        let p = s.get(&"a".into()).unwrap();
        assert_eq!(p.total_trades, 3);
        assert_eq!(p.winning_trades, 1);
        assert_eq!(p.losing_trades, 1);
        assert!((p.win_rate - 0.5).abs() < 1e-12);
        assert!((p.avg_pnl - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn streaks_reset_on_opposite_outcome() {
        let mut s = store(&["a"]);
        feed(&mut s, "a", &[1.0, 1.0, 1.0, -1.0, -1.0]);
        let p = s.get(&"a".into()).unwrap();
        assert_eq!(p.consecutive_wins, 0);
        assert_eq!(p.consecutive_losses, 2);
    }

    #[test]
    fn sharpe_and_drawdown() {
        assert_eq!(sharpe_ratio(&[5.0]), 0.0);
        assert_eq!(sharpe_ratio(&[2.0, 2.0, 2.0]), 0.0);
        // mean 1, sample sd 1 → sqrt(252 / 3)
        let s = sharpe_ratio(&[0.0, 1.0, 2.0]);
        assert!((s - (252.0_f64 / 3.0).sqrt()).abs() < 1e-12);

        let (max_dd, current) = drawdowns(&[3.0, -2.0, -4.0, 1.0]);
        assert!((max_dd - 6.0).abs() < 1e-12);
        assert!((current - 5.0).abs() < 1e-12);
    }

    #[test]
    fn graduation_happens_exactly_once() {
        let mut s = store(&["a"]);
        let results = feed(&mut s, "a", &[1.0, 1.0, -0.5, 1.0, -0.5, -3.0, -3.0]);
        let verdicts: Vec<_> = results.iter().map(|r| r.graduation).collect();
        assert_eq!(
            verdicts,
            vec![None, None, None, None, Some(Graduation::Passed), None, None]
        );
        let p = s.get(&"a".into()).unwrap();
        assert!(!p.testing.testing_mode);
        assert_eq!(p.testing.test_passed, Some(true));
        assert_eq!(p.testing.test_trades_completed, 5);
        assert_eq!(p.status(), TestingStatus::Passed);
    }

    #[test]
    fn losing_probation_fails() {
        let mut s = store(&["a"]);
        let results = feed(&mut s, "a", &[1.0, -1.0, -1.0, -1.0, -1.0]);
        assert_eq!(results[4].graduation, Some(Graduation::Failed));
        assert_eq!(results[4].status, TestingStatus::Failed);
        assert!(s.all_failed());
    }

    #[test]
    fn window_is_bounded_but_totals_persist() {
        let mut s = PerformanceStore::new(
            [StrategyId::new("a")],
            TrackerConfig {
                window: 3,
                ..TrackerConfig::default()
            },
        );
        feed(&mut s, "a", &[-5.0, 1.0, 1.0, 1.0]);
        let p = s.get(&"a".into()).unwrap();
        assert_eq!(p.recent_trades.len(), 3);
        assert_eq!(p.total_trades, 4);
        assert!((p.total_pnl + 2.0).abs() < 1e-12);
        assert_eq!(p.consistency, 1.0);
        assert_eq!(p.max_drawdown, 0.0);
    }

    #[test]
    fn unknown_strategy_and_nan_are_rejected() {
        let mut s = store(&["a"]);
        let err = s.record(&"zzz".into(), trade("SPY", 1.0, t0())).unwrap_err();
        assert_eq!(err, TrackerError::UnknownStrategy("zzz".into()));
        let err = s.record(&"a".into(), trade("SPY", f64::NAN, t0())).unwrap_err();
        assert_eq!(err, TrackerError::NonFinitePnl("a".into()));
        assert_eq!(s.get(&"a".into()).unwrap().total_trades, 0);
    }

    #[test]
    fn reset_restores_probation() {
        let mut s = store(&["a"]);
        feed(&mut s, "a", &[-1.0; 5]);
        assert!(s.all_failed());
        s.reset_testing();
        let p = s.get(&"a".into()).unwrap();
        assert_eq!(p.status(), TestingStatus::Untested);
        assert!(p.testing.testing_mode);
        assert_eq!(p.total_trades, 5);
    }

    #[test]
    fn comparison_ranks_by_score_with_registration_tiebreak() {
        let mut s = store(&["a", "b", "c"]);
        feed(&mut s, "b", &[2.0, 3.0, 1.5, 2.5]);
        let cmp = s.comparison();
        let ids: Vec<&str> = cmp.rankings.iter().map(|r| r.strategy_id.as_str()).collect();
        assert_eq!(ids, ["b", "a", "c"]);
        assert_eq!(cmp.rankings[0].rank, 1);
        assert!(cmp.recommendation.contains("b (score"));
        assert_eq!(cmp, s.comparison());
    }

    #[test]
    fn composite_score_of_fresh_record() {
        let fresh = StrategyPerformance::new("a".into(), 5);
        // Neutral profit (10) plus an untouched drawdown score (10).
        assert!((composite_score(&fresh) - 20.0).abs() < 1e-12);
    }

    #[test]
    fn load_replaces_matching_records_only() {
        let mut source = store(&["a"]);
        feed(&mut source, "a", &[1.0, 2.0]);
        let mut persisted = source.records().to_vec();
        persisted.push(StrategyPerformance::new("ghost".into(), 5));

        let mut target = store(&["a", "b"]);
        assert_eq!(target.load(persisted), 1);
        assert_eq!(target.get(&"a".into()).unwrap().total_trades, 2);
        assert!(target.get(&"ghost".into()).is_none());
    }

    #[test]
    fn load_trims_to_window_and_recomputes_metrics() {
        let mut source = store(&["a"]);
        feed(&mut source, "a", &[-10.0, -10.0, 4.0, 2.0, 3.0]);
        let persisted = source.records().to_vec();
        assert!(persisted[0].max_drawdown >= 20.0);

        let config = TrackerConfig {
            window: 3,
            ..TrackerConfig::default()
        };
        let mut target = PerformanceStore::new([StrategyId::new("a")], config);
        assert_eq!(target.load(persisted), 1);

        let p = target.get(&"a".into()).unwrap();
        assert_eq!(p.recent_trades.len(), 3);
        assert_eq!(p.total_trades, 5);
        assert_eq!(p.max_drawdown, 0.0);
        assert_eq!(p.consistency, 1.0);
        assert_eq!(p.sharpe_ratio, sharpe_ratio(&[4.0, 2.0, 3.0]));
    }
}
