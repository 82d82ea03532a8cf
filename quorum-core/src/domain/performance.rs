//! Per-strategy live performance record and its testing (probation) sub-record.
//!
//! The record is plain data: the performance tracker is the only writer, the
//! ensemble and the position sizer only read it. The bounded window of recent
//! trades is part of the record, so a persisted record reloads with identical
//! behavior.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use super::ids::StrategyId;

/// One closed trade attributed to a strategy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub symbol: String,
    pub pnl: f64,
    pub closed_at: DateTime<Utc>,
}

impl TradeRecord {
    pub fn new(symbol: impl Into<String>, pnl: f64, closed_at: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            pnl,
            closed_at,
        }
    }

    pub fn is_win(&self) -> bool {
        self.pnl > 0.0
    }

    pub fn is_loss(&self) -> bool {
        self.pnl < 0.0
    }
}

/// Lifecycle of a strategy through probation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestingStatus {
    /// In testing mode, no trade recorded yet.
    Untested,
    /// In testing mode with at least one trade.
    Testing,
    /// Graduated: eligible to govern at production size.
    Passed,
    /// Failed probation: excluded until a global reset.
    Failed,
}

impl TestingStatus {
    pub fn is_eligible(self) -> bool {
        !matches!(self, TestingStatus::Failed)
    }

    pub fn in_testing(self) -> bool {
        matches!(self, TestingStatus::Untested | TestingStatus::Testing)
    }
}

impl fmt::Display for TestingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TestingStatus::Untested => "untested",
            TestingStatus::Testing => "testing",
            TestingStatus::Passed => "passed",
            TestingStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Probation bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestingRecord {
    pub testing_mode: bool,
    pub test_trades_completed: u32,
    pub test_trades_required: u32,
    pub test_wins: u32,
    pub test_pnl: f64,
    pub test_win_rate: f64,
    /// `None` until graduation, then set exactly once.
    pub test_passed: Option<bool>,
}

impl TestingRecord {
    pub fn new(test_trades_required: u32) -> Self {
        Self {
            testing_mode: true,
            test_trades_completed: 0,
            test_trades_required,
            test_wins: 0,
            test_pnl: 0.0,
            test_win_rate: 0.0,
            test_passed: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyPerformance {
    pub strategy_id: StrategyId,

    // Cumulative totals, never truncated by the window.
    pub total_trades: u32,
    pub winning_trades: u32,
    pub losing_trades: u32,
    pub total_pnl: f64,

    // Derived metrics.
    pub win_rate: f64,
    pub avg_pnl: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub current_drawdown: f64,
    pub consistency: f64,
    pub consecutive_wins: u32,
    pub consecutive_losses: u32,

    pub testing: TestingRecord,

    /// Most recent closed trades, oldest first.
    #[serde(default)]
    pub recent_trades: VecDeque<TradeRecord>,
    pub last_trade_at: Option<DateTime<Utc>>,
}

impl StrategyPerformance {
    /// Fresh record: testing mode on, nothing recorded.
    pub fn new(strategy_id: StrategyId, test_trades_required: u32) -> Self {
        Self {
            strategy_id,
            total_trades: 0,
            winning_trades: 0,
            losing_trades: 0,
            total_pnl: 0.0,
            win_rate: 0.0,
            avg_pnl: 0.0,
            sharpe_ratio: 0.0,
            max_drawdown: 0.0,
            current_drawdown: 0.0,
            consistency: 0.0,
            consecutive_wins: 0,
            consecutive_losses: 0,
            testing: TestingRecord::new(test_trades_required),
            recent_trades: VecDeque::new(),
            last_trade_at: None,
        }
    }

    pub fn status(&self) -> TestingStatus {
        match self.testing.test_passed {
            Some(true) => TestingStatus::Passed,
            Some(false) => TestingStatus::Failed,
            None if self.testing.test_trades_completed == 0 => TestingStatus::Untested,
            None => TestingStatus::Testing,
        }
    }

    pub fn is_testing(&self) -> bool {
        self.testing.testing_mode
    }

    pub fn is_profitable(&self) -> bool {
        self.total_pnl > 0.0
    }
}
