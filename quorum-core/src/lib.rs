//! Quorum Core — domain types, indicators, strategies, ensemble, position sizing.
//!
//! This crate is pure computation:
//! - Domain types (bars, validated series, signals, performance records)
//! - Indicator library over `&[f64]`
//! - Five stateless strategy variants behind one `analyze` entry point
//! - Ensemble aggregation (consensus and performance-weighted signal)
//! - Position sizing from a strategy's record and signal confidence
//!
//! No I/O and no clock: time always arrives as an argument.

pub mod domain;
pub mod ensemble;
pub mod indicators;
pub mod sizing;
pub mod strategies;

pub use domain::{
    Action, MarketBar, MarketSeries, Signal, StrategyId, StrategyPerformance, TestingStatus,
    TradeRecord,
};
pub use ensemble::{analyze_all, EnsembleConfig, EnsembleResult};
pub use sizing::{PositionSizer, PositionSizingConfig};
pub use strategies::{Strategy, StrategyConfig, StrategyKind};
