//! Domain types for the signal engine

pub mod bar;
pub mod ids;
pub mod performance;
pub mod signal;

pub use bar::{BarError, MarketBar, MarketSeries};
pub use ids::StrategyId;
pub use performance::{StrategyPerformance, TestingRecord, TestingStatus, TradeRecord};
pub use signal::{Action, Signal};
