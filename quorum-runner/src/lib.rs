//! Quorum Runner — the stateful half of the engine.
//!
//! This crate builds on `quorum-core` to provide:
//! - Engine configuration loaded from TOML
//! - Per-strategy performance tracking with probation (graduation testing)
//! - Adaptive selection of the authoritative strategy with cooldown
//! - The `Engine` facade: decision cycles and trade feedback
//! - JSON snapshots and an append-only JSONL decision log

pub mod config;
pub mod decision_log;
pub mod engine;
pub mod selector;
pub mod snapshot;
pub mod tracker;

pub use config::{ConfigError, DecisionSource, EngineConfig};
pub use decision_log::{DecisionLog, DecisionLogError};
pub use engine::{Decision, Engine, EngineError, EngineStateView};
pub use selector::{
    AdaptiveSelector, SelectionState, SelectorConfig, SelectorError, SwitchReason, SwitchResult,
};
pub use snapshot::{load_snapshot, save_snapshot, EngineSnapshot, SnapshotError};
pub use tracker::{
    composite_score, PerformanceStore, RankedStrategy, StrategyComparison, TrackerConfig,
    TrackerError, TradeRecorded,
};

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn engine_is_send_sync() {
        assert_send::<Engine>();
        assert_sync::<Engine>();
    }

    #[test]
    fn decision_is_send_sync() {
        assert_send::<Decision>();
        assert_sync::<Decision>();
        assert_send::<SwitchResult>();
        assert_sync::<SwitchResult>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<EngineConfig>();
        assert_sync::<EngineConfig>();
        assert_send::<SelectorConfig>();
        assert_sync::<SelectorConfig>();
    }

    #[test]
    fn persistence_types_are_send_sync() {
        assert_send::<EngineSnapshot>();
        assert_sync::<EngineSnapshot>();
        assert_send::<DecisionLog>();
        assert_sync::<DecisionLog>();
    }

    #[test]
    fn error_types_are_send_sync() {
        assert_send::<EngineError>();
        assert_sync::<EngineError>();
        assert_send::<SnapshotError>();
        assert_sync::<SnapshotError>();
    }
}
