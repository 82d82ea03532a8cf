use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a registered strategy (e.g. `"momentum_rsi"`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StrategyId(pub String);

impl StrategyId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for StrategyId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for StrategyId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_id_serializes_as_plain_string() {
        let id = StrategyId::new("trend_macd");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"trend_macd\"");
        assert_eq!(id.to_string(), "trend_macd");
    }
}
