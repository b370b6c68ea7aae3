//! User-authored strategies as stored by the ledger.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Strategy family. Anything other than `technical` or `custom` is kept
/// verbatim so the decision engine can report it instead of failing to load.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StrategyKind {
    Technical,
    Custom,
    Other(String),
}

impl StrategyKind {
    pub fn as_str(&self) -> &str {
        match self {
            StrategyKind::Technical => "technical",
            StrategyKind::Custom => "custom",
            StrategyKind::Other(name) => name,
        }
    }
}

impl From<&str> for StrategyKind {
    fn from(value: &str) -> Self {
        match value {
            "technical" => StrategyKind::Technical,
            "custom" => StrategyKind::Custom,
            other => StrategyKind::Other(other.to_string()),
        }
    }
}

impl From<String> for StrategyKind {
    fn from(value: String) -> Self {
        StrategyKind::from(value.as_str())
    }
}

impl From<StrategyKind> for String {
    fn from(kind: StrategyKind) -> Self {
        kind.as_str().to_string()
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored strategy. `rules` is the raw rule document; it is parsed on
/// every execution so a bad edit surfaces as an execution error rather than
/// a load failure.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Strategy {
    pub id: i64,
    pub user_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub kind: StrategyKind,
    pub is_active: bool,
    pub rules: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewStrategy {
    pub name: String,
    pub description: Option<String>,
    pub kind: StrategyKind,
    pub is_active: bool,
    pub rules: String,
}
