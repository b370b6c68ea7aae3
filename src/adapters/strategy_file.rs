//! JSON strategy files.
//!
//! A file holds an array of strategies. `rules` may be the rule document
//! as a JSON string or inlined as an object; either way it is stored as
//! text and parsed when the strategy runs.

use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::Path;

use crate::domain::error::PapertraderError;
use crate::domain::strategy::{Strategy, StrategyKind};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StrategyEntry {
    id: i64,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(alias = "strategy_type", alias = "type")]
    strategy_type: StrategyKind,
    #[serde(default = "default_active", alias = "is_active")]
    is_active: bool,
    rules: Value,
}

fn default_active() -> bool {
    true
}

impl StrategyEntry {
    fn into_strategy(self, user_id: i64) -> Strategy {
        let rules = match self.rules {
            Value::String(text) => text,
            other => other.to_string(),
        };
        Strategy {
            id: self.id,
            user_id,
            name: self.name,
            description: self.description,
            kind: self.strategy_type,
            is_active: self.is_active,
            rules,
        }
    }
}

pub fn parse_strategies(text: &str, user_id: i64) -> Result<Vec<Strategy>, PapertraderError> {
    let entries: Vec<StrategyEntry> = serde_json::from_str(text)?;
    Ok(entries
        .into_iter()
        .map(|entry| entry.into_strategy(user_id))
        .collect())
}

pub fn load_strategies<P: AsRef<Path>>(path: P, user_id: i64) -> Result<Vec<Strategy>, PapertraderError> {
    let text = fs::read_to_string(path)?;
    parse_strategies(&text, user_id)
}
