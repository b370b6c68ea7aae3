//! Strategy rule documents.
//!
//! Rule text is camelCase JSON:
//!
//! ```json
//! {
//!   "symbols": ["600519.SH"],
//!   "indicators": { "ma5": true, "macd": true },
//!   "buyConditions": ["rsi14 < 30"],
//!   "sellConditions": ["rsi14 > 70"],
//!   "stopLoss": 5,
//!   "takeProfit": 10,
//!   "maxPositionSize": 500
//! }
//! ```
//!
//! `stopLossPercent` and `takeProfitPercent` are accepted as aliases.
//! A risk value of zero means "not set"; any other value, negative
//! included, is taken as given.

use serde::Deserialize;
use tracing::warn;

use crate::domain::error::PapertraderError;
use crate::domain::strategy::StrategyKind;

/// Which indicators the author ticked. Informational only: every indicator
/// is always computed.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EnabledIndicators {
    pub ma5: bool,
    pub ma10: bool,
    pub ma20: bool,
    pub rsi14: bool,
    pub macd: bool,
    pub bollinger_bands: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuleDocument {
    pub symbols: Vec<String>,
    pub indicators: Option<EnabledIndicators>,
    pub buy_conditions: Vec<String>,
    pub sell_conditions: Vec<String>,
    #[serde(alias = "stopLossPercent")]
    pub stop_loss: Option<f64>,
    #[serde(alias = "takeProfitPercent")]
    pub take_profit: Option<f64>,
    pub max_position_size: Option<i64>,
}

impl RuleDocument {
    pub fn parse(text: &str) -> Result<Self, PapertraderError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Parse, or log the failure and fall back to an empty document.
    pub fn parse_lenient(text: &str) -> Self {
        Self::parse(text).unwrap_or_else(|e| {
            warn!(error = %e, "failed to parse strategy rules; using defaults");
            RuleDocument::default()
        })
    }

    pub fn risk_limits(&self) -> RiskLimits {
        RiskLimits {
            stop_loss_pct: self.stop_loss.filter(|v| *v != 0.0),
            take_profit_pct: self.take_profit.filter(|v| *v != 0.0),
            max_position_size: self.max_position_size.filter(|v| *v != 0),
        }
    }
}

/// Risk settings shared by every strategy family.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RiskLimits {
    pub stop_loss_pct: Option<f64>,
    pub take_profit_pct: Option<f64>,
    /// Share cap per buy; `None` is unbounded.
    pub max_position_size: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StrategyRules {
    Technical {
        risk: RiskLimits,
        indicators: EnabledIndicators,
    },
    /// Conditions are opaque strings; only their presence is checked.
    Custom {
        risk: RiskLimits,
        buy_conditions: Vec<String>,
        sell_conditions: Vec<String>,
    },
}

impl StrategyRules {
    /// `None` for strategy kinds the engine has no rules for.
    pub fn from_document(kind: &StrategyKind, doc: &RuleDocument) -> Option<Self> {
        match kind {
            StrategyKind::Technical => Some(StrategyRules::Technical {
                risk: doc.risk_limits(),
                indicators: doc.indicators.clone().unwrap_or_default(),
            }),
            StrategyKind::Custom => Some(StrategyRules::Custom {
                risk: doc.risk_limits(),
                buy_conditions: doc.buy_conditions.clone(),
                sell_conditions: doc.sell_conditions.clone(),
            }),
            StrategyKind::Other(_) => None,
        }
    }

    /// Strict parse; `Ok(None)` for kinds without rules.
    pub fn parse(kind: &StrategyKind, text: &str) -> Result<Option<Self>, PapertraderError> {
        let doc = RuleDocument::parse(text)?;
        Ok(Self::from_document(kind, &doc))
    }

    /// Malformed text is logged and treated as an empty document.
    pub fn parse_lenient(kind: &StrategyKind, text: &str) -> Option<Self> {
        Self::from_document(kind, &RuleDocument::parse_lenient(text))
    }

    pub fn risk(&self) -> &RiskLimits {
        match self {
            StrategyRules::Technical { risk, .. } | StrategyRules::Custom { risk, .. } => risk,
        }
    }
}

/// Symbols named by the document in first-seen order, or `defaults` when
/// it names none.
pub fn target_symbols(doc: &RuleDocument, defaults: &[String]) -> Vec<String> {
    let mut symbols: Vec<String> = Vec::new();
    for symbol in &doc.symbols {
        if !symbols.contains(symbol) {
            symbols.push(symbol.clone());
        }
    }
    if symbols.is_empty() {
        symbols = defaults.to_vec();
    }
    symbols
}
