//! Per-symbol trade decisions.
//!
//! Technical strategies need at least [`MIN_HISTORY`] closes. Risk limits are
//! checked before the indicator signal; a BUY is only taken with no open
//! position and a SELL always exits the whole position. Custom strategies
//! treat any non-empty condition list as met.

use serde::Serialize;
use std::fmt;
use tracing::{debug, warn};

use crate::domain::account::Account;
use crate::domain::indicator::calculate_all;
use crate::domain::market::MarketSnapshot;
use crate::domain::money::Money;
use crate::domain::position::Position;
use crate::domain::price_series::PriceSeries;
use crate::domain::risk::evaluate_risk;
use crate::domain::rules::{RiskLimits, StrategyRules};
use crate::domain::signal::{generate_signal, SignalKind};
use crate::domain::strategy::Strategy;

/// Closes required before a technical strategy will trade.
pub const MIN_HISTORY: usize = 26;

/// High/low band synthesized around each close for the indicator series.
pub const HISTORY_BAND: f64 = 0.02;

pub const CUSTOM_CONFIDENCE: u8 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "UPPERCASE")]
pub enum Action {
    Buy { quantity: i64 },
    Sell { quantity: i64 },
    Hold,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Buy { .. } => "BUY",
            Action::Sell { .. } => "SELL",
            Action::Hold => "HOLD",
        }
    }

    pub fn quantity(&self) -> Option<i64> {
        match self {
            Action::Buy { quantity } | Action::Sell { quantity } => Some(*quantity),
            Action::Hold => None,
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.quantity() {
            Some(quantity) => write!(f, "{} {}", self.as_str(), quantity),
            None => f.write_str(self.as_str()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradeDecision {
    #[serde(flatten)]
    pub action: Action,
    pub reason: String,
    /// 0..=100.
    pub confidence: u8,
}

impl TradeDecision {
    pub fn hold(reason: impl Into<String>) -> Self {
        TradeDecision {
            action: Action::Hold,
            reason: reason.into(),
            confidence: 0,
        }
    }

    pub fn is_hold(&self) -> bool {
        self.action == Action::Hold
    }
}

/// Shares to buy with `cash` at `price`, capped by the strategy's maximum.
/// Never more than the cash covers.
pub fn size_position(cash: Money, price: f64, limits: &RiskLimits) -> i64 {
    let Some(price) = Money::from_f64(price) else {
        return 0;
    };
    let affordable = cash.whole_units_at(price);
    match limits.max_position_size {
        Some(max) => affordable.min(max),
        None => affordable,
    }
}

/// Decide for an already-parsed rule set. `None` rules means a strategy kind
/// the engine does not understand.
pub fn decide(
    rules: Option<&StrategyRules>,
    snapshot: &MarketSnapshot,
    history: &[f64],
    position: Option<&Position>,
    account: &Account,
) -> TradeDecision {
    match rules {
        Some(StrategyRules::Technical { risk, .. }) => {
            technical_decision(risk, snapshot, history, position, account)
        }
        Some(StrategyRules::Custom {
            risk,
            buy_conditions,
            sell_conditions,
        }) => custom_decision(risk, buy_conditions, sell_conditions, snapshot, position, account),
        None => TradeDecision::hold("Unknown strategy type"),
    }
}

/// Decide for a stored strategy. Malformed rule text is logged and treated
/// as an empty rule set.
pub fn make_trade_decision(
    strategy: &Strategy,
    snapshot: &MarketSnapshot,
    history: &[f64],
    position: Option<&Position>,
    account: &Account,
) -> TradeDecision {
    let rules = StrategyRules::parse_lenient(&strategy.kind, &strategy.rules);
    decide(rules.as_ref(), snapshot, history, position, account)
}

fn technical_decision(
    risk: &RiskLimits,
    snapshot: &MarketSnapshot,
    history: &[f64],
    position: Option<&Position>,
    account: &Account,
) -> TradeDecision {
    if history.len() < MIN_HISTORY {
        return TradeDecision::hold("Insufficient historical data");
    }

    let series = match PriceSeries::from_closes_with_band(history.to_vec(), HISTORY_BAND) {
        Ok(series) => series,
        Err(e) => {
            warn!(symbol = %snapshot.symbol, error = %e, "unusable price history");
            return TradeDecision::hold(format!("Invalid historical data: {e}"));
        }
    };
    let indicators = calculate_all(&series);
    let signal = generate_signal(&indicators, snapshot.price);
    debug!(
        symbol = %snapshot.symbol,
        kind = %signal.kind,
        buy_score = signal.buy_score,
        sell_score = signal.sell_score,
        "signal"
    );

    if let Some(forced) = position.and_then(|p| evaluate_risk(p, snapshot.price, risk)) {
        return forced;
    }

    match (signal.kind, position) {
        (SignalKind::Buy, None) => {
            let quantity = size_position(account.current_balance, snapshot.price, risk);
            if quantity > 0 {
                return TradeDecision {
                    action: Action::Buy { quantity },
                    reason: format!("Buy signal: {}", signal.reasons.join(", ")),
                    confidence: signal.strength,
                };
            }
        }
        (SignalKind::Sell, Some(open)) => {
            return TradeDecision {
                action: Action::Sell {
                    quantity: open.quantity,
                },
                reason: format!("Sell signal: {}", signal.reasons.join(", ")),
                confidence: signal.strength,
            };
        }
        _ => {}
    }

    TradeDecision::hold("No clear signal")
}

fn custom_decision(
    risk: &RiskLimits,
    buy_conditions: &[String],
    sell_conditions: &[String],
    snapshot: &MarketSnapshot,
    position: Option<&Position>,
    account: &Account,
) -> TradeDecision {
    match position {
        None if !buy_conditions.is_empty() => {
            let quantity = size_position(account.current_balance, snapshot.price, risk);
            if quantity > 0 {
                return TradeDecision {
                    action: Action::Buy { quantity },
                    reason: "Custom buy condition met".to_string(),
                    confidence: CUSTOM_CONFIDENCE,
                };
            }
        }
        Some(open) if !sell_conditions.is_empty() => {
            return TradeDecision {
                action: Action::Sell {
                    quantity: open.quantity,
                },
                reason: "Custom sell condition met".to_string(),
                confidence: CUSTOM_CONFIDENCE,
            };
        }
        _ => {}
    }

    TradeDecision::hold("No custom condition triggered")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::strategy::{Strategy, StrategyKind};
    use chrono::Utc;
    use proptest::prelude::*;

    fn money(v: f64) -> Money {
        Money::from_f64(v).unwrap()
    }

    fn account(balance: f64) -> Account {
        Account::new(1, money(balance))
    }

    fn snapshot(price: f64) -> MarketSnapshot {
        MarketSnapshot::at_price("600519.SH", price, Utc::now())
    }

    /// Convex uptrend: MA and MACD both bullish at a price of 10.
    fn accelerating(n: usize) -> Vec<f64> {
        (0..n).map(|i| 5.0 + 0.002 * (i * i) as f64).collect()
    }

    fn technical(json: &str) -> StrategyRules {
        StrategyRules::parse(&StrategyKind::Technical, json).unwrap().unwrap()
    }

    fn custom(json: &str) -> StrategyRules {
        StrategyRules::parse(&StrategyKind::Custom, json).unwrap().unwrap()
    }

    #[test]
    fn short_history_holds() {
        let rules = technical("{}");
        let decision = decide(Some(&rules), &snapshot(10.0), &accelerating(25), None, &account(1000.0));
        assert_eq!(decision, TradeDecision::hold("Insufficient historical data"));
    }

    #[test]
    fn bullish_history_buys_capped_quantity() {
        let rules = technical(r#"{"maxPositionSize": 500}"#);
        let decision = decide(
            Some(&rules),
            &snapshot(10.0),
            &accelerating(40),
            None,
            &account(100_000.0),
        );
        assert_eq!(decision.action, Action::Buy { quantity: 500 });
        assert_eq!(decision.confidence, 45);
        assert!(decision.reason.starts_with("Buy signal: Price above MA5"));
        assert!(decision.reason.contains("MACD bullish crossover"));
    }

    #[test]
    fn buy_without_cap_uses_all_cash() {
        let rules = technical("{}");
        let decision = decide(Some(&rules), &snapshot(10.0), &accelerating(40), None, &account(1234.0));
        assert_eq!(decision.action, Action::Buy { quantity: 123 });
    }

    #[test]
    fn negative_position_cap_holds() {
        let rules = custom(r#"{"buyConditions": ["x"], "maxPositionSize": -5}"#);
        let decision = decide(Some(&rules), &snapshot(10.0), &[], None, &account(100_000.0));
        assert_eq!(decision, TradeDecision::hold("No custom condition triggered"));

        let rules = technical(r#"{"maxPositionSize": -5}"#);
        let decision = decide(Some(&rules), &snapshot(10.0), &accelerating(40), None, &account(100_000.0));
        assert_eq!(decision.action, Action::Hold);
    }

    #[test]
    fn buy_signal_with_no_cash_holds() {
        let rules = technical("{}");
        let decision = decide(Some(&rules), &snapshot(10.0), &accelerating(40), None, &account(5.0));
        assert_eq!(decision.action, Action::Hold);
        assert_eq!(decision.reason, "No clear signal");
    }

    #[test]
    fn buy_signal_ignored_when_position_open() {
        let rules = technical("{}");
        let open = Position::new("600519.SH", 100, money(9.9), money(9.9)).unwrap();
        let decision = decide(
            Some(&rules),
            &snapshot(10.0),
            &accelerating(40),
            Some(&open),
            &account(100_000.0),
        );
        assert!(decision.is_hold());
    }

    #[test]
    fn stop_loss_overrides_bullish_signal() {
        let rules = technical(r#"{"stopLossPercent": 5}"#);
        let open = Position::new("600519.SH", 300, money(100.0), money(100.0)).unwrap();
        let history: Vec<f64> = accelerating(40).iter().map(|p| p * 9.0).collect();
        let decision = decide(Some(&rules), &snapshot(90.0), &history, Some(&open), &account(0.0));
        assert_eq!(decision.action, Action::Sell { quantity: 300 });
        assert_eq!(decision.confidence, 100);
        assert!(decision.reason.starts_with("Stop loss triggered"));
    }

    #[test]
    fn risk_is_not_checked_before_history_requirement() {
        let rules = technical(r#"{"stopLoss": 5}"#);
        let open = Position::new("600519.SH", 300, money(100.0), money(100.0)).unwrap();
        let decision = decide(Some(&rules), &snapshot(50.0), &[50.0; 10], Some(&open), &account(0.0));
        assert_eq!(decision.reason, "Insufficient historical data");
    }

    #[test]
    fn take_profit_sells_whole_position() {
        let rules = technical(r#"{"takeProfit": 10}"#);
        let open = Position::new("600519.SH", 200, money(12.0), money(12.0)).unwrap();
        let flat = vec![12.0; 30];
        let decision = decide(Some(&rules), &snapshot(13.32), &flat, Some(&open), &account(0.0));
        assert_eq!(decision.action, Action::Sell { quantity: 200 });
        assert_eq!(decision.confidence, 100);
        assert_eq!(decision.reason, "Take profit triggered: 11.00% gain");
    }

    #[test]
    fn bearish_signal_sells_open_position() {
        let rules = technical("{}");
        // Accelerating decline: MA and MACD bearish, RSI oversold.
        let falling: Vec<f64> = (0..40).map(|i| 13.0 - 0.002 * (i * i) as f64).collect();
        let open = Position::new("600519.SH", 70, money(10.0), money(10.0)).unwrap();
        let decision = decide(Some(&rules), &snapshot(9.85), &falling, Some(&open), &account(0.0));
        assert_eq!(decision.action, Action::Sell { quantity: 70 });
        assert!(decision.reason.starts_with("Sell signal: "));
    }

    #[test]
    fn non_positive_history_holds() {
        let rules = technical("{}");
        let mut history = accelerating(30);
        history[3] = 0.0;
        let decision = decide(Some(&rules), &snapshot(10.0), &history, None, &account(100.0));
        assert!(decision.is_hold());
        assert!(decision.reason.starts_with("Invalid historical data"));
    }

    // Custom conditions are not evaluated: a non-empty list counts as met.
    #[test]
    fn custom_buy_on_any_condition() {
        let rules = custom(r#"{"buyConditions": ["price > 1000000"], "maxPositionSize": 7}"#);
        let decision = decide(Some(&rules), &snapshot(10.0), &[], None, &account(1000.0));
        assert_eq!(decision.action, Action::Buy { quantity: 7 });
        assert_eq!(decision.confidence, 50);
        assert_eq!(decision.reason, "Custom buy condition met");
    }

    #[test]
    fn custom_sell_needs_position() {
        let rules = custom(r#"{"sellConditions": ["rsi14 > 70"]}"#);
        let open = Position::new("600519.SH", 40, money(10.0), money(10.0)).unwrap();
        let sold = decide(Some(&rules), &snapshot(10.0), &[], Some(&open), &account(0.0));
        assert_eq!(sold.action, Action::Sell { quantity: 40 });
        assert_eq!(sold.reason, "Custom sell condition met");

        let idle = decide(Some(&rules), &snapshot(10.0), &[], None, &account(1000.0));
        assert_eq!(idle, TradeDecision::hold("No custom condition triggered"));
    }

    #[test]
    fn unknown_kind_holds() {
        let decision = decide(None, &snapshot(10.0), &[], None, &account(1000.0));
        assert_eq!(decision, TradeDecision::hold("Unknown strategy type"));
    }

    #[test]
    fn malformed_rules_fall_back_to_defaults() {
        let strategy = Strategy {
            id: 1,
            user_id: 1,
            name: "broken".into(),
            description: None,
            kind: StrategyKind::Custom,
            is_active: true,
            rules: "{not json".into(),
        };
        let decision = make_trade_decision(&strategy, &snapshot(10.0), &[], None, &account(1000.0));
        assert_eq!(decision.reason, "No custom condition triggered");
    }

    #[test]
    fn action_display() {
        assert_eq!(Action::Buy { quantity: 5 }.to_string(), "BUY 5");
        assert_eq!(Action::Hold.to_string(), "HOLD");
    }

    proptest! {
        #[test]
        fn sizing_never_exceeds_cash(
            cash_units in 0i64..10_000_000_000,
            price in 0.01f64..5000.0,
            cap in prop::option::of(1i64..100_000),
        ) {
            let cash = Money::from_scaled(cash_units);
            let limits = RiskLimits { max_position_size: cap, ..Default::default() };
            let quantity = size_position(cash, price, &limits);
            prop_assert!(quantity >= 0);
            let cost = Money::from_f64(price).unwrap().times(quantity);
            prop_assert!(cost <= cash);
            if let Some(cap) = cap {
                prop_assert!(quantity <= cap);
            }
        }
    }
}
