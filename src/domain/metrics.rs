//! Profit and value figures for positions and whole accounts.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use std::collections::HashMap;

use crate::domain::account::Account;
use crate::domain::money::Money;
use crate::domain::position::Position;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionMetrics {
    pub current_value: Money,
    pub cost_value: Money,
    pub profit: Money,
    pub profit_percent: f64,
    /// Same figure as `profit_percent`; kept separate for reporting.
    pub roi: f64,
}

/// Metrics for `position` marked at `price`.
pub fn position_metrics(position: &Position, price: Money) -> PositionMetrics {
    let current_value = position.market_value(price);
    let cost_value = position.cost_value();
    let profit = current_value - cost_value;
    let profit_percent = percent_of(profit, cost_value);
    PositionMetrics {
        current_value,
        cost_value,
        profit,
        profit_percent,
        roi: profit_percent,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccountMetrics {
    pub cash_balance: Money,
    pub position_value: Money,
    pub total_assets: Money,
    pub total_cost: Money,
    pub total_profit: Money,
    /// Total profit over the initial balance.
    pub total_profit_percent: f64,
}

/// Mark every position at `prices`, falling back to its cost price when the
/// symbol has no quote.
pub fn account_metrics(
    account: &Account,
    positions: &[Position],
    prices: &HashMap<String, Money>,
) -> AccountMetrics {
    let mut position_value = Money::ZERO;
    let mut total_cost = Money::ZERO;
    for position in positions {
        let price = prices
            .get(&position.symbol)
            .copied()
            .unwrap_or(position.cost_price);
        position_value = position_value + position.market_value(price);
        total_cost = total_cost + position.cost_value();
    }

    let total_assets = account.current_balance + position_value;
    let total_profit = total_assets - account.initial_balance;
    AccountMetrics {
        cash_balance: account.current_balance,
        position_value,
        total_assets,
        total_cost,
        total_profit,
        total_profit_percent: percent_of(total_profit, account.initial_balance),
    }
}

fn percent_of(part: Money, whole: Money) -> f64 {
    if whole.amount() == Decimal::ZERO {
        return 0.0;
    }
    (part.amount() / whole.amount() * Decimal::ONE_HUNDRED)
        .to_f64()
        .unwrap_or(0.0)
}
