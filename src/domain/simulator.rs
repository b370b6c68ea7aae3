//! Simulated settlement of a decision against an account snapshot.
//!
//! Nothing is written here: the result describes the mutation the ledger
//! should apply (new cash balance, new or removed position).

use std::fmt;

use crate::domain::account::Account;
use crate::domain::decision::{Action, TradeDecision};
use crate::domain::market::MarketSnapshot;
use crate::domain::money::Money;
use crate::domain::position::{Position, TradeSide};

#[derive(Debug, Clone, PartialEq)]
pub enum TradeExecution {
    NoTrade,
    Bought {
        quantity: i64,
        price: Money,
        new_balance: Money,
        new_position: Position,
    },
    Sold {
        quantity: i64,
        price: Money,
        new_balance: Money,
        /// Shares left after the sale; zero or less means the position row
        /// must be deleted.
        remaining_quantity: i64,
    },
    Rejected(RejectReason),
}

#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    InsufficientFunds { required: Money, available: Money },
    InvalidDecision,
    InvalidPrice,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::InsufficientFunds { .. } => write!(f, "Insufficient funds"),
            RejectReason::InvalidDecision => write!(f, "Invalid trade decision"),
            RejectReason::InvalidPrice => write!(f, "Invalid market price"),
        }
    }
}

impl TradeExecution {
    pub fn is_success(&self) -> bool {
        !matches!(self, TradeExecution::Rejected(_))
    }

    /// True when the ledger must record a fill.
    pub fn is_fill(&self) -> bool {
        matches!(self, TradeExecution::Bought { .. } | TradeExecution::Sold { .. })
    }

    pub fn side(&self) -> Option<TradeSide> {
        match self {
            TradeExecution::Bought { .. } => Some(TradeSide::Buy),
            TradeExecution::Sold { .. } => Some(TradeSide::Sell),
            _ => None,
        }
    }

    pub fn new_balance(&self) -> Option<Money> {
        match self {
            TradeExecution::Bought { new_balance, .. } | TradeExecution::Sold { new_balance, .. } => {
                Some(*new_balance)
            }
            _ => None,
        }
    }

    pub fn message(&self) -> String {
        match self {
            TradeExecution::NoTrade => "No trade executed".to_string(),
            TradeExecution::Bought { quantity, price, .. } => {
                format!("Bought {quantity} shares at {price}")
            }
            TradeExecution::Sold { quantity, price, .. } => {
                format!("Sold {quantity} shares at {price}")
            }
            TradeExecution::Rejected(reason) => reason.to_string(),
        }
    }
}

/// Settle `decision` at the snapshot price. A buy is all-or-nothing; a sell
/// needs an open position and never checks funds.
pub fn simulate_trade(
    decision: &TradeDecision,
    snapshot: &MarketSnapshot,
    account: &Account,
    position: Option<&Position>,
) -> TradeExecution {
    if decision.action == Action::Hold {
        return TradeExecution::NoTrade;
    }

    let Some(price) = Money::from_f64(snapshot.price).filter(|p| p.is_positive()) else {
        return TradeExecution::Rejected(RejectReason::InvalidPrice);
    };

    match (decision.action, position) {
        (Action::Buy { quantity }, _) if quantity > 0 => {
            let required = price.times(quantity);
            if required > account.current_balance {
                return TradeExecution::Rejected(RejectReason::InsufficientFunds {
                    required,
                    available: account.current_balance,
                });
            }
            match Position::new(&snapshot.symbol, quantity, price, price) {
                Some(new_position) => TradeExecution::Bought {
                    quantity,
                    price,
                    new_balance: account.current_balance - required,
                    new_position,
                },
                None => TradeExecution::Rejected(RejectReason::InvalidDecision),
            }
        }
        (Action::Sell { quantity }, Some(open)) if quantity > 0 => TradeExecution::Sold {
            quantity,
            price,
            new_balance: account.current_balance + price.times(quantity),
            remaining_quantity: open.quantity - quantity,
        },
        _ => TradeExecution::Rejected(RejectReason::InvalidDecision),
    }
}
