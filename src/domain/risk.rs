//! Stop-loss and take-profit checks against an open position.
//!
//! These run before any signal is consulted and always liquidate the whole
//! position when they fire.

use crate::domain::decision::{Action, TradeDecision};
use crate::domain::position::Position;
use crate::domain::rules::RiskLimits;

/// Forced exit for `position` at `price`, if any limit is breached.
/// Stop-loss is checked first.
pub fn evaluate_risk(position: &Position, price: f64, limits: &RiskLimits) -> Option<TradeDecision> {
    let change = position.change_percent(price);

    if let Some(stop_loss) = limits.stop_loss_pct {
        let loss = -change;
        if loss >= stop_loss {
            return Some(TradeDecision {
                action: Action::Sell {
                    quantity: position.quantity,
                },
                reason: format!("Stop loss triggered: {loss:.2}% loss"),
                confidence: 100,
            });
        }
    }

    if let Some(take_profit) = limits.take_profit_pct {
        if change >= take_profit {
            return Some(TradeDecision {
                action: Action::Sell {
                    quantity: position.quantity,
                },
                reason: format!("Take profit triggered: {change:.2}% gain"),
                confidence: 100,
            });
        }
    }

    None
}
