//! Paper-trading cash account.

use serde::Serialize;

use crate::domain::money::Money;

/// `current_balance` is cash only. `total_assets` is a snapshot of cash plus
/// marked-to-market holdings kept by the store; the engine never derives it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    pub user_id: i64,
    pub current_balance: Money,
    pub initial_balance: Money,
    pub total_assets: Money,
}

impl Account {
    pub fn new(user_id: i64, initial_balance: Money) -> Self {
        Account {
            user_id,
            current_balance: initial_balance,
            initial_balance,
            total_assets: initial_balance,
        }
    }
}
