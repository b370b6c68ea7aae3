//! Paper-trading ledger ports: accounts, positions, trades and strategies.
//!
//! Stores apply each call atomically. The engine reads a snapshot, computes
//! the mutation, and writes it back through these calls without holding any
//! lock across them.

use crate::domain::account::Account;
use crate::domain::error::PapertraderError;
use crate::domain::money::Money;
use crate::domain::position::{Fill, NewTrade, Position, Trade};
use crate::domain::strategy::{NewStrategy, Strategy};

pub trait AccountStore: Send + Sync {
    /// The user's account, opened with `initial_balance` if none exists.
    fn get_or_create(&self, user_id: i64, initial_balance: Money) -> Result<Account, PapertraderError>;

    /// Replace the cash balance. Stores refresh `total_assets` from open
    /// positions at the same time.
    fn update_balance(&self, user_id: i64, balance: Money) -> Result<Account, PapertraderError>;
}

pub trait PositionStore: Send + Sync {
    fn get(&self, user_id: i64, symbol: &str) -> Result<Option<Position>, PapertraderError>;

    fn list(&self, user_id: i64) -> Result<Vec<Position>, PapertraderError>;

    /// Set the holding to `quantity` shares marked at `current_price`.
    /// A `quantity` of zero or less deletes it. A new row takes
    /// `current_price` as its cost price; an existing row keeps its cost.
    fn upsert(
        &self,
        user_id: i64,
        symbol: &str,
        quantity: i64,
        current_price: Money,
    ) -> Result<(), PapertraderError>;
}

pub trait TradeLedger: Send + Sync {
    fn record(&self, user_id: i64, trade: &NewTrade) -> Result<Trade, PapertraderError>;

    /// Most recent first, at most `limit` trades.
    fn recent(&self, user_id: i64, limit: usize) -> Result<Vec<Trade>, PapertraderError>;
}

pub trait SettlementStore: Send + Sync {
    /// Record the trade, set the position at the trade price and replace
    /// the cash balance as one unit. On error nothing has been written.
    fn apply_fill(&self, user_id: i64, fill: &Fill) -> Result<Trade, PapertraderError>;
}

pub trait StrategyPort: Send + Sync {
    fn active_strategies(&self, user_id: i64) -> Result<Vec<Strategy>, PapertraderError>;

    fn all_strategies(&self, user_id: i64) -> Result<Vec<Strategy>, PapertraderError>;

    fn create_strategy(&self, user_id: i64, strategy: &NewStrategy) -> Result<Strategy, PapertraderError>;

    /// Returns false when no strategy with `id` belongs to the user.
    fn set_active(&self, user_id: i64, id: i64, active: bool) -> Result<bool, PapertraderError>;
}
