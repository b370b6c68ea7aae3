//! Open holdings and recorded trades.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use crate::domain::money::Money;

/// An open holding of one symbol. A holding with no shares does not exist:
/// stores delete the row instead of keeping a zero or negative quantity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Position {
    pub symbol: String,
    pub quantity: i64,
    pub cost_price: Money,
    pub current_price: Money,
}

impl Position {
    /// `None` when `quantity` is not positive.
    pub fn new(symbol: &str, quantity: i64, cost_price: Money, current_price: Money) -> Option<Self> {
        (quantity > 0).then(|| Position {
            symbol: symbol.to_string(),
            quantity,
            cost_price,
            current_price,
        })
    }

    pub fn cost_value(&self) -> Money {
        self.cost_price.times(self.quantity)
    }

    pub fn market_value(&self, price: Money) -> Money {
        price.times(self.quantity)
    }

    /// Percentage move from cost to `price`; positive is a gain.
    pub fn change_percent(&self, price: f64) -> f64 {
        let cost = self.cost_price.to_f64();
        if cost <= 0.0 {
            return 0.0;
        }
        (price - cost) / cost * 100.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeSide {
    Buy,
    Sell,
}

impl TradeSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeSide::Buy => "BUY",
            TradeSide::Sell => "SELL",
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TradeSide {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "BUY" => Ok(TradeSide::Buy),
            "SELL" => Ok(TradeSide::Sell),
            other => Err(format!("unknown trade side '{other}'")),
        }
    }
}

/// A fill to be appended to the trade ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTrade {
    pub symbol: String,
    pub side: TradeSide,
    pub quantity: i64,
    pub price: Money,
    pub executed_at: DateTime<Utc>,
}

/// Everything one settled trade changes in the ledger: the trade row, the
/// holding it leaves behind (zero deletes it), and the new cash balance.
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub trade: NewTrade,
    pub position_quantity: i64,
    pub balance: Money,
}

/// A fill as stored by the trade ledger.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trade {
    pub id: i64,
    pub user_id: i64,
    pub symbol: String,
    pub side: TradeSide,
    pub quantity: i64,
    pub price: Money,
    pub executed_at: DateTime<Utc>,
}
