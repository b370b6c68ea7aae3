//! Point-in-time market data for one symbol.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Latest quote as returned by a market data source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quote {
    pub price: f64,
    pub high: f64,
    pub low: f64,
    pub volume: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketSnapshot {
    pub symbol: String,
    pub price: f64,
    pub high: f64,
    pub low: f64,
    pub volume: u64,
    pub timestamp: DateTime<Utc>,
}

impl MarketSnapshot {
    pub fn from_quote(symbol: &str, quote: Quote, timestamp: DateTime<Utc>) -> Self {
        MarketSnapshot {
            symbol: symbol.to_string(),
            price: quote.price,
            high: quote.high,
            low: quote.low,
            volume: quote.volume,
            timestamp,
        }
    }

    /// Snapshot with high, low and volume pinned to the price. Used for
    /// manual trades where only a price is known.
    pub fn at_price(symbol: &str, price: f64, timestamp: DateTime<Utc>) -> Self {
        MarketSnapshot {
            symbol: symbol.to_string(),
            price,
            high: price,
            low: price,
            volume: 0,
            timestamp,
        }
    }
}
