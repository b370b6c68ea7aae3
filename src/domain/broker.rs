//! Broker order types and the caller-owned broker registry.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{error, info};

use crate::domain::error::PapertraderError;
use crate::domain::money::Money;
use crate::domain::position::TradeSide;
use crate::ports::broker_port::BrokerPort;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Market,
    Limit,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: TradeSide,
    pub quantity: i64,
    /// Limit price; `None` for a market order.
    pub price: Option<f64>,
    pub order_type: OrderType,
}

impl OrderRequest {
    pub fn limit(symbol: &str, side: TradeSide, quantity: i64, price: f64) -> Self {
        OrderRequest {
            symbol: symbol.to_string(),
            side,
            quantity,
            price: Some(price),
            order_type: OrderType::Limit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Pending,
    Filled,
    Partial,
    Cancelled,
    Rejected,
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Partial => "PARTIAL",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Rejected => "REJECTED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderResponse {
    /// Empty for orders rejected before submission.
    pub order_id: String,
    pub symbol: String,
    pub side: TradeSide,
    pub quantity: i64,
    pub price: f64,
    pub status: OrderStatus,
    pub message: String,
}

impl OrderResponse {
    pub fn rejected(order: &OrderRequest, message: &str) -> Self {
        OrderResponse {
            order_id: String::new(),
            symbol: order.symbol.clone(),
            side: order.side,
            quantity: order.quantity,
            price: order.price.unwrap_or(0.0),
            status: OrderStatus::Rejected,
            message: message.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrokerAccountInfo {
    pub account_id: String,
    pub balance: Money,
    pub available_balance: Money,
    pub market_value: Money,
    pub total_assets: Money,
    pub profit_loss: Money,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BrokerPosition {
    pub symbol: String,
    pub quantity: i64,
    pub cost_price: Money,
}

/// Named brokers with one default. Owned by the caller and handed to the
/// scheduler; nothing here is global.
pub struct BrokerRegistry {
    brokers: BTreeMap<String, Box<dyn BrokerPort>>,
    default_name: String,
}

impl Default for BrokerRegistry {
    fn default() -> Self {
        BrokerRegistry {
            brokers: BTreeMap::new(),
            default_name: "mock".to_string(),
        }
    }
}

impl BrokerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `broker` under `name`, replacing any previous entry.
    pub fn add(&mut self, name: &str, broker: Box<dyn BrokerPort>) {
        self.brokers.insert(name.to_string(), broker);
    }

    pub fn contains(&self, name: &str) -> bool {
        self.brokers.contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.brokers.keys().cloned().collect()
    }

    pub fn default_name(&self) -> &str {
        &self.default_name
    }

    /// Named broker, or the default when `name` is `None`.
    pub fn get(&mut self, name: Option<&str>) -> Result<&mut (dyn BrokerPort + 'static), PapertraderError> {
        let name = name.unwrap_or(&self.default_name).to_string();
        match self.brokers.get_mut(&name) {
            Some(broker) => Ok(broker.as_mut()),
            None => Err(PapertraderError::UnknownBroker { name }),
        }
    }

    pub fn set_default(&mut self, name: &str) -> Result<(), PapertraderError> {
        if !self.brokers.contains_key(name) {
            return Err(PapertraderError::UnknownBroker {
                name: name.to_string(),
            });
        }
        self.default_name = name.to_string();
        Ok(())
    }

    /// Connect every broker. A failing broker is logged and reported as
    /// not connected; the rest still run.
    pub fn connect_all(&mut self) -> BTreeMap<String, bool> {
        let mut results = BTreeMap::new();
        for (name, broker) in self.brokers.iter_mut() {
            let connected = match broker.connect() {
                Ok(connected) => connected,
                Err(e) => {
                    error!(broker = %name, error = %e, "broker connect failed");
                    false
                }
            };
            info!(broker = %name, connected, "broker connect");
            results.insert(name.clone(), connected);
        }
        results
    }

    pub fn disconnect_all(&mut self) {
        for (name, broker) in self.brokers.iter_mut() {
            if let Err(e) = broker.disconnect() {
                error!(broker = %name, error = %e, "broker disconnect failed");
            }
        }
    }
}
