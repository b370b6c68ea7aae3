//! In-process broker that fills every order immediately.

use rust_decimal::Decimal;
use std::collections::BTreeMap;

use tracing::info;

use crate::domain::broker::{
    BrokerAccountInfo, BrokerPosition, OrderRequest, OrderResponse, OrderStatus,
};
use crate::domain::error::PapertraderError;
use crate::domain::money::Money;
use crate::domain::position::TradeSide;
use crate::ports::broker_port::BrokerPort;

pub const MOCK_ACCOUNT_ID: &str = "MOCK_ACCOUNT";

pub struct MockBroker {
    connected: bool,
    balance: Money,
    next_order: u64,
    orders: BTreeMap<String, OrderResponse>,
    /// Quantity and average cost per symbol.
    holdings: BTreeMap<String, (i64, Money)>,
}

impl MockBroker {
    pub fn new(balance: Money) -> Self {
        MockBroker {
            connected: false,
            balance,
            next_order: 1,
            orders: BTreeMap::new(),
            holdings: BTreeMap::new(),
        }
    }

    fn apply_fill(&mut self, order: &OrderRequest, price: Money) {
        let value = price.times(order.quantity);
        match order.side {
            TradeSide::Buy => {
                self.balance = self.balance - value;
                let entry = self
                    .holdings
                    .entry(order.symbol.clone())
                    .or_insert((0, price));
                let total_cost = entry.1.times(entry.0) + value;
                entry.0 += order.quantity;
                entry.1 = Money::from_decimal(total_cost.amount() / Decimal::from(entry.0));
            }
            TradeSide::Sell => {
                self.balance = self.balance + value;
                if let Some(entry) = self.holdings.get_mut(&order.symbol) {
                    entry.0 -= order.quantity;
                    if entry.0 <= 0 {
                        self.holdings.remove(&order.symbol);
                    }
                }
            }
        }
    }
}

impl BrokerPort for MockBroker {
    fn connect(&mut self) -> Result<bool, PapertraderError> {
        self.connected = true;
        info!("mock broker connected");
        Ok(true)
    }

    fn disconnect(&mut self) -> Result<(), PapertraderError> {
        self.connected = false;
        info!("mock broker disconnected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn place_order(&mut self, order: &OrderRequest) -> Result<OrderResponse, PapertraderError> {
        if !self.connected {
            return Ok(OrderResponse::rejected(order, "Not connected"));
        }
        if order.quantity <= 0 {
            return Ok(OrderResponse::rejected(order, "Quantity must be positive"));
        }
        let Some(fill_price) = order.price.and_then(Money::from_f64).filter(|p| p.is_positive()) else {
            return Ok(OrderResponse::rejected(order, "Price must be positive"));
        };

        let price = order.price.unwrap_or(0.0);
        let order_id = format!("MOCK{}", self.next_order);
        self.next_order += 1;
        self.apply_fill(order, fill_price);

        let response = OrderResponse {
            order_id: order_id.clone(),
            symbol: order.symbol.clone(),
            side: order.side,
            quantity: order.quantity,
            price,
            status: OrderStatus::Filled,
            message: "Order executed successfully".to_string(),
        };
        self.orders.insert(order_id, response.clone());
        Ok(response)
    }

    fn cancel_order(&mut self, order_id: &str) -> Result<bool, PapertraderError> {
        match self.orders.get_mut(order_id) {
            Some(order) => {
                order.status = OrderStatus::Cancelled;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn order_status(&self, order_id: &str) -> Result<Option<OrderStatus>, PapertraderError> {
        Ok(self.orders.get(order_id).map(|o| o.status))
    }

    fn account_info(&self) -> Result<BrokerAccountInfo, PapertraderError> {
        let market_value = self
            .holdings
            .values()
            .fold(Money::ZERO, |acc, (quantity, cost)| acc + cost.times(*quantity));
        Ok(BrokerAccountInfo {
            account_id: MOCK_ACCOUNT_ID.to_string(),
            balance: self.balance,
            available_balance: self.balance,
            market_value,
            total_assets: self.balance + market_value,
            profit_loss: Money::ZERO,
        })
    }

    fn positions(&self) -> Result<Vec<BrokerPosition>, PapertraderError> {
        Ok(self
            .holdings
            .iter()
            .map(|(symbol, (quantity, cost_price))| BrokerPosition {
                symbol: symbol.clone(),
                quantity: *quantity,
                cost_price: *cost_price,
            })
            .collect())
    }
}
