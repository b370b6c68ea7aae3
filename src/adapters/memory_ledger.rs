//! In-memory ledger. State lives for the life of the process.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use crate::domain::account::Account;
use crate::domain::error::PapertraderError;
use crate::domain::money::Money;
use crate::domain::position::{Fill, NewTrade, Position, Trade};
use crate::domain::strategy::{NewStrategy, Strategy};
use crate::ports::ledger_port::{AccountStore, PositionStore, SettlementStore, StrategyPort, TradeLedger};

#[derive(Default)]
struct LedgerState {
    accounts: BTreeMap<i64, Account>,
    positions: BTreeMap<(i64, String), Position>,
    trades: Vec<Trade>,
    strategies: Vec<Strategy>,
    next_trade_id: i64,
}

#[derive(Default)]
pub struct MemoryLedger {
    state: Mutex<LedgerState>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed with strategies loaded elsewhere, keeping their ids.
    pub fn with_strategies(strategies: Vec<Strategy>) -> Self {
        let ledger = Self::new();
        if let Ok(mut state) = ledger.state.lock() {
            state.strategies = strategies;
        }
        ledger
    }

    fn lock(&self) -> Result<MutexGuard<'_, LedgerState>, PapertraderError> {
        self.state.lock().map_err(|_| PapertraderError::Database {
            reason: "ledger lock poisoned".to_string(),
        })
    }
}

impl LedgerState {
    fn holdings_value(&self, user_id: i64) -> Money {
        self.positions
            .iter()
            .filter(|((owner, _), _)| *owner == user_id)
            .fold(Money::ZERO, |acc, (_, p)| acc + p.market_value(p.current_price))
    }

    fn set_balance(&mut self, user_id: i64, balance: Money) -> Result<Account, PapertraderError> {
        let holdings = self.holdings_value(user_id);
        let account = self
            .accounts
            .get_mut(&user_id)
            .ok_or_else(|| PapertraderError::DatabaseQuery {
                reason: format!("no account for user {user_id}"),
            })?;
        account.current_balance = balance;
        account.total_assets = balance + holdings;
        Ok(account.clone())
    }

    fn set_position(&mut self, user_id: i64, symbol: &str, quantity: i64, current_price: Money) {
        let key = (user_id, symbol.to_string());
        if quantity <= 0 {
            self.positions.remove(&key);
            return;
        }
        match self.positions.get_mut(&key) {
            Some(existing) => {
                existing.quantity = quantity;
                existing.current_price = current_price;
            }
            None => {
                if let Some(position) = Position::new(symbol, quantity, current_price, current_price) {
                    self.positions.insert(key, position);
                }
            }
        }
    }

    fn push_trade(&mut self, user_id: i64, trade: &NewTrade) -> Trade {
        self.next_trade_id += 1;
        let stored = Trade {
            id: self.next_trade_id,
            user_id,
            symbol: trade.symbol.clone(),
            side: trade.side,
            quantity: trade.quantity,
            price: trade.price,
            executed_at: trade.executed_at,
        };
        self.trades.push(stored.clone());
        stored
    }
}

impl AccountStore for MemoryLedger {
    fn get_or_create(&self, user_id: i64, initial_balance: Money) -> Result<Account, PapertraderError> {
        let mut state = self.lock()?;
        Ok(state
            .accounts
            .entry(user_id)
            .or_insert_with(|| Account::new(user_id, initial_balance))
            .clone())
    }

    fn update_balance(&self, user_id: i64, balance: Money) -> Result<Account, PapertraderError> {
        self.lock()?.set_balance(user_id, balance)
    }
}

impl PositionStore for MemoryLedger {
    fn get(&self, user_id: i64, symbol: &str) -> Result<Option<Position>, PapertraderError> {
        let state = self.lock()?;
        Ok(state.positions.get(&(user_id, symbol.to_string())).cloned())
    }

    fn list(&self, user_id: i64) -> Result<Vec<Position>, PapertraderError> {
        let state = self.lock()?;
        Ok(state
            .positions
            .iter()
            .filter(|((owner, _), _)| *owner == user_id)
            .map(|(_, p)| p.clone())
            .collect())
    }

    fn upsert(
        &self,
        user_id: i64,
        symbol: &str,
        quantity: i64,
        current_price: Money,
    ) -> Result<(), PapertraderError> {
        self.lock()?.set_position(user_id, symbol, quantity, current_price);
        Ok(())
    }
}

impl TradeLedger for MemoryLedger {
    fn record(&self, user_id: i64, trade: &NewTrade) -> Result<Trade, PapertraderError> {
        Ok(self.lock()?.push_trade(user_id, trade))
    }

    fn recent(&self, user_id: i64, limit: usize) -> Result<Vec<Trade>, PapertraderError> {
        let state = self.lock()?;
        Ok(state
            .trades
            .iter()
            .rev()
            .filter(|t| t.user_id == user_id)
            .take(limit)
            .cloned()
            .collect())
    }
}

impl SettlementStore for MemoryLedger {
    fn apply_fill(&self, user_id: i64, fill: &Fill) -> Result<Trade, PapertraderError> {
        let mut state = self.lock()?;
        // The only step that can fail; check it before anything is written.
        if !state.accounts.contains_key(&user_id) {
            return Err(PapertraderError::DatabaseQuery {
                reason: format!("no account for user {user_id}"),
            });
        }
        let trade = state.push_trade(user_id, &fill.trade);
        state.set_position(user_id, &fill.trade.symbol, fill.position_quantity, fill.trade.price);
        state.set_balance(user_id, fill.balance)?;
        Ok(trade)
    }
}

impl StrategyPort for MemoryLedger {
    fn active_strategies(&self, user_id: i64) -> Result<Vec<Strategy>, PapertraderError> {
        Ok(self
            .all_strategies(user_id)?
            .into_iter()
            .filter(|s| s.is_active)
            .collect())
    }

    fn all_strategies(&self, user_id: i64) -> Result<Vec<Strategy>, PapertraderError> {
        let state = self.lock()?;
        Ok(state
            .strategies
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect())
    }

    fn create_strategy(&self, user_id: i64, strategy: &NewStrategy) -> Result<Strategy, PapertraderError> {
        let mut state = self.lock()?;
        let id = state.strategies.iter().map(|s| s.id).max().unwrap_or(0) + 1;
        let stored = Strategy {
            id,
            user_id,
            name: strategy.name.clone(),
            description: strategy.description.clone(),
            kind: strategy.kind.clone(),
            is_active: strategy.is_active,
            rules: strategy.rules.clone(),
        };
        state.strategies.push(stored.clone());
        Ok(stored)
    }

    fn set_active(&self, user_id: i64, id: i64, active: bool) -> Result<bool, PapertraderError> {
        let mut state = self.lock()?;
        match state
            .strategies
            .iter_mut()
            .find(|s| s.id == id && s.user_id == user_id)
        {
            Some(strategy) => {
                strategy.is_active = active;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}
