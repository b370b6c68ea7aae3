#![allow(dead_code)]

use papertrader::adapters::memory_ledger::MemoryLedger;
use papertrader::domain::error::PapertraderError;
use papertrader::domain::market::Quote;
use papertrader::domain::money::Money;
use papertrader::domain::scheduler::{LedgerHandles, SchedulerConfig, StrategyScheduler};
use papertrader::domain::strategy::{Strategy, StrategyKind};
use papertrader::ports::market_data_port::MarketDataPort;
use std::collections::HashMap;
use std::sync::Arc;

pub struct MockMarketPort {
    pub quotes: HashMap<String, Quote>,
    pub histories: HashMap<String, Vec<f64>>,
    pub errors: HashMap<String, String>,
}

impl MockMarketPort {
    pub fn new() -> Self {
        Self {
            quotes: HashMap::new(),
            histories: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_symbol(mut self, symbol: &str, price: f64, history: Vec<f64>) -> Self {
        self.quotes.insert(symbol.to_string(), make_quote(price));
        self.histories.insert(symbol.to_string(), history);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }

    fn check(&self, symbol: &str) -> Result<(), PapertraderError> {
        match self.errors.get(symbol) {
            Some(reason) => Err(PapertraderError::MarketData {
                symbol: symbol.to_string(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }
}

impl MarketDataPort for MockMarketPort {
    fn quote(&self, symbol: &str) -> Result<Option<Quote>, PapertraderError> {
        self.check(symbol)?;
        Ok(self.quotes.get(symbol).copied())
    }

    fn historical_closes(&self, symbol: &str, count: usize) -> Result<Vec<f64>, PapertraderError> {
        self.check(symbol)?;
        let closes = self.histories.get(symbol).cloned().unwrap_or_default();
        let skip = closes.len().saturating_sub(count);
        Ok(closes[skip..].to_vec())
    }
}

pub fn make_quote(price: f64) -> Quote {
    Quote {
        price,
        high: price * 1.01,
        low: price * 0.99,
        volume: 1_000_000,
    }
}

pub fn money(value: f64) -> Money {
    Money::from_f64(value).unwrap()
}

/// Closes rising faster and faster: MA stack and MACD both bullish, which
/// outweighs the overbought RSI and upper-band reading at a price of 10.
pub fn accelerating_history(len: usize) -> Vec<f64> {
    (0..len).map(|i| 5.0 + 0.002 * (i * i) as f64).collect()
}

/// Mirror image falling from 13: bearish at a price of 9.85.
pub fn decelerating_history(len: usize) -> Vec<f64> {
    (0..len).map(|i| 13.0 - 0.002 * (i * i) as f64).collect()
}

pub fn flat_history(len: usize, price: f64) -> Vec<f64> {
    vec![price; len]
}

pub fn make_strategy(id: i64, kind: StrategyKind, rules: &str) -> Strategy {
    Strategy {
        id,
        user_id: 1,
        name: format!("strategy {id}"),
        description: None,
        kind,
        is_active: true,
        rules: rules.to_string(),
    }
}

pub fn scheduler_config(initial_balance: f64, symbols: &[&str]) -> SchedulerConfig {
    SchedulerConfig {
        user_id: 1,
        initial_balance: money(initial_balance),
        default_symbols: symbols.iter().map(|s| s.to_string()).collect(),
        ..SchedulerConfig::default()
    }
}

pub fn make_scheduler(
    config: SchedulerConfig,
    market: MockMarketPort,
) -> (StrategyScheduler, Arc<MemoryLedger>) {
    let ledger = Arc::new(MemoryLedger::new());
    let scheduler = StrategyScheduler::new(config, Arc::new(market), LedgerHandles::shared(ledger.clone()));
    (scheduler, ledger)
}

