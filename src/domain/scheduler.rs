//! Strategy execution across symbols.
//!
//! For every active strategy the rule document is parsed once, then each
//! target symbol is evaluated and settled in turn. A failure for one symbol
//! becomes an `ERROR` result for that symbol only; a malformed rule document
//! becomes a single `ERROR` result for its strategy. Nothing here aborts the
//! batch.

use chrono::Utc;
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

use crate::domain::account::Account;
use crate::domain::broker::{BrokerRegistry, OrderRequest, OrderResponse, OrderStatus};
use crate::domain::config_validation::{EngineSettings, SettlementMode};
use crate::domain::decision::{decide, Action, TradeDecision};
use crate::domain::error::PapertraderError;
use crate::domain::market::MarketSnapshot;
use crate::domain::money::Money;
use crate::domain::position::{Fill, NewTrade, Position, Trade, TradeSide};
use crate::domain::rules::{target_symbols, RuleDocument, StrategyRules};
use crate::domain::simulator::{simulate_trade, TradeExecution};
use crate::domain::strategy::Strategy;
use crate::ports::ledger_port::{AccountStore, PositionStore, SettlementStore, StrategyPort, TradeLedger};
use crate::ports::market_data_port::MarketDataPort;

/// Strategy id reported for trades entered by hand.
pub const MANUAL_STRATEGY_ID: i64 = 0;

const NO_SYMBOL: &str = "N/A";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionOutcome {
    Buy,
    Sell,
    Hold,
    Error,
}

impl From<&Action> for ExecutionOutcome {
    fn from(action: &Action) -> Self {
        match action {
            Action::Buy { .. } => ExecutionOutcome::Buy,
            Action::Sell { .. } => ExecutionOutcome::Sell,
            Action::Hold => ExecutionOutcome::Hold,
        }
    }
}

impl fmt::Display for ExecutionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExecutionOutcome::Buy => "BUY",
            ExecutionOutcome::Sell => "SELL",
            ExecutionOutcome::Hold => "HOLD",
            ExecutionOutcome::Error => "ERROR",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub strategy_id: i64,
    pub symbol: String,
    pub decision: ExecutionOutcome,
    pub executed: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trade_id: Option<i64>,
}

impl ExecutionResult {
    fn failure(strategy_id: i64, symbol: &str, message: String) -> Self {
        ExecutionResult {
            strategy_id,
            symbol: symbol.to_string(),
            decision: ExecutionOutcome::Error,
            executed: false,
            message,
            trade_id: None,
        }
    }

    fn not_executed(strategy_id: i64, symbol: &str, decision: ExecutionOutcome, message: String) -> Self {
        ExecutionResult {
            strategy_id,
            symbol: symbol.to_string(),
            decision,
            executed: false,
            message,
            trade_id: None,
        }
    }
}

impl fmt::Display for ExecutionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[strategy {}] {} {} executed={} {}",
            self.strategy_id, self.symbol, self.decision, self.executed, self.message
        )?;
        if let Some(id) = self.trade_id {
            write!(f, " (trade #{id})")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    pub user_id: i64,
    pub initial_balance: Money,
    pub history_len: usize,
    pub default_symbols: Vec<String>,
    pub settlement: SettlementMode,
    pub broker: String,
}

impl From<&EngineSettings> for SchedulerConfig {
    fn from(settings: &EngineSettings) -> Self {
        SchedulerConfig {
            user_id: settings.user_id,
            initial_balance: settings.initial_balance,
            history_len: settings.history_len,
            default_symbols: settings.default_symbols.clone(),
            settlement: settings.settlement,
            broker: settings.broker.clone(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig::from(&EngineSettings::default())
    }
}

/// The ledger stores the scheduler reads from and settles into.
#[derive(Clone)]
pub struct LedgerHandles {
    pub accounts: Arc<dyn AccountStore>,
    pub positions: Arc<dyn PositionStore>,
    pub trades: Arc<dyn TradeLedger>,
    pub settlements: Arc<dyn SettlementStore>,
}

impl LedgerHandles {
    /// Use one store for every role.
    pub fn shared<L>(ledger: Arc<L>) -> Self
    where
        L: AccountStore + PositionStore + TradeLedger + SettlementStore + 'static,
    {
        LedgerHandles {
            accounts: ledger.clone(),
            positions: ledger.clone(),
            trades: ledger.clone(),
            settlements: ledger,
        }
    }
}

/// Outcome of pushing one decision through settlement and the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct Settlement {
    pub execution: TradeExecution,
    pub executed: bool,
    pub message: String,
    pub trade: Option<Trade>,
    pub order: Option<OrderResponse>,
}

pub struct StrategyScheduler {
    config: SchedulerConfig,
    market: Arc<dyn MarketDataPort>,
    ledger: LedgerHandles,
    brokers: Option<Arc<Mutex<BrokerRegistry>>>,
}

impl StrategyScheduler {
    pub fn new(config: SchedulerConfig, market: Arc<dyn MarketDataPort>, ledger: LedgerHandles) -> Self {
        StrategyScheduler {
            config,
            market,
            ledger,
            brokers: None,
        }
    }

    /// Attach the broker registry used when settlement mode is `Broker`.
    pub fn with_brokers(mut self, brokers: Arc<Mutex<BrokerRegistry>>) -> Self {
        self.brokers = Some(brokers);
        self
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Load the user's active strategies and run them all.
    pub fn run_tick(&self, store: &dyn StrategyPort) -> Result<Vec<ExecutionResult>, PapertraderError> {
        let strategies = store.active_strategies(self.config.user_id)?;
        info!(
            user_id = self.config.user_id,
            strategies = strategies.len(),
            "executing strategies"
        );
        let results = self.execute_all_active(&strategies);
        let executed = results.iter().filter(|r| r.executed).count();
        info!(executed, results = results.len(), "strategy execution completed");
        Ok(results)
    }

    /// Run every active strategy in order and concatenate the results.
    /// Inactive strategies are skipped.
    pub fn execute_all_active(&self, strategies: &[Strategy]) -> Vec<ExecutionResult> {
        strategies
            .iter()
            .filter(|s| s.is_active)
            .flat_map(|s| self.execute_strategy(s))
            .collect()
    }

    pub fn execute_strategy(&self, strategy: &Strategy) -> Vec<ExecutionResult> {
        let doc = match RuleDocument::parse(&strategy.rules) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(strategy_id = strategy.id, error = %e, "invalid strategy rules");
                return vec![ExecutionResult::failure(
                    strategy.id,
                    NO_SYMBOL,
                    "Invalid strategy rules".to_string(),
                )];
            }
        };
        let rules = StrategyRules::from_document(&strategy.kind, &doc);

        target_symbols(&doc, &self.config.default_symbols)
            .iter()
            .map(|symbol| {
                self.execute_symbol(strategy, rules.as_ref(), symbol)
                    .unwrap_or_else(|e| {
                        error!(strategy_id = strategy.id, symbol = %symbol, error = %e, "execution error");
                        ExecutionResult::failure(strategy.id, symbol, format!("Execution error: {e}"))
                    })
            })
            .collect()
    }

    /// Evaluate and settle one symbol for a strategy whose rules are
    /// already parsed.
    pub fn execute_symbol(
        &self,
        strategy: &Strategy,
        rules: Option<&StrategyRules>,
        symbol: &str,
    ) -> Result<ExecutionResult, PapertraderError> {
        let Some(quote) = self.market.quote(symbol)? else {
            return Ok(ExecutionResult::not_executed(
                strategy.id,
                symbol,
                ExecutionOutcome::Hold,
                "Failed to get market data".to_string(),
            ));
        };
        let snapshot = MarketSnapshot::from_quote(symbol, quote, Utc::now());
        let history = self.market.historical_closes(symbol, self.config.history_len)?;
        let account = self.account()?;
        let position = self.ledger.positions.get(self.config.user_id, symbol)?;

        let decision = decide(rules, &snapshot, &history, position.as_ref(), &account);
        let outcome = ExecutionOutcome::from(&decision.action);
        if decision.is_hold() {
            return Ok(ExecutionResult::not_executed(strategy.id, symbol, outcome, decision.reason));
        }

        let settlement = self.settle(&decision, &snapshot, &account, position.as_ref())?;
        Ok(ExecutionResult {
            strategy_id: strategy.id,
            symbol: symbol.to_string(),
            decision: outcome,
            executed: settlement.executed,
            message: settlement.message,
            trade_id: settlement.trade.map(|t| t.id),
        })
    }

    /// Settle a hand-entered trade through the same path as strategy
    /// decisions.
    pub fn manual_trade(
        &self,
        symbol: &str,
        side: TradeSide,
        quantity: i64,
        price: f64,
    ) -> Result<ExecutionResult, PapertraderError> {
        let action = match side {
            TradeSide::Buy => Action::Buy { quantity },
            TradeSide::Sell => Action::Sell { quantity },
        };
        let decision = TradeDecision {
            action,
            reason: "Manual trade".to_string(),
            confidence: 100,
        };
        let snapshot = MarketSnapshot::at_price(symbol, price, Utc::now());
        let account = self.account()?;
        let position = self.ledger.positions.get(self.config.user_id, symbol)?;

        let settlement = self.settle(&decision, &snapshot, &account, position.as_ref())?;
        Ok(ExecutionResult {
            strategy_id: MANUAL_STRATEGY_ID,
            symbol: symbol.to_string(),
            decision: ExecutionOutcome::from(&action),
            executed: settlement.executed,
            message: settlement.message,
            trade_id: settlement.trade.map(|t| t.id),
        })
    }

    /// Simulate, optionally route to the broker, then write the fill to the
    /// ledger as one unit: trade, position, cash balance.
    pub fn settle(
        &self,
        decision: &TradeDecision,
        snapshot: &MarketSnapshot,
        account: &Account,
        position: Option<&Position>,
    ) -> Result<Settlement, PapertraderError> {
        let execution = simulate_trade(decision, snapshot, account, position);
        let message = execution.message();

        let (side, quantity, price, new_balance) = match &execution {
            TradeExecution::Bought {
                quantity,
                price,
                new_balance,
                ..
            } => (TradeSide::Buy, *quantity, *price, *new_balance),
            TradeExecution::Sold {
                quantity,
                price,
                new_balance,
                ..
            } => (TradeSide::Sell, *quantity, *price, *new_balance),
            TradeExecution::NoTrade | TradeExecution::Rejected(_) => {
                if !execution.is_success() {
                    warn!(symbol = %snapshot.symbol, action = %decision.action, reason = %message, "trade rejected");
                }
                return Ok(Settlement {
                    execution,
                    executed: false,
                    message,
                    trade: None,
                    order: None,
                });
            }
        };

        let order = match self.config.settlement {
            SettlementMode::Simulated => None,
            SettlementMode::Broker => {
                let response = self.place_order(&snapshot.symbol, side, quantity, snapshot.price)?;
                if response.status == OrderStatus::Rejected {
                    warn!(symbol = %snapshot.symbol, reason = %response.message, "broker rejected order");
                    return Ok(Settlement {
                        execution,
                        executed: false,
                        message: format!("Broker rejected order: {}", response.message),
                        trade: None,
                        order: Some(response),
                    });
                }
                Some(response)
            }
        };

        let held = position.map(|p| p.quantity).unwrap_or(0);
        let fill = Fill {
            trade: NewTrade {
                symbol: snapshot.symbol.clone(),
                side,
                quantity,
                price,
                executed_at: snapshot.timestamp,
            },
            position_quantity: match side {
                TradeSide::Buy => held + quantity,
                TradeSide::Sell => held - quantity,
            },
            balance: new_balance,
        };
        let trade = self
            .ledger
            .settlements
            .apply_fill(self.config.user_id, &fill)
            .inspect_err(|e| {
                if let Some(order) = &order {
                    error!(order_id = %order.order_id, error = %e, "broker fill not recorded in ledger");
                }
            })?;

        info!(
            symbol = %snapshot.symbol,
            side = %side,
            quantity,
            price = %price,
            trade_id = trade.id,
            "trade executed"
        );

        let message = match &order {
            Some(order) => format!("{message} (order {})", order.order_id),
            None => message,
        };
        Ok(Settlement {
            execution,
            executed: true,
            message,
            trade: Some(trade),
            order,
        })
    }

    /// Disconnect every attached broker. No-op without a registry.
    pub fn disconnect_brokers(&self) -> Result<(), PapertraderError> {
        if let Some(brokers) = &self.brokers {
            let mut registry = brokers.lock().map_err(|_| PapertraderError::Broker {
                reason: "broker registry lock poisoned".to_string(),
            })?;
            registry.disconnect_all();
        }
        Ok(())
    }

    fn account(&self) -> Result<Account, PapertraderError> {
        self.ledger
            .accounts
            .get_or_create(self.config.user_id, self.config.initial_balance)
    }

    fn place_order(
        &self,
        symbol: &str,
        side: TradeSide,
        quantity: i64,
        price: f64,
    ) -> Result<OrderResponse, PapertraderError> {
        let brokers = self.brokers.as_ref().ok_or_else(|| PapertraderError::Broker {
            reason: "broker settlement configured without a broker registry".to_string(),
        })?;
        let mut registry = brokers.lock().map_err(|_| PapertraderError::Broker {
            reason: "broker registry lock poisoned".to_string(),
        })?;
        let broker = registry.get(Some(self.config.broker.as_str()))?;
        broker.place_order(&OrderRequest::limit(symbol, side, quantity, price))
    }
}
