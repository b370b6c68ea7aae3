//! End-to-end strategy execution against mock market data and the
//! in-memory and SQLite ledgers.

mod common;

use chrono::Utc;
use common::*;
use papertrader::adapters::memory_ledger::MemoryLedger;
use papertrader::adapters::mock_broker::MockBroker;
use papertrader::domain::account::Account;
use papertrader::domain::broker::BrokerRegistry;
use papertrader::domain::config_validation::SettlementMode;
use papertrader::domain::decision::{decide, Action};
use papertrader::domain::market::MarketSnapshot;
use papertrader::domain::position::{Position, TradeSide};
use papertrader::domain::rules::StrategyRules;
use papertrader::domain::scheduler::{ExecutionOutcome, LedgerHandles, StrategyScheduler};
use papertrader::domain::strategy::StrategyKind;
use papertrader::ports::broker_port::BrokerPort;
use papertrader::ports::ledger_port::{AccountStore, PositionStore, TradeLedger};
use std::sync::{Arc, Mutex};

const SYMBOL: &str = "600519.SH";

mod technical_flow {
    use super::*;

    #[test]
    fn bullish_history_buys_capped_size_and_updates_ledger() {
        let market = MockMarketPort::new().with_symbol(SYMBOL, 10.0, accelerating_history(40));
        let (scheduler, ledger) = make_scheduler(scheduler_config(100_000.0, &[SYMBOL]), market);
        let strategy = make_strategy(1, StrategyKind::Technical, r#"{"maxPositionSize": 500}"#);

        let results = scheduler.execute_all_active(&[strategy]);

        assert_eq!(results.len(), 1);
        let result = &results[0];
        assert_eq!(result.decision, ExecutionOutcome::Buy);
        assert!(result.executed, "{result}");
        assert_eq!(result.message, "Bought 500 shares at 10");
        assert_eq!(result.trade_id, Some(1));

        let account = ledger.get_or_create(1, money(0.0)).unwrap();
        assert_eq!(account.current_balance, money(95_000.0));
        assert_eq!(account.total_assets, money(100_000.0));

        let position = ledger.get(1, SYMBOL).unwrap().unwrap();
        assert_eq!(position.quantity, 500);
        assert_eq!(position.cost_price, money(10.0));

        let trades = ledger.recent(1, 10).unwrap();
        assert_eq!(trades.len(), 1);
        assert_eq!(trades[0].side, TradeSide::Buy);
    }

    #[test]
    fn buy_signal_with_open_position_holds() {
        let market = MockMarketPort::new().with_symbol(SYMBOL, 10.0, accelerating_history(40));
        let (scheduler, ledger) = make_scheduler(scheduler_config(100_000.0, &[SYMBOL]), market);
        let strategy = make_strategy(1, StrategyKind::Technical, r#"{"maxPositionSize": 100}"#);

        scheduler.execute_all_active(std::slice::from_ref(&strategy));
        let second = scheduler.execute_all_active(&[strategy]);

        assert_eq!(second[0].decision, ExecutionOutcome::Hold);
        assert!(!second[0].executed);
        assert_eq!(second[0].message, "No clear signal");
        assert_eq!(ledger.recent(1, 10).unwrap().len(), 1);
    }

    #[test]
    fn bearish_history_sells_whole_position() {
        let market = MockMarketPort::new().with_symbol(SYMBOL, 9.85, decelerating_history(40));
        let (scheduler, ledger) = make_scheduler(scheduler_config(1_000.0, &[SYMBOL]), market);
        ledger.get_or_create(1, money(1_000.0)).unwrap();
        ledger.upsert(1, SYMBOL, 300, money(9.0)).unwrap();

        let results = scheduler.execute_all_active(&[make_strategy(1, StrategyKind::Technical, "{}")]);

        assert_eq!(results[0].decision, ExecutionOutcome::Sell);
        assert!(results[0].executed);
        assert!(ledger.get(1, SYMBOL).unwrap().is_none());
        let account = ledger.get_or_create(1, money(0.0)).unwrap();
        assert_eq!(account.current_balance, money(1_000.0 + 300.0 * 9.85));
    }

    #[test]
    fn short_history_holds() {
        let market = MockMarketPort::new().with_symbol(SYMBOL, 10.0, accelerating_history(20));
        let (scheduler, _) = make_scheduler(scheduler_config(100_000.0, &[SYMBOL]), market);

        let results = scheduler.execute_all_active(&[make_strategy(1, StrategyKind::Technical, "{}")]);

        assert_eq!(results[0].decision, ExecutionOutcome::Hold);
        assert_eq!(results[0].message, "Insufficient historical data");
    }

    #[test]
    fn unknown_symbol_holds_without_quote() {
        let market = MockMarketPort::new();
        let (scheduler, _) = make_scheduler(scheduler_config(100_000.0, &[]), market);
        let rules = r#"{"symbols": ["999999.SH"]}"#;

        let results = scheduler.execute_all_active(&[make_strategy(1, StrategyKind::Technical, rules)]);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].symbol, "999999.SH");
        assert_eq!(results[0].decision, ExecutionOutcome::Hold);
        assert_eq!(results[0].message, "Failed to get market data");
    }
}

mod risk_rules {
    use super::*;

    #[test]
    fn take_profit_sells_and_deletes_position() {
        let market = MockMarketPort::new().with_symbol(SYMBOL, 13.32, accelerating_history(40));
        let (scheduler, ledger) = make_scheduler(scheduler_config(100_000.0, &[SYMBOL]), market);
        ledger.get_or_create(1, money(100_000.0)).unwrap();
        ledger.upsert(1, SYMBOL, 200, money(12.0)).unwrap();

        let results = scheduler
            .execute_all_active(&[make_strategy(1, StrategyKind::Technical, r#"{"takeProfit": 10}"#)]);

        assert_eq!(results[0].decision, ExecutionOutcome::Sell);
        assert!(results[0].executed);
        assert_eq!(results[0].message, "Sold 200 shares at 13.32");
        assert!(ledger.get(1, SYMBOL).unwrap().is_none());
        let account = ledger.get_or_create(1, money(0.0)).unwrap();
        assert_eq!(account.current_balance, money(102_664.0));
    }

    #[test]
    fn stop_loss_overrides_buy_signal() {
        let rules = StrategyRules::parse(&StrategyKind::Technical, r#"{"stopLoss": 10, "takeProfit": 5}"#)
            .unwrap()
            .unwrap();
        let snapshot = MarketSnapshot::at_price(SYMBOL, 10.0, Utc::now());
        let position = Position::new(SYMBOL, 100, money(20.0), money(20.0)).unwrap();
        let account = Account::new(1, money(100_000.0));

        let decision = decide(
            Some(&rules),
            &snapshot,
            &accelerating_history(40),
            Some(&position),
            &account,
        );

        assert_eq!(decision.action, Action::Sell { quantity: 100 });
        assert_eq!(decision.reason, "Stop loss triggered: 50.00% loss");
        assert_eq!(decision.confidence, 100);
    }

    #[test]
    fn ten_percent_drop_trips_five_percent_stop() {
        let rules = StrategyRules::parse(&StrategyKind::Technical, r#"{"stopLossPercent": 5}"#)
            .unwrap()
            .unwrap();
        let snapshot = MarketSnapshot::at_price(SYMBOL, 90.0, Utc::now());
        let position = Position::new(SYMBOL, 30, money(100.0), money(100.0)).unwrap();
        let account = Account::new(1, money(1_000.0));

        let decision = decide(
            Some(&rules),
            &snapshot,
            &accelerating_history(40),
            Some(&position),
            &account,
        );

        assert_eq!(decision.action, Action::Sell { quantity: 30 });
        assert_eq!(decision.reason, "Stop loss triggered: 10.00% loss");
    }

    #[test]
    fn unset_limits_never_force_an_exit() {
        let rules = StrategyRules::parse(&StrategyKind::Technical, r#"{"stopLoss": 0}"#)
            .unwrap()
            .unwrap();
        let snapshot = MarketSnapshot::at_price(SYMBOL, 10.0, Utc::now());
        let position = Position::new(SYMBOL, 100, money(20.0), money(20.0)).unwrap();
        let account = Account::new(1, money(100_000.0));

        let decision = decide(
            Some(&rules),
            &snapshot,
            &accelerating_history(40),
            Some(&position),
            &account,
        );

        assert!(decision.is_hold());
    }
}

mod custom_and_unknown {
    use super::*;

    #[test]
    fn custom_conditions_buy_then_sell() {
        let market = MockMarketPort::new().with_symbol(SYMBOL, 20.0, flat_history(5, 20.0));
        let (scheduler, ledger) = make_scheduler(scheduler_config(10_000.0, &[SYMBOL]), market);
        let buy_only = make_strategy(
            1,
            StrategyKind::Custom,
            r#"{"buyConditions": ["rsi < 30"], "maxPositionSize": 50}"#,
        );
        let sell_only = make_strategy(2, StrategyKind::Custom, r#"{"sellConditions": ["rsi > 70"]}"#);

        let bought = scheduler.execute_all_active(&[buy_only]);
        assert_eq!(bought[0].decision, ExecutionOutcome::Buy);
        assert_eq!(ledger.get(1, SYMBOL).unwrap().unwrap().quantity, 50);

        let sold = scheduler.execute_all_active(&[sell_only]);
        assert_eq!(sold[0].decision, ExecutionOutcome::Sell);
        assert!(ledger.get(1, SYMBOL).unwrap().is_none());
        assert_eq!(
            ledger.get_or_create(1, money(0.0)).unwrap().current_balance,
            money(10_000.0)
        );
    }

    #[test]
    fn custom_without_conditions_holds() {
        let market = MockMarketPort::new().with_symbol(SYMBOL, 20.0, flat_history(5, 20.0));
        let (scheduler, _) = make_scheduler(scheduler_config(10_000.0, &[SYMBOL]), market);

        let results = scheduler.execute_all_active(&[make_strategy(1, StrategyKind::Custom, "{}")]);

        assert_eq!(results[0].message, "No custom condition triggered");
    }

    #[test]
    fn unknown_kind_holds() {
        let market = MockMarketPort::new().with_symbol(SYMBOL, 20.0, flat_history(40, 20.0));
        let (scheduler, _) = make_scheduler(scheduler_config(10_000.0, &[SYMBOL]), market);

        let results = scheduler
            .execute_all_active(&[make_strategy(1, StrategyKind::Other("neural".into()), "{}")]);

        assert_eq!(results[0].decision, ExecutionOutcome::Hold);
        assert_eq!(results[0].message, "Unknown strategy type");
    }
}

mod isolation {
    use super::*;

    #[test]
    fn malformed_rules_fail_only_their_strategy() {
        let market = MockMarketPort::new().with_symbol(SYMBOL, 10.0, accelerating_history(40));
        let (scheduler, _) = make_scheduler(scheduler_config(100_000.0, &[SYMBOL]), market);
        let broken = make_strategy(1, StrategyKind::Technical, "{not json");
        let good = make_strategy(2, StrategyKind::Technical, r#"{"maxPositionSize": 10}"#);

        let results = scheduler.execute_all_active(&[broken, good]);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].strategy_id, 1);
        assert_eq!(results[0].decision, ExecutionOutcome::Error);
        assert_eq!(results[0].symbol, "N/A");
        assert_eq!(results[0].message, "Invalid strategy rules");
        assert_eq!(results[1].strategy_id, 2);
        assert_eq!(results[1].decision, ExecutionOutcome::Buy);
        assert!(results[1].executed);
    }

    #[test]
    fn market_error_fails_only_its_symbol() {
        let market = MockMarketPort::new()
            .with_error("000001.SZ", "feed down")
            .with_symbol(SYMBOL, 10.0, accelerating_history(40));
        let (scheduler, _) = make_scheduler(scheduler_config(100_000.0, &["000001.SZ", SYMBOL]), market);

        let results = scheduler
            .execute_all_active(&[make_strategy(1, StrategyKind::Technical, r#"{"maxPositionSize": 10}"#)]);

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].decision, ExecutionOutcome::Error);
        assert_eq!(
            results[0].message,
            "Execution error: market data error for 000001.SZ: feed down"
        );
        assert_eq!(results[1].decision, ExecutionOutcome::Buy);
    }

    #[test]
    fn run_tick_skips_inactive_strategies() {
        let market = MockMarketPort::new().with_symbol(SYMBOL, 10.0, accelerating_history(40));
        let mut inactive = make_strategy(1, StrategyKind::Technical, "{}");
        inactive.is_active = false;
        let active = make_strategy(2, StrategyKind::Technical, r#"{"maxPositionSize": 1}"#);
        let ledger = Arc::new(MemoryLedger::with_strategies(vec![inactive, active]));
        let scheduler = StrategyScheduler::new(
            scheduler_config(100_000.0, &[SYMBOL]),
            Arc::new(market),
            LedgerHandles::shared(ledger.clone()),
        );

        let results = scheduler.run_tick(ledger.as_ref()).unwrap();

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].strategy_id, 2);
    }
}

mod manual_and_broker {
    use super::*;

    #[test]
    fn manual_buy_beyond_cash_is_rejected() {
        let (scheduler, ledger) = make_scheduler(scheduler_config(1_000.0, &[]), MockMarketPort::new());

        let result = scheduler.manual_trade(SYMBOL, TradeSide::Buy, 200, 10.0).unwrap();

        assert!(!result.executed);
        assert_eq!(result.message, "Insufficient funds");
        assert!(ledger.recent(1, 10).unwrap().is_empty());
    }

    #[test]
    fn manual_round_trip_restores_cash() {
        let (scheduler, ledger) = make_scheduler(scheduler_config(1_000.0, &[]), MockMarketPort::new());

        assert!(scheduler.manual_trade(SYMBOL, TradeSide::Buy, 40, 12.5).unwrap().executed);
        assert!(scheduler.manual_trade(SYMBOL, TradeSide::Sell, 40, 12.5).unwrap().executed);

        assert!(ledger.get(1, SYMBOL).unwrap().is_none());
        assert_eq!(
            ledger.get_or_create(1, money(0.0)).unwrap().current_balance,
            money(1_000.0)
        );
        assert_eq!(ledger.recent(1, 10).unwrap().len(), 2);
    }

    fn broker_scheduler(connected: bool) -> (StrategyScheduler, Arc<MemoryLedger>) {
        let mut config = scheduler_config(1_000.0, &[]);
        config.settlement = SettlementMode::Broker;
        config.broker = "mock".to_string();
        let mut broker = MockBroker::new(money(1_000.0));
        if connected {
            broker.connect().unwrap();
        }
        let mut registry = BrokerRegistry::new();
        registry.add("mock", Box::new(broker));
        let (scheduler, ledger) = make_scheduler(config, MockMarketPort::new());
        (scheduler.with_brokers(Arc::new(Mutex::new(registry))), ledger)
    }

    #[test]
    fn broker_fill_is_recorded_with_order_id() {
        let (scheduler, ledger) = broker_scheduler(true);

        let result = scheduler.manual_trade(SYMBOL, TradeSide::Buy, 10, 10.0).unwrap();

        assert!(result.executed);
        assert_eq!(result.message, "Bought 10 shares at 10 (order MOCK1)");
        assert_eq!(ledger.get(1, SYMBOL).unwrap().unwrap().quantity, 10);
    }

    #[test]
    fn broker_rejection_leaves_ledger_untouched() {
        let (scheduler, ledger) = broker_scheduler(false);

        let result = scheduler.manual_trade(SYMBOL, TradeSide::Buy, 10, 10.0).unwrap();

        assert!(!result.executed);
        assert_eq!(result.message, "Broker rejected order: Not connected");
        assert!(ledger.get(1, SYMBOL).unwrap().is_none());
        assert!(ledger.recent(1, 10).unwrap().is_empty());
        assert_eq!(
            ledger.get_or_create(1, money(0.0)).unwrap().current_balance,
            money(1_000.0)
        );
    }
}

#[cfg(feature = "sqlite")]
mod sqlite_ledger {
    use super::*;
    use papertrader::adapters::sqlite_ledger::SqliteLedger;

    #[test]
    fn strategy_flow_persists_to_sqlite() {
        let ledger = Arc::new(SqliteLedger::in_memory().unwrap());
        ledger.initialize_schema().unwrap();
        let market = MockMarketPort::new().with_symbol(SYMBOL, 10.0, accelerating_history(40));
        let scheduler = StrategyScheduler::new(
            scheduler_config(100_000.0, &[SYMBOL]),
            Arc::new(market),
            LedgerHandles::shared(ledger.clone()),
        );

        let results = scheduler
            .execute_all_active(&[make_strategy(1, StrategyKind::Technical, r#"{"maxPositionSize": 500}"#)]);

        assert!(results[0].executed);
        let account = ledger.get_or_create(1, money(0.0)).unwrap();
        assert_eq!(account.current_balance, money(95_000.0));
        assert_eq!(account.total_assets, money(100_000.0));
        assert_eq!(ledger.get(1, SYMBOL).unwrap().unwrap().quantity, 500);
        assert_eq!(ledger.recent(1, 5).unwrap()[0].price, money(10.0));
    }
}
