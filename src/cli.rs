//! CLI definition and dispatch.

use clap::{Parser, Subcommand, ValueEnum};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::adapters::csv_market_adapter::CsvMarketAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::memory_ledger::MemoryLedger;
use crate::adapters::mock_broker::MockBroker;
use crate::adapters::strategy_file::load_strategies;
use crate::adapters::synthetic_market_adapter::SyntheticMarketAdapter;
use crate::domain::broker::BrokerRegistry;
use crate::domain::config_validation::{EngineSettings, MarketSource, SettlementMode, DEFAULT_BROKER};
use crate::domain::decision::HISTORY_BAND;
use crate::domain::error::PapertraderError;
use crate::domain::indicator::calculate_all;
use crate::domain::metrics::{account_metrics, position_metrics};
use crate::domain::money::Money;
use crate::domain::position::TradeSide;
use crate::domain::price_series::PriceSeries;
use crate::domain::rules::{target_symbols, RuleDocument, StrategyRules};
use crate::domain::scheduler::{ExecutionResult, LedgerHandles, SchedulerConfig, StrategyScheduler};
use crate::domain::signal::generate_signal;
use crate::domain::strategy::{NewStrategy, Strategy, StrategyKind};
use crate::domain::ticker::spawn_ticker;
use crate::ports::config_port::ConfigPort;
use crate::ports::ledger_port::StrategyPort;
use crate::ports::market_data_port::MarketDataPort;

#[derive(Parser, Debug)]
#[command(name = "papertrader", about = "Technical-indicator paper trading engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Execute every active strategy once
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// JSON strategy file used instead of the ledger's strategies
        #[arg(short, long)]
        strategies: Option<PathBuf>,
        /// Print results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Execute active strategies repeatedly until interrupted
    Schedule {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        strategies: Option<PathBuf>,
        #[arg(long)]
        interval_secs: Option<u64>,
    },
    /// Check a rule document without running it
    Validate {
        #[arg(short, long)]
        rules: PathBuf,
        #[arg(short, long, value_enum, default_value_t = KindArg::Technical)]
        kind: KindArg,
    },
    /// Show indicators and the combined signal for one symbol
    Indicators {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
    },
    /// Enter a trade by hand
    Trade {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        symbol: String,
        #[arg(long, value_enum)]
        side: SideArg,
        #[arg(long)]
        quantity: i64,
        #[arg(long)]
        price: f64,
    },
    /// Show account value, positions and recent trades
    Portfolio {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long, default_value_t = 10)]
        trades: usize,
    },
    /// Manage stored strategies
    Strategy {
        #[arg(short, long)]
        config: PathBuf,
        #[command(subcommand)]
        action: StrategyCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum StrategyCommand {
    /// Store a strategy from a rule document file
    Add {
        #[arg(long)]
        name: String,
        #[arg(short, long, value_enum, default_value_t = KindArg::Technical)]
        kind: KindArg,
        #[arg(short, long)]
        rules: PathBuf,
        #[arg(long)]
        description: Option<String>,
        /// Store the strategy inactive
        #[arg(long)]
        inactive: bool,
    },
    List,
    Activate { id: i64 },
    Deactivate { id: i64 },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum KindArg {
    Technical,
    Custom,
}

impl From<KindArg> for StrategyKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Technical => StrategyKind::Technical,
            KindArg::Custom => StrategyKind::Custom,
        }
    }
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum SideArg {
    Buy,
    Sell,
}

impl From<SideArg> for TradeSide {
    fn from(side: SideArg) -> Self {
        match side {
            SideArg::Buy => TradeSide::Buy,
            SideArg::Sell => TradeSide::Sell,
        }
    }
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Run {
            config,
            strategies,
            json,
        } => run_batch(&config, strategies.as_deref(), json),
        Command::Schedule {
            config,
            strategies,
            interval_secs,
        } => run_schedule(&config, strategies.as_deref(), interval_secs),
        Command::Validate { rules, kind } => run_validate(&rules, kind.into()),
        Command::Indicators { config, symbol } => run_indicators(&config, &symbol),
        Command::Trade {
            config,
            symbol,
            side,
            quantity,
            price,
        } => run_trade(&config, &symbol, side.into(), quantity, price),
        Command::Portfolio { config, trades } => run_portfolio(&config, trades),
        Command::Strategy { config, action } => run_strategy(&config, action),
    };

    result.unwrap_or_else(|e| {
        eprintln!("error: {e}");
        (&e).into()
    })
}

pub fn load_config(path: &Path) -> Result<(FileConfigAdapter, EngineSettings), PapertraderError> {
    let adapter = FileConfigAdapter::from_file(path)?;
    let settings = EngineSettings::from_config(&adapter)?;
    Ok((adapter, settings))
}

/// Ledger backend selected by configuration.
#[derive(Clone)]
pub enum Ledger {
    Memory(Arc<MemoryLedger>),
    #[cfg(feature = "sqlite")]
    Sqlite(Arc<crate::adapters::sqlite_ledger::SqliteLedger>),
}

impl Ledger {
    /// SQLite when `[sqlite] path` is set, otherwise a ledger that lives
    /// only as long as the process.
    pub fn open(config: &dyn ConfigPort) -> Result<Self, PapertraderError> {
        #[cfg(feature = "sqlite")]
        if config.get_string("sqlite", "path").is_some() {
            let ledger = crate::adapters::sqlite_ledger::SqliteLedger::from_config(config)?;
            ledger.initialize_schema()?;
            return Ok(Ledger::Sqlite(Arc::new(ledger)));
        }

        #[cfg(not(feature = "sqlite"))]
        if config.get_string("sqlite", "path").is_some() {
            warn!("built without sqlite support; [sqlite] path ignored");
        }

        warn!("no persistent ledger configured; state is kept in memory");
        Ok(Ledger::Memory(Arc::new(MemoryLedger::new())))
    }

    pub fn handles(&self) -> LedgerHandles {
        match self {
            Ledger::Memory(l) => LedgerHandles::shared(l.clone()),
            #[cfg(feature = "sqlite")]
            Ledger::Sqlite(l) => LedgerHandles::shared(l.clone()),
        }
    }

    pub fn strategies(&self) -> &dyn StrategyPort {
        match self {
            Ledger::Memory(l) => l.as_ref(),
            #[cfg(feature = "sqlite")]
            Ledger::Sqlite(l) => l.as_ref(),
        }
    }
}

pub fn build_market(settings: &EngineSettings) -> Arc<dyn MarketDataPort> {
    match &settings.market {
        MarketSource::Synthetic { seed } => Arc::new(SyntheticMarketAdapter::new(*seed)),
        MarketSource::Csv { data_dir } => Arc::new(CsvMarketAdapter::new(data_dir.clone())),
    }
}

/// Registry with the mock broker, connected. Only built for broker
/// settlement.
pub fn build_brokers(settings: &EngineSettings) -> Result<BrokerRegistry, PapertraderError> {
    let mut registry = BrokerRegistry::new();
    registry.add(
        DEFAULT_BROKER,
        Box::new(MockBroker::new(settings.initial_balance)),
    );
    registry.set_default(&settings.broker)?;
    for (name, connected) in registry.connect_all() {
        if !connected {
            return Err(PapertraderError::Broker {
                reason: format!("broker '{name}' failed to connect"),
            });
        }
    }
    Ok(registry)
}

pub fn build_scheduler(
    settings: &EngineSettings,
    market: Arc<dyn MarketDataPort>,
    ledger: &Ledger,
) -> Result<StrategyScheduler, PapertraderError> {
    let scheduler = StrategyScheduler::new(SchedulerConfig::from(settings), market, ledger.handles());
    if settings.settlement == SettlementMode::Broker {
        let brokers = build_brokers(settings)?;
        return Ok(scheduler.with_brokers(Arc::new(Mutex::new(brokers))));
    }
    Ok(scheduler)
}

/// One pass over the file strategies if given, otherwise the ledger's
/// active strategies.
fn tick(
    scheduler: &StrategyScheduler,
    ledger: &Ledger,
    file_strategies: Option<&[Strategy]>,
) -> Result<Vec<ExecutionResult>, PapertraderError> {
    match file_strategies {
        Some(strategies) => {
            let results = scheduler.execute_all_active(strategies);
            let executed = results.iter().filter(|r| r.executed).count();
            info!(executed, results = results.len(), "strategy execution completed");
            Ok(results)
        }
        None => scheduler.run_tick(ledger.strategies()),
    }
}

fn run_batch(config_path: &Path, strategies_path: Option<&Path>, json: bool) -> Result<ExitCode, PapertraderError> {
    let (adapter, settings) = load_config(config_path)?;
    let ledger = Ledger::open(&adapter)?;
    let strategies = strategies_path
        .map(|p| load_strategies(p, settings.user_id))
        .transpose()?;
    let scheduler = build_scheduler(&settings, build_market(&settings), &ledger)?;

    let results = tick(&scheduler, &ledger, strategies.as_deref())?;
    scheduler.disconnect_brokers()?;
    if json {
        let out = serde_json::to_string_pretty(&results).map_err(|e| PapertraderError::Io(e.into()))?;
        println!("{out}");
    } else {
        for result in &results {
            println!("{result}");
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_schedule(
    config_path: &Path,
    strategies_path: Option<&Path>,
    interval_secs: Option<u64>,
) -> Result<ExitCode, PapertraderError> {
    let (adapter, settings) = load_config(config_path)?;
    let ledger = Ledger::open(&adapter)?;
    let strategies = strategies_path
        .map(|p| load_strategies(p, settings.user_id))
        .transpose()?
        .map(Arc::new);
    let scheduler = Arc::new(build_scheduler(&settings, build_market(&settings), &ledger)?);
    let period = match interval_secs {
        Some(0) => {
            return Err(PapertraderError::ConfigInvalid {
                section: "engine".into(),
                key: "interval_secs".into(),
                reason: "interval_secs must be positive".into(),
            })
        }
        Some(secs) => Duration::from_secs(secs),
        None => settings.interval,
    };

    let runtime = tokio::runtime::Runtime::new()?;
    let ticking = Arc::clone(&scheduler);
    let interrupted = runtime.block_on(async move {
        info!(?period, "scheduler started");
        let handle = spawn_ticker(period, move || {
            match tick(&ticking, &ledger, strategies.as_deref().map(Vec::as_slice)) {
                Ok(results) => {
                    for result in &results {
                        println!("{result}");
                    }
                }
                Err(e) => error!(error = %e, "strategy tick failed"),
            }
        });
        let interrupted = tokio::signal::ctrl_c().await;
        handle.shutdown().await;
        interrupted
    });
    scheduler.disconnect_brokers()?;
    info!("scheduler stopped");
    interrupted?;
    Ok(ExitCode::SUCCESS)
}

fn run_validate(rules_path: &Path, kind: StrategyKind) -> Result<ExitCode, PapertraderError> {
    let text = fs::read_to_string(rules_path)?;
    let doc = RuleDocument::parse(&text)?;
    let Some(rules) = StrategyRules::from_document(&kind, &doc) else {
        eprintln!("error: no rules for strategy kind '{kind}'");
        return Ok(ExitCode::from(4));
    };
    let risk = rules.risk();
    let fmt_opt = |v: Option<f64>| v.map_or("none".to_string(), |v| format!("{v}%"));

    println!("kind:          {kind}");
    println!(
        "symbols:       {}",
        if doc.symbols.is_empty() {
            "(defaults)".to_string()
        } else {
            target_symbols(&doc, &[]).join(", ")
        }
    );
    println!("stop loss:     {}", fmt_opt(risk.stop_loss_pct));
    println!("take profit:   {}", fmt_opt(risk.take_profit_pct));
    println!(
        "max position:  {}",
        risk.max_position_size.map_or("unbounded".to_string(), |v| v.to_string())
    );
    if let StrategyRules::Custom {
        buy_conditions,
        sell_conditions,
        ..
    } = &rules
    {
        println!("buy when:      {}", buy_conditions.join(" | "));
        println!("sell when:     {}", sell_conditions.join(" | "));
    }
    eprintln!("Rules are valid");
    Ok(ExitCode::SUCCESS)
}

fn run_indicators(config_path: &Path, symbol: &str) -> Result<ExitCode, PapertraderError> {
    let (_, settings) = load_config(config_path)?;
    let market = build_market(&settings);

    let Some(quote) = market.quote(symbol)? else {
        eprintln!("error: no market data for {symbol}");
        return Ok(ExitCode::from(5));
    };
    let closes = market.historical_closes(symbol, settings.history_len)?;
    let series = PriceSeries::from_closes_with_band(closes, HISTORY_BAND)?;
    let indicators = calculate_all(&series);
    let signal = generate_signal(&indicators, quote.price);

    let fmt_opt = |v: Option<f64>| v.map_or("n/a".to_string(), |v| format!("{v:.4}"));
    println!("{symbol} @ {:.2} ({} bars)", quote.price, series.len());
    let last = |values: Option<&[f64]>| values.and_then(|v| v.last().copied());
    if let (Some(close), Some(high), Some(low)) = (
        series.last_close(),
        last(series.highs()),
        last(series.lows()),
    ) {
        println!("  Last bar:   close {close:.2} high {high:.2} low {low:.2}");
    }
    println!("  MA5:        {}", fmt_opt(indicators.ma5));
    println!("  MA10:       {}", fmt_opt(indicators.ma10));
    println!("  MA20:       {}", fmt_opt(indicators.ma20));
    println!("  RSI14:      {}", fmt_opt(indicators.rsi14));
    match indicators.macd {
        Some(m) => println!(
            "  MACD:       {:.4} signal {:.4} hist {:.4}",
            m.macd, m.signal, m.histogram
        ),
        None => println!("  MACD:       n/a"),
    }
    match indicators.bollinger {
        Some(b) => println!(
            "  Bollinger:  {:.4} / {:.4} / {:.4}",
            b.upper, b.middle, b.lower
        ),
        None => println!("  Bollinger:  n/a"),
    }
    println!(
        "Signal: {} strength {} (buy {}, sell {})",
        signal.kind, signal.strength, signal.buy_score, signal.sell_score
    );
    for reason in &signal.reasons {
        println!("  - {reason}");
    }
    Ok(ExitCode::SUCCESS)
}

fn run_trade(
    config_path: &Path,
    symbol: &str,
    side: TradeSide,
    quantity: i64,
    price: f64,
) -> Result<ExitCode, PapertraderError> {
    let (adapter, settings) = load_config(config_path)?;
    let ledger = Ledger::open(&adapter)?;
    let scheduler = build_scheduler(&settings, build_market(&settings), &ledger)?;

    let result = scheduler.manual_trade(symbol, side, quantity, price)?;
    println!("{result}");
    Ok(if result.executed {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn run_portfolio(config_path: &Path, trade_limit: usize) -> Result<ExitCode, PapertraderError> {
    let (adapter, settings) = load_config(config_path)?;
    let ledger = Ledger::open(&adapter)?;
    let market = build_market(&settings);
    let handles = ledger.handles();

    let account = handles
        .accounts
        .get_or_create(settings.user_id, settings.initial_balance)?;
    let positions = handles.positions.list(settings.user_id)?;

    let mut prices = HashMap::new();
    for position in &positions {
        match market.quote(&position.symbol) {
            Ok(Some(quote)) => {
                if let Some(price) = Money::from_f64(quote.price) {
                    prices.insert(position.symbol.clone(), price);
                }
            }
            Ok(None) => {}
            Err(e) => warn!(symbol = %position.symbol, error = %e, "quote unavailable; marking at cost"),
        }
    }
    let metrics = account_metrics(&account, &positions, &prices);

    println!("Account {}", account.user_id);
    println!("  cash:          {}", metrics.cash_balance);
    println!("  positions:     {}", metrics.position_value);
    println!("  total assets:  {}", metrics.total_assets);
    println!(
        "  profit:        {} ({:.2}%)",
        metrics.total_profit, metrics.total_profit_percent
    );

    if !positions.is_empty() {
        println!("\nPositions:");
        for position in &positions {
            let price = prices
                .get(&position.symbol)
                .copied()
                .unwrap_or(position.cost_price);
            let m = position_metrics(position, price);
            println!(
                "  {:<10} {:>8} @ {} now {} value {} P/L {} ({:.2}%)",
                position.symbol,
                position.quantity,
                position.cost_price,
                price,
                m.current_value,
                m.profit,
                m.profit_percent
            );
        }
    }

    let trades = handles.trades.recent(settings.user_id, trade_limit)?;
    if !trades.is_empty() {
        println!("\nRecent trades:");
        for trade in &trades {
            println!(
                "  #{:<5} {} {:<4} {:<10} {:>8} @ {}",
                trade.id,
                trade.executed_at.format("%Y-%m-%d %H:%M:%S"),
                trade.side.as_str(),
                trade.symbol,
                trade.quantity,
                trade.price
            );
        }
    }
    Ok(ExitCode::SUCCESS)
}

fn run_strategy(config_path: &Path, action: StrategyCommand) -> Result<ExitCode, PapertraderError> {
    let (adapter, settings) = load_config(config_path)?;
    let ledger = Ledger::open(&adapter)?;
    let store = ledger.strategies();
    let user_id = settings.user_id;

    match action {
        StrategyCommand::Add {
            name,
            kind,
            rules,
            description,
            inactive,
        } => {
            let text = fs::read_to_string(&rules)?;
            let kind = StrategyKind::from(kind);
            StrategyRules::parse(&kind, &text)?;
            let created = store.create_strategy(
                user_id,
                &NewStrategy {
                    name,
                    description,
                    kind,
                    is_active: !inactive,
                    rules: text,
                },
            )?;
            println!("Created strategy {} ({})", created.id, created.name);
        }
        StrategyCommand::List => {
            for s in store.all_strategies(user_id)? {
                println!(
                    "{:>4}  {:<24} {:<10} {}",
                    s.id,
                    s.name,
                    s.kind.as_str(),
                    if s.is_active { "active" } else { "inactive" }
                );
            }
        }
        StrategyCommand::Activate { id } => return set_strategy_active(store, user_id, id, true),
        StrategyCommand::Deactivate { id } => return set_strategy_active(store, user_id, id, false),
    }
    Ok(ExitCode::SUCCESS)
}

fn set_strategy_active(
    store: &dyn StrategyPort,
    user_id: i64,
    id: i64,
    active: bool,
) -> Result<ExitCode, PapertraderError> {
    if !store.set_active(user_id, id, active)? {
        eprintln!("error: no strategy {id}");
        return Ok(ExitCode::FAILURE);
    }
    println!("Strategy {id} {}", if active { "activated" } else { "deactivated" });
    Ok(ExitCode::SUCCESS)
}
