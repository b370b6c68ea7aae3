//! Engine settings read and validated from configuration.
//!
//! ```ini
//! [engine]
//! user_id = 1
//! initial_balance = 10000.0
//! history_len = 100
//! interval_secs = 300
//! default_symbols = 600000.SH, 600519.SH
//! settlement = simulated
//! broker = mock
//!
//! [market]
//! source = synthetic
//! seed = 42
//! ```

use std::path::PathBuf;
use std::time::Duration;

use crate::domain::decision::MIN_HISTORY;
use crate::domain::error::PapertraderError;
use crate::domain::money::Money;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_SYMBOLS: [&str; 5] = [
    "600000.SH",
    "600519.SH",
    "000001.SZ",
    "000858.SZ",
    "300750.SZ",
];

pub const DEFAULT_USER_ID: i64 = 1;
pub const DEFAULT_INITIAL_BALANCE: f64 = 10_000.0;
pub const DEFAULT_HISTORY_LEN: i64 = 100;
pub const DEFAULT_INTERVAL_SECS: i64 = 300;
pub const DEFAULT_BROKER: &str = "mock";

/// How an actionable decision is settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettlementMode {
    /// Simulator only.
    Simulated,
    /// Simulator validation, then an order with the configured broker.
    Broker,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MarketSource {
    Synthetic { seed: Option<u64> },
    Csv { data_dir: PathBuf },
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub user_id: i64,
    pub initial_balance: Money,
    pub history_len: usize,
    pub interval: Duration,
    pub default_symbols: Vec<String>,
    pub settlement: SettlementMode,
    pub broker: String,
    pub market: MarketSource,
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings {
            user_id: DEFAULT_USER_ID,
            initial_balance: Money::from_scaled(DEFAULT_INITIAL_BALANCE as i64 * 10_000),
            history_len: DEFAULT_HISTORY_LEN as usize,
            interval: Duration::from_secs(DEFAULT_INTERVAL_SECS as u64),
            default_symbols: DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
            settlement: SettlementMode::Simulated,
            broker: DEFAULT_BROKER.to_string(),
            market: MarketSource::Synthetic { seed: None },
        }
    }
}

impl EngineSettings {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PapertraderError> {
        let user_id = config.get_int("engine", "user_id", DEFAULT_USER_ID);
        if user_id <= 0 {
            return Err(invalid("engine", "user_id", "user_id must be positive"));
        }

        let initial_balance = config.get_double("engine", "initial_balance", DEFAULT_INITIAL_BALANCE);
        let initial_balance = Money::from_f64(initial_balance)
            .filter(|b| !b.amount().is_sign_negative())
            .ok_or_else(|| {
                invalid(
                    "engine",
                    "initial_balance",
                    "initial_balance must be a non-negative number",
                )
            })?;

        let history_len = config.get_int("engine", "history_len", DEFAULT_HISTORY_LEN);
        if history_len < MIN_HISTORY as i64 {
            return Err(invalid(
                "engine",
                "history_len",
                &format!("history_len must be at least {MIN_HISTORY}"),
            ));
        }

        let interval_secs = config.get_int("engine", "interval_secs", DEFAULT_INTERVAL_SECS);
        if interval_secs <= 0 {
            return Err(invalid("engine", "interval_secs", "interval_secs must be positive"));
        }

        let default_symbols = match config.get_list("engine", "default_symbols") {
            Some(list) if list.is_empty() => {
                return Err(invalid(
                    "engine",
                    "default_symbols",
                    "default_symbols must name at least one symbol",
                ));
            }
            Some(list) => list,
            None => DEFAULT_SYMBOLS.iter().map(|s| s.to_string()).collect(),
        };

        let settlement = match config
            .get_string("engine", "settlement")
            .as_deref()
            .map(str::trim)
        {
            None | Some("simulated") => SettlementMode::Simulated,
            Some("broker") => SettlementMode::Broker,
            Some(other) => {
                return Err(invalid(
                    "engine",
                    "settlement",
                    &format!("unknown settlement mode '{other}', expected simulated or broker"),
                ));
            }
        };

        let broker = config
            .get_string("engine", "broker")
            .map(|b| b.trim().to_string())
            .filter(|b| !b.is_empty())
            .unwrap_or_else(|| DEFAULT_BROKER.to_string());

        Ok(EngineSettings {
            user_id,
            initial_balance,
            history_len: history_len as usize,
            interval: Duration::from_secs(interval_secs as u64),
            default_symbols,
            settlement,
            broker,
            market: market_source(config)?,
        })
    }
}

fn market_source(config: &dyn ConfigPort) -> Result<MarketSource, PapertraderError> {
    match config.get_string("market", "source").as_deref().map(str::trim) {
        None | Some("synthetic") => {
            let seed = match config.get_string("market", "seed") {
                None => None,
                Some(raw) => Some(raw.trim().parse::<u64>().map_err(|_| {
                    invalid("market", "seed", "seed must be a non-negative integer")
                })?),
            };
            Ok(MarketSource::Synthetic { seed })
        }
        Some("csv") => match config.get_string("market", "data_dir") {
            Some(dir) if !dir.trim().is_empty() => Ok(MarketSource::Csv {
                data_dir: PathBuf::from(dir.trim()),
            }),
            _ => Err(PapertraderError::ConfigMissing {
                section: "market".to_string(),
                key: "data_dir".to_string(),
            }),
        },
        Some(other) => Err(invalid(
            "market",
            "source",
            &format!("unknown market source '{other}', expected synthetic or csv"),
        )),
    }
}

fn invalid(section: &str, key: &str, reason: &str) -> PapertraderError {
    PapertraderError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
