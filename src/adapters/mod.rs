//! Concrete adapter implementations for ports.

pub mod csv_market_adapter;
pub mod file_config_adapter;
pub mod memory_ledger;
pub mod mock_broker;
#[cfg(feature = "sqlite")]
pub mod sqlite_ledger;
pub mod strategy_file;
pub mod synthetic_market_adapter;
