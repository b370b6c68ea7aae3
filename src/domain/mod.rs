//! Core domain types and logic.

pub mod account;
pub mod broker;
pub mod config_validation;
pub mod decision;
pub mod error;
pub mod indicator;
pub mod market;
pub mod metrics;
pub mod money;
pub mod position;
pub mod price_series;
pub mod risk;
pub mod rules;
pub mod scheduler;
pub mod signal;
pub mod simulator;
pub mod strategy;
pub mod ticker;
