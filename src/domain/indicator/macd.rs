//! MACD (Moving Average Convergence Divergence).
//!
//! MACD Line = EMA(12) - EMA(26) over the full history
//! Signal Line = EMA(9) of the MACD line, where the MACD line is recomputed
//! from scratch for every prefix of the history that has at least 26 closes
//! Histogram = MACD Line - Signal Line
//!
//! The per-prefix recomputation is quadratic in the history length and is
//! kept as-is so signal values match previously recorded runs. A single
//! warm-started EMA pass would produce the same line in linear time.
//!
//! Needs 26 closes. Until 9 MACD values exist (34 closes) the signal line
//! is 0.0.

use serde::Serialize;

use crate::domain::indicator::calculate_ema;

pub const FAST_PERIOD: usize = 12;
pub const SLOW_PERIOD: usize = 26;
pub const SIGNAL_PERIOD: usize = 9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MacdValue {
    pub macd: f64,
    pub signal: f64,
    pub histogram: f64,
}

pub fn calculate_macd(prices: &[f64]) -> Option<MacdValue> {
    let macd = macd_line(prices)?;

    let prefix_lines: Vec<f64> = (1..=prices.len())
        .filter_map(|end| macd_line(&prices[..end]))
        .collect();

    let signal = calculate_ema(&prefix_lines, SIGNAL_PERIOD).unwrap_or(0.0);

    Some(MacdValue {
        macd,
        signal,
        histogram: macd - signal,
    })
}

fn macd_line(prices: &[f64]) -> Option<f64> {
    let fast = calculate_ema(prices, FAST_PERIOD)?;
    let slow = calculate_ema(prices, SLOW_PERIOD)?;
    Some(fast - slow)
}
