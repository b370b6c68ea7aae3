//! Bollinger Bands.
//!
//! - Middle: Simple Moving Average (SMA) over n periods
//! - Upper: Middle + (multiplier × StdDev)
//! - Lower: Middle - (multiplier × StdDev)
//!
//! Where StdDev is population standard deviation (divides by N, not N-1)
//! of the last n closes around the middle.

use serde::Serialize;

use crate::domain::indicator::calculate_sma;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

pub fn calculate_bollinger(prices: &[f64], period: usize, multiplier: f64) -> Option<BollingerBands> {
    let middle = calculate_sma(prices, period)?;
    let window = &prices[prices.len() - period..];

    let variance = window
        .iter()
        .map(|p| {
            let diff = p - middle;
            diff * diff
        })
        .sum::<f64>()
        / period as f64;
    let stddev = variance.sqrt();

    Some(BollingerBands {
        upper: middle + stddev * multiplier,
        middle,
        lower: middle - stddev * multiplier,
    })
}
