//! Exponential Moving Average.
//!
//! k = 2/(n+1), seeded with the SMA of the first n closes, then
//! EMA = C*k + EMA*(1-k) for every remaining close. Returns the final value.

pub fn calculate_ema(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period {
        return None;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let seed = prices[..period].iter().sum::<f64>() / period as f64;

    Some(
        prices[period..]
            .iter()
            .fold(seed, |ema, close| close * k + ema * (1.0 - k)),
    )
}
