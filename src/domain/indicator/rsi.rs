//! RSI (Relative Strength Index).
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First average: simple mean of gains/losses over the first n changes
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n, with the side that
//!   did not move decayed by the same factor
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//! If avg_loss == 0: RSI = 100
//!
//! Needs n + 1 closes.

pub fn calculate_rsi(prices: &[f64], period: usize) -> Option<f64> {
    if period == 0 || prices.len() < period + 1 {
        return None;
    }

    let changes: Vec<f64> = prices.windows(2).map(|w| w[1] - w[0]).collect();

    let (gains, losses) = changes[..period]
        .iter()
        .fold((0.0, 0.0), |(gains, losses), &change| {
            if change > 0.0 {
                (gains + change, losses)
            } else {
                (gains, losses + change.abs())
            }
        });

    let n = period as f64;
    let mut avg_gain = gains / n;
    let mut avg_loss = losses / n;

    for &change in &changes[period..] {
        if change > 0.0 {
            avg_gain = (avg_gain * (n - 1.0) + change) / n;
            avg_loss = (avg_loss * (n - 1.0)) / n;
        } else {
            avg_gain = (avg_gain * (n - 1.0)) / n;
            avg_loss = (avg_loss * (n - 1.0) + change.abs()) / n;
        }
    }

    if avg_loss == 0.0 {
        return Some(100.0);
    }
    Some(100.0 - 100.0 / (1.0 + avg_gain / avg_loss))
}
