//! Random-walk market data for demos and tests.
//!
//! Only the listed A-share symbols are known. Each symbol has a stable base
//! price derived from its code; quotes wander up to 2 % around it and
//! histories are a 2 % random walk from it with a slight upward drift.
//! Seeding makes every call sequence reproducible.

use std::sync::Mutex;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::domain::error::PapertraderError;
use crate::domain::market::Quote;
use crate::ports::market_data_port::MarketDataPort;

pub const POPULAR_SYMBOLS: [&str; 20] = [
    "600000.SH",
    "600016.SH",
    "600028.SH",
    "600030.SH",
    "600036.SH",
    "600048.SH",
    "600050.SH",
    "600104.SH",
    "600111.SH",
    "600519.SH",
    "000001.SZ",
    "000002.SZ",
    "000333.SZ",
    "000651.SZ",
    "000858.SZ",
    "000963.SZ",
    "002142.SZ",
    "002304.SZ",
    "002415.SZ",
    "300750.SZ",
];

const VOLATILITY: f64 = 0.02;
const MIN_PRICE: f64 = 0.1;

pub struct SyntheticMarketAdapter {
    rng: Mutex<StdRng>,
}

impl SyntheticMarketAdapter {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng: Mutex::new(rng),
        }
    }

    pub fn is_known(symbol: &str) -> bool {
        POPULAR_SYMBOLS.contains(&symbol)
    }

    /// 10 plus the byte sum of the code modulo 100.
    pub fn base_price(symbol: &str) -> f64 {
        let sum: u32 = symbol.bytes().map(u32::from).sum();
        10.0 + (sum % 100) as f64
    }

    fn with_rng<T>(&self, f: impl FnOnce(&mut StdRng) -> T) -> Result<T, PapertraderError> {
        let mut rng = self.rng.lock().map_err(|_| PapertraderError::MarketData {
            symbol: String::new(),
            reason: "random source lock poisoned".to_string(),
        })?;
        Ok(f(&mut rng))
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// One random-walk step: `base * (1 + U(-v, v) + trend)`, to the cent.
fn step(rng: &mut StdRng, base: f64, volatility: f64, trend: f64) -> f64 {
    let change = rng.gen_range(-volatility..volatility) + trend;
    round2(base * (1.0 + change))
}

impl MarketDataPort for SyntheticMarketAdapter {
    fn quote(&self, symbol: &str) -> Result<Option<Quote>, PapertraderError> {
        if !Self::is_known(symbol) {
            return Ok(None);
        }
        let base = Self::base_price(symbol);
        self.with_rng(|rng| {
            let price = step(rng, base, VOLATILITY, 0.0);
            let high = round2(price * (1.0 + rng.gen_range(0.0..VOLATILITY)));
            let low = round2(price * (1.0 - rng.gen_range(0.0..VOLATILITY)));
            let volume = ((1000.0 + rng.gen_range(0.0f64..5000.0)) * 10_000.0).round() as u64;
            Some(Quote {
                price,
                high: high.max(price),
                low: low.min(price),
                volume,
            })
        })
    }

    fn historical_closes(&self, symbol: &str, count: usize) -> Result<Vec<f64>, PapertraderError> {
        if count == 0 {
            return Ok(Vec::new());
        }
        let base = Self::base_price(symbol);
        self.with_rng(|rng| {
            let mut closes = Vec::with_capacity(count);
            closes.push(base);
            for _ in 1..count {
                let trend = (rng.gen_range(0.0f64..1.0) - 0.48) * 0.001;
                let prev = closes[closes.len() - 1];
                closes.push(step(rng, prev, VOLATILITY, trend).max(MIN_PRICE));
            }
            closes
        })
    }
}
