//! Scored BUY/SELL/HOLD signal from an indicator set.
//!
//! Four independent rules each add their weight to at most one side:
//!
//! | Rule      | Weight | Buy when                       | Sell when                      |
//! |-----------|--------|--------------------------------|--------------------------------|
//! | MA        | 20     | price > MA5 > MA20             | price < MA5 < MA20             |
//! | RSI       | 15     | RSI14 < 30                     | RSI14 > 70                     |
//! | MACD      | 25     | line > signal, histogram > 0   | line < signal, histogram < 0   |
//! | Bollinger | 15     | price < lower band             | price > upper band             |
//!
//! A side wins when it strictly beats the other and reaches 40.

use serde::Serialize;
use std::fmt;

use crate::domain::indicator::IndicatorSet;

pub const MA_WEIGHT: u32 = 20;
pub const RSI_WEIGHT: u32 = 15;
pub const MACD_WEIGHT: u32 = 25;
pub const BOLLINGER_WEIGHT: u32 = 15;
pub const MIN_SIGNAL_SCORE: u32 = 40;
pub const MAX_STRENGTH: u32 = 100;

pub const RSI_OVERSOLD: f64 = 30.0;
pub const RSI_OVERBOUGHT: f64 = 70.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalKind {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::Buy => write!(f, "BUY"),
            SignalKind::Sell => write!(f, "SELL"),
            SignalKind::Hold => write!(f, "HOLD"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signal {
    pub kind: SignalKind,
    /// Winning score capped at 100; 0 for HOLD.
    pub strength: u8,
    /// Every triggered rule, in evaluation order, including losing-side ones.
    pub reasons: Vec<String>,
    pub buy_score: u32,
    pub sell_score: u32,
}

#[derive(Default)]
struct Tally {
    buy: u32,
    sell: u32,
    reasons: Vec<String>,
}

impl Tally {
    fn buy(&mut self, weight: u32, reason: &str) {
        self.buy += weight;
        self.reasons.push(reason.to_string());
    }

    fn sell(&mut self, weight: u32, reason: &str) {
        self.sell += weight;
        self.reasons.push(reason.to_string());
    }
}

pub fn generate_signal(indicators: &IndicatorSet, price: f64) -> Signal {
    let mut tally = Tally::default();

    if let (Some(ma5), Some(ma20)) = (indicators.ma5, indicators.ma20) {
        if price > ma5 && ma5 > ma20 {
            tally.buy(MA_WEIGHT, "Price above MA5, MA5 above MA20");
        } else if price < ma5 && ma5 < ma20 {
            tally.sell(MA_WEIGHT, "Price below MA5, MA5 below MA20");
        }
    }

    if let Some(rsi) = indicators.rsi14 {
        if rsi < RSI_OVERSOLD {
            tally.buy(RSI_WEIGHT, "RSI oversold (< 30)");
        } else if rsi > RSI_OVERBOUGHT {
            tally.sell(RSI_WEIGHT, "RSI overbought (> 70)");
        }
    }

    if let Some(macd) = indicators.macd {
        if macd.macd > macd.signal && macd.histogram > 0.0 {
            tally.buy(MACD_WEIGHT, "MACD bullish crossover");
        } else if macd.macd < macd.signal && macd.histogram < 0.0 {
            tally.sell(MACD_WEIGHT, "MACD bearish crossover");
        }
    }

    if let Some(bands) = indicators.bollinger {
        if price < bands.lower {
            tally.buy(BOLLINGER_WEIGHT, "Price below lower Bollinger Band");
        } else if price > bands.upper {
            tally.sell(BOLLINGER_WEIGHT, "Price above upper Bollinger Band");
        }
    }

    let (kind, score) = if tally.buy > tally.sell && tally.buy >= MIN_SIGNAL_SCORE {
        (SignalKind::Buy, tally.buy)
    } else if tally.sell > tally.buy && tally.sell >= MIN_SIGNAL_SCORE {
        (SignalKind::Sell, tally.sell)
    } else {
        (SignalKind::Hold, 0)
    };

    Signal {
        kind,
        strength: score.min(MAX_STRENGTH) as u8,
        reasons: tally.reasons,
        buy_score: tally.buy,
        sell_score: tally.sell,
    }
}
