//! Technical indicators over a closing-price history.
//!
//! Every calculator is a pure function of a chronological slice (oldest
//! first) and returns `None` when the slice is shorter than the indicator's
//! minimum length. Absence is the only failure signal; nothing here panics
//! or errors on short input.

pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod rsi;
pub mod sma;

pub use bollinger::{calculate_bollinger, BollingerBands};
pub use ema::calculate_ema;
pub use macd::{calculate_macd, MacdValue};
pub use rsi::calculate_rsi;
pub use sma::calculate_sma;

use serde::Serialize;

use crate::domain::price_series::PriceSeries;

pub const RSI_PERIOD: usize = 14;
pub const BOLLINGER_PERIOD: usize = 20;
pub const BOLLINGER_STDDEV_MULT: f64 = 2.0;

/// Indicator values for one symbol at the latest bar. A field is `None` when
/// the history was too short for it.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct IndicatorSet {
    pub ma5: Option<f64>,
    pub ma10: Option<f64>,
    pub ma20: Option<f64>,
    pub rsi14: Option<f64>,
    pub macd: Option<MacdValue>,
    pub bollinger: Option<BollingerBands>,
}

impl IndicatorSet {
    pub fn is_empty(&self) -> bool {
        *self == IndicatorSet::default()
    }
}

/// Compute every supported indicator independently from the close series.
///
/// Highs and lows are accepted on the series but no current indicator
/// reads them.
pub fn calculate_all(series: &PriceSeries) -> IndicatorSet {
    let closes = series.closes();
    IndicatorSet {
        ma5: calculate_sma(closes, 5),
        ma10: calculate_sma(closes, 10),
        ma20: calculate_sma(closes, 20),
        rsi14: calculate_rsi(closes, RSI_PERIOD),
        macd: calculate_macd(closes),
        bollinger: calculate_bollinger(closes, BOLLINGER_PERIOD, BOLLINGER_STDDEV_MULT),
    }
}
