//! Market data access port trait.

use crate::domain::error::PapertraderError;
use crate::domain::market::Quote;

pub trait MarketDataPort: Send + Sync {
    /// Latest quote, or `None` when the source does not know the symbol.
    fn quote(&self, symbol: &str) -> Result<Option<Quote>, PapertraderError>;

    /// Up to `count` most recent closes, oldest first. Fewer are returned
    /// when the source has less history.
    fn historical_closes(&self, symbol: &str, count: usize) -> Result<Vec<f64>, PapertraderError>;
}
