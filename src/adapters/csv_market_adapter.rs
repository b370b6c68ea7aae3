//! Daily bars from CSV files, one file per symbol.
//!
//! `<data_dir>/<symbol>.csv` with a `date,open,high,low,close,volume`
//! header. Rows may be in any order; they are sorted by date on load.

use crate::domain::error::PapertraderError;
use crate::domain::market::Quote;
use crate::ports::market_data_port::MarketDataPort;
use chrono::NaiveDate;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
struct DailyBar {
    date: NaiveDate,
    high: f64,
    low: f64,
    close: f64,
    volume: u64,
}

pub struct CsvMarketAdapter {
    data_dir: PathBuf,
}

impl CsvMarketAdapter {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.data_dir.join(format!("{}.csv", symbol))
    }

    /// Bars for `symbol`, oldest first. `None` when there is no file.
    fn load(&self, symbol: &str) -> Result<Option<Vec<DailyBar>>, PapertraderError> {
        let path = self.csv_path(symbol);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(market_error(
                    symbol,
                    format!("failed to read {}: {}", path.display(), e),
                ));
            }
        };

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record =
                result.map_err(|e| market_error(symbol, format!("CSV parse error: {}", e)))?;

            let date_str = record
                .get(0)
                .ok_or_else(|| market_error(symbol, "missing date column".into()))?;
            let date = NaiveDate::parse_from_str(date_str.trim(), "%Y-%m-%d")
                .map_err(|e| market_error(symbol, format!("invalid date format: {}", e)))?;

            bars.push(DailyBar {
                date,
                high: column(symbol, &record, 2, "high")?,
                low: column(symbol, &record, 3, "low")?,
                close: column(symbol, &record, 4, "close")?,
                volume: column(symbol, &record, 5, "volume")?,
            });
        }

        bars.sort_by_key(|b| b.date);
        Ok(Some(bars))
    }
}

fn column<T>(
    symbol: &str,
    record: &csv::StringRecord,
    index: usize,
    name: &str,
) -> Result<T, PapertraderError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    record
        .get(index)
        .ok_or_else(|| market_error(symbol, format!("missing {} column", name)))?
        .trim()
        .parse()
        .map_err(|e| market_error(symbol, format!("invalid {} value: {}", name, e)))
}

fn market_error(symbol: &str, reason: String) -> PapertraderError {
    PapertraderError::MarketData {
        symbol: symbol.to_string(),
        reason,
    }
}

impl MarketDataPort for CsvMarketAdapter {
    fn quote(&self, symbol: &str) -> Result<Option<Quote>, PapertraderError> {
        let bars = self.load(symbol)?.unwrap_or_default();
        Ok(bars.last().map(|bar| Quote {
            price: bar.close,
            high: bar.high,
            low: bar.low,
            volume: bar.volume,
        }))
    }

    fn historical_closes(&self, symbol: &str, count: usize) -> Result<Vec<f64>, PapertraderError> {
        let bars = self
            .load(symbol)?
            .ok_or_else(|| market_error(symbol, "no data file".into()))?;
        let skip = bars.len().saturating_sub(count);
        Ok(bars[skip..].iter().map(|b| b.close).collect())
    }
}
