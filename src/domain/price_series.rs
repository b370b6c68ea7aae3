//! Chronological price history fed to the indicator calculator.

use crate::domain::error::PapertraderError;

/// Closing prices, oldest first, with optional high/low sequences of the
/// same length. Every value is finite and strictly positive.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    closes: Vec<f64>,
    highs: Option<Vec<f64>>,
    lows: Option<Vec<f64>>,
}

impl PriceSeries {
    pub fn new(closes: Vec<f64>) -> Result<Self, PapertraderError> {
        check_positive("close", &closes)?;
        Ok(Self {
            closes,
            highs: None,
            lows: None,
        })
    }

    pub fn with_range(
        closes: Vec<f64>,
        highs: Vec<f64>,
        lows: Vec<f64>,
    ) -> Result<Self, PapertraderError> {
        if highs.len() != closes.len() || lows.len() != closes.len() {
            return Err(PapertraderError::InvalidPriceSeries {
                reason: format!(
                    "length mismatch: {} closes, {} highs, {} lows",
                    closes.len(),
                    highs.len(),
                    lows.len()
                ),
            });
        }
        check_positive("close", &closes)?;
        check_positive("high", &highs)?;
        check_positive("low", &lows)?;
        Ok(Self {
            closes,
            highs: Some(highs),
            lows: Some(lows),
        })
    }

    /// Synthesize highs and lows as `close * (1 ± band)`.
    pub fn from_closes_with_band(closes: Vec<f64>, band: f64) -> Result<Self, PapertraderError> {
        let highs = closes.iter().map(|c| c * (1.0 + band)).collect();
        let lows = closes.iter().map(|c| c * (1.0 - band)).collect();
        Self::with_range(closes, highs, lows)
    }

    pub fn closes(&self) -> &[f64] {
        &self.closes
    }

    pub fn highs(&self) -> Option<&[f64]> {
        self.highs.as_deref()
    }

    pub fn lows(&self) -> Option<&[f64]> {
        self.lows.as_deref()
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    pub fn last_close(&self) -> Option<f64> {
        self.closes.last().copied()
    }
}

fn check_positive(name: &str, values: &[f64]) -> Result<(), PapertraderError> {
    match values.iter().position(|v| !v.is_finite() || *v <= 0.0) {
        Some(index) => Err(PapertraderError::InvalidPriceSeries {
            reason: format!("{name} at index {index} is {}", values[index]),
        }),
        None => Ok(()),
    }
}
