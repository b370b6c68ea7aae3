//! Fixed-point money at four decimal places.
//!
//! Ledger amounts cross storage and wire boundaries as integers counting
//! ten-thousandths of a currency unit. Inside the engine they are held as a
//! `Decimal` with that scale so repeated buy/sell cycles never drift.
//! Conversions from floating point round half away from zero.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// Decimal places carried by every [`Money`] value.
pub const MONEY_SCALE: u32 = 4;

/// Number of scaled units in one currency unit.
pub const SCALE_FACTOR: i64 = 10_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    /// Build from an integer count of ten-thousandths.
    pub fn from_scaled(units: i64) -> Self {
        Money(Decimal::new(units, MONEY_SCALE))
    }

    /// Integer count of ten-thousandths, saturating at the `i64` range.
    pub fn to_scaled(self) -> i64 {
        let mut value = self.0.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
        value.rescale(MONEY_SCALE);
        let mantissa = value.mantissa();
        i64::try_from(mantissa).unwrap_or(if mantissa < 0 { i64::MIN } else { i64::MAX })
    }

    /// Convert a floating-point amount, rounding half away from zero.
    ///
    /// Returns `None` for NaN and infinities.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() {
            return None;
        }
        Decimal::from_f64(value).map(Money::from_decimal)
    }

    pub fn from_decimal(value: Decimal) -> Self {
        Money(value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero))
    }

    pub fn amount(self) -> Decimal {
        self.0
    }

    pub fn to_f64(self) -> f64 {
        self.0.to_f64().unwrap_or(0.0)
    }

    /// Exact value of `quantity` units at this price.
    pub fn times(self, quantity: i64) -> Money {
        Money(self.0 * Decimal::from(quantity))
    }

    /// Whole units of `price` that fit in this amount. Zero when the price is
    /// not positive or the amount is negative.
    pub fn whole_units_at(self, price: Money) -> i64 {
        if price.0 <= Decimal::ZERO || self.0 <= Decimal::ZERO {
            return 0;
        }
        self.0
            .checked_div(price.0)
            .and_then(|units| units.floor().to_i64())
            .unwrap_or(0)
    }

    pub fn is_positive(self) -> bool {
        self.0 > Decimal::ZERO
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.normalize())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scaled_round_trip_preserves_units() {
        let balance = Money::from_scaled(1_000_000_0000);
        assert_eq!(balance.to_scaled(), 1_000_000_0000);
        assert_eq!(balance.to_string(), "1000000");
    }

    #[test]
    fn from_f64_rounds_half_away_from_zero() {
        // 1.03125 is exact in binary, so the fifth digit is a true midpoint.
        assert_eq!(Money::from_f64(1.03125).unwrap().to_scaled(), 10_313);
        assert_eq!(Money::from_f64(-1.03125).unwrap().to_scaled(), -10_313);
        assert_eq!(Money::from_f64(13.32).unwrap().to_scaled(), 133_200);
    }

    #[test]
    fn from_f64_rejects_non_finite() {
        assert!(Money::from_f64(f64::NAN).is_none());
        assert!(Money::from_f64(f64::INFINITY).is_none());
    }

    #[test]
    fn times_is_exact() {
        let price = Money::from_f64(10.0).unwrap();
        assert_eq!(price.times(500).to_scaled(), 500 * 10 * SCALE_FACTOR);
    }

    #[test]
    fn repeated_cycles_do_not_drift() {
        let start = Money::from_scaled(1_000_000_0000);
        let price = Money::from_f64(12.3456).unwrap();
        let mut balance = start;
        for _ in 0..1000 {
            balance = balance - price.times(37);
            balance = balance + price.times(37);
        }
        assert_eq!(balance, start);
    }

    #[test]
    fn whole_units_floors() {
        let cash = Money::from_f64(105.0).unwrap();
        let price = Money::from_f64(10.0).unwrap();
        assert_eq!(cash.whole_units_at(price), 10);
        assert_eq!(cash.whole_units_at(Money::ZERO), 0);
        assert_eq!(Money::ZERO.whole_units_at(price), 0);
    }

    #[test]
    fn sub_and_add() {
        let a = Money::from_scaled(50_000);
        let b = Money::from_scaled(20_000);
        assert_eq!((a - b).to_scaled(), 30_000);
        assert_eq!((a + b).to_scaled(), 70_000);
        assert!((b - a).to_scaled() < 0);
    }
}
