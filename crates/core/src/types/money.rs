//! Fixed-point money using decimal arithmetic.
//!
//! All monetary amounts in Cartwright are stored as `NUMERIC(10, 2)`. [`Money`]
//! keeps that invariant in Rust: every constructor normalizes to exactly two
//! fractional digits, and conversion to a payment provider's integer minor
//! units is explicit and checked.

use core::fmt;
use core::iter::Sum;
use core::ops::Add;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Number of fractional digits carried by every amount.
pub const SCALE: u32 = 2;

/// Errors that can occur when converting money amounts.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// The amount does not fit in the provider's integer representation.
    #[error("amount {0} is out of range for minor-unit conversion")]
    OutOfRange(Decimal),
    /// The amount is negative where only non-negative values are allowed.
    #[error("amount {0} must not be negative")]
    Negative(Decimal),
}

/// A monetary amount with two fractional digits.
///
/// Currency is tracked separately (see [`CurrencyCode`]); a single deployment
/// sells in one currency.
///
/// ```
/// use cartwright_core::Money;
/// use rust_decimal::Decimal;
///
/// let price = Money::new(Decimal::new(100_000, 2)); // 1000.00
/// assert_eq!(price.times(3).to_string(), "3000.00");
/// assert_eq!(price.to_minor_units().unwrap(), 100_000);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create an amount, rounding half away from zero to two digits.
    #[must_use]
    pub fn new(amount: Decimal) -> Self {
        let mut rounded = amount.round_dp_with_strategy(SCALE, RoundingStrategy::MidpointAwayFromZero);
        rounded.rescale(SCALE);
        Self(rounded)
    }

    /// Create an amount from integer cents.
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, SCALE))
    }

    /// The underlying decimal value.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Whether the amount is strictly greater than zero.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Multiply a unit price by a quantity.
    #[must_use]
    pub fn times(&self, quantity: i32) -> Self {
        Self::new(self.0 * Decimal::from(quantity))
    }

    /// Convert to integer minor units (cents) for the payment provider.
    ///
    /// The amount is multiplied by 100 and rounded to the nearest integer,
    /// with halves rounded away from zero.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Negative`] for negative amounts and
    /// [`MoneyError::OutOfRange`] if the result does not fit in an `i64`.
    pub fn to_minor_units(&self) -> Result<i64, MoneyError> {
        if self.0.is_sign_negative() && !self.0.is_zero() {
            return Err(MoneyError::Negative(self.0));
        }

        (self.0 * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .ok_or(MoneyError::OutOfRange(self.0))
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::new(Decimal::ZERO)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self::new(amount)
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.0 + rhs.0)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// ISO 4217 currency codes accepted by the payment provider integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    USD,
    EUR,
    GBP,
    CAD,
    AUD,
}

impl CurrencyCode {
    /// Upper-case ISO code, as stored on payments.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::GBP => "GBP",
            Self::CAD => "CAD",
            Self::AUD => "AUD",
        }
    }

    /// Lower-case code, as expected by Stripe-compatible APIs.
    #[must_use]
    pub const fn provider_code(&self) -> &'static str {
        match self {
            Self::USD => "usd",
            Self::EUR => "eur",
            Self::GBP => "gbp",
            Self::CAD => "cad",
            Self::AUD => "aud",
        }
    }
}

impl std::str::FromStr for CurrencyCode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "GBP" => Ok(Self::GBP),
            "CAD" => Ok(Self::CAD),
            "AUD" => Ok(Self::AUD),
            _ => Err(format!("unsupported currency: {s}")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_new_normalizes_scale() {
        assert_eq!(Money::new(dec("1000")).to_string(), "1000.00");
        assert_eq!(Money::new(dec("19.999")).to_string(), "20.00");
        assert_eq!(Money::new(dec("0.005")).to_string(), "0.01");
    }

    #[test]
    fn test_times_quantity() {
        let unit = Money::new(dec("1000.00"));
        assert_eq!(unit.times(3), Money::new(dec("3000.00")));
        assert_eq!(unit.times(0), Money::ZERO);
    }

    #[test]
    fn test_sum_of_lines() {
        let total: Money = [Money::new(dec("2000.00")), Money::new(dec("800.00"))]
            .into_iter()
            .sum();
        assert_eq!(total, Money::new(dec("2800.00")));
    }

    #[test]
    fn test_to_minor_units() {
        assert_eq!(Money::new(dec("2800.00")).to_minor_units().unwrap(), 280_000);
        assert_eq!(Money::new(dec("0.01")).to_minor_units().unwrap(), 1);
        assert_eq!(Money::ZERO.to_minor_units().unwrap(), 0);
    }

    #[test]
    fn test_to_minor_units_rejects_negative() {
        let result = Money::new(dec("-1.00")).to_minor_units();
        assert!(matches!(result, Err(MoneyError::Negative(_))));
    }

    #[test]
    fn test_is_positive() {
        assert!(Money::from_cents(1).is_positive());
        assert!(!Money::ZERO.is_positive());
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_string(&Money::new(dec("12.5"))).unwrap();
        assert_eq!(json, "\"12.50\"");
    }

    #[test]
    fn test_currency_codes() {
        assert_eq!("usd".parse::<CurrencyCode>().unwrap(), CurrencyCode::USD);
        assert_eq!(CurrencyCode::EUR.provider_code(), "eur");
        assert!("xyz".parse::<CurrencyCode>().is_err());
    }
}
