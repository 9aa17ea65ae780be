//! Order total arithmetic.

use crate::Money;

/// Total for one line: unit price times quantity.
#[must_use]
pub fn line_total(unit_price: Money, quantity: i32) -> Money {
    unit_price.times(quantity)
}

/// Order total: the sum of every line's unit price times quantity.
#[must_use]
pub fn order_total<I>(lines: I) -> Money
where
    I: IntoIterator<Item = (Money, i32)>,
{
    lines
        .into_iter()
        .map(|(unit, quantity)| line_total(unit, quantity))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_order_is_zero() {
        assert_eq!(order_total(Vec::new()), Money::ZERO);
    }

    #[test]
    fn test_mixed_lines() {
        let total = order_total([(Money::from_cents(100_000), 2), (Money::from_cents(80_000), 1)]);
        assert_eq!(total, Money::from_cents(280_000));
    }

    #[test]
    fn test_line_total() {
        assert_eq!(line_total(Money::from_cents(1_999), 3), Money::from_cents(5_997));
    }
}
