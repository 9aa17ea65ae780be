//! Checkout validation and order-item snapshots.

use std::collections::HashMap;

use crate::VariantId;
use crate::rules::ledger::{InsufficientStock, StockLine, validate_availability};

/// Why a cart cannot be turned into an order.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckoutRejection {
    #[error("cart is empty")]
    EmptyCart,
    #[error(transparent)]
    InsufficientStock(#[from] InsufficientStock),
}

/// Validate a cart's lines against locked stock levels.
///
/// `lines` are `(variant, quantity)` pairs in cart order.
///
/// # Errors
///
/// [`CheckoutRejection::EmptyCart`] if there are no lines, otherwise
/// [`CheckoutRejection::InsufficientStock`] for the first line that cannot be
/// covered.
pub fn validate_cart(
    lines: &[(VariantId, i32)],
    stock: &HashMap<VariantId, i32>,
) -> Result<(), CheckoutRejection> {
    if lines.is_empty() {
        return Err(CheckoutRejection::EmptyCart);
    }

    let stock_lines: Vec<StockLine> = lines
        .iter()
        .enumerate()
        .map(|(line, &(variant_id, requested))| StockLine {
            line,
            variant_id,
            requested,
        })
        .collect();

    validate_availability(&stock_lines, stock)?;
    Ok(())
}

/// Human-readable variant description stored on the order item,
/// e.g. `"Size: M, Color: Blue"`.
#[must_use]
pub fn describe_variant(size: Option<&str>, color: Option<&str>) -> Option<String> {
    let parts: Vec<String> = [("Size", size), ("Color", color)]
        .into_iter()
        .filter_map(|(label, value)| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(|v| format!("{label}: {v}"))
        })
        .collect();

    (!parts.is_empty()).then(|| parts.join(", "))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_cart_rejected_first() {
        assert_eq!(
            validate_cart(&[], &HashMap::new()),
            Err(CheckoutRejection::EmptyCart)
        );
    }

    #[test]
    fn test_insufficient_stock_rejected() {
        let stock = HashMap::from([(VariantId::new(1), 10)]);
        let err = validate_cart(&[(VariantId::new(1), 11)], &stock).unwrap_err();
        match err {
            CheckoutRejection::InsufficientStock(e) => {
                assert_eq!(e.available, 10);
                assert_eq!(e.requested, 11);
            }
            CheckoutRejection::EmptyCart => panic!("expected insufficient stock"),
        }
    }

    #[test]
    fn test_valid_cart() {
        let stock = HashMap::from([(VariantId::new(1), 10)]);
        assert!(validate_cart(&[(VariantId::new(1), 3)], &stock).is_ok());
    }

    #[test]
    fn test_describe_variant() {
        assert_eq!(
            describe_variant(Some("M"), Some("Blue")).as_deref(),
            Some("Size: M, Color: Blue")
        );
        assert_eq!(describe_variant(None, Some("Red")).as_deref(), Some("Color: Red"));
        assert_eq!(describe_variant(Some(" "), None), None);
    }
}
