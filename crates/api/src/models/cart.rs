//! Cart aggregate.

use cartwright_core::rules::totals::line_total;
use cartwright_core::{CartId, CartItemId, Money, UserId, VariantId};
use serde::Serialize;

/// A user's cart and its lines.
#[derive(Debug, Clone, Serialize)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub checked_out: bool,
    pub items: Vec<CartItem>,
}

impl Cart {
    /// Sum of every line at its snapshotted price.
    #[must_use]
    pub fn subtotal(&self) -> Money {
        self.items.iter().map(CartItem::line_total).sum()
    }
}

/// One variant in a cart.
#[derive(Debug, Clone, Serialize)]
pub struct CartItem {
    pub id: CartItemId,
    pub cart_id: CartId,
    pub variant_id: VariantId,
    pub quantity: i32,
    /// Variant price when the line was first added.
    pub price_at_addition: Money,
}

impl CartItem {
    #[must_use]
    pub fn line_total(&self) -> Money {
        line_total(self.price_at_addition, self.quantity)
    }
}
