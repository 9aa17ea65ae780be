//! Purchasable variant as seen by the fulfillment engine.

use cartwright_core::rules::checkout::describe_variant;
use cartwright_core::{Money, ProductId, VariantId};
use serde::Serialize;

/// A product variant with its current stock level.
#[derive(Debug, Clone, Serialize)]
pub struct Variant {
    pub id: VariantId,
    pub product_id: Option<ProductId>,
    pub product_title: Option<String>,
    pub sku: String,
    pub size: Option<String>,
    pub color: Option<String>,
    pub price: Money,
    pub stock: i32,
}

impl Variant {
    /// Name copied onto order items: the product title, or the SKU for
    /// orphaned variants.
    #[must_use]
    pub fn display_name(&self) -> String {
        self.product_title
            .clone()
            .unwrap_or_else(|| self.sku.clone())
    }

    /// Variant description copied onto order items.
    #[must_use]
    pub fn details(&self) -> Option<String> {
        describe_variant(self.size.as_deref(), self.color.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn variant(title: Option<&str>) -> Variant {
        Variant {
            id: VariantId::new(1),
            product_id: None,
            product_title: title.map(String::from),
            sku: "TEE-M-BLU".to_string(),
            size: Some("M".to_string()),
            color: Some("Blue".to_string()),
            price: Money::from_cents(2_500),
            stock: 4,
        }
    }

    #[test]
    fn test_display_name_prefers_title() {
        assert_eq!(variant(Some("Tee")).display_name(), "Tee");
        assert_eq!(variant(None).display_name(), "TEE-M-BLU");
    }

    #[test]
    fn test_details() {
        assert_eq!(variant(None).details().as_deref(), Some("Size: M, Color: Blue"));
    }
}
