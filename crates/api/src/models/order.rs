//! Orders and their line items.

use cartwright_core::{
    CartId, Money, OrderId, OrderItemId, OrderNumber, OrderStatus, UserId, VariantId,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use super::OrderShippingAddress;

/// An order with its items and shipping snapshot.
///
/// Repositories that only read the order header leave `items` empty and
/// `shipping_address` unset.
#[derive(Debug, Clone, Serialize)]
pub struct Order {
    pub id: OrderId,
    pub order_number: OrderNumber,
    pub user_id: UserId,
    pub cart_id: CartId,
    pub status: OrderStatus,
    pub total_price: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<OrderItem>,
    pub shipping_address: Option<OrderShippingAddress>,
}

/// One line of an order.
#[derive(Debug, Clone, Serialize)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    /// `None` once the variant has been deleted from the catalog.
    pub variant_id: Option<VariantId>,
    pub quantity: i32,
    pub unit_price_at_purchase: Money,
    pub total_price_at_purchase: Money,
    pub product_name_snapshot: String,
    pub variant_details_snapshot: Option<String>,
}

/// Fields for inserting an order item.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub order_id: OrderId,
    pub variant_id: VariantId,
    pub quantity: i32,
    pub unit_price: Money,
    pub product_name: String,
    pub variant_details: Option<String>,
}
