//! Status enums for orders, payments, and the stock journal.

use serde::{Deserialize, Serialize};

/// Order status.
///
/// `cancelled` and `refunded` are absorbing: no transition leaves them, and
/// entering either one returns the order's stock to the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Processing,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
    Refunded,
    PaymentFailed,
}

impl OrderStatus {
    /// Every status, in declaration order.
    pub const ALL: [Self; 8] = [
        Self::Pending,
        Self::Processing,
        Self::Paid,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
        Self::Refunded,
        Self::PaymentFailed,
    ];

    /// Statuses that count as a completed purchase for review verification.
    pub const COMPLETED_PURCHASE: [Self; 3] = [Self::Delivered, Self::Shipped, Self::Paid];

    /// Whether entering this status returns the order's stock.
    #[must_use]
    pub const fn restocks(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Refunded)
    }

    /// Whether order items in this status may still be edited.
    ///
    /// Closed orders are frozen, and so are paid ones: their captured amount
    /// can no longer follow the total.
    #[must_use]
    pub const fn is_editable(&self) -> bool {
        !self.restocks() && !self.is_paid()
    }

    /// Whether this status counts as a completed purchase.
    #[must_use]
    pub const fn is_completed_purchase(&self) -> bool {
        matches!(self, Self::Delivered | Self::Shipped | Self::Paid)
    }

    /// Whether payment has been collected (or the order has moved past payment).
    #[must_use]
    pub const fn is_paid(&self) -> bool {
        matches!(
            self,
            Self::Paid | Self::Processing | Self::Shipped | Self::Delivered
        )
    }

    /// Whether a customer may cancel the order themselves.
    #[must_use]
    pub const fn customer_cancellable(&self) -> bool {
        matches!(self, Self::Pending | Self::PaymentFailed)
    }

    /// Statuses reachable from this one, excluding re-saving the same status.
    #[must_use]
    pub const fn allowed_targets(&self) -> &'static [Self] {
        match self {
            Self::Pending => &[
                Self::Processing,
                Self::Paid,
                Self::PaymentFailed,
                Self::Cancelled,
            ],
            Self::PaymentFailed => &[Self::Pending, Self::Paid, Self::Cancelled],
            Self::Processing => &[Self::Paid, Self::Shipped, Self::Cancelled, Self::Refunded],
            Self::Paid => &[
                Self::Processing,
                Self::Shipped,
                Self::Cancelled,
                Self::Refunded,
            ],
            Self::Shipped => &[Self::Delivered, Self::Refunded],
            Self::Delivered => &[Self::Refunded],
            Self::Cancelled | Self::Refunded => &[],
        }
    }

    /// Whether `target` may follow this status. Re-saving the same status is
    /// always allowed.
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        *self == target || self.allowed_targets().contains(&target)
    }

    /// The wire/database spelling.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Paid => "paid",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
            Self::PaymentFailed => "payment_failed",
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("invalid order status: {s}"))
    }
}

/// Payment status as tracked against the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    RequiresAction,
    Succeeded,
    Failed,
    Refunded,
    Canceled,
}

impl PaymentStatus {
    /// Whether a failure signal may overwrite this status.
    ///
    /// A payment that has been collected (or refunded) is never downgraded.
    #[must_use]
    pub const fn accepts_failure(&self) -> bool {
        !matches!(self, Self::Succeeded | Self::Refunded)
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::RequiresAction => write!(f, "requires_action"),
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
            Self::Refunded => write!(f, "refunded"),
            Self::Canceled => write!(f, "canceled"),
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "requires_action" => Ok(Self::RequiresAction),
            "succeeded" => Ok(Self::Succeeded),
            "failed" => Ok(Self::Failed),
            "refunded" => Ok(Self::Refunded),
            "canceled" => Ok(Self::Canceled),
            _ => Err(format!("invalid payment status: {s}")),
        }
    }
}

/// How the customer intends to pay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_method", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    #[default]
    Card,
    Paypal,
    BankTransfer,
}

impl PaymentMethod {
    /// Whether the hosted checkout integration can collect this method.
    #[must_use]
    pub const fn is_supported(&self) -> bool {
        matches!(self, Self::Card)
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Card => write!(f, "card"),
            Self::Paypal => write!(f, "paypal"),
            Self::BankTransfer => write!(f, "bank_transfer"),
        }
    }
}

impl std::str::FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "card" => Ok(Self::Card),
            "paypal" => Ok(Self::Paypal),
            "bank_transfer" => Ok(Self::BankTransfer),
            _ => Err(format!("invalid payment method: {s}")),
        }
    }
}

/// Why a stock movement was journaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "stock_reason", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum StockReason {
    /// Debit when a cart line becomes an order item.
    Checkout,
    /// Debit for an item added to an existing order.
    ItemAdded,
    /// Debit or credit for an order item whose quantity changed.
    ItemQuantityChanged,
    /// Credit for an order item that was deleted.
    ItemRemoved,
    /// Credit when the order entered cancelled or refunded.
    OrderRestocked,
}

impl std::fmt::Display for StockReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Checkout => write!(f, "checkout"),
            Self::ItemAdded => write!(f, "item_added"),
            Self::ItemQuantityChanged => write!(f, "item_quantity_changed"),
            Self::ItemRemoved => write!(f, "item_removed"),
            Self::OrderRestocked => write!(f, "order_restocked"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_round_trips_through_str() {
        for status in OrderStatus::ALL {
            assert_eq!(status.to_string().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("archived".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_order_status_serde_matches_display() {
        let json = serde_json::to_string(&OrderStatus::PaymentFailed).unwrap();
        assert_eq!(json, "\"payment_failed\"");
    }

    #[test]
    fn test_terminal_statuses_have_no_targets() {
        assert!(OrderStatus::Cancelled.allowed_targets().is_empty());
        assert!(OrderStatus::Refunded.allowed_targets().is_empty());
        assert!(OrderStatus::Cancelled.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Cancelled.can_transition_to(OrderStatus::Pending));
    }

    #[test]
    fn test_same_status_always_allowed() {
        for status in OrderStatus::ALL {
            assert!(status.can_transition_to(status));
        }
    }

    #[test]
    fn test_delivered_only_refunds() {
        assert!(OrderStatus::Delivered.can_transition_to(OrderStatus::Refunded));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Cancelled));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Shipped));
    }

    #[test]
    fn test_only_unpaid_open_orders_are_editable() {
        assert!(OrderStatus::Pending.is_editable());
        assert!(OrderStatus::PaymentFailed.is_editable());
        assert!(!OrderStatus::Paid.is_editable());
        assert!(!OrderStatus::Shipped.is_editable());
        assert!(!OrderStatus::Cancelled.is_editable());
        assert!(!OrderStatus::Refunded.is_editable());
    }

    #[test]
    fn test_completed_purchase_set() {
        let completed: Vec<_> = OrderStatus::ALL
            .into_iter()
            .filter(OrderStatus::is_completed_purchase)
            .collect();
        assert_eq!(completed.len(), OrderStatus::COMPLETED_PURCHASE.len());
        for status in OrderStatus::COMPLETED_PURCHASE {
            assert!(completed.contains(&status));
        }
    }

    #[test]
    fn test_payment_failure_never_downgrades_success() {
        assert!(!PaymentStatus::Succeeded.accepts_failure());
        assert!(!PaymentStatus::Refunded.accepts_failure());
        assert!(PaymentStatus::RequiresAction.accepts_failure());
    }

    #[test]
    fn test_payment_method_parse() {
        assert_eq!("bank_transfer".parse::<PaymentMethod>().unwrap(), PaymentMethod::BankTransfer);
        assert!(PaymentMethod::Card.is_supported());
        assert!(!PaymentMethod::Paypal.is_supported());
    }
}
