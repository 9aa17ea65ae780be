//! Planning state changes from payment-provider signals.
//!
//! Webhooks arrive at least once and in any order. Planning is idempotent:
//! a repeated success changes nothing, and a late failure never undoes a
//! collected payment.

use crate::{OrderStatus, PaymentStatus};

/// What the provider told us about a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentSignal {
    Succeeded,
    Failed,
}

/// Changes to persist in response to a signal. `None` leaves a row untouched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PaymentUpdate {
    pub payment: Option<PaymentStatus>,
    pub order: Option<OrderStatus>,
    /// The payment moved to `succeeded` because of this signal.
    pub newly_succeeded: bool,
}

impl PaymentUpdate {
    /// Whether nothing needs writing.
    #[must_use]
    pub const fn is_noop(&self) -> bool {
        self.payment.is_none() && self.order.is_none()
    }
}

/// Plan the payment and order updates for a provider signal.
///
/// The order only moves when the lifecycle table allows it, so a refunded or
/// cancelled order is never resurrected by a late success.
#[must_use]
pub fn plan_payment_update(
    signal: PaymentSignal,
    payment: PaymentStatus,
    order: OrderStatus,
) -> PaymentUpdate {
    match signal {
        PaymentSignal::Succeeded => {
            if payment == PaymentStatus::Succeeded {
                return PaymentUpdate::default();
            }
            let order_target = (order != OrderStatus::Paid
                && order.can_transition_to(OrderStatus::Paid))
            .then_some(OrderStatus::Paid);
            PaymentUpdate {
                payment: Some(PaymentStatus::Succeeded),
                order: order_target,
                newly_succeeded: true,
            }
        }
        PaymentSignal::Failed => {
            if !payment.accepts_failure() {
                return PaymentUpdate::default();
            }
            let payment_target = (payment != PaymentStatus::Failed).then_some(PaymentStatus::Failed);
            let order_target = (order != OrderStatus::PaymentFailed
                && order.can_transition_to(OrderStatus::PaymentFailed))
            .then_some(OrderStatus::PaymentFailed);
            PaymentUpdate {
                payment: payment_target,
                order: order_target,
                newly_succeeded: false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_success_pays_order() {
        let update = plan_payment_update(
            PaymentSignal::Succeeded,
            PaymentStatus::RequiresAction,
            OrderStatus::Pending,
        );
        assert_eq!(update.payment, Some(PaymentStatus::Succeeded));
        assert_eq!(update.order, Some(OrderStatus::Paid));
        assert!(update.newly_succeeded);
    }

    #[test]
    fn test_duplicate_success_is_noop() {
        let update = plan_payment_update(
            PaymentSignal::Succeeded,
            PaymentStatus::Succeeded,
            OrderStatus::Paid,
        );
        assert!(update.is_noop());
        assert!(!update.newly_succeeded);
    }

    #[test]
    fn test_success_after_payment_failed_recovers() {
        let update = plan_payment_update(
            PaymentSignal::Succeeded,
            PaymentStatus::Failed,
            OrderStatus::PaymentFailed,
        );
        assert_eq!(update.order, Some(OrderStatus::Paid));
    }

    #[test]
    fn test_success_does_not_resurrect_cancelled_order() {
        let update = plan_payment_update(
            PaymentSignal::Succeeded,
            PaymentStatus::RequiresAction,
            OrderStatus::Cancelled,
        );
        assert_eq!(update.payment, Some(PaymentStatus::Succeeded));
        assert_eq!(update.order, None);
    }

    #[test]
    fn test_failure_never_downgrades_success() {
        let update = plan_payment_update(
            PaymentSignal::Failed,
            PaymentStatus::Succeeded,
            OrderStatus::Paid,
        );
        assert!(update.is_noop());
    }

    #[test]
    fn test_failure_marks_pending_order() {
        let update = plan_payment_update(
            PaymentSignal::Failed,
            PaymentStatus::RequiresAction,
            OrderStatus::Pending,
        );
        assert_eq!(update.payment, Some(PaymentStatus::Failed));
        assert_eq!(update.order, Some(OrderStatus::PaymentFailed));
    }

    #[test]
    fn test_repeated_failure_is_noop() {
        let update = plan_payment_update(
            PaymentSignal::Failed,
            PaymentStatus::Failed,
            OrderStatus::PaymentFailed,
        );
        assert!(update.is_noop());
    }
}
