//! Order status transitions.
//!
//! The table itself lives on [`OrderStatus::allowed_targets`]; this module
//! turns a requested change into a [`Transition`] that says whether stock must
//! be returned.

use crate::OrderStatus;

/// Who is asking for a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    /// The order's owner. May only cancel, and only before payment.
    Customer,
    /// Store staff. May make any transition the table allows.
    Staff,
}

/// A validated status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: OrderStatus,
    pub to: OrderStatus,
    /// Stock must be credited back for every item.
    pub restock: bool,
}

impl Transition {
    /// Whether the status actually changes.
    #[must_use]
    pub fn changed(&self) -> bool {
        self.from != self.to
    }
}

/// Why a status change was refused.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    #[error("cannot move order from {from} to {to}")]
    NotAllowed { from: OrderStatus, to: OrderStatus },
    #[error("orders in status {0} cannot be cancelled by the customer")]
    NotCancellable(OrderStatus),
    #[error("customers may only cancel orders")]
    CustomerTarget(OrderStatus),
}

/// Validate a transition and compute its side effects.
///
/// Restocking happens only when entering a restocking status from one that is
/// not, so re-saving `cancelled` never credits stock twice.
///
/// # Errors
///
/// Returns [`TransitionError`] when the table (or the actor's permissions)
/// forbid the change.
pub fn plan_transition(
    from: OrderStatus,
    to: OrderStatus,
    actor: Actor,
) -> Result<Transition, TransitionError> {
    if actor == Actor::Customer {
        if to != OrderStatus::Cancelled {
            return Err(TransitionError::CustomerTarget(to));
        }
        if !from.customer_cancellable() {
            return Err(TransitionError::NotCancellable(from));
        }
    }

    if !from.can_transition_to(to) {
        return Err(TransitionError::NotAllowed { from, to });
    }

    Ok(Transition {
        from,
        to,
        restock: to.restocks() && !from.restocks(),
    })
}
