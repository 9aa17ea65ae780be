//! Inventory ledger arithmetic.
//!
//! Stock never goes below zero. An adjustment that would drive it negative is
//! clamped, and the *applied* delta (not the requested one) is what gets
//! journaled and later reversed.

use std::collections::HashMap;

use crate::VariantId;

/// The outcome of applying a signed delta to a stock level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Adjustment {
    /// Delta the caller asked for.
    pub requested: i32,
    /// Delta that actually moved stock.
    pub applied: i32,
    /// Stock level after the adjustment.
    pub resulting_stock: i32,
}

impl Adjustment {
    /// Whether the requested delta was cut short by the zero floor.
    #[must_use]
    pub const fn clamped(&self) -> bool {
        self.requested != self.applied
    }
}

/// Plan a stock adjustment, clamping the result at zero.
///
/// A negative `current` (which the database constraint forbids) is treated
/// as zero.
///
/// ```
/// use cartwright_core::rules::ledger::plan_adjustment;
///
/// let adj = plan_adjustment(2, -5);
/// assert_eq!(adj.applied, -2);
/// assert_eq!(adj.resulting_stock, 0);
/// assert!(adj.clamped());
/// ```
#[must_use]
pub fn plan_adjustment(current: i32, delta: i32) -> Adjustment {
    let current = current.max(0);
    let resulting_stock = current.saturating_add(delta).max(0);
    Adjustment {
        requested: delta,
        applied: resulting_stock - current,
        resulting_stock,
    }
}

/// Credit needed to undo an item's journaled movements.
///
/// `net_applied` is the sum of every applied delta recorded for the item;
/// a debit (negative sum) is reversed, anything else needs nothing.
#[must_use]
pub const fn reversal_for(net_applied: i32) -> i32 {
    if net_applied < 0 { -net_applied } else { 0 }
}

/// One line of a pending checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StockLine {
    /// Zero-based position of the line in the cart.
    pub line: usize,
    pub variant_id: VariantId,
    pub requested: i32,
}

/// A checkout line asks for more units than are in stock.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error(
    "insufficient stock for line {line} (variant {variant_id}): {available} available, {requested} requested"
)]
pub struct InsufficientStock {
    pub line: usize,
    pub variant_id: VariantId,
    pub available: i32,
    /// Total requested for this variant across all lines.
    pub requested: i32,
}

/// Check that every line can be fulfilled from current stock.
///
/// Quantities for the same variant are summed before comparing. A variant
/// missing from `stock` has nothing available. The first failing line (in
/// line order) is reported.
///
/// # Errors
///
/// Returns [`InsufficientStock`] naming the first line whose variant cannot
/// cover the requested total.
pub fn validate_availability(
    lines: &[StockLine],
    stock: &HashMap<VariantId, i32>,
) -> Result<(), InsufficientStock> {
    let mut totals: HashMap<VariantId, i32> = HashMap::new();
    for line in lines {
        *totals.entry(line.variant_id).or_default() += line.requested;
    }

    for line in lines {
        let available = stock.get(&line.variant_id).copied().unwrap_or(0);
        let requested = totals.get(&line.variant_id).copied().unwrap_or(line.requested);
        if requested > available {
            return Err(InsufficientStock {
                line: line.line,
                variant_id: line.variant_id,
                available,
                requested,
            });
        }
    }

    Ok(())
}
