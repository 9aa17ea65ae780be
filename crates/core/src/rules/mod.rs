//! Pure decision rules for the fulfillment engine.
//!
//! Each function here computes *what* should change; the `api` crate applies
//! the result to the database inside the caller's transaction.

pub mod checkout;
pub mod ledger;
pub mod lifecycle;
pub mod reconcile;
pub mod review;
pub mod totals;
