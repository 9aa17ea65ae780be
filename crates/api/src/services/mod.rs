//! Business logic services.
//!
//! Services own transaction boundaries. Each operation opens one transaction,
//! calls the repositories in `crate::db`, and commits; the only network I/O
//! outside the database is the payment provider call, made after commit.

pub mod addresses;
pub mod carts;
pub mod checkout;
pub mod email;
mod error;
mod order_items;
pub mod orders;
pub mod payments;
pub mod reviews;

pub use addresses::AddressService;
pub use carts::CartService;
pub use checkout::{CheckoutRequest, CheckoutResult, CheckoutService};
pub use email::{EmailError, EmailService};
pub use error::OrderError;
pub use orders::OrderService;
pub use payments::{PaymentService, WebhookOutcome};
pub use reviews::ReviewService;
