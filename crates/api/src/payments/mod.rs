//! Payment provider integration.
//!
//! This module provides:
//! - [`PaymentClient`] for creating hosted checkout sessions
//! - Webhook signature verification and event parsing
//!
//! # Flow
//!
//! 1. Checkout or payment initiation commits a `requires_action` payment
//! 2. A hosted session is requested with order and payment ids as metadata
//! 3. The provider posts signed events to `/webhooks/payments`
//! 4. Events are verified, correlated to the payment, and reconciled

mod client;
mod error;
pub mod webhook;

pub use client::{HostedSession, PaymentClient, SessionRequest};
pub use error::{PaymentGatewayError, WebhookError};
pub use webhook::{Correlation, EventKind, ProviderEvent};
